//! Basic telemetry example.
//!
//! Connects to the power-management HAT and prints one reading of every
//! rail, the battery state, and the fan.
//!
//! # Requirements
//!
//! - The HAT seated on the Pi's header (or wired to another SBC's I2C pins)
//! - The I2C interface enabled (`raspi-config` on Raspberry Pi OS)
//!
//! # Usage
//!
//! ```sh
//! cargo run -p pmulib --example telemetry
//! ```

use pmulib::PowerDeviceBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("Connecting on /dev/i2c-1...");

    let mut device = PowerDeviceBuilder::new().build().await?;

    let version = device.firmware_version().await?;
    println!("Connected: firmware {}", version);

    let mode = device.working_mode().await?;
    println!("Working mode: {}", mode);

    println!("\nInput rail:");
    println!("  {:.2} V", device.input_voltage().await?);
    println!("  {:.3} A", device.input_current().await?);
    println!("  {:.2} W", device.input_power().await?);
    println!("  {:.1} C", device.input_temperature().await?);

    println!("System rail:");
    println!("  {:.2} V", device.system_voltage().await?);
    println!("  {:.3} A", device.system_current().await?);
    println!("  {:.2} W", device.system_power().await?);

    println!("Battery:");
    println!("  charge: {}%", device.battery_level().await?);
    println!("  health: {}%", device.battery_health().await?);
    println!("  {:.2} V", device.battery_voltage().await?);
    println!("  {:.1} C", device.battery_temperature().await?);

    // Battery current is signed: negative while discharging.
    let current = device.battery_current().await?;
    if current < 0.0 {
        println!("  discharging at {:.3} A", -current);
    } else {
        println!("  charging at {:.3} A", current);
    }

    let fan_health = device.fan_health().await?;
    let fan_speed = device.fan_speed().await?;
    println!("Fan: {} at {} rpm", fan_health, fan_speed);

    device.close().await?;
    Ok(())
}
