//! Firmware update example.
//!
//! Streams a firmware image to the device and prints transfer progress.
//! The device erases its staging storage first, accepts the image in
//! 20-byte chunks at its own pace, and reboots into the new firmware when
//! the transfer completes.
//!
//! # Requirements
//!
//! - The HAT connected on the primary I2C bus
//! - A firmware image file from the vendor
//!
//! # Usage
//!
//! ```sh
//! cargo run -p pmulib --example firmware_update -- fw_v1.02.00.bin
//! # or, for a device already running in firmware mode:
//! cargo run -p pmulib --example firmware_update -- fw_v1.02.00.bin firmware
//! ```

use std::io::Write;

use anyhow::Context;
use pmulib::{PowerDeviceBuilder, UpdateMethod};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .context("usage: firmware_update <image.bin> [firmware]")?;
    let method = match std::env::args().nth(2).as_deref() {
        Some("firmware") => UpdateMethod::FirmwareMode,
        _ => UpdateMethod::BootMode,
    };

    let image = std::fs::read(&path).with_context(|| format!("reading {path}"))?;
    println!("Image: {} ({} bytes)", path, image.len());

    let mut device = PowerDeviceBuilder::new().build().await?;

    let before = device.firmware_version().await?;
    println!("Device firmware: {}", before);

    println!("Flashing ({:?})...", method);
    device
        .update_firmware(&image, method, |pct| {
            print!("\r{pct:3}%");
            let _ = std::io::stdout().flush();
        })
        .await?;

    println!("\nTransfer complete; device is rebooting.");
    Ok(())
}
