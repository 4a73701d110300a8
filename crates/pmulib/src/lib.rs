//! # pmulib -- Async Control for I2C Power-Management HATs
//!
//! `pmulib` is an asynchronous Rust library for talking to the
//! power-management microcontroller on a UPS HAT over I2C. It covers the
//! full device surface: telemetry, battery and fan configuration,
//! watchdog, RTC, scheduled power events, and firmware updates. It is
//! designed for headless deployments where the host must survive power
//! loss, schedule its own wakeups, and keep its batteries healthy.
//!
//! ## Quick Start
//!
//! Add `pmulib` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! pmulib = "0.3"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! Connect to the device and read the battery state:
//!
//! ```no_run
//! use pmulib::PowerDeviceBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut device = PowerDeviceBuilder::new().build().await?;
//!
//!     let level = device.battery_level().await?;
//!     let voltage = device.battery_voltage().await?;
//!     println!("battery: {level}% at {voltage:.2} V");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                 | Purpose                                       |
//! |-----------------------|-----------------------------------------------|
//! | `pmulib-core`         | [`Bus`] trait, error types, unit helpers      |
//! | `pmulib-transport`    | Linux I2C bus implementation                  |
//! | `pmulib-protocol`     | Frame codec, retry engine, firmware transfer, typed client |
//! | `pmulib-test-harness` | `MockBus` for hardware-free testing           |
//! | **`pmulib`**          | This facade crate -- re-exports everything    |
//!
//! ## Reliability
//!
//! The I2C link is half duplex and the MCU occasionally answers with
//! garbage or not at all, so every exchange runs through a retry engine:
//! up to ten attempts with a 100 ms backoff, and only then
//! [`Error::Unavailable`]. Callers never see a transient bus fault.
//!
//! ## Firmware Updates
//!
//! Firmware images are streamed in 20-byte chunks at the device's own
//! pace, with whole-percent progress reporting:
//!
//! ```no_run
//! use pmulib::{PowerDeviceBuilder, UpdateMethod};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut device = PowerDeviceBuilder::new().build().await?;
//! let image = std::fs::read("firmware.bin")?;
//! device
//!     .update_firmware(&image, UpdateMethod::BootMode, |pct| println!("{pct}%"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub use pmulib_core::*;

pub use pmulib_protocol::firmware::UpdateMethod;
pub use pmulib_protocol::models;
pub use pmulib_protocol::{PowerDevice, PowerDeviceBuilder};

/// Wire protocol, typed client, and firmware transfer.
///
/// Full access to the frame codec ([`protocol::frame`]), command
/// catalogue ([`protocol::commands`]), retry engine
/// ([`protocol::engine`]), and update sessions ([`protocol::firmware`]).
pub mod protocol {
    pub use pmulib_protocol::*;
}

/// Bus implementations.
///
/// Provides [`I2cBus`](transport::I2cBus) over the Linux `/dev/i2c-*`
/// interface. Custom links implement [`Bus`] and plug into
/// [`PowerDeviceBuilder::build_with_bus`].
pub mod transport {
    pub use pmulib_transport::*;
}
