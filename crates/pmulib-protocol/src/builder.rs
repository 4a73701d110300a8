//! PowerDeviceBuilder -- fluent builder for constructing [`PowerDevice`]
//! instances.
//!
//! Separates configuration from construction so that callers can set the
//! I2C bus path, device address, and response-delay override before the
//! bus is opened.
//!
//! # Example
//!
//! ```no_run
//! use pmulib_protocol::builder::PowerDeviceBuilder;
//!
//! # async fn example() -> pmulib_core::Result<()> {
//! let mut device = PowerDeviceBuilder::new()
//!     .bus_path("/dev/i2c-1")
//!     .address(0x41)
//!     .build()
//!     .await?;
//! let level = device.battery_level().await?;
//! println!("battery at {level}%");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use pmulib_core::{Bus, Result};

use crate::device::PowerDevice;
use crate::engine::{ProtocolEngine, DEFAULT_RESPONSE_DELAY};

/// Factory-default I2C address of the device.
pub const DEFAULT_ADDRESS: u16 = 0x41;

/// The I2C bus a HAT sits on.
pub const DEFAULT_BUS_PATH: &str = "/dev/i2c-1";

/// Fluent builder for [`PowerDevice`].
///
/// Every option has a default matching the hardware as shipped, so the
/// simplest usage is:
///
/// ```ignore
/// let device = PowerDeviceBuilder::new().build().await?;
/// ```
pub struct PowerDeviceBuilder {
    bus_path: String,
    address: u16,
    response_delay: Duration,
}

impl PowerDeviceBuilder {
    /// Create a builder with factory defaults.
    pub fn new() -> Self {
        PowerDeviceBuilder {
            bus_path: DEFAULT_BUS_PATH.to_string(),
            address: DEFAULT_ADDRESS,
            response_delay: DEFAULT_RESPONSE_DELAY,
        }
    }

    /// Set the I2C bus device path (e.g. `/dev/i2c-1`).
    pub fn bus_path(mut self, path: &str) -> Self {
        self.bus_path = path.to_string();
        self
    }

    /// Override the device's I2C address.
    ///
    /// Use this when the address has been moved off the factory default
    /// with the solder jumpers.
    pub fn address(mut self, address: u16) -> Self {
        self.address = address;
        self
    }

    /// Override the delay between sending a request and reading its
    /// response (default: 10 ms).
    ///
    /// A handful of slow operations carry their own longer delays; this
    /// sets the baseline for everything else.
    pub fn response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    /// Build a [`PowerDevice`] over a caller-provided bus.
    ///
    /// This is the primary entry point for testing (pass a `MockBus` from
    /// `pmulib-test-harness`) and for callers that manage the bus
    /// lifecycle themselves.
    pub async fn build_with_bus(self, bus: Box<dyn Bus>) -> Result<PowerDevice> {
        Ok(PowerDevice::new(ProtocolEngine::new(
            bus,
            self.response_delay,
        )))
    }

    /// Build a [`PowerDevice`] over the Linux I2C bus.
    pub async fn build(self) -> Result<PowerDevice> {
        let bus = pmulib_transport::I2cBus::open(&self.bus_path, self.address).await?;
        self.build_with_bus(Box::new(bus)).await
    }
}

impl Default for PowerDeviceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
