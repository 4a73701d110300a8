//! Linux I2C bus for device communication.
//!
//! This module provides [`I2cBus`], which implements the [`Bus`] trait on
//! top of the kernel's `/dev/i2c-*` character devices via `i2cdev`.
//!
//! The kernel interface is blocking, but transfers here are a few dozen
//! bytes: the ioctl window is well under a millisecond, so calls run
//! inline rather than hopping to the blocking pool.
//!
//! # Example
//!
//! ```no_run
//! use pmulib_transport::I2cBus;
//! use pmulib_core::Bus;
//!
//! # async fn example() -> pmulib_core::Result<()> {
//! // Open the device on the Pi's primary bus
//! let mut bus = I2cBus::open("/dev/i2c-1", 0x41).await?;
//!
//! // Send a "read battery level" request frame
//! bus.write(&[0xCD, 0x01, 0x0D, 0x00, 0x00, 0x37, 0x2B]).await?;
//!
//! // Read back the 11-byte response
//! let mut buf = [0u8; 11];
//! let n = bus.read(&mut buf).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use i2cdev::core::I2CDevice;
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};
use pmulib_core::{Bus, Error, Result};

/// I2C bus configuration.
///
/// Defaults match the hardware as shipped: the primary bus on a Raspberry
/// Pi header and the factory slave address.
#[derive(Debug, Clone)]
pub struct I2cConfig {
    /// Bus device path (e.g., "/dev/i2c-1")
    pub path: String,
    /// 7-bit slave address of the device
    pub address: u16,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            path: "/dev/i2c-1".to_string(),
            address: 0x41,
        }
    }
}

fn map_i2c_error(context: &str, e: LinuxI2CError) -> Error {
    match e {
        LinuxI2CError::Io(io) => Error::Io(io),
        LinuxI2CError::Errno(errno) => Error::Transport(format!("{context}: {errno}")),
    }
}

/// Linux I2C bus handle for one slave device.
///
/// Implements the [`Bus`] trait over a `/dev/i2c-*` character device with
/// the slave address fixed at open time.
#[derive(Debug)]
pub struct I2cBus {
    /// The underlying kernel device handle. `None` after close.
    device: Option<LinuxI2CDevice>,
    /// Bus path for logging/debugging.
    path: String,
    address: u16,
}

impl I2cBus {
    /// Open an I2C bus and bind the slave address.
    ///
    /// # Arguments
    ///
    /// * `path` - Bus device path (e.g., "/dev/i2c-1" on a Raspberry Pi)
    /// * `address` - 7-bit slave address of the device
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use pmulib_transport::I2cBus;
    /// # async fn example() -> pmulib_core::Result<()> {
    /// let bus = I2cBus::open("/dev/i2c-1", 0x41).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open(path: &str, address: u16) -> Result<Self> {
        Self::open_with_config(I2cConfig {
            path: path.to_string(),
            address,
        })
        .await
    }

    /// Open an I2C bus from a full configuration.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use pmulib_transport::{I2cBus, I2cConfig};
    /// # async fn example() -> pmulib_core::Result<()> {
    /// let config = I2cConfig {
    ///     path: "/dev/i2c-7".to_string(),
    ///     address: 0x43,
    /// };
    /// let bus = I2cBus::open_with_config(config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open_with_config(config: I2cConfig) -> Result<Self> {
        tracing::debug!(path = %config.path, address = config.address, "Opening i2c bus");

        let device = LinuxI2CDevice::new(&config.path, config.address).map_err(|e| {
            tracing::error!(path = %config.path, error = %e, "Failed to open i2c bus");
            Error::Transport(format!("Failed to open i2c bus {}: {}", config.path, e))
        })?;

        tracing::info!(path = %config.path, address = config.address, "I2c bus opened successfully");

        Ok(Self {
            device: Some(device),
            path: config.path,
            address: config.address,
        })
    }

    /// Get the bus device path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get the slave address this bus was bound to.
    pub fn address(&self) -> u16 {
        self.address
    }
}

#[async_trait]
impl Bus for I2cBus {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let device = self.device.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(
            path = %self.path,
            bytes = data.len(),
            data = ?data,
            "Writing to i2c bus"
        );

        device.write(data).map_err(|e| {
            tracing::debug!(path = %self.path, error = %e, "i2c write failed");
            map_i2c_error("i2c write failed", e)
        })
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let device = self.device.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(path = %self.path, bytes = buf.len(), "Reading from i2c bus");

        match device.read(buf) {
            Ok(()) => {
                tracing::trace!(path = %self.path, data = ?&*buf, "Read from i2c bus");
                Ok(buf.len())
            }
            Err(e) => {
                // A NACK from a busy or absent device lands here; the retry
                // layer treats it like any other failed attempt.
                tracing::debug!(path = %self.path, error = %e, "i2c read failed");
                Err(map_i2c_error("i2c read failed", e))
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(device) = self.device.take() {
            tracing::debug!(path = %self.path, "Closing i2c bus");
            drop(device);
            tracing::info!(path = %self.path, "I2c bus closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.device.is_some()
    }
}

impl Drop for I2cBus {
    fn drop(&mut self) {
        if self.device.is_some() {
            tracing::debug!(path = %self.path, "I2cBus dropped, closing bus");
        }
    }
}
