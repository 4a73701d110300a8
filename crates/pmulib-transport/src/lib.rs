//! Bus implementations for pmulib.
//!
//! This crate provides concrete implementations of the [`Bus`](pmulib_core::Bus)
//! trait from `pmulib-core` for the physical links the device ships with:
//!
//! - [`I2cBus`]: the Linux `/dev/i2c-*` interface the HAT hangs off on a
//!   Raspberry Pi or any other SBC with an exposed I2C header
//!
//! # Example
//!
//! ```no_run
//! use pmulib_transport::I2cBus;
//! use pmulib_core::Bus;
//!
//! # async fn example() -> pmulib_core::Result<()> {
//! // Connect to the device at its factory address
//! let mut bus = I2cBus::open("/dev/i2c-1", 0x41).await?;
//!
//! // Send a request frame
//! bus.write(&[0xCD, 0x01, 0x0D, 0x00, 0x00, 0x37, 0x2B]).await?;
//!
//! // Read the response
//! let mut buf = [0u8; 11];
//! let n = bus.read(&mut buf).await?;
//! # Ok(())
//! # }
//! ```

pub mod i2c;

pub use i2c::{I2cBus, I2cConfig};
