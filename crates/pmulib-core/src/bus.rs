//! Bus trait for device communication.
//!
//! The [`Bus`] trait abstracts over the physical byte channel to the
//! power-management MCU. The shipped implementation is Linux I2C
//! (`pmulib-transport`), and a scripted mock lives in
//! `pmulib-test-harness` for deterministic unit testing.
//!
//! The protocol engine operates on a `Bus` rather than directly on a bus
//! device node. Note there is no per-read deadline here: the device needs a
//! fixed processing delay between request and response, so the engine sleeps
//! explicitly before each read instead of arming an I/O timeout.

use async_trait::async_trait;

use crate::error::Result;

/// Asynchronous byte-level channel to the device.
///
/// Implementations handle addressing and error mapping at the physical
/// layer. Framing, response validation, and retry are protocol-engine
/// concerns layered on top of this trait.
#[async_trait]
pub trait Bus: Send {
    /// Write raw bytes to the device.
    ///
    /// Implementations should return only after the full buffer has been
    /// handed to the underlying bus (the I2C write transaction completed).
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read bytes from the device into the provided buffer.
    ///
    /// Returns the number of bytes actually read, which may be fewer than
    /// `buf.len()`. The caller decides whether a short read is acceptable;
    /// the protocol engine treats one as an invalid response.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Close the bus connection.
    ///
    /// After calling `close()`, subsequent `write()` and `read()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the bus is currently open.
    fn is_connected(&self) -> bool;
}
