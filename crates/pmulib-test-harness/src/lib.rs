//! pmulib-test-harness: mock bus and test utilities for pmulib.
//!
//! This crate provides [`MockBus`] for deterministic unit testing of the
//! protocol engine, firmware transfer, and device client without real
//! hardware on the I2C bus.

pub mod mock_bus;

pub use mock_bus::MockBus;
