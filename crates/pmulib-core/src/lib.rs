//! pmulib-core: Core traits, types, and error definitions for pmulib.
//!
//! This crate defines the device-agnostic abstractions the rest of pmulib
//! builds on. Applications depend on these types without pulling in a
//! concrete bus implementation.
//!
//! # Key types
//!
//! - [`Bus`] -- byte-level communication channel to the device
//! - [`Error`] / [`Result`] -- error handling
//! - [`AbortReason`] -- why a firmware update session gave up
//! - unit helpers ([`celsius_from_centi`] and friends) for the device's
//!   fixed-point telemetry encoding

pub mod bus;
pub mod error;
pub mod helpers;

// Re-export key types at crate root for ergonomic `use pmulib_core::*`.
pub use bus::Bus;
pub use error::{AbortReason, Error, Result};
pub use helpers::{amps_from_milli, celsius_from_centi, volts_from_milli, watts_from_milli};
