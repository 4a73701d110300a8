//! Wire protocol and typed client for the power-management MCU.
//!
//! This crate implements the binary request/response protocol spoken over
//! the half-duplex I2C link to the power-management microcontroller. It
//! provides:
//!
//! - **Frame codec** ([`frame`]) -- encode requests and decode responses
//!   with the start/direction header, big-endian payloads, and CRC-16
//!   trailer, plus the chunk framing used during firmware transfer.
//! - **Command catalogue** ([`commands`]) -- opcode, payload width, and
//!   expected response size for every operation the device understands.
//! - **Typed models** ([`models`]) -- working mode, fan and RGB settings,
//!   power-outage parameters, scheduled events, and firmware versions as
//!   real types with their wire encodings.
//! - **ProtocolEngine** ([`engine`]) -- the write/delay/read exchange with
//!   retry and backoff over any [`Bus`](pmulib_core::Bus).
//! - **Firmware transfer** ([`firmware`]) -- chunked, device-paced image
//!   staging with progress reporting.
//! - **PowerDevice** ([`device`]) and **PowerDeviceBuilder** ([`builder`])
//!   -- one typed method per device operation, and the fluent builder
//!   that constructs the client over a real or mock bus.
//!
//! # Example
//!
//! ```
//! use pmulib_protocol::commands::CommandSet;
//! use pmulib_protocol::frame::{decode_response, encode_request, encode_response};
//!
//! let set = CommandSet::new();
//!
//! // Build a "read battery level" request.
//! let request = encode_request(set.battery_level.opcode, &[]).unwrap();
//! assert_eq!(request[0], 0xCD);
//!
//! // Decode the reply a device would send back.
//! let raw = encode_response(set.battery_level.opcode, &87u32.to_be_bytes());
//! let frame = decode_response(&raw, set.battery_level.response_size).unwrap();
//! assert_eq!(frame.payload, 87u32.to_be_bytes());
//! ```

pub mod builder;
pub mod commands;
pub mod device;
pub mod engine;
pub mod firmware;
pub mod frame;
pub mod models;

pub use builder::PowerDeviceBuilder;
pub use device::PowerDevice;
