//! Request/response execution against the device bus.
//!
//! The bus is half duplex and the device needs time to prepare its reply,
//! so every exchange is: write the request frame, sleep the response
//! delay, then read back exactly the declared response length. The device
//! never signals errors in-band; the only failure signal is an invalid or
//! missing response, and the engine's answer to that is to retry.
//!
//! All waiting happens inline on the caller's task. There is no background
//! I/O task and no timer driven by the transport; the `&mut self` receivers
//! are what serializes access to the bus.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use pmulib_core::{Bus, Error, Result};

use crate::commands::Command;
use crate::frame::{decode_response, encode_request, ResponseFrame};

/// Attempts per exchange before the device is declared unavailable.
pub const MAX_ATTEMPTS: u32 = 10;

/// Pause after every failed attempt.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Default wait between writing a request and reading the reply.
pub const DEFAULT_RESPONSE_DELAY: Duration = Duration::from_millis(10);

/// Executes framed exchanges over a [`Bus`] with the device's retry
/// discipline.
///
/// Owns the bus exclusively. Exchanges run one at a time; a second caller
/// needs `&mut` access and therefore waits for the first.
pub struct ProtocolEngine {
    bus: Box<dyn Bus>,
    response_delay: Duration,
}

impl ProtocolEngine {
    /// Wrap a bus with the given default response delay.
    pub fn new(bus: Box<dyn Bus>, response_delay: Duration) -> Self {
        ProtocolEngine {
            bus,
            response_delay,
        }
    }

    /// The default response delay used by [`execute`](Self::execute).
    pub fn response_delay(&self) -> Duration {
        self.response_delay
    }

    /// Whether the underlying bus is open.
    pub fn is_connected(&self) -> bool {
        self.bus.is_connected()
    }

    /// Close the underlying bus.
    pub async fn close(&mut self) -> Result<()> {
        self.bus.close().await
    }

    /// Tear down the engine and recover the bus.
    pub fn into_bus(self) -> Box<dyn Bus> {
        self.bus
    }

    /// Run one command exchange with the default response delay.
    pub async fn execute(&mut self, cmd: &Command, payload: &[u8]) -> Result<ResponseFrame> {
        self.execute_with_delay(cmd, payload, self.response_delay)
            .await
    }

    /// Run one command exchange, waiting `delay` before each read.
    ///
    /// Slow operations (storage erase, scheduled-event writes) declare
    /// longer delays than the telemetry default.
    pub async fn execute_with_delay(
        &mut self,
        cmd: &Command,
        payload: &[u8],
        delay: Duration,
    ) -> Result<ResponseFrame> {
        if payload.len() != cmd.payload_len {
            return Err(Error::InvalidPayloadLength {
                expected: cmd.payload_len,
                got: payload.len(),
            });
        }
        if cmd.response_size == 0 {
            return Err(Error::InvalidParameter(format!(
                "opcode 0x{:02X} is fire-and-forget",
                cmd.opcode
            )));
        }
        let frame = encode_request(cmd.opcode, payload)?;
        self.execute_frame(&frame, cmd.response_size, delay).await
    }

    /// Run the retry loop for an already-encoded request frame.
    ///
    /// Each attempt writes the frame, sleeps `delay`, reads up to
    /// `response_size` bytes and validates them. Transport faults count as
    /// failed attempts, not errors; after [`MAX_ATTEMPTS`] failures the
    /// device is reported as [`Error::Unavailable`].
    pub async fn execute_frame(
        &mut self,
        frame: &[u8],
        response_size: usize,
        delay: Duration,
    ) -> Result<ResponseFrame> {
        let opcode = frame.get(1).copied().unwrap_or(0);

        for attempt in 1..=MAX_ATTEMPTS {
            if let Some(response) = self.attempt_exchange(frame, response_size, delay).await {
                if attempt > 1 {
                    debug!(opcode, attempt, "exchange recovered after retry");
                }
                return Ok(response);
            }
            debug!(opcode, attempt, "no valid response");
            sleep(RETRY_BACKOFF).await;
        }

        warn!(opcode, "device unavailable after {MAX_ATTEMPTS} attempts");
        Err(Error::Unavailable)
    }

    /// Write a command without waiting for any reply.
    ///
    /// Reset-class commands reboot the device instead of answering, so
    /// there is nothing to read and nothing to retry. Transport faults do
    /// propagate here; with no reply to validate they are the only failure
    /// signal left.
    pub async fn send_only(&mut self, cmd: &Command, payload: &[u8]) -> Result<()> {
        if payload.len() != cmd.payload_len {
            return Err(Error::InvalidPayloadLength {
                expected: cmd.payload_len,
                got: payload.len(),
            });
        }
        let frame = encode_request(cmd.opcode, payload)?;
        debug!(opcode = cmd.opcode, "fire-and-forget send");
        self.bus.write(&frame).await
    }

    /// One write/sleep/read cycle. `None` covers every soft failure:
    /// write fault, read fault, short read, or an invalid frame.
    async fn attempt_exchange(
        &mut self,
        frame: &[u8],
        response_size: usize,
        delay: Duration,
    ) -> Option<ResponseFrame> {
        if let Err(e) = self.bus.write(frame).await {
            debug!(error = %e, "bus write failed");
            return None;
        }

        sleep(delay).await;

        let mut buf = vec![0u8; response_size];
        match self.bus.read(&mut buf).await {
            Ok(n) => decode_response(&buf[..n], response_size),
            Err(e) => {
                debug!(error = %e, "bus read failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for ProtocolEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("response_delay", &self.response_delay)
            .field("connected", &self.is_connected())
            .finish()
    }
}
