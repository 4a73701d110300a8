//! Error types for pmulib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport faults, protocol violations,
//! retry exhaustion, and firmware-session aborts are all captured here so
//! callers can tell them apart by variant rather than by convention.

/// Reason a firmware update session aborted.
///
/// Carried by [`Error::UpdateAborted`]. An abort means the device's program
/// storage may be partially written; the only recovery is to run the whole
/// update again from the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AbortReason {
    /// The device refused or failed to erase its program storage.
    #[error("program storage clear failed")]
    StorageClearFailed,

    /// A chunk exchange produced no valid reply after all retries.
    #[error("no valid reply for chunk {chunk}")]
    ChunkExchangeFailed {
        /// 1-based id of the chunk that was in flight.
        chunk: u16,
    },

    /// The device requested a chunk id the session cannot interpret.
    ///
    /// Valid requests are the in-flight chunk (resend), the next chunk
    /// (advance), or the completion sentinel.
    #[error("device requested chunk {requested} while sending chunk {current}")]
    UnexpectedChunkRequest {
        /// Chunk id the device asked for.
        requested: u16,
        /// 1-based id of the chunk that was in flight.
        current: u16,
    },
}

/// The error type for all pmulib operations.
///
/// Variants cover the failure modes of talking to a power-management MCU
/// over a raw byte bus: transport faults, malformed frames, a device that
/// stops answering, and interrupted firmware flashing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A bus-level error (I2C ioctl failure, NAK, lost adapter).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (malformed frame, unexpected field value).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The device produced no valid response after all retry attempts.
    ///
    /// This is the ordinary degraded outcome for telemetry and
    /// configuration commands: the device is busy, mid-reset, or absent.
    /// It is never raised part-way through an operation — only after the
    /// full retry budget is spent.
    #[error("device unavailable: no valid response after retries")]
    Unavailable,

    /// The device answered a set command with a rejection status.
    #[error("command rejected by device (status {0})")]
    CommandRejected(u8),

    /// A request payload did not match the command's declared width.
    #[error("invalid payload length: expected {expected} bytes, got {got}")]
    InvalidPayloadLength {
        /// Width declared by the command descriptor.
        expected: usize,
        /// Width the caller supplied.
        got: usize,
    },

    /// An invalid parameter was passed to a device operation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A firmware update session aborted.
    ///
    /// Distinct from [`Error::Unavailable`]: the device's program storage
    /// may be partially written and the update must be rerun from scratch.
    #[error("firmware update aborted: {0}")]
    UpdateAborted(#[from] AbortReason),

    /// No connection to the device has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the device was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` for the ordinary "device did not answer" outcome.
    ///
    /// Callers polling telemetry typically log this and carry on; every
    /// other variant signals a bug or a fault worth escalating.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::Unavailable)
    }

    /// Returns `true` if this error is a firmware-session abort.
    pub fn is_update_abort(&self) -> bool {
        matches!(self, Error::UpdateAborted(_))
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("i2c write failed".into());
        assert_eq!(e.to_string(), "transport error: i2c write failed");
    }

    #[test]
    fn error_display_protocol() {
        let e = Error::Protocol("bad start marker".into());
        assert_eq!(e.to_string(), "protocol error: bad start marker");
    }

    #[test]
    fn error_display_unavailable() {
        let e = Error::Unavailable;
        assert_eq!(
            e.to_string(),
            "device unavailable: no valid response after retries"
        );
    }

    #[test]
    fn error_display_command_rejected() {
        let e = Error::CommandRejected(2);
        assert_eq!(e.to_string(), "command rejected by device (status 2)");
    }

    #[test]
    fn error_display_invalid_payload_length() {
        let e = Error::InvalidPayloadLength {
            expected: 4,
            got: 2,
        };
        assert_eq!(
            e.to_string(),
            "invalid payload length: expected 4 bytes, got 2"
        );
    }

    #[test]
    fn error_display_abort_reasons() {
        let e = Error::UpdateAborted(AbortReason::StorageClearFailed);
        assert_eq!(
            e.to_string(),
            "firmware update aborted: program storage clear failed"
        );

        let e = Error::UpdateAborted(AbortReason::ChunkExchangeFailed { chunk: 7 });
        assert_eq!(
            e.to_string(),
            "firmware update aborted: no valid reply for chunk 7"
        );

        let e = Error::UpdateAborted(AbortReason::UnexpectedChunkRequest {
            requested: 99,
            current: 3,
        });
        assert_eq!(
            e.to_string(),
            "firmware update aborted: device requested chunk 99 while sending chunk 3"
        );
    }

    #[test]
    fn abort_reason_converts_into_error() {
        let e: Error = AbortReason::StorageClearFailed.into();
        assert!(e.is_update_abort());
        assert!(!e.is_unavailable());
    }

    #[test]
    fn unavailable_predicate() {
        assert!(Error::Unavailable.is_unavailable());
        assert!(!Error::NotConnected.is_unavailable());
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        // io::Error is Send + Sync, so our Error should be too.
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }

    #[test]
    fn result_alias_works() {
        let ok: Result<u32> = Ok(42);
        match ok {
            Ok(val) => assert_eq!(val, 42),
            Err(_) => panic!("expected Ok"),
        }

        let err: Result<u32> = Err(Error::Unavailable);
        assert!(err.is_err());
    }
}
