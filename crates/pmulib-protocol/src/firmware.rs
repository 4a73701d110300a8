//! Chunked firmware transfer to the device.
//!
//! A firmware image travels as fixed-size chunks inside ordinary request
//! frames, but the cursor belongs to the device: every chunk reply names
//! the chunk id the device wants next. Re-requesting the in-flight chunk
//! means "send it again", requesting the following id advances the
//! stream, and the [`CHUNK_COMPLETE`] sentinel ends it. Anything else is
//! a corrupt conversation and aborts the update.
//!
//! A session runs strictly in order: erase the staging storage, optionally
//! drop the device into its bootloader, stream chunks, then reset the
//! device so it flashes the staged image. Nothing else may talk to the
//! device while a session is live — the session holds `&mut` on the
//! engine, so the borrow checker enforces that.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use pmulib_core::{AbortReason, Error, Result};

use crate::commands::CommandSet;
use crate::engine::ProtocolEngine;
use crate::frame::{encode_chunk_request, ChunkAck};

/// Image bytes carried per chunk frame.
pub const CHUNK_SIZE: usize = 20;

/// Wait between writing a chunk and reading the device's cursor reply.
pub const CHUNK_RESPONSE_DELAY: Duration = Duration::from_millis(25);

/// Wait for the storage-erase acknowledgement. Erasing flash is the
/// slowest thing the device does.
pub const ERASE_RESPONSE_DELAY: Duration = Duration::from_millis(500);

/// Settle time after requesting the bootloader, before the first chunk.
pub const BOOT_SETTLE_DELAY: Duration = Duration::from_millis(800);

/// How the device receives the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UpdateMethod {
    /// Reset into the bootloader first and stream to it (default).
    #[default]
    BootMode,
    /// Stream to the running application, which stages the image.
    FirmwareMode,
}

/// Where a session currently stands.
///
/// Observable between [`UpdateSession::next_progress`] calls; the erase
/// and boot phases complete within a single call, so from the outside a
/// healthy session moves `Idle` to `Streaming` to `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    /// Nothing sent yet.
    Idle,
    /// Waiting for the storage-erase acknowledgement.
    Erasing,
    /// Bootloader requested, settle wait in progress.
    BootRequested,
    /// Chunks in flight.
    Streaming,
    /// All chunks accepted, device reset pending.
    Finalizing,
    /// Update finished and the device is rebooting into the new image.
    Done,
    /// Update failed; the reason is carried in the state.
    Aborted(AbortReason),
}

impl std::fmt::Display for UpdateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UpdateState::Idle => "idle",
            UpdateState::Erasing => "erasing",
            UpdateState::BootRequested => "boot-requested",
            UpdateState::Streaming => "streaming",
            UpdateState::Finalizing => "finalizing",
            UpdateState::Done => "done",
            UpdateState::Aborted(_) => "aborted",
        };
        write!(f, "{s}")
    }
}

/// A live firmware transfer.
///
/// Drive it by polling [`next_progress`](Self::next_progress), which runs
/// the protocol until the next whole-percent progress step and returns it,
/// or `None` once the device has been reset into the new image.
pub struct UpdateSession<'a> {
    engine: &'a mut ProtocolEngine,
    commands: &'a CommandSet,
    image: &'a [u8],
    method: UpdateMethod,
    state: UpdateState,
    /// 1-based id of the chunk currently being offered.
    current: u16,
    /// Chunks the device has acknowledged past.
    confirmed: u16,
    chunk_count: u16,
    last_emitted: Option<u8>,
}

impl<'a> UpdateSession<'a> {
    pub(crate) fn new(
        engine: &'a mut ProtocolEngine,
        commands: &'a CommandSet,
        image: &'a [u8],
        method: UpdateMethod,
    ) -> Result<Self> {
        if image.is_empty() {
            return Err(Error::InvalidParameter(
                "firmware image is empty".to_string(),
            ));
        }
        let count = image.len().div_ceil(CHUNK_SIZE);
        // Chunk ids are u16 with 0xFFFF reserved as the completion sentinel.
        let chunk_count = u16::try_from(count)
            .ok()
            .filter(|c| *c < u16::MAX)
            .ok_or_else(|| {
                Error::InvalidParameter(format!("firmware image too large: {count} chunks"))
            })?;

        Ok(UpdateSession {
            engine,
            commands,
            image,
            method,
            state: UpdateState::Idle,
            current: 1,
            confirmed: 0,
            chunk_count,
            last_emitted: None,
        })
    }

    /// Current session state.
    pub fn state(&self) -> UpdateState {
        self.state
    }

    /// Total number of chunks in this image.
    pub fn chunk_count(&self) -> u16 {
        self.chunk_count
    }

    /// Percentage of chunks the device has confirmed, 100 once done.
    pub fn progress(&self) -> u8 {
        if matches!(self.state, UpdateState::Done) {
            return 100;
        }
        (u32::from(self.confirmed) * 100 / u32::from(self.chunk_count)) as u8
    }

    /// Run the transfer until the next progress step.
    ///
    /// Returns `Some(percent)` each time the device's acknowledgements
    /// cross a whole-percent boundary, and `None` once the update is done.
    /// A failed session returns [`Error::UpdateAborted`], and keeps
    /// returning it on further calls.
    pub async fn next_progress(&mut self) -> Result<Option<u8>> {
        loop {
            match self.state {
                UpdateState::Idle => self.begin().await?,
                UpdateState::Streaming => {
                    if let Some(pct) = self.exchange_chunk().await? {
                        return Ok(Some(pct));
                    }
                }
                UpdateState::Finalizing => {
                    info!("image staged, resetting device");
                    // The device drops off the bus as it resets, which can
                    // fail this write on the host side even when the reset
                    // took effect.
                    if let Err(e) = self.engine.send_only(&self.commands.reset_mcu, &[]).await {
                        debug!(error = %e, "reset write failed");
                    }
                    self.state = UpdateState::Done;
                    if self.last_emitted != Some(100) {
                        self.last_emitted = Some(100);
                        return Ok(Some(100));
                    }
                }
                UpdateState::Done => return Ok(None),
                UpdateState::Aborted(reason) => return Err(Error::UpdateAborted(reason)),
                // Erase and boot phases never yield control mid-way.
                UpdateState::Erasing | UpdateState::BootRequested => {
                    return Err(Error::Protocol(format!(
                        "update session polled in transient state {}",
                        self.state
                    )));
                }
            }
        }
    }

    /// Erase staging storage and, in boot mode, drop into the bootloader.
    async fn begin(&mut self) -> Result<()> {
        info!(
            bytes = self.image.len(),
            chunks = self.chunk_count,
            method = ?self.method,
            "starting firmware update"
        );
        self.state = UpdateState::Erasing;

        let response = match self
            .engine
            .execute_with_delay(&self.commands.clear_program_storage, &[], ERASE_RESPONSE_DELAY)
            .await
        {
            Ok(response) => response,
            Err(Error::Unavailable) => return self.abort(AbortReason::StorageClearFailed),
            Err(e) => return Err(e),
        };
        if response.status() != Some(1) {
            return self.abort(AbortReason::StorageClearFailed);
        }

        if self.method == UpdateMethod::BootMode {
            self.state = UpdateState::BootRequested;
            debug!(state = %self.state, "requesting bootloader");
            // Same story as the final reset: the write may fail on the
            // host side because the device is already rebooting.
            if let Err(e) = self
                .engine
                .send_only(&self.commands.reset_for_boot_update, &[])
                .await
            {
                debug!(error = %e, "bootloader request write failed");
            }
            sleep(BOOT_SETTLE_DELAY).await;
        }

        self.state = UpdateState::Streaming;
        Ok(())
    }

    /// Offer the current chunk and act on the device's cursor reply.
    ///
    /// Returns the progress step to emit, if this reply advanced across a
    /// whole-percent boundary.
    async fn exchange_chunk(&mut self) -> Result<Option<u8>> {
        let data = self.chunk_data(self.current);
        let frame = encode_chunk_request(
            self.commands.firmware_chunk.opcode,
            self.chunk_count,
            self.current,
            data,
        );

        let response = match self
            .engine
            .execute_frame(
                &frame,
                self.commands.firmware_chunk.response_size,
                CHUNK_RESPONSE_DELAY,
            )
            .await
        {
            Ok(response) => response,
            Err(Error::Unavailable) => {
                return self.abort(AbortReason::ChunkExchangeFailed {
                    chunk: self.current,
                })
            }
            Err(e) => return Err(e),
        };

        match ChunkAck::decode(&response.payload)? {
            ChunkAck::Complete => {
                debug!(chunk = self.current, "device reported transfer complete");
                self.state = UpdateState::Finalizing;
                Ok(None)
            }
            ChunkAck::Continue(next) if next == self.current => {
                debug!(chunk = self.current, "device requested resend");
                Ok(None)
            }
            ChunkAck::Continue(next)
                if next == self.current + 1 && self.current < self.chunk_count =>
            {
                self.confirmed = self.current;
                self.current = next;
                Ok(self.emit_progress())
            }
            ChunkAck::Continue(next) => self.abort(AbortReason::UnexpectedChunkRequest {
                requested: next,
                current: self.current,
            }),
        }
    }

    /// Image bytes for a 1-based chunk id. The final chunk may be short.
    fn chunk_data(&self, id: u16) -> &'a [u8] {
        let start = (usize::from(id) - 1) * CHUNK_SIZE;
        let end = (start + CHUNK_SIZE).min(self.image.len());
        &self.image[start..end]
    }

    fn emit_progress(&mut self) -> Option<u8> {
        let pct = (u32::from(self.confirmed) * 100 / u32::from(self.chunk_count)) as u8;
        if self.last_emitted == Some(pct) {
            None
        } else {
            self.last_emitted = Some(pct);
            Some(pct)
        }
    }

    fn abort<T>(&mut self, reason: AbortReason) -> Result<T> {
        warn!(%reason, "firmware update aborted");
        self.state = UpdateState::Aborted(reason);
        Err(Error::UpdateAborted(reason))
    }
}

impl std::fmt::Debug for UpdateSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateSession")
            .field("state", &self.state)
            .field("current", &self.current)
            .field("chunk_count", &self.chunk_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{OP_FIRMWARE_CHUNK, OP_RESET_FOR_BOOT_UPDATE, OP_RESET_MCU};
    use crate::engine::DEFAULT_RESPONSE_DELAY;
    use crate::frame::{encode_request, encode_response, HEADER_SIZE};
    use pmulib_test_harness::MockBus;

    fn engine_for(mock: &MockBus) -> ProtocolEngine {
        ProtocolEngine::new(Box::new(mock.clone()), DEFAULT_RESPONSE_DELAY)
    }

    fn erase_ok(set: &CommandSet) -> Vec<u8> {
        encode_response(set.clear_program_storage.opcode, &[1])
    }

    fn cursor_reply(next: u16) -> Vec<u8> {
        encode_response(OP_FIRMWARE_CHUNK, &next.to_be_bytes())
    }

    fn complete_reply() -> Vec<u8> {
        cursor_reply(0xFFFF)
    }

    /// Pump a session to the end, collecting every emitted step.
    async fn drain(session: &mut UpdateSession<'_>) -> Result<Vec<u8>> {
        let mut steps = Vec::new();
        while let Some(pct) = session.next_progress().await? {
            steps.push(pct);
        }
        Ok(steps)
    }

    // ---------------------------------------------------------------
    // Construction and chunk math
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn chunk_count_boundaries() {
        let set = CommandSet::new();
        let mock = MockBus::new();
        let mut engine = engine_for(&mock);

        for (len, expected) in [(1, 1), (19, 1), (20, 1), (21, 2), (40, 2), (41, 3), (80, 4)] {
            let image = vec![0xA5u8; len];
            let session =
                UpdateSession::new(&mut engine, &set, &image, UpdateMethod::FirmwareMode).unwrap();
            assert_eq!(session.chunk_count(), expected, "image of {len} bytes");
            assert_eq!(session.state(), UpdateState::Idle);
        }
    }

    #[tokio::test]
    async fn empty_image_is_rejected() {
        let set = CommandSet::new();
        let mock = MockBus::new();
        let mut engine = engine_for(&mock);

        let err =
            UpdateSession::new(&mut engine, &set, &[], UpdateMethod::BootMode).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert_eq!(mock.write_calls(), 0);
    }

    #[tokio::test]
    async fn oversize_image_is_rejected() {
        let set = CommandSet::new();
        let mock = MockBus::new();
        let mut engine = engine_for(&mock);

        // 0xFFFF chunks would collide with the completion sentinel.
        let image = vec![0u8; CHUNK_SIZE * 0xFFFF];
        let err =
            UpdateSession::new(&mut engine, &set, &image, UpdateMethod::BootMode).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    // ---------------------------------------------------------------
    // Happy paths
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn four_chunks_emit_quarter_steps() {
        let set = CommandSet::new();
        let mock = MockBus::new();
        mock.expect_reply(erase_ok(&set));
        mock.expect_reply(cursor_reply(2));
        mock.expect_reply(cursor_reply(3));
        mock.expect_reply(cursor_reply(4));
        mock.expect_reply(complete_reply());

        let image: Vec<u8> = (0..80).collect();
        let mut engine = engine_for(&mock);
        let mut session =
            UpdateSession::new(&mut engine, &set, &image, UpdateMethod::FirmwareMode).unwrap();

        assert_eq!(session.next_progress().await.unwrap(), Some(25));
        assert_eq!(session.progress(), 25);
        assert_eq!(session.state(), UpdateState::Streaming);

        assert_eq!(drain(&mut session).await.unwrap(), vec![50, 75, 100]);
        assert_eq!(session.state(), UpdateState::Done);
        assert_eq!(session.progress(), 100);

        // Erase, four chunks, final reset.
        assert_eq!(mock.write_calls(), 6);
        let frames = mock.sent_frames();
        assert_eq!(frames[5], encode_request(OP_RESET_MCU, &[]).unwrap());
    }

    #[tokio::test]
    async fn chunk_frames_carry_count_id_and_data() {
        let set = CommandSet::new();
        let mock = MockBus::new();
        mock.expect_reply(erase_ok(&set));
        mock.expect_reply(cursor_reply(2));
        mock.expect_reply(cursor_reply(3));
        mock.expect_reply(complete_reply());

        // 41 bytes: two full chunks and a final single-byte chunk.
        let image: Vec<u8> = (0..41).collect();
        let mut engine = engine_for(&mock);
        let mut session =
            UpdateSession::new(&mut engine, &set, &image, UpdateMethod::FirmwareMode).unwrap();
        drain(&mut session).await.unwrap();

        let frames = mock.sent_frames();
        let first = &frames[1][HEADER_SIZE..];
        assert_eq!(&first[0..2], &[0x00, 0x03]);
        assert_eq!(&first[2..4], &[0x00, 0x01]);
        assert_eq!(first[4], 20);
        assert_eq!(&first[5..25], &image[0..20]);

        // The final chunk declares its true byte count.
        let last = &frames[3][HEADER_SIZE..];
        assert_eq!(&last[2..4], &[0x00, 0x03]);
        assert_eq!(last[4], 1);
        assert_eq!(last[5], image[40]);
    }

    #[tokio::test]
    async fn exact_multiple_final_chunk_declares_full_size() {
        let set = CommandSet::new();
        let mock = MockBus::new();
        mock.expect_reply(erase_ok(&set));
        mock.expect_reply(cursor_reply(2));
        mock.expect_reply(complete_reply());

        let image = vec![0x5Au8; 40];
        let mut engine = engine_for(&mock);
        let mut session =
            UpdateSession::new(&mut engine, &set, &image, UpdateMethod::FirmwareMode).unwrap();
        drain(&mut session).await.unwrap();

        let last = &mock.sent_frames()[2][HEADER_SIZE..];
        assert_eq!(&last[2..4], &[0x00, 0x02]);
        assert_eq!(last[4], 20);
    }

    #[tokio::test]
    async fn single_chunk_image_emits_only_completion() {
        let set = CommandSet::new();
        let mock = MockBus::new();
        mock.expect_reply(erase_ok(&set));
        mock.expect_reply(complete_reply());

        let image = [0xEEu8; 7];
        let mut engine = engine_for(&mock);
        let mut session =
            UpdateSession::new(&mut engine, &set, &image, UpdateMethod::FirmwareMode).unwrap();

        assert_eq!(drain(&mut session).await.unwrap(), vec![100]);
        assert_eq!(session.state(), UpdateState::Done);
    }

    // ---------------------------------------------------------------
    // Device-driven cursor
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn resend_requests_never_advance_or_emit() {
        let set = CommandSet::new();
        let mock = MockBus::new();
        mock.expect_reply(erase_ok(&set));
        mock.expect_reply(cursor_reply(1));
        mock.expect_reply(cursor_reply(2));
        mock.expect_reply(cursor_reply(2));
        mock.expect_reply(complete_reply());

        let image = vec![0xC3u8; 40];
        let mut engine = engine_for(&mock);
        let mut session =
            UpdateSession::new(&mut engine, &set, &image, UpdateMethod::FirmwareMode).unwrap();

        assert_eq!(drain(&mut session).await.unwrap(), vec![50, 100]);

        // Chunk 1 went out twice, then chunk 2 twice, byte-identical.
        let frames = mock.sent_frames();
        assert_eq!(frames.len(), 6);
        assert_eq!(frames[1], frames[2]);
        assert_eq!(frames[3], frames[4]);
        assert_ne!(frames[1], frames[3]);
    }

    #[tokio::test]
    async fn repeated_resends_emit_nothing_until_complete() {
        let set = CommandSet::new();
        let mock = MockBus::new();
        mock.expect_reply(erase_ok(&set));
        for _ in 0..5 {
            mock.expect_reply(cursor_reply(1));
        }
        mock.expect_reply(complete_reply());

        let image = vec![0x11u8; 30];
        let mut engine = engine_for(&mock);
        let mut session =
            UpdateSession::new(&mut engine, &set, &image, UpdateMethod::FirmwareMode).unwrap();

        assert_eq!(drain(&mut session).await.unwrap(), vec![100]);
    }

    #[tokio::test]
    async fn completion_mid_transfer_is_honored() {
        let set = CommandSet::new();
        let mock = MockBus::new();
        mock.expect_reply(erase_ok(&set));
        mock.expect_reply(complete_reply());

        // Four chunks' worth, but the device bails out after the first.
        let image = vec![0x77u8; 80];
        let mut engine = engine_for(&mock);
        let mut session =
            UpdateSession::new(&mut engine, &set, &image, UpdateMethod::FirmwareMode).unwrap();

        assert_eq!(drain(&mut session).await.unwrap(), vec![100]);
        assert_eq!(session.state(), UpdateState::Done);
        // Erase, one chunk, reset.
        assert_eq!(mock.write_calls(), 3);
    }

    // ---------------------------------------------------------------
    // Aborts
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn unexpected_cursor_aborts() {
        let set = CommandSet::new();
        let mock = MockBus::new();
        mock.expect_reply(erase_ok(&set));
        mock.expect_reply(cursor_reply(3));

        let image = vec![0u8; 80];
        let mut engine = engine_for(&mock);
        let mut session =
            UpdateSession::new(&mut engine, &set, &image, UpdateMethod::FirmwareMode).unwrap();

        let err = session.next_progress().await.unwrap_err();
        assert!(matches!(
            err,
            Error::UpdateAborted(AbortReason::UnexpectedChunkRequest {
                requested: 3,
                current: 1
            })
        ));
        assert_eq!(
            session.state(),
            UpdateState::Aborted(AbortReason::UnexpectedChunkRequest {
                requested: 3,
                current: 1
            })
        );

        // The abort is sticky.
        let again = session.next_progress().await.unwrap_err();
        assert!(matches!(again, Error::UpdateAborted(_)));
    }

    #[tokio::test]
    async fn advance_past_final_chunk_aborts() {
        let set = CommandSet::new();
        let mock = MockBus::new();
        mock.expect_reply(erase_ok(&set));
        // Only one chunk exists; requesting chunk 2 is nonsense.
        mock.expect_reply(cursor_reply(2));

        let image = vec![0u8; 10];
        let mut engine = engine_for(&mock);
        let mut session =
            UpdateSession::new(&mut engine, &set, &image, UpdateMethod::FirmwareMode).unwrap();

        let err = session.next_progress().await.unwrap_err();
        assert!(matches!(
            err,
            Error::UpdateAborted(AbortReason::UnexpectedChunkRequest {
                requested: 2,
                current: 1
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn chunk_exchange_exhaustion_aborts() {
        let set = CommandSet::new();
        let mock = MockBus::new();
        mock.expect_reply(erase_ok(&set));
        // Nothing scripted for the chunk: ten silent attempts.

        let image = vec![0u8; 10];
        let mut engine = engine_for(&mock);
        let mut session =
            UpdateSession::new(&mut engine, &set, &image, UpdateMethod::FirmwareMode).unwrap();

        let err = session.next_progress().await.unwrap_err();
        assert!(matches!(
            err,
            Error::UpdateAborted(AbortReason::ChunkExchangeFailed { chunk: 1 })
        ));
        assert_eq!(mock.write_calls(), 1 + 10);
    }

    #[tokio::test]
    async fn erase_rejection_aborts_before_streaming() {
        let set = CommandSet::new();
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set.clear_program_storage.opcode, &[2]));

        let image = vec![0u8; 10];
        let mut engine = engine_for(&mock);
        let mut session =
            UpdateSession::new(&mut engine, &set, &image, UpdateMethod::BootMode).unwrap();

        let err = session.next_progress().await.unwrap_err();
        assert!(matches!(
            err,
            Error::UpdateAborted(AbortReason::StorageClearFailed)
        ));
        // No bootloader request, no chunks.
        assert_eq!(mock.write_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn erase_silence_aborts() {
        let set = CommandSet::new();
        let mock = MockBus::new();

        let image = vec![0u8; 10];
        let mut engine = engine_for(&mock);
        let mut session =
            UpdateSession::new(&mut engine, &set, &image, UpdateMethod::FirmwareMode).unwrap();

        let err = session.next_progress().await.unwrap_err();
        assert!(matches!(
            err,
            Error::UpdateAborted(AbortReason::StorageClearFailed)
        ));
        assert_eq!(mock.write_calls(), 10);
    }

    // ---------------------------------------------------------------
    // Boot method
    // ---------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn boot_mode_requests_bootloader_and_settles() {
        let set = CommandSet::new();
        let mock = MockBus::new();
        mock.expect_reply(erase_ok(&set));
        // The bootloader request is fire-and-forget but still consumes a
        // scripted outcome for its write.
        mock.expect_silence();
        mock.expect_reply(complete_reply());

        let image = vec![0u8; 10];
        let mut engine = engine_for(&mock);
        let mut session =
            UpdateSession::new(&mut engine, &set, &image, UpdateMethod::BootMode).unwrap();

        let start = tokio::time::Instant::now();
        assert_eq!(drain(&mut session).await.unwrap(), vec![100]);

        // Erase delay, bootloader settle, one chunk delay.
        assert_eq!(
            start.elapsed(),
            ERASE_RESPONSE_DELAY + BOOT_SETTLE_DELAY + CHUNK_RESPONSE_DELAY
        );
        let frames = mock.sent_frames();
        assert_eq!(frames[1], encode_request(OP_RESET_FOR_BOOT_UPDATE, &[]).unwrap());
    }

    #[tokio::test]
    async fn firmware_mode_skips_bootloader_request() {
        let set = CommandSet::new();
        let mock = MockBus::new();
        mock.expect_reply(erase_ok(&set));
        mock.expect_reply(complete_reply());

        let image = vec![0u8; 10];
        let mut engine = engine_for(&mock);
        let mut session =
            UpdateSession::new(&mut engine, &set, &image, UpdateMethod::FirmwareMode).unwrap();
        drain(&mut session).await.unwrap();

        let boot_frame = encode_request(OP_RESET_FOR_BOOT_UPDATE, &[]).unwrap();
        assert!(mock.sent_frames().iter().all(|f| *f != boot_frame));
    }

    // ---------------------------------------------------------------
    // Bus handoff
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn session_releases_engine_when_dropped() {
        let set = CommandSet::new();
        let mock = MockBus::new();
        mock.expect_reply(erase_ok(&set));
        mock.expect_reply(complete_reply());

        let image = vec![0u8; 10];
        let mut engine = engine_for(&mock);
        {
            let mut session =
                UpdateSession::new(&mut engine, &set, &image, UpdateMethod::FirmwareMode)
                    .unwrap();
            drain(&mut session).await.unwrap();
        }

        // Engine usable again after the session ends.
        assert!(engine.is_connected());
        mock.expect_reply(encode_response(set.get_lpm_status.opcode, &[1]));
        let response = engine.execute(&set.get_lpm_status, &[]).await.unwrap();
        assert_eq!(response.status(), Some(1));
    }
}
