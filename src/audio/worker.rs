//! Background decoding on a dedicated OS thread.
//!
//! Uses std::thread (NOT tokio tasks): opening and decoding block on file
//! and blocking-HTTP reads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use super::stream_decoder::{AudioFormat, DecodeStatus, PcmBlock};
use crate::config::DecoderOptions;
use crate::handle::StreamHandle;

/// Progress reported by a [`DecodeWorker`].
#[derive(Debug)]
pub enum WorkerEvent {
    /// The stream was opened; carries its output format.
    Opened(AudioFormat),
    /// One decoded block, copied out of the handle.
    Block(PcmBlock),
    /// The stream was drained.
    EndOfStream,
    /// Opening or decoding failed. No further events follow.
    Failed(String),
}

/// Drains one stream in a background thread.
///
/// - Decode thread: open locator → decode_next → `WorkerEvent` → `tx`
pub struct DecodeWorker {
    running: Arc<AtomicBool>,
    decode_handle: Option<JoinHandle<()>>,
}

impl DecodeWorker {
    /// Start decoding.
    ///
    /// * `locator` - URL or path of the stream
    /// * `options` - Options used to open the stream
    /// * `tx`      - Sender for decode progress
    pub fn start(
        locator: String,
        options: DecoderOptions,
        tx: mpsc::Sender<WorkerEvent>,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));

        log::info!("DecodeWorker starting: {}", locator);

        let decode_handle = {
            let running = running.clone();
            thread::Builder::new()
                .name("ffsd-decode".into())
                .spawn(move || {
                    if let Err(e) = decode_thread(&locator, &options, &tx, &running) {
                        log::error!("Decode thread error: {:#}", e);
                        let _ = tx.blocking_send(WorkerEvent::Failed(format!("{:#}", e)));
                    }
                })
                .context("failed to spawn decode thread")?
        };

        Ok(Self {
            running,
            decode_handle: Some(decode_handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.decode_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the thread to stop and wait for it to finish.
    ///
    /// Drop the event receiver first if it is no longer drained, otherwise a
    /// thread blocked on a full channel never sees the stop flag.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(h) = self.decode_handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

// ======================== Decode thread ========================

fn decode_thread(
    locator: &str,
    options: &DecoderOptions,
    tx: &mpsc::Sender<WorkerEvent>,
    running: &AtomicBool,
) -> Result<()> {
    let mut handle = StreamHandle::open_with(locator, options)
        .with_context(|| format!("failed to open {}", locator))?;

    if tx.blocking_send(WorkerEvent::Opened(handle.format())).is_err() {
        log::warn!("Event receiver dropped before decoding started");
        return Ok(());
    }

    while running.load(Ordering::Relaxed) {
        let event = match handle.decode_next().context("decoding failed")? {
            DecodeStatus::Block(block) => WorkerEvent::Block(block.to_owned_block()),
            DecodeStatus::EndOfStream => {
                let _ = tx.blocking_send(WorkerEvent::EndOfStream);
                break;
            }
        };
        if tx.blocking_send(event).is_err() {
            log::warn!("Event receiver dropped, stopping decode");
            break;
        }
    }

    log::info!(
        "Decode stopped after {} blocks, {} frames",
        handle.blocks_decoded(),
        handle.frames_decoded()
    );
    handle.close();
    Ok(())
}
