//! Periodic task forwarding captured audio from a bridge to the session.

use base64::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::{AudioBridge, pcm_to_bytes};
use crate::session::RealtimeSession;

/// Periodic drain task bridging local capture to the network send path.
///
/// On each tick it drains whole units from the bridge and forwards them as
/// `input_audio_buffer.append` events. The first failed send sets the failed
/// flag and stops the task, so a capture loop cannot silently diverge from
/// the network state.
pub struct AudioSender {
    handle: JoinHandle<()>,
    failed: Arc<AtomicBool>,
}

impl AudioSender {
    /// Spawn the drain task with a fixed tick interval.
    pub fn spawn(
        session: Arc<RealtimeSession>,
        bridge: Arc<AudioBridge>,
        interval: Duration,
    ) -> Self {
        let failed = Arc::new(AtomicBool::new(false));
        let failed_flag = failed.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                while let Some(chunk) = bridge.drain() {
                    let audio = BASE64_STANDARD.encode(pcm_to_bytes(&chunk));
                    let payload = json!({ "audio": audio });
                    if let Err(e) = session.send("input_audio_buffer.append", Some(payload)).await {
                        tracing::error!("audio sender stopping: {e}");
                        failed_flag.store(true, Ordering::SeqCst);
                        return;
                    }
                }
            }
        });

        Self { handle, failed }
    }

    /// Whether the task stopped after a failed send.
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Stop the task.
    pub fn stop(self) {
        self.handle.abort();
    }
}
