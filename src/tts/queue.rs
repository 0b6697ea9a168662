//! Serialized speech output
//!
//! A dedicated thread owns the backend and speaks requests strictly in
//! arrival order, so a replayed prompt can never overlap the next turn.

use super::SpeechOutput;
use crate::error::{CoachError, CoachResult};
use std::sync::{mpsc, Arc};
use std::thread;
use tracing::{debug, info, warn};

/// Commands sent to the speech thread
enum SpeechCommand {
    Say(String),
    SayWait(String, mpsc::Sender<CoachResult<()>>),
}

/// Thread-safe handle to the speech thread
#[derive(Clone)]
pub struct SpeechQueue {
    sender: mpsc::Sender<SpeechCommand>,
    name: String,
}

impl std::fmt::Debug for SpeechQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechQueue")
            .field("backend", &self.name)
            .finish()
    }
}

impl SpeechQueue {
    pub fn new(backend: Arc<dyn SpeechOutput>) -> Self {
        let (sender, receiver) = mpsc::channel::<SpeechCommand>();
        let name = format!("queued-{}", backend.name());

        thread::spawn(move || {
            Self::speech_thread(backend, receiver);
        });

        Self { sender, name }
    }

    fn speech_thread(backend: Arc<dyn SpeechOutput>, receiver: mpsc::Receiver<SpeechCommand>) {
        info!("🔊 Speech thread started ({})", backend.name());

        while let Ok(cmd) = receiver.recv() {
            match cmd {
                SpeechCommand::Say(text) => {
                    debug!("🔊 Speaking (queued): {}", text);
                    if let Err(e) = backend.speak(&text) {
                        warn!("❌ Speech failed: {}", e);
                    }
                }
                SpeechCommand::SayWait(text, resp) => {
                    debug!("🔊 Speaking (blocking): {}", text);
                    let _ = resp.send(backend.speak(&text));
                }
            }
        }

        info!("🔇 Speech thread stopped");
    }

    fn disconnected(e: impl std::fmt::Display) -> CoachError {
        CoachError::Tts(format!("Speech thread disconnected: {e}"))
    }
}

impl SpeechOutput for SpeechQueue {
    fn speak(&self, text: &str) -> CoachResult<()> {
        self.speak_queued(text, true)
    }

    fn speak_queued(&self, text: &str, block: bool) -> CoachResult<()> {
        if !block {
            return self
                .sender
                .send(SpeechCommand::Say(text.to_string()))
                .map_err(Self::disconnected);
        }
        let (tx, rx) = mpsc::channel();
        self.sender
            .send(SpeechCommand::SayWait(text.to_string(), tx))
            .map_err(Self::disconnected)?;
        rx.recv().map_err(Self::disconnected)?
    }

    fn name(&self) -> &str {
        &self.name
    }
}
