//! TTS (Text-to-Speech) Module
//!
//! Provides a unified interface for multiple TTS backends.

use crate::config::Config;
use crate::error::CoachResult;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{info, warn};

pub mod piper;
pub mod queue;
pub mod system;

pub use queue::SpeechQueue;

/// Short encouragements spoken right before listening.
pub const CHILD_PROMPTS: &[&str] = &[
    "Super ! Tu peux commencer à répéter.",
    "Top ! Quand tu es prêt, tu répètes.",
    "Génial ! Vas-y doucement, répète la phrase.",
    "Bravo ! On y va : tu peux répéter maintenant.",
];

/// Pick a random child prompt.
pub fn child_prompt() -> &'static str {
    CHILD_PROMPTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(CHILD_PROMPTS[0])
}

/// Trait for TTS engines
pub trait SpeechOutput: Send + Sync + std::fmt::Debug {
    /// Speak the given text, returning once playback is finished
    fn speak(&self, text: &str) -> CoachResult<()>;

    /// Speak after everything already queued. With `block`, wait until spoken.
    ///
    /// Backends without a queue just speak synchronously.
    fn speak_queued(&self, text: &str, block: bool) -> CoachResult<()> {
        let _ = block;
        self.speak(text)
    }

    /// Get the engine name
    fn name(&self) -> &str;
}

/// Factory to create the configured TTS engine
pub fn create_engine(config: &Config) -> CoachResult<Arc<dyn SpeechOutput>> {
    info!("🛠️ Creating TTS engine: {}", config.tts_engine);
    let engine: Arc<dyn SpeechOutput> = match config.tts_engine.as_str() {
        "piper" => {
            info!("  - Using Piper TTS (Voice: {})", config.piper_voice);
            Arc::new(piper::PiperEngine::new(config))
        }
        "system" => {
            info!("  - Using System TTS");
            Arc::new(system::SystemEngine::new())
        }
        _ => {
            warn!(
                "  - Unknown engine '{}', falling back to System",
                config.tts_engine
            );
            Arc::new(system::SystemEngine::new())
        }
    };
    info!("✅ TTS engine '{}' initialized", engine.name());
    Ok(engine)
}
