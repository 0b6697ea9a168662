use crate::scoring::WerMode;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Audio
    pub input_device: Option<String>,
    pub recorder: RecorderConfig,

    // Speech
    pub tts_engine: String,
    pub piper_voice: String,
    pub vosk_model_path: String,

    // Session pacing
    pub session: SessionTuning,

    // Data
    pub audio_dir: String,
    pub db_path: String,
    pub sentences_path: String,

    // Meta
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_device: None,
            recorder: RecorderConfig::default(),
            tts_engine: "piper".to_string(),
            piper_voice: "fr_FR-siwis-medium".to_string(),
            vosk_model_path: data_path("models/vosk-model-small-fr"),
            session: SessionTuning::default(),
            audio_dir: data_path("audio_sessions"),
            db_path: data_path("coach.db"),
            sentences_path: data_path("stories.json"),
            log_level: "INFO".to_string(),
        }
    }
}

/// Endpointing parameters for one recording attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub sample_rate: u32,
    pub block_duration_sec: f64,
    pub max_duration_sec: f64,
    pub silence_duration_sec: f64,
    pub base_threshold: f32,
    pub calibration_duration_sec: f64,
    pub threshold_multiplier: f32,
    pub min_total_duration_sec: f64,
    pub min_speech_duration_sec: f64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            block_duration_sec: 0.03,
            max_duration_sec: 12.0,
            silence_duration_sec: 1.0,
            base_threshold: 0.015,
            calibration_duration_sec: 0.45,
            threshold_multiplier: 3.0,
            min_total_duration_sec: 1.2,
            min_speech_duration_sec: 0.6,
        }
    }
}

impl RecorderConfig {
    /// Samples per analysis block.
    pub fn block_size(&self) -> usize {
        ((self.block_duration_sec * f64::from(self.sample_rate)).round() as usize).max(1)
    }

    /// Whole blocks covering `seconds`, rounded to nearest. Truncating instead
    /// gives one block less whenever the duration is not a block multiple
    /// past the half (0.05s at 30ms blocks is 2 here, 1 when truncated).
    fn blocks_for(&self, seconds: f64) -> usize {
        if self.block_duration_sec <= 0.0 {
            return 0;
        }
        (seconds / self.block_duration_sec).round().max(0.0) as usize
    }

    pub fn calibration_blocks(&self) -> usize {
        self.blocks_for(self.calibration_duration_sec).max(1)
    }

    pub fn max_blocks(&self) -> usize {
        self.blocks_for(self.max_duration_sec)
    }

    pub fn silence_need_blocks(&self) -> usize {
        self.blocks_for(self.silence_duration_sec)
    }

    pub fn min_total_blocks(&self) -> usize {
        self.blocks_for(self.min_total_duration_sec)
    }

    pub fn min_speech_blocks(&self) -> usize {
        self.blocks_for(self.min_speech_duration_sec)
    }
}

/// Turn-level pacing and heuristics for the session worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTuning {
    /// Recordings shorter than this are retried, then skipped
    pub min_valid_duration_sec: f64,
    pub max_record_attempts: u32,
    /// Scores below this count as a failed attempt
    pub fail_threshold: f64,
    pub wer_mode: WerMode,
    pub fatigue_window: usize,
    pub fatigue_score_drop: f64,
    pub fatigue_duration_growth: f64,
    pub cooldown_items: usize,
    pub pause_poll_ms: u64,
    pub prompt_gap_ms: u64,
    pub turn_gap_ms: u64,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            min_valid_duration_sec: 0.35,
            max_record_attempts: 2,
            fail_threshold: 0.45,
            wer_mode: WerMode::default(),
            fatigue_window: 4,
            fatigue_score_drop: 0.15,
            fatigue_duration_growth: 0.20,
            cooldown_items: 3,
            pause_poll_ms: 100,
            prompt_gap_ms: 400,
            turn_gap_ms: 800,
        }
    }
}

impl Config {
    /// Load config from file, or create default
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(config_path: &std::path::Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(config_path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                // Graceful degradation: keep the broken file around for inspection
                tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                let backup_path = config_path.with_extension("json.corrupt");
                let _ = std::fs::rename(config_path, &backup_path);
                Ok(Self::default())
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("speechcoach")
        .join("config.json")
}

fn data_path(rel: &str) -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("speechcoach")
        .join(rel)
        .to_string_lossy()
        .to_string()
}
