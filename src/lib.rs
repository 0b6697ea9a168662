//! SpeechCoach Library
//!
//! Core of a guided pronunciation coach: silence-aware recording, acoustic
//! scoring and the session state machine, with the engines it plugs into.

pub mod asr;
pub mod audio;
pub mod config;
pub mod error;
pub mod scoring;
pub mod sentences;
pub mod session;
pub mod storage;
pub mod tts;

pub use error::{CoachError, CoachResult};
