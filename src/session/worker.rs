//! The session worker thread.
//!
//! Owns everything a running session needs. Stop is observed once per
//! recording block and at every turn boundary; pause only at turn boundaries.

use super::controller::{SessionDeps, Shared};
use super::events::{EndReason, SentenceEvent, SessionCallbacks, TurnOutcome};
use super::fatigue::FatigueMonitor;
use super::plan::SessionPlan;
use super::sequencer::{easiest_first, TurnSequence};
use super::state::SessionState;
use crate::audio::{Recorder, RecordingResult};
use crate::config::{Config, SessionTuning};
use crate::error::CoachResult;
use crate::scoring::{find_focus_window, FeatureExtractor, Scorer};
use crate::sentences::{Sentence, Story};
use crate::storage::{load_reference, now_iso, ProfileLabel, TurnRecord};
use crate::tts::child_prompt;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What the controller resolved before spawning the worker.
pub(crate) struct SessionSetup {
    pub(crate) child_id: i64,
    pub(crate) story: Story,
    pub(crate) sequence: TurnSequence,
    pub(crate) plan: Option<SessionPlan>,
}

enum Capture {
    Usable(RecordingResult, PathBuf),
    TooShort,
    Cancelled,
}

pub(crate) struct SessionRun {
    tuning: SessionTuning,
    audio_dir: PathBuf,
    deps: SessionDeps,
    callbacks: SessionCallbacks,
    shared: Arc<Shared>,
    setup: SessionSetup,
    recorder: Recorder,
    extractor: FeatureExtractor,
    scorer: Scorer,
}

impl SessionRun {
    pub(crate) fn new(
        config: &Config,
        deps: SessionDeps,
        callbacks: SessionCallbacks,
        shared: Arc<Shared>,
        setup: SessionSetup,
    ) -> Self {
        let recorder = Recorder::new(
            config.recorder.clone(),
            deps.audio.clone(),
            config.input_device.clone(),
        );
        Self {
            tuning: config.session.clone(),
            audio_dir: PathBuf::from(&config.audio_dir),
            scorer: Scorer::new(config.session.wer_mode),
            extractor: FeatureExtractor::new(),
            recorder,
            deps,
            callbacks,
            shared,
            setup,
        }
    }

    /// Thread entry point. Always ends in `Idle` with `on_end` posted.
    pub(crate) fn execute(mut self) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run()));
        let reason = match result {
            Ok(Ok(reason)) => reason,
            Ok(Err(e)) => {
                error!("❌ Session failed: {}", e);
                self.status(format!("❌ Erreur: {e}"));
                EndReason::Error
            }
            Err(_) => {
                error!("❌ Session worker panicked");
                self.status("❌ Erreur interne".to_string());
                EndReason::Error
            }
        };
        self.finish(reason);
    }

    fn run(&mut self) -> CoachResult<EndReason> {
        self.shared.state.enter(SessionState::Playing);
        self.status("🎮 Session démarrée".to_string());
        if self.shared.cancel.is_cancelled() {
            return Ok(EndReason::Stopped);
        }

        if !self.setup.story.goal.is_empty() {
            let goal = format!("On s'entraîne : {}.", self.setup.story.goal);
            self.say(&goal);
            self.sleep_ms(self.tuning.prompt_gap_ms);
        }

        let planned = self.setup.plan.is_some();
        let mut fatigue = FatigueMonitor::new(&self.tuning);
        let mut repeats: HashMap<usize, u32> = HashMap::new();
        let total = self.setup.sequence.len();

        for turn in 0..total {
            if self.shared.cancel.is_cancelled() {
                return Ok(EndReason::Stopped);
            }
            self.wait_while_paused();
            if self.shared.cancel.is_cancelled() {
                return Ok(EndReason::Stopped);
            }

            let index = self.setup.sequence.order[turn];
            let sentence = Arc::clone(&self.setup.sequence.sentences[index]);
            info!("🔄 Turn {}/{}: '{}'", turn + 1, total, sentence.text);
            self.play_prompt(&sentence, turn, total);

            self.shared.state.enter(SessionState::Listening);
            let (recording, audio_path) = match self.capture(turn)? {
                Capture::Usable(recording, path) => (recording, path),
                Capture::Cancelled => return Ok(EndReason::Stopped),
                Capture::TooShort => {
                    self.status("⚠️ Enregistrement trop court".to_string());
                    self.say("Je n'ai pas bien entendu. On passe au suivant.");
                    continue;
                }
            };

            self.shared.state.enter(SessionState::Analyzing);
            self.status("🧠 Analyse en cours".to_string());
            let outcome = self.analyze(turn, &sentence, &recording, audio_path);
            let score = outcome.final_score;
            self.post_analysis(outcome);
            self.status(format!("✅ Tour {}/{} terminé", turn + 1, total));

            // Fatigue takes precedence over repeating a failed sentence
            if planned && fatigue.record(score, recording.duration_sec) {
                info!("😴 Fatigue detected after turn {}", turn + 1);
                self.status("😴 On dirait que tu es fatigué, on termine en douceur".to_string());
                return Ok(if self.cool_down()? {
                    EndReason::Fatigue
                } else {
                    EndReason::Stopped
                });
            }
            self.maybe_repeat(turn, index, score, &mut repeats);

            self.sleep_ms(self.tuning.turn_gap_ms);
        }

        if self.shared.cancel.is_cancelled() {
            return Ok(EndReason::Stopped);
        }
        Ok(EndReason::Finished)
    }

    fn play_prompt(&self, sentence: &Sentence, turn: usize, total: usize) {
        self.shared.state.enter(SessionState::Playing);
        if let Ok(mut last) = self.shared.last_prompt.lock() {
            *last = Some(sentence.text.clone());
        }
        self.post_sentence(SentenceEvent {
            story_title: self.setup.story.title.clone(),
            turn: turn + 1,
            total,
            text: sentence.text.clone(),
            phoneme_target: sentence.phoneme_target.clone(),
        });

        self.status("🔊 Écoute bien".to_string());
        self.say(&sentence.text);
        self.sleep_ms(self.tuning.prompt_gap_ms);
        self.say(child_prompt());
        self.status("🎙️ Prêt ? Répète la phrase quand tu veux !".to_string());
    }

    /// Record with the short-recording retry policy.
    fn capture(&self, turn: usize) -> CoachResult<Capture> {
        let base = self.turn_path(turn);
        let attempts = self.tuning.max_record_attempts.max(1);

        for attempt in 0..attempts {
            if self.shared.cancel.is_cancelled() {
                return Ok(Capture::Cancelled);
            }
            let path = if attempt == 0 {
                base.clone()
            } else {
                with_suffix(&base, &format!("_retry{attempt}"))
            };
            let recording =
                self.recorder
                    .record(self.deps.sink.as_ref(), &path, &self.shared.cancel)?;
            if self.shared.cancel.is_cancelled() {
                return Ok(Capture::Cancelled);
            }
            if recording.duration_sec >= self.tuning.min_valid_duration_sec {
                return Ok(Capture::Usable(recording, path));
            }

            debug!(
                "Recording too short ({:.2}s), attempt {}/{}",
                recording.duration_sec,
                attempt + 1,
                attempts
            );
            if attempt + 1 < attempts {
                self.status("🎙️ Trop court, on recommence".to_string());
                self.say("On recommence");
            }
        }
        Ok(Capture::TooShort)
    }

    fn analyze(
        &self,
        turn: usize,
        sentence: &Sentence,
        recording: &RecordingResult,
        audio_path: PathBuf,
    ) -> TurnOutcome {
        let transcription = self.deps.recognizer.transcribe(&audio_path);
        let (focus_start, focus_end) =
            find_focus_window(transcription.words(), &sentence.target_word);
        let features = self.extractor.extract(
            &recording.samples,
            recording.sample_rate,
            focus_start,
            focus_end,
        );

        let child = Some(self.setup.child_id);
        let profiles = self.deps.profiles.as_ref();
        let target = load_reference(profiles, child, &sentence.phoneme_target, ProfileLabel::Target);
        let contrast = load_reference(
            profiles,
            child,
            &sentence.phoneme_contrast,
            ProfileLabel::Contrast,
        );
        if target.is_none() {
            debug!("No target profile for '{}'", sentence.phoneme_target);
        }

        let scores = self.scorer.score(
            &sentence.text,
            transcription.text(),
            features.as_ref(),
            target.as_ref(),
            contrast.as_ref(),
        );
        info!(
            "📊 '{}' -> '{}' wer={:.2} acoustic={:.2} final={:.2}",
            sentence.text,
            transcription.text(),
            scores.wer,
            scores.acoustic_score,
            scores.final_score
        );

        let record = TurnRecord {
            created_at: now_iso(),
            child_id: child,
            story_id: self.setup.story.id.clone(),
            story_title: self.setup.story.title.clone(),
            goal: self.setup.story.goal.clone(),
            sentence_index: turn,
            expected_text: sentence.text.clone(),
            recognized_text: transcription.text().to_string(),
            wer: scores.wer,
            audio_path: audio_path.to_string_lossy().to_string(),
            duration_sec: recording.duration_sec,
            phoneme_target: sentence.phoneme_target.clone(),
            spectral_centroid_hz: features.as_ref().map(|f| f.spectral_centroid),
            features: features.clone(),
            acoustic_score: scores.acoustic_score,
            acoustic_contrast: scores.acoustic_contrast,
            final_score: scores.final_score,
            phoneme_confidence: scores.confidence,
            focus_start_sec: focus_start,
            focus_end_sec: focus_end,
        };
        let record_id = match self.deps.persistence.save_turn_outcome(&record) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("⚠️ Could not save turn {}: {}", turn + 1, e);
                None
            }
        };

        TurnOutcome {
            turn: turn + 1,
            sentence_index: self.setup.sequence.order[turn],
            expected_text: record.expected_text,
            recognized_text: record.recognized_text,
            wer: scores.wer,
            acoustic_score: scores.acoustic_score,
            acoustic_contrast: scores.acoustic_contrast,
            confidence: scores.confidence,
            final_score: scores.final_score,
            focus_window: (focus_start, focus_end),
            duration_sec: recording.duration_sec,
            audio_path,
            record_id,
        }
    }

    /// Replay a failed sentence in the next slot, within the plan's budget.
    fn maybe_repeat(
        &mut self,
        turn: usize,
        index: usize,
        score: f64,
        repeats: &mut HashMap<usize, u32>,
    ) {
        let Some(plan) = &self.setup.plan else {
            return;
        };
        if !plan.repeat_on_fail() || score >= self.tuning.fail_threshold {
            return;
        }
        let next = turn + 1;
        if next >= self.setup.sequence.order.len() {
            return;
        }
        let used = repeats.entry(index).or_insert(0);
        if *used >= plan.max_repeats_per_sentence() {
            return;
        }
        *used += 1;
        self.setup.sequence.order[next] = index;
        info!("🔁 Repeating sentence {} (score {:.2})", index, score);
        self.status("🔁 On refait cette phrase".to_string());
    }

    /// Short unscored wind-down on the easiest sentences. Returns false if
    /// interrupted by a stop.
    fn cool_down(&self) -> CoachResult<bool> {
        let sentences = &self.setup.sequence.sentences;
        let easy = easiest_first(sentences);
        let count = self.tuning.cooldown_items.min(easy.len());

        for (k, &index) in easy.iter().take(count).enumerate() {
            if self.shared.cancel.is_cancelled() {
                return Ok(false);
            }
            self.wait_while_paused();
            if self.shared.cancel.is_cancelled() {
                return Ok(false);
            }
            let sentence = &sentences[index];
            self.shared.state.enter(SessionState::Playing);
            if let Ok(mut last) = self.shared.last_prompt.lock() {
                *last = Some(sentence.text.clone());
            }
            self.status(format!("🌙 Retour au calme {}/{}", k + 1, count));
            self.say(&sentence.text);
            self.sleep_ms(self.tuning.prompt_gap_ms);

            self.shared.state.enter(SessionState::Listening);
            let path = with_suffix(&self.turn_path(k), &format!("_cooldown{}", k + 1));
            self.recorder
                .record(self.deps.sink.as_ref(), &path, &self.shared.cancel)?;
        }
        Ok(!self.shared.cancel.is_cancelled())
    }

    fn finish(&self, reason: EndReason) {
        self.shared.state.set(SessionState::Finished);
        match reason {
            EndReason::Finished | EndReason::Fatigue => {
                self.status("🎉 Fin du jeu".to_string());
                self.say("Bravo ! Tu as fini. Super travail !");
            }
            EndReason::Stopped => self.status("⏹️ Séance arrêtée".to_string()),
            EndReason::Error => {}
        }
        if let Ok(mut last) = self.shared.last_prompt.lock() {
            *last = None;
        }
        info!("🏁 Session ended: {}", reason);

        // on_end may start the next session
        self.shared.state.set(SessionState::Idle);
        if let Some(cb) = self.callbacks.on_end.clone() {
            self.deps.dispatch.post(Box::new(move || cb(reason)));
        }
    }

    fn turn_path(&self, turn: usize) -> PathBuf {
        let story: String = self
            .setup
            .story
            .id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.audio_dir.join(format!(
            "{}_{}_{}_{}.wav",
            self.setup.child_id,
            story,
            chrono::Local::now().timestamp(),
            turn + 1
        ))
    }

    /// Speak through the serialized output. Failures only degrade the turn.
    fn say(&self, text: &str) {
        if let Err(e) = self.deps.speech.speak_queued(text, true) {
            warn!("⚠️ TTS failed for '{}': {}", text, e);
        }
    }

    fn wait_while_paused(&self) {
        let poll = Duration::from_millis(self.tuning.pause_poll_ms.max(1));
        while self.shared.state.is_paused() && !self.shared.cancel.is_cancelled() {
            std::thread::sleep(poll);
        }
    }

    /// Sleep that returns early on stop.
    fn sleep_ms(&self, ms: u64) {
        let mut left = ms;
        while left > 0 && !self.shared.cancel.is_cancelled() {
            let step = left.min(50);
            std::thread::sleep(Duration::from_millis(step));
            left -= step;
        }
    }

    fn status(&self, text: String) {
        if let Some(cb) = self.callbacks.on_status.clone() {
            self.deps.dispatch.post(Box::new(move || cb(text)));
        }
    }

    fn post_sentence(&self, event: SentenceEvent) {
        if let Some(cb) = self.callbacks.on_sentence.clone() {
            self.deps.dispatch.post(Box::new(move || cb(event)));
        }
    }

    fn post_analysis(&self, outcome: TurnOutcome) {
        if let Some(cb) = self.callbacks.on_analysis.clone() {
            self.deps.dispatch.post(Box::new(move || cb(outcome)));
        }
    }
}

fn with_suffix(path: &std::path::Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}{suffix}.wav"))
}
