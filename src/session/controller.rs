//! Public control surface of a guided session.
//!
//! Everything the UI calls lives here and returns quickly. The turn loop runs
//! on a dedicated worker thread (see `worker`), which only shares the state
//! cell, the cancel token and the last spoken prompt with this side.

use super::dispatch::UiDispatch;
use super::events::SessionCallbacks;
use super::plan::SessionPlan;
use super::sequencer::{TurnSequence, TurnSequencer};
use super::state::{SessionState, StateCell};
use super::worker::{SessionRun, SessionSetup};
use crate::asr::SpeechRecognizer;
use crate::audio::{AudioSource, CancelToken, RecordingSink};
use crate::config::Config;
use crate::error::{CoachError, CoachResult};
use crate::sentences::{SentencePool, Story};
use crate::storage::{ReferenceProfileStore, SessionPersistence};
use crate::tts::SpeechOutput;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// External collaborators a session talks to.
#[derive(Clone)]
pub struct SessionDeps {
    pub audio: Arc<dyn AudioSource>,
    pub sink: Arc<dyn RecordingSink>,
    pub speech: Arc<dyn SpeechOutput>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub profiles: Arc<dyn ReferenceProfileStore>,
    pub persistence: Arc<dyn SessionPersistence>,
    pub dispatch: Arc<dyn UiDispatch>,
}

/// How many turns to play, or which plan to follow.
#[derive(Debug, Clone, PartialEq)]
pub enum StartRequest {
    Rounds(usize),
    Plan(SessionPlan),
}

impl From<usize> for StartRequest {
    fn from(rounds: usize) -> Self {
        StartRequest::Rounds(rounds)
    }
}

impl From<SessionPlan> for StartRequest {
    fn from(plan: SessionPlan) -> Self {
        StartRequest::Plan(plan)
    }
}

/// State visible to both the control thread and the worker.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) state: StateCell,
    pub(crate) cancel: CancelToken,
    pub(crate) last_prompt: Mutex<Option<String>>,
}

pub struct SessionController {
    config: Config,
    deps: SessionDeps,
    pool: SentencePool,
    child_id: Option<i64>,
    plan: Option<SessionPlan>,
    callbacks: SessionCallbacks,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl SessionController {
    pub fn new(config: Config, deps: SessionDeps, pool: SentencePool) -> Self {
        Self {
            config,
            deps,
            pool,
            child_id: None,
            plan: None,
            callbacks: SessionCallbacks::default(),
            shared: Arc::new(Shared::default()),
            worker: None,
        }
    }

    pub fn set_child(&mut self, child_id: Option<i64>) {
        self.child_id = child_id;
    }

    pub fn set_callbacks(&mut self, callbacks: SessionCallbacks) {
        self.callbacks = callbacks;
    }

    /// Plan used by later `start(rounds)` calls. `None` returns to free play.
    pub fn set_plan(&mut self, plan: Option<SessionPlan>) {
        self.plan = plan;
    }

    pub fn plan(&self) -> Option<&SessionPlan> {
        self.plan.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.get()
    }

    pub fn is_running(&self) -> bool {
        self.state() != SessionState::Idle
    }

    /// Validate the request and launch the worker.
    ///
    /// Configuration problems are reported here and no worker is started.
    /// `Rounds` follows the active plan (a ratio plan takes the new round
    /// count, a playlist keeps its own length); without a plan the story's
    /// sentences are played in order and fatigue detection is off.
    pub fn start(&mut self, request: impl Into<StartRequest>) -> CoachResult<()> {
        if self.is_running() {
            return Err(CoachError::SessionActive);
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        let child_id = self.child_id.ok_or(CoachError::NoChildSelected)?;
        if !self
            .deps
            .audio
            .has_input_device(self.config.input_device.as_deref())
        {
            return Err(CoachError::NoInputDevice);
        }

        let (plan, rounds) = match request.into() {
            StartRequest::Plan(plan) => {
                let rounds = plan.rounds();
                (Some(plan), rounds)
            }
            StartRequest::Rounds(rounds) => (
                self.plan.as_ref().map(|p| p.with_rounds(rounds)),
                rounds,
            ),
        };
        match &plan {
            Some(plan) => plan.validate()?,
            None if rounds == 0 => {
                return Err(CoachError::Plan("rounds must be greater than zero".into()))
            }
            None => {}
        }

        let (story, sequence) = self.resolve(plan.as_ref(), rounds)?;
        info!(
            "🎮 Starting session: child {}, story '{}', {} turns{}",
            child_id,
            story.title,
            sequence.len(),
            if plan.is_some() { " (planned)" } else { "" }
        );

        self.shared.cancel.reset();
        if let Ok(mut last) = self.shared.last_prompt.lock() {
            *last = None;
        }
        self.shared.state.set(SessionState::Starting);

        let run = SessionRun::new(
            &self.config,
            self.deps.clone(),
            self.callbacks.clone(),
            self.shared.clone(),
            SessionSetup {
                child_id,
                story,
                sequence,
                plan,
            },
        );
        let spawned = std::thread::Builder::new()
            .name("speechcoach-session".into())
            .spawn(move || run.execute());
        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.state.set(SessionState::Idle);
                Err(e.into())
            }
        }
    }

    fn resolve(
        &mut self,
        plan: Option<&SessionPlan>,
        rounds: usize,
    ) -> CoachResult<(Story, TurnSequence)> {
        if let Some(whole @ SessionPlan::Playlist(playlist)) = plan {
            let title = playlist
                .name
                .clone()
                .unwrap_or_else(|| "Playlist".to_string());
            let sequence = TurnSequencer::resolve(&[], whole);
            let story = Story {
                id: "playlist".to_string(),
                title,
                goal: String::new(),
                tags: Vec::new(),
                weight: 1.0,
                sentences: sequence.sentences.clone(),
            };
            return Ok((story, sequence));
        }

        if self.pool.is_empty() {
            return Err(CoachError::NoSentences);
        }
        let story = self.pool.pick_story()?;
        let sequence = match plan {
            Some(plan) => TurnSequencer::resolve(&story.sentences, plan),
            None => TurnSequencer::cyclic(&story.sentences, rounds),
        };
        if sequence.is_empty() {
            return Err(CoachError::NoSentences);
        }
        Ok((story, sequence))
    }

    /// Ask the worker to stop. Recording notices within one block.
    pub fn stop(&self) {
        if self.shared.state.begin_stop() {
            info!("⏹️ Stop requested");
            self.shared.cancel.cancel();
            self.post_status("⏹️ Arrêt demandé");
        }
    }

    /// Pause or resume. Takes effect at the next turn boundary; an ongoing
    /// recording or analysis completes first.
    pub fn toggle_pause(&self) -> SessionState {
        let before = self.shared.state.get();
        let after = self.shared.state.toggle_pause();
        if before != after {
            debug!("State {} -> {}", before, after);
            if after == SessionState::Paused {
                self.post_status("⏸️ Pause");
            } else {
                self.post_status("▶️ Reprise");
            }
        }
        after
    }

    /// Queue the last spoken phrase again. Returns false when there is none.
    pub fn replay_last_prompt(&self) -> CoachResult<bool> {
        if !self.is_running() {
            return Ok(false);
        }
        let prompt = self.shared.last_prompt.lock()?.clone();
        match prompt {
            Some(text) => {
                debug!("🔁 Replaying prompt: {}", text);
                self.deps.speech.speak_queued(&text, false)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Block until the current worker, if any, has exited.
    pub fn wait(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("Session worker panicked outside the turn loop");
            }
        }
    }

    fn post_status(&self, text: &str) {
        if let Some(cb) = self.callbacks.on_status.clone() {
            let text = text.to_string();
            self.deps.dispatch.post(Box::new(move || cb(text)));
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop();
        self.wait();
    }
}
