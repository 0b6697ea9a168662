pub mod memory_store;
pub mod mock_asr;
pub mod mock_tts;
pub mod scripted_audio;

use memory_store::MemoryStore;
use mock_asr::MockRecognizer;
use mock_tts::MockSpeech;
use scripted_audio::{MemorySink, ScriptedAudio};
use speechcoach::config::Config;
use speechcoach::sentences::SentencePool;
use speechcoach::session::{
    ui_channel, ChannelDispatch, EndReason, SentenceEvent, SessionCallbacks, SessionController,
    SessionDeps, SessionState, TurnOutcome, UiDispatch, UiJob, UiQueue,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub const CHILD_ID: i64 = 7;

pub const ONE_SENTENCE_STORY: &str = r#"[{
    "id": "chat",
    "title": "Le chat",
    "target_phonemes": ["CH"],
    "contrast_phonemes": ["S"],
    "sentences": ["Le chat dort."]
}]"#;

pub const THREE_SENTENCE_STORY: &str = r#"[{
    "id": "chat",
    "title": "Le chat",
    "goal": "bien dire le son CH",
    "target_phonemes": ["CH"],
    "contrast_phonemes": ["S"],
    "sentences": ["Le chat dort.", "Le chien chante dans le jardin.", "Chut !"]
}]"#;

/// Everything the session reported, in delivery order.
#[derive(Debug, Clone)]
pub enum Event {
    Status(String),
    Sentence(SentenceEvent),
    Analysis(TurnOutcome),
    End(EndReason),
}

/// Delivers like a busy UI: each post blocks the worker for `delay`.
pub struct SlowDispatch {
    inner: ChannelDispatch,
    delay: Duration,
}

impl UiDispatch for SlowDispatch {
    fn post(&self, job: UiJob) {
        self.inner.post(job);
        std::thread::sleep(self.delay);
    }
}

pub struct Harness {
    pub _dir: TempDir,
    pub speech: Arc<MockSpeech>,
    pub recognizer: Arc<MockRecognizer>,
    pub audio: Arc<ScriptedAudio>,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<MemorySink>,
    pub queue: UiQueue,
    pub events: Arc<Mutex<Vec<Event>>>,
    pub controller: SessionController,
}

/// Config with no pauses between prompts so sessions run fast.
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.audio_dir = dir.path().join("audio").to_string_lossy().to_string();
    config.session.prompt_gap_ms = 0;
    config.session.turn_gap_ms = 0;
    config.session.pause_poll_ms = 5;
    config
}

impl Harness {
    pub fn new(stories: &str, audio: ScriptedAudio, recognizer: MockRecognizer) -> Self {
        let (dispatch, queue) = ui_channel();
        Self::build(stories, audio, recognizer, Arc::new(dispatch), queue)
    }

    /// Like `new`, but every callback post holds the worker for `delay`.
    pub fn with_post_delay(
        stories: &str,
        audio: ScriptedAudio,
        recognizer: MockRecognizer,
        delay: Duration,
    ) -> Self {
        let (inner, queue) = ui_channel();
        let dispatch = SlowDispatch { inner, delay };
        Self::build(stories, audio, recognizer, Arc::new(dispatch), queue)
    }

    fn build(
        stories: &str,
        audio: ScriptedAudio,
        recognizer: MockRecognizer,
        dispatch: Arc<dyn UiDispatch>,
        queue: UiQueue,
    ) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = test_config(&dir);
        let pool = SentencePool::from_json(stories).expect("stories");

        let speech = Arc::new(MockSpeech::new());
        let recognizer = Arc::new(recognizer);
        let audio = Arc::new(audio);
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(MemorySink::default());

        let deps = SessionDeps {
            audio: audio.clone(),
            sink: sink.clone(),
            speech: speech.clone(),
            recognizer: recognizer.clone(),
            profiles: store.clone(),
            persistence: store.clone(),
            dispatch,
        };

        let events = Arc::new(Mutex::new(Vec::new()));
        let push = |events: &Arc<Mutex<Vec<Event>>>| {
            let events = events.clone();
            move |e: Event| events.lock().unwrap().push(e)
        };
        let callbacks = SessionCallbacks::default()
            .on_status({
                let push = push(&events);
                move |s| push(Event::Status(s))
            })
            .on_sentence({
                let push = push(&events);
                move |s| push(Event::Sentence(s))
            })
            .on_analysis({
                let push = push(&events);
                move |o| push(Event::Analysis(o))
            })
            .on_end({
                let push = push(&events);
                move |r| push(Event::End(r))
            });

        let mut controller = SessionController::new(config, deps, pool);
        controller.set_child(Some(CHILD_ID));
        controller.set_callbacks(callbacks);

        Self {
            _dir: dir,
            speech,
            recognizer,
            audio,
            store,
            sink,
            queue,
            events,
            controller,
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.events().iter().find_map(|e| match e {
            Event::End(r) => Some(*r),
            _ => None,
        })
    }

    pub fn outcomes(&self) -> Vec<TurnOutcome> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Analysis(o) => Some(o),
                _ => None,
            })
            .collect()
    }

    pub fn sentences(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Sentence(s) => Some(s.text),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Status(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Drain callbacks until the session ends. Panics on timeout.
    pub fn run_to_end(&mut self) -> EndReason {
        let events = self.events.clone();
        let ended = self.queue.pump_until(Duration::from_secs(20), || {
            events
                .lock()
                .unwrap()
                .iter()
                .any(|e| matches!(e, Event::End(_)))
        });
        assert!(ended, "session did not end in time");
        self.controller.wait();
        self.queue.drain();
        self.end_reason().unwrap()
    }

    /// Drain callbacks until `n` sessions have ended. Panics on timeout.
    pub fn pump_until_ends(&self, n: usize) {
        let events = self.events.clone();
        let ended = self.queue.pump_until(Duration::from_secs(20), || {
            events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| matches!(e, Event::End(_)))
                .count()
                >= n
        });
        assert!(ended, "session did not end in time");
    }

    /// Drain callbacks until the controller reports `state`.
    pub fn wait_for_state(&self, state: SessionState) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while self.controller.state() != state {
            assert!(Instant::now() < deadline, "never reached {state}");
            self.queue.pump(Duration::from_millis(2));
        }
    }
}
