//! Session lifecycle states shared between the control thread and the worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Playing,
    Listening,
    Analyzing,
    Paused,
    Stopping,
    Finished,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "IDLE",
            SessionState::Starting => "STARTING",
            SessionState::Playing => "PLAYING",
            SessionState::Listening => "LISTENING",
            SessionState::Analyzing => "ANALYZING",
            SessionState::Paused => "PAUSED",
            SessionState::Stopping => "STOPPING",
            SessionState::Finished => "FINISHED",
        }
    }

    /// States in which a turn is being worked on and pause is allowed.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Playing | SessionState::Listening | SessionState::Analyzing
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Default)]
struct Slots {
    current: SessionState,
    /// Active state to return to when unpaused
    resume: SessionState,
}

/// State holder with a pause flag the worker can poll without locking.
///
/// While paused, worker transitions only move the resume target, so the
/// visible state stays `Paused` and unpausing lands on the latest active state.
#[derive(Debug, Default)]
pub struct StateCell {
    slots: Mutex<Slots>,
    paused: AtomicBool,
}

impl StateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> SessionState {
        self.slots
            .lock()
            .map(|s| s.current)
            .unwrap_or(SessionState::Idle)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Unconditional transition (lifecycle edges: start, stop, finish, reset).
    pub fn set(&self, state: SessionState) {
        if let Ok(mut s) = self.slots.lock() {
            s.current = state;
            if state != SessionState::Paused {
                self.paused.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Worker transition between active states. No-op once stopping.
    pub fn enter(&self, state: SessionState) {
        if let Ok(mut s) = self.slots.lock() {
            match s.current {
                SessionState::Stopping | SessionState::Finished | SessionState::Idle => {}
                SessionState::Paused => s.resume = state,
                _ => s.current = state,
            }
        }
    }

    /// Pause from an active state or resume to the remembered one.
    pub fn toggle_pause(&self) -> SessionState {
        let Ok(mut s) = self.slots.lock() else {
            return SessionState::Idle;
        };
        if s.current.is_active() {
            s.resume = s.current;
            s.current = SessionState::Paused;
            self.paused.store(true, Ordering::SeqCst);
        } else if s.current == SessionState::Paused {
            s.current = s.resume;
            self.paused.store(false, Ordering::SeqCst);
        }
        s.current
    }

    /// Move to `Stopping` unless the session is already winding down.
    pub fn begin_stop(&self) -> bool {
        let Ok(mut s) = self.slots.lock() else {
            return false;
        };
        match s.current {
            SessionState::Idle | SessionState::Stopping | SessionState::Finished => false,
            _ => {
                s.current = SessionState::Stopping;
                self.paused.store(false, Ordering::SeqCst);
                true
            }
        }
    }
}
