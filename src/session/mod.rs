//! Guided session: plan resolution, turn loop and lifecycle.

pub mod controller;
pub mod dispatch;
pub mod events;
pub mod fatigue;
pub mod plan;
pub mod sequencer;
pub mod state;
mod worker;

pub use controller::{SessionController, SessionDeps, StartRequest};
pub use dispatch::{ui_channel, ChannelDispatch, InlineDispatch, UiDispatch, UiJob, UiQueue};
pub use events::{Callback, EndReason, SentenceEvent, SessionCallbacks, TurnOutcome};
pub use fatigue::FatigueMonitor;
pub use plan::{build_session_plan, PlaylistItem, PlaylistPlan, RatioPlan, SessionPlan};
pub use sequencer::{TurnSequence, TurnSequencer};
pub use state::{SessionState, StateCell};
