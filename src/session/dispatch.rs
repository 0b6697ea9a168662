//! Delivery of session callbacks on the caller's thread.
//!
//! The worker never runs UI code itself: it posts closures that the owning
//! thread drains in order.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

pub type UiJob = Box<dyn FnOnce() + Send + 'static>;

/// Schedules work on the UI thread. Posts from one thread run in post order.
pub trait UiDispatch: Send + Sync {
    fn post(&self, job: UiJob);
}

/// Sending half of a [`ui_channel`].
pub struct ChannelDispatch {
    sender: Mutex<Sender<UiJob>>,
}

impl UiDispatch for ChannelDispatch {
    fn post(&self, job: UiJob) {
        let sent = self
            .sender
            .lock()
            .map(|tx| tx.send(job).is_ok())
            .unwrap_or(false);
        if !sent {
            warn!("UI queue closed, dropping callback");
        }
    }
}

/// Receiving half of a [`ui_channel`], owned by the UI thread.
pub struct UiQueue {
    receiver: Receiver<UiJob>,
}

impl UiQueue {
    /// Run every job already queued. Returns how many ran.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for work, then run everything available.
    /// Returns `None` once every dispatcher is gone and the queue is empty.
    pub fn pump(&self, timeout: Duration) -> Option<usize> {
        match self.receiver.recv_timeout(timeout) {
            Ok(job) => {
                job();
                Some(1 + self.drain())
            }
            Err(RecvTimeoutError::Timeout) => Some(0),
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Pump until `done` returns true or `timeout` elapses. Returns `done()`.
    pub fn pump_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while !done() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let slice = (deadline - now).min(Duration::from_millis(20));
            if self.pump(slice).is_none() {
                return done();
            }
        }
        true
    }
}

pub fn ui_channel() -> (ChannelDispatch, UiQueue) {
    let (sender, receiver) = mpsc::channel();
    (
        ChannelDispatch {
            sender: Mutex::new(sender),
        },
        UiQueue { receiver },
    )
}

/// Runs jobs immediately on the posting thread. For headless use and tests.
#[derive(Debug, Default)]
pub struct InlineDispatch;

impl UiDispatch for InlineDispatch {
    fn post(&self, job: UiJob) {
        job();
    }
}
