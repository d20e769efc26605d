//! The sender capability: one delivery attempt per invocation.

use std::collections::VecDeque;

use async_trait::async_trait;
use courier_store::Message;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::SenderError;

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The carrier accepted the message.
    Delivered,
    /// Worth retrying later.
    TransientFailure,
    /// The carrier refused the message; retrying cannot help.
    PermanentFailure,
}

/// Capability the engine invokes once per attempt.
///
/// Senders are called outside the engine lock and may block on the network;
/// they should impose their own deadlines. An `Err` return is treated as a
/// transient failure by the engine — a sender that wants a message dead
/// must say [`SendOutcome::PermanentFailure`] explicitly.
#[async_trait]
pub trait Sender: Send + Sync + std::fmt::Debug {
    /// Attempt delivery of `message`.
    ///
    /// # Errors
    /// Implementation-defined; mapped to a transient failure by the engine.
    async fn send(&self, message: &Message) -> Result<SendOutcome, SenderError>;
}

/// Demo sender: delivers with a fixed probability, otherwise fails
/// transiently. Stands in for a carrier integration in local runs.
#[derive(Debug, Clone, Copy)]
pub struct DemoSender {
    success_rate: f64,
}

impl DemoSender {
    /// A sender that delivers with probability `success_rate` (clamped to
    /// `0.0..=1.0`).
    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl Sender for DemoSender {
    async fn send(&self, message: &Message) -> Result<SendOutcome, SenderError> {
        let delivered = rand::random::<f64>() < self.success_rate;
        debug!(message_id = %message.message_id, delivered, "demo send");

        if delivered {
            Ok(SendOutcome::Delivered)
        } else {
            Ok(SendOutcome::TransientFailure)
        }
    }
}

/// Scripted sender for tests: pops outcomes in order and records every
/// invocation. Once the script is exhausted it keeps returning a fallback
/// outcome (default [`SendOutcome::Delivered`]).
#[derive(Debug)]
pub struct ScriptedSender {
    script: Mutex<VecDeque<Result<SendOutcome, SenderError>>>,
    calls: Mutex<Vec<String>>,
    fallback: SendOutcome,
}

impl Default for ScriptedSender {
    fn default() -> Self {
        Self::with_script([])
    }
}

impl ScriptedSender {
    /// A sender that plays `script` in order, then delivers everything.
    pub fn with_script(script: impl IntoIterator<Item = SendOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().map(Ok).collect()),
            calls: Mutex::new(Vec::new()),
            fallback: SendOutcome::Delivered,
        }
    }

    /// A sender that returns `outcome` on every invocation.
    pub fn always(outcome: SendOutcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            fallback: outcome,
        }
    }

    /// Append an error to the script.
    pub fn push_error(&self, error: impl Into<String>) {
        self.script
            .lock()
            .push_back(Err(SenderError(error.into())));
    }

    /// Append an outcome to the script.
    pub fn push(&self, outcome: SendOutcome) {
        self.script.lock().push_back(Ok(outcome));
    }

    /// Message ids in invocation order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Total invocations so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Sender for ScriptedSender {
    async fn send(&self, message: &Message) -> Result<SendOutcome, SenderError> {
        self.calls.lock().push(message.message_id.clone());
        self.script
            .lock()
            .pop_front()
            .unwrap_or(Ok(self.fallback))
    }
}
