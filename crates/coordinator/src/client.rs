//! Participant callback client trait and in-memory implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::LraId;
use store::{LraStatus, ParticipantStatus};
use thiserror::Error;

/// Successful responses to a complete or compensate callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// 200: the participant finished the work.
    Done,
    /// 202: accepted but not finished; a recovery scan must retry.
    Accepted,
    /// 410: the participant no longer remembers the work; counts as done.
    Gone,
}

/// A callback attempt that did not produce a usable response.
///
/// Transport failures leave the participant in doubt for a recovery
/// retry; a timeout or an explicit error status marks the leg failed.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// No response within the configured per-attempt bound.
    #[error("callback timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure.
    #[error("callback transport error: {0}")]
    Transport(String),

    /// The participant answered with an unexpected HTTP status.
    #[error("participant returned HTTP {0}")]
    Status(u16),
}

/// Outbound calls the coordinator makes against enlisted participants.
///
/// Implementations must bound every attempt by a timeout; the coordinator
/// never retries inline and relies on the recovery scheduler instead.
#[async_trait]
pub trait ParticipantClient: Send + Sync {
    /// Invokes the participant's complete callback.
    async fn complete(
        &self,
        url: &str,
        lra: LraId,
        user_data: Option<&str>,
    ) -> Result<CallbackOutcome, CallbackError>;

    /// Invokes the participant's compensate callback.
    async fn compensate(
        &self,
        url: &str,
        lra: LraId,
        user_data: Option<&str>,
    ) -> Result<CallbackOutcome, CallbackError>;

    /// Queries the participant's own view of its status.
    async fn status(&self, url: &str, lra: LraId) -> Result<ParticipantStatus, CallbackError>;

    /// Tells the participant it may drop its memory of the LRA.
    async fn forget(&self, url: &str, lra: LraId) -> Result<(), CallbackError>;

    /// Best-effort notification of the final LRA status. Failures are
    /// logged by callers and never affect the saga outcome.
    async fn after_lra(
        &self,
        url: &str,
        lra: LraId,
        final_status: LraStatus,
    ) -> Result<(), CallbackError>;
}

/// Scripted reply for one callback attempt on the in-memory client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    Done,
    Accepted,
    Gone,
    /// Reply with the given HTTP error status.
    Fail(u16),
    /// Simulate a timed-out attempt.
    Timeout,
    /// Simulate a connection-level failure.
    Unreachable,
}

#[derive(Debug, Default)]
struct EndpointState {
    complete_script: VecDeque<Scripted>,
    compensate_script: VecDeque<Scripted>,
    status_reply: Option<ParticipantStatus>,
    completions: u32,
    compensations: u32,
    complete_calls: u32,
    compensate_calls: u32,
    forget_calls: u32,
    after_calls: u32,
}

impl EndpointState {
    fn next_complete(&mut self) -> Result<CallbackOutcome, CallbackError> {
        self.complete_calls += 1;
        // An exhausted script means the participant behaves normally.
        let reply = self.complete_script.pop_front().unwrap_or(Scripted::Done);
        if reply == Scripted::Done {
            self.completions += 1;
        }
        reply.into_result()
    }

    fn next_compensate(&mut self) -> Result<CallbackOutcome, CallbackError> {
        self.compensate_calls += 1;
        let reply = self.compensate_script.pop_front().unwrap_or(Scripted::Done);
        if reply == Scripted::Done {
            self.compensations += 1;
        }
        reply.into_result()
    }
}

impl Scripted {
    fn into_result(self) -> Result<CallbackOutcome, CallbackError> {
        match self {
            Scripted::Done => Ok(CallbackOutcome::Done),
            Scripted::Accepted => Ok(CallbackOutcome::Accepted),
            Scripted::Gone => Ok(CallbackOutcome::Gone),
            Scripted::Fail(code) => Err(CallbackError::Status(code)),
            Scripted::Timeout => Err(CallbackError::Timeout(Duration::from_millis(0))),
            Scripted::Unreachable => {
                Err(CallbackError::Transport("connection refused".to_string()))
            }
        }
    }
}

/// In-memory participant client for testing.
///
/// Each callback URL gets an independent script of replies and a set of
/// invocation counters, mirroring the completion/compensation counting the
/// protocol's behavioral tests assert on.
#[derive(Debug, Clone, Default)]
pub struct InMemoryParticipantClient {
    endpoints: Arc<RwLock<HashMap<String, EndpointState>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl InMemoryParticipantClient {
    /// Creates a new in-memory participant client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a scripted reply for the next complete call on `url`.
    pub fn script_complete(&self, url: &str, reply: Scripted) {
        let mut endpoints = self.endpoints.write().unwrap();
        endpoints
            .entry(url.to_string())
            .or_default()
            .complete_script
            .push_back(reply);
    }

    /// Queues a scripted reply for the next compensate call on `url`.
    pub fn script_compensate(&self, url: &str, reply: Scripted) {
        let mut endpoints = self.endpoints.write().unwrap();
        endpoints
            .entry(url.to_string())
            .or_default()
            .compensate_script
            .push_back(reply);
    }

    /// Sets the status the participant reports when queried.
    pub fn set_status_reply(&self, url: &str, status: ParticipantStatus) {
        let mut endpoints = self.endpoints.write().unwrap();
        endpoints.entry(url.to_string()).or_default().status_reply = Some(status);
    }

    /// Number of acknowledged completions for `url`.
    pub fn completion_count(&self, url: &str) -> u32 {
        self.endpoints
            .read()
            .unwrap()
            .get(url)
            .map_or(0, |e| e.completions)
    }

    /// Number of acknowledged compensations for `url`.
    pub fn compensation_count(&self, url: &str) -> u32 {
        self.endpoints
            .read()
            .unwrap()
            .get(url)
            .map_or(0, |e| e.compensations)
    }

    /// Number of complete attempts made against `url`, acknowledged or not.
    pub fn complete_call_count(&self, url: &str) -> u32 {
        self.endpoints
            .read()
            .unwrap()
            .get(url)
            .map_or(0, |e| e.complete_calls)
    }

    /// Number of compensate attempts made against `url`.
    pub fn compensate_call_count(&self, url: &str) -> u32 {
        self.endpoints
            .read()
            .unwrap()
            .get(url)
            .map_or(0, |e| e.compensate_calls)
    }

    /// Number of forget calls made against `url`.
    pub fn forget_count(&self, url: &str) -> u32 {
        self.endpoints
            .read()
            .unwrap()
            .get(url)
            .map_or(0, |e| e.forget_calls)
    }

    /// Every complete/compensate URL invoked, in invocation order.
    pub fn call_log(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    /// Number of afterLRA notifications delivered to `url`.
    pub fn after_count(&self, url: &str) -> u32 {
        self.endpoints
            .read()
            .unwrap()
            .get(url)
            .map_or(0, |e| e.after_calls)
    }
}

#[async_trait]
impl ParticipantClient for InMemoryParticipantClient {
    async fn complete(
        &self,
        url: &str,
        _lra: LraId,
        _user_data: Option<&str>,
    ) -> Result<CallbackOutcome, CallbackError> {
        self.calls.write().unwrap().push(url.to_string());
        let mut endpoints = self.endpoints.write().unwrap();
        endpoints.entry(url.to_string()).or_default().next_complete()
    }

    async fn compensate(
        &self,
        url: &str,
        _lra: LraId,
        _user_data: Option<&str>,
    ) -> Result<CallbackOutcome, CallbackError> {
        self.calls.write().unwrap().push(url.to_string());
        let mut endpoints = self.endpoints.write().unwrap();
        endpoints
            .entry(url.to_string())
            .or_default()
            .next_compensate()
    }

    async fn status(&self, url: &str, _lra: LraId) -> Result<ParticipantStatus, CallbackError> {
        self.endpoints
            .read()
            .unwrap()
            .get(url)
            .and_then(|e| e.status_reply)
            .ok_or(CallbackError::Status(404))
    }

    async fn forget(&self, url: &str, _lra: LraId) -> Result<(), CallbackError> {
        let mut endpoints = self.endpoints.write().unwrap();
        endpoints.entry(url.to_string()).or_default().forget_calls += 1;
        Ok(())
    }

    async fn after_lra(
        &self,
        url: &str,
        _lra: LraId,
        _final_status: LraStatus,
    ) -> Result<(), CallbackError> {
        let mut endpoints = self.endpoints.write().unwrap();
        endpoints.entry(url.to_string()).or_default().after_calls += 1;
        Ok(())
    }
}
