//! HTTP participant callback client.

use std::time::Duration;

use async_trait::async_trait;
use common::{LRA_CONTEXT_HEADER, LraId};
use store::{LraStatus, ParticipantStatus};

use crate::client::{CallbackError, CallbackOutcome, ParticipantClient};

/// Default bound on a single callback attempt.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Invokes participant callbacks over HTTP.
///
/// Complete and compensate are PUTs carrying the LRA context header and
/// the participant's enlistment payload; status is a GET returning the
/// status name in the body; forget is a DELETE. Every attempt is bounded
/// by the configured timeout.
#[derive(Clone)]
pub struct HttpParticipantClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpParticipantClient {
    /// Creates a client with the given per-attempt timeout.
    pub fn new(timeout: Duration) -> Result<Self, CallbackError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| CallbackError::Transport(e.to_string()))?;
        Ok(Self { http, timeout })
    }

    fn map_error(&self, err: reqwest::Error) -> CallbackError {
        if err.is_timeout() {
            CallbackError::Timeout(self.timeout)
        } else {
            CallbackError::Transport(err.to_string())
        }
    }

    async fn put_callback(
        &self,
        url: &str,
        lra: LraId,
        body: Option<&str>,
    ) -> Result<CallbackOutcome, CallbackError> {
        let response = self
            .http
            .put(url)
            .header(LRA_CONTEXT_HEADER, lra.to_string())
            .body(body.unwrap_or_default().to_string())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        match response.status().as_u16() {
            200 => Ok(CallbackOutcome::Done),
            202 => Ok(CallbackOutcome::Accepted),
            410 => Ok(CallbackOutcome::Gone),
            code => Err(CallbackError::Status(code)),
        }
    }
}

#[async_trait]
impl ParticipantClient for HttpParticipantClient {
    async fn complete(
        &self,
        url: &str,
        lra: LraId,
        user_data: Option<&str>,
    ) -> Result<CallbackOutcome, CallbackError> {
        self.put_callback(url, lra, user_data).await
    }

    async fn compensate(
        &self,
        url: &str,
        lra: LraId,
        user_data: Option<&str>,
    ) -> Result<CallbackOutcome, CallbackError> {
        self.put_callback(url, lra, user_data).await
    }

    async fn status(&self, url: &str, lra: LraId) -> Result<ParticipantStatus, CallbackError> {
        let response = self
            .http
            .get(url)
            .header(LRA_CONTEXT_HEADER, lra.to_string())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let code = response.status().as_u16();
        if code != 200 {
            return Err(CallbackError::Status(code));
        }
        let body = response.text().await.map_err(|e| self.map_error(e))?;
        body.trim()
            .parse()
            .map_err(|_| CallbackError::Transport(format!("unparseable status body: {body:?}")))
    }

    async fn forget(&self, url: &str, lra: LraId) -> Result<(), CallbackError> {
        let response = self
            .http
            .delete(url)
            .header(LRA_CONTEXT_HEADER, lra.to_string())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        match response.status().as_u16() {
            200 | 204 | 410 => Ok(()),
            code => Err(CallbackError::Status(code)),
        }
    }

    async fn after_lra(
        &self,
        url: &str,
        lra: LraId,
        final_status: LraStatus,
    ) -> Result<(), CallbackError> {
        let response = self
            .http
            .put(url)
            .header(LRA_CONTEXT_HEADER, lra.to_string())
            .body(final_status.as_str())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        match response.status().as_u16() {
            200 | 204 => Ok(()),
            code => Err(CallbackError::Status(code)),
        }
    }
}
