//! HTTP transport for the agent server.
//!
//! Bounded calls (create, submit, delete, discovery) race the request against
//! the configured timeout and the caller's cancellation token. The event
//! stream has no timeout and is only bounded by cancellation.

use bytes::Bytes;
use futures::Stream;
use opencode_chat_core::PromptPart;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::config::OpenCodeConfig;
use crate::error::{ModelError, ModelResult, Step};
use crate::model::TokenCallback;
use crate::stream::EventStream;
use crate::types::{CreateSessionRequest, ModelRef, PromptReply, PromptRequest, Session};

/// Raw body of the event stream.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Client for one agent server.
#[derive(Debug, Clone)]
pub struct OpenCodeClient {
    http: reqwest::Client,
    config: Arc<OpenCodeConfig>,
}

impl OpenCodeClient {
    /// Create a client with a default HTTP client.
    pub fn new(config: OpenCodeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config: Arc::new(config),
        }
    }

    /// Set a custom HTTP client.
    ///
    /// The client must not carry a global request timeout, or long event
    /// streams will be cut off.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// The configuration this client was built from.
    #[must_use]
    pub fn config(&self) -> &OpenCodeConfig {
        &self.config
    }

    fn model_ref(&self) -> ModelRef {
        ModelRef {
            provider_id: self.config.provider_id().to_string(),
            model_id: self.config.model_id().to_string(),
        }
    }

    /// Start a request, attaching bearer auth when a key is configured.
    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.http.request(method, url);
        match self.config.api_key() {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Run `fut` under the configured deadline and `cancel`.
    pub(crate) async fn bounded<T, F>(
        &self,
        step: Step,
        cancel: &CancellationToken,
        fut: F,
    ) -> ModelResult<T>
    where
        F: Future<Output = ModelResult<T>>,
    {
        let deadline = self.config.timeout();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ModelError::Cancelled(step)),
            result = tokio::time::timeout(deadline, fut) => {
                result.unwrap_or_else(|_| Err(ModelError::timeout(step, deadline)))
            }
        }
    }

    /// Send a bounded request and return the body of a 2xx response.
    pub(crate) async fn send(
        &self,
        step: Step,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> ModelResult<String> {
        let deadline = self.config.timeout();
        self.bounded(step, cancel, async move {
            let response = request
                .send()
                .await
                .map_err(|e| ModelError::from_reqwest(step, e, deadline))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| ModelError::from_reqwest(step, e, deadline))?;

            if !status.is_success() {
                error!(%step, status = %status, body = %body, "Request failed");
                return Err(ModelError::transport(step, status.as_u16(), body));
            }

            Ok(body)
        })
        .await
    }

    /// Create a session. `POST /session`.
    #[instrument(skip(self, cancel), fields(agent = %self.config.agent()))]
    pub async fn create_session(&self, cancel: &CancellationToken) -> ModelResult<Session> {
        let step = Step::CreateSession;
        let payload = CreateSessionRequest {
            agent: self.config.agent().to_string(),
            model: self.model_ref(),
        };
        let request = self
            .request(Method::POST, self.config.endpoint(&["session"]))
            .json(&payload);

        let body = self.send(step, request, cancel).await?;

        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| ModelError::protocol(step, format!("response is not JSON: {e}")))?;
        let session = Session::from_response(&value).ok_or_else(|| {
            ModelError::protocol(step, format!("response has no string `id`: {body}"))
        })?;

        debug!(session_id = %session.id, "Session created");
        Ok(session)
    }

    /// Submit prompt parts. `POST /session/{id}/prompt`.
    #[instrument(skip(self, parts, cancel), fields(parts = parts.len()))]
    pub async fn submit_prompt(
        &self,
        session_id: &str,
        parts: Vec<PromptPart>,
        cancel: &CancellationToken,
    ) -> ModelResult<PromptReply> {
        let payload = PromptRequest {
            parts,
            agent: self.config.agent().to_string(),
            model: self.model_ref(),
            temperature: self.config.temperature(),
            max_tokens: self.config.max_tokens().and_then(|m| m.limit()),
        };
        let request = self
            .request(
                Method::POST,
                self.config.endpoint(&["session", session_id, "prompt"]),
            )
            .json(&payload);

        let body = self.send(Step::SubmitPrompt, request, cancel).await?;
        debug!(bytes = body.len(), "Prompt accepted");
        Ok(PromptReply::from_body(&body))
    }

    /// Delete a session. `DELETE /session/{id}`.
    ///
    /// Best-effort: never fails and ignores caller cancellation. Problems are
    /// logged.
    #[instrument(skip(self))]
    pub async fn delete_session(&self, session_id: &str) {
        let request = self.request(
            Method::DELETE,
            self.config.endpoint(&["session", session_id]),
        );

        match self
            .send(Step::DeleteSession, request, &CancellationToken::new())
            .await
        {
            Ok(_) => debug!("Session deleted"),
            Err(e) => warn!(error = %e, "Session cleanup failed"),
        }
    }

    /// Open the event stream. `GET /event`.
    ///
    /// Returns once response headers arrive. The returned stream yields the
    /// text increments of `session_id`.
    #[instrument(skip(self, on_token, cancel))]
    pub async fn open_event_stream(
        &self,
        session_id: &str,
        on_token: Option<TokenCallback>,
        cancel: &CancellationToken,
    ) -> ModelResult<EventStream<ByteStream>> {
        let step = Step::OpenEventStream;
        let request = self
            .request(Method::GET, self.config.endpoint(&["event"]))
            .header(ACCEPT, "text/event-stream");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ModelError::Cancelled(step)),
            result = request.send() => result.map_err(|e| ModelError::from_reqwest(step, e, self.config.timeout()))?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ModelError::Cancelled(step)),
                body = response.text() => body.unwrap_or_default(),
            };
            error!(status = %status, body = %body, "Event stream rejected");
            return Err(ModelError::transport(step, status.as_u16(), body));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(ct) = content_type.filter(|ct| !ct.starts_with("text/event-stream")) {
            return Err(ModelError::protocol(
                step,
                format!("expected an event stream body, got content type {ct:?}"),
            ));
        }

        debug!("Event stream open");
        let bytes: ByteStream = Box::pin(response.bytes_stream());
        Ok(EventStream::new(bytes, session_id, on_token))
    }
}
