//! Chat model backed by an agent server session.
//!
//! Every call runs in its own short-lived session:
//!
//! ```text
//! create session -> open event stream -> submit prompt -> drain -> delete session
//! ```
//!
//! Once a session id exists, the delete runs on every exit path, including
//! errors, cancellation, and a stream dropped before it finished.

use async_trait::async_trait;
use futures::StreamExt;
use opencode_chat_core::{to_prompt_parts, ChatMessage, PromptPart};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{ByteStream, OpenCodeClient};
use crate::config::{OpenCodeConfig, ResponseMode};
use crate::error::{ModelError, ModelResult, Step};
use crate::model::{CallOptions, ChatModel, CompletionResult, TextStream, TokenCallback};
use crate::session::SessionGuard;
use crate::stream::EventStream;

/// Chat model that talks to an opencode-style agent server.
#[derive(Debug, Clone)]
pub struct OpenCodeChatModel {
    name: String,
    client: OpenCodeClient,
}

/// Where the reply text comes from once the prompt is accepted.
enum Reply {
    Events(EventStream<ByteStream>),
    Inline(Vec<String>),
}

/// A call whose prompt has been accepted.
struct Submitted {
    session_id: String,
    guard: SessionGuard,
    reply: Reply,
}

impl OpenCodeChatModel {
    /// Create a model from a validated configuration.
    pub fn new(config: OpenCodeConfig) -> Self {
        let name = format!("{}/{}", config.provider_id(), config.model_id());
        Self {
            name,
            client: OpenCodeClient::new(config),
        }
    }

    /// Create from `OPENCODE_*` environment variables.
    pub fn from_env() -> ModelResult<Self> {
        OpenCodeConfig::from_env().map(Self::new)
    }

    /// Set a custom HTTP client.
    #[must_use]
    pub fn with_client(mut self, http: reqwest::Client) -> Self {
        self.client = self.client.with_http_client(http);
        self
    }

    /// The model's configuration.
    #[must_use]
    pub fn config(&self) -> &OpenCodeConfig {
        self.client.config()
    }

    /// The underlying transport client, e.g. for discovery calls.
    #[must_use]
    pub fn client(&self) -> &OpenCodeClient {
        &self.client
    }

    async fn submit(
        &self,
        messages: &[ChatMessage],
        options: &CallOptions,
        cancel: &CancellationToken,
    ) -> ModelResult<Submitted> {
        let parts = to_prompt_parts(messages);

        debug!(parts = parts.len(), "Creating session");
        let session = self.client.create_session(cancel).await?;
        let guard = SessionGuard::new(self.client.clone(), session.id.clone());

        match self.send_prompt(&session.id, parts, options, cancel).await {
            Ok(reply) => Ok(Submitted {
                session_id: session.id,
                guard,
                reply,
            }),
            Err(e) => {
                debug!(session_id = %session.id, error = %e, "Call failed, deleting session");
                guard.release().await;
                Err(e)
            }
        }
    }

    async fn send_prompt(
        &self,
        session_id: &str,
        parts: Vec<PromptPart>,
        options: &CallOptions,
        cancel: &CancellationToken,
    ) -> ModelResult<Reply> {
        match self.config().response_mode() {
            ResponseMode::EventStream => {
                // Subscribe first so no event from this prompt can be missed.
                let events = self
                    .client
                    .open_event_stream(session_id, options.on_token.clone(), cancel)
                    .await?;
                debug!(session_id, "Submitting prompt");
                self.client.submit_prompt(session_id, parts, cancel).await?;
                debug!(session_id, "Streaming");
                Ok(Reply::Events(events))
            }
            ResponseMode::Inline => {
                debug!(session_id, "Submitting prompt");
                let reply = self.client.submit_prompt(session_id, parts, cancel).await?;
                let texts = reply
                    .parts
                    .iter()
                    .filter_map(PromptPart::as_text)
                    .filter(|text| !text.is_empty())
                    .map(str::to_string)
                    .collect();
                Ok(Reply::Inline(texts))
            }
        }
    }
}

/// Concatenate every increment, stopping early on cancellation.
async fn drain(
    mut events: EventStream<ByteStream>,
    cancel: &CancellationToken,
) -> ModelResult<String> {
    let mut text = String::new();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ModelError::Cancelled(Step::ReadEventStream)),
            next = events.next() => match next {
                Some(Ok(chunk)) => text.push_str(&chunk),
                Some(Err(e)) => return Err(e),
                None => return Ok(text),
            },
        }
    }
}

fn notify(on_token: Option<&TokenCallback>, text: &str) {
    if let Some(callback) = on_token {
        callback(text);
    }
}

#[async_trait]
impl ChatModel for OpenCodeChatModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn system(&self) -> &str {
        "opencode"
    }

    async fn invoke(
        &self,
        messages: &[ChatMessage],
        options: &CallOptions,
    ) -> Result<CompletionResult, ModelError> {
        let cancel = options.token();
        let Submitted {
            session_id,
            guard,
            reply,
        } = self.submit(messages, options, &cancel).await?;

        let (outcome, step) = match reply {
            Reply::Events(events) => (drain(events, &cancel).await, Step::ReadEventStream),
            Reply::Inline(texts) => {
                for text in &texts {
                    notify(options.on_token.as_ref(), text);
                }
                (Ok(texts.concat()), Step::SubmitPrompt)
            }
        };

        debug!(%session_id, ok = outcome.is_ok(), "Deleting session");
        guard.release().await;

        let text = outcome?;
        if text.is_empty() {
            return Err(ModelError::protocol(step, "empty response"));
        }
        debug!(%session_id, chars = text.len(), "Completed");
        Ok(CompletionResult::new(text, session_id))
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &CallOptions,
    ) -> Result<TextStream, ModelError> {
        let cancel = options.token();
        let Submitted {
            session_id,
            guard,
            reply,
        } = self.submit(messages, options, &cancel).await?;
        let on_token = options.on_token.clone();

        let stream = async_stream::stream! {
            let mut failure = None;

            match reply {
                Reply::Events(mut events) => loop {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            failure = Some(ModelError::Cancelled(Step::ReadEventStream));
                            break;
                        }
                        next = events.next() => next,
                    };
                    match next {
                        Some(Ok(text)) => {
                            yield Ok(text);
                        }
                        Some(Err(e)) => {
                            failure = Some(e);
                            break;
                        }
                        None => break,
                    }
                },
                Reply::Inline(texts) => {
                    for text in texts {
                        notify(on_token.as_ref(), &text);
                        yield Ok(text);
                    }
                }
            }

            debug!(%session_id, ok = failure.is_none(), "Deleting session");
            guard.release().await;

            if let Some(e) = failure {
                yield Err(e);
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn text_event(session: &str, text: &str) -> String {
        format!(
            "data: {}\n\n",
            json!({
                "type": "message.part.updated",
                "properties": {"part": {
                    "type": "text", "text": text, "sessionID": session, "messageID": "m2", "id": format!("p-{text}")
                }}
            })
        )
    }

    fn idle_event(session: &str) -> String {
        format!(
            "data: {}\n\n",
            json!({"type": "session.idle", "properties": {"sessionID": session}})
        )
    }

    fn sse(body: String) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/event-stream")
    }

    /// Mount create, prompt, delete, and event routes for session `s1`.
    async fn mock_server(events: String, prompt: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "s1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/s1/prompt"))
            .respond_with(prompt)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/session/s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/event"))
            .respond_with(sse(events))
            .mount(&server)
            .await;
        server
    }

    fn model_for(server: &MockServer) -> OpenCodeChatModel {
        OpenCodeChatModel::new(
            OpenCodeConfig::builder(server.uri(), "anthropic", "claude-3-5-sonnet")
                .timeout(Duration::from_millis(500))
                .build()
                .unwrap(),
        )
    }

    async fn count(server: &MockServer, verb: &str, route: &str) -> usize {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == verb && r.url.path() == route)
            .count()
    }

    async fn wait_for_delete(server: &MockServer) -> usize {
        for _ in 0..50 {
            let deletes = count(server, "DELETE", "/session/s1").await;
            if deletes > 0 {
                return deletes;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        0
    }

    #[test]
    fn test_model_identity() {
        let config = OpenCodeConfig::builder("http://localhost:4096", "anthropic", "claude")
            .build()
            .unwrap();
        let model = OpenCodeChatModel::new(config);
        assert_eq!(model.name(), "anthropic/claude");
        assert_eq!(model.system(), "opencode");
        assert_eq!(model.identifier(), "opencode:anthropic/claude");
    }

    #[tokio::test]
    async fn test_invoke_collects_text_and_deletes_once() {
        let events = format!("{}{}", text_event("s1", "Hello"), idle_event("s1"));
        let server = mock_server(events, ResponseTemplate::new(200)).await;

        let result = model_for(&server)
            .invoke(&[ChatMessage::user("Say hello")], &CallOptions::new())
            .await
            .unwrap();

        assert_eq!(result.text, "Hello");
        assert_eq!(result.message, ChatMessage::assistant("Hello"));
        assert_eq!(result.session_id, "s1");
        assert_eq!(count(&server, "DELETE", "/session/s1").await, 1);

        let requests = server.received_requests().await.unwrap_or_default();
        let prompt = requests
            .iter()
            .find(|r| r.url.path() == "/session/s1/prompt")
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&prompt.body).unwrap();
        assert_eq!(body["parts"], json!([{"type": "text", "text": "Say hello"}]));
        assert_eq!(
            body["model"],
            json!({"providerID": "anthropic", "modelID": "claude-3-5-sonnet"})
        );
    }

    #[tokio::test]
    async fn test_invoke_skips_other_sessions_and_reports_tokens() {
        let events = format!(
            "{}{}{}{}",
            text_event("other", "noise"),
            text_event("s1", "Hel"),
            text_event("s1", "lo"),
            idle_event("s1")
        );
        let server = mock_server(events, ResponseTemplate::new(200)).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = CallOptions::new().with_on_token(move |t| sink.lock().unwrap().push(t.to_string()));

        let result = model_for(&server)
            .invoke(&[ChatMessage::user("hi")], &options)
            .await
            .unwrap();

        assert_eq!(result.text, "Hello");
        assert_eq!(*seen.lock().unwrap(), vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_missing_session_id_skips_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"createdAt": "now"})))
            .mount(&server)
            .await;

        let err = model_for(&server)
            .invoke(&[ChatMessage::user("hi")], &CallOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ModelError::Protocol {
                step: Step::CreateSession,
                ..
            }
        ));
        let requests = server.received_requests().await.unwrap_or_default();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_timeout_still_deletes() {
        let server = mock_server(
            idle_event("s1"),
            ResponseTemplate::new(200).set_delay(Duration::from_secs(3)),
        )
        .await;

        let err = model_for(&server)
            .invoke(&[ChatMessage::user("hi")], &CallOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ModelError::Timeout {
                step: Step::SubmitPrompt,
                ..
            }
        ));
        assert!(err.to_string().contains("500ms"));
        assert_eq!(count(&server, "DELETE", "/session/s1").await, 1);
    }

    #[tokio::test]
    async fn test_submit_failure_still_deletes() {
        let server = mock_server(
            idle_event("s1"),
            ResponseTemplate::new(400).set_body_string("bad model"),
        )
        .await;

        let err = model_for(&server)
            .invoke(&[ChatMessage::user("hi")], &CallOptions::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("submit prompt"));
        assert!(err.to_string().contains("bad model"));
        assert!(!err.is_retryable());
        assert_eq!(count(&server, "DELETE", "/session/s1").await, 1);
    }

    #[tokio::test]
    async fn test_empty_response_is_error() {
        let server = mock_server(idle_event("s1"), ResponseTemplate::new(200)).await;

        let err = model_for(&server)
            .invoke(&[ChatMessage::user("hi")], &CallOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::Protocol { ref message, .. } if message == "empty response"));
        assert_eq!(count(&server, "DELETE", "/session/s1").await, 1);
    }

    #[tokio::test]
    async fn test_cleanup_failure_does_not_mask_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "s1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/s1/prompt"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/session/s1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/event"))
            .respond_with(sse(format!("{}{}", text_event("s1", "ok"), idle_event("s1"))))
            .mount(&server)
            .await;

        let result = model_for(&server)
            .invoke(&[ChatMessage::user("hi")], &CallOptions::new())
            .await
            .unwrap();
        assert_eq!(result.text, "ok");
    }

    #[tokio::test]
    async fn test_stream_yields_each_increment() {
        let events = format!(
            "{}{}{}data: [DONE]\n\n",
            text_event("s1", "a"),
            text_event("s1", "b"),
            text_event("s1", "c")
        );
        let server = mock_server(events, ResponseTemplate::new(200)).await;

        let stream = model_for(&server)
            .stream(&[ChatMessage::user("hi")], &CallOptions::new())
            .await
            .unwrap();
        let chunks: Vec<String> = stream.map(|r| r.unwrap()).collect().await;

        assert_eq!(chunks, vec!["a", "b", "c"]);
        assert_eq!(count(&server, "DELETE", "/session/s1").await, 1);
    }

    #[tokio::test]
    async fn test_stream_dropped_early_still_deletes() {
        let events = format!("{}{}", text_event("s1", "a"), text_event("s1", "b"));
        let server = mock_server(events, ResponseTemplate::new(200)).await;

        let mut stream = model_for(&server)
            .stream(&[ChatMessage::user("hi")], &CallOptions::new())
            .await
            .unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        drop(stream);

        assert_eq!(wait_for_delete(&server).await, 1);
    }

    #[tokio::test]
    async fn test_stream_never_polled_still_deletes() {
        let server = mock_server(idle_event("s1"), ResponseTemplate::new(200)).await;

        let stream = model_for(&server)
            .stream(&[ChatMessage::user("hi")], &CallOptions::new())
            .await
            .unwrap();
        drop(stream);

        assert_eq!(wait_for_delete(&server).await, 1);
    }

    #[tokio::test]
    async fn test_stream_cancelled_mid_read_ends_with_error_and_deletes() {
        let events = format!("{}{}", text_event("s1", "a"), text_event("s1", "b"));
        let server = mock_server(events, ResponseTemplate::new(200)).await;
        let token = CancellationToken::new();

        let mut stream = model_for(&server)
            .stream(
                &[ChatMessage::user("hi")],
                &CallOptions::new().with_cancellation(token.clone()),
            )
            .await
            .unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "a");

        token.cancel();
        let rest: Vec<_> = stream.collect().await;

        assert_eq!(rest.len(), 1);
        assert!(matches!(
            rest.last(),
            Some(Err(ModelError::Cancelled(Step::ReadEventStream)))
        ));
        assert_eq!(count(&server, "DELETE", "/session/s1").await, 1);
    }

    #[tokio::test]
    async fn test_invoke_dropped_in_flight_still_deletes() {
        let server = mock_server(
            format!("{}{}", text_event("s1", "late"), idle_event("s1")),
            ResponseTemplate::new(200).set_delay(Duration::from_millis(300)),
        )
        .await;
        let model = model_for(&server);

        let outcome = tokio::time::timeout(
            Duration::from_millis(100),
            model.invoke(&[ChatMessage::user("hi")], &CallOptions::new()),
        )
        .await;

        assert!(outcome.is_err());
        assert_eq!(count(&server, "POST", "/session").await, 1);
        assert_eq!(wait_for_delete(&server).await, 1);
    }

    #[tokio::test]
    async fn test_cancel_before_start_creates_nothing() {
        let server = mock_server(idle_event("s1"), ResponseTemplate::new(200)).await;
        let token = CancellationToken::new();
        token.cancel();

        let err = model_for(&server)
            .invoke(
                &[ChatMessage::user("hi")],
                &CallOptions::new().with_cancellation(token),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::Cancelled(Step::CreateSession)));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_on_stream_deletes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "s1"})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/session/s1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/event"))
            .respond_with(sse(idle_event("s1")).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = model_for(&server)
            .invoke(
                &[ChatMessage::user("hi")],
                &CallOptions::new().with_cancellation(token),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::Cancelled(Step::OpenEventStream)));
        assert_eq!(count(&server, "DELETE", "/session/s1").await, 1);
        assert_eq!(count(&server, "POST", "/session/s1/prompt").await, 0);
    }

    #[tokio::test]
    async fn test_inline_mode_reads_submit_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "s1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/s1/prompt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "info": {"id": "m2", "role": "assistant"},
                "parts": [
                    {"type": "text", "text": "Hi "},
                    {"type": "tool", "tool": "bash", "callID": "c1"},
                    {"type": "text", "text": "there"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/session/s1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let model = OpenCodeChatModel::new(
            OpenCodeConfig::builder(server.uri(), "p", "m")
                .response_mode(ResponseMode::Inline)
                .build()
                .unwrap(),
        );

        let result = model
            .invoke(&[ChatMessage::user("hi")], &CallOptions::new())
            .await
            .unwrap();
        assert_eq!(result.text, "Hi there");
        assert_eq!(count(&server, "GET", "/event").await, 0);
        assert_eq!(count(&server, "DELETE", "/session/s1").await, 1);

        let chunks: Vec<String> = model
            .stream(&[ChatMessage::user("hi")], &CallOptions::new())
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["Hi ", "there"]);
        assert_eq!(count(&server, "DELETE", "/session/s1").await, 2);
    }
}
