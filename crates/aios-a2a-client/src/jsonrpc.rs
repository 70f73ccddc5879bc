//! JSON-RPC transport: `message/stream` requests answered by an SSE stream
//! of JSON-RPC responses, one wire event per frame.

use std::time::Duration;

use aios_protocol::jsonrpc::METHOD_MESSAGE_STREAM;
use aios_protocol::{
    A2aClient, A2aClientFactory, A2aError, A2aResult, AgentCard, JsonRpcRequest, JsonRpcResponse,
    MessageSendParams, TRANSPORT_JSONRPC, WireEvent, WireEventStream,
};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{StreamExt, future};
use reqwest::header::ACCEPT;
use tracing::{debug, instrument};
use uuid::Uuid;

fn transport_error(error: impl std::fmt::Display) -> A2aError {
    A2aError::Transport(error.to_string())
}

/// Builds [`JsonRpcClient`]s for cards that offer the JSON-RPC transport.
#[derive(Debug, Clone, Default)]
pub struct HttpClientFactory {
    http: reqwest::Client,
}

impl HttpClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Streams stay open as long as the peer is working, so only the
    /// connect phase is bounded.
    pub fn with_connect_timeout(timeout: Duration) -> A2aResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(transport_error)?;
        Ok(Self { http })
    }
}

#[async_trait]
impl A2aClientFactory for HttpClientFactory {
    async fn create(&self, card: &AgentCard) -> A2aResult<Box<dyn A2aClient>> {
        let interfaces = card.interfaces();
        let Some(interface) = interfaces
            .iter()
            .find(|i| i.transport.eq_ignore_ascii_case(TRANSPORT_JSONRPC))
        else {
            let offered: Vec<&str> = interfaces.iter().map(|i| i.transport.as_str()).collect();
            return Err(A2aError::NoCompatibleTransport {
                offered: offered.join(", "),
                supported: TRANSPORT_JSONRPC.to_owned(),
            });
        };
        debug!(agent = %card.name, url = %interface.url, "using JSON-RPC transport");
        Ok(Box::new(JsonRpcClient::new(self.http.clone(), interface.url.clone())))
    }
}

#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    endpoint: String,
}

impl JsonRpcClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl A2aClient for JsonRpcClient {
    #[instrument(skip(self, params), fields(endpoint = %self.endpoint))]
    async fn send_streaming_message(&self, params: MessageSendParams) -> A2aResult<WireEventStream> {
        let request = JsonRpcRequest::new(
            Uuid::new_v4().to_string(),
            METHOD_MESSAGE_STREAM,
            serde_json::to_value(&params)?,
        );
        let response = self
            .http
            .post(&self.endpoint)
            .header(ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(A2aError::Transport(format!("{status}: {body}")));
        }

        let frames = response
            .bytes_stream()
            .eventsource()
            .filter_map(|frame| {
                future::ready(match frame {
                    Err(error) => Some(Err(transport_error(error))),
                    Ok(event) if event.data.trim().is_empty() => None,
                    Ok(event) => Some(parse_frame(&event.data)),
                })
            });
        Ok(frames.boxed())
    }
}

fn parse_frame(data: &str) -> A2aResult<WireEvent> {
    let response: JsonRpcResponse = serde_json::from_str(data)
        .map_err(|e| A2aError::Transport(format!("malformed frame: {e}")))?;
    if let Some(error) = response.error {
        return Err(A2aError::Transport(format!(
            "peer error {}: {}",
            error.code, error.message
        )));
    }
    let result = response
        .result
        .ok_or_else(|| A2aError::Transport("frame carries neither result nor error".into()))?;
    Ok(serde_json::from_value(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aios_protocol::jsonrpc::TASK_NOT_FOUND;
    use aios_protocol::{
        AgentInterface, ContextId, JsonRpcError, Message, MessageRole, TaskId, TaskRef, TaskState,
        TaskStatusUpdateEvent, WirePart,
    };
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse(frames: &[Value]) -> String {
        frames
            .iter()
            .map(|frame| format!("data: {frame}\n\n"))
            .collect()
    }

    fn params(text: &str) -> MessageSendParams {
        MessageSendParams {
            message: Message::new(MessageRole::User, vec![WirePart::text(text)]),
            configuration: None,
            metadata: Default::default(),
        }
    }

    fn working() -> WireEvent {
        let task = TaskRef {
            task_id: TaskId::from_string("t-1"),
            context_id: ContextId::from_string("c-1"),
        };
        TaskStatusUpdateEvent::new(&task, TaskState::Working, None).into()
    }

    async fn client_for(server: &MockServer) -> anyhow::Result<Box<dyn A2aClient>> {
        let card = AgentCard::new("peer", format!("{}/a2a", server.uri()));
        Ok(HttpClientFactory::new().create(&card).await?)
    }

    #[tokio::test]
    async fn streams_wire_events_from_sse_frames() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        let status = working();
        let reply = Message::new(MessageRole::Agent, vec![WirePart::text("hi")]);
        let body = sse(&[
            serde_json::to_value(JsonRpcResponse::success(
                json!("1"),
                serde_json::to_value(&status)?,
            ))?,
            serde_json::to_value(JsonRpcResponse::success(
                json!("1"),
                serde_json::to_value(WireEvent::Message(reply.clone()))?,
            ))?,
        ]);
        Mock::given(method("POST"))
            .and(path("/a2a"))
            .and(header("accept", "text/event-stream"))
            .and(body_partial_json(json!({"jsonrpc": "2.0", "method": "message/stream"})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await?;
        let events: Vec<WireEvent> = client
            .send_streaming_message(params("hello"))
            .await?
            .map(|event| event.map_err(anyhow::Error::from))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<anyhow::Result<_>>()?;

        assert_eq!(events, vec![status, WireEvent::Message(reply)]);
        Ok(())
    }

    #[tokio::test]
    async fn error_frame_becomes_transport_error() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        let body = sse(&[
            serde_json::to_value(JsonRpcResponse::success(
                json!(1),
                serde_json::to_value(working())?,
            ))?,
            serde_json::to_value(JsonRpcResponse::failure(
                json!(1),
                JsonRpcError::new(TASK_NOT_FOUND, "task gone"),
            ))?,
        ]);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let mut stream = client_for(&server)
            .await?
            .send_streaming_message(params("x"))
            .await?;
        assert!(matches!(stream.next().await, Some(Ok(WireEvent::StatusUpdate(_)))));
        match stream.next().await {
            Some(Err(A2aError::Transport(message))) => assert!(message.contains("task gone")),
            other => panic!("expected transport error, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn non_success_status_fails_the_call() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .await?
            .send_streaming_message(params("x"))
            .await;
        match result {
            Err(A2aError::Transport(message)) => assert!(message.contains("overloaded")),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("expected failure"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn unknown_kinds_pass_through() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        let body = sse(&[json!({"jsonrpc": "2.0", "id": 1, "result": {"kind": "heartbeat", "n": 1}})]);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let mut stream = client_for(&server)
            .await?
            .send_streaming_message(params("x"))
            .await?;
        match stream.next().await {
            Some(Ok(event)) => assert_eq!(event.kind(), "heartbeat"),
            other => panic!("expected unknown event, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn factory_rejects_cards_without_jsonrpc() {
        let mut card = AgentCard::new("grpc-only", "grpc://peer:50051");
        card.preferred_transport = Some("GRPC".into());
        card.additional_interfaces.push(AgentInterface {
            url: "http://peer/rest".into(),
            transport: "HTTP+JSON".into(),
        });
        match HttpClientFactory::new().create(&card).await {
            Err(A2aError::NoCompatibleTransport { offered, supported }) => {
                assert_eq!(offered, "GRPC, HTTP+JSON");
                assert_eq!(supported, "JSONRPC");
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("expected no compatible transport"),
        }
    }

    #[tokio::test]
    async fn factory_picks_additional_jsonrpc_interface() -> anyhow::Result<()> {
        let mut card = AgentCard::new("mixed", "grpc://peer:50051");
        card.preferred_transport = Some("GRPC".into());
        card.additional_interfaces.push(AgentInterface {
            url: "http://peer/jsonrpc".into(),
            transport: "jsonrpc".into(),
        });
        // Only construction is checked here; no request is sent.
        let _client = HttpClientFactory::new().create(&card).await?;
        Ok(())
    }
}
