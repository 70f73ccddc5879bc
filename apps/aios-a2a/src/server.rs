use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use aios_a2a::{ChannelEventQueue, CollectingEventQueue, Executor, RequestContext};
use aios_protocol::jsonrpc::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, METHOD_MESSAGE_STREAM,
    METHOD_NOT_FOUND, METHOD_TASKS_CANCEL, METHOD_TASKS_GET, PARSE_ERROR, TASK_NOT_FOUND,
};
use aios_protocol::{
    AgentCard, ContextId, JsonRpcError, JsonRpcRequest, JsonRpcResponse, MessageSendParams,
    TaskId, TaskIdParams, WireEvent,
};
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::tasks::{RecordingQueue, TaskRegistry};

const EVENT_BUFFER: usize = 64;

#[derive(Clone)]
pub struct AppState {
    pub card: Arc<AgentCard>,
    pub executor: Arc<Executor>,
    pub tasks: Arc<TaskRegistry>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(aios_protocol::AGENT_CARD_PATH, get(agent_card))
        .route("/", post(rpc))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "aios-a2a"
    }))
}

async fn agent_card(State(state): State<AppState>) -> Json<AgentCard> {
    Json(state.card.as_ref().clone())
}

async fn rpc(State(state): State<AppState>, body: String) -> Response {
    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(error) => return rpc_error(Value::Null, PARSE_ERROR, format!("parse error: {error}")),
    };
    if request.jsonrpc != JSONRPC_VERSION {
        return rpc_error(request.id, INVALID_REQUEST, "unsupported jsonrpc version");
    }

    match request.method.as_str() {
        METHOD_MESSAGE_STREAM => message_stream(state, request).await,
        METHOD_TASKS_GET => tasks_get(state, request),
        METHOD_TASKS_CANCEL => tasks_cancel(state, request).await,
        other => rpc_error(request.id, METHOD_NOT_FOUND, format!("method not found: {other}")),
    }
}

async fn message_stream(state: AppState, request: JsonRpcRequest) -> Response {
    let id = request.id;
    let params: MessageSendParams = match params(request.params) {
        Ok(params) => params,
        Err(message) => return rpc_error(id, INVALID_PARAMS, message),
    };
    let message = params.message;

    let stored_task = message.task_id.as_ref().and_then(|task_id| state.tasks.get(task_id));
    let task_id = stored_task
        .as_ref()
        .map(|task| task.id.clone())
        .unwrap_or_else(TaskId::new_uuid);
    let context_id = stored_task
        .as_ref()
        .map(|task| task.context_id.clone())
        .or_else(|| message.context_id.clone().filter(|c| !c.is_empty()))
        .unwrap_or_else(ContextId::new_uuid);

    let mut context = RequestContext::new(task_id.clone(), context_id.clone(), Some(message.clone()));
    if let Some(task) = stored_task {
        context = context.with_stored_task(task);
    }
    state.tasks.record_message(&task_id, &context_id, &message);
    info!(%task_id, %context_id, "message/stream accepted");

    let (queue, events) = ChannelEventQueue::channel(EVENT_BUFFER);
    let queue = RecordingQueue::new(state.tasks.clone(), queue);
    let executor = state.executor.clone();
    let tasks = state.tasks.clone();
    let run_task_id = task_id.clone();
    // The run waits until its abort handle is tracked so its untrack always comes last.
    let (tracked, gate) = oneshot::channel::<()>();
    let run = tokio::spawn(async move {
        let _ = gate.await;
        if let Err(error) = executor.execute(&context, &queue).await {
            warn!(task_id = %run_task_id, %error, "invocation aborted");
        }
        tasks.untrack(&run_task_id);
    });
    state.tasks.track(task_id, run.abort_handle());
    let _ = tracked.send(());

    let frames = events.map(move |event| Ok::<_, Infallible>(as_sse_frame(&id, &event)));
    Sse::new(frames)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive"))
        .into_response()
}

fn tasks_get(state: AppState, request: JsonRpcRequest) -> Response {
    let params: TaskIdParams = match params(request.params) {
        Ok(params) => params,
        Err(message) => return rpc_error(request.id, INVALID_PARAMS, message),
    };
    match state.tasks.get(&params.id) {
        Some(task) => rpc_result(request.id, &task),
        None => rpc_error(request.id, TASK_NOT_FOUND, format!("task {} not found", params.id)),
    }
}

async fn tasks_cancel(state: AppState, request: JsonRpcRequest) -> Response {
    let params: TaskIdParams = match params(request.params) {
        Ok(params) => params,
        Err(message) => return rpc_error(request.id, INVALID_PARAMS, message),
    };
    let Some(task) = state.tasks.get(&params.id) else {
        return rpc_error(request.id, TASK_NOT_FOUND, format!("task {} not found", params.id));
    };
    if state.tasks.abort(&task.id) {
        info!(task_id = %task.id, "in-flight run aborted");
    }

    let context = RequestContext::new(task.id.clone(), task.context_id.clone(), None)
        .with_stored_task(task);
    let queue = RecordingQueue::new(state.tasks.clone(), CollectingEventQueue::new());
    if let Err(error) = state.executor.cancel(&context, &queue).await {
        return rpc_error(request.id, INTERNAL_ERROR, error.to_string());
    }
    match state.tasks.get(&context.task_id) {
        Some(task) => rpc_result(request.id, &task),
        None => rpc_error(request.id, TASK_NOT_FOUND, "task vanished during cancel"),
    }
}

fn params<T: DeserializeOwned>(raw: Value) -> Result<T, String> {
    serde_json::from_value(raw).map_err(|error| format!("invalid params: {error}"))
}

fn rpc_result(id: Value, result: &impl serde::Serialize) -> Response {
    match serde_json::to_value(result) {
        Ok(result) => Json(JsonRpcResponse::success(id, result)).into_response(),
        Err(error) => rpc_error(id, INTERNAL_ERROR, error.to_string()),
    }
}

fn rpc_error(id: Value, code: i64, message: impl Into<String>) -> Response {
    Json(JsonRpcResponse::failure(id, JsonRpcError::new(code, message))).into_response()
}

fn as_sse_frame(id: &Value, event: &WireEvent) -> Event {
    let response = match serde_json::to_value(event) {
        Ok(result) => JsonRpcResponse::success(id.clone(), result),
        Err(error) => {
            JsonRpcResponse::failure(id.clone(), JsonRpcError::new(INTERNAL_ERROR, error.to_string()))
        }
    };
    let payload = serde_json::to_string(&response)
        .unwrap_or_else(|error| json!({ "error": error.to_string() }).to_string());
    Event::default().data(payload)
}
