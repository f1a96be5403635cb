//! Newline-delimited JSON tool-call server.
//!
//! Each input line is one request `{"id", "method", "params"}`; each output
//! line is one response carrying the same `id` and either a `result` or an
//! `error {code, message}`. Requests run concurrently, so responses are
//! written in completion order, not request order.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::errors::Error;
use crate::memory::store::{limit_from_i64, parse_id};
use crate::memory::MemoryStore;

const RESPONSE_BUFFER: usize = 64;

/// One request line.
#[derive(Debug, Deserialize)]
pub struct ToolRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// One response line.
#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, error: ToolError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Stable error codes exposed to tool callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    InvalidParams,
    MethodNotFound,
    Unavailable,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolError {
    pub code: ErrorCode,
    pub message: String,
}

impl ToolError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&Error> for ToolError {
    fn from(err: &Error) -> Self {
        let code = match err {
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::EmptyInput
            | Error::InputTooLong { .. }
            | Error::InvalidLimit(_)
            | Error::InvalidId(_)
            | Error::Json(_) => ErrorCode::InvalidParams,
            e if e.is_transient() || e.is_lifecycle() => ErrorCode::Unavailable,
            _ => ErrorCode::Internal,
        };
        // Driver text stays in the logs.
        let message = match err {
            Error::Statement { operation, .. } => format!("{operation} failed"),
            Error::ConnectionFailed { .. } => "Database unavailable".to_string(),
            other => other.to_string(),
        };
        Self { code, message }
    }
}

#[derive(Deserialize)]
struct AddParams {
    text: String,
}

#[derive(Deserialize)]
struct SearchParams {
    query: String,
    #[serde(default)]
    top_k: Option<i64>,
}

#[derive(Deserialize)]
struct GetParams {
    id: String,
}

fn params<T: DeserializeOwned>(params: Value) -> Result<T, Error> {
    // A missing params object reads as `{}` so the field error names the field.
    let params = if params.is_null() { json!({}) } else { params };
    Ok(serde_json::from_value(params)?)
}

/// Dispatches tool calls to a `MemoryStore`.
#[derive(Clone)]
pub struct ToolServer {
    store: MemoryStore,
    default_top_k: usize,
}

impl ToolServer {
    pub fn new(store: MemoryStore, default_top_k: usize) -> Self {
        Self {
            store,
            default_top_k,
        }
    }

    /// Answer one request. Never fails; errors become error responses.
    pub async fn handle(&self, request: ToolRequest) -> ToolResponse {
        let ToolRequest { id, method, params } = request;
        match self.dispatch(&method, params).await {
            Ok(result) => ToolResponse::success(id, result),
            Err(error) => {
                tracing::warn!(%method, code = ?error.code, reason = %error.message, "tool call failed");
                ToolResponse::failure(id, error)
            }
        }
    }

    async fn dispatch(&self, method: &str, raw: Value) -> Result<Value, ToolError> {
        let outcome = match method {
            "add_memory" => self.add_memory(raw).await,
            "search_memories" => self.search_memories(raw).await,
            "get_memory" => self.get_memory(raw).await,
            "health" => serde_json::to_value(self.store.health().await).map_err(Error::from),
            other => {
                return Err(ToolError::new(
                    ErrorCode::MethodNotFound,
                    format!("Unknown method: {other}"),
                ));
            }
        };
        outcome.map_err(|err| {
            if matches!(err, Error::Statement { .. } | Error::TaskFailed(_)) {
                tracing::error!(method, error = %err, "database failure");
            }
            ToolError::from(&err)
        })
    }

    async fn add_memory(&self, raw: Value) -> Result<Value, Error> {
        let AddParams { text } = params(raw)?;
        let id = self.store.add(&text).await?;
        Ok(json!({ "id": id }))
    }

    async fn search_memories(&self, raw: Value) -> Result<Value, Error> {
        let SearchParams { query, top_k } = params(raw)?;
        let top_k = match top_k {
            Some(n) => limit_from_i64(n)?,
            None => self.default_top_k,
        };
        let results = self.store.search(&query, top_k).await?;
        Ok(serde_json::to_value(results)?)
    }

    async fn get_memory(&self, raw: Value) -> Result<Value, Error> {
        let GetParams { id } = params(raw)?;
        let uuid = parse_id(&id)?;
        let record = self
            .store
            .get_by_id(uuid)
            .await?
            .ok_or(Error::NotFound(id))?;
        Ok(serde_json::to_value(record)?)
    }

    /// Serve requests from `reader` until EOF, writing responses to `writer`.
    ///
    /// Returns after every in-flight request has been answered.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading requests or writing responses fails.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), Error>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<ToolResponse>(RESPONSE_BUFFER);
        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(response) = rx.recv().await {
                let mut line = serde_json::to_vec(&response)?;
                line.push(b'\n');
                writer.write_all(&line).await?;
                writer.flush().await?;
            }
            Ok::<(), Error>(())
        });

        let mut in_flight = JoinSet::new();
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let tx = tx.clone();
            match serde_json::from_str::<ToolRequest>(&line) {
                Ok(request) => {
                    let server = self.clone();
                    in_flight.spawn(async move {
                        let response = server.handle(request).await;
                        if tx.send(response).await.is_err() {
                            tracing::warn!("response writer closed; dropping response");
                        }
                    });
                }
                Err(e) => {
                    let error =
                        ToolError::new(ErrorCode::InvalidParams, format!("Malformed request: {e}"));
                    if tx.send(ToolResponse::failure(Value::Null, error)).await.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!(pending = in_flight.len(), "input closed; draining requests");
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "request task failed");
            }
        }
        drop(tx);

        writer_task
            .await
            .map_err(|e| Error::TaskFailed(e.to_string()))?
    }

    /// `serve` over the process's stdin and stdout.
    pub async fn serve_stdio(&self) -> Result<(), Error> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }
}
