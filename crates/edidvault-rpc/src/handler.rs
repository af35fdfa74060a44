//! JSON-RPC request handlers.

use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use edidvault_core::{CancellationToken, Direction, EdidError, WriteRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error};

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError { code, message }),
            id,
        }
    }
}

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Main JSON-RPC handler.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let method = &request.method;
    let params = request.params.unwrap_or(Value::Object(Default::default()));
    let id = request.id.clone();

    debug!("RPC call: {}({:?})", method, params);

    let result = dispatch_method(&state, method, &params).await;

    match result {
        Ok(value) => (StatusCode::OK, Json(JsonRpcResponse::success(id, value))),
        Err(e) => {
            error!("RPC error for {}: {}", method, e);
            let code = e.to_rpc_error_code();
            (
                StatusCode::OK,
                Json(JsonRpcResponse::error(id, code, e.to_string())),
            )
        }
    }
}

// ============================================================================
// Helper macros for extracting parameters
// ============================================================================

/// Extract a string parameter, supporting both snake_case and camelCase.
macro_rules! get_str_param {
    ($params:expr, $snake:literal, $camel:literal) => {
        $params
            .get($snake)
            .or_else(|| $params.get($camel))
            .and_then(|v| v.as_str())
    };
}

/// Extract a required string parameter or return an error.
macro_rules! require_str_param {
    ($params:expr, $snake:literal, $camel:literal) => {
        match get_str_param!($params, $snake, $camel) {
            Some(s) => s.to_string(),
            None => {
                return Err(EdidError::InvalidParams {
                    message: format!("Missing required parameter: {}", $snake),
                });
            }
        }
    };
}

/// Extract an optional bool parameter, defaulting to false.
macro_rules! get_bool_param {
    ($params:expr, $snake:literal, $camel:literal) => {
        $params
            .get($snake)
            .or_else(|| $params.get($camel))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    };
}

fn parse_edid_hex(params: &Value) -> Result<Vec<u8>, EdidError> {
    let hex_str = match get_str_param!(params, "edid_hex", "edidHex") {
        Some(s) => s,
        None => {
            return Err(EdidError::InvalidParams {
                message: "Missing required parameter: edid_hex".to_string(),
            })
        }
    };
    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&cleaned).map_err(|e| EdidError::InvalidParams {
        message: format!("edid_hex is not valid hex: {}", e),
    })
}

fn parse_direction(params: &Value) -> Result<Direction, EdidError> {
    let s = require_direction_str(params)?;
    Direction::from_str(&s).ok_or_else(|| EdidError::InvalidParams {
        message: format!("direction must be import or export, got {:?}", s),
    })
}

fn require_direction_str(params: &Value) -> Result<String, EdidError> {
    Ok(require_str_param!(params, "direction", "direction"))
}

/// Dispatch a JSON-RPC method to the vault.
async fn dispatch_method(
    state: &AppState,
    method: &str,
    params: &Value,
) -> Result<Value, EdidError> {
    let vault = &state.vault;

    match method {
        "health_check" => Ok(json!({"status": "ok"})),

        "edid.connectors" => {
            let connectors = vault.list_connectors().await?;
            Ok(json!({ "connectors": connectors }))
        }

        "edid.read" => {
            let connector = require_str_param!(params, "connector", "connector");
            let raw = vault.read_edid(&connector).await?;
            Ok(json!({
                "connector": connector,
                "edid_hex": hex::encode(&raw),
            }))
        }

        "edid.decode" => {
            let raw = parse_edid_hex(params)?;
            let decoded = vault.decode(&raw)?;
            Ok(json!({
                "decoded": decoded,
                "hex_lines": edidvault_core::format_hex(&raw),
            }))
        }

        "edid.match" => {
            let raw = parse_edid_hex(params)?;
            let matches: Vec<Value> = vault
                .match_edid(&raw)?
                .into_iter()
                .map(|record| json!({ "filename": record.filename }))
                .collect();
            Ok(json!({ "matches": matches }))
        }

        "edid.save" => {
            let raw = parse_edid_hex(params)?;
            let name = require_str_param!(params, "name", "name");
            let record = vault.save_dump(&name, &raw)?;
            Ok(json!({ "filename": record.filename }))
        }

        "edid.list" => {
            let files = vault.list_dumps()?;
            Ok(json!({ "files": files }))
        }

        "media.list" => {
            let mounts = vault.list_mounts()?;
            Ok(json!({ "mounts": mounts }))
        }

        "media.scan" => {
            let mount = require_str_param!(params, "mount", "mount");
            let files = vault.scan_mount(&mount)?;
            Ok(json!({ "files": files }))
        }

        "transfer.preview" => {
            let mount = require_str_param!(params, "mount", "mount");
            let direction = parse_direction(params)?;
            let plan = vault.transfer_preview(&mount, direction)?;
            Ok(json!({
                "new": plan.new_items.len(),
                "skipped": plan.existing_items.len(),
                "new_items": plan.new_items,
                "existing_items": plan.existing_items,
            }))
        }

        "transfer.commit" => {
            let mount = require_str_param!(params, "mount", "mount");
            let direction = parse_direction(params)?;
            let confirmed = get_bool_param!(params, "confirmed", "confirmed");
            let outcome = vault
                .transfer_commit(&mount, direction, confirmed, &CancellationToken::new())
                .await?;
            let transferred_key = match direction {
                Direction::Import => "imported",
                Direction::Export => "exported",
            };
            Ok(json!({
                transferred_key: outcome.transferred.len(),
                "skipped": outcome.skipped.len(),
                "failed": outcome.failures.len(),
                "items": outcome.transferred,
                "failures": outcome.failures,
                "cancelled": outcome.cancelled,
            }))
        }

        "edid.write" => {
            let connector = require_str_param!(params, "connector", "connector");
            let filename = require_str_param!(params, "filename", "filename");
            let confirmed = get_bool_param!(params, "confirmed", "confirmed");
            let report = vault
                .write_edid(&WriteRequest {
                    connector,
                    filename,
                    confirmed,
                    cancel: CancellationToken::new(),
                })
                .await?;
            serde_json::to_value(&report).map_err(|e| EdidError::Other(e.to_string()))
        }

        _ => Err(EdidError::InvalidParams {
            message: format!("Unknown method: {}", method),
        }),
    }
}
