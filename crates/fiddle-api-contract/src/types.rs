//! API contract types for the Fiddle service

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// VCL snippets attached to each lifecycle hook of a fiddle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vcl {
    pub recv: String,
    pub hit: String,
    pub miss: String,
    pub pass: String,
    pub fetch: String,
    pub error: String,
    pub deliver: String,
    pub init: String,
}

impl Vcl {
    /// True when no hook carries any code
    pub fn is_empty(&self) -> bool {
        [
            &self.recv,
            &self.hit,
            &self.miss,
            &self.pass,
            &self.fetch,
            &self.error,
            &self.deliver,
            &self.init,
        ]
        .iter()
        .all(|hook| hook.is_empty())
    }
}

/// Fiddle creation request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateFiddleInput {
    pub origins: Vec<String>,
    #[serde(rename = "reqUrl")]
    pub req_url: String,
    #[serde(rename = "reqMethod")]
    pub req_method: String,
    #[serde(rename = "reqHeaders")]
    pub req_headers: String,
    #[serde(rename = "reqBody")]
    pub req_body: String,
    pub vcl: Vcl,
    #[serde(rename = "purgeFirst")]
    pub purge_first: bool,
    #[serde(rename = "enableCluster")]
    pub enable_cluster: bool,
    #[serde(rename = "enableShield")]
    pub enable_shield: bool,
}

/// Fiddle update request
///
/// Carries the full definition: the service replaces every field, it does not merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateFiddleInput {
    pub id: String,
    #[serde(rename = "reqUrl")]
    pub req_url: String,
    #[serde(rename = "reqMethod")]
    pub req_method: String,
    #[serde(rename = "reqHeaders")]
    pub req_headers: String,
    #[serde(rename = "reqBody")]
    pub req_body: String,
    pub origins: Vec<String>,
    pub vcl: Vcl,
    #[serde(rename = "purgeFirst")]
    pub purge_first: bool,
    #[serde(rename = "enableCluster")]
    pub enable_cluster: bool,
    #[serde(rename = "enableShield")]
    pub enable_shield: bool,
}

impl UpdateFiddleInput {
    /// Build an update that replaces fiddle `id` with the given definition
    pub fn from_create(id: impl Into<String>, input: CreateFiddleInput) -> Self {
        Self {
            id: id.into(),
            req_url: input.req_url,
            req_method: input.req_method,
            req_headers: input.req_headers,
            req_body: input.req_body,
            origins: input.origins,
            vcl: input.vcl,
            purge_first: input.purge_first,
            enable_cluster: input.enable_cluster,
            enable_shield: input.enable_shield,
        }
    }

    /// Update used to "delete" a fiddle: every content field is emptied and
    /// all cache-purge flags are forced on.
    pub fn cleared(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            purge_first: true,
            enable_cluster: true,
            enable_shield: true,
            ..Self::default()
        }
    }
}

/// Fiddle execution request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteFiddleInput {
    pub id: String,
}

impl ExecuteFiddleInput {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Raw client request and response captured at the edge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientFetch {
    #[serde(deserialize_with = "null_as_default")]
    pub req: String,
    #[serde(deserialize_with = "null_as_default")]
    pub resp: String,
}

/// Cache node that emitted a trace event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeServer {
    #[serde(deserialize_with = "null_as_default")]
    pub datacenter: String,
    #[serde(rename = "nodeID", deserialize_with = "null_as_default")]
    pub node_id: String,
}

/// One step of the execution trace (cache hit/miss, restart, datacenter hop, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceEvent {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub reqkey: String,
    #[serde(deserialize_with = "null_as_default")]
    pub time: String,
    #[serde(deserialize_with = "null_as_default")]
    pub server: EdgeServer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restarts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "isESI", skip_serializing_if = "Option::is_none")]
    pub is_esi: Option<bool>,
    #[serde(rename = "return", skip_serializing_if = "Option::is_none")]
    pub return_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits: Option<u64>,
    #[serde(rename = "edgeDC", skip_serializing_if = "Option::is_none")]
    pub edge_dc: Option<String>,
}

/// A fiddle as reported by the service, including the state of its last execution
///
/// Missing and `null` fields decode to their zero value, so a partial payload never fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fiddle {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "startTime", deserialize_with = "null_as_default")]
    pub start_time: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: u16,
    #[serde(rename = "clientFetch", deserialize_with = "null_as_default")]
    pub client_fetch: ClientFetch,
    #[serde(rename = "originFetches", deserialize_with = "null_as_default")]
    pub origin_fetches: HashMap<String, serde_json::Value>,
    #[serde(rename = "respBodyIsText", deserialize_with = "null_as_default")]
    pub resp_body_is_text: bool,
    #[serde(rename = "respBodyType", deserialize_with = "null_as_default")]
    pub resp_body_type: String,
    #[serde(rename = "respBodyPreview", deserialize_with = "null_as_default")]
    pub resp_body_preview: String,
    #[serde(rename = "respBodyBytesReceived", deserialize_with = "null_as_default")]
    pub resp_body_bytes_received: u64,
    #[serde(rename = "respBodyChunkCount", deserialize_with = "null_as_default")]
    pub resp_body_chunk_count: u64,
    #[serde(rename = "respComplete", deserialize_with = "null_as_default")]
    pub resp_complete: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub events: Vec<TraceEvent>,
}

/// Payload of the terminal stream event. Same shape as [`Fiddle`].
pub type ExecutionResult = Fiddle;

/// Response envelope for create and update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiddleEnvelope {
    #[serde(deserialize_with = "null_as_default")]
    pub fiddle: Fiddle,
    #[serde(deserialize_with = "null_as_default")]
    pub valid: bool,
    /// Server-reported validation errors, kept verbatim
    pub errors: serde_json::Value,
}

impl FiddleEnvelope {
    pub fn valid(fiddle: Fiddle) -> Self {
        Self {
            fiddle,
            valid: true,
            errors: serde_json::Value::Null,
        }
    }

    pub fn invalid(errors: serde_json::Value) -> Self {
        Self {
            fiddle: Fiddle::default(),
            valid: false,
            errors,
        }
    }
}

/// Execution session returned by the execute endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSession {
    #[serde(rename = "sessionID", default, deserialize_with = "null_as_default")]
    pub session_id: String,
    /// Fiddle being executed; filled in by the caller, never sent on the wire
    #[serde(skip)]
    pub fiddle_id: String,
}

impl ExecutionSession {
    pub fn new(fiddle_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            fiddle_id: fiddle_id.into(),
        }
    }
}

/// Decode `null` as the zero value of `T`
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
