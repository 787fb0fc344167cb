//! JSON-RPC envelopes and result payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Envelopes ────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub(crate) struct Request<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: &'a [Value],
    pub id: u64,
}

/// Error object carried in a failed response.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorObject {
    pub code: i64,
    pub message: String,
}

/// Any message arriving on the socket: either a response (has an `id`) or
/// a server-initiated notification (has a `method`).
#[derive(Debug, Deserialize)]
pub(crate) struct Incoming {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorObject>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Vec<Value>>,
}

// ── Version ──────────────────────────────────────────────────────────────

/// One entry of the `version` response map.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VersionResult {
    #[serde(rename = "versionstring", default)]
    pub version_string: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    #[serde(default)]
    pub prerelease: String,
    #[serde(rename = "buildmetadata", default)]
    pub build_metadata: String,
}

// ── Node ─────────────────────────────────────────────────────────────────

/// Verbose `getblockheader` result. Only the fields the pool reads are
/// required.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct BlockHeaderResult {
    pub hash: String,
    pub height: u32,
    #[serde(default)]
    pub confirmations: i64,
    #[serde(default)]
    pub time: i64,
    #[serde(rename = "previousblockhash", default)]
    pub previous_block_hash: String,
    #[serde(rename = "poolsize", default)]
    pub pool_size: u32,
}

// ── Wallet ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GetTicketsResult {
    #[serde(default)]
    pub hashes: Vec<String>,
}

/// One output detail of a wallet transaction.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GetTransactionDetails {
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub fee: Option<f64>,
    #[serde(default)]
    pub vout: u32,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GetTransactionResult {
    pub txid: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub fee: Option<f64>,
    #[serde(default)]
    pub confirmations: i64,
    #[serde(rename = "blockhash", default)]
    pub block_hash: String,
    #[serde(rename = "blockindex", default)]
    pub block_index: i64,
    #[serde(rename = "blocktime", default)]
    pub block_time: i64,
    #[serde(default)]
    pub time: i64,
    #[serde(rename = "timereceived", default)]
    pub time_received: i64,
    #[serde(default)]
    pub details: Vec<GetTransactionDetails>,
    pub hex: String,
}
