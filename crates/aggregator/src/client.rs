//! EVM chain client: the two queries the header traversal needs, plus a JSON-RPC
//! implementation over HTTP.

use crate::header::{decode_block_header, BlockHeader};
use serde_json::{json, Value};
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Header source for [crate::EthHeaderTraversal]. Implementations should fail fast
/// rather than hang; retries belong to the calling loop.
pub trait EthClient {
    /// Current chain head. `Ok(None)` means the node answered but reported no head.
    fn head_header(&self) -> impl Future<Output = Result<Option<BlockHeader>, ClientError>> + Send;

    /// Headers in `[start, end]` (inclusive), ascending. May return fewer than asked
    /// when the node does not know the upper part of the range yet.
    fn headers_by_range(
        &self,
        start: u64,
        end: u64,
    ) -> impl Future<Output = Result<Vec<BlockHeader>, ClientError>> + Send;
}

async fn http_json_rpc(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Value,
    id: u64,
) -> Result<Value, ClientError> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    });
    let resp = client.post(url).json(&body).send().await?;
    let json: Value = resp.json().await?;
    if let Some(err) = json.get("error") {
        return Err(ClientError::Rpc(err.to_string()));
    }
    json.get("result")
        .cloned()
        .ok_or_else(|| ClientError::Decode("Missing result".into()))
}

/// One JSON-RPC batch request; results are returned in request order.
async fn http_json_rpc_batch(
    client: &reqwest::Client,
    url: &str,
    calls: Vec<(&str, Value)>,
) -> Result<Vec<Value>, ClientError> {
    let body: Vec<Value> = calls
        .into_iter()
        .enumerate()
        .map(|(id, (method, params))| {
            json!({
                "jsonrpc": "2.0",
                "id": id as u64,
                "method": method,
                "params": params
            })
        })
        .collect();
    let expected = body.len();
    let resp = client.post(url).json(&body).send().await?;
    let json: Value = resp.json().await?;
    let arr = json
        .as_array()
        .ok_or_else(|| ClientError::Decode(format!("batch response not array: {}", json)))?;
    if arr.len() != expected {
        return Err(ClientError::Decode(format!(
            "batch response has {} entries, expected {}",
            arr.len(),
            expected
        )));
    }
    // Nodes may answer a batch out of order.
    let mut slots: Vec<Option<Value>> = vec![None; expected];
    for item in arr {
        if let Some(err) = item.get("error") {
            return Err(ClientError::Rpc(err.to_string()));
        }
        let id = item
            .get("id")
            .and_then(|i| i.as_u64())
            .filter(|i| (*i as usize) < expected)
            .ok_or_else(|| ClientError::Decode(format!("bad batch id in {}", item)))?;
        let result = item
            .get("result")
            .cloned()
            .ok_or_else(|| ClientError::Decode("Missing result".into()))?;
        slots[id as usize] = Some(result);
    }
    slots
        .into_iter()
        .map(|s| s.ok_or_else(|| ClientError::Decode("duplicate batch id".into())))
        .collect()
}

/// JSON-RPC chain client over HTTP (`eth_getBlockByNumber`).
#[derive(Debug, Clone)]
pub struct HttpEthClient {
    http_client: reqwest::Client,
    http_url: String,
}

impl HttpEthClient {
    pub fn new(http_url: impl Into<String>) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            http_client,
            http_url: http_url.into(),
        })
    }

    pub fn http_url(&self) -> &str {
        &self.http_url
    }
}

fn decode_header(value: &Value) -> Result<BlockHeader, ClientError> {
    decode_block_header(value).map_err(|e| ClientError::Decode(e.to_string()))
}

impl EthClient for HttpEthClient {
    async fn head_header(&self) -> Result<Option<BlockHeader>, ClientError> {
        let result = http_json_rpc(
            &self.http_client,
            &self.http_url,
            "eth_getBlockByNumber",
            json!(["latest", false]),
            1,
        )
        .await?;
        if result.is_null() {
            return Ok(None);
        }
        decode_header(&result).map(Some)
    }

    async fn headers_by_range(&self, start: u64, end: u64) -> Result<Vec<BlockHeader>, ClientError> {
        if start > end {
            return Ok(Vec::new());
        }
        let calls = (start..=end)
            .map(|n| ("eth_getBlockByNumber", json!([format!("0x{:x}", n), false])))
            .collect();
        let results = http_json_rpc_batch(&self.http_client, &self.http_url, calls).await?;
        let mut headers = Vec::with_capacity(results.len());
        for r in &results {
            // Unknown block: the node is behind the requested range; stop here.
            if r.is_null() {
                break;
            }
            headers.push(decode_header(r)?);
        }
        tracing::debug!(start, end, count = headers.len(), "fetched header range");
        Ok(headers)
    }
}
