//! EVM block header value type and decoding from the JSON-RPC block shape.
//!
//! Headers are plain values: the traversal cursor, the synchronizer and the
//! store each hold their own copy.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 32-byte block hash.
pub type BlockHash = [u8; 32];

/// Block header fields the aggregator tracks. Validation is the chain client's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub number: u64,
    #[serde(with = "hex_hash")]
    pub hash: BlockHash,
    #[serde(with = "hex_hash")]
    pub parent_hash: BlockHash,
    #[serde(default)]
    pub timestamp: u64,
}

impl BlockHeader {
    /// `0x`-prefixed hex of the block hash (for logs).
    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }
}

/// Decode an `eth_getBlockByNumber` result object into a [BlockHeader].
pub fn decode_block_header(block: &Value) -> Result<BlockHeader> {
    let field = |name: &str| -> Result<&str> {
        block
            .get(name)
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing {}", name))
    };
    let number = parse_hex_u64(field("number")?)?;
    let hash = parse_hex_bytes_32(field("hash")?)?;
    let parent_hash = parse_hex_bytes_32(field("parentHash")?)?;
    // Some dev chains omit timestamp on pending blocks.
    let timestamp = match block.get("timestamp").and_then(|t| t.as_str()) {
        Some(s) => parse_hex_u64(s)?,
        None => 0,
    };
    Ok(BlockHeader {
        number,
        hash,
        parent_hash,
        timestamp,
    })
}

fn parse_hex_u64(s: &str) -> Result<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).context("parse hex u64")
}

fn parse_hex_bytes_32(s: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s)).context("parse hex bytes")?;
    if bytes.len() != 32 {
        anyhow::bail!("Expected 32 bytes, got {}", bytes.len());
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

mod hex_hash {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(hash)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        super::parse_hex_bytes_32(&s).map_err(de::Error::custom)
    }
}
