//! Record keyspace: one prefix byte per record kind, then a fixed-width suffix.
//!
//! Heights and ids are 8-byte big-endian so key order is numeric order. Hashes are
//! appended raw. Singleton records use the bare prefix.

pub const BABYLON_BLOCK_HEADER_PREFIX: u8 = 0x01;
pub const ETH_BLOCK_HEADER_PREFIX: u8 = 0x02;
pub const TX_MESSAGE_PREFIX: u8 = 0x03;
pub const ETH_SCANNED_HEIGHT_PREFIX: u8 = 0x04;
pub const BABYLON_SCANNED_HEIGHT_PREFIX: u8 = 0x05;
pub const NEW_FINALITY_PROVIDER_PREFIX: u8 = 0x06;
pub const CREATE_BTC_DELEGATION_PREFIX: u8 = 0x07;
pub const COMMIT_PUB_RAND_LIST_PREFIX: u8 = 0x08;
pub const SIGNATURE_PREFIX: u8 = 0x09;
pub const CONTRACT_EVENT_PREFIX: u8 = 0x10;
pub const ACTIVE_MEMBER_PREFIX: u8 = 0x11;
pub const BTC_UNDELEGATE_PREFIX: u8 = 0x12;
pub const BTC_DELEGATE_AMOUNT_PREFIX: u8 = 0x13;
pub const SELECTIVE_SLASHING_EVIDENCE_PREFIX: u8 = 0x14;
pub const BABYLON_DELEGATION_PREFIX: u8 = 0x15;
pub const SUBMIT_FINALITY_SIGNATURE_PREFIX: u8 = 0x16;
pub const STAKE_DETAILS_PREFIX: u8 = 0x17;
pub const BATCH_STAKE_DETAILS_PREFIX: u8 = 0x18;
pub const SYMBIOTIC_FP_IDS_PREFIX: u8 = 0x19;
pub const L2_OUTPUT_ORACLE_PREFIX: u8 = 0x20;

fn with_u64(prefix: u8, n: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(prefix);
    key.extend_from_slice(&n.to_be_bytes());
    key
}

fn with_bytes(prefix: u8, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + suffix.len());
    key.push(prefix);
    key.extend_from_slice(suffix);
    key
}

pub fn babylon_block_header_key(height: u64) -> Vec<u8> {
    with_u64(BABYLON_BLOCK_HEADER_PREFIX, height)
}

pub fn eth_block_header_key(height: u64) -> Vec<u8> {
    with_u64(ETH_BLOCK_HEADER_PREFIX, height)
}

pub fn signature_key(index: u64) -> Vec<u8> {
    with_u64(SIGNATURE_PREFIX, index)
}

pub fn batch_stake_details_key(batch_id: u64) -> Vec<u8> {
    with_u64(BATCH_STAKE_DETAILS_PREFIX, batch_id)
}

pub fn symbiotic_fp_ids_key(batch_id: u64) -> Vec<u8> {
    with_u64(SYMBIOTIC_FP_IDS_PREFIX, batch_id)
}

pub fn l2_output_oracle_key(l1_height: u64) -> Vec<u8> {
    with_u64(L2_OUTPUT_ORACLE_PREFIX, l1_height)
}

pub fn tx_message_key(tx_hash: &[u8]) -> Vec<u8> {
    with_bytes(TX_MESSAGE_PREFIX, tx_hash)
}

pub fn contract_event_key(tx_hash: &[u8]) -> Vec<u8> {
    with_bytes(CONTRACT_EVENT_PREFIX, tx_hash)
}

pub fn new_finality_provider_key(tx_hash: &[u8]) -> Vec<u8> {
    with_bytes(NEW_FINALITY_PROVIDER_PREFIX, tx_hash)
}

pub fn create_btc_delegation_key(tx_hash: &[u8]) -> Vec<u8> {
    with_bytes(CREATE_BTC_DELEGATION_PREFIX, tx_hash)
}

pub fn commit_pub_rand_list_key(tx_hash: &[u8]) -> Vec<u8> {
    with_bytes(COMMIT_PUB_RAND_LIST_PREFIX, tx_hash)
}

pub fn btc_undelegate_key(tx_hash: &[u8]) -> Vec<u8> {
    with_bytes(BTC_UNDELEGATE_PREFIX, tx_hash)
}

pub fn selective_slashing_evidence_key(tx_hash: &[u8]) -> Vec<u8> {
    with_bytes(SELECTIVE_SLASHING_EVIDENCE_PREFIX, tx_hash)
}

pub fn babylon_delegation_key(btc_tx_id: &[u8]) -> Vec<u8> {
    with_bytes(BABYLON_DELEGATION_PREFIX, btc_tx_id)
}

pub fn submit_finality_signature_key(tx_hash: &[u8]) -> Vec<u8> {
    with_bytes(SUBMIT_FINALITY_SIGNATURE_PREFIX, tx_hash)
}

pub fn eth_scanned_height_key() -> Vec<u8> {
    vec![ETH_SCANNED_HEIGHT_PREFIX]
}

pub fn babylon_scanned_height_key() -> Vec<u8> {
    vec![BABYLON_SCANNED_HEIGHT_PREFIX]
}

pub fn active_member_key() -> Vec<u8> {
    vec![ACTIVE_MEMBER_PREFIX]
}

pub fn btc_delegate_amount_key() -> Vec<u8> {
    vec![BTC_DELEGATE_AMOUNT_PREFIX]
}

pub fn stake_details_key() -> Vec<u8> {
    vec![STAKE_DETAILS_PREFIX]
}
