//! Babylon stake ledger: per finality provider, per staker running totals, and the
//! per-batch snapshots used to decide whether a state root reached quorum.
//!
//! The global aggregate lives under a single key and is rewritten whole on every
//! delegate/undelegate. Batch snapshots are written once per batch id and never
//! touched again.
//!
//! Ledger arithmetic is modular `u64`: undelegating more than a staker holds wraps
//! instead of flooring at zero, and totals wrap the same way, so net sums stay exact
//! whenever the true total is non-negative.

use super::{keys, KeyValueStore, Storage, StoreError};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Ledger operation carried by a delegation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum StakeKind {
    Delegate = 0,
    Undelegate = 1,
}

impl TryFrom<i8> for StakeKind {
    type Error = StoreError;

    fn try_from(n: i8) -> Result<Self, Self::Error> {
        match n {
            0 => Ok(StakeKind::Delegate),
            1 => Ok(StakeKind::Undelegate),
            _ => Err(StoreError::InvalidArgument(format!("unknown stake type {}", n))),
        }
    }
}

/// BTC delegation as reported by Babylon. Only the first finality provider in
/// `fp_btc_pk_list` is credited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationEvent {
    pub staker_addr: String,
    /// Hex-encoded finality-provider BTC public keys.
    pub fp_btc_pk_list: Vec<String>,
    pub staking_value: u64,
}

impl DelegationEvent {
    pub fn new(fp_btc_pk: impl Into<String>, staker_addr: impl Into<String>, staking_value: u64) -> Self {
        Self {
            staker_addr: staker_addr.into(),
            fp_btc_pk_list: vec![fp_btc_pk.into()],
            staking_value,
        }
    }

    pub fn fp_btc_pk(&self) -> Result<&str, StoreError> {
        self.fp_btc_pk_list
            .first()
            .map(String::as_str)
            .ok_or_else(|| StoreError::InvalidArgument("delegation without finality provider".into()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staker {
    pub staking_amount: u64,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuorumNode {
    pub fp_btc_pk: String,
    pub fp_vote_weight: u64,
    #[serde(default)]
    pub is_sign: bool,
    #[serde(rename = "staker", alias = "stakers", default, deserialize_with = "null_as_empty")]
    pub stakers: Vec<Staker>,
}

impl QuorumNode {
    fn with_staker(fp_btc_pk: &str, address: &str, amount: u64) -> Self {
        Self {
            fp_btc_pk: fp_btc_pk.to_string(),
            fp_vote_weight: amount,
            is_sign: false,
            stakers: vec![Staker {
                staking_amount: amount,
                address: address.to_string(),
            }],
        }
    }

    pub fn total_staked(&self) -> u64 {
        self.stakers
            .iter()
            .fold(0u64, |acc, s| acc.wrapping_add(s.staking_amount))
    }
}

/// Global ledger aggregate, or a batch snapshot of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeDetails {
    #[serde(default)]
    pub batch_id: u64,
    #[serde(default)]
    pub total_btc_vote: u64,
    #[serde(default)]
    pub babylon_block: u64,
    #[serde(default)]
    pub state_root: String,
    #[serde(default)]
    pub eth_block: u64,
    #[serde(rename = "bitcoinQuorum", alias = "quorum", default, deserialize_with = "null_as_empty")]
    pub quorum: Vec<QuorumNode>,
    #[serde(
        rename = "symbioticSignNode",
        alias = "symbioticSignNodes",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub symbiotic_sign_nodes: Vec<String>,
}

impl StakeDetails {
    fn bootstrap(fp_btc_pk: &str, address: &str, amount: u64) -> Self {
        Self {
            total_btc_vote: amount,
            quorum: vec![QuorumNode::with_staker(fp_btc_pk, address, amount)],
            ..Default::default()
        }
    }

    /// Finality-provider keys match exactly (case-sensitive).
    pub fn apply_delegate(&mut self, fp_btc_pk: &str, address: &str, amount: u64) {
        // Running total of delegated stake, not only the bootstrap amount.
        self.total_btc_vote = self.total_btc_vote.wrapping_add(amount);
        let Some(node) = self.quorum.iter_mut().find(|q| q.fp_btc_pk == fp_btc_pk) else {
            self.quorum.push(QuorumNode::with_staker(fp_btc_pk, address, amount));
            return;
        };
        node.fp_vote_weight = node.fp_vote_weight.wrapping_add(amount);
        match node.stakers.iter_mut().find(|s| s.address == address) {
            Some(staker) => staker.staking_amount = staker.staking_amount.wrapping_add(amount),
            None => node.stakers.push(Staker {
                staking_amount: amount,
                address: address.to_string(),
            }),
        }
    }

    /// Subtracts `amount` from every staker of every matching node. Vote weights and
    /// the global total are left as they are.
    pub fn apply_undelegate(&mut self, fp_btc_pk: &str, amount: u64) {
        for node in self.quorum.iter_mut().filter(|q| q.fp_btc_pk == fp_btc_pk) {
            for staker in node.stakers.iter_mut() {
                staker.staking_amount = staker.staking_amount.wrapping_sub(amount);
            }
        }
    }

    /// Marks nodes whose provider signed exactly `state_root`. Keys match
    /// case-insensitively here.
    pub fn mark_signed(&mut self, fp_sign_cache: &HashMap<String, String>, state_root: &str) {
        for (fp_pubkey_hex, signed_root) in fp_sign_cache {
            if signed_root != state_root {
                continue;
            }
            for node in self
                .quorum
                .iter_mut()
                .filter(|q| q.fp_btc_pk.eq_ignore_ascii_case(fp_pubkey_hex))
            {
                node.is_sign = true;
            }
        }
    }

    /// Stake behind the nodes that signed.
    pub fn total_signed_stake(&self) -> u64 {
        self.quorum
            .iter()
            .filter(|q| q.is_sign)
            .fold(0u64, |acc, q| acc.wrapping_add(q.total_staked()))
    }
}

/// Symbiotic signers collected for one batch by the Symbiotic watcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbioticFpIds {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sign_requests: Vec<SymbioticSignRequest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbioticSignRequest {
    pub sign_address: String,
}

/// Records written by other implementations may carry `null` for empty lists.
fn null_as_empty<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(d)?.unwrap_or_default())
}

impl<S: KeyValueStore> Storage<S> {
    /// Apply a delegation event to the global ledger (one read-modify-write).
    pub fn set_stake_details(&mut self, event: &DelegationEvent, kind: StakeKind) -> Result<(), StoreError> {
        let fp_btc_pk = event.fp_btc_pk()?;
        let key = keys::stake_details_key();
        let current: Option<StakeDetails> = self.get_json(&key)?;
        let details = match (kind, current) {
            (StakeKind::Delegate, None) => {
                tracing::info!(
                    fp = fp_btc_pk,
                    staker = %event.staker_addr,
                    amount = event.staking_value,
                    "stake ledger bootstrapped"
                );
                StakeDetails::bootstrap(fp_btc_pk, &event.staker_addr, event.staking_value)
            }
            (StakeKind::Delegate, Some(mut details)) => {
                details.apply_delegate(fp_btc_pk, &event.staker_addr, event.staking_value);
                tracing::debug!(
                    fp = fp_btc_pk,
                    staker = %event.staker_addr,
                    amount = event.staking_value,
                    "delegation applied"
                );
                details
            }
            (StakeKind::Undelegate, None) => return Err(StoreError::NotFound("stake details")),
            (StakeKind::Undelegate, Some(mut details)) => {
                details.apply_undelegate(fp_btc_pk, event.staking_value);
                tracing::debug!(fp = fp_btc_pk, amount = event.staking_value, "undelegation applied");
                details
            }
        };
        self.put_json(&key, &details)
    }

    pub fn get_stake_details(&self) -> Result<StakeDetails, StoreError> {
        self.get_json(&keys::stake_details_key())?
            .ok_or(StoreError::NotFound("stake details"))
    }

    /// Snapshot the global ledger for `batch_id`, recording which providers signed
    /// `state_root`. A batch that already has a snapshot keeps it; asking again with a
    /// different state root is an InvalidArgument.
    pub fn set_batch_stake_details(
        &mut self,
        batch_id: u64,
        fp_sign_cache: &HashMap<String, String>,
        state_root: &str,
        babylon_block_height: u64,
        eth_block_height: u64,
    ) -> Result<(), StoreError> {
        let mut details: StakeDetails = self
            .get_json(&keys::stake_details_key())?
            .ok_or(StoreError::NoStakeData)?;

        let batch_key = keys::batch_stake_details_key(batch_id);
        if let Some(existing) = self.get_json::<StakeDetails>(&batch_key)? {
            if existing.state_root != state_root {
                tracing::warn!(
                    batch_id,
                    recorded = %existing.state_root,
                    requested = state_root,
                    "batch stake details recorded for another state root"
                );
                return Err(StoreError::InvalidArgument(format!(
                    "batch {} already recorded for state root {}",
                    batch_id, existing.state_root
                )));
            }
            tracing::debug!(batch_id, "batch stake details already recorded");
            return Ok(());
        }

        if let Some(fp_ids) = self.get_symbiotic_fp_ids(batch_id)? {
            details
                .symbiotic_sign_nodes
                .extend(fp_ids.sign_requests.into_iter().map(|r| r.sign_address));
        }

        details.babylon_block = babylon_block_height;
        details.state_root = state_root.to_string();
        details.eth_block = eth_block_height;
        details.mark_signed(fp_sign_cache, state_root);

        tracing::info!(
            batch_id,
            state_root,
            signed = details.quorum.iter().filter(|q| q.is_sign).count(),
            quorum = details.quorum.len(),
            "batch stake details recorded"
        );
        self.put_json(&batch_key, &details)
    }

    pub fn get_batch_stake_details(&self, batch_id: u64) -> Result<StakeDetails, StoreError> {
        let mut details: StakeDetails = self
            .get_json(&keys::batch_stake_details_key(batch_id))?
            .ok_or(StoreError::NotFound("batch stake details"))?;
        details.batch_id = batch_id;
        Ok(details)
    }

    /// Summed stake of the stakers behind providers that signed the batch's state root.
    pub fn get_batch_total_babylon_stake_amount(&self, batch_id: u64) -> Result<u64, StoreError> {
        Ok(self.get_batch_stake_details(batch_id)?.total_signed_stake())
    }

    pub fn set_symbiotic_fp_ids(&self, batch_id: u64, fp_ids: &SymbioticFpIds) -> Result<(), StoreError> {
        self.put_json(&keys::symbiotic_fp_ids_key(batch_id), fp_ids)
    }

    pub fn get_symbiotic_fp_ids(&self, batch_id: u64) -> Result<Option<SymbioticFpIds>, StoreError> {
        self.get_json(&keys::symbiotic_fp_ids_key(batch_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn stake_kind_from_raw() {
        assert_eq!(StakeKind::try_from(0).unwrap(), StakeKind::Delegate);
        assert_eq!(StakeKind::try_from(1).unwrap(), StakeKind::Undelegate);
        assert!(matches!(
            StakeKind::try_from(2),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(StakeKind::try_from(-1).is_err());
    }

    #[test]
    fn event_without_provider_rejected() {
        let mut storage = Storage::new(MemoryStore::new());
        let event = DelegationEvent {
            staker_addr: "addrA".into(),
            fp_btc_pk_list: vec![],
            staking_value: 10,
        };
        let err = storage.set_stake_details(&event, StakeKind::Delegate).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert!(storage.db().is_empty());
    }

    #[test]
    fn delegate_matches_provider_case_sensitively() {
        let mut d = StakeDetails::bootstrap("ABCD", "addrA", 10);
        d.apply_delegate("abcd", "addrA", 5);
        assert_eq!(d.quorum.len(), 2);
        assert_eq!(d.quorum[0].fp_vote_weight, 10);
        assert_eq!(d.quorum[1].fp_vote_weight, 5);
        assert_eq!(d.total_btc_vote, 15);
    }

    #[test]
    fn sign_marking_is_case_insensitive_and_root_exact() {
        let mut d = StakeDetails::bootstrap("ABCD", "addrA", 10);
        d.apply_delegate("ef01", "addrB", 20);
        d.apply_delegate("9999", "addrC", 30);
        let cache = HashMap::from([
            ("abcd".to_string(), "0xroot".to_string()),
            ("EF01".to_string(), "0xother".to_string()),
        ]);
        d.mark_signed(&cache, "0xroot");
        let signed: Vec<_> = d.quorum.iter().map(|q| q.is_sign).collect();
        assert_eq!(signed, vec![true, false, false]);
        assert_eq!(d.total_signed_stake(), 10);
    }

    #[test]
    fn undelegate_wraps_below_zero() {
        let mut d = StakeDetails::bootstrap("fp1", "addrA", 10);
        d.apply_undelegate("fp1", 15);
        assert_eq!(d.quorum[0].stakers[0].staking_amount, u64::MAX - 4);
        d.apply_delegate("fp1", "addrB", 20);
        // 10 - 15 + 20
        assert_eq!(d.quorum[0].total_staked(), 15);
    }

    #[test]
    fn wire_field_names() {
        let d = StakeDetails::bootstrap("fp1", "addrA", 100);
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["totalBtcVote"], json!(100));
        assert_eq!(v["bitcoinQuorum"][0]["fpBtcPk"], json!("fp1"));
        assert_eq!(v["bitcoinQuorum"][0]["fpVoteWeight"], json!(100));
        assert_eq!(v["bitcoinQuorum"][0]["isSign"], json!(false));
        assert_eq!(v["bitcoinQuorum"][0]["staker"][0]["stakingAmount"], json!(100));
        assert_eq!(v["bitcoinQuorum"][0]["staker"][0]["address"], json!("addrA"));
        assert_eq!(v["symbioticSignNode"], json!([]));
    }

    #[test]
    fn reads_null_lists_and_alias_names() {
        let legacy = json!({
            "batchId": 0,
            "totalBtcVote": 5,
            "babylonBlock": 0,
            "stateRoot": "",
            "ethBlock": 0,
            "bitcoinQuorum": [{"fpBtcPk": "fp1", "fpVoteWeight": 5, "isSign": false, "staker": null}],
            "symbioticSignNode": null
        });
        let d: StakeDetails = serde_json::from_value(legacy).unwrap();
        assert!(d.quorum[0].stakers.is_empty());
        assert!(d.symbiotic_sign_nodes.is_empty());

        let aliased = json!({
            "quorum": [{"fpBtcPk": "fp1", "fpVoteWeight": 5, "stakers": [{"address": "a", "stakingAmount": 5}]}],
            "symbioticSignNodes": ["0xabc"]
        });
        let d: StakeDetails = serde_json::from_value(aliased).unwrap();
        assert_eq!(d.quorum[0].stakers[0].staking_amount, 5);
        assert_eq!(d.symbiotic_sign_nodes, vec!["0xabc".to_string()]);
    }
}
