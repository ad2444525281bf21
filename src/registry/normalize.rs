//! Normalization of stored and imported network data
//!
//! A single pass that turns arbitrary (possibly legacy or hand-edited) network
//! data into records that satisfy every registry invariant. The pass never fails
//! and is idempotent: feeding its output back in reports no repairs.

use crate::guid::Guid;
use crate::types::{Currency, NetworkRecord, NftRecord, RawNetwork, RawNft, RawToken, TokenRecord};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Name given to records stored without one
pub const UNNAMED_NETWORK: &str = "Unnamed network";

/// Result of a normalization pass
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub networks: Vec<NetworkRecord>,
    /// True when at least one record needed a repair
    pub repaired: bool,
}

/// `"{base} (n)"` with the smallest n >= 1 for which `taken` is false
pub fn generate_unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut counter: u64 = 1;
    loop {
        let candidate = format!("{} ({})", base, counter);
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Decode the stored `networks` document leniently
///
/// Entries that are not JSON objects are dropped. Fields of the wrong type inside
/// an object read as missing and are defaulted by `normalize`, so the rest of the
/// entry (tokens and NFTs included) survives. The second value is the number of
/// dropped entries.
pub fn parse_stored(value: serde_json::Value) -> (Vec<RawNetwork>, usize) {
    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Null => return (Vec::new(), 0),
        other => {
            warn!(kind = %json_kind(&other), "Stored networks entry is not a list, discarding");
            return (Vec::new(), 1);
        }
    };

    let mut dropped = 0;
    let networks = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let decoded = match entry {
                serde_json::Value::Object(_) => serde_json::from_value::<RawNetwork>(entry)
                    .map_err(|e| e.to_string()),
                other => Err(format!("expected an object, found {}", json_kind(&other))),
            };
            match decoded {
                Ok(raw) => Some(raw),
                Err(error) => {
                    warn!(index, error = %error, "Dropping unreadable network entry");
                    dropped += 1;
                    None
                }
            }
        })
        .collect();

    (networks, dropped)
}

/// Normalize a whole snapshot
pub fn normalize(raw: Vec<RawNetwork>) -> Normalized {
    let mut all_names: HashSet<String> = raw.iter().filter_map(|n| n.name.clone()).collect();
    let mut seen_names: HashSet<String> = HashSet::new();
    let mut seen_ids: HashSet<Guid> = HashSet::new();
    let mut repaired = false;

    let networks = raw
        .into_iter()
        .map(|network| {
            let (record, changed) =
                normalize_network(network, &mut seen_ids, &mut seen_names, &mut all_names);
            repaired |= changed;
            record
        })
        .collect();

    Normalized { networks, repaired }
}

/// Normalize records that are already typed (e.g. a registry snapshot)
pub fn normalize_records<'a, I>(records: I) -> Normalized
where
    I: IntoIterator<Item = &'a NetworkRecord>,
{
    normalize(records.into_iter().map(RawNetwork::from).collect())
}

/// Repair the parts of a single record that are scoped to the record itself
///
/// Token and NFT ids are made unique and `selected_rpc_url` is cleared when it is
/// not one of the record's RPC URLs. Returns whether anything changed.
pub fn repair_record(record: &mut NetworkRecord) -> bool {
    let mut changed = false;

    let mut token_ids = HashSet::new();
    for token in &mut record.tokens {
        if token.id.is_blank() || !token_ids.insert(token.id.clone()) {
            token.id = fresh_id(&mut token_ids);
            changed = true;
        }
    }

    let mut nft_ids = HashSet::new();
    for nft in &mut record.nfts {
        if nft.id.is_blank() || !nft_ids.insert(nft.id.clone()) {
            nft.id = fresh_id(&mut nft_ids);
            changed = true;
        }
    }

    if let Some(selected) = &record.selected_rpc_url {
        if !record.rpc_urls.contains(selected) {
            debug!(network = %record.name, url = %selected, "Clearing selected RPC URL not in list");
            record.selected_rpc_url = None;
            changed = true;
        }
    }

    changed
}

fn normalize_network(
    raw: RawNetwork,
    seen_ids: &mut HashSet<Guid>,
    seen_names: &mut HashSet<String>,
    all_names: &mut HashSet<String>,
) -> (NetworkRecord, bool) {
    let mut changed = false;

    let id = match raw.guid {
        Some(id) if !id.is_blank() && seen_ids.insert(id.clone()) => id,
        _ => {
            changed = true;
            fresh_id(seen_ids)
        }
    };

    let base_name = raw.name.unwrap_or_else(|| {
        changed = true;
        UNNAMED_NETWORK.to_string()
    });
    let name = if seen_names.contains(&base_name) {
        changed = true;
        generate_unique_name(&base_name, |candidate| {
            all_names.contains(candidate) || seen_names.contains(candidate)
        })
    } else {
        base_name
    };
    seen_names.insert(name.clone());
    all_names.insert(name.clone());

    let tokens = match raw.tokens {
        Some(tokens) => tokens.into_iter().map(token_record).collect(),
        None => {
            changed = true;
            Vec::new()
        }
    };
    let nfts = match raw.nfts {
        Some(nfts) => nfts.into_iter().map(nft_record).collect(),
        None => {
            changed = true;
            Vec::new()
        }
    };

    if raw.chain_id.is_none()
        || raw.currency.is_none()
        || raw.rpc_urls.is_none()
        || raw.testnet.is_none()
    {
        changed = true;
    }

    let mut record = NetworkRecord {
        id,
        name,
        chain_id: raw.chain_id.unwrap_or_default(),
        currency: raw.currency.unwrap_or_else(Currency::default),
        explorer_url: raw.explorer_url,
        rpc_urls: raw.rpc_urls.unwrap_or_default(),
        selected_rpc_url: raw.selected_rpc_url,
        tokens,
        nfts,
        testnet: raw.testnet.unwrap_or(false),
    };

    changed |= repair_record(&mut record);
    (record, changed)
}

// Missing ids become blank and are replaced by `repair_record`
fn token_record(raw: RawToken) -> TokenRecord {
    TokenRecord {
        id: raw.guid.unwrap_or_else(|| Guid::from("")),
        item: raw.item,
    }
}

fn nft_record(raw: RawNft) -> NftRecord {
    NftRecord {
        id: raw.guid.unwrap_or_else(|| Guid::from("")),
        item: raw.item,
    }
}

fn fresh_id(seen: &mut HashSet<Guid>) -> Guid {
    loop {
        let id = Guid::new();
        if seen.insert(id.clone()) {
            return id;
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
