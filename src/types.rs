//! Common types used throughout the application
//!
//! Persisted records keep the field names used by the stored `networks` document
//! (`guid`, `chainID`, `rpcURLs`, ...) so existing data loads unchanged.

use crate::guid::Guid;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Native currency of a network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    /// Ticker symbol (e.g. "ETH")
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub symbol: String,

    /// Optional icon URL
    #[serde(
        rename = "iconURL",
        default,
        deserialize_with = "lenient_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub icon_url: Option<String>,
}

impl Currency {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            icon_url: None,
        }
    }
}

/// Token payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenData {
    /// Token contract address
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub contract_address: String,

    /// Optional icon URL
    #[serde(
        rename = "iconURL",
        default,
        deserialize_with = "lenient_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub icon_url: Option<String>,
}

impl TokenData {
    pub fn new(contract_address: impl Into<String>) -> Self {
        Self {
            contract_address: contract_address.into(),
            icon_url: None,
        }
    }
}

/// Token tracked within a network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    #[serde(rename = "guid")]
    pub id: Guid,
    pub item: TokenData,
}

/// NFT attribute value, either free text or a number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(serde_json::Number),
    Text(String),
}

/// Trait/value pair from NFT metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftAttribute {
    pub trait_type: String,
    pub value: AttributeValue,
}

/// NFT payload with optional display metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NftData {
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub contract_address: String,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub token_id: String,
    #[serde(default, deserialize_with = "lenient_option", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_option", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_option", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "lenient_option", skip_serializing_if = "Option::is_none")]
    pub animation_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_option", skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec", skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<NftAttribute>,
}

impl NftData {
    pub fn new(contract_address: impl Into<String>, token_id: impl Into<String>) -> Self {
        Self {
            contract_address: contract_address.into(),
            token_id: token_id.into(),
            ..Default::default()
        }
    }
}

/// NFT tracked within a network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftRecord {
    #[serde(rename = "guid")]
    pub id: Guid,
    pub item: NftData,
}

/// A fully normalized network profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRecord {
    #[serde(rename = "guid")]
    pub id: Guid,
    pub name: String,
    #[serde(rename = "chainID")]
    pub chain_id: u64,
    pub currency: Currency,
    #[serde(rename = "explorerURL", default, skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    #[serde(rename = "rpcURLs", default)]
    pub rpc_urls: Vec<String>,
    #[serde(rename = "selectedRpcUrl", default, skip_serializing_if = "Option::is_none")]
    pub selected_rpc_url: Option<String>,
    #[serde(default)]
    pub tokens: Vec<TokenRecord>,
    #[serde(default)]
    pub nfts: Vec<NftRecord>,
    #[serde(default)]
    pub testnet: bool,
}

impl NetworkRecord {
    /// The RPC URL to use for this network: the stored selection, else the first URL
    pub fn active_rpc_url(&self) -> Option<&str> {
        self.selected_rpc_url
            .as_deref()
            .or_else(|| self.rpc_urls.first().map(String::as_str))
    }

}

/// User input for creating a network; ids are assigned by the registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkDraft {
    pub name: String,
    pub chain_id: u64,
    pub currency: Currency,
    pub explorer_url: Option<String>,
    pub rpc_urls: Vec<String>,
    pub testnet: bool,
}

impl NetworkDraft {
    pub fn new(name: impl Into<String>, chain_id: u64) -> Self {
        Self {
            name: name.into(),
            chain_id,
            ..Default::default()
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.currency.symbol = symbol.into();
        self
    }

    pub fn with_rpc_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rpc_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_explorer(mut self, url: impl Into<String>) -> Self {
        self.explorer_url = Some(url.into());
        self
    }

    pub fn testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }
}

/// Token as found in stored or imported data; the id may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawToken {
    #[serde(default, deserialize_with = "lenient_option", skip_serializing_if = "Option::is_none")]
    pub guid: Option<Guid>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub item: TokenData,
}

/// NFT as found in stored or imported data; the id may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNft {
    #[serde(default, deserialize_with = "lenient_option", skip_serializing_if = "Option::is_none")]
    pub guid: Option<Guid>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub item: NftData,
}

/// Network as found in stored or imported data
///
/// Every field is optional and a field holding a value of the wrong JSON type
/// reads as missing, so one bad field never costs the rest of the entry.
/// Normalization turns a list of these into `NetworkRecord`s that satisfy the
/// registry invariants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNetwork {
    #[serde(default, deserialize_with = "lenient_option", skip_serializing_if = "Option::is_none")]
    pub guid: Option<Guid>,
    #[serde(default, deserialize_with = "lenient_option", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        rename = "chainID",
        default,
        deserialize_with = "lenient_chain_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub chain_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_option", skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(
        rename = "explorerURL",
        default,
        deserialize_with = "lenient_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub explorer_url: Option<String>,
    #[serde(
        rename = "rpcURLs",
        default,
        deserialize_with = "lenient_seq",
        skip_serializing_if = "Option::is_none"
    )]
    pub rpc_urls: Option<Vec<String>>,
    #[serde(
        rename = "selectedRpcUrl",
        default,
        deserialize_with = "lenient_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub selected_rpc_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_seq", skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Vec<RawToken>>,
    #[serde(default, deserialize_with = "lenient_seq", skip_serializing_if = "Option::is_none")]
    pub nfts: Option<Vec<RawNft>>,
    #[serde(default, deserialize_with = "lenient_flag", skip_serializing_if = "Option::is_none")]
    pub testnet: Option<bool>,
}

impl From<&NetworkRecord> for RawNetwork {
    fn from(record: &NetworkRecord) -> Self {
        Self {
            guid: Some(record.id.clone()),
            name: Some(record.name.clone()),
            chain_id: Some(record.chain_id),
            currency: Some(record.currency.clone()),
            explorer_url: record.explorer_url.clone(),
            rpc_urls: Some(record.rpc_urls.clone()),
            selected_rpc_url: record.selected_rpc_url.clone(),
            tokens: Some(
                record
                    .tokens
                    .iter()
                    .map(|t| RawToken {
                        guid: Some(t.id.clone()),
                        item: t.item.clone(),
                    })
                    .collect(),
            ),
            nfts: Some(
                record
                    .nfts
                    .iter()
                    .map(|n| RawNft {
                        guid: Some(n.id.clone()),
                        item: n.item.clone(),
                    })
                    .collect(),
            ),
            testnet: Some(record.testnet),
        }
    }
}

impl From<NetworkDraft> for RawNetwork {
    fn from(draft: NetworkDraft) -> Self {
        Self {
            guid: None,
            name: Some(draft.name),
            chain_id: Some(draft.chain_id),
            currency: Some(draft.currency),
            explorer_url: draft.explorer_url,
            rpc_urls: Some(draft.rpc_urls),
            selected_rpc_url: None,
            tokens: Some(Vec::new()),
            nfts: Some(Vec::new()),
            testnet: Some(draft.testnet),
        }
    }
}

// Stored data may be hand-edited or written by older versions. These readers map
// a value of the wrong type to "missing" instead of failing the whole document.

fn lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient_option(deserializer)?.unwrap_or_default())
}

/// A list keeps its readable elements; anything but a list is missing
fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        )),
        _ => Ok(None),
    }
}

fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(lenient_seq(deserializer)?.unwrap_or_default())
}

/// Chain id as a number, a decimal string or a `0x` hex string
fn lenient_chain_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_chain_id(&s),
        _ => None,
    })
}

fn parse_chain_id(text: &str) -> Option<u64> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => Some(flag),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    })
}

/// Liveness snapshot for one RPC endpoint
///
/// Created fresh per probe invocation and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcServerStatus {
    pub url: String,
    pub latency_ms: Option<u64>,
    pub last_block: Option<u64>,
    pub block_age_secs: Option<u64>,
    pub is_alive: bool,
    pub checking: bool,
}

impl RpcServerStatus {
    /// Fresh, unchecked status for a URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            latency_ms: None,
            last_block: None,
            block_age_secs: None,
            is_alive: false,
            checking: false,
        }
    }

    pub fn is_websocket(&self) -> bool {
        self.url.starts_with("ws://") || self.url.starts_with("wss://")
    }

    pub(crate) fn mark_alive(&mut self, latency_ms: u64, last_block: u64, block_age_secs: Option<u64>) {
        self.latency_ms = Some(latency_ms);
        self.last_block = Some(last_block);
        self.block_age_secs = block_age_secs;
        self.is_alive = true;
    }

    pub(crate) fn mark_failed(&mut self) {
        self.latency_ms = None;
        self.last_block = None;
        self.block_age_secs = None;
        self.is_alive = false;
    }
}
