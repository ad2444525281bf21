//! Derived views of the current network
//!
//! Pure projections used by front ends: the token list, the NFT list and the
//! combined currency list (native currency followed by tokens).

use crate::types::{NetworkRecord, NftRecord, TokenRecord};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Display metadata resolved for a token contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
}

/// One entry of the currency picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrencyEntry {
    pub symbol: String,
    pub icon_url: Option<String>,
    /// `None` for the native currency
    pub contract_address: Option<String>,
}

/// Cache of token metadata keyed by contract address
///
/// A `None` value records that a lookup was attempted and found nothing.
#[derive(Debug, Default)]
pub struct TokenInfoCache {
    entries: DashMap<String, Option<TokenInfo>>,
}

impl TokenInfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, contract_address: impl Into<String>, info: Option<TokenInfo>) {
        self.entries.insert(contract_address.into(), info);
    }

    pub fn get(&self, contract_address: &str) -> Option<TokenInfo> {
        self.entries
            .get(contract_address)
            .and_then(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn tokens(network: Option<&NetworkRecord>) -> Vec<TokenRecord> {
    network.map(|n| n.tokens.clone()).unwrap_or_default()
}

pub fn nfts(network: Option<&NetworkRecord>) -> Vec<NftRecord> {
    network.map(|n| n.nfts.clone()).unwrap_or_default()
}

/// Native currency (when it has a symbol) followed by every token with an address
pub fn currencies(network: Option<&NetworkRecord>, infos: &TokenInfoCache) -> Vec<CurrencyEntry> {
    let Some(network) = network else {
        return Vec::new();
    };

    let mut list = Vec::with_capacity(network.tokens.len() + 1);
    if !network.currency.symbol.is_empty() {
        list.push(CurrencyEntry {
            symbol: network.currency.symbol.clone(),
            icon_url: network.currency.icon_url.clone(),
            contract_address: None,
        });
    }

    for token in &network.tokens {
        let address = &token.item.contract_address;
        if address.is_empty() {
            continue;
        }
        let symbol = match infos.get(address) {
            Some(info) if !info.symbol.is_empty() => info.symbol,
            _ => abbreviate_address(address),
        };
        list.push(CurrencyEntry {
            symbol,
            icon_url: token.item.icon_url.clone(),
            contract_address: Some(address.clone()),
        });
    }

    list
}

fn abbreviate_address(address: &str) -> String {
    let prefix: String = address.chars().take(8).collect();
    format!("{}...", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::Guid;
    use crate::test_utils::sample_record;
    use crate::types::TokenData;

    #[test]
    fn test_currencies_lists_native_then_tokens() {
        let mut network = sample_record("Ethereum", &["http://a"]);
        network.currency.symbol = "ETH".into();
        network.tokens = vec![
            TokenRecord {
                id: Guid::new(),
                item: TokenData::new("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            },
            TokenRecord {
                id: Guid::new(),
                item: TokenData::new("0xdAC17F958D2ee523a2206206994597C13D831ec7"),
            },
            TokenRecord {
                id: Guid::new(),
                item: TokenData::new(""),
            },
        ];

        let infos = TokenInfoCache::new();
        infos.update(
            "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
            Some(TokenInfo {
                name: "USD Coin".into(),
                symbol: "USDC".into(),
            }),
        );
        infos.update("0xdAC17F958D2ee523a2206206994597C13D831ec7", None);

        let list = currencies(Some(&network), &infos);
        let symbols: Vec<_> = list.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ETH", "USDC", "0xdAC17F..."]);
        assert!(list[0].contract_address.is_none());
        assert_eq!(infos.len(), 2);
    }

    #[test]
    fn test_views_of_missing_network_are_empty() {
        let infos = TokenInfoCache::new();
        assert!(tokens(None).is_empty());
        assert!(nfts(None).is_empty());
        assert!(currencies(None, &infos).is_empty());
    }

    #[test]
    fn test_native_currency_without_symbol_is_skipped() {
        let network = sample_record("Bare", &[]);
        let list = currencies(Some(&network), &TokenInfoCache::new());
        assert!(list.is_empty());
    }
}
