//! Token and NFT collections of a network
//!
//! Each operation rewrites one network through the registry commit path, so
//! persistence, notification and id repair behave exactly like a network edit.

use super::{NetworkRegistry, Result};
use crate::guid::Guid;
use crate::types::{NftData, NftRecord, TokenData, TokenRecord};
use std::collections::HashSet;
use tracing::debug;

/// Reorder `items` to follow `order`
///
/// `None` unless `order` names every item exactly once.
pub(crate) fn reorder_by_ids<T: Clone>(
    items: &[T],
    order: &[Guid],
    id_of: impl Fn(&T) -> &Guid,
) -> Option<Vec<T>> {
    if order.len() != items.len() {
        return None;
    }
    let mut used = HashSet::with_capacity(order.len());
    order
        .iter()
        .map(|id| {
            if !used.insert(id) {
                return None;
            }
            items.iter().find(|item| id_of(item) == id).cloned()
        })
        .collect()
}

impl NetworkRegistry {
    /// Append a token to a network; returns the new token id
    pub fn add_token(&self, network_id: &Guid, token: TokenData) -> Result<Option<Guid>> {
        self.update_network(network_id, |network| {
            let id = unused_id(network.tokens.iter().map(|t| &t.id));
            network.tokens.push(TokenRecord {
                id: id.clone(),
                item: token,
            });
            debug!(network = %network.name, token = %id, "Token added");
            Some(id)
        })
    }

    pub fn edit_token(&self, network_id: &Guid, token_id: &Guid, token: TokenData) -> Result<bool> {
        let edited = self.update_network(network_id, |network| {
            let existing = network.tokens.iter_mut().find(|t| &t.id == token_id)?;
            existing.item = token;
            Some(())
        })?;
        Ok(edited.is_some())
    }

    pub fn delete_token(&self, network_id: &Guid, token_id: &Guid) -> Result<bool> {
        let deleted = self.update_network(network_id, |network| {
            let index = network.tokens.iter().position(|t| &t.id == token_id)?;
            network.tokens.remove(index);
            Some(())
        })?;
        Ok(deleted.is_some())
    }

    /// `new_order` must list every token id of the network exactly once
    pub fn reorder_tokens(&self, network_id: &Guid, new_order: &[Guid]) -> Result<bool> {
        let reordered = self.update_network(network_id, |network| {
            network.tokens = reorder_by_ids(&network.tokens, new_order, |t| &t.id)?;
            Some(())
        })?;
        Ok(reordered.is_some())
    }

    /// Append an NFT to a network; returns the new NFT id
    pub fn add_nft(&self, network_id: &Guid, nft: NftData) -> Result<Option<Guid>> {
        self.update_network(network_id, |network| {
            let id = unused_id(network.nfts.iter().map(|n| &n.id));
            network.nfts.push(NftRecord {
                id: id.clone(),
                item: nft,
            });
            debug!(network = %network.name, nft = %id, "NFT added");
            Some(id)
        })
    }

    pub fn edit_nft(&self, network_id: &Guid, nft_id: &Guid, nft: NftData) -> Result<bool> {
        let edited = self.update_network(network_id, |network| {
            let existing = network.nfts.iter_mut().find(|n| &n.id == nft_id)?;
            existing.item = nft;
            Some(())
        })?;
        Ok(edited.is_some())
    }

    pub fn delete_nft(&self, network_id: &Guid, nft_id: &Guid) -> Result<bool> {
        let deleted = self.update_network(network_id, |network| {
            let index = network.nfts.iter().position(|n| &n.id == nft_id)?;
            network.nfts.remove(index);
            Some(())
        })?;
        Ok(deleted.is_some())
    }

    pub fn reorder_nfts(&self, network_id: &Guid, new_order: &[Guid]) -> Result<bool> {
        let reordered = self.update_network(network_id, |network| {
            network.nfts = reorder_by_ids(&network.nfts, new_order, |n| &n.id)?;
            Some(())
        })?;
        Ok(reordered.is_some())
    }
}

fn unused_id<'a>(existing: impl Iterator<Item = &'a Guid>) -> Guid {
    let taken: HashSet<&Guid> = existing.collect();
    loop {
        let id = Guid::new();
        if !taken.contains(&id) {
            return id;
        }
    }
}
