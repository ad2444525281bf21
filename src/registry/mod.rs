//! Network registry
//!
//! Ordered, persisted collection of network profiles plus the selected network.
//!
//! ## Consistency model
//! - The collection is an immutable snapshot (`Vec<Arc<NetworkRecord>>`) held in a
//!   `StateCell`. Readers load it without locking.
//! - Every mutation builds a new snapshot, persists it, then publishes it with one
//!   atomic swap. Records that were not touched keep their `Arc`.
//! - Writers are serialized so persistence and reselection happen in commit order.
//! - After every committed mutation the selected id is repaired (first record, or
//!   none when empty) and the current network is re-derived.
//!
//! Normalization runs only on `open` and `replace_all`; it is never triggered by a
//! change notification.

mod collections;
pub mod normalize;
pub mod selection;
pub mod views;

pub use normalize::{generate_unique_name, Normalized, UNNAMED_NETWORK};
pub use selection::CurrentNetwork;
pub use views::{CurrencyEntry, TokenInfo, TokenInfoCache};

use crate::guid::Guid;
use crate::metrics::metrics;
use crate::state::StateCell;
use crate::store::{self, KeyValueStore, StoreError, NETWORKS_KEY, SELECTED_NETWORK_KEY};
use crate::types::{NetworkDraft, NetworkRecord, NftRecord, RawNetwork, TokenRecord};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Immutable registry snapshot
pub type Snapshot = Vec<Arc<NetworkRecord>>;

/// Registry errors
///
/// Domain rejections (duplicate name, unknown id) are reported as `false`/`None`
/// return values, not as errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Persisted network registry with derived selection
pub struct NetworkRegistry {
    store: Arc<dyn KeyValueStore>,
    networks: StateCell<Snapshot>,
    selected: StateCell<Option<Guid>>,
    current: CurrentNetwork,
    token_infos: TokenInfoCache,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for NetworkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkRegistry")
            .field("store", &self.store)
            .field("networks", &self.networks.load().len())
            .field("selected", &*self.selected.load())
            .finish_non_exhaustive()
    }
}

impl NetworkRegistry {
    /// Load the registry from `store`, normalizing stored data
    ///
    /// Repaired data is written back once here and never on later reads.
    pub fn open(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let stored = match store.get_value(NETWORKS_KEY) {
            Ok(value) => value.unwrap_or(serde_json::Value::Null),
            Err(StoreError::Decode { key, source }) => {
                warn!(key = %key, error = %source, "Stored networks are unreadable, starting empty");
                serde_json::Value::Null
            }
            Err(e) => return Err(e.into()),
        };

        let (raw, dropped) = normalize::parse_stored(stored);
        let normalized = normalize::normalize(raw);
        let snapshot: Snapshot = normalized.networks.into_iter().map(Arc::new).collect();

        if normalized.repaired || dropped > 0 {
            info!(
                networks = snapshot.len(),
                dropped,
                "Repaired stored networks, writing back"
            );
            persist_snapshot(store.as_ref(), &snapshot)?;
        }

        let stored_selection = match store::load::<Option<Guid>>(store.as_ref(), SELECTED_NETWORK_KEY) {
            Ok(selection) => selection.flatten(),
            Err(e) => {
                warn!(error = %e, "Stored selection is unreadable, reselecting");
                None
            }
        };
        let selection = selection::repair(&snapshot, stored_selection.as_ref());
        if selection != stored_selection {
            store::save(store.as_ref(), SELECTED_NETWORK_KEY, &selection)?;
        }

        let current = CurrentNetwork::new();
        current.refresh(&snapshot, selection.as_ref());
        metrics().registry_networks.set(snapshot.len() as i64);

        info!(
            networks = snapshot.len(),
            selected = ?selection,
            "Network registry opened"
        );

        Ok(Self {
            store,
            networks: StateCell::new(snapshot),
            selected: StateCell::new(selection),
            current,
            token_infos: TokenInfoCache::new(),
            write_lock: Mutex::new(()),
        })
    }

    /// Flush the store and release the registry
    pub fn close(self) -> Result<()> {
        self.store.flush()?;
        debug!("Network registry closed");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Current snapshot of all networks, in user order
    pub fn networks(&self) -> Arc<Snapshot> {
        self.networks.load()
    }

    pub fn len(&self) -> usize {
        self.networks.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.load().is_empty()
    }

    pub fn has_networks(&self) -> bool {
        !self.is_empty()
    }

    pub fn find_network_by_id(&self, id: &Guid) -> Option<Arc<NetworkRecord>> {
        self.networks.load().iter().find(|n| &n.id == id).cloned()
    }

    pub fn find_network_by_name(&self, name: &str) -> Option<Arc<NetworkRecord>> {
        self.networks.load().iter().find(|n| n.name == name).cloned()
    }

    pub fn has_network_with_name(&self, name: &str) -> bool {
        self.networks.load().iter().any(|n| n.name == name)
    }

    /// `"{base} (n)"` with the smallest n not used by any network
    pub fn generate_unique_network_name(&self, base: &str) -> String {
        let snapshot = self.networks.load();
        generate_unique_name(base, |candidate| snapshot.iter().any(|n| n.name == candidate))
    }

    /// RPC URL to use for a network: its selected URL, else its first URL
    pub fn selected_rpc_url(&self, network_id: &Guid) -> Option<String> {
        self.find_network_by_id(network_id)
            .and_then(|n| n.active_rpc_url().map(str::to_string))
    }

    pub fn selected_id(&self) -> Option<Guid> {
        (*self.selected.load()).clone()
    }

    pub fn current_network(&self) -> Option<Arc<NetworkRecord>> {
        self.current.get()
    }

    /// Tokens of the current network
    pub fn tokens(&self) -> Vec<TokenRecord> {
        views::tokens(self.current.get().as_deref())
    }

    /// NFTs of the current network
    pub fn nfts(&self) -> Vec<NftRecord> {
        views::nfts(self.current.get().as_deref())
    }

    /// Native currency and tokens of the current network
    pub fn currencies(&self) -> Vec<CurrencyEntry> {
        views::currencies(self.current.get().as_deref(), &self.token_infos)
    }

    pub fn update_token_info(&self, contract_address: &str, info: Option<TokenInfo>) {
        self.token_infos.update(contract_address, info);
    }

    pub fn token_infos(&self) -> &TokenInfoCache {
        &self.token_infos
    }

    // ---------------------------------------------------------------------
    // Subscriptions
    // ---------------------------------------------------------------------

    pub fn subscribe_networks(&self) -> broadcast::Receiver<Arc<Snapshot>> {
        self.networks.subscribe()
    }

    pub fn subscribe_selection(&self) -> broadcast::Receiver<Arc<Option<Guid>>> {
        self.selected.subscribe()
    }

    /// Fires only when the current network changes identity
    pub fn subscribe_current(&self) -> broadcast::Receiver<Arc<Option<Arc<NetworkRecord>>>> {
        self.current.subscribe()
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Add a network; false when the name is already in use
    pub fn add(&self, draft: NetworkDraft) -> Result<bool> {
        let name = draft.name.clone();
        let added = self.commit(|snapshot| {
            if snapshot.iter().any(|n| n.name == draft.name) {
                return None;
            }
            let record = NetworkRecord {
                id: Guid::new(),
                name: draft.name,
                chain_id: draft.chain_id,
                currency: draft.currency,
                explorer_url: draft.explorer_url,
                rpc_urls: draft.rpc_urls,
                selected_rpc_url: None,
                tokens: Vec::new(),
                nfts: Vec::new(),
                testnet: draft.testnet,
            };
            let mut next = snapshot.to_vec();
            next.push(Arc::new(record));
            Some((next, ()))
        })?;

        if added.is_some() {
            info!(network = %name, "Network added");
        } else {
            debug!(network = %name, "Rejected network with duplicate name");
        }
        Ok(added.is_some())
    }

    /// Replace the record with the same id
    ///
    /// False when the id is unknown or the new name belongs to another network.
    /// Token/NFT ids and the selected RPC URL are repaired before storing.
    pub fn edit(&self, mut record: NetworkRecord) -> Result<bool> {
        normalize::repair_record(&mut record);
        let edited = self.commit(|snapshot| {
            let index = snapshot.iter().position(|n| n.id == record.id)?;
            if snapshot
                .iter()
                .any(|n| n.id != record.id && n.name == record.name)
            {
                return None;
            }
            let mut next = snapshot.to_vec();
            next[index] = Arc::new(record);
            Some((next, ()))
        })?;
        Ok(edited.is_some())
    }

    /// Remove a network; the selection moves to the first remaining one
    pub fn delete(&self, id: &Guid) -> Result<bool> {
        let removed = self.commit(|snapshot| {
            let index = snapshot.iter().position(|n| &n.id == id)?;
            let mut next = snapshot.to_vec();
            let removed = next.remove(index);
            Some((next, removed))
        })?;

        match removed {
            Some(record) => {
                info!(network = %record.name, id = %record.id, "Network deleted");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reorder all networks; `new_order` must list every id exactly once
    pub fn reorder(&self, new_order: &[Guid]) -> Result<bool> {
        let reordered = self.commit(|snapshot| {
            let next = collections::reorder_by_ids(snapshot, new_order, |n| &n.id)?;
            Some((next, ()))
        })?;
        Ok(reordered.is_some())
    }

    /// Point a network at one of its RPC URLs; no liveness check is made
    pub fn set_selected_rpc_url(&self, network_id: &Guid, url: &str) -> Result<bool> {
        let updated = self.update_network(network_id, |network| {
            if !network.rpc_urls.iter().any(|u| u == url) {
                return None;
            }
            network.selected_rpc_url = Some(url.to_string());
            Some(())
        })?;
        Ok(updated.is_some())
    }

    /// Select a network by id; false when the id is unknown
    pub fn select(&self, id: &Guid) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let snapshot = self.networks.load();
        if selection::resolve(&snapshot, Some(id)).is_none() {
            return Ok(false);
        }
        let selection = Some(id.clone());
        save_selection(self.store.as_ref(), &selection)?;
        self.publish_selection(selection);
        self.current.refresh(&snapshot, Some(id));
        Ok(true)
    }

    /// Replace the whole collection (import); the input is normalized first
    pub fn replace_all(&self, networks: Vec<RawNetwork>) -> Result<()> {
        let normalized = normalize::normalize(networks);
        if normalized.repaired {
            debug!("Imported networks required normalization");
        }
        let count = normalized.networks.len();
        self.commit(move |_| {
            let next = normalized.networks.into_iter().map(Arc::new).collect();
            Some((next, ()))
        })?;
        info!(networks = count, "Replaced all networks");
        Ok(())
    }

    /// Import a network unless one with the same name exists
    pub fn add_network_if_not_exists(&self, network: RawNetwork) -> Result<bool> {
        let added = self.commit(|snapshot| {
            let name = network.name.as_deref().unwrap_or(UNNAMED_NETWORK);
            if snapshot.iter().any(|n| n.name == name) {
                return None;
            }
            let record = admit(snapshot, network);
            let mut next = snapshot.to_vec();
            next.push(Arc::new(record));
            Some((next, ()))
        })?;
        Ok(added.is_some())
    }

    /// Overwrite the network with the same name, keeping its id
    pub fn replace_existing_network(&self, network: RawNetwork) -> Result<bool> {
        let replaced = self.commit(|snapshot| {
            let name = network.name.as_deref()?;
            let index = snapshot.iter().position(|n| n.name == name)?;
            let raw = RawNetwork {
                guid: Some(snapshot[index].id.clone()),
                ..network
            };
            let record = normalize::normalize(vec![raw]).networks.pop()?;
            let mut next = snapshot.to_vec();
            next[index] = Arc::new(record);
            Some((next, ()))
        })?;
        Ok(replaced.is_some())
    }

    /// Import a network under a fresh id and a `"{name} (n)"` name
    pub fn add_network_with_unique_name(&self, network: RawNetwork) -> Result<Guid> {
        let id = self.commit(|snapshot| {
            let base = network.name.clone().unwrap_or_else(|| UNNAMED_NETWORK.to_string());
            let name = generate_unique_name(&base, |candidate| {
                snapshot.iter().any(|n| n.name == candidate)
            });
            let raw = RawNetwork {
                guid: None,
                name: Some(name),
                ..network
            };
            let record = admit(snapshot, raw);
            let id = record.id.clone();
            let mut next = snapshot.to_vec();
            next.push(Arc::new(record));
            Some((next, id))
        })?;
        // admit always produces a record
        Ok(id.unwrap_or_default())
    }

    // ---------------------------------------------------------------------
    // Commit path
    // ---------------------------------------------------------------------

    /// Apply `f` to one network (copy-on-write), keeping the record valid
    pub(crate) fn update_network<R>(
        &self,
        network_id: &Guid,
        f: impl FnOnce(&mut NetworkRecord) -> Option<R>,
    ) -> Result<Option<R>> {
        self.commit(|snapshot| {
            let index = snapshot.iter().position(|n| &n.id == network_id)?;
            let mut record = (*snapshot[index]).clone();
            let out = f(&mut record)?;
            normalize::repair_record(&mut record);
            let mut next = snapshot.to_vec();
            next[index] = Arc::new(record);
            Some((next, out))
        })
    }

    /// Build, persist and publish a new snapshot; `None` from `f` means no change
    fn commit<R>(&self, f: impl FnOnce(&Snapshot) -> Option<(Snapshot, R)>) -> Result<Option<R>> {
        let _guard = self.write_lock.lock();
        let current = self.networks.load();
        let Some((next, out)) = f(&current) else {
            return Ok(None);
        };

        // Both entries are persisted before anything is published, so a failed
        // write leaves the in-memory snapshot and selection untouched
        persist_snapshot(self.store.as_ref(), &next)?;
        let selected = self.selected.load();
        let repaired = selection::repair(&next, (*selected).as_ref());
        let selection_changed = repaired != *selected;
        if selection_changed {
            save_selection(self.store.as_ref(), &repaired)?;
        }

        let next = Arc::new(next);
        self.networks.replace(next.clone());
        metrics().registry_networks.set(next.len() as i64);
        if selection_changed {
            self.publish_selection(repaired.clone());
        }
        self.current.refresh(&next, repaired.as_ref());

        Ok(Some(out))
    }

    // Caller holds the write lock
    fn publish_selection(&self, selection: Option<Guid>) {
        debug!(selected = ?selection, "Selected network changed");
        self.selected.replace(Arc::new(selection));
    }
}

/// Normalize `raw` as if appended to `snapshot`, so its id and name are unique
fn admit(snapshot: &Snapshot, raw: RawNetwork) -> NetworkRecord {
    let mut all: Vec<RawNetwork> = snapshot.iter().map(|n| RawNetwork::from(n.as_ref())).collect();
    all.push(raw);
    let mut normalized = normalize::normalize(all);
    // normalize returns one record per input, so the list is never empty here
    normalized
        .networks
        .pop()
        .unwrap_or_else(|| NetworkRecord {
            id: Guid::new(),
            name: UNNAMED_NETWORK.to_string(),
            chain_id: 0,
            currency: Default::default(),
            explorer_url: None,
            rpc_urls: Vec::new(),
            selected_rpc_url: None,
            tokens: Vec::new(),
            nfts: Vec::new(),
            testnet: false,
        })
}

fn save_selection(store: &dyn KeyValueStore, selection: &Option<Guid>) -> Result<()> {
    store::save(store, SELECTED_NETWORK_KEY, selection)?;
    Ok(())
}

fn persist_snapshot(store: &dyn KeyValueStore, snapshot: &Snapshot) -> Result<()> {
    let records: Vec<&NetworkRecord> = snapshot.iter().map(Arc::as_ref).collect();
    store::save(store, NETWORKS_KEY, &records)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::{draft, open_memory_registry};
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_add_rejects_duplicate_name() {
        let (registry, _) = open_memory_registry();
        let foo = draft("Foo", &["http://a", "http://b"]);

        assert!(registry.add(foo.clone()).unwrap());
        let before = registry.networks();
        assert!(!registry.add(foo).unwrap());

        let after = registry.networks();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_first_add_selects_network() {
        let (registry, _) = open_memory_registry();
        assert!(registry.selected_id().is_none());
        assert!(registry.current_network().is_none());

        registry.add(draft("Foo", &["http://a"])).unwrap();
        let foo = registry.find_network_by_name("Foo").unwrap();
        assert_eq!(registry.selected_id(), Some(foo.id.clone()));
        assert!(Arc::ptr_eq(&registry.current_network().unwrap(), &foo));

        // a second add keeps the existing selection
        registry.add(draft("Bar", &["http://b"])).unwrap();
        assert_eq!(registry.selected_id(), Some(foo.id.clone()));
    }

    #[test]
    fn test_delete_selected_reselects_first_or_none() {
        let store = Arc::new(
            MemoryStore::new()
                .with_entry(
                    NETWORKS_KEY,
                    serde_json::json!([{"guid": "x", "name": "X", "chainID": 1}]),
                )
                .with_entry(SELECTED_NETWORK_KEY, serde_json::json!("x")),
        );
        let registry = NetworkRegistry::open(store).unwrap();
        assert_eq!(registry.selected_id(), Some(Guid::from("x")));

        assert!(registry.delete(&Guid::from("x")).unwrap());
        assert!(registry.selected_id().is_none());
        assert!(registry.current_network().is_none());
        assert!(!registry.delete(&Guid::from("x")).unwrap());
    }

    #[test]
    fn test_delete_moves_selection_to_first_remaining() {
        let (registry, _) = open_memory_registry();
        registry.add(draft("A", &[])).unwrap();
        registry.add(draft("B", &[])).unwrap();
        let a = registry.find_network_by_name("A").unwrap();
        let b = registry.find_network_by_name("B").unwrap();

        assert!(registry.select(&b.id).unwrap());
        registry.delete(&b.id).unwrap();
        assert_eq!(registry.selected_id(), Some(a.id.clone()));
    }

    #[test]
    fn test_edit_clears_selected_rpc_url_removed_from_list() {
        let (registry, _) = open_memory_registry();
        registry.add(draft("Foo", &["http://a", "http://b"])).unwrap();
        let foo = registry.find_network_by_name("Foo").unwrap();
        assert!(registry.set_selected_rpc_url(&foo.id, "http://b").unwrap());
        assert_eq!(registry.selected_rpc_url(&foo.id).as_deref(), Some("http://b"));

        let mut edited = (*registry.find_network_by_id(&foo.id).unwrap()).clone();
        edited.rpc_urls = vec!["http://a".into(), "http://c".into()];
        assert!(registry.edit(edited).unwrap());

        let stored = registry.find_network_by_id(&foo.id).unwrap();
        assert_eq!(stored.selected_rpc_url, None);
        assert_eq!(registry.selected_rpc_url(&foo.id).as_deref(), Some("http://a"));
    }

    #[test]
    fn test_set_selected_rpc_url_requires_member() {
        let (registry, _) = open_memory_registry();
        registry.add(draft("Foo", &["http://a"])).unwrap();
        let foo = registry.find_network_by_name("Foo").unwrap();
        assert!(!registry.set_selected_rpc_url(&foo.id, "http://zzz").unwrap());
        assert!(!registry.set_selected_rpc_url(&Guid::new(), "http://a").unwrap());
    }

    #[test]
    fn test_edit_rejects_rename_onto_existing_name() {
        let (registry, _) = open_memory_registry();
        registry.add(draft("A", &[])).unwrap();
        registry.add(draft("B", &[])).unwrap();

        let mut b = (*registry.find_network_by_name("B").unwrap()).clone();
        b.name = "A".into();
        assert!(!registry.edit(b.clone()).unwrap());

        b.name = "C".into();
        assert!(registry.edit(b).unwrap());
        assert!(registry.has_network_with_name("C"));

        let mut unknown = (*registry.find_network_by_name("A").unwrap()).clone();
        unknown.id = Guid::new();
        unknown.name = "D".into();
        assert!(!registry.edit(unknown).unwrap());
    }

    #[test]
    fn test_edit_of_other_network_keeps_current_identity() {
        let (registry, _) = open_memory_registry();
        registry.add(draft("A", &[])).unwrap();
        registry.add(draft("B", &[])).unwrap();
        let current = registry.current_network().unwrap();
        let mut rx = registry.subscribe_current();

        let mut b = (*registry.find_network_by_name("B").unwrap()).clone();
        b.chain_id = 99;
        registry.edit(b).unwrap();

        assert!(Arc::ptr_eq(&registry.current_network().unwrap(), &current));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_reorder_requires_permutation() {
        let (registry, _) = open_memory_registry();
        for name in ["A", "B", "C"] {
            registry.add(draft(name, &[])).unwrap();
        }
        let ids: Vec<Guid> = registry.networks().iter().map(|n| n.id.clone()).collect();

        let reversed: Vec<Guid> = ids.iter().rev().cloned().collect();
        assert!(registry.reorder(&reversed).unwrap());
        let names: Vec<String> = registry.networks().iter().map(|n| n.name.clone()).collect();
        assert_eq!(names, vec!["C", "B", "A"]);

        assert!(!registry.reorder(&ids[..2]).unwrap());
        assert!(!registry
            .reorder(&[ids[0].clone(), ids[0].clone(), ids[1].clone()])
            .unwrap());
    }

    #[test]
    fn test_open_normalizes_and_writes_back_once() {
        let store = Arc::new(MemoryStore::new().with_entry(
            NETWORKS_KEY,
            serde_json::json!([
                {"name": "Legacy", "chainID": 1, "rpcURLs": ["http://a"], "selectedRpcUrl": "http://b"},
                {"guid": "keep", "name": "Modern", "chainID": 2, "currency": {"symbol": "M"},
                 "rpcURLs": [], "tokens": [], "nfts": [], "testnet": true}
            ]),
        ));
        let registry = NetworkRegistry::open(store.clone()).unwrap();
        // networks written back once, plus the repaired selection
        assert_eq!(store.write_count(), 2);

        let legacy = registry.find_network_by_name("Legacy").unwrap();
        assert!(!legacy.id.is_blank());
        assert_eq!(legacy.selected_rpc_url, None);
        assert_eq!(registry.selected_id(), Some(legacy.id.clone()));
        assert!(registry.find_network_by_id(&Guid::from("keep")).is_some());

        // Reopening clean data writes nothing
        let writes = store.write_count();
        let reopened = NetworkRegistry::open(store.clone()).unwrap();
        assert_eq!(store.write_count(), writes);
        assert_eq!(reopened.networks().len(), 2);
        assert_eq!(reopened.selected_id(), registry.selected_id());
    }

    #[test]
    fn test_open_keeps_entries_with_mistyped_fields() {
        let store = Arc::new(MemoryStore::new().with_entry(
            NETWORKS_KEY,
            serde_json::json!([
                {"guid": "a", "name": "Good", "chainID": 1, "currency": {"symbol": "ETH"},
                 "rpcURLs": ["http://a"], "tokens": [], "nfts": [], "testnet": false},
                {"guid": "b", "name": "MyChain", "chainID": "137", "currency": {"symbol": "POL"},
                 "rpcURLs": ["http://b"], "testnet": "true",
                 "tokens": [{"guid": "t", "item": {"contract_address": "0xabc"}}], "nfts": []}
            ]),
        ));
        let registry = NetworkRegistry::open(store.clone()).unwrap();

        let names: Vec<String> = registry.networks().iter().map(|n| n.name.clone()).collect();
        assert_eq!(names, vec!["Good", "MyChain"]);
        let chain = registry.find_network_by_id(&Guid::from("b")).unwrap();
        assert_eq!(chain.chain_id, 137);
        assert!(chain.testnet);
        assert_eq!(chain.tokens[0].id, Guid::from("t"));

        let stored = store.get_value(NETWORKS_KEY).unwrap().unwrap();
        assert_eq!(stored.as_array().unwrap().len(), 2);
        assert_eq!(stored[1]["name"], "MyChain");
        assert_eq!(stored[1]["tokens"][0]["guid"], "t");
    }

    /// Memory store whose selection writes can be switched off
    #[derive(Debug, Default)]
    struct SelectionWriteFails {
        inner: MemoryStore,
        fail: std::sync::atomic::AtomicBool,
    }

    impl KeyValueStore for SelectionWriteFails {
        fn get_value(&self, key: &str) -> std::result::Result<Option<serde_json::Value>, StoreError> {
            self.inner.get_value(key)
        }

        fn set_value(&self, key: &str, value: serde_json::Value) -> std::result::Result<(), StoreError> {
            if key == SELECTED_NETWORK_KEY && self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(StoreError::Backend(sled::Error::Unsupported("read-only".into())));
            }
            self.inner.set_value(key, value)
        }
    }

    #[test]
    fn test_failed_selection_write_publishes_nothing() {
        let store = Arc::new(SelectionWriteFails::default());
        let registry = NetworkRegistry::open(store.clone()).unwrap();
        registry.add(draft("Foo", &["http://a"])).unwrap();
        let foo = registry.find_network_by_name("Foo").unwrap();
        let before = registry.networks();

        store.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(registry.delete(&foo.id).is_err());

        // The selection still resolves against the published snapshot
        assert!(Arc::ptr_eq(&before, &registry.networks()));
        assert_eq!(registry.selected_id(), Some(foo.id.clone()));
        assert!(registry.find_network_by_id(&foo.id).is_some());
        assert_eq!(registry.current_network().map(|n| n.id.clone()), Some(foo.id.clone()));
    }

    #[test]
    fn test_replace_all_normalizes_and_reselects() {
        let (registry, _) = open_memory_registry();
        registry.add(draft("Old", &[])).unwrap();

        registry
            .replace_all(vec![
                RawNetwork {
                    name: Some("New".into()),
                    ..Default::default()
                },
                RawNetwork {
                    name: Some("New".into()),
                    ..Default::default()
                },
            ])
            .unwrap();

        let names: Vec<String> = registry.networks().iter().map(|n| n.name.clone()).collect();
        assert_eq!(names, vec!["New", "New (1)"]);
        let first = registry.networks()[0].id.clone();
        assert_eq!(registry.selected_id(), Some(first));
    }

    #[test]
    fn test_import_helpers() {
        let (registry, _) = open_memory_registry();
        registry.add(draft("Foo", &["http://a"])).unwrap();
        let foo_id = registry.find_network_by_name("Foo").unwrap().id.clone();

        let incoming = RawNetwork {
            guid: Some(foo_id.clone()),
            name: Some("Foo".into()),
            chain_id: Some(5),
            rpc_urls: Some(vec!["http://z".into()]),
            ..Default::default()
        };

        assert!(!registry.add_network_if_not_exists(incoming.clone()).unwrap());

        assert!(registry.replace_existing_network(incoming.clone()).unwrap());
        let foo = registry.find_network_by_name("Foo").unwrap();
        assert_eq!(foo.id, foo_id);
        assert_eq!(foo.chain_id, 5);

        let copy_id = registry.add_network_with_unique_name(incoming.clone()).unwrap();
        let copy = registry.find_network_by_id(&copy_id).unwrap();
        assert_eq!(copy.name, "Foo (1)");
        assert_ne!(copy.id, foo_id);

        let other = RawNetwork {
            guid: Some(foo_id.clone()),
            name: Some("Other".into()),
            ..Default::default()
        };
        assert!(registry.add_network_if_not_exists(other).unwrap());
        let other = registry.find_network_by_name("Other").unwrap();
        assert_ne!(other.id, foo_id);

        assert_eq!(registry.generate_unique_network_name("Foo"), "Foo (2)");
    }

    #[tokio::test]
    async fn test_subscribers_see_committed_snapshots() {
        let (registry, _) = open_memory_registry();
        let mut networks_rx = registry.subscribe_networks();
        let mut selection_rx = registry.subscribe_selection();

        registry.add(draft("Foo", &[])).unwrap();

        let snapshot = networks_rx.recv().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        let selection = selection_rx.recv().await.unwrap();
        assert_eq!(*selection, Some(snapshot[0].id.clone()));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8),
        Delete(usize),
        Select(usize),
        Reorder,
        Replace(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..6).prop_map(Op::Add),
            (0usize..6).prop_map(Op::Delete),
            (0usize..6).prop_map(Op::Select),
            Just(Op::Reorder),
            (0u8..4).prop_map(Op::Replace),
        ]
    }

    proptest! {
        #[test]
        fn prop_selection_valid_after_every_mutation(ops in proptest::collection::vec(op(), 1..25)) {
            let (registry, _) = open_memory_registry();
            for op in ops {
                let snapshot = registry.networks();
                match op {
                    Op::Add(n) => { registry.add(draft(&format!("N{}", n), &[])).unwrap(); }
                    Op::Delete(i) => {
                        if let Some(n) = snapshot.get(i) { registry.delete(&n.id).unwrap(); }
                    }
                    Op::Select(i) => {
                        if let Some(n) = snapshot.get(i) { registry.select(&n.id).unwrap(); }
                    }
                    Op::Reorder => {
                        let ids: Vec<Guid> = snapshot.iter().rev().map(|n| n.id.clone()).collect();
                        registry.reorder(&ids).unwrap();
                    }
                    Op::Replace(count) => {
                        let raw = (0..count)
                            .map(|i| RawNetwork { name: Some(format!("R{}", i % 2)), ..Default::default() })
                            .collect();
                        registry.replace_all(raw).unwrap();
                    }
                }

                let snapshot = registry.networks();
                match registry.selected_id() {
                    Some(id) => {
                        prop_assert!(snapshot.iter().any(|n| n.id == id));
                        prop_assert_eq!(registry.current_network().map(|n| n.id.clone()), Some(id));
                    }
                    None => {
                        prop_assert!(snapshot.is_empty());
                        prop_assert!(registry.current_network().is_none());
                    }
                }

                let ids: HashSet<_> = snapshot.iter().map(|n| n.id.clone()).collect();
                let names: HashSet<_> = snapshot.iter().map(|n| n.name.clone()).collect();
                prop_assert_eq!(ids.len(), snapshot.len());
                prop_assert_eq!(names.len(), snapshot.len());
            }
        }
    }
}
