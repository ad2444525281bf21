//! chainwatch - EVM network registry and RPC endpoint health checks
//!
//! The library keeps a persisted, ordered registry of EVM network profiles
//! (RPC URLs, currency, tokens, NFTs) with a derived "current network", and
//! probes RPC endpoints over HTTP or WebSocket JSON-RPC for liveness, latency
//! and block freshness.

pub mod config;
pub mod defaults;
pub mod endpoints;
pub mod format;
pub mod guid;
pub mod metrics;
pub mod registry;
pub mod rpc_probe;
pub mod state;
pub mod store;
pub mod structured_logging;
pub mod types;

pub mod test_utils;

// Re-export commonly used types
pub use config::Config;
pub use guid::Guid;
pub use registry::{NetworkRegistry, RegistryError};
pub use rpc_probe::{ProbeError, Prober};
pub use store::{KeyValueStore, MemoryStore, SledStore, StoreError};
pub use types::{NetworkDraft, NetworkRecord, RawNetwork, RpcServerStatus};
