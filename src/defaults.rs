//! Built-in network list offered by `init-defaults`

use crate::types::{Currency, NetworkDraft, RawNetwork};

struct DefaultNetwork {
    name: &'static str,
    chain_id: u64,
    symbol: &'static str,
    icon_url: &'static str,
    explorer_url: &'static str,
    rpc_urls: &'static [&'static str],
    testnet: bool,
}

const DEFAULT_NETWORKS: &[DefaultNetwork] = &[
    DefaultNetwork {
        name: "Ethereum",
        chain_id: 1,
        symbol: "ETH",
        icon_url: "img/networks/ethereum.svg",
        explorer_url: "https://etherscan.io",
        rpc_urls: &[
            "https://ethereum-rpc.publicnode.com",
            "wss://ethereum-rpc.publicnode.com",
            "https://eth.llamarpc.com",
        ],
        testnet: false,
    },
    DefaultNetwork {
        name: "Polygon",
        chain_id: 137,
        symbol: "POL",
        icon_url: "img/networks/polygon.svg",
        explorer_url: "https://polygonscan.com",
        rpc_urls: &[
            "https://polygon-bor-rpc.publicnode.com",
            "wss://polygon-bor-rpc.publicnode.com",
            "https://polygon-rpc.com",
        ],
        testnet: false,
    },
    DefaultNetwork {
        name: "BNB Smart Chain",
        chain_id: 56,
        symbol: "BNB",
        icon_url: "img/networks/bsc.svg",
        explorer_url: "https://bscscan.com",
        rpc_urls: &[
            "https://bsc-rpc.publicnode.com",
            "wss://bsc-rpc.publicnode.com",
            "https://bsc-dataseed.bnbchain.org",
        ],
        testnet: false,
    },
    DefaultNetwork {
        name: "Arbitrum One",
        chain_id: 42161,
        symbol: "ETH",
        icon_url: "img/networks/arbitrum.svg",
        explorer_url: "https://arbiscan.io",
        rpc_urls: &[
            "https://arb1.arbitrum.io/rpc",
            "https://arbitrum-one-rpc.publicnode.com",
        ],
        testnet: false,
    },
    DefaultNetwork {
        name: "OP Mainnet",
        chain_id: 10,
        symbol: "ETH",
        icon_url: "img/networks/optimism.svg",
        explorer_url: "https://optimistic.etherscan.io",
        rpc_urls: &[
            "https://mainnet.optimism.io",
            "https://optimism-rpc.publicnode.com",
        ],
        testnet: false,
    },
    DefaultNetwork {
        name: "Base",
        chain_id: 8453,
        symbol: "ETH",
        icon_url: "img/networks/base.svg",
        explorer_url: "https://basescan.org",
        rpc_urls: &["https://mainnet.base.org", "https://base-rpc.publicnode.com"],
        testnet: false,
    },
    DefaultNetwork {
        name: "Sepolia",
        chain_id: 11155111,
        symbol: "ETH",
        icon_url: "img/networks/ethereum.svg",
        explorer_url: "https://sepolia.etherscan.io",
        rpc_urls: &[
            "https://ethereum-sepolia-rpc.publicnode.com",
            "wss://ethereum-sepolia-rpc.publicnode.com",
        ],
        testnet: true,
    },
];

/// Default networks as import candidates (no ids, empty token and NFT lists)
pub fn default_networks() -> Vec<RawNetwork> {
    DEFAULT_NETWORKS
        .iter()
        .map(|n| {
            let mut draft = NetworkDraft::new(n.name, n.chain_id)
                .with_rpc_urls(n.rpc_urls.iter().copied())
                .with_explorer(n.explorer_url)
                .testnet(n.testnet);
            draft.currency = Currency {
                symbol: n.symbol.to_string(),
                icon_url: Some(n.icon_url.to_string()),
            };
            RawNetwork::from(draft)
        })
        .collect()
}
