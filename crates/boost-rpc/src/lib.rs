//! # boost-rpc: Network-facing collaborators.
//!
//! - [`RpcChainReader`]: loan registry and loan status over `eth_call`
//! - [`HttpPriceFeed`]: signed price packages from HTTP gateways
//! - [`WebhookNotifier`]: run outcome pings

pub mod abi;
pub mod chain;
pub mod notifier;
pub mod price_feed;

pub use chain::{NetworkContracts, RpcChainReader};
pub use notifier::WebhookNotifier;
pub use price_feed::{HttpPriceFeed, PriceSource};
