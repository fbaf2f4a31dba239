//! Error types for the Boost pipeline.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("rpc transport: {0}")] Transport(String),
    #[error("call reverted on {contract}: {reason}")] Reverted { contract: String, reason: String },
    #[error("abi decode: {0}")] Decode(String),
    #[error("invalid address: {0}")] InvalidAddress(String),
    #[error("no rpc endpoint configured for {0}")] NoEndpoint(String),
    #[error("unknown network: {0}")] UnknownNetwork(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    #[error("price gateway: {0}")] Gateway(String),
    #[error("all {0} price gateways failed")] AllGatewaysFailed(usize),
    #[error("malformed data package: {0}")] Malformed(String),
    #[error("feed {feed} has {got} signed packages, need {need}")] InsufficientSigners { feed: String, got: usize, need: usize },
    #[error("payload too large: {0}")] PayloadTooLarge(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend: {0}")] Backend(String),
    #[error("codec: {0}")] Codec(String),
    #[error("corrupt key in {table}")] CorruptKey { table: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributionError {
    #[error("multiplier must be at least 1")] ZeroMultiplier,
    #[error("weekly budget must be finite and non-negative, got {0}")] InvalidBudget(String),
}

#[derive(Error, Debug)]
pub enum BoostError {
    #[error(transparent)] Chain(#[from] ChainError),
    #[error(transparent)] Price(#[from] PriceError),
    #[error(transparent)] Store(#[from] StoreError),
    #[error(transparent)] Distribution(#[from] DistributionError),
    #[error("notifier: {0}")] Notifier(String),
}
