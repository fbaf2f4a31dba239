//! Round-robin RPC endpoint rotation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use boost_core::error::ChainError;
use boost_core::types::{Network, RpcEndpoint};

/// Which configured endpoint a run starts on.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EndpointPreference {
    /// First configured endpoint.
    #[default]
    Primary,
    /// Second configured endpoint, or the first if only one exists.
    Fallback,
}

impl EndpointPreference {
    fn start_index(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Fallback => 1,
        }
    }
}

impl FromStr for EndpointPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" => Ok(Self::Primary),
            "fallback" | "secondary" => Ok(Self::Fallback),
            other => Err(format!("unknown endpoint preference: {other}")),
        }
    }
}

impl fmt::Display for EndpointPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// The active endpoint of one run. Rotation persists across batches.
#[derive(Debug, Clone)]
pub struct EndpointRotation {
    endpoints: Vec<RpcEndpoint>,
    active: usize,
}

impl EndpointRotation {
    pub fn new(
        network: &Network,
        endpoints: Vec<RpcEndpoint>,
        preference: EndpointPreference,
    ) -> Result<Self, ChainError> {
        if endpoints.is_empty() {
            return Err(ChainError::NoEndpoint(network.to_string()));
        }
        let active = preference.start_index() % endpoints.len();
        Ok(Self { endpoints, active })
    }

    pub fn active(&self) -> &RpcEndpoint {
        &self.endpoints[self.active]
    }

    /// Switch to the next endpoint and return it.
    pub fn rotate(&mut self) -> &RpcEndpoint {
        self.active = (self.active + 1) % self.endpoints.len();
        self.active()
    }
}
