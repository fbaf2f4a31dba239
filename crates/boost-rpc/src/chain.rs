//! [`ChainReader`] over Ethereum JSON-RPC.
//!
//! Every read is an `eth_call`. Loan reads carry the price bundle's payload
//! appended to calldata; the loan contract strips and verifies it before
//! pricing its assets, and reverts if the attestations are stale or unsigned.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonrpsee::core::client::{ClientT, Error as ClientError};
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use parking_lot::Mutex;
use tracing::{debug, trace};

use boost_core::constants::LOAN_VALUE_DECIMALS;
use boost_core::error::ChainError;
use boost_core::price::PriceBundle;
use boost_core::traits::ChainReader;
use boost_core::types::{LoanAddress, LoanRecord, Network, RpcEndpoint};

use crate::abi;

/// Per-network contract addresses and tracked-asset settings.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkContracts {
    /// Registry that lists every loan.
    pub registry: LoanAddress,
    /// Asset whose balance is read from each loan.
    pub tracked_symbol: String,
    /// Decimals of the tracked asset's balance.
    pub tracked_decimals: u32,
}

/// JSON-RPC chain reader. HTTP clients are built lazily, one per endpoint URL.
pub struct RpcChainReader {
    networks: HashMap<Network, NetworkContracts>,
    clients: Mutex<HashMap<String, Arc<HttpClient>>>,
    request_timeout: Duration,
}

impl RpcChainReader {
    pub fn new(networks: HashMap<Network, NetworkContracts>, request_timeout: Duration) -> Self {
        Self { networks, clients: Mutex::new(HashMap::new()), request_timeout }
    }

    fn contracts(&self, network: &Network) -> Result<&NetworkContracts, ChainError> {
        self.networks
            .get(network)
            .ok_or_else(|| ChainError::UnknownNetwork(network.to_string()))
    }

    fn client(&self, endpoint: &RpcEndpoint) -> Result<Arc<HttpClient>, ChainError> {
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(&endpoint.url) {
            return Ok(Arc::clone(client));
        }
        let client = HttpClientBuilder::default()
            .request_timeout(self.request_timeout)
            .build(&endpoint.url)
            .map_err(|e| ChainError::Transport(format!("{endpoint}: {e}")))?;
        let client = Arc::new(client);
        clients.insert(endpoint.url.clone(), Arc::clone(&client));
        debug!(%endpoint, "built rpc client");
        Ok(client)
    }

    async fn eth_call(
        &self,
        endpoint: &RpcEndpoint,
        to: &LoanAddress,
        calldata: &[u8],
    ) -> Result<Vec<u8>, ChainError> {
        let client = self.client(endpoint)?;

        let mut params = ArrayParams::new();
        params
            .insert(serde_json::json!({ "to": to.as_str(), "data": format!("0x{}", hex::encode(calldata)) }))
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        params.insert("latest").map_err(|e| ChainError::Transport(e.to_string()))?;

        trace!(%to, bytes = calldata.len(), "eth_call");
        let result: String = client.request("eth_call", params).await.map_err(|e| match e {
            ClientError::Call(obj) => ChainError::Reverted { contract: to.to_string(), reason: obj.message().to_string() },
            other => ChainError::Transport(format!("{endpoint}: {other}")),
        })?;
        abi::decode_hex(&result)
    }
}

/// Calldata for a loan read: `selector ‖ args ‖ price payload`.
pub fn priced_calldata(
    selector: [u8; 4],
    args: &[[u8; abi::WORD]],
    bundle: &PriceBundle,
) -> Result<Vec<u8>, ChainError> {
    let mut data = abi::encode_call(selector, args);
    let payload = bundle
        .payload()
        .map_err(|e| ChainError::Decode(format!("price payload: {e}")))?;
    data.extend_from_slice(&payload);
    Ok(data)
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn list_all_loans(
        &self,
        network: &Network,
        endpoint: &RpcEndpoint,
    ) -> Result<Vec<LoanAddress>, ChainError> {
        let contracts = self.contracts(network)?;
        let data = abi::encode_call(abi::GET_ALL_LOANS, &[]);
        let ret = self.eth_call(endpoint, &contracts.registry, &data).await?;
        let loans = abi::decode_address_array(&ret)?;
        debug!(%network, %endpoint, count = loans.len(), "listed loans");
        Ok(loans)
    }

    async fn read_loan_status(
        &self,
        network: &Network,
        endpoint: &RpcEndpoint,
        address: &LoanAddress,
        bundle: &PriceBundle,
    ) -> Result<LoanRecord, ChainError> {
        let contracts = self.contracts(network)?;

        let status_call = priced_calldata(abi::GET_FULL_LOAN_STATUS, &[], bundle)?;
        let balance_call = priced_calldata(
            abi::GET_BALANCE,
            &[abi::bytes32_symbol(&contracts.tracked_symbol)?],
            bundle,
        )?;

        let (status, balance) = tokio::try_join!(
            self.eth_call(endpoint, address, &status_call),
            self.eth_call(endpoint, address, &balance_call),
        )?;

        Ok(LoanRecord {
            address: address.clone(),
            raw_collateral: abi::word_as_decimal(abi::word(&status, abi::STATUS_TOTAL_VALUE)?, LOAN_VALUE_DECIMALS),
            raw_debt: abi::word_as_decimal(abi::word(&status, abi::STATUS_DEBT)?, LOAN_VALUE_DECIMALS),
            tracked_asset_balance: abi::word_as_decimal(abi::word(&balance, 0)?, contracts.tracked_decimals),
        })
    }
}
