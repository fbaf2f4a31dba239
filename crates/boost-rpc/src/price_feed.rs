//! [`PriceFeed`] backed by HTTP price gateways.
//!
//! Gateways serve the latest signed packages for a data service as a map of
//! feed id to packages, one package per signer. The feed tries gateways in
//! order and keeps the first response that covers every required feed with
//! enough distinct signers. With no feeds configured every feed the gateway
//! serves is required, since loan status calls price all held assets.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use boost_core::error::PriceError;
use boost_core::price::{PriceBundle, SignedDataPackage};
use boost_core::traits::PriceFeed;
use boost_core::types::Network;

/// Where and what to fetch for one network.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSource {
    /// Base URLs, tried in order.
    pub gateways: Vec<String>,
    pub service_id: String,
    /// Packages required per feed, each from a different signer.
    pub unique_signers: usize,
    /// Feed ids the loans need priced. Empty means every served feed.
    pub feeds: Vec<String>,
}

impl PriceSource {
    pub fn latest_url(&self, gateway: &str) -> String {
        format!("{}/data-packages/latest/{}", gateway.trim_end_matches('/'), self.service_id)
    }
}

/// Gateway response body.
pub type GatewayResponse = HashMap<String, Vec<SignedDataPackage>>;

/// Pick `unique_signers` packages per required feed, newest first.
///
/// Packages without a signer address are treated as distinct signers.
pub fn select_packages(mut response: GatewayResponse, source: &PriceSource) -> Result<PriceBundle, PriceError> {
    let feeds: Vec<String> = if source.feeds.is_empty() {
        if response.is_empty() {
            return Err(PriceError::Malformed("gateway served no feeds".into()));
        }
        let mut served: Vec<String> = response.keys().cloned().collect();
        served.sort();
        served
    } else {
        source.feeds.clone()
    };
    let mut selected = Vec::with_capacity(feeds.len() * source.unique_signers);

    for feed in &feeds {
        let mut candidates = response.remove(feed).unwrap_or_default();
        candidates.sort_by(|a, b| b.timestamp_milliseconds.cmp(&a.timestamp_milliseconds));

        let mut signers = HashSet::new();
        let before = selected.len();
        for package in candidates {
            if selected.len() - before == source.unique_signers {
                break;
            }
            if let Some(signer) = &package.signer_address {
                if !signers.insert(signer.to_ascii_lowercase()) {
                    continue;
                }
            }
            selected.push(package);
        }

        let got = selected.len() - before;
        if got < source.unique_signers {
            return Err(PriceError::InsufficientSigners { feed: feed.clone(), got, need: source.unique_signers });
        }
    }

    Ok(PriceBundle::new(selected))
}

pub struct HttpPriceFeed {
    client: Client,
    sources: HashMap<Network, PriceSource>,
}

impl HttpPriceFeed {
    pub fn new(sources: HashMap<Network, PriceSource>, timeout: Duration) -> Result<Self, PriceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PriceError::Gateway(format!("build http client: {e}")))?;
        Ok(Self { client, sources })
    }

    async fn fetch_from(&self, url: &str) -> Result<GatewayResponse, PriceError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PriceError::Gateway(format!("{url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PriceError::Gateway(format!("{url} returned {status}")));
        }
        resp.json::<GatewayResponse>()
            .await
            .map_err(|e| PriceError::Malformed(format!("{url}: {e}")))
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn fetch(&self, network: &Network) -> Result<PriceBundle, PriceError> {
        let source = self
            .sources
            .get(network)
            .ok_or_else(|| PriceError::Gateway(format!("no price source for {network}")))?;

        for gateway in &source.gateways {
            let url = source.latest_url(gateway);
            match self.fetch_from(&url).await.and_then(|resp| select_packages(resp, source)) {
                Ok(bundle) => {
                    debug!(
                        %network,
                        gateway = %gateway,
                        packages = bundle.packages.len(),
                        as_of_ms = ?bundle.timestamp_ms(),
                        "fetched price bundle"
                    );
                    return Ok(bundle);
                }
                Err(e) => warn!(%network, gateway = %gateway, error = %e, "price gateway failed"),
            }
        }
        Err(PriceError::AllGatewaysFailed(source.gateways.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boost_core::price::{DataPoint, SIGNATURE_LEN};

    fn source(feeds: &[&str], unique_signers: usize) -> PriceSource {
        PriceSource {
            gateways: vec!["http://127.0.0.1:1".into()],
            service_id: "redstone-avalanche-prod".into(),
            unique_signers,
            feeds: feeds.iter().map(|f| f.to_string()).collect(),
        }
    }

    fn package(feed: &str, ts: u64, signer: Option<&str>) -> SignedDataPackage {
        SignedDataPackage {
            timestamp_milliseconds: ts,
            data_points: vec![DataPoint { data_feed_id: feed.into(), value: 1.0 }],
            signature: vec![0x33; SIGNATURE_LEN],
            signer_address: signer.map(str::to_string),
        }
    }

    // ------------------------------------------------------------------
    // select_packages
    // ------------------------------------------------------------------

    #[test]
    fn keeps_newest_packages_per_feed() {
        let mut resp = GatewayResponse::new();
        resp.insert(
            "GLP".into(),
            vec![package("GLP", 100, Some("0xa")), package("GLP", 300, Some("0xb")), package("GLP", 200, Some("0xc"))],
        );
        let bundle = select_packages(resp, &source(&["GLP"], 2)).unwrap();
        let stamps: Vec<u64> = bundle.packages.iter().map(|p| p.timestamp_milliseconds).collect();
        assert_eq!(stamps, vec![300, 200]);
    }

    #[test]
    fn duplicate_signers_count_once() {
        let mut resp = GatewayResponse::new();
        resp.insert("GLP".into(), vec![package("GLP", 2, Some("0xA")), package("GLP", 1, Some("0xa"))]);
        let err = select_packages(resp, &source(&["GLP"], 2)).unwrap_err();
        assert_eq!(err, PriceError::InsufficientSigners { feed: "GLP".into(), got: 1, need: 2 });
    }

    #[test]
    fn missing_feed_is_insufficient() {
        let mut resp = GatewayResponse::new();
        resp.insert("ETH".into(), vec![package("ETH", 1, None)]);
        let err = select_packages(resp, &source(&["ETH", "GLP"], 1)).unwrap_err();
        assert!(matches!(err, PriceError::InsufficientSigners { ref feed, got: 0, .. } if feed == "GLP"));
    }

    #[test]
    fn bundle_spans_all_feeds() {
        let mut resp = GatewayResponse::new();
        resp.insert("ETH".into(), vec![package("ETH", 1, None)]);
        resp.insert("GLP".into(), vec![package("GLP", 1, None)]);
        resp.insert("BTC".into(), vec![package("BTC", 1, None)]);
        let bundle = select_packages(resp, &source(&["ETH", "GLP"], 1)).unwrap();
        assert_eq!(bundle.packages.len(), 2);
        assert!(bundle.quote("BTC").is_none());
        assert!(bundle.quote("GLP").is_some());
    }

    #[test]
    fn unrestricted_source_keeps_every_served_feed() {
        let mut resp = GatewayResponse::new();
        resp.insert("GLP".into(), vec![package("GLP", 1, Some("0xa"))]);
        resp.insert("ETH".into(), vec![package("ETH", 1, Some("0xa"))]);
        resp.insert("USDC".into(), vec![package("USDC", 1, Some("0xa"))]);
        let bundle = select_packages(resp, &source(&[], 1)).unwrap();
        assert_eq!(bundle.packages.len(), 3);
        for feed in ["ETH", "GLP", "USDC"] {
            assert!(bundle.quote(feed).is_some(), "{feed} dropped");
        }
    }

    #[test]
    fn unrestricted_source_checks_signers_per_feed() {
        let mut resp = GatewayResponse::new();
        resp.insert("GLP".into(), vec![package("GLP", 2, Some("0xa")), package("GLP", 1, Some("0xb"))]);
        resp.insert("ETH".into(), vec![package("ETH", 1, Some("0xa"))]);
        let err = select_packages(resp, &source(&[], 2)).unwrap_err();
        assert_eq!(err, PriceError::InsufficientSigners { feed: "ETH".into(), got: 1, need: 2 });
    }

    #[test]
    fn unrestricted_source_rejects_empty_response() {
        let err = select_packages(GatewayResponse::new(), &source(&[], 1)).unwrap_err();
        assert!(matches!(err, PriceError::Malformed(_)));
    }

    #[test]
    fn latest_url_trims_trailing_slash() {
        let s = source(&[], 1);
        assert_eq!(
            s.latest_url("https://gw.example/"),
            "https://gw.example/data-packages/latest/redstone-avalanche-prod"
        );
    }

    // ------------------------------------------------------------------
    // HttpPriceFeed
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn all_gateways_down() {
        let mut sources = HashMap::new();
        let mut s = source(&["GLP"], 1);
        s.gateways.push("http://127.0.0.1:2".into());
        sources.insert(Network::new("avalanche"), s);
        let feed = HttpPriceFeed::new(sources, Duration::from_secs(1)).unwrap();
        let err = feed.fetch(&Network::new("avalanche")).await.unwrap_err();
        assert_eq!(err, PriceError::AllGatewaysFailed(2));
    }

    #[tokio::test]
    async fn unknown_network() {
        let feed = HttpPriceFeed::new(HashMap::new(), Duration::from_secs(1)).unwrap();
        assert!(matches!(feed.fetch(&Network::new("x")).await, Err(PriceError::Gateway(_))));
    }
}
