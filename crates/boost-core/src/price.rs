//! Signed price bundles.
//!
//! A [`PriceBundle`] is the set of signed data packages fetched for one batch
//! attempt. It serves two purposes: looking up a [`PriceQuote`] by symbol for
//! eligibility scoring, and producing the attestation payload appended to
//! loan-contract calldata so on-chain code can check freshness and signers.
//!
//! Payload layout, all integers big-endian:
//!
//! ```text
//! package   := (feed_id[32] value[32])* timestamp_ms[6] value_size[4] point_count[3] signature[65]
//! payload   := package* package_count[2] metadata[] metadata_size[3] MARKER[9]
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::PRICE_VALUE_DECIMALS;
use crate::error::PriceError;
use crate::types::PriceQuote;

/// Trailing marker that identifies an attached price payload.
pub const PAYLOAD_MARKER: [u8; 9] = [0x00, 0x00, 0x02, 0xed, 0x57, 0x01, 0x1e, 0x00, 0x00];

/// Bytes used to encode each data point value.
pub const VALUE_BYTE_SIZE: usize = 32;

/// Length of a recoverable ECDSA signature.
pub const SIGNATURE_LEN: usize = 65;

const FEED_ID_LEN: usize = 32;
const TIMESTAMP_LEN: usize = 6;
const MAX_TIMESTAMP_MS: u64 = (1 << 48) - 1;
const MAX_POINT_COUNT: usize = (1 << 24) - 1;

/// A single `(feed, value)` observation inside a package.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub data_feed_id: String,
    pub value: f64,
}

/// One signer's attestation over a set of data points.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignedDataPackage {
    pub timestamp_milliseconds: u64,
    pub data_points: Vec<DataPoint>,
    /// 65-byte `r ‖ s ‖ v` signature.
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
    #[serde(default)]
    pub signer_address: Option<String>,
}

impl SignedDataPackage {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), PriceError> {
        if self.signature.len() != SIGNATURE_LEN {
            return Err(PriceError::Malformed(format!(
                "signature is {} bytes, expected {SIGNATURE_LEN}",
                self.signature.len()
            )));
        }
        if self.timestamp_milliseconds > MAX_TIMESTAMP_MS {
            return Err(PriceError::Malformed(format!(
                "timestamp {} does not fit in 6 bytes",
                self.timestamp_milliseconds
            )));
        }
        if self.data_points.len() > MAX_POINT_COUNT {
            return Err(PriceError::PayloadTooLarge(format!("{} data points", self.data_points.len())));
        }

        for point in &self.data_points {
            out.extend_from_slice(&feed_id_bytes(&point.data_feed_id)?);
            out.extend_from_slice(&value_bytes(point.value)?);
        }
        out.extend_from_slice(&self.timestamp_milliseconds.to_be_bytes()[8 - TIMESTAMP_LEN..]);
        out.extend_from_slice(&(VALUE_BYTE_SIZE as u32).to_be_bytes());
        out.extend_from_slice(&(self.data_points.len() as u32).to_be_bytes()[1..]);
        out.extend_from_slice(&self.signature);
        Ok(())
    }
}

/// The signed packages fetched for one batch attempt.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct PriceBundle {
    pub packages: Vec<SignedDataPackage>,
}

impl PriceBundle {
    pub fn new(packages: Vec<SignedDataPackage>) -> Self {
        Self { packages }
    }

    /// Oldest package timestamp, the bundle's effective "as of".
    pub fn timestamp_ms(&self) -> Option<u64> {
        self.packages.iter().map(|p| p.timestamp_milliseconds).min()
    }

    /// Median value reported for `symbol` across all packages.
    ///
    /// Returns `None` when no package carries the feed.
    pub fn quote(&self, symbol: &str) -> Option<PriceQuote> {
        let mut values: Vec<f64> = self
            .packages
            .iter()
            .flat_map(|p| p.data_points.iter())
            .filter(|dp| dp.data_feed_id == symbol && dp.value.is_finite())
            .map(|dp| dp.value)
            .collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));
        let mid = values.len() / 2;
        let value = if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        };
        Some(PriceQuote { symbol: symbol.to_string(), value })
    }

    /// Serialize the bundle into the calldata attestation payload.
    pub fn payload(&self) -> Result<Vec<u8>, PriceError> {
        if self.packages.len() > u16::MAX as usize {
            return Err(PriceError::PayloadTooLarge(format!("{} packages", self.packages.len())));
        }
        let mut out = Vec::new();
        for package in &self.packages {
            package.encode_into(&mut out)?;
        }
        out.extend_from_slice(&(self.packages.len() as u16).to_be_bytes());
        // No unsigned metadata.
        out.extend_from_slice(&[0u8; 3]);
        out.extend_from_slice(&PAYLOAD_MARKER);
        Ok(out)
    }
}

/// ASCII feed id, right-padded with zeros to 32 bytes.
pub fn feed_id_bytes(feed_id: &str) -> Result<[u8; FEED_ID_LEN], PriceError> {
    let raw = feed_id.as_bytes();
    if raw.len() > FEED_ID_LEN {
        return Err(PriceError::Malformed(format!("feed id {feed_id} longer than 32 bytes")));
    }
    let mut out = [0u8; FEED_ID_LEN];
    out[..raw.len()].copy_from_slice(raw);
    Ok(out)
}

fn value_bytes(value: f64) -> Result<[u8; VALUE_BYTE_SIZE], PriceError> {
    let scaled = (value * 10f64.powi(PRICE_VALUE_DECIMALS as i32)).round();
    if !scaled.is_finite() || scaled < 0.0 || scaled > u128::MAX as f64 {
        return Err(PriceError::Malformed(format!("unencodable price value {value}")));
    }
    let mut out = [0u8; VALUE_BYTE_SIZE];
    out[16..].copy_from_slice(&(scaled as u128).to_be_bytes());
    Ok(out)
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}
