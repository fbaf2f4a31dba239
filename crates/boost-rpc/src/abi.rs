//! Minimal Solidity ABI encoding for the calls the chain reader makes.
//!
//! Only static arguments and the handful of return shapes we read are
//! supported: `uint256`, `uint256[N]`, and a dynamic `address[]`.

use boost_core::error::ChainError;
use boost_core::types::LoanAddress;

pub const WORD: usize = 32;

/// `getAllLoans()`
pub const GET_ALL_LOANS: [u8; 4] = [0xa5, 0xbf, 0xd1, 0x6a];

/// `getFullLoanStatus()` returning `uint256[5]`:
/// total value, debt, threshold-weighted value, health ratio, solvency flag.
pub const GET_FULL_LOAN_STATUS: [u8; 4] = [0xd4, 0x4e, 0x28, 0x2b];

/// `getBalance(bytes32)`
pub const GET_BALANCE: [u8; 4] = [0x8e, 0x73, 0x94, 0x61];

/// Word index of the total value in `getFullLoanStatus()`.
pub const STATUS_TOTAL_VALUE: usize = 0;

/// Word index of the debt in `getFullLoanStatus()`.
pub const STATUS_DEBT: usize = 1;

/// `selector ‖ args`
pub fn encode_call(selector: [u8; 4], args: &[[u8; WORD]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + args.len() * WORD);
    out.extend_from_slice(&selector);
    for arg in args {
        out.extend_from_slice(arg);
    }
    out
}

/// ASCII symbol right-padded to a `bytes32`.
pub fn bytes32_symbol(symbol: &str) -> Result<[u8; WORD], ChainError> {
    let raw = symbol.as_bytes();
    if raw.len() > WORD {
        return Err(ChainError::Decode(format!("symbol {symbol} longer than 32 bytes")));
    }
    let mut out = [0u8; WORD];
    out[..raw.len()].copy_from_slice(raw);
    Ok(out)
}

/// Parse a `0x`-prefixed hex result from `eth_call`.
pub fn decode_hex(result: &str) -> Result<Vec<u8>, ChainError> {
    let digits = result.strip_prefix("0x").unwrap_or(result);
    hex::decode(digits).map_err(|e| ChainError::Decode(format!("bad hex result: {e}")))
}

/// The `index`-th 32-byte word of `data`.
pub fn word(data: &[u8], index: usize) -> Result<&[u8], ChainError> {
    index
        .checked_mul(WORD)
        .and_then(|start| data.get(start..start.checked_add(WORD)?))
        .ok_or_else(|| ChainError::Decode(format!("return data too short for word {index}: {} bytes", data.len())))
}

/// A word interpreted as a small unsigned integer (offsets, lengths).
pub fn word_as_usize(word: &[u8]) -> Result<usize, ChainError> {
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(ChainError::Decode("integer does not fit in 64 bits".into()));
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(tail)).map_err(|e| ChainError::Decode(e.to_string()))
}

/// A `uint256` word scaled down by `10^decimals`.
pub fn word_as_decimal(word: &[u8], decimals: u32) -> f64 {
    let raw = word.iter().fold(0f64, |acc, b| acc * 256.0 + *b as f64);
    raw / 10f64.powi(decimals as i32)
}

/// Decode a single dynamic `address[]` return value.
pub fn decode_address_array(data: &[u8]) -> Result<Vec<LoanAddress>, ChainError> {
    let offset = word_as_usize(word(data, 0)?)?;
    if offset % WORD != 0 {
        return Err(ChainError::Decode(format!("unaligned array offset {offset}")));
    }
    let base = offset / WORD;
    let len = word_as_usize(word(data, base)?)?;

    (0..len)
        .map(|i| {
            let w = word(data, base.saturating_add(1).saturating_add(i))?;
            if w[..12].iter().any(|b| *b != 0) {
                return Err(ChainError::Decode(format!("address {i} has dirty high bytes")));
            }
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(&w[12..]);
            Ok(LoanAddress::from_bytes(bytes))
        })
        .collect()
}
