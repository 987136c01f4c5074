//! # Content Identifiers
//!
//! CIDv1 with a SHA-256 multihash, rendered as base58btc multibase (`z...`).
//!
//! ```text
//! 0x01 | codec varint | 0x12 0x20 | sha256 digest
//! ```
//!
//! Operations and DIDs use the `json` codec over canonical JSON; opaque blobs
//! use the `raw` codec.

use serde::Serialize;

use crate::canonical::canonical_json;
use crate::hashing::sha256;
use crate::CryptoError;

const CID_VERSION: u64 = 1;
const SHA2_256: u64 = 0x12;
const DIGEST_LEN: u64 = 32;
/// Multicodec for JSON.
pub const CODEC_JSON: u64 = 0x0200;
/// Multicodec for raw bytes.
pub const CODEC_RAW: u64 = 0x55;
const BASE58BTC_PREFIX: char = 'z';

fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn read_varint(bytes: &[u8], pos: &mut usize) -> Option<u64> {
    let mut value = 0u64;
    for shift in (0..63).step_by(7) {
        let byte = *bytes.get(*pos)?;
        *pos += 1;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some(value);
        }
    }
    None
}

fn encode(codec: u64, data: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(36);
    write_varint(CID_VERSION, &mut bytes);
    write_varint(codec, &mut bytes);
    write_varint(SHA2_256, &mut bytes);
    write_varint(DIGEST_LEN, &mut bytes);
    bytes.extend_from_slice(&sha256(data));
    format!("{}{}", BASE58BTC_PREFIX, bs58::encode(bytes).into_string())
}

/// CID of the canonical JSON form of `value`.
pub fn generate_cid<T: Serialize + ?Sized>(value: &T) -> Result<String, CryptoError> {
    let canonical = canonical_json(value)?;
    Ok(encode(CODEC_JSON, canonical.as_bytes()))
}

/// CID of opaque bytes.
pub fn generate_raw_cid(data: &[u8]) -> String {
    encode(CODEC_RAW, data)
}

/// Decode a CID into its codec and digest.
pub fn parse_cid(cid: &str) -> Result<(u64, [u8; 32]), CryptoError> {
    let invalid = || CryptoError::InvalidCid(cid.to_string());
    let body = cid.strip_prefix(BASE58BTC_PREFIX).ok_or_else(invalid)?;
    let bytes = bs58::decode(body).into_vec().map_err(|_| invalid())?;

    let mut pos = 0;
    let version = read_varint(&bytes, &mut pos).ok_or_else(invalid)?;
    let codec = read_varint(&bytes, &mut pos).ok_or_else(invalid)?;
    let hash_fn = read_varint(&bytes, &mut pos).ok_or_else(invalid)?;
    let len = read_varint(&bytes, &mut pos).ok_or_else(invalid)?;
    if version != CID_VERSION || hash_fn != SHA2_256 || len != DIGEST_LEN {
        return Err(invalid());
    }
    let digest: [u8; 32] = bytes[pos..].try_into().map_err(|_| invalid())?;
    Ok((codec, digest))
}

/// Whether `cid` is a well-formed CIDv1 sha256 string.
pub fn is_valid_cid(cid: &str) -> bool {
    parse_cid(cid).is_ok()
}
