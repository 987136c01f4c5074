//! # ECDSA Signatures (secp256k1)
//!
//! Operation signatures are compact `r || s` secp256k1 signatures, hex
//! encoded, over the 32-byte `hash_json` digest of the unsigned operation.
//! Public keys travel as JWKs with base64url `x`/`y` coordinates.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Low-S normalization; high-S signatures are rejected on verify

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use k256::ecdsa::{
    signature::hazmat::{PrehashSigner, PrehashVerifier},
    Signature, SigningKey, VerifyingKey,
};
use shared_types::PublicJwk;
use zeroize::Zeroize;

use crate::CryptoError;

const UNCOMPRESSED_TAG: u8 = 0x04;

fn decode_hash(hash_hex: &str) -> Result<[u8; 32], CryptoError> {
    let bytes = hex::decode(hash_hex).map_err(|_| CryptoError::InvalidHash(hash_hex.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidHash(hash_hex.to_string()))
}

fn decode_coordinate(value: &str) -> Result<Vec<u8>, CryptoError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(CryptoError::InvalidPublicKey(format!(
            "coordinate length {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Convert a secp256k1 JWK into a verifying key.
pub fn jwk_to_verifying_key(jwk: &PublicJwk) -> Result<VerifyingKey, CryptoError> {
    if jwk.kty != "EC" || jwk.crv != "secp256k1" {
        return Err(CryptoError::InvalidPublicKey(format!(
            "unsupported key {}/{}",
            jwk.kty, jwk.crv
        )));
    }
    let mut sec1 = Vec::with_capacity(65);
    sec1.push(UNCOMPRESSED_TAG);
    sec1.extend(decode_coordinate(&jwk.x)?);
    sec1.extend(decode_coordinate(&jwk.y)?);
    VerifyingKey::from_sec1_bytes(&sec1).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// Express a verifying key as a JWK.
pub fn verifying_key_to_jwk(key: &VerifyingKey) -> Result<PublicJwk, CryptoError> {
    let point = key.to_encoded_point(false);
    let bytes = point.as_bytes();
    if bytes.len() != 65 {
        return Err(CryptoError::InvalidPublicKey("not an uncompressed point".into()));
    }
    Ok(PublicJwk {
        kty: "EC".to_string(),
        crv: "secp256k1".to_string(),
        x: URL_SAFE_NO_PAD.encode(&bytes[1..33]),
        y: URL_SAFE_NO_PAD.encode(&bytes[33..65]),
    })
}

/// Verify a hex compact signature over a hex digest with a JWK public key.
pub fn verify_signature(
    hash_hex: &str,
    signature_hex: &str,
    jwk: &PublicJwk,
) -> Result<(), CryptoError> {
    let digest = decode_hash(hash_hex)?;
    let sig_bytes = hex::decode(signature_hex).map_err(|_| CryptoError::InvalidSignatureFormat)?;
    let signature =
        Signature::from_slice(&sig_bytes).map_err(|_| CryptoError::InvalidSignatureFormat)?;
    let key = jwk_to_verifying_key(jwk)?;

    key.verify_prehash(&digest, &signature)
        .map_err(|_| CryptoError::SignatureVerificationFailed)
}

/// secp256k1 ECDSA keypair.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Public key as a JWK.
    pub fn public_jwk(&self) -> Result<PublicJwk, CryptoError> {
        verifying_key_to_jwk(self.signing_key.verifying_key())
    }

    /// Sign a hex digest, returning a hex compact signature.
    pub fn sign_hash(&self, hash_hex: &str) -> Result<String, CryptoError> {
        let digest = decode_hash(hash_hex)?;
        let sig: Signature = self
            .signing_key
            .sign_prehash(&digest)
            .map_err(|_| CryptoError::InvalidSignatureFormat)?;
        let sig = sig.normalize_s().unwrap_or(sig);
        Ok(hex::encode(sig.to_bytes()))
    }

    /// Get secret key bytes (for serialization).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

impl Drop for Secp256k1KeyPair {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::sha256_hex;

    #[test]
    fn test_sign_verify() {
        let keypair = Secp256k1KeyPair::generate();
        let hash = sha256_hex(b"Hello, secp256k1!");

        let signature = keypair.sign_hash(&hash).unwrap();
        let jwk = keypair.public_jwk().unwrap();

        assert_eq!(signature.len(), 128);
        assert!(verify_signature(&hash, &signature, &jwk).is_ok());
    }

    #[test]
    fn test_wrong_hash_fails() {
        let keypair = Secp256k1KeyPair::generate();
        let signature = keypair.sign_hash(&sha256_hex(b"message1")).unwrap();
        let jwk = keypair.public_jwk().unwrap();

        let result = verify_signature(&sha256_hex(b"message2"), &signature, &jwk);
        assert!(matches!(result, Err(CryptoError::SignatureVerificationFailed)));
    }

    #[test]
    fn test_wrong_key_fails() {
        let signer = Secp256k1KeyPair::generate();
        let other = Secp256k1KeyPair::generate();
        let hash = sha256_hex(b"payload");
        let signature = signer.sign_hash(&hash).unwrap();

        assert!(verify_signature(&hash, &signature, &other.public_jwk().unwrap()).is_err());
    }

    #[test]
    fn test_deterministic_signatures() {
        let keypair = Secp256k1KeyPair::from_bytes([0xABu8; 32]).unwrap();
        let hash = sha256_hex(b"deterministic test");

        assert_eq!(
            keypair.sign_hash(&hash).unwrap(),
            keypair.sign_hash(&hash).unwrap()
        );
    }

    #[test]
    fn test_jwk_round_trip() {
        let keypair = Secp256k1KeyPair::generate();
        let jwk = keypair.public_jwk().unwrap();
        let key = jwk_to_verifying_key(&jwk).unwrap();
        assert_eq!(verifying_key_to_jwk(&key).unwrap(), jwk);
    }

    #[test]
    fn test_malformed_inputs_are_errors() {
        let keypair = Secp256k1KeyPair::generate();
        let jwk = keypair.public_jwk().unwrap();
        let hash = sha256_hex(b"x");

        assert!(matches!(
            verify_signature("zz", "00", &jwk),
            Err(CryptoError::InvalidHash(_))
        ));
        assert!(matches!(
            verify_signature(&hash, "abcd", &jwk),
            Err(CryptoError::InvalidSignatureFormat)
        ));

        let mut bad = jwk.clone();
        bad.x = "AAAA".into();
        assert!(matches!(
            verify_signature(&hash, &"00".repeat(64), &bad),
            Err(CryptoError::InvalidSignatureFormat) | Err(CryptoError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_roundtrip_bytes() {
        let original = Secp256k1KeyPair::generate();
        let restored = Secp256k1KeyPair::from_bytes(original.to_bytes()).unwrap();

        assert_eq!(original.public_jwk().unwrap(), restored.public_jwk().unwrap());
    }
}
