//! Issuer public key set.
//!
//! Keys come from the issuer's JWKS document, fetched by the caller and
//! handed to the validator. Lookup is by `kid`; each key is pinned to the
//! algorithm it was published for.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::warn;

/// Minimum RSA modulus size in bytes (2048 bits).
const MIN_RSA_MODULUS_BYTES: usize = 256;

/// JSON Web Key structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (RSA, EC)
    pub kty: String,
    /// Key ID
    pub kid: String,
    /// Key use (sig, enc)
    #[serde(rename = "use", default)]
    pub key_use: Option<String>,
    /// Algorithm
    #[serde(default)]
    pub alg: Option<String>,
    /// RSA modulus
    #[serde(default)]
    pub n: Option<String>,
    /// RSA exponent
    #[serde(default)]
    pub e: Option<String>,
    /// EC x coordinate
    #[serde(default)]
    pub x: Option<String>,
    /// EC y coordinate
    #[serde(default)]
    pub y: Option<String>,
    /// EC curve
    #[serde(default)]
    pub crv: Option<String>,
}

/// JSON Web Key Set structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    /// List of keys
    pub keys: Vec<Jwk>,
}

struct IssuerKey {
    key: DecodingKey,
    algorithm: Algorithm,
}

/// Verification keys indexed by key id.
#[derive(Default)]
pub struct IssuerKeys {
    keys: HashMap<String, IssuerKey>,
}

impl IssuerKeys {
    /// Creates an empty key set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a key set from a parsed JWKS, skipping unusable keys.
    #[must_use]
    pub fn from_jwks(jwks: &Jwks) -> Self {
        let mut keys = Self::new();
        for jwk in &jwks.keys {
            if let Some(key) = jwk_to_issuer_key(jwk) {
                keys.keys.insert(jwk.kid.clone(), key);
            }
        }
        keys
    }

    /// Parses a JWKS document.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the document is not a JWKS.
    pub fn from_jwks_json(json: &str) -> Result<Self, serde_json::Error> {
        let jwks: Jwks = serde_json::from_str(json)?;
        Ok(Self::from_jwks(&jwks))
    }

    /// Adds a key pinned to an algorithm.
    pub fn insert(&mut self, kid: impl Into<String>, key: DecodingKey, algorithm: Algorithm) {
        self.keys.insert(kid.into(), IssuerKey { key, algorithm });
    }

    /// Key and pinned algorithm for a key id.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<(&DecodingKey, Algorithm)> {
        self.keys.get(kid).map(|k| (&k.key, k.algorithm))
    }

    /// Number of usable keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no usable key was loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for IssuerKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kids: Vec<&String> = self.keys.keys().collect();
        kids.sort();
        f.debug_struct("IssuerKeys").field("kids", &kids).finish()
    }
}

/// Converts a JWK to a pinned decoding key.
fn jwk_to_issuer_key(jwk: &Jwk) -> Option<IssuerKey> {
    if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
        warn!(kid = %jwk.kid, "Skipping non-signing key");
        return None;
    }

    match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_ref()?;
            let e = jwk.e.as_ref()?;

            let modulus = URL_SAFE_NO_PAD.decode(n).ok()?;
            let significant = modulus.iter().skip_while(|b| **b == 0).count();
            if significant < MIN_RSA_MODULUS_BYTES {
                warn!(kid = %jwk.kid, bits = significant * 8, "RSA key too small, rejecting");
                return None;
            }

            let algorithm = match jwk.alg.as_deref() {
                None => Algorithm::RS256,
                Some(name) => match Algorithm::from_str(name).ok()? {
                    alg @ (Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512) => alg,
                    _ => {
                        warn!(kid = %jwk.kid, alg = %name, "Algorithm does not match RSA key");
                        return None;
                    }
                },
            };

            let key = DecodingKey::from_rsa_components(n, e).ok()?;
            Some(IssuerKey { key, algorithm })
        }
        "EC" => {
            let x = jwk.x.as_ref()?;
            let y = jwk.y.as_ref()?;
            let crv = jwk.crv.as_deref().unwrap_or("P-256");

            let algorithm = match crv {
                "P-256" => Algorithm::ES256,
                "P-384" => Algorithm::ES384,
                _ => {
                    warn!(kid = %jwk.kid, crv = %crv, "Unsupported EC curve, rejecting");
                    return None;
                }
            };

            let key = DecodingKey::from_ec_components(x, y).ok()?;
            Some(IssuerKey { key, algorithm })
        }
        _ => {
            warn!(kty = %jwk.kty, "Unsupported key type");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsa_jwk(kid: &str, modulus_bytes: usize) -> Jwk {
        let mut modulus = vec![0xC5u8; modulus_bytes];
        modulus[modulus_bytes - 1] = 0x01;
        Jwk {
            kty: "RSA".to_string(),
            kid: kid.to_string(),
            key_use: Some("sig".to_string()),
            alg: Some("RS256".to_string()),
            n: Some(URL_SAFE_NO_PAD.encode(&modulus)),
            e: Some("AQAB".to_string()),
            x: None,
            y: None,
            crv: None,
        }
    }

    #[test]
    fn test_accepts_2048_bit_rsa() {
        let keys = IssuerKeys::from_jwks(&Jwks {
            keys: vec![rsa_jwk("k1", 256)],
        });
        assert_eq!(keys.len(), 1);
        assert_eq!(keys.get("k1").map(|(_, alg)| alg), Some(Algorithm::RS256));
    }

    #[test]
    fn test_rejects_small_rsa() {
        let keys = IssuerKeys::from_jwks(&Jwks {
            keys: vec![rsa_jwk("weak", 128)],
        });
        assert!(keys.is_empty());
    }

    #[test]
    fn test_rejects_encryption_keys_and_unknown_types() {
        let mut enc = rsa_jwk("enc", 256);
        enc.key_use = Some("enc".to_string());
        let mut oct = rsa_jwk("oct", 256);
        oct.kty = "oct".to_string();
        let keys = IssuerKeys::from_jwks(&Jwks {
            keys: vec![enc, oct],
        });
        assert!(keys.is_empty());
    }

    #[test]
    fn test_rejects_mismatched_algorithm() {
        let mut jwk = rsa_jwk("k1", 256);
        jwk.alg = Some("HS256".to_string());
        assert!(IssuerKeys::from_jwks(&Jwks { keys: vec![jwk] }).is_empty());
    }

    #[test]
    fn test_rejects_p521() {
        let jwk = Jwk {
            kty: "EC".to_string(),
            kid: "ec".to_string(),
            key_use: None,
            alg: None,
            n: None,
            e: None,
            x: Some("AQ".to_string()),
            y: Some("AQ".to_string()),
            crv: Some("P-521".to_string()),
        };
        assert!(IssuerKeys::from_jwks(&Jwks { keys: vec![jwk] }).is_empty());
    }

    #[test]
    fn test_from_jwks_json() {
        assert!(IssuerKeys::from_jwks_json(r#"{"keys": []}"#).unwrap().is_empty());
        assert!(IssuerKeys::from_jwks_json("[]").is_err());
    }

    #[test]
    fn test_debug_lists_kids_only() {
        let mut keys = IssuerKeys::new();
        keys.insert("k2", DecodingKey::from_secret(b"s"), Algorithm::HS256);
        keys.insert("k1", DecodingKey::from_secret(b"s"), Algorithm::HS256);
        assert_eq!(format!("{keys:?}"), r#"IssuerKeys { kids: ["k1", "k2"] }"#);
    }
}
