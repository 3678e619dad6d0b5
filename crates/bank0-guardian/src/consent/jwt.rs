//! Signed bearer tokens for consent-service requests.
//!
//! Compact JWS with header `{"typ":"guardian-authz-req+jwt","alg":"PS256"}`,
//! signed with the enrollment's RSA key (RSASSA-PSS over SHA-256).

use bank0_core::{Bank0Error, Bank0Result, Enrollment};
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};

pub const JWT_ALGORITHM: Algorithm = Algorithm::PS256;
pub const JWT_TYPE: &str = "guardian-authz-req+jwt";
/// Token lifetime in seconds.
pub const JWT_LIFETIME_SECS: i64 = 30;

/// Claims of a consent request token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthzClaims {
    pub iat: i64,
    pub exp: i64,
    pub aud: String,
    pub iss: String,
    pub sub: String,
    pub authenticator_id: String,
}

impl AuthzClaims {
    pub fn new(
        now: DateTime<Utc>,
        audience: &str,
        client_id: &str,
        subject: &str,
        authenticator_id: &str,
    ) -> Self {
        let iat = now.timestamp();
        Self {
            iat,
            exp: iat + JWT_LIFETIME_SECS,
            aud: audience.to_string(),
            iss: client_id.to_string(),
            sub: subject.to_string(),
            authenticator_id: authenticator_id.to_string(),
        }
    }
}

/// PS256 signer holding an enrollment's private key.
pub struct RequestSigner {
    key: EncodingKey,
}

impl RequestSigner {
    /// Load a PKCS#8 DER encoded RSA private key.
    pub fn from_pkcs8_der(der: &[u8]) -> Bank0Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| Bank0Error::InvalidSigningKey(e.to_string()))?;
        // The signing backend takes PKCS#1.
        let pkcs1 = private
            .to_pkcs1_der()
            .map_err(|e| Bank0Error::InvalidSigningKey(e.to_string()))?;
        Ok(Self {
            key: EncodingKey::from_rsa_der(pkcs1.as_bytes()),
        })
    }

    /// Load the signing key carried by `enrollment`.
    pub fn from_enrollment(enrollment: &Enrollment) -> Bank0Result<Self> {
        Self::from_pkcs8_der(&enrollment.signing_key_der()?)
    }

    /// Produce the compact serialisation of a signed token.
    pub fn sign(&self, claims: &AuthzClaims) -> Bank0Result<String> {
        let header = Header {
            typ: Some(JWT_TYPE.to_string()),
            alg: JWT_ALGORITHM,
            ..Default::default()
        };
        encode(&header, claims, &self.key)
            .map_err(|e| Bank0Error::InvalidSigningKey(format!("unable to sign token: {}", e)))
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner").finish_non_exhaustive()
    }
}
