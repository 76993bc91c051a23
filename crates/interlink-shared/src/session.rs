//! Session credentials issued by the identity provider.
//!
//! The provider signs `user_id || role || expires_at` with its Ed25519 key;
//! clients present the token as a base64url string. The server only ever
//! verifies, it never issues.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::types::{Role, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionToken {
    pub user_id: UserId,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
    pub signature: Vec<u8>,
}

/// The verified content of a [`SessionToken`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: UserId,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn encode(&self) -> String {
        // Serializing plain data into a Vec cannot fail.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn decode(code: &str) -> Result<Self, AuthError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(code.trim())
            .map_err(|_| AuthError::Malformed)?;
        serde_json::from_slice(&bytes).map_err(|_| AuthError::Malformed)
    }

    /// Check expiry and signature against the provider's public key.
    pub fn verify(&self, provider_pubkey: &[u8; 32]) -> Result<SessionClaims, AuthError> {
        if Utc::now() > self.expires_at {
            return Err(AuthError::Expired);
        }

        let verifying_key =
            VerifyingKey::from_bytes(provider_pubkey).map_err(|_| AuthError::InvalidSignature)?;
        let signature =
            Signature::from_slice(&self.signature).map_err(|_| AuthError::InvalidSignature)?;

        // verify_strict rejects small-order keys, so the all-zero dev key
        // accepts nothing.
        verifying_key
            .verify_strict(
                &signing_payload(&self.user_id, self.role, &self.expires_at),
                &signature,
            )
            .map_err(|_| AuthError::InvalidSignature)?;

        Ok(SessionClaims {
            user_id: self.user_id,
            role: self.role,
            expires_at: self.expires_at,
        })
    }
}

/// Decode and verify an encoded credential in one step.
pub fn verify_session_token(
    code: &str,
    provider_pubkey: &[u8; 32],
) -> Result<SessionClaims, AuthError> {
    if code.trim().is_empty() {
        return Err(AuthError::MissingCredential);
    }
    SessionToken::decode(code)?.verify(provider_pubkey)
}

/// Sign a credential. Used by the identity provider and by tests.
pub fn issue_session_token(
    user_id: UserId,
    role: Role,
    expires_at: DateTime<Utc>,
    provider_key: &SigningKey,
) -> SessionToken {
    let signature = provider_key.sign(&signing_payload(&user_id, role, &expires_at));
    SessionToken {
        user_id,
        role,
        expires_at,
        signature: signature.to_bytes().to_vec(),
    }
}

fn signing_payload(user_id: &UserId, role: Role, expires_at: &DateTime<Utc>) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(user_id.0.as_bytes());
    payload.extend_from_slice(role.as_str().as_bytes());
    payload.push(b'|');
    payload.extend_from_slice(expires_at.to_rfc3339().as_bytes());
    payload
}
