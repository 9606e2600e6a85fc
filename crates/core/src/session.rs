//! Signed session claims carried as bearer tokens.
//!
//! A token is `<role>.<subject>.<expires_unix>.<hex hmac-sha256>` where the
//! signature covers the first three segments.

use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::flows::{Actor, ActorRole};

type HmacSha256 = Hmac<Sha256>;

const MAX_TTL_SECS: i64 = 366 * 24 * 60 * 60;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session token is malformed")]
    Malformed,
    #[error("session token signature is invalid")]
    BadSignature,
    #[error("session token expired at {0}")]
    Expired(DateTime<Utc>),
    #[error("session subject `{0}` is not valid")]
    InvalidSubject(String),
    #[error("session signing key is unusable")]
    InvalidKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub role: ActorRole,
    pub subject_id: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionClaims {
    pub fn actor(&self) -> Actor {
        Actor::new(self.role, self.subject_id.clone())
    }

    fn payload(&self) -> String {
        format!("{}.{}.{}", self.role.as_str(), self.subject_id, self.expires_at.timestamp())
    }
}

#[derive(Clone)]
pub struct SessionSigner {
    secret: SecretString,
    ttl: Duration,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl SessionSigner {
    pub fn new(secret: SecretString, ttl_secs: u64) -> Self {
        let ttl = Duration::seconds(i64::try_from(ttl_secs).unwrap_or(MAX_TTL_SECS).min(MAX_TTL_SECS));
        Self { secret, ttl }
    }

    pub fn issue(
        &self,
        role: ActorRole,
        subject_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, SessionClaims), SessionError> {
        let subject_id = subject_id.trim();
        if subject_id.is_empty()
            || subject_id.contains('.')
            || subject_id.contains(char::is_whitespace)
        {
            return Err(SessionError::InvalidSubject(subject_id.to_string()));
        }

        let claims = SessionClaims {
            role,
            subject_id: subject_id.to_string(),
            expires_at: now + self.ttl,
        };
        let payload = claims.payload();
        let signature = encode_hex(&self.sign(payload.as_bytes())?);
        Ok((format!("{payload}.{signature}"), claims))
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, SessionError> {
        let (payload, signature) = token.trim().rsplit_once('.').ok_or(SessionError::Malformed)?;
        let mut segments = payload.split('.');
        let (Some(role), Some(subject_id), Some(expires), None) =
            (segments.next(), segments.next(), segments.next(), segments.next())
        else {
            return Err(SessionError::Malformed);
        };

        let signature = decode_hex(signature).ok_or(SessionError::Malformed)?;
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| SessionError::BadSignature)?;

        let role = role.parse::<ActorRole>().map_err(|_| SessionError::Malformed)?;
        let expires = expires.parse::<i64>().map_err(|_| SessionError::Malformed)?;
        let expires_at = Utc.timestamp_opt(expires, 0).single().ok_or(SessionError::Malformed)?;
        if expires_at <= now {
            return Err(SessionError::Expired(expires_at));
        }

        Ok(SessionClaims { role, subject_id: subject_id.to_string(), expires_at })
    }

    fn mac(&self) -> Result<HmacSha256, SessionError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SessionError::InvalidKey)
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, SessionError> {
        let mut mac = self.mac()?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

fn decode_hex(raw: &str) -> Option<Vec<u8>> {
    if raw.len() % 2 != 0 || !raw.is_ascii() {
        return None;
    }
    (0..raw.len())
        .step_by(2)
        .map(|index| u8::from_str_radix(&raw[index..index + 2], 16).ok())
        .collect()
}
