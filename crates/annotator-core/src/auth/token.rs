//! Decoding of compact three-segment bearer tokens.
//!
//! Only the claims segment is read. Signatures are the backend's concern; the
//! client needs the `exp` claim to decide whether a stored credential is still
//! worth sending.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::clock::{now_millis, Clock};

/// Standard alphabet, padding optional, non-zero trailing bits ignored.
/// URL-safe input is mapped onto it first.
const CLAIMS_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("expected 3 segments, found {0}")]
    Segments(usize),

    #[error("claims segment is not base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("claims segment is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("claims segment is not JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("claims segment is not a JSON object")]
    NotAnObject,
}

/// Decoded claims object. Every claim is kept; only `exp` is interpreted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn sub(&self) -> Option<&str> {
        self.get("sub").and_then(Value::as_str)
    }

    pub fn role(&self) -> Option<&str> {
        self.get("role").and_then(Value::as_str)
    }

    /// Expiry in seconds since the epoch. Missing, non-numeric or zero is unusable.
    pub fn exp_seconds(&self) -> Option<f64> {
        self.get("exp")
            .and_then(Value::as_f64)
            .filter(|exp| *exp != 0.0 && exp.is_finite())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let millis = (self.exp_seconds()? * 1000.0) as i64;
        DateTime::from_timestamp_millis(millis)
    }

    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        match self.exp_seconds() {
            Some(exp) => now_millis(clock) as f64 >= exp * 1000.0,
            None => true,
        }
    }
}

/// Decode the claims segment, reporting why it failed.
pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Segments(segments.len()));
    }

    let standard: String = segments[1]
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let bytes = CLAIMS_ENGINE.decode(standard)?;
    let json = String::from_utf8(bytes)?;
    match serde_json::from_str::<Value>(&json)? {
        Value::Object(map) => Ok(Claims(map)),
        _ => Err(TokenError::NotAnObject),
    }
}

/// Decode the claims segment, or `None` if the token is malformed.
pub fn parse_claims(token: &str) -> Option<Claims> {
    match decode_claims(token) {
        Ok(claims) => Some(claims),
        Err(e) => {
            debug!(error = %e, "Could not decode token claims");
            None
        }
    }
}

/// True unless the token decodes and carries an `exp` strictly in the future.
pub fn is_token_expired(token: &str, clock: &dyn Clock) -> bool {
    parse_claims(token)
        .map(|claims| claims.is_expired(clock))
        .unwrap_or(true)
}

#[cfg(test)]
pub(crate) fn encode_test_token(claims: &Value) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}
