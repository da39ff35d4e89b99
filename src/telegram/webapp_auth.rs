//! Telegram Mini App init data verification.
//!
//! When Telegram launches a Mini App it attaches a signed query-string
//! payload (`initData`). Verification is fully offline: the HMAC key is
//! derived from the bot token as `HMAC_SHA256(key = "WebAppData",
//! msg = bot_token)`, and the payload hash is
//! `HMAC_SHA256(key = secret, msg = data_check_string)` where the
//! data-check string is every field except `hash`, sorted by key and
//! joined as `key=value` with `\n`.
//!
//! Note the key/message roles in the first step: the constant string is
//! the HMAC *key* and the bot token is the *message*. That is Telegram's
//! convention and reversing it produces hashes that never match.
//!
//! The whole check is a pure function of (payload, token): no I/O, no
//! clock, no shared state. Freshness is deliberately left to callers —
//! [`VerifiedInitData::auth_date`] and [`VerifiedInitData::age`] expose
//! the timestamp, nothing here rejects stale payloads.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// HMAC key for deriving the per-bot secret, fixed by the platform.
const SECRET_KEY_SEED: &[u8] = b"WebAppData";

/// Why an init data payload was rejected.
///
/// A missing `hash` field and a wrong `hash` are reported identically so
/// the response never tells a forger which part of their guess was off.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitDataError {
    /// The raw payload was empty or absent.
    #[error("missing init data payload")]
    MissingPayload,
    /// The signature check failed (wrong, malformed or absent hash).
    #[error("init data hash mismatch")]
    HashMismatch,
    /// The payload is signed correctly but its `user` field is missing
    /// or not valid JSON. Genuine Telegram clients never produce this.
    #[error("init data user field missing or malformed")]
    MalformedUser,
}

/// The `user` field of a verified payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebAppUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

/// A payload that passed the signature check.
///
/// Field decoding stays lazy: the hash proves authenticity for the raw
/// field values, and [`user`](Self::user) reports `MalformedUser`
/// separately so callers can tell "forged" from "signed but unparseable".
#[derive(Debug, Clone)]
pub struct VerifiedInitData {
    fields: HashMap<String, String>,
}

impl VerifiedInitData {
    /// Raw (percent-decoded) value of an init data field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// When Telegram generated the payload, as Unix seconds.
    pub fn auth_date(&self) -> Option<i64> {
        self.get("auth_date").and_then(|v| v.parse().ok())
    }

    /// Payload age in seconds relative to `now_unix`.
    ///
    /// Staleness policy belongs to the caller; a typical cutoff is 24h.
    pub fn age(&self, now_unix: i64) -> Option<i64> {
        self.auth_date().map(|auth_date| now_unix - auth_date)
    }

    /// Decode the `user` field.
    pub fn user(&self) -> Result<WebAppUser, InitDataError> {
        let raw = self.get("user").ok_or(InitDataError::MalformedUser)?;
        serde_json::from_str(raw).map_err(|_| InitDataError::MalformedUser)
    }
}

/// Parse a query string into a key → value map, percent-decoding values.
///
/// Telegram emits unique keys; if a key somehow repeats, the last value
/// wins, which matches what the hash was computed over in practice.
fn parse_query_pairs(raw: &str) -> HashMap<String, String> {
    raw.split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(key), Some(value)) => {
                    let decoded = urlencoding::decode(value).ok()?;
                    Some((key.to_string(), decoded.into_owned()))
                }
                _ => None,
            }
        })
        .collect()
}

/// Canonical serialization the hash is computed over: all fields except
/// `hash`, sorted bytewise by key, `key=value` joined with `\n`.
fn data_check_string(fields: &HashMap<String, String>) -> String {
    let mut pairs: Vec<(&str, &str)> = fields
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    pairs.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let mut out = String::new();
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(key);
        out.push('=');
        out.push_str(value);
    }
    out
}

/// Verify a raw init data payload against the bot token.
///
/// Returns the decoded payload on success. All signature failures come
/// back as [`InitDataError::HashMismatch`]; malformed input never panics.
///
/// # Example
/// ```no_run
/// use kopilka::telegram::webapp_auth;
///
/// let raw = "auth_date=...&user=...&hash=...";
/// let data = webapp_auth::verify(raw, "123:ABC")?;
/// let user = data.user()?;
/// # Ok::<(), kopilka::telegram::webapp_auth::InitDataError>(())
/// ```
pub fn verify(raw_init_data: &str, bot_token: &str) -> Result<VerifiedInitData, InitDataError> {
    if raw_init_data.trim().is_empty() {
        return Err(InitDataError::MissingPayload);
    }

    let mut fields = parse_query_pairs(raw_init_data);
    let received_hash = fields.remove("hash").ok_or(InitDataError::HashMismatch)?;
    // Non-hex or truncated hashes can never match; reject before the MAC.
    let received = hex::decode(&received_hash).map_err(|_| InitDataError::HashMismatch)?;

    let check_string = data_check_string(&fields);

    // secret = HMAC_SHA256(key = "WebAppData", msg = bot_token)
    let mut secret_mac =
        HmacSha256::new_from_slice(SECRET_KEY_SEED).map_err(|_| InitDataError::HashMismatch)?;
    secret_mac.update(bot_token.as_bytes());
    let secret_key = secret_mac.finalize().into_bytes();

    // calc = HMAC_SHA256(key = secret, msg = data_check_string)
    let mut mac =
        HmacSha256::new_from_slice(&secret_key).map_err(|_| InitDataError::HashMismatch)?;
    mac.update(check_string.as_bytes());

    // verify_slice rejects length mismatches up front and compares
    // equal-length tags in constant time, so the comparison never
    // short-circuits on the first differing byte.
    mac.verify_slice(&received)
        .map_err(|_| InitDataError::HashMismatch)?;

    Ok(VerifiedInitData { fields })
}

/// Verify a payload and decode its `user` field in one step.
///
/// The common shape for request handlers that only care about identity.
pub fn verify_user(raw_init_data: &str, bot_token: &str) -> Result<WebAppUser, InitDataError> {
    verify(raw_init_data, bot_token)?.user()
}
