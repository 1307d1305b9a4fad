use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

pub const HASH_FIELD: &str = "hash";

/// 14-digit `YYYYMMDDHHmmss` UTC request timestamp
pub fn request_time(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// PayWay request hash: base64(SHA-512(data + api_key)).
pub fn sign(api_key: &str, data: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(data.as_bytes());
    hasher.update(api_key.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Values of every field except `hash`, ordered by key and concatenated.
pub fn callback_signing_string(payload: &Map<String, Value>) -> String {
    let mut fields: Vec<(&String, &Value)> = payload
        .iter()
        .filter(|(key, _)| key.as_str() != HASH_FIELD)
        .collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    fields.into_iter().map(|(_, value)| plain_string(value)).collect()
}

pub fn verify_callback(api_key: &str, payload: &Map<String, Value>) -> bool {
    let Some(supplied) = payload.get(HASH_FIELD).and_then(Value::as_str) else {
        return false;
    };
    let expected = sign(api_key, &callback_signing_string(payload));
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

/// Strings contribute their raw text; everything else its JSON rendering.
fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
