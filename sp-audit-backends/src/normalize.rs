//! Shared JSON normalizer.
//!
//! Indexers disagree on response shape. Accepted forms:
//!
//! - a list of tweak strings or tweak objects
//! - an object wrapping such a list under `tweaks`, `silent_payment_tweaks`,
//!   `bip352_tweaks`, `data` or `results`
//! - a single tweak object
//! - `null` (no tweaks)
//!
//! Tweak objects carry the value in `tweak` or `hash`, and optionally a txid
//! in `txid`, `transaction_id`, `transaction_hash` or `tx_id`.

use serde_json::{Map, Value};
use sp_audit_core::{TweakRecord, TweakSet};

use crate::error::{BackendError, Result};

const CONTAINER_KEYS: [&str; 5] = ["tweaks", "silent_payment_tweaks", "bip352_tweaks", "data", "results"];
const TWEAK_KEYS: [&str; 2] = ["tweak", "hash"];
const TXID_KEYS: [&str; 4] = ["txid", "transaction_id", "transaction_hash", "tx_id"];

/// Reduce a decoded JSON response to a tweak set.
///
/// Empty tweak values are dropped. A non-hex tweak rejects the whole
/// response.
pub fn normalize_json(height: u64, value: &Value) -> Result<TweakSet> {
    let mut set = TweakSet::new();
    collect(height, value, &mut set, true)?;
    Ok(set)
}

fn collect(height: u64, value: &Value, set: &mut TweakSet, top_level: bool) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::String(tweak) => push(height, None, tweak, set),
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(_) | Value::Object(_) | Value::Null => {
                        collect(height, item, set, false)?
                    }
                    other => {
                        return Err(BackendError::Malformed(format!(
                            "unexpected tweak entry: {}",
                            other
                        )))
                    }
                }
            }
            Ok(())
        }
        Value::Object(map) => {
            if top_level {
                if let Some(inner) = CONTAINER_KEYS.iter().find_map(|k| map.get(*k)) {
                    return match inner {
                        Value::Array(_) | Value::Null => collect(height, inner, set, false),
                        other => Err(BackendError::Malformed(format!(
                            "tweak container is not a list: {}",
                            other
                        ))),
                    };
                }
            }
            match first_str(map, &TWEAK_KEYS) {
                Some(tweak) => push(height, first_str(map, &TXID_KEYS), tweak, set),
                None => Err(BackendError::Malformed(
                    "object has neither a tweak list nor a tweak value".to_string(),
                )),
            }
        }
        other => Err(BackendError::Malformed(format!("unexpected response: {}", other))),
    }
}

fn first_str<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| map.get(*k).and_then(Value::as_str))
}

fn push(height: u64, txid: Option<&str>, tweak: &str, set: &mut TweakSet) -> Result<()> {
    if tweak.trim().is_empty() {
        return Ok(());
    }
    set.insert(TweakRecord::new(height, txid, tweak)?);
    Ok(())
}
