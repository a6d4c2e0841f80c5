//! Jail fstab response filter
//!
//! The LIST action of `jail/fstab` answers with an object keyed by the
//! entry index:
//!
//! ```json
//! {
//!   "0": {
//!     "entry": ["/mnt/tank/storage", "/mnt/tank/iocage/jails/j1/root/mnt/storage",
//!               "nullfs", "rw", "0", "0"],
//!     "type": "USER"
//!   }
//! }
//! ```
//!
//! which is awkward to query. This module flattens it into one record per
//! entry, keeping the order the API returned.

use crate::error::{Error, Result};
use crate::truenas::connection::TransportResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of positional fields in an fstab entry
const ENTRY_FIELDS: usize = 6;

/// One flattened fstab entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FstabEntry {
    pub index: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub source: String,
    pub destination: String,
    pub fstype: String,
    pub fsoptions: String,
    pub dump: String,
    pub pass: String,
}

impl FstabEntry {
    /// Entries added through the API, as opposed to the jail's own mounts
    pub fn is_user(&self) -> bool {
        self.entry_type == "USER"
    }
}

/// Flatten a jail fstab LIST response into ordered records.
pub fn structure_truenas_api_jail_fstab_entry_response(response: &Value) -> Result<Vec<FstabEntry>> {
    let Some(entries) = response.as_object() else {
        return Err(Error::unexpected(format!(
            "fstab listing is not an object: {}",
            response
        )));
    };

    entries
        .iter()
        .map(|(index, value)| structure_entry(index, value))
        .collect()
}

/// Listing body from saved output.
///
/// Accepts the bare LIST body, a `{status_code, body}` transport record, or
/// the whole result printed by `jail-fstab` in fetch state (record under
/// `response`). Index keys are numeric, so these keys never collide with a
/// listing.
pub fn listing_body(mut saved: Value) -> Result<Value> {
    let nested = saved.get_mut("response").map(Value::take);
    if let Some(response) = nested {
        saved = response;
    } else if saved.get("status_code").is_none() {
        return Ok(saved);
    }

    let result = TransportResult::from_value(saved)?;
    if !result.is_success() {
        return Err(Error::Server {
            code: result.status_code,
            body: result.body,
        });
    }
    Ok(result.body)
}

fn structure_entry(index: &str, value: &Value) -> Result<FstabEntry> {
    let entry_type = value
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::unexpected(format!("fstab entry {} has no type", index)))?;

    let fields = value
        .get("entry")
        .and_then(|v| v.as_array())
        .filter(|fields| fields.len() >= ENTRY_FIELDS)
        .ok_or_else(|| {
            Error::unexpected(format!(
                "fstab entry {} does not have {} fields: {}",
                index, ENTRY_FIELDS, value
            ))
        })?;

    let field = |i: usize| field_to_string(&fields[i]);

    Ok(FstabEntry {
        index: index.to_string(),
        entry_type: entry_type.to_string(),
        source: field(0),
        destination: field(1),
        fstype: field(2),
        fsoptions: field(3),
        dump: field(4),
        pass: field(5),
    })
}

fn field_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
