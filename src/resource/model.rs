//! Desired-state models
//!
//! A [`ResourceModel`] is the untyped field map sent to the API. The typed
//! structs below ([`UserModel`], [`FstabParams`]) are what callers fill in;
//! unset optional fields never reach the wire.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle state requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Present,
    Absent,
    Fetch,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Fetch => "fetch",
        }
    }
}

/// Field map of one entity's desired attributes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceModel(Map<String, Value>);

impl ResourceModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model from a JSON object, stripping null fields
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map).strip_null()),
            Value::Null => Ok(Self::default()),
            other => Err(Error::model(format!(
                "model must be a mapping, got: {}",
                other
            ))),
        }
    }

    /// Remove every null-valued field, recursing into nested mappings.
    pub fn strip_null(self) -> Self {
        Self(strip_null_map(self.0))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(|v| v.as_str())
    }

    pub fn insert(&mut self, field: &str, value: Value) {
        if !value.is_null() {
            self.0.insert(field.to_string(), value);
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Fail with a model error naming every required field that is missing
    /// or an empty string.
    pub fn require(&self, fields: &[String]) -> Result<()> {
        let missing: Vec<&str> = fields
            .iter()
            .filter(|field| match self.0.get(field.as_str()) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            })
            .map(|field| field.as_str())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::model(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )))
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

fn strip_null_map(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| match v {
            Value::Object(inner) => (k, Value::Object(strip_null_map(inner))),
            other => (k, other),
        })
        .collect()
}

/// TrueNAS user attributes
///
/// `group_create` is only accepted by the create schema; it is removed
/// before an update.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_create: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microsoft_account: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smb: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sudo: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sudo_nopasswd: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sudo_commands: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sshpubkey: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
}

impl UserModel {
    pub fn into_model(self) -> Result<ResourceModel> {
        let value = serde_json::to_value(self)
            .map_err(|e| Error::model(format!("failed to encode user model: {}", e)))?;
        ResourceModel::from_value(value)
    }
}

/// Mount options of a jail fstab entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsOptions {
    #[default]
    Rw,
    Ro,
}

impl FsOptions {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rw => "rw",
            Self::Ro => "ro",
        }
    }
}

/// Desired jail fstab entry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FstabParams {
    pub jail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default)]
    pub fsoptions: FsOptions,
    /// Replace an entry that mounts the same source at another destination
    #[serde(default)]
    pub force: bool,
}

impl FstabParams {
    pub fn to_model(&self) -> ResourceModel {
        let mut model = ResourceModel::new();
        model.insert("jail", Value::String(self.jail.clone()));
        if let Some(source) = &self.source {
            model.insert("source", Value::String(source.clone()));
        }
        if let Some(destination) = &self.destination {
            model.insert("destination", Value::String(destination.clone()));
        }
        model.insert("fsoptions", Value::String(self.fsoptions.as_str().to_string()));
        model
    }
}
