//! Caller-facing node and edge rows.

use serde::{Deserialize, Serialize};

use super::values::{PropertyValue, Values};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub schema: String,
    /// Caller-assigned id; empty lets the server assign one
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uuid: u64,
    #[serde(default)]
    pub values: Values,
}

impl Node {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_uuid(mut self, uuid: u64) -> Self {
        self.uuid = uuid;
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.values.set(name, value);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub schema: String,
    #[serde(default)]
    pub uuid: u64,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub from_uuid: u64,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub to_uuid: u64,
    #[serde(default)]
    pub values: Values,
}

impl Edge {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            ..Default::default()
        }
    }

    /// Sets both endpoints by id
    pub fn between(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from = from.into();
        self.to = to.into();
        self
    }

    /// Sets both endpoints by uuid
    pub fn between_uuids(mut self, from_uuid: u64, to_uuid: u64) -> Self {
        self.from_uuid = from_uuid;
        self.to_uuid = to_uuid;
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.values.set(name, value);
        self
    }
}
