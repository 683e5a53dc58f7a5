//! The `{ success, data, metadata }` wrapper every successful JSON response uses.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Serialize, Debug)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    pub metadata: Map<String, Value>,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self::at(data, Utc::now())
    }

    pub fn at(data: T, generated_at: DateTime<Utc>) -> Self {
        let mut metadata = Map::new();
        metadata.insert(
            "generatedAt".into(),
            Value::String(generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        Self {
            success: true,
            data,
            metadata,
        }
    }

    pub fn with_count(self, count: usize) -> Self {
        self.with("count", count)
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}
