use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Writable;

/// Data for one UI layer. Its structure belongs to the components that render it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerRecord(pub Value);

impl From<Value> for LayerRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

pub type LayerStore = Writable<Vec<LayerRecord>>;

/// The layer list, starting empty.
pub fn layers() -> LayerStore {
    Writable::new(Vec::new())
}
