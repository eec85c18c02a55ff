#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-tree settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TreeConfig {
    /// Payload fields giving siblings a total order. Empty means insertion order.
    pub ordering_keys: Vec<String>,
    /// Payload fields holding references, resolved through `NodeStore::lookup` on bulk load.
    pub reference_fields: Vec<String>,
}

impl TreeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_by<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.ordering_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn reference(mut self, field: impl Into<String>) -> Self {
        self.reference_fields.push(field.into());
        self
    }

    pub fn is_ordered(&self) -> bool {
        !self.ordering_keys.is_empty()
    }
}
