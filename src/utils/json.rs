//! Patch-field semantics for partial updates. A JSON body distinguishes
//! three cases per nullable column: key absent (keep the stored value),
//! explicit null (clear it), value (replace it). A plain `Option` cannot
//! represent the first two separately, so update DTOs use `Patch<T>`.

use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Patch<T> {
    Omitted,
    Null,
    Value(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Omitted
    }
}

impl<T> Patch<T> {
    pub fn is_omitted(&self) -> bool {
        matches!(self, Patch::Omitted)
    }

    /// Folds the patch over the stored value.
    pub fn resolve(self, existing: Option<T>) -> Option<T> {
        match self {
            Patch::Omitted => existing,
            Patch::Null => None,
            Patch::Value(value) => Some(value),
        }
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Only runs when the key is present; `#[serde(default)]` on the
        // DTO field produces Omitted for an absent key.
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Value(value),
            None => Patch::Null,
        })
    }
}
