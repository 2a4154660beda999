//! JSON config files for the command line tools
//!
//! ```json
//! {
//!   "name": "people",
//!   "totalMemoryCap": 67108864,
//!   "slotCount": 1024,
//!   "disabledTypes": ["bin", "f32"]
//! }
//! ```
//!
//! All fields are optional, missing fields take the values of `BankConfig::default()`.
use std::{fs, path::Path};

use anyhow::Context;
use databank::{BankConfig, TypeMask, ValueKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
    pub name: Option<String>,
    pub total_memory_cap: Option<u64>,
    pub slot_count: Option<u64>,
    pub primary_key_index: Option<u64>,
    /// kind names as printed by the dumps, e.g. `"u32"`
    pub disabled_types: Vec<String>,
}

impl ConfigFile {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let res = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        Ok(res)
    }

    pub fn bank_config(&self) -> anyhow::Result<BankConfig> {
        let defaults = BankConfig::default();
        let mut disabled_types = TypeMask::empty();
        for name in &self.disabled_types {
            disabled_types |= TypeMask::from(kind_by_name(name)?);
        }
        let res = BankConfig {
            name: self.name.clone(),
            total_memory_cap: self.total_memory_cap.unwrap_or(defaults.total_memory_cap),
            primary_key_hash_table_slot_count: self
                .slot_count
                .unwrap_or(defaults.primary_key_hash_table_slot_count),
            primary_key_index: self.primary_key_index.unwrap_or(defaults.primary_key_index),
            disabled_types,
        };
        res.validate()?;
        Ok(res)
    }
}

/// Look up a data point kind by its display name.
pub fn kind_by_name(name: &str) -> anyhow::Result<ValueKind> {
    ValueKind::ALL
        .iter()
        .copied()
        .filter(|kind| kind.is_data_point())
        .find(|kind| kind.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| anyhow::anyhow!("unknown data point kind {:?}", name))
}
