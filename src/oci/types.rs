//! JSON shapes printed by the `oci` CLI.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::instance::{
    ComputeModel, DefinedTags, InstanceId, InstanceRecord, LicenseModel, LifecycleState, Role,
};

/// Every `oci` response wraps its payload in a `data` member. List calls
/// that stop short of the last page also carry `opc-next-page`.
#[derive(Debug, Deserialize)]
pub(super) struct Envelope<T> {
    pub(super) data: T,
    #[serde(default, rename = "opc-next-page")]
    pub(super) next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchCollection {
    #[serde(default)]
    pub(super) items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchItem {
    pub(super) identifier: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(super) struct AutonomousDatabase {
    pub(super) id: String,
    #[serde(default)]
    pub(super) display_name: Option<String>,
    #[serde(default)]
    pub(super) compute_model: Option<ComputeModel>,
    #[serde(default)]
    pub(super) compute_count: Option<f64>,
    #[serde(default)]
    pub(super) data_storage_size_in_tbs: Option<f64>,
    #[serde(default)]
    pub(super) actual_used_data_storage_size_in_tbs: Option<f64>,
    #[serde(default)]
    pub(super) allocated_storage_size_in_tbs: Option<f64>,
    #[serde(default)]
    pub(super) license_model: Option<LicenseModel>,
    #[serde(default)]
    pub(super) database_edition: Option<String>,
    pub(super) lifecycle_state: LifecycleState,
    #[serde(default)]
    pub(super) is_dedicated: Option<bool>,
    #[serde(default)]
    pub(super) is_free_tier: Option<bool>,
    #[serde(default)]
    pub(super) role: Option<Role>,
    #[serde(default)]
    pub(super) defined_tags: Option<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl From<AutonomousDatabase> for InstanceRecord {
    fn from(wire: AutonomousDatabase) -> Self {
        // A zero terabyte size is how the service reports GB-modelled storage.
        let data_storage_size_tb = wire.data_storage_size_in_tbs.filter(|tb| *tb > 0.0);
        Self {
            display_name: wire.display_name.unwrap_or_else(|| wire.id.clone()),
            id: InstanceId::from(wire.id),
            compute_model: wire
                .compute_model
                .unwrap_or_else(|| ComputeModel::Other(String::new())),
            compute_count: wire.compute_count.unwrap_or_default(),
            data_storage_size_tb,
            used_storage_size_tb: wire.actual_used_data_storage_size_in_tbs,
            allocated_storage_size_tb: wire
                .allocated_storage_size_in_tbs
                .or(data_storage_size_tb)
                .unwrap_or_default(),
            license_model: wire
                .license_model
                .unwrap_or_else(|| LicenseModel::Other(String::new())),
            database_edition: wire.database_edition.unwrap_or_default(),
            lifecycle_state: wire.lifecycle_state,
            is_dedicated: wire.is_dedicated.unwrap_or(false),
            is_free_tier: wire.is_free_tier.unwrap_or(false),
            role: wire.role.unwrap_or(Role::Primary),
            defined_tags: wire.defined_tags.map(flatten_tags).unwrap_or_default(),
        }
    }
}

/// Defined-tag values may be any JSON scalar; they are kept as text.
fn flatten_tags(tags: BTreeMap<String, BTreeMap<String, Value>>) -> DefinedTags {
    tags.into_iter()
        .map(|(namespace, entries)| {
            let values = entries
                .into_iter()
                .map(|(key, value)| {
                    let text = match value {
                        Value::String(text) => text,
                        other => other.to_string(),
                    };
                    (key, text)
                })
                .collect();
            (namespace, values)
        })
        .collect()
}
