//! redb table definitions for the OTA state store.
//!
//! Record tables use `u64` ids and `&[u8]` values (JSON-serialized domain
//! types). Index tables map `&str` keys to record ids.

use redb::TableDefinition;

/// Next id per record family, keyed by table name.
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// Users keyed by id.
pub const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

/// Deployments keyed by id.
pub const DEPLOYMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("deployments");

/// Deployment id keyed by `{app_id}/{name}`.
pub const DEPLOYMENT_NAMES: TableDefinition<&str, u64> = TableDefinition::new("deployment_names");

/// Deployment id keyed by deployment key. Entries outlive their deployment
/// so a key is never issued twice.
pub const DEPLOYMENT_KEYS: TableDefinition<&str, u64> = TableDefinition::new("deployment_keys");

/// Deployment versions keyed by id.
pub const DEPLOYMENT_VERSIONS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("deployment_versions");

/// Packages keyed by id.
pub const PACKAGES: TableDefinition<u64, &[u8]> = TableDefinition::new("packages");

/// Package diffs keyed by id.
pub const PACKAGE_DIFFS: TableDefinition<u64, &[u8]> = TableDefinition::new("package_diffs");

/// Package metrics keyed by id.
pub const PACKAGE_METRICS: TableDefinition<u64, &[u8]> = TableDefinition::new("package_metrics");

/// Deployment history entries keyed by id.
pub const DEPLOYMENT_HISTORY: TableDefinition<u64, &[u8]> =
    TableDefinition::new("deployment_history");

/// Composite key for the name index.
pub fn name_key(app_id: u64, name: &str) -> String {
    format!("{app_id}/{name}")
}
