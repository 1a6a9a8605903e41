//! Serde default functions shared by config and definition types.

/// Default for flags that are on unless a document turns them off
/// (`grouped`, `cache.enabled`, `required`, ...).
pub fn default_true() -> bool {
    true
}
