//! Strongly-typed identifiers for metrics, variants, and their environment.

use crate::newtype_string::define_id_newtype;

define_id_newtype! {
    /// Identifier of a metric or a metric variant.
    ///
    /// Metrics and variants share one namespace: a variant's
    /// `source_metric_id` may name either kind.
    pub struct MetricId;
}

define_id_newtype! {
    /// Identifier of the data model a metric is bound to.
    pub struct DataModelId;
}

define_id_newtype! {
    /// Identifier of the environment (workspace stage) a definition lives in.
    pub struct EnvironmentId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_blank_ids() {
        assert!(MetricId::try_new("").is_none());
        assert!(MetricId::try_new("   ").is_none());
    }

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(MetricId::new(" sales ").as_str(), "sales");
    }

    #[test]
    fn test_deserialize_rejects_empty() {
        let err = serde_json::from_str::<MetricId>(r#""""#);
        assert!(err.is_err());
        let ok: DataModelId = serde_json::from_str(r#""dm_1""#).unwrap();
        assert_eq!(ok, "dm_1");
    }
}
