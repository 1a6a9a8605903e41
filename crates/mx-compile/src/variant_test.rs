use super::*;
use mx_core::{
    ComponentCategory, ComponentSelection, DataModelId, DimensionType, InMemoryStore,
    MeasureType, SemanticDimension, SemanticFilter, SemanticMeasure,
};

fn measure(name: &str, measure_type: MeasureType, query: &str) -> SemanticMeasure {
    SemanticMeasure {
        name: name.into(),
        measure_type,
        query: query.into(),
        formatting: vec![],
        description: None,
    }
}

fn dimension(name: &str, query: &str) -> SemanticDimension {
    SemanticDimension {
        name: name.into(),
        query: query.into(),
        dimension_type: DimensionType::String,
        grain: None,
        formatting: vec![],
    }
}

fn sales() -> SemanticMetric {
    let mut metric = SemanticMetric::new("sales", "orders");
    metric.data_model_id = Some(DataModelId::new("dm1"));
    metric
        .measures
        .push(measure("revenue", MeasureType::Sum, "orders.amount"));
    metric
        .measures
        .push(measure("orders", MeasureType::Count, "orders.id"));
    metric.dimensions.push(dimension("region", "orders.region"));
    metric.dimensions.push(dimension("channel", "orders.channel"));
    metric
        .filters
        .push(SemanticFilter::expression("completed", "orders.status = 'done'"));
    metric
}

fn store_with(variants: Vec<MetricVariant>) -> InMemoryStore {
    let store = InMemoryStore::new();
    store.insert_metric(sales()).unwrap();
    for v in variants {
        store.insert_variant(v).unwrap();
    }
    store
}

fn compile(store: &InMemoryStore, id: &str) -> CompileResult<ResolvedMetric> {
    VariantCompiler::new(store, CompileOptions::default()).compile_id(id, &CancelToken::new())
}

#[test]
fn test_standalone_metric_compiles_unchanged() {
    let store = store_with(vec![]);
    let resolved = compile(&store, "sales").unwrap();
    assert_eq!(resolved.metric(), &sales());
    assert!(!resolved.is_variant());
    assert_eq!(resolved.lineage(), &[MetricId::new("sales")]);
}

#[test]
fn test_add_measure_scenario() {
    let mut variant = MetricVariant::new("sales_avg", "sales");
    variant
        .overrides
        .add
        .measures
        .push(measure("avg_amount", MeasureType::Avg, "orders.amount"));
    let store = store_with(vec![variant]);

    let resolved = compile(&store, "sales_avg").unwrap();
    let names = resolved.component_names(ComponentCategory::Measures);
    assert_eq!(names, vec!["revenue", "orders", "avg_amount"]);
    assert_eq!(resolved.id, "sales_avg");
    assert_eq!(
        resolved.lineage(),
        &[MetricId::new("sales"), MetricId::new("sales_avg")]
    );
}

#[test]
fn test_inclusion_precedes_exclusion() {
    let mut variant = MetricVariant::new("v", "sales");
    variant.inclusion = Some(ComponentSelection {
        measures: Some(vec!["revenue".into(), "orders".into()]),
        ..Default::default()
    });
    variant.overrides.exclude.measures = vec!["orders".into()];
    let store = store_with(vec![variant]);

    let resolved = compile(&store, "v").unwrap();
    assert_eq!(
        resolved.component_names(ComponentCategory::Measures),
        vec!["revenue"]
    );
    // Categories without an inclusion list are untouched
    assert_eq!(resolved.dimensions.len(), 2);
    assert_eq!(resolved.filters.len(), 1);
}

#[test]
fn test_replace_keeps_position() {
    let mut variant = MetricVariant::new("v", "sales");
    variant
        .overrides
        .replace
        .measures
        .push(measure("revenue", MeasureType::Sum, "orders.amount - orders.discount"));
    let store = store_with(vec![variant]);

    let resolved = compile(&store, "v").unwrap();
    assert_eq!(resolved.measures[0].name, "revenue");
    assert_eq!(resolved.measures[0].query, "orders.amount - orders.discount");
    assert_eq!(resolved.measures.len(), 2);
}

#[test]
fn test_add_name_collision() {
    let mut variant = MetricVariant::new("v", "sales");
    variant
        .overrides
        .add
        .dimensions
        .push(dimension("region", "orders.country"));
    let store = store_with(vec![variant]);
    assert!(matches!(
        compile(&store, "v"),
        Err(CompileError::InvalidDerivation { ref name, .. }) if name == "region"
    ));
}

#[test]
fn test_scalar_overrides() {
    let mut variant = MetricVariant::new("v", "sales");
    variant.overrides.table_name = Some("orders_archive".into());
    variant.overrides.limit = Some(5);
    variant.overrides.grouped = Some(false);
    variant.overrides.ordered = Some(true);
    variant.overrides.replace.measures.push(measure(
        "revenue",
        MeasureType::Sum,
        "orders_archive.amount",
    ));
    variant.overrides.exclude.measures = vec!["orders".into()];
    variant.overrides.exclude.dimensions = vec!["region".into(), "channel".into()];
    variant.overrides.exclude.filters = vec!["completed".into()];
    let store = store_with(vec![variant]);

    let resolved = compile(&store, "v").unwrap();
    assert_eq!(resolved.table_name.as_deref(), Some("orders_archive"));
    assert_eq!(resolved.limit, Some(5));
    assert!(!resolved.grouped);
    assert!(resolved.ordered);
}

#[test]
fn test_circular_reference() {
    let store = InMemoryStore::new();
    store.insert_variant(MetricVariant::new("a", "b")).unwrap();
    store.insert_variant(MetricVariant::new("b", "a")).unwrap();

    let err = compile(&store, "a").unwrap_err();
    assert_eq!(
        err,
        CompileError::CircularReference {
            chain: vec!["a".into(), "b".into(), "a".into()]
        }
    );
}

fn chain_store(len: usize) -> InMemoryStore {
    let store = store_with(vec![]);
    let mut source = "sales".to_string();
    for i in 1..=len {
        let id = format!("v{}", i);
        store.insert_variant(MetricVariant::new(&id, &source)).unwrap();
        source = id;
    }
    store
}

#[test]
fn test_depth_bound() {
    let options = CompileOptions {
        max_depth: 3,
        ..CompileOptions::default()
    };

    let store = chain_store(3);
    let compiler = VariantCompiler::new(&store, options.clone());
    let resolved = compiler.compile_id("v3", &CancelToken::new()).unwrap();
    assert_eq!(resolved.depth(), 3);

    let store = chain_store(4);
    let compiler = VariantCompiler::new(&store, options);
    let err = compiler.compile_id("v4", &CancelToken::new()).unwrap_err();
    assert!(matches!(err, CompileError::MaxDepthExceeded { depth: 4, max: 3, .. }));
}

#[test]
fn test_cycle_detected_before_depth() {
    let store = InMemoryStore::new();
    store.insert_variant(MetricVariant::new("a", "b")).unwrap();
    store.insert_variant(MetricVariant::new("b", "a")).unwrap();
    let options = CompileOptions {
        max_depth: 2,
        ..CompileOptions::default()
    };
    let err = VariantCompiler::new(&store, options)
        .compile_id("a", &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, CompileError::CircularReference { .. }));
}

#[test]
fn test_source_not_found_suggests_closest() {
    let store = store_with(vec![MetricVariant::new("v", "sale")]);
    let err = compile(&store, "v").unwrap_err();
    assert!(matches!(
        err,
        CompileError::SourceNotFound { ref id, ref suggestion, .. }
            if id == "sale" && suggestion.as_deref() == Some("sales")
    ));
}

#[test]
fn test_incompatible_data_model() {
    let mut variant = MetricVariant::new("v", "sales");
    variant.data_model_id = Some(DataModelId::new("dm2"));
    let store = store_with(vec![variant]);
    let err = compile(&store, "v").unwrap_err();
    assert!(matches!(
        err,
        CompileError::IncompatibleSource { ref field, ref source_value, .. }
            if field == "data_model_id" && source_value.as_deref() == Some("dm1")
    ));
}

#[test]
fn test_unknown_names_per_category() {
    let mut variant = MetricVariant::new("v", "sales");
    variant.inclusion = Some(ComponentSelection {
        measures: Some(vec!["revenu".into()]),
        ..Default::default()
    });
    let store = store_with(vec![variant]);
    assert!(matches!(
        compile(&store, "v").unwrap_err(),
        CompileError::MeasureNotFound { ref suggestion, .. } if suggestion.as_deref() == Some("revenue")
    ));

    let mut variant = MetricVariant::new("v", "sales");
    variant.overrides.exclude.dimensions = vec!["regions".into()];
    let store = store_with(vec![variant]);
    assert!(matches!(
        compile(&store, "v").unwrap_err(),
        CompileError::InvalidJoinDimension { category: ComponentCategory::Dimensions, .. }
    ));

    let mut variant = MetricVariant::new("v", "sales");
    variant
        .overrides
        .replace
        .filters
        .push(SemanticFilter::expression("complete", "orders.status = 'x'"));
    let store = store_with(vec![variant]);
    assert!(matches!(
        compile(&store, "v").unwrap_err(),
        CompileError::ReferenceNotFound { category: ComponentCategory::Filters, ref suggestion, .. }
            if suggestion.as_deref() == Some("completed")
    ));
}

#[test]
fn test_re_resolution_is_idempotent() {
    let mut variant = MetricVariant::new("v", "sales");
    variant.overrides.limit = Some(3);
    let store = store_with(vec![variant]);
    let a = compile(&store, "v").unwrap();
    let b = compile(&store, "v").unwrap();
    assert_eq!(a, b);
    assert_eq!(a.definition_hash(), b.definition_hash());
}

#[test]
fn test_strict_table_references() {
    let mut variant = MetricVariant::new("v", "sales");
    variant
        .overrides
        .add
        .dimensions
        .push(dimension("tier", "customers.tier"));
    let store = store_with(vec![variant]);

    let err = compile(&store, "v").unwrap_err();
    assert!(matches!(err, CompileError::InvalidJoinDimension { ref name, .. } if name == "tier"));

    let lenient = VariantCompiler::new(&store, CompileOptions::default().lenient());
    assert!(lenient.compile_id("v", &CancelToken::new()).is_ok());
}

#[test]
fn test_cancelled() {
    let store = chain_store(2);
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = VariantCompiler::new(&store, CompileOptions::default())
        .compile_id("v2", &cancel)
        .unwrap_err();
    assert_eq!(err, CompileError::Cancelled);
}
