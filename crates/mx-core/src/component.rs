//! Component categories shared by metrics and variant overrides
//!
//! Variants address metric components per category (measures, dimensions,
//! ...). These containers keep the per-category lists explicit so each
//! override stage is a plain transform over a list.

use crate::metric::{
    DerivedMeasure, SemanticDimension, SemanticFilter, SemanticJoin, SemanticMeasure,
    SemanticParameter,
};
use serde::{Deserialize, Serialize};

/// Anything addressable by name inside a metric
pub trait Named {
    /// Component name
    fn name(&self) -> &str;
}

/// Component category of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCategory {
    /// Measures
    Measures,
    /// Dimensions
    Dimensions,
    /// Filters
    Filters,
    /// Joins
    Joins,
    /// Parameter declarations
    Parameters,
    /// Derived measures
    DerivedMeasures,
}

impl ComponentCategory {
    /// Every category, in resolution order
    pub const ALL: [ComponentCategory; 6] = [
        ComponentCategory::Measures,
        ComponentCategory::Dimensions,
        ComponentCategory::Filters,
        ComponentCategory::Joins,
        ComponentCategory::Parameters,
        ComponentCategory::DerivedMeasures,
    ];

    /// Singular noun for messages
    pub fn singular(&self) -> &'static str {
        match self {
            ComponentCategory::Measures => "measure",
            ComponentCategory::Dimensions => "dimension",
            ComponentCategory::Filters => "filter",
            ComponentCategory::Joins => "join",
            ComponentCategory::Parameters => "parameter",
            ComponentCategory::DerivedMeasures => "derived measure",
        }
    }
}

impl std::fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ComponentCategory::Measures => "measures",
            ComponentCategory::Dimensions => "dimensions",
            ComponentCategory::Filters => "filters",
            ComponentCategory::Joins => "joins",
            ComponentCategory::Parameters => "parameters",
            ComponentCategory::DerivedMeasures => "derived_measures",
        };
        f.write_str(s)
    }
}

/// Per-category whitelist; a category left as `None` is not restricted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSelection {
    /// Measures to keep
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measures: Option<Vec<String>>,
    /// Dimensions to keep
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Vec<String>>,
    /// Filters to keep
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<String>>,
    /// Joins to keep
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joins: Option<Vec<String>>,
    /// Parameters to keep
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
    /// Derived measures to keep
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_measures: Option<Vec<String>>,
}

impl ComponentSelection {
    /// Whitelist for a category, if restricted
    pub fn get(&self, category: ComponentCategory) -> Option<&[String]> {
        match category {
            ComponentCategory::Measures => self.measures.as_deref(),
            ComponentCategory::Dimensions => self.dimensions.as_deref(),
            ComponentCategory::Filters => self.filters.as_deref(),
            ComponentCategory::Joins => self.joins.as_deref(),
            ComponentCategory::Parameters => self.parameters.as_deref(),
            ComponentCategory::DerivedMeasures => self.derived_measures.as_deref(),
        }
    }

    /// Mutable whitelist for a category
    pub fn get_mut(&mut self, category: ComponentCategory) -> Option<&mut Vec<String>> {
        match category {
            ComponentCategory::Measures => self.measures.as_mut(),
            ComponentCategory::Dimensions => self.dimensions.as_mut(),
            ComponentCategory::Filters => self.filters.as_mut(),
            ComponentCategory::Joins => self.joins.as_mut(),
            ComponentCategory::Parameters => self.parameters.as_mut(),
            ComponentCategory::DerivedMeasures => self.derived_measures.as_mut(),
        }
    }
}

/// Per-category name lists (used by `overrides.exclude`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentNameLists {
    /// Measure names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measures: Vec<String>,
    /// Dimension names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<String>,
    /// Filter names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,
    /// Join names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<String>,
    /// Parameter names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
    /// Derived measure names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_measures: Vec<String>,
}

impl ComponentNameLists {
    /// Names listed for a category
    pub fn get(&self, category: ComponentCategory) -> &[String] {
        match category {
            ComponentCategory::Measures => &self.measures,
            ComponentCategory::Dimensions => &self.dimensions,
            ComponentCategory::Filters => &self.filters,
            ComponentCategory::Joins => &self.joins,
            ComponentCategory::Parameters => &self.parameters,
            ComponentCategory::DerivedMeasures => &self.derived_measures,
        }
    }

    /// Mutable names for a category
    pub fn get_mut(&mut self, category: ComponentCategory) -> &mut Vec<String> {
        match category {
            ComponentCategory::Measures => &mut self.measures,
            ComponentCategory::Dimensions => &mut self.dimensions,
            ComponentCategory::Filters => &mut self.filters,
            ComponentCategory::Joins => &mut self.joins,
            ComponentCategory::Parameters => &mut self.parameters,
            ComponentCategory::DerivedMeasures => &mut self.derived_measures,
        }
    }

    /// Whether no category lists a name
    pub fn is_empty(&self) -> bool {
        ComponentCategory::ALL.iter().all(|c| self.get(*c).is_empty())
    }
}

/// Per-category component definitions (used by `overrides.add` / `overrides.replace`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinitions {
    /// Measures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measures: Vec<SemanticMeasure>,
    /// Dimensions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<SemanticDimension>,
    /// Filters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<SemanticFilter>,
    /// Joins
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<SemanticJoin>,
    /// Parameters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<SemanticParameter>,
    /// Derived measures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_measures: Vec<DerivedMeasure>,
}

impl ComponentDefinitions {
    /// Names of the definitions in a category
    pub fn names(&self, category: ComponentCategory) -> Vec<&str> {
        fn names<T: Named>(items: &[T]) -> Vec<&str> {
            items.iter().map(Named::name).collect()
        }
        match category {
            ComponentCategory::Measures => names(&self.measures),
            ComponentCategory::Dimensions => names(&self.dimensions),
            ComponentCategory::Filters => names(&self.filters),
            ComponentCategory::Joins => names(&self.joins),
            ComponentCategory::Parameters => names(&self.parameters),
            ComponentCategory::DerivedMeasures => names(&self.derived_measures),
        }
    }

    /// Whether every category is empty
    pub fn is_empty(&self) -> bool {
        ComponentCategory::ALL.iter().all(|c| self.names(*c).is_empty())
    }
}
