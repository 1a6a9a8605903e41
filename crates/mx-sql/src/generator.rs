//! SQL generation from resolved semantic metrics
//!
//! Output is deterministic: the same metric, parameters, and dialect always
//! produce byte-identical SQL.

use crate::dialect::{dialect_for, SqlDialect};
use crate::error::{SqlError, SqlResult};
use crate::format::apply_in_query;
use crate::params::{as_single_placeholder, bind_parameters, BoundParameters, ParameterValues};
use mx_core::metric::BASE_QUERY_ALIAS;
use mx_core::sql_utils::{same_table, table_base_name};
use mx_core::{
    CancelToken, DerivationKind, DerivedMeasure, Dialect, FilterOperator, JoinType, MeasureType,
    OrderTarget, SemanticDimension, SemanticFilter, SemanticJoin, SemanticMeasure, SemanticMetric,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Alias of the aggregate CTE wrapped by derived measures
pub const DERIVED_BASE_ALIAS: &str = "base";

/// Generated SQL plus the literals bound into it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlStatement {
    /// SQL text
    pub sql: String,
    /// Dialect the SQL targets
    pub dialect: Dialect,
    /// Parameter name to the SQL literal substituted for it
    pub parameters: BTreeMap<String, String>,
}

/// Generate SQL for `metric` in the given dialect
pub fn generate_sql(
    metric: &SemanticMetric,
    params: &ParameterValues,
    dialect: Dialect,
    cancel: &CancelToken,
) -> SqlResult<SqlStatement> {
    SqlGenerator::new(dialect).generate(metric, params, cancel)
}

/// Metric SQL generator for one dialect
pub struct SqlGenerator {
    dialect: Box<dyn SqlDialect>,
}

impl SqlGenerator {
    /// Create a generator for `dialect`
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect: dialect_for(dialect),
        }
    }

    /// The dialect implementation in use
    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    /// Generate SQL for `metric`
    pub fn generate(
        &self,
        metric: &SemanticMetric,
        params: &ParameterValues,
        cancel: &CancelToken,
    ) -> SqlResult<SqlStatement> {
        check_cancel(cancel)?;
        let bound = bind_parameters(metric, params, self.dialect())?;
        check_cancel(cancel)?;

        let build = Build {
            metric,
            dialect: self.dialect(),
            bound: &bound,
        };
        let sql = build.statement()?;
        check_cancel(cancel)?;

        Ok(SqlStatement {
            sql,
            dialect: self.dialect.kind(),
            parameters: bound.as_map().clone(),
        })
    }
}

fn check_cancel(cancel: &CancelToken) -> SqlResult<()> {
    if cancel.is_cancelled() {
        return Err(SqlError::Cancelled);
    }
    Ok(())
}

/// One generation pass
struct Build<'a> {
    metric: &'a SemanticMetric,
    dialect: &'a dyn SqlDialect,
    bound: &'a BoundParameters,
}

impl Build<'_> {
    fn err(&self, message: impl Into<String>) -> SqlError {
        SqlError::generation(self.metric.id.as_str(), message)
    }

    fn q(&self, ident: &str) -> String {
        self.dialect.quote_ident(ident)
    }

    fn statement(&self) -> SqlResult<String> {
        let metric = self.metric;
        if metric.measures.is_empty() && metric.dimensions.is_empty() {
            return Err(self.err("metric selects no dimensions or measures"));
        }

        let mut lines = self.aggregate_query()?;

        if metric.derived_measures.is_empty() {
            lines.extend(self.order_by(false)?);
            lines.extend(self.limit());
            return Ok(lines.join("\n"));
        }

        let mut outer = vec![format!("WITH {} AS (", self.q(DERIVED_BASE_ALIAS))];
        outer.append(&mut lines);
        outer.push(")".to_string());

        let mut items: Vec<String> = metric
            .dimensions
            .iter()
            .map(|d| self.q(&d.name))
            .chain(metric.measures.iter().map(|m| self.q(&m.name)))
            .collect();
        for derived in &metric.derived_measures {
            items.push(format!(
                "{} AS {}",
                self.derived_expr(derived)?,
                self.q(&derived.name)
            ));
        }
        outer.push("SELECT".to_string());
        outer.push(select_list(&items));
        outer.push(format!("FROM {}", self.q(DERIVED_BASE_ALIAS)));
        outer.extend(self.order_by(true)?);
        outer.extend(self.limit());
        Ok(outer.join("\n"))
    }

    /// SELECT ... FROM ... JOIN ... WHERE ... GROUP BY ...
    fn aggregate_query(&self) -> SqlResult<Vec<String>> {
        let metric = self.metric;

        let mut items = Vec::new();
        let mut group_exprs = Vec::new();
        for dim in &metric.dimensions {
            let expr = self.dimension_expr(dim)?;
            items.push(format!("{} AS {}", expr, self.q(&dim.name)));
            group_exprs.push(expr);
        }
        for measure in &metric.measures {
            items.push(format!("{} AS {}", self.measure_expr(measure)?, self.q(&measure.name)));
        }

        let mut lines = vec!["SELECT".to_string(), select_list(&items)];
        lines.push(format!("FROM {}", self.source()?));
        lines.extend(self.joins()?);

        let conditions = metric
            .filters
            .iter()
            .map(|f| self.filter_condition(f))
            .collect::<SqlResult<Vec<_>>>()?;
        if let Some((first, rest)) = conditions.split_first() {
            lines.push(format!("WHERE {}", first));
            lines.extend(rest.iter().map(|c| format!("  AND {}", c)));
        }

        // Expressions, not aliases: a GROUP BY name binds to a source column
        // before an output alias in DuckDB and Postgres
        if metric.grouped && !metric.measures.is_empty() && !metric.dimensions.is_empty() {
            lines.push(format!("GROUP BY {}", group_exprs.join(", ")));
        }
        Ok(lines)
    }

    fn source(&self) -> SqlResult<String> {
        match (&self.metric.table_name, &self.metric.query) {
            (Some(table), _) if !table.trim().is_empty() => Ok(self.dialect.quote_qualified(table)),
            (_, Some(query)) if !query.trim().is_empty() => Ok(format!(
                "({}) AS {}",
                self.bound.render(query)?,
                self.q(BASE_QUERY_ALIAS)
            )),
            _ => Err(self.err("metric has neither a table_name nor a query")),
        }
    }

    fn dimension_expr(&self, dim: &SemanticDimension) -> SqlResult<String> {
        if dim.query.trim().is_empty() {
            return Err(self.err(format!("dimension '{}' has an empty query", dim.name)));
        }
        let mut expr = dim.query.clone();
        if let Some(grain) = dim.grain {
            expr = self.dialect.date_trunc(&expr, grain);
        }
        let expr = apply_in_query(self.metric.id.as_str(), expr, &dim.formatting, self.dialect)?;
        self.bound.render(&expr)
    }

    fn measure_expr(&self, measure: &SemanticMeasure) -> SqlResult<String> {
        if measure.query.trim().is_empty() {
            return Err(self.err(format!("measure '{}' has an empty query", measure.name)));
        }
        let q = &measure.query;
        let agg = match measure.measure_type {
            MeasureType::Sum => format!("SUM({})", q),
            MeasureType::Avg => format!("AVG({})", q),
            MeasureType::Count => format!("COUNT({})", q),
            MeasureType::CountDistinct => format!("COUNT(DISTINCT {})", q),
            MeasureType::Min => format!("MIN({})", q),
            MeasureType::Max => format!("MAX({})", q),
        };
        let expr = apply_in_query(self.metric.id.as_str(), agg, &measure.formatting, self.dialect)?;
        self.bound.render(&expr)
    }

    fn joins(&self) -> SqlResult<Vec<String>> {
        let mut joined: Vec<String> = self
            .metric
            .base_relation()
            .map(|b| vec![b.to_string()])
            .unwrap_or_default();
        let mut lines = Vec::new();
        for join in &self.metric.joins {
            lines.push(self.join_clause(join, &mut joined)?);
        }
        Ok(lines)
    }

    fn join_clause(&self, join: &SemanticJoin, joined: &mut Vec<String>) -> SqlResult<String> {
        if join.join_type == JoinType::Full && !self.dialect.supports_full_join() {
            return Err(self.err(format!(
                "join '{}': {} does not support FULL JOIN",
                join.name,
                self.dialect.name()
            )));
        }
        if join.conditions.is_empty() {
            return Err(self.err(format!("join '{}' has no conditions", join.name)));
        }

        let is_joined = |t: &str| joined.iter().any(|j| same_table(j, t));
        // Declared joins usually bring in right_table; accept the mirrored form too
        let target = if is_joined(&join.right_table) && !is_joined(&join.left_table) {
            &join.left_table
        } else {
            &join.right_table
        };

        let on: Vec<String> = join
            .conditions
            .iter()
            .map(|c| {
                format!(
                    "{} = {}",
                    self.qualified_column(&c.left_column, &join.left_table),
                    self.qualified_column(&c.right_column, &join.right_table)
                )
            })
            .collect();
        joined.push(target.clone());
        Ok(format!(
            "{} JOIN {} ON {}",
            join.join_type,
            self.dialect.quote_qualified(target),
            on.join(" AND ")
        ))
    }

    fn qualified_column(&self, column: &str, table: &str) -> String {
        if column.contains('.') {
            self.dialect.quote_qualified(column)
        } else {
            format!("{}.{}", self.q(table_base_name(table)), self.q(column))
        }
    }

    fn filter_condition(&self, filter: &SemanticFilter) -> SqlResult<String> {
        if let Some(query) = filter.query.as_deref().filter(|q| !q.trim().is_empty()) {
            return Ok(format!("({})", self.bound.render(query)?));
        }
        let (Some(column), Some(op)) = (filter.column.as_deref(), filter.operator) else {
            return Err(self.err(format!(
                "filter '{}' needs a query or a column and operator",
                filter.name
            )));
        };
        let column = self.bound.render(column)?;
        let values = filter
            .values
            .iter()
            .map(|v| self.value_literal(&filter.name, v))
            .collect::<SqlResult<Vec<_>>>()?;

        match op.arity() {
            Some(n) if n != values.len() => {
                return Err(self.err(format!(
                    "filter '{}': {:?} expects {} value(s), got {}",
                    filter.name,
                    op,
                    n,
                    values.len()
                )))
            }
            None if values.is_empty() => {
                return Err(self.err(format!(
                    "filter '{}': {:?} expects at least one value",
                    filter.name, op
                )))
            }
            _ => {}
        }

        let cond = match op {
            FilterOperator::Eq => format!("{} = {}", column, values[0]),
            FilterOperator::Ne => format!("{} <> {}", column, values[0]),
            FilterOperator::Gt => format!("{} > {}", column, values[0]),
            FilterOperator::Gte => format!("{} >= {}", column, values[0]),
            FilterOperator::Lt => format!("{} < {}", column, values[0]),
            FilterOperator::Lte => format!("{} <= {}", column, values[0]),
            FilterOperator::Like => format!("{} LIKE {}", column, values[0]),
            FilterOperator::In => format!("{} IN ({})", column, values.join(", ")),
            FilterOperator::NotIn => format!("{} NOT IN ({})", column, values.join(", ")),
            FilterOperator::Between => format!("{} BETWEEN {} AND {}", column, values[0], values[1]),
            FilterOperator::IsNull => format!("{} IS NULL", column),
            FilterOperator::IsNotNull => format!("{} IS NOT NULL", column),
        };
        Ok(format!("({})", cond))
    }

    fn value_literal(&self, filter: &str, value: &Value) -> SqlResult<String> {
        match value {
            Value::String(s) => match as_single_placeholder(s) {
                Some(name) => self.bound.literal(name).map(str::to_string).ok_or_else(|| {
                    SqlError::ParameterValidation {
                        parameter: name.to_string(),
                        message: "placeholder has no bound value".to_string(),
                    }
                }),
                None => Ok(self.dialect.string_literal(s)),
            },
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(true) => Ok("TRUE".to_string()),
            Value::Bool(false) => Ok("FALSE".to_string()),
            Value::Null => Ok("NULL".to_string()),
            Value::Array(items) => Ok(items
                .iter()
                .map(|v| self.value_literal(filter, v))
                .collect::<SqlResult<Vec<_>>>()?
                .join(", ")),
            Value::Object(_) => Err(self.err(format!(
                "filter '{}': object values are not supported",
                filter
            ))),
        }
    }

    fn derived_expr(&self, derived: &DerivedMeasure) -> SqlResult<String> {
        let metric = self.metric;
        for measure in derived.measure_refs() {
            if metric.measure(measure).is_none() {
                return Err(self.err(format!(
                    "derived measure '{}' references unknown measure '{}'",
                    derived.name, measure
                )));
            }
        }
        for dim in derived.partition_by() {
            if metric.dimension(dim).is_none() {
                return Err(self.err(format!(
                    "derived measure '{}' partitions by unknown dimension '{}'",
                    derived.name, dim
                )));
            }
        }
        let order = match derived.order_dimension() {
            Some(dim) if metric.dimension(dim).is_none() => {
                return Err(self.err(format!(
                    "derived measure '{}' orders by unknown dimension '{}'",
                    derived.name, dim
                )))
            }
            Some(dim) => Some(self.q(dim)),
            None if derived.requires_order() => {
                return Err(self.err(format!(
                    "derived measure '{}' requires an order_dimension",
                    derived.name
                )))
            }
            None => None,
        };

        let partition = if derived.partition_by().is_empty() {
            String::new()
        } else {
            let dims: Vec<String> = derived.partition_by().iter().map(|d| self.q(d)).collect();
            format!("PARTITION BY {}", dims.join(", "))
        };
        let window = |order: Option<&str>, frame: &str| {
            let parts: Vec<String> = [
                partition.clone(),
                order.map(|o| format!("ORDER BY {}", o)).unwrap_or_default(),
                frame.to_string(),
            ]
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect();
            format!("OVER ({})", parts.join(" "))
        };

        let expr = match &derived.kind {
            DerivationKind::Ratio {
                numerator,
                denominator,
            } => format!(
                "{} * 1.0 / NULLIF({}, 0)",
                self.q(numerator),
                self.q(denominator)
            ),
            DerivationKind::RunningTotal { measure, .. } => format!(
                "SUM({}) {}",
                self.q(measure),
                window(
                    order.as_deref(),
                    "ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW"
                )
            ),
            DerivationKind::PercentOfTotal { measure, .. } => format!(
                "{m} * 1.0 / NULLIF(SUM({m}) {w}, 0)",
                m = self.q(measure),
                w = window(None, "")
            ),
            DerivationKind::PeriodOverPeriod {
                measure, offset, ..
            } => format!(
                "{m} - LAG({m}, {o}) {w}",
                m = self.q(measure),
                o = offset,
                w = window(order.as_deref(), "")
            ),
        };
        apply_in_query(metric.id.as_str(), expr, &derived.formatting, self.dialect)
    }

    fn order_by(&self, wrapped: bool) -> SqlResult<Option<String>> {
        let metric = self.metric;
        if !metric.ordered || metric.order.is_empty() {
            return Ok(None);
        }
        let select_count =
            metric.dimensions.len() + metric.measures.len() + metric.derived_measures.len();
        let outputs = metric.output_names();

        let mut items = Vec::new();
        for (idx, item) in metric.order.iter().enumerate() {
            let target = match item.target() {
                Some(OrderTarget::Reference(name)) => {
                    if !outputs.contains(&name) {
                        return Err(self.err(format!(
                            "order item #{} references unknown output '{}'",
                            idx + 1,
                            name
                        )));
                    }
                    self.q(name)
                }
                Some(OrderTarget::Column(_)) if wrapped => {
                    return Err(self.err(format!(
                        "order item #{} orders by a raw column; with derived measures order by reference",
                        idx + 1
                    )))
                }
                Some(OrderTarget::Column(column)) => self.bound.render(column)?,
                Some(OrderTarget::Position(p)) => {
                    if p == 0 || p > select_count {
                        return Err(self.err(format!(
                            "order item #{} position {} is outside 1..={}",
                            idx + 1,
                            p,
                            select_count
                        )));
                    }
                    p.to_string()
                }
                None => {
                    return Err(self.err(format!(
                        "order item #{} must set exactly one of reference, column, position",
                        idx + 1
                    )))
                }
            };
            items.push(format!("{} {}", target, item.direction));
        }
        Ok(Some(format!("ORDER BY {}", items.join(", "))))
    }

    fn limit(&self) -> Option<String> {
        self.metric.limit.map(|n| format!("LIMIT {}", n))
    }
}

fn select_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("  {}", item))
        .collect::<Vec<_>>()
        .join(",\n")
}

#[cfg(test)]
#[path = "generator_test.rs"]
mod tests;
