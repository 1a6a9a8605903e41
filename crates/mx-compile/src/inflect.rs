//! English singular forms for table-name join heuristics

/// Best-effort singular of a (lowercase) table name
///
/// ```
/// use mx_compile::inflect::singularize;
/// assert_eq!(singularize("categories"), "category");
/// assert_eq!(singularize("customers"), "customer");
/// assert_eq!(singularize("kpi_benchmarks"), "kpi_benchmark");
/// ```
pub fn singularize(word: &str) -> String {
    const IRREGULAR: [(&str, &str); 2] = [("people", "person"), ("children", "child")];
    for (plural, single) in IRREGULAR {
        if let Some(stem) = word.strip_suffix(plural) {
            return format!("{}{}", stem, single);
        }
    }
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{}y", stem);
        }
    }
    for suffix in ["sses", "xes", "ches", "shes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("orders"), "order");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("branches"), "branch");
        assert_eq!(singularize("status"), "status");
        assert_eq!(singularize("sales_people"), "sales_person");
        assert_eq!(singularize("region"), "region");
    }
}
