//! Include filter applied by every backend.

use crate::core::{Metric, ReporterError, Result};
use regex::Regex;

/// Compiled include filter.
///
/// The pattern is compiled once when a backend is built; matching never
/// fails. Matching is unanchored, so `"cpu"` selects every metric whose name
/// contains `cpu`; use `^...$` for an exact name.
#[derive(Debug, Clone)]
pub struct MetricFilter {
    regex: Regex,
}

impl MetricFilter {
    /// Compile `pattern`. A malformed pattern is an [`ReporterError::InvalidFilter`].
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| ReporterError::InvalidFilter {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { regex })
    }

    /// The source pattern.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Whether `metric_name` passes the filter.
    pub fn matches(&self, metric_name: &str) -> bool {
        self.regex.is_match(metric_name)
    }

    /// Metrics from `metrics` whose name passes the filter, in order.
    ///
    /// The yielded references borrow `metrics` only, so they outlive the
    /// iterator and the filter borrow.
    pub fn select<'f, 'm: 'f>(
        &'f self,
        metrics: &'m [Metric],
    ) -> impl Iterator<Item = &'m Metric> + 'f {
        metrics.iter().filter(move |m| self.matches(m.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let filter = MetricFilter::new("^metric1$").unwrap();
        assert!(filter.matches("metric1"));
        assert!(!filter.matches("metric2"));
        assert!(!filter.matches("metric10"));
    }

    #[test]
    fn test_substring_match() {
        let filter = MetricFilter::new("memory").unwrap();
        assert!(filter.matches("process_memory_bytes"));
        assert!(!filter.matches("cpu_seconds"));
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        let filter = MetricFilter::new("").unwrap();
        assert!(filter.matches("anything"));
    }

    #[test]
    fn test_selection_outlives_filter() {
        use crate::core::{Descriptor, MetricType};

        let metric = |name: &str| {
            Metric::new(
                Descriptor {
                    name: name.to_string(),
                    description: String::new(),
                    unit: "1".to_string(),
                    metric_type: MetricType::GaugeInt64,
                    label_keys: Vec::new(),
                },
                Vec::new(),
            )
        };
        let metrics = vec![metric("alloc"), metric("cpu"), metric("alloc_peak")];

        let selected: Vec<&Metric> = {
            let filter = MetricFilter::new("^alloc").unwrap();
            filter.select(&metrics).collect()
        };
        let names: Vec<&str> = selected.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["alloc", "alloc_peak"]);
    }

    #[test]
    fn test_malformed_pattern() {
        match MetricFilter::new("metric[") {
            Err(ReporterError::InvalidFilter { pattern, .. }) => assert_eq!(pattern, "metric["),
            other => panic!("expected invalid filter, got {:?}", other.map(|f| f.as_str().to_string())),
        }
    }
}
