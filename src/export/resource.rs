//! Resource detection.
//!
//! Backends call a [`ResourceDetector`] once per export cycle and attach the
//! result to every metric they send. A failing detector fails the cycle.

use crate::core::{ReporterError, Resource, Result};
use std::collections::BTreeMap;
use std::fs;

/// Environment variable holding the resource type.
pub const ENV_RESOURCE_TYPE: &str = "OC_RESOURCE_TYPE";
/// Environment variable holding `key=value` resource labels, comma separated.
pub const ENV_RESOURCE_LABELS: &str = "OC_RESOURCE_LABELS";

/// Label carrying the host name.
pub const HOSTNAME_LABEL: &str = "host.hostname";

/// Source of the [`Resource`] attached to exported metrics.
pub trait ResourceDetector: Send + Sync {
    /// `Ok(None)` means nothing was detected, which is not an error.
    fn detect(&self) -> Result<Option<Resource>>;
}

/// Reads the resource from `OC_RESOURCE_TYPE` / `OC_RESOURCE_LABELS`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvDetector;

impl ResourceDetector for EnvDetector {
    fn detect(&self) -> Result<Option<Resource>> {
        let resource_type = std::env::var(ENV_RESOURCE_TYPE).unwrap_or_default();
        let labels = match std::env::var(ENV_RESOURCE_LABELS) {
            Ok(raw) => parse_labels(&raw)?,
            Err(_) => BTreeMap::new(),
        };

        let resource = Resource {
            resource_type: resource_type.trim().to_string(),
            labels,
        };
        Ok((!resource.is_empty()).then_some(resource))
    }
}

/// Parse `k=v,k2="v 2"` into a label map. Blank entries are skipped;
/// surrounding double quotes on values are removed.
pub fn parse_labels(raw: &str) -> Result<BTreeMap<String, String>> {
    let mut labels = BTreeMap::new();

    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let (key, value) = entry.split_once('=').ok_or_else(|| {
            ReporterError::resource(format!("malformed label '{entry}' in {ENV_RESOURCE_LABELS}"))
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(ReporterError::resource(format!(
                "empty label key in {ENV_RESOURCE_LABELS}"
            )));
        }

        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);

        labels.insert(key.to_string(), value.to_string());
    }

    Ok(labels)
}

/// Host name, from `HOSTNAME` or `/etc/hostname`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostDetector;

impl ResourceDetector for HostDetector {
    fn detect(&self) -> Result<Option<Resource>> {
        let hostname = std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .or_else(|| fs::read_to_string("/etc/hostname").ok())
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());

        Ok(hostname.map(|h| Resource::new("host").with_label(HOSTNAME_LABEL, h)))
    }
}

/// Runtime the reporter is compiled for.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuntimeDetector;

impl ResourceDetector for RuntimeDetector {
    fn detect(&self) -> Result<Option<Resource>> {
        Ok(Some(
            Resource::new("rust")
                .with_label("rust.os", std::env::consts::OS)
                .with_label("rust.arch", std::env::consts::ARCH)
                .with_label("reporter.version", env!("CARGO_PKG_VERSION")),
        ))
    }
}

/// Always returns the same resource.
#[derive(Debug, Default, Clone)]
pub struct StaticDetector(pub Option<Resource>);

impl ResourceDetector for StaticDetector {
    fn detect(&self) -> Result<Option<Resource>> {
        Ok(self.0.clone())
    }
}

/// Runs detectors in order and merges their output.
///
/// The first non-empty type wins. Labels from earlier detectors are kept
/// when a later one reports the same key. Any detector error is returned.
pub struct MultiDetector {
    detectors: Vec<Box<dyn ResourceDetector>>,
}

impl MultiDetector {
    /// Chain `detectors`, earliest first.
    pub fn new(detectors: Vec<Box<dyn ResourceDetector>>) -> Self {
        Self { detectors }
    }
}

impl ResourceDetector for MultiDetector {
    fn detect(&self) -> Result<Option<Resource>> {
        let mut merged: Option<Resource> = None;

        for detector in &self.detectors {
            let Some(found) = detector.detect()? else {
                continue;
            };

            match merged.as_mut() {
                None => merged = Some(found),
                Some(acc) => {
                    if acc.resource_type.is_empty() {
                        acc.resource_type = found.resource_type;
                    }
                    for (k, v) in found.labels {
                        acc.labels.entry(k).or_insert(v);
                    }
                },
            }
        }

        Ok(merged)
    }
}

/// Env, then host, then runtime.
pub fn default_detector() -> Box<dyn ResourceDetector> {
    Box::new(MultiDetector::new(vec![
        Box::new(EnvDetector),
        Box::new(HostDetector),
        Box::new(RuntimeDetector),
    ]))
}
