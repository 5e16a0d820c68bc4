//! HTTP backend: one protobuf batch POST per export cycle.

use crate::core::{Metric, ReporterError, Result};
use crate::export::convert;
use crate::export::filter::MetricFilter;
use crate::export::resource::{default_detector, ResourceDetector};
use crate::export::{ExportConfig, Exporter};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use std::collections::BTreeMap;
use tracing::debug;

/// Content type of every request body.
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// Posts every matching metric as one `ExportMetricsServiceRequest`.
///
/// No retry and no buffering: a failed request fails the cycle and the
/// metrics of that cycle are gone.
pub struct HttpExporter {
    address: String,
    api_key: String,
    api_secret: String,
    headers: HeaderMap,
    client: Client,
    filter: MetricFilter,
    detector: Box<dyn ResourceDetector>,
}

impl HttpExporter {
    /// Exporter posting to `address` with basic auth `api_key`/`api_secret`.
    ///
    /// Fails if the address is empty or the include filter does not compile.
    pub fn new(
        address: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        config: &ExportConfig,
    ) -> Result<Self> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(ReporterError::config("http exporter address is empty"));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(PROTOBUF_CONTENT_TYPE));

        Ok(Self {
            address,
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            headers,
            client: Client::new(),
            filter: MetricFilter::new(&config.include_filter)?,
            detector: default_detector(),
        })
    }

    /// Extra headers sent with every request. `Content-Type` is always
    /// forced to protobuf regardless of what is passed here.
    pub fn with_headers(mut self, headers: &BTreeMap<String, String>) -> Result<Self> {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ReporterError::config(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ReporterError::config(format!("invalid value for header '{name}': {e}"))
            })?;
            map.insert(name, value);
        }
        map.insert(CONTENT_TYPE, HeaderValue::from_static(PROTOBUF_CONTENT_TYPE));
        self.headers = map;
        Ok(self)
    }

    /// Replace the resource detector.
    pub fn with_detector(mut self, detector: Box<dyn ResourceDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Use a preconfigured client, e.g. one with a proxy or timeouts.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Endpoint URL.
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait::async_trait]
impl Exporter for HttpExporter {
    fn name(&self) -> &str {
        "http"
    }

    async fn export_metrics(&mut self, metrics: &[Metric]) -> Result<()> {
        let resource = self.detector.detect()?;
        let selected: Vec<Metric> = self
            .filter
            .select(metrics)
            .map(|m| m.with_resource(resource.clone()))
            .collect();

        let body = convert::encode_request(&selected)?;
        debug!(
            address = %self.address,
            metrics = selected.len(),
            bytes = body.len(),
            "Posting metric batch"
        );

        self.client
            .post(&self.address)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
