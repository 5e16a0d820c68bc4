//! `opencensus.proto.resource.v1`

use std::collections::BTreeMap;

/// Entity for which metrics are reported.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Resource {
    /// Type identifier, e.g. `host` or `k8s.io/container`.
    #[prost(string, tag = "1")]
    pub r#type: String,
    /// Identifying labels, such as the host name.
    #[prost(btree_map = "string, string", tag = "2")]
    pub labels: BTreeMap<String, String>,
}
