use bytes::Bytes;
use compact_str::CompactString;
use derive_more::Deref;
use fnv::FnvHashMap;
use http::Method;
use tokio::time::Instant;

use crate::domain::headers::HeaderTable;

/// Decoded query string, each key holding its values in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct QueryParams(FnvHashMap<String, Vec<String>>);

impl QueryParams {
    pub fn parse(query: &str) -> Self {
        let mut params: FnvHashMap<String, Vec<String>> = FnvHashMap::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params.entry(key.into_owned()).or_default().push(value.into_owned());
        }
        Self(params)
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.first()).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub received_at: Instant,
    pub method: Method,
    pub path: String,
    pub query: QueryParams,
    pub version: CompactString,
    pub headers: HeaderTable,
    pub body: Option<Bytes>,
}
