use std::path::PathBuf;

use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;

use crate::domain::errors::ResponseError;
use crate::domain::headers::HeaderTable;

#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: StatusCode,
    pub headers: Option<HeaderTable>,
    pub body: Option<Bytes>,
    pub file_path: Option<PathBuf>,
}

impl Response {
    /// Rejects codes without a standard reason phrase, so nothing invalid
    /// ever reaches the wire.
    pub fn new(status: u16) -> Result<Self, ResponseError> {
        let status_code = StatusCode::from_u16(status)
            .ok()
            .filter(|code| code.canonical_reason().is_some())
            .ok_or(ResponseError::UnknownStatus(status))?;
        Ok(Self::with_status(status_code))
    }

    pub fn with_status(status_code: StatusCode) -> Self {
        Self {
            status_code,
            headers: None,
            body: None,
            file_path: None,
        }
    }

    /// 200 with `value` serialized as json.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::with_status(StatusCode::OK).body(body))
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.get_or_insert_with(HeaderTable::new).add(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderTable) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Streams the file at `path` as the payload, unless a body is set.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn reason(&self) -> &'static str {
        self.status_code.canonical_reason().unwrap_or_default()
    }

    /// The in-memory payload, if it is the one that gets sent.
    pub fn payload(&self) -> Option<&Bytes> {
        self.body.as_ref().filter(|body| !body.is_empty())
    }
}

impl From<StatusCode> for Response {
    fn from(value: StatusCode) -> Self {
        Self::with_status(value)
    }
}
