use std::time::Duration;

use tracing::debug;

use crate::domain::headers::HeaderTable;
use crate::infrastructure::server_impl::request::Request;
use crate::infrastructure::server_impl::response::Response;

const TEXTUAL: [&str; 3] = [
    "application/json",
    "application/x-www-form-urlencoded",
    "application/xml",
];

/// Hooks called right after a request is parsed and right before its
/// response is written.
pub trait Observer: Send + Sync + 'static {
    fn request_parsed(&self, _request: &Request) {}

    fn response_ready(&self, _request: &Request, _response: &Response, _elapsed: Duration) {}
}

/// Dumps requests and responses at `debug` level.
#[derive(Debug, Copy, Clone, Default)]
pub struct TracingObserver;

fn is_textual(headers: Option<&HeaderTable>) -> bool {
    let Some(content_type) = headers.and_then(|h| h.get("content-type")) else {
        return false;
    };
    let essence = content_type.split(';').next().unwrap_or_default().trim();

    let text = essence
        .get(..5)
        .is_some_and(|prefix| unicase::eq_ascii(prefix, "text/"));
    text || TEXTUAL.iter().any(|t| unicase::eq_ascii(essence, *t))
}

fn describe_body(headers: Option<&HeaderTable>, body: Option<&[u8]>) -> String {
    match body {
        None => "<none>".to_owned(),
        Some(body) if is_textual(headers) => String::from_utf8_lossy(body).into_owned(),
        Some(body) => format!("<{} bytes>", body.len()),
    }
}

impl Observer for TracingObserver {
    fn request_parsed(&self, request: &Request) {
        debug!(
            "received request {} {} {} headers={:?} query={:?} body={}",
            request.method,
            request.path,
            request.version,
            request.headers,
            request.query,
            describe_body(Some(&request.headers), request.body.as_deref())
        );
    }

    fn response_ready(&self, request: &Request, response: &Response, elapsed: Duration) {
        let body = match (&response.file_path, response.payload()) {
            (Some(path), None) => format!("<file {}>", path.display()),
            (_, payload) => describe_body(response.headers.as_ref(), payload.map(|b| b.as_ref())),
        };
        debug!(
            "sending response {} {} -> {} headers={:?} body={} took {:?}",
            request.method, request.path, response.status_code, response.headers, body, elapsed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_content_type_sniff() {
        let json = HeaderTable::from([("Content-Type", "Application/JSON; charset=utf-8")]);
        let text = HeaderTable::from([("content-type", "text/plain")]);
        let binary = HeaderTable::from([("content-type", "image/png")]);

        assert_eq!(describe_body(Some(&json), Some(b"{}")), "{}");
        assert_eq!(describe_body(Some(&text), Some(b"hi")), "hi");
        assert_eq!(describe_body(Some(&binary), Some(b"\x89PNG")), "<4 bytes>");
        assert_eq!(describe_body(None, Some(b"abc")), "<3 bytes>");
        assert_eq!(describe_body(None, None), "<none>");
    }
}
