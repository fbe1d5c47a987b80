use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use either::Either;
use eyre::eyre;
use futures::FutureExt;
use http::{Method, StatusCode};
use tracing::error;

use crate::application::binder;
use crate::application::handler::{HandlerError, HandlerResult, Mapping, Reply};
use crate::domain::errors::CodecError;
use crate::infrastructure::server_impl::request::Request;
use crate::infrastructure::server_impl::response::Response;

/// Builders for the responses the server produces on its own. Every method
/// has an empty-bodied default.
pub trait Fallbacks: Send + Sync + 'static {
    fn not_found(&self, _method: &Method, _path: &str) -> Response {
        StatusCode::NOT_FOUND.into()
    }

    fn internal_error(&self, _error: &eyre::Report) -> Response {
        StatusCode::INTERNAL_SERVER_ERROR.into()
    }

    /// Sent before closing a connection whose request line is malformed.
    fn bad_request(&self, _error: &CodecError) -> Response {
        StatusCode::BAD_REQUEST.into()
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct DefaultFallbacks;

impl Fallbacks for DefaultFallbacks {}

fn panic_message(payload: Box<dyn Any + Send>) -> HandlerError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned());
    HandlerError::Failed(eyre!("handler panicked: {message}"))
}

async fn call(mapping: &Mapping, request: &Arc<Request>) -> HandlerResult {
    let params = binder::bind(&mapping.route, request).map_err(eyre::Report::new)?;

    let call = std::panic::catch_unwind(AssertUnwindSafe(|| mapping.handler.call(params)));
    match call {
        Ok(Either::Left(result)) => result,
        Ok(Either::Right(pending)) => AssertUnwindSafe(pending)
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(panic_message(payload))),
        Err(payload) => Err(panic_message(payload)),
    }
}

/// Binds parameters, runs the handler (awaiting it if it is asynchronous)
/// and turns whatever came out into a response.
pub async fn invoke(
    mapping: &Mapping,
    request: &Arc<Request>,
    fallbacks: &dyn Fallbacks,
) -> Response {
    let report = match call(mapping, request).await {
        Ok(Reply::Response(response)) => return response,
        Ok(Reply::Empty) => return StatusCode::NO_CONTENT.into(),
        Ok(Reply::Json(value)) => match Response::json(&value) {
            Ok(response) => return response,
            Err(e) => eyre::Report::new(e),
        },
        Err(HandlerError::Respond(response)) => return response,
        Err(HandlerError::Failed(report)) => report,
    };

    error!(
        "got a failure during the execution of the request {} {}: {report:#}",
        request.method, request.path
    );
    fallbacks.internal_error(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handler::{deferred, immediate, Param};
    use crate::domain::headers::HeaderTable;
    use crate::domain::route::{Binding, Route};
    use crate::infrastructure::server_impl::request::QueryParams;
    use bytes::Bytes;
    use tokio::time::Instant;

    fn request(body: Option<&'static str>) -> Arc<Request> {
        Arc::new(Request {
            received_at: Instant::now(),
            method: Method::POST,
            path: "/x".to_owned(),
            query: QueryParams::default(),
            version: "HTTP/1.1".into(),
            headers: HeaderTable::new(),
            body: body.map(Bytes::from),
        })
    }

    struct Teapot;

    impl Fallbacks for Teapot {
        fn internal_error(&self, error: &eyre::Report) -> Response {
            Response::new(418).unwrap().body(error.to_string())
        }
    }

    #[tokio::test]
    async fn success_empty_is_204() {
        let mapping = Mapping::new(Route::exact("/x"), immediate(|_| Ok(())));
        let response = invoke(&mapping, &request(None), &DefaultFallbacks).await;

        assert_eq!(response.status_code, StatusCode::NO_CONTENT);
        assert!(response.body.is_none());
    }

    #[tokio::test]
    async fn success_json_is_200() {
        let mapping = Mapping::new(
            Route::exact("/x").bind([Binding::Body]),
            deferred(|mut params| async move {
                let Some(Param::Body(body)) = params.pop() else {
                    return Err(HandlerError::from(eyre!("no body bound")));
                };
                Ok(serde_json::json!({ "echo": body }))
            }),
        );
        let response = invoke(&mapping, &request(Some(r#"{"a":1}"#)), &DefaultFallbacks).await;

        assert_eq!(response.status_code, StatusCode::OK);
        assert_eq!(response.body.unwrap().as_ref(), br#"{"echo":{"a":1}}"#);
    }

    #[tokio::test]
    async fn success_explicit_response_untouched() {
        let mapping = Mapping::new(
            Route::exact("/x"),
            immediate(|_| Ok(Response::new(201).unwrap().header("X-Foo", "custom"))),
        );
        let response = invoke(&mapping, &request(None), &DefaultFallbacks).await;

        assert_eq!(response.status_code, StatusCode::CREATED);
        assert_eq!(response.headers.unwrap().get("x-foo"), Some("custom"));
    }

    #[tokio::test]
    async fn success_structured_error_is_verbatim() {
        let mapping = Mapping::new(
            Route::exact("/x"),
            immediate(|_| -> Result<(), HandlerError> {
                Err(Response::new(409).unwrap().body("conflict").into())
            }),
        );
        let response = invoke(&mapping, &request(None), &DefaultFallbacks).await;

        assert_eq!(response.status_code, StatusCode::CONFLICT);
        assert_eq!(response.body.unwrap().as_ref(), b"conflict");
    }

    #[tokio::test]
    async fn failure_handler_error_is_500() {
        let mapping = Mapping::new(
            Route::exact("/x"),
            immediate(|_| -> Result<(), HandlerError> { Err(eyre!("boom").into()) }),
        );
        let response = invoke(&mapping, &request(None), &DefaultFallbacks).await;

        assert_eq!(response.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.body.is_none());
    }

    #[tokio::test]
    async fn failure_bad_body_uses_custom_fallback() {
        let mapping = Mapping::new(
            Route::exact("/x").bind([Binding::Body]),
            immediate(|_| Ok(())),
        );
        let response = invoke(&mapping, &request(Some("{")), &Teapot).await;

        assert_eq!(response.status_code, StatusCode::IM_A_TEAPOT);
        assert!(response.body.is_some());
    }

    #[tokio::test]
    async fn failure_panics_are_contained() {
        let sync = Mapping::new(
            Route::exact("/x"),
            immediate(|_| -> Result<(), HandlerError> { panic!("sync") }),
        );
        let pending = Mapping::new(
            Route::exact("/x"),
            deferred(|_| async {
                if true {
                    panic!("async");
                }
                Ok::<(), HandlerError>(())
            }),
        );

        let response = invoke(&sync, &request(None), &DefaultFallbacks).await;
        assert_eq!(response.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        let response = invoke(&pending, &request(None), &DefaultFallbacks).await;
        assert_eq!(response.status_code, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
