//! Demo routes exercising every route style and binding.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use eyre::eyre;
use http::{Method, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::application::handler::{
    deferred, immediate, HandlerError, Mapping, Param, Params, RouteHandler,
};
use crate::domain::errors::RouteError;
use crate::domain::route::{Binding, Route, UriVariables};
use crate::infrastructure::server_impl::response::Response;

#[derive(Debug, Clone)]
pub struct DemoHandler {
    file_path: PathBuf,
    delay: Duration,
}

impl DemoHandler {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            delay: Duration::from_secs(4),
        }
    }

    /// How long the sleeping routes wait before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Serialize)]
struct DeleteReply {
    x: i32,
    y: Value,
}

fn body(params: Params) -> Result<Value, HandlerError> {
    params
        .into_iter()
        .find_map(|param| match param {
            Param::Body(body) => Some(body),
            _ => None,
        })
        .ok_or_else(|| HandlerError::from(eyre!("body is not bound")))
}

fn uri_variables(params: Params) -> Result<UriVariables, HandlerError> {
    params
        .into_iter()
        .find_map(|param| match param {
            Param::UriVariables(vars) => Some(vars),
            _ => None,
        })
        .ok_or_else(|| HandlerError::from(eyre!("uri variables are not bound")))
}

fn foo(params: Params) -> Result<(), HandlerError> {
    if let Some(Param::Request(request)) = params.first() {
        debug!("foo called with {} {}", request.method, request.path);
    }
    Ok(())
}

fn test_post(params: Params) -> Result<Value, HandlerError> {
    let body = body(params)?;
    let foo = body.get("foo").unwrap_or(&Value::Null);
    info!("foo: {foo}");
    Ok(body)
}

fn test_pattern(params: Params) -> Result<Value, HandlerError> {
    match params.first() {
        Some(Param::Request(request)) => Ok(Value::from(request.path.as_str())),
        _ => Err(eyre!("request is not bound").into()),
    }
}

fn test_custom_response(_: Params) -> Result<Response, HandlerError> {
    Ok(Response::with_status(StatusCode::OK)
        .header("X-Foo", "custom stuff")
        .body("test-body"))
}

fn test_delete(params: Params) -> Result<Response, HandlerError> {
    let reply = DeleteReply {
        x: 1,
        y: body(params)?,
    };
    Response::json(&reply).map_err(|e| eyre::Report::new(e).into())
}

impl RouteHandler for DemoHandler {
    fn mappings(self: Arc<Self>) -> Result<Vec<Mapping>, RouteError> {
        let delay = self.delay;
        let file_path = self.file_path.clone();

        Ok(vec![
            Mapping::new(
                Route::exact("/foo")
                    .methods([Method::GET, Method::POST])
                    .bind([Binding::Request]),
                immediate(foo),
            ),
            Mapping::new(
                Route::exact("/bar").bind([Binding::Body, Binding::Headers]),
                immediate(|_| Ok(json!({ "a": 10 }))),
            ),
            Mapping::new(
                Route::exact("/test-post")
                    .method(Method::POST)
                    .bind([Binding::Body]),
                immediate(test_post),
            ),
            Mapping::new(
                Route::exact("/async-sleep"),
                deferred(move |_| async move {
                    tokio::time::sleep(delay).await;
                    Ok::<_, HandlerError>(())
                }),
            ),
            Mapping::new(
                Route::variable("/aaa/{bbb}")?.bind([Binding::UriVariables]),
                deferred(move |params| async move {
                    tokio::time::sleep(delay).await;
                    Ok(json!(uri_variables(params)?))
                }),
            ),
            Mapping::new(
                Route::variable("/aaa/{bbb}/ccc/{ddd}")?.bind([Binding::UriVariables]),
                deferred(|params| async move { Ok(json!(uri_variables(params)?)) }),
            ),
            Mapping::new(
                Route::pattern("/any/(.*)")?.bind([Binding::Request]),
                immediate(test_pattern),
            ),
            Mapping::new(
                Route::pattern("/send-file")?,
                immediate(move |_| Ok(Response::with_status(StatusCode::OK).file(&file_path))),
            ),
            Mapping::new(
                Route::exact("/test-custom-response"),
                immediate(test_custom_response),
            ),
            Mapping::new(
                Route::exact("/test-delete")
                    .method(Method::DELETE)
                    .bind([Binding::Body]),
                immediate(test_delete),
            ),
        ])
    }
}
