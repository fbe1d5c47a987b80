use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use either::Either;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::domain::errors::RouteError;
use crate::domain::headers::HeaderTable;
use crate::domain::route::{Route, UriVariables};
use crate::infrastructure::server_impl::request::{QueryParams, Request};
use crate::infrastructure::server_impl::response::Response;

/// A value bound to one declared [crate::domain::route::Binding].
#[derive(Debug, Clone)]
pub enum Param {
    Request(Arc<Request>),
    Headers(HeaderTable),
    RawBody(Option<Bytes>),
    Body(serde_json::Value),
    QueryParams(QueryParams),
    UriVariables(UriVariables),
    Absent,
}

pub type Params = Vec<Param>;

/// What a handler produced.
#[derive(Debug)]
pub enum Reply {
    /// Becomes an empty 204.
    Empty,
    /// Becomes a 200 with the value serialized as json.
    Json(serde_json::Value),
    /// Sent as is.
    Response(Response),
}

impl From<Response> for Reply {
    fn from(value: Response) -> Self {
        Self::Response(value)
    }
}

impl From<serde_json::Value> for Reply {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

#[derive(Debug)]
pub enum HandlerError {
    /// A deliberate outcome, sent verbatim instead of the generic 500.
    Respond(Response),
    Failed(eyre::Report),
}

impl From<eyre::Report> for HandlerError {
    fn from(value: eyre::Report) -> Self {
        Self::Failed(value)
    }
}

impl From<Response> for HandlerError {
    fn from(value: Response) -> Self {
        Self::Respond(value)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Respond(response) => write!(f, "handler responded with {}", response.status_code),
            Self::Failed(report) => write!(f, "{report:#}"),
        }
    }
}

pub type HandlerResult = Result<Reply, HandlerError>;
pub type HandlerFuture = BoxFuture<'static, HandlerResult>;
/// Either the finished result or a computation the caller has to await.
pub type HandlerCall = Either<HandlerResult, HandlerFuture>;

pub trait Handler: Send + Sync + 'static {
    fn call(&self, params: Params) -> HandlerCall;
}

impl<F> Handler for F
where
    F: Fn(Params) -> HandlerCall + Send + Sync + 'static,
{
    fn call(&self, params: Params) -> HandlerCall {
        self(params)
    }
}

/// Wraps a handler that completes without suspending.
pub fn immediate<F, R>(f: F) -> impl Handler
where
    F: Fn(Params) -> Result<R, HandlerError> + Send + Sync + 'static,
    R: Into<Reply>,
{
    move |params: Params| -> HandlerCall { Either::Left(f(params).map(Into::into)) }
}

/// Wraps a handler whose result is produced by a future.
pub fn deferred<F, Fut, R>(f: F) -> impl Handler
where
    F: Fn(Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    R: Into<Reply>,
{
    move |params: Params| -> HandlerCall {
        Either::Right(f(params).map(|res| res.map(Into::into)).boxed())
    }
}

/// One route bound to the handler serving it.
#[derive(Clone)]
pub struct Mapping {
    pub route: Route,
    pub handler: Arc<dyn Handler>,
}

impl Mapping {
    pub fn new(route: Route, handler: impl Handler) -> Self {
        Self {
            route,
            handler: Arc::new(handler),
        }
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}

/// A handler object exposing any number of routable functions.
pub trait RouteHandler: Send + Sync + 'static {
    fn mappings(self: Arc<Self>) -> Result<Vec<Mapping>, RouteError>;
}
