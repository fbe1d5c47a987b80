#![deny(
    missing_copy_implementations,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts
)]

pub mod api;
pub mod domain;

pub mod application;
pub mod infrastructure;

pub use application::dispatcher::{DefaultFallbacks, Fallbacks};
pub use application::handler::{
    deferred, immediate, Handler, HandlerError, HandlerResult, Mapping, Param, Params, Reply,
    RouteHandler,
};
pub use application::observer::{Observer, TracingObserver};
pub use domain::headers::HeaderTable;
pub use domain::route::{Binding, Route, UriVariables};
pub use infrastructure::server_impl::config::ServerConfig;
pub use infrastructure::server_impl::request::{QueryParams, Request};
pub use infrastructure::server_impl::response::Response;
pub use infrastructure::server_impl::server::Server;

pub type AnyResult<T> = eyre::Result<T>;
