pub mod binder;
pub mod dispatcher;
pub mod handler;
pub mod observer;
pub mod routes;
