pub mod errors;
pub mod headers;
pub mod route;
