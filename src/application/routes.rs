use ahash::AHashMap;
use compact_str::{format_compact, CompactString};
use http::Method;
use tracing::{debug, warn};

use crate::application::handler::Mapping;

/// Exact routes keyed by `"METHOD:path"`, then pattern and variable routes in
/// registration order.
#[derive(Debug, Default, Clone)]
pub struct RouteTable {
    exact: AHashMap<CompactString, Mapping>,
    ordered: Vec<Mapping>,
}

fn key(method: &Method, path: &str) -> CompactString {
    format_compact!("{method}:{path}")
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact routes get one entry per accepted method. Registering the same
    /// method and path twice keeps the later one.
    pub fn insert(&mut self, mapping: Mapping) {
        let Some(path) = mapping.route.exact_path() else {
            debug!(
                "Register regex route {:?} {:?}",
                mapping.route.accepted_methods(),
                mapping.route.matcher()
            );
            self.ordered.push(mapping);
            return;
        };

        for method in mapping.route.accepted_methods() {
            let key = key(method, path);
            debug!("Register static route {method} {path}");
            if self.exact.insert(key, mapping.clone()).is_some() {
                warn!("Static route {method} {path} registered twice, keeping the latest");
            }
        }
    }

    /// Exact match first, then the first pattern route accepting `method`.
    pub fn find(&self, method: &Method, path: &str) -> Option<&Mapping> {
        self.exact.get(&key(method, path)).or_else(|| {
            self.ordered
                .iter()
                .find(|mapping| mapping.route.matches(method, path))
        })
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handler::{immediate, Reply};
    use crate::domain::route::Route;
    use either::Either;

    fn tagged(route: Route, tag: &'static str) -> Mapping {
        Mapping::new(
            route,
            immediate(move |_| Ok(serde_json::Value::from(tag))),
        )
    }

    fn tag_of(mapping: &Mapping) -> String {
        match mapping.handler.call(Vec::new()) {
            Either::Left(Ok(Reply::Json(value))) => value.as_str().unwrap().to_owned(),
            _ => unreachable!(),
        }
    }

    #[test]
    fn success_exact_beats_pattern() {
        let mut table = RouteTable::new();
        table.insert(tagged(Route::pattern("^/foo$").unwrap(), "pattern"));
        table.insert(tagged(Route::variable("/{name}").unwrap(), "variable"));
        table.insert(tagged(Route::exact("/foo"), "exact"));

        assert_eq!(tag_of(table.find(&Method::GET, "/foo").unwrap()), "exact");
        assert_eq!(tag_of(table.find(&Method::GET, "/bar").unwrap()), "variable");
    }

    #[test]
    fn success_first_registered_pattern_wins() {
        let mut table = RouteTable::new();
        table.insert(tagged(Route::pattern("/any/(.*)").unwrap(), "first"));
        table.insert(tagged(Route::variable("/any/{x}").unwrap(), "second"));

        assert_eq!(tag_of(table.find(&Method::GET, "/any/1").unwrap()), "first");
    }

    #[test]
    fn success_method_sets() {
        let mut table = RouteTable::new();
        table.insert(tagged(
            Route::exact("/foo").methods([Method::GET, Method::POST]),
            "foo",
        ));
        table.insert(tagged(
            Route::variable("/items/{id}").unwrap().method(Method::DELETE),
            "delete",
        ));

        assert!(table.find(&Method::POST, "/foo").is_some());
        assert!(table.find(&Method::PUT, "/foo").is_none());
        assert!(table.find(&Method::DELETE, "/items/3").is_some());
        assert!(table.find(&Method::GET, "/items/3").is_none());
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn success_duplicate_exact_overwrites() {
        let mut table = RouteTable::new();
        table.insert(tagged(Route::exact("/foo"), "old"));
        table.insert(tagged(Route::exact("/foo"), "new"));

        assert_eq!(tag_of(table.find(&Method::GET, "/foo").unwrap()), "new");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn failure_no_match() {
        let mut table = RouteTable::new();
        table.insert(tagged(Route::exact("/foo"), "foo"));

        assert!(table.find(&Method::GET, "/nope").is_none());
        assert!(RouteTable::new().is_empty());
    }
}
