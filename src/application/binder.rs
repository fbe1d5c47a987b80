use std::sync::Arc;

use crate::application::handler::{Param, Params};
use crate::domain::errors::BindError;
use crate::domain::route::{Binding, Route};
use crate::infrastructure::server_impl::request::Request;

/// Resolves each binding declared by `route`, in declaration order.
pub fn bind(route: &Route, request: &Arc<Request>) -> Result<Params, BindError> {
    route
        .bindings()
        .iter()
        .map(|binding| bind_one(binding, route, request))
        .collect()
}

fn bind_one(binding: &Binding, route: &Route, request: &Arc<Request>) -> Result<Param, BindError> {
    let param = match binding {
        Binding::Request => Param::Request(Arc::clone(request)),
        Binding::Headers => Param::Headers(request.headers.clone()),
        Binding::RawBody => Param::RawBody(request.body.clone()),
        Binding::Body => {
            let body = request.body.as_deref().ok_or(BindError::MissingBody)?;
            Param::Body(serde_json::from_slice(body)?)
        }
        Binding::QueryParams => Param::QueryParams(request.query.clone()),
        Binding::UriVariables => Param::UriVariables(route.uri_variables(&request.path)),
        Binding::Unrecognized(_) => Param::Absent,
    };
    Ok(param)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::headers::HeaderTable;
    use crate::infrastructure::server_impl::request::QueryParams;
    use bytes::Bytes;
    use http::Method;
    use tokio::time::Instant;

    fn request(path: &str, body: Option<&'static str>) -> Arc<Request> {
        Arc::new(Request {
            received_at: Instant::now(),
            method: Method::POST,
            path: path.to_owned(),
            query: QueryParams::parse("page=2"),
            version: "HTTP/1.1".into(),
            headers: HeaderTable::from([("X-Foo", "10")]),
            body: body.map(Bytes::from),
        })
    }

    #[test]
    fn success_binds_in_declared_order() {
        let route = Route::variable("/aaa/{bbb}/ccc/{ddd}")
            .unwrap()
            .bind_names(["uri_variables", "body", "headers", "query_params", "raw_body", "other"]);
        let params = bind(&route, &request("/aaa/1/ccc/2", Some(r#"{"foo": 1}"#))).unwrap();

        assert_eq!(params.len(), 6);
        let Param::UriVariables(vars) = &params[0] else { unreachable!() };
        assert_eq!(vars["bbb"], "1");
        assert_eq!(vars["ddd"], "2");
        let Param::Body(body) = &params[1] else { unreachable!() };
        assert_eq!(body["foo"], 1);
        let Param::Headers(headers) = &params[2] else { unreachable!() };
        assert_eq!(headers.get("x-foo"), Some("10"));
        let Param::QueryParams(query) = &params[3] else { unreachable!() };
        assert_eq!(query.first("page"), Some("2"));
        let Param::RawBody(Some(raw)) = &params[4] else { unreachable!() };
        assert_eq!(raw.as_ref(), br#"{"foo": 1}"#);
        assert!(matches!(params[5], Param::Absent));
    }

    #[test]
    fn success_request_is_shared() {
        let route = Route::exact("/x").bind([Binding::Request]);
        let req = request("/x", None);
        let params = bind(&route, &req).unwrap();

        let Param::Request(bound) = &params[0] else { unreachable!() };
        assert!(Arc::ptr_eq(bound, &req));
    }

    #[test]
    fn failure_body_not_json() {
        let route = Route::exact("/x").bind([Binding::Body]);

        assert!(matches!(
            bind(&route, &request("/x", Some("not json"))),
            Err(BindError::InvalidJson(_))
        ));
        assert!(matches!(
            bind(&route, &request("/x", None)),
            Err(BindError::MissingBody)
        ));
    }
}
