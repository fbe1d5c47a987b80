//! The keep-alive loop owning one accepted connection.
//!
//! One request is read, matched, dispatched and answered before the next one
//! is read. Any transport failure abandons the connection without a reply.

use std::fmt;
use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, error, warn};

use crate::application::dispatcher::{self, Fallbacks};
use crate::application::observer::Observer;
use crate::application::routes::RouteTable;
use crate::domain::errors::CodecError;
use crate::domain::headers::HeaderTable;
use crate::infrastructure::server_impl::codec;
use crate::infrastructure::server_impl::config::ServerConfig;
use crate::infrastructure::server_impl::request::Request;
use crate::infrastructure::server_impl::response::Response;

/// Everything connections share. Frozen once the server starts serving.
pub(crate) struct Shared {
    pub routes: RouteTable,
    pub default_headers: HeaderTable,
    pub config: ServerConfig,
    pub fallbacks: Arc<dyn Fallbacks>,
    pub observer: Arc<dyn Observer>,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("routes", &self.routes)
            .field("default_headers", &self.default_headers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Response headers win; defaults only fill names the response left out.
fn with_default_headers(defaults: &HeaderTable, mut response: Response) -> Response {
    match response.headers.as_mut() {
        Some(headers) => {
            headers.merge_missing(defaults);
        }
        None if !defaults.is_empty() => response.headers = Some(defaults.clone()),
        None => {}
    }
    response
}

#[derive(Debug)]
pub(crate) struct Connection<R, W> {
    reader: BufReader<R>,
    writer: BufWriter<W>,
    peer: String,
    shared: Arc<Shared>,
}

impl<R, W> Connection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, peer: String, shared: Arc<Shared>) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            peer,
            shared,
        }
    }

    pub async fn run(mut self) {
        let shared = Arc::clone(&self.shared);

        while let Some(request) = self.next_request().await {
            let request = Arc::new(request);
            shared.observer.request_parsed(&request);

            let response = match shared.routes.find(&request.method, &request.path) {
                Some(mapping) => {
                    debug!("found matching route {:?}", mapping.route);
                    dispatcher::invoke(mapping, &request, shared.fallbacks.as_ref()).await
                }
                None => {
                    warn!(
                        "unable to find any matching route for {} {}",
                        request.method, request.path
                    );
                    shared.fallbacks.not_found(&request.method, &request.path)
                }
            };

            if let Err(e) = self.send(Some(&request), response).await {
                warn!("failed to write response to {}: {e}", self.peer);
                break;
            }
        }

        if let Err(e) = self.writer.shutdown().await {
            debug!("error while closing connection to {}: {e}", self.peer);
        }
    }

    async fn next_request(&mut self) -> Option<Request> {
        let err = match codec::read_request(&mut self.reader, &self.shared.config).await {
            Ok(Some(request)) => return Some(request),
            Ok(None) => {
                debug!("client {} closed the connection", self.peer);
                return None;
            }
            Err(e) => e,
        };

        match err {
            CodecError::MalformedRequestLine(_) => {
                warn!("{err}. answering 400 and disconnecting the client {}", self.peer);
                let response = self.shared.fallbacks.bad_request(&err);
                if let Err(e) = self.send(None, response).await {
                    debug!("unable to send 400 to {}: {e}", self.peer);
                }
            }
            _ if err.is_transport() => {
                warn!("got a failure: {err}. disconnecting the client {}", self.peer)
            }
            _ => warn!("unable to parse request: {err}. disconnecting the client {}", self.peer),
        }
        None
    }

    async fn send(&mut self, request: Option<&Request>, response: Response) -> io::Result<()> {
        let shared = Arc::clone(&self.shared);
        let response = with_default_headers(&shared.default_headers, response);
        if let Some(request) = request {
            shared
                .observer
                .response_ready(request, &response, request.received_at.elapsed());
        }

        let encoded = match codec::encode_response(response).await {
            Ok(encoded) => encoded,
            Err(e) => {
                error!("unable to prepare the response for {}: {e}", self.peer);
                let report = eyre::Report::new(e);
                let fallback = shared.fallbacks.internal_error(&report);
                let fallback = with_default_headers(&shared.default_headers, fallback);
                codec::encode_response(fallback).await?
            }
        };
        codec::send_response(&mut self.writer, encoded).await
    }
}
