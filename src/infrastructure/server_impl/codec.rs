//! HTTP/1.1 framing: reads one request at a time off a buffered stream and
//! writes responses back. No chunked encoding, no trailers, no
//! `Expect: 100-continue`.

use std::future::Future;
use std::io::{self, Write};

use bytes::Bytes;
use compact_str::CompactString;
use http::Method;
use memchr::{memchr, memmem};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Instant};

use crate::domain::errors::{CodecError, ResponseError};
use crate::domain::headers::HeaderTable;
use crate::infrastructure::server_impl::config::ServerConfig;
use crate::infrastructure::server_impl::request::{QueryParams, Request};
use crate::infrastructure::server_impl::response::Response;

const CRLF: &[u8] = b"\r\n";

async fn bounded<T>(
    config: &ServerConfig,
    fut: impl Future<Output = Result<T, CodecError>>,
) -> Result<T, CodecError> {
    timeout(config.read_timeout, fut)
        .await
        .map_err(|_| CodecError::Timeout)?
}

/// Reads up to and including the next CRLF. A short read means the stream
/// ended first.
async fn read_crlf_line<R>(reader: &mut R, limit: usize) -> Result<Vec<u8>, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::with_capacity(128);
    loop {
        let remaining = limit.saturating_add(CRLF.len()).saturating_sub(line.len());
        if remaining == 0 {
            return Err(CodecError::LineTooLong(limit));
        }

        let read = (&mut *reader)
            .take(remaining as u64)
            .read_until(b'\n', &mut line)
            .await?;
        if read == 0 || line.ends_with(CRLF) {
            return Ok(line);
        }
    }
}

fn complete_line(mut line: Vec<u8>) -> Result<String, CodecError> {
    if !line.ends_with(CRLF) {
        return Err(CodecError::Incomplete);
    }
    line.truncate(line.len() - CRLF.len());
    String::from_utf8(line).map_err(|_| CodecError::InvalidEncoding)
}

/// Collapses a leading `//` so the path cannot be mistaken for a
/// scheme-less absolute URI.
fn clean_path(path: &str) -> String {
    if path.starts_with("//") {
        format!("/{}", path.trim_start_matches('/'))
    } else {
        path.to_owned()
    }
}

fn split_target(target: &str) -> (String, QueryParams) {
    let target = clean_path(target);
    match memchr(b'?', target.as_bytes()) {
        Some(idx) => (target[..idx].to_owned(), QueryParams::parse(&target[idx + 1..])),
        None => (target, QueryParams::default()),
    }
}

fn parse_header(line: &str) -> Result<(&str, &str), CodecError> {
    let idx = memmem::find(line.as_bytes(), b": ")
        .ok_or_else(|| CodecError::MalformedHeader(line.to_owned()))?;
    Ok((line[..idx].trim(), line[idx + 2..].trim()))
}

fn content_length(headers: &HeaderTable) -> Result<u64, CodecError> {
    let Some(value) = headers.get("content-length") else {
        return Ok(0);
    };
    let length = value
        .parse::<i64>()
        .map_err(|_| CodecError::InvalidContentLength(value.to_owned()))?;
    Ok(u64::try_from(length).unwrap_or(0))
}

/// Reads one request. `Ok(None)` means the peer closed the connection
/// cleanly before sending anything.
pub async fn read_request<R>(
    reader: &mut R,
    config: &ServerConfig,
) -> Result<Option<Request>, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    let limit = config.max_line_length;

    let line = bounded(config, read_crlf_line(reader, limit)).await?;
    if line.is_empty() {
        return Ok(None);
    }
    let line = complete_line(line)?;

    let mut words = line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (words.next(), words.next(), words.next())
    else {
        return Err(CodecError::MalformedRequestLine(line.clone()));
    };
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| CodecError::MalformedRequestLine(line.clone()))?;
    let version = CompactString::from(version);
    let (path, query) = split_target(target);

    let mut headers = HeaderTable::new();
    loop {
        let line = complete_line(bounded(config, read_crlf_line(reader, limit)).await?)?;
        if line.is_empty() {
            break;
        }
        let (name, value) = parse_header(&line)?;
        headers.add(name, value);
    }

    let length = content_length(&headers)?;
    if length > config.max_body_size {
        return Err(CodecError::BodyTooLarge {
            got: length,
            limit: config.max_body_size,
        });
    }

    let body = if length > 0 {
        let mut buf = vec![0; length as usize];
        bounded(config, async {
            reader.read_exact(&mut buf).await.map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => CodecError::Incomplete,
                _ => CodecError::Io(e),
            })
        })
        .await?;
        Some(Bytes::from(buf))
    } else {
        None
    };

    Ok(Some(Request {
        received_at: Instant::now(),
        method,
        path,
        query,
        version,
        headers,
        body,
    }))
}

#[derive(Debug)]
enum Payload {
    Empty,
    Body(Bytes),
    File(File),
}

/// A response whose head is already serialized and whose payload source is
/// open, so nothing can fail before the first byte goes out except I/O.
#[derive(Debug)]
pub struct EncodedResponse {
    head: Vec<u8>,
    payload: Payload,
}

impl EncodedResponse {
    pub fn head(&self) -> &[u8] {
        &self.head
    }
}

/// Serializes the status line and headers. `content-length` is always
/// computed here and overrides any value the caller set. Codes without a
/// standard reason phrase are rejected.
pub fn encode_head(response: &Response, content_length: u64) -> io::Result<Vec<u8>> {
    let Some(reason) = response.status_code.canonical_reason() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            ResponseError::UnknownStatus(response.status_code.as_u16()),
        ));
    };
    let mut headers = response.headers.clone().unwrap_or_default();
    headers.set("content-length", content_length.to_string());

    let mut head = Vec::with_capacity(128);
    write!(
        head,
        "HTTP/1.1 {} {}\r\n",
        response.status_code.as_u16(),
        reason
    )?;
    for (name, value) in headers.iter() {
        write!(head, "{name}: {value}\r\n")?;
    }
    head.extend_from_slice(CRLF);
    Ok(head)
}

/// Resolves the payload (opening the file, if any) and serializes the head.
pub async fn encode_response(response: Response) -> io::Result<EncodedResponse> {
    let (payload, length) = match (response.payload(), &response.file_path) {
        (Some(body), _) => (Payload::Body(body.clone()), body.len() as u64),
        (None, Some(path)) => {
            let file = File::open(path).await?;
            let length = file.metadata().await?.len();
            (Payload::File(file), length)
        }
        (None, None) => (Payload::Empty, 0),
    };

    Ok(EncodedResponse {
        head: encode_head(&response, length)?,
        payload,
    })
}

pub async fn send_response<W>(writer: &mut W, encoded: EncodedResponse) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encoded.head).await?;
    match encoded.payload {
        Payload::Empty => {}
        Payload::Body(body) => writer.write_all(&body).await?,
        Payload::File(mut file) => {
            writer.flush().await?;
            tokio::io::copy(&mut file, writer).await?;
        }
    }
    writer.flush().await
}

pub async fn write_response<W>(writer: &mut W, response: Response) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let encoded = encode_response(response).await?;
    send_response(writer, encoded).await
}
