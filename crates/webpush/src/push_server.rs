//! HTTP front end for a [`Pusher`].
//!
//! Application servers talk to it as they would to any RFC 8030 push
//! service:
//!
//! - `POST /push/{token}` hands the message to the pusher, 201 on success
//! - `DELETE /message/{id}` answers 501, message management is unsupported
//!
//! Each connection carries one request and is closed after the response.

use std::io;
use std::sync::Arc;

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE,
    TRANSFER_ENCODING,
};
use reqwest::{Method, StatusCode};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
    Take,
};
use tokio::net::TcpListener;

use crate::application_server::{TOPIC, TTL, URGENCY};
use crate::capability::{PushRequest, Pusher};
use crate::error::PushError;
use crate::options::Urgency;

/// Request line and header fields together.
const MAX_HEAD_BYTES: u64 = 16 * 1024;
const MAX_HEADERS: usize = 64;
/// Largest request body accepted.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

pub struct PushServer {
    pusher: Arc<dyn Pusher>,
}

struct HttpRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl PushServer {
    pub fn new(pusher: Arc<dyn Pusher>) -> Self {
        Self { pusher }
    }

    /// Accept connections until the listener fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(%addr, "push server listening");

        loop {
            let (stream, peer) = listener.accept().await?;
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = server.serve_connection(stream).await {
                    tracing::debug!(%peer, error = %e, "push connection failed");
                }
            });
        }
    }

    /// Read one request from `stream` and write the response.
    pub async fn serve_connection<S>(&self, stream: S) -> io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);

        let status = match read_request(&mut reader).await? {
            Ok(request) => {
                let status = self
                    .handle(&request.method, &request.path, &request.headers, request.body)
                    .await;
                tracing::debug!(
                    method = %request.method,
                    path = %request.path,
                    status = status.as_u16(),
                    "push service request"
                );
                status
            }
            Err(status) => {
                tracing::debug!(status = status.as_u16(), "rejected malformed request");
                status
            }
        };
        write_response(&mut writer, status).await
    }

    /// Route one request and return the response status.
    pub async fn handle(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        body: Vec<u8>,
    ) -> StatusCode {
        let path = path.split_once('?').map_or(path, |(path, _)| path);

        if let Some(token) = path.strip_prefix("/push/") {
            if token.contains('/') {
                return StatusCode::NOT_FOUND;
            }
            if *method != Method::POST {
                return StatusCode::METHOD_NOT_ALLOWED;
            }
            return self.push(token, headers, body).await;
        }

        if let Some(message_id) = path.strip_prefix("/message/") {
            if *method != Method::DELETE {
                return StatusCode::METHOD_NOT_ALLOWED;
            }
            tracing::debug!(message_id, "message deletion is not implemented");
            return StatusCode::NOT_IMPLEMENTED;
        }

        StatusCode::NOT_FOUND
    }

    async fn push(&self, token: &str, headers: &HeaderMap, body: Vec<u8>) -> StatusCode {
        if token.is_empty() {
            return StatusCode::BAD_REQUEST;
        }

        let ttl = match header_str(headers, TTL).map(str::parse::<u64>) {
            Some(Ok(ttl)) => ttl,
            Some(Err(_)) | None => {
                tracing::debug!("push without a valid TTL");
                return StatusCode::BAD_REQUEST;
            }
        };
        if let Some(urgency) = header_str(headers, URGENCY) {
            if let Err(e) = urgency.parse::<Urgency>() {
                tracing::debug!(error = %e, "push with invalid urgency");
                return StatusCode::BAD_REQUEST;
            }
        }

        let request = PushRequest {
            token: token.to_string(),
            ttl,
            topic: header_str(headers, TOPIC).map(str::to_string),
            content_type: header_str(headers, CONTENT_TYPE.as_str()).map(str::to_string),
            authorization: header_str(headers, AUTHORIZATION.as_str()).map(str::to_string),
            content: body,
        };
        match self.pusher.push(request).await {
            Ok(()) => StatusCode::CREATED,
            Err(e) => {
                let status = status_for(&e);
                tracing::warn!(status = status.as_u16(), error = %e, "push rejected");
                status
            }
        }
    }
}

impl std::fmt::Debug for PushServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushServer").finish_non_exhaustive()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn status_for(error: &PushError) -> StatusCode {
    match error {
        PushError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        PushError::UnknownSubscription(_) => StatusCode::GONE,
        PushError::Overloaded(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Read one line of the request head into `line`, without its terminator.
///
/// Returns `false` once the head size limit is used up.
async fn next_line<R>(head: &mut Take<R>, line: &mut String) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    head.read_line(line).await?;
    if line.ends_with('\n') {
        let len = line.trim_end_matches(&['\r', '\n'][..]).len();
        line.truncate(len);
        return Ok(true);
    }
    if head.limit() == 0 {
        return Ok(false);
    }
    Err(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "connection closed mid-request",
    ))
}

/// Parse an HTTP/1.1 request. The inner error is the status to answer with.
async fn read_request<R>(reader: &mut R) -> io::Result<Result<HttpRequest, StatusCode>>
where
    R: AsyncBufRead + Unpin,
{
    let mut head = (&mut *reader).take(MAX_HEAD_BYTES);
    let mut line = String::new();

    if !next_line(&mut head, &mut line).await? {
        return Ok(Err(StatusCode::URI_TOO_LONG));
    }
    let mut parts = line.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Ok(Err(StatusCode::BAD_REQUEST));
    };
    if !version.starts_with("HTTP/1.") {
        return Ok(Err(StatusCode::HTTP_VERSION_NOT_SUPPORTED));
    }
    let Ok(method) = Method::from_bytes(method.as_bytes()) else {
        return Ok(Err(StatusCode::BAD_REQUEST));
    };
    let path = target.to_string();

    let mut headers = HeaderMap::new();
    loop {
        if !next_line(&mut head, &mut line).await? || headers.len() >= MAX_HEADERS {
            return Ok(Err(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE));
        }
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Ok(Err(StatusCode::BAD_REQUEST));
        };
        match (
            HeaderName::from_bytes(name.trim().as_bytes()),
            HeaderValue::from_str(value.trim()),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => return Ok(Err(StatusCode::BAD_REQUEST)),
        }
    }

    if headers.contains_key(TRANSFER_ENCODING) {
        return Ok(Err(StatusCode::LENGTH_REQUIRED));
    }
    let length = match headers.get(CONTENT_LENGTH) {
        Some(value) => match value.to_str().ok().and_then(|v| v.parse::<usize>().ok()) {
            Some(length) => length,
            None => return Ok(Err(StatusCode::BAD_REQUEST)),
        },
        None if method == Method::POST => return Ok(Err(StatusCode::LENGTH_REQUIRED)),
        None => 0,
    };
    if length > MAX_BODY_BYTES {
        return Ok(Err(StatusCode::PAYLOAD_TOO_LARGE));
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;

    Ok(Ok(HttpRequest {
        method,
        path,
        headers,
        body,
    }))
}

async fn write_response<W>(writer: &mut W, status: StatusCode) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    writer.write_all(response.as_bytes()).await?;
    writer.shutdown().await
}
