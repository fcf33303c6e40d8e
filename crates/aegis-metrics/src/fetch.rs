//! Scrape transport.
//!
//! The poller only needs "endpoint in, body text out"; [`Fetcher`] is that
//! seam. [`HttpFetcher`] is the production implementation over a plain
//! hyper HTTP/1 connection.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::Uri;
use http_body_util::{BodyExt, Empty};
use tracing::debug;

use crate::error::FetchError;

/// Boxed future returned by [`Fetcher::fetch`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Retrieves an exposition payload from an endpoint.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(&'a self, endpoint: &'a str) -> BoxFuture<'a, Result<String, FetchError>>;
}

/// Path used when the endpoint URL carries none.
const DEFAULT_PATH: &str = "/metrics";

/// Fetches over HTTP/1.1, one connection per scrape.
///
/// Only `http://` endpoints are supported. There is no request timeout; a
/// hung scrape is superseded by the next tick rather than cut short.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher;

impl HttpFetcher {
    pub fn new() -> Self {
        Self
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, endpoint: &'a str) -> BoxFuture<'a, Result<String, FetchError>> {
        Box::pin(http_get(endpoint))
    }
}

/// A resolved scrape target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    /// `host:port` to dial.
    pub address: String,
    /// Value for the `host` header.
    pub host: String,
    pub uri: Uri,
}

/// Resolve an endpoint string into something we can dial.
pub(crate) fn resolve(endpoint: &str) -> Result<Target, FetchError> {
    let invalid = |reason: &str| FetchError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    let uri: Uri = endpoint.trim().parse().map_err(|_| invalid("not a URL"))?;
    match uri.scheme_str() {
        Some("http") => {}
        Some(_) => return Err(invalid("only http:// endpoints are supported")),
        None => return Err(invalid("missing scheme")),
    }
    let authority = uri.authority().ok_or_else(|| invalid("missing host"))?;
    let port = authority.port_u16().unwrap_or(80);
    let address = format!("{}:{port}", authority.host());

    let path_and_query = match uri.path_and_query().map(|pq| pq.as_str()) {
        None | Some("") | Some("/") => DEFAULT_PATH,
        Some(pq) => pq,
    };
    let uri = Uri::builder()
        .scheme("http")
        .authority(authority.as_str())
        .path_and_query(path_and_query)
        .build()
        .map_err(|_| invalid("unbuildable URL"))?;

    Ok(Target {
        address,
        host: authority.as_str().to_string(),
        uri,
    })
}

async fn http_get(endpoint: &str) -> Result<String, FetchError> {
    let target = resolve(endpoint)?;

    let stream = tokio::net::TcpStream::connect(&target.address)
        .await
        .map_err(|e| {
            debug!(error = %e, %endpoint, "scrape connection failed");
            FetchError::Connect(e.to_string())
        })?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| FetchError::Connect(e.to_string()))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = http::Request::builder()
        .method("GET")
        .uri(target.uri.clone())
        .header("host", &target.host)
        .header("accept", "text/plain")
        .header("user-agent", "aegis-metrics/0.1")
        .body(Empty::<Bytes>::new())
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;
    let status = resp.status();

    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?
        .to_bytes();
    let text = String::from_utf8_lossy(&body).into_owned();

    if !status.is_success() {
        debug!(%status, %endpoint, "scrape returned non-2xx");
        return Err(FetchError::Status {
            status: status.as_u16(),
            body: text,
        });
    }

    debug!(%endpoint, bytes = body.len(), "scrape complete");
    Ok(text)
}
