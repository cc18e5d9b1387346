#[cfg(feature = "transport-http")]
pub mod http;

use crate::error::{ViewerError, ViewerResult};
use crate::mesh::{self, DocumentFormat, MeshDocument};
use crate::params::ParameterSet;
use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use url::Url;

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("io error: {0}")]
    Io(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("transport task failed: {0}")]
    Task(String),
    #[error("transport error: {0}")]
    Other(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
pub type TransportFuture = BoxFuture<'static, TransportResult<Bytes>>;

/// Issues GET requests against the mesh service. The returned future owns
/// everything it needs, so a request can outlive the borrow of the transport.
pub trait MeshTransport: Send + Sync {
    fn label(&self) -> &'static str;
    fn get(&self, url: &Url) -> TransportFuture;
}

/// Identifies one issued request; later submissions get larger tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestTag(u64);

impl RequestTag {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub(crate) struct TagAllocator {
    last: u64,
}

impl TagAllocator {
    pub(crate) fn next(&mut self) -> RequestTag {
        self.last = self.last.wrapping_add(1);
        RequestTag(self.last)
    }
}

/// A decoded response together with the bytes it was decoded from.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub url: Url,
    pub format: DocumentFormat,
    pub bytes: Bytes,
    pub mesh: MeshDocument,
}

pub fn decode_response(url: Url, bytes: Bytes) -> ViewerResult<FetchedDocument> {
    let (format, mesh) = mesh::decode_document(&bytes)?;
    Ok(FetchedDocument {
        url,
        format,
        bytes,
        mesh,
    })
}

async fn await_response(
    future: TransportFuture,
    timeout: Option<Duration>,
) -> TransportResult<Bytes> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, future).await {
            Ok(response) => response,
            Err(_) => Err(TransportError::Timeout(limit)),
        },
        None => future.await,
    }
}

/// Fetches and decodes the mesh for `params` outside of any viewer session.
pub async fn fetch_mesh(
    transport: &dyn MeshTransport,
    endpoint: &Url,
    params: &ParameterSet,
    timeout: Option<Duration>,
) -> ViewerResult<FetchedDocument> {
    let url = params.request_url(endpoint);
    info!("[fetch] GET {url}");
    let bytes = await_response(transport.get(&url), timeout)
        .await
        .map_err(|err| ViewerError::network(url.as_str(), err))?;
    decode_response(url, bytes)
}

/// Settled request, successful or not, still carrying its tag so the
/// session can tell whether it has been superseded.
#[derive(Debug)]
pub struct FetchOutcome {
    pub tag: RequestTag,
    pub params: ParameterSet,
    pub url: Url,
    pub elapsed: Duration,
    pub result: ViewerResult<FetchedDocument>,
}

/// An issued request that has not been awaited yet.
pub struct PendingRequest {
    tag: RequestTag,
    params: ParameterSet,
    url: Url,
    response: TransportFuture,
    timeout: Option<Duration>,
}

impl PendingRequest {
    pub(crate) fn issue(
        transport: &dyn MeshTransport,
        tag: RequestTag,
        params: ParameterSet,
        endpoint: &Url,
        timeout: Option<Duration>,
    ) -> Self {
        let url = params.request_url(endpoint);
        info!("[fetch] request {tag} via {}: GET {url}", transport.label());
        let response = transport.get(&url);
        Self {
            tag,
            params,
            url,
            response,
            timeout,
        }
    }

    pub fn tag(&self) -> RequestTag {
        self.tag
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn resolve(self) -> FetchOutcome {
        let started = Instant::now();
        let url = self.url;
        let result = match await_response(self.response, self.timeout).await {
            Ok(bytes) => {
                debug!("[fetch] request {} received {} bytes", self.tag, bytes.len());
                decode_response(url.clone(), bytes)
            }
            Err(err) => Err(ViewerError::network(url.as_str(), err)),
        };
        FetchOutcome {
            tag: self.tag,
            params: self.params,
            url,
            elapsed: started.elapsed(),
            result,
        }
    }
}

/// In-flight flag for the progress indicator. It follows the most recently
/// issued request only: superseded requests settling never clear it.
pub struct ProgressSignal {
    sender: watch::Sender<bool>,
    awaiting: Option<RequestTag>,
}

impl ProgressSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender,
            awaiting: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    pub fn is_in_flight(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn begin(&mut self, tag: RequestTag) {
        self.awaiting = Some(tag);
        self.sender.send_replace(true);
    }

    /// Returns true when `tag` was the request the indicator was showing.
    pub fn settle(&mut self, tag: RequestTag) -> bool {
        if self.awaiting != Some(tag) {
            return false;
        }
        self.awaiting = None;
        self.sender.send_replace(false);
        true
    }
}

impl Default for ProgressSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FetchMetricsSnapshot {
    pub issued: u64,
    pub suppressed: u64,
    pub applied: u64,
    pub stale: u64,
    pub failed: u64,
    pub fetch_latency_ms: f32,
}

#[derive(Default)]
pub(crate) struct FetchMetrics {
    issued: u64,
    suppressed: u64,
    applied: u64,
    stale: u64,
    failed: u64,
    fetch_latency_ms: f32,
}

impl FetchMetrics {
    pub(crate) fn record_issued(&mut self) {
        self.issued = self.issued.saturating_add(1);
    }

    pub(crate) fn record_suppressed(&mut self) {
        self.suppressed = self.suppressed.saturating_add(1);
    }

    pub(crate) fn record_stale(&mut self) {
        self.stale = self.stale.saturating_add(1);
    }

    pub(crate) fn record_failed(&mut self) {
        self.failed = self.failed.saturating_add(1);
    }

    pub(crate) fn record_applied(&mut self, elapsed: Duration) {
        self.applied = self.applied.saturating_add(1);
        let latency_ms = elapsed.as_secs_f32() * 1000.0;
        if self.fetch_latency_ms == 0.0 {
            self.fetch_latency_ms = latency_ms;
        } else {
            let alpha = 0.2;
            self.fetch_latency_ms = self.fetch_latency_ms * (1.0 - alpha) + latency_ms * alpha;
        }
    }

    pub(crate) fn snapshot(&self) -> FetchMetricsSnapshot {
        FetchMetricsSnapshot {
            issued: self.issued,
            suppressed: self.suppressed,
            applied: self.applied,
            stale: self.stale,
            failed: self.failed,
            fetch_latency_ms: self.fetch_latency_ms,
        }
    }
}

/// Serves canned documents from memory and records every requested URL.
/// Unknown URLs get the fallback document, or a 404 when none is set.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    documents: HashMap<String, TransportResult<Bytes>>,
    fallback: Option<Bytes>,
    requests: Vec<Url>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(bytes: impl Into<Bytes>) -> Self {
        let transport = Self::new();
        transport.set_fallback(bytes);
        transport
    }

    pub fn set_fallback(&self, bytes: impl Into<Bytes>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fallback = Some(bytes.into());
        }
    }

    pub fn insert(&self, url: &Url, bytes: impl Into<Bytes>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.documents.insert(url.to_string(), Ok(bytes.into()));
        }
    }

    pub fn insert_failure(&self, url: &Url, error: TransportError) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.documents.insert(url.to_string(), Err(error));
        }
    }

    pub fn requests(&self) -> Vec<Url> {
        self.inner
            .lock()
            .map(|inner| inner.requests.clone())
            .unwrap_or_default()
    }
}

impl MeshTransport for MemoryTransport {
    fn label(&self) -> &'static str {
        "Memory Transport"
    }

    fn get(&self, url: &Url) -> TransportFuture {
        let response = match self.inner.lock() {
            Ok(mut inner) => {
                inner.requests.push(url.clone());
                match inner.documents.get(url.as_str()) {
                    Some(stored) => stored.clone(),
                    None => inner.fallback.clone().ok_or(TransportError::Status(404)),
                }
            }
            Err(_) => Err(TransportError::Other("memory transport poisoned".into())),
        };
        async move { response }.boxed()
    }
}
