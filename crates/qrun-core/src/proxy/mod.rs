//! Resource cache proxy.
//!
//! Decides, for each library resource request, whether to serve a local
//! override, a cached file, wait for an in-flight download, or download the
//! resource while streaming it to the requester and to disk at the same time.
//!
//! # Decision order
//!
//! 1. Local override root (`libs`) when the file exists there
//! 2. Caching disabled: pass the upstream response through
//! 3. Uncachable path: not found, no network access
//! 4. Download in flight: wait for it, then re-evaluate from 3
//! 5. Cached file on disk: serve it
//! 6. Otherwise download, tee to the client and the cache file
//!
//! All paths are keyed by their normalized form (query string and fragment
//! stripped, percent-decoded); the same key names the cache file, the
//! in-flight record and the uncachable record.

pub mod origin;
pub mod registry;
pub mod upstream;

use crate::error::{ProxyError, Result};
use crate::job::JobConfig;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use origin::Origin;
use registry::{CacheRegistry, Lookup, Registration, Settled};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use upstream::{ByteStream, HttpUpstream, Upstream, UpstreamResponse};

pub use origin::{normalize, override_path, resource_path};
pub use registry::EntryStatus;

/// Number of chunks buffered between the download task and the client.
const CLIENT_BUFFER: usize = 16;

/// Body streamed back to the requesting client.
pub type BodyStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Response streamed from the upstream origin.
pub struct StreamedResource {
    /// HTTP status to answer with
    pub status: u16,
    /// Content type reported by the origin
    pub content_type: Option<String>,
    /// Body chunks
    pub body: BodyStream,
}

impl fmt::Debug for StreamedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamedResource")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// How a request must be answered.
#[derive(Debug)]
pub enum Decision {
    /// Not a library resource; let the next route handle it
    Pass,
    /// Serve this file byte-for-byte
    Serve(PathBuf),
    /// Stream this upstream response
    Stream(StreamedResource),
    /// Answer 404
    NotFound,
}

/// Proxy settings derived once at startup.
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    /// Cache root for the configured origin; `None` disables caching
    pub cache_root: Option<PathBuf>,
    /// Local library override root
    pub libs: Option<PathBuf>,
}

impl ProxyConfig {
    /// Derives the proxy settings from a job configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOrigin` if the upstream URL cannot be parsed.
    pub fn from_job(config: &JobConfig) -> Result<(Self, Origin)> {
        let origin = Origin::parse(&config.ui5)?;
        let cache_root = config
            .cache
            .as_deref()
            .map(|cache| origin.cache_root(&config.resolve(cache)));
        let libs = config.libs.as_deref().map(|libs| config.resolve(libs));
        Ok((Self { cache_root, libs }, origin))
    }
}

/// Counters describing what the proxy did.
#[derive(Debug, Default)]
pub struct ProxyStats {
    override_hits: AtomicU64,
    cache_hits: AtomicU64,
    coalesced: AtomicU64,
    uncachable_rejections: AtomicU64,
    upstream_fetches: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of [`ProxyStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProxyStatsSnapshot {
    /// Requests served from the local override root
    pub override_hits: u64,
    /// Requests served from the cache directory
    pub cache_hits: u64,
    /// Requests that waited on another request's download
    pub coalesced: u64,
    /// Requests answered 404 because the path is uncachable
    pub uncachable_rejections: u64,
    /// Upstream fetches started
    pub upstream_fetches: u64,
    /// Downloads that failed
    pub failures: u64,
}

impl ProxyStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> ProxyStatsSnapshot {
        ProxyStatsSnapshot {
            override_hits: self.override_hits.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            uncachable_rejections: self.uncachable_rejections.load(Ordering::Relaxed),
            upstream_fetches: self.upstream_fetches.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Cache-or-fetch decision layer, one instance per run.
pub struct ResourceProxy {
    config: ProxyConfig,
    upstream: Arc<dyn Upstream>,
    registry: Arc<CacheRegistry>,
    stats: Arc<ProxyStats>,
}

impl fmt::Debug for ResourceProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceProxy")
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

impl ResourceProxy {
    /// Creates a proxy with an explicit upstream.
    pub fn new(config: ProxyConfig, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            config,
            upstream,
            registry: Arc::new(CacheRegistry::new()),
            stats: Arc::new(ProxyStats::default()),
        }
    }

    /// Creates a proxy for a job, fetching from its configured origin.
    ///
    /// # Errors
    ///
    /// Returns an error if the origin URL is invalid or the HTTP client
    /// cannot be built.
    pub fn from_job(config: &JobConfig) -> Result<Self> {
        let (proxy_config, origin) = ProxyConfig::from_job(config)?;
        info!(
            origin = %config.ui5,
            cache = ?proxy_config.cache_root,
            libs = ?proxy_config.libs,
            "Resource proxy configured"
        );
        let upstream = HttpUpstream::new(origin)?;
        Ok(Self::new(proxy_config, Arc::new(upstream)))
    }

    /// Proxy settings.
    #[must_use]
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// State of a normalized path, if recorded.
    #[must_use]
    pub fn entry_status(&self, key: &str) -> Option<EntryStatus> {
        self.registry.status(key)
    }

    /// Counters describing the proxy's activity so far.
    #[must_use]
    pub fn stats(&self) -> ProxyStatsSnapshot {
        self.stats.snapshot()
    }

    /// Decides how to answer a request for `path_and_query`.
    ///
    /// Proxy failures never escape: they are logged and answered with
    /// [`Decision::NotFound`].
    pub async fn handle(&self, path_and_query: &str) -> Decision {
        let Some(resource) = resource_path(path_and_query) else {
            return Decision::Pass;
        };

        if let Some(file) = self.local_override(path_and_query).await {
            ProxyStats::bump(&self.stats.override_hits);
            return Decision::Serve(file);
        }

        let Some(cache_root) = self.config.cache_root.as_deref() else {
            return self.pass_through(resource).await;
        };

        let Some(key) = normalize(resource) else {
            debug!(path = resource, "Resource path cannot be cached, proxying");
            return self.pass_through(resource).await;
        };

        let file = cache_root.join(&key);

        loop {
            match self.registry.lookup(&key) {
                Lookup::Uncachable => {
                    ProxyStats::bump(&self.stats.uncachable_rejections);
                    return Decision::NotFound;
                }
                Lookup::InFlight(mut rx) => {
                    ProxyStats::bump(&self.stats.coalesced);
                    // Closed means the owner vanished; the entry is settled either way
                    let _ = rx.recv().await;
                }
                Lookup::Cached => {
                    if is_file(&file).await {
                        ProxyStats::bump(&self.stats.cache_hits);
                        return Decision::Serve(file);
                    }
                    warn!(path = %key, "Cached file disappeared, downloading again");
                    self.registry.forget_cached(&key);
                }
                Lookup::Unknown => {
                    if is_file(&file).await {
                        ProxyStats::bump(&self.stats.cache_hits);
                        return Decision::Serve(file);
                    }
                    match self.registry.begin(&key) {
                        Registration::Owner(guard) => {
                            return self.populate(guard, resource, file).await;
                        }
                        Registration::Waiter(mut rx) => {
                            ProxyStats::bump(&self.stats.coalesced);
                            let _ = rx.recv().await;
                        }
                        Registration::Settled => {}
                    }
                }
            }
        }
    }

    /// Answers a request that must not populate the cache, such as `HEAD`.
    ///
    /// Local overrides and complete cache files are still served; anything
    /// else goes straight to the origin without touching the cache registry.
    pub async fn forward(&self, path_and_query: &str) -> Decision {
        let Some(resource) = resource_path(path_and_query) else {
            return Decision::Pass;
        };

        if let Some(file) = self.local_override(path_and_query).await {
            ProxyStats::bump(&self.stats.override_hits);
            return Decision::Serve(file);
        }

        let cached = self
            .config
            .cache_root
            .as_deref()
            .zip(normalize(resource))
            .map(|(cache_root, key)| cache_root.join(key));
        if let Some(file) = cached {
            if is_file(&file).await {
                ProxyStats::bump(&self.stats.cache_hits);
                return Decision::Serve(file);
            }
        }

        self.pass_through(resource).await
    }

    async fn local_override(&self, path_and_query: &str) -> Option<PathBuf> {
        let libs = self.config.libs.as_deref()?;
        let relative = override_path(path_and_query)?;
        let file = libs.join(relative);
        is_file(&file).await.then_some(file)
    }

    async fn pass_through(&self, resource: &str) -> Decision {
        ProxyStats::bump(&self.stats.upstream_fetches);
        match self.upstream.fetch(resource).await {
            Ok(response) => Decision::Stream(StreamedResource {
                status: response.status,
                content_type: response.content_type,
                body: response.body.map(|chunk| chunk.map_err(std::io::Error::other)).boxed(),
            }),
            Err(e) => {
                ProxyStats::bump(&self.stats.failures);
                warn!(path = resource, error = %e, "Unable to proxy resource");
                Decision::NotFound
            }
        }
    }

    /// Downloads `resource` into `file` while streaming it to the caller.
    ///
    /// Bytes land in a `.part` sibling that is renamed onto `file` once the
    /// body is complete, so `file` only ever exists with its full content.
    async fn populate(
        &self,
        guard: registry::InFlightGuard,
        resource: &str,
        file: PathBuf,
    ) -> Decision {
        ProxyStats::bump(&self.stats.upstream_fetches);
        let part = partial_path(&file);

        let (out, response) = match self.open_download(resource, &part).await {
            Ok(started) => started,
            Err(e) => {
                self.fail(guard, &part, &e).await;
                return Decision::NotFound;
            }
        };

        let UpstreamResponse {
            status,
            content_type,
            body,
        } = response;

        let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
        let stats = Arc::clone(&self.stats);
        let resource = resource.to_string();

        tokio::spawn(async move {
            let cached = match tee(body, out, &tx, &resource, &file).await {
                Ok(bytes) => commit(&part, &file, &resource).await.map(|()| bytes),
                Err(e) => Err(e),
            };
            match cached {
                Ok(bytes) => {
                    debug!(path = %guard.key(), bytes, "Resource cached");
                    guard.settle(Settled::Cached);
                }
                Err(e) => {
                    // Abort the client body so it does not look complete
                    let _ = tx.send(Err(std::io::Error::other(e.to_string()))).await;
                    ProxyStats::bump(&stats.failures);
                    discard(&part).await;
                    warn!(path = %guard.key(), status, error = %e, "Unable to cache resource");
                    guard.settle(Settled::Uncachable);
                }
            }
        });

        Decision::Stream(StreamedResource {
            status,
            content_type,
            body: ReceiverStream::new(rx).boxed(),
        })
    }

    /// Creates the partial file, opens it and starts the upstream fetch.
    async fn open_download(
        &self,
        resource: &str,
        part: &Path,
    ) -> Result<(fs::File, UpstreamResponse)> {
        let write_error = |source| ProxyError::CacheWrite {
            path: resource.to_string(),
            source,
        };

        if let Some(folder) = part.parent() {
            fs::create_dir_all(folder).await.map_err(write_error)?;
        }
        // Truncates leftovers of a download that was interrupted earlier
        let out = fs::File::create(part).await.map_err(write_error)?;

        let response = self.upstream.fetch(resource).await?;
        if !response.is_success() {
            return Err(ProxyError::UpstreamStatus {
                path: resource.to_string(),
                status: response.status,
            });
        }

        Ok((out, response))
    }

    async fn fail(&self, guard: registry::InFlightGuard, part: &Path, error: &ProxyError) {
        ProxyStats::bump(&self.stats.failures);
        discard(part).await;
        warn!(path = %guard.key(), error = %error, "Unable to cache resource");
        guard.settle(Settled::Uncachable);
    }
}

/// Path the download is written to before it is complete.
fn partial_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Moves a complete download onto its cache path.
async fn commit(part: &Path, file: &Path, resource: &str) -> Result<()> {
    fs::rename(part, file)
        .await
        .map_err(|source| ProxyError::CacheWrite {
            path: resource.to_string(),
            source,
        })
}

/// Copies `body` into `out`, forwarding every chunk to the client while it
/// is still listening. Returns the number of bytes written.
async fn tee(
    mut body: ByteStream,
    mut out: fs::File,
    client: &mpsc::Sender<std::io::Result<Bytes>>,
    resource: &str,
    file: &Path,
) -> Result<u64> {
    let mut client_open = true;
    let mut written = 0u64;
    let write_error = |source| ProxyError::CacheWrite {
        path: resource.to_string(),
        source,
    };

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        out.write_all(&chunk).await.map_err(write_error)?;
        written += chunk.len() as u64;

        if client_open && client.send(Ok(chunk)).await.is_err() {
            debug!(path = %file.display(), "Client went away, finishing download for the cache");
            client_open = false;
        }
    }

    out.flush().await.map_err(write_error)?;
    Ok(written)
}

async fn discard(file: &Path) {
    if let Err(e) = fs::remove_file(file).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %file.display(), error = %e, "Failed to remove partial cache file");
        }
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|meta| meta.is_file())
}
