use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use time::OffsetDateTime;

use crate::ports;
use crate::types::push::Subscription;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl ports::TimeProvider for SystemTimeProvider {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Sends push requests over HTTPS with a shared connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl ports::PushTransport for ReqwestTransport {
    type Error = reqwest::Error;
    type Fut<'a>
        = Pin<Box<dyn Future<Output = Result<ports::PushResponse, Self::Error>> + Send + 'a>>
    where
        Self: 'a;

    fn post<'a>(&'a self, request: &'a ports::PushRequest) -> Self::Fut<'a> {
        Box::pin(async move {
            let mut builder = self.client.post(&request.endpoint);
            for (name, value) in &request.headers {
                // reqwest derives the length from the body.
                if name.eq_ignore_ascii_case("content-length") {
                    continue;
                }
                builder = builder.header(*name, value.as_str());
            }
            let response = builder.body(request.body.clone()).send().await?;
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Ok(ports::PushResponse { status, body })
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode subscriptions: {0}")]
    Encode(#[from] serde_json::Error),
}

/// In-memory subscription repository, optionally backed by a JSON file that
/// is rewritten after every delete.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionStore {
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
    path: Option<PathBuf>,
    /// Held from removal until the file is replaced, so deletes reach disk in order.
    persist: Arc<tokio::sync::Mutex<()>>,
}

impl SubscriptionStore {
    pub fn new(subscriptions: Vec<Subscription>) -> Self {
        Self {
            subscriptions: Arc::new(Mutex::new(subscriptions)),
            ..Self::default()
        }
    }

    /// Loads a JSON array of subscriptions. A missing file starts an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let subscriptions = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Ok(Self {
            subscriptions: Arc::new(Mutex::new(subscriptions)),
            path: Some(path.to_path_buf()),
            ..Self::default()
        })
    }

    pub fn snapshot(&self) -> Vec<Subscription> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, endpoints: &[String]) -> Vec<Subscription> {
        let endpoints: HashSet<&str> = endpoints.iter().map(String::as_str).collect();
        let mut subscriptions = self.lock();
        subscriptions.retain(|subscription| !endpoints.contains(subscription.endpoint.as_str()));
        subscriptions.clone()
    }
}

impl ports::SubscriptionRepository for SubscriptionStore {
    type Error = StoreError;
    type QueryFut<'a>
        = std::future::Ready<Result<Vec<Subscription>, Self::Error>>
    where
        Self: 'a;
    type DeleteFut<'a>
        = Pin<Box<dyn Future<Output = Result<(), Self::Error>> + Send + 'a>>
    where
        Self: 'a;

    fn query<'a>(&'a self, recipient_ids: Option<&'a [String]>) -> Self::QueryFut<'a> {
        let subscriptions = self.lock();
        let matching = match recipient_ids {
            Some(recipient_ids) => subscriptions
                .iter()
                .filter(|subscription| recipient_ids.contains(&subscription.owner_id))
                .cloned()
                .collect(),
            None => subscriptions.clone(),
        };
        std::future::ready(Ok(matching))
    }

    fn batch_delete<'a>(&'a self, endpoints: &'a [String]) -> Self::DeleteFut<'a> {
        Box::pin(async move {
            let _persist = self.persist.lock().await;
            let remaining = self.remove(endpoints);
            match self.path.as_ref() {
                Some(path) => write_atomically(path, &remaining).await,
                None => Ok(()),
            }
        })
    }
}

/// Writes next to `path` and renames over it, so readers never see a partial file.
async fn write_atomically(
    path: &Path,
    subscriptions: &[Subscription],
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(subscriptions)?;
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);
    let write_error = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    tokio::fs::write(&staging, bytes).await.map_err(write_error)?;
    tokio::fs::rename(&staging, path).await.map_err(write_error)
}
