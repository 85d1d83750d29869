//! HTTP blob store client

use super::BlobStore;
use crate::config::schema::RemoteConfig;
use crate::error::{SyncError, SyncResult};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Handle};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};
use ureq::Agent;

/// Blob store reached over plain HTTP(S)
pub struct HttpBlobStore {
    base_url: String,
    agent: Agent,
    gate: ConnectionGate,
}

impl HttpBlobStore {
    /// Build a client for `base_url` using the connection policy in `remote`
    pub fn new(base_url: &str, remote: &RemoteConfig) -> SyncResult<Self> {
        let base_url = normalize_base_url(base_url)?;

        let config = Agent::config_builder()
            .http_status_as_error(false)
            .user_agent(remote.user_agent.clone())
            .max_redirects(remote.max_redirects)
            .max_idle_connections(remote.max_connections)
            .max_idle_connections_per_host(remote.max_connections_per_route)
            .timeout_global(remote.timeout_secs.map(Duration::from_secs))
            .build();

        // Every request goes to the same host, so the route cap is the effective cap.
        let limit = remote
            .max_connections
            .min(remote.max_connections_per_route)
            .max(1);

        debug!("Blob store at {} (max {} concurrent requests)", base_url, limit);

        Ok(Self {
            base_url,
            agent: config.into(),
            gate: ConnectionGate::new(limit),
        })
    }

    /// Full URL for an address
    pub fn url_for(&self, address: &str) -> String {
        format!("{}{}", self.base_url, address.trim_start_matches('/'))
    }
}

impl BlobStore for HttpBlobStore {
    fn exists(&self, address: &str) -> SyncResult<bool> {
        let url = self.url_for(address);
        debug!("GET {} (probe)", url);

        let _permit = self.gate.acquire()?;
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| SyncError::transport("GET", address, e))?;

        probe_status("GET", address, response.status().as_u16())
    }

    fn upload(&self, address: &str, local: &Path) -> SyncResult<()> {
        debug!("Preparing to upload {} to {}", local.display(), self.base_url);

        if !local.is_file() {
            return Err(SyncError::ArtifactMissing(local.to_path_buf()));
        }

        let file = File::open(local)
            .map_err(|e| SyncError::io(format!("opening {}", local.display()), e))?;
        let length = file
            .metadata()
            .map_err(|e| SyncError::io(format!("reading metadata of {}", local.display()), e))?
            .len();

        let url = self.url_for(address);
        debug!("PUT {}", url);

        let _permit = self.gate.acquire()?;
        let mut response = self
            .agent
            .put(&url)
            .header("Content-Type", "application/octet-stream")
            .header("Content-Length", length.to_string())
            .send(file)
            .map_err(|e| SyncError::transport("PUT", address, e))?;

        let status = response.status().as_u16();
        let answer = response
            .body_mut()
            .read_to_string()
            .map_err(|e| SyncError::transport("PUT", address, e))?;

        if !(200..300).contains(&status) {
            return Err(SyncError::UnexpectedStatus {
                method: "PUT",
                address: address.to_string(),
                status,
            });
        }

        if answer.trim().is_empty() {
            info!("Performed '{}' upload", address);
        } else {
            info!("Performed '{}' upload. Server answered: {}", address, answer.trim());
        }
        Ok(())
    }

    fn fetch_text(&self, address: &str) -> SyncResult<String> {
        let url = self.url_for(address);
        debug!("GET {}", url);

        let _permit = self.gate.acquire()?;
        let mut response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| SyncError::transport("GET", address, e))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(SyncError::UnexpectedStatus {
                method: "GET",
                address: address.to_string(),
                status,
            });
        }

        response
            .body_mut()
            .read_to_string()
            .map_err(|e| SyncError::transport("GET", address, e))
    }

    fn location(&self) -> String {
        self.base_url.clone()
    }
}

/// Map an existence-probe status to found / not found
pub(crate) fn probe_status(method: &'static str, address: &str, status: u16) -> SyncResult<bool> {
    match status {
        200 => Ok(true),
        404 => Ok(false),
        other => Err(SyncError::UnexpectedStatus {
            method,
            address: address.to_string(),
            status: other,
        }),
    }
}

/// Validate the scheme and make sure the URL ends with a slash
pub(crate) fn normalize_base_url(url: &str) -> SyncResult<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(SyncError::ServerUrlMissing);
    }

    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| SyncError::ServerUrlInvalid {
            url: url.to_string(),
            reason: "expected an http:// or https:// URL".to_string(),
        })?;

    if rest.is_empty() || rest.starts_with('/') {
        return Err(SyncError::ServerUrlInvalid {
            url: url.to_string(),
            reason: "missing host".to_string(),
        });
    }

    if url.ends_with('/') {
        Ok(url.to_string())
    } else {
        Ok(format!("{}/", url))
    }
}

/// Caps the number of requests in flight; callers over the cap wait.
///
/// Waiting borrows the current runtime when called from one of its blocking
/// threads, so it must never be called from async code.
struct ConnectionGate {
    permits: Arc<Semaphore>,
}

impl ConnectionGate {
    fn new(limit: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limit)),
        }
    }

    fn acquire(&self) -> SyncResult<OwnedSemaphorePermit> {
        if let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() {
            return Ok(permit);
        }

        let waiting = Arc::clone(&self.permits).acquire_owned();
        let permit = match Handle::try_current() {
            Ok(handle) => handle.block_on(waiting),
            Err(_) => Builder::new_current_thread()
                .build()
                .map_err(|e| SyncError::io("starting connection gate runtime", e))?
                .block_on(waiting),
        };
        permit.map_err(|_| SyncError::Internal("connection gate closed".to_string()))
    }

    fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
