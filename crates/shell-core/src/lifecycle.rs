//! Install / activate lifecycle of a versioned store
//!
//! A version moves through `Uninstalled → Installing → Installed → Active`,
//! and later `Evicting → Gone` once a newer version activates. A failed
//! install ends in `Redundant`; the previously active store, if any, keeps
//! serving. A store of the same version written by an earlier run is kept
//! and served when its refresh fails.
//!
//! Phases never overlap: install finishes (or fails) before activation
//! starts, and the host only starts serving after activation.

use chrono::{DateTime, Utc};
use futures::future::{join_all, try_join_all};
use http::StatusCode;
use parking_lot::RwLock;
use serde::Serialize;
use shell_proxy::{Fetcher, NetworkRequest};
use shell_storage::CachedResponse;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::cache::{CacheManager, MatchOptions};
use crate::error::CoreError;
use crate::manifest::Manifest;
use crate::response::to_cached;
use crate::version::{StoreHandle, VersionTag};

/// Lifecycle state of one version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionState {
    Uninstalled,
    Installing,
    /// Installed and waiting for activation
    Installed,
    Active,
    Evicting,
    Gone,
    /// Install failed; this version never serves
    Redundant,
}

impl VersionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionState::Uninstalled => "uninstalled",
            VersionState::Installing => "installing",
            VersionState::Installed => "installed",
            VersionState::Active => "active",
            VersionState::Evicting => "evicting",
            VersionState::Gone => "gone",
            VersionState::Redundant => "redundant",
        }
    }
}

/// Snapshot of the controller for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleStatus {
    pub version: VersionTag,
    pub handle: StoreHandle,
    pub state: VersionState,
    pub active: Option<StoreHandle>,
    pub versions: BTreeMap<VersionTag, VersionState>,
    pub last_error: Option<String>,
    pub activated_at: Option<DateTime<Utc>>,
}

/// Drives store population and eviction for the current version
pub struct LifecycleController {
    cache: Arc<CacheManager>,
    manifest: Arc<Manifest>,
    network: Arc<dyn Fetcher>,
    scope: Url,
    handle: StoreHandle,
    options: MatchOptions,
    state: watch::Sender<VersionState>,
    versions: RwLock<BTreeMap<VersionTag, VersionState>>,
    active: RwLock<Option<StoreHandle>>,
    last_error: RwLock<Option<String>>,
    activated_at: RwLock<Option<DateTime<Utc>>>,
    phase: Mutex<()>,
}

impl LifecycleController {
    /// Create a controller for `version`. Precache paths are resolved
    /// against `scope`, the public origin of the shell.
    pub fn new(
        cache: Arc<CacheManager>,
        manifest: Arc<Manifest>,
        network: Arc<dyn Fetcher>,
        scope: Url,
        version: VersionTag,
        options: MatchOptions,
    ) -> Self {
        let handle = StoreHandle::new(cache.namespace().clone(), version.clone());
        let (state, _) = watch::channel(VersionState::Uninstalled);

        let mut versions = BTreeMap::new();
        versions.insert(version, VersionState::Uninstalled);

        Self {
            cache,
            manifest,
            network,
            scope,
            handle,
            options,
            state,
            versions: RwLock::new(versions),
            active: RwLock::new(None),
            last_error: RwLock::new(None),
            activated_at: RwLock::new(None),
            phase: Mutex::new(()),
        }
    }

    /// Handle of the version this controller installs
    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    /// State of the current version
    pub fn state(&self) -> VersionState {
        *self.state.borrow()
    }

    /// Store that interceptions read from, if any version is active
    pub fn active_handle(&self) -> Option<StoreHandle> {
        self.active.read().clone()
    }

    pub fn status(&self) -> LifecycleStatus {
        LifecycleStatus {
            version: self.handle.version().clone(),
            handle: self.handle.clone(),
            state: self.state(),
            active: self.active_handle(),
            versions: self.versions.read().clone(),
            last_error: self.last_error.read().clone(),
            activated_at: *self.activated_at.read(),
        }
    }

    /// Wait until the controller settles, returning the active store
    pub async fn ready(&self) -> Option<StoreHandle> {
        let mut rx = self.state.subscribe();
        let _ = rx
            .wait_for(|s| matches!(s, VersionState::Active | VersionState::Redundant))
            .await;
        self.active_handle()
    }

    /// Install, then activate without waiting.
    ///
    /// When install fails and no store is active yet, a store left by a
    /// previous version is adopted so that version keeps serving. The
    /// install error is still returned.
    pub async fn run(&self) -> Result<Vec<StoreHandle>, CoreError> {
        let _phase = self.phase.lock().await;

        if let Err(e) = self.install_locked().await {
            self.adopt_previous().await;
            return Err(e);
        }

        self.activate_locked().await
    }

    /// Populate the store of the current version from the manifest
    pub async fn install(&self) -> Result<(), CoreError> {
        let _phase = self.phase.lock().await;
        self.install_locked().await
    }

    /// Evict every other version and start serving the current one.
    /// Returns the evicted handles.
    pub async fn activate(&self) -> Result<Vec<StoreHandle>, CoreError> {
        let _phase = self.phase.lock().await;
        self.activate_locked().await
    }

    async fn install_locked(&self) -> Result<(), CoreError> {
        info!(
            "Installing {} ({} required, {} optional assets)",
            self.handle,
            self.manifest.precache_list().len(),
            self.manifest.optional_list().len()
        );
        // A store of this version left by an earlier run is complete: failed
        // installs never leave one behind
        let existed = self.cache.exists(&self.handle).await;
        if let Err(e) = &existed {
            warn!("Unable to check for an existing store {}: {}", self.handle, e);
        }
        self.set_state(VersionState::Installing);

        match self.populate().await {
            Ok(()) => {
                info!("Installed {}", self.handle);
                metrics::counter!("shell_cache_installs_total", "result" => "success").increment(1);
                self.set_state(VersionState::Installed);
                Ok(())
            }
            Err(e) => {
                let serving = self.active_handle().as_ref() == Some(&self.handle);
                let keep_serving = serving || matches!(existed, Ok(true));

                // Only drop a store this attempt is known to have created
                match existed {
                    Ok(true) if !serving => {
                        warn!("Install failed, continuing to serve existing {}", self.handle);
                        *self.active.write() = Some(self.handle.clone());
                    }
                    Ok(false) if !serving => match self.cache.delete(&self.handle).await {
                        Ok(_) => debug!("Removed partial store {}", self.handle),
                        Err(de) => warn!("Failed to remove partial store {}: {}", self.handle, de),
                    },
                    _ => {}
                }

                let err = CoreError::InstallFailed {
                    version: self.handle.version().to_string(),
                    reason: e.to_string(),
                };
                error!("{}", err);
                metrics::counter!("shell_cache_installs_total", "result" => "failure").increment(1);
                *self.last_error.write() = Some(err.to_string());

                self.set_state(if keep_serving {
                    VersionState::Active
                } else {
                    VersionState::Redundant
                });
                Err(err)
            }
        }
    }

    async fn populate(&self) -> Result<(), CoreError> {
        self.cache.open(&self.handle).await?;

        // Required assets: fetch everything first, write only if all succeeded
        let required = try_join_all(
            self.manifest
                .precache_list()
                .iter()
                .map(|path| self.fetch_asset(path)),
        )
        .await?;

        for (path, response) in &required {
            self.cache
                .put(&self.handle, "GET", path, response, self.options)
                .await
                .map_err(|e| CoreError::Precache {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
        }

        // Optional assets: each one independently, failures only logged
        let optional = join_all(
            self.manifest
                .optional_list()
                .iter()
                .map(|path| self.fetch_asset(path)),
        )
        .await;

        let mut cached = 0usize;
        for result in optional {
            match result {
                Ok((path, response)) => {
                    match self
                        .cache
                        .put(&self.handle, "GET", &path, &response, self.options)
                        .await
                    {
                        Ok(()) => cached += 1,
                        Err(e) => warn!("Skipping optional asset {}: {}", path, e),
                    }
                }
                Err(e) => warn!("Skipping optional asset: {}", e),
            }
        }

        debug!(
            "Cached {} required and {}/{} optional assets",
            required.len(),
            cached,
            self.manifest.optional_list().len()
        );
        Ok(())
    }

    async fn fetch_asset(&self, path: &str) -> Result<(String, CachedResponse), CoreError> {
        let precache_error = |reason: String| CoreError::Precache {
            path: path.to_string(),
            reason,
        };

        let url = self
            .scope
            .join(path)
            .map_err(|e| precache_error(e.to_string()))?;

        let response = self
            .network
            .fetch(&NetworkRequest::get(url))
            .await
            .map_err(|e| precache_error(e.to_string()))?;

        if response.status != StatusCode::OK {
            return Err(precache_error(format!("status {}", response.status)));
        }

        Ok((path.to_string(), to_cached(&response)))
    }

    async fn activate_locked(&self) -> Result<Vec<StoreHandle>, CoreError> {
        let state = self.state();
        if state != VersionState::Installed {
            return Err(CoreError::InvalidState {
                operation: "activate",
                state: state.as_str(),
            });
        }

        let mut evicted = Vec::new();
        for handle in self.cache.list_handles().await? {
            if handle.version() == self.handle.version() {
                continue;
            }

            info!("Evicting stale store {}", handle);
            self.set_version_state(handle.version(), VersionState::Evicting);
            self.cache.delete(&handle).await?;
            self.set_version_state(handle.version(), VersionState::Gone);
            metrics::counter!("shell_cache_evicted_stores_total").increment(1);
            evicted.push(handle);
        }

        // Claim: every interception from here on reads the new store
        *self.active.write() = Some(self.handle.clone());
        *self.activated_at.write() = Some(Utc::now());
        *self.last_error.write() = None;
        self.set_state(VersionState::Active);

        info!("Activated {} (evicted {} stale stores)", self.handle, evicted.len());
        Ok(evicted)
    }

    async fn adopt_previous(&self) {
        if self.active_handle().is_some() {
            return;
        }

        let previous: Vec<StoreHandle> = match self.cache.list_handles().await {
            Ok(handles) => handles.into_iter().filter(|h| h != &self.handle).collect(),
            Err(e) => {
                warn!("Unable to look for a previous version: {}", e);
                return;
            }
        };

        if previous.len() > 1 {
            warn!(
                "Found {} stores of previous versions, adopting the last one",
                previous.len()
            );
        }

        if let Some(handle) = previous.into_iter().last() {
            warn!("Install failed, continuing to serve {}", handle);
            self.set_version_state(handle.version(), VersionState::Active);
            *self.active.write() = Some(handle);
        }
    }

    fn set_state(&self, state: VersionState) {
        debug!("{} -> {}", self.handle, state.as_str());
        self.set_version_state(self.handle.version(), state);
        self.state.send_replace(state);
    }

    fn set_version_state(&self, version: &VersionTag, state: VersionState) {
        self.versions.write().insert(version.clone(), state);
    }
}
