//! End-to-end update cycle.
//!
//! Load settings, fetch the manifest, resolve the applicable queue, then for
//! each package in order: download, verify, record the new version. Packages
//! are applied strictly one after another; the version record is persisted
//! after every package so an interrupted run leaves exactly the applied
//! updates on record.
//!
//! Failures before the queue starts (settings, manifest) fail the cycle.
//! A failure while applying a package ends the queue at that package and is
//! reported in the [`CycleReport`]; earlier packages stay applied.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::mpsc::UnboundedSender;

use crate::checksum::{self, Verification};
use crate::error::UpdateError;
use crate::filename;
use crate::manifest::{self, UpdateDescriptor};
use crate::resolver;
use crate::settings::{ApplicationSettings, SettingsStore};
use crate::transport::{run_blocking, CancelToken, ProgressEvent, Transport};

/// Notification sent to the front end while a cycle runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    /// Queue computed; `count` packages will be attempted.
    Resolved { count: usize },
    /// Package `index` (1-based) of `count` is starting.
    Started {
        index: usize,
        count: usize,
        version: u32,
    },
    Progress {
        version: u32,
        progress: ProgressEvent,
    },
    Applied { version: u32, path: PathBuf },
    /// Package failed; no further packages will be attempted.
    Failed { version: u32, reason: String },
}

/// What happened to one package of the queue.
#[derive(Debug)]
pub enum UpdateOutcome {
    Applied { version: u32, path: PathBuf },
    Failed { version: u32, error: UpdateError },
}

/// Result of a cycle that got as far as processing the queue.
#[derive(Debug)]
pub struct CycleReport {
    /// One entry per attempted package, in order. At most the last one is `Failed`.
    pub outcomes: Vec<UpdateOutcome>,
    /// Settings as persisted at the end of the cycle.
    pub settings: ApplicationSettings,
}

impl CycleReport {
    pub fn applied_versions(&self) -> Vec<u32> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                UpdateOutcome::Applied { version, .. } => Some(*version),
                UpdateOutcome::Failed { .. } => None,
            })
            .collect()
    }

    /// The error that stopped the queue, if any.
    pub fn failure(&self) -> Option<(u32, &UpdateError)> {
        self.outcomes.iter().find_map(|o| match o {
            UpdateOutcome::Failed { version, error } => Some((*version, error)),
            UpdateOutcome::Applied { .. } => None,
        })
    }

    pub fn is_success(&self) -> bool {
        self.failure().is_none()
    }
}

/// Allows one active cycle per lock. Orchestrators share the process-wide
/// lock unless given their own.
#[derive(Debug, Default)]
pub struct CycleLock(AtomicBool);

impl CycleLock {
    pub fn process() -> Arc<CycleLock> {
        static PROCESS: OnceLock<Arc<CycleLock>> = OnceLock::new();
        Arc::clone(PROCESS.get_or_init(|| Arc::new(CycleLock::default())))
    }

    /// Take the lock, or fail with [`UpdateError::AlreadyRunning`].
    pub fn try_acquire(self: &Arc<Self>) -> Result<CycleGuard, UpdateError> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| UpdateError::AlreadyRunning)?;
        Ok(CycleGuard(Arc::clone(self)))
    }
}

/// Releases the cycle lock when dropped.
#[derive(Debug)]
pub struct CycleGuard(Arc<CycleLock>);

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.0 .0.store(false, Ordering::Release);
    }
}

/// Runs update cycles against one settings file.
pub struct Orchestrator<T: Transport> {
    transport: Arc<T>,
    store: SettingsStore,
    cancel: CancelToken,
    lock: Arc<CycleLock>,
}

impl<T: Transport + 'static> Orchestrator<T> {
    pub fn new(transport: T, store: SettingsStore) -> Self {
        Self {
            transport: Arc::new(transport),
            store,
            cancel: CancelToken::new(),
            lock: CycleLock::process(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_cycle_lock(mut self, lock: Arc<CycleLock>) -> Self {
        self.lock = lock;
        self
    }

    /// Token that stops the running download when raised.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    /// Load settings, fetch the manifest and resolve it, without downloading.
    pub async fn pending_updates(
        &self,
    ) -> Result<(ApplicationSettings, Vec<UpdateDescriptor>), UpdateError> {
        let settings = self.load_settings().await?;
        let manifest =
            manifest::fetch(Arc::clone(&self.transport), &settings.update_server_address, &self.cancel)
                .await?;
        let queue = resolver::resolve(&manifest, settings.current_version);
        Ok((settings, queue))
    }

    /// Run one full update cycle.
    ///
    /// `Err` means the cycle failed before any package was attempted (settings,
    /// manifest, or another cycle already running). Per-package failures are
    /// in the returned report.
    pub async fn run_update_cycle(
        &self,
        events: Option<&UnboundedSender<UpdateEvent>>,
    ) -> Result<CycleReport, UpdateError> {
        let _guard = self.lock.try_acquire()?;

        let (mut settings, queue) = self.pending_updates().await?;
        tracing::info!(
            current_version = settings.current_version,
            pending = queue.len(),
            "update queue resolved"
        );
        emit(events, UpdateEvent::Resolved { count: queue.len() });

        let count = queue.len();
        let mut outcomes = Vec::with_capacity(count);
        for (i, descriptor) in queue.iter().enumerate() {
            let version = descriptor.version;
            emit(
                events,
                UpdateEvent::Started {
                    index: i + 1,
                    count,
                    version,
                },
            );
            match self.apply(descriptor, &mut settings, events).await {
                Ok(path) => {
                    tracing::info!(version, path = %path.display(), "update applied");
                    emit(
                        events,
                        UpdateEvent::Applied {
                            version,
                            path: path.clone(),
                        },
                    );
                    outcomes.push(UpdateOutcome::Applied { version, path });
                }
                Err(error) => {
                    tracing::warn!(version, "update failed, stopping queue: {}", error);
                    emit(
                        events,
                        UpdateEvent::Failed {
                            version,
                            reason: error.to_string(),
                        },
                    );
                    outcomes.push(UpdateOutcome::Failed { version, error });
                    break;
                }
            }
        }

        Ok(CycleReport { outcomes, settings })
    }

    async fn load_settings(&self) -> Result<ApplicationSettings, UpdateError> {
        let store = self.store.clone();
        run_blocking(move || store.load()).await
    }

    /// Download, verify and record one package. `settings` only changes once
    /// the new version is on disk.
    async fn apply(
        &self,
        descriptor: &UpdateDescriptor,
        settings: &mut ApplicationSettings,
        events: Option<&UnboundedSender<UpdateEvent>>,
    ) -> Result<PathBuf, UpdateError> {
        let install_dir = self.store.resolve(&settings.update_install_path);
        tokio::fs::create_dir_all(&install_dir)
            .await
            .map_err(|e| UpdateError::io("create install dir", &install_dir, e))?;

        let dest = install_dir.join(self.destination_name(&descriptor.file_address).await?);

        let transport = Arc::clone(&self.transport);
        let url = descriptor.file_address.clone();
        let target = dest.clone();
        let cancel = self.cancel.clone();
        let progress_tx = events.cloned();
        let version = descriptor.version;
        let downloaded = run_blocking(move || {
            let mut forward = |progress: ProgressEvent| {
                if let Some(tx) = &progress_tx {
                    let _ = tx.send(UpdateEvent::Progress { version, progress });
                }
            };
            transport.download(&url, &target, &cancel, &mut forward)
        })
        .await;
        if let Err(e) = downloaded {
            discard(&dest).await;
            return Err(e);
        }

        let expected = descriptor.clone();
        let target = dest.clone();
        match run_blocking(move || checksum::check(&expected, &target)).await {
            Ok(Verification::Mismatch { expected, actual }) => {
                tracing::warn!(version, %expected, %actual, "package hash mismatch");
                discard(&dest).await;
                return Err(UpdateError::Integrity {
                    path: dest,
                    expected,
                    actual,
                });
            }
            Ok(Verification::Skipped) => {
                tracing::debug!(version, "no digest in manifest, accepting package");
            }
            Ok(Verification::Matched) => {}
            Err(e) => {
                discard(&dest).await;
                return Err(e);
            }
        }

        let mut next = settings.clone();
        if version < next.current_version {
            tracing::warn!(
                version,
                current_version = next.current_version,
                "package version is below the installed version; keeping installed version"
            );
        }
        next.current_version = next.current_version.max(version);
        let store = self.store.clone();
        let snapshot = next.clone();
        run_blocking(move || store.persist(&snapshot)).await?;
        *settings = next;

        Ok(dest)
    }

    /// File name from the server's `Content-Disposition`, else from the URL.
    async fn destination_name(&self, url: &str) -> Result<String, UpdateError> {
        let transport = Arc::clone(&self.transport);
        let owned = url.to_string();
        let cancel = self.cancel.clone();
        let disposition = match run_blocking(move || transport.content_disposition(&owned, &cancel)).await {
            Ok(d) => d,
            Err(UpdateError::Cancelled) => return Err(UpdateError::Cancelled),
            Err(e) => {
                tracing::debug!(url, "filename probe failed, using URL: {}", e);
                None
            }
        };
        Ok(filename::derive_filename(url, disposition.as_deref()))
    }
}

fn emit(events: Option<&UnboundedSender<UpdateEvent>>, event: UpdateEvent) {
    if let Some(tx) = events {
        // A front end that stopped listening does not stop the cycle.
        let _ = tx.send(event);
    }
}

/// Remove a partial or rejected download.
async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "could not remove download: {}", e),
    }
}
