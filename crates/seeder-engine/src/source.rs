//! Spec sources and the controller loop
//!
//! A source yields a new event whenever the desired state changes. The
//! controller runs one reconciliation per event until cancelled; events
//! that arrive while a run is in progress collapse into the latest one.

use crate::engine::Engine;
use crate::error::Result;
use async_trait::async_trait;
use seeder_cloud::Report;
use seeder_spec::{SpecDocument, load_spec};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A new desired state
#[derive(Debug, Clone)]
pub struct SpecEvent {
    /// Opaque version tag; equal tags carry equal documents
    pub version: String,
    pub document: SpecDocument,
}

#[async_trait]
pub trait SpecSource: Send {
    /// Wait for the next version; `None` once the source is exhausted or
    /// `cancel` fires
    async fn next(&mut self, cancel: &CancellationToken) -> Option<SpecEvent>;
}

/// Polls a spec file and emits when its content hash changes
///
/// Files that fail to read or load are logged and skipped; the last good
/// version stays current.
pub struct FileSpecSource {
    path: PathBuf,
    interval: Duration,
    last: Option<String>,
    first: bool,
}

impl FileSpecSource {
    pub fn new(path: impl AsRef<Path>, interval: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            interval,
            last: None,
            first: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn poll(&mut self) -> Option<SpecEvent> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cannot read spec file");
                return None;
            }
        };
        let version = content_version(&bytes);
        if self.last.as_deref() == Some(version.as_str()) {
            debug!(version = %version, "Spec unchanged");
            return None;
        }
        match load_spec(&bytes) {
            Ok(document) => {
                self.last = Some(version.clone());
                Some(SpecEvent { version, document })
            }
            Err(e) => {
                // Remember the broken content so it is reported once per edit
                self.last = Some(version);
                warn!(path = %self.path.display(), error = %e, "Ignoring invalid spec");
                None
            }
        }
    }
}

#[async_trait]
impl SpecSource for FileSpecSource {
    async fn next(&mut self, cancel: &CancellationToken) -> Option<SpecEvent> {
        loop {
            if self.first {
                self.first = false;
            } else {
                tokio::select! {
                    _ = cancel.cancelled() => return None,
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
            if cancel.is_cancelled() {
                return None;
            }
            if let Some(event) = self.poll() {
                return Some(event);
            }
        }
    }
}

fn content_version(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Drives one reconciliation per new spec version
pub struct Controller<S> {
    engine: Engine,
    source: S,
}

impl<S: SpecSource> Controller<S> {
    pub fn new(engine: Engine, source: S) -> Self {
        Self { engine, source }
    }

    /// Run until `cancel` fires or the source ends
    ///
    /// Each finished run is handed to `on_report` with the version it
    /// converged toward. A run that cannot start (authentication, cycle) is
    /// logged and the controller waits for the next version.
    pub async fn run<F>(mut self, cancel: CancellationToken, mut on_report: F) -> Result<()>
    where
        F: FnMut(&str, &Report) + Send,
    {
        while let Some(event) = self.source.next(&cancel).await {
            info!(version = %event.version, "Reconciling new spec version");
            match self.engine.reconcile(&cancel, &event.document).await {
                Ok(report) => on_report(&event.version, &report),
                Err(e) => error!(version = %event.version, error = %e, "Run did not start"),
            }
            if cancel.is_cancelled() {
                break;
            }
        }
        info!("Controller stopped");
        Ok(())
    }
}
