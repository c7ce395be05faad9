//! Memoized segmentation sessions keyed by model name

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::segmentation::models;
use crate::segmentation::session::{SegmentationSession, SessionFactory};

/// Snapshot of the cache for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub loaded: Vec<String>,
    pub failed: BTreeMap<String, String>,
    pub default_model: Option<String>,
}

/// Process-wide session cache.
///
/// A session is built at most once per model name and then shared by every request.
/// Builds of the same model are serialized so two requests for a cold model do not
/// download it twice. Builds of different models proceed independently.
pub struct SessionCache {
    factory: Arc<dyn SessionFactory>,
    /// Order in which `get_default` tries models
    preference: Vec<String>,
    sessions: DashMap<String, Arc<dyn SegmentationSession>>,
    failed: DashMap<String, String>,
    default_model: RwLock<Option<String>>,
    build_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionCache {
    pub fn new(factory: Arc<dyn SessionFactory>, preference: Vec<String>) -> Self {
        Self {
            factory,
            preference,
            sessions: DashMap::new(),
            failed: DashMap::new(),
            default_model: RwLock::new(None),
            build_locks: DashMap::new(),
        }
    }

    fn canonical(name: &str) -> Result<String> {
        models::lookup(name)
            .map(|spec| spec.name.to_string())
            .ok_or_else(|| AppError::InvalidRequest(format!("Unknown model '{}'", name.trim())))
    }

    fn cached(&self, name: &str) -> Option<Arc<dyn SegmentationSession>> {
        self.sessions.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Session for an explicit model, building it on first use.
    ///
    /// A name that failed before is retried.
    pub async fn get(&self, name: &str) -> Result<Arc<dyn SegmentationSession>> {
        let name = Self::canonical(name)?;
        if let Some(session) = self.cached(&name) {
            return Ok(session);
        }

        let lock = Arc::clone(self.build_locks.entry(name.clone()).or_default().value());
        let _guard = lock.lock().await;
        if let Some(session) = self.cached(&name) {
            return Ok(session);
        }

        match self.factory.build_session(&name).await {
            Ok(session) => {
                self.failed.remove(&name);
                let session = Arc::clone(
                    self.sessions
                        .entry(name.clone())
                        .or_insert(session)
                        .value(),
                );
                info!(model = %name, "Segmentation session ready");
                Ok(session)
            }
            Err(e) => {
                warn!(model = %name, error = %e, "Failed to initialize segmentation session");
                self.failed.insert(name, e.to_string());
                Err(e)
            }
        }
    }

    /// First model in preference order that initializes.
    ///
    /// Names that already failed are skipped.
    pub async fn get_default(&self) -> Result<Arc<dyn SegmentationSession>> {
        let current = self.default_model.read().clone();
        if let Some(name) = current {
            if let Some(session) = self.cached(&name) {
                return Ok(session);
            }
        }

        let mut last_error = None;
        for name in &self.preference {
            if self.failed.contains_key(name.as_str()) {
                continue;
            }
            match self.get(name).await {
                Ok(session) => {
                    *self.default_model.write() = Some(session.model_name().to_string());
                    return Ok(session);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(AppError::ModelUnavailable(match last_error {
            Some(e) => format!("no default segmentation model could be initialized: {}", e),
            None => "no default segmentation model could be initialized".to_string(),
        }))
    }

    pub fn loaded_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn status(&self) -> CacheStatus {
        let mut loaded: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        loaded.sort();
        let failed = self
            .failed
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        CacheStatus {
            loaded,
            failed,
            default_model: self.default_model.read().clone(),
        }
    }
}
