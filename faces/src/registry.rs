use std::sync::Arc;

use photoid_kv::{KVStore, MemoryStore};
use tracing::debug;

use crate::config::Config;
use crate::error::FaceIdError;
use crate::store::{IdentityStore, with_retry};
use crate::types::SkipReason;

/// Resolves faces to identities and manages people and clusters.
///
/// Thread-safe: all methods can be called concurrently, from any number of
/// registries sharing the same store.
pub struct Registry {
    pub(crate) cfg: Config,
    pub(crate) store: IdentityStore,
}

impl Registry {
    /// Creates a registry over `kv`. Zero config values take their defaults;
    /// the result must pass [`Config::validate`].
    pub fn new(cfg: Config, kv: Arc<dyn KVStore>) -> Result<Self, FaceIdError> {
        let cfg = cfg.with_defaults();
        cfg.validate()?;
        debug!(
            dim = cfg.dim,
            person_threshold = cfg.person_threshold,
            cluster_threshold = cfg.cluster_threshold,
            "opening face registry"
        );
        Ok(Self {
            cfg,
            store: IdentityStore::new(kv),
        })
    }

    /// Creates a registry with a default in-memory store.
    pub fn with_memory_store(cfg: Config) -> Result<Self, FaceIdError> {
        Self::new(cfg, Arc::new(MemoryStore::new()))
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Runs `f` as one unit of work, re-running it on write conflicts.
    pub(crate) fn retry<T>(
        &self,
        op: &str,
        f: impl FnMut() -> Result<T, FaceIdError>,
    ) -> Result<T, FaceIdError> {
        with_retry(op, self.cfg.max_retries, f)
    }

    /// Why `embedding` cannot take part in matching, if it cannot.
    pub(crate) fn embedding_problem(&self, embedding: &[f32]) -> Option<SkipReason> {
        if embedding.is_empty() {
            Some(SkipReason::MissingEmbedding)
        } else if embedding.len() != self.cfg.dim {
            Some(SkipReason::DimensionMismatch {
                got: embedding.len(),
                want: self.cfg.dim,
            })
        } else if embedding.iter().any(|x| !x.is_finite()) {
            Some(SkipReason::NonFiniteEmbedding)
        } else {
            None
        }
    }
}
