use serde::{Deserialize, Serialize};

use crate::error::FaceIdError;

/// Controls resolution behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Embedding dimension, fixed system-wide (512 for the reference
    /// face model).
    pub dim: usize,

    /// A face joins the nearest person only if its cosine distance to the
    /// person's golden vector is strictly below this value.
    /// Default: 0.30.
    pub person_threshold: f32,

    /// A face joins the nearest live cluster only if its cosine distance to
    /// the centroid is strictly below this value. Must be greater than
    /// `person_threshold`. Default: 0.35.
    pub cluster_threshold: f32,

    /// How many times a unit of work is re-run after losing a write race.
    /// Default: 8.
    pub max_retries: usize,

    /// Face-schema version recorded on every stored face and scanned photo.
    pub embedding_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dim: 512,
            person_threshold: 0.30,
            cluster_threshold: 0.35,
            max_retries: 8,
            embedding_version: "0.1".into(),
        }
    }
}

impl Config {
    /// Replaces zero values with defaults.
    pub fn with_defaults(mut self) -> Self {
        let d = Self::default();
        if self.dim == 0 {
            self.dim = d.dim;
        }
        if self.person_threshold == 0.0 {
            self.person_threshold = d.person_threshold;
        }
        if self.cluster_threshold == 0.0 {
            self.cluster_threshold = d.cluster_threshold;
        }
        if self.max_retries == 0 {
            self.max_retries = d.max_retries;
        }
        if self.embedding_version.is_empty() {
            self.embedding_version = d.embedding_version;
        }
        self
    }

    pub fn validate(&self) -> Result<(), FaceIdError> {
        if self.dim == 0 {
            return Err(FaceIdError::Config("dim must be positive".into()));
        }
        for (name, t) in [
            ("person_threshold", self.person_threshold),
            ("cluster_threshold", self.cluster_threshold),
        ] {
            if !t.is_finite() || t <= 0.0 || t > 2.0 {
                return Err(FaceIdError::Config(format!("{name} must be in (0, 2], got {t}")));
            }
        }
        if self.person_threshold >= self.cluster_threshold {
            return Err(FaceIdError::Config(format!(
                "person_threshold ({}) must be below cluster_threshold ({})",
                self.person_threshold, self.cluster_threshold
            )));
        }
        Ok(())
    }
}
