//! Face identity resolution over a transactional key-value store.
//!
//! Every detected face is resolved, in arrival order, to one of:
//! an existing named [`Person`], an existing unnamed [`Cluster`] (whose
//! running-mean centroid absorbs the face), or a brand-new cluster.
//! Operators later promote clusters to people, ignore clusters or faces,
//! and tag faces by hand; people's golden vectors are then recomputed from
//! their full face set.
//!
//! # Usage
//!
//! ```
//! use photoid_faces::{Config, Detection, Registry, PromoteTarget};
//!
//! let reg = Registry::with_memory_store(Config { dim: 2, ..Config::default() }).unwrap();
//!
//! let faces = [
//!     Detection { embedding: vec![1.0, 0.0], ..Default::default() },
//!     Detection { embedding: vec![0.99, 0.14], ..Default::default() },
//! ];
//! let report = reg.ingest("photo-1", &faces).unwrap();
//! assert_eq!(report.resolved(), 2);
//!
//! let cluster = reg.list_clusters(false).unwrap()[0].id;
//! let alice = reg.promote(&[cluster], PromoteTarget::NewPerson("Alice".into())).unwrap();
//! assert_eq!(reg.faces_for_person(alice).unwrap().len(), 2);
//! ```
//!
//! # Design
//!
//! Resolution is greedy and streaming: there is no re-clustering pass.
//! Cluster centroids are maintained incrementally as exact running means;
//! person golden vectors are only ever recomputed from scratch, since manual
//! corrections remove faces as well as add them. Concurrent writers are
//! serialized per record through guarded commits (see the `store` module).

mod config;
mod error;
mod keys;
mod lifecycle;
mod query;
mod recompute;
mod registry;
mod resolve;
mod store;
mod types;

pub use config::Config;
pub use error::FaceIdError;
pub use query::{DEFAULT_PAGE_SIZE, SEARCH_LIMIT};
pub use registry::Registry;
pub use types::{
    Assignment, Classification, Cluster, ClusterId, ClusterSummary, Decision, Detection, Face,
    FaceId, FaceOutcome, FacePage, FaceSet, IngestReport, Outcome, Person, PersonId,
    PromoteTarget, Resolution, SkipReason,
};
