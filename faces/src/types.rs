use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_type!(
    /// Identifier of a [`Person`].
    PersonId
);
id_type!(
    /// Identifier of a [`Cluster`].
    ClusterId
);
id_type!(
    /// Identifier of a [`Face`].
    FaceId
);

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Who a face belongs to. A face references at most one person or one
/// cluster, never both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Assignment {
    #[default]
    Unassigned,
    Person(PersonId),
    Cluster(ClusterId),
}

impl Assignment {
    pub fn person(&self) -> Option<PersonId> {
        match self {
            Assignment::Person(id) => Some(*id),
            _ => None,
        }
    }

    pub fn cluster(&self) -> Option<ClusterId> {
        match self {
            Assignment::Cluster(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_assigned(&self) -> bool {
        !matches!(self, Assignment::Unassigned)
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assignment::Unassigned => f.write_str("unassigned"),
            Assignment::Person(id) => write!(f, "person:{id}"),
            Assignment::Cluster(id) => write!(f, "cluster:{id}"),
        }
    }
}

/// A named identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,

    /// Mean embedding of the faces linked to this person. `None` until the
    /// first recompute finds a usable face.
    #[serde(default)]
    pub golden: Option<Vec<f32>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub version: u64,
}

/// An unnamed, provisional group of faces.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,

    /// Running mean of the embeddings of the live member faces.
    pub centroid: Vec<f32>,

    /// Number of faces folded into `centroid`.
    pub face_count: u64,

    #[serde(default)]
    pub ignored: bool,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub version: u64,
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster")
            .field("id", &self.id)
            .field("face_count", &self.face_count)
            .field("ignored", &self.ignored)
            .field("centroid_len", &self.centroid.len())
            .field("version", &self.version)
            .finish()
    }
}

/// One detected face in one photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub id: FaceId,

    /// Owning photo. Deleting the photo deletes its faces.
    pub photo: String,

    /// Position of this face in its photo's detection batch.
    pub face_index: u32,

    /// `[x1, y1, x2, y2]` in source-image pixels.
    pub bbox: [f32; 4],

    #[serde(default)]
    pub landmarks: Vec<[f32; 2]>,

    #[serde(default)]
    pub confidence: Option<f32>,

    /// Base64-encoded face crop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,

    /// Empty when the detector produced no usable embedding.
    #[serde(default)]
    pub embedding: Vec<f32>,

    #[serde(default)]
    pub embedding_version: String,

    #[serde(default)]
    pub assignment: Assignment,

    #[serde(default)]
    pub ignored: bool,

    /// Set when the face was ignored together with its cluster rather than
    /// on its own. Unignoring the cluster restores only these faces.
    #[serde(default)]
    pub ignored_with_cluster: bool,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub version: u64,
}

// ---------------------------------------------------------------------------
// Detector input
// ---------------------------------------------------------------------------

/// One face as reported by the external detector.
///
/// Accepts the detector's field names (`landmark`, `det_score`,
/// `normed_embedding`) as aliases. The embedding may be a JSON array or a
/// textual vector literal such as `"[0.1,0.2]"`. A missing or malformed
/// bounding box leaves `bbox` unset; the face itself is still kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default, deserialize_with = "bbox_field")]
    pub bbox: Option<[f32; 4]>,

    #[serde(default, alias = "landmark")]
    pub landmarks: Vec<[f32; 2]>,

    #[serde(default, alias = "det_score")]
    pub confidence: Option<f32>,

    #[serde(default, alias = "normed_embedding", deserialize_with = "embedding_field")]
    pub embedding: Vec<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,
}

/// A photo's detection batch, in detector order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaceSet {
    pub photo: String,
    #[serde(default)]
    pub faces: Vec<Detection>,
}

fn bbox_field<'de, D>(d: D) -> Result<Option<[f32; 4]>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Box([f32; 4]),
        Other(serde::de::IgnoredAny),
    }

    match Option::<Raw>::deserialize(d)? {
        Some(Raw::Box(b)) => Ok(Some(b)),
        Some(Raw::Other(_)) => {
            tracing::warn!("dropping malformed bounding box");
            Ok(None)
        }
        None => Ok(None),
    }
}

fn embedding_field<'de, D>(d: D) -> Result<Vec<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<f32>),
        Text(String),
    }

    match Option::<Raw>::deserialize(d)? {
        None => Ok(Vec::new()),
        Some(Raw::List(v)) => Ok(v),
        // A malformed literal must not fail the whole batch: the face is
        // kept without an embedding and skipped by resolution.
        Some(Raw::Text(s)) => match photoid_vecmath::parse_vector(&s) {
            Ok(v) => Ok(v),
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed embedding literal");
                Ok(Vec::new())
            }
        },
    }
}

// ---------------------------------------------------------------------------
// Resolution results
// ---------------------------------------------------------------------------

/// What resolution did with a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum Decision {
    /// Assigned to an existing person.
    Person(PersonId),
    /// Assigned to an existing cluster; its centroid was updated.
    Cluster(ClusterId),
    /// Seeded a brand-new cluster.
    NewCluster(ClusterId),
}

impl Decision {
    pub fn assignment(&self) -> Assignment {
        match *self {
            Decision::Person(id) => Assignment::Person(id),
            Decision::Cluster(id) | Decision::NewCluster(id) => Assignment::Cluster(id),
        }
    }
}

/// Read-only outcome of the candidate search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    Person { id: PersonId, distance: f32 },
    Cluster { id: ClusterId, distance: f32 },
    NewCluster,
}

/// Why a face was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    MissingEmbedding,
    DimensionMismatch { got: usize, want: usize },
    NonFiniteEmbedding,
    AlreadyAssigned,
    Ignored,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingEmbedding => f.write_str("missing embedding"),
            SkipReason::DimensionMismatch { got, want } => {
                write!(f, "embedding has {got} components, want {want}")
            }
            SkipReason::NonFiniteEmbedding => f.write_str("embedding has non-finite components"),
            SkipReason::AlreadyAssigned => f.write_str("already assigned"),
            SkipReason::Ignored => f.write_str("ignored"),
        }
    }
}

/// Result of [`Registry::resolve`](crate::Registry::resolve).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Resolved(Decision),
    Skipped(SkipReason),
}

impl Resolution {
    pub fn decision(&self) -> Option<Decision> {
        match self {
            Resolution::Resolved(d) => Some(*d),
            Resolution::Skipped(_) => None,
        }
    }
}

/// Per-face outcome inside an [`IngestReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Resolved { decision: Decision },
    Skipped { reason: SkipReason },
    /// Storage failure. The face stays unassigned and can be re-resolved.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceOutcome {
    pub face: FaceId,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Summary of one photo's ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub photo: String,
    pub faces: Vec<FaceOutcome>,
}

impl IngestReport {
    pub fn resolved(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Resolved { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    fn count(&self, f: impl Fn(&Outcome) -> bool) -> usize {
        self.faces.iter().filter(|fo| f(&fo.outcome)).count()
    }
}

// ---------------------------------------------------------------------------
// Operator commands and queries
// ---------------------------------------------------------------------------

/// Where promoted faces go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromoteTarget {
    /// Create a person with this name.
    NewPerson(String),
    /// Merge into an existing person.
    Person(PersonId),
}

/// A cluster as shown to operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub id: ClusterId,
    pub face_count: u64,
    pub ignored: bool,
    pub centroid: Vec<f32>,
    /// Live member nearest the centroid. `None` for an empty cluster.
    pub representative: Option<FaceId>,
}

/// One page of faces, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacePage {
    pub faces: Vec<Face>,
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
}
