use chrono::Utc;
use photoid_vecmath::{nearest, running_mean_add};
use tracing::{debug, info, warn};

use crate::error::FaceIdError;
use crate::keys::{SEQ_CLUSTER, SEQ_FACE, photo_face_key, photo_scanned_key};
use crate::registry::Registry;
use crate::store::{Tx, Versioned};
use crate::types::{
    Assignment, Classification, Cluster, ClusterId, Decision, Detection, Face, FaceId,
    FaceOutcome, IngestReport, Outcome, Person, Resolution, SkipReason,
};

impl Registry {
    /// Runs the candidate search for `embedding` without writing anything.
    ///
    /// Returns the same answer [`Registry::resolve`] would act on, given the
    /// current people and clusters.
    pub fn classify(&self, embedding: &[f32]) -> Result<Classification, FaceIdError> {
        if let Some(reason) = self.embedding_problem(embedding) {
            return Err(FaceIdError::InvalidInput(reason.to_string()));
        }
        let people = self.store.people()?;
        let clusters = self.store.clusters()?;
        Ok(self.decide(embedding, &people, &clusters))
    }

    /// Two-stage nearest-neighbor search.
    ///
    /// People are tried first against `person_threshold`, then live clusters
    /// against `cluster_threshold`. Both comparisons are strict. Candidates
    /// with vectors of the wrong dimension never match.
    fn decide(
        &self,
        embedding: &[f32],
        people: &[Versioned<Person>],
        clusters: &[Versioned<Cluster>],
    ) -> Classification {
        let dim = self.cfg.dim;

        let person = nearest(
            embedding,
            people.iter().filter_map(|p| {
                let golden = p.value.golden.as_deref()?;
                (golden.len() == dim).then_some((p.value.id, golden))
            }),
        );
        if let Some(m) = person {
            if m.distance < self.cfg.person_threshold {
                return Classification::Person {
                    id: m.id,
                    distance: m.distance,
                };
            }
        }

        // Empty clusters have no mean to compare against.
        let cluster = nearest(
            embedding,
            clusters
                .iter()
                .filter(|c| {
                    !c.value.ignored && c.value.face_count > 0 && c.value.centroid.len() == dim
                })
                .map(|c| (c.value.id, c.value.centroid.as_slice())),
        );
        if let Some(m) = cluster {
            if m.distance < self.cfg.cluster_threshold {
                return Classification::Cluster {
                    id: m.id,
                    distance: m.distance,
                };
            }
        }

        Classification::NewCluster
    }

    /// Resolves one stored face.
    ///
    /// Faces that are ignored, already assigned, or lack a usable embedding
    /// are skipped without any write. A face whose reference dangles (its
    /// cluster or person is gone) counts as unassigned. Re-running on an
    /// unassigned face yields the same decision as long as people and
    /// clusters are unchanged.
    pub fn resolve(&self, face: FaceId) -> Result<Resolution, FaceIdError> {
        self.retry("resolve", || self.resolve_once(face))
    }

    fn resolve_once(&self, id: FaceId) -> Result<Resolution, FaceIdError> {
        let face = self
            .store
            .face(id)?
            .ok_or_else(|| FaceIdError::not_found("face", id))?;

        if face.value.ignored {
            debug!(face = %id, "skipping ignored face");
            return Ok(Resolution::Skipped(SkipReason::Ignored));
        }
        if self.is_assigned(&face.value)? {
            debug!(face = %id, assignment = %face.value.assignment, "face already assigned");
            return Ok(Resolution::Skipped(SkipReason::AlreadyAssigned));
        }
        if let Some(reason) = self.embedding_problem(&face.value.embedding) {
            warn!(face = %id, photo = %face.value.photo, %reason, "face not resolvable");
            return Ok(Resolution::Skipped(reason));
        }

        // The sequence is read before the cluster scan: if another writer
        // creates a cluster after this point, seeding a new one below fails
        // its guard and the search re-runs with that cluster visible.
        let cluster_seq = self.store.seq(SEQ_CLUSTER)?;
        let people = self.store.people()?;
        let clusters = self.store.clusters()?;
        let embedding = &face.value.embedding;

        let mut tx = Tx::new();
        let decision = match self.decide(embedding, &people, &clusters) {
            Classification::Person { id: pid, distance } => {
                let person = people
                    .iter()
                    .find(|p| p.value.id == pid)
                    .ok_or_else(|| FaceIdError::not_found("person", pid))?;
                tx.expect(person);
                debug!(face = %id, person = %pid, distance, "matched person");
                Decision::Person(pid)
            }
            Classification::Cluster { id: cid, distance } => {
                let cluster = clusters
                    .iter()
                    .find(|c| c.value.id == cid)
                    .ok_or_else(|| FaceIdError::not_found("cluster", cid))?;
                let mut next = cluster.value.clone();
                next.face_count =
                    running_mean_add(&mut next.centroid, next.face_count, embedding)?;
                debug!(
                    face = %id,
                    cluster = %cid,
                    distance,
                    face_count = next.face_count,
                    "joined cluster"
                );
                tx.update(cluster, next)?;
                Decision::Cluster(cid)
            }
            Classification::NewCluster => {
                let cid = ClusterId(tx.take_ids(&cluster_seq, 1));
                tx.insert(Cluster {
                    id: cid,
                    centroid: embedding.clone(),
                    face_count: 1,
                    ignored: false,
                    created_at: Utc::now(),
                    version: 0,
                })?;
                debug!(face = %id, cluster = %cid, "seeded new cluster");
                Decision::NewCluster(cid)
            }
        };

        let mut next = face.value.clone();
        next.assignment = decision.assignment();
        tx.update(&face, next)?;
        self.store.commit(tx)?;
        Ok(Resolution::Resolved(decision))
    }

    /// Reports whether `face` points at a person or cluster that exists.
    fn is_assigned(&self, face: &Face) -> Result<bool, FaceIdError> {
        let exists = match face.assignment {
            Assignment::Unassigned => return Ok(false),
            Assignment::Person(pid) => self.store.person(pid)?.is_some(),
            Assignment::Cluster(cid) => self.store.cluster(cid)?.is_some(),
        };
        if !exists {
            warn!(
                face = %face.id,
                assignment = %face.assignment,
                "dangling reference, treating face as unassigned"
            );
        }
        Ok(exists)
    }

    /// Stores one photo's detections and resolves them strictly in order,
    /// so each face sees the effects of the faces before it.
    ///
    /// Storing the detections and marking the photo scanned is one
    /// all-or-nothing commit; an error from this call means nothing was
    /// stored. A face that then fails to resolve is reported and left
    /// unassigned, and the rest of the batch still runs.
    pub fn ingest(
        &self,
        photo: &str,
        detections: &[Detection],
    ) -> Result<IngestReport, FaceIdError> {
        if photo.trim().is_empty() {
            return Err(FaceIdError::InvalidInput("photo reference is empty".into()));
        }

        let ids = self.retry("ingest", || self.insert_faces(photo, detections))?;

        let report = IngestReport {
            photo: photo.to_string(),
            faces: self.resolve_each(ids),
        };
        info!(
            %photo,
            faces = report.faces.len(),
            resolved = report.resolved(),
            skipped = report.skipped(),
            failed = report.failed(),
            "ingested photo"
        );
        Ok(report)
    }

    /// Resolves `ids` in order. A failure is recorded against its face and
    /// does not stop the rest.
    fn resolve_each(&self, ids: impl IntoIterator<Item = FaceId>) -> Vec<FaceOutcome> {
        ids.into_iter()
            .map(|id| {
                let outcome = match self.resolve(id) {
                    Ok(Resolution::Resolved(decision)) => Outcome::Resolved { decision },
                    Ok(Resolution::Skipped(reason)) => Outcome::Skipped { reason },
                    Err(e) => {
                        warn!(face = %id, error = %e, "face resolution failed");
                        Outcome::Failed {
                            error: e.to_string(),
                        }
                    }
                };
                FaceOutcome { face: id, outcome }
            })
            .collect()
    }

    fn insert_faces(
        &self,
        photo: &str,
        detections: &[Detection],
    ) -> Result<Vec<FaceId>, FaceIdError> {
        let mut tx = Tx::new();
        tx.put_raw(
            photo_scanned_key(photo),
            self.cfg.embedding_version.clone().into_bytes(),
        );
        if detections.is_empty() {
            self.store.commit(tx)?;
            return Ok(Vec::new());
        }

        let seq = self.store.seq(SEQ_FACE)?;
        let first = tx.take_ids(&seq, detections.len() as u64);
        let now = Utc::now();

        let mut ids = Vec::with_capacity(detections.len());
        for (i, d) in detections.iter().enumerate() {
            let id = FaceId(first + i as u64);
            let bbox = d.bbox.unwrap_or_else(|| {
                warn!(%photo, face = %id, "detection has no bounding box");
                [0.0; 4]
            });
            tx.insert(Face {
                id,
                photo: photo.to_string(),
                face_index: i as u32,
                bbox,
                landmarks: d.landmarks.clone(),
                confidence: d.confidence,
                crop: d.crop.clone(),
                embedding: d.embedding.clone(),
                embedding_version: self.cfg.embedding_version.clone(),
                assignment: Assignment::Unassigned,
                ignored: false,
                ignored_with_cluster: false,
                created_at: now,
                version: 0,
            })?;
            tx.put_raw(photo_face_key(photo, id), Vec::new());
            ids.push(id);
        }
        self.store.commit(tx)?;
        Ok(ids)
    }

    /// Resolves every non-ignored face that has no live owner, in id order:
    /// faces left behind by failed ingests and faces whose cluster or
    /// person is gone.
    ///
    /// Like [`Registry::ingest`], a face that fails is reported as
    /// [`Outcome::Failed`] and the sweep carries on.
    pub fn resolve_unassigned(&self) -> Result<Vec<FaceOutcome>, FaceIdError> {
        let owners = self.owners()?;
        let pending: Vec<FaceId> = self
            .store
            .faces()?
            .into_iter()
            .filter(|f| !f.value.ignored && !owners.holds(&f.value.assignment))
            .map(|f| f.value.id)
            .collect();

        let out = self.resolve_each(pending);
        let failed = out
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Failed { .. }))
            .count();
        info!(faces = out.len(), failed, "resolved pending faces");
        Ok(out)
    }
}
