//! Operator commands: promotion, ignore, manual tagging and deletion.
//!
//! Every command validates its input and loads everything it touches
//! before building a single guarded commit, so a rejected or conflicting
//! command leaves no partial state behind.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use photoid_vecmath::{is_valid, mean, running_mean_remove};
use tracing::{info, warn};

use crate::error::FaceIdError;
use crate::keys::{SEQ_PERSON, photo_face_key, photo_scanned_key};
use crate::registry::Registry;
use crate::store::{Tx, Versioned};
use crate::types::{
    Assignment, Cluster, ClusterId, Face, FaceId, Person, PersonId, PromoteTarget,
};

/// Clusters whose statistics change within one command: the record as read
/// plus the staged replacement.
type StagedClusters = BTreeMap<ClusterId, (Versioned<Cluster>, Cluster)>;

fn unique<T: Ord + Copy>(ids: &[T], what: &str) -> Result<BTreeSet<T>, FaceIdError> {
    if ids.is_empty() {
        return Err(FaceIdError::InvalidInput(format!("no {what} ids given")));
    }
    Ok(ids.iter().copied().collect())
}

impl Registry {
    /// Promotes one or more clusters into a person.
    ///
    /// Every face of every listed cluster is reassigned to the target
    /// person and the clusters are deleted, all in one commit. A new
    /// person's golden vector is the raw mean of the gathered embeddings;
    /// an existing person's is recomputed over its current faces plus the
    /// gathered ones.
    pub fn promote(
        &self,
        clusters: &[ClusterId],
        target: PromoteTarget,
    ) -> Result<PersonId, FaceIdError> {
        let ids = unique(clusters, "cluster")?;
        if let PromoteTarget::NewPerson(name) = &target {
            if name.trim().is_empty() {
                return Err(FaceIdError::InvalidInput("person name is empty".into()));
            }
        }

        let (pid, moved) = self.retry("promote", || self.promote_once(&ids, &target))?;
        info!(person = %pid, clusters = ?ids, faces = moved, "promoted clusters");
        Ok(pid)
    }

    fn promote_once(
        &self,
        ids: &BTreeSet<ClusterId>,
        target: &PromoteTarget,
    ) -> Result<(PersonId, usize), FaceIdError> {
        let mut sources = Vec::with_capacity(ids.len());
        for &id in ids {
            let cluster = self
                .store
                .cluster(id)?
                .ok_or_else(|| FaceIdError::not_found("cluster", id))?;
            sources.push(cluster);
        }

        let faces = self.store.faces()?;
        let members: Vec<&Versioned<Face>> = faces
            .iter()
            .filter(|f| f.value.assignment.cluster().is_some_and(|c| ids.contains(&c)))
            .collect();
        if members.is_empty() {
            return Err(FaceIdError::InvalidInput(format!(
                "clusters {ids:?} have no faces to promote"
            )));
        }

        let dim = self.cfg.dim;
        let now = Utc::now();
        let mut tx = Tx::new();

        let pid = match target {
            PromoteTarget::NewPerson(name) => {
                let seq = self.store.seq(SEQ_PERSON)?;
                let pid = PersonId(tx.take_ids(&seq, 1));
                tx.insert(Person {
                    id: pid,
                    name: name.trim().to_string(),
                    golden: mean(members.iter().map(|f| f.value.embedding.as_slice()), dim),
                    created_at: now,
                    updated_at: now,
                    version: 0,
                })?;
                pid
            }
            PromoteTarget::Person(pid) => {
                let person = self
                    .store
                    .person(*pid)?
                    .ok_or_else(|| FaceIdError::not_found("person", pid))?;
                let existing: Vec<&Versioned<Face>> = faces
                    .iter()
                    .filter(|f| f.value.assignment.person() == Some(*pid))
                    .collect();
                for f in &existing {
                    tx.expect(*f);
                }
                let golden = mean(
                    existing
                        .iter()
                        .chain(members.iter())
                        .map(|f| f.value.embedding.as_slice()),
                    dim,
                );
                let mut next = person.value.clone();
                if golden.is_some() {
                    next.golden = golden;
                }
                next.updated_at = now;
                tx.update(&person, next)?;
                *pid
            }
        };

        for f in &members {
            let mut next = f.value.clone();
            next.assignment = Assignment::Person(pid);
            tx.update(*f, next)?;
        }
        for c in &sources {
            tx.remove(c);
        }
        self.store.commit(tx)?;
        Ok((pid, members.len()))
    }

    /// Marks clusters and all their member faces ignored. Ignored clusters
    /// are no longer matched against but keep their faces and statistics.
    /// Already ignored clusters are left as they are.
    ///
    /// Returns the number of clusters that changed.
    pub fn ignore_clusters(&self, clusters: &[ClusterId]) -> Result<usize, FaceIdError> {
        let ids = unique(clusters, "cluster")?;
        let n = self.retry("ignore", || self.set_clusters_ignored(&ids, true))?;
        info!(clusters = ?ids, changed = n, "ignored clusters");
        Ok(n)
    }

    /// Reverses [`Registry::ignore_clusters`]. Member faces hidden by the
    /// cluster ignore are restored; faces ignored on their own stay ignored.
    /// The centroid is rebuilt from the faces that count again.
    ///
    /// Returns the number of clusters that changed.
    pub fn unignore_clusters(&self, clusters: &[ClusterId]) -> Result<usize, FaceIdError> {
        let ids = unique(clusters, "cluster")?;
        let n = self.retry("unignore", || self.set_clusters_ignored(&ids, false))?;
        info!(clusters = ?ids, changed = n, "restored clusters");
        Ok(n)
    }

    fn set_clusters_ignored(
        &self,
        ids: &BTreeSet<ClusterId>,
        ignored: bool,
    ) -> Result<usize, FaceIdError> {
        let mut clusters = Vec::with_capacity(ids.len());
        for &id in ids {
            let cluster = self
                .store
                .cluster(id)?
                .ok_or_else(|| FaceIdError::not_found("cluster", id))?;
            clusters.push(cluster);
        }

        let faces = self.store.faces()?;
        let dim = self.cfg.dim;
        let mut tx = Tx::new();
        let mut changed = 0;

        for c in clusters.iter().filter(|c| c.value.ignored != ignored) {
            let members: Vec<&Versioned<Face>> = faces
                .iter()
                .filter(|f| f.value.assignment.cluster() == Some(c.value.id))
                .collect();

            let mut next = c.value.clone();
            next.ignored = ignored;
            if !ignored {
                let usable: Vec<&[f32]> = members
                    .iter()
                    .filter(|f| !f.value.ignored || f.value.ignored_with_cluster)
                    .map(|f| f.value.embedding.as_slice())
                    .filter(|e| is_valid(e, dim))
                    .collect();
                if let Some(centroid) = mean(usable.iter().copied(), dim) {
                    next.centroid = centroid;
                }
                next.face_count = usable.len() as u64;
            }
            tx.update(c, next)?;

            for f in members {
                let mut nf = f.value.clone();
                if ignored && !f.value.ignored {
                    nf.ignored = true;
                    nf.ignored_with_cluster = true;
                } else if !ignored && f.value.ignored_with_cluster {
                    nf.ignored = false;
                    nf.ignored_with_cluster = false;
                } else {
                    continue;
                }
                tx.update(f, nf)?;
            }
            changed += 1;
        }

        self.store.commit(tx)?;
        Ok(changed)
    }

    /// Marks individual faces ignored. A face leaving a live cluster is
    /// removed from its centroid. A face already hidden by its cluster's
    /// ignore becomes ignored on its own, so unignoring the cluster leaves
    /// it out.
    ///
    /// Returns the number of faces that changed.
    pub fn ignore_faces(&self, faces: &[FaceId]) -> Result<usize, FaceIdError> {
        let ids = unique(faces, "face")?;
        let n = self.retry("ignore_faces", || {
            let faces = self.load_faces(&ids)?;
            let mut staged = StagedClusters::new();
            let mut tx = Tx::new();
            let mut changed = 0;
            for f in faces
                .iter()
                .filter(|f| !f.value.ignored || f.value.ignored_with_cluster)
            {
                self.detach_from_cluster(&f.value, &mut staged)?;
                let mut next = f.value.clone();
                next.ignored = true;
                next.ignored_with_cluster = false;
                tx.update(f, next)?;
                changed += 1;
            }
            stage_clusters(&mut tx, staged)?;
            self.store.commit(tx)?;
            Ok(changed)
        })?;
        info!(faces = ?ids, changed = n, "ignored faces");
        Ok(n)
    }

    /// Manually tags faces as the person called `name`, creating the person
    /// if no one has that exact name yet.
    ///
    /// Faces leave their clusters (updating the centroids) or their previous
    /// person. The golden vectors of the target and of every previous owner
    /// are then recomputed.
    pub fn tag_faces(&self, name: &str, faces: &[FaceId]) -> Result<PersonId, FaceIdError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FaceIdError::InvalidInput("person name is empty".into()));
        }
        let ids = unique(faces, "face")?;

        let (pid, previous) = self.retry("tag", || self.tag_once(name, &ids))?;
        info!(person = %pid, %name, faces = ?ids, "tagged faces");

        self.refresh_people(std::iter::once(pid).chain(previous))?;
        Ok(pid)
    }

    fn tag_once(
        &self,
        name: &str,
        ids: &BTreeSet<FaceId>,
    ) -> Result<(PersonId, BTreeSet<PersonId>), FaceIdError> {
        let faces = self.load_faces(ids)?;
        let mut tx = Tx::new();

        let existing = self.store.people()?.into_iter().find(|p| p.value.name == name);
        let pid = match existing {
            Some(p) => p.value.id,
            None => {
                let seq = self.store.seq(SEQ_PERSON)?;
                let pid = PersonId(tx.take_ids(&seq, 1));
                let now = Utc::now();
                tx.insert(Person {
                    id: pid,
                    name: name.to_string(),
                    golden: None,
                    created_at: now,
                    updated_at: now,
                    version: 0,
                })?;
                pid
            }
        };

        let mut staged = StagedClusters::new();
        let mut previous = BTreeSet::new();
        for f in &faces {
            match f.value.assignment {
                Assignment::Person(p) if p == pid => continue,
                Assignment::Person(p) => {
                    previous.insert(p);
                }
                Assignment::Cluster(_) => self.detach_from_cluster(&f.value, &mut staged)?,
                Assignment::Unassigned => {}
            }
            let mut next = f.value.clone();
            next.assignment = Assignment::Person(pid);
            tx.update(f, next)?;
        }
        stage_clusters(&mut tx, staged)?;
        self.store.commit(tx)?;
        Ok((pid, previous))
    }

    /// Deletes one face, keeping its cluster's statistics and its person's
    /// golden vector consistent.
    pub fn delete_face(&self, id: FaceId) -> Result<(), FaceIdError> {
        let owner = self.retry("delete_face", || {
            let face = self
                .store
                .face(id)?
                .ok_or_else(|| FaceIdError::not_found("face", id))?;
            let mut staged = StagedClusters::new();
            self.detach_from_cluster(&face.value, &mut staged)?;

            let mut tx = Tx::new();
            stage_clusters(&mut tx, staged)?;
            tx.remove(&face);
            tx.delete_raw(photo_face_key(&face.value.photo, id));
            self.store.commit(tx)?;
            Ok(face.value.assignment.person())
        })?;
        info!(face = %id, "deleted face");
        self.refresh_people(owner)
    }

    /// Deletes every face of a photo, as when the photo itself is removed.
    ///
    /// Returns the number of faces deleted.
    pub fn delete_photo(&self, photo: &str) -> Result<usize, FaceIdError> {
        let (n, owners) = self.retry("delete_photo", || {
            let faces = self.store.photo_faces(photo)?;
            let mut staged = StagedClusters::new();
            let mut owners = BTreeSet::new();
            let mut tx = Tx::new();
            for f in &faces {
                self.detach_from_cluster(&f.value, &mut staged)?;
                owners.extend(f.value.assignment.person());
                tx.remove(f);
                tx.delete_raw(photo_face_key(photo, f.value.id));
            }
            stage_clusters(&mut tx, staged)?;
            tx.delete_raw(photo_scanned_key(photo));
            self.store.commit(tx)?;
            Ok((faces.len(), owners))
        })?;
        info!(%photo, faces = n, "deleted photo faces");
        self.refresh_people(owners)?;
        Ok(n)
    }

    fn load_faces(&self, ids: &BTreeSet<FaceId>) -> Result<Vec<Versioned<Face>>, FaceIdError> {
        ids.iter()
            .map(|&id| {
                self.store
                    .face(id)?
                    .ok_or_else(|| FaceIdError::not_found("face", id))
            })
            .collect()
    }

    /// Stages the removal of `face` from its cluster's running mean.
    ///
    /// Only faces that currently count towards a live cluster are removed:
    /// not ignored, with a usable embedding, in a cluster that is itself not
    /// ignored. A reference to a missing cluster is logged and left alone.
    fn detach_from_cluster(
        &self,
        face: &Face,
        staged: &mut StagedClusters,
    ) -> Result<(), FaceIdError> {
        let Some(cid) = face.assignment.cluster() else {
            return Ok(());
        };
        if face.ignored || self.embedding_problem(&face.embedding).is_some() {
            return Ok(());
        }

        if !staged.contains_key(&cid) {
            match self.store.cluster(cid)? {
                Some(c) => {
                    let next = c.value.clone();
                    staged.insert(cid, (c, next));
                }
                None => {
                    warn!(face = %face.id, cluster = %cid, "face references a missing cluster");
                    return Ok(());
                }
            }
        }

        if let Some((_, next)) = staged.get_mut(&cid) {
            if next.ignored || next.centroid.len() != face.embedding.len() {
                return Ok(());
            }
            next.face_count =
                running_mean_remove(&mut next.centroid, next.face_count, &face.embedding)?;
        }
        Ok(())
    }

    /// Recomputes golden vectors after faces left or joined these people.
    /// People that no longer exist are skipped.
    pub(crate) fn refresh_people(
        &self,
        people: impl IntoIterator<Item = PersonId>,
    ) -> Result<(), FaceIdError> {
        let people: BTreeSet<PersonId> = people.into_iter().collect();
        for pid in people {
            match self.recompute_identity(pid) {
                Ok(_) => {}
                Err(FaceIdError::NotFound { .. }) => {
                    warn!(person = %pid, "face referenced a missing person");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

fn stage_clusters(tx: &mut Tx, staged: StagedClusters) -> Result<(), FaceIdError> {
    for (current, next) in staged.into_values() {
        tx.update(&current, next)?;
    }
    Ok(())
}
