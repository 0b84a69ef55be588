use std::collections::BTreeSet;

use photoid_vecmath::{cosine_distance, nearest};
use tracing::warn;

use crate::error::FaceIdError;
use crate::registry::Registry;
use crate::store::Versioned;
use crate::types::{
    Assignment, Cluster, ClusterId, ClusterSummary, Face, FaceId, FacePage, Person, PersonId,
};

pub const DEFAULT_PAGE_SIZE: usize = 60;
pub const SEARCH_LIMIT: usize = 20;

/// Ids of the people and clusters that currently exist, used to spot
/// dangling face references.
pub(crate) struct Owners {
    people: BTreeSet<PersonId>,
    clusters: BTreeSet<ClusterId>,
}

impl Owners {
    /// Reports whether `a` points at something that exists.
    pub(crate) fn holds(&self, a: &Assignment) -> bool {
        match a {
            Assignment::Unassigned => false,
            Assignment::Person(p) => self.people.contains(p),
            Assignment::Cluster(c) => self.clusters.contains(c),
        }
    }

    fn sanitize(&self, mut face: Face) -> Face {
        if face.assignment.is_assigned() && !self.holds(&face.assignment) {
            warn!(
                face = %face.id,
                assignment = %face.assignment,
                "dangling reference, reading face as unassigned"
            );
            face.assignment = Assignment::Unassigned;
        }
        face
    }
}

impl Registry {
    pub fn person(&self, id: PersonId) -> Result<Option<Person>, FaceIdError> {
        Ok(self.store.person(id)?.map(|p| p.value))
    }

    pub fn cluster(&self, id: ClusterId) -> Result<Option<Cluster>, FaceIdError> {
        Ok(self.store.cluster(id)?.map(|c| c.value))
    }

    pub fn face(&self, id: FaceId) -> Result<Option<Face>, FaceIdError> {
        let Some(face) = self.store.face(id)? else {
            return Ok(None);
        };
        Ok(Some(self.owners()?.sanitize(face.value)))
    }

    /// All people, ordered by name.
    pub fn list_people(&self) -> Result<Vec<Person>, FaceIdError> {
        let mut people: Vec<Person> = self.store.people()?.into_iter().map(|p| p.value).collect();
        people.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(people)
    }

    /// People whose name starts with `prefix`, ignoring case. At most 20
    /// results, ordered by name.
    pub fn search_people(&self, prefix: &str) -> Result<Vec<Person>, FaceIdError> {
        let prefix = prefix.trim().to_lowercase();
        Ok(self
            .list_people()?
            .into_iter()
            .filter(|p| p.name.to_lowercase().starts_with(&prefix))
            .take(SEARCH_LIMIT)
            .collect())
    }

    /// Cluster summaries ordered by id.
    ///
    /// Each carries a representative face: the member nearest the centroid,
    /// ties to the lowest face id. Only members that count towards the
    /// centroid are considered, except for ignored clusters whose members
    /// are all ignored.
    pub fn list_clusters(&self, include_ignored: bool) -> Result<Vec<ClusterSummary>, FaceIdError> {
        let clusters = self.store.clusters()?;
        let faces = self.store.faces()?;

        let mut out = Vec::with_capacity(clusters.len());
        for c in clusters.into_iter().map(|c| c.value) {
            if c.ignored && !include_ignored {
                continue;
            }
            let members = faces.iter().filter(|f| {
                f.value.assignment.cluster() == Some(c.id) && (c.ignored || !f.value.ignored)
            });
            let representative = nearest(
                &c.centroid,
                members.map(|f| (f.value.id, f.value.embedding.as_slice())),
            )
            .map(|m| m.id);

            out.push(ClusterSummary {
                id: c.id,
                face_count: c.face_count,
                ignored: c.ignored,
                centroid: c.centroid,
                representative,
            });
        }
        Ok(out)
    }

    /// Faces assigned to a person, ordered by id.
    pub fn faces_for_person(&self, id: PersonId) -> Result<Vec<Face>, FaceIdError> {
        if self.store.person(id)?.is_none() {
            return Err(FaceIdError::not_found("person", id));
        }
        self.faces_where(|f| f.assignment.person() == Some(id))
    }

    /// Faces assigned to a cluster, ordered by id.
    pub fn faces_for_cluster(&self, id: ClusterId) -> Result<Vec<Face>, FaceIdError> {
        if self.store.cluster(id)?.is_none() {
            return Err(FaceIdError::not_found("cluster", id));
        }
        self.faces_where(|f| f.assignment.cluster() == Some(id))
    }

    /// One page of non-ignored faces, newest first. Page numbers start at 1;
    /// a zero page or page size falls back to the first page of 60.
    pub fn list_faces(&self, page: usize, page_size: usize) -> Result<FacePage, FaceIdError> {
        let page = page.max(1);
        let page_size = if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size };

        let owners = self.owners()?;
        let mut faces: Vec<Versioned<Face>> = self
            .store
            .faces()?
            .into_iter()
            .filter(|f| !f.value.ignored)
            .collect();
        faces.reverse();

        let total = faces.len();
        let total_pages = total.div_ceil(page_size).max(1);
        let faces = faces
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .map(|f| owners.sanitize(f.value))
            .collect();

        Ok(FacePage {
            faces,
            page,
            total_pages,
            total,
        })
    }

    /// Faces detected on `photo`, in detection order.
    pub fn photo_faces(&self, photo: &str) -> Result<Vec<Face>, FaceIdError> {
        let owners = self.owners()?;
        let mut faces: Vec<Face> = self
            .store
            .photo_faces(photo)?
            .into_iter()
            .map(|f| owners.sanitize(f.value))
            .collect();
        faces.sort_by_key(|f| (f.face_index, f.id));
        Ok(faces)
    }

    /// The face-schema version `photo` was last scanned with.
    pub fn photo_scanned(&self, photo: &str) -> Result<Option<String>, FaceIdError> {
        self.store.photo_scanned(photo)
    }

    /// Cosine distance between a face and its owner's vector, for display.
    pub fn owner_distance(&self, face: &Face) -> Result<Option<f32>, FaceIdError> {
        let target = match face.assignment {
            Assignment::Unassigned => None,
            Assignment::Person(p) => self.store.person(p)?.and_then(|p| p.value.golden),
            Assignment::Cluster(c) => self.store.cluster(c)?.map(|c| c.value.centroid),
        };
        Ok(target.map(|t| cosine_distance(&face.embedding, &t)))
    }

    fn faces_where(&self, pred: impl Fn(&Face) -> bool) -> Result<Vec<Face>, FaceIdError> {
        Ok(self
            .store
            .faces()?
            .into_iter()
            .map(|f| f.value)
            .filter(|f| pred(f))
            .collect())
    }

    pub(crate) fn owners(&self) -> Result<Owners, FaceIdError> {
        Ok(Owners {
            people: self.store.people()?.into_iter().map(|p| p.value.id).collect(),
            clusters: self.store.clusters()?.into_iter().map(|c| c.value.id).collect(),
        })
    }
}
