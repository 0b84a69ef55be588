use chrono::Utc;
use photoid_vecmath::{is_valid, mean};
use tracing::{debug, info, warn};

use crate::error::FaceIdError;
use crate::registry::Registry;
use crate::store::Tx;
use crate::types::PersonId;

impl Registry {
    /// Recomputes a person's golden vector as the raw mean of every face
    /// currently assigned to them, ignored faces included.
    ///
    /// Embeddings of the wrong dimension are dropped first. With nothing
    /// left to average the golden vector is kept as it is and `None` is
    /// returned; otherwise the number of faces averaged.
    pub fn recompute_identity(&self, id: PersonId) -> Result<Option<usize>, FaceIdError> {
        let n = self.retry("recompute", || {
            let person = self
                .store
                .person(id)?
                .ok_or_else(|| FaceIdError::not_found("person", id))?;

            let faces: Vec<_> = self
                .store
                .faces()?
                .into_iter()
                .filter(|f| f.value.assignment.person() == Some(id))
                .collect();

            let dim = self.cfg.dim;
            let usable: Vec<&[f32]> = faces
                .iter()
                .map(|f| f.value.embedding.as_slice())
                .filter(|e| is_valid(e, dim))
                .collect();
            if usable.len() < faces.len() {
                warn!(
                    person = %id,
                    dropped = faces.len() - usable.len(),
                    "skipping unusable embeddings"
                );
            }
            let Some(golden) = mean(usable.iter().copied(), dim) else {
                debug!(person = %id, faces = faces.len(), "nothing to average, golden vector kept");
                return Ok(None);
            };

            // The faces read here must still belong to this person when the
            // new vector lands.
            let mut tx = Tx::new();
            for f in &faces {
                tx.expect(f);
            }
            let mut next = person.value.clone();
            next.golden = Some(golden);
            next.updated_at = Utc::now();
            tx.update(&person, next)?;
            self.store.commit(tx)?;
            Ok(Some(usable.len()))
        })?;

        if let Some(n) = n {
            debug!(person = %id, faces = n, "recomputed golden vector");
        }
        Ok(n)
    }

    /// Recomputes every person's golden vector. Returns how many were
    /// updated.
    pub fn rebuild_all_identities(&self) -> Result<usize, FaceIdError> {
        let people = self.store.people()?;
        let mut updated = 0;
        for p in &people {
            match self.recompute_identity(p.value.id) {
                Ok(Some(_)) => updated += 1,
                Ok(None) => {}
                // Deleted since the scan.
                Err(FaceIdError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        info!(people = people.len(), updated, "rebuilt identities");
        Ok(updated)
    }
}
