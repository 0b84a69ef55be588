//! Identity store: typed, versioned access to people, clusters and faces on
//! top of a [`KVStore`].
//!
//! Every mutation is built as a [`Tx`]. Each record a unit of work read and
//! then writes (or relies on) is guarded by the exact bytes it was read
//! from, so a commit only lands if nothing it depends on changed in the
//! meantime. Losing that race surfaces as [`FaceIdError::Conflict`], and
//! [`with_retry`] re-runs the whole unit of work from a fresh read.

use std::sync::Arc;

use photoid_kv::{Batch, KVStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::FaceIdError;
use crate::keys::{
    CLUSTER_PREFIX, FACE_PREFIX, PERSON_PREFIX, cluster_key, face_key, parse_photo_face_key,
    person_key, photo_face_prefix, photo_scanned_key,
};
use crate::types::{Cluster, ClusterId, Face, FaceId, Person, PersonId};

/// A record type stored under its own key.
pub(crate) trait Record: Serialize + DeserializeOwned {
    const KIND: &'static str;

    fn key(&self) -> String;
    fn version(&self) -> u64;
    fn set_version(&mut self, v: u64);
}

impl Record for Person {
    const KIND: &'static str = "person";

    fn key(&self) -> String {
        person_key(self.id)
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, v: u64) {
        self.version = v;
    }
}

impl Record for Cluster {
    const KIND: &'static str = "cluster";

    fn key(&self) -> String {
        cluster_key(self.id)
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, v: u64) {
        self.version = v;
    }
}

impl Record for Face {
    const KIND: &'static str = "face";

    fn key(&self) -> String {
        face_key(self.id)
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, v: u64) {
        self.version = v;
    }
}

/// A decoded record together with the bytes it was decoded from.
#[derive(Debug, Clone)]
pub(crate) struct Versioned<T> {
    pub value: T,
    raw: Vec<u8>,
}

/// Snapshot of an id sequence.
#[derive(Debug, Clone)]
pub(crate) struct Seq {
    key: &'static str,
    last: u64,
    raw: Option<Vec<u8>>,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, FaceIdError> {
    rmp_serde::to_vec_named(value).map_err(|e| FaceIdError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(raw: &[u8]) -> Result<T, FaceIdError> {
    rmp_serde::from_slice(raw).map_err(|e| FaceIdError::Serialization(e.to_string()))
}

pub(crate) struct IdentityStore {
    kv: Arc<dyn KVStore>,
}

impl IdentityStore {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self { kv }
    }

    fn load<T: Record>(&self, key: &str) -> Result<Option<Versioned<T>>, FaceIdError> {
        match self.kv.get(key)? {
            Some(raw) => Ok(Some(Versioned {
                value: decode(&raw)?,
                raw,
            })),
            None => Ok(None),
        }
    }

    /// Load every record under `prefix`, in key order. Records that fail to
    /// decode are logged and skipped.
    fn load_all<T: Record>(&self, prefix: &str) -> Result<Vec<Versioned<T>>, FaceIdError> {
        let entries = self.kv.scan(prefix)?;
        let mut out = Vec::with_capacity(entries.len());
        for (key, raw) in entries {
            match decode::<T>(&raw) {
                Ok(value) => out.push(Versioned { value, raw }),
                Err(e) => warn!(kind = T::KIND, %key, error = %e, "skipping undecodable record"),
            }
        }
        Ok(out)
    }

    pub fn person(&self, id: PersonId) -> Result<Option<Versioned<Person>>, FaceIdError> {
        self.load(&person_key(id))
    }

    pub fn cluster(&self, id: ClusterId) -> Result<Option<Versioned<Cluster>>, FaceIdError> {
        self.load(&cluster_key(id))
    }

    pub fn face(&self, id: FaceId) -> Result<Option<Versioned<Face>>, FaceIdError> {
        self.load(&face_key(id))
    }

    pub fn people(&self) -> Result<Vec<Versioned<Person>>, FaceIdError> {
        self.load_all(PERSON_PREFIX)
    }

    pub fn clusters(&self) -> Result<Vec<Versioned<Cluster>>, FaceIdError> {
        self.load_all(CLUSTER_PREFIX)
    }

    pub fn faces(&self) -> Result<Vec<Versioned<Face>>, FaceIdError> {
        self.load_all(FACE_PREFIX)
    }

    /// Faces belonging to `photo`, in id order. Index entries pointing at
    /// deleted faces are skipped.
    pub fn photo_faces(&self, photo: &str) -> Result<Vec<Versioned<Face>>, FaceIdError> {
        let mut out = Vec::new();
        for (key, _) in self.kv.scan(&photo_face_prefix(photo))? {
            let Some(id) = parse_photo_face_key(photo, &key) else {
                warn!(%key, "malformed photo index key");
                continue;
            };
            match self.face(id)? {
                Some(face) => out.push(face),
                None => warn!(%photo, face = %id, "photo index points at a missing face"),
            }
        }
        Ok(out)
    }

    pub fn photo_scanned(&self, photo: &str) -> Result<Option<String>, FaceIdError> {
        Ok(self
            .kv
            .get(&photo_scanned_key(photo))?
            .map(|raw| String::from_utf8_lossy(&raw).into_owned()))
    }

    pub fn seq(&self, key: &'static str) -> Result<Seq, FaceIdError> {
        let raw = self.kv.get(key)?;
        let last = match &raw {
            Some(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| FaceIdError::Serialization(format!("corrupt sequence {key}")))?,
            None => 0,
        };
        Ok(Seq { key, last, raw })
    }

    pub fn commit(&self, tx: Tx) -> Result<(), FaceIdError> {
        if tx.batch.is_empty() {
            return Ok(());
        }
        self.kv.commit(&tx.batch)?;
        Ok(())
    }
}

/// Guarded writes against the identity store, committed atomically by
/// [`IdentityStore::commit`].
#[derive(Debug, Default)]
pub(crate) struct Tx {
    batch: Batch,
}

impl Tx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `current` to be unchanged at commit time without writing it.
    pub fn expect<T: Record>(&mut self, current: &Versioned<T>) {
        self.batch
            .guard(current.value.key(), Some(current.raw.clone()));
    }

    /// Replace `current` with `next`, bumping the version.
    pub fn update<T: Record>(
        &mut self,
        current: &Versioned<T>,
        mut next: T,
    ) -> Result<(), FaceIdError> {
        next.set_version(current.value.version() + 1);
        let key = current.value.key();
        let data = encode(&next)?;
        self.batch
            .guard(key.clone(), Some(current.raw.clone()))
            .put(key, data);
        Ok(())
    }

    /// Store a new record. Fails the commit if the key is already taken.
    pub fn insert<T: Record>(&mut self, mut record: T) -> Result<(), FaceIdError> {
        record.set_version(1);
        let key = record.key();
        let data = encode(&record)?;
        self.batch.guard(key.clone(), None).put(key, data);
        Ok(())
    }

    pub fn remove<T: Record>(&mut self, current: &Versioned<T>) {
        let key = current.value.key();
        self.batch
            .guard(key.clone(), Some(current.raw.clone()))
            .delete(key);
    }

    /// Reserve `n` ids from `seq` and return the first one.
    pub fn take_ids(&mut self, seq: &Seq, n: u64) -> u64 {
        let next = seq.last + n;
        self.batch
            .guard(seq.key, seq.raw.clone())
            .put(seq.key, next.to_string().into_bytes());
        seq.last + 1
    }

    pub fn put_raw(&mut self, key: String, value: Vec<u8>) {
        self.batch.put(key, value);
    }

    pub fn delete_raw(&mut self, key: String) {
        self.batch.delete(key);
    }
}

/// Run `f` until it commits without a write conflict, at most `attempts`
/// times. Any error other than a conflict is returned immediately.
pub(crate) fn with_retry<T>(
    op: &str,
    attempts: usize,
    mut f: impl FnMut() -> Result<T, FaceIdError>,
) -> Result<T, FaceIdError> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match f() {
            Err(FaceIdError::Conflict(key)) => {
                debug!(op, attempt, %key, "write conflict, retrying");
            }
            other => return other,
        }
    }
    warn!(op, attempts, "giving up after repeated write conflicts");
    Err(FaceIdError::Contention {
        op: op.to_string(),
        attempts,
    })
}
