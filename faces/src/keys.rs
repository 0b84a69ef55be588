//! KV key layout for the identity store.
//!
//! ```text
//! person:{id_20d}                → msgpack Person
//! cluster:{id_20d}               → msgpack Cluster
//! face:{id_20d}                  → msgpack Face
//! photo:{ref}:face:{id_20d}      → empty (photo → face index)
//! photo:{ref}:scanned            → face-schema version string
//! seq:{collection}               → last allocated id, decimal
//! ```
//!
//! Ids are zero-padded to 20 digits so that prefix scans return records in
//! ascending id order.

use crate::types::{ClusterId, FaceId, PersonId};

pub const PERSON_PREFIX: &str = "person:";
pub const CLUSTER_PREFIX: &str = "cluster:";
pub const FACE_PREFIX: &str = "face:";

pub const SEQ_PERSON: &str = "seq:person";
pub const SEQ_CLUSTER: &str = "seq:cluster";
pub const SEQ_FACE: &str = "seq:face";

pub fn person_key(id: PersonId) -> String {
    format!("{PERSON_PREFIX}{:020}", id.0)
}

pub fn cluster_key(id: ClusterId) -> String {
    format!("{CLUSTER_PREFIX}{:020}", id.0)
}

pub fn face_key(id: FaceId) -> String {
    format!("{FACE_PREFIX}{:020}", id.0)
}

/// Format: "photo:{ref}:face:"
pub fn photo_face_prefix(photo: &str) -> String {
    format!("photo:{photo}:face:")
}

/// Format: "photo:{ref}:face:{id_20d}"
pub fn photo_face_key(photo: &str, id: FaceId) -> String {
    format!("photo:{photo}:face:{:020}", id.0)
}

/// Format: "photo:{ref}:scanned"
pub fn photo_scanned_key(photo: &str) -> String {
    format!("photo:{photo}:scanned")
}

/// Extract the face id from a photo index key.
pub fn parse_photo_face_key(photo: &str, key: &str) -> Option<FaceId> {
    key.strip_prefix(&photo_face_prefix(photo))?
        .parse()
        .ok()
        .map(FaceId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key_format() {
        assert_eq!(person_key(PersonId(7)), "person:00000000000000000007");
        assert_eq!(cluster_key(ClusterId(42)), "cluster:00000000000000000042");
        assert_eq!(face_key(FaceId(1)), "face:00000000000000000001");
    }

    #[test]
    fn test_record_keys_sort_numerically() {
        let k1 = cluster_key(ClusterId(9));
        let k2 = cluster_key(ClusterId(10));
        assert!(k1 < k2, "zero-padded ids must sort correctly: {k1} < {k2}");
    }

    #[test]
    fn test_photo_face_key_roundtrip() {
        let key = photo_face_key("abc123", FaceId(5));
        assert_eq!(key, "photo:abc123:face:00000000000000000005");
        assert!(key.starts_with(&photo_face_prefix("abc123")));
        assert_eq!(parse_photo_face_key("abc123", &key), Some(FaceId(5)));
        assert_eq!(parse_photo_face_key("other", &key), None);
    }

    #[test]
    fn test_photo_scanned_key_format() {
        assert_eq!(photo_scanned_key("abc"), "photo:abc:scanned");
    }
}
