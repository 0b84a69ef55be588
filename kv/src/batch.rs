/// Precondition on a key: it must currently hold `expected`
/// (`None` = the key must be absent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub key: String,
    pub expected: Option<Vec<u8>>,
}

/// One write inside a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

impl Write {
    pub fn key(&self) -> &str {
        match self {
            Write::Put { key, .. } | Write::Delete { key } => key,
        }
    }
}

/// A set of guarded writes committed atomically by
/// [`KVStore::commit`](crate::KVStore::commit).
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub guards: Vec<Guard>,
    pub writes: Vec<Write>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to still hold `expected` at commit time.
    pub fn guard(&mut self, key: impl Into<String>, expected: Option<Vec<u8>>) -> &mut Self {
        self.guards.push(Guard {
            key: key.into(),
            expected,
        });
        self
    }

    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>) -> &mut Self {
        self.writes.push(Write::Put {
            key: key.into(),
            value,
        });
        self
    }

    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.writes.push(Write::Delete { key: key.into() });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let mut b = Batch::new();
        assert!(b.is_empty());
        b.guard("a", None)
            .guard("b", Some(b"1".to_vec()))
            .put("a", b"x".to_vec())
            .delete("b");
        assert_eq!(b.guards.len(), 2);
        assert_eq!(b.writes.len(), 2);
        assert_eq!(b.writes[0].key(), "a");
        assert_eq!(b.writes[1], Write::Delete { key: "b".into() });
        assert!(!b.is_empty());
    }
}
