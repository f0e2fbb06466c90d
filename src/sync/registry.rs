// Process-wide registry backing the named tier of the sync primitives.
//
// Named objects are process-scoped: no supported target gets cross-process
// backing, so the registry enforces the full creation-mode contract locally
// instead of silently degrading shared-memory semantics. A name stays
// claimed for as long as at least one handle to the object is alive.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use super::{SyncError, SyncObjectCreationMode};

/// Checks a candidate name against the rules inherited from POSIX
/// `sem_open`: a leading slash followed by at least one character, with no
/// further slashes.
pub(crate) fn validate_name(name: &str) -> Result<(), SyncError> {
    let invalid = |reason| SyncError::InvalidName {
        name: name.to_string(),
        reason,
    };

    if !name.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if name.len() < 2 {
        return Err(invalid("must have at least one character after '/'"));
    }
    if name[1..].contains('/') {
        return Err(invalid("must not contain '/' after the first character"));
    }
    Ok(())
}

/// One registry per primitive kind, mapping names to the live shared state
/// of the objects carrying them. Entries are weak: dropping every handle
/// releases the name.
pub(crate) struct NamedRegistry<T> {
    entries: Mutex<HashMap<String, Weak<T>>>,
}

impl<T> NamedRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves `name` according to `mode`, constructing fresh shared state
    /// via `make` when creation is called for.
    pub(crate) fn resolve(
        &self,
        name: &str,
        mode: SyncObjectCreationMode,
        make: impl FnOnce() -> Arc<T>,
    ) -> Result<Arc<T>, SyncError> {
        validate_name(name)?;

        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, weak| weak.strong_count() > 0);

        let existing = entries.get(name).and_then(Weak::upgrade);
        match (mode, existing) {
            (SyncObjectCreationMode::CreateIfNonexistent, Some(_)) => {
                tracing::debug!("sync object {name:?} already registered, creation refused");
                Err(SyncError::AlreadyExists(name.to_string()))
            }
            (SyncObjectCreationMode::OpenExisting, None) => {
                Err(SyncError::NotFound(name.to_string()))
            }
            (_, Some(inner)) => Ok(inner),
            (_, None) => {
                let inner = make();
                entries.insert(name.to_string(), Arc::downgrade(&inner));
                Ok(inner)
            }
        }
    }
}
