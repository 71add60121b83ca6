//! Identity lookups between local and remote records.

use crate::storage::{Binding, SqliteStorage};

use super::types::SyncResult;

/// Read-only view of the bindings of one model on one backend.
///
/// Writes go through [`SqliteStorage::bind`] and
/// [`SqliteStorage::reset_external_id`].
#[derive(Clone, Copy)]
pub struct Binder<'a> {
    storage: &'a SqliteStorage,
    backend: &'a str,
    model: &'a str,
}

impl<'a> Binder<'a> {
    #[must_use]
    pub fn new(storage: &'a SqliteStorage, backend: &'a str, model: &'a str) -> Self {
        Self {
            storage,
            backend,
            model,
        }
    }

    #[must_use]
    pub fn model(&self) -> &str {
        self.model
    }

    /// Map a remote id to the binding row id, or to the local record id
    /// when `unwrap` is set. `None` when unbound.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn to_internal(&self, external_id: i64, unwrap: bool) -> SyncResult<Option<i64>> {
        Ok(self
            .binding_for_external(external_id)?
            .map(|b| if unwrap { b.local_id } else { b.id }))
    }

    /// Map to the remote id. With `wrap`, `id` is a local record id,
    /// otherwise a binding row id. `None` when unbound or reset.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn to_external(&self, id: i64, wrap: bool) -> SyncResult<Option<i64>> {
        let binding = if wrap {
            self.binding_for_local(id)?
        } else {
            self.storage
                .get_binding(id)?
                .filter(|b| b.backend == self.backend && b.model == self.model)
        };
        Ok(binding.filter(Binding::is_bound).map(|b| b.external_id))
    }

    /// Full binding row of a remote record.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn binding_for_external(&self, external_id: i64) -> SyncResult<Option<Binding>> {
        Ok(self
            .storage
            .binding_by_external(self.backend, self.model, external_id)?)
    }

    /// Full binding row of a local record, bound or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn binding_for_local(&self, local_id: i64) -> SyncResult<Option<Binding>> {
        Ok(self
            .storage
            .binding_by_local(self.backend, self.model, local_id)?)
    }
}
