//! Merges a single gateway-returned row into a local collection so the
//! session does not re-fetch after each mutation.

use uuid::Uuid;

use crate::domain::Identifiable;

/// What the gateway reported for one mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    Created(T),
    Updated(T),
    /// Insert-or-replace; the returned row may carry an existing id.
    Upserted(T),
    Deleted(Uuid),
}

/// Returns the collection with `change` applied. Created rows are appended,
/// updated rows replace in place, upserts do whichever applies and deletes
/// drop the row. Unknown ids on update are appended rather than lost.
pub fn reconcile<T>(current: &[T], change: Change<T>) -> Vec<T>
where
    T: Identifiable + Clone,
{
    let mut next = current.to_vec();
    apply(&mut next, change);
    next
}

/// In-place form of [`reconcile`].
pub fn apply<T>(rows: &mut Vec<T>, change: Change<T>)
where
    T: Identifiable,
{
    match change {
        Change::Created(row) => {
            tracing::debug!(id = %row.id(), "reconcile: created");
            rows.retain(|existing| existing.id() != row.id());
            rows.push(row);
        }
        Change::Updated(row) | Change::Upserted(row) => {
            tracing::debug!(id = %row.id(), "reconcile: replaced");
            match rows.iter_mut().find(|existing| existing.id() == row.id()) {
                Some(slot) => *slot = row,
                None => rows.push(row),
            }
        }
        Change::Deleted(id) => {
            tracing::debug!(%id, "reconcile: deleted");
            rows.retain(|existing| existing.id() != id);
        }
    }
}
