//! Transactional persistence for teams, users, and pull requests.
//!
//! The assignment engine talks to storage only through the collaborator
//! traits defined here:
//! - [`IdentityStore`]: teams, users, and active-member queries
//! - [`WorkItemStore`]: pull requests and their reviewer links
//! - [`Store`]: the transaction boundary handing out a [`UnitOfWork`]
//!
//! [`SqliteStore`] is the SQLite-backed implementation.

mod identity;
pub mod sqlite;
mod work_items;

pub use identity::IdentityStore;
pub use sqlite::SqliteStore;
pub use work_items::WorkItemStore;

use quorum_core::Result;

/// Transaction-scoped access to both collaborator stores.
pub trait UnitOfWork: IdentityStore + WorkItemStore {}

impl<T: IdentityStore + WorkItemStore + ?Sized> UnitOfWork for T {}

/// A store that runs closures atomically.
///
/// `transaction` commits when the closure returns `Ok` and rolls back when it
/// returns `Err`; nothing the closure wrote is visible to other callers until
/// the commit. Implementations must serialise writing transactions so that a
/// read made inside the closure is still true when the closure's writes land.
pub trait Store: Send + Sync {
    /// Run `f` inside a writing transaction.
    ///
    /// # Errors
    ///
    /// Returns the closure's error after rolling back, or
    /// [`QuorumError::Database`](quorum_core::QuorumError::Database) if the
    /// transaction cannot be started or committed.
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn UnitOfWork) -> Result<T>;

    /// Run `f` against a consistent read-only snapshot.
    ///
    /// # Errors
    ///
    /// Same as [`Store::transaction`].
    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn UnitOfWork) -> Result<T>;
}
