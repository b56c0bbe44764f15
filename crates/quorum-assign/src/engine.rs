//! The assignment engine.

use std::sync::{Mutex, PoisonError};

use quorum_core::AssignmentConfig;
use quorum_store::Store;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Entry point for every reviewer assignment operation.
///
/// The engine keeps no state between calls apart from its random source;
/// everything else lives in the store. Operations are spread over the
/// lifecycle (`create_pr`, `merge_pr`, `reassign_reviewer`), roster
/// (`add_team`, `get_team`, `set_user_active`, `user_reviews`, `stats`) and
/// cascade (`deactivate_team`) modules.
///
/// # Examples
///
/// ```
/// use quorum_assign::ReviewEngine;
/// use quorum_core::{AssignmentConfig, Team, TeamMember};
/// use quorum_store::SqliteStore;
///
/// let store = SqliteStore::in_memory().unwrap();
/// let engine = ReviewEngine::with_seed(store, AssignmentConfig::default(), 1);
///
/// let member = |id: &str| TeamMember {
///     user_id: id.into(),
///     username: id.to_uppercase(),
///     is_active: true,
/// };
/// engine
///     .add_team(Team {
///         team_name: "backend".into(),
///         members: vec![member("u1"), member("u2"), member("u3")],
///     })
///     .unwrap();
///
/// let pr = engine.create_pr("pr-1", "Add cache", "u1").unwrap();
/// assert_eq!(pr.assigned_reviewers.len(), 2);
/// assert!(!pr.has_reviewer("u1"));
/// ```
pub struct ReviewEngine<S> {
    pub(crate) store: S,
    pub(crate) config: AssignmentConfig,
    rng: Mutex<StdRng>,
}

impl<S: Store> ReviewEngine<S> {
    /// Create an engine whose random source is seeded from the OS.
    pub fn new(store: S, config: AssignmentConfig) -> Self {
        Self::with_rng(store, config, StdRng::from_entropy())
    }

    /// Create an engine with a deterministic random source.
    pub fn with_seed(store: S, config: AssignmentConfig, seed: u64) -> Self {
        Self::with_rng(store, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(store: S, config: AssignmentConfig, rng: StdRng) -> Self {
        Self {
            store,
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &AssignmentConfig {
        &self.config
    }

    /// Run `f` with exclusive access to the random source.
    pub(crate) fn draw<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // A panic mid-draw cannot leave the generator in an invalid state.
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *rng)
    }
}
