//! Uniform random reviewer selection.

use std::collections::HashSet;

use quorum_core::User;
use rand::seq::index;
use rand::Rng;

/// Pick up to `count` distinct reviewers uniformly at random.
///
/// Inactive candidates, candidates in `exclude`, and repeated ids are
/// dropped before drawing. Returns fewer than `count` ids when the filtered
/// pool is smaller, and an empty vector when nothing is left.
///
/// # Examples
///
/// ```
/// use std::collections::HashSet;
///
/// use quorum_assign::select_reviewers;
/// use quorum_core::User;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let pool: Vec<User> = ["u1", "u2", "u3"]
///     .iter()
///     .map(|id| User {
///         user_id: id.to_string(),
///         username: id.to_uppercase(),
///         team_name: Some("backend".into()),
///         is_active: true,
///     })
///     .collect();
/// let exclude = HashSet::from(["u1".to_string()]);
///
/// let mut rng = StdRng::seed_from_u64(7);
/// let picked = select_reviewers(&mut rng, &pool, 2, &exclude);
/// assert_eq!(picked.len(), 2);
/// assert!(!picked.contains(&"u1".to_string()));
/// ```
pub fn select_reviewers<R: Rng + ?Sized>(
    rng: &mut R,
    candidates: &[User],
    count: usize,
    exclude: &HashSet<String>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let eligible: Vec<&str> = candidates
        .iter()
        .filter(|u| u.is_active && !exclude.contains(&u.user_id))
        .map(|u| u.user_id.as_str())
        .filter(|id| seen.insert(*id))
        .collect();

    let amount = count.min(eligible.len());
    if amount == 0 {
        return Vec::new();
    }

    index::sample(rng, eligible.len(), amount)
        .into_iter()
        .map(|i| eligible[i].to_string())
        .collect()
}

/// Pick a single reviewer, or `None` if no candidate survives filtering.
pub fn select_one<R: Rng + ?Sized>(
    rng: &mut R,
    candidates: &[User],
    exclude: &HashSet<String>,
) -> Option<String> {
    select_reviewers(rng, candidates, 1, exclude).pop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn user(id: &str, active: bool) -> User {
        User {
            user_id: id.to_string(),
            username: id.to_uppercase(),
            team_name: Some("backend".into()),
            is_active: active,
        }
    }

    fn excluding(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn never_picks_excluded_or_inactive() {
        let pool = vec![user("u1", true), user("u2", true), user("u3", false), user("u4", true)];
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = select_reviewers(&mut rng, &pool, 3, &excluding(&["u1"]));
            let mut sorted = picked.clone();
            sorted.sort();
            assert_eq!(sorted, ["u2", "u4"], "seed {seed}");
        }
    }

    #[test]
    fn caps_at_count_without_duplicates() {
        let pool: Vec<_> = (0..10).map(|i| user(&format!("u{i}"), true)).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let picked = select_reviewers(&mut rng, &pool, 4, &HashSet::new());
        assert_eq!(picked.len(), 4);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn repeated_candidates_count_once() {
        let pool = vec![user("u2", true), user("u2", true), user("u2", true)];
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(select_reviewers(&mut rng, &pool, 2, &HashSet::new()), ["u2"]);
    }

    #[test]
    fn empty_pool_or_zero_count_yields_nothing() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(select_reviewers(&mut rng, &[], 2, &HashSet::new()).is_empty());
        assert!(select_reviewers(&mut rng, &[user("u2", true)], 0, &HashSet::new()).is_empty());
        assert!(select_one(&mut rng, &[user("u2", true)], &excluding(&["u2"])).is_none());
    }

    #[test]
    fn every_candidate_is_reachable() {
        let pool = vec![user("u1", true), user("u2", true), user("u3", true)];
        let mut rng = StdRng::seed_from_u64(42);
        let mut hits = HashSet::new();
        for _ in 0..200 {
            if let Some(id) = select_one(&mut rng, &pool, &HashSet::new()) {
                hits.insert(id);
            }
        }
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn same_seed_same_choice() {
        let pool: Vec<_> = (0..8).map(|i| user(&format!("u{i}"), true)).collect();
        let a = select_reviewers(&mut StdRng::seed_from_u64(9), &pool, 3, &HashSet::new());
        let b = select_reviewers(&mut StdRng::seed_from_u64(9), &pool, 3, &HashSet::new());
        assert_eq!(a, b);
    }
}
