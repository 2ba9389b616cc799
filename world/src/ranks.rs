//! Privilege lists mapping usernames to ranks.

use tower_catch_core::{normalize_username, Rank};
use tower_catch_store::{KeyValueStore, RankLists, Repository};

use crate::accounts::DEFAULT_OWNER_USERNAME;

/// Rank membership for every username with elevated privileges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankRegistry {
    lists: RankLists,
}

impl RankRegistry {
    /// Loads the stored lists, seeding the default owner on first run.
    pub(crate) fn load<S: KeyValueStore>(repository: &Repository<S>) -> Self {
        let mut lists = repository.load_rank_lists().unwrap_or_else(|| RankLists {
            owner_users: vec![DEFAULT_OWNER_USERNAME.to_owned()],
            ..RankLists::default()
        });
        for list in lists_mut(&mut lists) {
            dedupe(list);
        }
        Self { lists }
    }

    /// Highest rank held by `username`; owner outranks co-owner outranks tester.
    #[must_use]
    pub fn rank_of(&self, username: &str) -> Rank {
        let normalized = normalize_username(username);
        let holds = |list: &[String]| {
            list.iter()
                .any(|name| normalize_username(name) == normalized)
        };
        if holds(&self.lists.owner_users) {
            Rank::Owner
        } else if holds(&self.lists.co_owner_users) {
            Rank::CoOwner
        } else if holds(&self.lists.tester_users) {
            Rank::Tester
        } else {
            Rank::Player
        }
    }

    /// Stored lists.
    #[must_use]
    pub fn lists(&self) -> &RankLists {
        &self.lists
    }

    pub(crate) fn save<S: KeyValueStore>(&self, repository: &mut Repository<S>) {
        repository.save_rank_lists(&self.lists);
    }

    pub(crate) fn rename<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
        old: &str,
        new: &str,
    ) {
        let normalized = normalize_username(old);
        let mut changed = false;
        for list in lists_mut(&mut self.lists) {
            for name in list.iter_mut() {
                if normalize_username(name) == normalized {
                    *name = new.to_owned();
                    changed = true;
                }
            }
            dedupe(list);
        }
        if changed {
            self.save(repository);
        }
    }

    pub(crate) fn remove<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
        username: &str,
    ) {
        let normalized = normalize_username(username);
        let mut changed = false;
        for list in lists_mut(&mut self.lists) {
            let before = list.len();
            list.retain(|name| normalize_username(name) != normalized);
            changed |= list.len() != before;
        }
        if changed {
            self.save(repository);
        }
    }
}

fn lists_mut(lists: &mut RankLists) -> [&mut Vec<String>; 3] {
    [
        &mut lists.owner_users,
        &mut lists.co_owner_users,
        &mut lists.tester_users,
    ]
}

fn dedupe(list: &mut Vec<String>) {
    let mut seen = Vec::with_capacity(list.len());
    list.retain(|name| {
        let normalized = normalize_username(name);
        if normalized.is_empty() || seen.contains(&normalized) {
            return false;
        }
        seen.push(normalized);
        true
    });
}

#[cfg(test)]
mod tests {
    use tower_catch_store::MemoryStore;

    use super::*;

    fn registry(lists: RankLists) -> (RankRegistry, Repository<MemoryStore>) {
        let mut repository = Repository::new(MemoryStore::new());
        repository.save_rank_lists(&lists);
        (RankRegistry::load(&repository), repository)
    }

    #[test]
    fn first_run_seeds_default_owner() {
        let repository = Repository::new(MemoryStore::new());
        let ranks = RankRegistry::load(&repository);
        assert_eq!(ranks.rank_of("i_am_grassy"), Rank::Owner);
        assert_eq!(ranks.rank_of("someone"), Rank::Player);
    }

    #[test]
    fn highest_rank_wins() {
        let (ranks, _) = registry(RankLists {
            owner_users: vec!["Ann".to_owned()],
            co_owner_users: vec!["ann".to_owned(), "Bea".to_owned()],
            tester_users: vec!["Bea".to_owned(), "Cid".to_owned(), "cid ".to_owned()],
        });
        assert_eq!(ranks.rank_of("ANN"), Rank::Owner);
        assert_eq!(ranks.rank_of("bea"), Rank::CoOwner);
        assert_eq!(ranks.rank_of("Cid"), Rank::Tester);
        assert_eq!(ranks.lists().tester_users.len(), 2);
    }

    #[test]
    fn rename_and_remove_follow_the_account() {
        let (mut ranks, mut repository) = registry(RankLists {
            tester_users: vec!["Ann".to_owned()],
            ..RankLists::default()
        });
        ranks.rename(&mut repository, "ann", "Zed");
        assert_eq!(ranks.rank_of("zed"), Rank::Tester);
        assert_eq!(ranks.rank_of("ann"), Rank::Player);
        assert_eq!(
            repository.load_rank_lists().map(|lists| lists.tester_users),
            Some(vec!["Zed".to_owned()])
        );

        ranks.remove(&mut repository, "ZED");
        assert_eq!(ranks.rank_of("zed"), Rank::Player);
    }
}
