//! Recommendation engine
//!
//! Collaborative filtering over collection overlaps: posts
//! collected by users with similar taste, weighted by how much of
//! the requester's collection each peer shares.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::data::{Database, PostDetail};
use crate::error::AppError;

/// Recommendation service
pub struct RecommendationService {
    db: Arc<Database>,
}

impl RecommendationService {
    /// Create new recommendation service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Recommend posts for a user
    ///
    /// # Algorithm
    /// 1. `target_set`: posts the requester has collected
    /// 2. Peers: every other user sharing at least one of them
    /// 3. Each peer scores `overlap` = |target_set ∩ peer's
    ///    collection|
    /// 4. Every peer-collected post outside the target set and
    ///    outside the requester's own posts accumulates that
    ///    peer's overlap
    /// 5. Order by accumulated score descending, post id descending
    ///    on ties
    ///
    /// A requester who has collected nothing gets an empty result.
    pub async fn recommend(&self, user_id: &str) -> Result<Vec<PostDetail>, AppError> {
        let target_set: HashSet<String> = self
            .db
            .get_collected_post_ids(user_id)
            .await?
            .into_iter()
            .collect();

        let mut peers: HashSet<String> = HashSet::new();
        for post_id in &target_set {
            for collector in self.db.get_collector_ids(post_id).await? {
                if collector != user_id {
                    peers.insert(collector);
                }
            }
        }

        let own_posts: HashSet<String> = self
            .db
            .get_owned_post_ids(user_id)
            .await?
            .into_iter()
            .collect();

        let mut scores: HashMap<String, u64> = HashMap::new();
        for peer in &peers {
            let peer_set: HashSet<String> = self
                .db
                .get_collected_post_ids(peer)
                .await?
                .into_iter()
                .collect();

            let overlap = target_set.intersection(&peer_set).count() as u64;

            for candidate in &peer_set {
                if target_set.contains(candidate) || own_posts.contains(candidate) {
                    continue;
                }
                *scores.entry(candidate.clone()).or_insert(0) += overlap;
            }
        }

        let candidate_ids: Vec<String> = scores.keys().cloned().collect();
        let mut details = self.db.get_post_details_by_ids(&candidate_ids).await?;

        details.sort_by(|a, b| {
            let score_a = scores.get(&a.post.id).copied().unwrap_or(0);
            let score_b = scores.get(&b.post.id).copied().unwrap_or(0);
            score_b.cmp(&score_a).then_with(|| b.post.id.cmp(&a.post.id))
        });

        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CollectionEntry, EntityId, User, seed_post};
    use chrono::Utc;
    use tempfile::TempDir;

    async fn test_db() -> (Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::connect(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        (Arc::new(db), temp_dir)
    }

    async fn seed_user(db: &Database, username: &str) -> User {
        let user = User {
            id: EntityId::new().0,
            username: username.to_string(),
            password_hash: "$argon2id$test".to_string(),
            created_at: Utc::now(),
        };
        db.insert_user(&user).await.unwrap();
        user
    }

    async fn collect(db: &Database, user_id: &str, post_id: &str) {
        db.insert_collection_entry(&CollectionEntry {
            id: EntityId::new().0,
            user_id: user_id.to_string(),
            post_id: post_id.to_string(),
            added: Utc::now(),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn empty_collection_yields_empty_recommendations() {
        let (db, _tmp) = test_db().await;
        let loner = seed_user(&db, "loner").await;

        let service = RecommendationService::new(db.clone());
        assert!(service.recommend(&loner.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overlapping_peer_contributes_their_extra_post() {
        let (db, _tmp) = test_db().await;
        let owner = seed_user(&db, "owner").await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;

        let posts = [
            seed_post(&db, &owner.id, "Author", "T1", "q1", "f_1").await,
            seed_post(&db, &owner.id, "Author", "T2", "q2", "f_2").await,
            seed_post(&db, &owner.id, "Author", "T3", "q3", "f_3").await,
            seed_post(&db, &owner.id, "Author", "T4", "q4", "f_4").await,
        ];

        // Alice collects {1,2,3}; Bob collects {1,2,4}
        collect(&db, &alice.id, &posts[0].id).await;
        collect(&db, &alice.id, &posts[1].id).await;
        collect(&db, &alice.id, &posts[2].id).await;
        collect(&db, &bob.id, &posts[0].id).await;
        collect(&db, &bob.id, &posts[1].id).await;
        collect(&db, &bob.id, &posts[3].id).await;

        let service = RecommendationService::new(db.clone());

        // Bob's extra post 4 is Alice's only recommendation, carried
        // by their overlap of {1,2}
        let for_alice = service.recommend(&alice.id).await.unwrap();
        assert_eq!(for_alice.len(), 1);
        assert_eq!(for_alice[0].post.id, posts[3].id);

        // Symmetrically Alice's extra post 3 is Bob's
        let for_bob = service.recommend(&bob.id).await.unwrap();
        assert_eq!(for_bob.len(), 1);
        assert_eq!(for_bob[0].post.id, posts[2].id);
    }

    #[tokio::test]
    async fn own_and_already_collected_posts_are_never_recommended() {
        let (db, _tmp) = test_db().await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;
        let carol = seed_user(&db, "carol").await;

        let shared = seed_post(&db, &carol.id, "Author", "Shared", "q", "f_1").await;
        let alices_own = seed_post(&db, &alice.id, "Author", "Own", "q", "f_2").await;

        // Both collect the shared post; Bob also collects Alice's own post
        collect(&db, &alice.id, &shared.id).await;
        collect(&db, &bob.id, &shared.id).await;
        collect(&db, &bob.id, &alices_own.id).await;

        let service = RecommendationService::new(db.clone());
        let for_alice = service.recommend(&alice.id).await.unwrap();

        // Bob's only other collected post is Alice's own: excluded
        assert!(for_alice.is_empty());
    }

    #[tokio::test]
    async fn scores_accumulate_across_peers_and_break_ties_by_id() {
        let (db, _tmp) = test_db().await;
        let owner = seed_user(&db, "owner").await;
        let requester = seed_user(&db, "requester").await;
        let peer_a = seed_user(&db, "peer_a").await;
        let peer_b = seed_user(&db, "peer_b").await;

        let liked = seed_post(&db, &owner.id, "Author", "Liked", "q", "f_0").await;
        let popular = seed_post(&db, &owner.id, "Author", "Popular", "q", "f_1").await;
        let niche = seed_post(&db, &owner.id, "Author", "Niche", "q", "f_2").await;

        collect(&db, &requester.id, &liked.id).await;

        // Both peers share `liked` (overlap 1 each); both collected
        // `popular`, only peer_b collected `niche`
        collect(&db, &peer_a.id, &liked.id).await;
        collect(&db, &peer_a.id, &popular.id).await;
        collect(&db, &peer_b.id, &liked.id).await;
        collect(&db, &peer_b.id, &popular.id).await;
        collect(&db, &peer_b.id, &niche.id).await;

        let service = RecommendationService::new(db.clone());
        let results = service.recommend(&requester.id).await.unwrap();

        // `popular` scores 2 (1 from each peer), `niche` scores 1
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].post.id, popular.id);
        assert_eq!(results[1].post.id, niche.id);
    }

    #[tokio::test]
    async fn equal_scores_order_by_descending_post_id() {
        let (db, _tmp) = test_db().await;
        let owner = seed_user(&db, "owner").await;
        let requester = seed_user(&db, "requester").await;
        let peer = seed_user(&db, "peer").await;

        let liked = seed_post(&db, &owner.id, "Author", "Liked", "q", "f_0").await;
        let first = seed_post(&db, &owner.id, "Author", "First", "q", "f_1").await;
        let second = seed_post(&db, &owner.id, "Author", "Second", "q", "f_2").await;

        collect(&db, &requester.id, &liked.id).await;
        collect(&db, &peer.id, &liked.id).await;
        collect(&db, &peer.id, &first.id).await;
        collect(&db, &peer.id, &second.id).await;

        let service = RecommendationService::new(db.clone());
        let results = service.recommend(&requester.id).await.unwrap();

        let mut expected = vec![first.id.clone(), second.id.clone()];
        expected.sort_by(|a, b| b.cmp(a));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].post.id, expected[0]);
        assert_eq!(results[1].post.id, expected[1]);
    }

    #[tokio::test]
    async fn recommendations_are_deterministic() {
        let (db, _tmp) = test_db().await;
        let owner = seed_user(&db, "owner").await;
        let requester = seed_user(&db, "requester").await;
        let peer = seed_user(&db, "peer").await;

        let liked = seed_post(&db, &owner.id, "Author", "Liked", "q", "f_0").await;
        for i in 1..=5 {
            let post = seed_post(&db, &owner.id, "Author", &format!("T{i}"), "q", &format!("f_{i}"))
                .await;
            collect(&db, &peer.id, &post.id).await;
        }
        collect(&db, &requester.id, &liked.id).await;
        collect(&db, &peer.id, &liked.id).await;

        let service = RecommendationService::new(db.clone());
        let first: Vec<String> = service
            .recommend(&requester.id)
            .await
            .unwrap()
            .into_iter()
            .map(|detail| detail.post.id)
            .collect();
        let second: Vec<String> = service
            .recommend(&requester.id)
            .await
            .unwrap()
            .into_iter()
            .map(|detail| detail.post.id)
            .collect();

        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
    }
}
