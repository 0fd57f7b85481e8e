/// Read caching for connect-service
///
/// Query results are cached per `QueryKey` and tagged with every `CacheTag`
/// whose underlying data they embed. Services invalidate by tag after each
/// successful mutation; see `Invalidation` for the per-mutation tag sets.
use query_cache::{QueryCache, ReadToken};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::metrics::cache::{QUERY_CACHE_EVENTS, QUERY_CACHE_INVALIDATIONS};

/// Identity of one cached read
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    FeedPage { viewer: Uuid, page: u32 },
    ExplorePage { viewer: Option<Uuid>, page: u32 },
    UserPosts { user_id: Uuid, viewer: Option<Uuid> },
    Post { post_id: Uuid, viewer: Option<Uuid> },
    Comments(Uuid),
    ProfileByUser(Uuid),
    ProfileByUsername(String),
    ProfileSearch(String),
    FollowStatus { viewer: Uuid, target: Uuid },
    FollowCounts(Uuid),
    Followers(Uuid),
    Following(Uuid),
}

/// Piece of data a cached read depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheTag {
    /// Every viewer's feed
    Feeds,
    /// One viewer's feed
    Feed(Uuid),
    Explore,
    UserPosts(Uuid),
    /// A post with its counts and like state
    Post(Uuid),
    Comments(Uuid),
    /// A user's profile, wherever it is embedded
    Profile(Uuid),
    ProfileSearch,
    /// Follow edges touching a user
    FollowGraph(Uuid),
}

pub type SharedCache = Arc<QueryCache<QueryKey, CacheTag>>;

pub fn new_shared_cache(ttl: Duration) -> SharedCache {
    Arc::new(QueryCache::new(ttl))
}

/// Mutations and the tags each one invalidates
#[derive(Debug, Clone, Copy)]
pub enum Invalidation {
    Like { post_id: Uuid },
    Comment { post_id: Uuid },
    PostCreated { owner_id: Uuid },
    PostDeleted { owner_id: Uuid, post_id: Uuid },
    Follow { viewer: Uuid, target: Uuid },
    ProfileUpdated { user_id: Uuid },
}

impl Invalidation {
    pub fn tags(&self) -> Vec<CacheTag> {
        match *self {
            Invalidation::Like { post_id } => vec![CacheTag::Post(post_id)],
            Invalidation::Comment { post_id } => {
                vec![CacheTag::Comments(post_id), CacheTag::Post(post_id)]
            }
            Invalidation::PostCreated { owner_id } => vec![
                CacheTag::Feeds,
                CacheTag::Explore,
                CacheTag::UserPosts(owner_id),
            ],
            Invalidation::PostDeleted { owner_id, post_id } => vec![
                CacheTag::Feeds,
                CacheTag::Explore,
                CacheTag::UserPosts(owner_id),
                CacheTag::Post(post_id),
                CacheTag::Comments(post_id),
            ],
            Invalidation::Follow { viewer, target } => vec![
                CacheTag::Feed(viewer),
                CacheTag::FollowGraph(viewer),
                CacheTag::FollowGraph(target),
            ],
            Invalidation::ProfileUpdated { user_id } => {
                vec![CacheTag::Profile(user_id), CacheTag::ProfileSearch]
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Invalidation::Like { .. } => "like",
            Invalidation::Comment { .. } => "comment",
            Invalidation::PostCreated { .. } => "post_created",
            Invalidation::PostDeleted { .. } => "post_deleted",
            Invalidation::Follow { .. } => "follow",
            Invalidation::ProfileUpdated { .. } => "profile_updated",
        }
    }
}

/// Outcome of a cache lookup
pub enum Lookup<V> {
    Hit(V),
    /// Pass the token to [`store`] once the value is read from the store
    Miss(ReadToken),
}

/// Cached value for `key`, if live. Decode failures count as misses.
///
/// The token is taken before the lookup, so a mutation that lands while the
/// caller reads the store keeps the result out of the cache.
pub fn lookup<V: DeserializeOwned>(cache: &SharedCache, key: &QueryKey) -> Lookup<V> {
    let token = cache.read_token();
    match cache.get(key) {
        Ok(Some(value)) => {
            QUERY_CACHE_EVENTS.with_label_values(&["hit"]).inc();
            Lookup::Hit(value)
        }
        Ok(None) => {
            QUERY_CACHE_EVENTS.with_label_values(&["miss"]).inc();
            Lookup::Miss(token)
        }
        Err(e) => {
            tracing::warn!(?key, error = %e, "cached value could not be decoded");
            QUERY_CACHE_EVENTS.with_label_values(&["error"]).inc();
            cache.remove(key);
            Lookup::Miss(token)
        }
    }
}

pub fn store<V, I>(cache: &SharedCache, token: ReadToken, key: QueryKey, tags: I, value: &V)
where
    V: Serialize + ?Sized,
    I: IntoIterator<Item = CacheTag>,
{
    match cache.insert_fresh(token, key, tags, value) {
        Ok(true) => {}
        Ok(false) => QUERY_CACHE_EVENTS.with_label_values(&["stale"]).inc(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to cache query result");
            QUERY_CACHE_EVENTS.with_label_values(&["error"]).inc();
        }
    }
}

pub fn invalidate(cache: &SharedCache, mutation: Invalidation) {
    let tags = mutation.tags();
    let removed = cache.invalidate_all(tags.iter());
    QUERY_CACHE_INVALIDATIONS
        .with_label_values(&[mutation.label()])
        .inc_by(removed as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_only_drops_entries_embedding_that_post() {
        let cache = new_shared_cache(Duration::from_secs(60));
        let viewer = Uuid::new_v4();
        let liked = Uuid::new_v4();
        let other = Uuid::new_v4();

        store(
            &cache,
            cache.read_token(),
            QueryKey::FeedPage { viewer, page: 0 },
            [CacheTag::Feed(viewer), CacheTag::Post(liked)],
            &1,
        );
        store(
            &cache,
            cache.read_token(),
            QueryKey::FeedPage { viewer, page: 1 },
            [CacheTag::Feed(viewer), CacheTag::Post(other)],
            &2,
        );

        invalidate(&cache, Invalidation::Like { post_id: liked });

        assert!(matches!(
            lookup::<i32>(&cache, &QueryKey::FeedPage { viewer, page: 0 }),
            Lookup::Miss(_)
        ));
        assert!(matches!(
            lookup::<i32>(&cache, &QueryKey::FeedPage { viewer, page: 1 }),
            Lookup::Hit(2)
        ));
    }

    #[test]
    fn test_follow_drops_viewer_feed_and_both_graphs() {
        let viewer = Uuid::new_v4();
        let target = Uuid::new_v4();
        let tags = Invalidation::Follow { viewer, target }.tags();

        assert!(tags.contains(&CacheTag::Feed(viewer)));
        assert!(tags.contains(&CacheTag::FollowGraph(viewer)));
        assert!(tags.contains(&CacheTag::FollowGraph(target)));
        assert!(!tags.contains(&CacheTag::Feeds));
    }

    #[test]
    fn test_read_overlapping_a_like_is_not_cached() {
        let cache = new_shared_cache(Duration::from_secs(60));
        let post_id = Uuid::new_v4();
        let key = QueryKey::Post {
            post_id,
            viewer: None,
        };

        let Lookup::Miss(token) = lookup::<i32>(&cache, &key) else {
            panic!("empty cache should miss");
        };
        invalidate(&cache, Invalidation::Like { post_id });
        store(&cache, token, key.clone(), [CacheTag::Post(post_id)], &0);

        assert!(matches!(lookup::<i32>(&cache, &key), Lookup::Miss(_)));
    }
}
