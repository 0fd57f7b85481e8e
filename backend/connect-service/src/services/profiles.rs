/// Profile lookup, onboarding, edits and search
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::{self, CacheTag, Invalidation, Lookup, QueryKey, SharedCache};
use crate::db::{constraints, SocialStore, StoreError};
use crate::error::{AppError, Result};
use crate::models::{NewProfile, Profile, ProfileChanges, MAX_BIO_CHARS};
use crate::services::require_viewer;

/// Maximum number of search results
pub const PROFILE_SEARCH_LIMIT: i64 = 20;

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn SocialStore>,
    cache: SharedCache,
}

impl ProfileService {
    pub fn new(store: Arc<dyn SocialStore>, cache: SharedCache) -> Self {
        Self { store, cache }
    }

    pub async fn get_by_user_id(&self, user_id: Uuid) -> Result<Profile> {
        let key = QueryKey::ProfileByUser(user_id);
        let token = match cache::lookup(&self.cache, &key) {
            Lookup::Hit(cached) => return Ok(cached),
            Lookup::Miss(token) => token,
        };

        let profile = self
            .store
            .profile_by_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

        cache::store(&self.cache, token, key, [CacheTag::Profile(user_id)], &profile);
        Ok(profile)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Profile> {
        let key = QueryKey::ProfileByUsername(username.to_string());
        let token = match cache::lookup(&self.cache, &key) {
            Lookup::Hit(cached) => return Ok(cached),
            Lookup::Miss(token) => token,
        };

        let profile = self
            .store
            .profile_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

        cache::store(&self.cache, token, key, [CacheTag::Profile(profile.user_id)], &profile);
        Ok(profile)
    }

    /// Create the viewer's profile (onboarding)
    pub async fn create(
        &self,
        viewer: Option<Uuid>,
        username: &str,
        name: &str,
    ) -> Result<Profile> {
        let user_id = require_viewer(viewer)?;
        let username = validate_username(username)?;

        let profile = self
            .store
            .insert_profile(&NewProfile {
                user_id,
                username,
                name: name.trim().to_string(),
                bio: String::new(),
                avatar_url: String::new(),
            })
            .await
            .map_err(|e| {
                if e.is_unique_violation(constraints::PROFILES_USER_ID) {
                    AppError::Conflict("Profile already exists".to_string())
                } else {
                    map_username_conflict(e)
                }
            })?;

        tracing::info!(user_id = %user_id, username = %profile.username, "profile created");
        cache::invalidate(&self.cache, Invalidation::ProfileUpdated { user_id });
        Ok(profile)
    }

    /// Apply a partial update to the viewer's own profile
    pub async fn update(
        &self,
        viewer: Option<Uuid>,
        changes: ProfileChanges,
    ) -> Result<Profile> {
        let user_id = require_viewer(viewer)?;
        let changes = check_changes(changes)?;
        if changes.is_empty() {
            return self.get_by_user_id(user_id).await;
        }

        let updated = self
            .store
            .update_profile(user_id, &changes)
            .await
            .map_err(map_username_conflict)?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

        tracing::info!(user_id = %user_id, "profile updated");
        cache::invalidate(&self.cache, Invalidation::ProfileUpdated { user_id });
        Ok(updated)
    }

    /// Case-insensitive substring search on username or name.
    ///
    /// A blank query returns nothing without a store call.
    pub async fn search(&self, query: &str) -> Result<Vec<Profile>> {
        let term = query.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let key = QueryKey::ProfileSearch(term.to_lowercase());
        let token = match cache::lookup(&self.cache, &key) {
            Lookup::Hit(cached) => return Ok(cached),
            Lookup::Miss(token) => token,
        };

        let profiles = self.store.search_profiles(term, PROFILE_SEARCH_LIMIT).await?;

        let mut tags = vec![CacheTag::ProfileSearch];
        tags.extend(profiles.iter().map(|p| CacheTag::Profile(p.user_id)));
        cache::store(&self.cache, token, key, tags, &profiles);

        Ok(profiles)
    }
}

fn validate_username(username: &str) -> Result<String> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(AppError::Validation(
            "Username cannot contain spaces".to_string(),
        ));
    }
    Ok(username.to_string())
}

fn map_username_conflict(err: StoreError) -> AppError {
    if err.is_unique_violation(constraints::PROFILES_USERNAME) {
        AppError::UsernameTaken
    } else {
        err.into()
    }
}

/// Normalize the username and bound the bio of a profile edit
pub(crate) fn check_changes(mut changes: ProfileChanges) -> Result<ProfileChanges> {
    if let Some(username) = changes.username.take() {
        changes.username = Some(validate_username(&username)?);
    }
    if let Some(bio) = &changes.bio {
        if bio.chars().count() as u64 > MAX_BIO_CHARS {
            return Err(AppError::Validation(format!(
                "Bio must be at most {} characters",
                MAX_BIO_CHARS
            )));
        }
    }
    Ok(changes)
}
