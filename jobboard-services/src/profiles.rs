//! Applicant profiles and their cached recommendations.

use std::sync::Arc;

use jobboard_cache::{DerivedView, KeySpec, Mutation, TtlClass};
use jobboard_core::{
    EntityId, EntityKind, EntityRef, JobBoardResult, Profile, Recommendation, ValidationError,
};

use crate::entity_store::EntityStore;
use crate::recommender::Recommender;
use crate::CacheImpl;

/// Cached access to applicant profiles.
pub struct ProfileService {
    cache: Arc<CacheImpl>,
    store: Arc<dyn EntityStore>,
}

impl ProfileService {
    pub fn new(cache: Arc<CacheImpl>, store: Arc<dyn EntityStore>) -> Self {
        Self { cache, store }
    }

    pub async fn get(&self, id: EntityId) -> JobBoardResult<Option<Profile>> {
        let store = Arc::clone(&self.store);
        self.cache
            .get_or_load(
                &KeySpec::entity(EntityKind::Profile, id),
                TtlClass::Entity,
                move || async move { store.profile_get(id).await },
            )
            .await
    }

    /// Insert or replace a profile. Drops the profile's own recommendations.
    pub async fn upsert(&self, profile: Profile) -> JobBoardResult<Profile> {
        if profile.full_name.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "full_name".to_string(),
            }
            .into());
        }

        let before = self.store.profile_get(profile.profile_id).await?;
        let saved = self.store.profile_upsert(profile).await?;

        let mutation = match &before {
            Some(before) => Mutation::updated(EntityRef::profile(saved.profile_id))
                .with_related(related_refs(before)),
            None => Mutation::created(EntityRef::profile(saved.profile_id)),
        };
        self.cache
            .invalidate(&mutation.with_related(related_refs(&saved)))
            .await;
        Ok(saved)
    }
}

fn related_refs(profile: &Profile) -> Vec<EntityRef> {
    let mut refs: Vec<_> = profile.skill_ids.iter().copied().map(EntityRef::skill).collect();
    refs.extend(
        profile
            .location_id
            .map(|id| EntityRef::new(EntityKind::Location, id)),
    );
    refs
}

/// Recommendations per profile, cached as a derived view.
///
/// The view is dropped whenever a vacancy or skill changes, and for one
/// profile when that profile changes.
pub struct RecommendationService {
    cache: Arc<CacheImpl>,
    store: Arc<dyn EntityStore>,
    recommender: Arc<dyn Recommender>,
}

impl RecommendationService {
    pub fn new(
        cache: Arc<CacheImpl>,
        store: Arc<dyn EntityStore>,
        recommender: Arc<dyn Recommender>,
    ) -> Self {
        Self {
            cache,
            store,
            recommender,
        }
    }

    /// Recommendations for `profile_id`, or `None` if the profile does not
    /// exist.
    pub async fn recommendations_for(
        &self,
        profile_id: EntityId,
    ) -> JobBoardResult<Option<Recommendation>> {
        let store = Arc::clone(&self.store);
        let recommender = Arc::clone(&self.recommender);
        self.cache
            .get_or_load(
                &KeySpec::view(DerivedView::Recommendations, profile_id),
                TtlClass::View,
                move || async move {
                    let Some(profile) = store.profile_get(profile_id).await? else {
                        return Ok(None);
                    };
                    recommender.recommend(&profile).await.map(Some)
                },
            )
            .await
    }
}
