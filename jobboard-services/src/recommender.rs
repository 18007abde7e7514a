//! Recommendation scoring.
//!
//! The cache treats a [`Recommendation`] as an opaque value. How it is
//! computed lives behind [`Recommender`], so a similarity service can replace
//! the skill-overlap ranking without touching caching.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use jobboard_core::{JobBoardResult, Profile, Recommendation, VacancyFilter, VacancyStatus};

use crate::entity_store::EntityStore;

/// Number of vacancies suggested when nothing else is configured.
pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 10;

/// Computes recommendations for one profile.
#[async_trait]
pub trait Recommender: Send + Sync {
    async fn recommend(&self, profile: &Profile) -> JobBoardResult<Recommendation>;
}

/// Ranks published vacancies by the share of their skills the profile has.
///
/// A vacancy scores `matched / required`; vacancies with no match are left
/// out. Ties go to the older vacancy.
pub struct SkillOverlapRecommender {
    store: Arc<dyn EntityStore>,
    limit: usize,
}

impl SkillOverlapRecommender {
    pub fn new(store: Arc<dyn EntityStore>, limit: usize) -> Self {
        Self { store, limit }
    }
}

#[async_trait]
impl Recommender for SkillOverlapRecommender {
    async fn recommend(&self, profile: &Profile) -> JobBoardResult<Recommendation> {
        let owned: HashSet<_> = profile.skill_ids.iter().copied().collect();
        let published = self
            .store
            .vacancy_list(&VacancyFilter::new().with_status(VacancyStatus::Published))
            .await?;

        let mut scored: Vec<_> = published
            .iter()
            .filter(|v| !v.skill_ids.is_empty())
            .filter_map(|v| {
                let matched = v.skill_ids.iter().filter(|s| owned.contains(s)).count();
                (matched > 0).then(|| (v.vacancy_id, matched as f32 / v.skill_ids.len() as f32))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(self.limit);

        tracing::debug!(
            profile_id = profile.profile_id,
            candidates = published.len(),
            matched = scored.len(),
            "Computed recommendations"
        );

        Ok(Recommendation {
            profile_id: profile.profile_id,
            vacancies: scored,
        })
    }
}
