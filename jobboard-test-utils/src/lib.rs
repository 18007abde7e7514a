//! Jobboard Test Utilities
//!
//! Shared test infrastructure for the job board crates:
//! - Counting suppliers for observing how often the cache loads
//! - Proptest generators for filters, kinds and references
//! - Fixtures for common records
//! - Assertion helpers

use std::future::{ready, Ready};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use jobboard_core::*;
use tokio::sync::oneshot;

// ============================================================================
// COUNTING SUPPLIERS
// ============================================================================

/// Counts supplier invocations.
///
/// Every supplier built from one counter increments the same count when it
/// is called, not when it is built.
#[derive(Debug, Clone, Default)]
pub struct CallCounter {
    calls: Arc<AtomicUsize>,
}

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of suppliers invoked so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Count one invocation by hand (for custom suppliers).
    pub fn record(&self) -> usize {
        self.calls.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Supplier resolving immediately to `value`.
    pub fn returning<V>(&self, value: V) -> impl FnOnce() -> Ready<JobBoardResult<V>> + Send + 'static
    where
        V: Send + 'static,
    {
        let counter = self.clone();
        move || {
            counter.record();
            ready(Ok(value))
        }
    }

    /// Supplier resolving immediately to `error`.
    pub fn failing<V>(&self, error: JobBoardError) -> impl FnOnce() -> Ready<JobBoardResult<V>> + Send + 'static
    where
        V: Send + 'static,
    {
        let counter = self.clone();
        move || {
            counter.record();
            ready(Err(error))
        }
    }

    /// Supplier resolving to `result` after `delay` of tokio time.
    pub fn delayed<V>(
        &self,
        result: JobBoardResult<V>,
        delay: Duration,
    ) -> impl FnOnce() -> BoxFuture<'static, JobBoardResult<V>> + Send + 'static
    where
        V: Send + 'static,
    {
        let counter = self.clone();
        move || {
            counter.record();
            async move {
                tokio::time::sleep(delay).await;
                result
            }
            .boxed()
        }
    }

    /// Supplier that resolves to `value` once the returned [`Gate`] opens
    /// (or is dropped).
    pub fn gated<V>(
        &self,
        value: V,
    ) -> (
        Gate,
        impl FnOnce() -> BoxFuture<'static, JobBoardResult<V>> + Send + 'static,
    )
    where
        V: Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<()>();
        let counter = self.clone();
        let supplier = move || {
            counter.record();
            async move {
                let _ = rx.await;
                Ok(value)
            }
            .boxed()
        };
        (Gate(Some(tx)), supplier)
    }
}

/// Release handle for a [`CallCounter::gated`] supplier.
#[derive(Debug)]
pub struct Gate(Option<oneshot::Sender<()>>);

impl Gate {
    pub fn open(mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for job board types.

    use super::*;
    use proptest::prelude::*;

    /// Generate any entity kind.
    pub fn arb_entity_kind() -> impl Strategy<Value = EntityKind> {
        prop::sample::select(EntityKind::ALL.to_vec())
    }

    /// Generate a small positive id, so that collisions between generated
    /// values are likely.
    pub fn arb_small_id() -> impl Strategy<Value = EntityId> {
        1i64..16
    }

    pub fn arb_entity_ref() -> impl Strategy<Value = EntityRef> {
        (arb_entity_kind(), arb_small_id()).prop_map(|(kind, id)| EntityRef::new(kind, id))
    }

    pub fn arb_vacancy_status() -> impl Strategy<Value = VacancyStatus> {
        prop_oneof![
            Just(VacancyStatus::Draft),
            Just(VacancyStatus::Published),
            Just(VacancyStatus::Archived),
        ]
    }

    pub fn arb_employment_type() -> impl Strategy<Value = EmploymentType> {
        prop_oneof![
            Just(EmploymentType::FullTime),
            Just(EmploymentType::PartTime),
            Just(EmploymentType::Contract),
            Just(EmploymentType::Internship),
        ]
    }

    pub fn arb_experience_level() -> impl Strategy<Value = ExperienceLevel> {
        prop_oneof![
            Just(ExperienceLevel::NoExperience),
            Just(ExperienceLevel::Junior),
            Just(ExperienceLevel::Middle),
            Just(ExperienceLevel::Senior),
        ]
    }

    /// Search text, including blanks and the key codec's special characters.
    pub fn arb_search_text() -> impl Strategy<Value = Option<String>> {
        prop::option::of(prop_oneof![
            "[a-z ]{0,12}",
            "[a-z:=\\\\]{1,8}",
            Just("   ".to_string()),
        ])
    }

    pub fn arb_list_filter() -> impl Strategy<Value = ListFilter> {
        (
            arb_search_text(),
            prop::option::of(0u32..3),
            prop::option::of(0u32..3),
        )
            .prop_map(|(search, page, page_size)| ListFilter {
                search,
                page,
                page_size,
            })
    }

    pub fn arb_vacancy_filter() -> impl Strategy<Value = VacancyFilter> {
        (
            (
                arb_search_text(),
                prop::option::of(arb_vacancy_status()),
                prop::option::of(arb_employment_type()),
                prop::option::of(arb_experience_level()),
            ),
            (
                prop::option::of(0i64..4),
                prop::option::of(0i64..4),
                prop::option::of(0i64..4),
                prop::option::of(0i64..4),
                prop::option::of(0i64..4),
            ),
            (prop::option::of(0u32..3), prop::option::of(0u32..3)),
        )
            .prop_map(
                |(
                    (search, status, employment, experience),
                    (company_id, recruiter_id, category_id, location_id, skill_id),
                    (page, page_size),
                )| VacancyFilter {
                    search,
                    status,
                    employment,
                    experience,
                    company_id,
                    recruiter_id,
                    category_id,
                    location_id,
                    skill_id,
                    page,
                    page_size,
                },
            )
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records for common testing scenarios.

    use super::*;
    use chrono::{DateTime, Utc};

    /// Fixed creation time so fixtures compare equal across runs.
    pub fn epoch() -> Timestamp {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default()
    }

    /// Published full-time vacancy owned by `recruiter_id`.
    pub fn vacancy(vacancy_id: EntityId, recruiter_id: EntityId) -> Vacancy {
        Vacancy {
            vacancy_id,
            title: format!("Vacancy {}", vacancy_id),
            description: "Build and run services".to_string(),
            recruiter_id,
            company_id: None,
            category_id: None,
            location_id: None,
            status: VacancyStatus::Published,
            employment: EmploymentType::FullTime,
            experience: ExperienceLevel::Middle,
            salary_from: Some(100_000),
            salary_to: None,
            skill_ids: Vec::new(),
            created_at: epoch(),
            updated_at: epoch(),
        }
    }

    pub fn vacancy_draft(title: &str, recruiter_id: EntityId) -> VacancyDraft {
        VacancyDraft {
            description: format!("{} role", title),
            experience: ExperienceLevel::Middle,
            ..VacancyDraft::new(title, recruiter_id)
        }
    }

    pub fn category(category_id: EntityId, name: &str) -> Category {
        Category {
            category_id,
            name: name.to_string(),
        }
    }

    pub fn skill(skill_id: EntityId, name: &str) -> Skill {
        Skill {
            skill_id,
            name: name.to_string(),
        }
    }

    pub fn profile(profile_id: EntityId, skill_ids: &[EntityId]) -> Profile {
        Profile {
            profile_id,
            full_name: format!("Applicant {}", profile_id),
            location_id: None,
            skill_ids: skill_ids.to_vec(),
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for job board results.

    use super::*;

    /// Assert that a result is a storage "not found" for the given kind.
    pub fn assert_not_found<T: std::fmt::Debug>(result: &JobBoardResult<T>, kind: EntityKind) {
        match result {
            Err(JobBoardError::Storage(StorageError::NotFound { kind: found, .. })) => {
                assert_eq!(*found, kind, "Expected NotFound for {:?}, got {:?}", kind, found);
            }
            other => panic!("Expected NotFound error, got {:?}", other),
        }
    }

    /// Assert that a result is a validation error.
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &JobBoardResult<T>) {
        assert!(
            matches!(result, Err(JobBoardError::Validation(_))),
            "Expected validation error, got {:?}",
            result
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counter_counts_calls_not_builds() {
        let counter = CallCounter::new();
        let supplier = counter.returning(5);
        assert_eq!(counter.calls(), 0);
        assert_eq!(supplier().await.unwrap(), 5);
        assert_eq!(counter.calls(), 1);
    }

    #[tokio::test]
    async fn test_gated_supplier_waits_for_gate() {
        let counter = CallCounter::new();
        let (gate, supplier) = counter.gated("done");
        let pending = tokio::spawn(supplier());
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());
        gate.open();
        assert_eq!(pending.await.unwrap().unwrap(), "done");
    }
}
