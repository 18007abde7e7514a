//! Walks through the cache's behavior against an in-memory entity store:
//! cached lists, invalidation after a write, single-flight loading and
//! cross-aggregate recommendation refresh.
//!
//! `JOBBOARD_LOG=debug JOBBOARD_LOG_FORMAT=pretty cargo run --bin jobboard-cache-demo`

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use jobboard_core::{JobBoardResult, Profile, VacancyDraft, VacancyFilter};
use jobboard_services::{
    init_tracing, EntityStore, InMemoryEntityStore, JobBoard, ServiceConfig,
};
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Serialize)]
struct DemoSummary {
    store_reads: u64,
    hits: u64,
    misses: u64,
    loads: u64,
    coalesced: u64,
    invalidated_entries: u64,
    entry_count: u64,
    hit_rate: f64,
    recommended: Vec<i64>,
}

#[tokio::main]
async fn main() -> JobBoardResult<()> {
    let config = ServiceConfig::from_env();
    init_tracing(&config.telemetry)?;

    let store = Arc::new(InMemoryEntityStore::new().with_latency(Duration::from_millis(20)));
    seed(&store)?;
    let board = JobBoard::in_memory(&config, Arc::clone(&store) as Arc<dyn EntityStore>)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = board.cache.spawn_sweeper(shutdown_rx);

    // Cached list, then a write that invalidates it.
    let by_skill = VacancyFilter::new().with_skill(3).with_page(1, 5);
    let before = board.vacancies.list(by_skill.clone()).await?;
    board.vacancies.list(by_skill.clone()).await?;
    tracing::info!(count = before.len(), "Listed vacancies requiring skill 3");

    let mut draft = VacancyDraft::new("Rust platform engineer", 7);
    draft.description = "Own the caching layer".to_string();
    draft.skill_ids = vec![3];
    let created = board.vacancies.create(draft).await?;
    let after = board.vacancies.list(by_skill).await?;
    tracing::info!(
        created = created.vacancy_id,
        count = after.len(),
        "Listed vacancies after create"
    );

    // Ten concurrent readers, one store query.
    let reads_before = store.read_count();
    let readers: Vec<_> = (0..10)
        .map(|_| {
            let categories = &board.categories;
            async move { categories.get(7).await }
        })
        .collect();
    for result in join_all(readers).await {
        result?;
    }
    tracing::info!(
        store_reads = store.read_count() - reads_before,
        "Ten concurrent category reads"
    );

    // Recommendations follow vacancy and skill changes.
    board.recommendations.recommendations_for(5).await?;
    board.vacancies.attach_skill(1, 4).await?;
    let recommended = board
        .recommendations
        .recommendations_for(5)
        .await?
        .map(|r| r.vacancy_ids().collect())
        .unwrap_or_default();

    let _ = shutdown_tx.send(true);
    match sweeper.await {
        Ok(metrics) => {
            let sweeps = metrics.snapshot();
            tracing::info!(
                sweeps = sweeps.sweeps,
                purged = sweeps.purged,
                released_tags = sweeps.released_tags,
                "Sweeper finished"
            );
        }
        Err(e) => tracing::warn!(error = %e, "Sweeper task failed"),
    }

    let stats = board.cache.stats().await;
    let summary = DemoSummary {
        store_reads: store.read_count(),
        hits: stats.hits,
        misses: stats.misses,
        loads: stats.loads,
        coalesced: stats.coalesced,
        invalidated_entries: stats.invalidated_entries,
        entry_count: stats.entry_count,
        hit_rate: stats.hit_rate(),
        recommended,
    };
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!(error = %e, "Failed to render summary"),
    }
    Ok(())
}

fn seed(store: &InMemoryEntityStore) -> JobBoardResult<()> {
    use jobboard_core::{Category, EmploymentType, ExperienceLevel, Skill, Vacancy, VacancyStatus};

    store.seed_category(Category {
        category_id: 7,
        name: "Backend development".to_string(),
    })?;
    for (skill_id, name) in [(3, "Rust"), (4, "PostgreSQL")] {
        store.seed_skill(Skill {
            skill_id,
            name: name.to_string(),
        })?;
    }
    let now = chrono::Utc::now();
    for (vacancy_id, title, skills) in [
        (1, "Backend engineer", vec![3]),
        (2, "Database engineer", vec![4]),
    ] {
        store.seed_vacancy(Vacancy {
            vacancy_id,
            title: title.to_string(),
            description: String::new(),
            recruiter_id: 7,
            company_id: None,
            category_id: Some(7),
            location_id: None,
            status: VacancyStatus::Published,
            employment: EmploymentType::FullTime,
            experience: ExperienceLevel::Middle,
            salary_from: None,
            salary_to: None,
            skill_ids: skills,
            created_at: now,
            updated_at: now,
        })?;
    }
    store.seed_profile(Profile {
        profile_id: 5,
        full_name: "Demo applicant".to_string(),
        location_id: None,
        skill_ids: vec![3, 4],
    })?;
    Ok(())
}
