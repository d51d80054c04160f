//! Operator commands for the diagnosis/roadmap flow: submit answers, view
//! the interim result, generate and show roadmaps, and check off tasks.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use horizon_core::catalog::{self, Answers};
use horizon_core::entitlement::GenerateAction;
use horizon_core::generate::Generator;
use horizon_core::service::{RoadmapService, RoadmapView};
use horizon_db::models::EntitlementTier;
use horizon_db::queries::entitlements;

use crate::serve_cmd::UnconfiguredGenerator;

/// Service for commands that never invoke the generation backend.
fn offline_service(pool: &PgPool) -> RoadmapService {
    RoadmapService::new(pool.clone(), Arc::new(UnconfiguredGenerator))
}

/// Print the question catalog.
pub fn run_questions() {
    for (idx, question) in catalog::QUESTIONS.iter().enumerate() {
        println!("{}. {} [{}]", idx + 1, question.prompt, question.id);
        for option in question.options {
            println!("   - {option}");
        }
    }
}

/// Submit answers from a JSON file: `{"question_id": "selected option", ...}`.
pub async fn run_submit(pool: &PgPool, user: Uuid, answers_file: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(answers_file)
        .with_context(|| format!("failed to read {}", answers_file.display()))?;
    let answers: Answers = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a JSON answer map", answers_file.display()))?;

    let answer_set = offline_service(pool).submit_answers(user, &answers).await?;

    println!("Answers stored (answer set {}).", answer_set.id);
    println!("Next: `horizon result` for the interim result, or `horizon generate`.");
    Ok(())
}

/// Show the rule-based interim result for the latest diagnosis.
pub async fn run_result(pool: &PgPool, user: Uuid) -> Result<()> {
    let report = offline_service(pool).interim_report(user, None).await?;

    println!("{}", report.summary);
    println!();
    println!("우선순위 TOP {}:", report.top_priorities.len());
    for (idx, item) in report.top_priorities.iter().enumerate() {
        println!("  {}. {item}", idx + 1);
    }
    println!();
    println!("이번 달 할 일:");
    for task in &report.current_tasks {
        println!("  - {task}");
    }
    Ok(())
}

/// Generate (or regenerate) the roadmap for the latest diagnosis.
pub async fn run_generate(
    pool: &PgPool,
    generator: Arc<dyn Generator>,
    user: Uuid,
    regenerate: bool,
) -> Result<()> {
    let service = RoadmapService::new(pool.clone(), generator);

    let answer_set = service
        .latest_answer_set(user)
        .await?
        .context("no diagnosis has been submitted yet; run `horizon submit` first")?;

    let action = if regenerate {
        GenerateAction::Regenerate
    } else {
        GenerateAction::Create
    };

    println!("Generating roadmap ({action})...");
    let record = service.generate(user, answer_set.id, action).await?;
    println!("Roadmap {} stored.", record.id);
    println!("Run `horizon show` to view it.");
    Ok(())
}

/// Show the current roadmap, its checklist state, and progress.
pub async fn run_show(pool: &PgPool, user: Uuid) -> Result<()> {
    let service = offline_service(pool);

    let answer_set = service
        .latest_answer_set(user)
        .await?
        .context("no diagnosis has been submitted yet")?;

    let Some(view) = service.latest_roadmap(user, answer_set.id).await? else {
        println!("No roadmap has been generated yet for the latest diagnosis.");
        println!("Run `horizon generate` to create one.");
        return Ok(());
    };

    let checklist = service.checklist(user, view.record.id).await?;
    print_roadmap(&view, &checklist);
    Ok(())
}

fn print_roadmap(view: &RoadmapView, checklist: &horizon_core::progress::Checklist) {
    println!("{}", view.roadmap.title);
    println!("{}", view.roadmap.summary);
    println!(
        "(roadmap {}, created {})",
        view.record.id,
        view.record.created_at.format("%Y-%m-%d %H:%M")
    );
    println!();

    println!("우선순위 TOP {}:", view.roadmap.top_priorities.len());
    for (idx, item) in view.roadmap.top_priorities.iter().enumerate() {
        println!("  {}. {item}", idx + 1);
    }

    for month in &view.roadmap.months {
        println!();
        println!("{}월 — {}", month.month, month.goal);
        for (idx, task) in month.tasks.iter().enumerate() {
            let mark = if checklist.is_checked(month.month, idx as u8) {
                "x"
            } else {
                " "
            };
            println!("  [{mark}] {task}");
        }
        println!("  주의: {}", month.caution);
    }

    println!();
    println!("진행률: {}/{}", view.progress.done, view.progress.total);
}

/// Check or uncheck one task of the current roadmap.
pub async fn run_check(
    pool: &PgPool,
    user: Uuid,
    month: u8,
    task_index: u8,
    undo: bool,
) -> Result<()> {
    let service = offline_service(pool);

    let answer_set = service
        .latest_answer_set(user)
        .await?
        .context("no diagnosis has been submitted yet")?;
    let view = service
        .latest_roadmap(user, answer_set.id)
        .await?
        .context("no roadmap has been generated yet")?;

    service
        .set_task_checked(user, view.record.id, month, task_index, !undo)
        .await?;
    let progress = service.progress(user, view.record.id).await?;

    let verb = if undo { "Unchecked" } else { "Checked" };
    println!("{verb} month {month} task {task_index}.");
    println!("진행률: {}/{}", progress.done, progress.total);
    Ok(())
}

/// Show completion progress for the current roadmap.
pub async fn run_progress(pool: &PgPool, user: Uuid) -> Result<()> {
    let service = offline_service(pool);

    let answer_set = service
        .latest_answer_set(user)
        .await?
        .context("no diagnosis has been submitted yet")?;
    let view = service
        .latest_roadmap(user, answer_set.id)
        .await?
        .context("no roadmap has been generated yet")?;

    println!("진행률: {}/{}", view.progress.done, view.progress.total);
    Ok(())
}

/// Set a user's entitlement tier. Stands in for the billing process.
pub async fn run_tier(pool: &PgPool, user: Uuid, tier: &str) -> Result<()> {
    let tier: EntitlementTier = tier
        .parse()
        .with_context(|| format!("invalid tier {tier:?} (expected free or pro)"))?;
    let entitlement = entitlements::set_entitlement_tier(pool, user, tier).await?;
    println!("User {} is now on the {} tier.", user, entitlement.tier);
    Ok(())
}
