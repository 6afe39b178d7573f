//! ShowSet walkthrough example.
//!
//! This example demonstrates:
//! - Creating a ShowSet and moving it through the stage pipeline
//! - Engineer and customer review
//! - An upstream revision with its cascade
//! - Resuming revised work and the resulting version bump
//! - Locking and unlocking
//! - Observing published effects
//!
//! Run with: `RUST_LOG=showset_workflow=debug cargo run --example showset_walkthrough`

use showset_workflow::{
    Action, Actor, Effect, MemoryShowSetStore, ReviewDecision, Role, StageName, TransitionContext,
    WorkflowEngine, WorkflowError, WorkflowService,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const ID: &str = "SS-07-01";

fn as_user(user: &str, role: Role) -> TransitionContext {
    TransitionContext::new(Actor::new(user, role))
}

fn start(stage: StageName) -> Action {
    Action::Start {
        stage,
        skip_version_increment: false,
    }
}

fn finish(stage: StageName) -> Action {
    Action::Finish {
        stage,
        mark_complete: true,
    }
}

fn approve(stage: StageName) -> Action {
    Action::Approve {
        stage,
        decision: ReviewDecision::Complete,
        revision_note: None,
        revision_note_lang: None,
    }
}

#[tokio::main]
async fn main() -> Result<(), WorkflowError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("╔═══════════════════════════════════════════╗");
    println!("║  ShowSet Workflow Walkthrough             ║");
    println!("╚═══════════════════════════════════════════╝\n");

    let service = WorkflowService::new(WorkflowEngine::default(), MemoryShowSetStore::new());

    // Print effects as they are committed
    let mut effects = service.subscribe();
    tokio::spawn(async move {
        while let Ok(published) = effects.recv().await {
            match published.effect {
                Effect::StageChanged {
                    stage, from, to, ..
                } => {
                    println!("   [rev {}] {} {} -> {}", published.revision, stage, from, to);
                }
                Effect::VersionRecorded { entry } => {
                    println!(
                        "   [rev {}] {} is now v{}",
                        published.revision, entry.version_type, entry.version
                    );
                }
                Effect::Locked { by, .. } => println!("   [rev {}] locked by {}", published.revision, by),
                Effect::Unlocked { by, .. } => {
                    println!("   [rev {}] unlocked by {}", published.revision, by)
                }
                _ => {}
            }
        }
    });

    service.create(ID, "Hall B", "Finale").await?;
    println!("📄 Created show set {}\n", ID);

    let modeller = as_user("mia", Role::Modeller3d);
    let engineer = as_user("eli", Role::Engineer);
    let bim = as_user("bo", Role::BimCoordinator);
    let customer = as_user("cam", Role::CustomerReviewer);
    let drafter = as_user("dee", Role::Drafter2d);
    let admin = as_user("ada", Role::Admin);

    println!("▶️  Modelling");
    println!("─────────────────────────────────────────");
    for stage in [StageName::Screen, StageName::Structure, StageName::Integrated] {
        service.apply(ID, &modeller, &start(stage)).await?;
        service.apply(ID, &modeller, &finish(stage)).await?;
    }
    service
        .apply(ID, &engineer, &approve(StageName::Integrated))
        .await?;

    println!("\n▶️  Publication and drawings");
    println!("─────────────────────────────────────────");
    service.apply(ID, &bim, &start(StageName::InBim360)).await?;
    service.apply(ID, &bim, &finish(StageName::InBim360)).await?;
    service
        .apply(ID, &customer, &approve(StageName::InBim360))
        .await?;
    service.apply(ID, &drafter, &start(StageName::Drawing2d)).await?;

    println!("\n▶️  Drafter sends structure back");
    println!("─────────────────────────────────────────");
    service
        .apply(
            ID,
            &drafter,
            &Action::RequestUpstreamRevision {
                target_stages: vec![StageName::Structure],
                current_stage: StageName::Drawing2d,
                revision_note: "beam clashes with truss".to_string(),
                revision_note_lang: Some("en".to_string()),
                attachment: None,
            },
        )
        .await?;

    println!("\n▶️  Modeller resumes structure");
    println!("─────────────────────────────────────────");
    service.apply(ID, &modeller, &start(StageName::Structure)).await?;

    println!("\n▶️  Lock");
    println!("─────────────────────────────────────────");
    service.apply(ID, &admin, &Action::Lock).await?;
    if let Err(e) = service.apply(ID, &modeller, &finish(StageName::Structure)).await {
        println!("   rejected: {} ({})", e, e.kind());
    }
    service
        .apply(
            ID,
            &admin,
            &Action::Unlock {
                stages_to_reset: vec![],
            },
        )
        .await?;

    // Give the effect printer time to catch up
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    println!("\n📊 Final status:");
    println!("─────────────────────────────────────────");
    println!("{}", service.status(ID).await?);

    println!("📝 Activity log:");
    for entry in service.activity(ID).await? {
        println!("   {} {:<8} {}", entry.at.format("%H:%M:%S"), entry.user_id, entry.summary);
    }

    Ok(())
}
