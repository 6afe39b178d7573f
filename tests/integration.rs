//! Integration tests for the ShowSet workflow engine.
//!
//! These tests drive the full stack through [`WorkflowService`]:
//! - Upstream revision and cascades
//! - Version bumps on resumed work
//! - Engineer and client review
//! - Lock and unlock
//! - Optimistic concurrency and retries
//! - Published effects and the activity log

use showset_workflow::{
    Action, Actor, ChangeCause, Effect, ErrorKind, MemoryShowSetStore, ReviewDecision, Role,
    ShowSetStore, StageName, StageStatus, TransitionContext, VersionGroup, WorkflowEngine,
    WorkflowService, WorkingContext,
};
use StageName::*;

const ID: &str = "SS-07-01";

fn service() -> WorkflowService<MemoryShowSetStore> {
    WorkflowService::new(WorkflowEngine::default(), MemoryShowSetStore::new())
}

fn ctx(user: &str, role: Role) -> TransitionContext {
    TransitionContext::new(Actor::new(user, role))
}

fn admin() -> TransitionContext {
    ctx("admin-1", Role::Admin)
}

async fn create() -> WorkflowService<MemoryShowSetStore> {
    let service = service();
    service.create(ID, "Hall B", "Finale").await.unwrap();
    service
}

/// Arranges stage statuses with admin overrides.
async fn arrange(service: &WorkflowService<MemoryShowSetStore>, statuses: &[(StageName, StageStatus)]) {
    for (stage, status) in statuses {
        service
            .apply(
                ID,
                &admin(),
                &Action::SetStatus {
                    stage: *stage,
                    status: *status,
                    revision_note: None,
                },
            )
            .await
            .unwrap();
    }
}

async fn status_of(service: &WorkflowService<MemoryShowSetStore>, stage: StageName) -> StageStatus {
    service.load(ID).await.unwrap().status(stage).unwrap()
}

#[tokio::test]
async fn test_upstream_revision_cascades_without_version_bump() {
    let service = create().await;
    arrange(&service, &[(Screen, StageStatus::Complete), (Structure, StageStatus::Complete)]).await;
    let before = service.load(ID).await.unwrap();

    let outcome = service
        .apply(
            ID,
            &ctx("m-1", Role::Modeller3d),
            &Action::RequestUpstreamRevision {
                target_stages: vec![Screen],
                current_stage: Structure,
                revision_note: "redo layout".to_string(),
                revision_note_lang: Some("en".to_string()),
                attachment: None,
            },
        )
        .await
        .unwrap();

    let after = &outcome.show_set;
    assert_eq!(after.status(Screen), Some(StageStatus::RevisionRequired));
    assert_eq!(after.status(Structure), Some(StageStatus::RevisionRequired));
    assert_eq!(after.status(Integrated), Some(StageStatus::NotStarted));
    assert_eq!(after.versions, before.versions);
    assert!(after.version_history.is_empty());

    let note = after.record(Screen).unwrap().revision_note.as_ref().unwrap();
    assert_eq!(note.text, "redo layout");
    assert_eq!(note.by, "m-1");

    // structure was pulled along by the cascade
    assert!(outcome
        .effects
        .iter()
        .any(|e| e.stage() == Some(Structure) && e.is_cascade()));
}

#[tokio::test]
async fn test_upstream_revision_requires_note() {
    let service = create().await;
    arrange(&service, &[(Screen, StageStatus::Complete), (Structure, StageStatus::InProgress)]).await;

    let err = service
        .apply(
            ID,
            &ctx("m-1", Role::Modeller3d),
            &Action::RequestUpstreamRevision {
                target_stages: vec![Screen],
                current_stage: Structure,
                revision_note: "   ".to_string(),
                revision_note_lang: None,
                attachment: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingRevisionNote);
    assert_eq!(status_of(&service, Screen).await, StageStatus::Complete);
}

#[tokio::test]
async fn test_drafter_resumes_drawing_and_bumps_version() {
    let service = create().await;
    arrange(&service, &[(Drawing2d, StageStatus::RevisionRequired)]).await;

    let outcome = service
        .apply(
            ID,
            &ctx("d-1", Role::Drafter2d),
            &Action::Start {
                stage: Drawing2d,
                skip_version_increment: false,
            },
        )
        .await
        .unwrap();

    let show_set = &outcome.show_set;
    assert_eq!(show_set.status(Drawing2d), Some(StageStatus::InProgress));
    assert_eq!(show_set.version(VersionGroup::Drawing), 2);
    assert_eq!(show_set.version_history.len(), 1);
    assert_eq!(show_set.version_history[0].version_type, VersionGroup::Drawing);
    assert_eq!(outcome.version_entries().len(), 1);
}

#[tokio::test]
async fn test_skip_version_increment() {
    let service = create().await;
    arrange(&service, &[(Drawing2d, StageStatus::RevisionRequired)]).await;

    let outcome = service
        .apply(
            ID,
            &ctx("d-1", Role::Drafter2d),
            &Action::Start {
                stage: Drawing2d,
                skip_version_increment: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.show_set.version(VersionGroup::Drawing), 1);
    assert!(outcome.show_set.version_history.is_empty());
}

#[tokio::test]
async fn test_engineer_rejects_integrated() {
    let service = create().await;
    arrange(&service, &[(Integrated, StageStatus::EngineerReview)]).await;

    let outcome = service
        .apply(
            ID,
            &ctx("eng-1", Role::Engineer),
            &Action::Approve {
                stage: Integrated,
                decision: ReviewDecision::RevisionRequired,
                revision_note: Some("fix clipping".to_string()),
                revision_note_lang: None,
            },
        )
        .await
        .unwrap();

    let record = outcome.show_set.record(Integrated).unwrap();
    assert_eq!(record.status, StageStatus::RevisionRequired);
    let note = record.revision_note.as_ref().unwrap();
    assert_eq!(note.text, "fix clipping");
    assert_eq!(note.by, "eng-1");
}

#[tokio::test]
async fn test_engineer_rejection_without_note() {
    let service = create().await;
    arrange(&service, &[(Integrated, StageStatus::EngineerReview)]).await;

    let err = service
        .apply(
            ID,
            &ctx("eng-1", Role::Engineer),
            &Action::Approve {
                stage: Integrated,
                decision: ReviewDecision::RevisionRequired,
                revision_note: None,
                revision_note_lang: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingRevisionNote);
    assert_eq!(status_of(&service, Integrated).await, StageStatus::EngineerReview);
}

#[tokio::test]
async fn test_drawing_goes_through_engineer_then_client() {
    let service = create().await;
    arrange(&service, &[(Drawing2d, StageStatus::InProgress)]).await;

    service
        .apply(
            ID,
            &ctx("d-1", Role::Drafter2d),
            &Action::Finish {
                stage: Drawing2d,
                mark_complete: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(status_of(&service, Drawing2d).await, StageStatus::EngineerReview);

    let approve = Action::Approve {
        stage: Drawing2d,
        decision: ReviewDecision::Complete,
        revision_note: None,
        revision_note_lang: None,
    };
    service.apply(ID, &ctx("eng-1", Role::Engineer), &approve).await.unwrap();
    assert_eq!(status_of(&service, Drawing2d).await, StageStatus::ClientReview);

    // the engineer has no say over client review
    let err = service
        .apply(ID, &ctx("eng-1", Role::Engineer), &approve)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    service
        .apply(ID, &ctx("c-1", Role::CustomerReviewer), &approve)
        .await
        .unwrap();
    assert_eq!(status_of(&service, Drawing2d).await, StageStatus::Complete);
}

#[tokio::test]
async fn test_lock_blocks_work_until_unlock() {
    let service = create().await;
    arrange(&service, &[(InBim360, StageStatus::Complete)]).await;

    service.apply(ID, &admin(), &Action::Lock).await.unwrap();
    let locked = service.load(ID).await.unwrap();
    assert!(locked.locked_at.is_some());
    assert_eq!(locked.locked_by.as_deref(), Some("admin-1"));

    let err = service
        .apply(
            ID,
            &ctx("bim-1", Role::BimCoordinator),
            &Action::Start {
                stage: InBim360,
                skip_version_increment: false,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Locked);
    assert_eq!(service.load(ID).await.unwrap(), locked);

    let outcome = service
        .apply(
            ID,
            &admin(),
            &Action::Unlock {
                stages_to_reset: vec![InBim360],
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.show_set.status(InBim360), Some(StageStatus::RevisionRequired));
    assert!(outcome.show_set.locked_at.is_none());
    assert!(outcome.show_set.locked_by.is_none());
    assert!(outcome.effects.iter().any(|e| matches!(
        e,
        Effect::StageChanged {
            cause: ChangeCause::Unlock,
            ..
        }
    )));
}

#[tokio::test]
async fn test_admin_is_locked_out_too() {
    let service = create().await;
    service.apply(ID, &admin(), &Action::Lock).await.unwrap();

    let err = service
        .apply(
            ID,
            &admin(),
            &Action::SetStatus {
                stage: Screen,
                status: StageStatus::Complete,
                revision_note: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Locked);

    let err = service.apply(ID, &admin(), &Action::Lock).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn test_full_pipeline_walk() {
    let service = create().await;
    let modeller = ctx("m-1", Role::Modeller3d);
    let finish = |stage| Action::Finish {
        stage,
        mark_complete: true,
    };
    let start = |stage| Action::Start {
        stage,
        skip_version_increment: false,
    };
    let approve = |stage| Action::Approve {
        stage,
        decision: ReviewDecision::Complete,
        revision_note: None,
        revision_note_lang: None,
    };

    for stage in [Screen, Structure] {
        service.apply(ID, &modeller, &start(stage)).await.unwrap();
        service.apply(ID, &modeller, &finish(stage)).await.unwrap();
        assert_eq!(status_of(&service, stage).await, StageStatus::Complete);
    }

    service.apply(ID, &modeller, &start(Integrated)).await.unwrap();
    service.apply(ID, &modeller, &finish(Integrated)).await.unwrap();
    service
        .apply(ID, &ctx("eng-1", Role::Engineer), &approve(Integrated))
        .await
        .unwrap();

    let bim = ctx("bim-1", Role::BimCoordinator);
    service.apply(ID, &bim, &start(InBim360)).await.unwrap();
    service.apply(ID, &bim, &finish(InBim360)).await.unwrap();
    assert_eq!(status_of(&service, InBim360).await, StageStatus::ClientReview);
    service
        .apply(ID, &ctx("c-1", Role::CustomerReviewer), &approve(InBim360))
        .await
        .unwrap();

    let status = service.status(ID).await.unwrap();
    assert_eq!(status.current_stage, Some(Drawing2d));
    assert_eq!(status.progress_percent(), 80.0);

    let activity = service.activity(ID).await.unwrap();
    assert_eq!(activity.len(), 10);
    assert_eq!(activity[0].user_id, "m-1");
}

#[tokio::test]
async fn test_start_requires_predecessors() {
    let service = create().await;
    let err = service
        .apply(
            ID,
            &ctx("m-1", Role::Modeller3d),
            &Action::Start {
                stage: Structure,
                skip_version_increment: false,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn test_finish_session_finishes_owned_stages() {
    let service = create().await;
    arrange(
        &service,
        &[(Screen, StageStatus::InProgress), (Drawing2d, StageStatus::InProgress)],
    )
    .await;

    let session = ctx("m-1", Role::Modeller3d)
        .with_working(WorkingContext::new("m-1", [Screen, Drawing2d]));
    let outcome = service
        .apply(ID, &session, &Action::FinishSession { mark_complete: true })
        .await
        .unwrap();

    assert_eq!(outcome.changed_stages(), vec![Screen]);
    assert_eq!(status_of(&service, Drawing2d).await, StageStatus::InProgress);
}

#[tokio::test]
async fn test_set_version_is_monotonic() {
    let service = create().await;
    let set = |target_version| Action::SetVersion {
        version_type: VersionGroup::Revit,
        target_version,
        reason: "client delivery".to_string(),
        language: "en".to_string(),
    };
    let modeller = ctx("m-1", Role::Modeller3d);

    service.apply(ID, &modeller, &set(4)).await.unwrap();
    let err = service.apply(ID, &modeller, &set(4)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VersionNotMonotonic);

    let err = service
        .apply(ID, &ctx("d-1", Role::Drafter2d), &set(9))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let show_set = service.load(ID).await.unwrap();
    assert_eq!(show_set.version(VersionGroup::Revit), 4);
    assert_eq!(show_set.version_history.len(), 1);
}

#[tokio::test]
async fn test_stale_writer_conflicts_then_retries() {
    let store = MemoryShowSetStore::new();
    let engine = WorkflowEngine::default();
    let first = WorkflowService::new(engine.clone(), store.clone());
    let second = WorkflowService::new(engine, store.clone());
    first.create(ID, "Hall B", "Finale").await.unwrap();

    let stale = second.load(ID).await.unwrap();
    first
        .apply(
            ID,
            &ctx("m-1", Role::Modeller3d),
            &Action::Start {
                stage: Screen,
                skip_version_increment: false,
            },
        )
        .await
        .unwrap();

    let lock = second
        .engine()
        .apply_transition(&stale, &admin(), &Action::Lock)
        .unwrap();
    let err = store
        .commit(&lock.show_set, stale.revision, &lock.effects)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // a retry re-evaluates against the fresh snapshot
    let outcome = second
        .apply_with_retry(ID, &admin(), &Action::Lock, 3)
        .await
        .unwrap();
    assert_eq!(outcome.show_set.revision, 3);
    assert!(outcome.show_set.is_locked());
    assert_eq!(
        outcome.show_set.status(Screen),
        Some(StageStatus::InProgress)
    );
}

#[tokio::test]
async fn test_published_effects_end_with_activity() {
    let service = create().await;
    arrange(&service, &[(Screen, StageStatus::Complete), (Structure, StageStatus::Complete)]).await;
    let mut events = service.subscribe();

    service
        .apply(
            ID,
            &ctx("m-1", Role::Modeller3d),
            &Action::RequestUpstreamRevision {
                target_stages: vec![Screen],
                current_stage: Structure,
                revision_note: "redo layout".to_string(),
                revision_note_lang: None,
                attachment: None,
            },
        )
        .await
        .unwrap();

    let mut received = Vec::new();
    while let Ok(published) = events.try_recv() {
        received.push(published);
    }
    assert_eq!(received.len(), 3);
    assert!(received.iter().all(|p| p.show_set_id == ID));
    assert!(received.last().unwrap().effect.activity().is_some());
}

#[tokio::test]
async fn test_action_from_wire_json() {
    let service = create().await;
    let action: Action = serde_json::from_str(
        r#"{"action":"start","stage":"screen","skipVersionIncrement":false}"#,
    )
    .unwrap();
    let outcome = service
        .apply(ID, &ctx("m-1", Role::Modeller3d), &action)
        .await
        .unwrap();
    assert_eq!(outcome.show_set.status(Screen), Some(StageStatus::InProgress));
}
