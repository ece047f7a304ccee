use tokio::fs;

use taskwarden::config::{ProjectPaths, RecoveryConfig, CONTROL_FILE, FIX_REQUEST_FILE};
use taskwarden::recovery::{BatchEngine, BatchKind, TaskFix};
use taskwarden::tasks::{
    ControlFile, Subtask, SubtaskStatus, TaskStatus, TaskStore, JSON_ERROR_MARKER,
};

async fn engine_in(root: &std::path::Path) -> BatchEngine {
    let store = TaskStore::new(ProjectPaths::new(root.to_path_buf()));
    store.init().await.unwrap();
    BatchEngine::new(store, RecoveryConfig::default())
}

async fn seed(root: &std::path::Path, task_id: &str, control: &ControlFile) {
    let dir = ProjectPaths::new(root.to_path_buf()).task_dir(task_id);
    fs::create_dir_all(&dir).await.unwrap();
    fs::write(
        dir.join(CONTROL_FILE),
        serde_json::to_string_pretty(control).unwrap(),
    )
    .await
    .unwrap();
}

async fn load(root: &std::path::Path, task_id: &str) -> ControlFile {
    let path = ProjectPaths::new(root.to_path_buf())
        .task_dir(task_id)
        .join(CONTROL_FILE);
    serde_json::from_str(&fs::read_to_string(path).await.unwrap()).unwrap()
}

fn rejected(reason: &str) -> ControlFile {
    let mut control = ControlFile::new(TaskStatus::HumanReview, "task under review");
    control.qa_rejection_reason = Some(reason.to_string());
    control
}

#[tokio::test]
async fn test_listing_buckets_by_precedence() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path()).await;

    let mut incomplete = ControlFile::new(TaskStatus::HumanReview, "half done");
    incomplete.subtasks = vec![Subtask {
        id: "s1".into(),
        title: "a".into(),
        status: SubtaskStatus::Pending,
    }];
    seed(dir.path(), "t-incomplete", &incomplete).await;
    seed(dir.path(), "t-rejected", &rejected("missing tests")).await;
    seed(
        dir.path(),
        "t-json",
        &ControlFile::new(
            TaskStatus::HumanReview,
            format!("{} bad plan", JSON_ERROR_MARKER),
        ),
    )
    .await;

    let listing = engine.list_review_batches().await.unwrap();
    assert_eq!(listing.total_tasks_in_human_review, 3);

    let kinds: Vec<_> = listing.batches.iter().map(|b| b.kind).collect();
    assert_eq!(
        kinds,
        vec![BatchKind::JsonError, BatchKind::Incomplete, BatchKind::QaRejected]
    );
}

#[tokio::test]
async fn test_qa_rejection_writes_fix_request_and_queues_restart() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path()).await;
    seed(dir.path(), "t1", &rejected("missing tests")).await;

    let report = engine
        .process_batch(
            BatchKind::QaRejected,
            &[TaskFix::new("t1").with_feedback("cover the error path")],
        )
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.priority_breakdown.get(&2), Some(&1));
    assert_eq!(report.results[0].action, "fix_request");

    let fix_request = fs::read_to_string(
        ProjectPaths::new(dir.path().to_path_buf())
            .task_dir("t1")
            .join(FIX_REQUEST_FILE),
    )
    .await
    .unwrap();
    assert!(fix_request.contains("cover the error path"));

    let control = load(dir.path(), "t1").await;
    assert_eq!(control.status, TaskStatus::StartRequested);
    assert_eq!(control.rdr_batch_type.as_deref(), Some("qa_rejected"));
    assert_eq!(control.rdr_priority, Some(2));
    assert_eq!(control.rdr_iteration, 1);
    assert!(control.start_requested_at.is_some());
}

#[tokio::test]
async fn test_incomplete_restarts_without_fix_request() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path()).await;

    let mut control = ControlFile::new(TaskStatus::HumanReview, "half done");
    control.subtasks = vec![Subtask {
        id: "s1".into(),
        title: "a".into(),
        status: SubtaskStatus::InProgress,
    }];
    seed(dir.path(), "t1", &control).await;

    let report = engine
        .process_batch(BatchKind::Incomplete, &[TaskFix::new("t1")])
        .await
        .unwrap();

    assert_eq!(report.results[0].action, "restart");
    assert_eq!(report.results[0].priority, 1);
    assert!(!ProjectPaths::new(dir.path().to_path_buf())
        .task_dir("t1")
        .join(FIX_REQUEST_FILE)
        .exists());

    let control = load(dir.path(), "t1").await;
    assert_eq!(control.status, TaskStatus::StartRequested);
}

#[tokio::test]
async fn test_json_error_downgrades_when_plan_parses() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path()).await;
    let paths = ProjectPaths::new(dir.path().to_path_buf());

    let marker = ControlFile::new(
        TaskStatus::HumanReview,
        format!("{} plan failed", JSON_ERROR_MARKER),
    );
    seed(dir.path(), "t-good", &marker).await;
    seed(dir.path(), "t-bad", &marker).await;
    fs::write(paths.task_dir("t-good").join("plan.json"), r#"{"steps":[]}"#)
        .await
        .unwrap();
    fs::write(paths.task_dir("t-bad").join("plan.json"), "{nope")
        .await
        .unwrap();

    let report = engine
        .process_batch(
            BatchKind::JsonError,
            &[TaskFix::new("t-good"), TaskFix::new("t-bad")],
        )
        .await
        .unwrap();

    let good = report.results.iter().find(|r| r.task_id == "t-good").unwrap();
    assert_eq!(good.action, "restart");
    assert_eq!(good.priority, 1);

    let bad = report.results.iter().find(|r| r.task_id == "t-bad").unwrap();
    assert_eq!(bad.action, "fix_request");
    assert_eq!(bad.priority, 2);
    let fix_request =
        fs::read_to_string(paths.task_dir("t-bad").join(FIX_REQUEST_FILE))
            .await
            .unwrap();
    assert!(fix_request.contains("not valid JSON"));
}

#[tokio::test]
async fn test_corrupt_control_file_is_per_task_failure() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path()).await;
    let paths = ProjectPaths::new(dir.path().to_path_buf());

    seed(dir.path(), "healthy", &rejected("fix it")).await;
    fs::create_dir_all(paths.task_dir("corrupt")).await.unwrap();
    fs::write(paths.task_dir("corrupt").join(CONTROL_FILE), "{broken")
        .await
        .unwrap();

    let report = engine
        .process_batch(
            BatchKind::QaRejected,
            &[TaskFix::new("corrupt"), TaskFix::new("healthy")],
        )
        .await
        .unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);

    let corrupt = report.results.iter().find(|r| r.task_id == "corrupt").unwrap();
    assert!(!corrupt.success);
    assert!(corrupt.error.as_deref().is_some_and(|e| !e.is_empty()));

    // The healthy task still went through.
    let control = load(dir.path(), "healthy").await;
    assert_eq!(control.status, TaskStatus::StartRequested);
}

#[tokio::test]
async fn test_missing_task_dir_recorded_and_loop_continues() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path()).await;
    seed(dir.path(), "present", &rejected("fix")).await;

    let report = engine
        .process_batch(
            BatchKind::QaRejected,
            &[TaskFix::new("ghost"), TaskFix::new("present")],
        )
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 1);
}

#[tokio::test]
async fn test_control_updates_mirrored_into_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path()).await;
    let paths = ProjectPaths::new(dir.path().to_path_buf());

    seed(dir.path(), "t1", &rejected("needs work")).await;
    fs::create_dir_all(paths.workspace_dir("t1")).await.unwrap();

    engine
        .process_batch(BatchKind::QaRejected, &[TaskFix::new("t1")])
        .await
        .unwrap();

    let primary = fs::read_to_string(paths.task_dir("t1").join(CONTROL_FILE))
        .await
        .unwrap();
    let mirror = fs::read_to_string(paths.workspace_dir("t1").join(CONTROL_FILE))
        .await
        .unwrap();
    assert_eq!(primary, mirror);

    let fix_mirror = fs::read_to_string(paths.workspace_dir("t1").join(FIX_REQUEST_FILE))
        .await
        .unwrap();
    assert!(fix_mirror.contains("needs work"));
}

#[tokio::test]
async fn test_recover_stuck_task_with_restart() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path()).await;

    let mut control = ControlFile::new(TaskStatus::InProgress, "wedged");
    control.metadata.stuck_since = Some(chrono::Utc::now());
    seed(dir.path(), "t1", &control).await;

    let recovery = engine.recover_stuck_task("t1", true).await.unwrap();
    assert!(recovery.recovered);
    assert_eq!(recovery.action, "restarted");

    let control = load(dir.path(), "t1").await;
    assert!(control.metadata.stuck_since.is_none());
    assert_eq!(control.status, TaskStatus::StartRequested);
    assert_eq!(control.rdr_iteration, 1);
    assert_eq!(control.rdr_priority, Some(4));
}

#[tokio::test]
async fn test_recover_stuck_task_without_restart_refreshes_activity() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path()).await;

    let mut control = ControlFile::new(TaskStatus::InProgress, "wedged");
    control.metadata.stuck_since = Some(chrono::Utc::now());
    seed(dir.path(), "t1", &control).await;

    let recovery = engine.recover_stuck_task("t1", false).await.unwrap();
    assert_eq!(recovery.action, "activity_refreshed");

    let control = load(dir.path(), "t1").await;
    assert!(control.metadata.stuck_since.is_none());
    assert!(control.metadata.last_activity.is_some());
    assert_eq!(control.status, TaskStatus::InProgress);
    assert_eq!(control.rdr_iteration, 0);
}

#[tokio::test]
async fn test_missing_stuck_marker_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path()).await;
    seed(
        dir.path(),
        "t1",
        &ControlFile::new(TaskStatus::InProgress, "fine"),
    )
    .await;

    let recovery = engine.recover_stuck_task("t1", false).await.unwrap();
    assert!(recovery.recovered);
}

#[tokio::test]
async fn test_restart_ceiling_blocks_further_iterations() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ProjectPaths::new(dir.path().to_path_buf());
    let store = TaskStore::new(paths);
    store.init().await.unwrap();
    let engine = BatchEngine::new(
        store,
        RecoveryConfig {
            max_iterations: 2,
            ..RecoveryConfig::default()
        },
    );

    let mut control = rejected("again");
    control.rdr_iteration = 2;
    seed(dir.path(), "t1", &control).await;

    let report = engine
        .process_batch(BatchKind::QaRejected, &[TaskFix::new("t1")])
        .await
        .unwrap();
    assert_eq!(report.failed, 1);
    assert!(report.results[0]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("ceiling")));
}
