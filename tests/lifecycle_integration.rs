//! Integration tests for the orchestration lifecycle: a request task runs
//! against a real git repository, isolated in its own worktree, gated by the
//! prompt queue.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;

use cassi::core::task::kinds::RequestTask;
use cassi::core::task::{TaskKind, TaskState};
use cassi::core::{
    PromptQueue, Task, TaskContext, ToolRegistry, WorktreeRegistry, run_to_completion,
};

fn init_repo(dir: &Path) {
    for args in [
        vec!["init", "-b", "main"],
        vec!["config", "user.email", "test@example.com"],
        vec!["config", "user.name", "test"],
        vec!["commit", "--allow-empty", "-m", "init"],
    ] {
        let status = std::process::Command::new("git")
            .args(&args)
            .current_dir(dir)
            .status()
            .expect("git available");
        assert!(status.success(), "git {args:?} failed");
    }
}

fn repo_context(dir: &Path) -> TaskContext {
    TaskContext::new(
        Arc::new(ToolRegistry::with_default_tools()),
        Arc::new(WorktreeRegistry::new()),
        Arc::new(PromptQueue::new()),
        dir,
    )
    // Dependency install is a no-op for these fixtures.
    .with_install_command(":")
}

/// Resolve every prompt that appears with the given response.
fn auto_resolve(queue: Arc<PromptQueue>, response: serde_json::Value) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if queue.peek().is_some() {
                queue.resolve(response.clone()).unwrap();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
}

#[tokio::test]
async fn confirmed_request_runs_steps_in_its_own_worktree() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());

    let ctx = repo_context(repo.path());
    let resolver = auto_resolve(Arc::clone(&ctx.prompts), json!("yes"));

    let mut root = Task::new(RequestTask::new(
        "add a marker file",
        vec!["touch from-step.txt".to_string()],
    ));

    timeout(Duration::from_secs(30), run_to_completion(&mut root, &ctx))
        .await
        .expect("pipeline should settle");
    resolver.abort();

    assert!(root.state().error().is_none(), "{:?}", root.state().error());
    assert!(root.state().started_at().is_some());
    assert!(root.state().finished_at().is_some());
    assert!(root.state().started_at() <= root.state().finished_at());

    // The step ran inside the worktree, not the origin checkout.
    let task_id = root.state().task_id().unwrap();
    let worktree_dir = repo
        .path()
        .join(".cassi")
        .join("worktrees")
        .join(task_id);
    assert!(!repo.path().join("from-step.txt").exists());

    // Cleanup released both the physical worktree and the registry entry.
    assert!(!worktree_dir.exists());
    assert!(ctx.worktrees.is_empty());
}

#[tokio::test]
async fn request_is_evaluated_through_the_model_before_isolation() {
    use cassi::core::model::{GenerateRequest, Model};

    struct CountingModel {
        calls: Arc<parking_lot::Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl Model for CountingModel {
        async fn generate(&self, request: GenerateRequest) -> cassi::Result<String> {
            self.calls.lock().push(request.input);
            Ok("plan: add the marker file".to_string())
        }
    }

    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());

    let calls = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let ctx = repo_context(repo.path()).with_model(Arc::new(CountingModel {
        calls: Arc::clone(&calls),
    }));
    let resolver = auto_resolve(Arc::clone(&ctx.prompts), json!("yes"));

    let mut root = Task::new(RequestTask::new("add a marker file", Vec::new()));

    timeout(Duration::from_secs(30), run_to_completion(&mut root, &ctx))
        .await
        .expect("pipeline should settle");
    resolver.abort();

    assert!(root.state().error().is_none());
    assert_eq!(*calls.lock(), vec!["add a marker file".to_string()]);
}

#[tokio::test]
async fn denied_confirmation_aborts_and_skips_steps() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());

    let ctx = repo_context(repo.path());
    let resolver = auto_resolve(Arc::clone(&ctx.prompts), json!("no"));

    let mut root = Task::new(RequestTask::new(
        "add a marker file",
        vec!["touch from-step.txt".to_string()],
    ));

    timeout(Duration::from_secs(30), run_to_completion(&mut root, &ctx))
        .await
        .expect("pipeline should settle");
    resolver.abort();

    let error = root.state().error().unwrap();
    assert!(error.contains("aborted by user"));

    // The confirmation gate failed, so the command subtask never started.
    let command = root
        .state()
        .sub_tasks()
        .iter()
        .find(|t| t.name() == "command")
        .unwrap();
    assert!(command.state().started_at().is_none());

    // A failed task still releases its worktree.
    let task_id = root.state().task_id().unwrap();
    assert!(
        !repo
            .path()
            .join(".cassi")
            .join("worktrees")
            .join(task_id)
            .exists()
    );
    assert!(ctx.worktrees.is_empty());
}

#[tokio::test]
async fn cleanup_runs_after_finished_at_is_set() {
    struct Probe {
        finished_before_cleanup: Arc<parking_lot::Mutex<Option<bool>>>,
    }

    #[async_trait::async_trait]
    impl TaskKind for Probe {
        fn name(&self) -> &'static str {
            "probe"
        }

        async fn init(&mut self, _state: &mut TaskState, _ctx: &TaskContext) -> cassi::Result<()> {
            Ok(())
        }

        async fn cleanup(
            &mut self,
            state: &mut TaskState,
            _ctx: &TaskContext,
        ) -> cassi::Result<()> {
            *self.finished_before_cleanup.lock() = Some(state.finished_at().is_some());
            Ok(())
        }
    }

    let repo = tempfile::tempdir().unwrap();
    let ctx = repo_context(repo.path());

    let observed = Arc::new(parking_lot::Mutex::new(None));
    let mut task = Task::new(Probe {
        finished_before_cleanup: Arc::clone(&observed),
    });

    run_to_completion(&mut task, &ctx).await;

    assert_eq!(*observed.lock(), Some(true));
}

#[tokio::test]
async fn http_resolution_resumes_a_suspended_task() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let repo = tempfile::tempdir().unwrap();
    let ctx = repo_context(repo.path());

    let state = Arc::new(cassi::api::AppState {
        queue: Arc::clone(&ctx.prompts),
        token: None,
    });

    let task = Task::new(cassi::core::task::kinds::ConfirmTask::new("merge it?"));

    let queue = Arc::clone(&ctx.prompts);
    let run = tokio::spawn(async move {
        let mut task = task;
        task.run(&ctx).await;
        task
    });

    // Wait until the task has suspended on its prompt.
    timeout(Duration::from_secs(5), async {
        while queue.is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("prompt should be queued");

    let response = cassi::api::router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/prompt")
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"response": true}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let task = timeout(Duration::from_secs(5), run)
        .await
        .expect("task should resume")
        .unwrap();
    assert!(task.state().error().is_none());
}
