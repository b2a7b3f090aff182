#![cfg(unix)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use elf_core::control::{
    ElfControlPlane,
    QueryRequest,
    QueryType,
    SwarmMode,
    SwarmRequest,
    SwarmRunFn,
};
use elf_core::jobs::{JobOutput, JobRegistry, JobState};
use elf_core::paths::ElfPaths;
use futures::FutureExt;
use tokio::sync::Notify;

/// Writes a shell script at `path` that records its arguments, one per line.
fn write_recorder(path: &Path, record_to: &Path) {
    std::fs::create_dir_all(path.parent().expect("script has a parent")).expect("script dir");
    let body = format!(
        "#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\necho recorded\n",
        record_to.display()
    );
    std::fs::write(path, body).expect("write script");
}

fn recorded_args(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("recorded args")
        .lines()
        .map(str::to_string)
        .collect()
}

fn control_plane(root: &Path) -> ElfControlPlane {
    ElfControlPlane::new(ElfPaths::new(root), JobRegistry::default()).with_python("sh")
}

#[tokio::test]
async fn learning_query_forwards_limit_to_the_engine() {
    let dir = tempfile::tempdir().expect("tempdir");
    let record = dir.path().join("args.txt");
    let control = control_plane(dir.path());
    write_recorder(&control.paths().query_script(), &record);

    let ack = control
        .query(QueryRequest::new(QueryType::Learning).with_limit("5"))
        .await
        .expect("query dispatch");
    let ticket = ack.job.expect("learning dispatches a job");
    assert!(ack.to_string().contains("Type: learning"));

    let finished = control.jobs().wait(ticket.id).await.expect("job tracked");
    assert_eq!(finished.state, JobState::Succeeded);
    assert_eq!(finished.detail.as_deref(), Some("recorded"));
    assert_eq!(recorded_args(&record), vec!["--learning", "--limit", "5"]);
}

#[tokio::test]
async fn domain_query_without_domain_dispatches_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let control = control_plane(dir.path());

    let ack = control
        .query(QueryRequest::new(QueryType::Domain))
        .await
        .expect("query returns an acknowledgement");

    assert!(ack.job.is_none());
    assert!(ack.to_string().contains("Type: domain"));
    assert!(control.jobs().list().await.is_empty());
}

#[tokio::test]
async fn missing_query_script_fails_the_job_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let control = control_plane(dir.path());

    let ack = control
        .query(QueryRequest::new(QueryType::Context))
        .await
        .expect("acknowledged even though the script is missing");
    let ticket = ack.job.expect("context dispatches a job");

    let finished = control.jobs().wait(ticket.id).await.expect("job tracked");
    assert_eq!(finished.state, JobState::Failed);
    assert!(finished.detail.is_some());
}

#[tokio::test]
async fn checkin_runs_the_script() {
    let dir = tempfile::tempdir().expect("tempdir");
    let control = control_plane(dir.path());
    let script = control.paths().checkin_script();
    std::fs::create_dir_all(script.parent().expect("parent")).expect("scripts dir");
    let marker = dir.path().join("checked-in");
    std::fs::write(&script, format!("#!/bin/sh\ntouch '{}'\n", marker.display())).expect("script");
    make_executable(&script);

    let ack = control.checkin().await.expect("checkin dispatch");
    let ticket = ack.job.expect("checkin dispatches a job");
    assert!(ack.to_string().contains("CHECK-IN STARTED"));

    let finished = control.jobs().wait(ticket.id).await.expect("job tracked");
    assert_eq!(finished.state, JobState::Succeeded);
    assert!(marker.exists());
}

#[tokio::test]
async fn swarm_acknowledges_before_the_orchestrator_finishes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let release = Arc::new(Notify::new());
    let seen: Arc<Mutex<Vec<(String, String, SwarmMode)>>> = Arc::default();

    let runner: SwarmRunFn = {
        let release = release.clone();
        let seen = seen.clone();
        Arc::new(move |request: SwarmRequest| {
            seen.lock().expect("seen lock").push((
                request.task().to_string(),
                request.context().to_string(),
                request.mode(),
            ));
            let release = release.clone();
            async move {
                release.notified().await;
                Ok::<_, elf_core::jobs::JobError>(JobOutput::default())
            }
            .boxed()
        })
    };
    let control = control_plane(dir.path()).with_swarm_runner(runner);

    let request = SwarmRequest::new("Design a caching strategy for our API", None, None)
        .expect("valid request");
    let ack = control.swarm(request).await.expect("swarm dispatch");
    let ticket = ack.job.expect("swarm dispatches a job");

    let text = ack.to_string();
    assert!(text.contains("Task: Design a caching strategy for our API"));
    assert!(text.contains("Mode: all"));
    let running = control.jobs().status(ticket.id).await.expect("job tracked");
    assert_eq!(running.state, JobState::Running);

    release.notify_one();
    let finished = control.jobs().wait(ticket.id).await.expect("job tracked");
    assert_eq!(finished.state, JobState::Succeeded);
    assert_eq!(
        seen.lock().expect("seen lock").as_slice(),
        [(
            "Design a caching strategy for our API".to_string(),
            String::new(),
            SwarmMode::All
        )]
    );
}

fn node_available() -> bool {
    std::process::Command::new("node")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

/// Writes an ES module orchestrator exporting `runSwarm` with `body`.
fn write_orchestrator(script: &Path, body: &str) {
    let dir = script.parent().expect("script has a parent");
    std::fs::create_dir_all(dir).expect("orchestrator dir");
    std::fs::write(dir.join("package.json"), r#"{"type":"module"}"#).expect("package.json");
    let module = format!(
        "import {{ writeFileSync }} from \"node:fs\";\n\
         export async function runSwarm(task, context, mode) {{\n{body}\n}}\n"
    );
    std::fs::write(script, module).expect("orchestrator");
}

#[tokio::test]
async fn default_swarm_runner_calls_run_swarm() {
    if !node_available() {
        eprintln!("node is not installed; skipping");
        return;
    }
    let dir = tempfile::tempdir().expect("tempdir");
    let control = control_plane(dir.path());
    let marker = dir.path().join("swarm-args.json");
    write_orchestrator(
        &control.paths().swarm_orchestrator(),
        &format!(
            "  writeFileSync({marker:?}, JSON.stringify([task, context, mode]));\n  return \"swarm finished\";"
        ),
    );

    let request = SwarmRequest::new(
        "Design a caching strategy for our API",
        Some("PostgreSQL behind a CDN".to_string()),
        Some(SwarmMode::Design),
    )
    .expect("valid request");
    let ticket = control
        .swarm(request)
        .await
        .expect("swarm dispatch")
        .job
        .expect("swarm dispatches a job");

    let finished = control.jobs().wait(ticket.id).await.expect("job tracked");
    assert_eq!(finished.state, JobState::Succeeded);
    assert_eq!(finished.detail.as_deref(), Some("swarm finished"));
    assert_eq!(
        std::fs::read_to_string(&marker).expect("runSwarm was called"),
        r#"["Design a caching strategy for our API","PostgreSQL behind a CDN","design"]"#
    );
}

#[tokio::test]
async fn rejected_run_swarm_fails_the_job() {
    if !node_available() {
        eprintln!("node is not installed; skipping");
        return;
    }
    let dir = tempfile::tempdir().expect("tempdir");
    let control = control_plane(dir.path());
    write_orchestrator(
        &control.paths().swarm_orchestrator(),
        "  throw new Error(\"no agents available\");",
    );

    let request = SwarmRequest::new("Find risks in this authentication approach", None, None)
        .expect("valid request");
    let ticket = control
        .swarm(request)
        .await
        .expect("swarm dispatch")
        .job
        .expect("swarm dispatches a job");

    let finished = control.jobs().wait(ticket.id).await.expect("job tracked");
    assert_eq!(finished.state, JobState::Failed);
    assert!(
        finished
            .detail
            .as_deref()
            .is_some_and(|detail| detail.contains("no agents available"))
    );
}

fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path).expect("metadata").permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(path, permissions).expect("chmod");
}
