//! Lifecycle integration tests
//!
//! Drive the orchestrator end to end over temporary workspace roots. Dev
//! servers are stubbed with `sleep` and the bundler with `sh`, so no real
//! toolchain is needed.

use std::path::Path;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;

use grove_core::project::{validate, ValidationError};
use grove_core::server::{
    Orchestrator, OrchestratorConfig, OrchestratorError, ServeCommand, ServerMessage,
    SharedOrchestrator,
};

fn stub_orchestrator(root: &Path) -> SharedOrchestrator {
    let mut config = OrchestratorConfig::new(root.to_path_buf());
    config.serve = ServeCommand {
        program: "sleep".to_string(),
        args: vec!["300".to_string()],
    };
    config.build_program = "sh".to_string();
    config.build_args = vec![
        "-c".to_string(),
        "mkdir -p dist && echo built > dist/index.html".to_string(),
    ];
    config.install_program = "true".to_string();
    config.install_args = vec![];
    Orchestrator::new(config)
}

async fn recv_until<F>(rx: &mut broadcast::Receiver<ServerMessage>, pred: F) -> ServerMessage
where
    F: Fn(&ServerMessage) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let msg = rx.recv().await.expect("notification bus closed");
            if pred(&msg) {
                return msg;
            }
        }
    })
    .await
    .expect("timed out waiting for notification")
}

#[tokio::test]
async fn create_then_scan_includes_the_project() {
    let root = tempfile::tempdir().unwrap();
    let orch = stub_orchestrator(root.path());
    let mut rx = orch.subscribe();

    let project = orch
        .create_project("demo", Some("alice"), None)
        .await
        .unwrap();
    assert_eq!(project.name, "demo");
    assert_eq!(project.author.as_deref(), Some("alice"));

    recv_until(&mut rx, |m| matches!(m, ServerMessage::ProjectCreated { .. })).await;

    orch.rescan().await.unwrap();
    let snapshot = recv_until(&mut rx, |m| matches!(m, ServerMessage::Workspace { .. })).await;
    match snapshot {
        ServerMessage::Workspace {
            projects, errors, ..
        } => {
            assert_eq!(projects.len(), 1);
            assert_eq!(projects[0].name, "demo");
            assert!(errors.is_empty());
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn unknown_variant_falls_back_instead_of_failing() {
    let root = tempfile::tempdir().unwrap();
    let orch = stub_orchestrator(root.path());

    let project = orch
        .create_project("demo", None, Some("holographic"))
        .await
        .unwrap();
    assert_eq!(project.name, "demo");

    let main_elm =
        std::fs::read_to_string(root.path().join("demo").join("src/Main.elm")).unwrap();
    assert!(main_elm.contains("Browser.sandbox"));
}

#[tokio::test]
async fn failed_scaffold_cleans_up_but_existing_dirs_survive() {
    let root = tempfile::tempdir().unwrap();
    let orch = stub_orchestrator(root.path());

    // occupied target: create must fail and leave the contents alone
    let taken = root.path().join("taken");
    std::fs::create_dir_all(&taken).unwrap();
    std::fs::write(taken.join("keep.txt"), "keep").unwrap();

    let err = orch.create_project("taken", None, None).await.unwrap_err();
    assert_eq!(err.code(), "already_exists");
    assert!(taken.join("keep.txt").is_file());
}

#[tokio::test]
async fn develop_is_idempotent_per_project() {
    let root = tempfile::tempdir().unwrap();
    let orch = stub_orchestrator(root.path());

    orch.create_project("demo", None, None).await.unwrap();
    let path = root.path().join("demo");

    let first = orch.develop_project(&path, None).await.unwrap();
    let second = orch.develop_project(&path, None).await.unwrap();
    assert_eq!(first, second);

    {
        let registry = orch.registry();
        let reg = registry.lock().await;
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.port_of(&path), Some(first));
    }

    orch.shutdown().await;
}

#[tokio::test]
async fn stop_is_a_no_op_without_a_server() {
    let root = tempfile::tempdir().unwrap();
    let orch = stub_orchestrator(root.path());

    orch.create_project("demo", None, None).await.unwrap();
    let path = root.path().join("demo");

    orch.develop_project(&path, None).await.unwrap();
    orch.stop_server(&path).await;
    orch.stop_server(&path).await; // second call is a no-op

    let registry = orch.registry();
    assert!(registry.lock().await.is_empty());
}

#[tokio::test]
async fn delete_stops_the_server_and_removes_the_tree() {
    let root = tempfile::tempdir().unwrap();
    let orch = stub_orchestrator(root.path());
    let mut rx = orch.subscribe();

    orch.create_project("demo", None, None).await.unwrap();
    let path = root.path().join("demo");
    orch.develop_project(&path, None).await.unwrap();

    orch.delete_project(&path, true).await.unwrap();

    assert!(!path.exists());
    {
        let registry = orch.registry();
        assert!(registry.lock().await.is_empty());
    }
    recv_until(&mut rx, |m| matches!(m, ServerMessage::ProjectDeleted { .. })).await;

    orch.rescan().await.unwrap();
    let snapshot = recv_until(&mut rx, |m| matches!(m, ServerMessage::Workspace { .. })).await;
    match snapshot {
        ServerMessage::Workspace { projects, .. } => assert!(projects.is_empty()),
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn delete_requires_confirmation() {
    let root = tempfile::tempdir().unwrap();
    let orch = stub_orchestrator(root.path());

    orch.create_project("demo", None, None).await.unwrap();
    let path = root.path().join("demo");

    let err = orch.delete_project(&path, false).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NotConfirmed(_)));
    assert!(path.exists());
}

#[tokio::test]
async fn eject_conflict_leaves_the_source_untouched() {
    let root = tempfile::tempdir().unwrap();
    let orch = stub_orchestrator(root.path());

    orch.create_project("demo", Some("alice"), None)
        .await
        .unwrap();
    let path = root.path().join("demo");

    let dest = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dest.path().join("demo")).unwrap();

    let err = orch
        .eject_project(&path, dest.path())
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::DestinationConflict(_)));
    assert!(validate(&path).is_ok());
}

#[tokio::test]
async fn eject_moves_the_project_and_adds_standalone_files() {
    let root = tempfile::tempdir().unwrap();
    let orch = stub_orchestrator(root.path());

    orch.create_project("demo", Some("alice"), None)
        .await
        .unwrap();
    let path = root.path().join("demo");

    let dest = tempfile::tempdir().unwrap();
    let ejected = orch.eject_project(&path, dest.path()).await.unwrap();

    assert!(!path.exists());
    assert!(ejected.join("src/Main.elm").is_file());
    assert!(ejected.join(".groverc").is_file());
    // ejected-only standalone manifest
    let package: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(ejected.join("package.json")).unwrap())
            .unwrap();
    assert_eq!(package["name"], "demo");
    assert_eq!(package["author"]["name"], "alice");
}

#[tokio::test]
async fn concurrent_delete_and_develop_resolve_deterministically() {
    let root = tempfile::tempdir().unwrap();
    let orch = stub_orchestrator(root.path());

    orch.create_project("demo", None, None).await.unwrap();
    let path = root.path().join("demo");

    let delete_orch = orch.clone();
    let delete_path = path.clone();
    let develop_orch = orch.clone();
    let develop_path = path.clone();

    let (delete_result, develop_result) = tokio::join!(
        tokio::spawn(async move { delete_orch.delete_project(&delete_path, true).await }),
        tokio::spawn(async move { develop_orch.develop_project(&develop_path, None).await }),
    );

    // whichever ran first fully completed before the other began; the end
    // state is consistent either way
    delete_result.unwrap().unwrap();
    if let Err(e) = develop_result.unwrap() {
        assert!(matches!(
            e,
            OrchestratorError::Validation(ValidationError::NotAProject(_))
        ));
    }

    assert!(!path.exists());
    let registry = orch.registry();
    assert!(registry.lock().await.is_empty());
}

#[tokio::test]
async fn build_publishes_a_bundle_manifest() {
    let root = tempfile::tempdir().unwrap();
    let orch = stub_orchestrator(root.path());
    let mut rx = orch.subscribe();

    orch.create_project("demo", None, None).await.unwrap();
    let path = root.path().join("demo");

    orch.build_project(&path).await.unwrap();

    let msg = recv_until(&mut rx, |m| {
        matches!(
            m,
            ServerMessage::BuildSucceeded { .. } | ServerMessage::BuildFailed { .. }
        )
    })
    .await;
    match msg {
        ServerMessage::BuildSucceeded { manifest, .. } => {
            assert!(manifest.entries.iter().any(|e| e.name == "index.html"));
            assert!(manifest.size_bytes > 0);
        }
        other => panic!("expected BuildSucceeded, got {:?}", other),
    }
}

#[tokio::test]
async fn failed_build_publishes_the_cause() {
    let root = tempfile::tempdir().unwrap();
    let orch = {
        let mut config = OrchestratorConfig::new(root.path().to_path_buf());
        config.serve = ServeCommand {
            program: "sleep".to_string(),
            args: vec!["300".to_string()],
        };
        config.build_program = "sh".to_string();
        config.build_args = vec!["-c".to_string(), "echo no-entry >&2; exit 1".to_string()];
        Orchestrator::new(config)
    };
    let mut rx = orch.subscribe();

    orch.create_project("demo", None, None).await.unwrap();
    orch.build_project(&root.path().join("demo")).await.unwrap();

    let msg = recv_until(&mut rx, |m| matches!(m, ServerMessage::BuildFailed { .. })).await;
    match msg {
        ServerMessage::BuildFailed { cause, .. } => assert!(cause.contains("no-entry")),
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn install_reports_completion() {
    let root = tempfile::tempdir().unwrap();
    let orch = stub_orchestrator(root.path());
    let mut rx = orch.subscribe();

    orch.create_project("demo", None, None).await.unwrap();
    orch.install_dependencies(&root.path().join("demo"))
        .await
        .unwrap();

    let msg = recv_until(&mut rx, |m| {
        matches!(m, ServerMessage::InstallFinished { .. })
    })
    .await;
    match msg {
        ServerMessage::InstallFinished { ok, .. } => assert!(ok),
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn build_on_a_foreign_directory_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let orch = stub_orchestrator(root.path());

    let foreign = root.path().join("foreign");
    std::fs::create_dir_all(&foreign).unwrap();

    let err = orch.build_project(&foreign).await.unwrap_err();
    assert_eq!(err.code(), "not_a_project");
}
