//! Integration tests for the script-driven lifecycle
//!
//! Each test writes small shell scripts into a temp directory and drives
//! them through the real child-process actuator.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mesh_conformance::events::{self, EventType};
use mesh_conformance::lifecycle::{locate_executable, Actuator, ScriptActuator, ToolLifecycleManager};
use mesh_conformance::Error;

/// Write an executable shell script with the given body
fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Story: a zero exit installs the tool and reports success
#[tokio::test]
async fn story_successful_install_script() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("installed");
    let install = script(
        dir.path(),
        "create_smi.sh",
        &format!("touch {}", marker.display()),
    );
    let delete = script(dir.path(), "delete_smi.sh", "exit 0");

    let (sink, mut stream) = events::channel(4);
    let lifecycle = ToolLifecycleManager::new(
        Arc::new(ScriptActuator::new(install, delete)),
        sink,
        Duration::ZERO,
    );

    let event = lifecycle.install("op-1").await.unwrap();

    assert!(marker.exists(), "install script should have run");
    assert_eq!(event.event_type, EventType::Info);
    assert_eq!(stream.recv().await.unwrap().summary, "SMI tool installed successfully");
}

/// Story: a non-zero exit fails install and never reports success
#[tokio::test]
async fn story_failing_install_script() {
    let dir = tempfile::tempdir().unwrap();
    let install = script(dir.path(), "create_smi.sh", "exit 3");
    let delete = script(dir.path(), "delete_smi.sh", "exit 0");

    let (sink, mut stream) = events::channel(4);
    let lifecycle = ToolLifecycleManager::new(
        Arc::new(ScriptActuator::new(install, delete)),
        sink,
        Duration::ZERO,
    );

    let err = lifecycle.install("op-1").await.unwrap_err();
    assert!(matches!(err, Error::CommandFailed { .. }));
    assert!(err.to_string().contains("3"));

    let event = stream.recv().await.unwrap();
    assert_eq!(event.event_type, EventType::Error);
    assert!(stream.try_recv().is_err());
}

/// Story: delete runs the delete script, not the install script
#[tokio::test]
async fn story_delete_runs_delete_script() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("deleted");
    let install = script(dir.path(), "create_smi.sh", "exit 1");
    let delete = script(
        dir.path(),
        "delete_smi.sh",
        &format!("touch {}", marker.display()),
    );

    let actuator = ScriptActuator::new(install, delete);
    actuator.delete().await.unwrap();
    assert!(marker.exists());
}

/// Story: a script without the execute bit is not found
#[tokio::test]
async fn story_non_executable_script_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let install = dir.path().join("create_smi.sh");
    std::fs::write(&install, "#!/bin/sh\nexit 0\n").unwrap();
    std::fs::set_permissions(&install, std::fs::Permissions::from_mode(0o644)).unwrap();

    let err = locate_executable(&install).unwrap_err();
    assert!(matches!(err, Error::ExecutableNotFound { .. }));

    let actuator = ScriptActuator::new(install, dir.path().join("delete_smi.sh"));
    assert!(actuator.install().await.unwrap_err().is_setup());
}

#[test]
fn bare_names_are_found_on_path() {
    let found = locate_executable(Path::new("sh")).unwrap();
    assert!(found.ends_with("sh"));
}
