//! Conformance tool installation and removal
//!
//! Installing and deleting the tool is delegated to two external scripts
//! with an exit-code contract: 0 means success, anything else failure.
//! Their output is passed through to the operator untouched.
//!
//! The [`Actuator`] trait separates "run the script" from the event and
//! settle-time handling in [`ToolLifecycleManager`], so the manager can be
//! driven by [`FakeActuator`] in tests.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::events::{Event, EventSink};
use crate::{Error, Result};

/// Trait for installing and removing the conformance tool
///
/// This trait abstracts script execution for testability.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Install the conformance tool into the cluster
    async fn install(&self) -> Result<()>;

    /// Remove the conformance tool from the cluster
    async fn delete(&self) -> Result<()>;
}

// =============================================================================
// Real Implementation
// =============================================================================

/// Actuator that runs the install/delete scripts as child processes
#[derive(Clone, Debug)]
pub struct ScriptActuator {
    install_script: PathBuf,
    delete_script: PathBuf,
}

impl ScriptActuator {
    /// Create an actuator for the given scripts
    pub fn new(install_script: impl Into<PathBuf>, delete_script: impl Into<PathBuf>) -> Self {
        Self {
            install_script: install_script.into(),
            delete_script: delete_script.into(),
        }
    }

    async fn run_script(script: &Path) -> Result<()> {
        let executable = locate_executable(script)?;
        let command = executable.display().to_string();

        info!(script = %command, "Running script");
        let status = Command::new(&executable)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| Error::command_failed(&command, e.to_string()))?;

        if !status.success() {
            return Err(Error::command_failed(command, status.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Actuator for ScriptActuator {
    async fn install(&self) -> Result<()> {
        Self::run_script(&self.install_script).await
    }

    async fn delete(&self) -> Result<()> {
        Self::run_script(&self.delete_script).await
    }
}

/// Locate an executable the way a shell would
///
/// Names containing a path separator are checked directly; bare names are
/// searched for on `PATH`.
pub fn locate_executable(program: &Path) -> Result<PathBuf> {
    if program.components().count() > 1 {
        return if is_executable(program) {
            Ok(program.to_path_buf())
        } else {
            Err(Error::executable_not_found(program.display().to_string()))
        };
    }

    let paths = std::env::var_os("PATH")
        .ok_or_else(|| Error::executable_not_found(program.display().to_string()))?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(|| Error::executable_not_found(program.display().to_string()))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// =============================================================================
// Fake Implementation
// =============================================================================

#[derive(Debug, Default)]
struct FakeState {
    installed: bool,
    installs: u32,
    deletes: u32,
    fail_install: bool,
}

/// In-memory actuator tracking whether the tool is installed
///
/// Deleting a tool that is not installed fails the way the real delete
/// script does when there is nothing to remove.
#[derive(Clone, Debug, Default)]
pub struct FakeActuator {
    state: Arc<Mutex<FakeState>>,
}

impl FakeActuator {
    /// Create a fake with nothing installed
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent install fail with a non-zero exit
    pub fn failing_install() -> Self {
        let fake = Self::new();
        fake.lock().fail_install = true;
        fake
    }

    /// Number of install attempts
    pub fn installs(&self) -> u32 {
        self.lock().installs
    }

    /// Number of delete attempts
    pub fn deletes(&self) -> u32 {
        self.lock().deletes
    }

    /// Whether the tool is currently installed
    pub fn is_installed(&self) -> bool {
        self.lock().installed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        // A poisoned lock only means a test panicked mid-update
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Actuator for FakeActuator {
    async fn install(&self) -> Result<()> {
        let mut state = self.lock();
        state.installs += 1;
        if state.fail_install {
            return Err(Error::command_failed("create_smi.sh", "exit status: 1"));
        }
        state.installed = true;
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        let mut state = self.lock();
        state.deletes += 1;
        if !state.installed {
            return Err(Error::command_failed(
                "delete_smi.sh",
                "exit status: 1 (nothing installed)",
            ));
        }
        state.installed = false;
        Ok(())
    }
}

// =============================================================================
// Lifecycle Manager
// =============================================================================

/// Installs and removes the conformance tool, reporting each outcome
pub struct ToolLifecycleManager {
    actuator: Arc<dyn Actuator>,
    events: EventSink,
    settle_interval: Duration,
}

impl ToolLifecycleManager {
    /// Create a manager emitting into `events`
    pub fn new(actuator: Arc<dyn Actuator>, events: EventSink, settle_interval: Duration) -> Self {
        Self {
            actuator,
            events,
            settle_interval,
        }
    }

    /// Install the tool, then wait for cluster-side resources to settle
    pub async fn install(&self, operation_id: &str) -> Result<Event> {
        validate_operation_id(operation_id)?;

        if let Err(e) = self.actuator.install().await {
            self.report_failure(operation_id, "Error while installing SMI tool", &e)
                .await;
            return Err(e);
        }

        let event = Event::info(operation_id, "SMI tool installed successfully", " ");
        self.events.emit(event.clone()).await?;

        debug!(settle_ms = self.settle_interval.as_millis(), "Waiting for resources to be created");
        tokio::time::sleep(self.settle_interval).await;

        Ok(event)
    }

    /// Remove the tool
    pub async fn delete(&self, operation_id: &str) -> Result<Event> {
        validate_operation_id(operation_id)?;

        if let Err(e) = self.actuator.delete().await {
            self.report_failure(operation_id, "Error while deleting SMI tool", &e)
                .await;
            return Err(e);
        }

        let event = Event::info(operation_id, "SMI tool deleted successfully", " ");
        self.events.emit(event.clone()).await?;
        Ok(event)
    }

    async fn report_failure(&self, operation_id: &str, summary: &str, err: &Error) {
        warn!(operation_id = %operation_id, error = %err, "{}", summary);
        if let Err(emit_err) = self
            .events
            .emit(Event::error(operation_id, summary, err.to_string()))
            .await
        {
            warn!(error = %emit_err, "Failed to deliver failure event");
        }
    }
}

fn validate_operation_id(operation_id: &str) -> Result<()> {
    if operation_id.trim().is_empty() {
        return Err(Error::validation("operation id must not be empty"));
    }
    Ok(())
}
