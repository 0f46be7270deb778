// SPDX-License-Identifier: Apache-2.0

//! Pluggable EDA tool backends and the watchdog that supervises them.
//!
//! Every backend follows the same contract: it owns a per-iteration workdir,
//! drives vendor executables as subprocesses with all I/O captured to files,
//! and recovers the 32-bit result by scanning a transcript for the `RES=`
//! line the testbench prints. Any non-zero exit, missing log, or parse
//! failure is reported as `success: false`; classification into crash /
//! mismatch / timeout is the orchestrator's job.

pub mod compare_sim;
pub mod icarus;
pub mod modelsim;
pub mod quartus;
pub mod quartus_pro;
pub mod testbench;
pub mod vivado;

use anyhow::{bail, Context};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

/// Default wall-clock budget for one `Tool::run` invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Where to look for the failure details of a run: the main transcript on
/// disk, or inline text when no single file tells the story.
#[derive(Clone, Debug)]
pub enum ToolLog {
    Path(PathBuf),
    Text(String),
}

impl std::fmt::Display for ToolLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolLog::Path(p) => write!(f, "{}", p.display()),
            ToolLog::Text(t) => write!(f, "{}", t),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ToolResult {
    pub success: bool,
    pub value: u32,
    pub log: ToolLog,
}

impl ToolResult {
    pub fn passed(value: u32, log: ToolLog) -> ToolResult {
        ToolResult {
            success: true,
            value,
            log,
        }
    }

    pub fn failed(log: ToolLog) -> ToolResult {
        ToolResult {
            success: false,
            value: 0,
            log,
        }
    }
}

/// One synthesis and/or simulation flow.
pub trait Tool: Send + Sync {
    /// Short identifier, also used as the workdir subdirectory name.
    fn name(&self) -> &'static str;

    /// Runs the flow on `rtl` with top module `top`, owning `workdir`.
    fn run(&self, rtl: &Path, top: &str, workdir: &Path) -> ToolResult;
}

/// Maps the CLI backend selector onto a tool instance.
pub fn select_tool(selector: u32, chat: bool) -> anyhow::Result<Arc<dyn Tool>> {
    match selector {
        1 => Ok(Arc::new(quartus::QuartusTool::new(chat))),
        2 => Ok(Arc::new(quartus_pro::QuartusProTool::new(chat))),
        3 => Ok(Arc::new(vivado::VivadoTool::new(chat))),
        4 => Ok(Arc::new(icarus::IcarusTool::new(chat))),
        5 => Ok(Arc::new(modelsim::ModelSimTool::new(chat))),
        6 => Ok(Arc::new(compare_sim::CompareSimTool::new(chat))),
        other => bail!("unknown tool selector {} (expected 1..=6)", other),
    }
}

/// Runs `tool` on a worker thread and waits up to `timeout` for its result.
///
/// `None` means the watchdog fired: the worker is left to drain in the
/// background and its eventual result is discarded. The in-flight subprocess
/// is neither signalled nor waited for.
pub fn run_with_watchdog(
    tool: Arc<dyn Tool>,
    rtl: &Path,
    top: &str,
    workdir: &Path,
    timeout: Duration,
) -> Option<ToolResult> {
    let (tx, rx) = mpsc::channel();
    let rtl = rtl.to_path_buf();
    let top = top.to_string();
    let workdir = workdir.to_path_buf();
    std::thread::spawn(move || {
        let _ = tx.send(tool.run(&rtl, &top, &workdir));
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => Some(result),
        Err(mpsc::RecvTimeoutError::Timeout) => None,
        Err(mpsc::RecvTimeoutError::Disconnected) => Some(ToolResult::failed(ToolLog::Text(
            "tool worker terminated without a result".to_string(),
        ))),
    }
}

/// Creates the tool workdir and returns it as an absolute path, so relative
/// command arguments cannot escape it once `current_dir` is set.
pub(crate) fn prepare_workdir(workdir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(workdir)
        .with_context(|| format!("cannot create workdir {}", workdir.display()))?;
    workdir
        .canonicalize()
        .with_context(|| format!("cannot canonicalize workdir {}", workdir.display()))
}

/// Runs a prepared command, appending its captured stdout and stderr to
/// `log_path`. With `chat` on, the output is echoed to the console as well.
pub(crate) fn run_captured(
    mut cmd: Command,
    log_path: &Path,
    chat: bool,
) -> anyhow::Result<std::process::ExitStatus> {
    log::info!("running command: {:?}", cmd);
    let output = cmd
        .output()
        .with_context(|| format!("failed to execute {:?}", cmd))?;
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("cannot open log {}", log_path.display()))?;
    f.write_all(&output.stdout)?;
    f.write_all(&output.stderr)?;
    if chat {
        print!("{}", String::from_utf8_lossy(&output.stdout));
        eprint!("{}", String::from_utf8_lossy(&output.stderr));
    }
    log::info!("command exited with status: {}", output.status);
    Ok(output.status)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubTool {
        name: &'static str,
        value: u32,
        delay: Duration,
    }

    impl Tool for StubTool {
        fn name(&self) -> &'static str {
            self.name
        }
        fn run(&self, _rtl: &Path, _top: &str, _workdir: &Path) -> ToolResult {
            std::thread::sleep(self.delay);
            ToolResult::passed(self.value, ToolLog::Text(String::new()))
        }
    }

    #[test]
    fn watchdog_returns_result_within_budget() {
        let tool = Arc::new(StubTool {
            name: "stub",
            value: 0x42,
            delay: Duration::from_millis(0),
        });
        let r = run_with_watchdog(
            tool,
            Path::new("x.v"),
            "top",
            Path::new("w"),
            Duration::from_secs(5),
        )
        .expect("fast tool must beat the watchdog");
        assert!(r.success);
        assert_eq!(r.value, 0x42);
    }

    #[test]
    fn watchdog_abandons_slow_tools() {
        let tool = Arc::new(StubTool {
            name: "sleeper",
            value: 0,
            delay: Duration::from_millis(500),
        });
        let r = run_with_watchdog(
            tool,
            Path::new("x.v"),
            "top",
            Path::new("w"),
            Duration::from_millis(20),
        );
        assert!(r.is_none());
    }

    #[test]
    fn selector_covers_all_backends() {
        for selector in 1..=6 {
            assert!(select_tool(selector, false).is_ok());
        }
        assert!(select_tool(0, false).is_err());
        assert!(select_tool(7, false).is_err());
    }

    #[test]
    fn compare_sim_is_selector_six() {
        let tool = select_tool(6, false).unwrap();
        assert_eq!(tool.name(), "CompareSim");
    }
}
