// SPDX-License-Identifier: Apache-2.0

//! ModelSim-only backend: RTL-level simulation, no synthesis.

use anyhow::{anyhow, bail, Context};
use std::path::Path;
use std::process::Command;

use super::testbench;
use super::{prepare_workdir, run_captured, Tool, ToolLog, ToolResult};

pub struct ModelSimTool {
    chat: bool,
}

impl ModelSimTool {
    pub fn new(chat: bool) -> Self {
        ModelSimTool { chat }
    }

    fn write_do(dir: &Path, rtl: &Path) -> anyhow::Result<()> {
        // TCL wants forward slashes regardless of host platform.
        let rtl = rtl.display().to_string().replace('\\', "/");
        let text = format!(
            "if {{ ![file exists work] }} {{ vlib work }}\n\
             vlog -reportprogress 300 \"{rtl}\"\n\
             vlog tb.v\n\
             vsim -t 1ps work.tb\n\
             run -all\n\
             quit -f\n"
        );
        std::fs::write(dir.join("run.do"), text)
            .with_context(|| format!("cannot write run.do in {}", dir.display()))
    }

    fn run_inner(&self, rtl: &Path, top: &str, workdir: &Path) -> anyhow::Result<u32> {
        let workdir = prepare_workdir(workdir)?;
        let rtl = rtl
            .canonicalize()
            .map_err(|e| anyhow!("cannot resolve RTL path {}: {}", rtl.display(), e))?;

        testbench::write_testbench(&workdir.join("tb.v"), top, "out")?;
        Self::write_do(&workdir, &rtl)?;

        let vsim =
            which::which("vsim").map_err(|_| anyhow!("`vsim` executable not found in PATH"))?;
        let stdout_log = workdir.join("vsim_stdout.txt");
        let mut cmd = Command::new(vsim);
        cmd.current_dir(&workdir)
            .arg("-c")
            .arg("-l")
            .arg("vsim_log.txt")
            .arg("-do")
            .arg("do run.do");
        if !run_captured(cmd, &stdout_log, self.chat)?.success() {
            bail!("vsim failed (see {})", workdir.join("vsim_log.txt").display());
        }

        testbench::scan_for_result(&workdir.join("vsim_log.txt"))
    }
}

impl Tool for ModelSimTool {
    fn name(&self) -> &'static str {
        "modelsim"
    }

    fn run(&self, rtl: &Path, top: &str, workdir: &Path) -> ToolResult {
        match self.run_inner(rtl, top, workdir) {
            Ok(value) => ToolResult::passed(value, ToolLog::Path(workdir.join("vsim_log.txt"))),
            Err(e) => {
                log::warn!("modelsim backend failed: {:#}", e);
                ToolResult::failed(ToolLog::Text(format!("{:#}", e)))
            }
        }
    }
}
