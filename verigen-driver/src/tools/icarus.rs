// SPDX-License-Identifier: Apache-2.0

//! Icarus Verilog backend: `iverilog` compile followed by `vvp` execution.

use anyhow::{anyhow, bail};
use std::path::Path;
use std::process::Command;

use super::testbench;
use super::{prepare_workdir, run_captured, Tool, ToolLog, ToolResult};

pub struct IcarusTool {
    chat: bool,
}

impl IcarusTool {
    pub fn new(chat: bool) -> Self {
        IcarusTool { chat }
    }

    fn run_inner(&self, rtl: &Path, top: &str, workdir: &Path) -> anyhow::Result<u32> {
        let workdir = prepare_workdir(workdir)?;
        let rtl = rtl
            .canonicalize()
            .map_err(|e| anyhow!("cannot resolve RTL path {}: {}", rtl.display(), e))?;

        let tb = workdir.join("tb.v");
        testbench::write_testbench(&tb, top, "res")?;

        let iverilog = which::which("iverilog")
            .map_err(|_| anyhow!("`iverilog` executable not found in PATH"))?;
        let compile_log = workdir.join("iverilog.log");
        let mut compile = Command::new(iverilog);
        compile
            .current_dir(&workdir)
            .arg("-g2012")
            .arg("-o")
            .arg("sim.vvp")
            .arg("-s")
            .arg("tb")
            .arg(&rtl)
            .arg(&tb);
        if !run_captured(compile, &compile_log, self.chat)?.success() {
            bail!("iverilog failed (see {})", compile_log.display());
        }

        let vvp = which::which("vvp").map_err(|_| anyhow!("`vvp` executable not found in PATH"))?;
        let sim_log = workdir.join("vvp_out.txt");
        let mut sim = Command::new(vvp);
        sim.current_dir(&workdir).arg("sim.vvp");
        if !run_captured(sim, &sim_log, self.chat)?.success() {
            bail!("vvp failed (see {})", sim_log.display());
        }

        testbench::scan_for_result(&sim_log)
    }
}

impl Tool for IcarusTool {
    fn name(&self) -> &'static str {
        "icarus"
    }

    fn run(&self, rtl: &Path, top: &str, workdir: &Path) -> ToolResult {
        match self.run_inner(rtl, top, workdir) {
            Ok(value) => ToolResult::passed(value, ToolLog::Path(workdir.join("vvp_out.txt"))),
            Err(e) => {
                log::warn!("icarus backend failed: {:#}", e);
                ToolResult::failed(ToolLog::Text(format!("{:#}", e)))
            }
        }
    }
}
