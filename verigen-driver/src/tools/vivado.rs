// SPDX-License-Identifier: Apache-2.0

//! AMD Vivado backend: out-of-context synthesis in batch mode, then
//! `xvlog`/`xelab`/`xsim` elaboration and run of the RTL testbench.
//!
//! Synthesis problems are logged but do not abort the flow; the reported
//! value always comes from the xsim run, and a synthesis crash that also
//! breaks simulation surfaces through the xsim stages.

use anyhow::{anyhow, bail, Context};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::testbench;
use super::{prepare_workdir, run_captured, Tool, ToolLog, ToolResult};

const PART: &str = "xc7k70t";
const DEFAULT_VIVADO_BIN: &str = "/mnt/applications/Xilinx/24.2/Vivado/2024.2/bin/vivado";

/// `VIVADO_BIN` overrides the compiled-in executable path.
fn vivado_bin() -> PathBuf {
    match std::env::var("VIVADO_BIN") {
        Ok(bin) if !bin.is_empty() => PathBuf::from(bin),
        _ => PathBuf::from(DEFAULT_VIVADO_BIN),
    }
}

pub struct VivadoTool {
    chat: bool,
}

impl VivadoTool {
    pub fn new(chat: bool) -> Self {
        VivadoTool { chat }
    }

    fn write_tcl(dir: &Path, dut: &Path, tb: &Path) -> anyhow::Result<()> {
        let text = format!(
            "set_param messaging.defaultLimit 0\n\
             create_project -in_memory -part {PART}\n\
             read_verilog {{{}}}\n\
             read_verilog {{{}}}\n\
             synth_design -mode out_of_context -top tb -part {PART}\n\
             write_checkpoint {{{}}}\n\
             quit\n",
            dut.display(),
            tb.display(),
            dir.join("post_synth.dcp").display(),
        );
        std::fs::write(dir.join("run.tcl"), text)
            .with_context(|| format!("cannot write run.tcl in {}", dir.display()))
    }

    fn run_inner(&self, rtl: &Path, top: &str, workdir: &Path) -> anyhow::Result<u32> {
        let workdir = prepare_workdir(workdir)?;

        let dut = workdir.join("dut.v");
        std::fs::copy(rtl, &dut)
            .with_context(|| format!("cannot copy {} into workdir", rtl.display()))?;
        let tb = workdir.join("tb.v");
        testbench::write_testbench(&tb, top, "out")?;
        Self::write_tcl(&workdir, &dut, &tb)?;

        let synth_log = workdir.join("vivado.log");
        let mut synth = Command::new(vivado_bin());
        synth
            .current_dir(&workdir)
            .arg("-mode")
            .arg("batch")
            .arg("-nolog")
            .arg("-nojournal")
            .arg("-source")
            .arg("run.tcl");
        if !run_captured(synth, &synth_log, self.chat)?.success() {
            log::warn!(
                "vivado synthesis exited with errors (see {})",
                synth_log.display()
            );
        }

        let sim_log = workdir.join("xsim.log");
        let xvlog =
            which::which("xvlog").map_err(|_| anyhow!("`xvlog` executable not found in PATH"))?;
        let mut compile = Command::new(xvlog);
        compile.current_dir(&workdir).arg("dut.v").arg("tb.v");
        if !run_captured(compile, &sim_log, self.chat)?.success() {
            bail!("xvlog failed (see {})", sim_log.display());
        }

        let xelab =
            which::which("xelab").map_err(|_| anyhow!("`xelab` executable not found in PATH"))?;
        let mut elab = Command::new(xelab);
        elab.current_dir(&workdir).arg("tb").arg("-s").arg("tb_sim");
        if !run_captured(elab, &sim_log, self.chat)?.success() {
            bail!("xelab failed (see {})", sim_log.display());
        }

        let xsim =
            which::which("xsim").map_err(|_| anyhow!("`xsim` executable not found in PATH"))?;
        let mut sim = Command::new(xsim);
        sim.current_dir(&workdir).arg("tb_sim").arg("-runall");
        if !run_captured(sim, &sim_log, self.chat)?.success() {
            bail!("xsim failed (see {})", sim_log.display());
        }

        testbench::scan_for_result(&sim_log)
    }
}

impl Tool for VivadoTool {
    fn name(&self) -> &'static str {
        "vivado"
    }

    fn run(&self, rtl: &Path, top: &str, workdir: &Path) -> ToolResult {
        match self.run_inner(rtl, top, workdir) {
            Ok(value) => ToolResult::passed(value, ToolLog::Path(workdir.join("xsim.log"))),
            Err(e) => {
                log::warn!("vivado backend failed: {:#}", e);
                ToolResult::failed(ToolLog::Text(format!("{:#}", e)))
            }
        }
    }
}
