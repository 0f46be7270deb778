// SPDX-License-Identifier: Apache-2.0

//! Intel Quartus flow: TCL-driven synthesis, gate-level netlist export, and
//! ModelSim simulation of the netlist against the vendor libraries.
//!
//! The flow is shared with the Quartus Pro backend, which swaps the device
//! family, the binary locations, and the atom library.

use anyhow::{anyhow, bail, Context};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::testbench;
use super::{prepare_workdir, run_captured, Tool, ToolLog, ToolResult};

pub(crate) const PROJECT: &str = "veri_synth_proj";

#[cfg(windows)]
pub(crate) const QUARTUS_ROOT: &str = "C:/intelFPGA/18.1/quartus";
#[cfg(not(windows))]
pub(crate) const QUARTUS_ROOT: &str = "/mnt/applications/altera/18.1/quartus";

/// One parameterization of the Quartus synthesis + netlist-simulation flow.
pub(crate) struct QuartusFlow {
    pub family: &'static str,
    /// Directory holding the `quartus_*` binaries; `None` takes them from
    /// PATH.
    pub bin_dir: Option<&'static str>,
    /// Vendor install root referenced by the simulation script.
    pub quartus_root: &'static str,
    /// Device-specific atom library for gate-level simulation.
    pub atoms_lib: &'static str,
    /// Explicit `vsim` binary; `None` takes it from PATH.
    pub vsim_bin: Option<&'static str>,
    /// Whether the flow runs the fitter after analysis & synthesis.
    pub run_fit: bool,
    /// Local net name used in the testbench.
    pub tb_wire: &'static str,
}

impl QuartusFlow {
    fn exe(&self, name: &str) -> anyhow::Result<PathBuf> {
        match self.bin_dir {
            Some(dir) => {
                let path = Path::new(dir).join(name);
                if !path.exists() {
                    bail!("`{}` not found at {}", name, path.display());
                }
                Ok(path)
            }
            None => which::which(name)
                .map_err(|_| anyhow!("`{}` executable not found in PATH", name)),
        }
    }

    fn vsim(&self) -> anyhow::Result<PathBuf> {
        match self.vsim_bin {
            Some(bin) => Ok(PathBuf::from(bin)),
            None => which::which("vsim")
                .map_err(|_| anyhow!("`vsim` executable not found in PATH")),
        }
    }

    fn write_tcl(&self, dir: &Path, rtl: &Path, top: &str) -> anyhow::Result<()> {
        let rtl = rtl.display().to_string().replace('\\', "/");
        let text = format!(
            "project_new {PROJECT} -overwrite\n\
             set_global_assignment -name FAMILY \"{}\"\n\
             set_global_assignment -name TOP_LEVEL_ENTITY {top}\n\
             set_global_assignment -name VERILOG_FILE \"{rtl}\"\n\
             load_package flow\n\
             execute_module -tool map\n\
             project_close\n",
            self.family
        );
        std::fs::write(dir.join("synth.tcl"), text)
            .with_context(|| format!("cannot write synth.tcl in {}", dir.display()))
    }

    fn run_synthesis(&self, dir: &Path, chat: bool) -> anyhow::Result<()> {
        let log = dir.join("quartus.log");
        let mut sh = Command::new(self.exe("quartus_sh")?);
        sh.current_dir(dir).arg("-t").arg("synth.tcl");
        if !run_captured(sh, &log, chat)?.success() {
            bail!("quartus_sh failed (see {})", log.display());
        }
        if self.run_fit {
            let mut fit = Command::new(self.exe("quartus_fit")?);
            fit.current_dir(dir).arg(PROJECT);
            if !run_captured(fit, &log, chat)?.success() {
                bail!("quartus_fit failed (see {})", log.display());
            }
        }
        Ok(())
    }

    fn export_netlist(&self, dir: &Path, chat: bool) -> anyhow::Result<()> {
        let log = dir.join("quartus.log");
        let mut eda = Command::new(self.exe("quartus_eda")?);
        eda.current_dir(dir)
            .arg("--simulation=on")
            .arg("--tool=modelsim")
            .arg("--format=verilog")
            .arg(PROJECT);
        if !run_captured(eda, &log, chat)?.success() {
            bail!("quartus_eda failed (see {})", log.display());
        }
        Ok(())
    }

    fn write_do(&self, dir: &Path) -> anyhow::Result<()> {
        let text = format!(
            "set QUARTUS \"{root}\"\n\
             if {{ ![file exists work] }} {{ vlib work }}\n\
             vmap altera work\n\
             vlog -reportprogress 300 \\\n\
             \x20 $QUARTUS/eda/sim_lib/altera_primitives.v \\\n\
             \x20 $QUARTUS/eda/sim_lib/altera_mf.v \\\n\
             \x20 $QUARTUS/eda/sim_lib/220model.v \\\n\
             \x20 $QUARTUS/eda/sim_lib/sgate.v \\\n\
             \x20 $QUARTUS/eda/sim_lib/{atoms}\n\
             vlog \"simulation/modelsim/{PROJECT}.vo\"\n\
             vlog tb.v\n\
             vsim -t 1ps work.tb\n\
             run -all\n\
             quit -f\n",
            root = self.quartus_root,
            atoms = self.atoms_lib,
        );
        std::fs::write(dir.join("run.do"), text)
            .with_context(|| format!("cannot write run.do in {}", dir.display()))
    }

    fn run_modelsim(&self, dir: &Path, chat: bool) -> anyhow::Result<u32> {
        let stdout_log = dir.join("vsim_stdout.txt");
        let mut cmd = Command::new(self.vsim()?);
        cmd.current_dir(dir)
            .arg("-c")
            .arg("-l")
            .arg("vsim_log.txt")
            .arg("-do")
            .arg("do run.do");
        if !run_captured(cmd, &stdout_log, chat)?.success() {
            bail!("vsim failed (see {})", dir.join("vsim_log.txt").display());
        }
        testbench::scan_for_result(&dir.join("vsim_log.txt"))
    }

    /// Full flow: synthesize, export the .vo netlist, simulate it.
    pub fn run(&self, rtl: &Path, top: &str, workdir: &Path, chat: bool) -> anyhow::Result<u32> {
        let workdir = prepare_workdir(workdir)?;
        let rtl = rtl
            .canonicalize()
            .map_err(|e| anyhow!("cannot resolve RTL path {}: {}", rtl.display(), e))?;

        self.write_tcl(&workdir, &rtl, top)?;
        self.run_synthesis(&workdir, chat)?;
        self.export_netlist(&workdir, chat)?;
        testbench::write_testbench(&workdir.join("tb.v"), top, self.tb_wire)?;
        self.write_do(&workdir)?;
        self.run_modelsim(&workdir, chat)
    }
}

pub struct QuartusTool {
    chat: bool,
}

impl QuartusTool {
    pub fn new(chat: bool) -> Self {
        QuartusTool { chat }
    }

    fn flow() -> QuartusFlow {
        QuartusFlow {
            family: "Cyclone V",
            bin_dir: None,
            quartus_root: QUARTUS_ROOT,
            atoms_lib: "cyclonev_atoms.v",
            vsim_bin: None,
            run_fit: true,
            tb_wire: "res",
        }
    }
}

impl Tool for QuartusTool {
    fn name(&self) -> &'static str {
        "quartus"
    }

    fn run(&self, rtl: &Path, top: &str, workdir: &Path) -> ToolResult {
        match Self::flow().run(rtl, top, workdir, self.chat) {
            Ok(value) => ToolResult::passed(value, ToolLog::Path(workdir.join("vsim_log.txt"))),
            Err(e) => {
                log::warn!("quartus backend failed: {:#}", e);
                ToolResult::failed(ToolLog::Text(format!("{:#}", e)))
            }
        }
    }
}
