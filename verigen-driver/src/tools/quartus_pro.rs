// SPDX-License-Identifier: Apache-2.0

//! Intel Quartus Pro flow: the shared Quartus pipeline retargeted at an
//! Arria 10 device, with binaries taken from the compiled-in install root
//! and the netlist simulated by the Questa installation.

use std::path::Path;

use super::quartus::{QuartusFlow, QUARTUS_ROOT};
use super::{Tool, ToolLog, ToolResult};

#[cfg(not(windows))]
const QUESTA_VSIM: &str =
    "/mnt/applications/Siemens/2023-24/RHELx86/QUESTA-CORE-PRIME_2023.4/questasim/linux_x86_64/vsim";

#[cfg(not(windows))]
const QUARTUS_PRO_BIN: &str =
    "/mnt/applications/altera/18.1/quartus/bin";
#[cfg(windows)]
const QUARTUS_PRO_BIN: &str = "C:/intelFPGA/18.1/quartus/bin";

pub struct QuartusProTool {
    chat: bool,
}

impl QuartusProTool {
    pub fn new(chat: bool) -> Self {
        QuartusProTool { chat }
    }

    fn flow() -> QuartusFlow {
        QuartusFlow {
            family: "Arria 10",
            bin_dir: Some(QUARTUS_PRO_BIN),
            quartus_root: QUARTUS_ROOT,
            atoms_lib: "twentynm_atoms.v",
            #[cfg(not(windows))]
            vsim_bin: Some(QUESTA_VSIM),
            #[cfg(windows)]
            vsim_bin: None,
            run_fit: false,
            tb_wire: "out",
        }
    }
}

impl Tool for QuartusProTool {
    fn name(&self) -> &'static str {
        "quartus-pro"
    }

    fn run(&self, rtl: &Path, top: &str, workdir: &Path) -> ToolResult {
        match Self::flow().run(rtl, top, workdir, self.chat) {
            Ok(value) => ToolResult::passed(value, ToolLog::Path(workdir.join("vsim_log.txt"))),
            Err(e) => {
                log::warn!("quartus-pro backend failed: {:#}", e);
                ToolResult::failed(ToolLog::Text(format!("{:#}", e)))
            }
        }
    }
}
