// SPDX-License-Identifier: Apache-2.0

//! Minimal testbench emission and transcript scanning shared by the
//! backends.
//!
//! The testbench contract: instantiate the DUT under the hierarchical name
//! `tb.top` binding its single 32-bit `result` port, print a line matching
//! `RES=<hex>` at time #1, then end the simulation. The `tb.top` instance
//! name is what makes `$root.tb.top....` references in generated designs
//! elaborate.

use anyhow::{bail, Context};
use regex::Regex;
use std::io::BufRead;
use std::path::Path;

/// Writes the testbench for `top` into `path`. `wire` names the local net
/// the DUT output is observed on; backends keep their historical spelling
/// (`res`, `out`).
pub fn write_testbench(path: &Path, top: &str, wire: &str) -> anyhow::Result<()> {
    let text = format!(
        "`timescale 1ns/1ps\n\
         module tb;\n\
         \x20 wire [31:0] {wire};\n\
         \x20 {top} top(.result({wire}));\n\
         \x20 initial begin #1 $display(\"RES=%08h\", {wire}); $finish; end\n\
         endmodule\n"
    );
    std::fs::write(path, text)
        .with_context(|| format!("cannot write testbench {}", path.display()))
}

/// Stream-scans `log` for the first line containing `RES=` and parses the
/// following hexadecimal token. Missing line or unparseable token is an
/// error; the caller reports it as a tool failure.
pub fn scan_for_result(log: &Path) -> anyhow::Result<u32> {
    let file = std::fs::File::open(log)
        .with_context(|| format!("cannot open transcript {}", log.display()))?;
    let re = Regex::new(r"RES=([0-9a-fA-F]+)").expect("result pattern is valid");
    for line in std::io::BufReader::new(file).lines() {
        let line = line.with_context(|| format!("cannot read transcript {}", log.display()))?;
        if let Some(caps) = re.captures(&line) {
            return u32::from_str_radix(&caps[1], 16)
                .with_context(|| format!("bad RES token `{}` in {}", &caps[1], log.display()));
        }
    }
    bail!("no RES= line found in {}", log.display())
}
