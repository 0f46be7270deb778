// SPDX-License-Identifier: Apache-2.0

//! Randomized Verilog design generation with a built-in evaluation oracle.
//!
//! The crate emits legal IEEE 1364-2005 designs that lean on two
//! elaboration-heavy language features -- `generate` constructs and
//! hierarchical name references -- while keeping an in-memory AST from which
//! the expected 32-bit result is computed by pure evaluation. Differential
//! comparison against external tool output is the consumer's job (see the
//! `verigen-driver` workspace member).

pub mod ast;
pub mod hier_gen;
pub mod loop_gen;

use std::io::Write;
use std::path::{Path, PathBuf};

/// One generated design: the Verilog text, the file name it wants to live
/// under, and the oracle value its `result` port must elaborate to.
pub struct Design {
    pub file_name: String,
    pub text: String,
    pub oracle: u32,
}

/// Common surface of the loop and hierarchy generators.
///
/// Generators are stateful: the RNG sequence advances across calls, so
/// iteration `i` of a fresh generator always produces the same design for a
/// fixed seed and configuration regardless of how many further iterations
/// follow.
pub trait Generator {
    /// Produces the design for iteration `idx` together with its oracle
    /// value.
    fn emit_design(&mut self, idx: u32) -> Design;

    /// Emits iteration `idx` into `dir`, returning the written path and the
    /// oracle value. The output directory is an explicit argument; no
    /// generator ever touches the process working directory.
    fn generate_into(&mut self, dir: &Path, idx: u32) -> std::io::Result<(PathBuf, u32)> {
        let design = self.emit_design(idx);
        let path = dir.join(&design.file_name);
        let mut f = std::fs::File::create(&path)?;
        f.write_all(design.text.as_bytes())?;
        Ok((path, design.oracle))
    }
}
