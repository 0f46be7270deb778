// SPDX-License-Identifier: Apache-2.0

//! Nested for-generate design generator.
//!
//! Emits a `top(result)` module whose body is a stack of `for`-generate
//! loops of configurable depth over a pool of random constants, and computes
//! the value the design must elaborate to by evaluating the same reduction
//! expressions the emitted Verilog uses.
//!
//! The RNG draw order is part of the output contract: per-level loop
//! parameters first (in level order), then the constant pool, then reduction
//! operators innermost level first, one fresh draw per case arm, with the
//! root reduction operator last. Reordering any of these draws changes every
//! design produced from a given seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::rc::Rc;

use crate::ast::{hex32, BinOp, CaseArm, Expr, Module, Statement};
use crate::{Design, Generator};

/// Helper module emitted once per file when constant blocks are
/// instantiated.
pub const CONST_BLOCK_NAME: &str = "const_block";
pub const CONST_BLOCK_TEXT: &str =
    "module const_block #(parameter VALUE = 32'h0) (output [31:0] w);\n  assign w = VALUE;\nendmodule\n\n";

/// Reduction operators used at case arms and the root fold.
const REDUCTION_OPS: [BinOp; 2] = [BinOp::Add, BinOp::Xor];

#[derive(Clone, Debug)]
pub struct LoopConfig {
    pub seed: u64,
    /// Number of nested loops; 0 emits a loop-free constant design.
    pub depth: usize,
    pub min_start: i64,
    pub max_start: i64,
    pub min_iter: u32,
    pub max_iter: u32,
    /// When set, each loop flips a fair coin between increment and
    /// decrement; otherwise every loop increments.
    pub random_update: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            seed: 0,
            depth: 2,
            min_start: 0,
            max_start: 0,
            min_iter: 2,
            max_iter: 16,
            random_update: true,
        }
    }
}

/// Per-level loop parameters, fixed before any body text is built.
#[derive(Clone, Copy)]
struct LoopLevel {
    start: i64,
    count: u32,
    increment: bool,
}

pub struct LoopGenerator {
    cfg: LoopConfig,
    /// Start range with a reversed `min/max` pair already swapped.
    start_lo: i64,
    start_hi: i64,
    iter_lo: u32,
    iter_hi: u32,
    rng: StdRng,
}

fn fmt_i64(v: i64) -> String {
    if v < 0 {
        format!("({})", v)
    } else {
        v.to_string()
    }
}

impl LoopGenerator {
    pub fn new(cfg: LoopConfig) -> Result<Self, String> {
        if cfg.min_iter < 1 {
            return Err("loop generator requires min_iter >= 1".to_string());
        }
        if cfg.min_iter > cfg.max_iter {
            return Err(format!(
                "empty iteration range: min_iter {} > max_iter {}",
                cfg.min_iter, cfg.max_iter
            ));
        }
        let (start_lo, start_hi) = if cfg.min_start <= cfg.max_start {
            (cfg.min_start, cfg.max_start)
        } else {
            (cfg.max_start, cfg.min_start)
        };
        Ok(LoopGenerator {
            start_lo,
            start_hi,
            iter_lo: cfg.min_iter,
            iter_hi: cfg.max_iter,
            rng: StdRng::seed_from_u64(cfg.seed),
            cfg,
        })
    }

    pub fn config(&self) -> &LoopConfig {
        &self.cfg
    }

    /// Builds one design as a `Module` plus its oracle value. Used directly
    /// by the hierarchy generator to embed loop designs at leaves.
    pub fn make_module(&mut self, name: &str) -> (Module, u32) {
        let depth = self.cfg.depth;
        let mut levels = Vec::with_capacity(depth);
        for _ in 0..depth {
            let start = self.rng.gen_range(self.start_lo..=self.start_hi);
            let count = self.rng.gen_range(self.iter_lo..=self.iter_hi);
            let increment = if self.cfg.random_update {
                self.rng.gen_bool(0.5)
            } else {
                true
            };
            levels.push(LoopLevel {
                start,
                count,
                increment,
            });
        }

        let pool = if depth == 0 {
            1
        } else {
            levels[depth - 1].count as usize
        };
        let consts: Vec<u32> = (0..pool).map(|_| self.rng.gen()).collect();

        let mut m = Module::new(name, vec!["output [31:0] result".to_string()]);

        // MSB-first concatenation, so CONSTS0[32*i +: 32] selects consts[i].
        let concat = consts
            .iter()
            .rev()
            .map(|c| hex32(*c))
            .collect::<Vec<_>>()
            .join(", ");
        m.body.push(Statement::raw(format!(
            "localparam [{}:0] CONSTS0 = {{{}}};",
            pool * 32 - 1,
            concat
        )));

        if depth == 0 {
            m.body.push(Statement::raw("wire [31:0] t0 [0:0];"));
            m.body.push(Statement::Instance {
                module: CONST_BLOCK_NAME.to_string(),
                instance: "u_const0".to_string(),
                params: vec![".VALUE(CONSTS0[0 +: 32])".to_string()],
                ports: vec![("w".to_string(), "t0[0]".to_string())],
            });
            let root = self.reduction("t0", 1);
            let oracle = root
                .eval(&consts)
                .expect("constant design must be evaluable");
            m.body.push(Statement::Assign {
                lhs: "result".to_string(),
                rhs: root,
            });
            return (m, oracle);
        }

        m.body.push(Statement::raw(format!(
            "wire [31:0] t0 [0:{}];",
            levels[0].count - 1
        )));
        for l in 0..depth {
            m.body.push(Statement::raw(format!("genvar g{};", l)));
        }

        let (loop_stmt, outer_values) = self.build_level(0, &levels, &consts);
        m.body.push(Statement::raw("generate"));
        m.body.push(loop_stmt);
        m.body.push(Statement::raw("endgenerate"));

        let root = self.reduction("t0", outer_values.len());
        let oracle = root
            .eval(&outer_values)
            .expect("root reduction must be evaluable");
        m.body.push(Statement::Assign {
            lhs: "result".to_string(),
            rhs: root,
        });

        log::debug!(
            "loop design `{}`: depth {}, pool {}, oracle 0x{:08x}",
            name,
            depth,
            pool,
            oracle
        );
        (m, oracle)
    }

    /// Builds the loop for `level` and returns it together with the value
    /// vector of this level's wire array. Recurses into the inner level
    /// before drawing this level's reduction operators; that ordering is
    /// load-bearing for reproducibility.
    fn build_level(
        &mut self,
        level: usize,
        levels: &[LoopLevel],
        consts: &[u32],
    ) -> (Statement, Vec<u32>) {
        let lv = levels[level];
        let gv = format!("g{}", level);
        let arr = format!("t{}", level);

        let innermost = level + 1 == levels.len();
        let (body, values) = if innermost {
            // Array index in terms of the induction variable: counts up
            // from 0 in either loop direction. Never evaluated by the
            // oracle, which works in slot order.
            let idx = if lv.increment {
                Expr::binary(
                    BinOp::Sub,
                    vec![
                        Expr::symbolic(0, gv.clone()),
                        Expr::symbolic(0, fmt_i64(lv.start)),
                    ],
                )
            } else {
                Expr::binary(
                    BinOp::Sub,
                    vec![
                        Expr::symbolic(0, fmt_i64(lv.start)),
                        Expr::symbolic(0, gv.clone()),
                    ],
                )
            };
            let idx_text = idx.emit();
            let inst = Statement::Instance {
                module: CONST_BLOCK_NAME.to_string(),
                instance: "u_const".to_string(),
                params: vec![format!(".VALUE(CONSTS0[32*{} +: 32])", idx_text)],
                ports: vec![("w".to_string(), format!("{}[{}]", arr, idx_text))],
            };
            (vec![inst], consts.to_vec())
        } else {
            let inner = level + 1;
            let (inner_stmt, inner_values) = self.build_level(inner, levels, consts);
            let mut body = vec![
                Statement::raw(format!(
                    "wire [31:0] t{} [0:{}];",
                    inner,
                    levels[inner].count - 1
                )),
                inner_stmt,
            ];

            // One arm per concrete induction value, in execution order, so
            // decrement loops see their labels in the traversed sequence.
            let mut values = Vec::with_capacity(lv.count as usize);
            let mut arms = Vec::with_capacity(lv.count as usize);
            for i in 0..lv.count as i64 {
                let v = if lv.increment { lv.start + i } else { lv.start - i };
                let expr = self.reduction(&format!("t{}", inner), inner_values.len());
                values.push(
                    expr.eval(&inner_values)
                        .expect("level reduction must be evaluable"),
                );
                arms.push(CaseArm {
                    label: Expr::symbolic(0, v.to_string()),
                    body: vec![Statement::Assign {
                        lhs: format!("{}[{}]", arr, i),
                        rhs: expr,
                    }],
                });
            }

            if lv.count == 1 {
                // A single-iteration level does not need a full case; guard
                // the lone assignment with an if-generate instead.
                let arm = arms.pop().expect("one arm for a one-iteration level");
                body.push(Statement::IfGenerate {
                    cond: Expr::symbolic(0, format!("{} == {}", gv, arm.label.emit())),
                    then_body: arm.body,
                    else_body: None,
                });
            } else {
                body.push(Statement::CaseGenerate {
                    selector: Expr::symbolic(0, gv.clone()),
                    arms,
                    default: None,
                });
            }
            (body, values)
        };

        let cond = if lv.increment {
            format!("{} < {}", gv, fmt_i64(lv.start + lv.count as i64))
        } else {
            format!("{} > {}", gv, fmt_i64(lv.start - lv.count as i64))
        };
        let update = if lv.increment {
            format!("{} = {} + 1", gv, gv)
        } else {
            format!("{} = {} - 1", gv, gv)
        };
        let stmt = Statement::ForGenerate {
            genvar: gv,
            label: format!("blk{}", level),
            init: lv.start,
            cond,
            update,
            body,
        };
        (stmt, values)
    }

    /// Reduction over `array[0..len-1]` under a freshly drawn operator. A
    /// one-element reduction is the element itself and draws nothing.
    fn reduction(&mut self, array: &str, len: usize) -> Rc<Expr> {
        let mut operands: Vec<Rc<Expr>> = (0..len)
            .map(|i| Expr::wire_indexed(format!("{}[{}]", array, i), i))
            .collect();
        if len == 1 {
            return operands.pop().expect("one operand");
        }
        let op = REDUCTION_OPS[self.rng.gen_range(0..REDUCTION_OPS.len())];
        Expr::binary(op, operands)
    }
}

impl Generator for LoopGenerator {
    fn emit_design(&mut self, idx: u32) -> Design {
        let (module, oracle) = self.make_module("top");
        let mut text = format!(
            "// auto-generated by verigen loop generator\n// seed: {}\n`timescale 1ns/1ps\n\n",
            self.cfg.seed
        );
        text.push_str(CONST_BLOCK_TEXT);
        text.push_str(&module.emit());
        Design {
            file_name: format!("gen_{}.v", idx),
            text,
            oracle,
        }
    }
}
