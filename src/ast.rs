// SPDX-License-Identifier: Apache-2.0

//! Verilog AST shared by emission and the oracle.
//!
//! Expressions and statements are closed sum types with exhaustive matching;
//! the variant set is small and fixed, so no open trait hierarchy is used.
//! Every expression supports both `emit` (Verilog text) and `eval` (32-bit
//! value, where defined), and the generators deliberately reuse one tree for
//! both so the emitted RTL and the oracle cannot disagree on structure.

use std::rc::Rc;

/// Raised when the oracle is asked to evaluate something that has no defined
/// constant value (e.g. a wire reference with no bound environment slot).
/// The generators only build evaluable trees, so seeing this at runtime
/// indicates a generator bug and callers treat it as fatal.
#[derive(Debug)]
pub struct EvalError(pub String);

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "eval error: {}", self.0)
    }
}

impl std::error::Error for EvalError {}

/// Binary operators over 32-bit values. Arithmetic wraps modulo 2^32.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
}

impl BinOp {
    pub fn token(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
        }
    }

    pub fn apply(self, lhs: u32, rhs: u32) -> u32 {
        match self {
            BinOp::Add => lhs.wrapping_add(rhs),
            BinOp::Sub => lhs.wrapping_sub(rhs),
            BinOp::And => lhs & rhs,
            BinOp::Or => lhs | rhs,
            BinOp::Xor => lhs ^ rhs,
        }
    }
}

/// Expression node. Shared subtrees are reference counted so one tree can be
/// held by both the emitted module body and the oracle's level logic.
#[derive(Debug)]
pub enum Expr {
    /// 32-bit literal; when `sym` is set the symbolic alias is emitted in
    /// place of the `32'dN` form.
    Literal { value: u32, sym: Option<String> },
    /// Reference to a net by name. `index` is the slot in the evaluation
    /// environment, when the oracle knows one.
    WireRef { name: String, index: Option<usize> },
    /// Left-associative chain `(a op b op c ...)` over one or more operands.
    Binary { op: BinOp, operands: Vec<Rc<Expr>> },
}

impl Expr {
    pub fn literal(value: u32) -> Rc<Expr> {
        Rc::new(Expr::Literal { value, sym: None })
    }

    /// A literal carrying a source-level spelling, e.g. a case label or a
    /// named constant.
    pub fn symbolic(value: u32, sym: impl Into<String>) -> Rc<Expr> {
        Rc::new(Expr::Literal {
            value,
            sym: Some(sym.into()),
        })
    }

    pub fn wire(name: impl Into<String>) -> Rc<Expr> {
        Rc::new(Expr::WireRef {
            name: name.into(),
            index: None,
        })
    }

    /// A wire reference the oracle can resolve through slot `index` of its
    /// evaluation environment.
    pub fn wire_indexed(name: impl Into<String>, index: usize) -> Rc<Expr> {
        Rc::new(Expr::WireRef {
            name: name.into(),
            index: Some(index),
        })
    }

    pub fn binary(op: BinOp, operands: Vec<Rc<Expr>>) -> Rc<Expr> {
        assert!(!operands.is_empty(), "binary expression needs >= 1 operand");
        Rc::new(Expr::Binary { op, operands })
    }

    pub fn emit(&self) -> String {
        match self {
            Expr::Literal { value, sym } => match sym {
                Some(s) => s.clone(),
                None => format!("32'd{}", value),
            },
            Expr::WireRef { name, .. } => name.clone(),
            Expr::Binary { op, operands } => {
                let parts: Vec<String> = operands.iter().map(|e| e.emit()).collect();
                format!("({})", parts.join(&format!(" {} ", op.token())))
            }
        }
    }

    /// Evaluates against `env`, the vector of values wire references index
    /// into. Total on literals and on binary chains over evaluable operands.
    pub fn eval(&self, env: &[u32]) -> Result<u32, EvalError> {
        match self {
            Expr::Literal { value, .. } => Ok(*value),
            Expr::WireRef { name, index } => {
                let i = index
                    .ok_or_else(|| EvalError(format!("wire `{}` has no environment slot", name)))?;
                env.get(i).copied().ok_or_else(|| {
                    EvalError(format!(
                        "wire `{}` slot {} out of range (env has {} entries)",
                        name,
                        i,
                        env.len()
                    ))
                })
            }
            Expr::Binary { op, operands } => {
                let mut acc = operands[0].eval(env)?;
                for rhs in &operands[1..] {
                    acc = op.apply(acc, rhs.eval(env)?);
                }
                Ok(acc)
            }
        }
    }
}

/// One arm of a case-generate: a constant label and its body.
pub struct CaseArm {
    pub label: Rc<Expr>,
    pub body: Vec<Statement>,
}

/// Statement node. `Custom` carries a closure from indent to text for
/// constructs that only exist as emitted Verilog (declarations, defparam,
/// loop scaffolding text); the oracle never inspects it.
pub enum Statement {
    Assign {
        lhs: String,
        rhs: Rc<Expr>,
    },
    Instance {
        module: String,
        instance: String,
        /// Parameter overrides as opaque text, already in `.NAME(value)` or
        /// positional form.
        params: Vec<String>,
        /// `(port, net)` connections; empty for hierarchical-access-only
        /// instances.
        ports: Vec<(String, String)>,
    },
    ForGenerate {
        genvar: String,
        label: String,
        init: i64,
        /// Termination condition, as source text.
        cond: String,
        /// Update expression, as source text.
        update: String,
        body: Vec<Statement>,
    },
    IfGenerate {
        cond: Rc<Expr>,
        then_body: Vec<Statement>,
        else_body: Option<Vec<Statement>>,
    },
    CaseGenerate {
        selector: Rc<Expr>,
        arms: Vec<CaseArm>,
        default: Option<Vec<Statement>>,
    },
    Custom(Box<dyn Fn(usize) -> String>),
}

fn ind(n: usize) -> String {
    " ".repeat(n)
}

fn emit_body(body: &[Statement], indent: usize, out: &mut String) {
    for stmt in body {
        out.push_str(&stmt.emit(indent));
        out.push('\n');
    }
}

impl Statement {
    pub fn custom<F: Fn(usize) -> String + 'static>(f: F) -> Statement {
        Statement::Custom(Box::new(f))
    }

    /// A custom statement holding fixed text, indented on emission.
    pub fn raw(text: impl Into<String>) -> Statement {
        let text = text.into();
        Statement::custom(move |i| format!("{}{}", ind(i), text))
    }

    pub fn emit(&self, indent: usize) -> String {
        let pad = ind(indent);
        match self {
            Statement::Assign { lhs, rhs } => {
                format!("{}assign {} = {};", pad, lhs, rhs.emit())
            }
            Statement::Instance {
                module,
                instance,
                params,
                ports,
            } => {
                let param_txt = if params.is_empty() {
                    String::new()
                } else {
                    format!(" #({})", params.join(", "))
                };
                let port_txt = ports
                    .iter()
                    .map(|(p, n)| format!(".{}({})", p, n))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}{}{} {} ({});", pad, module, param_txt, instance, port_txt)
            }
            Statement::ForGenerate {
                genvar,
                label,
                init,
                cond,
                update,
                body,
            } => {
                let mut out = format!(
                    "{}for ({} = {}; {}; {}) begin : {}\n",
                    pad, genvar, init, cond, update, label
                );
                emit_body(body, indent + 2, &mut out);
                out.push_str(&format!("{}end", pad));
                out
            }
            Statement::IfGenerate {
                cond,
                then_body,
                else_body,
            } => {
                let mut out = format!("{}if ({}) begin\n", pad, cond.emit());
                emit_body(then_body, indent + 2, &mut out);
                out.push_str(&format!("{}end", pad));
                if let Some(else_body) = else_body {
                    out.push_str(" else begin\n");
                    emit_body(else_body, indent + 2, &mut out);
                    out.push_str(&format!("{}end", pad));
                }
                out
            }
            Statement::CaseGenerate {
                selector,
                arms,
                default,
            } => {
                let mut out = format!("{}case ({})\n", pad, selector.emit());
                for arm in arms {
                    out.push_str(&format!("{}{}: begin\n", ind(indent + 2), arm.label.emit()));
                    emit_body(&arm.body, indent + 4, &mut out);
                    out.push_str(&format!("{}end\n", ind(indent + 2)));
                }
                if let Some(default) = default {
                    out.push_str(&format!("{}default: begin\n", ind(indent + 2)));
                    emit_body(default, indent + 4, &mut out);
                    out.push_str(&format!("{}end\n", ind(indent + 2)));
                }
                out.push_str(&format!("{}endcase", pad));
                out
            }
            Statement::Custom(f) => f(indent),
        }
    }
}

/// A module: name, ANSI-style port declarations, body statements.
pub struct Module {
    pub name: String,
    pub ports: Vec<String>,
    pub body: Vec<Statement>,
}

impl Module {
    pub fn new(name: impl Into<String>, ports: Vec<String>) -> Module {
        Module {
            name: name.into(),
            ports,
            body: Vec::new(),
        }
    }

    pub fn emit(&self) -> String {
        let mut out = format!("module {}(\n", self.name);
        out.push_str(
            &self
                .ports
                .iter()
                .map(|p| format!("  {}", p))
                .collect::<Vec<_>>()
                .join(",\n"),
        );
        out.push_str("\n);\n");
        emit_body(&self.body, 2, &mut out);
        out.push_str("endmodule\n\n");
        out
    }
}

/// Formats a value in the `32'hXXXXXXXX` spelling used for parameter
/// overrides and defparam literals.
pub fn hex32(v: u32) -> String {
    format!("32'h{:08x}", v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_emit_and_eval() {
        let e = Expr::literal(7);
        assert_eq!(e.emit(), "32'd7");
        assert_eq!(e.eval(&[]).unwrap(), 7);

        let s = Expr::symbolic(7, "c0");
        assert_eq!(s.emit(), "c0");
        assert_eq!(s.eval(&[]).unwrap(), 7);
    }

    #[test]
    fn wire_ref_needs_env_slot() {
        let w = Expr::wire("t0[0]");
        assert!(w.eval(&[1, 2]).is_err());

        let w = Expr::wire_indexed("t0[1]", 1);
        assert_eq!(w.emit(), "t0[1]");
        assert_eq!(w.eval(&[10, 20]).unwrap(), 20);
        assert!(w.eval(&[10]).is_err());
    }

    #[test]
    fn binary_chain_is_left_associative() {
        // (1 - 2) - 3 wraps, not 1 - (2 - 3).
        let e = Expr::binary(
            BinOp::Sub,
            vec![Expr::literal(1), Expr::literal(2), Expr::literal(3)],
        );
        assert_eq!(e.emit(), "(32'd1 - 32'd2 - 32'd3)");
        assert_eq!(e.eval(&[]).unwrap(), 1u32.wrapping_sub(2).wrapping_sub(3));
    }

    #[test]
    fn add_wraps_modulo_2_32() {
        let e = Expr::binary(BinOp::Add, vec![Expr::literal(u32::MAX), Expr::literal(2)]);
        assert_eq!(e.eval(&[]).unwrap(), 1);
    }

    #[test]
    fn shared_subtree_serves_emit_and_eval() {
        let shared = Expr::binary(BinOp::Xor, vec![Expr::literal(0xff), Expr::literal(0x0f)]);
        let outer = Expr::binary(BinOp::Add, vec![shared.clone(), shared.clone()]);
        assert_eq!(outer.eval(&[]).unwrap(), 0xf0 + 0xf0);
        assert_eq!(outer.emit(), "((32'd255 ^ 32'd15) + (32'd255 ^ 32'd15))");
    }

    #[test]
    fn assign_emission() {
        let s = Statement::Assign {
            lhs: "out".to_string(),
            rhs: Expr::literal(5),
        };
        assert_eq!(s.emit(2), "  assign out = 32'd5;");
    }

    #[test]
    fn instance_emission() {
        let s = Statement::Instance {
            module: "const_block".to_string(),
            instance: "u_const".to_string(),
            params: vec![".VALUE(32'h0000002a)".to_string()],
            ports: vec![("w".to_string(), "t0[0]".to_string())],
        };
        assert_eq!(
            s.emit(0),
            "const_block #(.VALUE(32'h0000002a)) u_const (.w(t0[0]));"
        );

        let empty = Statement::Instance {
            module: "top_c0".to_string(),
            instance: "top_c0".to_string(),
            params: vec![],
            ports: vec![],
        };
        assert_eq!(empty.emit(0), "top_c0 top_c0 ();");
    }

    #[test]
    fn for_generate_emission() {
        let s = Statement::ForGenerate {
            genvar: "g0".to_string(),
            label: "blk0".to_string(),
            init: 0,
            cond: "g0 < 2".to_string(),
            update: "g0 = g0 + 1".to_string(),
            body: vec![Statement::Assign {
                lhs: "t0[g0]".to_string(),
                rhs: Expr::literal(0),
            }],
        };
        let text = s.emit(2);
        assert!(text.starts_with("  for (g0 = 0; g0 < 2; g0 = g0 + 1) begin : blk0\n"));
        assert!(text.contains("    assign t0[g0] = 32'd0;\n"));
        assert!(text.ends_with("  end"));
    }

    #[test]
    fn case_generate_emission() {
        let s = Statement::CaseGenerate {
            selector: Expr::symbolic(0, "g0"),
            arms: vec![CaseArm {
                label: Expr::symbolic(0, "0"),
                body: vec![Statement::raw("assign t0[0] = 32'd1;")],
            }],
            default: None,
        };
        let text = s.emit(0);
        assert!(text.starts_with("case (g0)\n"));
        assert!(text.contains("  0: begin\n"));
        assert!(text.contains("    assign t0[0] = 32'd1;\n"));
        assert!(text.ends_with("endcase"));
    }

    #[test]
    fn if_generate_emission() {
        let s = Statement::IfGenerate {
            cond: Expr::symbolic(0, "g0 == 0"),
            then_body: vec![Statement::raw("assign t0[0] = 32'd1;")],
            else_body: None,
        };
        let text = s.emit(0);
        assert!(text.starts_with("if (g0 == 0) begin\n"));
        assert!(text.ends_with("end"));
    }

    #[test]
    fn custom_statement_sees_indent() {
        let s = Statement::custom(|i| format!("{}genvar g0;", " ".repeat(i)));
        assert_eq!(s.emit(4), "    genvar g0;");
    }

    #[test]
    fn module_emission_shape() {
        let mut m = Module::new("top", vec!["output [31:0] result".to_string()]);
        m.body.push(Statement::Assign {
            lhs: "result".to_string(),
            rhs: Expr::literal(1),
        });
        let text = m.emit();
        assert!(text.starts_with("module top(\n  output [31:0] result\n);\n"));
        assert!(text.contains("  assign result = 32'd1;\n"));
        assert!(text.ends_with("endmodule\n\n"));
    }

    #[test]
    fn hex32_is_zero_padded() {
        assert_eq!(hex32(0x42), "32'h00000042");
        assert_eq!(hex32(0xdeadbeef), "32'hdeadbeef");
    }
}
