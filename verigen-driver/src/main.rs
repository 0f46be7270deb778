// SPDX-License-Identifier: Apache-2.0

//! Differential fuzzing driver for Verilog EDA toolchains.
//!
//! Each iteration synthesizes a random constrained design, computes the
//! expected 32-bit result with the generator's built-in oracle, drives the
//! design through the selected EDA backend, and compares the recovered
//! value. Mismatches, tool crashes, and watchdog time-outs are counted
//! separately and folded into the exit code.
//!
//! Sample usage:
//!
//! ```shell
//! $ verigen-driver -n 100 -s 1 -t 4
//! $ verigen-driver --hier --depth 3 --root-prefix -t 6
//! $ verigen-driver -n 5 --emit-file designs/top.v
//! ```

mod numbered;
mod session;
mod tools;

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use verigen::hier_gen::{HierConfig, HierarchyGen};
use verigen::loop_gen::{LoopConfig, LoopGenerator};
use verigen::Generator;

use session::Session;
use tools::{run_with_watchdog, select_tool, Tool};

/// Top module name shared by both generators.
const TOP_NAME: &str = "top";

/// Session directories are created under this base, next to the invocation.
const SESSION_BASE: &str = "build";

#[derive(Debug, Default)]
struct Counters {
    iterations: u32,
    passes: u32,
    mismatches: u32,
    crashes: u32,
    timeouts: u32,
}

/// Exit-code dominance: crash > timeout > mismatch > clean.
fn exit_code(c: &Counters) -> i32 {
    if c.crashes > 0 {
        3
    } else if c.timeouts > 0 {
        2
    } else if c.mismatches > 0 {
        1
    } else {
        0
    }
}

trait AppExt {
    fn add_flag(self, id: &'static str, long: &'static str, help: &'static str) -> Self;
    fn add_opt(
        self,
        id: &'static str,
        long: &'static str,
        value_name: &'static str,
        default: &'static str,
        help: &'static str,
    ) -> Self;
}

impl AppExt for clap::Command {
    fn add_flag(self, id: &'static str, long: &'static str, help: &'static str) -> Self {
        self.arg(Arg::new(id).long(long).help(help).action(ArgAction::SetTrue))
    }

    fn add_opt(
        self,
        id: &'static str,
        long: &'static str,
        value_name: &'static str,
        default: &'static str,
        help: &'static str,
    ) -> Self {
        self.arg(
            Arg::new(id)
                .long(long)
                .value_name(value_name)
                .default_value(default)
                .help(help)
                .action(ArgAction::Set),
        )
    }
}

fn build_command() -> clap::Command {
    clap::Command::new("verigen-driver")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Differential fuzzer for Verilog EDA toolchains")
        .arg(
            Arg::new("iter")
                .short('n')
                .long("iter")
                .value_name("N")
                .default_value("1")
                .help("Number of fuzzing iterations")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("seed")
                .short('s')
                .long("seed")
                .value_name("SEED")
                .help("RNG seed (OS entropy when omitted)")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("tool")
                .short('t')
                .long("tool")
                .value_name("1..6")
                .default_value("4")
                .help(
                    "Backend: 1=quartus, 2=quartus-pro, 3=vivado, 4=icarus, \
                     5=modelsim, 6=CompareSim",
                )
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("chat")
                .short('c')
                .long("chat")
                .help("Echo subprocess output and per-iteration values")
                .action(ArgAction::SetTrue),
        )
        .add_flag("hier", "hier", "Use the hierarchy generator instead of the loop generator")
        .add_opt("min_start", "min-start", "N", "0", "Lowest loop start value")
        .add_opt("max_start", "max-start", "N", "0", "Highest loop start value")
        .add_opt("min_iter", "min-iter", "N", "2", "Lowest per-loop iteration count")
        .add_opt("max_iter", "max-iter", "N", "16", "Highest per-loop iteration count")
        .add_flag(
            "no_rand_update",
            "no-rand-update",
            "Always increment loops instead of coin-flipping the direction",
        )
        .add_opt("depth", "depth", "N", "2", "Loop nesting depth / hierarchy tree depth")
        .add_opt("min_child", "min-child", "N", "2", "Lowest per-node fanout (hierarchy)")
        .add_opt("max_child", "max-child", "N", "4", "Highest per-node fanout (hierarchy)")
        .add_flag(
            "root_prefix",
            "root-prefix",
            "Allow $root.tb.top.... absolute references (hierarchy)",
        )
        .add_flag(
            "relative_up",
            "relative-up",
            "Allow leading `..` upward references (hierarchy; experimental)",
        )
        .add_flag(
            "alias",
            "alias",
            "Append an alias declaration over two leaf nets (hierarchy; experimental)",
        )
        .add_flag(
            "defparam",
            "defparam",
            "Parameterize leaves and override one via defparam (hierarchy)",
        )
        .add_flag(
            "include_gen",
            "include-gen",
            "Leaves may embed complete loop-generator designs (hierarchy)",
        )
        .add_opt(
            "gen_prob",
            "gen-prob",
            "P",
            "0.5",
            "Probability that a leaf embeds a loop design",
        )
        .arg(
            Arg::new("emit_file")
                .long("emit-file")
                .value_name("FILE")
                .help("Emit Verilog only (numbered <stem>_NN<ext> when -n > 1); no tools run")
                .action(ArgAction::Set),
        )
        .add_opt(
            "timeout",
            "timeout",
            "SECS",
            "600",
            "Per-tool wall-clock watchdog budget",
        )
}

fn parsed<T>(matches: &ArgMatches, id: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = matches
        .get_one::<String>(id)
        .with_context(|| format!("missing value for --{}", id))?;
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid value `{}` for --{}: {}", raw, id, e))
}

fn loop_config(matches: &ArgMatches, seed: u64) -> anyhow::Result<LoopConfig> {
    Ok(LoopConfig {
        seed,
        depth: parsed(matches, "depth")?,
        min_start: parsed(matches, "min_start")?,
        max_start: parsed(matches, "max_start")?,
        min_iter: parsed(matches, "min_iter")?,
        max_iter: parsed(matches, "max_iter")?,
        random_update: !matches.get_flag("no_rand_update"),
    })
}

fn hier_config(matches: &ArgMatches, seed: u64) -> anyhow::Result<HierConfig> {
    Ok(HierConfig {
        seed,
        depth: parsed(matches, "depth")?,
        min_child: parsed(matches, "min_child")?,
        max_child: parsed(matches, "max_child")?,
        root_prefix: matches.get_flag("root_prefix"),
        relative_up: matches.get_flag("relative_up"),
        alias: matches.get_flag("alias"),
        defparam: matches.get_flag("defparam"),
        enable_big_gen: matches.get_flag("include_gen"),
        big_gen_prob: parsed(matches, "gen_prob")?,
    })
}

/// Emit-only mode: write the generated designs and report their oracle
/// values, without driving any backend.
fn emit_only(generator: &mut dyn Generator, base: &str, iters: u32) -> anyhow::Result<i32> {
    let base = PathBuf::from(base);
    for i in 0..iters {
        let design = generator.emit_design(i);
        let path = if iters > 1 {
            numbered::make_numbered(&base, i, 2)
        } else {
            base.clone()
        };
        std::fs::write(&path, &design.text)
            .with_context(|| format!("cannot write {}", path.display()))?;
        println!("{}  oracle=0x{:08x}", path.display(), design.oracle);
    }
    Ok(0)
}

fn run(matches: &ArgMatches) -> anyhow::Result<i32> {
    let iters: u32 = std::cmp::max(1, parsed(matches, "iter")?);
    let seed: u64 = match matches.get_one::<String>("seed") {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid seed `{}`: {}", raw, e))?,
        None => rand::random(),
    };
    log::info!("seed: {}", seed);
    let chat = matches.get_flag("chat");

    let loop_cfg = loop_config(matches, seed)?;
    let mut generator: Box<dyn Generator> = if matches.get_flag("hier") {
        Box::new(
            HierarchyGen::new(hier_config(matches, seed)?, loop_cfg)
                .map_err(anyhow::Error::msg)?,
        )
    } else {
        Box::new(LoopGenerator::new(loop_cfg).map_err(anyhow::Error::msg)?)
    };

    if let Some(emit) = matches.get_one::<String>("emit_file") {
        return emit_only(generator.as_mut(), emit, iters);
    }

    let tool = select_tool(parsed(matches, "tool")?, chat)?;
    let timeout = Duration::from_secs(parsed(matches, "timeout")?);
    let mut session = Session::create(Path::new(SESSION_BASE))?;
    log::info!("session directory: {}", session.dir().display());

    // Tools run in declared order within an iteration; the CLI selects a
    // single backend, but the orchestration below does not depend on that.
    let selected: Vec<Arc<dyn Tool>> = vec![tool];

    let mut counters = Counters::default();
    for i in 0..iters {
        let iter_dir = session.next()?;
        let (rtl, oracle) = generator
            .generate_into(&iter_dir, i)
            .with_context(|| format!("cannot write generated design for iteration {}", i))?;
        let rtl = rtl
            .canonicalize()
            .with_context(|| format!("cannot resolve {}", rtl.display()))?;

        let mut iteration_passed = true;
        for tool in &selected {
            let workdir = iter_dir.join(tool.name());
            match run_with_watchdog(tool.clone(), &rtl, TOP_NAME, &workdir, timeout) {
                None => {
                    counters.timeouts += 1;
                    iteration_passed = false;
                    eprintln!(
                        "iteration {}: {} timed out after {}s; artifacts in {}",
                        i,
                        tool.name(),
                        timeout.as_secs(),
                        workdir.display()
                    );
                }
                Some(result) if !result.success => {
                    // A cross-simulator divergence is a differential
                    // failure, not a tool crash.
                    let diverged = tool.name() == "CompareSim"
                        && matches!(&result.log, tools::ToolLog::Text(t)
                            if t.starts_with(tools::compare_sim::DIVERGENCE_MARKER));
                    if diverged {
                        counters.mismatches += 1;
                    } else {
                        counters.crashes += 1;
                    }
                    iteration_passed = false;
                    eprintln!(
                        "iteration {}: {} failed: {}",
                        i,
                        tool.name(),
                        result.log
                    );
                }
                Some(result) => {
                    // CompareSim is a pure cross-simulator check; its result
                    // is never held against the oracle.
                    let checked_against_oracle = tool.name() != "CompareSim";
                    let ok = !checked_against_oracle || result.value == oracle;
                    if !ok {
                        counters.mismatches += 1;
                        iteration_passed = false;
                        eprintln!(
                            "iteration {}: {} mismatch: golden 0x{:08x} simulated 0x{:08x}; artifacts in {}",
                            i,
                            tool.name(),
                            oracle,
                            result.value,
                            iter_dir.display()
                        );
                    }
                    if chat {
                        println!("--- iteration {} ({}) ---", i, tool.name());
                        println!("golden    = 0x{:08x}", oracle);
                        println!(
                            "simulated = 0x{:08x}  [{}]",
                            result.value,
                            if ok { "OK" } else { "FAIL" }
                        );
                    }
                }
            }
        }
        counters.iterations += 1;
        if iteration_passed {
            counters.passes += 1;
        }
    }

    println!(
        "{} iterations: {} passed, {} mismatches, {} crashes, {} timeouts",
        counters.iterations,
        counters.passes,
        counters.mismatches,
        counters.crashes,
        counters.timeouts
    );
    println!("artifacts in {}", session.dir().display());
    Ok(exit_code(&counters))
}

fn main() {
    let _ = env_logger::try_init();
    log::info!(
        "verigen-driver starting; version: {}",
        env!("CARGO_PKG_VERSION")
    );
    let matches = build_command().get_matches();
    match run(&matches) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("verigen-driver: {:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_dominance() {
        let clean = Counters::default();
        assert_eq!(exit_code(&clean), 0);

        let mismatch = Counters {
            mismatches: 1,
            ..Counters::default()
        };
        assert_eq!(exit_code(&mismatch), 1);

        let timeout_and_mismatch = Counters {
            mismatches: 2,
            timeouts: 1,
            ..Counters::default()
        };
        assert_eq!(exit_code(&timeout_and_mismatch), 2);

        let all = Counters {
            mismatches: 2,
            timeouts: 1,
            crashes: 5,
            ..Counters::default()
        };
        assert_eq!(exit_code(&all), 3);
    }

    #[test]
    fn loop_defaults_match_the_interface_contract() {
        let matches = build_command().get_matches_from(["verigen-driver"]);
        let cfg = loop_config(&matches, 7).unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.depth, 2);
        assert_eq!(cfg.min_start, 0);
        assert_eq!(cfg.max_start, 0);
        assert_eq!(cfg.min_iter, 2);
        assert_eq!(cfg.max_iter, 16);
        assert!(cfg.random_update);
    }

    #[test]
    fn hier_defaults_match_the_interface_contract() {
        let matches = build_command().get_matches_from(["verigen-driver"]);
        let cfg = hier_config(&matches, 7).unwrap();
        assert_eq!(cfg.depth, 2);
        assert_eq!(cfg.min_child, 2);
        assert_eq!(cfg.max_child, 4);
        assert!(!cfg.root_prefix);
        assert!(!cfg.relative_up);
        assert!(!cfg.alias);
        assert!(!cfg.defparam);
        assert!(!cfg.enable_big_gen);
        assert!((cfg.big_gen_prob - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn no_rand_update_disables_the_coin_flip() {
        let matches =
            build_command().get_matches_from(["verigen-driver", "--no-rand-update"]);
        let cfg = loop_config(&matches, 0).unwrap();
        assert!(!cfg.random_update);
    }
}
