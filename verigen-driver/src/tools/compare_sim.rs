// SPDX-License-Identifier: Apache-2.0

//! CompareSim: a meta-backend that runs two simulators on the same design
//! and requires their values to agree. No external oracle is involved; the
//! orchestrator skips the oracle comparison for this backend by name.

use std::path::Path;
use std::sync::Arc;

use super::icarus::IcarusTool;
use super::modelsim::ModelSimTool;
use super::{Tool, ToolLog, ToolResult};

/// Marker prefix on divergence logs, so the orchestrator can classify a
/// cross-simulator disagreement as a mismatch rather than a tool crash.
pub const DIVERGENCE_MARKER: &str = "cross-simulator mismatch";

pub struct CompareSimTool {
    first: Arc<dyn Tool>,
    second: Arc<dyn Tool>,
}

impl CompareSimTool {
    pub fn new(chat: bool) -> Self {
        CompareSimTool {
            first: Arc::new(IcarusTool::new(chat)),
            second: Arc::new(ModelSimTool::new(chat)),
        }
    }

    /// Composes arbitrary child backends; used by tests to substitute
    /// deterministic stand-ins for the real simulators.
    pub fn with_children(first: Arc<dyn Tool>, second: Arc<dyn Tool>) -> Self {
        CompareSimTool { first, second }
    }
}

impl Tool for CompareSimTool {
    fn name(&self) -> &'static str {
        "CompareSim"
    }

    fn run(&self, rtl: &Path, top: &str, workdir: &Path) -> ToolResult {
        let first = self
            .first
            .run(rtl, top, &workdir.join(self.first.name()));
        let second = self
            .second
            .run(rtl, top, &workdir.join(self.second.name()));

        if !first.success || !second.success {
            return ToolResult::failed(ToolLog::Text(format!(
                "=== {} log ===\n{}\n=== {} log ===\n{}",
                self.first.name(),
                first.log,
                self.second.name(),
                second.log
            )));
        }

        if first.value != second.value {
            return ToolResult::failed(ToolLog::Text(format!(
                "{}: {}=0x{:08x} {}=0x{:08x}",
                DIVERGENCE_MARKER,
                self.first.name(),
                first.value,
                self.second.name(),
                second.value
            )));
        }

        ToolResult::passed(
            first.value,
            ToolLog::Text(format!("simulators agree on 0x{:08x}", first.value)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTool {
        name: &'static str,
        result: ToolResult,
    }

    impl Tool for FixedTool {
        fn name(&self) -> &'static str {
            self.name
        }
        fn run(&self, _rtl: &Path, _top: &str, _workdir: &Path) -> ToolResult {
            self.result.clone()
        }
    }

    fn fixed(name: &'static str, result: ToolResult) -> Arc<dyn Tool> {
        Arc::new(FixedTool { name, result })
    }

    #[test]
    fn agreement_reports_the_common_value() {
        let tool = CompareSimTool::with_children(
            fixed("a", ToolResult::passed(0x42, ToolLog::Text(String::new()))),
            fixed("b", ToolResult::passed(0x42, ToolLog::Text(String::new()))),
        );
        let r = tool.run(Path::new("x.v"), "top", Path::new("w"));
        assert!(r.success);
        assert_eq!(r.value, 0x42);
    }

    #[test]
    fn divergence_is_a_failure() {
        let tool = CompareSimTool::with_children(
            fixed("a", ToolResult::passed(0x42, ToolLog::Text(String::new()))),
            fixed("b", ToolResult::passed(0x43, ToolLog::Text(String::new()))),
        );
        let r = tool.run(Path::new("x.v"), "top", Path::new("w"));
        assert!(!r.success);
        match r.log {
            ToolLog::Text(t) => assert!(t.contains("mismatch")),
            ToolLog::Path(_) => panic!("expected inline log"),
        }
    }

    #[test]
    fn child_failure_propagates() {
        let tool = CompareSimTool::with_children(
            fixed("a", ToolResult::failed(ToolLog::Text("boom".to_string()))),
            fixed("b", ToolResult::passed(0x42, ToolLog::Text(String::new()))),
        );
        let r = tool.run(Path::new("x.v"), "top", Path::new("w"));
        assert!(!r.success);
        match r.log {
            ToolLog::Text(t) => assert!(t.contains("boom")),
            ToolLog::Path(_) => panic!("expected inline log"),
        }
    }
}
