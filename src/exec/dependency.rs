//! Builds a dependency graph over a batch of tool calls and groups them
//! into waves that can run in parallel.
//!
//! Two calls conflict — and must run in separate waves, in original order —
//! when they touch the same file and at least one of them writes. Calls
//! that only read the same file, or touch different files entirely, are
//! independent and land in the same wave.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use tracing::warn;

/// Tools that only read filesystem or symbol state.
pub static READ_TOOLS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "read_file",
        "list_dir",
        "find_file",
        "search_for_pattern",
        "get_symbols_overview",
        "find_symbol",
        "find_referencing_symbols",
        "goto_definition",
        "find_references",
        "hover",
        "document_symbols",
        "workspace_symbols",
        "incoming_calls",
        "outgoing_calls",
        "implementations",
        "type_definition",
    ]
    .into_iter()
    .collect()
});

/// Tools that mutate filesystem state.
pub static WRITE_TOOLS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "create_text_file",
        "replace_symbol_body",
        "insert_before_symbol",
        "insert_after_symbol",
        "delete_symbol",
        "rename_symbol",
    ]
    .into_iter()
    .collect()
});

/// Tools whose primary argument is a symbol name path rather than a file.
pub static SYMBOL_TOOLS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "find_symbol",
        "find_referencing_symbols",
        "replace_symbol_body",
        "insert_before_symbol",
        "insert_after_symbol",
        "delete_symbol",
        "rename_symbol",
    ]
    .into_iter()
    .collect()
});

const PATH_PARAM_NAMES: &[&str] = &["file_path", "relative_path", "path", "memory_file_name", "within_path"];

/// One call within a `batch_execute_tools` request.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// The MCP tool name.
    pub name: String,
    /// The call's parameters, as sent by the client.
    pub params: Map<String, Value>,
    /// This call's position in the original request, preserved in the
    /// final reordered output.
    pub index: usize,
}

impl ToolCall {
    /// Extracts the file path this call operates on, if any of the known
    /// path-bearing parameter names are present.
    #[must_use]
    pub fn file_path(&self) -> Option<&str> {
        PATH_PARAM_NAMES
            .iter()
            .find_map(|name| self.params.get(*name).and_then(Value::as_str))
    }

    fn is_write(&self) -> bool {
        WRITE_TOOLS.contains(self.name.as_str())
    }
}

/// A dependency graph over a batch of tool calls, resolved into waves of
/// calls that can execute concurrently.
pub struct DependencyGraph {
    waves: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Builds the graph and computes its waves.
    ///
    /// A cycle never drops calls: whatever indices are still blocked once
    /// the topological layering stalls are collapsed into one final
    /// sequential wave, in index order, and a warning is logged.
    #[must_use]
    pub fn build(calls: &[ToolCall]) -> Self {
        let n = calls.len();
        let mut dependencies: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (i, call) in calls.iter().enumerate() {
            let Some(path) = call.file_path() else { continue };
            for (j, earlier) in calls.iter().enumerate().take(i) {
                let Some(earlier_path) = earlier.file_path() else {
                    continue;
                };
                if earlier_path == path && (call.is_write() || earlier.is_write()) {
                    dependencies[i].push(j);
                }
            }
        }

        Self::from_dependencies(dependencies)
    }

    /// Resolves an explicit `index -> [prereq_index, ...]` dependency table
    /// into waves. Shared by [`Self::build`] and, under `#[cfg(test)]`, by
    /// tests that need to force a cycle the real extraction never produces.
    fn from_dependencies(dependencies: Vec<Vec<usize>>) -> Self {
        let n = dependencies.len();

        // in-degree computed once, directly from each node's own dependency
        // list length, rather than derived incrementally while mutating
        // state (the bug in the tool this was ported from).
        let mut in_degree: Vec<usize> = dependencies.iter().map(Vec::len).collect();
        let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
        for (i, deps) in dependencies.iter().enumerate() {
            for &j in deps {
                dependents.entry(j).or_default().push(i);
            }
        }

        let mut waves = Vec::new();
        let mut remaining = n;
        let mut ready: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();

        while !ready.is_empty() {
            ready.sort_unstable();
            remaining -= ready.len();
            let mut next_ready = Vec::new();
            for &i in &ready {
                if let Some(deps) = dependents.get(&i) {
                    for &dep in deps {
                        in_degree[dep] -= 1;
                        if in_degree[dep] == 0 {
                            next_ready.push(dep);
                        }
                    }
                }
            }
            waves.push(ready);
            ready = next_ready;
        }

        if remaining != 0 {
            let mut cyclic: Vec<usize> = (0..n).filter(|&i| in_degree[i] != 0).collect();
            cyclic.sort_unstable();
            warn!(indices = ?cyclic, "tool dependency graph has a cycle; running the remaining calls in one final sequential wave");
            waves.push(cyclic);
        }

        Self { waves }
    }

    /// Builds a graph directly from a forced dependency table, bypassing
    /// path-based extraction. Used to exercise the cycle-collapse path.
    #[cfg(test)]
    pub(crate) fn build_from_dependencies(dependencies: Vec<Vec<usize>>) -> Self {
        Self::from_dependencies(dependencies)
    }

    /// The resolved waves: each inner list holds call indices that may
    /// execute concurrently, in the order they must run relative to other
    /// waves.
    #[must_use]
    pub fn waves(&self) -> &[Vec<usize>] {
        &self.waves
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, path: Option<&str>, index: usize) -> ToolCall {
        let mut params = Map::new();
        if let Some(p) = path {
            params.insert("file_path".to_string(), Value::String(p.to_string()));
        }
        ToolCall {
            name: name.to_string(),
            params,
            index,
        }
    }

    #[test]
    fn test_independent_reads_share_one_wave() {
        let calls = vec![
            call("read_file", Some("a.rs"), 0),
            call("read_file", Some("b.rs"), 1),
        ];
        let graph = DependencyGraph::build(&calls);
        assert_eq!(graph.waves(), &[vec![0, 1]]);
    }

    #[test]
    fn test_write_then_read_same_file_are_sequenced() {
        let calls = vec![
            call("create_text_file", Some("a.rs"), 0),
            call("read_file", Some("a.rs"), 1),
        ];
        let graph = DependencyGraph::build(&calls);
        assert_eq!(graph.waves(), &[vec![0], vec![1]]);
    }

    #[test]
    fn test_reads_on_same_file_are_not_sequenced() {
        let calls = vec![
            call("read_file", Some("a.rs"), 0),
            call("read_file", Some("a.rs"), 1),
        ];
        let graph = DependencyGraph::build(&calls);
        assert_eq!(graph.waves(), &[vec![0, 1]]);
    }

    #[test]
    fn test_three_writes_to_same_file_fully_sequenced() {
        let calls = vec![
            call("create_text_file", Some("a.rs"), 0),
            call("create_text_file", Some("a.rs"), 1),
            call("create_text_file", Some("a.rs"), 2),
        ];
        let graph = DependencyGraph::build(&calls);
        assert_eq!(graph.waves(), &[vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_forced_cycle_collapses_into_one_final_sequential_wave() {
        let graph = DependencyGraph::build_from_dependencies(vec![vec![1], vec![0]]);
        assert_eq!(graph.waves(), &[vec![0, 1]]);
    }
}
