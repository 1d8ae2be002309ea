//! Labelled `-filter_complex` graph construction.

use std::collections::BTreeMap;
use std::fmt;

/// A filter graph under construction.
///
/// Every node reads named input pads and writes freshly labelled output
/// pads, so chains can be wired together without label collisions.
#[derive(Debug, Clone, Default)]
pub struct FilterGraph {
    nodes: Vec<String>,
    counters: BTreeMap<String, usize>,
}

fn pads(labels: &[String]) -> String {
    labels.iter().map(|l| format!("[{l}]")).collect()
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A label unused so far in this graph: `prefix0`, `prefix1`, ...
    pub fn fresh_label(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let label = format!("{prefix}{counter}");
        *counter += 1;
        label
    }

    /// Append `[inputs]filter[outputs]` with `outputs` fresh labels using
    /// `prefix`. Returns the new output labels.
    pub fn add_node(
        &mut self,
        inputs: &[String],
        filter: &str,
        prefix: &str,
        outputs: usize,
    ) -> Vec<String> {
        let labels: Vec<String> = (0..outputs).map(|_| self.fresh_label(prefix)).collect();
        self.nodes
            .push(format!("{}{}{}", pads(inputs), filter, pads(&labels)));
        labels
    }

    /// Fan one input out into `n` copies with `split=n`.
    pub fn split(&mut self, input: &str, n: usize) -> Vec<String> {
        self.add_node(&[input.to_string()], &format!("split={n}"), "s", n)
    }

    /// Append a comma-joined chain reading `input` and writing one fresh
    /// label. An empty chain becomes the `null` pass-through filter.
    pub fn chain(&mut self, input: &str, filters: &[String], prefix: &str) -> String {
        let body = if filters.is_empty() {
            "null".to_string()
        } else {
            filters.join(",")
        };
        let mut labels = self.add_node(&[input.to_string()], &body, prefix, 1);
        labels.pop().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nodes.join(";"))
    }
}
