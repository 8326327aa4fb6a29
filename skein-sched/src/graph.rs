use std::collections::BTreeSet;
use std::sync::Arc;

use rapidhash::RapidHashMap;
use tracing::debug;

use crate::classify::{classify, Conflict};
use skein_base::{Error, Result};
use skein_effect::Effect;

// One graph node per effect, in submission order. `deps` are earlier effects
// this one must execute after; `dependents` is the symmetric reverse. Edges
// only ever point from a higher index to a lower one, which is what makes
// cycles impossible for graphs built from a submission-ordered list. The
// cycle check stays anyway: a corrupted graph must fail loudly, not schedule
// nonsense.
#[derive(Debug)]
pub struct Node {
    index: usize,
    effect: Arc<Effect>,
    deps: BTreeSet<usize>,
    dependents: BTreeSet<usize>,
}

impl Node {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn effect(&self) -> &Arc<Effect> {
        &self.effect
    }

    pub fn deps(&self) -> &BTreeSet<usize> {
        &self.deps
    }

    pub fn dependents(&self) -> &BTreeSet<usize> {
        &self.dependents
    }
}

// A write-write pair found by `detect_conflicts`. `first` and `second` are
// submission indices, first < second.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ConflictReport {
    pub first: usize,
    pub second: usize,
    pub key: Vec<u8>,
    pub conflict: Conflict,
}

#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    // Validates every effect up front, then derives edges from the declared
    // dependencies:
    //
    //   read-only dep on k  -> edges to every earlier writer of k
    //   read-write dep on k -> edges to every earlier reader and writer of k
    //
    // The reader/writer indices are built incrementally in submission order,
    // so every index they hold is already smaller than the node being wired.
    pub fn new(effects: Vec<Effect>) -> Result<Graph> {
        for (index, effect) in effects.iter().enumerate() {
            if let Err(e) = effect.validate() {
                debug!(target: "skein", index, "effect rejected during graph build");
                return Err(e);
            }
        }

        let mut nodes: Vec<Node> = effects
            .into_iter()
            .enumerate()
            .map(|(index, effect)| Node {
                index,
                effect: Arc::new(effect),
                deps: BTreeSet::new(),
                dependents: BTreeSet::new(),
            })
            .collect();

        let mut readers: RapidHashMap<Vec<u8>, Vec<usize>> = RapidHashMap::default();
        let mut writers: RapidHashMap<Vec<u8>, Vec<usize>> = RapidHashMap::default();

        for i in 0..nodes.len() {
            let effect = nodes[i].effect.clone();
            let deps = effect.dependencies();

            for dep in deps.iter() {
                if dep.read_only {
                    if let Some(ws) = writers.get(&dep.key) {
                        for &j in ws {
                            add_edge(&mut nodes, i, j);
                        }
                    }
                } else {
                    if let Some(rs) = readers.get(&dep.key) {
                        for &j in rs {
                            add_edge(&mut nodes, i, j);
                        }
                    }
                    if let Some(ws) = writers.get(&dep.key) {
                        for &j in ws {
                            add_edge(&mut nodes, i, j);
                        }
                    }
                }
            }

            for dep in deps {
                let slot = if dep.read_only {
                    readers.entry(dep.key).or_default()
                } else {
                    writers.entry(dep.key).or_default()
                };
                // An effect may declare the same key more than once.
                if slot.last() != Some(&i) {
                    slot.push(i);
                }
            }
        }

        let graph = Graph { nodes };
        debug!(
            target: "skein",
            nodes = graph.len(),
            edges = graph.edge_count(),
            "dependency graph built"
        );
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.deps.len()).sum()
    }

    pub fn has_cycles(&self) -> bool {
        self.postorder().is_none()
    }

    // Dependencies before dependents. Fails if the graph somehow acquired a
    // cycle.
    pub fn topological_sort(&self) -> Result<Vec<usize>> {
        self.postorder().ok_or_else(Error::cycle)
    }

    // Nodes with no prerequisites, in ascending submission order.
    pub fn independent_nodes(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .filter(|n| n.deps.is_empty())
            .map(|n| n.index)
            .collect()
    }

    // Write-write pairs grouped by primary key. Read-write pairs are not
    // reported: ordering resolves them. Reports come back sorted by index
    // pair regardless of hash-map iteration order.
    pub fn detect_conflicts(&self) -> Vec<ConflictReport> {
        let mut groups: RapidHashMap<Vec<u8>, Vec<usize>> = RapidHashMap::default();
        for node in self.nodes.iter() {
            groups
                .entry(node.effect.primary_key())
                .or_default()
                .push(node.index);
        }

        let mut reports = Vec::new();
        for (key, members) in groups.iter() {
            if members.len() < 2 {
                continue;
            }
            for x in 0..members.len() {
                for y in (x + 1)..members.len() {
                    let (i, j) = (members[x], members[y]);
                    let conflict = classify(&self.nodes[i].effect, &self.nodes[j].effect);
                    if conflict == Conflict::WriteWrite {
                        reports.push(ConflictReport {
                            first: i,
                            second: j,
                            key: key.clone(),
                            conflict,
                        });
                    }
                }
            }
        }
        reports.sort();
        reports
    }

    // DFS postorder over dep edges with a gray set for back-edge detection.
    // Returns None when a cycle is present.
    fn postorder(&self) -> Option<Vec<usize>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Gray,
            Black,
        }

        let n = self.nodes.len();
        let mut marks = vec![Mark::White; n];
        let mut order = Vec::with_capacity(n);

        for root in 0..n {
            if marks[root] != Mark::White {
                continue;
            }
            marks[root] = Mark::Gray;
            let mut stack: Vec<(usize, Vec<usize>)> =
                vec![(root, self.nodes[root].deps.iter().copied().collect())];

            loop {
                let next = match stack.last_mut() {
                    None => break,
                    Some((_, pending)) => pending.pop(),
                };
                match next {
                    Some(j) => match marks[j] {
                        Mark::White => {
                            marks[j] = Mark::Gray;
                            stack.push((j, self.nodes[j].deps.iter().copied().collect()));
                        }
                        Mark::Gray => return None,
                        Mark::Black => {}
                    },
                    None => {
                        if let Some((node, _)) = stack.pop() {
                            marks[node] = Mark::Black;
                            order.push(node);
                        }
                    }
                }
            }
        }
        Some(order)
    }

    #[cfg(test)]
    pub(crate) fn force_edge(&mut self, from: usize, to: usize) {
        add_edge(&mut self.nodes, from, to);
    }
}

fn add_edge(nodes: &mut [Node], from: usize, to: usize) {
    if from == to {
        return;
    }
    if nodes[from].deps.insert(to) {
        nodes[to].dependents.insert(from);
    }
}
