use std::sync::Arc;

use tracing::debug;

use crate::classify::{classify, Conflict};
use crate::graph::Graph;
use skein_base::{Error, Result};
use skein_effect::Effect;

// One level of the schedule. Everything in a batch has all of its
// prerequisites in strictly earlier batches, so the batch may run
// concurrently. Effects are held behind Arc: they belong to the graph and are
// read-only from here on.
#[derive(Clone, Debug)]
pub struct Batch {
    pub level: usize,
    pub effects: Vec<Arc<Effect>>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Statistics {
    pub total_effects: usize,
    pub total_batches: usize,
    // -1 distinguishes "no batches" from "batches of size zero".
    pub min_batch_size: i64,
    pub max_batch_size: usize,
    pub avg_batch_size: f64,
    pub parallelism_factor: f64,
}

#[derive(Debug)]
pub struct Scheduler {
    graph: Graph,
}

impl Scheduler {
    pub fn new(graph: Graph) -> Self {
        Scheduler { graph }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    // Iterated ready-set extraction: each round takes every unscheduled node
    // whose prerequisites have all been placed, in ascending submission
    // order. A round with nothing ready while nodes remain means the graph
    // is cyclic or corrupt.
    pub fn schedule(&self) -> Result<Vec<Batch>> {
        let n = self.graph.len();
        let mut scheduled = vec![false; n];
        let mut placed = 0;
        let mut level = 0;
        let mut batches = Vec::new();

        while placed < n {
            let mut ready = Vec::new();
            for node in self.graph.nodes().iter() {
                if scheduled[node.index()] {
                    continue;
                }
                if node.deps().iter().all(|&d| scheduled[d]) {
                    ready.push(node.index());
                }
            }
            if ready.is_empty() {
                return Err(Error::stalled(n - placed));
            }
            for &i in ready.iter() {
                scheduled[i] = true;
            }
            placed += ready.len();
            batches.push(Batch {
                level,
                effects: ready
                    .iter()
                    .map(|&i| self.graph.nodes()[i].effect().clone())
                    .collect(),
            });
            level += 1;
        }

        debug!(
            target: "skein",
            effects = n,
            batches = batches.len(),
            "schedule complete"
        );
        Ok(batches)
    }

    // Total effects over batch count; 1.0 for an empty schedule.
    pub fn parallelism_factor(batches: &[Batch]) -> f64 {
        if batches.is_empty() {
            return 1.0;
        }
        effect_count(batches) as f64 / batches.len() as f64
    }

    pub fn statistics(batches: &[Batch]) -> Statistics {
        let total_effects = effect_count(batches);
        let total_batches = batches.len();
        let min_batch_size = batches
            .iter()
            .map(|b| b.len() as i64)
            .min()
            .unwrap_or(-1);
        let max_batch_size = batches.iter().map(Batch::len).max().unwrap_or(0);
        let avg_batch_size = if total_batches == 0 {
            0.0
        } else {
            total_effects as f64 / total_batches as f64
        };
        Statistics {
            total_effects,
            total_batches,
            min_batch_size,
            max_batch_size,
            avg_batch_size,
            parallelism_factor: Self::parallelism_factor(batches),
        }
    }

    // Greedy merge of consecutive batches up to max_size effects each. A
    // batch already larger than max_size passes through untouched. The merge
    // ignores levels, so the result is only safe to run concurrently after
    // re-validation; the executor checks every batch it is handed.
    pub fn optimize_batches(batches: Vec<Batch>, max_size: usize) -> Vec<Batch> {
        if max_size == 0 {
            return batches;
        }
        let mut out: Vec<Batch> = Vec::new();
        let mut pending: Vec<Arc<Effect>> = Vec::new();

        for batch in batches {
            if !pending.is_empty() && pending.len() + batch.effects.len() > max_size {
                out.push(Batch {
                    level: out.len(),
                    effects: std::mem::take(&mut pending),
                });
            }
            if batch.effects.len() > max_size {
                out.push(Batch {
                    level: out.len(),
                    effects: batch.effects,
                });
            } else {
                pending.extend(batch.effects);
            }
        }
        if !pending.is_empty() {
            out.push(Batch {
                level: out.len(),
                effects: pending,
            });
        }
        out
    }
}

// Rejects any batch holding a conflicting pair. Stricter than
// `Graph::detect_conflicts`: read-write pairs are also fatal here, because
// inside one batch there is no ordering to resolve them.
pub fn validate_batches(batches: &[Batch]) -> Result<()> {
    for (bi, batch) in batches.iter().enumerate() {
        for x in 0..batch.effects.len() {
            for y in (x + 1)..batch.effects.len() {
                let conflict = classify(&batch.effects[x], &batch.effects[y]);
                if conflict != Conflict::None {
                    return Err(Error::conflicting(
                        bi,
                        x,
                        y,
                        &batch.effects[x].primary_key(),
                        conflict.name(),
                    ));
                }
            }
        }
    }
    Ok(())
}

pub fn effect_count(batches: &[Batch]) -> usize {
    batches.iter().map(Batch::len).sum()
}

pub fn get_batch<'a>(batches: &'a [Batch], index: usize) -> Option<&'a Batch> {
    batches.get(index)
}

// Flattens batches back into one list, batch order preserved. For a schedule
// of a valid effect list this is a permutation of the input.
pub fn extract_effects(batches: &[Batch]) -> Vec<Arc<Effect>> {
    batches
        .iter()
        .flat_map(|b| b.effects.iter().cloned())
        .collect()
}
