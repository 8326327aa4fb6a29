// Ordering machinery for effect batches.
//
// The pipeline here is: effects in submission order go into a dependency
// graph whose edges are must-execute-after constraints derived from each
// effect's declared key footprint. The scheduler then peels the graph into
// levels: batch 0 is everything with no prerequisites, batch k is everything
// whose prerequisites all sit at levels below k. Effects inside one batch
// never touch the same key with a write, so an executor may run them
// concurrently; batches themselves run in order.
//
// Everything in this crate is single-threaded and deterministic. The same
// effect list always yields the same graph, the same batches and the same
// statistics. Submission index is the tie-break everywhere.

mod classify;
mod graph;
mod level;


pub use classify::{classify, Conflict};
pub use graph::{ConflictReport, Graph, Node};
pub use level::{
    effect_count, extract_effects, get_batch, validate_batches, Batch, Scheduler, Statistics,
};
