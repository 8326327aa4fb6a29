// Ties the subsystem crates into the standard pipeline:
//
//   application logic -> Collector -> effect list -> Graph -> Scheduler
//     -> batches -> Executor -> store mutations + event log
//
// Hosts that want finer control (their own batch preparation, their own
// stores, statistics inspection) use the subsystem crates directly; this
// crate only adds the one-call entry point and re-exports the surface.


pub use skein_base::{err, Error, Result};
pub use skein_effect::{
    balance_key, full_key, Coins, Collector, DepKind, Dependency, Effect, EffectKind, Event,
    ReadSink, ReadSlot,
};
pub use skein_exec::{
    BalanceStore, CancelToken, EventLog, ExecConfig, Executor, MemBalances, MemStore, Store,
};
pub use skein_sched::{
    classify, effect_count, extract_effects, get_batch, validate_batches, Batch, Conflict,
    ConflictReport, Graph, Node, Scheduler, Statistics,
};

// End to end: validate the effects, build the dependency graph, levelize.
// The returned batches are ready for `Executor::execute_parallel`.
pub fn schedule_effects(effects: Vec<Effect>) -> Result<Vec<Batch>> {
    let graph = Graph::new(effects)?;
    Scheduler::new(graph).schedule()
}
