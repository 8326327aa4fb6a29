use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::log::EventLog;
use crate::store::{BalanceStore, Store};
use skein_base::{err, Error, Result};
use skein_effect::{Effect, Event};
use skein_sched::{validate_batches, Batch, Graph, Scheduler};

// Flat per-variant gas costs. The counter is monotonic and informational;
// there is no metering schedule and no refund machinery.
const GAS_READ: u64 = 1;
const GAS_WRITE: u64 = 2;
const GAS_DELETE: u64 = 2;
const GAS_TRANSFER: u64 = 3;
const GAS_EVENT: u64 = 1;

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExecConfig {
    // Worker cap for parallel batches. 0 means one worker per available core.
    pub workers: usize,
    // When set, the serial path merges adjacent batches up to this many
    // effects and re-validates the result before running it.
    pub max_batch: Option<usize>,
}

// Cooperative cancellation flag. Cloning shares the flag. The executor
// checks it between effects; an effect already running is left to finish.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

pub struct Executor<S, B> {
    store: S,
    balances: B,
    events: EventLog,
    gas: AtomicU64,
    cancel: CancelToken,
    cfg: ExecConfig,
}

impl<S: Store, B: BalanceStore> Executor<S, B> {
    pub fn new(store: S, balances: B) -> Self {
        Self::with_config(store, balances, ExecConfig::default())
    }

    pub fn with_config(store: S, balances: B, cfg: ExecConfig) -> Self {
        Executor {
            store,
            balances,
            events: EventLog::new(),
            gas: AtomicU64::new(0),
            cancel: CancelToken::new(),
            cfg,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn balances(&self) -> &B {
        &self.balances
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    // Copy of the aggregate event log; mutating the result leaves the log
    // untouched.
    pub fn events(&self) -> Vec<Event> {
        self.events.events()
    }

    pub fn gas_used(&self) -> u64 {
        self.gas.load(Ordering::Relaxed)
    }

    // Serial path: validate, build the graph, schedule, then apply batches
    // in order on the calling thread. Effects inside each batch run in
    // submission order.
    pub fn execute(&self, effects: Vec<Effect>) -> Result<()> {
        let graph = Graph::new(effects)?;
        let scheduler = Scheduler::new(graph);
        let mut batches = scheduler.schedule()?;
        if let Some(max) = self.cfg.max_batch {
            // Merging ignores levels, so the merge is only kept when it
            // still validates; otherwise the level schedule stands.
            let merged = Scheduler::optimize_batches(batches.clone(), max);
            match validate_batches(&merged) {
                Ok(()) => batches = merged,
                Err(_) => {
                    debug!(target: "skein", "batch merge discarded, conflict within merged batch")
                }
            }
        }
        for batch in batches.iter() {
            debug!(
                target: "skein",
                level = batch.level,
                effects = batch.len(),
                "applying batch"
            );
            for effect in batch.effects.iter() {
                self.check_cancelled()?;
                self.apply(effect)?;
            }
        }
        Ok(())
    }

    // Parallel path over caller-prepared batches. Every batch is validated
    // before anything runs: a conflicting pair anywhere aborts the whole
    // call, per the propagation policy for schedule-invariant failures.
    // Batches then execute in order, each fanned out across scoped worker
    // threads with a barrier at the batch boundary. The first error stops
    // the pipeline before the next batch starts.
    pub fn execute_parallel(&self, batches: &[Batch]) -> Result<()> {
        validate_batches(batches)?;
        for batch in batches.iter() {
            self.check_cancelled()?;
            debug!(
                target: "skein",
                level = batch.level,
                effects = batch.len(),
                "applying batch in parallel"
            );
            self.run_batch(batch)?;
        }
        Ok(())
    }

    fn run_batch(&self, batch: &Batch) -> Result<()> {
        let workers = if self.cfg.workers == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            self.cfg.workers
        };
        let workers = workers.min(batch.effects.len()).max(1);

        if workers == 1 {
            for effect in batch.effects.iter() {
                self.check_cancelled()?;
                self.apply(effect)?;
            }
            return Ok(());
        }

        let chunk = batch.effects.len().div_ceil(workers);
        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for effects in batch.effects.chunks(chunk) {
                handles.push(scope.spawn(move || -> Result<()> {
                    for effect in effects.iter() {
                        self.check_cancelled()?;
                        self.apply(effect)?;
                    }
                    Ok(())
                }));
            }
            let mut first_err = None;
            for handle in handles {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        if first_err.is_none() {
                            first_err = Some(e);
                        }
                    }
                    Err(_) => {
                        if first_err.is_none() {
                            first_err = Some(err("effect worker panicked"));
                        }
                    }
                }
            }
            match first_err {
                None => Ok(()),
                Some(e) => Err(e),
            }
        })
    }

    fn apply(&self, effect: &Effect) -> Result<()> {
        match effect {
            Effect::Write(w) => {
                self.store.set(&effect.primary_key(), w.value())?;
                self.gas.fetch_add(GAS_WRITE, Ordering::Relaxed);
            }
            Effect::Delete(_) => {
                self.store.delete(&effect.primary_key())?;
                self.gas.fetch_add(GAS_DELETE, Ordering::Relaxed);
            }
            Effect::Read(r) => {
                let key = effect.primary_key();
                match self.store.get(&key)? {
                    // A missing read target is terminal: the destination
                    // slot's value would be undefined.
                    None => return Err(Error::missing(&key)),
                    Some(bytes) => r.sink().accept(&bytes)?,
                }
                self.gas.fetch_add(GAS_READ, Ordering::Relaxed);
            }
            Effect::Transfer(t) => {
                for (denom, amount) in t.coins().iter() {
                    self.balances.sub_balance(t.from(), denom, amount)?;
                    self.balances.add_balance(t.to(), denom, amount)?;
                }
                self.gas.fetch_add(GAS_TRANSFER, Ordering::Relaxed);
            }
            Effect::Event(e) => {
                self.events.append(e.event().clone());
                self.gas.fetch_add(GAS_EVENT, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::cancelled());
        }
        Ok(())
    }
}
