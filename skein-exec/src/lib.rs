// Applies scheduled effects to state.
//
// The executor owns nothing but an event log and a gas counter; keyed state
// and balances live behind the two store capabilities supplied by the host.
// Batches run in order. Within a batch the executor may fan effects out
// across scoped threads, which is safe exactly because validated batches
// contain no conflicting pairs: every interleaving of a batch is equivalent
// to some serial order of it.
//
// Failure stops the pipeline at the current batch boundary. Effects already
// applied stay applied; rollback belongs to the host's commit model.

mod exec;
mod log;
mod store;

#[cfg(test)]
mod test;

pub use exec::{CancelToken, ExecConfig, Executor};
pub use log::EventLog;
pub use store::{BalanceStore, MemBalances, MemStore, Store};
