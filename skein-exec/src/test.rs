use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{BalanceStore, ExecConfig, Executor, EventLog, MemBalances, MemStore, Store};
use skein_base::{Error, Result};
use skein_effect::{Coins, Effect, Event, ReadSlot};
use skein_sched::{Batch, Graph, Scheduler};
use test_log::test;

fn sched(effects: Vec<Effect>) -> Result<Vec<Batch>> {
    Scheduler::new(Graph::new(effects)?).schedule()
}

fn new_exec() -> Executor<MemStore, MemBalances> {
    Executor::new(MemStore::new(), MemBalances::new())
}

fn one_batch(effects: Vec<Effect>) -> Batch {
    Batch {
        level: 0,
        effects: effects.into_iter().map(Arc::new).collect(),
    }
}

#[test]
fn test_mem_store() -> Result<()> {
    let store = MemStore::new();
    assert!(store.is_empty());
    assert_eq!(store.get(b"k")?, None);
    assert!(!store.has(b"k")?);

    store.set(b"k", b"v")?;
    assert_eq!(store.get(b"k")?, Some(b"v".to_vec()));
    assert!(store.has(b"k")?);
    assert_eq!(store.len(), 1);

    store.delete(b"k")?;
    assert!(!store.has(b"k")?);
    // Deleting an absent key is not an error.
    store.delete(b"k")?;
    Ok(())
}

#[test]
fn test_mem_balances() -> Result<()> {
    let bal = MemBalances::new().with_balance("alice", "token", 100);
    assert_eq!(bal.get_balance("alice", "token")?, 100);
    assert_eq!(bal.get_balance("alice", "stake")?, 0);
    assert_eq!(bal.get_balance("bob", "token")?, 0);

    bal.add_balance("alice", "token", 50)?;
    assert_eq!(bal.get_balance("alice", "token")?, 150);
    bal.sub_balance("alice", "token", 150)?;
    assert_eq!(bal.get_balance("alice", "token")?, 0);

    bal.set_balance("alice", "token", 10)?;
    let result = bal.sub_balance("alice", "token", 11);
    assert!(matches!(
        result,
        Err(Error::Underfunded {
            have: 10,
            need: 11,
            ..
        })
    ));
    // The failed debit took nothing.
    assert_eq!(bal.get_balance("alice", "token")?, 10);

    bal.set_balance("alice", "token", u64::MAX)?;
    assert!(bal.add_balance("alice", "token", 1).is_err());
    Ok(())
}

#[test]
fn test_event_log_copy_isolation() {
    let log = EventLog::new();
    log.append(Event::new("t", &BTreeMap::new()));

    let mut copy = log.events();
    copy.push(Event::new("junk", &BTreeMap::new()));
    copy.clear();

    assert_eq!(log.len(), 1);
    assert_eq!(log.events()[0].ty(), "t");
}

#[test]
fn test_serial_write_read_write() -> Result<()> {
    // The read lands between the two writes and must observe the first
    // value; the second write must win in the store.
    let exec = new_exec();
    let slot = ReadSlot::<u64>::new();
    exec.execute(vec![
        Effect::write("test", "k", &1_u64)?,
        Effect::read("test", "k", &slot),
        Effect::write("test", "k", &2_u64)?,
    ])?;

    assert_eq!(slot.get(), Some(1));
    let bytes = exec.store().get(b"test/k")?.ok_or_else(|| Error::missing(b"test/k"))?;
    let stored: u64 = rmp_serde::from_slice(&bytes)?;
    assert_eq!(stored, 2);
    Ok(())
}

#[test]
fn test_serial_delete() -> Result<()> {
    let exec = new_exec();
    exec.execute(vec![
        Effect::write("test", "k", &1_u64)?,
        Effect::delete("test", "k"),
    ])?;
    assert!(!exec.store().has(b"test/k")?);
    // Deleting a key that was never written succeeds.
    exec.execute(vec![Effect::delete("test", "ghost")])?;
    Ok(())
}

#[test]
fn test_transfer() -> Result<()> {
    let balances = MemBalances::new()
        .with_balance("alice", "token", 1000)
        .with_balance("bob", "token", 500);
    let exec = Executor::new(MemStore::new(), balances);

    exec.execute(vec![Effect::transfer(
        "alice",
        "bob",
        Coins::one("token", 100),
    )])?;

    assert_eq!(exec.balances().get_balance("alice", "token")?, 900);
    assert_eq!(exec.balances().get_balance("bob", "token")?, 600);
    Ok(())
}

#[test]
fn test_transfer_insufficient() -> Result<()> {
    let balances = MemBalances::new().with_balance("alice", "token", 50);
    let exec = Executor::new(MemStore::new(), balances);

    let result = exec.execute(vec![Effect::transfer(
        "alice",
        "bob",
        Coins::one("token", 100),
    )]);
    assert!(matches!(
        result,
        Err(Error::Underfunded {
            have: 50,
            need: 100,
            ..
        })
    ));
    // No partial credit.
    assert_eq!(exec.balances().get_balance("alice", "token")?, 50);
    assert_eq!(exec.balances().get_balance("bob", "token")?, 0);
    Ok(())
}

#[test]
fn test_multi_coin_transfer() -> Result<()> {
    let balances = MemBalances::new()
        .with_balance("alice", "token", 10)
        .with_balance("alice", "stake", 20);
    let exec = Executor::new(MemStore::new(), balances);

    exec.execute(vec![Effect::transfer(
        "alice",
        "bob",
        Coins::one("token", 3).with("stake", 4),
    )])?;

    assert_eq!(exec.balances().get_balance("alice", "token")?, 7);
    assert_eq!(exec.balances().get_balance("alice", "stake")?, 16);
    assert_eq!(exec.balances().get_balance("bob", "token")?, 3);
    assert_eq!(exec.balances().get_balance("bob", "stake")?, 4);
    Ok(())
}

#[test]
fn test_events_logged() -> Result<()> {
    let exec = new_exec();
    let attrs: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    exec.execute(vec![
        Effect::event("a", &attrs),
        Effect::event("b", &attrs),
        Effect::event("c", &attrs),
        Effect::event("d", &attrs),
    ])?;

    let events = exec.events();
    assert_eq!(events.len(), 4);
    let mut types: Vec<&str> = events.iter().map(Event::ty).collect();
    types.sort();
    assert_eq!(types, vec!["a", "b", "c", "d"]);

    // The returned log is a copy.
    let mut copy = exec.events();
    copy.clear();
    assert_eq!(exec.events().len(), 4);
    Ok(())
}

#[test]
fn test_event_order_across_batches() -> Result<()> {
    // Events within one batch have no defined order, but batch boundaries
    // are ordered in the final log.
    let exec = new_exec();
    let attrs: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    let batches = vec![
        Batch {
            level: 0,
            effects: vec![Arc::new(Effect::event("first", &attrs))],
        },
        Batch {
            level: 1,
            effects: vec![Arc::new(Effect::event("second", &attrs))],
        },
    ];
    exec.execute_parallel(&batches)?;
    let events = exec.events();
    assert_eq!(events[0].ty(), "first");
    assert_eq!(events[1].ty(), "second");
    Ok(())
}

#[test]
fn test_parallel_independent_writes() -> Result<()> {
    let mut effects = Vec::new();
    for i in 0..64_u64 {
        effects.push(Effect::write("test", format!("k{}", i), &i)?);
    }
    let batches = sched(effects)?;
    assert_eq!(batches.len(), 1);

    let exec = new_exec();
    exec.execute_parallel(&batches)?;
    for i in 0..64_u64 {
        let key = format!("test/k{}", i);
        assert!(exec.store().has(key.as_bytes())?);
    }
    Ok(())
}

#[test]
fn test_parallel_dependent_levels() -> Result<()> {
    let slot = ReadSlot::<u64>::new();
    let batches = sched(vec![
        Effect::write("test", "k", &7_u64)?,
        Effect::read("test", "k", &slot),
        Effect::write("test", "other", &1_u64)?,
    ])?;
    let exec = new_exec();
    exec.execute_parallel(&batches)?;
    assert_eq!(slot.get(), Some(7));
    Ok(())
}

#[test]
fn test_parallel_rejects_conflicting_batch() -> Result<()> {
    let exec = new_exec();
    let batch = one_batch(vec![
        Effect::write("test", "k", &1_u64)?,
        Effect::write("test", "k", &2_u64)?,
    ]);
    let result = exec.execute_parallel(&[batch]);
    assert!(matches!(
        result,
        Err(Error::Conflicting {
            conflict: "write-write",
            ..
        })
    ));
    // Rejection happens before anything runs.
    assert!(!exec.store().has(b"test/k")?);
    Ok(())
}

#[test]
fn test_parallel_stops_at_failing_batch() -> Result<()> {
    let exec = new_exec();
    let batches = vec![
        one_batch(vec![Effect::read(
            "test",
            "absent",
            &ReadSlot::<u64>::new(),
        )]),
        Batch {
            level: 1,
            effects: vec![Arc::new(Effect::write("test", "late", &1_u64)?)],
        },
    ];
    let result = exec.execute_parallel(&batches);
    assert!(matches!(result, Err(Error::Missing { .. })));
    // The second batch never started.
    assert!(!exec.store().has(b"test/late")?);
    Ok(())
}

#[test]
fn test_read_missing_key() {
    let exec = new_exec();
    let result = exec.execute(vec![Effect::read(
        "test",
        "absent",
        &ReadSlot::<u64>::new(),
    )]);
    match result {
        Err(Error::Missing { key }) => assert_eq!(key, b"test/absent"),
        other => panic!("expected missing-key error, got {:?}", other),
    }
}

#[test]
fn test_cancellation() -> Result<()> {
    let exec = new_exec();
    exec.cancel_token().cancel();
    let result = exec.execute(vec![Effect::write("test", "k", &1_u64)?]);
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(!exec.store().has(b"test/k")?);
    Ok(())
}

#[test]
fn test_gas_counter() -> Result<()> {
    let balances = MemBalances::new().with_balance("alice", "token", 10);
    let exec = Executor::new(MemStore::new(), balances);
    assert_eq!(exec.gas_used(), 0);

    let slot = ReadSlot::<u64>::new();
    exec.execute(vec![
        Effect::write("test", "k", &1_u64)?,           // 2
        Effect::read("test", "k", &slot),              // 1
        Effect::delete("test", "k"),                   // 2
        Effect::event("t", &BTreeMap::new()),          // 1
        Effect::transfer("alice", "bob", Coins::one("token", 1)), // 3
    ])?;
    assert_eq!(exec.gas_used(), 9);

    // Monotonic across executions.
    exec.execute(vec![Effect::event("t2", &BTreeMap::new())])?;
    assert_eq!(exec.gas_used(), 10);
    Ok(())
}

#[test]
fn test_max_batch_merge_kept_when_safe() -> Result<()> {
    // Two transfers chained through bob sit at different levels, but their
    // primary keys differ, so the merged batch still validates and the
    // merge is kept. Serial application preserves order either way.
    let balances = MemBalances::new()
        .with_balance("alice", "token", 100)
        .with_balance("carol", "token", 100);
    let exec = Executor::with_config(
        MemStore::new(),
        balances,
        ExecConfig {
            workers: 0,
            max_batch: Some(4),
        },
    );
    exec.execute(vec![
        Effect::transfer("alice", "bob", Coins::one("token", 10)),
        Effect::transfer("carol", "bob", Coins::one("token", 20)),
    ])?;
    assert_eq!(exec.balances().get_balance("bob", "token")?, 30);
    Ok(())
}

#[test]
fn test_max_batch_merge_discarded_when_conflicting() -> Result<()> {
    // A write-read chain merged into one batch would conflict; the executor
    // falls back to the level schedule and the execution still succeeds.
    let exec = Executor::with_config(
        MemStore::new(),
        MemBalances::new(),
        ExecConfig {
            workers: 0,
            max_batch: Some(8),
        },
    );
    let slot = ReadSlot::<u64>::new();
    exec.execute(vec![
        Effect::write("test", "k", &5_u64)?,
        Effect::read("test", "k", &slot),
    ])?;
    assert_eq!(slot.get(), Some(5));
    Ok(())
}

#[test]
fn test_parallel_with_bounded_workers() -> Result<()> {
    let mut effects = Vec::new();
    for i in 0..16_u64 {
        effects.push(Effect::write("test", format!("k{}", i), &i)?);
    }
    let batches = sched(effects)?;
    let exec = Executor::with_config(
        MemStore::new(),
        MemBalances::new(),
        ExecConfig {
            workers: 3,
            max_batch: None,
        },
    );
    exec.execute_parallel(&batches)?;
    assert_eq!(exec.store().len(), 16);
    Ok(())
}
