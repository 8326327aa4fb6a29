// Application logic never mutates state directly. It emits _effects_: records
// of intended reads, writes, deletes, token transfers and event emissions,
// each declaring the keys it touches. Downstream, a scheduler orders effects
// by those declarations and an executor applies them, possibly in parallel.
//
// Each effect answers four questions:
//
//  1. What variant is it? (`kind`)
//  2. Is it well-formed? (`validate`)
//  3. Which keys does it read or write? (`dependencies`)
//  4. Which single key groups it for conflict checks? (`primary_key`)
//
// Key buffers returned from (3) and (4) are freshly allocated on every call,
// at exact capacity. Callers may mutate what they receive without affecting
// the effect or any later call. The same discipline applies to event
// attributes: the constructor deep-copies, so the caller's buffers stay the
// caller's.
//
// Typed values never reach the scheduler. A write serializes its value to
// MessagePack at construction; a read carries a type-erased sink that
// deserializes into a caller-held slot when the executor fetches the bytes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use skein_base::{Error, Result};

mod coins;
mod collect;
mod dep;
mod event;
mod slot;


pub use coins::Coins;
pub use collect::Collector;
pub use dep::{DepKind, Dependency};
pub use event::Event;
pub use slot::{ReadSink, ReadSlot};

// Store-local keys are namespaced as "<store>/<key>". Exact capacity: the
// returned buffer must never share backing storage with anything the effect
// retains.
pub fn full_key(store: &str, key: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(store.len() + 1 + key.len());
    buf.extend_from_slice(store.as_bytes());
    buf.push(b'/');
    buf.extend_from_slice(key);
    buf
}

// Balance dependency keys are "<account>/<denom>".
pub fn balance_key(account: &str, denom: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(account.len() + 1 + denom.len());
    buf.extend_from_slice(account.as_bytes());
    buf.push(b'/');
    buf.extend_from_slice(denom.as_bytes());
    buf
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum EffectKind {
    Read,
    Write,
    Delete,
    Transfer,
    Event,
}

impl EffectKind {
    // Write, Delete and Transfer all mutate state under their keys. Read
    // only observes. Event is neither: it touches no keyed state at all.
    pub fn is_write_like(&self) -> bool {
        matches!(
            self,
            EffectKind::Write | EffectKind::Delete | EffectKind::Transfer
        )
    }

    pub fn is_read_like(&self) -> bool {
        matches!(self, EffectKind::Read)
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EffectKind::Read => "read",
            EffectKind::Write => "write",
            EffectKind::Delete => "delete",
            EffectKind::Transfer => "transfer",
            EffectKind::Event => "event",
        };
        write!(f, "{}", name)
    }
}

pub struct ReadEffect {
    store: String,
    key: Vec<u8>,
    sink: Arc<dyn ReadSink>,
}

impl ReadEffect {
    pub fn store(&self) -> &str {
        &self.store
    }
    pub fn key(&self) -> &[u8] {
        &self.key
    }
    pub fn sink(&self) -> &Arc<dyn ReadSink> {
        &self.sink
    }
}

impl fmt::Debug for ReadEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadEffect")
            .field("store", &self.store)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct WriteEffect {
    store: String,
    key: Vec<u8>,
    value: Vec<u8>,
}

impl WriteEffect {
    pub fn store(&self) -> &str {
        &self.store
    }
    pub fn key(&self) -> &[u8] {
        &self.key
    }
    // MessagePack bytes of the value, fixed at construction.
    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

#[derive(Debug)]
pub struct DeleteEffect {
    store: String,
    key: Vec<u8>,
}

impl DeleteEffect {
    pub fn store(&self) -> &str {
        &self.store
    }
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

#[derive(Debug)]
pub struct TransferEffect {
    from: String,
    to: String,
    coins: Coins,
}

impl TransferEffect {
    pub fn from(&self) -> &str {
        &self.from
    }
    pub fn to(&self) -> &str {
        &self.to
    }
    pub fn coins(&self) -> &Coins {
        &self.coins
    }
}

#[derive(Debug)]
pub struct EventEffect {
    event: Event,
}

impl EventEffect {
    pub fn event(&self) -> &Event {
        &self.event
    }
}

#[derive(Debug)]
pub enum Effect {
    Read(ReadEffect),
    Write(WriteEffect),
    Delete(DeleteEffect),
    Transfer(TransferEffect),
    Event(EventEffect),
}

impl Effect {
    pub fn read<T>(
        store: impl Into<String>,
        key: impl AsRef<[u8]>,
        slot: &ReadSlot<T>,
    ) -> Effect
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        Effect::Read(ReadEffect {
            store: store.into(),
            key: key.as_ref().to_vec(),
            sink: Arc::new(slot.clone()),
        })
    }

    // Serialization happens here, not at execution time: the scheduler stays
    // independent of the value type and the bytes are immutable with the
    // effect.
    pub fn write<T: Serialize>(
        store: impl Into<String>,
        key: impl AsRef<[u8]>,
        value: &T,
    ) -> Result<Effect> {
        let value = rmp_serde::to_vec(value)?;
        Ok(Effect::Write(WriteEffect {
            store: store.into(),
            key: key.as_ref().to_vec(),
            value,
        }))
    }

    pub fn delete(store: impl Into<String>, key: impl AsRef<[u8]>) -> Effect {
        Effect::Delete(DeleteEffect {
            store: store.into(),
            key: key.as_ref().to_vec(),
        })
    }

    pub fn transfer(from: impl Into<String>, to: impl Into<String>, coins: Coins) -> Effect {
        Effect::Transfer(TransferEffect {
            from: from.into(),
            to: to.into(),
            coins,
        })
    }

    pub fn event(ty: impl Into<String>, attrs: &BTreeMap<String, Vec<u8>>) -> Effect {
        Effect::Event(EventEffect {
            event: Event::new(ty, attrs),
        })
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::Read(_) => EffectKind::Read,
            Effect::Write(_) => EffectKind::Write,
            Effect::Delete(_) => EffectKind::Delete,
            Effect::Transfer(_) => EffectKind::Transfer,
            Effect::Event(_) => EffectKind::Event,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Effect::Read(r) => validate_keyed("read", &r.store, &r.key),
            Effect::Write(w) => validate_keyed("write", &w.store, &w.key),
            Effect::Delete(d) => validate_keyed("delete", &d.store, &d.key),
            Effect::Transfer(t) => {
                if t.from.is_empty() {
                    return Err(Error::invalid("transfer", "empty from account"));
                }
                if t.to.is_empty() {
                    return Err(Error::invalid("transfer", "empty to account"));
                }
                t.coins.validate()
            }
            Effect::Event(e) => {
                if e.event.ty().is_empty() {
                    return Err(Error::invalid("event", "empty event type"));
                }
                Ok(())
            }
        }
    }

    pub fn dependencies(&self) -> Vec<Dependency> {
        match self {
            Effect::Read(r) => {
                vec![Dependency::read(
                    DepKind::Generic,
                    full_key(&r.store, &r.key),
                )]
            }
            Effect::Write(w) => {
                vec![Dependency::write(
                    DepKind::Generic,
                    full_key(&w.store, &w.key),
                )]
            }
            Effect::Delete(d) => {
                vec![Dependency::write(
                    DepKind::Generic,
                    full_key(&d.store, &d.key),
                )]
            }
            Effect::Transfer(t) => {
                let mut deps = Vec::with_capacity(2 + 2 * t.coins.len());
                deps.push(Dependency::write(
                    DepKind::Account,
                    t.from.as_bytes().to_vec(),
                ));
                deps.push(Dependency::write(
                    DepKind::Account,
                    t.to.as_bytes().to_vec(),
                ));
                for denom in t.coins.denoms() {
                    deps.push(Dependency::write(
                        DepKind::Balance,
                        balance_key(&t.from, denom),
                    ));
                    deps.push(Dependency::write(
                        DepKind::Balance,
                        balance_key(&t.to, denom),
                    ));
                }
                deps
            }
            Effect::Event(_) => Vec::new(),
        }
    }

    pub fn primary_key(&self) -> Vec<u8> {
        match self {
            Effect::Read(r) => full_key(&r.store, &r.key),
            Effect::Write(w) => full_key(&w.store, &w.key),
            Effect::Delete(d) => full_key(&d.store, &d.key),
            Effect::Transfer(t) => t.from.as_bytes().to_vec(),
            Effect::Event(e) => full_key("event", e.event.ty().as_bytes()),
        }
    }
}

fn validate_keyed(what: &'static str, store: &str, key: &[u8]) -> Result<()> {
    if store.is_empty() {
        return Err(Error::invalid(what, "empty store name"));
    }
    if key.is_empty() {
        return Err(Error::invalid(what, "empty key"));
    }
    Ok(())
}
