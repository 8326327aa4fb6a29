use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use skein_base::{err, Error, Result};

// Keyed byte storage. `get` returning Ok(None) is the distinct not-found
// signal; Err is reserved for real store failures. Implementations must
// tolerate concurrent calls on different keys, which is all the executor
// ever issues within one batch.
pub trait Store: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;
    fn delete(&self, key: &[u8]) -> Result<()>;
    fn has(&self, key: &[u8]) -> Result<bool>;
}

// Typed token balances per (account, denom). `sub_balance` fails when the
// debit would underflow.
pub trait BalanceStore: Send + Sync {
    fn get_balance(&self, account: &str, denom: &str) -> Result<u64>;
    fn set_balance(&self, account: &str, denom: &str, amount: u64) -> Result<()>;
    fn add_balance(&self, account: &str, denom: &str, amount: u64) -> Result<()>;
    fn sub_balance(&self, account: &str, denom: &str, amount: u64) -> Result<()>;
}

// Reference store over a locked map. Hosts with a persistent engine supply
// their own Store; this one backs tests and embedded use. A poisoned lock
// recovers the inner map: writers only ever insert or remove whole entries,
// so there is no torn state to fear.
#[derive(Debug, Default)]
pub struct MemStore {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.map
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        // Deleting an absent key is not an error.
        self.map
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self
            .map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key))
    }
}

#[derive(Debug, Default)]
pub struct MemBalances {
    map: RwLock<BTreeMap<(String, String), u64>>,
}

impl MemBalances {
    pub fn new() -> Self {
        Self::default()
    }

    // Builder used to seed opening balances.
    pub fn with_balance(self, account: &str, denom: &str, amount: u64) -> Self {
        self.map
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((account.to_string(), denom.to_string()), amount);
        self
    }
}

impl BalanceStore for MemBalances {
    fn get_balance(&self, account: &str, denom: &str) -> Result<u64> {
        Ok(self
            .map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(account.to_string(), denom.to_string()))
            .copied()
            .unwrap_or(0))
    }

    fn set_balance(&self, account: &str, denom: &str, amount: u64) -> Result<()> {
        self.map
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((account.to_string(), denom.to_string()), amount);
        Ok(())
    }

    fn add_balance(&self, account: &str, denom: &str, amount: u64) -> Result<()> {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        let slot = map
            .entry((account.to_string(), denom.to_string()))
            .or_insert(0);
        *slot = slot
            .checked_add(amount)
            .ok_or_else(|| err(format!("balance overflow for '{}' {}", account, denom)))?;
        Ok(())
    }

    fn sub_balance(&self, account: &str, denom: &str, amount: u64) -> Result<()> {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        let slot = map
            .entry((account.to_string(), denom.to_string()))
            .or_insert(0);
        if *slot < amount {
            return Err(Error::underfunded(account, denom, *slot, amount));
        }
        *slot -= amount;
        Ok(())
    }
}
