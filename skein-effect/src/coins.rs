use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use skein_base::{Error, Result};

// A set of token amounts keyed by denomination. BTreeMap so that per-denom
// iteration (and therefore transfer apply order) is deterministic.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Coins(pub BTreeMap<String, u64>);

impl Coins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn one(denom: impl Into<String>, amount: u64) -> Self {
        Self::new().with(denom, amount)
    }

    pub fn with(mut self, denom: impl Into<String>, amount: u64) -> Self {
        self.0.insert(denom.into(), amount);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn amount(&self, denom: &str) -> u64 {
        self.0.get(denom).copied().unwrap_or(0)
    }

    pub fn denoms(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(d, a)| (d.as_str(), *a))
    }

    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(Error::invalid("transfer", "empty coin set"));
        }
        for (denom, amount) in self.0.iter() {
            if denom.is_empty() {
                return Err(Error::invalid("transfer", "empty denom"));
            }
            if *amount == 0 {
                return Err(Error::invalid(
                    "transfer",
                    format!("zero amount for denom '{}'", denom),
                ));
            }
        }
        Ok(())
    }
}
