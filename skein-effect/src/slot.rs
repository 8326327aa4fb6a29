use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;

use skein_base::Result;

// The executor hands fetched bytes to a sink; what type they decode to is the
// effect author's business. This is the seam that erases T from the scheduler
// and executor.
pub trait ReadSink: Send + Sync {
    fn accept(&self, bytes: &[u8]) -> Result<()>;
}

// Caller-held destination for a read. Clone is shallow: every clone shares the
// one cell, so the handle kept by the caller sees what the executor stored.
#[derive(Debug)]
pub struct ReadSlot<T> {
    cell: Arc<Mutex<Option<T>>>,
}

impl<T> ReadSlot<T> {
    pub fn new() -> Self {
        ReadSlot {
            cell: Arc::new(Mutex::new(None)),
        }
    }

    pub fn take(&self) -> Option<T> {
        self.cell
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_filled(&self) -> bool {
        self.cell
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<T: Clone> ReadSlot<T> {
    pub fn get(&self) -> Option<T> {
        self.cell
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T> Clone for ReadSlot<T> {
    fn clone(&self) -> Self {
        ReadSlot {
            cell: self.cell.clone(),
        }
    }
}

impl<T> Default for ReadSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned + Send + Sync> ReadSink for ReadSlot<T> {
    fn accept(&self, bytes: &[u8]) -> Result<()> {
        let value = rmp_serde::from_slice(bytes)?;
        *self.cell.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
        Ok(())
    }
}
