// We want a few things here:
// 1. Structured error kinds that callers can match on, carrying the offending
//    key or account, so that failures are deterministic functions of the input
// 2. A way to centralize setting a breakpoint to trap any error in the system
//    fairly soon after it's created (or at least when it's propagated from a
//    library we use back to us)
// 3. Same but for logging / emitting error messages into the tracing/logging
//    system

use std::borrow::Cow;
use std::fmt;

use backtrace_error::DynBacktraceError;
use tracing::error;

#[cfg(test)]
use test_log::test;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    // An effect failed validation.
    Invalid {
        what: &'static str,
        detail: Cow<'static, str>,
    },
    // The dependency graph contains a cycle.
    Cycle,
    // The ready set emptied with effects still unplaced.
    Stalled { remaining: usize },
    // Two effects in the same batch conflict on a key. Positions are
    // offsets within the batch.
    Conflicting {
        batch: usize,
        first: usize,
        second: usize,
        key: Vec<u8>,
        conflict: &'static str,
    },
    // A read named a key the store does not hold.
    Missing { key: Vec<u8> },
    // A debit would underflow an account balance.
    Underfunded {
        account: String,
        denom: String,
        have: u64,
        need: u64,
    },
    // Cancellation was observed between effects.
    Cancelled,
    // Internal inconsistency that should not be reachable from valid input.
    Internal(Cow<'static, str>),
    // Anything propagated from a library we use.
    Wrapped(DynBacktraceError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Invalid { what, detail } => write!(f, "invalid {}: {}", what, detail),
            Error::Cycle => write!(f, "dependency cycle detected"),
            Error::Stalled { remaining } => {
                write!(f, "schedule stalled with {} effects unplaced", remaining)
            }
            Error::Conflicting {
                batch,
                first,
                second,
                key,
                conflict,
            } => write!(
                f,
                "batch {} has a {} conflict between effects {} and {} on key '{}'",
                batch,
                conflict,
                first,
                second,
                String::from_utf8_lossy(key)
            ),
            Error::Missing { key } => {
                write!(f, "missing key '{}'", String::from_utf8_lossy(key))
            }
            Error::Underfunded {
                account,
                denom,
                have,
                need,
            } => write!(
                f,
                "account '{}' holds {} {} but needs {}",
                account, have, denom, need
            ),
            Error::Cancelled => write!(f, "execution cancelled"),
            Error::Internal(msg) => write!(f, "{}", msg),
            Error::Wrapped(inner) => write!(f, "{}", inner),
        }
    }
}

impl Error {
    // All constructors funnel through here so there is one place to trap.
    fn traced(self) -> Self {
        error!(target: "skein", "{}", self);
        self
    }

    pub fn new<E: std::error::Error + Send + Sync + 'static>(err: E) -> Error {
        Error::Wrapped(DynBacktraceError::from(err)).traced()
    }

    pub fn invalid(what: &'static str, detail: impl Into<Cow<'static, str>>) -> Error {
        Error::Invalid {
            what,
            detail: detail.into(),
        }
        .traced()
    }

    pub fn cycle() -> Error {
        Error::Cycle.traced()
    }

    pub fn stalled(remaining: usize) -> Error {
        Error::Stalled { remaining }.traced()
    }

    pub fn conflicting(
        batch: usize,
        first: usize,
        second: usize,
        key: &[u8],
        conflict: &'static str,
    ) -> Error {
        Error::Conflicting {
            batch,
            first,
            second,
            key: key.to_vec(),
            conflict,
        }
        .traced()
    }

    pub fn missing(key: &[u8]) -> Error {
        Error::Missing { key: key.to_vec() }.traced()
    }

    pub fn underfunded(account: &str, denom: &str, have: u64, need: u64) -> Error {
        Error::Underfunded {
            account: account.to_string(),
            denom: denom.to_string(),
            have,
            need,
        }
        .traced()
    }

    pub fn cancelled() -> Error {
        Error::Cancelled.traced()
    }
}

// Error deliberately does not implement std::error::Error: that keeps this
// blanket impl legal, which in turn lets `?` wrap any foreign error.
impl<E: std::error::Error + Send + Sync + 'static> From<E> for Error {
    fn from(err: E) -> Error {
        Error::new(err)
    }
}

pub fn err(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Internal(msg.into()).traced()
}

#[test]
fn test_error() {
    let e = err("test error");
    assert_eq!(format!("{}", e), "test error");
    let e = Error::underfunded("alice", "token", 50, 100);
    assert!(matches!(e, Error::Underfunded { need: 100, .. }));
    assert_eq!(
        format!("{}", e),
        "account 'alice' holds 50 token but needs 100"
    );
}
