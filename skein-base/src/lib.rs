mod error;

pub use error::{err, Error, Result};
