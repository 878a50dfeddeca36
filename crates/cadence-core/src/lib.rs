pub mod classifier;
pub mod dedup;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod parser;
pub mod store;
pub mod types;

pub use error::{CadenceError, Result};
