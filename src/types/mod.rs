//! Shared types

mod error;

pub use error::{MarketError, Result, GENERIC_FAILURE};
