//! Offline quantitative backtesting engine for alert-driven crypto strategies.
//!
//! Given a table of historical calls (signals emitted by named callers for
//! token addresses at timestamps) and a per-token OHLCV candle store, this
//! crate answers: *if a position had been entered N milliseconds after each
//! call and managed under exit policy P, what would the distribution of
//! outcomes have been?*
//!
//! See [`engine`] for the module map.

pub mod engine;

pub use engine::*;
