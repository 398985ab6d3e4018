//! Core data model: candles, structural events, orders, results.
//!
//! Everything here is plain data plus the invariants that protect it. No I/O,
//! no async, no strategy logic — those live in `application` and
//! `infrastructure`.

pub mod candle;
pub mod equity;
pub mod errors;
pub mod optimization;
pub mod params;
pub mod ports;
pub mod position;
pub mod result;
pub mod signal;
pub mod swing;
pub mod timeframe;
pub mod zones;
