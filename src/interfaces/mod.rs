//! Adapters translating the outside world into application calls.

pub mod csv;
pub mod http;
