// src/session/mod.rs
//! A day's harvest: which symbols, whether the session is over, and the
//! loop that ties quotes, dispatch and output together.

mod calendar;
mod harvest;
mod symbols;

pub use calendar::{
    check_session, classify_day, exchange_now, session_closed, SessionStatus,
};
pub use harvest::{HarvestPlan, HarvestSummary, Harvester, SymbolReport, SymbolStatus};
pub use symbols::{load_symbols, read_symbols};
