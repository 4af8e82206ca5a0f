//! Studio session: history, progress ticker, lifecycle controller, and views.

mod controller;
mod history;
pub mod ticker;
pub mod view;

pub use controller::{Phase, StudioController, SubmitOutcome};
pub use history::History;
pub use ticker::{StatusTicker, TickerGuard, TickerStatus, STATUS_MESSAGES, TICK_PERIOD};
