#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! In-memory content engines.
//!
//! [`StubEngine`] hands out handles that tests drive by hand;
//! [`SimulatedEngine`] drives its own handles on a timer for local runs.

/// Timer-driven engine.
pub mod simulate;
mod stub;

pub use simulate::{SimulatedEngine, SimulationProfile};
pub use stub::{StubEngine, StubHandle};
