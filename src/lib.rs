//! tapesim — binary price-tape store and time-synchronized replay backtester.
//!
//! Domain logic lives in [`domain`], collaborator traits in [`ports`], and
//! their concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
