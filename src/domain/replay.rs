//! Replay driver: materialize the stop sequence, then deliver it.
//!
//! A [`Replayer`] has exactly two states. Construction ingests a tape and
//! builds the full stop sequence up front (*loaded*); the consuming
//! [`run`](Replayer::run) iterates it once (*replaying*) and ends the
//! replay by dropping the replayer. There is no pause or resume.

use crate::domain::error::TapesimError;
use crate::domain::portfolio::Portfolio;
use crate::domain::store::Tape;
use crate::domain::strategy::Strategy;
use crate::domain::timeline::{Stop, build_stops};

pub struct Replayer {
    stops: Vec<Stop>,
    portfolio: Portfolio,
}

impl Replayer {
    /// Ingest a tape: the entire stop sequence is built here, so every
    /// data problem surfaces before the first strategy callback.
    pub fn new(tape: &Tape, principal: f64) -> Result<Self, TapesimError> {
        Ok(Self {
            stops: build_stops(tape)?,
            portfolio: Portfolio::new(principal),
        })
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    /// Deliver every stop to the strategy in ascending time order and
    /// return the final portfolio.
    pub fn run<S: Strategy>(self, strategy: &mut S) -> Portfolio {
        let Replayer {
            stops,
            mut portfolio,
        } = self;
        strategy.start();
        for i in 0..stops.len() {
            let current = &stops[i];
            portfolio.mark_to_market(current);
            strategy.step(&stops[..i], current, &mut portfolio);
        }
        strategy.stop();
        portfolio
    }
}
