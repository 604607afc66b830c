//! The strategy capability driven by the replay engine.

use crate::domain::portfolio::Portfolio;
use crate::domain::timeline::Stop;

/// A trading strategy replayed over a stop sequence.
///
/// `step` runs once per stop, in strictly ascending time order. `history`
/// is the immutable prefix of every stop already delivered; `current` is
/// the stop being delivered. The portfolio's holdings are marked to the
/// current stop's prices before each call.
pub trait Strategy {
    /// Called once before the first stop.
    fn start(&mut self) {}

    /// Called once after the last stop.
    fn stop(&mut self) {}

    fn step(&mut self, history: &[Stop], current: &Stop, portfolio: &mut Portfolio);
}
