#![allow(dead_code)]

use tapesim::domain::entities::Datapoint;
use tapesim::domain::store::{Id, Tape};

/// Build a tape with one exchange and the given companies; every point
/// becomes a datapoint whose open and close both equal `price`, so the
/// replay midpoint is `price` itself.
pub fn make_tape(companies: &[(&str, &[(u64, f64)])]) -> (Tape, Vec<Id>) {
    let mut tape = Tape::new();
    let exchange = tape.new_exchange("XNAS", "USA", "New York").unwrap();
    let mut ids = Vec::new();
    for (ticker, points) in companies {
        let company = tape
            .new_company(&format!("{ticker} Inc"), ticker, exchange)
            .unwrap();
        for &(time, price) in *points {
            tape.new_datapoint(make_point(time, price, company)).unwrap();
        }
        ids.push(company);
    }
    (tape, ids)
}

pub fn make_point(time: u64, price: f64, company: Id) -> Datapoint {
    Datapoint::new(price, price, price, price, price, 0.0, time, company)
}

/// A richer datapoint where the fields differ, for codec fidelity checks.
pub fn make_bar(time: u64, base: f64, company: Id) -> Datapoint {
    Datapoint::new(
        base,
        base + 2.0,
        base - 2.0,
        base + 0.5,
        base + 1.0,
        base * 100.0,
        time,
        company,
    )
}
