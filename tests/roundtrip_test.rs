//! Property tests for the tape codec: lossless round-trip of the reachable
//! subset, reachability filtering, and the on-disk sort rules.

use proptest::prelude::*;
use tempfile::TempDir;

use tapesim::adapters::tape_file_adapter;
use tapesim::domain::entities::Datapoint;
use tapesim::domain::store::Tape;

/// Up to five companies, each with an arbitrary (possibly empty) series.
/// Companies alternate between two exchanges, so an exchange can end up
/// referenced only by dataless companies and must then be dropped.
fn series_strategy() -> impl Strategy<Value = Vec<Vec<(u64, f64, f64)>>> {
    prop::collection::vec(
        prop::collection::vec(
            (0u64..100_000, 0.01f64..1_000_000.0, 0.01f64..1_000_000.0),
            0..12,
        ),
        1..5,
    )
}

fn build_tape(series: &[Vec<(u64, f64, f64)>]) -> Tape {
    let mut tape = Tape::new();
    let xnas = tape.new_exchange("XNAS", "USA", "New York").unwrap();
    let xlon = tape.new_exchange("XLON", "UK", "London").unwrap();
    for (i, points) in series.iter().enumerate() {
        let exchange = if i % 2 == 0 { xnas } else { xlon };
        let company = tape
            .new_company(&format!("Company {i}"), &format!("C{i}"), exchange)
            .unwrap();
        for &(time, open, close) in points {
            tape.new_datapoint(Datapoint::new(
                open,
                open.max(close),
                open.min(close),
                close,
                close,
                1.0,
                time,
                company,
            ))
            .unwrap();
        }
    }
    tape
}

/// Exact, order-insensitive fingerprint of one company's series.
fn fingerprint(tape: &Tape, company: tapesim::domain::store::Id) -> Vec<(u64, [u64; 6])> {
    let mut points: Vec<(u64, [u64; 6])> = tape
        .series_of(company)
        .iter()
        .map(|&id| {
            let d = tape.datapoint(id).unwrap();
            (
                d.time,
                [
                    d.open.to_bits(),
                    d.high.to_bits(),
                    d.low.to_bits(),
                    d.last.to_bits(),
                    d.close.to_bits(),
                    d.volume.to_bits(),
                ],
            )
        })
        .collect();
    points.sort_unstable();
    points
}

proptest! {
    #[test]
    fn roundtrip_preserves_reachable_subset(series in series_strategy()) {
        let tape = build_tape(&series);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prop.tape");
        tape_file_adapter::write(&tape, &path).unwrap();
        let loaded = tape_file_adapter::load(&path).unwrap();

        // exactly the companies with at least one datapoint survive
        let survivors: Vec<usize> = series
            .iter()
            .enumerate()
            .filter(|(_, points)| !points.is_empty())
            .map(|(i, _)| i)
            .collect();
        prop_assert_eq!(loaded.companies.len(), survivors.len());

        for &i in &survivors {
            let ticker = format!("C{i}");
            let original = tape.find_ticker(&ticker).unwrap();
            let reloaded = loaded.find_ticker(&ticker);
            prop_assert!(reloaded.is_some(), "{} lost in round-trip", ticker);
            let reloaded = reloaded.unwrap();
            prop_assert_eq!(
                &tape.company(original).unwrap().name,
                &loaded.company(reloaded).unwrap().name
            );
            // the exchange reference resolves to the same market
            prop_assert_eq!(
                &tape.exchange(tape.company(original).unwrap().exchange_id()).unwrap().name,
                &loaded.exchange(loaded.company(reloaded).unwrap().exchange_id()).unwrap().name
            );
            prop_assert_eq!(fingerprint(&tape, original), fingerprint(&loaded, reloaded));
        }

        // surviving exchanges are exactly those referenced by a survivor
        let referenced: std::collections::BTreeSet<String> = survivors
            .iter()
            .map(|&i| if i % 2 == 0 { "XNAS".to_string() } else { "XLON".to_string() })
            .collect();
        let present: std::collections::BTreeSet<String> = loaded
            .exchanges
            .iter()
            .map(|&id| loaded.exchange(id).unwrap().name.clone())
            .collect();
        prop_assert_eq!(referenced, present);
    }

    #[test]
    fn reloaded_tape_is_name_and_time_sorted(series in series_strategy()) {
        let tape = build_tape(&series);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prop.tape");
        tape_file_adapter::write(&tape, &path).unwrap();
        let loaded = tape_file_adapter::load(&path).unwrap();

        let company_names: Vec<String> = loaded
            .companies
            .iter()
            .map(|&id| loaded.company(id).unwrap().name.clone())
            .collect();
        let mut sorted_names = company_names.clone();
        sorted_names.sort();
        prop_assert_eq!(company_names, sorted_names);

        let exchange_names: Vec<String> = loaded
            .exchanges
            .iter()
            .map(|&id| loaded.exchange(id).unwrap().name.clone())
            .collect();
        let mut sorted_exchanges = exchange_names.clone();
        sorted_exchanges.sort();
        prop_assert_eq!(exchange_names, sorted_exchanges);

        for &company in &loaded.companies {
            let times: Vec<u64> = loaded
                .series_of(company)
                .iter()
                .map(|&id| loaded.datapoint(id).unwrap().time)
                .collect();
            prop_assert!(times.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
