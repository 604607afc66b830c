//! Binary tape file codec.
//!
//! Layout (all integers little-endian, fixed width):
//!
//! ```text
//! u16  version
//! u64  earliest datapoint time        u64  latest datapoint time
//! u16  exchange_count
//! exchange_count × { u16 record_len; name, country, city as (u8 len, bytes) }
//! u16  company_count
//! company_count × { u16 record_len; name, ticker as (u8 len, bytes); u32 exchange_index }
//! company_count × { u64 datapoint_count;
//!                   datapoint_count × { 6 × f64 (open high low last close volume);
//!                                       u64 time; u32 company_index } }
//! ```
//!
//! Process-local ids are never written; references become positions in the
//! exchange/company lists of the same file and are remapped back through
//! index→id tables on load. Writing filters to the reachable subset
//! (companies owning at least one datapoint, exchanges referenced by a
//! surviving company) and orders companies and exchanges by name and each
//! series by time, so output is deterministic for a given graph.
//!
//! Any malformed or truncated input fails the whole load; a failed write
//! leaves the target unusable and the caller must treat it as unwritten.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::domain::entities::Datapoint;
use crate::domain::error::TapesimError;
use crate::domain::store::{Id, Tape};

pub const TAPE_VERSION: u16 = 1;

fn write_u16(w: &mut impl Write, v: u16) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_u32(w: &mut impl Write, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_u64(w: &mut impl Write, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_f64(w: &mut impl Write, v: f64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

/// (u8 length, raw bytes). Longer than 255 bytes would be silently
/// truncated by the length field, so it is rejected outright.
fn write_str(w: &mut impl Write, field: &'static str, s: &str) -> Result<(), TapesimError> {
    let len = s.len();
    if len > u8::MAX as usize {
        return Err(TapesimError::StringTooLong { field, len });
    }
    w.write_all(&[len as u8])?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn fill(r: &mut impl Read, buf: &mut [u8]) -> Result<(), TapesimError> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => TapesimError::Format {
            reason: "unexpected end of tape".into(),
        },
        _ => TapesimError::Io(e),
    })
}

fn read_u16(r: &mut impl Read) -> Result<u16, TapesimError> {
    let mut buf = [0u8; 2];
    fill(r, &mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(r: &mut impl Read) -> Result<u32, TapesimError> {
    let mut buf = [0u8; 4];
    fill(r, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> Result<u64, TapesimError> {
    let mut buf = [0u8; 8];
    fill(r, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64(r: &mut impl Read) -> Result<f64, TapesimError> {
    let mut buf = [0u8; 8];
    fill(r, &mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_str(r: &mut impl Read) -> Result<String, TapesimError> {
    let mut len = [0u8; 1];
    fill(r, &mut len)?;
    let mut buf = vec![0u8; len[0] as usize];
    fill(r, &mut buf)?;
    String::from_utf8(buf).map_err(|_| TapesimError::Format {
        reason: "string field is not valid UTF-8".into(),
    })
}

fn count_u16(kind: &'static str, len: usize) -> Result<u16, TapesimError> {
    u16::try_from(len).map_err(|_| TapesimError::Format {
        reason: format!("too many {kind} for one tape ({len})"),
    })
}

/// Serialize a tape to `path`.
pub fn write(tape: &Tape, path: &Path) -> Result<(), TapesimError> {
    // survivors: companies owning at least one datapoint, name-ascending
    let mut companies: Vec<(String, Id)> = Vec::new();
    for &id in &tape.companies {
        if !tape.series_of(id).is_empty() {
            companies.push((tape.company(id)?.name.clone(), id));
        }
    }
    companies.sort();
    let companies: Vec<Id> = companies.into_iter().map(|(_, id)| id).collect();

    // exchanges referenced by a survivor, name-ascending
    let mut exchanges: Vec<(String, Id)> = Vec::new();
    for &id in &tape.exchanges {
        let referenced = companies
            .iter()
            .any(|&c| matches!(tape.company(c), Ok(company) if company.exchange_id() == id));
        if referenced {
            exchanges.push((tape.exchange(id)?.name.clone(), id));
        }
    }
    exchanges.sort();
    let exchanges: Vec<Id> = exchanges.into_iter().map(|(_, id)| id).collect();

    let exchange_index: HashMap<Id, u32> = exchanges
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i as u32))
        .collect();
    let company_index: HashMap<Id, u32> = companies
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i as u32))
        .collect();

    // each series time-ascending, plus the global time extremes
    let mut sorted_series: Vec<Vec<&Datapoint>> = Vec::with_capacity(companies.len());
    let mut earliest = u64::MAX;
    let mut latest = u64::MIN;
    for &company in &companies {
        let mut points = Vec::with_capacity(tape.series_of(company).len());
        for &id in tape.series_of(company) {
            points.push(tape.datapoint(id)?);
        }
        points.sort_by_key(|d| d.time);
        if let (Some(first), Some(last)) = (points.first(), points.last()) {
            earliest = earliest.min(first.time);
            latest = latest.max(last.time);
        }
        sorted_series.push(points);
    }
    if companies.is_empty() {
        earliest = 0;
        latest = 0;
    }

    let mut w = BufWriter::new(File::create(path)?);

    write_u16(&mut w, TAPE_VERSION)?;
    write_u64(&mut w, earliest)?;
    write_u64(&mut w, latest)?;

    write_u16(&mut w, count_u16("exchanges", exchanges.len())?)?;
    for &id in &exchanges {
        let exchange = tape.exchange(id)?;
        let record_len =
            3 + exchange.name.len() + exchange.country.len() + exchange.city.len();
        write_u16(&mut w, count_u16("exchange record bytes", record_len)?)?;
        write_str(&mut w, "exchange name", &exchange.name)?;
        write_str(&mut w, "exchange country", &exchange.country)?;
        write_str(&mut w, "exchange city", &exchange.city)?;
    }

    write_u16(&mut w, count_u16("companies", companies.len())?)?;
    for &id in &companies {
        let company = tape.company(id)?;
        let position =
            *exchange_index
                .get(&company.exchange_id())
                .ok_or(TapesimError::Dangling {
                    kind: "exchange",
                    id: company.exchange_id(),
                })?;
        let record_len = 2 + company.name.len() + company.ticker.len() + 4;
        write_u16(&mut w, count_u16("company record bytes", record_len)?)?;
        write_str(&mut w, "company name", &company.name)?;
        write_str(&mut w, "company ticker", &company.ticker)?;
        write_u32(&mut w, position)?;
    }

    for points in &sorted_series {
        write_u64(&mut w, points.len() as u64)?;
        for d in points {
            let position =
                *company_index
                    .get(&d.company_id())
                    .ok_or(TapesimError::Dangling {
                        kind: "company",
                        id: d.company_id(),
                    })?;
            write_f64(&mut w, d.open)?;
            write_f64(&mut w, d.high)?;
            write_f64(&mut w, d.low)?;
            write_f64(&mut w, d.last)?;
            write_f64(&mut w, d.close)?;
            write_f64(&mut w, d.volume)?;
            write_u64(&mut w, d.time)?;
            write_u32(&mut w, position)?;
        }
    }

    w.flush()?;
    Ok(())
}

/// Deserialize a tape from `path` into a fresh store.
pub fn load(path: &Path) -> Result<Tape, TapesimError> {
    let mut r = BufReader::new(File::open(path)?);

    let version = read_u16(&mut r)?;
    if version != TAPE_VERSION {
        return Err(TapesimError::Version {
            found: version,
            expected: TAPE_VERSION,
        });
    }
    // time extremes are informational; they are recomputed on every write
    let _earliest = read_u64(&mut r)?;
    let _latest = read_u64(&mut r)?;

    let mut tape = Tape::new();

    let exchange_count = read_u16(&mut r)?;
    let mut exchange_ids = Vec::with_capacity(exchange_count as usize);
    for _ in 0..exchange_count {
        let record_len = read_u16(&mut r)? as usize;
        let name = read_str(&mut r)?;
        let country = read_str(&mut r)?;
        let city = read_str(&mut r)?;
        if record_len != 3 + name.len() + country.len() + city.len() {
            return Err(TapesimError::Format {
                reason: format!("exchange record length mismatch ({record_len} declared)"),
            });
        }
        exchange_ids.push(tape.new_exchange(&name, &country, &city)?);
    }

    let company_count = read_u16(&mut r)?;
    let mut company_ids = Vec::with_capacity(company_count as usize);
    for _ in 0..company_count {
        let record_len = read_u16(&mut r)? as usize;
        let name = read_str(&mut r)?;
        let ticker = read_str(&mut r)?;
        let index = read_u32(&mut r)?;
        if record_len != 2 + name.len() + ticker.len() + 4 {
            return Err(TapesimError::Format {
                reason: format!("company record length mismatch ({record_len} declared)"),
            });
        }
        let &exchange =
            exchange_ids
                .get(index as usize)
                .ok_or(TapesimError::IndexOutOfRange {
                    kind: "exchange",
                    index,
                    len: exchange_ids.len(),
                })?;
        company_ids.push(tape.new_company(&name, &ticker, exchange)?);
    }

    for _ in 0..company_count {
        let count = read_u64(&mut r)?;
        for _ in 0..count {
            let open = read_f64(&mut r)?;
            let high = read_f64(&mut r)?;
            let low = read_f64(&mut r)?;
            let last = read_f64(&mut r)?;
            let close = read_f64(&mut r)?;
            let volume = read_f64(&mut r)?;
            let time = read_u64(&mut r)?;
            let index = read_u32(&mut r)?;
            let &company =
                company_ids
                    .get(index as usize)
                    .ok_or(TapesimError::IndexOutOfRange {
                        kind: "company",
                        index,
                        len: company_ids.len(),
                    })?;
            tape.new_datapoint(Datapoint::new(
                open, high, low, last, close, volume, time, company,
            ))?;
        }
    }

    Ok(tape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn point(time: u64, price: f64, company: Id) -> Datapoint {
        Datapoint::new(
            price,
            price + 1.0,
            price - 1.0,
            price,
            price + 0.5,
            1000.0,
            time,
            company,
        )
    }

    /// Two exchanges, three companies: "Acme" and "Zip" carry data, "Hollow"
    /// does not; the second exchange is referenced only by "Hollow".
    fn sample_tape() -> Tape {
        let mut tape = Tape::new();
        let xnas = tape.new_exchange("XNAS", "USA", "New York").unwrap();
        let xlon = tape.new_exchange("XLON", "UK", "London").unwrap();
        let zip = tape.new_company("Zip Ltd", "ZIP", xnas).unwrap();
        let acme = tape.new_company("Acme Corp", "ACME", xnas).unwrap();
        tape.new_company("Hollow Plc", "HOL", xlon).unwrap();
        // insertion deliberately out of time order
        tape.new_datapoint(point(200, 12.0, acme)).unwrap();
        tape.new_datapoint(point(100, 11.0, acme)).unwrap();
        tape.new_datapoint(point(150, 55.0, zip)).unwrap();
        tape
    }

    fn roundtrip(tape: &Tape) -> Tape {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.tape");
        write(tape, &path).unwrap();
        load(&path).unwrap()
    }

    #[test]
    fn roundtrip_preserves_reachable_graph() {
        let loaded = roundtrip(&sample_tape());

        assert_eq!(loaded.exchanges.len(), 1);
        assert_eq!(loaded.companies.len(), 2);

        let acme = loaded.find_ticker("ACME").unwrap();
        let zip = loaded.find_ticker("ZIP").unwrap();
        assert_eq!(loaded.company(acme).unwrap().name, "Acme Corp");
        assert_eq!(
            loaded
                .exchange(loaded.company(zip).unwrap().exchange_id())
                .unwrap()
                .name,
            "XNAS"
        );

        let acme_times: Vec<u64> = loaded
            .series_of(acme)
            .iter()
            .map(|&id| loaded.datapoint(id).unwrap().time)
            .collect();
        assert_eq!(acme_times, vec![100, 200]);

        let d = loaded.datapoint(loaded.series_of(zip)[0]).unwrap();
        assert_eq!(d.time, 150);
        assert!((d.open - 55.0).abs() < f64::EPSILON);
        assert!((d.high - 56.0).abs() < f64::EPSILON);
        assert!((d.low - 54.0).abs() < f64::EPSILON);
        assert!((d.close - 55.5).abs() < f64::EPSILON);
        assert!((d.volume - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reachability_filter_drops_orphans() {
        let loaded = roundtrip(&sample_tape());
        // the dataless company and the exchange only it referenced are gone
        assert_eq!(loaded.find_ticker("HOL"), None);
        assert!(!loaded.registry.exists("XLON"));
        // nothing was dropped from the source tape itself
        let source = sample_tape();
        assert_eq!(source.companies.len(), 3);
        assert_eq!(source.exchanges.len(), 2);
    }

    #[test]
    fn output_is_name_and_time_sorted() {
        let loaded = roundtrip(&sample_tape());
        let names: Vec<String> = loaded
            .companies
            .iter()
            .map(|&id| loaded.company(id).unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["Acme Corp", "Zip Ltd"]);

        for &company in &loaded.companies {
            let times: Vec<u64> = loaded
                .series_of(company)
                .iter()
                .map(|&id| loaded.datapoint(id).unwrap().time)
                .collect();
            assert!(times.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn second_roundtrip_is_stable() {
        let once = roundtrip(&sample_tape());
        let twice = roundtrip(&once);
        assert_eq!(once.companies.len(), twice.companies.len());
        for (&a, &b) in once.companies.iter().zip(&twice.companies) {
            assert_eq!(once.company(a).unwrap().name, twice.company(b).unwrap().name);
            assert_eq!(once.series_of(a).len(), twice.series_of(b).len());
        }
    }

    #[test]
    fn version_mismatch_aborts_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.tape");
        write(&sample_tape(), &path).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[0] = 0xFF;
        bytes[1] = 0xFF;
        fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            load(&path),
            Err(TapesimError::Version { found: 0xFFFF, expected: TAPE_VERSION })
        ));
    }

    #[test]
    fn truncated_tape_aborts_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.tape");
        write(&sample_tape(), &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        assert!(matches!(load(&path), Err(TapesimError::Format { .. })));
    }

    #[test]
    fn record_length_mismatch_aborts_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.tape");
        write(&sample_tape(), &path).unwrap();

        // first exchange record_len sits right after the 20-byte header
        let mut bytes = fs::read(&path).unwrap();
        bytes[20] = bytes[20].wrapping_add(1);
        fs::write(&path, &bytes).unwrap();

        assert!(matches!(load(&path), Err(TapesimError::Format { .. })));
    }

    #[test]
    fn corrupt_exchange_index_aborts_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.tape");
        write(&sample_tape(), &path).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        // company record: u16 record_len, "Acme Corp" (1+9), "ACME" (1+4),
        // then the u32 exchange index; the company section starts after the
        // header (20), the exchange block and the u16 company count
        let exchange_block = 2 + 3 + "XNAS".len() + "USA".len() + "New York".len();
        let index_offset = 20 + exchange_block + 2 + 2 + 10 + 5;
        bytes[index_offset] = 0xEE;
        fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            load(&path),
            Err(TapesimError::IndexOutOfRange { kind: "exchange", .. })
        ));
    }

    #[test]
    fn oversized_string_is_rejected_on_write() {
        let mut tape = Tape::new();
        let exchange = tape.new_exchange(&"x".repeat(300), "USA", "NY").unwrap();
        let company = tape.new_company("Acme Corp", "ACME", exchange).unwrap();
        tape.new_datapoint(point(0, 1.0, company)).unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.tape");
        assert!(matches!(
            write(&tape, &path),
            Err(TapesimError::StringTooLong { len: 300, .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.tape");
        assert!(matches!(load(&path), Err(TapesimError::Io(_))));
    }
}
