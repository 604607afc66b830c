//! Temporal alignment: merging per-company series into synchronized stops.
//!
//! Companies rarely share an identical observation grid, so the replay
//! engine first intersects their coverage (latest first observation to
//! earliest last observation), then partitions every in-window observation
//! into groups of exact time equality. Each group becomes a [`Stop`]. A
//! company absent from a group gets a linearly interpolated price from its
//! nearest bracketing observations, so every stop prices every company.

use std::collections::HashMap;

use crate::domain::error::TapesimError;
use crate::domain::store::{Id, Tape};

/// Minimum observations a company must have inside the replay window.
pub const MIN_WINDOW_POINTS: usize = 2;

/// One company's price at one instant, observed or interpolated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timepoint {
    pub time: u64,
    pub price: f64,
}

/// A synchronized market snapshot: one price per company.
#[derive(Debug, Clone)]
pub struct Stop {
    pub time: u64,
    pub points: HashMap<Id, Timepoint>,
}

impl Stop {
    pub fn price_of(&self, company: Id) -> Option<f64> {
        self.points.get(&company).map(|p| p.price)
    }
}

/// Per-company midpoint series, time-ascending, in `tape.companies` order.
fn company_series(tape: &Tape) -> Result<Vec<(Id, Vec<Timepoint>)>, TapesimError> {
    let mut series = Vec::with_capacity(tape.companies.len());
    for &company in &tape.companies {
        let ids = tape.series_of(company);
        let mut points = Vec::with_capacity(ids.len());
        for &id in ids {
            let d = tape.datapoint(id)?;
            points.push(Timepoint {
                time: d.time,
                price: d.midpoint(),
            });
        }
        points.sort_by_key(|p| p.time);
        if points.is_empty() {
            return Err(TapesimError::NoData {
                company: tape.company(company)?.name.clone(),
            });
        }
        series.push((company, points));
    }
    Ok(series)
}

fn window_of(series: &[(Id, Vec<Timepoint>)]) -> (u64, u64) {
    let start = series.iter().map(|(_, p)| p[0].time).max().unwrap_or(0);
    let end = series
        .iter()
        .map(|(_, p)| p[p.len() - 1].time)
        .min()
        .unwrap_or(0);
    (start, end)
}

/// The time range common to every company's coverage: latest first
/// observation to earliest last observation. May be empty (start > end)
/// when coverages are disjoint.
pub fn coverage_window(tape: &Tape) -> Result<(u64, u64), TapesimError> {
    if tape.companies.is_empty() {
        return Err(TapesimError::EmptyTape);
    }
    Ok(window_of(&company_series(tape)?))
}

/// Build the full ordered stop sequence for a tape.
///
/// Fails before producing anything if any company has no datapoints, or
/// fewer than [`MIN_WINDOW_POINTS`] observations inside the coverage
/// window, or cannot be bracketed for interpolation.
pub fn build_stops(tape: &Tape) -> Result<Vec<Stop>, TapesimError> {
    if tape.companies.is_empty() {
        return Err(TapesimError::EmptyTape);
    }
    let series = company_series(tape)?;
    let (window_start, window_end) = window_of(&series);

    // (position in `series`, index into that company's full series) for
    // every observation inside the window
    let mut entries: Vec<(usize, usize)> = Vec::new();
    for (pos, (company, points)) in series.iter().enumerate() {
        let before = entries.len();
        for (k, p) in points.iter().enumerate() {
            if p.time >= window_start && p.time <= window_end {
                entries.push((pos, k));
            }
        }
        let in_window = entries.len() - before;
        if in_window < MIN_WINDOW_POINTS {
            return Err(TapesimError::InsufficientData {
                company: tape.company(*company)?.name.clone(),
                points: in_window,
                minimum: MIN_WINDOW_POINTS,
            });
        }
    }
    entries.sort_by_key(|&(pos, k)| series[pos].1[k].time);

    // partition into groups of exact time equality
    let mut groups: Vec<Vec<(usize, usize)>> = Vec::new();
    let mut group_times: Vec<u64> = Vec::new();
    for (pos, k) in entries {
        let time = series[pos].1[k].time;
        if group_times.last() != Some(&time) {
            group_times.push(time);
            groups.push(Vec::new());
        }
        if let Some(group) = groups.last_mut() {
            group.push((pos, k));
        }
    }

    let mut stops = Vec::with_capacity(groups.len());
    for (i, group) in groups.iter().enumerate() {
        let time = group_times[i];
        let mut points = HashMap::with_capacity(series.len());
        for &(pos, k) in group {
            let (company, series_points) = &series[pos];
            points.insert(*company, series_points[k]);
        }
        for (pos, (company, _)) in series.iter().enumerate() {
            if points.contains_key(company) {
                continue;
            }
            let (lower, upper) = bracket(tape, &series, &groups, pos, i, time)?;
            let t = (time - lower.time) as f64 / (upper.time - lower.time) as f64;
            // the blend weights the upper bracket by t
            let price = lower.price + (upper.price - lower.price) * t;
            points.insert(*company, Timepoint { time, price });
        }
        stops.push(Stop { time, points });
    }
    Ok(stops)
}

/// Bracketing observations for a company missing from stop `stop_index`.
///
/// For the first two stops the company's own history cannot reach back far
/// enough, so its first later occurrence `k` brackets with `k-1`; for every
/// other stop its most recent earlier occurrence `k` brackets with `k+1`.
/// The interpolation instant always falls strictly between the two.
fn bracket(
    tape: &Tape,
    series: &[(Id, Vec<Timepoint>)],
    groups: &[Vec<(usize, usize)>],
    pos: usize,
    stop_index: usize,
    time: u64,
) -> Result<(Timepoint, Timepoint), TapesimError> {
    let (company, points) = &series[pos];
    let occurrence = |group: &[(usize, usize)]| {
        group
            .iter()
            .find(|&&(p, _)| p == pos)
            .map(|&(_, k)| k)
    };

    let found = if stop_index <= 1 {
        groups[stop_index + 1..]
            .iter()
            .find_map(|g| occurrence(g))
            .and_then(|k| k.checked_sub(1).map(|prev| (points[prev], points[k])))
    } else {
        groups[..stop_index]
            .iter()
            .rev()
            .find_map(|g| occurrence(g))
            .and_then(|k| points.get(k + 1).map(|&next| (points[k], next)))
    };

    match found {
        Some((lower, upper)) if upper.time > lower.time => Ok((lower, upper)),
        _ => Err(TapesimError::NoBrackets {
            company: tape.company(*company)?.name.clone(),
            time,
        }),
    }
}
