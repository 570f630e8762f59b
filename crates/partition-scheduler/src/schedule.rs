// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Piecewise budget schedules.
//!
//! A schedule string lists `<epoch>:<fraction>` tokens separated by commas:
//!
//! ```text
//! 0:0.1,10:0.5,20:1.0
//! ```
//!
//! Epochs are converted to global steps with
//!
//! ```text
//! step = floor(epoch × num_train / (batch_size × num_peers))
//! ```
//!
//! because every peer consumes `batch_size` examples per step. Token order is
//! preserved; the parser never sorts.

use crate::ScheduleError;

/// One `(step threshold, budget fraction)` pair.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ScheduleEntry {
    /// Global step from which this fraction applies.
    pub step: u64,
    /// Budget fraction; range-checked when it takes effect, not here.
    pub fraction: f64,
}

/// An ordered list of schedule entries, in declaration order.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Schedule {
    entries: Vec<ScheduleEntry>,
}

impl Schedule {
    pub fn new(entries: Vec<ScheduleEntry>) -> Self {
        Self { entries }
    }

    /// A schedule that applies `fraction` from step 0 onwards.
    pub fn constant(fraction: f64) -> Self {
        Self {
            entries: vec![ScheduleEntry { step: 0, fraction }],
        }
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Step thresholds in declaration order.
    pub fn steps(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.step).collect()
    }

    /// Fractions in declaration order.
    pub fn fractions(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.fraction).collect()
    }

    /// The entry in effect at `step`: the one with the greatest threshold
    /// that is `<= step`. On equal thresholds the later-declared entry wins.
    /// Returns `None` before the first threshold is reached.
    pub fn entry_at(&self, step: u64) -> Option<&ScheduleEntry> {
        let mut best: Option<&ScheduleEntry> = None;
        for entry in &self.entries {
            if entry.step > step {
                continue;
            }
            if best.map_or(true, |b| entry.step >= b.step) {
                best = Some(entry);
            }
        }
        best
    }
}

/// Converts schedule strings into step-based [`Schedule`]s.
///
/// # Example
/// ```
/// use partition_scheduler::ScheduleParser;
///
/// let parser = ScheduleParser::new(32, 3200, 4).unwrap();
/// let schedule = parser.parse("0:0.1,10:0.5").unwrap();
/// assert_eq!(schedule.steps(), vec![0, 250]);
/// assert_eq!(schedule.fractions(), vec![0.1, 0.5]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ScheduleParser {
    batch_size: u64,
    num_train: u64,
    num_peers: u64,
}

impl ScheduleParser {
    /// Creates a parser. All three quantities must be positive.
    pub fn new(batch_size: u64, num_train: u64, num_peers: u64) -> Result<Self, ScheduleError> {
        for (label, value) in [
            ("batch size", batch_size),
            ("number of training examples", num_train),
            ("number of peers", num_peers),
        ] {
            if value == 0 {
                return Err(ScheduleError::InvalidConfiguration(format!(
                    "{label} must be positive"
                )));
            }
        }
        Ok(Self {
            batch_size,
            num_train,
            num_peers,
        })
    }

    /// Global steps per epoch across the whole cluster, as a rational
    /// `(numerator, denominator)`.
    fn steps_per_epoch(&self) -> (u128, u128) {
        (
            self.num_train as u128,
            self.batch_size as u128 * self.num_peers as u128,
        )
    }

    /// `floor(epoch × num_train / (batch_size × num_peers))`, saturating.
    pub fn epoch_to_step(&self, epoch: u64) -> u64 {
        let (num, den) = self.steps_per_epoch();
        let step = (epoch as u128).saturating_mul(num) / den;
        u64::try_from(step).unwrap_or(u64::MAX)
    }

    /// Parses a comma-separated list of `<epoch>:<fraction>` tokens.
    pub fn parse(&self, schedule: &str) -> Result<Schedule, ScheduleError> {
        let mut entries = Vec::new();
        for raw in schedule.split(',') {
            let (epoch, fraction) = parse_token(raw)?;
            entries.push(ScheduleEntry {
                step: self.epoch_to_step(epoch),
                fraction,
            });
        }
        let parsed = Schedule::new(entries);

        tracing::info!(
            "schedule '{}' (batch {}, {} examples, {} peers): steps {:?}, fractions {:?}",
            schedule.trim(),
            self.batch_size,
            self.num_train,
            self.num_peers,
            parsed.steps(),
            parsed.fractions(),
        );
        Ok(parsed)
    }
}

fn parse_token(raw: &str) -> Result<(u64, f64), ScheduleError> {
    let token = raw.trim();
    let format_err = |detail: &str| ScheduleError::Format {
        token: token.to_string(),
        detail: detail.to_string(),
    };

    if token.is_empty() {
        return Err(format_err("empty token"));
    }
    let (epoch_str, fraction_str) = token
        .split_once(':')
        .ok_or_else(|| format_err("expected <epoch>:<fraction>"))?;
    let (epoch_str, fraction_str) = (epoch_str.trim(), fraction_str.trim());

    let epoch = epoch_str
        .parse::<u64>()
        .map_err(|_| format_err("epoch is not a non-negative integer"))?;

    let fraction = fraction_str
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .ok_or_else(|| format_err("fraction is not a number"))?;

    Ok((epoch, fraction))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ScheduleParser {
        ScheduleParser::new(32, 3200, 4).unwrap()
    }

    #[test]
    fn test_epoch_conversion() {
        let s = parser().parse("0:0.1,10:0.5").unwrap();
        assert_eq!(s.steps(), vec![0, 250]);
        assert_eq!(s.fractions(), vec![0.1, 0.5]);
    }

    #[test]
    fn test_conversion_floors() {
        // 1 × 100 / (32 × 1) = 3.125
        let p = ScheduleParser::new(32, 100, 1).unwrap();
        assert_eq!(p.epoch_to_step(1), 3);
        assert_eq!(p.epoch_to_step(3), 9);
    }

    #[test]
    fn test_order_is_preserved() {
        let s = parser().parse("20:1.0,0:0.1,10:0.5").unwrap();
        assert_eq!(s.steps(), vec![500, 0, 250]);
        assert_eq!(s.fractions(), vec![1.0, 0.1, 0.5]);
    }

    #[test]
    fn test_whitespace_tolerated() {
        let s = parser().parse(" 0 : 0.2 , 4:0.4 ").unwrap();
        assert_eq!(s.steps(), vec![0, 100]);
        assert_eq!(s.fractions(), vec![0.2, 0.4]);
    }

    #[test]
    fn test_fraction_not_range_checked() {
        let s = parser().parse("0:1.5").unwrap();
        assert_eq!(s.fractions(), vec![1.5]);
    }

    #[test]
    fn test_malformed_tokens() {
        for bad in [
            "", "0:0.1,", "0.1", "a:0.1", "0:x", "0:0.1:2", "-1:0.5", "0:nan", "2.5:0.3", "1e2:0.3",
        ] {
            let err = parser().parse(bad).unwrap_err();
            assert!(
                matches!(err, ScheduleError::Format { .. }),
                "expected format error for {bad:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_format_error_cites_token() {
        let err = parser().parse("0:0.1,oops,5:1.0").unwrap_err();
        match err {
            ScheduleError::Format { token, .. } => assert_eq!(token, "oops"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_conversion_saturates() {
        let p = ScheduleParser::new(1, u64::MAX, 1).unwrap();
        assert_eq!(p.epoch_to_step(2), u64::MAX);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(ScheduleParser::new(0, 100, 1).is_err());
        assert!(ScheduleParser::new(32, 0, 1).is_err());
        assert!(matches!(
            ScheduleParser::new(32, 100, 0),
            Err(ScheduleError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_entry_at_picks_latest_crossed_threshold() {
        let s = parser().parse("0:0.1,10:0.5,20:1.0").unwrap();
        assert_eq!(s.entry_at(0).unwrap().fraction, 0.1);
        assert_eq!(s.entry_at(249).unwrap().fraction, 0.1);
        assert_eq!(s.entry_at(250).unwrap().fraction, 0.5);
        assert_eq!(s.entry_at(10_000).unwrap().fraction, 1.0);
    }

    #[test]
    fn test_entry_at_unsorted_and_ties() {
        let s = Schedule::new(vec![
            ScheduleEntry { step: 100, fraction: 0.5 },
            ScheduleEntry { step: 10, fraction: 0.2 },
            ScheduleEntry { step: 100, fraction: 0.7 },
        ]);
        assert!(s.entry_at(9).is_none());
        assert_eq!(s.entry_at(50).unwrap().fraction, 0.2);
        assert_eq!(s.entry_at(100).unwrap().fraction, 0.7);
    }

    #[test]
    fn test_constant() {
        let s = Schedule::constant(0.3);
        assert_eq!(s.len(), 1);
        assert_eq!(s.entry_at(0).unwrap().fraction, 0.3);
    }
}
