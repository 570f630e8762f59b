// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Budget fractions and the byte budgets derived from them.
//!
//! A [`Fraction`] is a share of the total gradient bytes that may be
//! exchanged in one step. It is turned into a [`ByteBudget`] once per
//! schedule transition and the integer result is cached, so every peer
//! packs against exactly the same number.

use crate::ScheduleError;
use std::fmt;

/// A budget fraction in the half-open interval `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, serde::Serialize)]
pub struct Fraction(f64);

impl Fraction {
    /// Validates `value` as a budget fraction.
    ///
    /// # Examples
    /// ```
    /// use partition_scheduler::Fraction;
    /// assert!(Fraction::new(0.25).is_ok());
    /// assert!(Fraction::new(0.0).is_err());
    /// assert!(Fraction::new(1.5).is_err());
    /// ```
    pub fn new(value: f64) -> Result<Self, ScheduleError> {
        if value.is_finite() && value > 0.0 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(ScheduleError::InvalidConfiguration(format!(
                "budget fraction {value} is outside (0, 1]"
            )))
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }

    /// Bit-exact equality. Fractions only ever come from the same parsed
    /// schedule, so no tolerance is wanted here.
    pub fn same_as(self, other: Fraction) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum number of bytes assignable to one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub struct ByteBudget {
    bytes: usize,
}

impl ByteBudget {
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    /// `floor(fraction × total_bytes)`.
    ///
    /// # Examples
    /// ```
    /// use partition_scheduler::{ByteBudget, Fraction};
    /// let b = ByteBudget::from_fraction(Fraction::new(0.5).unwrap(), 101);
    /// assert_eq!(b.as_bytes(), 50);
    /// ```
    pub fn from_fraction(fraction: Fraction, total_bytes: usize) -> Self {
        let bytes = (fraction.get() * total_bytes as f64).floor();
        // fraction <= 1, so this only clamps float noise at the top end.
        Self {
            bytes: (bytes as usize).min(total_bytes),
        }
    }

    pub fn as_bytes(&self) -> usize {
        self.bytes
    }
}

impl fmt::Display for ByteBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const KB: usize = 1024;
        const MB: usize = 1024 * KB;
        const GB: usize = 1024 * MB;
        if self.bytes >= GB {
            write!(f, "{:.2} GB", self.bytes as f64 / GB as f64)
        } else if self.bytes >= MB {
            write!(f, "{:.2} MB", self.bytes as f64 / MB as f64)
        } else if self.bytes >= KB {
            write!(f, "{:.2} KB", self.bytes as f64 / KB as f64)
        } else {
            write!(f, "{} B", self.bytes)
        }
    }
}
