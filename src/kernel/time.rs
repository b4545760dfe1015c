use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Milliseconds relative to session start, exactly as the platform clock reported them.
pub type Timestamp = f64;

pub const MILLION: i64 = 1_000_000;

/// Total order over timestamps. NaN sorts after every finite value.
pub fn cmp_time(a: Timestamp, b: Timestamp) -> Ordering {
    a.total_cmp(&b)
}

/// Fixed-point value in millionths (1_000_000 = 1.0).
///
/// Integer addition is associative, so a running total is independent of
/// the order observations arrive in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Millionths(pub i64);

impl Millionths {
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() {
            return Self(0);
        }
        Self((value * MILLION as f64).round() as i64)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / MILLION as f64
    }
}

impl Add for Millionths {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Millionths {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for Millionths {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}
