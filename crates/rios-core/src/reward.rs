//! Fixed-point reward amounts

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Fractional digits carried by a [`Reward`]
pub const REWARD_DECIMALS: u32 = 8;

const SCALE: i64 = 10_i64.pow(REWARD_DECIMALS);

/// Amount of $ROS with 8 fractional digits.
///
/// The control plane sends rewards as JSON numbers; they are rounded to the
/// nearest 1e-8 once on the way in so that session totals add up exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reward(i64);

impl Reward {
    pub const ZERO: Reward = Reward(0);

    /// Build a reward from raw 1e-8 units
    pub fn from_units(units: i64) -> Self {
        Self(units)
    }

    /// Raw 1e-8 units
    pub fn units(&self) -> i64 {
        self.0
    }

    /// Round a floating point amount to the nearest unit. Non-finite input is zero.
    pub fn from_f64(amount: f64) -> Self {
        if !amount.is_finite() {
            return Self::ZERO;
        }
        Self((amount * SCALE as f64).round() as i64)
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / SCALE as f64
    }
}

impl Add for Reward {
    type Output = Reward;

    fn add(self, rhs: Reward) -> Reward {
        Reward(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Reward {
    fn add_assign(&mut self, rhs: Reward) {
        *self = *self + rhs;
    }
}

impl Sum for Reward {
    fn sum<I: Iterator<Item = Reward>>(iter: I) -> Reward {
        iter.fold(Reward::ZERO, Add::add)
    }
}

impl std::fmt::Display for Reward {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = SCALE as u64;
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            abs / scale,
            abs % scale,
            width = REWARD_DECIMALS as usize
        )
    }
}

impl Serialize for Reward {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Reward {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Reward::from_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_is_exact() {
        let total: Reward = [0.1, 0.2, 0.3].into_iter().map(Reward::from_f64).sum();
        assert_eq!(total, Reward::from_f64(0.6));
        assert_eq!(total.to_string(), "0.60000000");
    }

    #[test]
    fn test_display() {
        assert_eq!(Reward::from_units(150_000_000).to_string(), "1.50000000");
        assert_eq!(Reward::from_units(1).to_string(), "0.00000001");
        assert_eq!(Reward::from_units(-5).to_string(), "-0.00000005");
        assert_eq!(Reward::ZERO.to_string(), "0.00000000");
    }

    #[test]
    fn test_rounds_to_nearest_unit() {
        assert_eq!(Reward::from_f64(0.000000014).units(), 1);
        assert_eq!(Reward::from_f64(0.000000016).units(), 2);
        assert_eq!(Reward::from_f64(f64::NAN), Reward::ZERO);
    }

    #[test]
    fn test_deserialize_from_json_number() {
        let reward: Reward = serde_json::from_str("12.5").unwrap();
        assert_eq!(reward.units(), 1_250_000_000);
        let reward: Reward = serde_json::from_str("3").unwrap();
        assert_eq!(reward.to_string(), "3.00000000");
    }
}
