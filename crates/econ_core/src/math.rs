//! Fixed-point math utilities for deterministic scheduling.
//!
//! Priorities and ratios use fixed-point arithmetic so that two scheduler
//! instances fed the same snapshot always produce the same ordering,
//! regardless of platform.

use fixed::types::I32F32;

/// Fixed-point number type for all priority math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Build a ratio `num / den` in fixed point.
///
/// Rounded to the nearest representable value, so `ratio(4, 5)` equals the
/// `0.8` a data file parses to. Returns `None` when `den` is not positive.
#[must_use]
pub fn ratio(num: i32, den: i32) -> Option<Fixed> {
    if den <= 0 {
        return None;
    }
    let scaled = (i128::from(num) << (Fixed::FRAC_NBITS + 1)) + i128::from(den);
    let bits = scaled.div_euclid(2 * i128::from(den));
    i64::try_from(bits).ok().map(Fixed::from_bits)
}

/// Serde support for fixed-point numbers stored as their raw bits.
///
/// Used for binary snapshots where exact precision must round-trip.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for fixed-point numbers written as decimals in data files.
///
/// Catalog and config files are hand-edited, so priorities are written as
/// `3.5` rather than raw bits. Conversion happens once at load time.
pub mod decimal_serde {
    use super::Fixed;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize a decimal into a fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| D::Error::custom(format!("{value} is not representable as a priority")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(4, 5), Some(Fixed::from_num(0.8)));
        assert_eq!(ratio(10, 10), Some(Fixed::from_num(1)));
        assert_eq!(ratio(8, 10), Some(Fixed::from_num(0.8)));
        assert_eq!(ratio(-1, 2), Some(Fixed::from_num(-0.5)));
        assert_eq!(ratio(3, 0), None);
        assert_eq!(ratio(3, -2), None);
    }

    #[test]
    fn test_decimal_serde_roundtrip_through_ron() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrapper(#[serde(with = "decimal_serde")] Fixed);

        let parsed: Wrapper = ron::from_str("(2.5)").unwrap();
        assert_eq!(parsed.0, Fixed::from_num(2.5));

        let nan = ron::from_str::<Wrapper>("(NaN)");
        assert!(nan.is_err());
    }
}
