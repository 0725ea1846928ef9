//! # Durations
//!
//! A [`Duration`] is an exact rational value tagged with a [`Unit`]. Positions,
//! durations and trims are all durations; the stepper in [`crate::state`]
//! converts them to seconds or whole notes.
//!
//! ## Units
//! - `s`, `ms` - wall-clock time ("time units")
//! - `wn` - whole notes, unaffected by the time signature
//! - `beats`, `measures` - derived from the time signature in effect
//! - `atoms` - accepted by the parser, but not steppable
//!
//! `s`, `ms` and `wn` are the *fixed* units.
//!
//! ## Text form
//! `"<rational> <unit>"`, where the rational is an integer, a fraction (`3/8`) or a
//! decimal (`0.25`). A missing unit means `ms`.

use crate::error::TimelineError;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exact rational used for every position, duration and rate.
///
/// Denominators grow with every tempo change crossed, so the integers are
/// unbounded.
pub type Rational = BigRational;

/// `numer/denom` as a [`Rational`]. `denom` must not be zero.
pub fn ratio(numer: i64, denom: i64) -> Rational {
    Rational::new(numer.into(), denom.into())
}

/// Duration unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Unit {
    Seconds,
    #[default]
    Milliseconds,
    Measures,
    Beats,
    Atoms,
    WholeNotes,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Seconds => "s",
            Unit::Milliseconds => "ms",
            Unit::Measures => "measures",
            Unit::Beats => "beats",
            Unit::Atoms => "atoms",
            Unit::WholeNotes => "wn",
        }
    }

    pub fn is_time(&self) -> bool {
        matches!(self, Unit::Seconds | Unit::Milliseconds)
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Unit::Seconds | Unit::Milliseconds | Unit::WholeNotes)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s" => Ok(Unit::Seconds),
            "" | "ms" => Ok(Unit::Milliseconds),
            "measures" => Ok(Unit::Measures),
            "beats" => Ok(Unit::Beats),
            "atoms" => Ok(Unit::Atoms),
            "wn" => Ok(Unit::WholeNotes),
            other => Err(TimelineError::InvalidDuration(format!("unknown unit '{}'", other))),
        }
    }
}

/// An exact amount of musical or wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Duration {
    pub value: Rational,
    pub unit: Unit,
}

impl Duration {
    pub fn new(value: Rational, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// `numer/denom` whole notes
    pub fn wn(numer: i64, denom: i64) -> Self {
        Self::new(ratio(numer, denom), Unit::WholeNotes)
    }

    pub fn seconds(value: Rational) -> Self {
        Self::new(value, Unit::Seconds)
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_negative()
    }

    pub fn is_positive(&self) -> bool {
        self.value.is_positive()
    }

    /// `s` or `ms`
    pub fn is_time(&self) -> bool {
        self.unit.is_time()
    }

    /// Inverse of [`Duration::is_time`]
    pub fn is_atom(&self) -> bool {
        !self.is_time()
    }

    /// Unaffected by time signature (`s`, `ms`, `wn`)
    pub fn is_fixed(&self) -> bool {
        self.unit.is_fixed()
    }

    /// Same unit, negated value.
    pub fn inverse(&self) -> Self {
        Self::new(-self.value.clone(), self.unit)
    }

    /// Number of seconds, for time units only.
    pub fn to_seconds(&self) -> Option<Rational> {
        match self.unit {
            Unit::Seconds => Some(self.value.clone()),
            Unit::Milliseconds => Some(&self.value / ratio(1000, 1)),
            _ => None,
        }
    }

    /// The value as a float, ignoring the unit.
    pub fn to_f64(&self) -> f64 {
        self.value.to_f64().unwrap_or(f64::NAN)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

impl FromStr for Duration {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);
        let value = parse_rational(number.trim())
            .ok_or_else(|| TimelineError::InvalidDuration(s.to_string()))?;
        let unit = unit.parse::<Unit>()?;
        Ok(Duration::new(value, unit))
    }
}

/// Parse an integer, a fraction (`n/d`) or a decimal (`1.25`), with an optional
/// leading sign. Signs inside the number are rejected.
pub fn parse_rational(s: &str) -> Option<Rational> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let is_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());

    let value = if let Some((numer, denom)) = digits.split_once('/') {
        let (numer, denom) = (numer.trim(), denom.trim());
        if !is_digits(numer) || !is_digits(denom) || denom.bytes().all(|b| b == b'0') {
            return None;
        }
        Rational::from_str(&format!("{}/{}", numer, denom)).ok()?
    } else if let Some((whole, frac)) = digits.split_once('.') {
        if !(whole.is_empty() || is_digits(whole)) || !is_digits(frac) {
            return None;
        }
        let text = format!("{}{}/1{}", whole, frac, "0".repeat(frac.len()));
        Rational::from_str(&text).ok()?
    } else {
        if !is_digits(digits) {
            return None;
        }
        Rational::from_str(digits).ok()?
    };

    Some(if negative { -value } else { value })
}

/// Number or string holding a rational, as found in documents.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RationalRepr {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RationalRepr {
    pub(crate) fn to_rational(&self) -> Option<Rational> {
        match self {
            RationalRepr::Int(n) => Some(ratio(*n, 1)),
            RationalRepr::Float(f) => parse_rational(&f.to_string()),
            RationalRepr::Text(s) => parse_rational(s.trim()),
        }
    }
}

/// Accepted document forms: `"1/4 wn"`, `250` (ms), `[1, wn]`, `[1, 4, wn]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum DurationRepr {
    Text(String),
    Number(RationalRepr),
    Pair(RationalRepr, String),
    Triple(i64, i64, String),
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = DurationRepr::deserialize(deserializer)?;
        let invalid = |what: String| de::Error::custom(TimelineError::InvalidDuration(what));
        match repr {
            DurationRepr::Text(s) => s.parse().map_err(de::Error::custom),
            DurationRepr::Number(n) => n
                .to_rational()
                .map(|value| Duration::new(value, Unit::Milliseconds))
                .ok_or_else(|| invalid(format!("{:?}", n))),
            DurationRepr::Pair(n, unit) => {
                let value = n.to_rational().ok_or_else(|| invalid(format!("{:?}", n)))?;
                let unit = unit.parse().map_err(de::Error::custom)?;
                Ok(Duration::new(value, unit))
            }
            DurationRepr::Triple(numer, denom, unit) => {
                if denom == 0 {
                    return Err(invalid(format!("{}/{}", numer, denom)));
                }
                let unit = unit.parse().map_err(de::Error::custom)?;
                Ok(Duration::new(ratio(numer, denom), unit))
            }
        }
    }
}

/// Compact form: `0`, `[n, unit]` or `[n, d, unit]`. Values that do not fit in
/// 64 bits fall back to the text form.
impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.value.is_zero() {
            return serializer.serialize_i64(0);
        }
        let (Some(numer), Some(denom)) = (self.value.numer().to_i64(), self.value.denom().to_i64())
        else {
            return serializer.serialize_str(&self.to_string());
        };
        let integer = self.value.is_integer();
        let mut seq = serializer.serialize_seq(Some(if integer { 2 } else { 3 }))?;
        seq.serialize_element(&numer)?;
        if !integer {
            seq.serialize_element(&denom)?;
        }
        seq.serialize_element(self.unit.as_str())?;
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fraction_with_unit() {
        let d: Duration = "3/8 wn".parse().unwrap();
        assert_eq!(d.value, ratio(3, 8));
        assert_eq!(d.unit, Unit::WholeNotes);
    }

    #[test]
    fn test_parse_decimal_and_default_unit() {
        let d: Duration = "0.25".parse().unwrap();
        assert_eq!(d, Duration::new(ratio(1, 4), Unit::Milliseconds));

        let d: Duration = "1.5s".parse().unwrap();
        assert_eq!(d, Duration::seconds(ratio(3, 2)));
    }

    #[test]
    fn test_parse_negative() {
        let d: Duration = "-1/2 beats".parse().unwrap();
        assert!(d.is_negative());
        assert_eq!(d.unit, Unit::Beats);
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<Duration>().is_err());
        assert!("1/0 wn".parse::<Duration>().is_err());
        assert!("1 furlongs".parse::<Duration>().is_err());
        assert!("--1 wn".parse::<Duration>().is_err());
        assert!("1/-2 wn".parse::<Duration>().is_err());
        assert!("1/+2 wn".parse::<Duration>().is_err());
        assert!("1.-5 s".parse::<Duration>().is_err());
        assert!("1/0000 wn".parse::<Duration>().is_err());
    }

    #[test]
    fn test_parse_beyond_64_bits() {
        assert!(matches!(
            "1/-9223372036854775808 wn".parse::<Duration>(),
            Err(TimelineError::InvalidDuration(_))
        ));

        let d: Duration = "1/9223372036854775808 wn".parse().unwrap();
        assert!(d.is_positive());
        assert_eq!(d.value.denom().to_string(), "9223372036854775808");

        let text = "123456789012345678901234567890/7 s";
        let d: Duration = text.parse().unwrap();
        assert_eq!(d.to_string(), text);
        assert!(serde_yaml::to_string(&d).unwrap().contains(text));
    }

    #[test]
    fn test_classification() {
        let ms: Duration = "20 ms".parse().unwrap();
        assert!(ms.is_time() && ms.is_fixed() && !ms.is_atom());

        let wn = Duration::wn(1, 4);
        assert!(wn.is_atom() && wn.is_fixed());

        let beats: Duration = "2 beats".parse().unwrap();
        assert!(beats.is_atom() && !beats.is_fixed());
        assert!(Duration::wn(0, 1).is_zero());
    }

    #[test]
    fn test_inverse_and_seconds() {
        let d: Duration = "1500 ms".parse().unwrap();
        assert_eq!(d.to_seconds(), Some(ratio(3, 2)));
        assert_eq!(d.inverse().value, ratio(-1500, 1));
        assert_eq!(d.inverse().unit, Unit::Milliseconds);
        assert_eq!(Duration::wn(1, 4).to_seconds(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Duration::wn(1, 4).to_string(), "1/4 wn");
        assert_eq!(Duration::seconds(ratio(2, 1)).to_string(), "2 s");
    }

    #[test]
    fn test_deserialize_forms() {
        let d: Duration = serde_yaml::from_str("\"1/4 wn\"").unwrap();
        assert_eq!(d, Duration::wn(1, 4));

        let d: Duration = serde_yaml::from_str("250").unwrap();
        assert_eq!(d, Duration::new(ratio(250, 1), Unit::Milliseconds));

        let d: Duration = serde_yaml::from_str("[2, beats]").unwrap();
        assert_eq!(d, Duration::new(ratio(2, 1), Unit::Beats));

        let d: Duration = serde_yaml::from_str("[3, 8, wn]").unwrap();
        assert_eq!(d, Duration::wn(3, 8));
    }

    #[test]
    fn test_serialize_compact() {
        assert_eq!(serde_yaml::to_string(&Duration::wn(0, 1)).unwrap().trim(), "0");
        let yaml = serde_yaml::to_string(&Duration::wn(3, 8)).unwrap();
        assert_eq!(yaml, "- 3\n- 8\n- wn\n");
    }
}
