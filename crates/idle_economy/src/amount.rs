//! # Amount - Arbitrary-Magnitude Decimal
//!
//! **NO RAW FLOATS ONCE NUMBERS GET BIG**
//!
//! Every economic quantity in the core is an [`Amount`]: a base-10
//! mantissa/exponent pair that keeps 15 significant digits at any
//! magnitude. Idle economies routinely pass 10^15 (where `f64` stops being
//! integral) and keep climbing past 10^300 (where `f64` overflows), so the
//! exponent is a separate `i64`.
//!
//! ## Representation
//!
//! - zero is `(0.0, 0)`
//! - finite non-zero values have `1 <= |mantissa| < 10`
//! - mantissas are rounded to 15 significant digits, so integer and short
//!   decimal results compare equal to their parsed forms
//! - whole numbers below `8e15` are exact: integer sums and products keep
//!   every digit, so `1e15 + 1` is not `1e15`
//! - `INFINITY`/`NEG_INFINITY` are explicit and never produced by accident
//! - `NaN` is never stored
//!
//! ## Failure policy
//!
//! All arithmetic is total. Division by zero is zero, a non-finite `pow`
//! exponent is treated as 1, and operations whose result is undefined
//! (`inf - inf`, fractional power of a negative) collapse to zero.
//! Parsing is the one fallible boundary: [`Amount::parse`] returns a
//! `Result`, [`Amount::parse_or_zero`] logs and substitutes zero.

use std::cmp::Ordering;
use std::fmt;
use std::iter::{Product, Sum};
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{EconomyError, EconomyResult};

/// Significant digits an `f64` mantissa can carry.
const MAX_SIGNIFICANT_DIGITS: i64 = 17;

/// Exponent magnitude beyond which values saturate to infinity / zero.
const MAX_EXPONENT: i64 = 9_000_000_000_000_000;

/// Values at or above `10^INTEGRAL_EXPONENT` are always whole numbers.
const INTEGRAL_EXPONENT: i64 = 14;

/// Mantissas are kept to 15 significant digits, so `1.5 - 1.2` is `0.3`.
const MANTISSA_SCALE: f64 = 1e14;

/// Whole numbers below this magnitude are held exactly. A mantissa in
/// `[8, 10)` has no room for a sixteenth digit.
const EXACT_INTEGER_LIMIT: i64 = 8_000_000_000_000_000;

/// Relative distance at which a value counts as the integer next to it.
const NEAR_INTEGER: f64 = 1e-15;

/// Exactly representable powers of ten.
const POW10: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15,
    1e16, 1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

/// Multiplies `value` by `10^shift`, exactly when the power is representable.
#[inline]
fn scale10(value: f64, shift: i64) -> f64 {
    match shift {
        0 => value,
        1..=22 => value * POW10[shift as usize],
        -22..=-1 => value / POW10[(-shift) as usize],
        s if s > 0 => value * 10f64.powi(s.min(i64::from(i32::MAX)) as i32),
        s => {
            // Split to avoid underflowing the power itself.
            let first = value / 1e22;
            first * 10f64.powi((s + 22).max(i64::from(i32::MIN)) as i32)
        }
    }
}

/// Arbitrary-magnitude decimal number used for all economy quantities.
#[derive(Clone, Copy)]
pub struct Amount {
    mantissa: f64,
    exponent: i64,
}

impl Amount {
    /// Zero.
    pub const ZERO: Self = Self {
        mantissa: 0.0,
        exponent: 0,
    };

    /// One.
    pub const ONE: Self = Self {
        mantissa: 1.0,
        exponent: 0,
    };

    /// Positive infinity. Only produced when requested or on exponent overflow.
    pub const INFINITY: Self = Self {
        mantissa: f64::INFINITY,
        exponent: 0,
    };

    /// Negative infinity.
    pub const NEG_INFINITY: Self = Self {
        mantissa: f64::NEG_INFINITY,
        exponent: 0,
    };

    /// Builds a normalised value from a raw mantissa and exponent.
    #[must_use]
    pub fn from_parts(mantissa: f64, exponent: i64) -> Self {
        if mantissa.is_nan() || mantissa == 0.0 {
            return Self::ZERO;
        }
        if mantissa.is_infinite() {
            return if mantissa > 0.0 {
                Self::INFINITY
            } else {
                Self::NEG_INFINITY
            };
        }

        let mut shift = mantissa.abs().log10().floor() as i64;
        let mut m = scale10(mantissa, -shift);
        if m.abs() >= 10.0 {
            shift += 1;
            m = scale10(mantissa, -shift);
        } else if m.abs() < 1.0 {
            shift -= 1;
            m = scale10(mantissa, -shift);
        }
        m = (m * MANTISSA_SCALE).round() / MANTISSA_SCALE;
        if m.abs() >= 10.0 {
            m /= 10.0;
            shift += 1;
        }

        let exponent = exponent.saturating_add(shift);
        if exponent > MAX_EXPONENT {
            return if m > 0.0 {
                Self::INFINITY
            } else {
                Self::NEG_INFINITY
            };
        }
        if exponent < -MAX_EXPONENT {
            return Self::ZERO;
        }
        Self { mantissa: m, exponent }
    }

    /// Converts a native float. Non-finite input becomes zero.
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() {
            tracing::warn!(value, "non-finite number coerced to zero");
            return Self::ZERO;
        }
        if value == 0.0 {
            return Self::ZERO;
        }
        // `{:e}` is the shortest round-tripping form, so the decimal digits
        // of the mantissa survive exactly.
        let text = format!("{value:e}");
        Self::parse(&text).unwrap_or_else(|_| Self::from_parts(value, 0))
    }

    /// Parses a decimal string.
    ///
    /// Accepts plain decimals (`"123.45"`), signs, scientific notation
    /// (`"1.5e300"`), `"inf"`, and digit strings longer than `f64` range.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::InvalidAmount` if the input is not a number.
    pub fn parse(input: &str) -> EconomyResult<Self> {
        let invalid = || EconomyError::InvalidAmount(input.to_string());
        let text = input.trim();
        if text.is_empty() {
            return Err(invalid());
        }

        match text.to_ascii_lowercase().as_str() {
            "inf" | "+inf" | "infinity" | "+infinity" => return Ok(Self::INFINITY),
            "-inf" | "-infinity" => return Ok(Self::NEG_INFINITY),
            _ => {}
        }

        let (number, exp_offset) = match text.find(|c: char| c == 'e' || c == 'E') {
            Some(idx) => {
                let exp = text[idx + 1..].parse::<i64>().map_err(|_| invalid())?;
                (&text[..idx], exp)
            }
            None => (text, 0),
        };

        let (negative, unsigned) = match number.as_bytes().first() {
            Some(b'-') => (true, &number[1..]),
            Some(b'+') => (false, &number[1..]),
            _ => (false, number),
        };

        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((i, f)) => (i, f),
            None => (unsigned, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let digits: String = int_part.chars().chain(frac_part.chars()).collect();
        let Some(first) = digits.find(|c: char| c != '0') else {
            return Ok(Self::ZERO);
        };

        let point_exponent = int_part.len() as i64 - 1 - first as i64;
        let significant = &digits[first..];
        let exponent = point_exponent.saturating_add(exp_offset);

        let trimmed = significant.trim_end_matches('0');
        if (0..=15).contains(&exponent) && trimmed.len() as i64 <= exponent + 1 {
            if let Ok(head) = trimmed.parse::<i64>() {
                let whole = head * 10i64.pow((exponent + 1 - trimmed.len() as i64) as u32);
                return Ok(Self::from_integer(if negative { -whole } else { whole }));
            }
        }

        let head = &significant[..significant.len().min(MAX_SIGNIFICANT_DIGITS as usize)];
        let mantissa_text = if head.len() == 1 {
            head.to_string()
        } else {
            format!("{}.{}", &head[..1], &head[1..])
        };
        let mantissa: f64 = mantissa_text.parse().map_err(|_| invalid())?;
        let mantissa = if negative { -mantissa } else { mantissa };

        Ok(Self::from_parts(mantissa, exponent))
    }

    /// Exact whole number, keeping a sixteenth digit when it fits.
    fn from_integer(value: i64) -> Self {
        if value == 0 {
            return Self::ZERO;
        }
        if value.unsigned_abs() >= EXACT_INTEGER_LIMIT.unsigned_abs() {
            return Self::from_parts(value as f64, 0);
        }
        let digits = value.unsigned_abs().ilog10();
        Self {
            mantissa: value as f64 / POW10[digits as usize],
            exponent: i64::from(digits),
        }
    }

    /// The value as an `i64` when it is a whole number below
    /// `EXACT_INTEGER_LIMIT`.
    #[allow(clippy::cast_possible_truncation)]
    fn as_exact_integer(self) -> Option<i64> {
        if self.is_zero() {
            return Some(0);
        }
        if self.is_infinite() || !(0..=15).contains(&self.exponent) {
            return None;
        }
        let value = scale10(self.mantissa, self.exponent).round();
        if value.abs() >= EXACT_INTEGER_LIMIT as f64 {
            return None;
        }
        let whole = value as i64;
        (Self::from_integer(whole) == self).then_some(whole)
    }

    /// Parses a decimal string, substituting zero (and logging) on failure.
    #[must_use]
    pub fn parse_or_zero(input: &str) -> Self {
        match Self::parse(input) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(%err, "unparsable amount coerced to zero");
                Self::ZERO
            }
        }
    }

    /// The normalised mantissa (`1 <= |m| < 10`, or 0).
    #[inline]
    #[must_use]
    pub const fn mantissa(self) -> f64 {
        self.mantissa
    }

    /// The base-10 exponent.
    #[inline]
    #[must_use]
    pub const fn exponent(self) -> i64 {
        self.exponent
    }

    /// Returns true if this value is zero.
    #[inline]
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.mantissa == 0.0
    }

    /// Returns true if strictly greater than zero.
    #[inline]
    #[must_use]
    pub fn is_positive(self) -> bool {
        self.mantissa > 0.0
    }

    /// Returns true if strictly less than zero.
    #[inline]
    #[must_use]
    pub fn is_negative(self) -> bool {
        self.mantissa < 0.0
    }

    /// Returns true for `INFINITY` and `NEG_INFINITY`.
    #[inline]
    #[must_use]
    pub fn is_infinite(self) -> bool {
        self.mantissa.is_infinite()
    }

    /// Returns true if the value has no fractional part.
    #[must_use]
    pub fn is_integer(self) -> bool {
        self.floor() == self
    }

    /// -1, 0 or 1.
    #[inline]
    #[must_use]
    pub fn signum(self) -> i8 {
        if self.mantissa > 0.0 {
            1
        } else if self.mantissa < 0.0 {
            -1
        } else {
            0
        }
    }

    /// Absolute value.
    #[must_use]
    pub fn abs(self) -> Self {
        Self {
            mantissa: self.mantissa.abs(),
            exponent: self.exponent,
        }
    }

    /// Raises to a plain-number power.
    ///
    /// A non-finite exponent falls back to 1. A negative base with a
    /// fractional exponent has no real result and yields zero, as does
    /// zero raised to a negative power.
    #[must_use]
    pub fn pow(self, exponent: f64) -> Self {
        let p = if exponent.is_finite() {
            exponent
        } else {
            tracing::warn!(exponent, "non-finite power exponent replaced by 1");
            1.0
        };

        if p == 0.0 {
            return Self::ONE;
        }
        if p == 1.0 || (self.is_zero() && p > 0.0) {
            return self;
        }
        if self.is_zero() {
            return Self::ZERO;
        }

        let negative = self.is_negative();
        if negative && p.fract() != 0.0 {
            tracing::warn!(power = p, "fractional power of a negative amount");
            return Self::ZERO;
        }
        let odd = negative && (p % 2.0).abs() == 1.0;

        if self.is_infinite() {
            return match (p > 0.0, odd) {
                (false, _) => Self::ZERO,
                (true, true) => Self::NEG_INFINITY,
                (true, false) => Self::INFINITY,
            };
        }

        // Inside f64 range the native power is the most accurate path.
        let native = self.to_f64();
        if native.is_finite() && native != 0.0 {
            let direct = native.powf(p);
            if direct.is_finite() && direct.abs() > 1e-290 && direct.abs() < 1e290 {
                return Self::from_f64(direct);
            }
        }

        let whole = p * self.exponent as f64;
        let whole_floor = whole.floor();
        let rest = (whole - whole_floor) + p * self.mantissa.abs().log10();
        let rest_floor = rest.floor();
        let exponent = whole_floor + rest_floor;

        if !exponent.is_finite() || exponent > MAX_EXPONENT as f64 {
            return if odd { Self::NEG_INFINITY } else { Self::INFINITY };
        }
        if exponent < -(MAX_EXPONENT as f64) {
            return Self::ZERO;
        }

        let mantissa = 10f64.powf(rest - rest_floor);
        Self::from_parts(if odd { -mantissa } else { mantissa }, exponent as i64)
    }

    /// Base-10 logarithm. `-inf` for zero, `NaN` for negatives.
    #[must_use]
    pub fn log10(self) -> f64 {
        if self.is_zero() {
            f64::NEG_INFINITY
        } else if self.is_negative() {
            f64::NAN
        } else if self.is_infinite() {
            f64::INFINITY
        } else {
            self.mantissa.log10() + self.exponent as f64
        }
    }

    /// Natural logarithm.
    #[must_use]
    pub fn ln(self) -> f64 {
        self.log10() * std::f64::consts::LN_10
    }

    /// Base-2 logarithm.
    #[must_use]
    pub fn log2(self) -> f64 {
        self.log10() / std::f64::consts::LOG10_2
    }

    /// Largest whole number not greater than `self`.
    #[must_use]
    pub fn floor(self) -> Self {
        self.round_with(f64::floor)
    }

    /// Smallest whole number not less than `self`.
    #[must_use]
    pub fn ceil(self) -> Self {
        self.round_with(f64::ceil)
    }

    /// Nearest whole number, half away from zero.
    #[must_use]
    pub fn round(self) -> Self {
        self.round_with(f64::round)
    }

    fn round_with(self, op: fn(f64) -> f64) -> Self {
        if self.is_zero() || self.is_infinite() || self.exponent >= INTEGRAL_EXPONENT {
            return self;
        }
        if self.exponent < -1 {
            // |v| < 0.1: the result is -1, 0 or 1.
            return Self::from_f64(op(self.mantissa.signum() * 0.05));
        }
        let value = self.to_f64();
        let nearest = value.round();
        if (value - nearest).abs() <= value.abs() * NEAR_INTEGER {
            return Self::from_f64(nearest);
        }
        Self::from_f64(op(value))
    }

    /// Converts to `f64`, saturating to `±inf` or 0 outside its range.
    #[must_use]
    pub fn to_f64(self) -> f64 {
        if self.is_zero() || self.is_infinite() {
            return self.mantissa;
        }
        if self.exponent > 308 {
            return self.mantissa.signum() * f64::INFINITY;
        }
        if self.exponent < -324 {
            return 0.0;
        }
        scale10(self.mantissa, self.exponent)
    }

    /// Lossless decimal string, the persistence form.
    ///
    /// Moderate magnitudes print as plain decimals (`"1234.5"`), the rest in
    /// scientific form (`"1.5e300"`). [`Amount::parse`] restores the exact
    /// same value.
    #[must_use]
    pub fn to_decimal_string(self) -> String {
        if self.is_zero() {
            return "0".to_string();
        }
        if self.is_infinite() {
            return if self.is_positive() { "inf" } else { "-inf" }.to_string();
        }

        let sign = if self.is_negative() { "-" } else { "" };
        let mantissa = self.mantissa.abs();
        if !(-7..=20).contains(&self.exponent) {
            return format!("{sign}{mantissa}e{}", self.exponent);
        }

        let digits: String = format!("{mantissa}")
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        let body = if self.exponent >= 0 {
            let int_len = (self.exponent + 1) as usize;
            if digits.len() <= int_len {
                format!("{digits}{}", "0".repeat(int_len - digits.len()))
            } else {
                format!("{}.{}", &digits[..int_len], &digits[int_len..])
            }
        } else {
            let zeros = (-self.exponent - 1) as usize;
            format!("0.{}{digits}", "0".repeat(zeros))
        };
        format!("{sign}{body}")
    }

    /// Human-readable rendering for display.
    ///
    /// Bands by magnitude: below 1e-6 and from 1e9 up use `1.23e9` style,
    /// below 0.01 shows up to six fraction digits, below 1000 up to two,
    /// and everything in between is a whole number with thousands
    /// separators.
    #[must_use]
    pub fn format(self) -> String {
        if self.is_zero() {
            return "0".to_string();
        }
        if self.is_infinite() {
            return if self.is_positive() { "∞" } else { "-∞" }.to_string();
        }

        let sign = if self.is_negative() { "-" } else { "" };
        let abs = self.abs();

        if abs.exponent < -6 || abs.exponent >= 9 {
            return format!("{sign}{}", abs.format_scientific());
        }

        let value = abs.to_f64();
        if abs.exponent < -2 {
            return format!("{sign}{}", trim_fraction(&format!("{value:.6}")));
        }
        if abs.exponent < 3 {
            let fixed = trim_fraction(&format!("{value:.2}"));
            if fixed != "1000" {
                return format!("{sign}{fixed}");
            }
        }
        let whole = value.round();
        if whole >= 1e9 {
            return format!("{sign}{}", Self::from_f64(whole).format_scientific());
        }
        format!("{sign}{}", group_thousands(whole as u64))
    }

    /// `1.23e9` style with at most two fraction digits.
    fn format_scientific(self) -> String {
        let mut mantissa = (self.mantissa * 100.0).round() / 100.0;
        let mut exponent = self.exponent;
        if mantissa >= 10.0 {
            mantissa /= 10.0;
            exponent += 1;
        }
        format!("{}e{exponent}", trim_fraction(&format!("{mantissa:.2}")))
    }
}

/// Strips trailing fraction zeros and a dangling decimal point.
fn trim_fraction(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl Default for Amount {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Amount {}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> Ordering {
        let (sa, sb) = (self.signum(), other.signum());
        if sa != sb {
            return sa.cmp(&sb);
        }
        if sa == 0 {
            return Ordering::Equal;
        }
        match (self.is_infinite(), other.is_infinite()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return if sa > 0 { Ordering::Greater } else { Ordering::Less },
            (false, true) => return if sa > 0 { Ordering::Less } else { Ordering::Greater },
            (false, false) => {}
        }
        let by_exponent = if sa > 0 {
            self.exponent.cmp(&other.exponent)
        } else {
            other.exponent.cmp(&self.exponent)
        };
        by_exponent.then_with(|| self.mantissa.total_cmp(&other.mantissa))
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        if self.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return self;
        }
        match (self.is_infinite(), rhs.is_infinite()) {
            (true, true) if self.signum() != rhs.signum() => return Self::ZERO,
            (true, _) => return self,
            (false, true) => return rhs,
            (false, false) => {}
        }

        if let (Some(a), Some(b)) = (self.as_exact_integer(), rhs.as_exact_integer()) {
            return Self::from_integer(a + b);
        }

        let (big, small) = if self.exponent >= rhs.exponent {
            (self, rhs)
        } else {
            (rhs, self)
        };
        let gap = big.exponent - small.exponent;
        if gap > MAX_SIGNIFICANT_DIGITS {
            return big;
        }
        // Round at the larger operand's scale before normalising, so
        // cancellation cannot promote float noise into significant digits.
        let sum = big.mantissa + scale10(small.mantissa, -gap);
        Self::from_parts((sum * MANTISSA_SCALE).round() / MANTISSA_SCALE, big.exponent)
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        self + (-rhs)
    }
}

impl Mul for Amount {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        if self.is_zero() || rhs.is_zero() {
            return Self::ZERO;
        }
        if self.is_infinite() || rhs.is_infinite() {
            return if self.signum() == rhs.signum() {
                Self::INFINITY
            } else {
                Self::NEG_INFINITY
            };
        }
        if let (Some(a), Some(b)) = (self.as_exact_integer(), rhs.as_exact_integer()) {
            if let Some(product) = a.checked_mul(b) {
                return Self::from_integer(product);
            }
        }
        Self::from_parts(
            self.mantissa * rhs.mantissa,
            self.exponent.saturating_add(rhs.exponent),
        )
    }
}

impl Div for Amount {
    type Output = Self;

    /// Division by zero yields zero.
    fn div(self, rhs: Self) -> Self::Output {
        if rhs.is_zero() || self.is_zero() || rhs.is_infinite() {
            return Self::ZERO;
        }
        if self.is_infinite() {
            return if self.signum() == rhs.signum() {
                Self::INFINITY
            } else {
                Self::NEG_INFINITY
            };
        }
        Self::from_parts(
            self.mantissa / rhs.mantissa,
            self.exponent.saturating_sub(rhs.exponent),
        )
    }
}

impl Neg for Amount {
    type Output = Self;

    fn neg(self) -> Self::Output {
        if self.is_zero() {
            return self;
        }
        Self {
            mantissa: -self.mantissa,
            exponent: self.exponent,
        }
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for Amount {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl DivAssign for Amount {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}

impl Product for Amount {
    fn product<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ONE, |acc, x| acc * x)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Amount {
                fn from(value: $t) -> Self {
                    i64::try_from(value).map_or_else(|_| Self::from_f64(value as f64), Self::from_integer)
                }
            }
        )*
    };
}

impl_from_int!(i32, i64, u32, u64, usize);

impl FromStr for Amount {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.to_decimal_string())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Amount::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Amount::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Amount::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if v.is_finite() {
            Ok(Amount::from_f64(v))
        } else {
            Err(E::custom("amount must be finite"))
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(s: &str) -> Amount {
        Amount::parse(s).unwrap()
    }

    fn close(a: Amount, b: f64) -> bool {
        (a.to_f64() - b).abs() <= 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn test_normalisation() {
        let v = Amount::from(1500);
        assert_eq!(v.mantissa(), 1.5);
        assert_eq!(v.exponent(), 3);
        assert_eq!(Amount::from_f64(0.25).exponent(), -1);
        assert_eq!(Amount::ZERO.exponent(), 0);
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(amt("123.45"), Amount::from_f64(123.45));
        assert_eq!(amt("-42"), Amount::from(-42));
        assert_eq!(amt("+7"), Amount::from(7));
        assert_eq!(amt("1.5e300").exponent(), 300);
        assert_eq!(amt("0.000"), Amount::ZERO);
        assert_eq!(amt(".5"), Amount::from_f64(0.5));
        assert_eq!(amt("inf"), Amount::INFINITY);

        let long = format!("1{}", "0".repeat(400));
        assert_eq!(amt(&long).exponent(), 400);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Amount::parse("").is_err());
        assert!(Amount::parse("abc").is_err());
        assert!(Amount::parse("1.2.3").is_err());
        assert!(Amount::parse("1e").is_err());
        assert!(Amount::parse("-").is_err());
        assert_eq!(Amount::parse_or_zero("twelve"), Amount::ZERO);
    }

    #[test]
    fn test_decimal_string_round_trip() {
        for text in ["0", "1", "1234.5", "0.001", "-17.25", "1.2345678901234567e100", "9.99e-50"] {
            let v = amt(text);
            assert_eq!(amt(&v.to_decimal_string()), v, "{text}");
        }
        assert_eq!(amt("1234.5").to_decimal_string(), "1234.5");
        assert_eq!(amt("1e21").to_decimal_string(), "1e21");
        assert_eq!(amt("2500").to_decimal_string(), "2500");
        assert_eq!(amt("0.0005").to_decimal_string(), "0.0005");
    }

    #[test]
    fn test_arithmetic() {
        assert!(close(Amount::from(2) + Amount::from(3), 5.0));
        assert!(close(Amount::from(2) - Amount::from(3), -1.0));
        assert!(close(Amount::from(6) * Amount::from_f64(0.5), 3.0));
        assert!(close(Amount::from(7) / Amount::from(2), 3.5));
        assert_eq!(Amount::from(5) - Amount::from(5), Amount::ZERO);
    }

    #[test]
    fn test_magnitude_beyond_f64() {
        let big = amt("1e300");
        let huge = big * big;
        assert_eq!(huge.exponent(), 600);
        assert!(huge > big);
        assert_eq!((huge / big), big);
        // Adding something 30 orders of magnitude smaller changes nothing.
        assert_eq!(huge + amt("1e570"), huge);
    }

    #[test]
    fn test_decimal_arithmetic_is_canonical() {
        assert_eq!(Amount::from(15) - Amount::from(12), Amount::from(3));
        assert_eq!(Amount::from_f64(0.1) + Amount::from_f64(0.2), Amount::from_f64(0.3));
        assert_eq!(Amount::from(3) * Amount::from(7), Amount::from(21));
        assert_eq!((Amount::from(999_999) / Amount::from(3)).floor(), Amount::from(333_333));
        assert!((Amount::from(999_999) / Amount::from(3)).is_integer());
    }

    #[test]
    fn test_cancellation_stays_canonical() {
        assert_eq!(Amount::from(903) - Amount::from(900), Amount::from(3));
        assert_eq!(Amount::from(1001) - Amount::from(1000), Amount::ONE);
        assert_eq!(Amount::from(100_007) - Amount::from(100_000), Amount::from(7));
        assert_eq!(amt("9.03") - Amount::from(9), amt("0.03"));
        assert_eq!(amt("1000.25") - amt("999.5"), amt("0.75"));
        assert_eq!(amt("903.5") - amt("900.5"), Amount::from(3));
        assert_eq!(amt("1.5e20") - amt("1.4e20"), amt("1e19"));
    }

    #[test]
    fn test_whole_numbers_past_1e15_stay_exact() {
        let big = amt("1000000000000000");
        assert_ne!(big + Amount::ONE, big);
        assert_eq!(big + Amount::ONE - big, Amount::ONE);
        assert_eq!(big + Amount::ONE, amt("1000000000000001"));
        assert_eq!(Amount::from(4_503_599_627_370_497_i64) - Amount::from(4_503_599_627_370_496_i64), Amount::ONE);
        assert_eq!(Amount::from(3_000_000_000_000_001_i64) * Amount::from(2), amt("6000000000000002"));

        let owned = Amount::from(7_999_999_999_999_999_i64);
        assert_eq!(amt(&owned.to_decimal_string()), owned);
        assert_eq!(owned.to_decimal_string(), "7999999999999999");
    }

    #[test]
    fn test_division_by_zero_is_zero() {
        assert_eq!(Amount::from(10) / Amount::ZERO, Amount::ZERO);
    }

    #[test]
    fn test_pow() {
        assert!(close(Amount::from(2).pow(10.0), 1024.0));
        assert!(close(Amount::from_f64(1.05).pow(9.0), 1.05f64.powi(9)));
        assert_eq!(Amount::from(10).pow(500.0).exponent(), 500);
        assert_eq!(Amount::from(7).pow(f64::NAN), Amount::from(7));
        assert_eq!(Amount::from(7).pow(0.0), Amount::ONE);
        assert_eq!(Amount::from(-8).pow(0.5), Amount::ZERO);
        assert!(close(Amount::from(-2).pow(3.0), -8.0));
        assert_eq!(Amount::ZERO.pow(-1.0), Amount::ZERO);
    }

    #[test]
    fn test_big_pow_precision() {
        // 1.05^100000 = 10^(100000 * log10 1.05)
        let v = Amount::from_f64(1.05).pow(100_000.0);
        let expected = 100_000.0 * 1.05f64.log10();
        assert!((v.log10() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_ordering() {
        let mut values = vec![
            Amount::from(5),
            Amount::from(-3),
            amt("1e40"),
            Amount::ZERO,
            amt("-1e40"),
            Amount::from_f64(0.5),
        ];
        values.sort();
        assert_eq!(values[0], amt("-1e40"));
        assert_eq!(values[1], Amount::from(-3));
        assert_eq!(values[2], Amount::ZERO);
        assert_eq!(values[5], amt("1e40"));
        assert!(Amount::INFINITY > amt("1e9000"));
        assert_eq!(Amount::from(3).max(Amount::from(4)), Amount::from(4));
        assert_eq!(Amount::from(3).min(Amount::from(4)), Amount::from(3));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(Amount::from_f64(8.7).floor(), Amount::from(8));
        assert_eq!(Amount::from_f64(8.2).ceil(), Amount::from(9));
        assert_eq!(Amount::from_f64(8.5).round(), Amount::from(9));
        assert_eq!(Amount::from_f64(-1.5).floor(), Amount::from(-2));
        assert_eq!(Amount::from_f64(0.03).floor(), Amount::ZERO);
        assert_eq!(Amount::from_f64(0.03).ceil(), Amount::ONE);
        assert_eq!(Amount::from_f64(-0.03).floor(), Amount::from(-1));
        assert_eq!(amt("1.5e40").floor(), amt("1.5e40"));
        assert!(Amount::from(12).is_integer());
        assert!(!Amount::from_f64(12.5).is_integer());
    }

    #[test]
    fn test_logarithms() {
        assert!((Amount::from(1000).log10() - 3.0).abs() < 1e-12);
        assert!((Amount::from(8).log2() - 3.0).abs() < 1e-12);
        assert!((amt("1e500").ln() - 500.0 * std::f64::consts::LN_10).abs() < 1e-9);
        assert!(Amount::ZERO.log10().is_infinite());
        assert!(Amount::from(-1).ln().is_nan());
    }

    #[test]
    fn test_format_bands() {
        assert_eq!(Amount::ZERO.format(), "0");
        assert_eq!(amt("0.0000001234").format(), "1.23e-7");
        assert_eq!(amt("0.001234").format(), "0.001234");
        assert_eq!(amt("12.5").format(), "12.5");
        assert_eq!(amt("3").format(), "3");
        assert_eq!(amt("999.999").format(), "1,000");
        assert_eq!(amt("12345.6").format(), "12,346");
        assert_eq!(amt("1234567890").format(), "1.23e9");
        assert_eq!(amt("999999999.6").format(), "1e9");
        assert_eq!(amt("999999999.4").format(), "999,999,999");
        assert_eq!(amt("9.999e20").format(), "1e21");
        assert_eq!(amt("-2500").format(), "-2,500");
    }

    #[test]
    fn test_serde_string_form() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            value: Amount,
        }
        let text = toml::to_string(&Wrapper { value: amt("1.5e120") }).unwrap();
        assert!(text.contains("\"1.5e120\""));
        let back: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(back.value, amt("1.5e120"));

        let from_int: Wrapper = toml::from_str("value = 250").unwrap();
        assert_eq!(from_int.value, Amount::from(250));
        let from_float: Wrapper = toml::from_str("value = 1.15").unwrap();
        assert_eq!(from_float.value, Amount::from_f64(1.15));
    }

    #[test]
    fn test_sum_and_product() {
        let values = [Amount::from(2), Amount::from(3), Amount::from(4)];
        assert_eq!(values.iter().copied().sum::<Amount>(), Amount::from(9));
        assert_eq!(values.iter().copied().product::<Amount>(), Amount::from(24));
    }
}
