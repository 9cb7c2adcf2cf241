//! Exact decimal numbers for key identity and ordering.
//!
//! A number is held as a sign, its significant digits (no leading or
//! trailing zeros) and a decimal exponent: `0.d1d2..dn * 10^exponent`.
//! Zero has no digits.

use std::cmp::Ordering;
use std::fmt;

/// Most significant digits a stored number may carry.
pub const MAX_PRECISION: usize = 38;

// 0.1e-129 = 1e-130 is the smallest magnitude; 1e126 is out of range.
const MIN_EXPONENT: i64 = -129;
const MAX_EXPONENT: i64 = 126;

/// A finite decimal number in the service's range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Number {
    negative: bool,
    digits: String,
    exponent: i64,
}

impl Number {
    /// Parses a decimal literal `[+-]digits[.digits][(e|E)[+-]digits]`.
    ///
    /// Returns `None` for anything else (including `NaN` and infinities),
    /// for more than 38 significant digits and for magnitudes outside
    /// 1e-130 to below 1e126.
    pub fn parse(literal: &str) -> Option<Self> {
        let literal = literal.trim();
        let (negative, rest) = match literal.as_bytes().first()? {
            b'-' => (true, &literal[1..]),
            b'+' => (false, &literal[1..]),
            _ => (false, literal),
        };

        let (mantissa, exponent) = match rest.find(['e', 'E']) {
            Some(at) => (&rest[..at], parse_exponent(&rest[at + 1..])?),
            None => (rest, 0),
        };
        let (integral, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if integral.is_empty() && fraction.is_empty() {
            return None;
        }
        if !integral
            .bytes()
            .chain(fraction.bytes())
            .all(|b| b.is_ascii_digit())
        {
            return None;
        }

        let all = format!("{integral}{fraction}");
        let significant = all.trim_start_matches('0');
        let leading = all.len() - significant.len();
        let digits = significant.trim_end_matches('0');
        if digits.is_empty() {
            return Some(Self::zero());
        }
        if digits.len() > MAX_PRECISION {
            return None;
        }

        let exponent = i64::try_from(integral.len())
            .ok()?
            .checked_sub(i64::try_from(leading).ok()?)?
            .checked_add(exponent)?;
        if !(MIN_EXPONENT..=MAX_EXPONENT).contains(&exponent) {
            return None;
        }

        Some(Self {
            negative,
            digits: digits.to_string(),
            exponent,
        })
    }

    pub fn zero() -> Self {
        Self {
            negative: false,
            digits: String::new(),
            exponent: 0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.digits.is_empty()
    }

    fn signum(&self) -> i8 {
        match (self.is_zero(), self.negative) {
            (true, _) => 0,
            (false, true) => -1,
            (false, false) => 1,
        }
    }

    fn cmp_magnitude(&self, other: &Self) -> Ordering {
        // Digit strings share the implied leading point, so bytes order them.
        self.exponent
            .cmp(&other.exponent)
            .then_with(|| self.digits.as_bytes().cmp(other.digits.as_bytes()))
    }
}

fn parse_exponent(raw: &str) -> Option<i64> {
    let unsigned = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.signum().cmp(&other.signum()) {
            Ordering::Equal => match self.signum() {
                0 => Ordering::Equal,
                1 => self.cmp_magnitude(other),
                _ => other.cmp_magnitude(self),
            },
            unequal => unequal,
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        let sign = if self.negative { "-" } else { "" };
        write!(f, "{sign}0.{}e{}", self.digits, self.exponent)
    }
}
