//! Exact rational arithmetic for numeric keywords
//!
//! JSON numbers are read from their decimal text, so `0.1` is exactly
//! `1/10` and `multipleOf` reasoning never suffers binary rounding.
//! Every operation is checked; `None` means the magnitude left the `i128`
//! range and the caller must give up on an exact answer.

use regex::Regex;
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::sync::OnceLock;

fn decimal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(-)?(\d+)(?:\.(\d+))?(?:[eE]([+-]?\d+))?$").expect("decimal pattern compiles")
    })
}

/// A reduced fraction with a positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    num: i128,
    den: i128,
}

fn gcd(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a as i128
}

fn pow10(exp: u32) -> Option<i128> {
    10i128.checked_pow(exp)
}

impl Rational {
    pub const ZERO: Rational = Rational { num: 0, den: 1 };
    pub const ONE: Rational = Rational { num: 1, den: 1 };

    pub fn new(num: i128, den: i128) -> Option<Self> {
        if den == 0 {
            return None;
        }
        let g = gcd(num, den).max(1);
        let (mut num, mut den) = (num / g, den / g);
        if den < 0 {
            num = num.checked_neg()?;
            den = den.checked_neg()?;
        }
        Some(Self { num, den })
    }

    pub fn integer(value: i128) -> Self {
        Self { num: value, den: 1 }
    }

    /// Exact value of a JSON number, read from its shortest decimal form.
    pub fn from_number(number: &Number) -> Option<Self> {
        if let Some(i) = number.as_i64() {
            return Some(Self::integer(i as i128));
        }
        if let Some(u) = number.as_u64() {
            return Some(Self::integer(u as i128));
        }
        Self::parse_decimal(&number.to_string())
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_number().and_then(Self::from_number)
    }

    pub fn parse_decimal(text: &str) -> Option<Self> {
        let caps = decimal_pattern().captures(text.trim())?;
        let negative = caps.get(1).is_some();
        let int_part = caps.get(2).map(|m| m.as_str()).unwrap_or("0");
        let frac_part = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        let exp: i64 = match caps.get(4) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };

        let digits = format!("{}{}", int_part, frac_part);
        let digits = digits.trim_start_matches('0');
        let mut mantissa: i128 = if digits.is_empty() { 0 } else { digits.parse().ok()? };
        if negative {
            mantissa = -mantissa;
        }
        if mantissa == 0 {
            return Some(Self::ZERO);
        }

        let scale = exp - frac_part.len() as i64;
        if scale >= 0 {
            let factor = pow10(u32::try_from(scale).ok()?)?;
            Some(Self::integer(mantissa.checked_mul(factor)?))
        } else {
            let den = pow10(u32::try_from(-scale).ok()?)?;
            Self::new(mantissa, den)
        }
    }

    pub fn numer(&self) -> i128 {
        self.num
    }

    pub fn denom(&self) -> i128 {
        self.den
    }

    pub fn is_integer(&self) -> bool {
        self.den == 1
    }

    pub fn is_positive(&self) -> bool {
        self.num > 0
    }

    pub fn checked_add(&self, other: &Rational) -> Option<Rational> {
        let num = self
            .num
            .checked_mul(other.den)?
            .checked_add(other.num.checked_mul(self.den)?)?;
        Rational::new(num, self.den.checked_mul(other.den)?)
    }

    pub fn checked_mul_int(&self, k: i128) -> Option<Rational> {
        Rational::new(self.num.checked_mul(k)?, self.den)
    }

    /// Least common multiple of two positive rationals: the smallest
    /// positive value that both divide into a whole number of times.
    pub fn lcm(&self, other: &Rational) -> Option<Rational> {
        if !self.is_positive() || !other.is_positive() {
            return None;
        }
        let g = gcd(self.num, other.num);
        let num = (self.num / g).checked_mul(other.num)?;
        Rational::new(num, gcd(self.den, other.den))
    }

    /// Numerator and denominator of `self / step`, with a positive denominator.
    fn ratio(&self, step: &Rational) -> Option<(i128, i128)> {
        if !step.is_positive() {
            return None;
        }
        Some((self.num.checked_mul(step.den)?, self.den.checked_mul(step.num)?))
    }

    /// Whether `self / step` is a whole number.
    pub fn is_multiple_of(&self, step: &Rational) -> Option<bool> {
        let (n, d) = self.ratio(step)?;
        Some(n % d == 0)
    }

    /// `floor(self / step)`
    pub fn div_floor(&self, step: &Rational) -> Option<i128> {
        let (n, d) = self.ratio(step)?;
        Some(n.div_euclid(d))
    }

    /// `ceil(self / step)`
    pub fn div_ceil(&self, step: &Rational) -> Option<i128> {
        let (n, d) = self.ratio(step)?;
        let floor = n.div_euclid(d);
        Some(if n.rem_euclid(d) == 0 { floor } else { floor.checked_add(1)? })
    }

    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// JSON rendering: integers stay integers, fractions become floats.
    pub fn to_json(&self) -> Value {
        if self.den == 1 {
            if let Ok(i) = i64::try_from(self.num) {
                return Value::from(i);
            }
        }
        Number::from_f64(self.to_f64())
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.num.checked_mul(other.den), other.num.checked_mul(self.den)) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self
                .to_f64()
                .partial_cmp(&other.to_f64())
                .unwrap_or(Ordering::Equal),
        }
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
