//! Numeric values with the coercion and promotion rules shared by
//! [`Value`](crate::Value) accessors, INCREMENT and comparison.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use bigdecimal::num_bigint::BigInt;
use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive, Zero};

/// One of the six numeric representations a [`Value`](crate::Value) can hold.
#[derive(Debug, Clone)]
pub enum Number {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    BigInt(BigInt),
    Decimal(BigDecimal),
}

impl Number {
    /// Parses text as the narrowest representation that holds it.
    ///
    /// Attempts, in order: `i32`, `i64`, `f32`, `f64`, big integer, big
    /// decimal. A floating-point form is only taken when it reproduces the
    /// text's decimal value, so `"0.5"` is a `Float` but
    /// `"123456789012345678901234567890"` falls through to `BigInt`.
    ///
    /// ```
    /// use dbz_core::Number;
    ///
    /// assert!(matches!(Number::parse("42"), Some(Number::Int(42))));
    /// assert!(matches!(Number::parse("4294967296"), Some(Number::Long(_))));
    /// assert!(matches!(Number::parse("0.5"), Some(Number::Float(_))));
    /// assert!(matches!(Number::parse("1.23456789"), Some(Number::Double(_))));
    /// assert!(Number::parse("forty-two").is_none());
    /// ```
    pub fn parse(text: &str) -> Option<Number> {
        if let Ok(v) = text.parse::<i32>() {
            return Some(Number::Int(v));
        }
        if let Ok(v) = text.parse::<i64>() {
            return Some(Number::Long(v));
        }
        let exact = BigDecimal::from_str(text).ok()?;
        if let Ok(v) = text.parse::<f32>() {
            if v.is_finite() && reproduces(v, &exact) {
                return Some(Number::Float(v));
            }
        }
        if let Ok(v) = text.parse::<f64>() {
            if v.is_finite() && reproduces(v, &exact) {
                return Some(Number::Double(v));
            }
        }
        if let Ok(v) = BigInt::from_str(text) {
            return Some(Number::BigInt(v));
        }
        Some(Number::Decimal(exact))
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, Number::Int(_) | Number::Long(_) | Number::BigInt(_))
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Number::Int(v) => *v == 0,
            Number::Long(v) => *v == 0,
            Number::Float(v) => *v == 0.0,
            Number::Double(v) => *v == 0.0,
            Number::BigInt(v) => v.is_zero(),
            Number::Decimal(v) => v.is_zero(),
        }
    }

    // ── Conversions ──────────────────────────────────────────────────────
    //
    // Integral narrowing wraps like `as`; big values saturate.

    pub fn to_i32(&self) -> i32 {
        match self {
            Number::Int(v) => *v,
            Number::Float(v) => *v as i32,
            Number::Double(v) => *v as i32,
            other => other.to_i64() as i32,
        }
    }

    pub fn to_i64(&self) -> i64 {
        match self {
            Number::Int(v) => i64::from(*v),
            Number::Long(v) => *v,
            Number::Float(v) => *v as i64,
            Number::Double(v) => *v as i64,
            Number::BigInt(v) => v.to_i64().unwrap_or_else(|| saturate(v < &BigInt::zero())),
            Number::Decimal(v) => v
                .to_i64()
                .unwrap_or_else(|| saturate(v < &BigDecimal::zero())),
        }
    }

    pub fn to_f32(&self) -> f32 {
        match self {
            Number::Float(v) => *v,
            other => other.to_f64() as f32,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Int(v) => f64::from(*v),
            Number::Long(v) => *v as f64,
            Number::Float(v) => f64::from(*v),
            Number::Double(v) => *v,
            Number::BigInt(v) => v.to_f64().unwrap_or(f64::NAN),
            Number::Decimal(v) => v.to_f64().unwrap_or(f64::NAN),
        }
    }

    /// Converts to a big integer, truncating any fraction. Non-finite
    /// floats have no integer form.
    pub fn to_big_int(&self) -> Option<BigInt> {
        match self {
            Number::Int(v) => Some(BigInt::from(*v)),
            Number::Long(v) => Some(BigInt::from(*v)),
            Number::Float(v) => BigInt::from_f32(v.trunc()),
            Number::Double(v) => BigInt::from_f64(v.trunc()),
            Number::BigInt(v) => Some(v.clone()),
            Number::Decimal(v) => Some(v.with_scale(0).into_bigint_and_exponent().0),
        }
    }

    /// Converts to a big decimal. Floats convert through their shortest
    /// decimal rendering, so `0.1f64` becomes exactly `0.1`.
    pub fn to_big_decimal(&self) -> Option<BigDecimal> {
        match self {
            Number::Int(v) => Some(BigDecimal::from(*v)),
            Number::Long(v) => Some(BigDecimal::from(*v)),
            Number::Float(v) if v.is_finite() => BigDecimal::from_str(&v.to_string()).ok(),
            Number::Double(v) if v.is_finite() => BigDecimal::from_str(&v.to_string()).ok(),
            Number::Float(_) | Number::Double(_) => None,
            Number::BigInt(v) => Some(BigDecimal::from(v.clone())),
            Number::Decimal(v) => Some(v.clone()),
        }
    }

    // ── Arithmetic ───────────────────────────────────────────────────────

    /// Adds two numbers, promoting the result as needed.
    ///
    /// Integral sums keep the wider operand's type and widen on overflow
    /// (`Int` → `Long` → `BigInt`). Any decimal operand yields a decimal.
    /// Otherwise the sum is a `Float` when only `Int`/`Float` are involved
    /// and a `Double` in every other case.
    ///
    /// ```
    /// use dbz_core::Number;
    ///
    /// assert!(matches!(Number::Int(i32::MAX).add(&Number::Int(1)), Number::Long(2147483648)));
    /// assert!(matches!(Number::Int(1).add(&Number::Double(0.5)), Number::Double(v) if v == 1.5));
    /// ```
    pub fn add(&self, other: &Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => match a.checked_add(*b) {
                Some(v) => Number::Int(v),
                None => Number::Long(i64::from(*a) + i64::from(*b)),
            },
            (Number::Int(_) | Number::Long(_), Number::Int(_) | Number::Long(_)) => {
                let (a, b) = (self.to_i64(), other.to_i64());
                match a.checked_add(b) {
                    Some(v) => Number::Long(v),
                    None => Number::BigInt(self.integral() + other.integral()),
                }
            }
            (a, b) if a.is_integral() && b.is_integral() => {
                Number::BigInt(self.integral() + other.integral())
            }
            (Number::Decimal(_), _) | (_, Number::Decimal(_)) => {
                match (self.to_big_decimal(), other.to_big_decimal()) {
                    (Some(a), Some(b)) => Number::Decimal(a + b),
                    _ => Number::Double(self.to_f64() + other.to_f64()),
                }
            }
            (Number::Float(_) | Number::Int(_), Number::Float(_) | Number::Int(_)) => {
                Number::Float(self.to_f32() + other.to_f32())
            }
            _ => Number::Double(self.to_f64() + other.to_f64()),
        }
    }

    fn integral(&self) -> BigInt {
        self.to_big_int().unwrap_or_default()
    }

    /// Total numeric ordering across representations.
    ///
    /// Every pair compares by exact value: floats take their exact binary
    /// value, not their shortest rendering, so `Double(0.1)` is not equal to
    /// `Decimal(0.1)`. Zeros are equal regardless of sign. Infinities sit
    /// at either end and NaN sorts above every other number and equals
    /// itself.
    pub fn compare(&self, other: &Number) -> Ordering {
        match (self, other) {
            (Number::Int(_) | Number::Long(_), Number::Int(_) | Number::Long(_)) => {
                self.to_i64().cmp(&other.to_i64())
            }
            (Number::Float(_) | Number::Double(_), Number::Float(_) | Number::Double(_)) => {
                let (a, b) = (self.to_f64(), other.to_f64());
                match a.partial_cmp(&b) {
                    Some(ordering) => ordering,
                    None => a.is_nan().cmp(&b.is_nan()),
                }
            }
            _ => self.exact().cmp(&other.exact()),
        }
    }

    fn exact(&self) -> Exact {
        let float = match self {
            Number::Int(v) => return Exact::Finite(BigDecimal::from(*v)),
            Number::Long(v) => return Exact::Finite(BigDecimal::from(*v)),
            Number::BigInt(v) => return Exact::Finite(BigDecimal::from(v.clone())),
            Number::Decimal(v) => return Exact::Finite(v.clone()),
            Number::Float(v) => f64::from(*v),
            Number::Double(v) => *v,
        };
        if float.is_nan() {
            Exact::NaN
        } else if float == f64::INFINITY {
            Exact::PosInfinity
        } else if float == f64::NEG_INFINITY {
            Exact::NegInfinity
        } else {
            Exact::Finite(exact_decimal(float))
        }
    }
}

/// Sort key for numeric comparison; variant order is the sort order.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum Exact {
    NegInfinity,
    Finite(BigDecimal),
    PosInfinity,
    NaN,
}

/// The exact value of a finite float.
fn exact_decimal(v: f64) -> BigDecimal {
    let bits = v.to_bits();
    let negative = bits >> 63 == 1;
    let biased = ((bits >> 52) & 0x7ff) as i64;
    let fraction = bits & ((1 << 52) - 1);
    let (mantissa, exponent) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1 << 52), biased - 1075)
    };
    let mut mantissa = BigInt::from(mantissa);
    if negative {
        mantissa = -mantissa;
    }
    if exponent >= 0 {
        BigDecimal::from(mantissa << exponent as usize)
    } else {
        // m * 2^-k == m * 5^k / 10^k
        let k = exponent.unsigned_abs() as u32;
        BigDecimal::new(mantissa * BigInt::from(5).pow(k), i64::from(k))
    }
}

fn saturate(negative: bool) -> i64 {
    if negative {
        i64::MIN
    } else {
        i64::MAX
    }
}

fn reproduces<F: fmt::Display>(value: F, exact: &BigDecimal) -> bool {
    BigDecimal::from_str(&value.to_string()).is_ok_and(|rendered| rendered == *exact)
}

impl PartialEq for Number {
    fn eq(&self, other: &Number) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Number) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Number) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{v}"),
            Number::Long(v) => write!(f, "{v}"),
            Number::Float(v) => write!(f, "{v}"),
            Number::Double(v) => write!(f, "{v}"),
            Number::BigInt(v) => write!(f, "{v}"),
            Number::Decimal(v) => write!(f, "{v}"),
        }
    }
}

impl From<i32> for Number {
    fn from(v: i32) -> Number {
        Number::Int(v)
    }
}

impl From<i64> for Number {
    fn from(v: i64) -> Number {
        Number::Long(v)
    }
}

impl From<f32> for Number {
    fn from(v: f32) -> Number {
        Number::Float(v)
    }
}

impl From<f64> for Number {
    fn from(v: f64) -> Number {
        Number::Double(v)
    }
}

impl From<BigInt> for Number {
    fn from(v: BigInt) -> Number {
        Number::BigInt(v)
    }
}

impl From<BigDecimal> for Number {
    fn from(v: BigDecimal) -> Number {
        Number::Decimal(v)
    }
}
