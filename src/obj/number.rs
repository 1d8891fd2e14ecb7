use num_bigint::BigInt;
use num_complex::Complex64;
use num_rational::Rational64;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::interp::RuntimeError;

/// The numeric tower. Binary operations promote both operands to the
/// wider variant before applying: Int < Big < Rational < Real < Complex.
/// Int arithmetic that overflows promotes to Big rather than wrapping.
#[derive(Debug, Clone)]
pub enum Number {
    Int(i64),
    Real(f64),
    Big(BigInt),
    Rational(Rational64),
    Complex(Complex64),
}

use Number::*;

type NumResult = Result<Number, RuntimeError>;

fn div_zero() -> RuntimeError {
    RuntimeError::Value("division by zero".to_string())
}

fn i64_gcd(mut a: i64, mut b: i64) -> i64 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn big_gcd(a: &BigInt, b: &BigInt) -> BigInt {
    let mut a = a.abs();
    let mut b = b.abs();
    while !b.is_zero() {
        let t = &a % &b;
        a = b;
        b = t;
    }
    a
}

/// Promotion rank; see the type-level doc for the ladder.
fn rank(n: &Number) -> u8 {
    match n {
        Int(_) => 0,
        Big(_) => 1,
        Rational(_) => 2,
        Real(_) => 3,
        Complex(_) => 4,
    }
}

impl Number {
    pub fn from_bool(b: bool) -> Number {
        Int(if b { 1 } else { 0 })
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Int(i) => *i as f64,
            Real(r) => *r,
            Big(b) => b.to_f64().unwrap_or(f64::INFINITY),
            Rational(r) => *r.numer() as f64 / *r.denom() as f64,
            Complex(c) => c.re,
        }
    }

    pub fn to_complex(&self) -> Complex64 {
        match self {
            Complex(c) => *c,
            other => Complex64::new(other.to_f64(), 0.0),
        }
    }

    /// Exact integer value, when this number is one. Reals qualify only
    /// when they have no fractional part.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Int(i) => Some(*i),
            Real(r) if r.fract() == 0.0 && r.is_finite() => Some(*r as i64),
            Big(b) => b.to_i64(),
            Rational(r) if r.is_integer() => Some(*r.numer()),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Int(i) => *i == 0,
            Real(r) => *r == 0.0,
            Big(b) => b.is_zero(),
            Rational(r) => r.is_zero(),
            Complex(c) => c.re == 0.0 && c.im == 0.0,
        }
    }

    fn as_big(&self) -> BigInt {
        match self {
            Int(i) => BigInt::from(*i),
            Big(b) => b.clone(),
            _ => unreachable!("as_big on non-integer variant"),
        }
    }

    fn as_rational(&self) -> Rational64 {
        match self {
            Int(i) => Rational64::from_integer(*i),
            Rational(r) => *r,
            _ => unreachable!("as_rational on non-rational variant"),
        }
    }

    /// Shrink Big back to Int when it fits; keeps literals round-tripping.
    fn norm_big(b: BigInt) -> Number {
        match b.to_i64() {
            Some(i) => Int(i),
            None => Big(b),
        }
    }

    pub fn add(&self, other: &Number) -> NumResult {
        Ok(match promote_pair(self, other) {
            Pair::Int(a, b) => match a.checked_add(b) {
                Some(v) => Int(v),
                None => Big(BigInt::from(a) + BigInt::from(b)),
            },
            Pair::Big(a, b) => Number::norm_big(a + b),
            Pair::Rational(a, b) => Rational(a + b),
            Pair::Real(a, b) => Real(a + b),
            Pair::Complex(a, b) => Complex(a + b),
        })
    }

    pub fn sub(&self, other: &Number) -> NumResult {
        Ok(match promote_pair(self, other) {
            Pair::Int(a, b) => match a.checked_sub(b) {
                Some(v) => Int(v),
                None => Big(BigInt::from(a) - BigInt::from(b)),
            },
            Pair::Big(a, b) => Number::norm_big(a - b),
            Pair::Rational(a, b) => Rational(a - b),
            Pair::Real(a, b) => Real(a - b),
            Pair::Complex(a, b) => Complex(a - b),
        })
    }

    pub fn mul(&self, other: &Number) -> NumResult {
        Ok(match promote_pair(self, other) {
            Pair::Int(a, b) => match a.checked_mul(b) {
                Some(v) => Int(v),
                None => Big(BigInt::from(a) * BigInt::from(b)),
            },
            Pair::Big(a, b) => Number::norm_big(a * b),
            Pair::Rational(a, b) => Rational(a * b),
            Pair::Real(a, b) => Real(a * b),
            Pair::Complex(a, b) => Complex(a * b),
        })
    }

    /// Int/Int stays Int when the division is exact, widens to Real
    /// otherwise.
    pub fn div(&self, other: &Number) -> NumResult {
        match promote_pair(self, other) {
            Pair::Int(a, b) => {
                if b == 0 {
                    Err(div_zero())
                } else if a % b == 0 {
                    Ok(Int(a / b))
                } else {
                    Ok(Real(a as f64 / b as f64))
                }
            }
            Pair::Big(a, b) => {
                if b.is_zero() {
                    Err(div_zero())
                } else if (&a % &b).is_zero() {
                    Ok(Number::norm_big(a / b))
                } else {
                    Ok(Real(a.to_f64().unwrap_or(f64::INFINITY) / b.to_f64().unwrap_or(f64::INFINITY)))
                }
            }
            Pair::Rational(a, b) => {
                if b.is_zero() {
                    Err(div_zero())
                } else {
                    Ok(Rational(a / b))
                }
            }
            Pair::Real(a, b) => Ok(Real(a / b)),
            Pair::Complex(a, b) => Ok(Complex(a / b)),
        }
    }

    /// Remainder with the sign of the dividend.
    pub fn rem(&self, other: &Number) -> NumResult {
        match promote_pair(self, other) {
            Pair::Int(a, b) => {
                if b == 0 {
                    Err(div_zero())
                } else {
                    Ok(Int(a % b))
                }
            }
            Pair::Big(a, b) => {
                if b.is_zero() {
                    Err(div_zero())
                } else {
                    Ok(Number::norm_big(a % b))
                }
            }
            Pair::Rational(a, b) => {
                if b.is_zero() {
                    Err(div_zero())
                } else {
                    Ok(Rational(a % b))
                }
            }
            Pair::Real(a, b) => Ok(Real(a % b)),
            Pair::Complex(_, _) => Err(RuntimeError::Value(
                "modulo is not defined for complex numbers".to_string(),
            )),
        }
    }

    /// Integer (floor) division.
    pub fn idiv(&self, other: &Number) -> NumResult {
        match promote_pair(self, other) {
            Pair::Int(a, b) => {
                if b == 0 {
                    Err(div_zero())
                } else {
                    Ok(Int(a.div_euclid(b)))
                }
            }
            Pair::Big(a, b) => {
                if b.is_zero() {
                    Err(div_zero())
                } else {
                    // Floored, matching the Int arm for negative operands.
                    Ok(Number::norm_big(num_integer::Integer::div_floor(&a, &b)))
                }
            }
            _ => {
                let b = other.to_f64();
                if b == 0.0 {
                    Err(div_zero())
                } else {
                    Ok(Real((self.to_f64() / b).floor()))
                }
            }
        }
    }

    pub fn pow(&self, other: &Number) -> NumResult {
        if let (Int(a), Int(b)) = (self, other) {
            if *b >= 0 && *b <= u32::MAX as i64 {
                return Ok(match a.checked_pow(*b as u32) {
                    Some(v) => Int(v),
                    None => Number::norm_big(num_traits::pow(BigInt::from(*a), *b as usize)),
                });
            }
        }
        if let (Complex(_), _) | (_, Complex(_)) = (self, other) {
            return Ok(Complex(self.to_complex().powc(other.to_complex())));
        }
        Ok(Real(self.to_f64().powf(other.to_f64())))
    }

    pub fn gcd(&self, other: &Number) -> NumResult {
        match promote_pair(self, other) {
            Pair::Int(a, b) => Ok(Int(i64_gcd(a, b))),
            Pair::Big(a, b) => Ok(Number::norm_big(big_gcd(&a, &b))),
            _ => Err(RuntimeError::Value(
                "gcd requires integer operands".to_string(),
            )),
        }
    }

    pub fn abs(&self) -> Number {
        match self {
            Int(i) => Int(i.abs()),
            Real(r) => Real(r.abs()),
            Big(b) => Big(b.abs()),
            Rational(r) => Rational(r.abs()),
            Complex(c) => Real(c.norm()),
        }
    }

    pub fn signum(&self) -> Number {
        match self {
            Int(i) => Int(i.signum()),
            Real(r) => Int(if *r > 0.0 {
                1
            } else if *r < 0.0 {
                -1
            } else {
                0
            }),
            Big(b) => Int(match b.sign() {
                num_bigint::Sign::Plus => 1,
                num_bigint::Sign::Minus => -1,
                num_bigint::Sign::NoSign => 0,
            }),
            Rational(r) => Int(if r.is_zero() {
                0
            } else if r.is_positive() {
                1
            } else {
                -1
            }),
            Complex(_) => Int(0),
        }
    }

    pub fn floor(&self) -> Number {
        match self {
            Int(_) | Big(_) => self.clone(),
            Real(r) => Real(r.floor()),
            Rational(r) => Int(*r.floor().numer()),
            Complex(c) => Complex(Complex64::new(c.re.floor(), c.im.floor())),
        }
    }

    pub fn ceil(&self) -> Number {
        match self {
            Int(_) | Big(_) => self.clone(),
            Real(r) => Real(r.ceil()),
            Rational(r) => Int(*r.ceil().numer()),
            Complex(c) => Complex(Complex64::new(c.re.ceil(), c.im.ceil())),
        }
    }

    pub fn factorial(&self) -> NumResult {
        let n = self.to_i64().ok_or_else(|| {
            RuntimeError::Value("factorial requires an integer".to_string())
        })?;
        if n < 0 {
            return Err(RuntimeError::Value(
                "factorial of a negative number".to_string(),
            ));
        }
        if n <= 20 {
            Ok(Int((2..=n).product()))
        } else {
            let mut acc = BigInt::from(1);
            for i in 2..=n {
                acc *= i;
            }
            Ok(Big(acc))
        }
    }

    /// Real and imaginary parts; plain numbers have imag 0.
    pub fn imag(&self) -> Number {
        match self {
            Complex(c) => Real(c.im),
            _ => Real(0.0),
        }
    }

    pub fn to_rational(&self) -> NumResult {
        match self {
            Rational(_) => Ok(self.clone()),
            Int(i) => Ok(Rational(Rational64::from_integer(*i))),
            Real(r) => Rational64::approximate_float(*r)
                .map(Rational)
                .ok_or_else(|| RuntimeError::Value(format!("cannot express {r} as a rational"))),
            _ => Err(RuntimeError::Value(
                "cannot convert to a rational".to_string(),
            )),
        }
    }

    // Unary float kernels. Complex inputs stay complex.
    pub fn sin(&self) -> Number {
        self.float_kernel(f64::sin, Complex64::sin)
    }
    pub fn cos(&self) -> Number {
        self.float_kernel(f64::cos, Complex64::cos)
    }
    pub fn tan(&self) -> Number {
        self.float_kernel(f64::tan, Complex64::tan)
    }
    pub fn asin(&self) -> Number {
        self.float_kernel(f64::asin, Complex64::asin)
    }
    pub fn acos(&self) -> Number {
        self.float_kernel(f64::acos, Complex64::acos)
    }
    pub fn atan(&self) -> Number {
        self.float_kernel(f64::atan, Complex64::atan)
    }
    pub fn exp(&self) -> Number {
        self.float_kernel(f64::exp, Complex64::exp)
    }
    pub fn ln(&self) -> Number {
        self.float_kernel(f64::ln, Complex64::ln)
    }
    pub fn log10(&self) -> Number {
        self.float_kernel(f64::log10, |c| c.ln() / Complex64::new(10.0f64.ln(), 0.0))
    }

    fn float_kernel(&self, f: fn(f64) -> f64, fc: fn(Complex64) -> Complex64) -> Number {
        match self {
            Complex(c) => Complex(fc(*c)),
            other => Real(f(other.to_f64())),
        }
    }

    /// Numeric equality across variants.
    pub fn num_eq(&self, other: &Number) -> bool {
        match promote_pair(self, other) {
            Pair::Int(a, b) => a == b,
            Pair::Big(a, b) => a == b,
            Pair::Rational(a, b) => a == b,
            Pair::Real(a, b) => a == b,
            Pair::Complex(a, b) => a == b,
        }
    }

    /// Ordering; None for complex operands.
    pub fn num_cmp(&self, other: &Number) -> Option<std::cmp::Ordering> {
        match promote_pair(self, other) {
            Pair::Int(a, b) => Some(a.cmp(&b)),
            Pair::Big(a, b) => Some(a.cmp(&b)),
            Pair::Rational(a, b) => Some(a.cmp(&b)),
            Pair::Real(a, b) => a.partial_cmp(&b),
            Pair::Complex(_, _) => None,
        }
    }
}

enum Pair {
    Int(i64, i64),
    Big(BigInt, BigInt),
    Rational(Rational64, Rational64),
    Real(f64, f64),
    Complex(Complex64, Complex64),
}

/// Promote both operands to the wider variant. Big mixed with Rational
/// widens to Real since Rational64 cannot hold arbitrary-width parts.
fn promote_pair(a: &Number, b: &Number) -> Pair {
    let r = rank(a).max(rank(b));
    match r {
        0 => match (a, b) {
            (Int(x), Int(y)) => Pair::Int(*x, *y),
            _ => unreachable!(),
        },
        1 => Pair::Big(a.as_big(), b.as_big()),
        2 => {
            if matches!(a, Big(_)) || matches!(b, Big(_)) {
                Pair::Real(a.to_f64(), b.to_f64())
            } else {
                Pair::Rational(a.as_rational(), b.as_rational())
            }
        }
        3 => Pair::Real(a.to_f64(), b.to_f64()),
        _ => Pair::Complex(a.to_complex(), b.to_complex()),
    }
}

/// Sieve of primes up to and including `n`.
pub fn primes_up_to(n: i64) -> Vec<i64> {
    if n < 2 {
        return Vec::new();
    }
    let n = n as usize;
    let mut sieve = vec![true; n + 1];
    sieve[0] = false;
    sieve[1] = false;
    let mut i = 2;
    while i * i <= n {
        if sieve[i] {
            let mut j = i * i;
            while j <= n {
                sieve[j] = false;
                j += i;
            }
        }
        i += 1;
    }
    sieve
        .iter()
        .enumerate()
        .filter(|(_, &p)| p)
        .map(|(i, _)| i as i64)
        .collect()
}

/// Parse the `:`-prefixed encoded literal forms:
/// `:3r4` rational, `:3i4` complex, `:0x1f` / `:0b101` radix integers,
/// `:123z` big integer, plain digits fall back to Int.
pub fn parse_encoded(s: &str) -> Result<Number, String> {
    let bad = || format!(":{s} is not a valid number");
    if s.is_empty() {
        return Err(bad());
    }
    if let Some(hex) = s.strip_prefix("0x") {
        return BigInt::parse_bytes(hex.as_bytes(), 16)
            .map(Number::norm_big)
            .ok_or_else(bad);
    }
    if let Some(bin) = s.strip_prefix("0b") {
        return BigInt::parse_bytes(bin.as_bytes(), 2)
            .map(Number::norm_big)
            .ok_or_else(bad);
    }
    if let Some(big) = s.strip_suffix('z') {
        return big.parse::<BigInt>().map(Big).map_err(|_| bad());
    }
    // `r` splits a rational, `i` a complex; the split point must not be
    // the leading sign character.
    if let Some(pos) = s[1..].find('r').map(|p| p + 1) {
        let numer: i64 = s[..pos].parse().map_err(|_| bad())?;
        let denom: i64 = s[pos + 1..].parse().map_err(|_| bad())?;
        if denom == 0 {
            return Err(bad());
        }
        return Ok(Rational(Rational64::new(numer, denom)));
    }
    if let Some(pos) = s[1..].find('i').map(|p| p + 1) {
        let re: f64 = s[..pos].parse().map_err(|_| bad())?;
        let im: f64 = s[pos + 1..].parse().map_err(|_| bad())?;
        return Ok(Complex(Complex64::new(re, im)));
    }
    s.parse::<i64>().map(Int).map_err(|_| bad())
}

fn fmt_f64(f: &mut std::fmt::Formatter<'_>, r: f64) -> std::fmt::Result {
    if r.is_finite() && r.fract() == 0.0 && r.abs() < 1e15 {
        write!(f, "{}", r as i64)
    } else {
        write!(f, "{r}")
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.num_eq(other)
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Int(i) => write!(f, "{i}"),
            Real(r) => fmt_f64(f, *r),
            Big(b) => write!(f, "{b}"),
            Rational(r) => write!(f, ":{}r{}", r.numer(), r.denom()),
            Complex(c) => {
                write!(f, ":")?;
                fmt_f64(f, c.re)?;
                write!(f, "i")?;
                fmt_f64(f, c.im)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_add_exact() {
        assert!(Int(3).add(&Int(4)).unwrap().num_eq(&Int(7)));
    }

    #[test]
    fn int_overflow_promotes_to_big() {
        let r = Int(i64::MAX).add(&Int(1)).unwrap();
        assert!(matches!(r, Big(_)));
    }

    #[test]
    fn exact_division_stays_int() {
        assert!(matches!(Int(8).div(&Int(2)).unwrap(), Int(4)));
        assert!(matches!(Int(7).div(&Int(2)).unwrap(), Real(_)));
    }

    #[test]
    fn division_by_zero_is_value_error() {
        assert!(Int(1).div(&Int(0)).is_err());
        assert!(Int(1).rem(&Int(0)).is_err());
    }

    #[test]
    fn rational_arithmetic() {
        let half = Rational(Rational64::new(1, 2));
        let third = Rational(Rational64::new(1, 3));
        let sum = half.add(&third).unwrap();
        assert!(sum.num_eq(&Rational(Rational64::new(5, 6))));
    }

    #[test]
    fn mixed_int_real_promotes() {
        let r = Int(1).add(&Real(0.5)).unwrap();
        assert!(r.num_eq(&Real(1.5)));
    }

    #[test]
    fn complex_promotes_everything() {
        let c = Complex(Complex64::new(1.0, 2.0));
        let r = c.add(&Int(1)).unwrap();
        assert!(r.num_eq(&Complex(Complex64::new(2.0, 2.0))));
    }

    #[test]
    fn factorial_small_and_big() {
        assert!(Int(5).factorial().unwrap().num_eq(&Int(120)));
        assert!(matches!(Int(25).factorial().unwrap(), Big(_)));
        assert!(Int(-1).factorial().is_err());
    }

    #[test]
    fn gcd_of_ints_and_bigs() {
        assert!(Int(12).gcd(&Int(18)).unwrap().num_eq(&Int(6)));
        let big = Big(BigInt::from(12));
        assert!(big.gcd(&Int(18)).unwrap().num_eq(&Int(6)));
    }

    #[test]
    fn idiv_floors_across_the_tower() {
        assert!(Int(-7).idiv(&Int(2)).unwrap().num_eq(&Int(-4)));
        let big = Big(BigInt::from(-7));
        assert!(big.idiv(&Int(2)).unwrap().num_eq(&Int(-4)));
        assert!(Real(-7.0).idiv(&Int(2)).unwrap().num_eq(&Real(-4.0)));
    }

    #[test]
    fn signum_values() {
        assert!(Int(-7).signum().num_eq(&Int(-1)));
        assert!(Real(0.0).signum().num_eq(&Int(0)));
        assert!(Real(2.5).signum().num_eq(&Int(1)));
    }

    #[test]
    fn parse_encoded_forms() {
        assert!(parse_encoded("3r4")
            .unwrap()
            .num_eq(&Rational(Rational64::new(3, 4))));
        assert!(parse_encoded("1i2")
            .unwrap()
            .num_eq(&Complex(Complex64::new(1.0, 2.0))));
        assert!(parse_encoded("0xff").unwrap().num_eq(&Int(255)));
        assert!(parse_encoded("0b101").unwrap().num_eq(&Int(5)));
        assert!(matches!(parse_encoded("123z").unwrap(), Big(_)));
        assert!(parse_encoded("").is_err());
        assert!(parse_encoded("1r0").is_err());
    }

    #[test]
    fn negative_rational_literal() {
        assert!(parse_encoded("-3r4")
            .unwrap()
            .num_eq(&Rational(Rational64::new(-3, 4))));
    }

    #[test]
    fn primes_sieve() {
        assert_eq!(primes_up_to(10), vec![2, 3, 5, 7]);
        assert!(primes_up_to(1).is_empty());
    }

    #[test]
    fn display_forms() {
        assert_eq!(Int(5).to_string(), "5");
        assert_eq!(Real(5.0).to_string(), "5");
        assert_eq!(Real(2.5).to_string(), "2.5");
        assert_eq!(Rational(Rational64::new(3, 4)).to_string(), ":3r4");
        assert_eq!(Complex(Complex64::new(1.0, 2.0)).to_string(), ":1i2");
    }

    #[test]
    fn cmp_across_variants() {
        use std::cmp::Ordering;
        assert_eq!(Int(2).num_cmp(&Real(2.5)), Some(Ordering::Less));
        assert_eq!(
            Rational(Rational64::new(1, 2)).num_cmp(&Real(0.5)),
            Some(Ordering::Equal)
        );
        assert!(Complex(Complex64::new(1.0, 1.0)).num_cmp(&Int(1)).is_none());
    }
}
