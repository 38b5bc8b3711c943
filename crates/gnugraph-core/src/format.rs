//! Numeric text formatting for gnuplot's inline data records.
//!
//! Every number is written with a fixed number of significant digits in the
//! style of C's `%g` conversion and followed by a single space, so records
//! are built by plain concatenation:
//!
//! ```text
//! format(1.0, 4.0) + "\n"   →   "1 4 \n"
//! ```

use std::fmt::Write as _;

/// A 2D coordinate.
pub type Point2 = [f64; 2];

/// A 3D coordinate.
pub type Point3 = [f64; 3];

/// The closed set of input shapes the formatter accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    /// A single number.
    Scalar(f64),
    /// A 2D point, written as `x y `.
    Point2(Point2),
    /// A 3D point, written as `x y z `.
    Point3(Point3),
    /// Any ordered run of numbers, written in index order.
    Sequence(&'a [f64]),
}

impl From<f64> for Value<'_> {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<Point2> for Value<'_> {
    fn from(p: Point2) -> Self {
        Value::Point2(p)
    }
}

impl From<Point3> for Value<'_> {
    fn from(p: Point3) -> Self {
        Value::Point3(p)
    }
}

impl<'a> From<&'a [f64]> for Value<'a> {
    fn from(xs: &'a [f64]) -> Self {
        Value::Sequence(xs)
    }
}

/// Significant digits used when nothing else is configured.
pub const DEFAULT_PRECISION: usize = 12;

/// Converts numbers into gnuplot record text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Formatter {
    precision: usize,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(DEFAULT_PRECISION)
    }
}

impl Formatter {
    /// Create a formatter that writes `precision` significant digits.
    ///
    /// A precision of zero is treated as one, matching `%g`.
    pub fn new(precision: usize) -> Self {
        Self {
            precision: precision.max(1),
        }
    }

    /// Significant digits written per number.
    pub fn precision(&self) -> usize {
        self.precision
    }

    /// Format one value. Each number is followed by exactly one space.
    pub fn format<'a>(&self, value: impl Into<Value<'a>>) -> String {
        let mut out = String::new();
        self.write_value(&mut out, value.into());
        out
    }

    /// Format several values back to back.
    pub fn format_all(&self, values: &[Value<'_>]) -> String {
        let mut out = String::new();
        for value in values {
            self.write_value(&mut out, *value);
        }
        out
    }

    fn write_value(&self, out: &mut String, value: Value<'_>) {
        match value {
            Value::Scalar(v) => self.write_scalar(out, v),
            Value::Point2(p) => p.iter().for_each(|&v| self.write_scalar(out, v)),
            Value::Point3(p) => p.iter().for_each(|&v| self.write_scalar(out, v)),
            Value::Sequence(xs) => xs.iter().for_each(|&v| self.write_scalar(out, v)),
        }
    }

    fn write_scalar(&self, out: &mut String, v: f64) {
        out.push_str(&format_general(v, self.precision));
        out.push(' ');
    }
}

/// `%.{precision}g`: the shorter of fixed and scientific notation with
/// trailing zeros removed.
fn format_general(v: f64, precision: usize) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v.is_sign_negative() { "-inf" } else { "inf" }.to_string();
    }

    // Rounding to `precision` digits decides the exponent, e.g. 9.9999 → 1e1.
    let sci = format!("{:.*e}", precision - 1, v);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    let p = i32::try_from(precision).unwrap_or(i32::MAX);
    if exponent < -4 || exponent >= p {
        let mut out = trim_fraction(mantissa).to_string();
        let sign = if exponent < 0 { '-' } else { '+' };
        let _ = write!(out, "e{sign}{:02}", exponent.unsigned_abs());
        out
    } else {
        let decimals = usize::try_from(p - 1 - exponent).unwrap_or(0);
        let fixed = format!("{v:.decimals$}");
        trim_fraction(&fixed).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
