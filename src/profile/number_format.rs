//! Number format strings.
//!
//! Standard formats are a letter plus an optional precision: `F2` (fixed),
//! `N1` (fixed with thousands separators), `E3` (exponent), `D4` (zero
//! padded integer), `P1` (percent) and `G` (shortest). Custom patterns use
//! `0` for required digits, `#` for optional digits, `,` for grouping and
//! one `.`, e.g. `0.00`, `0.##` or `#,##0.0`.
//!
//! Formatting appends to a caller-owned `String` and never allocates beyond
//! growing that buffer.

use std::fmt::Write;

use crate::error::ResolveError;

const MAX_PRECISION: usize = 15;

/// A parsed number format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    General,
    Fixed(usize),
    Number(usize),
    Exponent(usize),
    Decimal(usize),
    Percent(usize),
    Custom(CustomPattern),
}

/// Digit layout of a custom pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomPattern {
    pub min_integer_digits: usize,
    pub grouping: bool,
    pub min_fraction_digits: usize,
    pub max_fraction_digits: usize,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::General
    }
}

impl NumberFormat {
    /// Parses a format string.
    pub fn parse(format: &str) -> Result<Self, ResolveError> {
        let format = format.trim();
        let invalid = |reason: &str| ResolveError::InvalidFormat {
            format: format.to_string(),
            reason: reason.to_string(),
        };

        let mut chars = format.chars();
        let Some(first) = chars.next() else {
            return Ok(Self::General);
        };

        if first.is_ascii_alphabetic() {
            let digits = chars.as_str();
            let precision = if digits.is_empty() {
                None
            } else if digits.bytes().all(|b| b.is_ascii_digit()) {
                let p: usize = digits.parse().map_err(|_| invalid("precision out of range"))?;
                if p > MAX_PRECISION {
                    return Err(invalid("precision out of range"));
                }
                Some(p)
            } else {
                return Err(invalid("unexpected characters after format specifier"));
            };
            return match first.to_ascii_uppercase() {
                'G' => Ok(Self::General),
                'F' => Ok(Self::Fixed(precision.unwrap_or(2))),
                'N' => Ok(Self::Number(precision.unwrap_or(2))),
                'E' => Ok(Self::Exponent(precision.unwrap_or(6))),
                'D' => Ok(Self::Decimal(precision.unwrap_or(0))),
                'P' => Ok(Self::Percent(precision.unwrap_or(2))),
                _ => Err(invalid("unknown format specifier")),
            };
        }

        Self::parse_custom(format).ok_or_else(|| invalid("custom patterns may only contain '0', '#', ',' and one '.'"))
    }

    fn parse_custom(format: &str) -> Option<Self> {
        let (int_part, frac_part) = match format.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (format, None),
        };
        if !int_part.chars().all(|c| matches!(c, '0' | '#' | ',')) {
            return None;
        }
        let frac_part = frac_part.unwrap_or("");
        if !frac_part.chars().all(|c| matches!(c, '0' | '#')) {
            return None;
        }
        if !format.contains(['0', '#']) {
            return None;
        }
        let min_fraction_digits = frac_part.chars().filter(|c| *c == '0').count();
        let max_fraction_digits = frac_part.len();
        if max_fraction_digits > MAX_PRECISION {
            return None;
        }
        Some(Self::Custom(CustomPattern {
            min_integer_digits: int_part.chars().filter(|c| *c == '0').count(),
            grouping: int_part.contains(','),
            min_fraction_digits,
            max_fraction_digits,
        }))
    }

    /// Appends a floating point value. `single` selects `f32` precision for
    /// the general format.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_float(&self, value: f64, single: bool, out: &mut String) {
        let start = out.len();
        match *self {
            Self::General => {
                if single {
                    let _ = write!(out, "{}", value as f32);
                } else {
                    let _ = write!(out, "{value}");
                }
            }
            Self::Fixed(p) => {
                let _ = write!(out, "{value:.p$}");
            }
            Self::Number(p) => {
                let _ = write!(out, "{value:.p$}");
                group_digits(out, start);
            }
            Self::Exponent(p) => write_exponent(value, p, out),
            Self::Decimal(width) => {
                if value.is_finite() {
                    write_padded(value.round() as i64, width, out);
                } else {
                    let _ = write!(out, "{value}");
                }
            }
            Self::Percent(p) => {
                let _ = write!(out, "{:.p$}%", value * 100.0);
            }
            Self::Custom(pattern) => pattern.write(value, out),
        }
    }

    /// Appends a signed integer.
    #[allow(clippy::cast_precision_loss)]
    pub fn write_int(&self, value: i64, out: &mut String) {
        let start = out.len();
        match *self {
            Self::General => {
                let _ = write!(out, "{value}");
            }
            Self::Decimal(width) => write_padded(value, width, out),
            Self::Number(0) => {
                let _ = write!(out, "{value}");
                group_digits(out, start);
            }
            _ => self.write_float(value as f64, false, out),
        }
    }

    /// Appends an unsigned integer.
    #[allow(clippy::cast_precision_loss)]
    pub fn write_uint(&self, value: u64, out: &mut String) {
        let start = out.len();
        match *self {
            Self::General => {
                let _ = write!(out, "{value}");
            }
            Self::Decimal(width) => {
                let _ = write!(out, "{value:0width$}");
            }
            Self::Number(0) => {
                let _ = write!(out, "{value}");
                group_digits(out, start);
            }
            _ => self.write_float(value as f64, false, out),
        }
    }
}

impl CustomPattern {
    fn write(&self, value: f64, out: &mut String) {
        if !value.is_finite() {
            let _ = write!(out, "{value}");
            return;
        }
        let start = out.len();
        let max = self.max_fraction_digits;
        let _ = write!(out, "{value:.max$}");

        if max > 0 {
            let min_len = out.len() - (max - self.min_fraction_digits);
            while out.len() > min_len && out.ends_with('0') {
                out.pop();
            }
            if out.ends_with('.') {
                out.pop();
            }
        }

        let digits_start = if out[start..].starts_with('-') { start + 1 } else { start };
        let int_end = out[digits_start..].find('.').map_or(out.len(), |i| digits_start + i);
        let int_len = int_end - digits_start;

        if self.min_integer_digits == 0 && &out[digits_start..int_end] == "0" {
            out.replace_range(digits_start..int_end, "");
            if out.len() == digits_start {
                out.push('0');
            }
        } else if int_len < self.min_integer_digits {
            for _ in int_len..self.min_integer_digits {
                out.insert(digits_start, '0');
            }
        }

        if &out[start..] == "-0" {
            out.remove(start);
        }

        if self.grouping {
            group_digits(out, start);
        }
    }
}

/// Inserts thousands separators into the integer part written at `start..`.
fn group_digits(out: &mut String, start: usize) {
    let digits_start = if out[start..].starts_with('-') { start + 1 } else { start };
    let int_end = out[digits_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(out.len(), |i| digits_start + i);
    let mut pos = int_end;
    while pos > digits_start + 3 {
        pos -= 3;
        out.insert(pos, ',');
    }
}

fn write_padded(value: i64, width: usize, out: &mut String) {
    if value < 0 {
        out.push('-');
    }
    let _ = write!(out, "{:0width$}", value.unsigned_abs());
}

fn write_exponent(value: f64, precision: usize, out: &mut String) {
    let start = out.len();
    let _ = write!(out, "{value:.precision$e}");
    let Some(e_pos) = out[start..].find('e').map(|i| start + i) else {
        return;
    };
    let exponent: i32 = out[e_pos + 1..].parse().unwrap_or(0);
    out.truncate(e_pos);
    let sign = if exponent < 0 { '-' } else { '+' };
    let _ = write!(out, "E{sign}{:03}", exponent.unsigned_abs());
}
