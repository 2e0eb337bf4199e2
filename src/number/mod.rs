//! Numeric conversions: the ES `StringToNumber` grammar, `Number::toString`
//! in every radix, the `toFixed`/`toExponential`/`toPrecision` formatters and
//! the integer conversions used by bitwise operators.
//!
//! Float to decimal conversion runs Grisu3 first and falls back to an exact
//! Dragon4 when Grisu3 cannot guarantee the rounding.

mod dragon4;
mod grisu3;

use crate::string::{JsString, is_js_whitespace};

const TWO_POW_32: f64 = 4_294_967_296.0;

// ═══════════════════════════════════════════════════════════════════════════════
// Digit generation
// ═══════════════════════════════════════════════════════════════════════════════

/// Shortest round-tripping digits of positive finite `v` plus the decimal
/// point position (`v = 0.d1d2... * 10^point`)
fn shortest_digits(v: f64) -> (Vec<u8>, i32) {
    grisu3::shortest(v).unwrap_or_else(|| dragon4::shortest(v))
}

/// Exactly `count` significant digits of positive finite `v`
fn precision_digits(v: f64, count: usize) -> (Vec<u8>, i32) {
    grisu3::counted(v, count).unwrap_or_else(|| dragon4::counted(v, count))
}

fn digits_str(digits: &[u8]) -> &str {
    std::str::from_utf8(digits).unwrap_or("0")
}

fn push_exponent(out: &mut String, exponent: i32) {
    out.push('e');
    out.push(if exponent < 0 { '-' } else { '+' });
    out.push_str(&exponent.unsigned_abs().to_string());
}

// ═══════════════════════════════════════════════════════════════════════════════
// Number::toString
// ═══════════════════════════════════════════════════════════════════════════════

/// ES `Number::toString(x)` in radix 10
pub fn number_to_string(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v == 0.0 {
        return "0".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if v.fract() == 0.0 && v.abs() < 1e21 && v.abs() <= 9_007_199_254_740_992.0 {
        return (v as i64).to_string();
    }

    let mut out = String::new();
    let mut v = v;
    if v < 0.0 {
        out.push('-');
        v = -v;
    }
    let (digits, n) = shortest_digits(v);
    let k = digits.len() as i32;
    let ds = digits_str(&digits);

    if k <= n && n <= 21 {
        out.push_str(ds);
        for _ in 0..(n - k) {
            out.push('0');
        }
    } else if 0 < n && n <= 21 {
        let (int_part, frac_part) = ds.split_at(n as usize);
        out.push_str(int_part);
        out.push('.');
        out.push_str(frac_part);
    } else if -6 < n && n <= 0 {
        out.push_str("0.");
        for _ in 0..(-n) {
            out.push('0');
        }
        out.push_str(ds);
    } else {
        let (first, rest) = ds.split_at(1);
        out.push_str(first);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        push_exponent(&mut out, n - 1);
    }
    out
}

pub fn number_to_js_string(v: f64) -> JsString {
    JsString::from(number_to_string(v))
}

const RADIX_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn radix_digit_value(c: u8) -> u32 {
    match c {
        b'0'..=b'9' => (c - b'0') as u32,
        b'a'..=b'z' => (c - b'a') as u32 + 10,
        _ => 0,
    }
}

fn radix_char(d: u32) -> u8 {
    RADIX_DIGITS.get(d as usize).copied().unwrap_or(b'0')
}

fn next_double(v: f64) -> f64 {
    if v.is_infinite() {
        return v;
    }
    f64::from_bits(v.to_bits() + 1)
}

/// `Number.prototype.toString(radix)` for radix other than 10
pub fn number_to_radix_string(value: f64, radix: u32) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if radix == 10 {
        return number_to_string(value);
    }

    let negative = value < 0.0;
    let value = value.abs();
    let radix_f = radix as f64;
    let mut integer = value.floor();
    let mut fraction = value - integer;
    let mut delta = 0.5 * (next_double(value) - value);
    delta = delta.max(next_double(0.0));

    let mut frac_digits: Vec<u8> = Vec::new();
    if fraction >= delta {
        loop {
            fraction *= radix_f;
            delta *= radix_f;
            let digit = fraction as u32;
            frac_digits.push(radix_char(digit));
            fraction -= digit as f64;
            if (fraction > 0.5 || (fraction == 0.5 && (digit & 1) == 1)) && fraction + delta > 1.0 {
                // Round up and propagate the carry
                loop {
                    match frac_digits.pop() {
                        None => {
                            integer += 1.0;
                            break;
                        }
                        Some(c) => {
                            let d = radix_digit_value(c);
                            if d + 1 < radix {
                                frac_digits.push(radix_char(d + 1));
                                break;
                            }
                        }
                    }
                }
                break;
            }
            if fraction < delta {
                break;
            }
        }
    }

    let mut int_digits: Vec<u8> = Vec::new();
    while grisu3::Double::new(integer / radix_f).exponent() > 0 {
        integer /= radix_f;
        int_digits.push(b'0');
    }
    loop {
        let remainder = integer % radix_f;
        int_digits.push(radix_char(remainder as u32));
        integer = (integer - remainder) / radix_f;
        if integer <= 0.0 {
            break;
        }
    }
    int_digits.reverse();

    let mut out = String::with_capacity(int_digits.len() + frac_digits.len() + 2);
    if negative {
        out.push('-');
    }
    out.push_str(digits_str(&int_digits));
    if !frac_digits.is_empty() {
        out.push('.');
        out.push_str(digits_str(&frac_digits));
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// toFixed / toExponential / toPrecision
// ═══════════════════════════════════════════════════════════════════════════════

/// `Number.prototype.toFixed` for finite `v`, `fraction_digits` in 0..=100
pub fn to_fixed(v: f64, fraction_digits: u32) -> String {
    if v.abs() >= 1e21 {
        return number_to_string(v);
    }
    let mut out = String::new();
    let x = if v < 0.0 {
        out.push('-');
        -v
    } else {
        v
    };
    let mut m = dragon4::fixed(x, fraction_digits);
    if fraction_digits == 0 {
        out.push_str(&m);
        return out;
    }
    let f = fraction_digits as usize;
    if m.len() <= f {
        let pad = f + 1 - m.len();
        m = "0".repeat(pad) + &m;
    }
    let (int_part, frac_part) = m.split_at(m.len() - f);
    out.push_str(int_part);
    out.push('.');
    out.push_str(frac_part);
    out
}

/// `Number.prototype.toExponential` for finite `v`; `None` means as many
/// digits as needed
pub fn to_exponential(v: f64, fraction_digits: Option<u32>) -> String {
    let mut out = String::new();
    let x = if v < 0.0 {
        out.push('-');
        -v
    } else {
        v
    };
    let (digits, exponent) = if x == 0.0 {
        let count = fraction_digits.unwrap_or(0) as usize + 1;
        (vec![b'0'; count], 0)
    } else {
        let (digits, n) = match fraction_digits {
            Some(f) => precision_digits(x, f as usize + 1),
            None => shortest_digits(x),
        };
        (digits, n - 1)
    };
    let ds = digits_str(&digits);
    let (first, rest) = ds.split_at(1.min(ds.len()));
    out.push_str(first);
    if !rest.is_empty() {
        out.push('.');
        out.push_str(rest);
    }
    push_exponent(&mut out, exponent);
    out
}

/// `Number.prototype.toPrecision` for finite `v`, `precision` in 1..=100
pub fn to_precision(v: f64, precision: u32) -> String {
    let p = precision as i32;
    let mut out = String::new();
    let x = if v < 0.0 {
        out.push('-');
        -v
    } else {
        v
    };
    if x == 0.0 {
        out.push('0');
        if p > 1 {
            out.push('.');
            out.push_str(&"0".repeat((p - 1) as usize));
        }
        return out;
    }

    let (digits, n) = precision_digits(x, precision as usize);
    let e = n - 1;
    let ds = digits_str(&digits);
    if e < -6 || e >= p {
        let (first, rest) = ds.split_at(1.min(ds.len()));
        out.push_str(first);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        push_exponent(&mut out, e);
        return out;
    }
    if e == p - 1 {
        out.push_str(ds);
    } else if e >= 0 {
        let (int_part, frac_part) = ds.split_at((e + 1) as usize);
        out.push_str(int_part);
        out.push('.');
        out.push_str(frac_part);
    } else {
        out.push_str("0.");
        out.push_str(&"0".repeat((-(e + 1)) as usize));
        out.push_str(ds);
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// String to number
// ═══════════════════════════════════════════════════════════════════════════════

/// Length of the longest prefix of `s` matching StrUnsignedDecimalLiteral
/// (without the `Infinity` alternative). Returns 0 when nothing matches.
fn decimal_literal_len(s: &[u8]) -> usize {
    let mut i = 0;
    let int_start = i;
    while s.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    let int_digits = i - int_start;
    let mut frac_digits = 0;
    if s.get(i) == Some(&b'.') {
        let mut j = i + 1;
        while s.get(j).is_some_and(u8::is_ascii_digit) {
            j += 1;
        }
        frac_digits = j - i - 1;
        if int_digits > 0 || frac_digits > 0 {
            i = j;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return 0;
    }
    if matches!(s.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(s.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_start = j;
        while s.get(j).is_some_and(u8::is_ascii_digit) {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

/// Parse an unsigned decimal literal already validated by `decimal_literal_len`
fn parse_decimal(text: &str) -> f64 {
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(pos) => text.split_at(pos),
        None => (text, ""),
    };
    let (int_part, frac_part) = match mantissa.find('.') {
        Some(pos) => {
            let (a, b) = mantissa.split_at(pos);
            (a, b.get(1..).unwrap_or(""))
        }
        None => (mantissa, ""),
    };
    let exp = exponent.get(1..).unwrap_or("");
    let canonical = format!(
        "{}.{}e{}",
        if int_part.is_empty() { "0" } else { int_part },
        if frac_part.is_empty() { "0" } else { frac_part },
        if exp.is_empty() { "0" } else { exp }
    );
    canonical.parse::<f64>().unwrap_or_else(|_| {
        // Exponents too long for the parser saturate
        if exp.starts_with('-') { 0.0 } else { f64::INFINITY }
    })
}

fn parse_radix_integer(digits: &[u8], radix: u32) -> f64 {
    let mut acc: u128 = 0;
    let mut overflow = false;
    let mut float_acc = 0.0f64;
    for &c in digits {
        let d = (c as char).to_digit(radix).unwrap_or(0);
        if !overflow {
            match acc.checked_mul(radix as u128).and_then(|v| v.checked_add(d as u128)) {
                Some(v) => acc = v,
                None => {
                    overflow = true;
                    float_acc = acc as f64;
                }
            }
        }
        if overflow {
            float_acc = float_acc * radix as f64 + d as f64;
        }
    }
    if overflow { float_acc } else { acc as f64 }
}

/// ES `StringToNumber`
pub fn string_to_number(s: &JsString) -> f64 {
    let trimmed = s.trim();
    let Some(text) = trimmed.as_ascii_str() else {
        return f64::NAN;
    };
    str_to_number(text)
}

/// `StringToNumber` over an already whitespace-trimmed ASCII string
pub fn str_to_number(text: &str) -> f64 {
    let bytes = text.as_bytes();
    if bytes.is_empty() {
        return 0.0;
    }
    if bytes.len() > 2 && bytes.first() == Some(&b'0') {
        let radix = match bytes.get(1) {
            Some(b'x' | b'X') => Some(16),
            Some(b'o' | b'O') => Some(8),
            Some(b'b' | b'B') => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            let digits = bytes.get(2..).unwrap_or(&[]);
            if digits.iter().all(|&c| (c as char).is_digit(radix)) {
                return parse_radix_integer(digits, radix);
            }
            return f64::NAN;
        }
    }
    let (negative, rest) = match bytes.first() {
        Some(b'-') => (true, bytes.get(1..).unwrap_or(&[])),
        Some(b'+') => (false, bytes.get(1..).unwrap_or(&[])),
        _ => (false, bytes),
    };
    let magnitude = if rest == b"Infinity" {
        f64::INFINITY
    } else {
        let len = decimal_literal_len(rest);
        if len == 0 || len != rest.len() {
            return f64::NAN;
        }
        parse_decimal(std::str::from_utf8(rest).unwrap_or(""))
    };
    if negative { -magnitude } else { magnitude }
}

fn skip_leading_whitespace(s: &JsString) -> Vec<u16> {
    let units = s.to_utf16();
    let start = units
        .iter()
        .position(|&u| !is_js_whitespace(u))
        .unwrap_or(units.len());
    units.get(start..).map(<[u16]>::to_vec).unwrap_or_default()
}

fn ascii_prefix(units: &[u16]) -> String {
    units
        .iter()
        .take_while(|&&u| u < 0x80)
        .map(|&u| u as u8 as char)
        .collect()
}

/// Global `parseFloat`
pub fn parse_float(s: &JsString) -> f64 {
    let units = skip_leading_whitespace(s);
    let text = ascii_prefix(&units);
    let bytes = text.as_bytes();
    let (negative, rest) = match bytes.first() {
        Some(b'-') => (true, bytes.get(1..).unwrap_or(&[])),
        Some(b'+') => (false, bytes.get(1..).unwrap_or(&[])),
        _ => (false, bytes),
    };
    let magnitude = if rest.starts_with(b"Infinity") {
        f64::INFINITY
    } else {
        let len = decimal_literal_len(rest);
        if len == 0 {
            return f64::NAN;
        }
        let literal = rest.get(..len).unwrap_or(&[]);
        parse_decimal(std::str::from_utf8(literal).unwrap_or(""))
    };
    if negative { -magnitude } else { magnitude }
}

/// Global `parseInt`; `radix` is the already converted `ToInt32(radix)`
pub fn parse_int(s: &JsString, radix: i32) -> f64 {
    let units = skip_leading_whitespace(s);
    let text = ascii_prefix(&units);
    let mut bytes = text.as_bytes();
    let negative = match bytes.first() {
        Some(b'-') => {
            bytes = bytes.get(1..).unwrap_or(&[]);
            true
        }
        Some(b'+') => {
            bytes = bytes.get(1..).unwrap_or(&[]);
            false
        }
        _ => false,
    };
    let mut radix = radix;
    let mut strip_prefix = true;
    if radix != 0 {
        if !(2..=36).contains(&radix) {
            return f64::NAN;
        }
        if radix != 16 {
            strip_prefix = false;
        }
    } else {
        radix = 10;
    }
    if strip_prefix && bytes.len() >= 2 && bytes.first() == Some(&b'0') && matches!(bytes.get(1), Some(b'x' | b'X')) {
        bytes = bytes.get(2..).unwrap_or(&[]);
        radix = 16;
    }
    let radix = radix as u32;
    let end = bytes
        .iter()
        .position(|&c| !(c as char).is_digit(radix))
        .unwrap_or(bytes.len());
    let digits = bytes.get(..end).unwrap_or(&[]);
    if digits.is_empty() {
        return f64::NAN;
    }
    let magnitude = if radix == 10 {
        std::str::from_utf8(digits)
            .ok()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(f64::NAN)
    } else {
        parse_radix_integer(digits, radix)
    };
    if negative { -magnitude } else { magnitude }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Integer conversions
// ═══════════════════════════════════════════════════════════════════════════════

/// ES `ToIntegerOrInfinity`
pub fn to_integer_or_infinity(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else if v.is_infinite() {
        v
    } else {
        let t = v.trunc();
        if t == 0.0 { 0.0 } else { t }
    }
}

/// ES `ToUint32`
pub fn to_uint32(v: f64) -> u32 {
    if !v.is_finite() {
        return 0;
    }
    if v >= 0.0 && v < TWO_POW_32 {
        return v as u32;
    }
    v.trunc().rem_euclid(TWO_POW_32) as u32
}

/// ES `ToInt32`
pub fn to_int32(v: f64) -> i32 {
    if v.is_finite() && v >= i32::MIN as f64 && v <= i32::MAX as f64 {
        return v as i32;
    }
    to_uint32(v) as i32
}

/// ES `ToUint16`
pub fn to_uint16(v: f64) -> u16 {
    to_uint32(v) as u16
}

/// Clamp a relative index argument (`slice`, `at`, `splice` style) into
/// `0..=len`
pub fn relative_index(v: f64, len: usize) -> usize {
    let rel = to_integer_or_infinity(v);
    let len_f = len as f64;
    if rel < 0.0 {
        (len_f + rel).max(0.0) as usize
    } else {
        rel.min(len_f) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_integers_and_fractions() {
        assert_eq!(number_to_string(49.0), "49");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(1.5), "1.5");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(123456789012345680000.0), "123456789012345680000");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(number_to_string(1.7976931348623157e308), "1.7976931348623157e+308");
    }

    #[test]
    fn formats_radix() {
        assert_eq!(number_to_radix_string(255.0, 16), "ff");
        assert_eq!(number_to_radix_string(-255.0, 2), "-11111111");
        assert_eq!(number_to_radix_string(0.5, 2), "0.1");
        assert_eq!(number_to_radix_string(35.0, 36), "z");
    }

    #[test]
    fn formats_fixed_exponential_precision() {
        assert_eq!(to_fixed(1.005, 2), "1.00");
        assert_eq!(to_fixed(2.5, 0), "3");
        assert_eq!(to_fixed(0.5, 3), "0.500");
        assert_eq!(to_fixed(-1.5, 1), "-1.5");
        assert_eq!(to_exponential(123456.0, Some(2)), "1.23e+5");
        assert_eq!(to_exponential(0.00015, None), "1.5e-4");
        assert_eq!(to_exponential(0.0, Some(1)), "0.0e+0");
        assert_eq!(to_precision(123.456, 4), "123.5");
        assert_eq!(to_precision(0.000123, 2), "0.00012");
        assert_eq!(to_precision(123456.0, 2), "1.2e+5");
        assert_eq!(to_precision(0.0, 3), "0.00");
    }

    #[test]
    fn parses_string_numeric_literals() {
        let n = |s: &str| string_to_number(&JsString::from(s));
        assert_eq!(n("  42  "), 42.0);
        assert_eq!(n(""), 0.0);
        assert_eq!(n("0x1f"), 31.0);
        assert_eq!(n("0b101"), 5.0);
        assert_eq!(n("0o17"), 15.0);
        assert_eq!(n("1e3"), 1000.0);
        assert_eq!(n(".5"), 0.5);
        assert_eq!(n("5."), 5.0);
        assert_eq!(n("-Infinity"), f64::NEG_INFINITY);
        assert!(n("-0x10").is_nan());
        assert!(n("1e").is_nan());
        assert!(n("abc").is_nan());
        assert!(n("infinity").is_nan());
    }

    #[test]
    fn parse_int_and_float() {
        let pi = |s: &str, r: i32| parse_int(&JsString::from(s), r);
        assert_eq!(pi("  123abc", 0), 123.0);
        assert_eq!(pi("0x1A", 0), 26.0);
        assert_eq!(pi("-ff", 16), -255.0);
        assert_eq!(pi("11", 2), 3.0);
        assert!(pi("xyz", 0).is_nan());
        assert!(pi("10", 37).is_nan());
        let pf = |s: &str| parse_float(&JsString::from(s));
        assert_eq!(pf("3.14abc"), 3.14);
        assert_eq!(pf("  -.5e1x"), -5.0);
        assert_eq!(pf("Infinityx"), f64::INFINITY);
        assert!(pf("e5").is_nan());
    }

    #[test]
    fn integer_conversions() {
        assert_eq!(to_int32(4294967296.0 + 5.0), 5);
        assert_eq!(to_int32(2147483648.0), -2147483648);
        assert_eq!(to_int32(-1.9), -1);
        assert_eq!(to_uint32(-1.0), 4294967295);
        assert_eq!(to_int32(f64::NAN), 0);
        assert_eq!(to_uint16(65537.0), 1);
    }

    #[test]
    fn string_round_trip() {
        for v in [0.1, 1.0 / 3.0, 123.456e-200, 5e-324, 2f64.powi(60), 9007199254740993.0] {
            let s = number_to_string(v);
            assert_eq!(str_to_number(&s), v, "round trip of {s}");
        }
    }
}
