//! Date built-in
//!
//! Time values are milliseconds since the epoch in UTC, held directly in
//! `ObjectKind::Date`. Local time is UTC shifted by the offset the host's
//! [`TimeProvider`](crate::platform::TimeProvider) reports, so a runtime
//! without a configured zone behaves as if it ran in UTC.

use crate::error::JsError;
use crate::object::{JsObject, JsObjectRef, ObjectKind};
use crate::value::{JsSymbol, JsValue, PropertyKey};

use super::arg;
use crate::interpreter::Interpreter;
use crate::interpreter::ops::Hint;
use crate::interpreter::realm::Intrinsic;

const MS_PER_SECOND: f64 = 1000.0;
const MS_PER_MINUTE: f64 = 60_000.0;
const MS_PER_HOUR: f64 = 3_600_000.0;
const MS_PER_DAY: f64 = 86_400_000.0;

/// Largest magnitude a time value may have
const MAX_TIME: f64 = 8.64e15;

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::DatePrototype).is_some() {
        return;
    }
    let proto = interp.create_object();

    interp.register_method(&proto, "getTime", date_get_time, 0);
    interp.register_method(&proto, "valueOf", date_get_time, 0);
    interp.register_method(&proto, "getTimezoneOffset", date_get_timezone_offset, 0);
    interp.register_method(&proto, "getFullYear", date_get_full_year, 0);
    interp.register_method(&proto, "getMonth", date_get_month, 0);
    interp.register_method(&proto, "getDate", date_get_date, 0);
    interp.register_method(&proto, "getDay", date_get_day, 0);
    interp.register_method(&proto, "getHours", date_get_hours, 0);
    interp.register_method(&proto, "getMinutes", date_get_minutes, 0);
    interp.register_method(&proto, "getSeconds", date_get_seconds, 0);
    interp.register_method(&proto, "getMilliseconds", date_get_milliseconds, 0);
    interp.register_method(&proto, "getUTCFullYear", date_get_utc_full_year, 0);
    interp.register_method(&proto, "getUTCMonth", date_get_utc_month, 0);
    interp.register_method(&proto, "getUTCDate", date_get_utc_date, 0);
    interp.register_method(&proto, "getUTCDay", date_get_utc_day, 0);
    interp.register_method(&proto, "getUTCHours", date_get_utc_hours, 0);
    interp.register_method(&proto, "getUTCMinutes", date_get_utc_minutes, 0);
    interp.register_method(&proto, "getUTCSeconds", date_get_utc_seconds, 0);
    interp.register_method(&proto, "getUTCMilliseconds", date_get_utc_milliseconds, 0);

    interp.register_method(&proto, "setTime", date_set_time, 1);
    interp.register_method(&proto, "setFullYear", date_set_full_year, 3);
    interp.register_method(&proto, "setMonth", date_set_month, 2);
    interp.register_method(&proto, "setDate", date_set_date, 1);
    interp.register_method(&proto, "setHours", date_set_hours, 4);
    interp.register_method(&proto, "setMinutes", date_set_minutes, 3);
    interp.register_method(&proto, "setSeconds", date_set_seconds, 2);
    interp.register_method(&proto, "setMilliseconds", date_set_milliseconds, 1);
    interp.register_method(&proto, "setUTCFullYear", date_set_utc_full_year, 3);
    interp.register_method(&proto, "setUTCMonth", date_set_utc_month, 2);
    interp.register_method(&proto, "setUTCDate", date_set_utc_date, 1);
    interp.register_method(&proto, "setUTCHours", date_set_utc_hours, 4);
    interp.register_method(&proto, "setUTCMinutes", date_set_utc_minutes, 3);
    interp.register_method(&proto, "setUTCSeconds", date_set_utc_seconds, 2);
    interp.register_method(&proto, "setUTCMilliseconds", date_set_utc_milliseconds, 1);

    interp.register_method(&proto, "toISOString", date_to_iso_string, 0);
    interp.register_method(&proto, "toJSON", date_to_json, 1);
    interp.register_method(&proto, "toString", date_to_string, 0);
    interp.register_method(&proto, "toDateString", date_to_date_string, 0);
    interp.register_method(&proto, "toTimeString", date_to_time_string, 0);
    interp.register_method(&proto, "toLocaleString", date_to_locale_string, 0);
    interp.register_method(&proto, "toLocaleDateString", date_to_locale_date_string, 0);
    interp.register_method(&proto, "toLocaleTimeString", date_to_locale_time_string, 0);
    let to_utc = interp.create_native_function("toUTCString", date_to_utc_string, 0);
    interp.register_value(&proto, "toUTCString", JsValue::Object(to_utc.clone()));
    interp.register_value(&proto, "toGMTString", JsValue::Object(to_utc));
    interp.register_symbol_method(&proto, JsSymbol::to_primitive(), date_to_primitive, 1);

    let ctor = interp.create_native_constructor("Date", date_constructor, 7, &proto);
    interp.register_method(&ctor, "now", date_now, 0);
    interp.register_method(&ctor, "parse", date_parse, 1);
    interp.register_method(&ctor, "UTC", date_utc, 7);
    interp.realm.set(Intrinsic::DatePrototype, proto);
    interp.realm.set(Intrinsic::Date, ctor);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Time arithmetic
// ═══════════════════════════════════════════════════════════════════════════════

/// Days since the epoch of a proleptic Gregorian date (`month` is 1-based)
pub fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y.rem_euclid(400);
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Inverse of [`days_from_civil`]: `(year, month 1-12, day 1-31)`
pub fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i64, month: i64) -> i64 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// `MakeTime`
fn make_time(hour: f64, min: f64, sec: f64, ms: f64) -> f64 {
    if !(hour.is_finite() && min.is_finite() && sec.is_finite() && ms.is_finite()) {
        return f64::NAN;
    }
    hour.trunc() * MS_PER_HOUR + min.trunc() * MS_PER_MINUTE + sec.trunc() * MS_PER_SECOND + ms.trunc()
}

/// `MakeDay` (`month` is 0-based and may overflow)
fn make_day(year: f64, month: f64, date: f64) -> f64 {
    if !(year.is_finite() && month.is_finite() && date.is_finite()) {
        return f64::NAN;
    }
    let (y, m, d) = (year.trunc(), month.trunc(), date.trunc());
    let ym = y + (m / 12.0).floor();
    if ym.abs() > 400_000.0 {
        return f64::NAN;
    }
    let mn = m.rem_euclid(12.0);
    days_from_civil(ym as i64, mn as i64 + 1, 1) as f64 + d - 1.0
}

fn make_date(day: f64, time: f64) -> f64 {
    if !(day.is_finite() && time.is_finite()) {
        return f64::NAN;
    }
    day * MS_PER_DAY + time
}

/// `TimeClip`
fn time_clip(t: f64) -> f64 {
    if !t.is_finite() || t.abs() > MAX_TIME {
        return f64::NAN;
    }
    t.trunc() + 0.0
}

/// Broken-down calendar fields of a (finite) time value
#[derive(Debug, Clone, Copy, PartialEq)]
struct Fields {
    year: i64,
    /// 0-based
    month: i64,
    day: i64,
    hour: i64,
    minute: i64,
    second: i64,
    ms: i64,
    weekday: i64,
}

impl Fields {
    fn from_time(t: f64) -> Fields {
        let days = (t / MS_PER_DAY).floor();
        let in_day = (t - days * MS_PER_DAY) as i64;
        let days = days as i64;
        let (year, month, day) = civil_from_days(days);
        Fields {
            year,
            month: month - 1,
            day,
            hour: in_day / 3_600_000,
            minute: in_day / 60_000 % 60,
            second: in_day / 1000 % 60,
            ms: in_day % 1000,
            weekday: (days + 4).rem_euclid(7),
        }
    }

    fn as_numbers(&self) -> [f64; 7] {
        [
            self.year as f64,
            self.month as f64,
            self.day as f64,
            self.hour as f64,
            self.minute as f64,
            self.second as f64,
            self.ms as f64,
        ]
    }
}

fn offset_ms(interp: &Interpreter, t: f64) -> f64 {
    f64::from(interp.time.local_offset_minutes(t)) * MS_PER_MINUTE
}

/// `LocalTime`
fn local_time(interp: &Interpreter, t: f64) -> f64 {
    t + offset_ms(interp, t)
}

/// `UTC`: local wall-clock time back to a time value
fn utc_time(interp: &Interpreter, local: f64) -> f64 {
    if !local.is_finite() {
        return f64::NAN;
    }
    local - offset_ms(interp, local - offset_ms(interp, local))
}

/// Years 0-99 passed to the constructor or `Date.UTC` mean 1900-1999
fn full_year(y: f64) -> f64 {
    if y.is_nan() {
        return y;
    }
    let yi = y.trunc();
    if (0.0..=99.0).contains(&yi) { 1900.0 + yi } else { y }
}

/// Time value from `(year, month, day?, hours?, minutes?, seconds?, ms?)`
/// arguments, as wall-clock fields
fn time_from_components(interp: &mut Interpreter, args: &[JsValue]) -> Result<f64, JsError> {
    let mut parts = [f64::NAN, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
    for (i, slot) in parts.iter_mut().enumerate() {
        if let Some(v) = args.get(i) {
            *slot = interp.to_number(v)?;
        }
    }
    let [year, month, day, hour, min, sec, ms] = parts;
    Ok(make_date(make_day(full_year(year), month, day), make_time(hour, min, sec, ms)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Parsing
// ═══════════════════════════════════════════════════════════════════════════════

/// Parsed date string: the wall-clock time value and whether it still
/// needs the local offset applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedDate {
    pub time: f64,
    pub local: bool,
}

/// Parse the date-time string format plus the forms `toString` and
/// `toUTCString` produce
pub fn parse_date(s: &str) -> Option<ParsedDate> {
    let s = s.trim();
    parse_iso(s).or_else(|| parse_legacy(s))
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn digits(&mut self, n: usize) -> Option<i64> {
        let mut v = 0i64;
        for _ in 0..n {
            let d = self.peek().filter(u8::is_ascii_digit)?;
            v = v * 10 + i64::from(d - b'0');
            self.pos += 1;
        }
        Some(v)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

/// `YYYY[-MM[-DD]][THH:mm[:ss[.sss]][Z|±HH:mm]]` and expanded years.
/// Date-only forms are UTC, date-time forms without an offset are local.
fn parse_iso(s: &str) -> Option<ParsedDate> {
    let mut c = Cursor { bytes: s.as_bytes(), pos: 0 };
    let year = if c.peek() == Some(b'+') || c.peek() == Some(b'-') {
        let negative = c.eat(b'-') || !c.eat(b'+');
        let y = c.digits(6)?;
        if negative && y == 0 {
            return None;
        }
        if negative { -y } else { y }
    } else {
        c.digits(4)?
    };
    let (mut month, mut day) = (1, 1);
    if c.eat(b'-') {
        month = c.digits(2)?;
        if c.eat(b'-') {
            day = c.digits(2)?;
        }
    }
    if !(1..=12).contains(&month) || day < 1 || day > days_in_month(year, month) {
        return None;
    }
    let date = days_from_civil(year, month, day) as f64;
    if c.at_end() {
        return Some(ParsedDate {
            time: make_date(date, 0.0),
            local: false,
        });
    }
    if !(c.eat(b'T') || c.eat(b't') || c.eat(b' ')) {
        return None;
    }
    let hour = c.digits(2)?;
    if !c.eat(b':') {
        return None;
    }
    let minute = c.digits(2)?;
    let mut second = 0;
    let mut ms = 0;
    if c.eat(b':') {
        second = c.digits(2)?;
        if c.eat(b'.') || c.eat(b',') {
            let mut scale = 100;
            let mut any = false;
            while let Some(d) = c.peek().filter(u8::is_ascii_digit) {
                ms += i64::from(d - b'0') * scale;
                scale /= 10;
                any = true;
                c.pos += 1;
            }
            if !any {
                return None;
            }
        }
    }
    if hour > 24 || minute > 59 || second > 59 || (hour == 24 && (minute, second, ms) != (0, 0, 0)) {
        return None;
    }
    let time = make_time(hour as f64, minute as f64, second as f64, ms as f64);
    let wall = make_date(date, time);
    if c.eat(b'Z') || c.eat(b'z') {
        return c.at_end().then_some(ParsedDate { time: wall, local: false });
    }
    let sign = match c.peek() {
        Some(b'+') => 1.0,
        Some(b'-') => -1.0,
        None => return Some(ParsedDate { time: wall, local: true }),
        _ => return None,
    };
    c.pos += 1;
    let oh = c.digits(2)?;
    c.eat(b':');
    let om = c.digits(2)?;
    if !c.at_end() || oh > 23 || om > 59 {
        return None;
    }
    let offset = sign * (oh as f64 * MS_PER_HOUR + om as f64 * MS_PER_MINUTE);
    Some(ParsedDate {
        time: wall - offset,
        local: false,
    })
}

fn month_from_name(word: &str) -> Option<i64> {
    let prefix = word.get(..3)?.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(&prefix))
        .map(|i| i as i64)
}

fn is_weekday_name(word: &str) -> bool {
    word.get(..3)
        .is_some_and(|prefix| WEEKDAYS.iter().any(|d| d.eq_ignore_ascii_case(prefix)))
}

/// Signed `±hhmm` or `±hh:mm` offset in milliseconds
fn parse_offset(text: &str) -> Option<f64> {
    let (sign, rest) = match text.as_bytes().first()? {
        b'+' => (1.0, text.get(1..)?),
        b'-' => (-1.0, text.get(1..)?),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hh: f64 = digits.get(..2)?.parse().ok()?;
    let mm: f64 = digits.get(2..)?.parse().ok()?;
    Some(sign * (hh * MS_PER_HOUR + mm * MS_PER_MINUTE))
}

/// `hh:mm[:ss[.mmm]]`
fn parse_clock(text: &str) -> Option<(f64, f64, f64, f64)> {
    let mut parts = text.split(':');
    let hour: f64 = parts.next()?.parse().ok()?;
    let minute: f64 = parts.next()?.parse().ok()?;
    let (second, ms) = match parts.next() {
        Some(sec) => match sec.split_once('.') {
            Some((s, frac)) => {
                let frac = format!("{frac:0<3}");
                (s.parse().ok()?, frac.get(..3)?.parse().ok()?)
            }
            None => (sec.parse().ok()?, 0.0),
        },
        None => (0.0, 0.0),
    };
    if parts.next().is_some() || hour > 24.0 || minute > 59.0 || second > 59.0 {
        return None;
    }
    Some((hour, minute, second, ms))
}

/// Loose formats such as `Tue Mar 05 2024 10:30:00 GMT+0100`,
/// `Tue, 05 Mar 2024 10:30:00 GMT`, `March 5, 2024` and `3/5/2024 10:30 PM`
fn parse_legacy(s: &str) -> Option<ParsedDate> {
    let mut text = String::with_capacity(s.len());
    let mut depth = 0usize;
    for ch in s.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => text.push(' '),
            _ if depth == 0 => text.push(ch),
            _ => {}
        }
    }

    let (mut year, mut month, mut day) = (None, None, None);
    let mut clock = None;
    let mut offset: Option<f64> = None;
    let mut pm: Option<bool> = None;
    for token in text.split_whitespace() {
        let upper = token.to_ascii_uppercase();
        if upper == "AM" || upper == "PM" {
            pm = Some(upper == "PM");
        } else if let Some(rest) = upper.strip_prefix("GMT").or_else(|| upper.strip_prefix("UTC")) {
            offset = Some(if rest.is_empty() { 0.0 } else { parse_offset(rest)? });
        } else if upper == "Z" {
            offset = Some(0.0);
        } else if token.contains(':') {
            clock = Some(parse_clock(token)?);
        } else if (token.starts_with('+') || token.starts_with('-')) && clock.is_some() {
            offset = Some(parse_offset(token)?);
        } else if token.contains('/') {
            let mut parts = token.split('/');
            month = Some(parts.next()?.parse::<i64>().ok()? - 1);
            day = Some(parts.next()?.parse::<i64>().ok()?);
            if let Some(y) = parts.next() {
                year = Some(y.parse::<i64>().ok()?);
            }
        } else if token.bytes().all(|b| b.is_ascii_digit()) {
            let n: i64 = token.parse().ok()?;
            if day.is_none() && n <= 31 && token.len() <= 2 {
                day = Some(n);
            } else if year.is_none() {
                year = Some(n);
            } else {
                return None;
            }
        } else if token.starts_with('-') && token.len() > 1 {
            year = Some(token.parse::<i64>().ok()?);
        } else if let Some(m) = month_from_name(token) {
            month = Some(m);
        } else if !is_weekday_name(token) {
            return None;
        }
    }

    let year = year?;
    let year = match year {
        0..=49 => 2000 + year,
        50..=99 => 1900 + year,
        y => y,
    };
    let month = month?;
    let day = day.unwrap_or(1);
    if !(0..12).contains(&month) || day < 1 || day > days_in_month(year, month + 1) {
        return None;
    }
    let (mut hour, minute, second, ms) = clock.unwrap_or((0.0, 0.0, 0.0, 0.0));
    match pm {
        Some(true) if hour < 12.0 => hour += 12.0,
        Some(false) if hour == 12.0 => hour = 0.0,
        _ => {}
    }
    let wall = make_date(
        days_from_civil(year, month + 1, day) as f64,
        make_time(hour, minute, second, ms),
    );
    Some(match offset {
        Some(off) => ParsedDate {
            time: wall - off,
            local: false,
        },
        None => ParsedDate { time: wall, local: true },
    })
}

/// `Date.parse` semantics on a string
fn parse_to_time_value(interp: &Interpreter, s: &str) -> f64 {
    match parse_date(s) {
        Some(ParsedDate { time, local: true }) => time_clip(utc_time(interp, time)),
        Some(ParsedDate { time, local: false }) => time_clip(time),
        None => f64::NAN,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Formatting
// ═══════════════════════════════════════════════════════════════════════════════

fn weekday_name(f: &Fields) -> &'static str {
    WEEKDAYS.get(f.weekday as usize).copied().unwrap_or("")
}

fn month_name(f: &Fields) -> &'static str {
    MONTHS.get(f.month as usize).copied().unwrap_or("")
}

fn display_year(year: i64) -> String {
    if year < 0 {
        format!("-{:04}", -year)
    } else {
        format!("{year:04}")
    }
}

/// `GMT+0100`-style zone suffix
fn zone_suffix(offset_minutes: i32) -> String {
    let sign = if offset_minutes < 0 { '-' } else { '+' };
    let abs = offset_minutes.unsigned_abs();
    let name = if offset_minutes == 0 { " (Coordinated Universal Time)" } else { "" };
    format!("GMT{sign}{:02}{:02}{name}", abs / 60, abs % 60)
}

pub fn format_iso(t: f64) -> String {
    let f = Fields::from_time(t);
    let year = if (0..=9999).contains(&f.year) {
        format!("{:04}", f.year)
    } else if f.year < 0 {
        format!("-{:06}", -f.year)
    } else {
        format!("+{:06}", f.year)
    };
    format!(
        "{year}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        f.month + 1,
        f.day,
        f.hour,
        f.minute,
        f.second,
        f.ms
    )
}

fn format_date_part(f: &Fields) -> String {
    format!("{} {} {:02} {}", weekday_name(f), month_name(f), f.day, display_year(f.year))
}

fn format_time_part(f: &Fields, offset_minutes: i32) -> String {
    format!(
        "{:02}:{:02}:{:02} {}",
        f.hour,
        f.minute,
        f.second,
        zone_suffix(offset_minutes)
    )
}

fn format_utc(t: f64) -> String {
    let f = Fields::from_time(t);
    format!(
        "{}, {:02} {} {} {:02}:{:02}:{:02} GMT",
        weekday_name(&f),
        f.day,
        month_name(&f),
        display_year(f.year),
        f.hour,
        f.minute,
        f.second
    )
}

fn format_locale_date(f: &Fields) -> String {
    format!("{}/{}/{}", f.month + 1, f.day, f.year)
}

fn format_locale_time(f: &Fields) -> String {
    let (hour, suffix) = match f.hour {
        0 => (12, "AM"),
        h if h < 12 => (h, "AM"),
        12 => (12, "PM"),
        h => (h - 12, "PM"),
    };
    format!("{hour}:{:02}:{:02} {suffix}", f.minute, f.second)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constructor and statics
// ═══════════════════════════════════════════════════════════════════════════════

fn now(interp: &Interpreter) -> f64 {
    time_clip(interp.time.now_millis())
}

/// Date(...): a string when called, an object when constructed
fn date_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let nt = interp.new_target.clone();
    if nt.is_undefined() {
        let t = now(interp);
        return Ok(JsValue::from(to_date_string(interp, t)));
    }
    let t = match args {
        [] => now(interp),
        [value] => {
            let existing = match value {
                JsValue::Object(o) => match o.borrow().kind {
                    ObjectKind::Date(t) => Some(t),
                    _ => None,
                },
                _ => None,
            };
            match existing {
                Some(t) => t,
                None => match interp.to_primitive(value, Hint::Default)? {
                    JsValue::String(s) => parse_to_time_value(interp, &s.to_std_string()),
                    prim => time_clip(interp.to_number(&prim)?),
                },
            }
        }
        _ => {
            let wall = time_from_components(interp, args)?;
            time_clip(utc_time(interp, wall))
        }
    };
    let proto = interp.get_prototype_from_constructor(&nt, Intrinsic::DatePrototype)?;
    Ok(JsValue::Object(interp.alloc(JsObject::new(ObjectKind::Date(t), Some(proto)))))
}

/// Date.now()
fn date_now(interp: &mut Interpreter, _this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::number(now(interp)))
}

/// Date.parse(string)
fn date_parse(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = interp.to_string(&arg(args, 0))?;
    Ok(JsValue::number(parse_to_time_value(interp, &s.to_std_string())))
}

/// Date.UTC(year, month, ...)
fn date_utc(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let t = time_from_components(interp, args)?;
    Ok(JsValue::number(time_clip(t)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Date.prototype
// ═══════════════════════════════════════════════════════════════════════════════

fn this_date(this: &JsValue, method: &str) -> Result<(JsObjectRef, f64), JsError> {
    if let JsValue::Object(o) = this {
        if let ObjectKind::Date(t) = o.borrow().kind {
            return Ok((o.clone(), t));
        }
    }
    Err(JsError::type_error(format!(
        "Method Date.prototype.{method} called on incompatible receiver {}",
        this.display_hint()
    )))
}

fn this_time_value(this: &JsValue, method: &str) -> Result<f64, JsError> {
    this_date(this, method).map(|(_, t)| t)
}

fn store(obj: &JsObjectRef, t: f64) {
    if let ObjectKind::Date(slot) = &mut obj.borrow_mut().kind {
        *slot = t;
    }
}

fn date_get_time(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::number(this_time_value(&this, "getTime")?))
}

fn date_get_timezone_offset(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let t = this_time_value(&this, "getTimezoneOffset")?;
    if t.is_nan() {
        return Ok(JsValue::number(f64::NAN));
    }
    Ok(JsValue::number((t - local_time(interp, t)) / MS_PER_MINUTE))
}

macro_rules! date_getters {
    ($($name:ident => $method:literal, $local:expr, $field:ident;)*) => {
        $(
            fn $name(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
                let t = this_time_value(&this, $method)?;
                if t.is_nan() {
                    return Ok(JsValue::number(f64::NAN));
                }
                let t = if $local { local_time(interp, t) } else { t };
                Ok(JsValue::number(Fields::from_time(t).$field as f64))
            }
        )*
    };
}

date_getters! {
    date_get_full_year => "getFullYear", true, year;
    date_get_month => "getMonth", true, month;
    date_get_date => "getDate", true, day;
    date_get_day => "getDay", true, weekday;
    date_get_hours => "getHours", true, hour;
    date_get_minutes => "getMinutes", true, minute;
    date_get_seconds => "getSeconds", true, second;
    date_get_milliseconds => "getMilliseconds", true, ms;
    date_get_utc_full_year => "getUTCFullYear", false, year;
    date_get_utc_month => "getUTCMonth", false, month;
    date_get_utc_date => "getUTCDate", false, day;
    date_get_utc_day => "getUTCDay", false, weekday;
    date_get_utc_hours => "getUTCHours", false, hour;
    date_get_utc_minutes => "getUTCMinutes", false, minute;
    date_get_utc_seconds => "getUTCSeconds", false, second;
    date_get_utc_milliseconds => "getUTCMilliseconds", false, ms;
}

/// Date.prototype.setTime(time)
fn date_set_time(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (obj, _) = this_date(&this, "setTime")?;
    let t = time_clip(interp.to_number(&arg(args, 0))?);
    store(&obj, t);
    Ok(JsValue::number(t))
}

/// Shared body of the component setters. `first` indexes the field the
/// first argument replaces (0 = year .. 6 = ms); at most `max` fields are
/// replaced, and only as many as were passed.
fn set_fields(
    interp: &mut Interpreter,
    this: &JsValue,
    args: &[JsValue],
    method: &str,
    local: bool,
    first: usize,
    max: usize,
) -> Result<JsValue, JsError> {
    let (obj, t) = this_date(this, method)?;
    let count = args.len().clamp(1, max);
    let mut replacements = Vec::with_capacity(count);
    for i in 0..count {
        replacements.push(interp.to_number(&arg(args, i))?);
    }
    let base = match (t.is_nan(), first) {
        (true, 0) => 0.0,
        (true, _) => return Ok(JsValue::number(f64::NAN)),
        (false, _) if local => local_time(interp, t),
        (false, _) => t,
    };
    let mut fields = Fields::from_time(base).as_numbers();
    for (slot, value) in fields.iter_mut().skip(first).zip(replacements) {
        *slot = value;
    }
    let [year, month, day, hour, min, sec, ms] = fields;
    let wall = make_date(make_day(year, month, day), make_time(hour, min, sec, ms));
    let new_time = time_clip(if local { utc_time(interp, wall) } else { wall });
    store(&obj, new_time);
    Ok(JsValue::number(new_time))
}

macro_rules! date_setters {
    ($($name:ident => $method:literal, $local:expr, $first:expr, $max:expr;)*) => {
        $(
            fn $name(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
                set_fields(interp, &this, args, $method, $local, $first, $max)
            }
        )*
    };
}

date_setters! {
    date_set_full_year => "setFullYear", true, 0, 3;
    date_set_month => "setMonth", true, 1, 2;
    date_set_date => "setDate", true, 2, 1;
    date_set_hours => "setHours", true, 3, 4;
    date_set_minutes => "setMinutes", true, 4, 3;
    date_set_seconds => "setSeconds", true, 5, 2;
    date_set_milliseconds => "setMilliseconds", true, 6, 1;
    date_set_utc_full_year => "setUTCFullYear", false, 0, 3;
    date_set_utc_month => "setUTCMonth", false, 1, 2;
    date_set_utc_date => "setUTCDate", false, 2, 1;
    date_set_utc_hours => "setUTCHours", false, 3, 4;
    date_set_utc_minutes => "setUTCMinutes", false, 4, 3;
    date_set_utc_seconds => "setUTCSeconds", false, 5, 2;
    date_set_utc_milliseconds => "setUTCMilliseconds", false, 6, 1;
}

/// Date.prototype.toISOString()
fn date_to_iso_string(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let t = this_time_value(&this, "toISOString")?;
    if t.is_nan() {
        return Err(JsError::range_error("Invalid time value"));
    }
    Ok(JsValue::from(format_iso(t)))
}

/// Date.prototype.toJSON(key): generic over any object with `toISOString`
fn date_to_json(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&this)?;
    let tv = interp.to_primitive(&JsValue::Object(obj.clone()), Hint::Number)?;
    if tv.as_number().is_some_and(|n| !n.is_finite()) {
        return Ok(JsValue::Null);
    }
    interp.invoke(&JsValue::Object(obj), &PropertyKey::from("toISOString"), &[])
}

fn to_date_string(interp: &Interpreter, t: f64) -> String {
    if t.is_nan() {
        return "Invalid Date".to_string();
    }
    let offset = interp.time.local_offset_minutes(t);
    let f = Fields::from_time(local_time(interp, t));
    format!("{} {}", format_date_part(&f), format_time_part(&f, offset))
}

/// String conversions that render "Invalid Date" for NaN
macro_rules! date_formatters {
    ($($name:ident => $method:literal, |$interp:ident, $t:ident| $body:expr;)*) => {
        $(
            fn $name($interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
                let $t = this_time_value(&this, $method)?;
                if $t.is_nan() {
                    return Ok(JsValue::from("Invalid Date"));
                }
                Ok(JsValue::from($body))
            }
        )*
    };
}

date_formatters! {
    date_to_string => "toString", |interp, t| to_date_string(interp, t);
    date_to_date_string => "toDateString", |interp, t| format_date_part(&Fields::from_time(local_time(interp, t)));
    date_to_time_string => "toTimeString", |interp, t| {
        let offset = interp.time.local_offset_minutes(t);
        format_time_part(&Fields::from_time(local_time(interp, t)), offset)
    };
    date_to_utc_string => "toUTCString", |_interp, t| format_utc(t);
    date_to_locale_string => "toLocaleString", |interp, t| {
        let f = Fields::from_time(local_time(interp, t));
        format!("{}, {}", format_locale_date(&f), format_locale_time(&f))
    };
    date_to_locale_date_string => "toLocaleDateString", |interp, t| format_locale_date(&Fields::from_time(local_time(interp, t)));
    date_to_locale_time_string => "toLocaleTimeString", |interp, t| format_locale_time(&Fields::from_time(local_time(interp, t)));
}

/// Date.prototype[@@toPrimitive](hint): "default" behaves as "string"
fn date_to_primitive(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let JsValue::Object(obj) = &this else {
        return Err(JsError::type_error("Date.prototype[Symbol.toPrimitive] called on non-object"));
    };
    let order = match arg(args, 0) {
        JsValue::String(s) if s == "string" || s == "default" => ["toString", "valueOf"],
        JsValue::String(s) if s == "number" => ["valueOf", "toString"],
        _ => return Err(JsError::type_error("Invalid hint")),
    };
    for name in order {
        let method = interp.get(obj, &PropertyKey::from(name))?;
        if method.is_callable() {
            let result = interp.call_function(&method, this.clone(), &[])?;
            if !result.is_object() {
                return Ok(result);
            }
        }
    }
    Err(JsError::type_error("Cannot convert object to primitive value"))
}
