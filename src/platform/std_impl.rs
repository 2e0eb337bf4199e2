//! Standard library implementations of the platform traits.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use super::{ConsoleLevel, ConsoleProvider, RandomProvider, TimeProvider};

#[cfg(feature = "regex")]
use super::{CompiledRegex, RegExpProvider, RegexMatch};
#[cfg(feature = "regex")]
use std::rc::Rc;

// ═══════════════════════════════════════════════════════════════════════════════
// Time
// ═══════════════════════════════════════════════════════════════════════════════

/// Time provider using std::time.
pub struct StdTimeProvider {
    /// Reference instant for timer calculations
    epoch: Instant,
}

impl StdTimeProvider {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for StdTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for StdTimeProvider {
    fn now_millis(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as f64)
            .unwrap_or(0.0)
    }

    fn elapsed_millis(&self, start: u64) -> u64 {
        let now = self.epoch.elapsed().as_millis() as u64;
        now.saturating_sub(start)
    }

    fn start_timer(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// Wall clock backed by a host closure (`Runtime::set_time_source`).
/// Timers still use the monotonic clock.
pub struct FnTimeProvider {
    now: Box<dyn Fn() -> f64>,
    offset_minutes: i32,
    epoch: Instant,
}

impl FnTimeProvider {
    pub fn new(now: impl Fn() -> f64 + 'static) -> Self {
        Self {
            now: Box::new(now),
            offset_minutes: 0,
            epoch: Instant::now(),
        }
    }

    /// Report a fixed local time zone offset
    pub fn with_offset_minutes(mut self, minutes: i32) -> Self {
        self.offset_minutes = minutes;
        self
    }
}

impl TimeProvider for FnTimeProvider {
    fn now_millis(&self) -> f64 {
        (self.now)()
    }

    fn local_offset_minutes(&self, _utc_millis: f64) -> i32 {
        self.offset_minutes
    }

    fn elapsed_millis(&self, start: u64) -> u64 {
        (self.epoch.elapsed().as_millis() as u64).saturating_sub(start)
    }

    fn start_timer(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Randomness
// ═══════════════════════════════════════════════════════════════════════════════

/// Random provider using a simple xorshift64 PRNG, seeded from the clock.
pub struct StdRandomProvider {
    state: u64,
}

impl StdRandomProvider {
    pub fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x12345678_9abcdef0);
        Self::with_seed(seed)
    }

    /// Deterministic sequence for tests
    pub fn with_seed(seed: u64) -> Self {
        let seed = if seed == 0 { 0x12345678_9abcdef0 } else { seed };
        Self { state: seed }
    }
}

impl Default for StdRandomProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomProvider for StdRandomProvider {
    fn random(&mut self) -> f64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;

        // upper 53 bits
        let mantissa = x >> 11;
        (mantissa as f64) / ((1u64 << 53) as f64)
    }
}

/// Random source backed by a host closure (`Runtime::set_rand_source`).
/// Values outside `[0, 1)` are folded back into range.
pub struct FnRandomProvider {
    source: Box<dyn FnMut() -> f64>,
}

impl FnRandomProvider {
    pub fn new(source: impl FnMut() -> f64 + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }
}

impl RandomProvider for FnRandomProvider {
    fn random(&mut self) -> f64 {
        let v = (self.source)();
        if v.is_finite() {
            let r = v.rem_euclid(1.0);
            if r < 1.0 { r } else { 0.0 }
        } else {
            0.0
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Console
// ═══════════════════════════════════════════════════════════════════════════════

/// Console provider using std print macros.
///
/// Writes to stdout for Log/Info/Debug and stderr for Warn/Error.
#[derive(Debug, Default)]
pub struct StdConsoleProvider;

impl StdConsoleProvider {
    pub fn new() -> Self {
        Self
    }
}

impl ConsoleProvider for StdConsoleProvider {
    fn write(&self, level: ConsoleLevel, message: &str) {
        match level {
            ConsoleLevel::Log | ConsoleLevel::Info | ConsoleLevel::Debug => {
                println!("{message}");
            }
            ConsoleLevel::Warn | ConsoleLevel::Error => {
                eprintln!("{message}");
            }
        }
    }
}

/// Default console: every line becomes a `tracing` event under the
/// `esrun::console` target.
#[derive(Debug, Default)]
pub struct TracingConsoleProvider;

impl TracingConsoleProvider {
    pub fn new() -> Self {
        Self
    }
}

impl ConsoleProvider for TracingConsoleProvider {
    fn write(&self, level: ConsoleLevel, message: &str) {
        match level {
            ConsoleLevel::Log | ConsoleLevel::Info => {
                tracing::info!(target: "esrun::console", "{message}")
            }
            ConsoleLevel::Debug => tracing::debug!(target: "esrun::console", "{message}"),
            ConsoleLevel::Warn => tracing::warn!(target: "esrun::console", "{message}"),
            ConsoleLevel::Error => tracing::error!(target: "esrun::console", "{message}"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FancyRegexProvider - RegExp implementation using fancy-regex crate
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "regex")]
pub use regex_impl::FancyRegexProvider;

#[cfg(feature = "regex")]
mod regex_impl {
    use super::*;

    /// RegExp provider using the `fancy-regex` crate.
    ///
    /// Supports lookahead, lookbehind, backreferences and named groups.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct FancyRegexProvider;

    impl FancyRegexProvider {
        pub fn new() -> Self {
            Self
        }
    }

    /// Compiled regex wrapping fancy_regex::Regex.
    #[derive(Debug)]
    struct FancyCompiledRegex {
        regex: fancy_regex::Regex,
    }

    impl CompiledRegex for FancyCompiledRegex {
        fn find(&self, input: &str, start: usize) -> Result<Option<RegexMatch>, String> {
            if start > input.len() {
                return Ok(None);
            }
            match self.regex.captures_from_pos(input, start) {
                Ok(Some(caps)) => {
                    let whole = caps.get(0).ok_or("match without group 0")?;
                    let captures = caps.iter().map(|m| m.map(|c| (c.start(), c.end()))).collect();
                    Ok(Some(RegexMatch {
                        start: whole.start(),
                        end: whole.end(),
                        captures,
                    }))
                }
                Ok(None) => Ok(None),
                Err(e) => Err(e.to_string()),
            }
        }

        fn group_names(&self) -> Vec<Option<String>> {
            self.regex
                .capture_names()
                .map(|n| n.map(str::to_string))
                .collect()
        }
    }

    impl RegExpProvider for FancyRegexProvider {
        fn compile(&self, pattern: &str, flags: &str) -> Result<Rc<dyn CompiledRegex>, String> {
            let mut regex_pattern = js_regex_to_rust(pattern, flags.contains('u'))?;

            let mut prefix = String::new();
            if flags.contains('i') {
                prefix.push('i');
            }
            if flags.contains('m') {
                prefix.push('m');
            }
            if flags.contains('s') {
                prefix.push('s');
            }
            if !prefix.is_empty() {
                regex_pattern = format!("(?{prefix}){regex_pattern}");
            }

            let regex = fancy_regex::Regex::new(&regex_pattern)
                .map_err(|e| format!("Invalid regular expression: /{pattern}/{flags}: {e}"))?;
            Ok(Rc::new(FancyCompiledRegex { regex }))
        }
    }

    /// Convert a JavaScript pattern to fancy-regex syntax.
    ///
    /// - `\d`, `\w` and their negations are ASCII-only, as in JS
    /// - `[]` never matches and `[^]` matches anything
    /// - `[`, `&` and `~` are literal inside classes
    /// - a `{` that does not start a quantifier is a literal
    /// - `\uXXXX`, `\u{X}`, `\cX` and `\0` become `\x{..}`
    pub(crate) fn js_regex_to_rust(pattern: &str, unicode: bool) -> Result<String, String> {
        let chars: Vec<char> = pattern.chars().collect();
        let mut out = String::with_capacity(pattern.len() + 16);
        let mut i = 0;
        let mut in_class = false;
        let mut class_start = false;

        while let Some(&c) = chars.get(i) {
            if c == '\\' {
                let Some(&next) = chars.get(i + 1) else {
                    return Err("\\ at end of pattern".to_string());
                };
                i += 2;
                class_start = false;
                match next {
                    'd' => out.push_str(if in_class { "0-9" } else { "[0-9]" }),
                    'D' => out.push_str(if in_class { "\\D" } else { "[^0-9]" }),
                    'w' => out.push_str(if in_class { "A-Za-z0-9_" } else { "[A-Za-z0-9_]" }),
                    'W' => out.push_str(if in_class { "\\W" } else { "[^A-Za-z0-9_]" }),
                    'u' => {
                        let (cp, used) = parse_unicode_escape(&chars, i, unicode);
                        match cp {
                            Some(cp) => {
                                out.push_str(&format!("\\x{{{cp:X}}}"));
                                i += used;
                            }
                            None => out.push('u'),
                        }
                    }
                    'c' => match chars.get(i).copied().filter(char::is_ascii_alphabetic) {
                        Some(letter) => {
                            out.push_str(&format!("\\x{{{:X}}}", (letter as u32) % 32));
                            i += 1;
                        }
                        None => out.push_str("\\\\c"),
                    },
                    '0' if !chars.get(i).is_some_and(char::is_ascii_digit) => {
                        out.push_str("\\x{0}")
                    }
                    'b' if in_class => out.push_str("\\x{8}"),
                    '/' => out.push('/'),
                    'x' => {
                        let hex: Option<Vec<u32>> =
                            (0..2).map(|k| chars.get(i + k)?.to_digit(16)).collect();
                        match hex {
                            Some(h) => {
                                out.push_str(&format!("\\x{{{:X}}}", h.iter().fold(0, |a, d| a * 16 + d)));
                                i += 2;
                            }
                            None => out.push('x'),
                        }
                    }
                    's' | 'S' | 'b' | 'B' | 'n' | 'r' | 't' | 'f' | 'v' | 'k' => {
                        out.push('\\');
                        out.push(next);
                    }
                    'p' | 'P' if unicode => {
                        out.push('\\');
                        out.push(next);
                        // property name goes through untouched, braces included
                        if chars.get(i) == Some(&'{') {
                            while let Some(&ch) = chars.get(i) {
                                out.push(ch);
                                i += 1;
                                if ch == '}' {
                                    break;
                                }
                            }
                        }
                    }
                    c if c.is_ascii_digit() => {
                        out.push('\\');
                        out.push(c);
                    }
                    c if is_meta(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                    // identity escape
                    c => out.push(c),
                }
                continue;
            }

            if in_class {
                match c {
                    '^' if class_start => {
                        i += 1;
                        if chars.get(i) == Some(&']') {
                            // [^] matches anything
                            out.push_str("\\s\\S]");
                            i += 1;
                            in_class = false;
                            class_start = false;
                        } else {
                            out.push('^');
                        }
                        continue;
                    }
                    ']' if class_start => {
                        // [] matches nothing
                        out.push_str("^\\s\\S]");
                        in_class = false;
                    }
                    ']' => {
                        out.push(']');
                        in_class = false;
                    }
                    '[' | '&' | '~' => {
                        out.push('\\');
                        out.push(c);
                    }
                    _ => out.push(c),
                }
                class_start = false;
                i += 1;
                continue;
            }

            match c {
                '[' => {
                    out.push('[');
                    in_class = true;
                    class_start = true;
                }
                '{' => {
                    if is_quantifier(&chars, i) {
                        out.push('{');
                    } else if unicode {
                        return Err("Lone quantifier brackets".to_string());
                    } else {
                        out.push_str("\\{");
                    }
                }
                '}' => {
                    // closing brace of a quantifier is emitted with the opening one
                    if quantifier_closes_here(&chars, i) {
                        out.push('}');
                    } else {
                        out.push_str("\\}");
                    }
                }
                _ => out.push(c),
            }
            i += 1;
        }
        if in_class {
            return Err("Unterminated character class".to_string());
        }
        Ok(out)
    }

    fn is_meta(c: char) -> bool {
        matches!(
            c,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '#'
                | '&' | '-' | '~'
        )
    }

    /// `{n}`, `{n,}` or `{n,m}` starting at `at`
    fn is_quantifier(chars: &[char], at: usize) -> bool {
        let mut j = at + 1;
        let mut digits = 0;
        while chars.get(j).is_some_and(char::is_ascii_digit) {
            j += 1;
            digits += 1;
        }
        if digits == 0 {
            return false;
        }
        if chars.get(j) == Some(&',') {
            j += 1;
            while chars.get(j).is_some_and(char::is_ascii_digit) {
                j += 1;
            }
        }
        chars.get(j) == Some(&'}')
    }

    /// Whether the `}` at `at` ends a quantifier opened earlier
    fn quantifier_closes_here(chars: &[char], at: usize) -> bool {
        let mut j = at;
        while j > 0 {
            j -= 1;
            match chars.get(j) {
                Some(c) if c.is_ascii_digit() || *c == ',' => continue,
                Some('{') => return is_quantifier(chars, j),
                _ => return false,
            }
        }
        false
    }

    /// Code point of `\uXXXX` or `\u{X..}` (after the `u`) and the number
    /// of characters consumed
    fn parse_unicode_escape(chars: &[char], at: usize, unicode: bool) -> (Option<u32>, usize) {
        if unicode && chars.get(at) == Some(&'{') {
            let mut j = at + 1;
            let mut value: u32 = 0;
            while let Some(d) = chars.get(j).and_then(|c| c.to_digit(16)) {
                value = value.saturating_mul(16).saturating_add(d);
                j += 1;
            }
            if chars.get(j) == Some(&'}') && j > at + 1 && value <= 0x10FFFF {
                return (Some(value), j + 1 - at);
            }
            return (None, 0);
        }
        let digits: Option<Vec<u32>> = (0..4).map(|k| chars.get(at + k)?.to_digit(16)).collect();
        match digits {
            Some(d) => (Some(d.iter().fold(0, |acc, x| acc * 16 + x)), 4),
            None => (None, 0),
        }
    }

}
