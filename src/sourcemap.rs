//! Source map consumption
//!
//! Scripts that end with `//# sourceMappingURL=...` get their positions
//! translated back to the original sources. Inline
//! `data:application/json;base64,` maps are decoded here; every other URL is
//! handed to the host's loader.

use serde::Deserialize;
use tracing::warn;

use crate::parser::ParserOptions;

const DATA_URL_PREFIX: &str = "data:application/json;base64,";
const DATA_URL_CHARSET_PREFIX: &str = "data:application/json;charset=utf-8;base64,";

#[derive(Deserialize)]
struct RawSourceMap {
    version: u32,
    #[serde(default)]
    sources: Vec<Option<String>>,
    #[serde(default, rename = "sourceRoot")]
    source_root: Option<String>,
    #[serde(default)]
    mappings: String,
}

/// One decoded mapping segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    column: u32,
    source: u32,
    line: u32,
    source_column: u32,
}

/// Original position of a generated location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition<'a> {
    pub source: &'a str,
    /// 1-based
    pub line: u32,
    /// 1-based
    pub column: u32,
}

/// A decoded version 3 source map
#[derive(Debug, Clone)]
pub struct SourceMap {
    sources: Vec<String>,
    /// Segments per generated line, sorted by generated column
    lines: Vec<Vec<Segment>>,
}

impl SourceMap {
    /// Parse a source map from its JSON text
    pub fn parse(json: &str) -> Result<SourceMap, String> {
        let raw: RawSourceMap = serde_json::from_str(json).map_err(|e| e.to_string())?;
        if raw.version != 3 {
            return Err(format!("unsupported source map version {}", raw.version));
        }
        let root = raw.source_root.unwrap_or_default();
        let sources = raw
            .sources
            .into_iter()
            .map(|s| {
                let s = s.unwrap_or_default();
                if root.is_empty() || s.contains("://") || s.starts_with('/') {
                    s
                } else if root.ends_with('/') {
                    format!("{root}{s}")
                } else {
                    format!("{root}/{s}")
                }
            })
            .collect();
        let lines = decode_mappings(&raw.mappings)?;
        Ok(SourceMap { sources, lines })
    }

    /// Translate a 1-based generated position. Falls back to the closest
    /// preceding segment on the same line.
    pub fn lookup(&self, line: u32, column: u32) -> Option<OriginalPosition<'_>> {
        let segments = self.lines.get(line.checked_sub(1)? as usize)?;
        let col = column.saturating_sub(1);
        let idx = segments.partition_point(|s| s.column <= col);
        let seg = idx.checked_sub(1).and_then(|i| segments.get(i))?;
        let source = self.sources.get(seg.source as usize)?;
        Some(OriginalPosition {
            source,
            line: seg.line + 1,
            column: seg.source_column + 1,
        })
    }
}

fn base64_digit(c: u8) -> Option<u32> {
    Some(match c {
        b'A'..=b'Z' => u32::from(c - b'A'),
        b'a'..=b'z' => u32::from(c - b'a') + 26,
        b'0'..=b'9' => u32::from(c - b'0') + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    })
}

/// Decode standard base64, ignoring padding and whitespace
pub fn decode_base64(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() * 3 / 4);
    let mut acc = 0u32;
    let mut bits = 0;
    for &c in text.as_bytes() {
        if c == b'=' || c.is_ascii_whitespace() {
            continue;
        }
        acc = (acc << 6) | base64_digit(c)?;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
            acc &= (1 << bits) - 1;
        }
    }
    Some(out)
}

/// Read one base64 VLQ value
fn read_vlq(bytes: &[u8], pos: &mut usize) -> Result<i64, String> {
    let mut result: i64 = 0;
    let mut shift = 0;
    loop {
        let c = *bytes.get(*pos).ok_or("truncated VLQ value")?;
        *pos += 1;
        let digit = base64_digit(c).ok_or_else(|| format!("invalid VLQ digit {:?}", c as char))?;
        result += i64::from(digit & 31) << shift;
        if digit & 32 == 0 {
            break;
        }
        shift += 5;
        if shift > 60 {
            return Err("VLQ value too large".to_string());
        }
    }
    let negative = result & 1 == 1;
    result >>= 1;
    Ok(if negative { -result } else { result })
}

fn decode_mappings(mappings: &str) -> Result<Vec<Vec<Segment>>, String> {
    let bytes = mappings.as_bytes();
    let mut lines = vec![Vec::new()];
    let mut pos = 0;
    let (mut source, mut line, mut source_column) = (0i64, 0i64, 0i64);
    let mut column = 0i64;
    while pos < bytes.len() {
        match bytes.get(pos) {
            Some(b';') => {
                pos += 1;
                column = 0;
                lines.push(Vec::new());
                continue;
            }
            Some(b',') => {
                pos += 1;
                continue;
            }
            _ => {}
        }
        column += read_vlq(bytes, &mut pos)?;
        let at_boundary = |pos: usize| matches!(bytes.get(pos), None | Some(b',') | Some(b';'));
        if at_boundary(pos) {
            // Unmapped segment
            continue;
        }
        source += read_vlq(bytes, &mut pos)?;
        line += read_vlq(bytes, &mut pos)?;
        source_column += read_vlq(bytes, &mut pos)?;
        if !at_boundary(pos) {
            // Name index, unused
            read_vlq(bytes, &mut pos)?;
        }
        if column < 0 || source < 0 || line < 0 || source_column < 0 {
            return Err("negative source map position".to_string());
        }
        if let Some(segments) = lines.last_mut() {
            segments.push(Segment {
                column: column as u32,
                source: source as u32,
                line: line as u32,
                source_column: source_column as u32,
            });
        }
    }
    for segments in &mut lines {
        segments.sort_by_key(|s| s.column);
    }
    Ok(lines)
}

/// Resolve and decode the map named by a script's `sourceMappingURL`
pub fn load(url: &str, source_name: &str, options: &ParserOptions) -> Option<SourceMap> {
    if options.disable_source_maps {
        return None;
    }
    let json = if let Some(encoded) = url
        .strip_prefix(DATA_URL_PREFIX)
        .or_else(|| url.strip_prefix(DATA_URL_CHARSET_PREFIX))
    {
        let Some(bytes) = decode_base64(encoded) else {
            warn!(source = source_name, "malformed base64 in inline source map");
            return None;
        };
        match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(_) => {
                warn!(source = source_name, "inline source map is not UTF-8");
                return None;
            }
        }
    } else {
        let loader = options.source_map_loader.as_ref()?;
        match loader(url, source_name) {
            Some(text) => text,
            None => {
                warn!(source = source_name, url, "source map could not be loaded");
                return None;
            }
        }
    };
    match SourceMap::parse(&json) {
        Ok(map) => Some(map),
        Err(err) => {
            warn!(source = source_name, %err, "ignoring unreadable source map");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_decodes() {
        assert_eq!(decode_base64("aGVsbG8=").as_deref(), Some(&b"hello"[..]));
        assert_eq!(decode_base64("aGk").as_deref(), Some(&b"hi"[..]));
        assert!(decode_base64("a$").is_none());
    }

    #[test]
    fn vlq_values() {
        let mut pos = 0;
        assert_eq!(read_vlq(b"A", &mut pos), Ok(0));
        pos = 0;
        assert_eq!(read_vlq(b"C", &mut pos), Ok(1));
        pos = 0;
        assert_eq!(read_vlq(b"D", &mut pos), Ok(-1));
        pos = 0;
        assert_eq!(read_vlq(b"gB", &mut pos), Ok(16));
        assert_eq!(pos, 2);
    }

    #[test]
    fn lookup_maps_generated_positions() {
        // line 1: col 0 -> a.ts 1:0; line 2: col 2 -> a.ts 3:4
        let map = SourceMap::parse(
            r#"{"version":3,"sources":["a.ts"],"names":[],"mappings":"AAAA;EAEI"}"#,
        )
        .map_err(|e| e.to_string());
        let map = match map {
            Ok(m) => m,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(
            map.lookup(1, 1),
            Some(OriginalPosition { source: "a.ts", line: 1, column: 1 })
        );
        assert_eq!(
            map.lookup(2, 10),
            Some(OriginalPosition { source: "a.ts", line: 3, column: 5 })
        );
        assert_eq!(map.lookup(2, 1), None);
        assert_eq!(map.lookup(9, 1), None);
    }

    #[test]
    fn inline_data_url() {
        let json = r#"{"version":3,"sources":["orig.js"],"mappings":"AAAA"}"#;
        let encoded = encode(json.as_bytes());
        let url = format!("{DATA_URL_PREFIX}{encoded}");
        let map = load(&url, "gen.js", &ParserOptions::default());
        assert!(map.is_some_and(|m| m.lookup(1, 1).is_some_and(|p| p.source == "orig.js")));
    }

    #[test]
    fn loader_is_consulted_for_other_urls() {
        let options = ParserOptions {
            source_map_loader: Some(std::sync::Arc::new(|url: &str, _src: &str| {
                (url == "x.map").then(|| r#"{"version":3,"sources":["x.ts"],"mappings":"AAAA"}"#.to_string())
            })),
            disable_source_maps: false,
        };
        assert!(load("x.map", "x.js", &options).is_some());
        assert!(load("y.map", "x.js", &options).is_none());
        let disabled = ParserOptions {
            disable_source_maps: true,
            ..options
        };
        assert!(load("x.map", "x.js", &disabled).is_none());
    }

    fn encode(bytes: &[u8]) -> String {
        const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
        let mut out = String::new();
        for chunk in bytes.chunks(3) {
            let b = [chunk[0], *chunk.get(1).unwrap_or(&0), *chunk.get(2).unwrap_or(&0)];
            let n = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);
            for i in 0..4 {
                if i <= chunk.len() {
                    out.push(ALPHABET[((n >> (18 - 6 * i)) & 63) as usize] as char);
                } else {
                    out.push('=');
                }
            }
        }
        out
    }
}
