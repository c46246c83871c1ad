//! Font resources
//!
//! Just enough of a PDF font dictionary to turn string operands into text and
//! advance widths: the base font name, glyph widths and an optional ToUnicode
//! map. Glyph outlines are never read.

use lopdf::{Dictionary, Document, Object};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Advance used when a font carries no width table, in em
pub const FALLBACK_GLYPH_WIDTH: f64 = 0.5;
/// Advance of a space when a font carries no width table, in em
pub const FALLBACK_SPACE_WIDTH: f64 = 0.25;

const MAX_REFERENCE_DEPTH: usize = 16;

/// Highest code a two-byte string can carry
const MAX_CID: u32 = 0xFFFF;

static HEX_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<([0-9A-Fa-f]*)>").unwrap());
static BFCHAR_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)beginbfchar(.*?)endbfchar").unwrap());
static BFRANGE_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)beginbfrange(.*?)endbfrange").unwrap());
static BFRANGE_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*(<[0-9A-Fa-f]*>|\[[^\]]*\])").unwrap()
});

/// One decoded glyph from a string operand
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub code: u32,
    pub text: String,
    /// Horizontal advance in em (text-space units before scaling by size)
    pub width: f64,
    /// Single-byte code 32; word spacing applies to these only
    pub is_space: bool,
}

#[derive(Debug, Clone)]
pub struct FontInfo {
    /// BaseFont with any subset tag removed
    pub family: String,
    first_char: u32,
    /// Widths in glyph-space units (1/1000 em)
    widths: Vec<f64>,
    /// Per-CID widths for composite fonts
    cid_widths: HashMap<u32, f64>,
    default_width: Option<f64>,
    two_byte: bool,
    to_unicode: HashMap<u32, String>,
}

impl FontInfo {
    /// Stand-in for a font resource that is missing or unreadable
    pub fn fallback(name: &str) -> Self {
        Self {
            family: strip_subset_tag(name).to_string(),
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: None,
            two_byte: false,
            to_unicode: HashMap::new(),
        }
    }

    pub fn from_dictionary(doc: &Document, dict: &Dictionary) -> Self {
        let base_font = dict
            .get(b"BaseFont")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_else(|| "Unknown".to_string());

        let subtype = dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .unwrap_or_default();

        let mut font = Self::fallback(&base_font);
        font.family = clean_family(&base_font);

        if subtype == b"Type0" {
            font.two_byte = true;
            if let Some(descendant) = descendant_font(doc, dict) {
                font.default_width = descendant
                    .get(b"DW")
                    .ok()
                    .and_then(|o| number(resolve(doc, o)))
                    .or(Some(1000.0));
                if let Ok(w) = descendant.get(b"W") {
                    if let Ok(entries) = resolve(doc, w).as_array() {
                        font.cid_widths = parse_cid_widths(doc, entries);
                    }
                }
            }
        } else {
            font.first_char = dict
                .get(b"FirstChar")
                .ok()
                .and_then(|o| number(resolve(doc, o)))
                .map(|n| n.max(0.0) as u32)
                .unwrap_or(0);
            if let Ok(widths) = dict.get(b"Widths") {
                if let Ok(entries) = resolve(doc, widths).as_array() {
                    font.widths = entries
                        .iter()
                        .map(|o| number(resolve(doc, o)).unwrap_or(0.0))
                        .collect();
                }
            }
            font.default_width = dict
                .get(b"FontDescriptor")
                .ok()
                .and_then(|o| resolve(doc, o).as_dict().ok())
                .and_then(|d| d.get(b"MissingWidth").ok())
                .and_then(|o| number(resolve(doc, o)))
                .filter(|w| *w > 0.0);
        }

        if let Ok(to_unicode) = dict.get(b"ToUnicode") {
            if let Ok(stream) = resolve(doc, to_unicode).as_stream() {
                let data = if stream.dict.has(b"Filter") {
                    stream.decompressed_content().ok()
                } else {
                    Some(stream.content.clone())
                };
                match data {
                    Some(data) => font.to_unicode = parse_to_unicode(&data),
                    None => tracing::debug!(font = %font.family, "Unreadable ToUnicode stream"),
                }
            }
        }

        font
    }

    pub fn is_two_byte(&self) -> bool {
        self.two_byte
    }

    /// Decode a string operand into glyphs with their advances.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| {
                    let code = pair.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
                    let text = self.to_unicode.get(&code).cloned().unwrap_or_else(|| {
                        char::from_u32(code)
                            .filter(|c| !c.is_control())
                            .map(String::from)
                            .unwrap_or_default()
                    });
                    Glyph {
                        code,
                        width: self.advance(code),
                        is_space: false,
                        text,
                    }
                })
                .collect()
        } else {
            bytes
                .iter()
                .map(|b| {
                    let code = u32::from(*b);
                    let text = self
                        .to_unicode
                        .get(&code)
                        .cloned()
                        .unwrap_or_else(|| winansi_char(*b).map(String::from).unwrap_or_default());
                    Glyph {
                        code,
                        width: self.advance(code),
                        is_space: code == 32,
                        text,
                    }
                })
                .collect()
        }
    }

    /// Advance of a glyph in em
    fn advance(&self, code: u32) -> f64 {
        let thousandths = if self.two_byte {
            self.cid_widths.get(&code).copied().or(self.default_width)
        } else if self.widths.is_empty() {
            None
        } else {
            code.checked_sub(self.first_char)
                .and_then(|i| self.widths.get(i as usize).copied())
                .or(self.default_width)
        };
        match thousandths {
            Some(w) => w / 1000.0,
            None if !self.two_byte && code == 32 => FALLBACK_SPACE_WIDTH,
            None => FALLBACK_GLYPH_WIDTH,
        }
    }
}

/// Follow indirect references until a direct object is reached.
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    let mut current = object;
    for _ in 0..MAX_REFERENCE_DEPTH {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(target) => current = target,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

/// Numeric value of an Integer or Real object
pub fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Remove a `ABCDEF+` subset tag from a font name.
pub fn strip_subset_tag(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest))
            if tag.len() == 6 && tag.chars().all(|c| c.is_ascii_uppercase()) =>
        {
            rest
        }
        _ => name,
    }
}

/// Family name as reported on spans: subset tag and CMap suffix removed.
fn clean_family(base_font: &str) -> String {
    let name = strip_subset_tag(base_font);
    let name = name
        .strip_suffix("-Identity-H")
        .or_else(|| name.strip_suffix("-Identity-V"))
        .unwrap_or(name);
    name.to_string()
}

fn descendant_font<'a>(doc: &'a Document, dict: &'a Dictionary) -> Option<&'a Dictionary> {
    let descendants = resolve(doc, dict.get(b"DescendantFonts").ok()?).as_array().ok()?;
    resolve(doc, descendants.first()?).as_dict().ok()
}

/// Parse a CIDFont `W` array: `c [w1 w2 ...]` and `cfirst clast w` forms.
/// Entries beyond the two-byte code space are skipped.
fn parse_cid_widths(doc: &Document, entries: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < entries.len() {
        let Some(first) = number(resolve(doc, &entries[i])) else {
            break;
        };
        match entries.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                if let Some(first) = cid(first) {
                    for (offset, w) in list.iter().enumerate() {
                        let code = u32::try_from(offset)
                            .ok()
                            .and_then(|offset| first.checked_add(offset))
                            .filter(|code| *code <= MAX_CID);
                        let Some(code) = code else {
                            break;
                        };
                        if let Some(w) = number(resolve(doc, w)) {
                            widths.insert(code, w);
                        }
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(w)) = (
                    number(last),
                    entries.get(i + 2).and_then(|o| number(resolve(doc, o))),
                ) else {
                    break;
                };
                if let (Some(first), Some(last)) = (cid(first), cid(last)) {
                    for code in first..=last {
                        widths.insert(code, w);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

/// A `W` array code, if it fits the two-byte code space
fn cid(value: f64) -> Option<u32> {
    (0.0..=f64::from(MAX_CID))
        .contains(&value)
        .then(|| value as u32)
}

/// Parse the bfchar and bfrange sections of a ToUnicode CMap.
pub fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let content = String::from_utf8_lossy(data);
    let mut map = HashMap::new();

    for section in BFCHAR_SECTION.captures_iter(&content) {
        let tokens: Vec<&str> = HEX_TOKEN
            .captures_iter(&section[1])
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        for pair in tokens.chunks_exact(2) {
            if let (Some(src), Some(dst)) = (parse_hex_code(pair[0]), decode_utf16_hex(pair[1])) {
                map.insert(src, dst);
            }
        }
    }

    for section in BFRANGE_SECTION.captures_iter(&content) {
        for entry in BFRANGE_ENTRY.captures_iter(&section[1]) {
            let (Some(start), Some(end)) = (parse_hex_code(&entry[1]), parse_hex_code(&entry[2]))
            else {
                continue;
            };
            if end < start || end - start > 0xFFFF {
                continue;
            }
            let target = &entry[3];
            if target.starts_with('[') {
                let names: Vec<&str> = HEX_TOKEN
                    .captures_iter(target)
                    .filter_map(|c| c.get(1).map(|m| m.as_str()))
                    .collect();
                for (code, dst) in (start..=end).zip(names) {
                    if let Some(text) = decode_utf16_hex(dst) {
                        map.insert(code, text);
                    }
                }
            } else {
                let hex = target.trim_matches(|c| c == '<' || c == '>');
                let Some(units) = hex_to_utf16(hex) else {
                    continue;
                };
                for (offset, code) in (start..=end).enumerate() {
                    let mut shifted = units.clone();
                    if let Some(last) = shifted.last_mut() {
                        *last = last.wrapping_add(offset as u16);
                    }
                    map.insert(code, String::from_utf16_lossy(&shifted));
                }
            }
        }
    }

    map
}

fn parse_hex_code(hex: &str) -> Option<u32> {
    if hex.is_empty() || hex.len() > 8 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

fn hex_to_utf16(hex: &str) -> Option<Vec<u16>> {
    if hex.is_empty() {
        return None;
    }
    // Odd-length tokens are padded with a trailing zero
    let padded = if hex.len() % 2 == 1 {
        format!("{hex}0")
    } else {
        hex.to_string()
    };
    let bytes: Vec<u8> = (0..padded.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&padded[i..i + 2], 16))
        .collect::<Result<_, _>>()
        .ok()?;
    if bytes.len() == 1 {
        return Some(vec![u16::from(bytes[0])]);
    }
    Some(
        bytes
            .chunks(2)
            .map(|c| u16::from_be_bytes([c[0], *c.get(1).unwrap_or(&0)]))
            .collect(),
    )
}

fn decode_utf16_hex(hex: &str) -> Option<String> {
    hex_to_utf16(hex).map(|units| String::from_utf16_lossy(&units))
}

/// WinAnsiEncoding for single-byte codes; Latin-1 outside the 0x80-0x9F block.
pub fn winansi_char(byte: u8) -> Option<char> {
    let c = match byte {
        0x00..=0x1F | 0x7F => return None,
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        0x81 | 0x8D | 0x8F | 0x90 | 0x9D => return None,
        other => char::from(other),
    };
    Some(c)
}
