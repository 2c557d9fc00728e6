use std::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrajectoryError};

// ---------------------------------------------------------------------------
// Encoding – the codecs we are willing to try, in priority order
// ---------------------------------------------------------------------------

/// Text encodings understood by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    Utf8,
    Latin1,
    Cp1252,
    Iso8859_1,
    Utf16,
}

/// How much the caller can trust the decoded text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    /// Some bytes were replaced with U+FFFD, either by the last-resort
    /// fallback or while streaming past the sniffed prefix.
    Low,
}

/// Decoded text plus the codec that produced it. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedText {
    pub text: String,
    pub encoding: Encoding,
    pub encoding_confidence: Confidence,
}

impl Encoding {
    pub const PRIORITY: [Encoding; 5] = [
        Encoding::Utf8,
        Encoding::Latin1,
        Encoding::Cp1252,
        Encoding::Iso8859_1,
        Encoding::Utf16,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Latin1 => "latin-1",
            Encoding::Cp1252 => "cp1252",
            Encoding::Iso8859_1 => "iso-8859-1",
            Encoding::Utf16 => "utf-16",
        }
    }

    /// Parse a user-supplied codec name (`utf8`, `windows-1252`, ...).
    pub fn from_label(label: &str) -> Option<Encoding> {
        let norm: String = label
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect();
        match norm.as_str() {
            "utf8" => Some(Encoding::Utf8),
            "latin1" | "l1" => Some(Encoding::Latin1),
            "cp1252" | "windows1252" => Some(Encoding::Cp1252),
            "iso88591" => Some(Encoding::Iso8859_1),
            "utf16" | "utf16le" | "utf16be" => Some(Encoding::Utf16),
            _ => None,
        }
    }

    /// Whether commas and newlines are single ASCII bytes in this codec,
    /// which the streaming parser relies on.
    pub fn is_ascii_compatible(&self) -> bool {
        !matches!(self, Encoding::Utf16)
    }

    /// Decode with the codec's own rules (no plausibility checks).
    ///
    /// `truncated` tolerates a multi-byte sequence cut at the end of `bytes`.
    fn decode(&self, bytes: &[u8], truncated: bool) -> std::result::Result<String, String> {
        match self {
            Encoding::Utf8 => decode_utf8(bytes, truncated),
            Encoding::Latin1 | Encoding::Iso8859_1 => {
                Ok(bytes.iter().map(|&b| b as char).collect())
            }
            Encoding::Cp1252 => decode_cp1252(bytes),
            Encoding::Utf16 => decode_utf16(bytes, truncated),
        }
    }

    /// Decode and reject results that are not plausible CSV text.
    ///
    /// NUL never appears in text files; Latin-1 additionally refuses the C1
    /// control range so that Windows-1252 punctuation is attributed to CP1252.
    fn decode_plausible(&self, bytes: &[u8], truncated: bool) -> Option<String> {
        let text = self.decode(bytes, truncated).ok()?;
        if text.contains('\0') {
            return None;
        }
        if *self == Encoding::Latin1 && text.chars().any(|c| ('\u{80}'..='\u{9f}').contains(&c)) {
            return None;
        }
        Some(text)
    }

    /// Decode one field in streaming mode. Only meaningful for
    /// ASCII-compatible codecs.
    ///
    /// `Err` carries the reason and the field decoded with U+FFFD in place
    /// of the bytes the codec cannot represent.
    pub fn decode_field(&self, bytes: &[u8]) -> std::result::Result<String, (String, String)> {
        self.decode(bytes, false).map_err(|reason| {
            let lossy = match self {
                Encoding::Cp1252 => bytes
                    .iter()
                    .map(|&b| cp1252_char(b).unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect(),
                _ => String::from_utf8_lossy(bytes).into_owned(),
            };
            (reason, lossy)
        })
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Pick an encoding by trial-decoding, probing a bounded prefix first.
///
/// Never fails: when no candidate yields plausible text the bytes are read as
/// Latin-1 with NULs replaced, and the result is marked [`Confidence::Low`].
pub fn resolve_encoding(bytes: &[u8], prefix_bytes: usize) -> DecodedText {
    let needs_prefix_check = bytes.len() > prefix_bytes;
    for encoding in Encoding::PRIORITY {
        if needs_prefix_check && encoding.decode_plausible(&bytes[..prefix_bytes], true).is_none() {
            debug!("{encoding} rejected by {prefix_bytes}-byte prefix");
            continue;
        }
        match encoding.decode_plausible(bytes, false) {
            Some(text) => {
                info!("Decoded {} bytes with {encoding} encoding", bytes.len());
                return DecodedText {
                    text: strip_bom(text),
                    encoding,
                    encoding_confidence: Confidence::High,
                };
            }
            None => debug!("{encoding} failed on full buffer"),
        }
    }

    warn!("All encodings failed, using latin-1 with replacement as fallback");
    DecodedText {
        text: bytes
            .iter()
            .map(|&b| if b == 0 { char::REPLACEMENT_CHARACTER } else { b as char })
            .collect(),
        encoding: Encoding::Latin1,
        encoding_confidence: Confidence::Low,
    }
}

/// Decode with a caller-chosen codec; errors if the bytes are invalid for it.
pub fn resolve_forced(bytes: &[u8], encoding: Encoding) -> Result<DecodedText> {
    let text = encoding
        .decode(bytes, false)
        .map_err(|message| TrajectoryError::Decode {
            encoding: encoding.label().to_string(),
            message,
        })?;
    Ok(DecodedText {
        text: strip_bom(text),
        encoding,
        encoding_confidence: Confidence::High,
    })
}

/// Choose an encoding from a leading sample of a stream, without decoding
/// the rest. `truncated` says whether more bytes follow the sample.
pub fn sniff_encoding(prefix: &[u8], truncated: bool) -> (Encoding, Confidence) {
    Encoding::PRIORITY
        .into_iter()
        .find(|enc| enc.decode_plausible(prefix, truncated).is_some())
        .map(|enc| (enc, Confidence::High))
        .unwrap_or((Encoding::Latin1, Confidence::Low))
}

// ---------------------------------------------------------------------------
// Codecs
// ---------------------------------------------------------------------------

fn strip_bom(text: String) -> String {
    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

fn decode_utf8(bytes: &[u8], truncated: bool) -> std::result::Result<String, String> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.to_string()),
        // error_len() == None means the input ended mid-sequence.
        Err(e) if truncated && e.error_len().is_none() => {
            Ok(String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned())
        }
        Err(e) => Err(format!("invalid byte sequence at offset {}", e.valid_up_to())),
    }
}

/// Windows-1252 assignments for 0x80..=0x9F; `None` marks undefined bytes.
#[rustfmt::skip]
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];

fn cp1252_char(b: u8) -> Option<char> {
    match b {
        0x80..=0x9F => CP1252_HIGH[(b - 0x80) as usize],
        _ => Some(b as char),
    }
}

fn decode_cp1252(bytes: &[u8]) -> std::result::Result<String, String> {
    bytes
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            cp1252_char(b).ok_or_else(|| format!("undefined byte 0x{b:02X} at offset {i}"))
        })
        .collect()
}

fn decode_utf16(bytes: &[u8], truncated: bool) -> std::result::Result<String, String> {
    let (mut body, big_endian) = match bytes {
        [0xFF, 0xFE, rest @ ..] => (rest, false),
        [0xFE, 0xFF, rest @ ..] => (rest, true),
        _ => (bytes, false),
    };
    if body.len() % 2 != 0 {
        if !truncated {
            return Err("odd number of bytes".to_string());
        }
        body = &body[..body.len() - 1];
    }

    let mut units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    if truncated && matches!(units.last(), Some(0xD800..=0xDBFF)) {
        units.pop();
    }

    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| format!("unpaired surrogate 0x{:04X}", e.unpaired_surrogate()))
}
