use std::sync::LazyLock;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::{DecodePaddingMode, Engine as _};
use charset::Charset;
use regex::Regex;

static ENCODED_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"=\?([^?\s]+)\?([qQbB])\?([^?]*)\?=").expect("encoded-word pattern is valid")
});

/// Base64 as it shows up in encoded words, where the padding is often dropped.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// One fragment of a decoded header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderWord {
    /// Text outside of any encoded word.
    Plain(String),
    /// Payload of one or more adjacent encoded words sharing a charset.
    Encoded { charset: String, data: Vec<u8> },
}

impl HeaderWord {
    fn is_empty(&self) -> bool {
        match self {
            HeaderWord::Plain(s) => s.is_empty(),
            HeaderWord::Encoded { data, .. } => data.is_empty(),
        }
    }
}

/// Split a raw header value into plain and encoded fragments.
///
/// A value without encoded words comes back whole as a single plain
/// fragment. Otherwise leading whitespace is stripped, whitespace between two
/// encoded words is dropped and neighbouring encoded words with the same
/// charset are merged.
pub fn decode_header_words(raw: &str) -> Vec<HeaderWord> {
    if !ENCODED_WORD.is_match(raw) {
        return vec![HeaderWord::Plain(raw.to_string())];
    }

    let mut words = Vec::new();
    for line in raw.lines() {
        let mut first = true;
        let mut last = 0;
        for caps in ENCODED_WORD.captures_iter(line) {
            let Some(whole) = caps.get(0) else { continue };
            let mut plain = &line[last..whole.start()];
            if first {
                plain = plain.trim_start();
                first = false;
            }
            if !plain.is_empty() {
                words.push(HeaderWord::Plain(plain.to_string()));
            }
            let payload = &caps[3];
            let data = match caps[2].to_ascii_lowercase().as_str() {
                "b" => LENIENT_BASE64.decode(payload).ok(),
                _ => Some(decode_q(payload)),
            };
            match data {
                Some(data) => words.push(HeaderWord::Encoded {
                    charset: caps[1].to_string(),
                    data,
                }),
                None => words.push(HeaderWord::Plain(whole.as_str().to_string())),
            }
            last = whole.end();
        }
        let mut rest = &line[last..];
        if first {
            rest = rest.trim_start();
        }
        if !rest.is_empty() {
            words.push(HeaderWord::Plain(rest.to_string()));
        }
    }
    collapse(words)
}

fn collapse(words: Vec<HeaderWord>) -> Vec<HeaderWord> {
    let mut out: Vec<HeaderWord> = Vec::with_capacity(words.len());
    for (i, word) in words.iter().enumerate() {
        if let HeaderWord::Plain(s) = word {
            let between_encoded = matches!(out.last(), Some(HeaderWord::Encoded { .. }))
                && matches!(words.get(i + 1), Some(HeaderWord::Encoded { .. }));
            if between_encoded && s.trim().is_empty() {
                continue;
            }
        }
        match (out.last_mut(), word) {
            (
                Some(HeaderWord::Encoded { charset, data }),
                HeaderWord::Encoded {
                    charset: next_charset,
                    data: next_data,
                },
            ) if charset.eq_ignore_ascii_case(next_charset) => {
                data.extend_from_slice(next_data);
            }
            _ => out.push(word.clone()),
        }
    }
    out
}

/// RFC 2047 "Q" encoding: `_` is a space, `=XX` a hex escaped byte.
fn decode_q(payload: &str) -> Vec<u8> {
    let bytes = payload.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => out.push(b' '),
            b'=' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(b) => {
                        out.push(b);
                        i += 3;
                        continue;
                    }
                    None => out.push(b'='),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    out
}

/// Decode `data` in `charset`. Unknown charsets fall back to lossy UTF-8.
pub fn decode_charset(data: &[u8], charset: &str) -> String {
    match Charset::for_label(charset.as_bytes()) {
        Some(cs) => cs.decode_without_bom_handling(data).0.into_owned(),
        None => String::from_utf8_lossy(data).into_owned(),
    }
}

/// Readable form of a header value such as `=?UTF-8?B?NC4gw5xidW5n?=`.
///
/// Only the first non-empty fragment is used; later words are not appended.
pub fn nice_header(raw: &str) -> String {
    let words = decode_header_words(raw);
    match words.into_iter().find(|w| !w.is_empty()) {
        Some(HeaderWord::Plain(s)) => s,
        Some(HeaderWord::Encoded { charset, data }) => decode_charset(&data, &charset),
        None => String::new(),
    }
}
