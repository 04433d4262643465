//! DVB text field decoding (EN 300 468 annex A).
//!
//! The first byte of a text field may select a character table. Fields
//! without a selector, and selectors for tables we cannot map, go through
//! the legacy path: control codes are dropped and the remaining bytes are
//! read as ISO-8859-1.

use encoding_rs::Encoding;

/// Decode a DVB text field into UTF-8.
///
/// The character table selector is read first; the text after it stops at
/// the first NUL byte.
pub fn decode_text(raw: &[u8]) -> String {
    let Some(&selector) = raw.first() else {
        return String::new();
    };

    match selector {
        0x01..=0x0B => decode_iso8859(selector + 4, until_nul(&raw[1..])),
        0x0C..=0x0F => latin1(until_nul(&raw[1..])),
        0x10 => {
            let body = until_nul(raw.get(3..).unwrap_or(&[]));
            match (raw.get(1), raw.get(2)) {
                (Some(0x00), Some(&part @ 0x01..=0x0F)) => decode_iso8859(part, body),
                _ => legacy(body),
            }
        }
        0x15 => String::from_utf8_lossy(until_nul(&raw[1..])).into_owned(),
        0x11..=0x1F => legacy(until_nul(&raw[1..])),
        _ => legacy(until_nul(raw)),
    }
}

fn until_nul(body: &[u8]) -> &[u8] {
    match body.iter().position(|&b| b == 0) {
        Some(end) => &body[..end],
        None => body,
    }
}

/// Decode with ISO-8859-`part`.
fn decode_iso8859(part: u8, body: &[u8]) -> String {
    match iso8859_encoding(part) {
        Some(encoding) => {
            let (text, _) = encoding.decode_without_bom_handling(body);
            text.into_owned()
        }
        None => latin1(body),
    }
}

/// encoding_rs has no ISO-8859-1, -9, -11 or -12 of its own. -9 and -11
/// are served by their Windows supersets; -1 and -12 fall back to latin1.
fn iso8859_encoding(part: u8) -> Option<&'static Encoding> {
    let encoding = match part {
        2 => encoding_rs::ISO_8859_2,
        3 => encoding_rs::ISO_8859_3,
        4 => encoding_rs::ISO_8859_4,
        5 => encoding_rs::ISO_8859_5,
        6 => encoding_rs::ISO_8859_6,
        7 => encoding_rs::ISO_8859_7,
        8 => encoding_rs::ISO_8859_8,
        9 => encoding_rs::WINDOWS_1254,
        10 => encoding_rs::ISO_8859_10,
        11 => encoding_rs::WINDOWS_874,
        13 => encoding_rs::ISO_8859_13,
        14 => encoding_rs::ISO_8859_14,
        15 => encoding_rs::ISO_8859_15,
        16 => encoding_rs::ISO_8859_16,
        _ => return None,
    };
    Some(encoding)
}

fn latin1(body: &[u8]) -> String {
    body.iter().map(|&b| b as char).collect()
}

/// Drop control codes (below 0x20 and the C1 range) and read as latin1.
fn legacy(body: &[u8]) -> String {
    body.iter()
        .copied()
        .filter(|&b| b >= 0x20 && !(0x80..=0x9F).contains(&b))
        .map(char::from)
        .collect()
}
