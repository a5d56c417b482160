//! ASCII transliteration for citation keys and search
//!
//! Text is NFKD-decomposed so accented letters split into a base letter plus
//! combining marks, which are dropped. Letters that have no decomposition
//! (`ß`, `ø`, `ł`, ...) go through a small table. Anything else that is not
//! ASCII is dropped. Never used for display text.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

fn transliterate(c: char) -> Option<&'static str> {
    let s = match c {
        'ß' => "ss",
        'ẞ' => "SS",
        'æ' => "ae",
        'Æ' => "AE",
        'œ' => "oe",
        'Œ' => "OE",
        'ø' => "o",
        'Ø' => "O",
        'ł' => "l",
        'Ł' => "L",
        'đ' => "d",
        'Đ' => "D",
        'ð' => "d",
        'Ð' => "D",
        'þ' => "th",
        'Þ' => "Th",
        'ı' => "i",
        'ħ' => "h",
        'Ħ' => "H",
        '\u{2018}' | '\u{2019}' => "'",
        '\u{201C}' | '\u{201D}' => "\"",
        '\u{2010}'..='\u{2015}' => "-",
        _ => return None,
    };
    Some(s)
}

/// Transliterates `text` to its closest ASCII representation.
///
/// Total and deterministic; case is preserved.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for c in text.nfkd() {
        if c.is_ascii() {
            out.push(c);
        } else if is_combining_mark(c) {
            continue;
        } else if let Some(replacement) = transliterate(c) {
            out.push_str(replacement);
        }
    }

    out
}

/// Normalizes `text` and keeps only lowercase ASCII alphanumerics.
pub fn key_token(text: &str) -> String {
    normalize(text)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Normalizes `text` for case- and accent-insensitive matching.
pub fn fold(text: &str) -> String {
    normalize(text).to_ascii_lowercase()
}
