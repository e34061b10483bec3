/// Text parsing for OCR results
///
/// Maps recognized text to symbol values: roman numerals for the day
/// counter and plain digits for numeric readouts.
use std::sync::OnceLock;

use regex::Regex;

/// Largest roman value the day counter shows
pub const MAX_ROMAN_VALUE: usize = 3;

fn roman_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(I{1,3})\b").ok()).as_ref()
}

fn digits_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").ok()).as_ref()
}

/// Uppercase and fold common OCR confusions for a vertical stroke to `I`
pub fn normalize_text(text: &str) -> String {
    text.trim()
        .to_uppercase()
        .chars()
        .map(|c| match c {
            'L' | '1' | '|' | '!' | 'Ⅰ' => 'I',
            _ => c,
        })
        .collect()
}

/// Parse a roman numeral `I`, `II` or `III`.
///
/// Falls back to counting `I` characters when no standalone numeral is
/// found; counts outside 1..=3 are rejected.
///
/// # Examples
/// ```
/// # use overlay_detect::ocr::text_extraction::parse_roman;
/// assert_eq!(parse_roman("DAY II"), Some(2));
/// assert_eq!(parse_roman("iii"), Some(3));
/// assert_eq!(parse_roman("none"), None);
/// ```
pub fn parse_roman(text: &str) -> Option<usize> {
    let normalized = normalize_text(text);

    if let Some(caps) = roman_regex().and_then(|re| re.captures(&normalized)) {
        return Some(caps[1].len());
    }

    let count = normalized.chars().filter(|&c| c == 'I').count();
    (1..=MAX_ROMAN_VALUE).contains(&count).then_some(count)
}

/// First run of ASCII digits in the text
///
/// # Examples
/// ```
/// # use overlay_detect::ocr::text_extraction::extract_digits;
/// assert_eq!(extract_digits("HP 250/300"), Some(250));
/// assert_eq!(extract_digits("none"), None);
/// ```
pub fn extract_digits(text: &str) -> Option<u32> {
    digits_regex()?
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roman_standalone() {
        assert_eq!(parse_roman("I"), Some(1));
        assert_eq!(parse_roman("II"), Some(2));
        assert_eq!(parse_roman("III"), Some(3));
        assert_eq!(parse_roman("  DAY III  "), Some(3));
    }

    #[test]
    fn test_parse_roman_ocr_confusions() {
        assert_eq!(parse_roman("l1"), Some(2));
        assert_eq!(parse_roman("|||"), Some(3));
    }

    #[test]
    fn test_parse_roman_fallback_count() {
        // stray characters glued to the numeral
        assert_eq!(parse_roman("XIIX"), Some(2));
        assert_eq!(parse_roman("IIII"), None);
        assert_eq!(parse_roman(""), None);
        assert_eq!(parse_roman("VXV"), None);
    }

    #[test]
    fn test_extract_digits() {
        assert_eq!(extract_digits("42"), Some(42));
        assert_eq!(extract_digits("  x 7 y 9"), Some(7));
        assert_eq!(extract_digits("no digits"), None);
    }
}
