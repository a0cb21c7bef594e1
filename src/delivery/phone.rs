//! International phone number validation and formatting.
//!
//! Numbers without an international prefix are treated as national numbers
//! of the default country (Switzerland, `41`).

/// Default country code for national-format numbers.
pub const DEFAULT_COUNTRY_CODE: &str = "41";

/// Minimum digit count accepted (E.164 lower bound in practice).
const MIN_DIGITS: usize = 7;

/// Maximum digit count allowed by E.164.
const MAX_DIGITS: usize = 15;

/// Removes whitespace, parentheses and hyphens.
fn strip_separators(phone_number: &str) -> String {
    phone_number
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '(' | ')' | '-'))
        .collect()
}

/// Validates an international or national phone number.
///
/// Accepts `+XX XXX XXX XXXX`, `00XX XXX XXX XXXX` and national formats such
/// as `079 123 45 67`. After removing separators the number must be digits
/// with an optional leading `+`, and contain 7 to 15 digits.
///
/// # Examples
///
/// ```
/// use wichtel_core::delivery::is_valid_phone_number;
///
/// assert!(is_valid_phone_number("+41 79 123 45 67"));
/// assert!(is_valid_phone_number("079 123 45 67"));
/// assert!(!is_valid_phone_number("12345"));
/// assert!(!is_valid_phone_number("+41 79 abc"));
/// ```
#[must_use]
pub fn is_valid_phone_number(phone_number: &str) -> bool {
    let cleaned = strip_separators(phone_number);
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    (MIN_DIGITS..=MAX_DIGITS).contains(&digits.len())
}

/// Normalizes a phone number to E.164 digits without the leading `+`.
///
/// - `0049 170 1234567` → `491701234567`
/// - `+41 79 123 45 67` → `41791234567`
/// - `079 123 45 67` → `41791234567` (national, default code added)
/// - `791234567` → `41791234567` (short bare number, default code added)
#[must_use]
pub fn normalize_phone_number(phone_number: &str, default_country_code: &str) -> String {
    let mut cleaned = strip_separators(phone_number);

    if let Some(rest) = cleaned.strip_prefix("00") {
        cleaned = format!("+{rest}");
    }

    if let Some(rest) = cleaned.strip_prefix('+') {
        rest.to_string()
    } else if let Some(rest) = cleaned.strip_prefix('0') {
        format!("{default_country_code}{rest}")
    } else if cleaned.len() <= 10 {
        format!("{default_country_code}{cleaned}")
    } else {
        cleaned
    }
}

/// Formats a phone number for display.
///
/// International numbers are split as `+CCC XXX XXX REST`; anything else is
/// grouped in blocks of three digits.
#[must_use]
pub fn format_phone_number(phone_number: &str) -> String {
    let cleaned = strip_separators(phone_number);

    if let Some(digits) = cleaned.strip_prefix('+') {
        if !digits.bytes().all(|b| b.is_ascii_digit()) || digits.len() < 8 {
            return cleaned;
        }
        // Country code takes up to three digits, leaving at least seven.
        let cc_len = (digits.len() - 7).min(3);
        let (cc, rest) = digits.split_at(cc_len);
        let (first, rest) = rest.split_at(3);
        let (second, tail) = rest.split_at(3);
        return format!("+{cc} {first} {second} {tail}");
    }

    group_digit_runs(&cleaned)
}

/// Inserts a space after every third digit of each digit run, unless the
/// run ends there.
fn group_digit_runs(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + input.len() / 3);
    let mut run_pos = 0usize;

    for (i, &c) in chars.iter().enumerate() {
        out.push(c);
        if c.is_ascii_digit() {
            run_pos += 1;
            let next_is_digit = chars.get(i + 1).is_some_and(char::is_ascii_digit);
            if run_pos % 3 == 0 && next_is_digit {
                out.push(' ');
            }
        } else {
            run_pos = 0;
        }
    }

    out
}

/// Detects the country code of an internationally formatted number.
///
/// Returns `None` for national numbers. When the code is not delimited by a
/// space, the first two digits are assumed.
#[must_use]
pub fn detect_country_code(phone_number: &str) -> Option<String> {
    let trimmed = phone_number.trim();
    let rest = trimmed
        .strip_prefix('+')
        .or_else(|| trimmed.strip_prefix("00"))?;

    let run_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    let delimited = rest[run_len..]
        .chars()
        .next()
        .is_none_or(char::is_whitespace);

    if (1..=3).contains(&run_len) && delimited {
        return Some(rest[..run_len].to_string());
    }

    (run_len >= 2).then(|| rest[..2].to_string())
}
