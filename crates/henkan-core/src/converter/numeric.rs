//! Digit grouping for numeric input ("49000" → "49,000").

/// Group the integer part of an ASCII decimal number in threes.
///
/// Accepts an optional leading `-` and an optional `.` fraction. Returns
/// `None` when grouping would not change anything (fewer than four integer
/// digits) or when the input is not a plain ASCII number.
pub fn group_digits(input: &str) -> Option<String> {
    let (sign, unsigned) = match input.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", input),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };
    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(integer) || integer.len() < 4 {
        return None;
    }
    if let Some(f) = fraction {
        if !is_digits(f) {
            return None;
        }
    }

    let mut out = String::with_capacity(input.len() + integer.len() / 3);
    out.push_str(sign);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if let Some(f) = fraction {
        out.push('.');
        out.push_str(f);
    }
    Some(out)
}
