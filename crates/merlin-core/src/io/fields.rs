//! ASCII field scanning shared by the global and per-frame header parsers.
//!
//! Numeric conversions are lenient in the way C's `atoi`/`atof`/`strtoul`
//! are: leading whitespace is skipped, the longest numeric prefix is used and
//! a field without any digits reads as zero.

/// One comma-delimited token of a header buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    /// Captured value; empty for tokens of one character or less.
    pub value: String,
    /// Start of the next token, or the end of the text.
    pub next: usize,
}

/// Scan the comma-delimited token starting at `pos`.
///
/// The token runs up to (not including) the next comma. The comma and any
/// directly following commas are skipped so that `next` points at the first
/// byte of the following token or at `text.len()`.
pub fn next_token(text: &[u8], pos: usize) -> Token {
    let end = text.len();
    let start = pos.min(end);
    let mut cur = start;
    while cur < end && text[cur] != b',' {
        cur += 1;
    }
    let value = if cur - start > 1 {
        String::from_utf8_lossy(&text[start..cur]).into_owned()
    } else {
        String::new()
    };
    while cur < end && text[cur] == b',' {
        cur += 1;
    }
    Token { value, next: cur }
}

/// Bytes of `buf` up to the first NUL.
pub fn c_text(buf: &[u8]) -> &[u8] {
    match buf.iter().position(|&b| b == 0) {
        Some(nul) => &buf[..nul],
        None => buf,
    }
}

/// Leading decimal integer, `atoi` style.
pub fn leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut i = 0;
    let negative = match bytes.first() {
        Some(b'-') => {
            i = 1;
            true
        }
        Some(b'+') => {
            i = 1;
            false
        }
        _ => false,
    };
    let mut value: i64 = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        value = value
            .saturating_mul(10)
            .saturating_add((bytes[i] - b'0') as i64);
        i += 1;
    }
    if negative {
        -value
    } else {
        value
    }
}

/// Leading floating point number, `atof` style.
pub fn leading_float(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i == digits_start || (i == digits_start + 1 && bytes[digits_start] == b'.') {
        return 0.0;
    }
    let mantissa_end = i;
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        let exp_digits = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_digits {
            i = j;
        }
    }
    s[..i]
        .parse::<f64>()
        .or_else(|_| s[..mantissa_end].parse::<f64>())
        .unwrap_or(0.0)
}

/// Leading hexadecimal integer, `strtoul(.., 16)` style.
pub fn leading_hex(s: &str) -> u32 {
    let s = s.trim_start();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let mut value: u32 = 0;
    for c in s.chars() {
        match c.to_digit(16) {
            Some(d) => value = value.wrapping_mul(16).wrapping_add(d),
            None => break,
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let tokens = ["MQ1", "000001", "00384", "01", "0256", "U16", "   1x1"];
        let text = tokens.join(",");
        let bytes = text.as_bytes();
        let mut pos = 0;
        let mut scanned = Vec::new();
        for _ in 0..tokens.len() {
            let token = next_token(bytes, pos);
            scanned.push(token.value);
            pos = token.next;
        }
        assert_eq!(scanned, tokens);
        assert_eq!(pos, bytes.len());
    }

    #[test]
    fn test_token_skips_repeated_commas() {
        let token = next_token(b"ab,,,cd", 0);
        assert_eq!(token.value, "ab");
        assert_eq!(token.next, 5);
    }

    #[test]
    fn test_short_token_is_empty_but_advances() {
        let token = next_token(b"1,22", 0);
        assert_eq!(token.value, "");
        assert_eq!(token.next, 2);
    }

    #[test]
    fn test_token_past_end() {
        let token = next_token(b"ab", 10);
        assert_eq!(token.value, "");
        assert_eq!(token.next, 2);
    }

    #[test]
    fn test_c_text_stops_at_nul() {
        assert_eq!(c_text(b"abc\0def"), b"abc");
        assert_eq!(c_text(b"abc"), b"abc");
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("  42abc"), 42);
        assert_eq!(leading_int("-7"), -7);
        assert_eq!(leading_int("000001"), 1);
        assert_eq!(leading_int("abc"), 0);
        assert_eq!(leading_int(""), 0);
    }

    #[test]
    fn test_leading_float() {
        assert_eq!(leading_float("0.001000"), 0.001);
        assert_eq!(leading_float(" 1.5E+1,"), 15.0);
        assert_eq!(leading_float("2e"), 2.0);
        assert_eq!(leading_float("x"), 0.0);
        assert_eq!(leading_float("."), 0.0);
    }

    #[test]
    fn test_leading_hex() {
        assert_eq!(leading_hex("FF"), 255);
        assert_eq!(leading_hex("0x0f"), 15);
        assert_eq!(leading_hex("01"), 1);
        assert_eq!(leading_hex("zz"), 0);
    }
}
