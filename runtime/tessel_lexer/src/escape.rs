//! Escape sequences inside string literals.

/// Resolve a single-character escape (`\n`, `\t`, ...).
///
/// Characters without a special meaning escape to themselves, so `\'`,
/// `\"` and `\\` produce the quoted character.
#[inline]
pub(crate) fn resolve_escape(c: char) -> char {
    match c {
        'n' => '\n',
        'f' => '\u{000C}',
        'r' => '\r',
        't' => '\t',
        'v' => '\u{000B}',
        other => other,
    }
}

/// Decode the four hex digits of a `\uXXXX` escape.
pub(crate) fn decode_unicode(hex: &str) -> Option<char> {
    if hex.len() != 4 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_escapes() {
        assert_eq!(resolve_escape('n'), '\n');
        assert_eq!(resolve_escape('v'), '\u{000B}');
        assert_eq!(resolve_escape('\''), '\'');
    }

    #[test]
    fn unicode_escapes_are_case_insensitive() {
        assert_eq!(decode_unicode("00A0"), Some('\u{00A0}'));
        assert_eq!(decode_unicode("00a0"), Some('\u{00A0}'));
        assert_eq!(decode_unicode("00G0"), None);
        assert_eq!(decode_unicode("00A"), None);
    }
}
