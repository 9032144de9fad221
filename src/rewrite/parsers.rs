pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// `q'X` or `Q'X` starting at `idx`, not glued to a preceding identifier.
///
/// The delimiter `X` may be any non-whitespace character, multibyte included.
pub(super) fn try_start_q_quote(sql: &str, idx: usize) -> Option<char> {
    let bytes = sql.as_bytes();
    let b = *bytes.get(idx)?;
    if !(b == b'q' || b == b'Q') || bytes.get(idx + 1) != Some(&b'\'') {
        return None;
    }
    if idx > 0 {
        let prev = bytes[idx - 1];
        // nq'..' is a national-character q literal
        if (prev.is_ascii_alphanumeric() || prev == b'_') && !matches!(prev, b'n' | b'N') {
            return None;
        }
    }
    let delim = sql.get(idx + 2..)?.chars().next()?;
    if delim.is_whitespace() {
        None
    } else {
        Some(delim)
    }
}

/// Length of the `X'` terminator at `idx`, if one is there.
pub(super) fn q_quote_end_len(bytes: &[u8], idx: usize, closer: char) -> Option<usize> {
    let mut buf = [0_u8; 4];
    let closer = closer.encode_utf8(&mut buf).as_bytes();
    let rest = bytes.get(idx..)?;
    if rest.starts_with(closer) && rest.get(closer.len()) == Some(&b'\'') {
        Some(closer.len() + 1)
    } else {
        None
    }
}
