#[derive(Clone, Copy)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    /// Alternative quoting `q'[...]'`; holds the closing delimiter.
    QQuoted(char),
    LineComment,
    BlockComment,
}

/// Closing delimiter for the character opening a `q'` literal.
pub(super) fn q_quote_closer(open: char) -> char {
    match open {
        '[' => ']',
        '(' => ')',
        '{' => '}',
        '<' => '>',
        other => other,
    }
}
