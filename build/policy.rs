// Line-level helpers for the source policy enforced by build.rs. Kept in their
// own file so the integration tests can exercise them too.

/// The code portion of a line: string and char literal contents blanked out and
/// any trailing `//` comment removed.
pub fn code_outside_literals(line_text: &str) -> String {
    let mut code = String::with_capacity(line_text.len());
    let mut chars = line_text.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            match c {
                '\\' => {
                    chars.next();
                }
                '"' => {
                    in_string = false;
                    code.push('"');
                }
                _ => code.push(' '),
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                code.push('"');
            }
            '/' if chars.peek() == Some(&'/') => break,
            _ => code.push(c),
        }
    }
    code
}

/// Whether `code` contains an identifier that starts with an underscore and has
/// at least one more character (a lone `_` pattern is fine).
pub fn has_underscore_binding(code: &str) -> bool {
    let bytes = code.as_bytes();
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    bytes.iter().enumerate().any(|(i, &b)| {
        b == b'_'
            && (i == 0 || !is_word(bytes[i - 1]))
            && bytes.get(i + 1).is_some_and(|&next| is_word(next))
    })
}

/// A line the underscore rule matched, but only inside comments or literals.
pub fn is_comment_or_string_match(line_text: &str) -> bool {
    !has_underscore_binding(&code_outside_literals(line_text))
}
