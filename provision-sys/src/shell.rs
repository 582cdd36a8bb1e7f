//! Shell quoting for commands sent over the remote channel

/// Quote a single token for POSIX shell interpolation.
///
/// Plain identifiers and paths pass through unchanged; anything else is
/// wrapped in single quotes with embedded quotes escaped.
pub fn quote(token: &str) -> String {
    let safe = !token.is_empty()
        && token.chars().all(|character| {
            character.is_ascii_alphanumeric() || matches!(character, '/' | '.' | '-' | '_' | '@' | '=' | ':' | ',')
        });

    if safe {
        token.to_string()
    } else {
        format!("'{}'", token.replace('\'', r"'\''"))
    }
}
