//! Credential input checks
//!
//! Rejects user names and passwords that could never appear in the
//! accounts file before it is read.

/// Longest user name or password considered at all.
pub const MAX_CREDENTIAL_LENGTH: usize = 256;

/// Performs basic input sanitation on a user name or password.
pub fn is_valid_input(input: &str) -> bool {
    !input.trim().is_empty()
        && input.len() <= MAX_CREDENTIAL_LENGTH
        && !input.contains(['\r', '\n', '\0'])
        && !input.contains(char::is_whitespace)
}

/// A login as it may appear in a file name: path separators and other
/// awkward characters become `_`.
pub fn sanitize_login(login: &str) -> String {
    login
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}
