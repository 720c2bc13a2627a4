//! Display titles derived from a chat's first question.

/// Longest title, in characters, before truncation kicks in.
pub const MAX_TITLE_LENGTH: usize = 50;

const ELLIPSIS: &str = "...";

/// [`title_from_with_limit`] with the default limit.
pub fn title_from(question: &str) -> String {
    title_from_with_limit(question, MAX_TITLE_LENGTH)
}

/// Short display title for `question`.
///
/// Questions of at most `max_length` characters are returned as-is. Longer
/// ones are cut to `max_length` characters, then back to the last space in
/// that prefix when there is one past the first character, and get an
/// ellipsis appended.
pub fn title_from_with_limit(question: &str, max_length: usize) -> String {
    if question.chars().count() <= max_length {
        return question.to_string();
    }

    let prefix: String = question.chars().take(max_length).collect();
    match prefix.rfind(' ') {
        Some(space) if space > 0 => format!("{}{ELLIPSIS}", &prefix[..space]),
        _ => format!("{prefix}{ELLIPSIS}"),
    }
}
