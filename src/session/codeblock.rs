//! Code block extraction
//!
//! Chat users wrap code in Markdown fences. Only the code is run:
//!
//! ````text
//! ```js
//! 1 + 1
//! ```
//! ````

/// Strip surrounding ``` fences (with an optional language tag) or single
/// backticks; anything else is returned trimmed
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(inner) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    {
        // A first line without spaces is a language tag
        return match inner.split_once('\n') {
            Some((first, rest)) if !first.trim().contains(' ') => rest.trim(),
            _ => inner.trim(),
        };
    }

    if trimmed.len() >= 2 && trimmed.starts_with('`') && trimmed.ends_with('`') {
        return trimmed[1..trimmed.len() - 1].trim();
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_with_language() {
        assert_eq!(strip_code_fence("```js\nlet a = 1\na\n```"), "let a = 1\na");
    }

    #[test]
    fn test_fence_without_language() {
        assert_eq!(strip_code_fence("```\n1 + 1\n```"), "1 + 1");
    }

    #[test]
    fn test_single_line_fence() {
        assert_eq!(strip_code_fence("```1 + 1```"), "1 + 1");
    }

    #[test]
    fn test_first_line_code_is_kept() {
        assert_eq!(strip_code_fence("```x = 1\ny = 2```"), "x = 1\ny = 2");
    }

    #[test]
    fn test_inline_backticks() {
        assert_eq!(strip_code_fence("  `len([1, 2])` "), "len([1, 2])");
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(strip_code_fence("  1 + 1\n"), "1 + 1");
        assert_eq!(strip_code_fence("`"), "`");
    }
}
