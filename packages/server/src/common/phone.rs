/// Reduce a phone number to its digits so differently formatted numbers compare equal.
///
/// Strips `+`, `-`, spaces and parentheses; anything else is kept as-is.
pub fn normalize_number(number: &str) -> String {
    number
        .chars()
        .filter(|c| !matches!(c, '+' | '-' | ' ' | '(' | ')'))
        .collect()
}

/// Whether two numbers are the same line once formatting is ignored
pub fn same_number(a: &str, b: &str) -> bool {
    normalize_number(a) == normalize_number(b)
}

/// Treat empty and whitespace-only form values as absent
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_formatting() {
        assert_eq!(normalize_number("+1 (555) 010-2000"), "15550102000");
        assert_eq!(normalize_number("15550102000"), "15550102000");
    }

    #[test]
    fn test_same_number_ignores_formatting() {
        assert!(same_number("+15550102000", "1 555 010 2000"));
        assert!(!same_number("+15550102000", "+15550102001"));
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some(" CA123 ")), Some("CA123"));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(None), None);
    }
}
