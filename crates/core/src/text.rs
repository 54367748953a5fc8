/// Collapses runs of whitespace into single spaces and trims the ends.
pub fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize_text("  I have\t a\n fever  "), "I have a fever");
    }

    #[test]
    fn blank_input_is_empty() {
        assert!(normalize_text(" \n\t ").is_empty());
    }
}
