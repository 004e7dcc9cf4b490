/// Lower-cases and trims raw input.
///
/// No whitespace collapsing or locale-aware folding: phrases in the lexicon are
/// matched against exactly this form.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_trims() {
        assert_eq!(normalize("  Turn ON Kitchen Lights \n"), "turn on kitchen lights");
    }

    #[test]
    fn is_total_on_empty_input() {
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn is_idempotent() {
        let once = normalize(" Lock The MAIN door ");
        assert_eq!(normalize(&once), once);
    }
}
