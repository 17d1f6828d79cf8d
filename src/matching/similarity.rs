//! Jaro string similarity for merchant names

/// Case-insensitive Jaro similarity between two strings, in `[0.0, 1.0]`.
///
/// Bare Jaro with no Winkler prefix bonus. Two empty strings are identical;
/// an empty string against a non-empty one scores zero.
pub fn jaro_similarity(a: &str, b: &str) -> f64 {
    strsim::jaro(&a.to_lowercase(), &b.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = 0.75;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identity() {
        for s in ["a", "Bombas", "DUNKIN DONUTS", "Trader Joe's #552"] {
            assert_eq!(jaro_similarity(s, s), 1.0, "{s}");
        }
    }

    #[test]
    fn test_empty_strings() {
        assert_eq!(jaro_similarity("", ""), 1.0);
        assert_eq!(jaro_similarity("abc", ""), 0.0);
        assert_eq!(jaro_similarity("", "abc"), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let pairs = [
            ("MARTHA", "MARHTA"),
            ("DIXON", "DICKSONX"),
            ("Amazon", "Netflix"),
            ("Bombas", "Bombas Inc"),
            ("abc", "bca"),
            ("crate", "trace"),
        ];
        for (a, b) in pairs {
            assert!(approx(jaro_similarity(a, b), jaro_similarity(b, a)), "{a} / {b}");
        }
    }

    #[test]
    fn test_known_values() {
        // Classic textbook pairs
        assert!(approx(jaro_similarity("MARTHA", "MARHTA"), 17.0 / 18.0));
        assert!(approx(jaro_similarity("DIXON", "DICKSONX"), 23.0 / 30.0));
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(jaro_similarity("bombas", "BOMBAS"), 1.0);
    }

    #[test]
    fn test_merchant_variants_clear_threshold() {
        assert!(jaro_similarity("DUNKIN DONUTS", "Dunkin' Donuts") >= THRESHOLD);
        assert!(jaro_similarity("Bombas", "Bombas Inc") >= THRESHOLD);
    }

    #[test]
    fn test_dissimilar_merchants_fall_below_threshold() {
        assert!(jaro_similarity("Amazon", "Netflix") < THRESHOLD);
        assert!(jaro_similarity("Target", "Whole Foods") < THRESHOLD);
    }

    #[test]
    fn test_single_characters() {
        assert_eq!(jaro_similarity("a", "A"), 1.0);
        assert_eq!(jaro_similarity("a", "b"), 0.0);
    }
}
