use std::cell::OnceCell;

use itertools::{EitherOrBoth, Itertools};

/// A string paired with its lazily computed bigram set, for fast similarity
/// comparisons against many other strings.
#[derive(Debug, Default, Clone)]
pub struct DiceString<'s> {
    s: &'s str,
    bigrams: OnceCell<Vec<u16>>,
}

impl<'s> DiceString<'s> {
    pub fn new(s: &'s str) -> Self {
        Self {
            s,
            bigrams: OnceCell::new(),
        }
    }

    /// The underlying string.
    pub fn str(&self) -> &'s str {
        self.s
    }

    /// Dice coefficient between the two strings, in `[0.0, 1.0]`.
    ///
    /// Strings shorter than two bytes have no bigrams; two such strings
    /// compare as equal or not at all.
    pub fn compare(&self, other: &DiceString<'_>) -> f32 {
        if self.s.len() < 2 && other.s.len() < 2 {
            return if self.s == other.s { 1.0 } else { 0.0 };
        }
        if self.s.len() < 2 || other.s.len() < 2 {
            return 0.0;
        }

        let bigrams = self.bigrams();
        let other_bigrams = other.bigrams();
        let common = bigrams
            .iter()
            .merge_join_by(other_bigrams, Ord::cmp)
            .filter(|pair| matches!(pair, EitherOrBoth::Both(_, _)))
            .count();

        (2.0 * common as f32) / (bigrams.len() + other_bigrams.len()) as f32
    }

    /// The sorted, deduplicated set of byte bigrams, computed on first use.
    fn bigrams(&self) -> &[u16] {
        self.bigrams.get_or_init(|| {
            let mut bigrams: Vec<u16> = self
                .s
                .as_bytes()
                .windows(2)
                .map(|pair| (u16::from(pair[0]) << 8) | u16::from(pair[1]))
                .collect();
            bigrams.sort_unstable();
            bigrams.dedup();
            bigrams
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn sim(a: &str, b: &str) -> f32 {
        DiceString::new(a).compare(&DiceString::new(b))
    }

    #[test]
    fn identical_strings_compare_as_one() {
        assert_eq!(sim("foobar", "foobar"), 1.0);
        assert_eq!(sim("a", "a"), 1.0);
        assert_eq!(sim("", ""), 1.0);
    }

    #[test]
    fn disjoint_strings_compare_as_zero() {
        assert_eq!(sim("abcd", "efgh"), 0.0);
        assert_eq!(sim("a", "b"), 0.0);
    }

    #[test]
    fn short_against_long_is_zero() {
        assert_eq!(sim("a", "abcd"), 0.0);
        assert_eq!(sim("abcd", ""), 0.0);
    }

    #[rstest]
    #[case("oldVarName", "newVarName")]
    #[case("night", "nacht")]
    #[case("context", "contact")]
    #[case("", "anything")]
    fn similarity_is_symmetric_and_bounded(#[case] a: &str, #[case] b: &str) {
        let forward = sim(a, b);
        let backward = sim(b, a);
        assert_eq!(forward, backward);
        assert!((0.0..=1.0).contains(&forward));
    }

    #[test]
    fn classic_example() {
        // night/nacht share exactly one of their four bigrams each
        assert_eq!(sim("night", "nacht"), 0.25);
    }

    #[test]
    fn duplicate_bigrams_count_once() {
        // "aaaa" has a single distinct bigram
        assert_eq!(sim("aaaa", "aa"), 1.0);
    }
}
