//! Composite query text
//!
//! One query answers every pending condition of a decision. The result
//! accumulator starts `false` and each fragment ORs its `is_allowed` into it,
//! so a single satisfied condition authorizes the whole decision:
//!
//! ```text
//! WITH false AS result
//! <fragment 1>, result
//! WITH result OR is_allowed AS result
//! <fragment 2>, result
//! WITH result OR is_allowed AS result
//! RETURN result AS result
//! ```

/// Field of the first record holding the decision
pub const RESULT_FIELD: &str = "result";

/// Composite conditional query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeQuery {
    text: String,
    conditions: usize,
}

impl CompositeQuery {
    /// Fold `fragments` into one query
    pub fn compose<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut text = String::from("WITH false AS result\n");
        let mut conditions = 0;

        for fragment in fragments {
            text.push_str(fragment.as_ref().trim());
            text.push_str(", result\n");
            text.push_str("WITH result OR is_allowed AS result\n");
            conditions += 1;
        }

        text.push_str("RETURN result AS result");
        Self { text, conditions }
    }

    /// Query text to hand to the backend
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of conditions folded into the query
    pub fn conditions(&self) -> usize {
        self.conditions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_composition_returns_seed() {
        let query = CompositeQuery::compose(Vec::<String>::new());
        assert_eq!(query.text(), "WITH false AS result\nRETURN result AS result");
        assert_eq!(query.conditions(), 0);
    }

    #[test]
    fn test_fragments_are_or_folded_in_order() {
        let query = CompositeQuery::compose([
            "WITH false AS is_allowed",
            "  WITH true AS is_allowed  ",
        ]);

        assert_eq!(
            query.text(),
            "WITH false AS result\n\
             WITH false AS is_allowed, result\n\
             WITH result OR is_allowed AS result\n\
             WITH true AS is_allowed, result\n\
             WITH result OR is_allowed AS result\n\
             RETURN result AS result"
        );
        assert_eq!(query.conditions(), 2);
    }
}
