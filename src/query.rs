use serde::Serialize;
use tracing::debug;

use crate::{
    entry::EntryId,
    error::Result,
    fts_index::FaqIndex,
    store::ContentStore,
};

/// At most this many query tokens take part in a match expression.
pub const MAX_QUERY_TOKENS: usize = 8;

/// A ranked answer candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: EntryId,
    pub question: String,
    pub answer: String,
    /// Lower is more relevant; `None` when the index cannot rank.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<f32>,
}

/// Lower-case `text`, split it on whitespace, drop single-character
/// tokens and keep the first [`MAX_QUERY_TOKENS`].
pub fn query_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|token| token.chars().count() > 1)
        .take(MAX_QUERY_TOKENS)
        .map(str::to_string)
        .collect()
}

/// OR of prefix patterns, one per analyzed query term.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchExpression {
    prefixes: Vec<String>,
}

impl MatchExpression {
    /// Analyze each token with the index analyzer so query terms line up
    /// with indexed terms (`"what's"` becomes `what*` and `s*`).
    pub fn build(index: &FaqIndex, tokens: &[String]) -> Result<Self> {
        let mut prefixes: Vec<String> = Vec::new();
        for token in tokens {
            for term in index.analyze(token)? {
                if !prefixes.contains(&term) {
                    prefixes.push(term);
                }
            }
        }
        Ok(Self { prefixes })
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

impl std::fmt::Display for MatchExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, prefix) in self.prefixes.iter().enumerate() {
            if i > 0 {
                f.write_str(" OR ")?;
            }
            write!(f, "{prefix}*")?;
        }
        Ok(())
    }
}

/// Execute the search pipeline.
///
/// 1. Tokenize and filter the free text
/// 2. Build the prefix OR expression
/// 3. Match against the full-text index (ranked when possible)
/// 4. Join hits back to the content store, dropping ids it no longer has
pub fn search(
    store: &ContentStore,
    index: &FaqIndex,
    text: &str,
    limit: usize,
) -> Result<Vec<SearchHit>> {
    let tokens = query_tokens(text);
    if tokens.is_empty() {
        debug!(text, "no usable query tokens");
        return Ok(vec![]);
    }

    let expression = MatchExpression::build(index, &tokens)?;
    if expression.is_empty() {
        debug!(text, "query analyzed to nothing");
        return Ok(vec![]);
    }
    debug!(%expression, ranking = ?index.ranking(), limit, "search");

    let index_hits = index.search_prefixes(expression.prefixes(), limit)?;
    let ids: Vec<EntryId> = index_hits.iter().map(|h| h.id).collect();
    let mut entries = store.get_many(&ids)?;

    let mut results = Vec::with_capacity(index_hits.len());
    for hit in index_hits {
        match entries.remove(&hit.id) {
            Some(entry) => results.push(SearchHit {
                id: entry.id,
                question: entry.question,
                answer: entry.answer,
                rank: hit.rank,
            }),
            None => debug!(id = %hit.id, "index hit missing from store"),
        }
    }
    results.truncate(limit);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::entry::EntryDraft;

    fn setup(
        drafts: &[EntryDraft],
    ) -> (tempfile::TempDir, ContentStore, FaqIndex) {
        let tmp = tempfile::tempdir().unwrap();
        let store = ContentStore::open(&tmp.path().join("faq.redb")).unwrap();
        let index = FaqIndex::open_in_ram().unwrap();
        store.replace_all(drafts).unwrap();
        index
            .rebuild(&store.all_entries().unwrap(), store.generation().unwrap())
            .unwrap();
        (tmp, store, index)
    }

    fn sample() -> Vec<EntryDraft> {
        vec![
            EntryDraft::new("abacus lessons", "Mondays at five.", "school"),
            EntryDraft::new(
                "How do I reset my password?",
                "Open settings and choose reset password.",
                "account",
            ),
            EntryDraft::new(
                "Where can I park?",
                "Visitor parking is behind the building.",
                "office",
            ),
            EntryDraft::new(
                "Is there a password policy?",
                "Twelve characters minimum.",
                "account;security",
            ),
        ]
    }

    #[test]
    fn tokens_are_lowercased_filtered_and_capped() {
        assert_eq!(query_tokens("  Hello   WORLD a "), vec!["hello", "world"]);
        assert!(query_tokens("a b c ? !").is_empty());
        assert_eq!(query_tokens("ну да я").len(), 2);

        let long = "one two three four five six seven eight nine ten";
        let tokens = query_tokens(long);
        assert_eq!(tokens.len(), MAX_QUERY_TOKENS);
        assert_eq!(tokens.last().map(String::as_str), Some("eight"));
    }

    #[test]
    fn match_expression_renders_prefix_or() {
        let index = FaqIndex::open_in_ram().unwrap();
        let tokens = query_tokens("Reset what's reset");
        let expr = MatchExpression::build(&index, &tokens).unwrap();
        assert_eq!(expr.to_string(), "reset* OR what* OR s*");
    }

    #[test]
    fn two_letter_prefix_finds_entry() {
        let (_tmp, store, index) = setup(&sample());
        let hits = search(&store, &index, "ab", 5).unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].question, "abacus lessons");
    }

    #[test]
    fn best_match_ranks_first() {
        let (_tmp, store, index) = setup(&sample());
        let hits = search(&store, &index, "reset password", 5).unwrap();

        assert_eq!(hits[0].id, EntryId(2));
        assert!(hits.len() >= 2);
        for window in hits.windows(2) {
            assert!(window[0].rank <= window[1].rank);
        }
    }

    #[test]
    fn limit_truncates() {
        let (_tmp, store, index) = setup(&sample());
        assert_eq!(search(&store, &index, "password", 1).unwrap().len(), 1);
        assert!(search(&store, &index, "password", 0).unwrap().is_empty());
    }

    #[test]
    fn unbounded_limit_returns_every_match() {
        let (_tmp, store, index) = setup(&sample());
        let hits = search(&store, &index, "password", usize::MAX).unwrap();

        let mut ids: Vec<_> = hits.iter().map(|h| h.id).collect();
        ids.sort();
        assert_eq!(ids, vec![EntryId(2), EntryId(4)]);
    }

    #[test]
    fn short_prefix_recalls_large_vocabulary() {
        let drafts: Vec<_> = (0..300)
            .map(|i| EntryDraft::new(format!("ab{i:04} topic"), "answer", ""))
            .collect();
        let (_tmp, store, index) = setup(&drafts);

        assert_eq!(search(&store, &index, "ab", 1000).unwrap().len(), 300);
    }

    #[test]
    fn noise_only_query_is_empty() {
        let (_tmp, store, index) = setup(&sample());
        assert!(search(&store, &index, "a ? i", 5).unwrap().is_empty());
        assert!(search(&store, &index, "   ", 5).unwrap().is_empty());
        assert!(search(&store, &index, "?!? ...", 5).unwrap().is_empty());
    }

    #[test]
    fn unique_question_word_finds_each_entry() {
        let drafts: Vec<_> = (0..20)
            .map(|i| {
                EntryDraft::new(
                    format!("common question uniq{i}x"),
                    "shared answer",
                    "",
                )
            })
            .collect();
        let (_tmp, store, index) = setup(&drafts);

        for i in 0..20u64 {
            let hits = search(&store, &index, &format!("uniq{i}x"), 5).unwrap();
            assert_eq!(hits.len(), 1, "uniq{i}x");
            assert_eq!(hits[0].id, EntryId(i + 1));
        }
    }

    #[test]
    fn stale_index_hits_are_dropped() {
        let (_tmp, store, index) = setup(&sample());
        store
            .replace_all(&[EntryDraft::new("Refunds", "Within 30 days.", "")])
            .unwrap();

        // The index still describes the old load; ids 2..=4 no longer exist.
        let hits = search(&store, &index, "password", 5).unwrap();
        assert!(hits.is_empty());
    }

    proptest! {
        #[test]
        fn single_char_tokens_never_search(
            chars in proptest::collection::vec(any::<char>(), 0..20),
        ) {
            let text: String = chars
                .iter()
                .filter(|c| !c.is_whitespace())
                .flat_map(|c| [*c, ' '])
                .collect();
            let lowered_is_single = text
                .to_lowercase()
                .split_whitespace()
                .all(|t| t.chars().count() <= 1);
            prop_assume!(lowered_is_single);
            prop_assert!(query_tokens(&text).is_empty());
        }
    }
}
