//! Key-term extraction and keyword highlighting for answers and search results.

use std::collections::HashSet;

/// Maximum number of key terms reported per question.
pub const MAX_KEY_TERMS: usize = 10;

/// Characters of context kept around the first match in a snippet.
pub const SNIPPET_CHARS: usize = 300;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as",
    "at", "be", "because", "been", "before", "being", "between", "both", "but", "by", "can",
    "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how",
    "i", "if", "in", "into", "is", "it", "its", "just", "me", "more", "most", "my", "no", "nor",
    "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "out", "over", "own",
    "same", "she", "should", "so", "some", "such", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "would", "you", "your", "tell", "explain", "describe", "please", "know",
];

fn is_separator(c: char) -> bool {
    c.is_whitespace()
        || c.is_ascii_punctuation()
        || matches!(c, '“' | '”' | '‘' | '’' | '…' | '—' | '–')
}

/// Split `text` into word tokens.
///
/// Only whitespace and punctuation separate words, so scripts with combining
/// marks (Thai, Devanagari) keep their words intact.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(is_separator).filter(|token| !token.is_empty())
}

fn is_key_term(token: &str) -> bool {
    let long_enough = if token.is_ascii() { token.len() >= 3 } else { token.chars().count() >= 2 };
    long_enough && !STOP_WORDS.contains(&token) && !token.chars().all(|c| c.is_ascii_digit())
}

/// The meaningful terms of `question`, most frequent in `sources` first.
///
/// Terms are lower-cased and deduplicated; ties keep question order.
pub fn extract_key_terms(question: &str, sources: &[&str]) -> Vec<String> {
    let mut seen = HashSet::new();
    let terms: Vec<String> = tokenize(question)
        .map(str::to_lowercase)
        .filter(|t| is_key_term(t) && seen.insert(t.clone()))
        .collect();

    let source_tokens: Vec<String> =
        sources.iter().flat_map(|s| tokenize(s)).map(str::to_lowercase).collect();
    let mut ranked: Vec<(String, usize)> = terms
        .into_iter()
        .map(|term| {
            let count = source_tokens.iter().filter(|token| **token == term).count();
            (term, count)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.into_iter().take(MAX_KEY_TERMS).map(|(term, _)| term).collect()
}

/// Wrap every whole-word occurrence of a term in `**`. Matching ignores case.
pub fn highlight(text: &str, terms: &[String]) -> String {
    if terms.is_empty() {
        return text.to_string();
    }
    let terms: HashSet<&str> = terms.iter().map(String::as_str).collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut word_start: Option<usize> = None;

    let flush_word = |out: &mut String, word: &str| {
        if terms.contains(word.to_lowercase().as_str()) {
            out.push_str("**");
            out.push_str(word);
            out.push_str("**");
        } else {
            out.push_str(word);
        }
    };

    for (i, c) in text.char_indices() {
        if is_separator(c) {
            if let Some(start) = word_start.take() {
                flush_word(&mut out, &text[start..i]);
            }
            out.push(c);
        } else if word_start.is_none() {
            word_start = Some(i);
        }
    }
    if let Some(start) = word_start {
        flush_word(&mut out, &text[start..]);
    }
    out
}

/// A window of at most [`SNIPPET_CHARS`] characters around the first key
/// term in `text`, with the terms highlighted.
pub fn highlighted_snippet(text: &str, terms: &[String]) -> String {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    if chars.len() <= SNIPPET_CHARS {
        return highlight(text.trim(), terms);
    }

    let first_match =
        terms.iter().filter_map(|term| find_ignoring_case(&chars, term)).min().unwrap_or(0);

    let start = first_match.saturating_sub(SNIPPET_CHARS / 3);
    let end = (start + SNIPPET_CHARS).min(chars.len());
    let start = end.saturating_sub(SNIPPET_CHARS);

    let byte_start = chars[start].0;
    let byte_end = chars.get(end).map_or(text.len(), |(i, _)| *i);

    let mut snippet = String::new();
    if start > 0 {
        snippet.push('…');
    }
    snippet.push_str(&highlight(text[byte_start..byte_end].trim(), terms));
    if end < chars.len() {
        snippet.push('…');
    }
    snippet
}

/// Char position of the first case-insensitive occurrence of `term`.
///
/// Positions are counted in the original text, so characters whose lower
/// case is longer (`İ`) do not shift the result.
fn find_ignoring_case(chars: &[(usize, char)], term: &str) -> Option<usize> {
    let needle: Vec<char> = term.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return None;
    }
    (0..chars.len()).find(|&pos| {
        let mut haystack = chars[pos..].iter().flat_map(|(_, c)| c.to_lowercase());
        needle.iter().all(|&n| haystack.next() == Some(n))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stop_words_and_ranks_by_source_frequency() {
        let terms = extract_key_terms(
            "What is the borrow checker in Rust?",
            &["Rust has a borrow checker. The borrow checker enforces rules.", "Rust is fast."],
        );
        assert_eq!(terms, vec!["borrow", "checker", "rust"]);
    }

    #[test]
    fn keeps_multibyte_words_whole() {
        let tokens: Vec<&str> = tokenize("TypeScript เป็นภาษา, JavaScript!").collect();
        assert_eq!(tokens, vec!["TypeScript", "เป็นภาษา", "JavaScript"]);
    }

    #[test]
    fn highlights_whole_words_ignoring_case() {
        let out = highlight("Rust and rusty Rust.", &["rust".to_string()]);
        assert_eq!(out, "**Rust** and rusty **Rust**.");
    }

    #[test]
    fn snippet_centres_on_first_match() {
        let text = format!("{} needle {}", "hay ".repeat(200), "hay ".repeat(200));
        let snippet = highlighted_snippet(&text, &["needle".to_string()]);
        assert!(snippet.contains("**needle**"));
        assert!(snippet.starts_with('…'));
        assert!(snippet.ends_with('…'));
    }

    #[test]
    fn snippet_position_ignores_case_folding_growth() {
        let text = format!("{} Needle {}", "İ".repeat(400), "hay ".repeat(200));
        let snippet = highlighted_snippet(&text, &["needle".to_string()]);
        assert!(snippet.contains("**Needle**"), "{snippet}");
    }
}
