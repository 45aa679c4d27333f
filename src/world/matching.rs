//! Name Resolution
//!
//! Every place a player names something (an exit, an NPC, an item, another
//! player) goes through [`unique_match`] so disambiguation behaves the same
//! everywhere.
//!
//! ## Rules
//! - **Exact wins**: a case-insensitive, whitespace-trimmed exact match returns
//!   immediately, even if other candidates would also prefix-match
//! - **Prefix**: otherwise candidates whose name starts with the token qualify
//! - **Word prefix**: with `match_words`, a candidate also qualifies when any
//!   whitespace-separated word of its name starts with the token
//! - **Uniqueness**: exactly one qualifying candidate is a match; none or
//!   several is no match
//!
//! ## Examples
//! ```
//! use lumenmud::world::unique_match;
//!
//! let names = ["rusty key", "torch"];
//! assert_eq!(unique_match("key", &names, true), Some(0));
//! assert_eq!(unique_match("key", &names, false), None);
//! ```

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Resolve `token` against `candidates`, returning the index of the single
/// qualifying candidate.
pub fn unique_match<S: AsRef<str>>(token: &str, candidates: &[S], match_words: bool) -> Option<usize> {
    let wanted = normalize(token);
    if wanted.is_empty() {
        return None;
    }

    let mut partial: Option<usize> = None;
    let mut ambiguous = false;
    for (idx, candidate) in candidates.iter().enumerate() {
        let name = normalize(candidate.as_ref());
        if name == wanted {
            return Some(idx);
        }

        let qualifies = name.starts_with(&wanted)
            || (match_words && name.split_whitespace().any(|word| word.starts_with(&wanted)));
        if qualifies {
            if partial.is_some() {
                ambiguous = true;
            } else {
                partial = Some(idx);
            }
        }
    }

    if ambiguous {
        None
    } else {
        partial
    }
}
