//! Text rendering utilities for human-friendly error messages.
//!
//! Tag names, dependency chains and suggestions all pass through here
//! before they end up in an error's `Display` output.

/// Renders a dependency chain as a readable string.
///
/// # Examples
/// ```
/// use tabaqa_support::rendering::render_chain;
///
/// let chain = vec!["UserService", "Database", "UserService"];
/// assert_eq!(render_chain(&chain), "UserService → Database → UserService");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Renders a list of names as `A, B, C`.
pub fn render_list(names: &[impl AsRef<str>]) -> String {
    names
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Strips module paths from a fully qualified type name.
///
/// Generic arguments keep their structure; only the `a::b::` prefixes go.
///
/// ```
/// use tabaqa_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("my_app::services::UserService"), "UserService");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn my_app::traits::Logger>"),
///     "Arc<dyn Logger>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut out = String::with_capacity(full_name.len());
    let mut token_start = 0;

    for (idx, ch) in full_name.char_indices() {
        if is_delimiter(ch) {
            out.push_str(last_segment(&full_name[token_start..idx]));
            out.push(ch);
            token_start = idx + ch.len_utf8();
        }
    }

    out.push_str(last_segment(&full_name[token_start..]));
    out
}

fn is_delimiter(ch: char) -> bool {
    matches!(ch, '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';')
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Suggests registered names that look like `requested`.
///
/// Matches are ranked: same name ignoring case, then substring matches,
/// then small edit distances, then a shared prefix of at least 3 chars.
/// At most `max_suggestions` names are returned, best first.
pub fn suggest_similar(
    requested: &str,
    available: &[&str],
    max_suggestions: usize,
) -> Vec<String> {
    let wanted = requested.to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter_map(|&name| {
            let candidate = name.to_lowercase();

            if candidate == wanted {
                return Some((name, 100));
            }
            if candidate.contains(&wanted) || wanted.contains(&candidate) {
                return Some((name, 80));
            }

            let distance = edit_distance(&wanted, &candidate);
            if distance <= 2 {
                return Some((name, 70 - distance * 10));
            }

            let prefix = candidate
                .chars()
                .zip(wanted.chars())
                .take_while(|(a, b)| a == b)
                .count();
            (prefix >= 3).then_some((name, prefix * 5))
        })
        .collect();

    // stable sort keeps registration order among equal scores
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Levenshtein distance over chars, single-row table.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ca != cb);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
        }
    }

    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_cycle_chain() {
        let chain = vec!["A", "B", "A"];
        assert_eq!(render_chain(&chain), "A → B → A");
    }

    #[test]
    fn render_single_and_empty_chain() {
        assert_eq!(render_chain(&["A"]), "A");
        let empty: Vec<&str> = vec![];
        assert_eq!(render_chain(&empty), "");
    }

    #[test]
    fn render_names_as_list() {
        assert_eq!(render_list(&["Config", "Database"]), "Config, Database");
    }

    #[test]
    fn shorten_keeps_plain_names() {
        assert_eq!(shorten_type_name("String"), "String");
    }

    #[test]
    fn shorten_nested_generics() {
        assert_eq!(
            shorten_type_name("std::collections::HashMap<alloc::string::String, app::Config>"),
            "HashMap<String, Config>"
        );
    }

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("database", "database"), 0);
        assert_eq!(edit_distance("databse", "database"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn suggests_typo_first() {
        let available = vec!["UserService", "UserRepository", "Logger", "Database"];
        let suggestions = suggest_similar("UserServise", &available, 3);
        assert_eq!(suggestions[0], "UserService");
    }

    #[test]
    fn suggests_same_name_with_different_case() {
        let available = vec!["config", "Cache"];
        let suggestions = suggest_similar("Config", &available, 1);
        assert_eq!(suggestions, vec!["config".to_string()]);
    }

    #[test]
    fn no_suggestion_for_unrelated_name() {
        let available = vec!["Database"];
        assert!(suggest_similar("XyzAbcDef", &available, 3).is_empty());
    }
}
