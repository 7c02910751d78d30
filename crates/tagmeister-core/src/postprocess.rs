//! Caption text post-processing
//!
//! Pure functions that turn raw model output into the caption written to disk:
//! sentence punctuation becomes comma-joined phrases, stray trailing commas are
//! dropped, and user prefix/suffix fragments are spliced in with a single `", "`
//! joiner.

use crate::ProviderKind;

fn is_joiner(c: char) -> bool {
    c == ',' || c.is_whitespace()
}

/// `"A cat. A dog."` becomes `"A cat, A dog"`.
pub fn normalize_punctuation(raw: &str) -> String {
    let segments: Vec<&str> = raw.split('.').collect();
    let last = segments.len() - 1;

    let joined = segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let trimmed = segment.trim();
            if i == last {
                trimmed.to_string()
            } else {
                format!("{},", trimmed)
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    let joined = joined.trim();

    // A terminating period leaves an empty last segment behind its comma.
    if segments[last].trim().is_empty() {
        strip_trailing_comma(joined)
    } else {
        joined.to_string()
    }
}

/// Removes exactly one trailing comma.
pub fn strip_trailing_comma(text: &str) -> String {
    match text.strip_suffix(',') {
        Some(rest) => rest.trim().to_string(),
        None => text.to_string(),
    }
}

/// Local servers return prose as-is; only a single final period is dropped.
pub fn strip_trailing_period(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_suffix('.').unwrap_or(trimmed).trim_end().to_string()
}

fn clean_prefix(prefix: &str) -> &str {
    prefix.trim().trim_end_matches(is_joiner)
}

fn clean_suffix(suffix: &str) -> &str {
    suffix
        .trim()
        .trim_start_matches(is_joiner)
        .trim_end_matches(is_joiner)
}

/// Splices user prefix and suffix around the processed caption.
pub fn compose(processed: &str, prefix: &str, suffix: &str) -> String {
    let prefix = clean_prefix(prefix);
    let mut caption = if prefix.is_empty() {
        processed.to_string()
    } else {
        format!("{}, {}", prefix, processed)
    };

    let suffix = clean_suffix(suffix);
    if !suffix.is_empty() {
        caption.push_str(", ");
        caption.push_str(suffix);
    }

    caption
}

/// Full pipeline from raw provider output to the final caption.
pub fn finalize_caption(raw: &str, provider: ProviderKind, prefix: &str, suffix: &str) -> String {
    let cleaned = if provider.normalizes_sentences() {
        let normalized = normalize_punctuation(raw);
        // A terminal period already cost `normalize_punctuation` its one comma strip.
        if raw.trim_end().ends_with('.') {
            normalized
        } else {
            strip_trailing_comma(&normalized)
        }
    } else {
        strip_trailing_comma(&strip_trailing_period(raw))
    };
    compose(&cleaned, prefix, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentences_become_phrases() {
        assert_eq!(
            normalize_punctuation("A cat. A dog. A bird."),
            "A cat, A dog, A bird"
        );
        assert_eq!(normalize_punctuation("A cat. A dog"), "A cat, A dog");
        assert_eq!(normalize_punctuation(""), "");
        assert_eq!(normalize_punctuation("  no periods here  "), "no periods here");
    }

    #[test]
    fn strips_one_trailing_comma() {
        assert_eq!(strip_trailing_comma("A cat,"), "A cat");
        assert_eq!(strip_trailing_comma("A cat"), "A cat");
        assert_eq!(strip_trailing_comma(&strip_trailing_comma("A cat,")), "A cat");
    }

    #[test]
    fn prefix_and_suffix_joiners() {
        assert_eq!(compose("A cat", "best quality,", ""), "best quality, A cat");
        assert_eq!(compose("A cat", "", "4k, "), "A cat, 4k");
        assert_eq!(compose("A cat", "masterpiece ,", ", 8k"), "masterpiece, A cat, 8k");
        assert_eq!(compose("A cat", "   ", "  "), "A cat");
    }

    #[test]
    fn joiner_strips_are_idempotent() {
        let once = clean_prefix("best quality, ,");
        assert_eq!(clean_prefix(once), once);
        let once = clean_suffix(" , , 4k,");
        assert_eq!(once, "4k");
        assert_eq!(clean_suffix(once), once);
    }

    #[test]
    fn local_output_only_loses_final_period() {
        assert_eq!(
            finalize_caption("A cat. On a mat.", ProviderKind::Ollama, "", ""),
            "A cat. On a mat"
        );
        assert_eq!(
            finalize_caption("A cat. On a mat.", ProviderKind::OpenAi, "photo", "hd"),
            "photo, A cat, On a mat, hd"
        );
    }

    #[test]
    fn cloud_output_loses_one_comma_total() {
        assert_eq!(finalize_caption("A cat,.", ProviderKind::OpenAi, "", ""), "A cat,");
        assert_eq!(finalize_caption("A cat,", ProviderKind::Anthropic, "", ""), "A cat");
        assert_eq!(finalize_caption("A cat.", ProviderKind::OpenAi, "", ""), "A cat");
    }

    #[test]
    fn tag_lists_keep_their_commas() {
        assert_eq!(
            finalize_caption("cat, mat, sunlight,", ProviderKind::LmStudio, "", ""),
            "cat, mat, sunlight"
        );
    }
}
