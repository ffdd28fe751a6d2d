//! Caption location in page plain text.
//!
//! A caption is the run of words following a "Figure N.N" label. It is not
//! terminated by punctuation or by the next label: it is always the first
//! `max_words` whitespace-separated tokens after the match, or fewer at the
//! end of the page.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Sentinel caption used when no label matches a figure span.
pub const NO_CAPTION: &str = "None";

static FIGURE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Figure\s\d+\.\d+(?:\.\d+)?").unwrap());

/// A figure label and the words that follow it on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caption {
    /// The matched label, e.g. `"Figure 2.1"`.
    pub label: String,
    /// Up to `max_words` words after the label, joined by single spaces.
    pub text: String,
}

/// Extract every figure caption from `page_text`, in document order.
pub fn extract_captions(page_text: &str, max_words: usize) -> Vec<Caption> {
    FIGURE_LABEL
        .find_iter(page_text)
        .map(|m| Caption {
            label: m.as_str().to_string(),
            text: page_text[m.end()..]
                .split_whitespace()
                .take(max_words)
                .collect::<Vec<_>>()
                .join(" "),
        })
        .collect()
}

/// First caption whose label is contained in `span_text`.
///
/// Order-independent substring matching: with repeated labels on one page
/// the first caption wins.
pub fn match_caption<'a>(captions: &'a [Caption], span_text: &str) -> Option<&'a Caption> {
    captions.iter().find(|c| span_text.contains(c.label.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_every_label_in_order() {
        let text = "See below.\nFigure 1.1 A cell.\nText.\nFigure 1.2 A nucleus.\nFigure 10.3.4 Deep.";
        let caps = extract_captions(text, 50);
        let labels: Vec<_> = caps.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["Figure 1.1", "Figure 1.2", "Figure 10.3.4"]);
    }

    #[test]
    fn caption_takes_exactly_max_words() {
        let text = "Figure 2.1 one two three four five six";
        let caps = extract_captions(text, 4);
        assert_eq!(caps[0].text, "one two three four");
    }

    #[test]
    fn caption_runs_into_next_label() {
        let text = "Figure 2.1 Short.\nFigure 2.2 Other";
        let caps = extract_captions(text, 5);
        assert_eq!(caps[0].text, "Short. Figure 2.2 Other");
        assert_eq!(caps[1].text, "Other");
    }

    #[test]
    fn label_at_end_of_page_has_empty_caption() {
        let caps = extract_captions("trailing Figure 3.1", 50);
        assert_eq!(caps.len(), 1);
        assert_eq!(caps[0].text, "");
    }

    #[test]
    fn bare_numbers_and_prose_do_not_match() {
        assert!(extract_captions("Figure 3 shows figure 3.1 results", 10).is_empty());
        assert!(extract_captions("", 10).is_empty());
    }

    #[test]
    fn match_by_substring_first_wins() {
        let caps = vec![
            Caption { label: "Figure 1.1".into(), text: "first".into() },
            Caption { label: "Figure 1.2".into(), text: "second".into() },
            Caption { label: "Figure 1.1".into(), text: "repeat".into() },
        ];
        assert_eq!(match_caption(&caps, "Figure 1.2 ").unwrap().text, "second");
        assert_eq!(match_caption(&caps, "Figure 1.1").unwrap().text, "first");
        assert!(match_caption(&caps, "Figure 4.4").is_none());
    }

    #[test]
    fn shorter_label_matches_longer_span() {
        // Known weakness: "Figure 1.1" is a substring of "Figure 1.12".
        let caps = vec![Caption { label: "Figure 1.1".into(), text: "x".into() }];
        assert!(match_caption(&caps, "Figure 1.12").is_some());
    }
}
