//! Parsing of delimited model output.
//!
//! The prompts ask the model to wrap each record in marker lines:
//!
//! ```text
//! ### BEGIN ENTRY ###
//! Term: Osmosis
//! Definition: Diffusion of water across a membrane.
//! ### END ENTRY ###
//! ```
//!
//! Parsing is lenient: text outside markers is ignored, a missing field
//! becomes its sentinel, and nothing here ever fails on model output.
//! Field values are captured up to the end of their line; multi-line values
//! are truncated.

use once_cell::sync::Lazy;
use regex::Regex;

pub const UNKNOWN_TERM: &str = "Unknown Term";
pub const NO_DEFINITION: &str = "No definition available";
pub const CAPTION_PARSE_ERROR: &str = "Error in LLM response";

/// Block markers plus labelled fields with their fallback values.
#[derive(Debug, Clone)]
pub struct EntryFormat {
    block: Regex,
    fields: Vec<(Regex, String)>,
}

impl EntryFormat {
    /// `fields` are `(key prefix, sentinel)` pairs, e.g. `("Term: ", "Unknown Term")`.
    pub fn new(begin: &str, end: &str, fields: &[(&str, &str)]) -> Result<Self, regex::Error> {
        let block = Regex::new(&format!(
            r"(?s){}(.*?){}",
            regex::escape(begin),
            regex::escape(end)
        ))?;
        let fields = fields
            .iter()
            .map(|(key, sentinel)| {
                Regex::new(&format!(r"(?m){}(.*)$", regex::escape(key)))
                    .map(|re| (re, sentinel.to_string()))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { block, fields })
    }
}

pub static TERM_FORMAT: Lazy<EntryFormat> = Lazy::new(|| {
    EntryFormat::new(
        "### BEGIN ENTRY ###",
        "### END ENTRY ###",
        &[("Term: ", UNKNOWN_TERM), ("Definition: ", NO_DEFINITION)],
    )
    .unwrap()
});

pub static CAPTION_FORMAT: Lazy<EntryFormat> = Lazy::new(|| {
    EntryFormat::new(
        "### BEGIN FLASHCARD ###",
        "### END FLASHCARD ###",
        &[("Prompt: ", CAPTION_PARSE_ERROR)],
    )
    .unwrap()
});

/// Every delimited block in `output`, as field values in `format` order.
pub fn parse_entries(output: &str, format: &EntryFormat) -> Vec<Vec<String>> {
    format
        .block
        .captures_iter(output)
        .map(|block| {
            let body = block.get(1).map_or("", |m| m.as_str());
            format
                .fields
                .iter()
                .map(|(re, sentinel)| {
                    re.captures(body)
                        .and_then(|c| c.get(1))
                        .map(|m| m.as_str().trim())
                        .filter(|v| !v.is_empty())
                        .unwrap_or(sentinel)
                        .to_string()
                })
                .collect()
        })
        .collect()
}

/// Term/definition pairs from a keyword-extraction response.
pub fn parse_term_entries(output: &str) -> Vec<(String, String)> {
    parse_entries(output, &TERM_FORMAT)
        .into_iter()
        .filter_map(|fields| {
            let mut it = fields.into_iter();
            Some((it.next()?, it.next()?))
        })
        .collect()
}

/// The flashcard prompt from a caption-refinement response.
pub fn parse_caption_prompt(output: &str) -> String {
    parse_entries(output, &CAPTION_FORMAT)
        .into_iter()
        .next()
        .and_then(|fields| fields.into_iter().next())
        .unwrap_or_else(|| CAPTION_PARSE_ERROR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_entries() {
        let out = "Here you go:\n\
                   ### BEGIN ENTRY ###\nTerm: Osmosis\nDefinition: Water diffusion.\n### END ENTRY ###\n\
                   ### BEGIN ENTRY ###\nTerm: ATP\nDefinition: Energy currency.\n### END ENTRY ###\n";
        assert_eq!(
            parse_term_entries(out),
            vec![
                ("Osmosis".to_string(), "Water diffusion.".to_string()),
                ("ATP".to_string(), "Energy currency.".to_string()),
            ]
        );
    }

    #[test]
    fn no_blocks_yields_empty() {
        assert!(parse_term_entries("I could not find any terms.").is_empty());
        assert!(parse_term_entries("").is_empty());
    }

    #[test]
    fn missing_definition_uses_sentinel() {
        let out = "### BEGIN ENTRY ###\nTerm: Mitosis\n### END ENTRY ###";
        assert_eq!(
            parse_term_entries(out),
            vec![("Mitosis".to_string(), NO_DEFINITION.to_string())]
        );
    }

    #[test]
    fn missing_term_uses_sentinel() {
        let out = "### BEGIN ENTRY ###\nDefinition: Something.\n### END ENTRY ###";
        assert_eq!(parse_term_entries(out)[0].0, UNKNOWN_TERM);
    }

    #[test]
    fn multi_line_value_is_truncated() {
        let out = "### BEGIN ENTRY ###\nTerm: Cell\nDefinition: line one\nline two\n### END ENTRY ###";
        assert_eq!(parse_term_entries(out)[0].1, "line one");
    }

    #[test]
    fn unterminated_block_is_ignored() {
        let out = "### BEGIN ENTRY ###\nTerm: A\nDefinition: B\n### END ENTRY ###\n\
                   ### BEGIN ENTRY ###\nTerm: C\n";
        assert_eq!(parse_term_entries(out).len(), 1);
    }

    #[test]
    fn value_on_marker_line_is_captured() {
        let out = "### BEGIN ENTRY ###Term: Inline\nDefinition: ok### END ENTRY ###";
        assert_eq!(
            parse_term_entries(out),
            vec![("Inline".to_string(), "ok".to_string())]
        );
    }

    #[test]
    fn caption_prompt_is_extracted() {
        let out = "### BEGIN FLASHCARD ###\nPrompt: What does the cell cycle diagram show?\n### END FLASHCARD ###";
        assert_eq!(parse_caption_prompt(out), "What does the cell cycle diagram show?");
    }

    #[test]
    fn caption_without_block_is_error_sentinel() {
        assert_eq!(parse_caption_prompt("Sure! The figure shows..."), CAPTION_PARSE_ERROR);
    }

    #[test]
    fn custom_format() {
        let fmt = EntryFormat::new("<q>", "</q>", &[("Q=", "?"), ("A=", "!")]).unwrap();
        let got = parse_entries("<q>Q=one\n</q><q>A=two</q>", &fmt);
        assert_eq!(got, vec![vec!["one".to_string(), "!".to_string()], vec!["?".to_string(), "two".to_string()]]);
    }
}
