//! System prompts for term extraction and caption refinement.
//!
//! Both prompts demand marker-delimited output that
//! [`crate::pipeline::entries`] parses; changing a marker here means
//! changing the matching `EntryFormat`.
//!
//! Callers can override either prompt via
//! [`crate::config::FlashcardConfig::keyword_prompt`] and
//! [`crate::config::FlashcardConfig::caption_prompt`].

/// System prompt sent with every text chunk.
pub const KEYWORD_PROMPT: &str = r####"You are tasked with extracting structured information from the provided text. For each keyword or concept, provide the following in a consistent format:

1. **Term**: The key term or concept.
2. **Definition**: A concise and clear definition of the term or concept. Include relevant details or examples if explicitly available in the text.

Format the output exactly like this (including all symbols and delimiters):

### BEGIN ENTRY ###
Term: [Term]
Definition: [Definition]
### END ENTRY ###

Ensure the following:
- Each entry is enclosed between "### BEGIN ENTRY ###" and "### END ENTRY ###".
- Keep each Term and each Definition on a single line.
- Use precise, concise language.
- Exclude any unrelated or random words or content.
- Ignore redundant terms or repeated examples.
- If the provided text lacks a term or definition, explicitly write "None" for that part.
- Ensure the output is ready to be concatenated with outputs from other chunks without ambiguity.

Only provide the requested structured output in the exact format described. Do not include explanations or introductions."####;

/// System prompt sent with every figure caption.
pub const CAPTION_PROMPT: &str = r####"You are tasked with analyzing a provided caption for a figure and creating the front of a flashcard. Your goal is to interpret what the figure generally represents based on the caption and generate a meaningful, concise question or description for the front of the flashcard. Use the following strict format and instructions:

### BEGIN FLASHCARD ###
Prompt: [Write a general question or description suitable for the front of a flashcard. The prompt should focus on the broader concept or idea represented by the figure, rather than overly specific details. Ensure the prompt provides enough context for a learner to understand the figure's purpose.]
### END FLASHCARD ###

Guidelines:
- Emphasize the general idea or purpose of the figure.
- Avoid using overly specific or technical phrases unless necessary.
- Ensure clarity and conciseness in the flashcard prompt.
- Keep the prompt on a single line.
- Do not include any additional explanations, footnotes, or irrelevant information outside the specified format.
- If the caption lacks sufficient context, infer a broader interpretation of what the figure might represent.

Provide the refined flashcard prompt in the exact format described above. Do not include explanations or justifications for your output."####;

/// User message for a caption-refinement call.
pub fn caption_user_message(caption: &str) -> String {
    format!("Refine this caption: {caption}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_name_their_markers() {
        assert!(KEYWORD_PROMPT.contains("### BEGIN ENTRY ###"));
        assert!(KEYWORD_PROMPT.contains("### END ENTRY ###"));
        assert!(KEYWORD_PROMPT.contains("Term: "));
        assert!(KEYWORD_PROMPT.contains("Definition: "));
        assert!(CAPTION_PROMPT.contains("### BEGIN FLASHCARD ###"));
        assert!(CAPTION_PROMPT.contains("Prompt: "));
    }

    #[test]
    fn prompts_keep_their_closing_instructions() {
        assert!(CAPTION_PROMPT.contains("### END FLASHCARD ###"));
        assert!(KEYWORD_PROMPT.ends_with("Do not include explanations or introductions."));
        assert!(CAPTION_PROMPT.ends_with("justifications for your output."));
    }

    #[test]
    fn caption_message_wraps_caption() {
        assert_eq!(caption_user_message("None"), "Refine this caption: None");
    }
}
