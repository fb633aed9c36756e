//! The recognition prompt sent with every image submission.
//!
//! Centralised here so changing the conversion behaviour (e.g. relaxing the
//! no-fences rule) is a one-place edit, and so tests can assert on the prompt
//! without touching the network.

/// Instruction sent to the vision model alongside each page image.
///
/// The model is told to return raw Markdown with no wrapper: front ends
/// forward its output verbatim, so any commentary or code fence would leak
/// straight to users.
pub const RECOGNITION_PROMPT: &str = "Convert the provided image into Markdown format. \
Ensure that all content from the page is included, such as headers, footers, subtexts, \
images (with alt text if possible), tables, and any other elements.

Requirements:
- Output Only Markdown: Return solely the Markdown content without any additional explanations or comments.
- No Delimiters: Do not use code fences or delimiters like ```markdown.
- Complete Content: Do not omit any part of the page, including headers, footers, and subtext.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_forbids_fences_and_commentary() {
        assert!(RECOGNITION_PROMPT.contains("Only Markdown"));
        assert!(RECOGNITION_PROMPT.contains("code fences"));
        assert!(RECOGNITION_PROMPT.contains("alt text"));
    }
}
