use pulldown_cmark::{Event, Options, Parser, Tag};

/// Determines whether a message body uses Markdown formatting, so clients
/// can pick a renderer. Plain prose parses as bare paragraphs and text;
/// anything that produces a structural or inline-formatting event counts
/// as Markdown.
pub fn is_markdown(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    for event in Parser::new_ext(text, options) {
        match event {
            Event::Start(
                Tag::Heading { .. }
                | Tag::BlockQuote
                | Tag::CodeBlock(_)
                | Tag::List(_)
                | Tag::Table(_)
                | Tag::Emphasis
                | Tag::Strong
                | Tag::Strikethrough
                | Tag::Link { .. }
                | Tag::Image { .. },
            ) => return true,
            Event::Code(_) | Event::Rule | Event::TaskListMarker(_) => return true,
            _ => {}
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_markdown() {
        assert!(!is_markdown("just a normal sentence."));
        assert!(!is_markdown("two sentences. across one paragraph."));
        assert!(!is_markdown("line one\nline two"));
    }

    #[test]
    fn empty_and_whitespace_are_not_markdown() {
        assert!(!is_markdown(""));
        assert!(!is_markdown("   \n\t  "));
    }

    #[test]
    fn detects_headings_and_lists() {
        assert!(is_markdown("# Summary"));
        assert!(is_markdown("- first\n- second"));
        assert!(is_markdown("1. first\n2. second"));
    }

    #[test]
    fn detects_inline_formatting() {
        assert!(is_markdown("this is **bold** text"));
        assert!(is_markdown("this is *emphasized*"));
        assert!(is_markdown("inline `code` span"));
        assert!(is_markdown("a [link](https://example.com)"));
    }

    #[test]
    fn detects_block_constructs() {
        assert!(is_markdown("> quoted reply"));
        assert!(is_markdown("```\nlet x = 1;\n```"));
        assert!(is_markdown("| a | b |\n|---|---|\n| 1 | 2 |"));
    }
}
