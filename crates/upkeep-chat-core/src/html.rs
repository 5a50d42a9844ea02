//! Converts the model's markdown-like reply text into an HTML fragment.
//!
//! This is deliberately not a Markdown parser. Only four constructs are
//! recognized, matched with line-level patterns: ordered list items,
//! unordered list items, bold "header" lines, and plain paragraphs, plus
//! inline `**bold**` / `*italic*` emphasis. Nested lists, code blocks,
//! links, tables, blockquotes and escape sequences are all out of scope.
//!
//! Input text is NOT HTML-escaped: `<`, `>` and `&` pass through into the
//! fragment unchanged, so the output must only be rendered in a surface that
//! is trusted with raw markup (see `passes_markup_through_unescaped` in the
//! tests, which pins this behavior).

use once_cell::sync::Lazy;
use regex::Regex;

static ORDERED_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\s+").unwrap());
static UNORDERED_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*]\s+").unwrap());
static HEADER_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\*\*(.+?)\*\*:?$").unwrap());
static BOLD_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static ITALIC_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.*?)\*").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Ordered,
    Unordered,
}

impl ListKind {
    fn open_tag(self) -> &'static str {
        match self {
            Self::Ordered => "<ol>",
            Self::Unordered => "<ul>",
        }
    }

    fn close_tag(self) -> &'static str {
        match self {
            Self::Ordered => "</ol>",
            Self::Unordered => "</ul>",
        }
    }
}

/// Render reply text to an HTML fragment.
///
/// Total over all inputs: every line either matches one of the list/header
/// patterns or falls through to the paragraph branch, so this never fails.
/// Blank lines carry no meaning and are dropped before classification.
#[must_use]
pub fn format(text: &str) -> String {
    let lines = text
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty());

    let mut html = String::new();
    // At most one list container is open at a time.
    let mut open_list: Option<ListKind> = None;

    for line in lines {
        if ORDERED_MARKER.is_match(line) {
            ensure_list(&mut html, &mut open_list, ListKind::Ordered);
            // The literal numeric marker is discarded; the renderer numbers
            // ordered lists itself.
            let content = ORDERED_MARKER.replace(line, "");
            push_item(&mut html, &content);
        } else if UNORDERED_MARKER.is_match(line) {
            ensure_list(&mut html, &mut open_list, ListKind::Unordered);
            let content = UNORDERED_MARKER.replace(line, "");
            push_item(&mut html, &content);
        } else if let Some(captures) = HEADER_LINE.captures(line) {
            close_list(&mut html, &mut open_list);
            // The title is bold-wrapped as a whole and does not go through
            // the emphasis pass again.
            let title = &captures[1];
            html.push_str("<h4><strong>");
            html.push_str(title);
            html.push_str("</strong></h4>");
        } else {
            close_list(&mut html, &mut open_list);
            let formatted = apply_emphasis(line);
            if !formatted.trim().is_empty() {
                html.push_str("<p>");
                html.push_str(&formatted);
                html.push_str("</p>");
            }
        }
    }

    close_list(&mut html, &mut open_list);
    html
}

/// Inline emphasis pass. Bold runs first so that `*` pairs inside an
/// already-consumed `**…**` span are never mistaken for italics.
fn apply_emphasis(content: &str) -> String {
    let bolded = BOLD_SPAN.replace_all(content, "<strong>${1}</strong>");
    ITALIC_SPAN
        .replace_all(&bolded, "<em>${1}</em>")
        .into_owned()
}

fn ensure_list(html: &mut String, open_list: &mut Option<ListKind>, kind: ListKind) {
    if *open_list == Some(kind) {
        return;
    }
    close_list(html, open_list);
    html.push_str(kind.open_tag());
    *open_list = Some(kind);
}

fn close_list(html: &mut String, open_list: &mut Option<ListKind>) {
    if let Some(kind) = open_list.take() {
        html.push_str(kind.close_tag());
    }
}

fn push_item(html: &mut String, content: &str) {
    html.push_str("<li>");
    html.push_str(&apply_emphasis(content));
    html.push_str("</li>");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_list_discards_literal_numbering() {
        assert_eq!(
            format("1. First item\n2. Second item"),
            "<ol><li>First item</li><li>Second item</li></ol>"
        );
    }

    #[test]
    fn unordered_list_accepts_hyphen_and_asterisk_markers() {
        assert_eq!(format("- one\n- two"), "<ul><li>one</li><li>two</li></ul>");
        assert_eq!(
            format("* alpha\n* beta"),
            "<ul><li>alpha</li><li>beta</li></ul>"
        );
    }

    #[test]
    fn header_line_keeps_a_colon_inside_the_bold_markers() {
        // The lazy group only stops at the closing `**`, so a colon sitting
        // inside the markers stays part of the title; the optional `:?` in
        // the pattern only ever matches a colon AFTER the closing `**`.
        assert_eq!(
            format("**Section Title:**"),
            "<h4><strong>Section Title:</strong></h4>"
        );
    }

    #[test]
    fn header_line_drops_a_colon_after_the_bold_markers() {
        assert_eq!(
            format("**Section Title**:"),
            "<h4><strong>Section Title</strong></h4>"
        );
    }

    #[test]
    fn header_line_without_trailing_colon() {
        assert_eq!(format("**Plain**"), "<h4><strong>Plain</strong></h4>");
    }

    #[test]
    fn paragraph_with_inline_emphasis() {
        assert_eq!(
            format("Some **bold** and *italic* text."),
            "<p>Some <strong>bold</strong> and <em>italic</em> text.</p>"
        );
    }

    #[test]
    fn list_is_closed_before_a_paragraph() {
        assert_eq!(
            format("- item one\nPlain paragraph"),
            "<ul><li>item one</li></ul><p>Plain paragraph</p>"
        );
    }

    #[test]
    fn list_is_closed_before_a_header() {
        assert_eq!(
            format("1. step\n**Next:**"),
            "<ol><li>step</li></ol><h4><strong>Next:</strong></h4>"
        );
    }

    #[test]
    fn switching_list_kind_closes_the_previous_container() {
        assert_eq!(
            format("1. ordered\n- unordered\n2. ordered again"),
            "<ol><li>ordered</li></ol><ul><li>unordered</li></ul><ol><li>ordered again</li></ol>"
        );
    }

    #[test]
    fn trailing_list_is_closed_at_end_of_input() {
        assert_eq!(format("- only item"), "<ul><li>only item</li></ul>");
    }

    #[test]
    fn empty_and_whitespace_only_input_yield_empty_output() {
        assert_eq!(format(""), "");
        assert_eq!(format("   \n\t\n  "), "");
    }

    #[test]
    fn blank_lines_between_content_do_not_change_output() {
        let compact = "1. a\n2. b\nTail paragraph";
        let sparse = "\n1. a\n\n   \n2. b\n\nTail paragraph\n\n";
        assert_eq!(format(compact), format(sparse));
    }

    #[test]
    fn ordered_marker_wins_over_emphasis_in_the_same_line() {
        // "1. **bold** start" is a list item whose content gets the emphasis
        // pass, not a header.
        assert_eq!(
            format("1. **bold** start"),
            "<ol><li><strong>bold</strong> start</li></ol>"
        );
    }

    #[test]
    fn bold_runs_before_italic_on_the_same_content() {
        assert_eq!(
            format("**a*b*c**"),
            "<h4><strong>a*b*c</strong></h4>",
            "a whole-line bold span is a header and keeps inner asterisks"
        );
        assert_eq!(
            format("x **a*b*c** y"),
            "<p>x <strong>a<em>b</em>c</strong> y</p>",
            "inline bold is consumed first, then italics apply inside it"
        );
    }

    #[test]
    fn partial_bold_line_is_a_paragraph_not_a_header() {
        assert_eq!(
            format("**bold** and more"),
            "<p><strong>bold</strong> and more</p>"
        );
    }

    #[test]
    fn list_containers_always_balance() {
        let inputs = [
            "1. a\n- b\n2. c\n**H:**\n- d",
            "- a\n- b",
            "plain",
            "",
            "1. a\n1. b\ntext\n3. c",
        ];
        for input in inputs {
            let html = format(input);
            assert_eq!(html.matches("<ol>").count(), html.matches("</ol>").count());
            assert_eq!(html.matches("<ul>").count(), html.matches("</ul>").count());
        }
    }

    #[test]
    fn passes_markup_through_unescaped() {
        // Known limitation, kept for parity with the original behavior: the
        // formatter performs no HTML escaping of the input text.
        assert_eq!(format("a < b & c > d"), "<p>a < b & c > d</p>");
    }

    #[test]
    fn mixed_document_snapshot() {
        let reply = "**Fixing a Leaky Faucet:**\n\
                     Start by shutting off the water supply.\n\
                     1. Close the valve under the sink.\n\
                     2. Open the faucet to *drain* remaining water.\n\
                     3. Replace the **worn washer**.\n\
                     If the leak persists:\n\
                     - Check the O-ring.\n\
                     - Call a plumber for anything unsafe.";
        insta::assert_snapshot!(format(reply), @"<h4><strong>Fixing a Leaky Faucet:</strong></h4><p>Start by shutting off the water supply.</p><ol><li>Close the valve under the sink.</li><li>Open the faucet to <em>drain</em> remaining water.</li><li>Replace the <strong>worn washer</strong>.</li></ol><p>If the leak persists:</p><ul><li>Check the O-ring.</li><li>Call a plumber for anything unsafe.</li></ul>");
    }
}
