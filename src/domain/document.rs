use std::slice;

use pulldown_cmark::{Event, Parser, Tag};

/// A node in a parsed markdown document.
///
/// Every node exposes its children through [`Node::children`]; leaves simply
/// have none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A block container (paragraph, list, block quote, heading, fenced code,
    /// ...).
    Block(Vec<Node>),

    /// An inline container (emphasis, strong, link, ...).
    Inline(Vec<Node>),

    /// An inline code span. The payload is taken literally.
    Code(String),

    /// Any other leaf carrying text (plain text, raw code block lines, html).
    Text(String),
}

impl Node {
    /// The ordered child nodes. Empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Block(children) | Self::Inline(children) => children,
            Self::Code(_) | Self::Text(_) => &[],
        }
    }

    /// The payload of an inline code span, or `None` for any other node.
    #[must_use]
    pub fn as_code(&self) -> Option<&str> {
        match self {
            Self::Code(code) => Some(code),
            _ => None,
        }
    }
}

/// A comment body parsed into a tree of [`Node`]s.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    root: Vec<Node>,
}

impl Document {
    /// Parses a CommonMark body into a document tree.
    ///
    /// The tree is assembled with an explicit stack of open containers, so
    /// arbitrarily deep nesting never recurses.
    #[must_use]
    pub fn parse(body: &str) -> Self {
        let mut stack: Vec<(bool, Vec<Node>)> = Vec::new();
        let mut root = Vec::new();

        for event in Parser::new(body) {
            let leaf = match event {
                Event::Start(tag) => {
                    stack.push((is_inline(&tag), Vec::new()));
                    continue;
                }
                Event::End(_) => {
                    let Some((inline, children)) = stack.pop() else {
                        continue;
                    };
                    if inline {
                        Node::Inline(children)
                    } else {
                        Node::Block(children)
                    }
                }
                Event::Code(code) => Node::Code(code.into_string()),
                Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                    Node::Text(text.into_string())
                }
                Event::SoftBreak | Event::HardBreak => Node::Text("\n".to_string()),
                _ => continue,
            };

            match stack.last_mut() {
                Some((_, children)) => children.push(leaf),
                None => root.push(leaf),
            }
        }

        Self { root }
    }

    /// Creates a document from already-built top-level nodes.
    #[must_use]
    pub const fn from_nodes(root: Vec<Node>) -> Self {
        Self { root }
    }

    /// Iterates over the payloads of all inline code spans, depth-first, in
    /// document order.
    #[must_use]
    pub fn code_spans(&self) -> CodeSpans<'_> {
        CodeSpans {
            stack: vec![self.root.iter()],
        }
    }
}

fn is_inline(tag: &Tag<'_>) -> bool {
    matches!(
        tag,
        Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link { .. } | Tag::Image { .. }
    )
}

/// Depth-first iterator over inline code span payloads.
///
/// Returned by [`Document::code_spans`].
#[derive(Debug, Clone)]
pub struct CodeSpans<'a> {
    stack: Vec<slice::Iter<'a, Node>>,
}

impl<'a> Iterator for CodeSpans<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(level) = self.stack.last_mut() {
            let Some(node) = level.next() else {
                self.stack.pop();
                continue;
            };
            if let Some(code) = node.as_code() {
                return Some(code);
            }
            let children = node.children();
            if !children.is_empty() {
                self.stack.push(children.iter());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn spans(body: &str) -> Vec<String> {
        Document::parse(body)
            .code_spans()
            .map(str::to_string)
            .collect()
    }

    #[test_case(""; "empty body")]
    #[test_case("just some words"; "plain text")]
    #[test_case("*emphasis* and **strong**"; "inline markup")]
    #[test_case("```\ns/foo/bar/\n```"; "fenced code block")]
    #[test_case("    s/foo/bar/"; "indented code block")]
    fn no_code_spans(body: &str) {
        assert!(spans(body).is_empty());
    }

    #[test]
    fn single_code_span() {
        assert_eq!(spans("try `s/foo/bar/` instead"), vec!["s/foo/bar/"]);
    }

    #[test]
    fn spans_come_out_in_document_order() {
        let body = "`one` then\n\n> quoted `two`\n\n- item `three`\n- *emph `four`*";
        assert_eq!(spans(body), vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn double_backticks_allow_literal_backtick() {
        assert_eq!(spans("``s/foo`/bar/``"), vec!["s/foo`/bar/"]);
    }

    #[test]
    fn code_span_inside_link_text() {
        assert_eq!(spans("[`s/a/b/`](https://example.com)"), vec!["s/a/b/"]);
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let body = format!("{}`deep`", "> ".repeat(1_000));
        assert_eq!(spans(&body), vec!["deep"]);
    }

    #[test]
    fn hand_built_tree_is_walked_depth_first() {
        let document = Document::from_nodes(vec![
            Node::Block(vec![
                Node::Text("a".to_string()),
                Node::Inline(vec![Node::Code("first".to_string())]),
                Node::Block(vec![]),
            ]),
            Node::Code("second".to_string()),
            Node::Inline(vec![Node::Inline(vec![Node::Code("third".to_string())])]),
        ]);

        let collected: Vec<&str> = document.code_spans().collect();
        assert_eq!(collected, vec!["first", "second", "third"]);
    }

    #[test]
    fn leaves_have_no_children() {
        assert!(Node::Code("x".to_string()).children().is_empty());
        assert!(Node::Text("x".to_string()).children().is_empty());
    }
}
