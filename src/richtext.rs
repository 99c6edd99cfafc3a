//! Rich-text MSA bodies → view blocks.
//!
//! MSA content comes out of the rich-text editor as a small HTML subset:
//! - Blocks: p, div, h1-h3, ul, ol, li, br
//! - Inline: strong, b, em, i, u, span (flattened into the surrounding text)
//!
//! Content without any tags is treated as plain text, one paragraph per blank
//! line. Unknown tags are unwrapped and their text kept.

use crate::view::{Block, BoxStyle, TextStyle};

/// Parsed rich-text node.
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Element { tag: String, children: Vec<Node> },
    Text(String),
}

/// Convert an MSA body into blocks rendered with `base` as paragraph style.
pub fn to_blocks(content: &str, base: &TextStyle) -> Vec<Block> {
    if !content.contains('<') {
        return plain_paragraphs(&decode_entities(content), base);
    }
    let nodes = Parser::new(content).parse_document();
    let mut blocks = Vec::new();
    let mut pending = String::new();
    emit_blocks(&nodes, base, &mut blocks, &mut pending);
    flush_paragraph(&mut pending, base, &mut blocks);
    blocks
}

fn plain_paragraphs(text: &str, base: &TextStyle) -> Vec<Block> {
    text.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| paragraph(p.to_string(), base.clone()))
        .collect()
}

fn paragraph(text: String, style: TextStyle) -> Block {
    Block::styled_column(
        BoxStyle {
            margin_bottom: 10.0,
            ..BoxStyle::default()
        },
        vec![Block::text(text, style)],
    )
}

fn emit_blocks(nodes: &[Node], base: &TextStyle, out: &mut Vec<Block>, pending: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => pending.push_str(t),
            Node::Element { tag, children } => match tag.as_str() {
                "p" | "div" => {
                    flush_paragraph(pending, base, out);
                    let style = if all_wrapped_in(children, &["strong", "b"]) {
                        base.clone().bold()
                    } else if all_wrapped_in(children, &["em", "i"]) {
                        base.clone().italic()
                    } else {
                        base.clone()
                    };
                    // Nested blocks inside a paragraph (editors emit <div><p>..)
                    if children.iter().any(is_block_element) {
                        emit_blocks(children, base, out, pending);
                        flush_paragraph(pending, base, out);
                    } else {
                        let text = normalize(&inline_text(children));
                        if !text.is_empty() {
                            out.push(paragraph(text, style));
                        }
                    }
                }
                "h1" | "h2" | "h3" => {
                    flush_paragraph(pending, base, out);
                    let size = match tag.as_str() {
                        "h1" => base.font_size * 1.6,
                        "h2" => base.font_size * 1.35,
                        _ => base.font_size * 1.15,
                    };
                    let text = normalize(&inline_text(children));
                    if !text.is_empty() {
                        out.push(Block::styled_column(
                            BoxStyle {
                                margin_bottom: 8.0,
                                ..BoxStyle::default()
                            },
                            vec![Block::text(text, base.clone().size(size).bold())],
                        ));
                    }
                }
                "ul" | "ol" => {
                    flush_paragraph(pending, base, out);
                    let items: Vec<String> = children
                        .iter()
                        .filter_map(|c| match c {
                            Node::Element { tag, children } if tag == "li" => {
                                Some(normalize(&inline_text(children)))
                            }
                            _ => None,
                        })
                        .filter(|s| !s.is_empty())
                        .collect();
                    if !items.is_empty() {
                        out.push(Block::styled_column(
                            BoxStyle {
                                margin_bottom: 10.0,
                                ..BoxStyle::default()
                            },
                            vec![Block::List {
                                ordered: tag == "ol",
                                items,
                                style: base.clone(),
                            }],
                        ));
                    }
                }
                "br" => flush_paragraph(pending, base, out),
                _ => {
                    // Inline or unknown: keep the text in the current run.
                    if children.iter().any(is_block_element) {
                        emit_blocks(children, base, out, pending);
                    } else {
                        pending.push_str(&inline_text(children));
                    }
                }
            },
        }
    }
}

fn flush_paragraph(pending: &mut String, base: &TextStyle, out: &mut Vec<Block>) {
    let text = normalize(pending);
    pending.clear();
    if !text.is_empty() {
        out.push(paragraph(text, base.clone()));
    }
}

fn is_block_element(node: &Node) -> bool {
    matches!(node, Node::Element { tag, .. }
        if matches!(tag.as_str(), "p" | "div" | "h1" | "h2" | "h3" | "ul" | "ol"))
}

/// True when every non-blank child is one of `tags` (e.g. a fully bold paragraph).
fn all_wrapped_in(children: &[Node], tags: &[&str]) -> bool {
    let mut any = false;
    for child in children {
        match child {
            Node::Text(t) if t.trim().is_empty() => {}
            Node::Element { tag, .. } if tags.contains(&tag.as_str()) => any = true,
            _ => return false,
        }
    }
    any
}

fn inline_text(nodes: &[Node]) -> String {
    nodes
        .iter()
        .map(|n| match n {
            Node::Text(t) => t.clone(),
            Node::Element { tag, .. } if tag == "br" => " ".to_string(),
            Node::Element { children, .. } => inline_text(children),
        })
        .collect()
}

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Parser – recursive descent over the editor's HTML subset
// ---------------------------------------------------------------------------

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Parse everything, skipping stray closing tags at the top level.
    fn parse_document(&mut self) -> Vec<Node> {
        let mut nodes = self.parse_nodes();
        while !self.eof() {
            let rest = self.rest();
            self.pos += rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
            nodes.extend(self.parse_nodes());
        }
        nodes
    }

    fn parse_nodes(&mut self) -> Vec<Node> {
        let mut nodes = Vec::new();
        while !self.eof() && !self.rest().starts_with("</") {
            if let Some(node) = self.parse_node() {
                nodes.push(node);
            }
        }
        nodes
    }

    fn parse_node(&mut self) -> Option<Node> {
        let rest = self.rest();
        if rest.starts_with("<!--") {
            self.pos += rest.find("-->").map(|i| i + 3).unwrap_or(rest.len());
            return None;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            self.pos += rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
            return None;
        }
        if rest.starts_with('<') {
            Some(self.parse_element())
        } else {
            let end = rest.find('<').unwrap_or(rest.len());
            self.pos += end;
            Some(Node::Text(decode_entities(&rest[..end])))
        }
    }

    fn parse_element(&mut self) -> Node {
        self.pos += 1; // '<'
        let tag = self.take_while(|c| c.is_ascii_alphanumeric()).to_ascii_lowercase();

        // Attributes are irrelevant for MSA rendering; skip to the end of the tag.
        let rest = self.rest();
        let close = rest.find('>').unwrap_or(rest.len());
        let self_closing = rest[..close].trim_end().ends_with('/');
        self.pos += (close + 1).min(rest.len());

        if self_closing || tag == "br" || tag == "hr" || tag == "img" {
            return Node::Element {
                tag,
                children: Vec::new(),
            };
        }

        let children = self.parse_nodes();

        // Closing tag (tolerates mismatched names from sloppy editors).
        if self.rest().starts_with("</") {
            let rest = self.rest();
            self.pos += rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
        }

        Node::Element { tag, children }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = &self.input[self.pos..];
        let len = rest
            .char_indices()
            .find(|&(_, c)| !pred(c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }
}

/// Decode character references. Unknown or malformed ones stay as written.
fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest[1..]
            .find(';')
            .filter(|&end| end > 0 && end <= 10)
            .and_then(|end| decode_entity(&rest[1..=end]).map(|c| (c, end + 2)));
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).filter(|&c| c != '\0');
    }
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "bull" => '\u{2022}',
        "sect" => '\u{00A7}',
        "para" => '\u{00B6}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "trade" => '\u{2122}',
        "euro" => '\u{20AC}',
        _ => return None,
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Block;

    fn texts(blocks: &[Block]) -> Vec<String> {
        blocks.iter().map(Block::plain_text).collect()
    }

    #[test]
    fn plain_text_splits_on_blank_lines() {
        let blocks = to_blocks("First clause.\n\nSecond   clause.\n", &TextStyle::default());
        assert_eq!(texts(&blocks), vec!["First clause.", "Second   clause."]);
    }

    #[test]
    fn headings_paragraphs_and_lists() {
        let html = "<h1>Master Service Agreement</h1>\
                    <p>This agreement is made between <strong>Acme</strong> and the customer.</p>\
                    <ol><li>Scope</li><li>Fees &amp; payment</li></ol>";
        let blocks = to_blocks(html, &TextStyle::default());
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            texts(&blocks),
            vec![
                "Master Service Agreement",
                "This agreement is made between Acme and the customer.",
                "Scope\nFees & payment",
            ]
        );
        match &blocks[2] {
            Block::Column { children, .. } => {
                assert!(matches!(children[0], Block::List { ordered: true, .. }))
            }
            other => panic!("expected list column, got {other:?}"),
        }
    }

    #[test]
    fn fully_bold_paragraph_is_bold() {
        let blocks = to_blocks("<p><strong>1. Definitions</strong></p>", &TextStyle::default());
        match &blocks[0] {
            Block::Column { children, .. } => match &children[0] {
                Block::Text { style, .. } => assert!(style.bold),
                other => panic!("expected text, got {other:?}"),
            },
            other => panic!("expected column, got {other:?}"),
        }
    }

    #[test]
    fn loose_text_and_breaks_become_paragraphs() {
        let blocks = to_blocks("Intro text<br/>More text<p>Para</p>", &TextStyle::default());
        assert_eq!(texts(&blocks), vec!["Intro text", "More text", "Para"]);
    }

    #[test]
    fn stray_closing_tags_are_skipped() {
        let blocks = to_blocks("<p>a</p></div><p>b</p>", &TextStyle::default());
        assert_eq!(texts(&blocks), vec!["a", "b"]);
    }

    #[test]
    fn character_references_are_decoded() {
        let blocks = to_blocks(
            "<p>Client&rsquo;s duties &mdash; &#8220;as is&#8221; &#x2013; A &amp;lt; B</p>",
            &TextStyle::default(),
        );
        assert_eq!(
            texts(&blocks),
            vec!["Client\u{2019}s duties \u{2014} \u{201C}as is\u{201D} \u{2013} A &lt; B"]
        );
    }

    #[test]
    fn unknown_references_are_kept() {
        assert_eq!(decode_entities("&bogus; &#xZZ; & AT&T;x"), "&bogus; &#xZZ; & AT&T;x");
        assert_eq!(decode_entities("&#0; &#39;"), "&#0; '");
    }

    #[test]
    fn unclosed_tags_do_not_loop() {
        let blocks = to_blocks("<p>Open <em>forever", &TextStyle::default());
        assert_eq!(texts(&blocks), vec!["Open forever"]);
    }
}
