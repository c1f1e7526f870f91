//! Paste-time transformation of delimited text into nodes.
//!
//! Pasted content is scanned for pattern matches inside text nodes, and each
//! match is replaced by a node built from it. With the math transformer,
//! pasting `see $x+1$ now` produces text, a math node holding `x+1`, and text.

use regex::Regex;

use crate::model::{Fragment, Node, NodeType, Slice};

/// One piece of a string split on a pattern. Offsets count chars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubString {
    pub matched: bool,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Split `text` into alternating unmatched and matched pieces covering the
/// whole input. Empty matches are skipped.
pub fn split_on_pattern(text: &str, pattern: &Regex) -> Vec<SubString> {
    let mut pieces = Vec::new();
    // Byte and char offset of the end of the last emitted piece.
    let mut byte_pos = 0;
    let mut char_pos = 0;

    for found in pattern.find_iter(text) {
        if found.is_empty() {
            continue;
        }
        if found.start() > byte_pos {
            let gap = &text[byte_pos..found.start()];
            let gap_end = char_pos + gap.chars().count();
            pieces.push(SubString {
                matched: false,
                text: gap.to_string(),
                start: char_pos,
                end: gap_end,
            });
            char_pos = gap_end;
        }
        let match_end = char_pos + found.as_str().chars().count();
        pieces.push(SubString {
            matched: true,
            text: found.as_str().to_string(),
            start: char_pos,
            end: match_end,
        });
        char_pos = match_end;
        byte_pos = found.end();
    }

    if byte_pos < text.len() {
        let rest = &text[byte_pos..];
        pieces.push(SubString {
            matched: false,
            text: rest.to_string(),
            start: char_pos,
            end: char_pos + rest.chars().count(),
        });
    }
    pieces
}

/// Builds the replacement node for a match spanning `start..end` of a text node.
pub type NodeBuilder = Box<dyn Fn(&Node, usize, usize) -> Node>;

/// Rewrites pasted slices, replacing pattern matches in text with built nodes.
pub struct PasteTransformer {
    pattern: Regex,
    build: NodeBuilder,
}

impl std::fmt::Debug for PasteTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasteTransformer")
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

impl PasteTransformer {
    pub fn new(pattern: Regex, build: impl Fn(&Node, usize, usize) -> Node + 'static) -> Self {
        Self {
            pattern,
            build: Box::new(build),
        }
    }

    /// Turn `<d>...<d>` runs into math nodes, where `<d>` is `delimiter`.
    ///
    /// The delimiters are dropped and the text between them, marks included,
    /// becomes the math node's content. `<d><d>` yields an empty math node.
    pub fn math(delimiter: char) -> Result<Self, regex::Error> {
        let d = regex::escape(delimiter.encode_utf8(&mut [0; 4]));
        let pattern = Regex::new(&format!("{d}[^{d}]*{d}"))?;
        Ok(Self::new(pattern, |node, start, end| {
            if end - start > 2 {
                Node::math_from(Some(node.cut(start + 1, end - 1)))
            } else {
                Node::math_from(None)
            }
        }))
    }

    pub fn transform_pasted(&self, slice: &Slice) -> Slice {
        Slice::new(
            self.transform_fragment(&slice.content),
            slice.open_start,
            slice.open_end,
        )
    }

    pub fn transform_fragment(&self, fragment: &Fragment) -> Fragment {
        Fragment::from_vec(
            fragment
                .iter()
                .flat_map(|node| self.transform_node(node))
                .collect(),
        )
    }

    pub fn transform_node(&self, node: &Node) -> Vec<Node> {
        if let Some(text) = node.text_str() {
            return split_on_pattern(text, &self.pattern)
                .into_iter()
                .map(|piece| {
                    if piece.matched {
                        (self.build)(node, piece.start, piece.end)
                    } else {
                        node.cut(piece.start, piece.end)
                    }
                })
                .collect();
        }
        // Math content is raw source; matches inside it are left alone.
        if node.node_type() == NodeType::Math {
            return vec![node.clone()];
        }
        vec![node.copy(self.transform_fragment(node.content()).to_vec())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Mark;

    fn math() -> PasteTransformer {
        PasteTransformer::math('$').unwrap()
    }

    fn pasted(text: &str) -> String {
        let slice = math().transform_pasted(&Slice::from_text(text));
        slice
            .content
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(" | ")
    }

    #[test]
    fn test_split_pieces() {
        let pattern = Regex::new(r"\$[^\$]*\$").unwrap();
        let pieces = split_on_pattern("see $x+1$ now", &pattern);
        let summary: Vec<(bool, &str, usize, usize)> = pieces
            .iter()
            .map(|p| (p.matched, p.text.as_str(), p.start, p.end))
            .collect();
        assert_eq!(
            summary,
            vec![
                (false, "see ", 0, 4),
                (true, "$x+1$", 4, 9),
                (false, " now", 9, 13),
            ]
        );
    }

    #[test]
    fn test_split_counts_chars() {
        let pattern = Regex::new(r"\$[^\$]*\$").unwrap();
        let pieces = split_on_pattern("α$β$", &pattern);
        assert_eq!((pieces[1].start, pieces[1].end), (1, 4));
    }

    #[test]
    fn test_split_without_match() {
        let pattern = Regex::new(r"\$[^\$]*\$").unwrap();
        assert!(split_on_pattern("", &pattern).is_empty());
        let pieces = split_on_pattern("plain", &pattern);
        assert_eq!(pieces.len(), 1);
        assert!(!pieces[0].matched);
    }

    #[test]
    fn test_paste_inline_math() {
        insta::assert_snapshot!(pasted("see $x+1$ now"), @r#"paragraph("see ", math("x+1"), " now")"#);
    }

    #[test]
    fn test_paste_empty_and_unbalanced() {
        insta::assert_snapshot!(pasted("$$ and $a$$b$ $open"), @r#"paragraph(math(), " and ", math("a"), math("b"), " $open")"#);
    }

    #[test]
    fn test_marks_survive_into_math() {
        let node = Node::text_with_marks("$x$!", vec![Mark::Em]);
        let out = math().transform_node(&node);
        insta::assert_snapshot!(
            out.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(" "),
            @r#"math(em("x")) em("!")"#
        );
    }

    #[test]
    fn test_math_nodes_are_not_rescanned() {
        let node = Node::math("$y$");
        assert_eq!(math().transform_node(&node), vec![node]);
    }

    #[test]
    fn test_other_delimiter() {
        let transformer = PasteTransformer::math('^').unwrap();
        let slice = transformer.transform_pasted(&Slice::from_text("a ^b^"));
        assert_eq!(slice.content.as_slice()[0].to_string(), r#"paragraph("a ", math("b"))"#);
    }

    #[test]
    fn test_text_rendering_reparses_to_same_doc() {
        let doc = Node::doc(vec![
            Node::paragraph(vec![
                Node::text("let "),
                Node::math("x^2"),
                Node::text(" and "),
                Node::math(""),
            ]),
            Node::paragraph(Vec::new()),
            Node::paragraph(vec![Node::math("a+b"), Node::text("!")]),
        ]);
        let text = doc.to_text('$');
        assert_eq!(text, "let $x^2$ and $$\n\n$a+b$!");

        let transformer = math();
        let rebuilt = Node::doc(
            text.split('\n')
                .map(|line| Node::paragraph(transformer.transform_node(&Node::text(line))))
                .collect(),
        );
        assert_eq!(rebuilt, doc);
    }
}
