//! Search-term highlighting over a parsed page.
//!
//! Highlighting runs two passes over the body. The first wraps occurrences
//! that start at a word boundary, the second wraps occurrences that start
//! mid-word. Each pass replaces a matching text node by a run of plain text
//! nodes and `<span style="background-color: ...">` markers whose
//! concatenated text equals the text it replaced.

use super::*;
use crate::dom::NodeType;
use crate::pattern::Regex;

pub const BOUNDARY_COLOR: &str = "yellow";
pub const MID_WORD_COLOR: &str = "orange";

const QUERY_PARAM: &str = "q";
const MARKER_TAG: &str = "span";

// Word characters are ASCII `[A-Za-z0-9_]` only; any other character,
// accented letters included, counts as a non-word character.
const ASCII_BOUNDARY: &str =
    r"(?:(?<![A-Za-z0-9_])(?=[A-Za-z0-9_])|(?<=[A-Za-z0-9_])(?![A-Za-z0-9_]))";
const ASCII_NON_BOUNDARY: &str =
    r"(?:(?<=[A-Za-z0-9_])(?=[A-Za-z0-9_])|(?<![A-Za-z0-9_])(?![A-Za-z0-9_]))";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightOptions {
    pub boundary_color: String,
    pub mid_word_color: String,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        Self {
            boundary_color: BOUNDARY_COLOR.to_string(),
            mid_word_color: MID_WORD_COLOR.to_string(),
        }
    }
}

/// A match inside one text segment. Offsets are byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// One piece of a split text segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Plain(String),
    Marked { text: String, color: String },
}

impl Piece {
    pub fn text(&self) -> &str {
        match self {
            Self::Plain(text) => text,
            Self::Marked { text, .. } => text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub matches: usize,
    pub replaced_segments: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighlightReport {
    pub boundary_matches: usize,
    pub mid_word_matches: usize,
    pub replaced_segments: usize,
}

impl HighlightReport {
    pub fn total_matches(&self) -> usize {
        self.boundary_matches + self.mid_word_matches
    }
}

/// A compiled pattern plus the marker color it paints with.
#[derive(Debug, Clone)]
pub struct HighlightPass {
    regex: Regex,
    color: String,
}

impl HighlightPass {
    /// Case-insensitive occurrences of `term` preceded by a word boundary.
    pub fn boundary(term: &str, color: &str) -> Result<Self> {
        Self::build(ASCII_BOUNDARY, term, color)
    }

    /// Case-insensitive occurrences of `term` not preceded by a word
    /// boundary.
    pub fn mid_word(term: &str, color: &str) -> Result<Self> {
        Self::build(ASCII_NON_BOUNDARY, term, color)
    }

    fn build(anchor: &str, term: &str, color: &str) -> Result<Self> {
        // Case folding stays inside the term so the ASCII classes of the
        // anchor never pick up folded non-ASCII letters.
        let pattern = format!("{anchor}(?i:{})", escape_pattern(term));
        let regex = Regex::new(&pattern)?;
        Ok(Self {
            regex,
            color: color.to_string(),
        })
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn find_spans(&self, text: &str) -> Result<Vec<MatchSpan>> {
        Ok(self
            .regex
            .find_all(text)?
            .into_iter()
            .map(|matched| MatchSpan {
                start: matched.start(),
                end: matched.end(),
                text: matched.as_str().to_string(),
            })
            .collect())
    }

    /// Splits `text` around every match, or returns `None` when nothing
    /// matched. Empty plain pieces are left out.
    pub fn split_segment(&self, text: &str) -> Result<Option<Vec<Piece>>> {
        let spans = self.find_spans(text)?;
        if spans.is_empty() {
            return Ok(None);
        }

        let mut pieces = Vec::with_capacity(spans.len() * 2 + 1);
        let mut last_end = 0usize;
        for span in spans {
            if span.start > last_end {
                pieces.push(Piece::Plain(text[last_end..span.start].to_string()));
            }
            pieces.push(Piece::Marked {
                text: span.text,
                color: self.color.clone(),
            });
            last_end = span.end;
        }
        if last_end < text.len() {
            pieces.push(Piece::Plain(text[last_end..].to_string()));
        }
        Ok(Some(pieces))
    }
}

/// Escapes `- / \ ^ $ * + ? . ( ) | [ ] { }` with a backslash.
pub fn escape_pattern(term: &str) -> String {
    pattern::escape(term).into_owned()
}

/// The `q` parameter of `query`, or `None` when it is absent or blank.
///
/// The value is returned untrimmed; only the blank check trims.
pub fn query_term(query: &str) -> Option<String> {
    let params = SearchParams::parse(query);
    let term = params.get(QUERY_PARAM)?;
    if term.trim().is_empty() {
        return None;
    }
    Some(term.to_string())
}

/// Highlights the `q` term of `query` in `dom` with the default colors.
pub fn highlight(dom: &mut Dom, query: &str) -> Result<HighlightReport> {
    highlight_with_options(dom, query, &HighlightOptions::default())
}

pub fn highlight_with_options(
    dom: &mut Dom,
    query: &str,
    options: &HighlightOptions,
) -> Result<HighlightReport> {
    let Some(term) = query_term(query) else {
        return Ok(HighlightReport::default());
    };
    let root = dom.body().unwrap_or(dom.root);

    let boundary = HighlightPass::boundary(&term, &options.boundary_color)?;
    let first = highlight_node(dom, root, &boundary)?;

    // The second pass walks the whole tree again, markers included.
    let mid_word = HighlightPass::mid_word(&term, &options.mid_word_color)?;
    let second = highlight_node(dom, root, &mid_word)?;

    Ok(HighlightReport {
        boundary_matches: first.matches,
        mid_word_matches: second.matches,
        replaced_segments: first.replaced_segments + second.replaced_segments,
    })
}

/// Runs one pass over `node` and its descendants, depth-first and
/// left-to-right.
pub fn highlight_node(dom: &mut Dom, node: NodeId, pass: &HighlightPass) -> Result<PassStats> {
    let mut stats = PassStats::default();
    walk(dom, node, pass, &mut stats)?;
    Ok(stats)
}

fn walk(dom: &mut Dom, node: NodeId, pass: &HighlightPass, stats: &mut PassStats) -> Result<()> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
        let Some(entry) = dom.nodes.get(node.0) else {
            return Err(Error::Runtime("highlight target is invalid".into()));
        };
        match &entry.node_type {
            NodeType::Text(text) => {
                let text = text.clone();
                replace_text_segment(dom, node, &text, pass, stats)
            }
            NodeType::Element(_) | NodeType::Document => {
                // Replacements land in the live list; the snapshot keeps them
                // out of this pass.
                let children = entry.children.clone();
                for child in children {
                    walk(dom, child, pass, stats)?;
                }
                Ok(())
            }
        }
    })
}

fn replace_text_segment(
    dom: &mut Dom,
    node: NodeId,
    text: &str,
    pass: &HighlightPass,
    stats: &mut PassStats,
) -> Result<()> {
    let Some(pieces) = pass.split_segment(text)? else {
        return Ok(());
    };
    // A root text node has nowhere to put its replacement.
    if dom.parent(node).is_none() {
        return Ok(());
    }

    let mut replacements = Vec::with_capacity(pieces.len());
    for piece in pieces {
        match piece {
            Piece::Plain(text) => replacements.push(dom.create_detached_text(text)),
            Piece::Marked { text, color } => {
                let marker = dom.create_detached_element(MARKER_TAG);
                dom.style_set(marker, "background-color", &color)?;
                dom.create_text(marker, text);
                replacements.push(marker);
                stats.matches += 1;
            }
        }
    }
    dom.replace_with_nodes(node, &replacements)?;
    stats.replaced_segments += 1;
    Ok(())
}
