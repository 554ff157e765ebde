use std::error::Error as StdError;
use std::fmt;

mod dom;
mod highlight;
mod html;
mod location;
mod page;
mod pattern;
mod scheduler;
mod selector;
mod spinner;

pub use dom::{Dom, NodeId};
pub use highlight::{
    BOUNDARY_COLOR, HighlightOptions, HighlightPass, HighlightReport, MID_WORD_COLOR, MatchSpan,
    PassStats, Piece, escape_pattern, highlight, highlight_node, highlight_with_options,
    query_term,
};
pub use location::{Location, SearchParams};
pub use page::{Page, SEARCH_FIELD_NAME, SEARCH_FORM_NAME, SUBMIT_CONTROL_ID};
pub use scheduler::PendingTimer;
pub use spinner::{SPINNER_FRAMES, SPINNER_INTERVAL_MS, SPINNER_PREFIX, spinner_label};

pub type Result<T> = std::result::Result<T, Error>;

// Recursive tree walks grow the stack in chunks once less than the red zone
// remains.
pub(crate) const STACK_RED_ZONE: usize = 64 * 1024;
pub(crate) const STACK_GROW_SIZE: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    Pattern(String),
    Runtime(String),
    SelectorNotFound(String),
    UnsupportedSelector(String),
    TypeMismatch {
        selector: String,
        expected: String,
        actual: String,
    },
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::Pattern(msg) => write!(f, "pattern error: {msg}"),
            Self::Runtime(msg) => write!(f, "runtime error: {msg}"),
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::TypeMismatch {
                selector,
                expected,
                actual,
            } => write!(
                f,
                "type mismatch for {selector}: expected {expected}, actual {actual}"
            ),
            Self::AssertionFailed {
                selector,
                expected,
                actual,
                dom_snippet,
            } => write!(
                f,
                "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
            ),
        }
    }
}

impl StdError for Error {}

pub(crate) fn truncate_chars(value: &str, max_chars: usize) -> String {
    let mut it = value.chars();
    let mut out = String::new();
    for _ in 0..max_chars {
        let Some(ch) = it.next() else {
            return out;
        };
        out.push(ch);
    }
    if it.next().is_some() {
        out.push_str("...");
    }
    out
}
