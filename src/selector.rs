use super::*;
use crate::dom::has_class;

/// One simple test inside a compound such as `input#q.wide[name=q]`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Filter {
    Tag(String),
    Id(String),
    Class(String),
    AttrEquals { name: String, value: String },
}

/// Compounds joined by the descendant combinator, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Selector {
    compounds: Vec<Vec<Filter>>,
}

impl Selector {
    fn parse(source: &str) -> Result<Self> {
        let unsupported = || Error::UnsupportedSelector(source.to_string());
        let compounds = split_compounds(source)
            .ok_or_else(unsupported)?
            .into_iter()
            .map(|compound| parse_compound(compound).ok_or_else(unsupported))
            .collect::<Result<Vec<_>>>()?;
        if compounds.is_empty() {
            return Err(unsupported());
        }
        Ok(Self { compounds })
    }

    /// `Some(id)` for a bare `#id`, which the id index answers directly.
    fn sole_id(&self) -> Option<&str> {
        match self.compounds.as_slice() {
            [compound] => match compound.as_slice() {
                [Filter::Id(id)] => Some(id),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Splits on whitespace outside `[...]`. `None` on unbalanced brackets.
fn split_compounds(source: &str) -> Option<Vec<&str>> {
    let mut compounds = Vec::new();
    let mut start = None;
    let mut in_brackets = false;

    for (idx, ch) in source.char_indices() {
        match ch {
            '[' if !in_brackets => in_brackets = true,
            '[' => return None,
            ']' if in_brackets => in_brackets = false,
            ']' => return None,
            ch if ch.is_ascii_whitespace() && !in_brackets => {
                if let Some(begin) = start.take() {
                    compounds.push(&source[begin..idx]);
                }
                continue;
            }
            _ => {}
        }
        start.get_or_insert(idx);
    }

    if in_brackets {
        return None;
    }
    if let Some(begin) = start {
        compounds.push(&source[begin..]);
    }
    Some(compounds)
}

fn parse_compound(compound: &str) -> Option<Vec<Filter>> {
    let mut filters = Vec::new();
    let mut rest = compound;

    let tag_len = ident_len(rest);
    if tag_len > 0 {
        filters.push(Filter::Tag(rest[..tag_len].to_ascii_lowercase()));
        rest = &rest[tag_len..];
    }

    while let Some(marker) = rest.chars().next() {
        rest = &rest[marker.len_utf8()..];
        match marker {
            '#' | '.' => {
                let len = ident_len(rest);
                if len == 0 {
                    return None;
                }
                let name = rest[..len].to_string();
                filters.push(if marker == '#' {
                    Filter::Id(name)
                } else {
                    Filter::Class(name)
                });
                rest = &rest[len..];
            }
            '[' => {
                let (body, after) = rest.split_once(']')?;
                let (name, value) = body.split_once('=')?;
                let name = name.trim();
                if name.is_empty() || ident_len(name) != name.len() {
                    return None;
                }
                filters.push(Filter::AttrEquals {
                    name: name.to_ascii_lowercase(),
                    value: unquote(value.trim()).to_string(),
                });
                rest = after;
            }
            _ => return None,
        }
    }

    (!filters.is_empty()).then_some(filters)
}

fn ident_len(src: &str) -> usize {
    src.bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'-')
        .count()
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .into_iter()
        .find_map(|quote| value.strip_prefix(quote)?.strip_suffix(quote))
        .unwrap_or(value)
}

impl Dom {
    pub(crate) fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    /// Matching elements in document order.
    pub(crate) fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let selector = Selector::parse(selector)?;
        if let Some(id) = selector.sole_id() {
            return Ok(self.by_id(id).into_iter().collect());
        }

        Ok(self
            .all_element_nodes()
            .into_iter()
            .filter(|node| self.matches_selector(*node, &selector))
            .collect())
    }

    fn matches_selector(&self, node_id: NodeId, selector: &Selector) -> bool {
        let Some((last, ancestors)) = selector.compounds.split_last() else {
            return false;
        };
        if !self.matches_compound(node_id, last) {
            return false;
        }

        // Nearest matching ancestor first; with only descendant combinators
        // that choice never loses a match.
        let mut cursor = self.parent(node_id);
        for compound in ancestors.iter().rev() {
            loop {
                let Some(candidate) = cursor else {
                    return false;
                };
                cursor = self.parent(candidate);
                if self.matches_compound(candidate, compound) {
                    break;
                }
            }
        }
        true
    }

    fn matches_compound(&self, node_id: NodeId, filters: &[Filter]) -> bool {
        let Some(element) = self.element(node_id) else {
            return false;
        };
        filters.iter().all(|filter| match filter {
            Filter::Tag(tag) => element.tag_name.eq_ignore_ascii_case(tag),
            Filter::Id(id) => element.attrs.get("id") == Some(id),
            Filter::Class(class_name) => has_class(element, class_name),
            Filter::AttrEquals { name, value } => element.attrs.get(name) == Some(value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
    <body class="pda">
      <form name="searchform" method="get">
        <input type="text" name="q" value="cat"> <input id="submit" type="submit" value="Search">
      </form>
      <div class="result Person"><span class="thing">cat</span></div>
      <div class="result"><p><span class="thing other">dog</span></p></div>
    </body>
    "#;

    fn texts(dom: &Dom, nodes: &[NodeId]) -> Vec<String> {
        nodes
            .iter()
            .map(|node| dom.text_content(*node).trim().to_string())
            .collect()
    }

    #[test]
    fn id_selector_uses_index() -> Result<()> {
        let dom = Dom::parse(PAGE)?;
        let submit = dom.query_selector("#submit")?;
        assert_eq!(submit, dom.by_id("submit"));
        assert_eq!(dom.query_selector("#missing")?, None);
        Ok(())
    }

    #[test]
    fn attribute_and_compound_selectors() -> Result<()> {
        let dom = Dom::parse(PAGE)?;
        let q = dom
            .query_selector("form[name=searchform] input[name='q']")?
            .ok_or_else(|| Error::SelectorNotFound("q".into()))?;
        assert_eq!(dom.value(q)?, "cat");

        assert_eq!(dom.query_selector_all("input[type=\"submit\"]")?.len(), 1);
        assert_eq!(dom.query_selector_all("input#submit.wide")?.len(), 0);
        assert_eq!(texts(&dom, &dom.query_selector_all("span.thing.other")?), vec!["dog"]);
        Ok(())
    }

    #[test]
    fn descendant_chains_skip_intermediate_elements() -> Result<()> {
        let dom = Dom::parse(PAGE)?;
        let things = dom.query_selector_all(".result .thing")?;
        assert_eq!(texts(&dom, &things), vec!["cat", "dog"]);

        let nested = dom.query_selector_all("body div.result p span")?;
        assert_eq!(texts(&dom, &nested), vec!["dog"]);

        let person = dom.query_selector_all("div.Person   span")?;
        assert_eq!(texts(&dom, &person), vec!["cat"]);
        assert!(dom.query_selector_all("p div")?.is_empty());
        Ok(())
    }

    #[test]
    fn rejects_unsupported_syntax() {
        for selector in [
            "", "   ", "a > b", "a, b", "[name", "name]", "div#", "a:hover", "a + b", "[name]",
            "*",
        ] {
            assert!(
                Selector::parse(selector).is_err(),
                "selector {selector:?} should be rejected"
            );
        }
    }
}
