use std::collections::BTreeMap;

use super::*;
use crate::dom::NodeType;

pub(crate) fn parse_html(html: &str) -> Result<Dom> {
    let mut dom = Dom::new();

    let mut stack = vec![dom.root];
    let bytes = html.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        if starts_with_at(bytes, i, b"<!--") {
            if let Some(end) = find_subslice(bytes, i + 4, b"-->") {
                i = end + 3;
            } else {
                return Err(Error::HtmlParse("unclosed HTML comment".into()));
            }
            continue;
        }

        if starts_with_at(bytes, i, b"<!") {
            // Doctype and other declarations carry no content.
            let end = find_subslice(bytes, i + 2, b">")
                .ok_or_else(|| Error::HtmlParse("unclosed declaration".into()))?;
            i = end + 1;
            continue;
        }

        if bytes[i] == b'<' && is_tag_open(bytes, i) {
            if starts_with_at(bytes, i, b"</") {
                let (tag, next) = parse_end_tag(html, i)?;
                i = next;

                // Ignore stray end tags instead of unwinding the whole stack.
                if !stack
                    .iter()
                    .skip(1)
                    .rev()
                    .any(|node| dom.tag_name(*node).is_some_and(|t| t == tag))
                {
                    continue;
                }
                while stack.len() > 1 {
                    let top = *stack
                        .last()
                        .ok_or_else(|| Error::HtmlParse("invalid stack state".into()))?;
                    let top_tag = dom.tag_name(top).unwrap_or("").to_string();
                    stack.pop();
                    if top_tag == tag {
                        break;
                    }
                }
                continue;
            }

            let (tag, attrs, self_closing, next) = parse_start_tag(html, i)?;
            i = next;

            let parent = *stack
                .last()
                .ok_or_else(|| Error::HtmlParse("missing parent element".into()))?;
            let node = dom.create_element(parent, tag.clone(), attrs);

            if is_raw_text_tag(&tag) && !self_closing {
                let close = find_case_insensitive_end_tag(bytes, i, tag.as_bytes())
                    .ok_or_else(|| Error::HtmlParse(format!("unclosed <{tag}>")))?;
                if let Some(body) = html.get(i..close) {
                    if !body.is_empty() {
                        dom.create_text(node, body.to_string());
                    }
                }
                let (_, after_end) = parse_end_tag(html, close)?;
                i = after_end;
                continue;
            }

            if !self_closing && !is_void_tag(&tag) {
                stack.push(node);
            }
            continue;
        }

        let text_start = i;
        i += 1;
        while i < bytes.len() && !(bytes[i] == b'<' && is_tag_open(bytes, i)) {
            i += 1;
        }

        if let Some(text) = html.get(text_start..i) {
            if !text.is_empty() {
                let parent = *stack
                    .last()
                    .ok_or_else(|| Error::HtmlParse("missing parent element".into()))?;
                append_text(&mut dom, parent, &decode_entities(text));
            }
        }
    }

    initialize_form_control_values(&mut dom)?;
    Ok(dom)
}

// Merges adjacent character data so each run of text is one node.
fn append_text(dom: &mut Dom, parent: NodeId, text: &str) {
    if let Some(last) = dom.children(parent).last().copied() {
        if let NodeType::Text(existing) = &mut dom.nodes[last.0].node_type {
            existing.push_str(text);
            return;
        }
    }
    dom.create_text(parent, text.to_string());
}

fn initialize_form_control_values(dom: &mut Dom) -> Result<()> {
    for node in dom.all_element_nodes() {
        let is_textarea = dom
            .tag_name(node)
            .map(|tag| tag.eq_ignore_ascii_case("textarea"))
            .unwrap_or(false);
        if is_textarea {
            let text = dom.text_content(node);
            dom.set_value(node, &text)?;
        }
    }
    Ok(())
}

fn is_tag_open(bytes: &[u8], at: usize) -> bool {
    match bytes.get(at + 1) {
        Some(b'/') => bytes.get(at + 2).is_some_and(|b| b.is_ascii_alphabetic()),
        Some(b'!') => true,
        Some(b) => b.is_ascii_alphabetic(),
        None => false,
    }
}

fn parse_start_tag(
    html: &str,
    at: usize,
) -> Result<(String, BTreeMap<String, String>, bool, usize)> {
    let bytes = html.as_bytes();
    let mut i = at;
    if bytes.get(i) != Some(&b'<') {
        return Err(Error::HtmlParse("expected '<'".into()));
    }
    i += 1;

    skip_ws(bytes, &mut i);
    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }

    let tag = html
        .get(tag_start..i)
        .ok_or_else(|| Error::HtmlParse("invalid tag name".into()))?
        .to_ascii_lowercase();

    if tag.is_empty() {
        return Err(Error::HtmlParse("empty tag name".into()));
    }

    let mut attrs = BTreeMap::new();
    let mut self_closing = false;

    loop {
        skip_ws(bytes, &mut i);
        if i >= bytes.len() {
            return Err(Error::HtmlParse("unclosed start tag".into()));
        }

        if bytes[i] == b'>' {
            i += 1;
            break;
        }

        if bytes[i] == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'>' {
            self_closing = true;
            i += 2;
            break;
        }

        let name_start = i;
        while i < bytes.len() && is_attr_name_char(bytes[i]) {
            i += 1;
        }

        let name = html
            .get(name_start..i)
            .ok_or_else(|| Error::HtmlParse("invalid attribute name".into()))?
            .to_ascii_lowercase();

        if name.is_empty() {
            return Err(Error::HtmlParse("invalid attribute name".into()));
        }

        skip_ws(bytes, &mut i);

        let value = if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            skip_ws(bytes, &mut i);
            decode_entities(&parse_attr_value(html, bytes, &mut i)?)
        } else {
            "true".to_string()
        };

        // First occurrence of a duplicated attribute wins.
        attrs.entry(name).or_insert(value);
    }

    Ok((tag, attrs, self_closing, i))
}

fn parse_end_tag(html: &str, at: usize) -> Result<(String, usize)> {
    let bytes = html.as_bytes();
    let mut i = at;

    if !(bytes.get(i) == Some(&b'<') && bytes.get(i + 1) == Some(&b'/')) {
        return Err(Error::HtmlParse("expected end tag".into()));
    }
    i += 2;
    skip_ws(bytes, &mut i);

    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }

    let tag = html
        .get(tag_start..i)
        .ok_or_else(|| Error::HtmlParse("invalid end tag".into()))?
        .to_ascii_lowercase();

    while i < bytes.len() && bytes[i] != b'>' {
        i += 1;
    }
    if i >= bytes.len() {
        return Err(Error::HtmlParse("unclosed end tag".into()));
    }

    Ok((tag, i + 1))
}

fn parse_attr_value(html: &str, bytes: &[u8], i: &mut usize) -> Result<String> {
    if *i >= bytes.len() {
        return Err(Error::HtmlParse("missing attribute value".into()));
    }

    if bytes[*i] == b'\'' || bytes[*i] == b'"' {
        let quote = bytes[*i];
        *i += 1;
        let start = *i;
        while *i < bytes.len() && bytes[*i] != quote {
            *i += 1;
        }
        if *i >= bytes.len() {
            return Err(Error::HtmlParse("unclosed quoted attribute value".into()));
        }
        let value = html
            .get(start..*i)
            .ok_or_else(|| Error::HtmlParse("invalid attribute value".into()))?
            .to_string();
        *i += 1;
        return Ok(value);
    }

    let start = *i;
    while *i < bytes.len()
        && !bytes[*i].is_ascii_whitespace()
        && bytes[*i] != b'>'
        && !(bytes[*i] == b'/' && *i + 1 < bytes.len() && bytes[*i + 1] == b'>')
    {
        *i += 1;
    }

    let value = html
        .get(start..*i)
        .ok_or_else(|| Error::HtmlParse("invalid attribute value".into()))?
        .to_string();
    Ok(value)
}

/// Decodes the character references a server-rendered page commonly emits:
/// the five XML entities, `&nbsp;` and numeric references. Anything else is
/// kept verbatim.
pub(crate) fn decode_entities(src: &str) -> String {
    if !src.contains('&') {
        return src.to_string();
    }

    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let Some(semi) = rest[1..].find(';').map(|idx| idx + 1) else {
            break;
        };
        let name = &rest[1..semi];
        let decoded = match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => decode_numeric_reference(name),
        };

        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[semi + 1..];
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

fn decode_numeric_reference(name: &str) -> Option<char> {
    let digits = name.strip_prefix('#')?;
    let code = if let Some(hex) = digits
        .strip_prefix('x')
        .or_else(|| digits.strip_prefix('X'))
    {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<u32>().ok()?
    };
    char::from_u32(code)
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn is_tag_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn is_attr_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

pub(crate) fn is_raw_text_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

pub(crate) fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn starts_with_at(bytes: &[u8], at: usize, needle: &[u8]) -> bool {
    if at + needle.len() > bytes.len() {
        return false;
    }
    &bytes[at..at + needle.len()] == needle
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || from > bytes.len() {
        return None;
    }

    let mut i = from;
    while i + needle.len() <= bytes.len() {
        if &bytes[i..i + needle.len()] == needle {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn find_case_insensitive_end_tag(bytes: &[u8], from: usize, tag: &[u8]) -> Option<usize> {
    let mut needle = Vec::new();
    needle.extend_from_slice(b"</");
    needle.extend(tag.iter().map(|b| b.to_ascii_lowercase()));

    let mut i = from;
    while i + needle.len() <= bytes.len() {
        if bytes[i] == b'<' && bytes.get(i + 1) == Some(&b'/') {
            let matched = needle
                .iter()
                .enumerate()
                .all(|(j, b)| bytes[i + j].to_ascii_lowercase() == *b);
            if matched {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_text() -> Result<()> {
        let dom = parse_html("<div id='a'><p>one <b>two</b></p>three</div>")?;
        let a = dom.by_id("a").ok_or_else(|| Error::SelectorNotFound("#a".into()))?;
        assert_eq!(dom.text_content(a), "one twothree");
        assert_eq!(dom.children(a).len(), 2);
        Ok(())
    }

    #[test]
    fn skips_doctype_and_comments() -> Result<()> {
        let dom = parse_html("<!DOCTYPE html><!-- note --><p>x</p>")?;
        assert_eq!(dom.dump_node(dom.root()), "<p>x</p>");
        Ok(())
    }

    #[test]
    fn script_and_style_bodies_are_raw_text() -> Result<()> {
        let dom = parse_html(
            "<style>a < b { color: red }</style><script>if (a < b && c) {}</script><p>&lt;</p>",
        )?;
        assert_eq!(
            dom.dump_node(dom.root()),
            "<style>a < b { color: red }</style><script>if (a < b && c) {}</script><p>&lt;</p>"
        );
        Ok(())
    }

    #[test]
    fn decodes_entities_in_text_and_attributes() -> Result<()> {
        let dom = parse_html("<input id='q' value='a &amp; b &quot;c&quot;'><p id='p'>&#65;&#x42; &copy;</p>")?;
        let q = dom.by_id("q").ok_or_else(|| Error::SelectorNotFound("#q".into()))?;
        let p = dom.by_id("p").ok_or_else(|| Error::SelectorNotFound("#p".into()))?;
        assert_eq!(dom.value(q)?, "a & b \"c\"");
        assert_eq!(dom.text_content(p), "AB &copy;");
        Ok(())
    }

    #[test]
    fn decode_entities_keeps_unterminated_reference() {
        assert_eq!(decode_entities("fish & chips"), "fish & chips");
        assert_eq!(decode_entities("a &amp b"), "a &amp b");
        assert_eq!(decode_entities("&amp;&amp;"), "&&");
    }

    #[test]
    fn lone_angle_bracket_stays_in_text() -> Result<()> {
        let dom = parse_html("<p id='p'>1 < 2 and 3 <= 4</p>")?;
        let p = dom.by_id("p").ok_or_else(|| Error::SelectorNotFound("#p".into()))?;
        assert_eq!(dom.text_content(p), "1 < 2 and 3 <= 4");
        assert_eq!(dom.children(p).len(), 1);
        Ok(())
    }

    #[test]
    fn stray_end_tag_is_ignored() -> Result<()> {
        let dom = parse_html("<div id='d'><span>a</span></a>b</div>")?;
        let d = dom.by_id("d").ok_or_else(|| Error::SelectorNotFound("#d".into()))?;
        assert_eq!(dom.text_content(d), "ab");
        Ok(())
    }

    #[test]
    fn textarea_value_comes_from_text() -> Result<()> {
        let dom = parse_html("<textarea id='t'>hello</textarea>")?;
        let t = dom.by_id("t").ok_or_else(|| Error::SelectorNotFound("#t".into()))?;
        assert_eq!(dom.value(t)?, "hello");
        Ok(())
    }

    #[test]
    fn reports_unclosed_constructs() {
        assert!(matches!(
            parse_html("<p>x<!-- open"),
            Err(Error::HtmlParse(_))
        ));
        assert!(matches!(
            parse_html("<input value='x>"),
            Err(Error::HtmlParse(_))
        ));
        assert!(matches!(
            parse_html("<script>let a = 1;"),
            Err(Error::HtmlParse(_))
        ));
    }
}
