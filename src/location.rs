use percent_encoding::percent_decode_str;

/// The address a page was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    href: String,
    search: String,
}

impl Location {
    pub fn parse(href: &str) -> Self {
        let without_fragment = href.split_once('#').map_or(href, |(head, _)| head);
        let search = without_fragment
            .split_once('?')
            .map(|(_, query)| query.to_string())
            .unwrap_or_default();
        Self {
            href: href.to_string(),
            search,
        }
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    /// Raw query string without the leading `?`.
    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn search_params(&self) -> SearchParams {
        SearchParams::parse(&self.search)
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::parse("about:blank")
    }
}

/// Decoded `application/x-www-form-urlencoded` pairs in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    pairs: Vec<(String, String)>,
}

impl SearchParams {
    /// Accepts the query with or without a leading `?`.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs = query
            .split('&')
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (name, value) = part.split_once('=').unwrap_or((part, ""));
                (decode_component(name), decode_component(value))
            })
            .collect();
        Self { pairs }
    }

    /// First value for `name`, like `URLSearchParams.get`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
