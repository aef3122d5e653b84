//! Minimal HTML scanning helpers for the council pages.
//!
//! The roster and search pages are table soup from a legacy CMS; a full DOM
//! is overkill. These helpers slice tag blocks out of the raw text,
//! case-insensitively, without allocating a tree.

/// ASCII-only lowercase so byte offsets line up with the original text.
fn to_lower(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() { c.to_ascii_lowercase() } else { c })
        .collect()
}

/// Find the next `<tag` opening at or after `from`, honoring a word boundary.
fn find_open(lower: &str, tag: &str, from: usize) -> Option<usize> {
    let needle = format!("<{tag}");
    let mut at = from;
    while let Some(pos) = lower.get(at..)?.find(&needle) {
        let start = at + pos;
        match lower.as_bytes().get(start + needle.len()) {
            Some(b'>' | b' ' | b'\t' | b'\r' | b'\n' | b'/') => return Some(start),
            None => return None,
            _ => at = start + 1,
        }
    }
    None
}

/// All non-nested `<tag>...</tag>` blocks, including the tags themselves.
pub fn tag_blocks<'a>(s: &'a str, tag: &str) -> Vec<&'a str> {
    let lower = to_lower(s);
    let close = format!("</{tag}>");
    let mut out = Vec::new();
    let mut at = 0;
    while let Some(start) = find_open(&lower, tag, at) {
        let Some(gt) = lower[start..].find('>') else { break };
        let open_end = start + gt + 1;
        let Some(rel) = lower[open_end..].find(&close) else { break };
        let end = open_end + rel + close.len();
        out.push(&s[start..end]);
        at = end;
    }
    out
}

/// Content between the opening tag's `>` and the closing tag.
pub fn inner(block: &str) -> &str {
    match (block.find('>'), block.rfind('<')) {
        (Some(open_end), Some(close_start)) if close_start > open_end => {
            &block[open_end + 1..close_start]
        }
        _ => "",
    }
}

/// Attribute value from the opening tag of a fragment.
pub fn attr(fragment: &str, name: &str) -> Option<String> {
    let lower = to_lower(fragment);
    let open_end = lower.find('>').map_or(lower.len(), |i| i + 1);
    let open = &fragment[..open_end];
    let lower_open = &lower[..open_end];

    let mut at = 0;
    while let Some(pos) = lower_open[at..].find(name) {
        let start = at + pos;
        let boundary = start > 0 && lower_open.as_bytes()[start - 1].is_ascii_whitespace();
        let rest = open[start + name.len()..].trim_start();
        if boundary && rest.starts_with('=') {
            let rest = rest[1..].trim_start();
            let value = if let Some(quoted) = rest.strip_prefix('"') {
                quoted.split('"').next()
            } else if let Some(quoted) = rest.strip_prefix('\'') {
                quoted.split('\'').next()
            } else {
                rest.split(|c: char| c.is_ascii_whitespace() || c == '>').next()
            };
            return value.map(str::to_string);
        }
        at = start + 1;
    }
    None
}

/// All `<table>` blocks on the page.
pub fn tables(html: &str) -> Vec<&str> {
    tag_blocks(html, "table")
}

/// The `<table>` block with the given `id` attribute.
pub fn table_with_id<'a>(html: &'a str, id: &str) -> Option<&'a str> {
    tables(html).into_iter().find(|t| attr(t, "id").as_deref() == Some(id))
}

/// All `<tr>` blocks of a table.
pub fn rows(table: &str) -> Vec<&str> {
    tag_blocks(table, "tr")
}

/// Inner HTML of each `<td>`/`<th>` cell of a row, in document order.
pub fn cell_fragments(row: &str) -> Vec<&str> {
    let lower = to_lower(row);
    let mut out = Vec::new();
    let mut at = 0;
    loop {
        let td = find_open(&lower, "td", at);
        let th = find_open(&lower, "th", at);
        let (start, close) = match (td, th) {
            (Some(a), Some(b)) if a <= b => (a, "</td>"),
            (Some(a), None) => (a, "</td>"),
            (_, Some(b)) => (b, "</th>"),
            (None, None) => break,
        };
        let Some(gt) = lower[start..].find('>') else { break };
        let open_end = start + gt + 1;
        let Some(rel) = lower[open_end..].find(close) else { break };
        out.push(&row[open_end..open_end + rel]);
        at = open_end + rel + close.len();
    }
    out
}

/// Cleaned text of each cell of a row.
pub fn cells(row: &str) -> Vec<String> {
    cell_fragments(row).into_iter().map(text).collect()
}

/// Drop everything between `<` and `>`.
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Decode the handful of entities these pages actually emit.
pub fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Collapse whitespace runs into single spaces and trim.
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

/// Visible text of a fragment: tags stripped, entities decoded, whitespace
/// normalized.
pub fn text(fragment: &str) -> String {
    normalize_ws(&decode_entities(&strip_tags(fragment)))
}
