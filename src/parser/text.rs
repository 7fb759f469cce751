use scraper::{ElementRef, Html};

/// Never contribute text to any extraction stage.
pub const NON_CONTENT: &[&str] = &["script", "style", "noscript", "template"];

/// Additionally dropped before handing text to the inference service.
pub const PAGE_CHROME: &[&str] = &["header", "footer", "nav"];

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Visible text of the whole document with whitespace collapsed.
/// Inline siblings are concatenated as-is so split markup like
/// `<span>$</span><span>29</span><span>.99</span>` still reads `$29.99`.
pub fn visible_text(doc: &Html, skip: &[&str]) -> String {
    element_text(doc.root_element(), skip)
}

pub fn element_text(el: ElementRef<'_>, skip: &[&str]) -> String {
    let mut out = String::new();
    collect(el, skip, &mut out);
    collapse_whitespace(&out)
}

fn collect(el: ElementRef<'_>, skip: &[&str], out: &mut String) {
    let name = el.value().name();
    if skip.contains(&name) {
        return;
    }
    let block = BLOCK_ELEMENTS.contains(&name);
    if block {
        out.push(' ');
    }
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            collect(child_el, skip, out);
        }
    }
    if block {
        out.push(' ');
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Byte range covering up to `radius` characters either side of `start..end`,
/// clamped to char boundaries.
pub fn window(text: &str, start: usize, end: usize, radius: usize) -> (usize, usize) {
    let from = text[..start]
        .char_indices()
        .rev()
        .nth(radius.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    (from, to)
}

/// First `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_scripts_and_keeps_inline_runs_together() {
        let doc = Html::parse_document(
            r#"<html><head><style>.a{}</style></head><body>
               <script>var price = "$1.00";</script>
               <div><span>$</span><span>29</span><span>.99</span></div>
               <p>per month</p></body></html>"#,
        );
        assert_eq!(visible_text(&doc, NON_CONTENT), "$29.99 per month");
    }

    #[test]
    fn block_elements_are_separated() {
        let doc = Html::parse_document("<ul><li>Starter</li><li>Pro</li></ul>");
        assert_eq!(visible_text(&doc, NON_CONTENT), "Starter Pro");
    }

    #[test]
    fn page_chrome_can_be_skipped() {
        let doc = Html::parse_document("<nav>Menu</nav><main>Plans</main><footer>(c)</footer>");
        let skip: Vec<&str> = NON_CONTENT.iter().chain(PAGE_CHROME).copied().collect();
        assert_eq!(visible_text(&doc, &skip), "Plans");
    }

    #[test]
    fn window_respects_char_boundaries() {
        let text = "ééé€10ééé";
        let start = text.find('€').unwrap();
        let end = start + "€10".len();
        let (from, to) = window(text, start, end, 2);
        assert_eq!(&text[from..to], "éé€10éé");
        assert_eq!(window(text, start, end, 100), (0, text.len()));
    }

    #[test]
    fn truncates_by_characters() {
        assert_eq!(truncate_chars("€€€", 2), "€€");
        assert_eq!(truncate_chars("ab", 5), "ab");
    }
}
