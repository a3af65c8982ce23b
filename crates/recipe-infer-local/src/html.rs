//! HTML → [`Node`] adapter.

use recipe_infer_core::Node;

/// Subtrees that never carry recipe text.
const DROPPED: &[&str] = &["script", "style", "noscript", "template", "img"];

/// Parse `html` and return its `<body>` (or the root element when there is none).
///
/// Comments, doctypes and processing instructions are dropped.
pub fn parse_document(html: &str) -> Node {
    let doc = html_scraper::Html::parse_document(html);
    let body = html_scraper::Selector::parse("body")
        .ok()
        .and_then(|sel| doc.select(&sel).next());
    convert(body.unwrap_or_else(|| doc.root_element()))
}

/// Copies the scraper tree with an explicit stack of open elements, so
/// nesting depth is bounded by the heap rather than the call stack.
fn convert(root: html_scraper::ElementRef<'_>) -> Node {
    let mut open = Vec::new();
    let mut current = (root, root.children(), Vec::new());
    loop {
        match current.1.next() {
            Some(child) => {
                if let Some(child_el) = html_scraper::ElementRef::wrap(child) {
                    if !DROPPED.contains(&child_el.value().name()) {
                        let next = (child_el, child_el.children(), Vec::new());
                        open.push(std::mem::replace(&mut current, next));
                    }
                } else if let Some(text) = child.value().as_text() {
                    let s: &str = text;
                    current.2.push(Node::text(s));
                }
            }
            None => {
                let (el, _, children) = current;
                let node = Node::element(el.value().name(), children);
                match open.pop() {
                    Some(parent) => {
                        current = parent;
                        current.2.push(node);
                    }
                    None => return node,
                }
            }
        }
    }
}
