//! HTML loading and serialization
//!
//! Parsing goes through `scraper` (html5ever), so malformed markup is repaired
//! the same way a browser would before it reaches the arena. The `<body>`
//! subtree becomes the live tree; the doctype, the `<html>` attributes and the
//! `<head>` are kept verbatim so a cleaned page can be written back whole.
//! Comments and processing instructions inside the body are dropped.

use super::{Document, NodeId, NodeKind};
use scraper::{ElementRef, Html, Node};

/// Elements serialized without a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose text is written out unescaped
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "style", "script", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

/// Everything of a parsed page that lives outside `<body>`
#[derive(Debug, Clone, Default)]
pub(super) struct PageShell {
    doctype: Option<String>,
    root_attrs: Vec<(String, String)>,
    head: String,
}

impl PageShell {
    fn capture(parsed: &Html) -> Self {
        let doctype = parsed
            .tree
            .root()
            .children()
            .find_map(|node| match node.value() {
                Node::Doctype(doctype) => Some(format!("<!DOCTYPE {}>", doctype.name())),
                _ => None,
            });
        let root = parsed.root_element();
        let root_attrs = root
            .value()
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        let head = root
            .children()
            .filter_map(ElementRef::wrap)
            .find(|element| element.value().name() == "head")
            .map(|head| head.html())
            .unwrap_or_default();

        Self {
            doctype,
            root_attrs,
            head,
        }
    }
}

impl Document {
    /// Build a document from an HTML page or fragment
    pub fn parse_html(source: &str) -> Self {
        let parsed = Html::parse_document(source);
        let mut doc = Document::new();
        let body_id = doc.body();
        doc.page = Some(PageShell::capture(&parsed));

        let body = parsed
            .root_element()
            .children()
            .find(|child| matches!(child.value(), Node::Element(e) if e.name() == "body"));
        let Some(body) = body else {
            return doc;
        };

        if let Node::Element(element) = body.value() {
            for (name, value) in element.attrs() {
                doc.set_attr(body_id, name, value);
            }
        }

        // (source node, arena parent)
        let mut stack: Vec<_> = body.children().map(|c| (c, body_id)).collect();
        stack.reverse();
        while let Some((node, parent)) = stack.pop() {
            match node.value() {
                Node::Element(element) => {
                    let id = doc.create_element(element.name());
                    for (name, value) in element.attrs() {
                        doc.set_attr(id, name, value);
                    }
                    doc.append_child(parent, id);
                    let mut children: Vec<_> = node.children().map(|c| (c, id)).collect();
                    children.reverse();
                    stack.extend(children);
                }
                Node::Text(text) => {
                    let text: &str = &text.text;
                    doc.append_text(parent, text);
                }
                _ => {}
            }
        }

        doc
    }

    /// Serialize the whole page: the preserved shell around the cleaned body.
    /// Documents built in memory have no shell and serialize as their body.
    pub fn to_html(&self) -> String {
        let body = self.outer_html(self.body());
        let Some(page) = &self.page else {
            return body;
        };

        let mut out = String::new();
        if let Some(doctype) = &page.doctype {
            out.push_str(doctype);
        }
        out.push_str("<html");
        write_attrs(page.root_attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())), &mut out);
        out.push('>');
        out.push_str(&page.head);
        out.push_str(&body);
        out.push_str("</html>");
        out
    }

    /// Serialize a node and its subtree
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    /// Serialize only the children of a node
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_node(*child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => {
                let raw = self
                    .parent(id)
                    .and_then(|parent| self.tag(parent))
                    .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag));
                if raw {
                    out.push_str(text);
                } else {
                    escape_into(text, false, out);
                }
            }
            Some(NodeKind::Element(element)) => {
                out.push('<');
                out.push_str(element.tag());
                write_attrs(element.attrs(), out);
                out.push('>');
                if VOID_ELEMENTS.contains(&element.tag()) {
                    return;
                }
                for child in self.children(id) {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(element.tag());
                out.push('>');
            }
            None => {}
        }
    }
}

fn write_attrs<'a>(attrs: impl Iterator<Item = (&'a str, &'a str)>, out: &mut String) {
    for (name, value) in attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_into(value, true, out);
        out.push('"');
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_imports_body_structure() {
        let doc = Document::parse_html(
            r#"<html><body class="mail"><div contenteditable="true"><div>Hi</div><blockquote>quoted</blockquote></div></body></html>"#,
        );
        let body = doc.body();
        let compose = doc.children(body)[0];

        assert!(doc.element(body).unwrap().has_class("mail"));
        assert_eq!(doc.tag(compose), Some("div"));
        assert_eq!(doc.element(compose).unwrap().attr("contenteditable"), Some("true"));
        assert_eq!(doc.text_content(compose), "Hiquoted");
    }

    #[test]
    fn test_parse_fragment_without_body() {
        let doc = Document::parse_html("<div>From: someone</div>");
        let first = doc.children(doc.body())[0];
        assert_eq!(doc.text_content(first), "From: someone");
    }

    #[test]
    fn test_parse_decodes_entities() {
        let doc = Document::parse_html("<div>On Mon, Bob &lt;bob@example.com&gt; wrote:</div>");
        let first = doc.children(doc.body())[0];
        assert_eq!(doc.text_content(first), "On Mon, Bob <bob@example.com> wrote:");
    }

    #[test]
    fn test_serialize_escapes_text_and_attributes() {
        let mut doc = Document::new();
        let body = doc.body();
        let div = doc.append_element(body, "div", &[("title", "a \"b\" & c")]);
        doc.append_text(div, "1 < 2 & <tag>");
        doc.append_element(div, "br", &[]);

        assert_eq!(
            doc.inner_html(body),
            r#"<div title="a &quot;b&quot; &amp; c">1 &lt; 2 &amp; &lt;tag&gt;<br></div>"#
        );
    }

    #[test]
    fn test_serialize_after_parse_keeps_markup() {
        let source = r#"<div class="a"><p>one</p><p>two<br>three</p></div>"#;
        let doc = Document::parse_html(source);
        assert_eq!(doc.inner_html(doc.body()), source);
    }

    #[test]
    fn test_full_page_round_trips_with_head() {
        let source = concat!(
            r#"<!DOCTYPE html><html lang="en"><head><meta charset="utf-8">"#,
            "<title>Re: plans</title><style>.a > b { color: red }</style></head>",
            r#"<body class="mail"><div>x</div></body></html>"#,
        );
        let doc = Document::parse_html(source);
        assert_eq!(doc.to_html(), source);
    }

    #[test]
    fn test_raw_text_is_not_escaped() {
        let source = "<div>x &amp; y</div><style>div > p { color: red }</style>\
                      <script>if (a < b && c) {}</script>";
        let doc = Document::parse_html(source);
        assert_eq!(doc.inner_html(doc.body()), source);
    }

    #[test]
    fn test_in_memory_document_serializes_as_body() {
        let mut doc = Document::new();
        let body = doc.body();
        doc.append_element(body, "p", &[]);
        assert_eq!(doc.to_html(), "<body><p></p></body>");
    }

    #[test]
    fn test_outer_html_of_removed_node_is_empty() {
        let mut doc = Document::parse_html("<div><span>x</span></div>");
        let div = doc.children(doc.body())[0];
        doc.remove(div);
        assert_eq!(doc.outer_html(div), "");
    }
}
