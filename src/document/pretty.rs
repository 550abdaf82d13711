//! Indented markup serialization
//!
//! One node per line, one space of indent per nesting level. Attributes are
//! written in name order so output does not depend on hash iteration order.

use scraper::{ElementRef, Html, Node};

/// Elements that never have a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text is emitted without escaping
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub(crate) fn prettify(html: &Html) -> String {
    let mut out = String::new();
    for child in html.tree.root().children() {
        match ElementRef::wrap(child) {
            Some(element) => write_element(&mut out, element, 0),
            None => write_leaf(&mut out, child.value(), 0, false),
        }
    }
    out
}

fn write_element(out: &mut String, element: ElementRef<'_>, depth: usize) {
    let value = element.value();
    let name = value.name();

    let mut attrs: Vec<(&str, &str)> = value.attrs().collect();
    attrs.sort_by(|a, b| a.0.cmp(b.0));

    let mut open = format!("<{}", name);
    for (attr, attr_value) in attrs {
        open.push_str(&format!(" {}=\"{}\"", attr, escape_attribute(attr_value)));
    }

    if VOID_ELEMENTS.contains(&name) {
        open.push_str("/>");
        push_line(out, depth, &open);
        return;
    }

    open.push('>');
    push_line(out, depth, &open);

    let raw = RAW_TEXT_ELEMENTS.contains(&name);
    for child in element.children() {
        match ElementRef::wrap(child) {
            Some(child_element) => write_element(out, child_element, depth + 1),
            None => write_leaf(out, child.value(), depth + 1, raw),
        }
    }

    push_line(out, depth, &format!("</{}>", name));
}

fn write_leaf(out: &mut String, node: &Node, depth: usize, raw: bool) {
    match node {
        Node::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return;
            }
            if raw {
                push_line(out, depth, trimmed);
            } else {
                push_line(out, depth, &escape_text(trimmed));
            }
        }
        Node::Comment(comment) => {
            let body: &str = comment;
            push_line(out, depth, &format!("<!--{}-->", body));
        }
        Node::Doctype(doctype) => {
            push_line(out, depth, &format!("<!DOCTYPE {}>", doctype.name()));
        }
        _ => {}
    }
}

fn push_line(out: &mut String, depth: usize, line: &str) {
    for _ in 0..depth {
        out.push(' ');
    }
    out.push_str(line);
    out.push('\n');
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
