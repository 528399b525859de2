//! HTML → ENML conversion.
//!
//! ENML is XHTML restricted by Evernote's DTD: a fixed element set, no
//! `id`/`class`/event-handler attributes, and it must be well-formed XML.
//! Pages are parsed with an HTML5 parser and re-serialised through a
//! whitelist.

use scraper::{Html, Node};

/// Elements ENML accepts as-is.
const ALLOWED_ELEMENTS: &[&str] = &[
    "a", "abbr", "acronym", "address", "area", "b", "bdo", "big", "blockquote", "br", "caption",
    "center", "cite", "code", "col", "colgroup", "dd", "del", "dfn", "div", "dl", "dt", "em",
    "font", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img", "ins", "kbd", "li", "map", "ol",
    "p", "pre", "q", "s", "samp", "small", "span", "strike", "strong", "sub", "sup", "table",
    "tbody", "td", "tfoot", "th", "thead", "tr", "tt", "u", "ul", "var",
];

/// Elements removed together with everything inside them.
const DROPPED_ELEMENTS: &[&str] = &[
    "applet", "base", "basefont", "bgsound", "button", "canvas", "datalist", "embed", "fieldset",
    "form", "frame", "frameset", "head", "iframe", "input", "isindex", "keygen", "label", "legend",
    "link", "math", "meta", "noembed", "noframes", "noscript", "object", "optgroup", "option",
    "param", "script", "select", "style", "svg", "template", "textarea", "title", "xml",
];

/// Non-ENML elements that still start a new block; rendered as `div`.
const BLOCK_ELEMENTS: &[&str] = &[
    "article", "aside", "details", "dir", "figcaption", "figure", "footer", "header", "hgroup",
    "listing", "main", "menu", "nav", "plaintext", "section", "summary", "xmp",
];

const VOID_ELEMENTS: &[&str] = &["area", "br", "col", "hr", "img"];

/// Attributes enml2.dtd allows on every element except `br`.
const COMMON_ATTRIBUTES: &[&str] = &["dir", "lang", "style", "title"];

/// Per-element attributes from enml2.dtd, on top of the common ones.
fn element_attributes(element: &str) -> &'static [&'static str] {
    match element {
        "a" => &[
            "charset", "coords", "href", "hreflang", "name", "rel", "rev", "shape", "target",
            "type",
        ],
        "area" => &["alt", "coords", "href", "nohref", "shape", "target"],
        "blockquote" | "q" => &["cite"],
        "br" => &["clear"],
        "caption" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "p" => &["align"],
        "col" | "colgroup" => &["align", "char", "charoff", "span", "valign", "width"],
        "del" | "ins" => &["cite", "datetime"],
        "dl" => &["compact"],
        "font" => &["color", "face", "size"],
        "hr" => &["align", "noshade", "size", "width"],
        "img" => &[
            "align", "alt", "border", "height", "hspace", "ismap", "longdesc", "name", "src",
            "usemap", "vspace", "width",
        ],
        "li" => &["type", "value"],
        "map" => &["name"],
        "ol" => &["compact", "start", "type"],
        "ul" => &["compact", "type"],
        "pre" => &["width"],
        "table" => &[
            "align", "bgcolor", "border", "cellpadding", "cellspacing", "frame", "rules",
            "summary", "width",
        ],
        "tbody" | "tfoot" | "thead" => &["align", "char", "charoff", "valign"],
        "tr" => &["align", "bgcolor", "char", "charoff", "valign"],
        "td" | "th" => &[
            "abbr", "align", "axis", "bgcolor", "char", "charoff", "colspan", "headers", "height",
            "nowrap", "rowspan", "scope", "valign", "width",
        ],
        _ => &[],
    }
}

const URL_ATTRIBUTES: &[&str] = &["href", "src", "cite", "longdesc"];

const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto", "ftp"];

/// Convert HTML posted by the extension into an ENML fragment suitable for
/// the body of an `<en-note>`. The extension sends entity-escaped markup,
/// so entities are decoded before parsing.
pub fn html_to_enml(html: &str) -> String {
    let decoded = html_escape::decode_html_entities(html);
    let fragment = Html::parse_fragment(&decoded);

    let mut out = String::with_capacity(decoded.len());

    // One frame per open element: its remaining children and the tag to
    // close once they are done.
    let mut stack = vec![(fragment.root_element().children(), None)];

    while let Some((children, closing)) = stack.last_mut() {
        let Some(child) = children.next() else {
            if let Some(name) = closing.take() {
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            stack.pop();
            continue;
        };

        let el = match child.value() {
            Node::Text(text) => {
                push_text(text, &mut out);
                continue;
            }
            Node::Element(el) => el,
            // comments, doctypes, processing instructions
            _ => continue,
        };
        let name = el.name();

        if DROPPED_ELEMENTS.contains(&name) {
            continue;
        }

        if !ALLOWED_ELEMENTS.contains(&name) {
            if BLOCK_ELEMENTS.contains(&name) {
                out.push_str("<div>");
                stack.push((child.children(), Some("div")));
            } else {
                stack.push((child.children(), None));
            }
            continue;
        }

        let mut attrs: Vec<(&str, &str)> = el
            .attrs()
            .filter(|(attr, value)| keep_attribute(name, attr, value))
            .collect();
        attrs.sort_by(|a, b| a.0.cmp(b.0));

        // An img without a usable source is an empty box in the note.
        if name == "img" && !attrs.iter().any(|(attr, _)| *attr == "src") {
            continue;
        }

        out.push('<');
        out.push_str(name);
        for (attr, value) in attrs {
            out.push(' ');
            out.push_str(attr);
            out.push_str("=\"");
            out.push_str(&html_escape::encode_double_quoted_attribute(&xml_safe(value)));
            out.push('"');
        }

        if VOID_ELEMENTS.contains(&name) {
            out.push_str("/>");
            continue;
        }

        out.push('>');
        stack.push((child.children(), Some(name)));
    }

    out
}

fn keep_attribute(element: &str, attr: &str, value: &str) -> bool {
    let common: &[&str] = if element == "br" {
        &["style", "title"]
    } else {
        COMMON_ATTRIBUTES
    };
    if !common.contains(&attr) && !element_attributes(element).contains(&attr) {
        return false;
    }
    if attr == "usemap" {
        return value.starts_with('#');
    }
    if URL_ATTRIBUTES.contains(&attr) {
        return is_allowed_url(value);
    }
    true
}

fn is_allowed_url(value: &str) -> bool {
    match url::Url::parse(value.trim()) {
        Ok(url) => ALLOWED_SCHEMES.contains(&url.scheme()),
        Err(_) => false,
    }
}

fn push_text(text: &str, out: &mut String) {
    out.push_str(&html_escape::encode_text(&xml_safe(text)));
}

/// Drop characters XML 1.0 does not allow in documents.
fn xml_safe(s: &str) -> String {
    s.chars()
        .filter(|c| {
            matches!(c, '\t' | '\n' | '\r')
                || (!c.is_control() && !matches!(c, '\u{FFFE}' | '\u{FFFF}'))
        })
        .collect()
}
