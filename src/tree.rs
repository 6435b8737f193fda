//! Owned XML document model and parser.
//!
//! The model keeps exactly the lexical details comparison cares about:
//! attribute order, namespace prefix spelling next to the resolved URI, the
//! CDATA/text distinction, and the DOCTYPE declaration.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::cursor::Cursor;
use crate::error::{Error, Result};

pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

const MAX_ENTITY_DEPTH: usize = 8;

/// Qualified name: prefix spelling kept separate from the resolved URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub namespace: Option<String>,
}

impl QName {
    /// The name as written in the source, `prefix:local` or `local`.
    pub fn as_lexical(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{}:{}", p, self.local),
            None => self.local.clone(),
        }
    }

    /// Same expanded name: local name and namespace URI, prefix ignored.
    pub fn matches_expanded(&self, other: &QName) -> bool {
        self.local == other.local && self.namespace == other.namespace
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(p) => write!(f, "{}:{}", p, self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// Character data; `cdata` records whether it came from a CDATA section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    pub value: String,
    pub cdata: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(Element),
    Text(TextNode),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

impl XmlNode {
    /// True for a non-CDATA text node consisting entirely of XML whitespace.
    pub fn is_whitespace_text(&self) -> bool {
        match self {
            XmlNode::Text(t) => {
                !t.cdata && t.value.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
            }
            _ => false,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            XmlNode::Element(el) => Some(el),
            _ => None,
        }
    }

    pub(crate) fn kind_label(&self) -> &'static str {
        match self {
            XmlNode::Element(_) => "element",
            XmlNode::Text(t) if t.cdata => "CDATA section",
            XmlNode::Text(_) => "text",
            XmlNode::Comment(_) => "comment",
            XmlNode::ProcessingInstruction { .. } => "processing instruction",
        }
    }
}

/// Element node. `namespace_decls` holds the `xmlns`/`xmlns:p` declarations
/// written on this element, in document order; they are scope machinery, not
/// attributes, so they live outside `attributes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    pub namespace_decls: Vec<(Option<String>, String)>,
    pub children: Vec<XmlNode>,
}

impl Element {
    /// First attribute with the given local name, prefix and URI ignored.
    pub fn attribute_value(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.local == local)
            .map(|a| a.value.as_str())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    /// Concatenated text content of this element and its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Text(t) => out.push_str(&t.value),
                XmlNode::Element(el) => el.collect_text(out),
                _ => {}
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctypeDecl {
    pub name: String,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
    pub internal_subset: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub doctype: Option<DoctypeDecl>,
    pub root: Element,
}

impl Document {
    pub fn parse(input: &str) -> Result<Document> {
        let text = normalize_newlines(input);
        Parser::new(text.as_bytes()).parse()
    }

    /// Serialize back to markup. Namespace declarations are written before
    /// ordinary attributes; everything else round-trips in document order.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        if let Some(dt) = &self.doctype {
            write_doctype(dt, &mut out);
        }
        write_element(&self.root, &mut out);
        out
    }
}

impl FromStr for Document {
    type Err = Error;

    fn from_str(s: &str) -> Result<Document> {
        Document::parse(s)
    }
}

fn normalize_newlines(input: &str) -> Cow<'_, str> {
    if input.contains('\r') {
        Cow::Owned(input.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(input)
    }
}

// ---------- serialization ----------

fn write_doctype(dt: &DoctypeDecl, out: &mut String) {
    out.push_str("<!DOCTYPE ");
    out.push_str(&dt.name);
    match (&dt.public_id, &dt.system_id) {
        (Some(public), Some(system)) => {
            out.push_str(" PUBLIC \"");
            out.push_str(public);
            out.push_str("\" \"");
            out.push_str(system);
            out.push('"');
        }
        (None, Some(system)) => {
            out.push_str(" SYSTEM \"");
            out.push_str(system);
            out.push('"');
        }
        _ => {}
    }
    if let Some(subset) = &dt.internal_subset {
        out.push_str(" [");
        out.push_str(subset);
        out.push(']');
    }
    out.push_str(">\n");
}

fn write_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.name.as_lexical());
    for (prefix, uri) in &el.namespace_decls {
        match prefix {
            Some(p) => {
                out.push_str(" xmlns:");
                out.push_str(p);
            }
            None => out.push_str(" xmlns"),
        }
        out.push_str("=\"");
        out.push_str(&escape_attr(uri));
        out.push('"');
    }
    for attr in &el.attributes {
        out.push(' ');
        out.push_str(&attr.name.as_lexical());
        out.push_str("=\"");
        out.push_str(&escape_attr(&attr.value));
        out.push('"');
    }
    if el.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &el.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(&el.name.as_lexical());
    out.push('>');
}

fn write_node(node: &XmlNode, out: &mut String) {
    match node {
        XmlNode::Element(el) => write_element(el, out),
        XmlNode::Text(t) if t.cdata => {
            out.push_str("<![CDATA[");
            out.push_str(&t.value);
            out.push_str("]]>");
        }
        XmlNode::Text(t) => out.push_str(&escape_text(&t.value)),
        XmlNode::Comment(c) => {
            out.push_str("<!--");
            out.push_str(c);
            out.push_str("-->");
        }
        XmlNode::ProcessingInstruction { target, data } => {
            out.push_str("<?");
            out.push_str(target);
            if !data.is_empty() {
                out.push(' ');
                out.push_str(data);
            }
            out.push_str("?>");
        }
    }
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------- parsing ----------

type RawName = (Option<String>, String);
type NsScopes = Vec<Vec<(Option<String>, Option<String>)>>;

struct Parser<'a> {
    cursor: Cursor<'a>,
    entities: HashMap<String, String>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(input),
            entities: HashMap::new(),
        }
    }

    fn parse(mut self) -> Result<Document> {
        self.cursor.consume_seq("\u{feff}".as_bytes());
        self.skip_xml_declaration()?;

        let mut doctype = None;
        let mut root: Option<Element> = None;
        loop {
            self.cursor.skip_whitespace();
            match self.cursor.current() {
                None => break,
                Some(b'<') => {
                    if self.cursor.starts_with(b"<!--") {
                        self.parse_comment()?;
                    } else if self.cursor.starts_with(b"<!DOCTYPE") {
                        if root.is_some() {
                            return Err(self.error_here("DOCTYPE after the root element"));
                        }
                        if doctype.is_some() {
                            return Err(self.error_here("more than one DOCTYPE declaration"));
                        }
                        doctype = Some(self.parse_doctype()?);
                    } else if self.cursor.starts_with(b"<?") {
                        self.parse_pi()?;
                    } else if self.cursor.starts_with(b"<!") {
                        return Err(self.error_here("unexpected markup declaration"));
                    } else {
                        if root.is_some() {
                            return Err(self.error_here("more than one root element"));
                        }
                        let mut scopes: NsScopes = Vec::new();
                        root = Some(self.parse_element(&mut scopes)?);
                    }
                }
                Some(_) => return Err(self.error_here("text outside of the root element")),
            }
        }
        match root {
            Some(root) => Ok(Document { doctype, root }),
            None => Err(self.error_here("no root element")),
        }
    }

    fn skip_xml_declaration(&mut self) -> Result<()> {
        if self.cursor.starts_with(b"<?xml")
            && matches!(self.cursor.peek(5), Some(b' ' | b'\t' | b'\n' | b'\r' | b'?'))
        {
            while !self.cursor.starts_with(b"?>") {
                if self.cursor.is_eof() {
                    return Err(self.error_here("unterminated XML declaration"));
                }
                self.cursor.advance();
            }
            self.cursor.consume_seq(b"?>");
        }
        Ok(())
    }

    fn parse_element(&mut self, scopes: &mut NsScopes) -> Result<Element> {
        self.expect_byte(b'<')?;
        let (raw_prefix, raw_local) = self.parse_qname_raw()?;
        let raw_attrs = self.parse_attr_list()?;

        let mut namespace_decls: Vec<(Option<String>, String)> = Vec::new();
        let mut plain: Vec<(RawName, String)> = Vec::new();
        for ((prefix, local), value) in raw_attrs {
            if prefix.is_none() && local == "xmlns" {
                if namespace_decls.iter().any(|(p, _)| p.is_none()) {
                    return Err(self.error_here("duplicate default namespace declaration"));
                }
                namespace_decls.push((None, value));
            } else if prefix.as_deref() == Some("xmlns") {
                if value.is_empty() {
                    return Err(self.error_here("namespace prefix declaration must not be empty"));
                }
                if namespace_decls.iter().any(|(p, _)| p.as_deref() == Some(local.as_str())) {
                    return Err(
                        self.error_here(&format!("duplicate namespace declaration 'xmlns:{}'", local))
                    );
                }
                namespace_decls.push((Some(local), value));
            } else {
                plain.push(((prefix, local), value));
            }
        }

        // Declarations on this element are in scope for its own name and its
        // attributes; an empty default declaration cancels the default.
        let frame = namespace_decls
            .iter()
            .map(|(p, uri)| {
                let binding = if uri.is_empty() { None } else { Some(uri.clone()) };
                (p.clone(), binding)
            })
            .collect();
        scopes.push(frame);

        let name = self.resolve_name(scopes, raw_prefix.as_deref(), &raw_local, true)?;
        let mut attributes: Vec<Attribute> = Vec::with_capacity(plain.len());
        for ((prefix, local), value) in plain {
            let attr_name = self.resolve_name(scopes, prefix.as_deref(), &local, false)?;
            if attributes.iter().any(|a| a.name.matches_expanded(&attr_name)) {
                return Err(self.error_here(&format!("duplicate attribute '{}'", attr_name)));
            }
            attributes.push(Attribute {
                name: attr_name,
                value,
            });
        }

        if self.cursor.consume(b'/') {
            self.expect_byte(b'>')?;
            scopes.pop();
            return Ok(Element {
                name,
                attributes,
                namespace_decls,
                children: Vec::new(),
            });
        }
        self.expect_byte(b'>')?;

        let mut children = Vec::new();
        loop {
            if self.cursor.starts_with(b"</") {
                break;
            }
            match self.cursor.current() {
                None => {
                    return Err(self.error_here(&format!(
                        "unexpected end of input inside element '{}'",
                        name
                    )))
                }
                Some(b'<') => {
                    if self.cursor.starts_with(b"<!--") {
                        children.push(XmlNode::Comment(self.parse_comment()?));
                    } else if self.cursor.starts_with(b"<![CDATA[") {
                        children.push(XmlNode::Text(TextNode {
                            value: self.parse_cdata()?,
                            cdata: true,
                        }));
                    } else if self.cursor.starts_with(b"<?") {
                        let (target, data) = self.parse_pi()?;
                        children.push(XmlNode::ProcessingInstruction { target, data });
                    } else if self.cursor.starts_with(b"<!") {
                        return Err(self.error_here("unexpected markup declaration in content"));
                    } else {
                        children.push(XmlNode::Element(self.parse_element(scopes)?));
                    }
                }
                Some(_) => {
                    let text = self.parse_text()?;
                    if !text.is_empty() {
                        children.push(XmlNode::Text(TextNode {
                            value: text,
                            cdata: false,
                        }));
                    }
                }
            }
        }

        // End tag must match the start tag as written.
        self.cursor.consume_seq(b"</");
        let (close_prefix, close_local) = self.parse_qname_raw()?;
        if close_prefix != raw_prefix || close_local != raw_local {
            return Err(self.error_here(&format!(
                "mismatched closing tag: expected '</{}>', found '</{}>'",
                lexical(&raw_prefix, &raw_local),
                lexical(&close_prefix, &close_local)
            )));
        }
        self.cursor.skip_whitespace();
        self.expect_byte(b'>')?;
        scopes.pop();

        Ok(Element {
            name,
            attributes,
            namespace_decls,
            children,
        })
    }

    fn parse_attr_list(&mut self) -> Result<Vec<(RawName, String)>> {
        let mut attrs = Vec::new();
        loop {
            self.cursor.skip_whitespace();
            match self.cursor.current() {
                Some(b'>') | Some(b'/') => break,
                None => return Err(self.error_here("unexpected end of input in start tag")),
                _ => {
                    let name = self.parse_qname_raw()?;
                    self.cursor.skip_whitespace();
                    self.expect_byte(b'=')?;
                    self.cursor.skip_whitespace();
                    let value = self.parse_attribute_value()?;
                    match self.cursor.current() {
                        Some(b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/') | None => {}
                        _ => {
                            return Err(
                                self.error_here("expected whitespace between attributes")
                            )
                        }
                    }
                    attrs.push((name, value));
                }
            }
        }
        Ok(attrs)
    }

    fn parse_attribute_value(&mut self) -> Result<String> {
        let quote = match self.cursor.current() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return Err(self.error_here("expected quoted attribute value")),
        };
        self.cursor.advance();
        let start = self.cursor.pos();
        loop {
            match self.cursor.current() {
                None => return Err(self.error_here("unterminated attribute value")),
                Some(b'<') => {
                    return Err(self.error_here("'<' is not allowed in an attribute value"))
                }
                Some(b) if b == quote => break,
                Some(_) => self.cursor.advance(),
            }
        }
        let raw = bytes_to_string(self.cursor.slice_from(start))?;
        self.cursor.advance();
        // Literal whitespace normalizes to spaces before entity expansion,
        // so character references keep their exact characters.
        let normalized: String = raw
            .chars()
            .map(|c| if matches!(c, '\t' | '\n') { ' ' } else { c })
            .collect();
        self.decode_entities(&normalized)
    }

    fn parse_text(&mut self) -> Result<String> {
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == b'<' {
                break;
            }
            self.cursor.advance();
        }
        let raw = bytes_to_string(self.cursor.slice_from(start))?;
        self.decode_entities(&raw)
    }

    fn parse_comment(&mut self) -> Result<String> {
        self.cursor.consume_seq(b"<!--");
        let start = self.cursor.pos();
        while !self.cursor.starts_with(b"-->") {
            if self.cursor.is_eof() {
                return Err(self.error_here("unterminated comment"));
            }
            self.cursor.advance();
        }
        let text = bytes_to_string(self.cursor.slice_from(start))?;
        self.cursor.consume_seq(b"-->");
        Ok(text)
    }

    fn parse_cdata(&mut self) -> Result<String> {
        self.cursor.consume_seq(b"<![CDATA[");
        let start = self.cursor.pos();
        while !self.cursor.starts_with(b"]]>") {
            if self.cursor.is_eof() {
                return Err(self.error_here("unterminated CDATA section"));
            }
            self.cursor.advance();
        }
        let text = bytes_to_string(self.cursor.slice_from(start))?;
        self.cursor.consume_seq(b"]]>");
        Ok(text)
    }

    fn parse_pi(&mut self) -> Result<(String, String)> {
        self.cursor.consume_seq(b"<?");
        let (prefix, target) = self.parse_qname_raw()?;
        if prefix.is_some() {
            return Err(self.error_here("processing instruction target must not contain ':'"));
        }
        if target.eq_ignore_ascii_case("xml") {
            return Err(self.error_here("reserved processing instruction target"));
        }
        let data = if matches!(self.cursor.current(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.cursor.skip_whitespace();
            let start = self.cursor.pos();
            while !self.cursor.starts_with(b"?>") {
                if self.cursor.is_eof() {
                    return Err(self.error_here("unterminated processing instruction"));
                }
                self.cursor.advance();
            }
            bytes_to_string(self.cursor.slice_from(start))?
        } else {
            String::new()
        };
        if !self.cursor.consume_seq(b"?>") {
            return Err(self.error_here("expected '?>'"));
        }
        Ok((target, data))
    }

    fn parse_doctype(&mut self) -> Result<DoctypeDecl> {
        self.cursor.consume_seq(b"<!DOCTYPE");
        if !matches!(self.cursor.current(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            return Err(self.error_here("expected whitespace after '<!DOCTYPE'"));
        }
        self.cursor.skip_whitespace();
        let (prefix, local) = self.parse_qname_raw()?;
        let name = lexical(&prefix, &local);
        self.cursor.skip_whitespace();

        let mut public_id = None;
        let mut system_id = None;
        if self.cursor.consume_seq(b"SYSTEM") {
            self.cursor.skip_whitespace();
            system_id = Some(self.parse_quoted_literal()?);
        } else if self.cursor.consume_seq(b"PUBLIC") {
            self.cursor.skip_whitespace();
            public_id = Some(self.parse_quoted_literal()?);
            self.cursor.skip_whitespace();
            system_id = Some(self.parse_quoted_literal()?);
        }
        self.cursor.skip_whitespace();

        let mut internal_subset = None;
        if self.cursor.consume(b'[') {
            let start = self.cursor.pos();
            loop {
                // Comments and processing instructions may contain ']'.
                if self.cursor.starts_with(b"<!--") {
                    self.skip_subset_span(b"<!--", b"-->", "comment")?;
                    continue;
                }
                if self.cursor.starts_with(b"<?") {
                    self.skip_subset_span(b"<?", b"?>", "processing instruction")?;
                    continue;
                }
                match self.cursor.current() {
                    None => {
                        return Err(self.error_here("unterminated DOCTYPE internal subset"))
                    }
                    Some(b']') => break,
                    Some(q @ (b'"' | b'\'')) => {
                        self.cursor.advance();
                        loop {
                            match self.cursor.current() {
                                None => {
                                    return Err(self.error_here("unterminated literal in DOCTYPE"))
                                }
                                Some(b) if b == q => break,
                                Some(_) => self.cursor.advance(),
                            }
                        }
                        self.cursor.advance();
                    }
                    Some(_) => self.cursor.advance(),
                }
            }
            let raw = bytes_to_string(self.cursor.slice_from(start))?;
            self.cursor.advance();
            self.scan_internal_entities(&raw);
            internal_subset = Some(raw);
            self.cursor.skip_whitespace();
        }
        self.expect_byte(b'>')?;
        Ok(DoctypeDecl {
            name,
            public_id,
            system_id,
            internal_subset,
        })
    }

    fn skip_subset_span(&mut self, open: &[u8], close: &[u8], what: &str) -> Result<()> {
        self.cursor.consume_seq(open);
        while !self.cursor.starts_with(close) {
            if self.cursor.is_eof() {
                return Err(self.error_here(&format!("unterminated {} in DOCTYPE", what)));
            }
            self.cursor.advance();
        }
        self.cursor.consume_seq(close);
        Ok(())
    }

    fn parse_quoted_literal(&mut self) -> Result<String> {
        let quote = match self.cursor.current() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return Err(self.error_here("expected quoted literal")),
        };
        self.cursor.advance();
        let start = self.cursor.pos();
        loop {
            match self.cursor.current() {
                None => return Err(self.error_here("unterminated literal")),
                Some(b) if b == quote => break,
                Some(_) => self.cursor.advance(),
            }
        }
        let value = bytes_to_string(self.cursor.slice_from(start))?;
        self.cursor.advance();
        Ok(value)
    }

    /// Record `<!ENTITY name "value">` general entities from the internal
    /// subset so references in content can be decoded. Parameter entities and
    /// anything else in the subset are left for the validator.
    fn scan_internal_entities(&mut self, subset: &str) {
        let mut c = Cursor::new(subset.as_bytes());
        while !c.is_eof() {
            if c.starts_with(b"<!--") {
                c.consume_seq(b"<!--");
                while !c.is_eof() && !c.starts_with(b"-->") {
                    c.advance();
                }
                c.consume_seq(b"-->");
            } else if c.consume_seq(b"<!ENTITY") {
                c.skip_whitespace();
                if c.current() == Some(b'%') {
                    continue;
                }
                let start = c.pos();
                while matches!(c.current(), Some(b) if is_name_char(b)) {
                    c.advance();
                }
                let name = match std::str::from_utf8(c.slice_from(start)) {
                    Ok(n) if !n.is_empty() => n.to_string(),
                    _ => continue,
                };
                c.skip_whitespace();
                if let Some(q @ (b'"' | b'\'')) = c.current() {
                    c.advance();
                    let vstart = c.pos();
                    while c.current().is_some() && c.current() != Some(q) {
                        c.advance();
                    }
                    if let Ok(value) = std::str::from_utf8(c.slice_from(vstart)) {
                        self.entities.insert(name, value.to_string());
                    }
                    c.advance();
                }
            } else {
                c.advance();
            }
        }
    }

    fn parse_qname_raw(&mut self) -> Result<RawName> {
        let first = self.parse_name()?;
        if self.cursor.consume(b':') {
            let second = self.parse_name()?;
            if self.cursor.current() == Some(b':') {
                return Err(self.error_here("invalid name: more than one ':'"));
            }
            Ok((Some(first), second))
        } else {
            Ok((None, first))
        }
    }

    fn parse_name(&mut self) -> Result<String> {
        match self.cursor.current() {
            Some(b) if is_name_start(b) => {}
            _ => return Err(self.error_here("expected a name")),
        }
        let start = self.cursor.pos();
        while matches!(self.cursor.current(), Some(b) if is_name_char(b)) {
            self.cursor.advance();
        }
        bytes_to_string(self.cursor.slice_from(start))
    }

    fn resolve_name(
        &self,
        scopes: &NsScopes,
        prefix: Option<&str>,
        local: &str,
        use_default: bool,
    ) -> Result<QName> {
        let namespace = match prefix {
            Some("xml") => Some(XML_NAMESPACE.to_string()),
            Some(p) => match lookup_prefix(scopes, Some(p)) {
                Some(Some(uri)) => Some(uri),
                _ => {
                    return Err(Error::ParseError(format!(
                        "undeclared namespace prefix '{}' at line {}, column {}",
                        p,
                        self.cursor.line(),
                        self.cursor.column()
                    )))
                }
            },
            // The default namespace applies to elements only.
            None if use_default => lookup_prefix(scopes, None).flatten(),
            None => None,
        };
        Ok(QName {
            prefix: prefix.map(str::to_string),
            local: local.to_string(),
            namespace,
        })
    }

    fn decode_entities(&self, input: &str) -> Result<String> {
        self.decode_entities_depth(input, 0)
    }

    fn decode_entities_depth(&self, input: &str, depth: usize) -> Result<String> {
        if !input.contains('&') {
            return Ok(input.to_string());
        }
        if depth > MAX_ENTITY_DEPTH {
            return Err(Error::ParseError(
                "entity references nested too deeply".to_string(),
            ));
        }
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(amp) = rest.find('&') {
            out.push_str(&rest[..amp]);
            let after = &rest[amp + 1..];
            let semi = after.find(';').ok_or_else(|| {
                Error::ParseError("unterminated entity reference".to_string())
            })?;
            let entity = &after[..semi];
            match entity {
                "amp" => out.push('&'),
                "lt" => out.push('<'),
                "gt" => out.push('>'),
                "quot" => out.push('"'),
                "apos" => out.push('\''),
                _ if entity.starts_with('#') => {
                    let c = decode_char_ref(entity).ok_or_else(|| {
                        Error::ParseError(format!("invalid character reference '&{};'", entity))
                    })?;
                    out.push(c);
                }
                _ => match self.entities.get(entity) {
                    Some(replacement) => {
                        out.push_str(&self.decode_entities_depth(replacement, depth + 1)?)
                    }
                    None => {
                        return Err(Error::ParseError(format!(
                            "undefined entity '&{};'",
                            entity
                        )))
                    }
                },
            }
            rest = &after[semi + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn expect_byte(&mut self, expected: u8) -> Result<()> {
        if self.cursor.consume(expected) {
            Ok(())
        } else {
            Err(self.error_here(&format!("expected '{}'", expected as char)))
        }
    }

    fn error_here(&self, message: &str) -> Error {
        Error::ParseError(format!(
            "{} at line {}, column {}",
            message,
            self.cursor.line(),
            self.cursor.column()
        ))
    }
}

fn lexical(prefix: &Option<String>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{}:{}", p, local),
        None => local.to_string(),
    }
}

fn lookup_prefix(scopes: &NsScopes, prefix: Option<&str>) -> Option<Option<String>> {
    for frame in scopes.iter().rev() {
        for (p, uri) in frame.iter().rev() {
            if p.as_deref() == prefix {
                return Some(uri.clone());
            }
        }
    }
    None
}

fn bytes_to_string(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| Error::ParseError("input is not valid UTF-8".to_string()))
}

fn decode_char_ref(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = if let Some(hex) = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<u32>().ok()?
    };
    char::from_u32(code)
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || b.is_ascii_digit() || b == b'-' || b == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_element() {
        let doc = Document::parse("<assert>true</assert>").unwrap();
        assert_eq!(doc.root.name.local, "assert");
        assert_eq!(doc.root.text(), "true");
        assert!(doc.doctype.is_none());
    }

    #[test]
    fn test_attribute_order_preserved() {
        let doc =
            Document::parse("<planet name='Earth' position='3' supportsLife='yes'/>").unwrap();
        let names: Vec<&str> = doc
            .root
            .attributes
            .iter()
            .map(|a| a.name.local.as_str())
            .collect();
        assert_eq!(names, ["name", "position", "supportsLife"]);
        assert_eq!(doc.root.attribute_value("position"), Some("3"));
    }

    #[test]
    fn test_nested_and_self_closing() {
        let doc = Document::parse("<a><b>c</b><b/></a>").unwrap();
        let children: Vec<&Element> = doc.root.child_elements().collect();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].text(), "c");
        assert!(children[1].children.is_empty());
    }

    #[test]
    fn test_namespace_resolution() {
        let doc =
            Document::parse("<a xmlns='urn:d' xmlns:p='urn:p'><p:b c='1' p:d='2'/></a>").unwrap();
        assert_eq!(doc.root.name.namespace.as_deref(), Some("urn:d"));
        let b = doc.root.child_elements().next().unwrap();
        assert_eq!(b.name.prefix.as_deref(), Some("p"));
        assert_eq!(b.name.namespace.as_deref(), Some("urn:p"));
        // Default namespace does not apply to attributes.
        assert_eq!(b.attributes[0].name.namespace, None);
        assert_eq!(b.attributes[1].name.namespace.as_deref(), Some("urn:p"));
    }

    #[test]
    fn test_undeclared_prefix_is_an_error() {
        let err = Document::parse("<p:a/>").unwrap_err();
        assert!(err.to_string().contains("undeclared namespace prefix"));
    }

    #[test]
    fn test_duplicate_attributes_rejected() {
        assert!(Document::parse("<e a='1' a='2'/>").is_err());
        // Same expanded name through different prefixes.
        let err =
            Document::parse("<e xmlns:a='u' xmlns:b='u' a:x='1' b:x='2'/>").unwrap_err();
        assert!(err.to_string().contains("duplicate attribute"));
    }

    #[test]
    fn test_mismatched_closing_tag() {
        let err = Document::parse("<a><b></a></b>").unwrap_err();
        assert!(err.to_string().contains("mismatched closing tag"));
    }

    #[test]
    fn test_structural_errors() {
        assert!(Document::parse("<a/><b/>").is_err());
        assert!(Document::parse("<root><unclosed>").is_err());
        assert!(Document::parse("just text").is_err());
        assert!(Document::parse("").is_err());
    }

    #[test]
    fn test_cdata_kept_distinct() {
        let doc = Document::parse("<a><![CDATA[x < y & z]]></a>").unwrap();
        match &doc.root.children[0] {
            XmlNode::Text(t) => {
                assert!(t.cdata);
                assert_eq!(t.value, "x < y & z");
            }
            other => panic!("expected text node, got {:?}", other),
        }
    }

    #[test]
    fn test_comment_and_pi_nodes() {
        let doc = Document::parse("<a><!-- note --><?target data?></a>").unwrap();
        assert_eq!(doc.root.children.len(), 2);
        assert!(matches!(&doc.root.children[0], XmlNode::Comment(c) if c == " note "));
        assert!(matches!(
            &doc.root.children[1],
            XmlNode::ProcessingInstruction { target, data }
                if target == "target" && data == "data"
        ));
    }

    #[test]
    fn test_doctype_captured() {
        let xml = "<!DOCTYPE Book SYSTEM \"Book.dtd\"><Book/>";
        let doc = Document::parse(xml).unwrap();
        let dt = doc.doctype.unwrap();
        assert_eq!(dt.name, "Book");
        assert_eq!(dt.system_id.as_deref(), Some("Book.dtd"));
        assert!(dt.internal_subset.is_none());
    }

    #[test]
    fn test_internal_subset_entity_decoding() {
        let xml = "<!DOCTYPE a [<!ENTITY greeting \"hello\">]><a>&greeting; world</a>";
        let doc = Document::parse(xml).unwrap();
        assert_eq!(doc.root.text(), "hello world");
    }

    #[test]
    fn test_internal_subset_comment_may_contain_bracket() {
        let xml = "<!DOCTYPE a [ <!-- ] --> <!ELEMENT a EMPTY> ]><a/>";
        let doc = Document::parse(xml).unwrap();
        let subset = doc.doctype.unwrap().internal_subset.unwrap();
        assert!(subset.contains("<!ELEMENT a EMPTY>"));

        let xml = "<!DOCTYPE a [ <?note ] ?> ]><a/>";
        let doc = Document::parse(xml).unwrap();
        assert!(doc.doctype.unwrap().internal_subset.is_some());
    }

    #[test]
    fn test_commented_out_entity_is_not_declared() {
        let xml = "<!DOCTYPE a [ <!-- <!ENTITY gone \"x\"> --> ]><a>&gone;</a>";
        assert!(Document::parse(xml).is_err());
    }

    #[test]
    fn test_entity_decoding() {
        let doc = Document::parse("<a b='&lt;&#65;&#x42;'>&amp;</a>").unwrap();
        assert_eq!(doc.root.attribute_value("b"), Some("<AB"));
        assert_eq!(doc.root.text(), "&");
        assert!(Document::parse("<a>&nosuch;</a>").is_err());
    }

    #[test]
    fn test_attribute_whitespace_normalization() {
        let doc = Document::parse("<a b='x\ny' c='x&#10;y'/>").unwrap();
        assert_eq!(doc.root.attribute_value("b"), Some("x y"));
        // A character reference survives normalization.
        assert_eq!(doc.root.attribute_value("c"), Some("x\ny"));
    }

    #[test]
    fn test_whitespace_only_detection() {
        let doc = Document::parse("<a>\n  <b/>\n</a>").unwrap();
        assert!(doc.root.children[0].is_whitespace_text());
        assert!(!XmlNode::Text(TextNode {
            value: " x ".to_string(),
            cdata: false
        })
        .is_whitespace_text());
    }

    #[test]
    fn test_round_trip() {
        let xml = "<!DOCTYPE a SYSTEM \"a.dtd\"><a xmlns:p=\"u\" k=\"v&quot;\"><p:b>t &amp; t</p:b><![CDATA[raw]]><!--c--></a>";
        let doc = Document::parse(xml).unwrap();
        let again = Document::parse(&doc.to_xml()).unwrap();
        assert_eq!(doc, again);
    }

    #[test]
    fn test_xml_declaration_and_bom_skipped() {
        let xml = "\u{feff}<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a/>";
        let doc = Document::parse(xml).unwrap();
        assert_eq!(doc.root.name.local, "a");
    }
}
