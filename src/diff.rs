//! XML tree comparison: one document-order walk yielding both the strict
//! "identical" verdict and the logical "equal" verdict, plus the differences
//! found along the way.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::input::XmlInput;
use crate::tree::{DoctypeDecl, Element, XmlNode};

/// Text-node handling during comparison.
///
/// "Insignificant whitespace" here means a text node consisting entirely of
/// space, tab, carriage return, and newline characters; such nodes typically
/// come from pretty-printing between elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Whitespace {
    /// Drop whitespace-only text nodes from both trees before children are
    /// compared. Text with any non-whitespace content still compares exactly,
    /// surrounding spaces included. The default.
    #[default]
    Ignore,
    /// Keep every text node and compare values exactly.
    Preserve,
    /// As `Ignore`, and additionally collapse interior whitespace runs to a
    /// single space and trim both ends before text values are compared.
    Normalize,
}

#[derive(Debug, Clone, Default)]
pub struct DiffConfig {
    pub whitespace: Whitespace,
}

/// The kind of mismatch a [`Difference`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DifferenceKind {
    NodeType,
    ElementTagName,
    NamespaceUri,
    NamespacePrefix,
    AttributeCount,
    MissingAttribute,
    AttributeValue,
    AttributeOrder,
    ChildCount,
    TextValue,
    CdataSection,
    CommentValue,
    ProcessingInstructionTarget,
    ProcessingInstructionData,
    DoctypeDeclaration,
    DoctypeName,
    DoctypePublicId,
    DoctypeSystemId,
}

impl DifferenceKind {
    /// Whether this mismatch breaks logical equality. Kinds for which this is
    /// false (prefix spelling, attribute order, DOCTYPE details) break strict
    /// identity only.
    pub fn affects_equality(self) -> bool {
        !matches!(
            self,
            DifferenceKind::NamespacePrefix
                | DifferenceKind::AttributeOrder
                | DifferenceKind::DoctypeDeclaration
                | DifferenceKind::DoctypeName
                | DifferenceKind::DoctypePublicId
                | DifferenceKind::DoctypeSystemId
        )
    }

    pub fn description(self) -> &'static str {
        match self {
            DifferenceKind::NodeType => "node type",
            DifferenceKind::ElementTagName => "element tag name",
            DifferenceKind::NamespaceUri => "namespace URI",
            DifferenceKind::NamespacePrefix => "namespace prefix",
            DifferenceKind::AttributeCount => "number of attributes",
            DifferenceKind::MissingAttribute => "attribute presence",
            DifferenceKind::AttributeValue => "attribute value",
            DifferenceKind::AttributeOrder => "attribute order",
            DifferenceKind::ChildCount => "number of child nodes",
            DifferenceKind::TextValue => "text value",
            DifferenceKind::CdataSection => "CDATA section use",
            DifferenceKind::CommentValue => "comment value",
            DifferenceKind::ProcessingInstructionTarget => "processing instruction target",
            DifferenceKind::ProcessingInstructionData => "processing instruction data",
            DifferenceKind::DoctypeDeclaration => "DOCTYPE presence",
            DifferenceKind::DoctypeName => "DOCTYPE name",
            DifferenceKind::DoctypePublicId => "DOCTYPE public identifier",
            DifferenceKind::DoctypeSystemId => "DOCTYPE system identifier",
        }
    }
}

/// One side of a difference: the value seen and its XPath-like location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDetail {
    pub value: String,
    pub location: String,
}

/// The first (or an accumulated identity-only) point of divergence between
/// the control and test trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Difference {
    pub kind: DifferenceKind,
    pub control: NodeDetail,
    pub test: NodeDetail,
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.control.location == self.test.location {
            write!(
                f,
                "expected {} '{}' but was '{}' at {}",
                self.kind.description(),
                self.control.value,
                self.test.value,
                self.control.location
            )
        } else {
            write!(
                f,
                "expected {} '{}' but was '{}' at {} (control) vs {} (test)",
                self.kind.description(),
                self.control.value,
                self.test.value,
                self.control.location,
                self.test.location
            )
        }
    }
}

/// Outcome of one comparison walk.
///
/// `identical` clears on any difference; `equal` clears only on differences
/// whose kind [`affects_equality`](DifferenceKind::affects_equality), and the
/// walk stops at the first of those. Identity-only differences accumulate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResult {
    identical: bool,
    equal: bool,
    differences: Vec<Difference>,
}

impl DiffResult {
    fn matching() -> Self {
        Self {
            identical: true,
            equal: true,
            differences: Vec::new(),
        }
    }

    pub fn identical(&self) -> bool {
        self.identical
    }

    pub fn equal(&self) -> bool {
        self.equal
    }

    /// The first point of divergence, if any.
    pub fn first_difference(&self) -> Option<&Difference> {
        self.differences.first()
    }

    pub fn differences(&self) -> &[Difference] {
        &self.differences
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Comparison of a control document against a test document.
///
/// Stateless apart from its inputs: `compare` can be called repeatedly and
/// never mutates either tree.
pub struct XmlDiff {
    control: XmlInput,
    test: XmlInput,
    config: DiffConfig,
}

impl XmlDiff {
    pub fn new(control: impl Into<XmlInput>, test: impl Into<XmlInput>) -> Self {
        Self {
            control: control.into(),
            test: test.into(),
            config: DiffConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DiffConfig) -> Self {
        self.config = config;
        self
    }

    pub fn compare(&self) -> Result<DiffResult> {
        let control = self.control.document()?;
        let test = self.test.document()?;
        let mut walk = DiffWalk {
            config: &self.config,
            result: DiffResult::matching(),
        };
        walk.compare_doctype(control.doctype.as_ref(), test.doctype.as_ref());
        if walk.keep_going() {
            let cpath = format!("/{}[1]", control.root.name.as_lexical());
            let tpath = format!("/{}[1]", test.root.name.as_lexical());
            walk.compare_element(&control.root, &test.root, &cpath, &tpath);
        }
        Ok(walk.result)
    }
}

/// Compare two documents with the default configuration.
pub fn compare(control: impl Into<XmlInput>, test: impl Into<XmlInput>) -> Result<DiffResult> {
    XmlDiff::new(control, test).compare()
}

struct DiffWalk<'a> {
    config: &'a DiffConfig,
    result: DiffResult,
}

impl DiffWalk<'_> {
    fn keep_going(&self) -> bool {
        self.result.equal
    }

    fn record(&mut self, kind: DifferenceKind, control: NodeDetail, test: NodeDetail) {
        self.result.identical = false;
        if kind.affects_equality() {
            self.result.equal = false;
        }
        self.result.differences.push(Difference {
            kind,
            control,
            test,
        });
    }

    fn compare_doctype(&mut self, control: Option<&DoctypeDecl>, test: Option<&DoctypeDecl>) {
        match (control, test) {
            (None, None) => {}
            (Some(c), Some(t)) => {
                if c.name != t.name {
                    self.record(
                        DifferenceKind::DoctypeName,
                        detail(&c.name, "/"),
                        detail(&t.name, "/"),
                    );
                }
                if c.public_id != t.public_id {
                    self.record(
                        DifferenceKind::DoctypePublicId,
                        detail(c.public_id.as_deref().unwrap_or(""), "/"),
                        detail(t.public_id.as_deref().unwrap_or(""), "/"),
                    );
                }
                if c.system_id != t.system_id {
                    self.record(
                        DifferenceKind::DoctypeSystemId,
                        detail(c.system_id.as_deref().unwrap_or(""), "/"),
                        detail(t.system_id.as_deref().unwrap_or(""), "/"),
                    );
                }
            }
            (c, t) => {
                let presence = |d: Option<&DoctypeDecl>| {
                    d.map(|d| d.name.as_str()).unwrap_or("").to_string()
                };
                self.record(
                    DifferenceKind::DoctypeDeclaration,
                    detail(presence(c), "/"),
                    detail(presence(t), "/"),
                );
            }
        }
    }

    fn compare_element(&mut self, control: &Element, test: &Element, cpath: &str, tpath: &str) {
        if control.name.local != test.name.local {
            self.record(
                DifferenceKind::ElementTagName,
                detail(control.name.as_lexical(), cpath),
                detail(test.name.as_lexical(), tpath),
            );
            return;
        }
        if control.name.namespace != test.name.namespace {
            self.record(
                DifferenceKind::NamespaceUri,
                detail(control.name.namespace.as_deref().unwrap_or(""), cpath),
                detail(test.name.namespace.as_deref().unwrap_or(""), tpath),
            );
            return;
        }
        if control.name.prefix != test.name.prefix {
            self.record(
                DifferenceKind::NamespacePrefix,
                detail(control.name.prefix.as_deref().unwrap_or(""), cpath),
                detail(test.name.prefix.as_deref().unwrap_or(""), tpath),
            );
        }
        self.compare_attributes(control, test, cpath, tpath);
        if !self.keep_going() {
            return;
        }
        self.compare_children(control, test, cpath, tpath);
    }

    fn compare_attributes(&mut self, control: &Element, test: &Element, cpath: &str, tpath: &str) {
        if control.attributes.len() != test.attributes.len() {
            self.record(
                DifferenceKind::AttributeCount,
                detail(control.attributes.len().to_string(), cpath),
                detail(test.attributes.len().to_string(), tpath),
            );
            return;
        }
        for (ci, cattr) in control.attributes.iter().enumerate() {
            let cloc = format!("{}/@{}", cpath, cattr.name.as_lexical());
            let Some(ti) = test
                .attributes
                .iter()
                .position(|t| t.name.matches_expanded(&cattr.name))
            else {
                self.record(
                    DifferenceKind::MissingAttribute,
                    detail(cattr.name.as_lexical(), &cloc),
                    detail("", tpath),
                );
                return;
            };
            let tattr = &test.attributes[ti];
            let tloc = format!("{}/@{}", tpath, tattr.name.as_lexical());
            if cattr.value != tattr.value {
                self.record(
                    DifferenceKind::AttributeValue,
                    detail(&cattr.value, &cloc),
                    detail(&tattr.value, &tloc),
                );
                return;
            }
            if cattr.name.prefix != tattr.name.prefix {
                self.record(
                    DifferenceKind::NamespacePrefix,
                    detail(cattr.name.prefix.as_deref().unwrap_or(""), &cloc),
                    detail(tattr.name.prefix.as_deref().unwrap_or(""), &tloc),
                );
            }
            if ci != ti {
                self.record(
                    DifferenceKind::AttributeOrder,
                    detail((ci + 1).to_string(), &cloc),
                    detail((ti + 1).to_string(), &tloc),
                );
            }
        }
    }

    fn compare_children(&mut self, control: &Element, test: &Element, cpath: &str, tpath: &str) {
        let c_kids = self.filtered(control);
        let t_kids = self.filtered(test);
        if c_kids.len() != t_kids.len() {
            self.record(
                DifferenceKind::ChildCount,
                detail(c_kids.len().to_string(), cpath),
                detail(t_kids.len().to_string(), tpath),
            );
            return;
        }
        let mut c_counter = SegmentCounter::default();
        let mut t_counter = SegmentCounter::default();
        for (c_child, t_child) in c_kids.iter().zip(t_kids.iter()) {
            let c_child_path = format!("{}/{}", cpath, c_counter.segment(c_child));
            let t_child_path = format!("{}/{}", tpath, t_counter.segment(t_child));
            self.compare_nodes(c_child, t_child, &c_child_path, &t_child_path);
            if !self.keep_going() {
                return;
            }
        }
    }

    fn compare_nodes(&mut self, control: &XmlNode, test: &XmlNode, cpath: &str, tpath: &str) {
        match (control, test) {
            (XmlNode::Element(c), XmlNode::Element(t)) => {
                self.compare_element(c, t, cpath, tpath)
            }
            (XmlNode::Text(c), XmlNode::Text(t)) => {
                if c.cdata != t.cdata {
                    self.record(
                        DifferenceKind::CdataSection,
                        detail(control.kind_label(), cpath),
                        detail(test.kind_label(), tpath),
                    );
                    return;
                }
                let matches = if self.config.whitespace == Whitespace::Normalize {
                    normalize_whitespace(&c.value) == normalize_whitespace(&t.value)
                } else {
                    c.value == t.value
                };
                if !matches {
                    self.record(
                        DifferenceKind::TextValue,
                        detail(&c.value, cpath),
                        detail(&t.value, tpath),
                    );
                }
            }
            (XmlNode::Comment(c), XmlNode::Comment(t)) => {
                if c != t {
                    self.record(
                        DifferenceKind::CommentValue,
                        detail(c, cpath),
                        detail(t, tpath),
                    );
                }
            }
            (
                XmlNode::ProcessingInstruction {
                    target: ct,
                    data: cd,
                },
                XmlNode::ProcessingInstruction {
                    target: tt,
                    data: td,
                },
            ) => {
                if ct != tt {
                    self.record(
                        DifferenceKind::ProcessingInstructionTarget,
                        detail(ct, cpath),
                        detail(tt, tpath),
                    );
                } else if cd != td {
                    self.record(
                        DifferenceKind::ProcessingInstructionData,
                        detail(cd, cpath),
                        detail(td, tpath),
                    );
                }
            }
            _ => {
                self.record(
                    DifferenceKind::NodeType,
                    detail(control.kind_label(), cpath),
                    detail(test.kind_label(), tpath),
                );
            }
        }
    }

    fn filtered<'e>(&self, element: &'e Element) -> Vec<&'e XmlNode> {
        match self.config.whitespace {
            Whitespace::Preserve => element.children.iter().collect(),
            Whitespace::Ignore | Whitespace::Normalize => element
                .children
                .iter()
                .filter(|n| !n.is_whitespace_text())
                .collect(),
        }
    }
}

/// Same-name sibling indexing for XPath-like locations, computed over the
/// filtered child list so paths point at what the walk actually compared.
#[derive(Default)]
struct SegmentCounter {
    elements: HashMap<String, usize>,
    text: usize,
    comments: usize,
    pis: usize,
}

impl SegmentCounter {
    fn segment(&mut self, node: &XmlNode) -> String {
        match node {
            XmlNode::Element(el) => {
                let name = el.name.as_lexical();
                let slot = self.elements.entry(name.clone()).or_insert(0);
                *slot += 1;
                format!("{}[{}]", name, slot)
            }
            XmlNode::Text(_) => {
                self.text += 1;
                format!("text()[{}]", self.text)
            }
            XmlNode::Comment(_) => {
                self.comments += 1;
                format!("comment()[{}]", self.comments)
            }
            XmlNode::ProcessingInstruction { .. } => {
                self.pis += 1;
                format!("processing-instruction()[{}]", self.pis)
            }
        }
    }
}

fn detail(value: impl Into<String>, location: &str) -> NodeDetail {
    NodeDetail {
        value: value.into(),
        location: location.to_string(),
    }
}

pub(crate) fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<&str>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_documents() {
        let result = compare("<assert>true</assert>", "<assert>true</assert>").unwrap();
        assert!(result.identical());
        assert!(result.equal());
        assert!(result.first_difference().is_none());
    }

    #[test]
    fn test_text_difference_location() {
        let result = compare("<assert>true</assert>", "<assert>false</assert>").unwrap();
        assert!(!result.identical());
        assert!(!result.equal());
        let diff = result.first_difference().unwrap();
        assert_eq!(diff.kind, DifferenceKind::TextValue);
        assert_eq!(diff.control.location, "/assert[1]/text()[1]");
        assert_eq!(diff.control.value, "true");
        assert_eq!(diff.test.value, "false");
    }

    #[test]
    fn test_attribute_reorder_breaks_identity_only() {
        let result = compare("<a x='1' y='2'/>", "<a y='2' x='1'/>").unwrap();
        assert!(result.equal());
        assert!(!result.identical());
        assert_eq!(
            result.first_difference().unwrap().kind,
            DifferenceKind::AttributeOrder
        );
    }

    #[test]
    fn test_prefix_spelling_breaks_identity_only() {
        let control = "<r xmlns:a='urn:x'><a:e a:k='v'/></r>";
        let test = "<r xmlns:b='urn:x'><b:e b:k='v'/></r>";
        let result = compare(control, test).unwrap();
        assert!(result.equal());
        assert!(!result.identical());
        assert!(result
            .differences()
            .iter()
            .all(|d| d.kind == DifferenceKind::NamespacePrefix));
    }

    #[test]
    fn test_namespace_uri_breaks_equality() {
        let result =
            compare("<r xmlns='urn:one'/>", "<r xmlns='urn:two'/>").unwrap();
        assert!(!result.equal());
        assert_eq!(
            result.first_difference().unwrap().kind,
            DifferenceKind::NamespaceUri
        );
    }

    #[test]
    fn test_attribute_presence() {
        let by_count = compare("<a x='1'/>", "<a/>").unwrap();
        assert_eq!(
            by_count.first_difference().unwrap().kind,
            DifferenceKind::AttributeCount
        );
        let by_name = compare("<a x='1'/>", "<a y='1'/>").unwrap();
        let diff = by_name.first_difference().unwrap();
        assert_eq!(diff.kind, DifferenceKind::MissingAttribute);
        assert_eq!(diff.control.location, "/a[1]/@x");
    }

    #[test]
    fn test_whitespace_modes() {
        let compact = "<a><b>c</b></a>";
        let pretty = "<a>\n  <b>c</b>\n</a>";
        assert!(compare(compact, pretty).unwrap().identical());

        let preserve = XmlDiff::new(compact, pretty)
            .with_config(DiffConfig {
                whitespace: Whitespace::Preserve,
            })
            .compare()
            .unwrap();
        assert!(!preserve.equal());

        let spaced = "<a><b>  c   d </b></a>";
        let tight = "<a><b>c d</b></a>";
        assert!(!compare(spaced, tight).unwrap().equal());
        let normalized = XmlDiff::new(spaced, tight)
            .with_config(DiffConfig {
                whitespace: Whitespace::Normalize,
            })
            .compare()
            .unwrap();
        assert!(normalized.equal());
    }

    #[test]
    fn test_node_type_and_cdata() {
        let result = compare("<a><b/></a>", "<a>b</a>").unwrap();
        assert_eq!(
            result.first_difference().unwrap().kind,
            DifferenceKind::NodeType
        );
        let cdata = compare("<a><![CDATA[x]]></a>", "<a>x</a>").unwrap();
        assert!(!cdata.equal());
        assert_eq!(
            cdata.first_difference().unwrap().kind,
            DifferenceKind::CdataSection
        );
    }

    #[test]
    fn test_doctype_presence_breaks_identity_only() {
        let control = "<!DOCTYPE a SYSTEM 'a.dtd'><a/>";
        let result = compare(control, "<a/>").unwrap();
        assert!(result.equal());
        assert!(!result.identical());
        assert_eq!(
            result.first_difference().unwrap().kind,
            DifferenceKind::DoctypeDeclaration
        );
    }

    #[test]
    fn test_difference_display() {
        let result = compare("<a k='1'/>", "<a k='2'/>").unwrap();
        let message = result.first_difference().unwrap().to_string();
        assert_eq!(
            message,
            "expected attribute value '1' but was '2' at /a[1]/@k"
        );
    }

    #[test]
    fn test_walk_stops_at_first_equality_break() {
        let result = compare("<a><b>x</b><c>y</c></a>", "<a><b>z</b><c>w</c></a>").unwrap();
        assert_eq!(result.differences().len(), 1);
        assert_eq!(
            result.first_difference().unwrap().control.location,
            "/a[1]/b[1]/text()[1]"
        );
    }
}
