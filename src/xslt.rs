//! XSLT transformation over the consumed engine.
//!
//! Output feeds straight back into the comparator, so a transformation
//! assertion is "transform, then compare against the expected document".

use xrust::item::{Item as XrustItem, Node, SequenceTrait};
use xrust::parser::xml::parse as parse_xml;
use xrust::transform::context::StaticContextBuilder;
use xrust::trees::smite::RNode;
use xrust::xdmerror::{Error as XrustError, ErrorKind};
use xrust::xslt::from_document;

use crate::diff::{self, DiffResult};
use crate::error::{Error, Result};
use crate::input::XmlInput;
use crate::tree::Document;

/// A stylesheet to apply to source documents.
///
/// Compilation happens per call; a transformation is as stateless as a
/// comparison.
pub struct Xslt {
    stylesheet: XmlInput,
}

impl Xslt {
    pub fn new(stylesheet: impl Into<XmlInput>) -> Self {
        Self {
            stylesheet: stylesheet.into(),
        }
    }

    pub fn transform(&self, source: impl Into<XmlInput>) -> Result<TransformResult> {
        let source = source.into();
        let src = RNode::new_document();
        parse_xml(src.clone(), &source.xml_text(), None)
            .map_err(|e| Error::ParseError(e.to_string()))?;

        let style = RNode::new_document();
        parse_xml(style.clone(), &self.stylesheet.xml_text(), None)
            .map_err(|e| Error::XsltError(format!("failed to parse stylesheet: {}", e)))?;

        let mut context = from_document(
            style,
            None,
            |s: &str| {
                let doc = RNode::new_document();
                parse_xml(doc.clone(), s, None)?;
                Ok(doc)
            },
            |_| Ok(String::new()),
        )
        .map_err(|e| Error::XsltError(e.to_string()))?;

        context.context(vec![XrustItem::Node(src)], 0);
        let result_doc = RNode::new_document();
        context.result_document(result_doc.clone());

        let mut static_context = StaticContextBuilder::new()
            .message(|_| Ok(()))
            .fetcher(|_| Err(XrustError::new(ErrorKind::NotImplemented, "not implemented")))
            .parser(|_| Err(XrustError::new(ErrorKind::NotImplemented, "not implemented")))
            .build();

        let sequence = context
            .evaluate(&mut static_context)
            .map_err(|e| Error::XsltError(e.to_string()))?;

        Ok(TransformResult {
            xml: sequence.to_xml(),
        })
    }
}

/// Transform `source` with `stylesheet` in one call.
pub fn transform(
    source: impl Into<XmlInput>,
    stylesheet: impl Into<XmlInput>,
) -> Result<TransformResult> {
    Xslt::new(stylesheet).transform(source)
}

/// Serialized transformation output, comparable like any other document.
#[derive(Debug, Clone)]
pub struct TransformResult {
    xml: String,
}

impl TransformResult {
    pub fn as_str(&self) -> &str {
        &self.xml
    }

    /// Re-parse the output into the owned model.
    pub fn document(&self) -> Result<Document> {
        Document::parse(&self.xml)
    }

    /// Compare the output (test side) against `expected` (control side) with
    /// the default configuration.
    pub fn compare_to(&self, expected: impl Into<XmlInput>) -> Result<DiffResult> {
        diff::compare(expected, self.xml.as_str())
    }
}
