//! Document sources: literal strings, readers, files, or pre-parsed trees.

use std::borrow::Cow;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::tree::Document;

/// A source of XML to compare, validate, or transform.
///
/// Carries an optional base URI used to resolve relative references such as a
/// DOCTYPE system identifier. Inputs built from a file adopt the file's
/// directory as their base URI; everything else starts without one.
#[derive(Debug, Clone)]
pub struct XmlInput {
    source: Source,
    base_uri: Option<PathBuf>,
}

#[derive(Debug, Clone)]
enum Source {
    Text(String),
    Tree(Document),
}

impl XmlInput {
    pub fn new(xml: impl Into<String>) -> Self {
        Self {
            source: Source::Text(xml.into()),
            base_uri: None,
        }
    }

    /// Read the remaining content of `reader`. The reader is borrowed for the
    /// call only; this library never closes or retains caller resources.
    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(Self::new(text))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Ok(Self {
            source: Source::Text(text),
            base_uri: path.parent().map(Path::to_path_buf),
        })
    }

    pub fn from_document(document: Document) -> Self {
        Self {
            source: Source::Tree(document),
            base_uri: None,
        }
    }

    pub fn with_base_uri(mut self, base: impl Into<PathBuf>) -> Self {
        self.base_uri = Some(base.into());
        self
    }

    pub fn base_uri(&self) -> Option<&Path> {
        self.base_uri.as_deref()
    }

    /// Parse (or clone) into the owned document model.
    pub fn document(&self) -> Result<Document> {
        match &self.source {
            Source::Text(text) => Document::parse(text),
            Source::Tree(doc) => Ok(doc.clone()),
        }
    }

    /// The markup to hand to the XPath/XSLT engine.
    pub fn xml_text(&self) -> Cow<'_, str> {
        match &self.source {
            Source::Text(text) => Cow::Borrowed(text.as_str()),
            Source::Tree(doc) => Cow::Owned(doc.to_xml()),
        }
    }
}

impl From<&str> for XmlInput {
    fn from(xml: &str) -> Self {
        Self::new(xml)
    }
}

impl From<String> for XmlInput {
    fn from(xml: String) -> Self {
        Self::new(xml)
    }
}

impl From<Document> for XmlInput {
    fn from(document: Document) -> Self {
        Self::from_document(document)
    }
}
