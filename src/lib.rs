//! xml-compare: XML comparison, validation and assertion toolkit for tests
//!
//! This library compares XML documents for semantic equality and for strict
//! identity, evaluates XPath expressions, applies XSLT stylesheets and
//! validates documents against their DTDs. A thin assertion layer on top
//! panics with located differences, for direct use in test functions.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use xml_compare::compare;
//!
//! let result = compare("<a pre='1' post='2'/>", "<a post='2' pre='1'/>")?;
//! assert!(result.equal());      // same infoset
//! assert!(!result.identical()); // attribute order differs
//!
//! // or, in test code:
//! use xml_compare::assertions::assert_xml_equal;
//! assert_xml_equal("<assert>true</assert>", "<assert >true</assert>");
//! ```

mod cursor;

pub mod error;
pub mod input;
pub mod tree;

pub mod diff;
pub mod validate;
pub mod xpath;
pub mod xslt;

pub mod assertions;

// Re-export core types
pub use error::{Error, Result};
pub use input::XmlInput;
pub use tree::{Attribute, DoctypeDecl, Document, Element, QName, TextNode, XmlNode};

// Re-export the operation surface
pub use diff::{
    compare, DiffConfig, DiffResult, Difference, DifferenceKind, NodeDetail, Whitespace, XmlDiff,
};
pub use validate::{validate, validate_with_base_uri, ValidationError, ValidationResult};
pub use xslt::{transform, TransformResult, Xslt};
