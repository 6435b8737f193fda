//! Panicking assertion helpers for test code.
//!
//! Each function takes anything convertible to [`XmlInput`], so string
//! literals work directly, and panics with the first reported difference on
//! failure. Parse and engine errors panic too; test code has no use for a
//! `Result` here. Callers who want to inspect outcomes programmatically use
//! the structured API in [`crate::diff`], [`crate::validate`],
//! [`crate::xpath`] and [`crate::xslt`] instead.

use crate::diff::{compare, DiffResult};
use crate::error::Result;
use crate::input::XmlInput;
use crate::validate::validate;
use crate::{xpath, xslt};

#[track_caller]
fn ok_or_panic<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("{}", e),
    }
}

#[track_caller]
fn diff_of(control: impl Into<XmlInput>, test: impl Into<XmlInput>) -> DiffResult {
    ok_or_panic(compare(control, test))
}

/// Panics unless `test` is identical to `control`: same nodes, same order,
/// same prefixes, same DOCTYPE.
#[track_caller]
pub fn assert_xml_identical(control: impl Into<XmlInput>, test: impl Into<XmlInput>) {
    let result = diff_of(control, test);
    if !result.identical() {
        match result.first_difference() {
            Some(difference) => panic!("documents are not identical: {}", difference),
            None => panic!("documents are not identical"),
        }
    }
}

/// Panics unless `test` is semantically equal to `control`. Prefix spelling,
/// attribute order and DOCTYPE differences are tolerated.
#[track_caller]
pub fn assert_xml_equal(control: impl Into<XmlInput>, test: impl Into<XmlInput>) {
    let result = diff_of(control, test);
    if !result.equal() {
        match result.first_difference() {
            Some(difference) => panic!("documents are not equal: {}", difference),
            None => panic!("documents are not equal"),
        }
    }
}

/// Panics when the documents are identical.
#[track_caller]
pub fn assert_xml_not_identical(control: impl Into<XmlInput>, test: impl Into<XmlInput>) {
    if diff_of(control, test).identical() {
        panic!("expected the documents to differ, but they are identical");
    }
}

/// Panics when the documents are semantically equal.
#[track_caller]
pub fn assert_xml_not_equal(control: impl Into<XmlInput>, test: impl Into<XmlInput>) {
    if diff_of(control, test).equal() {
        panic!("expected the documents to differ, but they are equal");
    }
}

/// Panics unless the document validates against its declared DTD.
#[track_caller]
pub fn assert_xml_valid(input: impl Into<XmlInput>) {
    let result = ok_or_panic(validate(&input.into()));
    if !result.valid {
        match result.first_error() {
            Some(message) => panic!("document is not valid: {}", message),
            None => panic!("document is not valid"),
        }
    }
}

/// Panics when the document validates against its declared DTD.
#[track_caller]
pub fn assert_xml_not_valid(input: impl Into<XmlInput>) {
    let result = ok_or_panic(validate(&input.into()));
    if result.valid {
        panic!("expected the document to be invalid, but it validates");
    }
}

/// Panics unless `xpath` selects at least one node in the document.
#[track_caller]
pub fn assert_xpath_exists(input: impl Into<XmlInput>, xpath: &str) {
    let input = input.into();
    if !ok_or_panic(xpath::exists(&input, xpath)) {
        panic!("no node matches the XPath '{}'", xpath);
    }
}

/// Panics when `xpath` selects any node in the document.
#[track_caller]
pub fn assert_xpath_not_exists(input: impl Into<XmlInput>, xpath: &str) {
    let input = input.into();
    if ok_or_panic(xpath::exists(&input, xpath)) {
        panic!("the XPath '{}' unexpectedly matches", xpath);
    }
}

/// Panics unless evaluating `xpath` yields exactly `expected`. An expression
/// selecting nothing evaluates to the empty string.
#[track_caller]
pub fn assert_xpath_evaluates_to(input: impl Into<XmlInput>, xpath: &str, expected: &str) {
    let input = input.into();
    let actual = ok_or_panic(xpath::evaluate(&input, xpath));
    if actual != expected {
        panic!(
            "the XPath '{}' evaluated to '{}', expected '{}'",
            xpath, actual, expected
        );
    }
}

/// Applies `stylesheet` to `source` and panics unless the output is
/// semantically equal to `expected`.
#[track_caller]
pub fn assert_transform_result(
    source: impl Into<XmlInput>,
    stylesheet: impl Into<XmlInput>,
    expected: impl Into<XmlInput>,
) {
    let output = ok_or_panic(xslt::transform(source, stylesheet));
    let result = ok_or_panic(output.compare_to(expected));
    if !result.equal() {
        match result.first_difference() {
            Some(difference) => panic!("transformation output differs: {}", difference),
            None => panic!("transformation output differs"),
        }
    }
}
