//! Tests for the panicking assertion layer.

use xml_compare::assertions::{
    assert_transform_result, assert_xml_equal, assert_xml_identical, assert_xml_not_equal,
    assert_xml_not_identical, assert_xml_not_valid, assert_xml_valid, assert_xpath_evaluates_to,
    assert_xpath_exists, assert_xpath_not_exists,
};

const MY_SOLAR_SYSTEM: &str = "<solar-system><planet name='Earth' position='3' supportsLife='yes'/><planet name='Venus' position='4'/></solar-system>";

const IDENTITY_STYLESHEET: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform"><xsl:template match="@*|node()"><xsl:copy><xsl:apply-templates select="@*|node()"/></xsl:copy></xsl:template></xsl:stylesheet>"#;

const ANIMAL_STYLESHEET: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform"><xsl:template match="/"><xsl:apply-templates/></xsl:template><xsl:template match="animal"><dog/></xsl:template></xsl:stylesheet>"#;

// ============== Comparison Assertions ==============

#[test]
fn matching_documents_are_identical_and_equal() {
    assert_xml_identical("<assert>true</assert>", "<assert>true</assert>");
    assert_xml_equal("<assert>true</assert>", "<assert>true</assert>");
}

#[test]
fn reordered_attributes_are_equal_but_not_identical() {
    assert_xml_equal("<a pre='1' post='2'/>", "<a post='2' pre='1'/>");
    assert_xml_not_identical("<a pre='1' post='2'/>", "<a post='2' pre='1'/>");
}

#[test]
fn different_text_is_neither() {
    assert_xml_not_identical("<assert>true</assert>", "<assert>false</assert>");
    assert_xml_not_equal("<assert>true</assert>", "<assert>false</assert>");
}

#[test]
#[should_panic(expected = "not identical")]
fn reordered_attributes_fail_the_identity_assertion() {
    assert_xml_identical("<a pre='1' post='2'/>", "<a post='2' pre='1'/>");
}

#[test]
#[should_panic(expected = "text value")]
fn different_text_fails_the_equality_assertion() {
    assert_xml_equal("<assert>true</assert>", "<assert>false</assert>");
}

#[test]
#[should_panic(expected = "they are identical")]
fn matching_documents_fail_not_identical() {
    assert_xml_not_identical("<a/>", "<a/>");
}

#[test]
#[should_panic(expected = "they are equal")]
fn matching_documents_fail_not_equal() {
    assert_xml_not_equal("<a/>", "<a/>");
}

// ============== XPath Assertions ==============

#[test]
fn xpath_assertions_on_the_solar_system() {
    assert_xpath_exists(MY_SOLAR_SYSTEM, "//planet[@name='Earth']");
    assert_xpath_not_exists(MY_SOLAR_SYSTEM, "//star[@name='alpha centauri']");
    assert_xpath_evaluates_to(
        MY_SOLAR_SYSTEM,
        "//planet[@position='3']/@supportsLife",
        "yes",
    );
    assert_xpath_evaluates_to(MY_SOLAR_SYSTEM, "//planet[@position='4']/@supportsLife", "");
    assert_xpath_evaluates_to(MY_SOLAR_SYSTEM, "count(//planet)", "2");
    assert_xpath_evaluates_to(MY_SOLAR_SYSTEM, "true()", "True");
    assert_xpath_evaluates_to(MY_SOLAR_SYSTEM, "false()", "False");
}

#[test]
#[should_panic(expected = "no node matches")]
fn absent_node_fails_exists() {
    assert_xpath_exists("<a/>", "//b");
}

#[test]
#[should_panic(expected = "unexpectedly matches")]
fn present_node_fails_not_exists() {
    assert_xpath_not_exists("<a><b/></a>", "//b");
}

#[test]
#[should_panic(expected = "evaluated to")]
fn wrong_value_fails_evaluates_to() {
    assert_xpath_evaluates_to("<a>x</a>", "/a/text()", "y");
}

// ============== Validity Assertions ==============

#[test]
fn validity_assertions_cover_both_directions() {
    assert_xml_valid("<free/>");
    assert_xml_not_valid("<!DOCTYPE a [<!ELEMENT a EMPTY>]><a>text</a>");
}

#[test]
#[should_panic(expected = "not valid")]
fn invalid_document_fails_the_valid_assertion() {
    assert_xml_valid("<!DOCTYPE a [<!ELEMENT a EMPTY>]><a>text</a>");
}

#[test]
#[should_panic(expected = "expected the document to be invalid")]
fn valid_document_fails_the_not_valid_assertion() {
    assert_xml_not_valid("<no-doctype/>");
}

// ============== Transformation Assertions ==============

#[test]
fn identity_transform_round_trips() {
    assert_transform_result(
        "<a><b>c</b><b/></a>",
        IDENTITY_STYLESHEET,
        "<a><b>c</b><b/></a>",
    );
}

#[test]
fn literal_element_transform_produces_a_dog() {
    assert_transform_result("<animal>dog</animal>", ANIMAL_STYLESHEET, "<dog/>");
}

#[test]
#[should_panic(expected = "transformation output differs")]
fn transform_mismatch_is_detected() {
    assert_transform_result("<animal>dog</animal>", ANIMAL_STYLESHEET, "<cat/>");
}

// ============== Input Failures ==============

#[test]
#[should_panic(expected = "XML parsing error")]
fn malformed_input_panics_with_the_parse_failure() {
    assert_xml_equal("<broken", "<broken/>");
}
