//! Integration tests for xml-compare
//!
//! End-to-end checks of the comparison, XPath, XSLT and validation surfaces.

use xml_compare::{
    compare, transform, validate, validate_with_base_uri, xpath, DiffConfig, DifferenceKind,
    Whitespace, XmlDiff, XmlInput, Xslt,
};

const MY_SOLAR_SYSTEM: &str = "<solar-system><planet name='Earth' position='3' supportsLife='yes'/><planet name='Venus' position='4'/></solar-system>";

const IDENTITY_STYLESHEET: &str = r#"<?xml version="1.0"?>
<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
    <xsl:template match="@*|node()">
        <xsl:copy>
            <xsl:apply-templates select="@*|node()"/>
        </xsl:copy>
    </xsl:template>
</xsl:stylesheet>"#;

const ANIMAL_STYLESHEET: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform"><xsl:template match="/"><xsl:apply-templates/></xsl:template><xsl:template match="animal"><dog/></xsl:template></xsl:stylesheet>"#;

// ============== Comparison Tests ==============

#[test]
fn document_matches_itself() {
    let result = compare(MY_SOLAR_SYSTEM, MY_SOLAR_SYSTEM).unwrap();
    assert!(result.identical());
    assert!(result.equal());
    assert!(result.differences().is_empty());
}

#[test]
fn text_mismatch_reports_kind_and_location() {
    let result = compare("<assert>true</assert>", "<assert>false</assert>").unwrap();
    assert!(!result.identical());
    assert!(!result.equal());
    let difference = result.first_difference().unwrap();
    assert_eq!(difference.kind, DifferenceKind::TextValue);
    assert_eq!(difference.control.location, "/assert[1]/text()[1]");
    assert_eq!(difference.control.value, "true");
    assert_eq!(difference.test.value, "false");
}

#[test]
fn comparison_is_symmetric_in_verdicts() {
    let forward = compare(MY_SOLAR_SYSTEM, "<solar-system/>").unwrap();
    let backward = compare("<solar-system/>", MY_SOLAR_SYSTEM).unwrap();
    assert_eq!(forward.identical(), backward.identical());
    assert_eq!(forward.equal(), backward.equal());
}

#[test]
fn identical_always_implies_equal() {
    let pairs = [
        (MY_SOLAR_SYSTEM, MY_SOLAR_SYSTEM),
        ("<a><b/></a>", "<a><b/></a>"),
        ("<a>x</a>", "<a>y</a>"),
        ("<a b='1' c='2'/>", "<a c='2' b='1'/>"),
    ];
    for (control, test) in pairs {
        let result = compare(control, test).unwrap();
        if result.identical() {
            assert!(result.equal(), "{} vs {}", control, test);
        }
    }
}

#[test]
fn attribute_reorder_breaks_identity_only() {
    let result = compare("<a pre='1' post='2'/>", "<a post='2' pre='1'/>").unwrap();
    assert!(!result.identical());
    assert!(result.equal());
    assert_eq!(
        result.first_difference().unwrap().kind,
        DifferenceKind::AttributeOrder
    );
}

#[test]
fn prefix_spelling_breaks_identity_only() {
    let result = compare("<p:a xmlns:p='urn:x'/>", "<q:a xmlns:q='urn:x'/>").unwrap();
    assert!(!result.identical());
    assert!(result.equal());
    assert_eq!(
        result.first_difference().unwrap().kind,
        DifferenceKind::NamespacePrefix
    );
}

#[test]
fn namespace_uri_breaks_equality() {
    let result = compare("<a xmlns='urn:one'/>", "<a xmlns='urn:two'/>").unwrap();
    assert!(!result.equal());
    assert_eq!(
        result.first_difference().unwrap().kind,
        DifferenceKind::NamespaceUri
    );
}

#[test]
fn renamed_attribute_breaks_equality() {
    let result = compare("<a x='1'/>", "<a y='1'/>").unwrap();
    assert!(!result.equal());
    assert_eq!(
        result.first_difference().unwrap().kind,
        DifferenceKind::MissingAttribute
    );
}

#[test]
fn whitespace_between_elements_is_insignificant_by_default() {
    let pretty = "<solar-system>\n  <planet name='Earth' position='3' supportsLife='yes'/>\n  <planet name='Venus' position='4'/>\n</solar-system>";
    let result = compare(MY_SOLAR_SYSTEM, pretty).unwrap();
    assert!(result.identical());
    assert!(result.equal());

    let preserved = XmlDiff::new(MY_SOLAR_SYSTEM, pretty)
        .with_config(DiffConfig {
            whitespace: Whitespace::Preserve,
        })
        .compare()
        .unwrap();
    assert!(!preserved.equal());
}

#[test]
fn interior_whitespace_runs_need_normalize() {
    let control = "<a>hello   world</a>";
    let test = "<a>hello world</a>";
    assert!(!compare(control, test).unwrap().equal());

    let normalized = XmlDiff::new(control, test)
        .with_config(DiffConfig {
            whitespace: Whitespace::Normalize,
        })
        .compare()
        .unwrap();
    assert!(normalized.equal());
}

#[test]
fn doctype_presence_breaks_identity_only() {
    let result = compare("<!DOCTYPE a SYSTEM 'a.dtd'><a/>", "<a/>").unwrap();
    assert!(!result.identical());
    assert!(result.equal());
    assert_eq!(
        result.first_difference().unwrap().kind,
        DifferenceKind::DoctypeDeclaration
    );
}

#[test]
fn cdata_and_text_are_distinct() {
    let result = compare("<a><![CDATA[x]]></a>", "<a>x</a>").unwrap();
    assert!(!result.equal());
    assert_eq!(
        result.first_difference().unwrap().kind,
        DifferenceKind::CdataSection
    );
}

#[test]
fn child_count_mismatch_breaks_equality() {
    let result = compare("<a><b/><b/></a>", "<a><b/></a>").unwrap();
    assert!(!result.equal());
    assert_eq!(
        result.first_difference().unwrap().kind,
        DifferenceKind::ChildCount
    );
}

#[test]
fn json_report_carries_kind_and_location() {
    let result = compare("<assert>true</assert>", "<assert>false</assert>").unwrap();
    let json = result.to_json();
    assert!(json.contains("\"TextValue\""));
    assert!(json.contains("/assert[1]/text()[1]"));

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["identical"], false);
    assert_eq!(value["equal"], false);
}

// ============== XPath Tests ==============

#[test]
fn xpath_finds_earth() {
    let input = XmlInput::new(MY_SOLAR_SYSTEM);
    assert!(xpath::exists(&input, "//planet[@name='Earth']").unwrap());
}

#[test]
fn xpath_does_not_find_a_star() {
    let input = XmlInput::new(MY_SOLAR_SYSTEM);
    assert!(!xpath::exists(&input, "//star[@name='alpha centauri']").unwrap());
}

#[test]
fn xpath_evaluates_attribute_value() {
    let input = XmlInput::new(MY_SOLAR_SYSTEM);
    let value = xpath::evaluate(&input, "//planet[@position='3']/@supportsLife").unwrap();
    assert_eq!(value, "yes");
}

#[test]
fn xpath_absent_attribute_evaluates_to_empty() {
    let input = XmlInput::new(MY_SOLAR_SYSTEM);
    let value = xpath::evaluate(&input, "//planet[@position='4']/@supportsLife").unwrap();
    assert_eq!(value, "");
}

#[test]
fn xpath_booleans_render_capitalized() {
    let input = XmlInput::new(MY_SOLAR_SYSTEM);
    assert_eq!(xpath::evaluate(&input, "true()").unwrap(), "True");
    assert_eq!(xpath::evaluate(&input, "false()").unwrap(), "False");
}

#[test]
fn xpath_counts_planets() {
    let input = XmlInput::new(MY_SOLAR_SYSTEM);
    assert_eq!(xpath::evaluate(&input, "count(//planet)").unwrap(), "2");
}

#[test]
fn xpath_selects_text() {
    let input = XmlInput::new("<assert>true</assert>");
    assert_eq!(xpath::evaluate(&input, "/assert/text()").unwrap(), "true");
}

// ============== XSLT Tests ==============

#[test]
fn identity_transform_preserves_the_document() {
    let source = "<a><b>c</b><b/></a>";
    let output = transform(source, IDENTITY_STYLESHEET).unwrap();
    let result = output.compare_to(source).unwrap();
    assert!(
        result.equal(),
        "identity output differs: {:?}",
        result.first_difference()
    );
}

#[test]
fn literal_element_transform() {
    let output = transform("<animal>dog</animal>", ANIMAL_STYLESHEET).unwrap();
    assert!(output.as_str().contains("dog"));
    assert!(output.compare_to("<dog/>").unwrap().equal());
    assert!(!output.compare_to("<cat/>").unwrap().equal());
}

#[test]
fn stylesheet_loaded_from_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("animal.xsl");
    std::fs::write(&path, ANIMAL_STYLESHEET).unwrap();

    let xslt = Xslt::new(XmlInput::from_file(&path).unwrap());
    let output = xslt.transform("<animal>dog</animal>").unwrap();
    assert!(output.compare_to("<dog/>").unwrap().equal());
}

// ============== Validation Tests ==============

const BOOK_DTD: &str = "<!ELEMENT Book (Title, Chapter+)>\n\
     <!ATTLIST Book author CDATA #REQUIRED>\n\
     <!ELEMENT Title (#PCDATA)>\n\
     <!ELEMENT Chapter (#PCDATA)>\n\
     <!ATTLIST Chapter number NMTOKEN #REQUIRED>\n";

fn dir_with_book_dtd() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Book.dtd"), BOOK_DTD).unwrap();
    dir
}

#[test]
fn conformant_document_from_file_is_valid() {
    let dir = dir_with_book_dtd();
    let path = dir.path().join("Book.xml");
    std::fs::write(
        &path,
        "<!DOCTYPE Book SYSTEM \"Book.dtd\">\n<Book author=\"Ada\"><Title>Rust</Title><Chapter number=\"1\">Intro</Chapter></Book>",
    )
    .unwrap();

    let result = validate(&XmlInput::from_file(&path).unwrap()).unwrap();
    assert!(result.valid, "unexpected errors: {:?}", result.errors);
}

#[test]
fn violations_are_reported_not_thrown() {
    let dir = dir_with_book_dtd();
    let doc = "<!DOCTYPE Book SYSTEM \"Book.dtd\"><Book><Title>Rust</Title></Book>";
    let result = validate(&XmlInput::new(doc).with_base_uri(dir.path())).unwrap();
    assert!(!result.valid);
    // Missing required author attribute and a content-model violation.
    assert!(result.errors.len() >= 2, "errors: {:?}", result.errors);
}

#[test]
fn explicit_base_uri_resolves_the_dtd() {
    let dir = dir_with_book_dtd();
    let doc = "<!DOCTYPE Book SYSTEM \"Book.dtd\"><Book author=\"A\"><Title>T</Title><Chapter number=\"1\">x</Chapter></Book>";
    let result = validate_with_base_uri(&XmlInput::new(doc), dir.path()).unwrap();
    assert!(result.valid, "unexpected errors: {:?}", result.errors);
}

#[test]
fn missing_dtd_file_downgrades_to_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let doc = "<!DOCTYPE Book SYSTEM \"Book.dtd\"><Book/>";
    let result = validate_with_base_uri(&XmlInput::new(doc), dir.path()).unwrap();
    assert!(!result.valid);
    assert!(result.first_error().unwrap().contains("could not read"));
}

#[test]
fn document_without_doctype_is_valid() {
    let result = validate(&XmlInput::new(MY_SOLAR_SYSTEM)).unwrap();
    assert!(result.valid);
}

#[test]
fn validation_result_serializes() {
    let result = validate(&XmlInput::new("<free/>")).unwrap();
    assert!(result.to_json().contains("\"valid\": true"));
}

// ============== Error Handling Tests ==============

#[test]
fn malformed_xml_is_an_error() {
    assert!(compare("<root><unclosed>", "<root/>").is_err());
    assert!(validate(&XmlInput::new("<root attr></root>")).is_err());
}

#[test]
fn parse_errors_carry_a_position() {
    let err = compare("<a><b></a>", "<a/>").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("line"), "message: {}", message);
}

#[test]
fn invalid_xpath_is_an_error() {
    let input = XmlInput::new("<root/>");
    assert!(xpath::evaluate(&input, "//[invalid").is_err());
}

#[test]
fn malformed_stylesheet_is_an_error() {
    assert!(transform("<a/>", "<xsl:stylesheet").is_err());
}
