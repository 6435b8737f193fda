//! XPath evaluation over the consumed engine.
//!
//! Results render to comparable strings under pinned, locale-independent
//! rules: node items contribute their string-value in sequence order, an
//! empty sequence renders as `""` (a valid outcome, not an error), and
//! booleans render as `"True"` / `"False"`.

use xrust::item::{Item as XrustItem, Node, Sequence};
use xrust::parser::xml::parse as parse_xml;
use xrust::parser::xpath::parse as parse_xpath;
use xrust::transform::context::{ContextBuilder, StaticContextBuilder};
use xrust::trees::smite::RNode;
use xrust::value::Value;
use xrust::xdmerror::{Error as XrustError, ErrorKind};

use crate::error::{Error, Result};
use crate::input::XmlInput;

/// Evaluate `xpath` over `input` and render the result as a string.
pub fn evaluate(input: &XmlInput, xpath: &str) -> Result<String> {
    let sequence = dispatch(input, xpath)?;
    let mut out = String::new();
    for item in &sequence {
        match item {
            XrustItem::Node(n) => out.push_str(&n.to_string()),
            XrustItem::Value(v) => out.push_str(&render_value(v.as_ref())),
            XrustItem::Function => {
                return Err(Error::XPathError(
                    "expression evaluated to a function".to_string(),
                ))
            }
        }
    }
    Ok(out)
}

/// Effective boolean value of `xpath` over `input`.
pub fn exists(input: &XmlInput, xpath: &str) -> Result<bool> {
    let sequence = dispatch(input, xpath)?;
    Ok(effective_boolean(&sequence))
}

fn dispatch(input: &XmlInput, xpath: &str) -> Result<Sequence<RNode>> {
    let doc = RNode::new_document();
    parse_xml(doc.clone(), &input.xml_text(), None)
        .map_err(|e| Error::ParseError(e.to_string()))?;

    let xpath_transform =
        parse_xpath::<RNode>(xpath, None).map_err(|e| Error::XPathError(e.to_string()))?;

    let context = ContextBuilder::new()
        .context(vec![XrustItem::Node(doc)])
        .build();

    let mut static_context = StaticContextBuilder::new()
        .message(|_| Ok(()))
        .fetcher(|_| Err(XrustError::new(ErrorKind::NotImplemented, "not implemented")))
        .parser(|_| Err(XrustError::new(ErrorKind::NotImplemented, "not implemented")))
        .build();

    context
        .dispatch(&mut static_context, &xpath_transform)
        .map_err(|e| Error::XPathError(e.to_string()))
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Boolean(b) => if *b { "True" } else { "False" }.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Double(d) => format_number(*d),
        Value::Decimal(d) => d.to_string(),
        _ => format!("{:?}", value),
    }
}

/// Invariant rendering for XPath numbers: integral values print without a
/// fractional part, NaN and the infinities are spelled out.
fn format_number(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if d == d.trunc() && d.abs() < 1e15 {
        format!("{}", d as i64)
    } else {
        format!("{}", d)
    }
}

fn effective_boolean(sequence: &[XrustItem<RNode>]) -> bool {
    match sequence {
        [] => false,
        [XrustItem::Node(_), ..] => true,
        [single] => match single {
            XrustItem::Value(v) => match v.as_ref() {
                Value::Boolean(b) => *b,
                Value::String(s) => !s.is_empty(),
                Value::Integer(i) => *i != 0,
                Value::Double(d) => *d != 0.0 && !d.is_nan(),
                Value::Decimal(d) => d.to_string().parse::<f64>().map(|x| x != 0.0).unwrap_or(true),
                _ => true,
            },
            _ => true,
        },
        // More than one atomic value has no effective boolean value in XPath;
        // a non-empty sequence counts as true here.
        _ => true,
    }
}
