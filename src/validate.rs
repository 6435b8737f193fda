//! DTD validation.
//!
//! Resolves the document's DOCTYPE external subset against a base URI, parses
//! the declarations, and walks the tree checking conformance. Resolution and
//! DTD problems downgrade into an invalid result rather than erroring, so
//! callers can always assert on validity as a boolean.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::input::XmlInput;
use crate::tree::{Document, Element, XmlNode};

/// A single validation problem. Line and column are filled for DTD syntax
/// errors; conformance errors carry the element path in the message instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

/// Result of validating a document against its declared DTD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }

    /// Message of the first reported problem, if any.
    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(|e| e.message.as_str())
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Validate `input` against its declared DTD.
///
/// A document without a DOCTYPE has nothing to validate against and is
/// reported valid. Malformed XML is still a parse error.
pub fn validate(input: &XmlInput) -> Result<ValidationResult> {
    let document = input.document()?;
    Ok(run_validation(&document, input.base_uri()))
}

/// Validate with an explicit base URI, overriding the input's own.
pub fn validate_with_base_uri(
    input: &XmlInput,
    base: impl AsRef<Path>,
) -> Result<ValidationResult> {
    let document = input.document()?;
    Ok(run_validation(&document, Some(base.as_ref())))
}

fn run_validation(document: &Document, base_uri: Option<&Path>) -> ValidationResult {
    let Some(doctype) = &document.doctype else {
        return ValidationResult::valid();
    };

    let mut dtd = Dtd::default();
    // The internal subset is processed first; the first declaration of a
    // name wins, as the XML recommendation requires.
    if let Some(subset) = &doctype.internal_subset {
        if let Err(error) = dtd.extend_from(subset) {
            return ValidationResult::invalid(vec![error]);
        }
    }
    if let Some(system_id) = &doctype.system_id {
        let text = match resolve_external_subset(system_id, base_uri) {
            Ok(text) => text,
            Err(e) => {
                return ValidationResult::invalid(vec![ValidationError {
                    message: e.to_string(),
                    line: None,
                    column: None,
                }])
            }
        };
        if let Err(error) = dtd.extend_from(&text) {
            return ValidationResult::invalid(vec![error]);
        }
    }

    let mut errors = Vec::new();
    let root_name = document.root.name.as_lexical();
    if root_name != doctype.name {
        errors.push(conformance_error(format!(
            "root element '{}' does not match the DOCTYPE name '{}'",
            root_name, doctype.name
        )));
    }
    // A DOCTYPE carrying no element grammar (entities only) leaves nothing
    // further to check.
    if !dtd.elements.is_empty() {
        let mut checker = Checker {
            dtd: &dtd,
            errors: Vec::new(),
        };
        let path = format!("/{}[1]", root_name);
        checker.check_element(&document.root, &path);
        errors.extend(checker.errors);
    }

    if errors.is_empty() {
        ValidationResult::valid()
    } else {
        ValidationResult::invalid(errors)
    }
}

fn resolve_external_subset(system_id: &str, base_uri: Option<&Path>) -> Result<String> {
    if system_id.starts_with("http://") || system_id.starts_with("https://") {
        return Err(Error::ResolutionError(format!(
            "cannot fetch remote DTD '{}'",
            system_id
        )));
    }
    let candidate = Path::new(system_id.strip_prefix("file://").unwrap_or(system_id));
    let path = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        match base_uri {
            Some(base) => base.join(candidate),
            None => {
                return Err(Error::ResolutionError(format!(
                    "no base URI to resolve the relative system identifier '{}'",
                    system_id
                )))
            }
        }
    };
    fs::read_to_string(&path).map_err(|e| {
        Error::ResolutionError(format!("could not read DTD '{}': {}", path.display(), e))
    })
}

fn conformance_error(message: String) -> ValidationError {
    ValidationError {
        message,
        line: None,
        column: None,
    }
}

// ---------- DTD model ----------

#[derive(Debug, Default)]
struct Dtd {
    elements: HashMap<String, ContentSpec>,
    attlists: HashMap<String, Vec<AttDef>>,
}

#[derive(Debug, Clone, PartialEq)]
enum ContentSpec {
    Empty,
    Any,
    /// `(#PCDATA | a | b)*`: the listed elements plus text, in any order.
    Mixed(Vec<String>),
    Children(ContentParticle),
}

#[derive(Debug, Clone, PartialEq)]
struct ContentParticle {
    kind: ParticleKind,
    occurrence: Occurrence,
}

#[derive(Debug, Clone, PartialEq)]
enum ParticleKind {
    Name(String),
    Sequence(Vec<ContentParticle>),
    Choice(Vec<ContentParticle>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occurrence {
    One,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

#[derive(Debug, Clone, PartialEq)]
struct AttDef {
    name: String,
    att_type: AttType,
    default: DefaultDecl,
}

#[derive(Debug, Clone, PartialEq)]
enum AttType {
    Cdata,
    Id,
    IdRef,
    IdRefs,
    Entity,
    Entities,
    NmToken,
    NmTokens,
    Notation(Vec<String>),
    Enumeration(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
enum DefaultDecl {
    Required,
    Implied,
    Fixed(String),
    Default(String),
}

impl Dtd {
    fn extend_from(&mut self, text: &str) -> std::result::Result<(), ValidationError> {
        DtdScanner::new(text).scan_into(self)
    }
}

// ---------- DTD scanner ----------

struct DtdScanner<'a> {
    cursor: Cursor<'a>,
}

impl<'a> DtdScanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            cursor: Cursor::new(text.as_bytes()),
        }
    }

    fn scan_into(&mut self, dtd: &mut Dtd) -> std::result::Result<(), ValidationError> {
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.is_eof() {
                return Ok(());
            }
            if self.cursor.starts_with(b"<!--") {
                self.skip_comment()?;
            } else if self.cursor.starts_with(b"<!ELEMENT") {
                self.scan_element_decl(dtd)?;
            } else if self.cursor.starts_with(b"<!ATTLIST") {
                self.scan_attlist_decl(dtd)?;
            } else if self.cursor.starts_with(b"<!ENTITY") || self.cursor.starts_with(b"<!NOTATION")
            {
                self.skip_markup_decl()?;
            } else if self.cursor.starts_with(b"<![") {
                self.skip_conditional_section()?;
            } else if self.cursor.starts_with(b"<?") {
                self.skip_pi()?;
            } else if self.cursor.current() == Some(b'%') {
                // Parameter entity reference; unsupported, skipped.
                while !matches!(self.cursor.current(), None | Some(b';')) {
                    self.cursor.advance();
                }
                self.cursor.advance();
            } else {
                return Err(self.err("unexpected content in DTD"));
            }
        }
    }

    fn scan_element_decl(
        &mut self,
        dtd: &mut Dtd,
    ) -> std::result::Result<(), ValidationError> {
        self.cursor.consume_seq(b"<!ELEMENT");
        self.require_whitespace()?;
        let name = self.scan_name()?;
        self.require_whitespace()?;

        let spec = if self.consume_keyword(b"EMPTY") {
            ContentSpec::Empty
        } else if self.consume_keyword(b"ANY") {
            ContentSpec::Any
        } else if self.cursor.current() == Some(b'(') {
            let mut probe = self.cursor.clone();
            probe.advance();
            probe.skip_whitespace();
            if probe.starts_with(b"#PCDATA") {
                self.scan_mixed_spec()?
            } else {
                ContentSpec::Children(self.parse_cp()?)
            }
        } else {
            return Err(self.err("expected a content specification"));
        };

        self.cursor.skip_whitespace();
        self.expect(b'>')?;
        dtd.elements.entry(name).or_insert(spec);
        Ok(())
    }

    fn scan_mixed_spec(&mut self) -> std::result::Result<ContentSpec, ValidationError> {
        self.expect(b'(')?;
        self.cursor.skip_whitespace();
        self.cursor.consume_seq(b"#PCDATA");
        let mut names = Vec::new();
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.consume(b'|') {
                self.cursor.skip_whitespace();
                names.push(self.scan_name()?);
            } else {
                break;
            }
        }
        self.cursor.skip_whitespace();
        self.expect(b')')?;
        self.cursor.consume(b'*');
        Ok(ContentSpec::Mixed(names))
    }

    fn parse_cp(&mut self) -> std::result::Result<ContentParticle, ValidationError> {
        self.cursor.skip_whitespace();
        let kind = if self.cursor.consume(b'(') {
            let mut parts = vec![self.parse_cp()?];
            let mut separator: Option<u8> = None;
            loop {
                self.cursor.skip_whitespace();
                match self.cursor.current() {
                    Some(b')') => {
                        self.cursor.advance();
                        break;
                    }
                    Some(s @ (b'|' | b',')) => {
                        match separator {
                            Some(prev) if prev != s => {
                                return Err(self.err("mixed '|' and ',' in one group"))
                            }
                            _ => separator = Some(s),
                        }
                        self.cursor.advance();
                        parts.push(self.parse_cp()?);
                    }
                    _ => return Err(self.err("expected '|', ',' or ')' in a content model")),
                }
            }
            match separator {
                Some(b'|') => ParticleKind::Choice(parts),
                _ => ParticleKind::Sequence(parts),
            }
        } else {
            ParticleKind::Name(self.scan_name()?)
        };
        let occurrence = if self.cursor.consume(b'?') {
            Occurrence::Optional
        } else if self.cursor.consume(b'*') {
            Occurrence::ZeroOrMore
        } else if self.cursor.consume(b'+') {
            Occurrence::OneOrMore
        } else {
            Occurrence::One
        };
        Ok(ContentParticle { kind, occurrence })
    }

    fn scan_attlist_decl(
        &mut self,
        dtd: &mut Dtd,
    ) -> std::result::Result<(), ValidationError> {
        self.cursor.consume_seq(b"<!ATTLIST");
        self.require_whitespace()?;
        let element = self.scan_name()?;
        let mut defs: Vec<AttDef> = Vec::new();
        loop {
            self.cursor.skip_whitespace();
            match self.cursor.current() {
                Some(b'>') => {
                    self.cursor.advance();
                    break;
                }
                None => return Err(self.err("unterminated ATTLIST declaration")),
                _ => {}
            }
            let name = self.scan_name()?;
            self.require_whitespace()?;
            let att_type = self.scan_att_type()?;
            self.require_whitespace()?;
            let default = self.scan_default_decl()?;
            defs.push(AttDef {
                name,
                att_type,
                default,
            });
        }
        let list = dtd.attlists.entry(element).or_default();
        for def in defs {
            // First declaration of an attribute wins.
            if !list.iter().any(|d| d.name == def.name) {
                list.push(def);
            }
        }
        Ok(())
    }

    fn scan_att_type(&mut self) -> std::result::Result<AttType, ValidationError> {
        if self.consume_keyword(b"CDATA") {
            Ok(AttType::Cdata)
        } else if self.consume_keyword(b"IDREFS") {
            Ok(AttType::IdRefs)
        } else if self.consume_keyword(b"IDREF") {
            Ok(AttType::IdRef)
        } else if self.consume_keyword(b"ID") {
            Ok(AttType::Id)
        } else if self.consume_keyword(b"ENTITIES") {
            Ok(AttType::Entities)
        } else if self.consume_keyword(b"ENTITY") {
            Ok(AttType::Entity)
        } else if self.consume_keyword(b"NMTOKENS") {
            Ok(AttType::NmTokens)
        } else if self.consume_keyword(b"NMTOKEN") {
            Ok(AttType::NmToken)
        } else if self.consume_keyword(b"NOTATION") {
            self.cursor.skip_whitespace();
            Ok(AttType::Notation(self.scan_token_group()?))
        } else if self.cursor.current() == Some(b'(') {
            Ok(AttType::Enumeration(self.scan_token_group()?))
        } else {
            Err(self.err("expected an attribute type"))
        }
    }

    fn scan_token_group(&mut self) -> std::result::Result<Vec<String>, ValidationError> {
        self.expect(b'(')?;
        let mut tokens = Vec::new();
        loop {
            self.cursor.skip_whitespace();
            tokens.push(self.scan_nmtoken()?);
            self.cursor.skip_whitespace();
            if self.cursor.consume(b')') {
                break;
            }
            self.expect(b'|')?;
        }
        Ok(tokens)
    }

    fn scan_default_decl(&mut self) -> std::result::Result<DefaultDecl, ValidationError> {
        if self.cursor.consume_seq(b"#REQUIRED") {
            Ok(DefaultDecl::Required)
        } else if self.cursor.consume_seq(b"#IMPLIED") {
            Ok(DefaultDecl::Implied)
        } else if self.cursor.consume_seq(b"#FIXED") {
            self.require_whitespace()?;
            Ok(DefaultDecl::Fixed(self.scan_quoted()?))
        } else if matches!(self.cursor.current(), Some(b'"' | b'\'')) {
            Ok(DefaultDecl::Default(self.scan_quoted()?))
        } else {
            Err(self.err("expected a default declaration"))
        }
    }

    fn scan_name(&mut self) -> std::result::Result<String, ValidationError> {
        match self.cursor.current() {
            Some(b) if is_dtd_name_byte(b) => {}
            _ => return Err(self.err("expected a name")),
        }
        let start = self.cursor.pos();
        while matches!(self.cursor.current(), Some(b) if is_dtd_name_byte(b)) {
            self.cursor.advance();
        }
        String::from_utf8(self.cursor.slice_from(start).to_vec())
            .map_err(|_| self.err("name is not valid UTF-8"))
    }

    fn scan_nmtoken(&mut self) -> std::result::Result<String, ValidationError> {
        self.scan_name()
    }

    fn scan_quoted(&mut self) -> std::result::Result<String, ValidationError> {
        let quote = match self.cursor.current() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return Err(self.err("expected a quoted literal")),
        };
        self.cursor.advance();
        let start = self.cursor.pos();
        loop {
            match self.cursor.current() {
                None => return Err(self.err("unterminated literal")),
                Some(b) if b == quote => break,
                Some(_) => self.cursor.advance(),
            }
        }
        let value = String::from_utf8(self.cursor.slice_from(start).to_vec())
            .map_err(|_| self.err("literal is not valid UTF-8"))?;
        self.cursor.advance();
        Ok(value)
    }

    /// Consume `keyword` only when it is not a prefix of a longer name.
    fn consume_keyword(&mut self, keyword: &[u8]) -> bool {
        if !self.cursor.starts_with(keyword) {
            return false;
        }
        if matches!(self.cursor.peek(keyword.len()), Some(b) if is_dtd_name_byte(b)) {
            return false;
        }
        self.cursor.consume_seq(keyword)
    }

    fn skip_comment(&mut self) -> std::result::Result<(), ValidationError> {
        self.cursor.consume_seq(b"<!--");
        while !self.cursor.starts_with(b"-->") {
            if self.cursor.is_eof() {
                return Err(self.err("unterminated comment"));
            }
            self.cursor.advance();
        }
        self.cursor.consume_seq(b"-->");
        Ok(())
    }

    fn skip_pi(&mut self) -> std::result::Result<(), ValidationError> {
        self.cursor.consume_seq(b"<?");
        while !self.cursor.starts_with(b"?>") {
            if self.cursor.is_eof() {
                return Err(self.err("unterminated processing instruction"));
            }
            self.cursor.advance();
        }
        self.cursor.consume_seq(b"?>");
        Ok(())
    }

    fn skip_conditional_section(&mut self) -> std::result::Result<(), ValidationError> {
        self.cursor.consume_seq(b"<![");
        while !self.cursor.starts_with(b"]]>") {
            if self.cursor.is_eof() {
                return Err(self.err("unterminated conditional section"));
            }
            self.cursor.advance();
        }
        self.cursor.consume_seq(b"]]>");
        Ok(())
    }

    /// Skip a declaration whose body may contain `>` inside quoted literals.
    fn skip_markup_decl(&mut self) -> std::result::Result<(), ValidationError> {
        loop {
            match self.cursor.current() {
                None => return Err(self.err("unterminated markup declaration")),
                Some(b'>') => {
                    self.cursor.advance();
                    return Ok(());
                }
                Some(q @ (b'"' | b'\'')) => {
                    self.cursor.advance();
                    loop {
                        match self.cursor.current() {
                            None => return Err(self.err("unterminated literal")),
                            Some(b) if b == q => break,
                            Some(_) => self.cursor.advance(),
                        }
                    }
                    self.cursor.advance();
                }
                Some(_) => self.cursor.advance(),
            }
        }
    }

    fn require_whitespace(&mut self) -> std::result::Result<(), ValidationError> {
        if !matches!(self.cursor.current(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            return Err(self.err("expected whitespace"));
        }
        self.cursor.skip_whitespace();
        Ok(())
    }

    fn expect(&mut self, expected: u8) -> std::result::Result<(), ValidationError> {
        if self.cursor.consume(expected) {
            Ok(())
        } else {
            Err(self.err(&format!("expected '{}'", expected as char)))
        }
    }

    fn err(&self, message: &str) -> ValidationError {
        ValidationError {
            message: format!("DTD syntax error: {}", message),
            line: Some(self.cursor.line()),
            column: Some(self.cursor.column()),
        }
    }
}

fn is_dtd_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b':') || b >= 0x80
}

// ---------- conformance walk ----------

struct Checker<'a> {
    dtd: &'a Dtd,
    errors: Vec<ValidationError>,
}

impl Checker<'_> {
    fn push(&mut self, message: String) {
        self.errors.push(conformance_error(message));
    }

    fn check_element(&mut self, element: &Element, path: &str) {
        let name = element.name.as_lexical();
        let Some(spec) = self.dtd.elements.get(&name) else {
            self.push(format!("undeclared element '{}' at {}", name, path));
            return;
        };
        self.check_attributes(element, &name, path);
        self.check_content(element, spec, &name, path);

        let mut seen: HashMap<String, usize> = HashMap::new();
        for child in element.child_elements() {
            let lex = child.name.as_lexical();
            let slot = seen.entry(lex.clone()).or_insert(0);
            *slot += 1;
            let child_path = format!("{}/{}[{}]", path, lex, slot);
            self.check_element(child, &child_path);
        }
    }

    fn check_attributes(&mut self, element: &Element, name: &str, path: &str) {
        let empty = Vec::new();
        let defs = self.dtd.attlists.get(name).unwrap_or(&empty);
        for attr in &element.attributes {
            let lex = attr.name.as_lexical();
            let Some(def) = defs.iter().find(|d| d.name == lex) else {
                self.push(format!(
                    "undeclared attribute '{}' on element '{}' at {}",
                    lex, name, path
                ));
                continue;
            };
            match &def.att_type {
                AttType::Enumeration(allowed) | AttType::Notation(allowed) => {
                    if !allowed.iter().any(|v| v == &attr.value) {
                        self.push(format!(
                            "attribute '{}' has value '{}' outside its declared set at {}",
                            lex, attr.value, path
                        ));
                    }
                }
                AttType::Id | AttType::IdRef | AttType::Entity | AttType::NmToken => {
                    if !is_token(&attr.value) {
                        self.push(format!(
                            "attribute '{}' value '{}' is not a valid token at {}",
                            lex, attr.value, path
                        ));
                    }
                }
                AttType::IdRefs | AttType::Entities | AttType::NmTokens => {
                    if attr.value.split_whitespace().count() == 0
                        || attr.value.split_whitespace().any(|t| !is_token(t))
                    {
                        self.push(format!(
                            "attribute '{}' value '{}' is not a valid token list at {}",
                            lex, attr.value, path
                        ));
                    }
                }
                AttType::Cdata => {}
            }
            if let DefaultDecl::Fixed(fixed) = &def.default {
                if &attr.value != fixed {
                    self.push(format!(
                        "attribute '{}' must have the fixed value '{}', found '{}' at {}",
                        lex, fixed, attr.value, path
                    ));
                }
            }
        }
        for def in defs {
            if matches!(def.default, DefaultDecl::Required)
                && !element.attributes.iter().any(|a| a.name.as_lexical() == def.name)
            {
                self.push(format!(
                    "missing required attribute '{}' on element '{}' at {}",
                    def.name, name, path
                ));
            }
        }
    }

    fn check_content(&mut self, element: &Element, spec: &ContentSpec, name: &str, path: &str) {
        match spec {
            // Child elements of ANY content are checked for declaredness by
            // the recursion.
            ContentSpec::Any => {}
            ContentSpec::Empty => {
                if !element.children.is_empty() {
                    self.push(format!(
                        "element '{}' is declared EMPTY but has content at {}",
                        name, path
                    ));
                }
            }
            ContentSpec::Mixed(allowed) => {
                for child in element.child_elements() {
                    let lex = child.name.as_lexical();
                    if !allowed.contains(&lex) {
                        self.push(format!(
                            "element '{}' is not allowed inside the mixed content of '{}' at {}",
                            lex, name, path
                        ));
                    }
                }
            }
            ContentSpec::Children(particle) => {
                for child in &element.children {
                    if matches!(child, XmlNode::Text(_)) && !child.is_whitespace_text() {
                        self.push(format!(
                            "unexpected character data in the element content of '{}' at {}",
                            name, path
                        ));
                        break;
                    }
                }
                let names: Vec<String> = element
                    .child_elements()
                    .map(|e| e.name.as_lexical())
                    .collect();
                if !matches_content_model(particle, &names) {
                    self.push(format!(
                        "content of element '{}' does not match its declared model at {}",
                        name, path
                    ));
                }
            }
        }
    }
}

fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

// ---------- content model matching ----------

fn matches_content_model(particle: &ContentParticle, names: &[String]) -> bool {
    match_particle(particle, names, 0).contains(&names.len())
}

/// Positions reachable after matching `particle` starting at `start`. The
/// sets stay tiny for deterministic models, so plain vectors suffice.
fn match_particle(particle: &ContentParticle, names: &[String], start: usize) -> Vec<usize> {
    match particle.occurrence {
        Occurrence::One => match_kind(&particle.kind, names, start),
        Occurrence::Optional => {
            let mut out = vec![start];
            for end in match_kind(&particle.kind, names, start) {
                if !out.contains(&end) {
                    out.push(end);
                }
            }
            out
        }
        Occurrence::ZeroOrMore => repeat_kind(&particle.kind, names, start, true),
        Occurrence::OneOrMore => repeat_kind(&particle.kind, names, start, false),
    }
}

fn repeat_kind(
    kind: &ParticleKind,
    names: &[String],
    start: usize,
    allow_zero: bool,
) -> Vec<usize> {
    let mut results = if allow_zero { vec![start] } else { Vec::new() };
    let mut frontier = vec![start];
    loop {
        let mut next = Vec::new();
        for &pos in &frontier {
            for end in match_kind(kind, names, pos) {
                // Zero-width repetitions add nothing.
                if end > pos && !results.contains(&end) {
                    results.push(end);
                    next.push(end);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    results
}

fn match_kind(kind: &ParticleKind, names: &[String], start: usize) -> Vec<usize> {
    match kind {
        ParticleKind::Name(n) => {
            if start < names.len() && &names[start] == n {
                vec![start + 1]
            } else {
                Vec::new()
            }
        }
        ParticleKind::Sequence(parts) => {
            let mut positions = vec![start];
            for part in parts {
                let mut next = Vec::new();
                for &pos in &positions {
                    for end in match_particle(part, names, pos) {
                        if !next.contains(&end) {
                            next.push(end);
                        }
                    }
                }
                if next.is_empty() {
                    return Vec::new();
                }
                positions = next;
            }
            positions
        }
        ParticleKind::Choice(parts) => {
            let mut out = Vec::new();
            for part in parts {
                for end in match_particle(part, names, start) {
                    if !out.contains(&end) {
                        out.push(end);
                    }
                }
            }
            out
        }
    }
}
