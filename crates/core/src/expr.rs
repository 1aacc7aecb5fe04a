//! Symbolic expression forms layered over the value tree.
//!
//! - Direct Reference: `{"Ref": "<key>"}`
//! - Attribute Reference: `{"Fn::GetAtt": ["<key>", "<attribute>"]}` or
//!   `{"Fn::GetAtt": "<key>.<attribute>"}`
//! - Template Substitution: `{"Fn::Sub": "<pattern>"}` or
//!   `{"Fn::Sub": ["<pattern>", {<args>}]}`
//!
//! Patterns embed `${name}` and `${name.attribute}` placeholders;
//! `${!text}` is an escape and is never resolved.

use crate::ast::Value;
use crate::error::StructuralError;
use crate::walk::NodePath;
use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::sync::LazyLock;

pub const REF: &str = "Ref";
pub const GET_ATT: &str = "Fn::GetAtt";
pub const SUB: &str = "Fn::Sub";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]*)\}").expect("placeholder pattern is valid"));

/// A recognized symbolic form, borrowing from the node it was found in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Form<'a> {
    Reference(&'a str),
    Attribute(&'a str, &'a str),
    Substitution(&'a str, Option<&'a IndexMap<String, Value>>),
}

impl<'a> Form<'a> {
    /// Match `value` against the three forms in order. Returns `Ok(None)`
    /// for ordinary nodes and an error for a reserved key with the wrong
    /// shape.
    pub fn recognize(value: &'a Value, path: &NodePath) -> Result<Option<Form<'a>>, StructuralError> {
        let Some(map) = value.as_map() else {
            return Ok(None);
        };
        if map.len() != 1 {
            return Ok(None);
        }
        let Some((key, body)) = map.first() else {
            return Ok(None);
        };
        match key.as_str() {
            REF => match body.as_str() {
                Some(target) => Ok(Some(Form::Reference(target))),
                None => Err(malformed(REF, path, format!("expected a name, found {}", body.shape()))),
            },
            GET_ATT => recognize_attribute(body, path).map(Some),
            SUB => recognize_substitution(body, path).map(Some),
            _ => Ok(None),
        }
    }

    /// Like [`Form::recognize`], but treats malformed nodes as ordinary.
    pub fn peek(value: &'a Value) -> Option<Form<'a>> {
        Form::recognize(value, &NodePath::root("")).ok().flatten()
    }
}

fn recognize_attribute<'a>(body: &'a Value, path: &NodePath) -> Result<Form<'a>, StructuralError> {
    match body {
        Value::List(items) => match items.as_slice() {
            [key, attribute] => match (key.as_str(), attribute.as_str()) {
                (Some(key), Some(attribute)) => Ok(Form::Attribute(key, attribute)),
                _ => Err(malformed(GET_ATT, path, "expected [name, attribute] strings")),
            },
            _ => Err(malformed(
                GET_ATT,
                path,
                format!("expected 2 elements, found {}", items.len()),
            )),
        },
        _ => match body.as_str().and_then(|s| s.split_once('.')) {
            Some((key, attribute)) => Ok(Form::Attribute(key, attribute)),
            None => Err(malformed(GET_ATT, path, "expected 'name.attribute'")),
        },
    }
}

fn recognize_substitution<'a>(body: &'a Value, path: &NodePath) -> Result<Form<'a>, StructuralError> {
    if let Some(pattern) = body.as_str() {
        return Ok(Form::Substitution(pattern, None));
    }
    match body {
        Value::List(items) => match items.as_slice() {
            [pattern, Value::Map(args)] => match pattern.as_str() {
                Some(pattern) => Ok(Form::Substitution(pattern, Some(args))),
                None => Err(malformed(SUB, path, "pattern must be a string")),
            },
            _ => Err(malformed(SUB, path, "expected [pattern, {arguments}]")),
        },
        other => Err(malformed(
            SUB,
            path,
            format!("expected a pattern, found {}", other.shape()),
        )),
    }
}

fn malformed(form: &'static str, path: &NodePath, message: impl Into<String>) -> StructuralError {
    StructuralError::MalformedExpression {
        form,
        location: path.to_string(),
        message: message.into(),
    }
}

// ──────────────────────────────────────────────
// Constructors
// ──────────────────────────────────────────────

pub fn reference(key: impl Into<String>) -> Value {
    let mut map = IndexMap::new();
    map.insert(REF.to_owned(), Value::string(key));
    Value::Map(map)
}

pub fn attribute(key: impl Into<String>, attribute: impl Into<String>) -> Value {
    let mut map = IndexMap::new();
    map.insert(
        GET_ATT.to_owned(),
        Value::List(vec![Value::string(key), Value::string(attribute)]),
    );
    Value::Map(map)
}

/// Build a substitution; the argument map is omitted when empty.
pub fn substitution(pattern: impl Into<String>, args: IndexMap<String, Value>) -> Value {
    let body = if args.is_empty() {
        Value::string(pattern)
    } else {
        Value::List(vec![Value::string(pattern), Value::Map(args)])
    };
    let mut map = IndexMap::new();
    map.insert(SUB.to_owned(), body);
    Value::Map(map)
}

pub fn join(delimiter: &str, items: Value) -> Value {
    let mut map = IndexMap::new();
    map.insert(
        "Fn::Join".to_owned(),
        Value::List(vec![Value::string(delimiter), items]),
    );
    Value::Map(map)
}

// ──────────────────────────────────────────────
// Placeholders
// ──────────────────────────────────────────────

pub fn placeholder(name: &str, attribute: Option<&str>) -> String {
    match attribute {
        Some(attribute) => format!("${{{}.{}}}", name, attribute),
        None => format!("${{{}}}", name),
    }
}

/// Rewrite placeholders left to right. `f` receives the name and optional
/// attribute of each non-escaped placeholder and returns the replacement
/// text, or `None` to leave the placeholder as written.
pub fn replace_placeholders<F>(pattern: &str, mut f: F) -> String
where
    F: FnMut(&str, Option<&str>) -> Option<String>,
{
    PLACEHOLDER
        .replace_all(pattern, |caps: &Captures| {
            let inner = &caps[1];
            if inner.starts_with('!') {
                return caps[0].to_owned();
            }
            let (name, attribute) = match inner.split_once('.') {
                Some((name, attribute)) => (name, Some(attribute)),
                None => (inner, None),
            };
            f(name, attribute).unwrap_or_else(|| caps[0].to_owned())
        })
        .into_owned()
}

/// True when the pattern still contains placeholder syntax, escapes
/// included.
pub fn has_placeholders(pattern: &str) -> bool {
    PLACEHOLDER.is_match(pattern)
}
