//! RFC 1960 style filter expressions as used by OSGi:
//! `(&(osgi.wiring.package=org.example.*)(!(version>=2.0)))`.
//!
//! Values are compared according to the type of the attribute they are
//! matched against, so `(count>=10)` compares numerically when `count` is a
//! `Long` and lexically when it is a `String`.

use crate::models::capability::{AttrValue, Attributes};
use crate::models::version::Version;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("empty filter")]
    Empty,
    #[error("unexpected end of filter '{0}'")]
    UnexpectedEnd(String),
    #[error("expected '{expected}' at position {pos} in '{filter}'")]
    Expected {
        expected: char,
        pos: usize,
        filter: String,
    },
    #[error("missing attribute name at position {pos} in '{filter}'")]
    MissingAttribute { pos: usize, filter: String },
    #[error("invalid operator at position {pos} in '{filter}'")]
    InvalidOperator { pos: usize, filter: String },
    #[error("empty filter list at position {pos} in '{filter}'")]
    EmptyList { pos: usize, filter: String },
    #[error("trailing characters at position {pos} in '{filter}'")]
    Trailing { pos: usize, filter: String },
    #[error("invalid substring pattern: {0}")]
    Pattern(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equal,
    Approx,
    GreaterEq,
    LessEq,
}

impl Op {
    fn as_str(self) -> &'static str {
        match self {
            Op::Equal => "=",
            Op::Approx => "~=",
            Op::GreaterEq => ">=",
            Op::LessEq => "<=",
        }
    }
}

/// `a*b*c` split on unescaped stars. A leading or trailing empty part means
/// the pattern is open on that side.
#[derive(Debug, Clone)]
pub struct SubstringPattern {
    parts: Vec<String>,
    regex: Regex,
}

impl SubstringPattern {
    fn new(parts: Vec<String>) -> Result<Self, FilterError> {
        let body = parts
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("(?s)^{}$", body))
            .map_err(|e| FilterError::Pattern(e.to_string()))?;
        Ok(Self { parts, regex })
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for SubstringPattern {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Compare { attr: String, op: Op, value: String },
    Present(String),
    Substring { attr: String, pattern: SubstringPattern },
}

impl Filter {
    pub fn parse(src: &str) -> Result<Filter, FilterError> {
        if src.trim().is_empty() {
            return Err(FilterError::Empty);
        }
        let mut parser = Parser::new(src);
        let filter = parser.parse_filter()?;
        parser.skip_ws();
        if parser.pos < parser.chars.len() {
            return Err(FilterError::Trailing {
                pos: parser.pos,
                filter: src.to_string(),
            });
        }
        Ok(filter)
    }

    /// Match against capability attributes or service properties. Keys are
    /// looked up exactly first, then case-insensitively.
    pub fn matches(&self, attrs: &Attributes) -> bool {
        match self {
            Filter::And(items) => items.iter().all(|f| f.matches(attrs)),
            Filter::Or(items) => items.iter().any(|f| f.matches(attrs)),
            Filter::Not(inner) => !inner.matches(attrs),
            Filter::Present(attr) => lookup(attrs, attr).is_some(),
            Filter::Compare { attr, op, value } => match lookup(attrs, attr) {
                Some(actual) => compare(actual, *op, value),
                None => false,
            },
            Filter::Substring { attr, pattern } => match lookup(attrs, attr) {
                Some(actual) => substring_match(actual, pattern),
                None => false,
            },
        }
    }
}

impl FromStr for Filter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::parse(s)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::And(items) => {
                write!(f, "(&")?;
                for item in items {
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Filter::Or(items) => {
                write!(f, "(|")?;
                for item in items {
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Filter::Not(inner) => write!(f, "(!{})", inner),
            Filter::Present(attr) => write!(f, "({}=*)", attr),
            Filter::Compare { attr, op, value } => {
                write!(f, "({}{}{})", attr, op.as_str(), escape(value))
            }
            Filter::Substring { attr, pattern } => {
                let body = pattern
                    .parts
                    .iter()
                    .map(|p| escape(p))
                    .collect::<Vec<_>>()
                    .join("*");
                write!(f, "({}={})", attr, body)
            }
        }
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '(' | ')' | '*') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn lookup<'a>(attrs: &'a Attributes, key: &str) -> Option<&'a AttrValue> {
    attrs.get(key).or_else(|| {
        attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn ordering_satisfies(ord: Option<Ordering>, op: Op) -> bool {
    match (ord, op) {
        (None, _) => false,
        (Some(o), Op::Equal) | (Some(o), Op::Approx) => o == Ordering::Equal,
        (Some(o), Op::GreaterEq) => o != Ordering::Less,
        (Some(o), Op::LessEq) => o != Ordering::Greater,
    }
}

fn normalize_approx(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn compare(actual: &AttrValue, op: Op, literal: &str) -> bool {
    match actual {
        AttrValue::String(s) => {
            if op == Op::Approx {
                normalize_approx(s) == normalize_approx(literal)
            } else {
                ordering_satisfies(Some(s.as_str().cmp(literal)), op)
            }
        }
        AttrValue::Long(v) => match literal.trim().parse::<i64>() {
            Ok(lit) => ordering_satisfies(Some(v.cmp(&lit)), op),
            Err(_) => false,
        },
        AttrValue::Double(v) => match literal.trim().parse::<f64>() {
            Ok(lit) => ordering_satisfies(v.partial_cmp(&lit), op),
            Err(_) => false,
        },
        AttrValue::Boolean(b) => {
            let lit = literal.trim().eq_ignore_ascii_case("true");
            ordering_satisfies(Some(b.cmp(&lit)), op)
        }
        AttrValue::Version(v) => match literal.parse::<Version>() {
            Ok(lit) => ordering_satisfies(Some(v.cmp(&lit)), op),
            Err(_) => false,
        },
        AttrValue::List(items) => items.iter().any(|item| compare(item, op, literal)),
    }
}

fn substring_match(actual: &AttrValue, pattern: &SubstringPattern) -> bool {
    match actual {
        AttrValue::String(s) => pattern.is_match(s),
        AttrValue::List(items) => items.iter().any(|item| substring_match(item, pattern)),
        _ => false,
    }
}

struct Parser<'a> {
    src: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), FilterError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(FilterError::Expected {
                expected,
                pos: self.pos,
                filter: self.src.to_string(),
            }),
            None => Err(FilterError::UnexpectedEnd(self.src.to_string())),
        }
    }

    fn parse_filter(&mut self) -> Result<Filter, FilterError> {
        self.skip_ws();
        self.expect('(')?;
        let filter = self.parse_component()?;
        self.skip_ws();
        self.expect(')')?;
        Ok(filter)
    }

    fn parse_component(&mut self) -> Result<Filter, FilterError> {
        self.skip_ws();
        match self.peek() {
            Some('&') => {
                self.pos += 1;
                Ok(Filter::And(self.parse_list()?))
            }
            Some('|') => {
                self.pos += 1;
                Ok(Filter::Or(self.parse_list()?))
            }
            Some('!') => {
                self.pos += 1;
                Ok(Filter::Not(Box::new(self.parse_filter()?)))
            }
            Some(_) => self.parse_item(),
            None => Err(FilterError::UnexpectedEnd(self.src.to_string())),
        }
    }

    fn parse_list(&mut self) -> Result<Vec<Filter>, FilterError> {
        let start = self.pos;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('(') {
                items.push(self.parse_filter()?);
            } else {
                break;
            }
        }
        if items.is_empty() {
            return Err(FilterError::EmptyList {
                pos: start,
                filter: self.src.to_string(),
            });
        }
        Ok(items)
    }

    fn parse_item(&mut self) -> Result<Filter, FilterError> {
        let start = self.pos;
        let mut attr = String::new();
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '~' | '<' | '>' | '(' | ')') {
                break;
            }
            attr.push(c);
            self.pos += 1;
        }
        let attr = attr.trim().to_string();
        if attr.is_empty() {
            return Err(FilterError::MissingAttribute {
                pos: start,
                filter: self.src.to_string(),
            });
        }

        let op_pos = self.pos;
        let op = match self.peek() {
            Some('=') => {
                self.pos += 1;
                Op::Equal
            }
            Some(c @ ('~' | '>' | '<')) => {
                self.pos += 1;
                if self.peek() != Some('=') {
                    return Err(FilterError::InvalidOperator {
                        pos: op_pos,
                        filter: self.src.to_string(),
                    });
                }
                self.pos += 1;
                match c {
                    '~' => Op::Approx,
                    '>' => Op::GreaterEq,
                    _ => Op::LessEq,
                }
            }
            Some(_) => {
                return Err(FilterError::InvalidOperator {
                    pos: op_pos,
                    filter: self.src.to_string(),
                });
            }
            None => return Err(FilterError::UnexpectedEnd(self.src.to_string())),
        };

        let parts = self.parse_value()?;

        if op == Op::Equal && parts.len() > 1 {
            if parts.len() == 2 && parts[0].is_empty() && parts[1].is_empty() {
                return Ok(Filter::Present(attr));
            }
            return Ok(Filter::Substring {
                attr,
                pattern: SubstringPattern::new(parts)?,
            });
        }

        Ok(Filter::Compare {
            attr,
            op,
            value: parts.join("*"),
        })
    }

    /// Reads up to the closing parenthesis, splitting on unescaped stars.
    fn parse_value(&mut self) -> Result<Vec<String>, FilterError> {
        let mut parts = vec![String::new()];
        loop {
            match self.peek() {
                None => return Err(FilterError::UnexpectedEnd(self.src.to_string())),
                Some(')') => break,
                Some('(') => {
                    return Err(FilterError::Expected {
                        expected: ')',
                        pos: self.pos,
                        filter: self.src.to_string(),
                    });
                }
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self
                        .peek()
                        .ok_or_else(|| FilterError::UnexpectedEnd(self.src.to_string()))?;
                    if let Some(last) = parts.last_mut() {
                        last.push(escaped);
                    }
                    self.pos += 1;
                }
                Some('*') => {
                    parts.push(String::new());
                    self.pos += 1;
                }
                Some(c) => {
                    if let Some(last) = parts.last_mut() {
                        last.push(c);
                    }
                    self.pos += 1;
                }
            }
        }
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;

    #[test]
    fn test_parse_composite() {
        let f = Filter::parse("(&(a=1)(|(b=x*)(!(c=*))))").unwrap();
        match &f {
            Filter::And(items) => assert_eq!(items.len(), 2),
            other => panic!("unexpected filter: {other:?}"),
        }
        assert_eq!(f.to_string(), "(&(a=1)(|(b=x*)(!(c=*))))");
    }

    #[test]
    fn test_typed_comparison() {
        let attrs = attrs! {
            "count" => 12i64,
            "name" => "org.example.api",
            "version" => Version::new(1, 4, 0),
            "enabled" => true,
        };

        assert!(Filter::parse("(count>=10)").unwrap().matches(&attrs));
        assert!(!Filter::parse("(count<=9)").unwrap().matches(&attrs));
        assert!(Filter::parse("(version>=1.2)").unwrap().matches(&attrs));
        assert!(Filter::parse("(enabled=TRUE)").unwrap().matches(&attrs));
        assert!(Filter::parse("(name=org.example.*)").unwrap().matches(&attrs));
        assert!(!Filter::parse("(name=com.*)").unwrap().matches(&attrs));
        assert!(Filter::parse("(NAME~=ORG.EXAMPLE.API)").unwrap().matches(&attrs));
    }

    #[test]
    fn test_list_values_match_any_element() {
        let attrs = attrs! { "objectClass" => vec!["a.Foo", "b.Bar"] };
        assert!(Filter::parse("(objectClass=b.Bar)").unwrap().matches(&attrs));
        assert!(!Filter::parse("(objectClass=c.Baz)").unwrap().matches(&attrs));
    }

    #[test]
    fn test_escaped_values() {
        let attrs = attrs! { "expr" => "a*(b)" };
        let f = Filter::parse(r"(expr=a\*\(b\))").unwrap();
        assert!(f.matches(&attrs));
        assert_eq!(Filter::parse(&f.to_string()).unwrap(), f);
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(Filter::parse("  "), Err(FilterError::Empty));
        assert!(matches!(
            Filter::parse("(a=1"),
            Err(FilterError::UnexpectedEnd(_))
        ));
        assert!(matches!(
            Filter::parse("(=1)"),
            Err(FilterError::MissingAttribute { .. })
        ));
        assert!(matches!(
            Filter::parse("(a>1)"),
            Err(FilterError::InvalidOperator { .. })
        ));
        assert!(matches!(Filter::parse("(&)"), Err(FilterError::EmptyList { .. })));
        assert!(matches!(
            Filter::parse("(a=1)x"),
            Err(FilterError::Trailing { .. })
        ));
    }
}
