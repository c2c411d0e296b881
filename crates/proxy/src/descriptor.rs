use crate::classfile::VType;
use crate::error::{ProxyError, Result};
use std::fmt;

/// A field or parameter type, parsed from its descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    /// Internal name, e.g. `java/lang/String`.
    Object(String),
    /// Full array descriptor, e.g. `[I`.
    Array(String),
}

impl FieldType {
    pub fn parse(descriptor: &str) -> Result<Self> {
        let (ty, rest) = Self::parse_prefix(descriptor)?;
        if !rest.is_empty() {
            return Err(bad(descriptor));
        }
        Ok(ty)
    }

    fn parse_prefix(s: &str) -> Result<(Self, &str)> {
        let first = s.chars().next().ok_or_else(|| bad(s))?;
        let ty = match first {
            'B' => FieldType::Byte,
            'C' => FieldType::Char,
            'D' => FieldType::Double,
            'F' => FieldType::Float,
            'I' => FieldType::Int,
            'J' => FieldType::Long,
            'S' => FieldType::Short,
            'Z' => FieldType::Boolean,
            'L' => {
                let end = s.find(';').ok_or_else(|| bad(s))?;
                if end == 1 {
                    return Err(bad(s));
                }
                return Ok((FieldType::Object(s[1..end].to_string()), &s[end + 1..]));
            }
            '[' => {
                let dims = s.chars().take_while(|c| *c == '[').count();
                let (_, rest) = Self::parse_prefix(&s[dims..])?;
                let len = s.len() - rest.len();
                return Ok((FieldType::Array(s[..len].to_string()), rest));
            }
            _ => return Err(bad(s)),
        };
        Ok((ty, &s[1..]))
    }

    pub fn descriptor(&self) -> String {
        match self {
            FieldType::Object(name) => format!("L{name};"),
            FieldType::Array(desc) => desc.clone(),
            primitive => primitive.primitive_char().to_string(),
        }
    }

    fn primitive_char(&self) -> char {
        match self {
            FieldType::Byte => 'B',
            FieldType::Char => 'C',
            FieldType::Double => 'D',
            FieldType::Float => 'F',
            FieldType::Int => 'I',
            FieldType::Long => 'J',
            FieldType::Short => 'S',
            FieldType::Boolean => 'Z',
            FieldType::Object(_) => 'L',
            FieldType::Array(_) => '[',
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, FieldType::Object(_) | FieldType::Array(_))
    }

    /// Local variable and operand stack words.
    pub fn size(&self) -> u16 {
        match self {
            FieldType::Long | FieldType::Double => 2,
            _ => 1,
        }
    }

    pub fn verification_type(&self) -> VType {
        match self {
            FieldType::Long => VType::Long,
            FieldType::Double => VType::Double,
            FieldType::Float => VType::Float,
            FieldType::Object(name) => VType::Object(name.clone()),
            FieldType::Array(desc) => VType::Object(desc.clone()),
            _ => VType::Integer,
        }
    }

    /// Name usable as a `ldc` class constant or `checkcast` operand.
    pub fn class_operand(&self) -> Option<String> {
        match self {
            FieldType::Object(name) => Some(name.clone()),
            FieldType::Array(desc) => Some(desc.clone()),
            _ => None,
        }
    }

    /// Wrapper class, `xxxValue` unboxing method and its descriptor for a
    /// primitive.
    pub fn boxing(&self) -> Option<Boxing> {
        let (wrapper, unbox) = match self {
            FieldType::Boolean => ("java/lang/Boolean", "booleanValue"),
            FieldType::Byte => ("java/lang/Byte", "byteValue"),
            FieldType::Char => ("java/lang/Character", "charValue"),
            FieldType::Short => ("java/lang/Short", "shortValue"),
            FieldType::Int => ("java/lang/Integer", "intValue"),
            FieldType::Long => ("java/lang/Long", "longValue"),
            FieldType::Float => ("java/lang/Float", "floatValue"),
            FieldType::Double => ("java/lang/Double", "doubleValue"),
            _ => return None,
        };
        let prim = self.primitive_char();
        Some(Boxing {
            wrapper,
            unbox,
            value_of: format!("({prim})L{wrapper};"),
            unbox_descriptor: format!("(){prim}"),
        })
    }
}

impl fmt::Display for FieldType {
    /// Source-level spelling, e.g. `int[]` or `java.lang.String`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Byte => write!(f, "byte"),
            FieldType::Char => write!(f, "char"),
            FieldType::Double => write!(f, "double"),
            FieldType::Float => write!(f, "float"),
            FieldType::Int => write!(f, "int"),
            FieldType::Long => write!(f, "long"),
            FieldType::Short => write!(f, "short"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Object(name) => write!(f, "{}", name.replace('/', ".")),
            FieldType::Array(desc) => {
                let dims = desc.chars().take_while(|c| *c == '[').count();
                let element = FieldType::parse(&desc[dims..]).map_err(|_| fmt::Error)?;
                write!(f, "{element}{}", "[]".repeat(dims))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boxing {
    pub wrapper: &'static str,
    pub unbox: &'static str,
    pub value_of: String,
    pub unbox_descriptor: String,
}

/// A parsed method descriptor. `ret` is `None` for `void`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub params: Vec<FieldType>,
    pub ret: Option<FieldType>,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut rest = descriptor.strip_prefix('(').ok_or_else(|| bad(descriptor))?;
        let mut params = Vec::new();
        while !rest.starts_with(')') {
            let (ty, tail) = FieldType::parse_prefix(rest)?;
            params.push(ty);
            rest = tail;
        }
        let ret = match &rest[1..] {
            "V" => None,
            other => Some(FieldType::parse(other)?),
        };
        Ok(Self { params, ret })
    }

    /// Words taken by the arguments, not counting `this`.
    pub fn arg_slots(&self) -> u16 {
        self.params.iter().map(FieldType::size).sum()
    }

    pub fn returns_primitive_or_void(&self) -> bool {
        self.ret.as_ref().is_none_or(FieldType::is_primitive)
    }
}

/// `(params)` part of a method descriptor, the erased signature key.
pub fn param_part(descriptor: &str) -> &str {
    match descriptor.find(')') {
        Some(end) => &descriptor[..=end],
        None => descriptor,
    }
}

/// Return part of a method descriptor.
pub fn return_part(descriptor: &str) -> &str {
    match descriptor.find(')') {
        Some(end) => &descriptor[end + 1..],
        None => "",
    }
}

fn bad(descriptor: &str) -> ProxyError {
    ProxyError::format(format!("invalid descriptor '{descriptor}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_descriptor() {
        let d = MethodDescriptor::parse("(IJ[Ljava/lang/String;D)Ljava/util/List;").unwrap();
        assert_eq!(
            d.params,
            vec![
                FieldType::Int,
                FieldType::Long,
                FieldType::Array("[Ljava/lang/String;".into()),
                FieldType::Double,
            ]
        );
        assert_eq!(d.arg_slots(), 6);
        assert_eq!(d.ret, Some(FieldType::Object("java/util/List".into())));
        assert!(!d.returns_primitive_or_void());
        assert!(MethodDescriptor::parse("()V").unwrap().returns_primitive_or_void());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(MethodDescriptor::parse("I)V").is_err());
        assert!(MethodDescriptor::parse("(Ljava/lang/String)V").is_err());
        assert!(FieldType::parse("II").is_err());
        assert!(FieldType::parse("L;").is_err());
    }

    #[test]
    fn test_display_and_parts() {
        assert_eq!(FieldType::parse("[[I").unwrap().to_string(), "int[][]");
        assert_eq!(
            FieldType::parse("Ljava/lang/Object;").unwrap().to_string(),
            "java.lang.Object"
        );
        assert_eq!(param_part("(I)Ljava/lang/Object;"), "(I)");
        assert_eq!(return_part("(I)Ljava/lang/Object;"), "Ljava/lang/Object;");
        let boxing = FieldType::Int.boxing().unwrap();
        assert_eq!(boxing.wrapper, "java/lang/Integer");
        assert_eq!(boxing.value_of, "(I)Ljava/lang/Integer;");
        assert_eq!(boxing.unbox_descriptor, "()I");
    }
}
