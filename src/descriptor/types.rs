use std::fmt;

use crate::{Error::InvalidDescriptor, Result};

/// Highest number of array dimensions a descriptor may declare (JVMS §4.3.2).
const MAX_ARRAY_DIMENSIONS: usize = 255;

/// The type of a field, parameter or local variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `D`
    Double,
    /// `F`
    Float,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `S`
    Short,
    /// `Z`
    Boolean,
    /// `L<internal name>;`
    Object(String),
    /// `[<component>`
    Array(Box<FieldType>),
}

impl FieldType {
    /// Parses a complete field descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidDescriptor`] if `descriptor` is not exactly one field type.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut cursor = Cursor::new(descriptor);
        let field = cursor.field_type()?;
        cursor.finish()?;
        Ok(field)
    }

    /// Number of local variable or operand stack slots a value of this type occupies.
    #[must_use]
    pub fn slots(&self) -> usize {
        match self {
            FieldType::Long | FieldType::Double => 2,
            _ => 1,
        }
    }

    /// Returns `true` for object and array types.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Object(_) | FieldType::Array(_))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Byte => f.write_str("B"),
            FieldType::Char => f.write_str("C"),
            FieldType::Double => f.write_str("D"),
            FieldType::Float => f.write_str("F"),
            FieldType::Int => f.write_str("I"),
            FieldType::Long => f.write_str("J"),
            FieldType::Short => f.write_str("S"),
            FieldType::Boolean => f.write_str("Z"),
            FieldType::Object(name) => write!(f, "L{name};"),
            FieldType::Array(component) => write!(f, "[{component}"),
        }
    }
}

/// The return type of a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReturnType {
    /// `V`
    Void,
    /// Any field type
    Value(FieldType),
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnType::Void => f.write_str("V"),
            ReturnType::Value(field) => fmt::Display::fmt(field, f),
        }
    }
}

/// A parsed method descriptor: ordered parameter types plus return type.
///
/// # Examples
///
/// ```rust
/// use classweave::descriptor::{FieldType, MethodDescriptor, ReturnType};
///
/// let descriptor = MethodDescriptor::parse("(Ljava/lang/String;JI)Z")?;
/// assert_eq!(descriptor.parameters.len(), 3);
/// assert_eq!(descriptor.parameters[1], FieldType::Long);
/// assert_eq!(descriptor.return_type, ReturnType::Value(FieldType::Boolean));
/// assert_eq!(descriptor.argument_slots(), 4);
/// assert_eq!(descriptor.to_string(), "(Ljava/lang/String;JI)Z");
/// # Ok::<(), classweave::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// Parameter types in declaration order
    pub parameters: Vec<FieldType>,
    /// Return type
    pub return_type: ReturnType,
}

impl MethodDescriptor {
    /// Creates a descriptor from its parts.
    #[must_use]
    pub fn new(parameters: Vec<FieldType>, return_type: ReturnType) -> Self {
        MethodDescriptor {
            parameters,
            return_type,
        }
    }

    /// Parses a method descriptor such as `(ILjava/lang/Object;)V`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidDescriptor`] if the string is not a method descriptor.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut cursor = Cursor::new(descriptor);
        cursor.expect('(')?;

        let mut parameters = Vec::new();
        while cursor.peek() != Some(')') {
            parameters.push(cursor.field_type()?);
        }
        cursor.expect(')')?;

        let return_type = if cursor.peek() == Some('V') {
            cursor.next();
            ReturnType::Void
        } else {
            ReturnType::Value(cursor.field_type()?)
        };
        cursor.finish()?;

        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }

    /// Number of operand stack slots taken by the arguments, not counting a receiver.
    #[must_use]
    pub fn argument_slots(&self) -> usize {
        self.parameters.iter().map(FieldType::slots).sum()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for parameter in &self.parameters {
            fmt::Display::fmt(parameter, f)?;
        }
        write!(f, "){}", self.return_type)
    }
}

/// Character cursor shared by field and method descriptor parsing.
struct Cursor<'a> {
    source: &'a str,
    rest: std::str::Chars<'a>,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Cursor {
            source,
            rest: source.chars(),
        }
    }

    fn invalid(&self) -> crate::Error {
        InvalidDescriptor(self.source.to_string())
    }

    fn peek(&self) -> Option<char> {
        self.rest.clone().next()
    }

    fn next(&mut self) -> Option<char> {
        self.rest.next()
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.next() {
            Some(c) if c == expected => Ok(()),
            _ => Err(self.invalid()),
        }
    }

    fn finish(&self) -> Result<()> {
        if self.peek().is_some() {
            return Err(self.invalid());
        }
        Ok(())
    }

    fn field_type(&mut self) -> Result<FieldType> {
        let mut dimensions = 0;
        while self.peek() == Some('[') {
            self.next();
            dimensions += 1;
            if dimensions > MAX_ARRAY_DIMENSIONS {
                return Err(self.invalid());
            }
        }

        let mut field = match self.next() {
            Some('B') => FieldType::Byte,
            Some('C') => FieldType::Char,
            Some('D') => FieldType::Double,
            Some('F') => FieldType::Float,
            Some('I') => FieldType::Int,
            Some('J') => FieldType::Long,
            Some('S') => FieldType::Short,
            Some('Z') => FieldType::Boolean,
            Some('L') => {
                let mut name = String::new();
                loop {
                    match self.next() {
                        Some(';') if !name.is_empty() => break,
                        Some(';' | '.' | '[') | None => return Err(self.invalid()),
                        Some(c) => name.push(c),
                    }
                }
                FieldType::Object(name)
            }
            _ => return Err(self.invalid()),
        };

        for _ in 0..dimensions {
            field = FieldType::Array(Box::new(field));
        }

        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_primitives_and_references() {
        let descriptor = MethodDescriptor::parse("(BCDFIJSZLjava/lang/Object;[[I)V").unwrap();
        assert_eq!(descriptor.parameters.len(), 10);
        assert_eq!(
            descriptor.parameters[8],
            FieldType::Object("java/lang/Object".to_string())
        );
        assert_eq!(
            descriptor.parameters[9],
            FieldType::Array(Box::new(FieldType::Array(Box::new(FieldType::Int))))
        );
        assert_eq!(descriptor.return_type, ReturnType::Void);
        assert_eq!(descriptor.argument_slots(), 12);
        assert_eq!(
            descriptor.to_string(),
            "(BCDFIJSZLjava/lang/Object;[[I)V"
        );
    }

    #[test]
    fn parse_no_arguments() {
        let descriptor = MethodDescriptor::parse("()Ljava/lang/String;").unwrap();
        assert!(descriptor.parameters.is_empty());
        assert_eq!(descriptor.argument_slots(), 0);
        assert!(matches!(descriptor.return_type, ReturnType::Value(ref f) if f.is_reference()));
    }

    #[test]
    fn parse_field_type() {
        assert_eq!(
            FieldType::parse("[Ljava/lang/String;").unwrap().to_string(),
            "[Ljava/lang/String;"
        );
        assert_eq!(FieldType::Long.slots(), 2);
        assert!(FieldType::parse("V").is_err());
        assert!(FieldType::parse("II").is_err());
    }

    #[test]
    fn reject_invalid_descriptors() {
        for invalid in [
            "", "(", "(I", "I)V", "()", "()VV", "(V)V", "(L;)V", "(Ljava/lang/String)V",
            "(Ljava.lang.String;)V", "()[V", "(Q)V",
        ] {
            let result = MethodDescriptor::parse(invalid);
            assert!(
                matches!(result, Err(InvalidDescriptor(ref d)) if d == invalid),
                "accepted {invalid:?}"
            );
        }
    }

    #[test]
    fn array_dimension_limit() {
        let ok = format!("({}I)V", "[".repeat(255));
        assert!(MethodDescriptor::parse(&ok).is_ok());

        let too_deep = format!("({}I)V", "[".repeat(256));
        assert!(MethodDescriptor::parse(&too_deep).is_err());
    }
}
