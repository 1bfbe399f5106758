// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type signatures for method arguments, return values and signal payloads.
//!
//! A [`Signature`] is carried as an opaque, character-validated string. Only
//! its leading type code is interpreted (see [`TypeCode`]), which is enough to
//! check that a positional argument has the right kind before a handler runs.

use crate::value::Value;
use std::fmt;

/// Maximum length of a signature string on the wire.
pub const MAX_SIGNATURE_LEN: usize = 255;

/// Leading type code of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Byte,
    Boolean,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    UnixFd,
    String,
    ObjectPath,
    Signature,
    Array,
    Struct,
    Variant,
    DictEntry,
}

impl TypeCode {
    /// Map a signature character to its type code.
    pub fn from_char(c: char) -> Option<Self> {
        let code = match c {
            'y' => Self::Byte,
            'b' => Self::Boolean,
            'n' => Self::Int16,
            'q' => Self::UInt16,
            'i' => Self::Int32,
            'u' => Self::UInt32,
            'x' => Self::Int64,
            't' => Self::UInt64,
            'd' => Self::Double,
            'h' => Self::UnixFd,
            's' => Self::String,
            'o' => Self::ObjectPath,
            'g' => Self::Signature,
            'a' => Self::Array,
            '(' => Self::Struct,
            'v' => Self::Variant,
            '{' => Self::DictEntry,
            _ => return None,
        };
        Some(code)
    }

    /// The signature character for this code.
    pub fn as_char(self) -> char {
        match self {
            Self::Byte => 'y',
            Self::Boolean => 'b',
            Self::Int16 => 'n',
            Self::UInt16 => 'q',
            Self::Int32 => 'i',
            Self::UInt32 => 'u',
            Self::Int64 => 'x',
            Self::UInt64 => 't',
            Self::Double => 'd',
            Self::UnixFd => 'h',
            Self::String => 's',
            Self::ObjectPath => 'o',
            Self::Signature => 'g',
            Self::Array => 'a',
            Self::Struct => '(',
            Self::Variant => 'v',
            Self::DictEntry => '{',
        }
    }

    /// Whether a value of this shape can be carried under this code.
    ///
    /// Arrays accept both plain arrays and dictionaries (`a{..}`), since a
    /// dictionary value reports [`TypeCode::Array`].
    pub fn accepts(self, value: &Value) -> bool {
        self == value.type_code()
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Error returned when a signature string contains invalid characters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("empty signature")]
    Empty,

    #[error("signature exceeds {} characters", MAX_SIGNATURE_LEN)]
    TooLong,

    #[error("invalid character '{ch}' in signature '{signature}'")]
    InvalidChar { signature: String, ch: char },
}

/// A validated, non-empty type signature (e.g. `"i"`, `"as"`, `"a{sv}"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    /// Validate and wrap a signature string.
    pub fn new(signature: impl Into<String>) -> Result<Self, SignatureError> {
        let signature = signature.into();
        if signature.is_empty() {
            return Err(SignatureError::Empty);
        }
        if signature.len() > MAX_SIGNATURE_LEN {
            return Err(SignatureError::TooLong);
        }
        if let Some(ch) = signature
            .chars()
            .find(|c| TypeCode::from_char(*c).is_none() && *c != ')' && *c != '}')
        {
            return Err(SignatureError::InvalidChar { signature, ch });
        }
        Ok(Self(signature))
    }

    /// Single-character signature of a basic (non-container) type.
    pub(crate) fn basic(code: TypeCode) -> Self {
        debug_assert!(!matches!(
            code,
            TypeCode::Array | TypeCode::Struct | TypeCode::DictEntry
        ));
        Self(code.as_char().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading type code, `None` when the string opens with a closing bracket.
    pub fn type_code(&self) -> Option<TypeCode> {
        self.0.chars().next().and_then(TypeCode::from_char)
    }

    /// Whether `value` matches this signature's leading type code.
    pub fn accepts(&self, value: &Value) -> bool {
        self.type_code().is_some_and(|code| code.accepts(value))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Signature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Signature {
    type Error = SignatureError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// A named (or anonymous) argument slot: one parameter, return value or
/// signal field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    /// Argument name, if the prototype gave one.
    pub name: Option<String>,
    pub signature: Signature,
}

impl Arg {
    pub fn new(name: Option<String>, signature: Signature) -> Self {
        Self { name, signature }
    }

    pub fn named(name: impl Into<String>, signature: Signature) -> Self {
        Self::new(Some(name.into()), signature)
    }

    pub fn anonymous(signature: Signature) -> Self {
        Self::new(None, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_signatures() {
        for sig in ["i", "s", "as", "a{sv}", "(ii)", "aay", "v"] {
            assert!(Signature::new(sig).is_ok(), "{sig} should be valid");
        }
    }

    #[test]
    fn test_invalid_signatures() {
        assert_eq!(Signature::new(""), Err(SignatureError::Empty));
        assert!(matches!(
            Signature::new("iz"),
            Err(SignatureError::InvalidChar { ch: 'z', .. })
        ));
        assert_eq!(
            Signature::new("i".repeat(MAX_SIGNATURE_LEN + 1)),
            Err(SignatureError::TooLong)
        );
    }

    #[test]
    fn test_type_code_accepts() {
        let int = Signature::new("i").unwrap();
        assert!(int.accepts(&Value::Int32(1)));
        assert!(!int.accepts(&Value::UInt32(1)));

        let dict = Signature::new("a{sv}").unwrap();
        assert!(dict.accepts(&Value::Dict(Vec::new())));
        assert!(dict.accepts(&Value::Array(Vec::new())));

        let st = Signature::new("(is)").unwrap();
        assert!(st.accepts(&Value::Struct(vec![1i32.into(), "x".into()])));
    }
}
