// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Prototype parsing: turns a declaration prototype into ordered argument
//! lists.
//!
//! Method prototypes list comma-separated arguments with a direction and an
//! optional name:
//!
//! ```text
//! in a:i, in b:i, out sum:i
//! ```
//!
//! Signal prototypes carry no direction:
//!
//! ```text
//! level:u, reason:s
//! ```

use crate::signature::{Arg, Signature, SignatureError};

/// Errors raised while parsing a prototype string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrototypeError {
    #[error("malformed argument '{0}': expected '<in|out> [name:]signature'")]
    Malformed(String),

    #[error("unknown argument direction '{0}' (expected 'in' or 'out')")]
    UnknownDirection(String),

    #[error("argument '{arg}': {source}")]
    Signature {
        arg: String,
        #[source]
        source: SignatureError,
    },
}

/// Parsed method prototype.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodPrototype {
    pub params: Vec<Arg>,
    pub returns: Vec<Arg>,
}

/// Turns prototype strings into typed argument lists.
pub trait SignatureParser: Send + Sync {
    /// Parse a method prototype into ordered parameters and returns.
    fn parse_method(&self, prototype: &str) -> Result<MethodPrototype, PrototypeError>;

    /// Parse a signal prototype into ordered arguments.
    fn parse_signal(&self, prototype: &str) -> Result<Vec<Arg>, PrototypeError>;
}

/// Default parser for the `"in name:sig, out name:sig"` prototype format.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrototypeParser;

impl PrototypeParser {
    pub fn new() -> Self {
        Self
    }
}

/// Split `name:sig` (or a bare `sig`) into an [`Arg`].
fn parse_arg(spec: &str) -> Result<Arg, PrototypeError> {
    let (name, sig) = match spec.split_once(':') {
        Some((name, sig)) => (Some(name.trim()), sig.trim()),
        None => (None, spec.trim()),
    };
    let signature = Signature::new(sig).map_err(|source| PrototypeError::Signature {
        arg: spec.to_string(),
        source,
    })?;
    let name = name.filter(|n| !n.is_empty()).map(str::to_string);
    Ok(Arg::new(name, signature))
}

/// Comma-separated, whitespace-tolerant items of a prototype.
fn items(prototype: &str) -> impl Iterator<Item = &str> {
    prototype.split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl SignatureParser for PrototypeParser {
    fn parse_method(&self, prototype: &str) -> Result<MethodPrototype, PrototypeError> {
        let mut parsed = MethodPrototype::default();
        for item in items(prototype) {
            let mut words = item.split_whitespace();
            let (Some(direction), Some(arg), None) = (words.next(), words.next(), words.next())
            else {
                return Err(PrototypeError::Malformed(item.to_string()));
            };
            match direction {
                "in" => parsed.params.push(parse_arg(arg)?),
                "out" => parsed.returns.push(parse_arg(arg)?),
                other => return Err(PrototypeError::UnknownDirection(other.to_string())),
            }
        }
        Ok(parsed)
    }

    fn parse_signal(&self, prototype: &str) -> Result<Vec<Arg>, PrototypeError> {
        items(prototype)
            .map(|item| {
                if item.split_whitespace().nth(1).is_some() {
                    return Err(PrototypeError::Malformed(item.to_string()));
                }
                parse_arg(item)
            })
            .collect()
    }
}
