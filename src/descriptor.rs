//! Method type descriptors: `(P*)R` strings decoded into value kinds.
use regex::Regex;

use std::fmt;

/// Methods with more parameters than this are rejected outright.
pub const MAX_PARAMETERS: usize = 10;

/// Primitive value kinds a descriptor can name.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Void,
    Byte,
    Char,
    Bool,
    Short,
    Int,
    Float,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    Malformed(String),
    /// Objects (`L...;`), arrays (`[...`) and anything else outside the
    /// supported primitives.
    UnsupportedType(char),
    VoidParameter,
    TooManyParameters(usize),
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DescriptorError::Malformed(descriptor) => {
                write!(f, "malformed method descriptor '{descriptor}'")
            }
            DescriptorError::UnsupportedType(c) => {
                write!(f, "unsupported argument type {c}")
            }
            DescriptorError::VoidParameter => {
                write!(f, "method parameter can't be of type void")
            }
            DescriptorError::TooManyParameters(count) => {
                write!(f, "method declares {count} parameters, limit is {MAX_PARAMETERS}")
            }
        }
    }
}

impl std::error::Error for DescriptorError {}

/// Ordered parameter kinds plus the return kind of one method descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<ValueKind>,
    pub ret: ValueKind,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Result<MethodDescriptor, DescriptorError> {
        let re = Regex::new(r"^\(([^)]*)\)(.+)$").unwrap();
        let caps = re
            .captures(descriptor)
            .ok_or_else(|| DescriptorError::Malformed(descriptor.to_string()))?;
        let param_str = caps.get(1).map_or("", |m| m.as_str());
        let ret_str = caps.get(2).map_or("", |m| m.as_str());

        let mut ret_chars = ret_str.chars();
        let ret = kind_of(ret_chars.next().unwrap_or(')'))?;
        if ret_chars.next().is_some() {
            return Err(DescriptorError::Malformed(descriptor.to_string()));
        }

        let mut params = Vec::new();
        for c in param_str.chars() {
            let kind = kind_of(c)?;
            if kind == ValueKind::Void {
                return Err(DescriptorError::VoidParameter);
            }
            params.push(kind);
        }
        if params.len() > MAX_PARAMETERS {
            return Err(DescriptorError::TooManyParameters(params.len()));
        }

        Ok(MethodDescriptor { params, ret })
    }
}

fn kind_of(c: char) -> Result<ValueKind, DescriptorError> {
    match c {
        'B' => Ok(ValueKind::Byte),
        'C' => Ok(ValueKind::Char),
        'F' => Ok(ValueKind::Float),
        'I' => Ok(ValueKind::Int),
        'S' => Ok(ValueKind::Short),
        'Z' => Ok(ValueKind::Bool),
        'V' => Ok(ValueKind::Void),
        other => Err(DescriptorError::UnsupportedType(other)),
    }
}
