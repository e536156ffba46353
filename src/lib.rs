//! A minimal interpreter for a subset of the Java class-file format: load a
//! single compiled class, decode its binary structure, and run one of its
//! static methods on a stack-based virtual machine.
pub mod bytecode;
pub mod classfile;
pub mod code;
pub mod cursor;
pub mod descriptor;
pub mod frame;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testutil;
