//! Decoder for the `Code` attribute carried by executable methods.
use crate::classfile::{ClassFile, LoadError, MethodInfo};
use crate::cursor::{Cursor, Endian};

/// One exception table entry is four u16 fields.
const EXCEPTION_ENTRY_SIZE: usize = 8;

/// Decoded `Code` payload. The bytecode and exception-table slices borrow
/// from the attribute data owned by the class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute<'c> {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: &'c [u8],
    /// Raw exception table bytes, preserved but never interpreted.
    pub exception_table: &'c [u8],
}

impl<'c> CodeAttribute<'c> {
    /// Decodes the raw payload of a `Code` attribute.
    pub fn parse(payload: &'c [u8]) -> Result<CodeAttribute<'c>, LoadError> {
        let mut cursor = Cursor::new(payload, Endian::Big);
        let max_stack = cursor.read_u16()?;
        let max_locals = cursor.read_u16()?;

        let code_length = cursor.read_u32()? as usize;
        let code = cursor.read_bytes(code_length)?;

        let table_length = cursor.read_u16()? as usize;
        let exception_table = cursor.read_bytes(table_length * EXCEPTION_ENTRY_SIZE)?;

        // Nested attributes carry nothing the engine uses.
        let attributes_count = cursor.read_u16()?;
        for _ in 0..attributes_count {
            let _name_index = cursor.read_u16()?;
            let length = cursor.read_u32()? as usize;
            cursor.read_bytes(length)?;
        }

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
        })
    }

    /// Resolves and decodes the `Code` attribute of `method`.
    pub fn of_method(
        class: &'c ClassFile,
        method: &'c MethodInfo,
    ) -> Result<CodeAttribute<'c>, LoadError> {
        let attribute = class
            .find_attribute(&method.attributes, "Code")
            .ok_or_else(|| LoadError::MissingCode {
                method: class.method_name(method).unwrap_or("<unknown>").to_string(),
            })?;
        CodeAttribute::parse(&attribute.data)
    }
}
