//! Binary decoder for Java class files.
use crate::cursor::{Cursor, CursorError, Endian};

use std::fmt;

/// Values of magic bytes of a JVM class file.
pub const CLASS_FILE_MAGIC: u32 = 0xCAFE_BABE;

/// Method access flags the engine cares about.
pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;

/// Failures while decoding or cross-checking a class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    ShortRead(CursorError),
    UnknownConstantTag(u8),
    MalformedUtf8 { index: u16 },
    UnsupportedInterfaces(u16),
    UnsupportedFields(u16),
    BadConstantIndex(u16),
    WrongConstantTag {
        index: u16,
        expected: &'static str,
        found: &'static str,
    },
    MissingCode { method: String },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::ShortRead(err) => write!(f, "short read: {err}"),
            LoadError::UnknownConstantTag(tag) => {
                write!(f, "unsupported constant pool tag {tag}")
            }
            LoadError::MalformedUtf8 { index } => {
                write!(f, "constant pool entry {index} is not valid UTF-8")
            }
            LoadError::UnsupportedInterfaces(count) => {
                write!(f, "interfaces are not supported (count = {count})")
            }
            LoadError::UnsupportedFields(count) => {
                write!(f, "fields are not supported (count = {count})")
            }
            LoadError::BadConstantIndex(index) => {
                write!(f, "constant pool index {index} is out of range")
            }
            LoadError::WrongConstantTag {
                index,
                expected,
                found,
            } => write!(
                f,
                "constant pool entry {index} is {found}, expected {expected}"
            ),
            LoadError::MissingCode { method } => {
                write!(f, "failed to find attribute 'Code' inside method '{method}'")
            }
        }
    }
}

impl std::error::Error for LoadError {}

impl From<CursorError> for LoadError {
    fn from(err: CursorError) -> LoadError {
        LoadError::ShortRead(err)
    }
}

/// One constant pool entry. Cross-references are the on-disk 1-based indices.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    FieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    MethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    /// Filler for the second slot a Long or Double entry occupies.
    Unusable,
}

impl Constant {
    pub const fn tag_name(&self) -> &'static str {
        match self {
            Constant::Utf8(_) => "Utf8",
            Constant::Integer(_) => "Integer",
            Constant::Float(_) => "Float",
            Constant::Long(_) => "Long",
            Constant::Double(_) => "Double",
            Constant::Class { .. } => "Class",
            Constant::String { .. } => "String",
            Constant::FieldRef { .. } => "FieldRef",
            Constant::MethodRef { .. } => "MethodRef",
            Constant::InterfaceMethodRef { .. } => "InterfaceMethodRef",
            Constant::NameAndType { .. } => "NameAndType",
            Constant::Unusable => "Unusable",
        }
    }
}

/// A named attribute with its raw payload. Only `Code` is ever interpreted,
/// and only when a method is about to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name_index: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

/// In-memory model of a single decoded class file, immutable after load.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub magic: u32,
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: Vec<Constant>,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Decodes a class file out of `data`. Partial state is discarded on any
    /// failure.
    pub fn parse(data: &[u8]) -> Result<ClassFile, LoadError> {
        let mut cursor = Cursor::new(data, Endian::Big);

        let magic = cursor.read_u32()?;
        let minor_version = cursor.read_u16()?;
        let major_version = cursor.read_u16()?;

        let constant_pool = read_constant_pool(&mut cursor)?;

        let access_flags = cursor.read_u16()?;
        let this_class = cursor.read_u16()?;
        let super_class = cursor.read_u16()?;

        let interfaces_count = cursor.read_u16()?;
        if interfaces_count != 0 {
            return Err(LoadError::UnsupportedInterfaces(interfaces_count));
        }
        let fields_count = cursor.read_u16()?;
        if fields_count != 0 {
            return Err(LoadError::UnsupportedFields(fields_count));
        }

        let methods = read_methods(&mut cursor, &constant_pool)?;
        let attributes = read_attributes(&mut cursor, &constant_pool)?;

        let class = ClassFile {
            magic,
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            methods,
            attributes,
        };
        class.validate_pool()?;
        Ok(class)
    }

    /// Resolves a 1-based constant pool index. Index 0 never refers to an
    /// entry.
    pub fn constant(&self, index: u16) -> Result<&Constant, LoadError> {
        if index == 0 {
            return Err(LoadError::BadConstantIndex(0));
        }
        self.constant_pool
            .get(index as usize - 1)
            .ok_or(LoadError::BadConstantIndex(index))
    }

    pub fn utf8(&self, index: u16) -> Result<&str, LoadError> {
        match self.constant(index)? {
            Constant::Utf8(text) => Ok(text),
            other => Err(LoadError::WrongConstantTag {
                index,
                expected: "Utf8",
                found: other.tag_name(),
            }),
        }
    }

    /// Name of the class referenced by a `Class` entry.
    pub fn class_name(&self, index: u16) -> Result<&str, LoadError> {
        match self.constant(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            other => Err(LoadError::WrongConstantTag {
                index,
                expected: "Class",
                found: other.tag_name(),
            }),
        }
    }

    /// Member name referenced by a `NameAndType` entry.
    pub fn member_name(&self, index: u16) -> Result<&str, LoadError> {
        Ok(self.name_and_type(index)?.0)
    }

    /// `(name, descriptor)` pair of a `NameAndType` entry.
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), LoadError> {
        match self.constant(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            other => Err(LoadError::WrongConstantTag {
                index,
                expected: "NameAndType",
                found: other.tag_name(),
            }),
        }
    }

    /// `(class_index, name_and_type_index)` of a `FieldRef` entry.
    pub fn field_ref(&self, index: u16) -> Result<(u16, u16), LoadError> {
        match self.constant(index)? {
            Constant::FieldRef {
                class_index,
                name_and_type_index,
            } => Ok((*class_index, *name_and_type_index)),
            other => Err(LoadError::WrongConstantTag {
                index,
                expected: "FieldRef",
                found: other.tag_name(),
            }),
        }
    }

    /// `(class_index, name_and_type_index)` of a `MethodRef` entry.
    pub fn method_ref(&self, index: u16) -> Result<(u16, u16), LoadError> {
        match self.constant(index)? {
            Constant::MethodRef {
                class_index,
                name_and_type_index,
            } => Ok((*class_index, *name_and_type_index)),
            other => Err(LoadError::WrongConstantTag {
                index,
                expected: "MethodRef",
                found: other.tag_name(),
            }),
        }
    }

    pub fn method_name(&self, method: &MethodInfo) -> Result<&str, LoadError> {
        self.utf8(method.name_index)
    }

    /// Walks the method table comparing resolved names against `name`.
    pub fn find_method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|method| self.utf8(method.name_index).map_or(false, |n| n == name))
    }

    /// Finds an attribute whose resolved name equals `name`.
    pub fn find_attribute<'s>(
        &self,
        attributes: &'s [Attribute],
        name: &str,
    ) -> Option<&'s Attribute> {
        attributes
            .iter()
            .find(|attribute| self.utf8(attribute.name_index).map_or(false, |n| n == name))
    }

    /// Checks that every index inside every pool entry resolves to the tag
    /// its slot demands.
    fn validate_pool(&self) -> Result<(), LoadError> {
        for entry in &self.constant_pool {
            match entry {
                Constant::Class { name_index } => {
                    self.utf8(*name_index)?;
                }
                Constant::String { string_index } => {
                    self.utf8(*string_index)?;
                }
                Constant::FieldRef {
                    class_index,
                    name_and_type_index,
                }
                | Constant::MethodRef {
                    class_index,
                    name_and_type_index,
                }
                | Constant::InterfaceMethodRef {
                    class_index,
                    name_and_type_index,
                } => {
                    self.class_name(*class_index)?;
                    self.name_and_type(*name_and_type_index)?;
                }
                Constant::NameAndType {
                    name_index,
                    descriptor_index,
                } => {
                    self.utf8(*name_index)?;
                    self.utf8(*descriptor_index)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn read_constant_pool(cursor: &mut Cursor) -> Result<Vec<Constant>, LoadError> {
    let count = cursor.read_u16()?;
    let mut pool = Vec::with_capacity((count as usize).saturating_sub(1));

    // The count field is one past the number of logical entries; the first
    // entry lives at index 1.
    let mut index = 1;
    while index < count {
        let tag = cursor.read_u8()?;
        let entry = match tag {
            1 => {
                let length = cursor.read_u16()?;
                let bytes = cursor.read_bytes(length as usize)?;
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|_| LoadError::MalformedUtf8 { index })?;
                Constant::Utf8(text)
            }
            3 => Constant::Integer(cursor.read_i32()?),
            4 => Constant::Float(cursor.read_f32()?),
            5 => Constant::Long(cursor.read_i64()?),
            6 => Constant::Double(cursor.read_f64()?),
            7 => Constant::Class {
                name_index: cursor.read_u16()?,
            },
            8 => Constant::String {
                string_index: cursor.read_u16()?,
            },
            9 => Constant::FieldRef {
                class_index: cursor.read_u16()?,
                name_and_type_index: cursor.read_u16()?,
            },
            10 => Constant::MethodRef {
                class_index: cursor.read_u16()?,
                name_and_type_index: cursor.read_u16()?,
            },
            11 => Constant::InterfaceMethodRef {
                class_index: cursor.read_u16()?,
                name_and_type_index: cursor.read_u16()?,
            },
            12 => Constant::NameAndType {
                name_index: cursor.read_u16()?,
                descriptor_index: cursor.read_u16()?,
            },
            _ => return Err(LoadError::UnknownConstantTag(tag)),
        };

        // Longs and doubles occupy two pool slots.
        let two_slots = matches!(entry, Constant::Long(_) | Constant::Double(_));
        pool.push(entry);
        if two_slots {
            pool.push(Constant::Unusable);
            index += 2;
        } else {
            index += 1;
        }
    }

    Ok(pool)
}

fn read_methods(cursor: &mut Cursor, pool: &[Constant]) -> Result<Vec<MethodInfo>, LoadError> {
    let count = cursor.read_u16()?;
    let mut methods = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access_flags = cursor.read_u16()?;
        let name_index = cursor.read_u16()?;
        let descriptor_index = cursor.read_u16()?;
        let attributes = read_attributes(cursor, pool)?;
        methods.push(MethodInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
    }
    Ok(methods)
}

fn read_attributes(cursor: &mut Cursor, pool: &[Constant]) -> Result<Vec<Attribute>, LoadError> {
    let count = cursor.read_u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = cursor.read_u16()?;
        let slot = (name_index as usize)
            .checked_sub(1)
            .ok_or(LoadError::BadConstantIndex(0))?;
        match pool.get(slot) {
            Some(Constant::Utf8(_)) => {}
            Some(other) => {
                return Err(LoadError::WrongConstantTag {
                    index: name_index,
                    expected: "Utf8",
                    found: other.tag_name(),
                })
            }
            None => return Err(LoadError::BadConstantIndex(name_index)),
        }
        let length = cursor.read_u32()?;
        let data = cursor.read_bytes(length as usize)?.to_vec();
        attributes.push(Attribute { name_index, data });
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ClassBuilder;

    fn sample_class() -> (Vec<u8>, u16) {
        let mut builder = ClassBuilder::new();
        let code_name = builder.utf8("Code");
        let this_name = builder.utf8("Adder");
        let this_class = builder.class(this_name);
        let main_name = builder.utf8("main");
        let main_descriptor = builder.utf8("()V");
        builder.method(
            ACC_PUBLIC | ACC_STATIC,
            main_name,
            main_descriptor,
            code_name,
            1,
            1,
            &[0xb1],
        );
        (builder.build(this_class), this_class)
    }

    #[test]
    fn parses_class_header_and_methods() {
        let (bytes, this_class) = sample_class();
        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.magic, CLASS_FILE_MAGIC);
        assert_eq!(class.minor_version, 0);
        assert_eq!(class.major_version, 61);
        assert_eq!(class.this_class, this_class);
        assert_eq!(class.methods.len(), 1);
        let method = &class.methods[0];
        assert_eq!(method.access_flags, ACC_PUBLIC | ACC_STATIC);
        assert_eq!(class.method_name(method).unwrap(), "main");
        assert_eq!(class.utf8(method.descriptor_index).unwrap(), "()V");
        assert!(class.find_attribute(&method.attributes, "Code").is_some());
    }

    #[test]
    fn accessors_resolve_one_based_indices() {
        let (bytes, this_class) = sample_class();
        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.class_name(this_class).unwrap(), "Adder");
        assert!(class.find_method("main").is_some());
        assert!(class.find_method("missing").is_none());
        assert_eq!(class.utf8(0).unwrap_err(), LoadError::BadConstantIndex(0));
        assert_eq!(
            class.constant(999).unwrap_err(),
            LoadError::BadConstantIndex(999)
        );
    }

    #[test]
    fn utf8_payload_bytes_are_preserved() {
        let mut builder = ClassBuilder::new();
        let greeting = builder.utf8("héllo wörld");
        let this_name = builder.utf8("T");
        let this_class = builder.class(this_name);
        let bytes = builder.build(this_class);
        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.utf8(greeting).unwrap(), "héllo wörld");
    }

    #[test]
    fn longs_occupy_two_pool_slots() {
        let mut builder = ClassBuilder::new();
        let long_index = builder.long(77);
        let after = builder.utf8("next");
        assert_eq!(after, long_index + 2);
        let this_name = builder.utf8("T");
        let this_class = builder.class(this_name);
        let bytes = builder.build(this_class);
        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.constant(long_index).unwrap(), &Constant::Long(77));
        assert_eq!(class.constant(long_index + 1).unwrap(), &Constant::Unusable);
        assert_eq!(class.utf8(after).unwrap(), "next");
    }

    #[test]
    fn unknown_constant_tag_fails_the_load() {
        let mut builder = ClassBuilder::new();
        builder.raw_entry(&[2]);
        let bytes = builder.build(1);
        assert_eq!(
            ClassFile::parse(&bytes).unwrap_err(),
            LoadError::UnknownConstantTag(2)
        );
    }

    #[test]
    fn nonzero_interfaces_count_fails_the_load() {
        let mut builder = ClassBuilder::new();
        let this_name = builder.utf8("T");
        let this_class = builder.class(this_name);
        let bytes = builder.build_with_counts(this_class, 1, 0);
        assert_eq!(
            ClassFile::parse(&bytes).unwrap_err(),
            LoadError::UnsupportedInterfaces(1)
        );
    }

    #[test]
    fn nonzero_fields_count_fails_the_load() {
        let mut builder = ClassBuilder::new();
        let this_name = builder.utf8("T");
        let this_class = builder.class(this_name);
        let bytes = builder.build_with_counts(this_class, 0, 3);
        assert_eq!(
            ClassFile::parse(&bytes).unwrap_err(),
            LoadError::UnsupportedFields(3)
        );
    }

    #[test]
    fn cross_reference_of_wrong_tag_fails_validation() {
        let mut builder = ClassBuilder::new();
        let number = builder.integer(9);
        // A Class entry whose name points at an Integer.
        builder.class(number);
        let bytes = builder.build(1);
        assert_eq!(
            ClassFile::parse(&bytes).unwrap_err(),
            LoadError::WrongConstantTag {
                index: number,
                expected: "Utf8",
                found: "Integer",
            }
        );
    }

    #[test]
    fn truncated_input_fails_with_short_read() {
        let (bytes, _) = sample_class();
        let err = ClassFile::parse(&bytes[..bytes.len() - 4]).unwrap_err();
        assert!(matches!(err, LoadError::ShortRead(_)));
    }
}
