//! Execution engine: opcode dispatch over per-invocation frames.
use crate::bytecode::Opcode;
use crate::classfile::{ClassFile, Constant, LoadError, MethodInfo, ACC_STATIC};
use crate::code::CodeAttribute;
use crate::cursor::{Cursor, CursorError, Endian};
use crate::descriptor::{DescriptorError, MethodDescriptor, ValueKind};
use crate::frame::{Frame, FrameError, Value, FAKE_PRINT_STREAM};

use std::fmt;
use std::io::{self, Write};

/// The only static field the engine links: `java/lang/System.out`.
const SYSTEM_CLASS: &str = "java/lang/System";
const OUT_FIELD: &str = "out";
/// The only virtual method the engine links: `java/io/PrintStream.println`.
const PRINT_STREAM_CLASS: &str = "java/io/PrintStream";
const PRINTLN_METHOD: &str = "println";

/// Failures raised while a method is running. These unwind through every
/// active frame; there is no catch mechanism.
#[derive(Debug)]
pub enum RuntimeError {
    UnknownOpcode(u8),
    UnimplementedComparison(Opcode),
    UnsupportedConstant { index: u16, found: &'static str },
    UnsupportedField { class: String, member: String },
    UnsupportedMethod { class: String, member: String },
    BadReceiver(&'static str),
    Unprintable(&'static str),
    MethodNotFound {
        class: String,
        name: String,
        descriptor: String,
    },
    NonStaticTarget { name: String },
    MissingReturnValue { name: String },
    BranchOutOfBounds { target: i64, size: usize },
    Load(LoadError),
    Descriptor(DescriptorError),
    Frame(FrameError),
    ShortRead(CursorError),
    Print(io::Error),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RuntimeError::UnknownOpcode(byte) => {
                write!(f, "unsupported opcode 0x{byte:02x} ({byte})")
            }
            RuntimeError::UnimplementedComparison(opcode) => {
                write!(f, "comparison {opcode} is not implemented")
            }
            RuntimeError::UnsupportedConstant { index, found } => {
                write!(f, "ldc - unsupported constant type {found} at index {index}")
            }
            RuntimeError::UnsupportedField { class, member } => {
                write!(f, "getstatic - unsupported class member {class}.{member}")
            }
            RuntimeError::UnsupportedMethod { class, member } => {
                write!(f, "invokevirtual - unsupported class member {class}.{member}")
            }
            RuntimeError::BadReceiver(kind) => {
                write!(f, "invokevirtual - expected the print stream receiver, found {kind}")
            }
            RuntimeError::Unprintable(kind) => {
                write!(f, "println cannot print a {kind} value")
            }
            RuntimeError::MethodNotFound {
                class,
                name,
                descriptor,
            } => write!(f, "method {class}.{name}{descriptor} not found"),
            RuntimeError::NonStaticTarget { name } => {
                write!(f, "expected '{name}' to be a static method")
            }
            RuntimeError::MissingReturnValue { name } => {
                write!(f, "method '{name}' terminated without a return value")
            }
            RuntimeError::BranchOutOfBounds { target, size } => {
                write!(f, "branch target {target} outside code of {size} byte(s)")
            }
            RuntimeError::Load(err) => write!(f, "{err}"),
            RuntimeError::Descriptor(err) => write!(f, "{err}"),
            RuntimeError::Frame(err) => write!(f, "{err}"),
            RuntimeError::ShortRead(err) => write!(f, "short read in bytecode: {err}"),
            RuntimeError::Print(err) => write!(f, "failed to write output: {err}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<LoadError> for RuntimeError {
    fn from(err: LoadError) -> RuntimeError {
        RuntimeError::Load(err)
    }
}

impl From<DescriptorError> for RuntimeError {
    fn from(err: DescriptorError) -> RuntimeError {
        RuntimeError::Descriptor(err)
    }
}

impl From<FrameError> for RuntimeError {
    fn from(err: FrameError) -> RuntimeError {
        RuntimeError::Frame(err)
    }
}

impl From<CursorError> for RuntimeError {
    fn from(err: CursorError) -> RuntimeError {
        RuntimeError::ShortRead(err)
    }
}

impl From<io::Error> for RuntimeError {
    fn from(err: io::Error) -> RuntimeError {
        RuntimeError::Print(err)
    }
}

/// Interpreter over one loaded class. Invocation re-enters the dispatch loop
/// on a fresh frame; the host call stack bounds the recursion depth.
pub struct Runtime<'c, W> {
    class: &'c ClassFile,
    out: W,
}

impl<'c> Runtime<'c, io::Stdout> {
    /// A runtime printing to the process stdout.
    pub fn new(class: &'c ClassFile) -> Runtime<'c, io::Stdout> {
        Runtime {
            class,
            out: io::stdout(),
        }
    }
}

impl<'c, W: Write> Runtime<'c, W> {
    /// A runtime printing to an arbitrary sink.
    pub fn with_output(class: &'c ClassFile, out: W) -> Runtime<'c, W> {
        Runtime { class, out }
    }

    /// Runs `method` on a fresh frame sized by its `Code` attribute.
    pub fn execute_method(&mut self, method: &MethodInfo) -> Result<(), RuntimeError> {
        let code = CodeAttribute::of_method(self.class, method)?;
        let mut frame = Frame::new(code.max_stack, code.max_locals);
        self.run_code(&code, &mut frame)?;
        Ok(())
    }

    /// Dispatch loop for one frame. Returns the value handed back by
    /// `ireturn`, or `None` for `return` and for falling off the end of the
    /// code.
    fn run_code(
        &mut self,
        code: &CodeAttribute<'_>,
        frame: &mut Frame<'c>,
    ) -> Result<Option<Value<'c>>, RuntimeError> {
        let mut cursor = Cursor::new(code.code, Endian::Big);

        while !cursor.is_at_end() {
            let byte = cursor.read_u8()?;
            let opcode = Opcode::decode(byte).ok_or(RuntimeError::UnknownOpcode(byte))?;
            match opcode {
                Opcode::IconstM1
                | Opcode::Iconst0
                | Opcode::Iconst1
                | Opcode::Iconst2
                | Opcode::Iconst3
                | Opcode::Iconst4
                | Opcode::Iconst5 => {
                    frame.push(Value::Int(i32::from(byte) - 3))?;
                }
                Opcode::BiPush => {
                    // Sign-extended to an Int, per the instruction spec.
                    let immediate = cursor.read_i8()?;
                    frame.push(Value::Int(i32::from(immediate)))?;
                }
                Opcode::SiPush => {
                    let immediate = cursor.read_i16()?;
                    frame.push(Value::Short(immediate))?;
                }
                Opcode::Ldc => self.ldc(&mut cursor, frame)?,
                Opcode::ILoad => {
                    let index = cursor.read_u8()?;
                    let value = frame.load_int(index as usize)?;
                    frame.push(value)?;
                }
                Opcode::ILoad0 | Opcode::ILoad1 | Opcode::ILoad2 | Opcode::ILoad3 => {
                    let value = frame.load_int(byte as usize - 0x1A)?;
                    frame.push(value)?;
                }
                Opcode::IStore => {
                    let index = cursor.read_u8()?;
                    let value = frame.pop_int()?;
                    frame.store(index as usize, Value::Int(value))?;
                }
                Opcode::IStore0 | Opcode::IStore1 | Opcode::IStore2 | Opcode::IStore3 => {
                    let value = frame.pop_int()?;
                    frame.store(byte as usize - 0x3B, Value::Int(value))?;
                }
                Opcode::IAdd => {
                    let rhs = frame.pop_int()?;
                    let lhs = frame.pop_int()?;
                    frame.push(Value::Int(lhs.wrapping_add(rhs)))?;
                }
                Opcode::IInc => {
                    let index = cursor.read_u8()?;
                    let delta = cursor.read_i8()?;
                    frame.iinc(index as usize, delta)?;
                }
                Opcode::IfICmpGe => {
                    let offset = cursor.read_i16()?;
                    let rhs = frame.pop_int()?;
                    let lhs = frame.pop_int()?;
                    if lhs >= rhs {
                        Self::branch(&mut cursor, offset)?;
                    }
                }
                Opcode::IfICmpEq
                | Opcode::IfICmpNe
                | Opcode::IfICmpLt
                | Opcode::IfICmpGt
                | Opcode::IfICmpLe => {
                    return Err(RuntimeError::UnimplementedComparison(opcode));
                }
                Opcode::Goto => {
                    let offset = cursor.read_i16()?;
                    Self::branch(&mut cursor, offset)?;
                }
                Opcode::IReturn => {
                    let value = frame.pop_int()?;
                    return Ok(Some(Value::Int(value)));
                }
                Opcode::Return => return Ok(None),
                Opcode::GetStatic => self.get_static(&mut cursor, frame)?,
                Opcode::InvokeVirtual => self.invoke_virtual(&mut cursor, frame)?,
                Opcode::InvokeStatic => self.invoke_static(&mut cursor, frame)?,
            }
        }

        Ok(None)
    }

    /// Displaces the code cursor relative to the branch opcode itself:
    /// the opcode byte and the two offset bytes are already consumed, so the
    /// effective displacement is `offset - 3` from the current position.
    fn branch(cursor: &mut Cursor<'_>, offset: i16) -> Result<(), RuntimeError> {
        let target = cursor.position() as i64 + i64::from(offset) - 3;
        if target < 0 || target > cursor.size() as i64 {
            return Err(RuntimeError::BranchOutOfBounds {
                target,
                size: cursor.size(),
            });
        }
        cursor.set_position(target as usize)?;
        Ok(())
    }

    fn ldc(&mut self, cursor: &mut Cursor<'_>, frame: &mut Frame<'c>) -> Result<(), RuntimeError> {
        let class = self.class;
        let index = u16::from(cursor.read_u8()?);
        match class.constant(index)? {
            Constant::Integer(value) => frame.push(Value::Int(*value))?,
            Constant::Float(value) => frame.push(Value::Float(*value))?,
            Constant::String { string_index } => {
                frame.push(Value::Str(class.utf8(*string_index)?))?;
            }
            other => {
                return Err(RuntimeError::UnsupportedConstant {
                    index,
                    found: other.tag_name(),
                })
            }
        }
        Ok(())
    }

    fn get_static(
        &mut self,
        cursor: &mut Cursor<'_>,
        frame: &mut Frame<'c>,
    ) -> Result<(), RuntimeError> {
        let class = self.class;
        let index = cursor.read_u16()?;
        let (class_index, name_and_type_index) = class.field_ref(index)?;
        let class_name = class.class_name(class_index)?;
        let member_name = class.member_name(name_and_type_index)?;

        if class_name != SYSTEM_CLASS || member_name != OUT_FIELD {
            return Err(RuntimeError::UnsupportedField {
                class: class_name.to_string(),
                member: member_name.to_string(),
            });
        }

        frame.push(Value::ClassRef(FAKE_PRINT_STREAM))?;
        Ok(())
    }

    fn invoke_virtual(
        &mut self,
        cursor: &mut Cursor<'_>,
        frame: &mut Frame<'c>,
    ) -> Result<(), RuntimeError> {
        let class = self.class;
        let index = cursor.read_u16()?;
        let (class_index, name_and_type_index) = class.method_ref(index)?;
        let class_name = class.class_name(class_index)?;
        let member_name = class.member_name(name_and_type_index)?;

        if class_name != PRINT_STREAM_CLASS || member_name != PRINTLN_METHOD {
            return Err(RuntimeError::UnsupportedMethod {
                class: class_name.to_string(),
                member: member_name.to_string(),
            });
        }

        let argument = frame.pop()?;
        match frame.pop()? {
            Value::ClassRef(name) if name == FAKE_PRINT_STREAM => {}
            other => return Err(RuntimeError::BadReceiver(other.kind_name())),
        }
        self.println(&argument)
    }

    fn println(&mut self, value: &Value<'_>) -> Result<(), RuntimeError> {
        match value {
            Value::Str(text) => writeln!(self.out, "{text}")?,
            Value::Byte(v) => writeln!(self.out, "{v}")?,
            Value::Short(v) => writeln!(self.out, "{v}")?,
            Value::Int(v) => writeln!(self.out, "{v}")?,
            Value::Float(v) => writeln!(self.out, "{v:.6}")?,
            other => return Err(RuntimeError::Unprintable(other.kind_name())),
        }
        Ok(())
    }

    /// Static dispatch: resolve the callee in this class, deposit the popped
    /// arguments into its locals, run it on a fresh frame, and transfer the
    /// return value back to the caller's stack.
    fn invoke_static(
        &mut self,
        cursor: &mut Cursor<'_>,
        frame: &mut Frame<'c>,
    ) -> Result<(), RuntimeError> {
        let class = self.class;
        let index = cursor.read_u16()?;
        let (class_index, name_and_type_index) = class.method_ref(index)?;
        let class_name = class.class_name(class_index)?;
        let (method_name, descriptor_str) = class.name_and_type(name_and_type_index)?;

        let descriptor = MethodDescriptor::parse(descriptor_str)?;
        let method = self
            .find_static_target(method_name, descriptor_str)
            .ok_or_else(|| RuntimeError::MethodNotFound {
                class: class_name.to_string(),
                name: method_name.to_string(),
                descriptor: descriptor_str.to_string(),
            })?;
        if method.access_flags & ACC_STATIC == 0 {
            return Err(RuntimeError::NonStaticTarget {
                name: method_name.to_string(),
            });
        }

        let code = CodeAttribute::of_method(class, method)?;
        let mut callee = Frame::new(code.max_stack, code.max_locals);
        for slot in 0..descriptor.params.len() {
            let argument = frame.pop()?;
            callee.store(slot, argument)?;
        }

        let returned = self.run_code(&code, &mut callee)?;
        if descriptor.ret != ValueKind::Void {
            let value = returned.ok_or_else(|| RuntimeError::MissingReturnValue {
                name: method_name.to_string(),
            })?;
            frame.push(value)?;
        }
        Ok(())
    }

    /// Resolves an `invokestatic` target by name and descriptor.
    fn find_static_target(&self, name: &str, descriptor: &str) -> Option<&'c MethodInfo> {
        let class = self.class;
        class.methods.iter().find(|method| {
            class.utf8(method.name_index).map_or(false, |n| n == name)
                && class
                    .utf8(method.descriptor_index)
                    .map_or(false, |d| d == descriptor)
        })
    }
}
