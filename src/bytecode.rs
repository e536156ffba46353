//! Bytecode definitions for the recognised instruction subset.
//! ref: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-7.html
use std::fmt;

/// Opcodes the engine recognises, with their on-disk byte values. All six
/// `if_icmp<cond>` bytes decode; only `if_icmpge` executes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    IconstM1 = 0x02,
    Iconst0 = 0x03,
    Iconst1 = 0x04,
    Iconst2 = 0x05,
    Iconst3 = 0x06,
    Iconst4 = 0x07,
    Iconst5 = 0x08,
    BiPush = 0x10,
    SiPush = 0x11,
    Ldc = 0x12,
    ILoad = 0x15,
    ILoad0 = 0x1A,
    ILoad1 = 0x1B,
    ILoad2 = 0x1C,
    ILoad3 = 0x1D,
    IStore = 0x36,
    IStore0 = 0x3B,
    IStore1 = 0x3C,
    IStore2 = 0x3D,
    IStore3 = 0x3E,
    IAdd = 0x60,
    IInc = 0x84,
    IfICmpEq = 0x9F,
    IfICmpNe = 0xA0,
    IfICmpLt = 0xA1,
    IfICmpGe = 0xA2,
    IfICmpGt = 0xA3,
    IfICmpLe = 0xA4,
    Goto = 0xA7,
    IReturn = 0xAC,
    Return = 0xB1,
    GetStatic = 0xB2,
    InvokeVirtual = 0xB6,
    InvokeStatic = 0xB8,
}

impl Opcode {
    /// Decodes one instruction byte; `None` for anything outside the
    /// recognised set.
    pub const fn decode(byte: u8) -> Option<Opcode> {
        match byte {
            0x02 => Some(Opcode::IconstM1),
            0x03 => Some(Opcode::Iconst0),
            0x04 => Some(Opcode::Iconst1),
            0x05 => Some(Opcode::Iconst2),
            0x06 => Some(Opcode::Iconst3),
            0x07 => Some(Opcode::Iconst4),
            0x08 => Some(Opcode::Iconst5),
            0x10 => Some(Opcode::BiPush),
            0x11 => Some(Opcode::SiPush),
            0x12 => Some(Opcode::Ldc),
            0x15 => Some(Opcode::ILoad),
            0x1A => Some(Opcode::ILoad0),
            0x1B => Some(Opcode::ILoad1),
            0x1C => Some(Opcode::ILoad2),
            0x1D => Some(Opcode::ILoad3),
            0x36 => Some(Opcode::IStore),
            0x3B => Some(Opcode::IStore0),
            0x3C => Some(Opcode::IStore1),
            0x3D => Some(Opcode::IStore2),
            0x3E => Some(Opcode::IStore3),
            0x60 => Some(Opcode::IAdd),
            0x84 => Some(Opcode::IInc),
            0x9F => Some(Opcode::IfICmpEq),
            0xA0 => Some(Opcode::IfICmpNe),
            0xA1 => Some(Opcode::IfICmpLt),
            0xA2 => Some(Opcode::IfICmpGe),
            0xA3 => Some(Opcode::IfICmpGt),
            0xA4 => Some(Opcode::IfICmpLe),
            0xA7 => Some(Opcode::Goto),
            0xAC => Some(Opcode::IReturn),
            0xB1 => Some(Opcode::Return),
            0xB2 => Some(Opcode::GetStatic),
            0xB6 => Some(Opcode::InvokeVirtual),
            0xB8 => Some(Opcode::InvokeStatic),
            _ => None,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mnemonic = match self {
            Opcode::IconstM1 => "iconst_m1",
            Opcode::Iconst0 => "iconst_0",
            Opcode::Iconst1 => "iconst_1",
            Opcode::Iconst2 => "iconst_2",
            Opcode::Iconst3 => "iconst_3",
            Opcode::Iconst4 => "iconst_4",
            Opcode::Iconst5 => "iconst_5",
            Opcode::BiPush => "bipush",
            Opcode::SiPush => "sipush",
            Opcode::Ldc => "ldc",
            Opcode::ILoad => "iload",
            Opcode::ILoad0 => "iload_0",
            Opcode::ILoad1 => "iload_1",
            Opcode::ILoad2 => "iload_2",
            Opcode::ILoad3 => "iload_3",
            Opcode::IStore => "istore",
            Opcode::IStore0 => "istore_0",
            Opcode::IStore1 => "istore_1",
            Opcode::IStore2 => "istore_2",
            Opcode::IStore3 => "istore_3",
            Opcode::IAdd => "iadd",
            Opcode::IInc => "iinc",
            Opcode::IfICmpEq => "if_icmpeq",
            Opcode::IfICmpNe => "if_icmpne",
            Opcode::IfICmpLt => "if_icmplt",
            Opcode::IfICmpGe => "if_icmpge",
            Opcode::IfICmpGt => "if_icmpgt",
            Opcode::IfICmpLe => "if_icmple",
            Opcode::Goto => "goto",
            Opcode::IReturn => "ireturn",
            Opcode::Return => "return",
            Opcode::GetStatic => "getstatic",
            Opcode::InvokeVirtual => "invokevirtual",
            Opcode::InvokeStatic => "invokestatic",
        };
        write!(f, "{mnemonic}")
    }
}
