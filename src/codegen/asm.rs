use std::fmt::{Display, Write};

pub enum OpCode {
    Mov,
    Movzx,
    Movsx,
    Add,
    Sub,
    Mul,
    Imul,
    Inc,
    Dec,
    Cmp,
    Xchg,
    Push,
    Pop,
    Pushf,
    Popf,
    Call,
    Ret,
    Jnz,
    Syscall,
}

impl Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpCode::Mov => write!(f, "mov"),
            OpCode::Movzx => write!(f, "movzx"),
            OpCode::Movsx => write!(f, "movsx"),
            OpCode::Add => write!(f, "add"),
            OpCode::Sub => write!(f, "sub"),
            OpCode::Mul => write!(f, "mul"),
            OpCode::Imul => write!(f, "imul"),
            OpCode::Inc => write!(f, "inc"),
            OpCode::Dec => write!(f, "dec"),
            OpCode::Cmp => write!(f, "cmp"),
            OpCode::Xchg => write!(f, "xchg"),
            OpCode::Push => write!(f, "push"),
            OpCode::Pop => write!(f, "pop"),
            OpCode::Pushf => write!(f, "pushf"),
            OpCode::Popf => write!(f, "popf"),
            OpCode::Call => write!(f, "call"),
            OpCode::Ret => write!(f, "ret"),
            OpCode::Jnz => write!(f, "jnz"),
            OpCode::Syscall => write!(f, "syscall"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[rustfmt::skip]
pub enum Reg {
    Rax, Eax, Ax, Al,
    Rbx, Ebx, Bx, Bl,
    Rcx, Ecx, Cx, Cl,
    Rdx, Edx, Dx, Dl,
    Rsp,
    Rbp,
    Rdi, Edi, Di, Dil,
    Rsi, Esi, Si, Sil,
    R8,  R8D, R8W, R8B,
    R9,  R9D, R9W, R9B,
}

impl Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Reg::Rax => "rax",
            Reg::Eax => "eax",
            Reg::Ax => "ax",
            Reg::Al => "al",
            Reg::Rbx => "rbx",
            Reg::Ebx => "ebx",
            Reg::Bx => "bx",
            Reg::Bl => "bl",
            Reg::Rcx => "rcx",
            Reg::Ecx => "ecx",
            Reg::Cx => "cx",
            Reg::Cl => "cl",
            Reg::Rdx => "rdx",
            Reg::Edx => "edx",
            Reg::Dx => "dx",
            Reg::Dl => "dl",
            Reg::Rsp => "rsp",
            Reg::Rbp => "rbp",
            Reg::Rdi => "rdi",
            Reg::Edi => "edi",
            Reg::Di => "di",
            Reg::Dil => "dil",
            Reg::Rsi => "rsi",
            Reg::Esi => "esi",
            Reg::Si => "si",
            Reg::Sil => "sil",
            Reg::R8 => "r8",
            Reg::R8D => "r8d",
            Reg::R8W => "r8w",
            Reg::R8B => "r8b",
            Reg::R9 => "r9",
            Reg::R9D => "r9d",
            Reg::R9W => "r9w",
            Reg::R9B => "r9b",
        };
        write!(f, "{name}")
    }
}

impl Reg {
    /// Grade-1 accumulator: destination of arithmetic and boolean lowering.
    #[inline]
    pub fn acc(mem_size: MemSize) -> Self {
        match mem_size {
            MemSize::Byte => Reg::Al,
            MemSize::Word => Reg::Ax,
            MemSize::DWord => Reg::Eax,
            MemSize::QWord => Reg::Rax,
        }
    }

    /// Grade-2 scratch register.
    #[inline]
    pub fn bse(mem_size: MemSize) -> Self {
        match mem_size {
            MemSize::Byte => Reg::Bl,
            MemSize::Word => Reg::Bx,
            MemSize::DWord => Reg::Ebx,
            MemSize::QWord => Reg::Rbx,
        }
    }

    /// Grade-3 scratch register, also the exit-code staging register.
    #[inline]
    pub fn cnt(mem_size: MemSize) -> Self {
        match mem_size {
            MemSize::Byte => Reg::Cl,
            MemSize::Word => Reg::Cx,
            MemSize::DWord => Reg::Ecx,
            MemSize::QWord => Reg::Rcx,
        }
    }

    /// Grade-4 scratch register.
    #[inline]
    pub fn dta(mem_size: MemSize) -> Self {
        match mem_size {
            MemSize::Byte => Reg::Dl,
            MemSize::Word => Reg::Dx,
            MemSize::DWord => Reg::Edx,
            MemSize::QWord => Reg::Rdx,
        }
    }

    /// The n-th System V integer argument register, or None past the sixth.
    pub fn param(arg_num: usize, mem_size: MemSize) -> Option<Self> {
        let reg = match (arg_num, mem_size) {
            (0, MemSize::QWord) => Reg::Rdi,
            (0, MemSize::DWord) => Reg::Edi,
            (0, MemSize::Word) => Reg::Di,
            (0, MemSize::Byte) => Reg::Dil,
            (1, MemSize::QWord) => Reg::Rsi,
            (1, MemSize::DWord) => Reg::Esi,
            (1, MemSize::Word) => Reg::Si,
            (1, MemSize::Byte) => Reg::Sil,
            (2, _) => Reg::dta(mem_size),
            (3, _) => Reg::cnt(mem_size),
            (4, MemSize::QWord) => Reg::R8,
            (4, MemSize::DWord) => Reg::R8D,
            (4, MemSize::Word) => Reg::R8W,
            (4, MemSize::Byte) => Reg::R8B,
            (5, MemSize::QWord) => Reg::R9,
            (5, MemSize::DWord) => Reg::R9D,
            (5, MemSize::Word) => Reg::R9W,
            (5, MemSize::Byte) => Reg::R9B,
            _ => return None,
        };
        Some(reg)
    }

    /// Same hardware register at another width.
    pub fn with_size(self, mem_size: MemSize) -> Self {
        match self {
            Reg::Rax | Reg::Eax | Reg::Ax | Reg::Al => Reg::acc(mem_size),
            Reg::Rbx | Reg::Ebx | Reg::Bx | Reg::Bl => Reg::bse(mem_size),
            Reg::Rcx | Reg::Ecx | Reg::Cx | Reg::Cl => Reg::cnt(mem_size),
            Reg::Rdx | Reg::Edx | Reg::Dx | Reg::Dl => Reg::dta(mem_size),
            Reg::Rdi | Reg::Edi | Reg::Di | Reg::Dil => {
                Reg::param(0, mem_size).expect("first parameter register")
            }
            Reg::Rsi | Reg::Esi | Reg::Si | Reg::Sil => {
                Reg::param(1, mem_size).expect("second parameter register")
            }
            Reg::R8 | Reg::R8D | Reg::R8W | Reg::R8B => {
                Reg::param(4, mem_size).expect("fifth parameter register")
            }
            Reg::R9 | Reg::R9D | Reg::R9W | Reg::R9B => {
                Reg::param(5, mem_size).expect("sixth parameter register")
            }
            Reg::Rsp | Reg::Rbp => self,
        }
    }
}

impl MemSized for Reg {
    fn mem_size(&self) -> MemSize {
        match self {
            Reg::Rax | Reg::Rbx | Reg::Rcx | Reg::Rdx | Reg::Rsp | Reg::Rbp | Reg::Rdi
            | Reg::Rsi | Reg::R8 | Reg::R9 => MemSize::QWord,
            Reg::Eax | Reg::Ebx | Reg::Ecx | Reg::Edx | Reg::Edi | Reg::Esi | Reg::R8D
            | Reg::R9D => MemSize::DWord,
            Reg::Ax | Reg::Bx | Reg::Cx | Reg::Dx | Reg::Di | Reg::Si | Reg::R8W | Reg::R9W => {
                MemSize::Word
            }
            Reg::Al | Reg::Bl | Reg::Cl | Reg::Dl | Reg::Dil | Reg::Sil | Reg::R8B | Reg::R9B => {
                MemSize::Byte
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemSize {
    Byte = 1,
    Word = 2,
    DWord = 4,
    QWord = 8,
}

pub trait MemSized {
    fn mem_size(&self) -> MemSize;
}

impl TryFrom<u32> for MemSize {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Byte),
            2 => Ok(Self::Word),
            4 => Ok(Self::DWord),
            8 => Ok(Self::QWord),
            _ => Err(value),
        }
    }
}

impl Display for MemSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Byte => write!(f, "byte"),
            Self::Word => write!(f, "word"),
            Self::DWord => write!(f, "dword"),
            Self::QWord => write!(f, "qword"),
        }
    }
}

/// A frame slot, addressed downward from rbp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mem {
    offset: u32,
    size: MemSize,
}

impl Mem {
    pub fn frame(offset: u32, size: MemSize) -> Self {
        Self { offset, size }
    }

    pub fn with_size(self, size: MemSize) -> Self {
        Self { size, ..self }
    }
}

impl MemSized for Mem {
    fn mem_size(&self) -> MemSize {
        self.size
    }
}

impl Display for Mem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [rbp-{}]", self.size, self.offset)
    }
}

/// Integer condition codes, shared by the ternary and boolean lowerings as
/// the cmov/set mnemonic suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cc {
    E,
    G,
    Ge,
    L,
    Le,
    Ne,
}

impl Cc {
    /// Bare `?` (boolean-identifier sugar) also maps to equality.
    pub fn from_comparison(text: &str) -> Option<Self> {
        match text {
            "==" | "?" => Some(Cc::E),
            ">" => Some(Cc::G),
            ">=" => Some(Cc::Ge),
            "<" => Some(Cc::L),
            "<=" => Some(Cc::Le),
            "!=" => Some(Cc::Ne),
            _ => None,
        }
    }
}

impl Display for Cc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cc::E => write!(f, "e"),
            Cc::G => write!(f, "g"),
            Cc::Ge => write!(f, "ge"),
            Cc::L => write!(f, "l"),
            Cc::Le => write!(f, "le"),
            Cc::Ne => write!(f, "ne"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg),
    Mem(Mem),
    Imm(i64),
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reg(reg) => reg.fmt(f),
            Self::Mem(mem) => mem.fmt(f),
            Self::Imm(imm) => imm.fmt(f),
        }
    }
}

impl From<Reg> for Operand {
    fn from(value: Reg) -> Self {
        Self::Reg(value)
    }
}

impl From<Mem> for Operand {
    fn from(value: Mem) -> Self {
        Self::Mem(value)
    }
}

macro_rules! code {
    ($builder:expr, $opcode:ident) => {{
        use $crate::codegen::asm::OpCode::$opcode;
        ::core::writeln!($builder, "  {}", $opcode);
    }};

    ($builder:expr, $opcode:ident, $dst:expr) => {{
        use $crate::codegen::asm::OpCode::$opcode;
        ::core::writeln!($builder, "  {} {}", $opcode, $dst);
    }};

    ($builder:expr, $opcode:ident, $dst:expr, $src:expr) => {{
        use $crate::codegen::asm::OpCode::$opcode;
        ::core::writeln!($builder, "  {} {}, {}", $opcode, $dst, $src);
    }};

    ($builder:expr, $($arg:tt)*) => {
        ::core::writeln!($builder, $($arg)*)
    };
}

pub(crate) use code;

#[derive(Debug, Default)]
pub struct AsmBuilder(String);

impl AsmBuilder {
    pub fn new() -> Self {
        Self(String::new())
    }

    pub fn write_fmt(&mut self, args: std::fmt::Arguments<'_>) {
        let _ = self.0.write_fmt(args);
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for AsmBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
