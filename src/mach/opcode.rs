/// ## Virtual machine instruction set
///
/// A stack machine with a cached top of stack. Binary operations pop
/// the left operand and combine it with the cached right operand.
///
/// For example: `X = 3 * Y` inside a function compiles to
/// `SLIT 3, LREF 0, MUL, LSET -2`.
///
/// Operands follow the opcode byte. Words are four bytes, big-endian.
/// Branch operands are displacements from the end of the operand.

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum Opcode {
    Halt = 0x00,
    Brt,
    Brtsc,
    Brf,
    Brfsc,
    Br,
    Not,
    Neg,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Bnot,
    Band,
    Bor,
    Bxor,
    Shl,
    Shr,
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
    Lit,
    Slit,
    Load,
    Loadb,
    Store,
    Storeb,
    Lref,
    Lset,
    Index,
    Pushj,
    Popj,
    Clean,
    Frame,
    Returnz,
    Return,
    Drop,
    Dup,
    Native,
    Trap,
}

/// Shape of the operand that follows an opcode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Format {
    None,
    Byte,
    SByte,
    Word,
    Branch,
}

impl Format {
    pub fn len(self) -> usize {
        match self {
            Format::None => 0,
            Format::Byte | Format::SByte => 1,
            Format::Word | Format::Branch => 4,
        }
    }
}

/// Trap numbers for `TRAP`.
pub const TRAP_GET_CHAR: u8 = 0;
pub const TRAP_PUT_CHAR: u8 = 1;

const OPCODES: [Opcode; 44] = {
    use Opcode::*;
    [
        Halt, Brt, Brtsc, Brf, Brfsc, Br, Not, Neg, Add, Sub, Mul, Div, Rem, Bnot, Band, Bor,
        Bxor, Shl, Shr, Lt, Le, Eq, Ne, Ge, Gt, Lit, Slit, Load, Loadb, Store, Storeb, Lref,
        Lset, Index, Pushj, Popj, Clean, Frame, Returnz, Return, Drop, Dup, Native, Trap,
    ]
};

impl Opcode {
    pub fn from_u8(byte: u8) -> Option<Opcode> {
        OPCODES.get(byte as usize).copied()
    }

    pub fn from_name(name: &str) -> Option<Opcode> {
        OPCODES
            .iter()
            .copied()
            .find(|op| op.name().eq_ignore_ascii_case(name))
    }

    pub fn format(self) -> Format {
        use Opcode::*;
        match self {
            Brt | Brtsc | Brf | Brfsc | Br => Format::Branch,
            Lit | Native => Format::Word,
            Slit | Lref | Lset => Format::SByte,
            Clean | Frame | Trap => Format::Byte,
            _ => Format::None,
        }
    }

    pub fn name(self) -> &'static str {
        use Opcode::*;
        match self {
            Halt => "HALT",
            Brt => "BRT",
            Brtsc => "BRTSC",
            Brf => "BRF",
            Brfsc => "BRFSC",
            Br => "BR",
            Not => "NOT",
            Neg => "NEG",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Rem => "REM",
            Bnot => "BNOT",
            Band => "BAND",
            Bor => "BOR",
            Bxor => "BXOR",
            Shl => "SHL",
            Shr => "SHR",
            Lt => "LT",
            Le => "LE",
            Eq => "EQ",
            Ne => "NE",
            Ge => "GE",
            Gt => "GT",
            Lit => "LIT",
            Slit => "SLIT",
            Load => "LOAD",
            Loadb => "LOADB",
            Store => "STORE",
            Storeb => "STOREB",
            Lref => "LREF",
            Lset => "LSET",
            Index => "INDEX",
            Pushj => "PUSHJ",
            Popj => "POPJ",
            Clean => "CLEAN",
            Frame => "FRAME",
            Returnz => "RETURNZ",
            Return => "RETURN",
            Drop => "DROP",
            Dup => "DUP",
            Native => "NATIVE",
            Trap => "TRAP",
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_values_follow_table() {
        for (i, op) in OPCODES.iter().enumerate() {
            assert_eq!(*op as u8 as usize, i);
            assert_eq!(Opcode::from_u8(i as u8), Some(*op));
        }
        assert_eq!(Opcode::from_u8(44), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(Opcode::from_name("lref"), Some(Opcode::Lref));
        assert_eq!(Opcode::from_name("RETURNZ"), Some(Opcode::Returnz));
        assert_eq!(Opcode::from_name("JUMP"), None);
        assert_eq!(Opcode::Brfsc.to_string(), "BRFSC");
        assert_eq!(Opcode::Brf.format().len(), 4);
    }
}
