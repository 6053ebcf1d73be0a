use super::opcode::{Format, Opcode};
use crate::error;
use crate::lang::Error;
use std::convert::TryFrom;

type Result<T> = std::result::Result<T, Error>;

/// ## Inline assembler
///
/// Translates one mnemonic per line into bytes, e.g. `LREF 0` or
/// `TRAP 1`. Comments start with `'` or `;`. Branch operands are raw
/// displacements. The finished bytes are spliced into the code stream
/// unchanged.

#[derive(Debug, Default)]
pub struct Assembler {
    bytes: Vec<u8>,
}

impl Assembler {
    pub fn new() -> Assembler {
        Assembler::default()
    }

    pub fn assemble_line(&mut self, line: &str) -> Result<()> {
        let line = match line.find(|c| c == '\'' || c == ';') {
            Some(pos) => &line[..pos],
            None => line,
        };
        let mut fields = line.split_whitespace();
        let mnemonic = match fields.next() {
            Some(m) => m,
            None => return Ok(()),
        };
        let opcode = match Opcode::from_name(mnemonic) {
            Some(op) => op,
            None => return Err(error!(SyntaxError; "UNKNOWN OPCODE")),
        };
        let operand = match fields.next() {
            Some(s) => Some(parse_operand(s)?),
            None => None,
        };
        if fields.next().is_some() {
            return Err(error!(SyntaxError; "TOO MANY OPERANDS"));
        }
        self.bytes.push(opcode as u8);
        match (opcode.format(), operand) {
            (Format::None, None) => {}
            (Format::None, Some(_)) => return Err(error!(SyntaxError; "UNEXPECTED OPERAND")),
            (_, None) => return Err(error!(SyntaxError; "EXPECTED OPERAND")),
            (Format::Byte, Some(n)) => match u8::try_from(n) {
                Ok(b) => self.bytes.push(b),
                Err(_) => return Err(error!(Overflow; "OPERAND OUT OF RANGE")),
            },
            (Format::SByte, Some(n)) => match i8::try_from(n) {
                Ok(b) => self.bytes.push(b as u8),
                Err(_) => return Err(error!(Overflow; "OPERAND OUT OF RANGE")),
            },
            (Format::Word, Some(n)) | (Format::Branch, Some(n)) => {
                self.bytes.extend_from_slice(&n.to_be_bytes())
            }
        }
        Ok(())
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

fn parse_operand(s: &str) -> Result<i32> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else {
        digits.parse::<i64>()
    };
    let value = match value {
        Ok(v) if negative => -v,
        Ok(v) => v,
        Err(_) => return Err(error!(SyntaxError; "INVALID OPERAND")),
    };
    match i32::try_from(value) {
        Ok(v) => Ok(v),
        Err(_) => Err(error!(Overflow; "OPERAND OUT OF RANGE")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ErrorCode;

    #[test]
    fn test_assemble() {
        let mut asm = Assembler::new();
        asm.assemble_line("  lref 0   ' argument").unwrap();
        asm.assemble_line("TRAP 1").unwrap();
        asm.assemble_line("").unwrap();
        asm.assemble_line("LSET -2").unwrap();
        asm.assemble_line("LIT 0x100").unwrap();
        asm.assemble_line("RETURN").unwrap();
        assert_eq!(
            asm.finish(),
            vec![
                Opcode::Lref as u8,
                0,
                Opcode::Trap as u8,
                1,
                Opcode::Lset as u8,
                0xFE,
                Opcode::Lit as u8,
                0,
                0,
                1,
                0,
                Opcode::Return as u8
            ]
        );
    }

    #[test]
    fn test_errors() {
        let mut asm = Assembler::new();
        assert!(asm.assemble_line("JUMP 4").unwrap_err().is(ErrorCode::SyntaxError));
        assert!(asm.assemble_line("LREF").unwrap_err().is(ErrorCode::SyntaxError));
        assert!(asm.assemble_line("ADD 1").unwrap_err().is(ErrorCode::SyntaxError));
        assert!(asm.assemble_line("SLIT 300").unwrap_err().is(ErrorCode::Overflow));
    }
}
