use super::opcode::{Format, Opcode};
use super::{Address, Program};
use std::fmt;

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub addr: Address,
    pub opcode: Opcode,
    pub operand: Option<i32>,
    pub len: usize,
}

impl Instruction {
    pub fn decode(bytes: &[u8], addr: Address) -> Option<Instruction> {
        let opcode = Opcode::from_u8(*bytes.get(addr)?)?;
        let format = opcode.format();
        let operand = bytes.get(addr + 1..addr + 1 + format.len())?;
        let operand = match format {
            Format::None => None,
            Format::Byte => Some(operand[0] as i32),
            Format::SByte => Some(operand[0] as i8 as i32),
            Format::Word | Format::Branch => Some(i32::from_be_bytes([
                operand[0], operand[1], operand[2], operand[3],
            ])),
        };
        Some(Instruction {
            addr,
            opcode,
            operand,
            len: 1 + format.len(),
        })
    }

    /// Absolute destination of a branch.
    pub fn target(&self) -> Option<Address> {
        match (self.opcode.format(), self.operand) {
            (Format::Branch, Some(disp)) => {
                Some((self.addr as i64 + self.len as i64 + disp as i64) as Address)
            }
            _ => None,
        }
    }
}

/// ## Disassembly
///
/// Every function of a program, one instruction per line:
/// `OFFSET  BYTES  MNEMONIC OPERAND`. Branches show where they land,
/// not their displacement.

pub struct Listing<'a> {
    program: &'a Program,
}

impl<'a> Listing<'a> {
    pub fn new(program: &'a Program) -> Listing<'a> {
        Listing { program }
    }

    /// Instructions in `start..end`. Bytes that do not decode are
    /// skipped one at a time.
    pub fn instructions(&self, start: Address, end: Address) -> Vec<Instruction> {
        let bytes = self.program.bytes();
        let end = end.min(bytes.len());
        let mut addr = start;
        let mut v = vec![];
        while addr < end {
            match Instruction::decode(&bytes[..end], addr) {
                Some(inst) => {
                    addr += inst.len;
                    v.push(inst);
                }
                None => addr += 1,
            }
        }
        v
    }

    /// Instructions of every function in the program.
    pub fn all(&self) -> Vec<Instruction> {
        self.program
            .code()
            .iter()
            .flat_map(|range| self.instructions(range.start, range.end))
            .collect()
    }
}

impl<'a> fmt::Display for Listing<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.program.bytes();
        for range in self.program.code() {
            if !range.name.is_empty() {
                writeln!(f, "{}:", range.name)?;
            }
            for inst in self.instructions(range.start, range.end) {
                let hex: Vec<String> = bytes[inst.addr..inst.addr + inst.len]
                    .iter()
                    .map(|b| format!("{:02X}", b))
                    .collect();
                write!(f, "{:04X}  {:<14}  {}", inst.addr, hex.join(" "), inst.opcode)?;
                match (inst.target(), inst.operand) {
                    (Some(target), _) => write!(f, " {:04X}", target)?,
                    (None, Some(operand)) => write!(f, " {}", operand)?,
                    (None, None) => {}
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_listing() {
        let bytes = vec![
            0,
            0,
            0,
            8,
            0,
            0,
            0,
            16,
            Opcode::Slit as u8,
            0xFF,
            Opcode::Brf as u8,
            0,
            0,
            0,
            1,
            Opcode::Drop as u8,
            Opcode::Halt as u8,
        ];
        let program = Program::from_image(bytes).unwrap();
        let listing = Listing::new(&program);
        assert_eq!(
            listing.to_string(),
            "0008  1A FF           SLIT -1\n\
             000A  03 00 00 00 01  BRF 0010\n\
             000F  28              DROP\n\
             0010  00              HALT\n"
        );
        assert_eq!(listing.all()[1].target(), Some(16));
    }
}
