use super::{Address, WORD_SIZE};
use crate::error;
use crate::lang::Error;
use std::convert::TryFrom;

type Result<T> = std::result::Result<T, Error>;

/// Bytes in front of the first instruction: entry address of the main
/// program, then the operand stack size in words.
pub const HEADER_SIZE: usize = 2 * WORD_SIZE;

/// Where the code of one function sits in the image.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeRange {
    pub name: String,
    pub start: Address,
    pub end: Address,
}

/// ## Sealed bytecode image
///
/// Everything the virtual machine needs: header, code, string literals
/// and zeroed global storage. The code ranges are only used for
/// listings.

#[derive(Debug, Clone)]
pub struct Program {
    bytes: Vec<u8>,
    entry: Address,
    stack_size: usize,
    code: Vec<CodeRange>,
}

impl Program {
    pub fn new(bytes: Vec<u8>, code: Vec<CodeRange>) -> Result<Program> {
        let word = |addr: Address| match bytes.get(addr..addr + WORD_SIZE) {
            Some(b) => Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]])),
            None => Err(error!(InternalError; "IMAGE HEADER MISSING")),
        };
        let entry = word(0)?;
        let stack_size = word(WORD_SIZE)?;
        let entry = match usize::try_from(entry) {
            Ok(entry) if entry >= HEADER_SIZE && entry < bytes.len() => entry,
            _ => return Err(error!(InternalError; "INVALID ENTRY ADDRESS")),
        };
        let stack_size = match usize::try_from(stack_size) {
            Ok(size) if size > 0 => size,
            _ => return Err(error!(InternalError; "INVALID STACK SIZE")),
        };
        Ok(Program {
            bytes,
            entry,
            stack_size,
            code,
        })
    }

    /// Load a raw image, such as one put together by hand. The whole
    /// image after the header is treated as code.
    pub fn from_image(bytes: Vec<u8>) -> Result<Program> {
        let code = vec![CodeRange {
            name: String::new(),
            start: HEADER_SIZE,
            end: bytes.len(),
        }];
        Program::new(bytes, code)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn entry(&self) -> Address {
        self.entry
    }

    /// Operand stack size in words.
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    pub fn code(&self) -> &[CodeRange] {
        &self.code
    }

    pub fn word(&self, addr: Address) -> Option<i32> {
        let b = self.bytes.get(addr..addr + WORD_SIZE)?;
        Some(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ErrorCode;

    #[test]
    fn test_header() {
        let program = Program::from_image(vec![0, 0, 0, 8, 0, 0, 0, 16, 0]).unwrap();
        assert_eq!(program.entry(), 8);
        assert_eq!(program.stack_size(), 16);
        assert_eq!(program.code()[0].end, 9);
        assert_eq!(program.word(4), Some(16));
        assert_eq!(program.word(6), None);
    }

    #[test]
    fn test_bad_header() {
        let e = Program::from_image(vec![0, 0, 0, 8]).unwrap_err();
        assert!(e.is(ErrorCode::InternalError));
        let e = Program::from_image(vec![0, 0, 0, 2, 0, 0, 0, 16, 0]).unwrap_err();
        assert!(e.is(ErrorCode::InternalError));
    }
}
