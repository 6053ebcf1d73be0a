use super::{Address, WORD_SIZE};
use crate::error;
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

/// ## Dual region memory block
///
/// One fixed block of bytes shared by the compiler and the image it
/// builds. The low region grows upward from zero and holds everything
/// that survives into execution: the header, bytecode, string literals
/// and global data. The high region grows downward from the top and
/// holds compile-time records. When the two cursors would cross the
/// block is exhausted.
///
/// Nothing is ever moved, so an `Address` stays valid for the life of
/// the arena. The only ways to give memory back are `reset_to` and
/// `reset_high`.

#[derive(Debug)]
pub struct Arena {
    bytes: Vec<u8>,
    low: Address,
    high: Address,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mark {
    low: Address,
    high: Address,
}

fn align(size: usize) -> usize {
    (size + WORD_SIZE - 1) & !(WORD_SIZE - 1)
}

impl Arena {
    pub fn new(size: usize) -> Arena {
        let size = size & !(WORD_SIZE - 1);
        Arena {
            bytes: vec![0; size],
            low: 0,
            high: size,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Bytes still available between the two regions.
    pub fn available(&self) -> usize {
        self.high - self.low
    }

    /// Next free address in the low region.
    pub fn low(&self) -> Address {
        self.low
    }

    pub fn alloc_low(&mut self, size: usize) -> Result<Address> {
        let addr = align(self.low);
        let size = align(size);
        if addr + size > self.high {
            return Err(error!(OutOfMemory; "LOW MEMORY EXHAUSTED"));
        }
        for b in &mut self.bytes[self.low..addr + size] {
            *b = 0;
        }
        self.low = addr + size;
        Ok(addr)
    }

    pub fn alloc_high(&mut self, size: usize) -> Result<Address> {
        let size = align(size);
        if size > self.available() {
            return Err(error!(OutOfMemory; "HIGH MEMORY EXHAUSTED"));
        }
        self.high -= size;
        for b in &mut self.bytes[self.high..self.high + size] {
            *b = 0;
        }
        Ok(self.high)
    }

    pub fn mark(&self) -> Mark {
        Mark {
            low: self.low,
            high: self.high,
        }
    }

    pub fn reset_to(&mut self, mark: Mark) {
        debug_assert!(mark.low <= mark.high && mark.high <= self.bytes.len());
        self.low = mark.low;
        self.high = mark.high;
    }

    /// Give back the high region down to `mark` while keeping
    /// everything allocated low since.
    pub fn reset_high(&mut self, mark: Mark) {
        debug_assert!(mark.high >= self.high && mark.high <= self.bytes.len());
        self.high = mark.high;
    }

    /// Append unaligned bytes to the low region. Used by the code
    /// generator, which packs opcodes and operands tightly.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<Address> {
        if bytes.len() > self.available() {
            return Err(error!(BytecodeOverflow));
        }
        let addr = self.low;
        self.low += bytes.len();
        self.bytes[addr..self.low].copy_from_slice(bytes);
        Ok(addr)
    }

    /// Pad the low region out to a word boundary.
    pub fn align_low(&mut self) -> Result<()> {
        let pad = align(self.low) - self.low;
        if pad > self.available() {
            return Err(error!(OutOfMemory; "LOW MEMORY EXHAUSTED"));
        }
        for _ in 0..pad {
            self.bytes[self.low] = 0;
            self.low += 1;
        }
        Ok(())
    }

    pub fn byte(&self, addr: Address) -> Option<u8> {
        if addr < self.low {
            self.bytes.get(addr).copied()
        } else {
            None
        }
    }

    pub fn read_word(&self, addr: Address) -> Result<i32> {
        match self.low_slice(addr) {
            Some(b) => Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]])),
            None => Err(error!(InternalError; "WORD OUTSIDE IMAGE")),
        }
    }

    pub fn write_word(&mut self, addr: Address, word: i32) -> Result<()> {
        if addr + WORD_SIZE > self.low {
            return Err(error!(InternalError; "WORD OUTSIDE IMAGE"));
        }
        self.bytes[addr..addr + WORD_SIZE].copy_from_slice(&word.to_be_bytes());
        Ok(())
    }

    pub fn write_bytes(&mut self, addr: Address, bytes: &[u8]) -> Result<()> {
        if addr + bytes.len() > self.low {
            return Err(error!(InternalError; "BYTES OUTSIDE IMAGE"));
        }
        self.bytes[addr..addr + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn low_slice(&self, addr: Address) -> Option<&[u8]> {
        if addr + WORD_SIZE <= self.low {
            Some(&self.bytes[addr..addr + WORD_SIZE])
        } else {
            None
        }
    }

    /// Copy of everything in the low region.
    pub fn image(&self) -> Vec<u8> {
        self.bytes[..self.low].to_vec()
    }
}
