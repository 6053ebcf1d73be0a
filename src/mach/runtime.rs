use super::opcode::{Opcode, TRAP_GET_CHAR, TRAP_PUT_CHAR};
use super::{codegen::F_FP, Address, Program, WORD_SIZE};
use crate::error;
use crate::lang::Error;
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

type Result<T> = std::result::Result<T, Error>;

/// Output is handed back once this much is buffered even without a
/// newline.
const PRINT_BUFFER: usize = 256;

/// ## Virtual machine
///
/// Runs a sealed `Program` in slices of instructions. The operand stack
/// grows down from `stack_size` and its top cell is cached in `tos`.
/// Calls build frames on the same stack: arguments at non-negative
/// offsets from `fp`, the saved frame pointer at `fp[-1]` and locals
/// below it.

#[derive(Debug)]
pub struct Runtime {
    program: Program,
    memory: Vec<u8>,
    stack: Vec<i32>,
    pc: Address,
    sp: usize,
    fp: usize,
    tos: i32,
    state: State,
    input: VecDeque<u8>,
    input_closed: bool,
    output: String,
    pending: Option<Error>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Running,
    Input,
    Stopped,
}

/// What the machine needs from its host after a slice of execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Halted. Calling `execute` again keeps returning this.
    Stopped,
    /// The slice ran out of cycles.
    Running,
    Print(String),
    /// Waiting on `enter` or `close_input` for a character.
    Input,
    Errors(Error),
}

impl Runtime {
    pub fn new(program: Program) -> Runtime {
        let stack_size = program.stack_size();
        let mut runtime = Runtime {
            memory: program.bytes().to_vec(),
            program,
            stack: vec![0; stack_size],
            pc: 0,
            sp: stack_size,
            fp: stack_size,
            tos: 0,
            state: State::Running,
            input: VecDeque::new(),
            input_closed: false,
            output: String::new(),
            pending: None,
        };
        runtime.restart();
        runtime
    }

    /// Start over from the entry point with a fresh copy of the image.
    pub fn restart(&mut self) {
        self.memory = self.program.bytes().to_vec();
        for cell in self.stack.iter_mut() {
            *cell = 0;
        }
        self.pc = self.program.entry();
        self.sp = self.stack.len();
        self.fp = self.stack.len();
        self.tos = 0;
        self.state = State::Running;
        self.output.clear();
        self.pending = None;
        debug!(entry = self.pc, stack = self.stack.len(), "runtime start");
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn pc(&self) -> Address {
        self.pc
    }

    pub fn sp(&self) -> usize {
        self.sp
    }

    pub fn fp(&self) -> usize {
        self.fp
    }

    pub fn tos(&self) -> i32 {
        self.tos
    }

    pub fn is_stopped(&self) -> bool {
        self.state == State::Stopped
    }

    /// Queue a line of input for `getChar`, newline included.
    pub fn enter(&mut self, line: &str) {
        self.input.extend(line.bytes());
        self.input.push_back(b'\n');
    }

    /// No more input will come. `getChar` returns -1 once the queue drains.
    pub fn close_input(&mut self) {
        self.input_closed = true;
    }

    pub fn interrupt(&mut self) {
        if self.state != State::Stopped {
            self.state = State::Stopped;
            self.pending = Some(error!(Break));
            debug!(pc = self.pc, "runtime interrupted");
        }
    }

    pub fn execute(&mut self, cycles: usize) -> Event {
        if let Some(event) = self.flush() {
            return event;
        }
        if let Some(error) = self.pending.take() {
            return Event::Errors(error);
        }
        match self.state {
            State::Stopped => return Event::Stopped,
            State::Input if self.input.is_empty() && !self.input_closed => return Event::Input,
            _ => self.state = State::Running,
        }
        for _ in 0..cycles {
            let pc = self.pc;
            match self.step() {
                Ok(None) => {}
                Ok(Some(event)) => return event,
                Err(error) => {
                    let error = error.at_address(pc);
                    warn!(%error, "runtime fault");
                    self.state = State::Stopped;
                    self.pending = Some(error);
                    return self.execute(0);
                }
            }
        }
        Event::Running
    }

    fn flush(&mut self) -> Option<Event> {
        if self.output.is_empty() {
            None
        } else {
            Some(Event::Print(std::mem::take(&mut self.output)))
        }
    }

    fn fault(&self, message: &'static str) -> Error {
        error!(RuntimeFault; message)
    }

    fn push(&mut self, value: i32) -> Result<()> {
        if self.sp == 0 {
            return Err(self.fault("STACK OVERFLOW"));
        }
        self.sp -= 1;
        self.stack[self.sp] = value;
        Ok(())
    }

    fn pop(&mut self) -> Result<i32> {
        match self.stack.get(self.sp) {
            Some(value) => {
                self.sp += 1;
                Ok(*value)
            }
            None => Err(self.fault("STACK UNDERFLOW")),
        }
    }

    fn frame_index(&self, offset: i32) -> Result<usize> {
        let index = self.fp as i64 + offset as i64;
        if index < 0 || index >= self.stack.len() as i64 {
            return Err(self.fault("FRAME OUT OF RANGE"));
        }
        Ok(index as usize)
    }

    fn fetch(&mut self) -> Result<u8> {
        match self.memory.get(self.pc) {
            Some(byte) => {
                self.pc += 1;
                Ok(*byte)
            }
            None => Err(self.fault("PC OUT OF RANGE")),
        }
    }

    fn fetch_word(&mut self) -> Result<i32> {
        let mut word = [0; WORD_SIZE];
        for byte in word.iter_mut() {
            *byte = self.fetch()?;
        }
        Ok(i32::from_be_bytes(word))
    }

    fn address(&self, addr: i32, len: usize) -> Result<usize> {
        if addr < 0 || addr as usize + len > self.memory.len() {
            return Err(self.fault("ADDRESS OUT OF RANGE"));
        }
        Ok(addr as usize)
    }

    fn load(&self, addr: i32) -> Result<i32> {
        let addr = self.address(addr, WORD_SIZE)?;
        let b = &self.memory[addr..addr + WORD_SIZE];
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn store(&mut self, addr: i32, value: i32) -> Result<()> {
        let addr = self.address(addr, WORD_SIZE)?;
        self.memory[addr..addr + WORD_SIZE].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    fn jump(&mut self, target: i32) -> Result<()> {
        if target < 0 || target as usize >= self.memory.len() {
            return Err(self.fault("PC OUT OF RANGE"));
        }
        self.pc = target as usize;
        Ok(())
    }

    fn branch(&mut self, displacement: i32) -> Result<()> {
        self.jump((self.pc as i32).wrapping_add(displacement))
    }

    fn binary(&mut self, op: Opcode) -> Result<()> {
        let lhs = self.pop()?;
        let rhs = self.tos;
        use Opcode::*;
        self.tos = match op {
            Add => lhs.wrapping_add(rhs),
            Sub => lhs.wrapping_sub(rhs),
            Mul => lhs.wrapping_mul(rhs),
            Div if rhs == 0 => 0,
            Div => lhs.wrapping_div(rhs),
            Rem if rhs == 0 => 0,
            Rem => lhs.wrapping_rem(rhs),
            Band => lhs & rhs,
            Bor => lhs | rhs,
            Bxor => lhs ^ rhs,
            Shl => lhs.wrapping_shl(rhs as u32),
            Shr => lhs.wrapping_shr(rhs as u32),
            Lt => (lhs < rhs) as i32,
            Le => (lhs <= rhs) as i32,
            Eq => (lhs == rhs) as i32,
            Ne => (lhs != rhs) as i32,
            Ge => (lhs >= rhs) as i32,
            Gt => (lhs > rhs) as i32,
            _ => return Err(error!(InternalError; "NOT A BINARY OPERATION")),
        };
        Ok(())
    }

    fn step(&mut self) -> Result<Option<Event>> {
        let start = self.pc;
        let op = match Opcode::from_u8(self.fetch()?) {
            Some(op) => op,
            None => return Err(self.fault("UNDEFINED OPCODE")),
        };
        trace!(pc = start, %op, tos = self.tos, sp = self.sp);
        use Opcode::*;
        match op {
            Halt => {
                self.state = State::Stopped;
                debug!(pc = start, tos = self.tos, "runtime halt");
                return Ok(Some(self.flush().unwrap_or(Event::Stopped)));
            }
            Br => {
                let disp = self.fetch_word()?;
                self.branch(disp)?;
            }
            Brt | Brf => {
                let disp = self.fetch_word()?;
                let taken = (self.tos != 0) == (op == Brt);
                self.tos = self.pop()?;
                if taken {
                    self.branch(disp)?;
                }
            }
            Brtsc | Brfsc => {
                let disp = self.fetch_word()?;
                if (self.tos != 0) == (op == Brtsc) {
                    self.branch(disp)?;
                } else {
                    self.tos = self.pop()?;
                }
            }
            Not => self.tos = (self.tos == 0) as i32,
            Neg => self.tos = self.tos.wrapping_neg(),
            Bnot => self.tos = !self.tos,
            Add | Sub | Mul | Div | Rem | Band | Bor | Bxor | Shl | Shr | Lt | Le | Eq | Ne
            | Ge | Gt => self.binary(op)?,
            Lit => {
                let value = self.fetch_word()?;
                self.push(self.tos)?;
                self.tos = value;
            }
            Slit => {
                let value = self.fetch()? as i8;
                self.push(self.tos)?;
                self.tos = value as i32;
            }
            Load => self.tos = self.load(self.tos)?,
            Loadb => {
                let addr = self.address(self.tos, 1)?;
                self.tos = self.memory[addr] as i32;
            }
            Store => {
                let value = self.pop()?;
                self.store(self.tos, value)?;
                self.tos = self.pop()?;
            }
            Storeb => {
                let value = self.pop()?;
                let addr = self.address(self.tos, 1)?;
                self.memory[addr] = value as u8;
                self.tos = self.pop()?;
            }
            Lref => {
                let offset = self.fetch()? as i8;
                let index = self.frame_index(offset as i32)?;
                self.push(self.tos)?;
                self.tos = self.stack[index];
            }
            Lset => {
                let offset = self.fetch()? as i8;
                let index = self.frame_index(offset as i32)?;
                self.stack[index] = self.tos;
                self.tos = self.pop()?;
            }
            Index => {
                let base = self.pop()?;
                self.tos = base.wrapping_add(self.tos.wrapping_mul(WORD_SIZE as i32));
            }
            Pushj => {
                let ret = self.pc as i32;
                self.jump(self.tos)?;
                self.tos = ret;
            }
            Popj => {
                self.jump(self.tos)?;
                self.tos = self.pop()?;
            }
            Clean => {
                let n = self.fetch()? as usize;
                if self.sp + n > self.stack.len() {
                    return Err(self.fault("STACK UNDERFLOW"));
                }
                self.sp += n;
            }
            Frame => {
                let n = self.fetch()? as usize;
                let saved = self.fp;
                self.fp = self.sp;
                if n > self.sp {
                    return Err(self.fault("STACK OVERFLOW"));
                }
                self.sp -= n;
                for cell in &mut self.stack[self.sp..self.fp] {
                    *cell = 0;
                }
                let index = self.frame_index(F_FP)?;
                self.stack[index] = saved as i32;
            }
            Returnz => {
                self.push(self.tos)?;
                self.tos = 0;
                self.r#return()?;
            }
            Return => self.r#return()?,
            Drop => self.tos = self.pop()?,
            Dup => self.push(self.tos)?,
            Native => {
                self.fetch_word()?;
            }
            Trap => {
                let trap = self.fetch()?;
                return self.trap(trap, start);
            }
        }
        Ok(None)
    }

    /// The return address is the top cell in memory. The caller's
    /// arguments stay until it cleans them up.
    fn r#return(&mut self) -> Result<()> {
        let ret = match self.stack.get(self.sp) {
            Some(ret) => *ret,
            None => return Err(self.fault("STACK UNDERFLOW")),
        };
        let saved = self.stack[self.frame_index(F_FP)?];
        self.jump(ret)?;
        self.sp = self.fp;
        if saved < 0 || saved as usize > self.stack.len() {
            return Err(self.fault("FRAME OUT OF RANGE"));
        }
        self.fp = saved as usize;
        Ok(())
    }

    fn trap(&mut self, trap: u8, start: Address) -> Result<Option<Event>> {
        match trap {
            TRAP_GET_CHAR => {
                let ch = match self.input.pop_front() {
                    Some(byte) => byte as i32,
                    None if self.input_closed => -1,
                    None => {
                        self.pc = start;
                        self.state = State::Input;
                        return Ok(Some(self.flush().unwrap_or(Event::Input)));
                    }
                };
                self.push(self.tos)?;
                self.tos = ch;
                Ok(None)
            }
            TRAP_PUT_CHAR => {
                let ch = self.tos as u8 as char;
                self.tos = self.pop()?;
                self.output.push(ch);
                if ch == '\n' || self.output.len() >= PRINT_BUFFER {
                    return Ok(self.flush());
                }
                Ok(None)
            }
            _ => Err(self.fault("UNDEFINED TRAP")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ErrorCode;
    use crate::mach::{Assembler, HEADER_SIZE};

    fn image(lines: &[&str]) -> Runtime {
        let mut asm = Assembler::new();
        for line in lines {
            asm.assemble_line(line).unwrap();
        }
        let mut bytes = vec![0, 0, 0, HEADER_SIZE as u8, 0, 0, 0, 16];
        bytes.extend(asm.finish());
        Runtime::new(Program::from_image(bytes).unwrap())
    }

    fn run(runtime: &mut Runtime) -> Event {
        loop {
            match runtime.execute(1000) {
                Event::Print(_) | Event::Running => continue,
                event => return event,
            }
        }
    }

    #[test]
    fn test_binary_operand_order() {
        let mut r = image(&["SLIT 7", "SLIT 2", "SUB", "SLIT 3", "DIV", "HALT"]);
        assert_eq!(run(&mut r), Event::Stopped);
        assert_eq!(r.tos(), 1);
        assert_eq!(r.sp(), 15);
    }

    #[test]
    fn test_division_by_zero_is_zero() {
        let mut r = image(&["SLIT 7", "SLIT 0", "DIV", "SLIT 9", "SLIT 0", "REM", "ADD", "HALT"]);
        assert_eq!(run(&mut r), Event::Stopped);
        assert_eq!(r.tos(), 0);
    }

    #[test]
    fn test_short_circuit_keeps_value() {
        // 5 OR 9 leaves 5; 0 OR 9 leaves 9
        let mut r = image(&["SLIT 5", "BRTSC 2", "SLIT 9", "HALT"]);
        run(&mut r);
        assert_eq!(r.tos(), 5);
        assert_eq!(r.sp(), 15);
        let mut r = image(&["SLIT 0", "BRTSC 2", "SLIT 9", "HALT"]);
        run(&mut r);
        assert_eq!(r.tos(), 9);
        assert_eq!(r.sp(), 15);
    }

    #[test]
    fn test_call_frame_discipline() {
        // main: FRAME 1, push 7, call f, clean up, halt
        // f at 26: FRAME 3, return argument
        let mut r = image(&[
            "FRAME 1", "SLIT 7", "LIT 26", "PUSHJ", "CLEAN 1", "NATIVE 0", "HALT", "FRAME 3",
            "LREF 0", "RETURN",
        ]);
        assert_eq!(run(&mut r), Event::Stopped);
        assert_eq!(r.tos(), 7);
        assert_eq!(r.fp(), 16);
        assert_eq!(r.sp(), 14);
    }

    #[test]
    fn test_putchar_prints_lines() {
        let mut r = image(&["SLIT 72", "TRAP 1", "SLIT 10", "TRAP 1", "SLIT 105", "TRAP 1", "HALT"]);
        assert_eq!(r.execute(100), Event::Print("H\n".to_string()));
        assert_eq!(r.execute(100), Event::Print("i".to_string()));
        assert_eq!(r.execute(100), Event::Stopped);
        assert_eq!(r.execute(100), Event::Stopped);
    }

    #[test]
    fn test_getchar_waits_for_input() {
        let mut r = image(&["TRAP 0", "TRAP 0", "TRAP 0", "HALT"]);
        assert_eq!(r.execute(100), Event::Input);
        assert_eq!(r.execute(100), Event::Input);
        r.enter("A");
        r.close_input();
        assert_eq!(r.execute(100), Event::Stopped);
        assert_eq!(r.tos(), -1);
        assert_eq!(r.sp(), 13);
    }

    #[test]
    fn test_faults() {
        let mut r = image(&["DROP", "HALT"]);
        match r.execute(10) {
            Event::Errors(e) => {
                assert!(e.is(ErrorCode::RuntimeFault));
                assert_eq!(e.address(), Some(HEADER_SIZE));
            }
            e => panic!("{:?}", e),
        }
        assert_eq!(r.execute(10), Event::Stopped);
        let mut r = image(&["TRAP 9"]);
        assert!(matches!(r.execute(10), Event::Errors(_)));
        let mut r = image(&["LIT 100000", "LOAD", "HALT"]);
        match r.execute(10) {
            Event::Errors(e) => assert_eq!(
                e.to_string(),
                "RUNTIME FAULT AT 000D; ADDRESS OUT OF RANGE"
            ),
            e => panic!("{:?}", e),
        }
        let mut r = image(&["BR -100"]);
        assert!(matches!(r.execute(10), Event::Errors(_)));
        let mut r = image(&["DUP", "BR -6"]);
        assert!(matches!(run(&mut r), Event::Errors(_)));
    }

    #[test]
    fn test_interrupt() {
        let mut r = image(&["BR -5"]);
        assert_eq!(r.execute(10), Event::Running);
        r.interrupt();
        match r.execute(10) {
            Event::Errors(e) => assert!(e.is(ErrorCode::Break)),
            e => panic!("{:?}", e),
        }
        assert_eq!(r.execute(10), Event::Stopped);
        r.restart();
        assert_eq!(r.execute(10), Event::Running);
    }
}
