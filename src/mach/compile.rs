use super::{
    codegen, place_symbol, Address, Arena, CodeRange, Program, StorageClass, SymbolTable,
    HEADER_SIZE, WORD_SIZE,
};
use crate::error;
use crate::lang::{ast, Error, LineSource, Parser};
use std::collections::HashMap;
use std::convert::TryFrom;
use tracing::{debug, warn};

type Result<T> = std::result::Result<T, Error>;

/// Console helpers compiled ahead of every program. `PRINT` is lowered
/// to calls of these.
pub const PRELUDE: &str = r#"' Console helpers
FUNCTION putChar(ch)
ASM
LREF 0
TRAP 1
END ASM
END FUNCTION

FUNCTION getChar()
ASM
TRAP 0
RETURN
END ASM
END FUNCTION

FUNCTION peekByte(addr)
ASM
LREF 0
LOADB
RETURN
END ASM
END FUNCTION

FUNCTION printStr(s)
DIM c
DO
    c = peekByte(s)
    IF c = 0 THEN RETURN
    putChar(c)
    s = s + 1
LOOP
END FUNCTION

FUNCTION printInt(n)
IF n < 0 THEN
    putChar(45)
    IF n <= -10 THEN printInt(-(n / 10))
    putChar(48 - n MOD 10)
ELSE
    IF n >= 10 THEN printInt(n / 10)
    putChar(48 + n MOD 10)
END IF
END FUNCTION

FUNCTION printTab()
putChar(9)
END FUNCTION

FUNCTION printNL()
putChar(10)
END FUNCTION
"#;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Bytes shared by the image and the compiler's own records.
    pub arena_size: usize,
    /// Operand stack size in words.
    pub stack_size: usize,
    /// Open blocks allowed at once.
    pub max_nesting: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            arena_size: 32 * 1024,
            stack_size: 256,
            max_nesting: 10,
        }
    }
}

pub fn compile(source: &str) -> Result<Program> {
    compile_with(&Config::default(), source)
}

pub fn compile_with(config: &Config, source: &str) -> Result<Program> {
    let mut compiler = Compiler::new(config)?;
    compiler.parse(&mut PRELUDE.lines())?;
    compiler.parse(&mut source.lines())?;
    compiler.finish()
}

/// ## Compilation state
///
/// Lives across every source fed to it. Each source gets its own
/// `Parser`, so line numbers restart, but symbols, string literals and
/// the main program carry over.

#[derive(Debug)]
pub struct Compiler {
    pub(crate) config: Config,
    pub(crate) arena: Arena,
    pub(crate) globals: SymbolTable,
    pub(crate) main: ast::Function,
    strings: HashMap<String, Address>,
    code: Vec<CodeRange>,
}

impl Compiler {
    pub fn new(config: &Config) -> Result<Compiler> {
        let mut arena = Arena::new(config.arena_size);
        arena.alloc_low(HEADER_SIZE)?;
        Ok(Compiler {
            config: config.clone(),
            arena,
            globals: SymbolTable::new(),
            main: ast::Function::new(None),
            strings: HashMap::new(),
            code: vec![],
        })
    }

    pub fn parse(&mut self, source: &mut dyn LineSource) -> Result<()> {
        Parser::new(self, source).parse()
    }

    pub fn globals(&self) -> &SymbolTable {
        &self.globals
    }

    /// Address of a NUL terminated copy of `s` in the image. Equal
    /// literals share storage.
    pub(crate) fn intern(&mut self, s: &str) -> Result<i32> {
        if let Some(addr) = self.strings.get(s) {
            return Ok(*addr as i32);
        }
        let addr = self.arena.alloc_low(s.len() + 1)?;
        self.arena.write_bytes(addr, s.as_bytes())?;
        self.strings.insert(s.to_string(), addr);
        Ok(addr as i32)
    }

    pub(crate) fn generate(&mut self, function: &ast::Function) -> Result<Address> {
        let entry = codegen(&mut self.arena, &mut self.globals, function)?;
        let name = match function.symbol.and_then(|id| self.globals.get(id)) {
            Some(sym) => sym.name.clone(),
            None => "main".to_string(),
        };
        debug!(%name, entry, len = self.arena.low() - entry, "generated");
        self.code.push(CodeRange {
            name,
            start: entry,
            end: self.arena.low(),
        });
        Ok(entry)
    }

    /// Generate the main program, give storage to every global variable
    /// still without it, and seal the header.
    pub fn finish(mut self) -> Result<Program> {
        let main = std::mem::take(&mut self.main);
        let entry = self.generate(&main)?;
        for id in 0..self.globals.len() {
            let sym = match self.globals.get(id) {
                Some(sym) => sym,
                None => continue,
            };
            let unresolved = |error: Error| {
                warn!(name = %sym.name, %error, "unresolved symbol");
                match &sym.first_use {
                    Some((line_number, col)) => error.in_line_number(*line_number).in_column(col),
                    None => error,
                }
            };
            let (class, placed) = (sym.class, sym.placed);
            match class {
                StorageClass::Variable if !placed => {
                    let addr = self.arena.alloc_low(WORD_SIZE)?;
                    place_symbol(&mut self.arena, &mut self.globals, id, addr as i32)?;
                }
                StorageClass::Function if !placed => {
                    return Err(unresolved(error!(UndefinedFunction)))
                }
                StorageClass::Unknown => {
                    return Err(unresolved(error!(UndefinedFunction; "UNRESOLVED SYMBOL")))
                }
                _ => {}
            }
        }
        let stack_size = match i32::try_from(self.config.stack_size) {
            Ok(size) if size > 0 => size,
            _ => return Err(error!(Overflow; "INVALID STACK SIZE")),
        };
        self.arena.write_word(0, entry as i32)?;
        self.arena.write_word(WORD_SIZE, stack_size)?;
        debug!(
            entry,
            bytes = self.arena.low(),
            available = self.arena.available(),
            "sealed image"
        );
        Program::new(self.arena.image(), self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ErrorCode;

    #[test]
    fn test_prelude_defines_helpers() {
        let mut c = Compiler::new(&Config::default()).unwrap();
        c.parse(&mut PRELUDE.lines()).unwrap();
        for name in &["putChar", "getChar", "printStr", "printInt", "printTab", "printNL"] {
            let id = c.globals().find(name).unwrap();
            let sym = c.globals().get(id).unwrap();
            assert!(sym.is_function() && sym.placed, "{}", name);
        }
    }

    #[test]
    fn test_header_points_at_main() {
        let program = compile("X = 1").unwrap();
        let main = program.code().last().unwrap();
        assert_eq!(main.name, "main");
        assert_eq!(program.entry(), main.start);
        assert_eq!(program.stack_size(), 256);
    }

    #[test]
    fn test_globals_get_storage() {
        let mut c = Compiler::new(&Config::default()).unwrap();
        c.parse(&mut "A = 1\nB = A".lines()).unwrap();
        let program = c.finish().unwrap();
        assert!(program.len() % WORD_SIZE == 0);
    }

    #[test]
    fn test_undefined_function() {
        let e = compile("X = F(1)").unwrap_err();
        assert!(e.is(ErrorCode::UndefinedFunction));
    }

    #[test]
    fn test_undefined_function_points_at_first_call() {
        let e = compile("X = 1\nPRINT nothing(1)\nPRINT nothing(2)").unwrap_err();
        assert!(e.is(ErrorCode::UndefinedFunction));
        assert_eq!(e.line_number(), Some(2));
        assert_eq!(e.column(), 6..13);
        assert_eq!(e.to_string(), "UNDEFINED FUNCTION IN 2 (6..13)");
    }

    #[test]
    fn test_out_of_memory() {
        let config = Config {
            arena_size: 256,
            ..Config::default()
        };
        let e = compile_with(&config, "PRINT 1").unwrap_err();
        assert!(e.is(ErrorCode::OutOfMemory) || e.is(ErrorCode::BytecodeOverflow));
    }

    #[test]
    fn test_string_interning() {
        let mut c = Compiler::new(&Config::default()).unwrap();
        let a = c.intern("abc").unwrap();
        let b = c.intern("abc").unwrap();
        assert_eq!(a, b);
        assert_eq!(c.arena.byte(a as usize + 3), Some(0));
    }
}
