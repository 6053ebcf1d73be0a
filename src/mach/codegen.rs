use super::{
    link::displacement, Address, Arena, Label, Opcode, StorageClass, SymbolId, SymbolTable,
    WORD_SIZE,
};
use crate::error;
use crate::lang::ast::{self, BinaryOp, Expression, Statement, UnaryOp};
use crate::lang::Error;
use std::convert::TryFrom;
use tracing::trace;

type Result<T> = std::result::Result<T, Error>;

/// Offset of the saved frame pointer from `fp`.
pub const F_FP: i32 = -1;
/// Cells the frame reserves before the first local.
pub const F_SIZE: i32 = 1;

/// Generate one function into the arena and return its entry address.
/// Named functions are placed at their entry before the body is
/// generated so recursive calls resolve without a fixup.
pub fn codegen(
    arena: &mut Arena,
    globals: &mut SymbolTable,
    function: &ast::Function,
) -> Result<Address> {
    let mut gen = Generator {
        arena,
        globals,
        argc: function.arguments.len(),
        main: function.symbol.is_none(),
    };
    gen.function(function)
}

/// ## Partial value
///
/// What an expression leaves behind before the generator knows whether
/// it will be read or written. Loading or storing finishes the job.

#[derive(Debug, Clone, Copy, PartialEq)]
enum PVal {
    Global(SymbolId),
    Frame(i8),
    Index,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Intent {
    Load,
    Store,
}

struct Generator<'a> {
    arena: &'a mut Arena,
    globals: &'a mut SymbolTable,
    argc: usize,
    main: bool,
}

impl<'a> Generator<'a> {
    fn function(&mut self, function: &ast::Function) -> Result<Address> {
        let entry = self.addr();
        if let Some(symbol) = function.symbol {
            place_symbol(self.arena, self.globals, symbol, entry as i32)?;
        }
        let frame = F_SIZE as usize + function.local_cells();
        let frame = match u8::try_from(frame) {
            Ok(n) if frame as i32 - 1 + F_SIZE <= 128 => n,
            _ => return Err(error!(Overflow; "TOO MANY LOCAL VARIABLES")),
        };
        self.op(Opcode::Frame)?;
        self.byte(frame)?;
        self.statements(&function.body)?;
        self.op(if self.main {
            Opcode::Halt
        } else {
            Opcode::Returnz
        })?;
        trace!(entry, end = self.addr(), "generated function");
        Ok(entry)
    }

    fn statements(&mut self, statements: &[Statement]) -> Result<()> {
        for statement in statements {
            self.statement(statement)?;
        }
        Ok(())
    }

    fn statement(&mut self, statement: &Statement) -> Result<()> {
        use Statement::*;
        match statement {
            Let(col, lhs, rhs) => {
                self.rvalue(rhs)?;
                let pv = self.expr(lhs)?;
                self.pval(pv, Intent::Store)
                    .map_err(|e| e.in_column(col))
            }
            If(_, test, then, otherwise) => self.r#if(test, then, otherwise),
            For(_, f) => self.r#for(f),
            DoWhile(_, test, body) => self.r#do(test, body, Opcode::Brt),
            DoUntil(_, test, body) => self.r#do(test, body, Opcode::Brf),
            Loop(_, body) => {
                let top = self.addr();
                self.statements(body)?;
                self.branch_back(Opcode::Br, top)
            }
            LoopWhile(_, test, body) => self.r#loop(test, body, Opcode::Brt),
            LoopUntil(_, test, body) => self.r#loop(test, body, Opcode::Brf),
            Return(_, Some(expr)) => {
                self.rvalue(expr)?;
                self.op(if self.main {
                    Opcode::Halt
                } else {
                    Opcode::Return
                })
            }
            Return(_, None) => self.op(if self.main {
                Opcode::Halt
            } else {
                Opcode::Returnz
            }),
            End(_) => self.op(Opcode::Halt),
            Call(_, expr) => {
                self.rvalue(expr)?;
                self.op(Opcode::Drop)
            }
            Asm(_, bytes) => self.arena.push_bytes(bytes).map(|_| ()),
        }
    }

    fn r#if(&mut self, test: &Expression, then: &[Statement], otherwise: &[Statement]) -> Result<()> {
        let mut nxt = Label::new();
        let mut end = Label::new();
        self.rvalue(test)?;
        self.branch(Opcode::Brf, &mut nxt)?;
        self.statements(then)?;
        self.branch(Opcode::Br, &mut end)?;
        self.fixup(&mut nxt)?;
        self.statements(otherwise)?;
        self.fixup(&mut end)
    }

    fn r#for(&mut self, f: &ast::For) -> Result<()> {
        let mut upd = Label::new();
        self.rvalue(&f.from)?;
        self.branch(Opcode::Br, &mut upd)?;
        let nxt = self.addr();
        self.statements(&f.body)?;
        self.rvalue(&f.var)?;
        match &f.step {
            Some(step) => self.rvalue(step)?,
            None => self.literal(1)?,
        }
        self.op(Opcode::Add)?;
        self.fixup(&mut upd)?;
        self.op(Opcode::Dup)?;
        let pv = self.expr(&f.var)?;
        self.pval(pv, Intent::Store)?;
        self.rvalue(&f.to)?;
        let descending = matches!(f.step.as_ref().and_then(|s| s.integer()), Some(n) if n < 0);
        self.op(if descending { Opcode::Ge } else { Opcode::Le })?;
        self.branch_back(Opcode::Brt, nxt)
    }

    fn r#do(&mut self, test: &Expression, body: &[Statement], op: Opcode) -> Result<()> {
        let mut test_label = Label::new();
        self.branch(Opcode::Br, &mut test_label)?;
        let top = self.addr();
        self.statements(body)?;
        self.fixup(&mut test_label)?;
        self.rvalue(test)?;
        self.branch_back(op, top)
    }

    fn r#loop(&mut self, test: &Expression, body: &[Statement], op: Opcode) -> Result<()> {
        let top = self.addr();
        self.statements(body)?;
        self.rvalue(test)?;
        self.branch_back(op, top)
    }

    fn rvalue(&mut self, expr: &Expression) -> Result<()> {
        let pv = self.expr(expr)?;
        self.pval(pv, Intent::Load)
    }

    /// Emit everything an expression needs short of the final load or
    /// store.
    fn expr(&mut self, expr: &Expression) -> Result<PVal> {
        use Expression::*;
        match expr {
            Integer(_, n) => {
                self.literal(*n)?;
                Ok(PVal::Value)
            }
            String(_, addr) => {
                self.op(Opcode::Lit)?;
                self.word(*addr)?;
                Ok(PVal::Value)
            }
            Global(col, id) => self.global(*id).map_err(|e| e.in_column(col)),
            Argument(col, index) => {
                let offset = self.argc as i32 - 1 - *index as i32;
                frame_offset(offset).map_err(|e| e.in_column(col))
            }
            Local(col, index) => {
                let offset = F_FP - F_SIZE - *index as i32;
                frame_offset(offset).map_err(|e| e.in_column(col))
            }
            Unary(_, op, expr) => {
                self.rvalue(expr)?;
                self.op(match op {
                    UnaryOp::Neg => Opcode::Neg,
                    UnaryOp::Not => Opcode::Not,
                    UnaryOp::BitNot => Opcode::Bnot,
                })?;
                Ok(PVal::Value)
            }
            Binary(_, op, lhs, rhs) => {
                self.rvalue(lhs)?;
                self.rvalue(rhs)?;
                self.op(binary_opcode(*op))?;
                Ok(PVal::Value)
            }
            Index(_, array, index) => {
                self.rvalue(array)?;
                self.rvalue(index)?;
                self.op(Opcode::Index)?;
                Ok(PVal::Index)
            }
            Call(col, callee, args) => {
                for arg in args {
                    self.rvalue(arg)?;
                }
                self.rvalue(callee)?;
                self.op(Opcode::Pushj)?;
                if !args.is_empty() {
                    match u8::try_from(args.len()) {
                        Ok(n) => {
                            self.op(Opcode::Clean)?;
                            self.byte(n)?;
                        }
                        Err(_) => return Err(error!(Overflow, ..col; "TOO MANY ARGUMENTS")),
                    }
                }
                Ok(PVal::Value)
            }
            Disjunction(_, exprs) => {
                self.short_circuit(Opcode::Brtsc, exprs)?;
                Ok(PVal::Value)
            }
            Conjunction(_, exprs) => {
                self.short_circuit(Opcode::Brfsc, exprs)?;
                Ok(PVal::Value)
            }
        }
    }

    fn global(&mut self, id: SymbolId) -> Result<PVal> {
        let sym = match self.globals.get(id) {
            Some(sym) => sym,
            None => return Err(error!(InternalError; "NO SUCH SYMBOL")),
        };
        match sym.class {
            StorageClass::Variable if !sym.is_array() => Ok(PVal::Global(id)),
            StorageClass::Variable | StorageClass::Function => {
                self.symbol_ref(id)?;
                Ok(PVal::Value)
            }
            StorageClass::Constant => {
                let value = sym.value;
                self.literal(value)?;
                Ok(PVal::Value)
            }
            StorageClass::Unknown => Err(error!(UndefinedFunction; "UNRESOLVED SYMBOL")),
        }
    }

    fn pval(&mut self, pv: PVal, intent: Intent) -> Result<()> {
        match (pv, intent) {
            (PVal::Global(id), _) => {
                self.symbol_ref(id)?;
                self.op(match intent {
                    Intent::Load => Opcode::Load,
                    Intent::Store => Opcode::Store,
                })
            }
            (PVal::Frame(offset), _) => {
                self.op(match intent {
                    Intent::Load => Opcode::Lref,
                    Intent::Store => Opcode::Lset,
                })?;
                self.byte(offset as u8)
            }
            (PVal::Index, Intent::Load) => self.op(Opcode::Load),
            (PVal::Index, Intent::Store) => self.op(Opcode::Store),
            (PVal::Value, Intent::Load) => Ok(()),
            (PVal::Value, Intent::Store) => Err(error!(InvalidAssignment)),
        }
    }

    fn short_circuit(&mut self, op: Opcode, exprs: &[Expression]) -> Result<()> {
        let mut end = Label::new();
        let mut exprs = exprs.iter();
        if let Some(first) = exprs.next() {
            self.rvalue(first)?;
        }
        for expr in exprs {
            self.branch(op, &mut end)?;
            self.rvalue(expr)?;
        }
        self.fixup(&mut end)
    }

    /// `LIT` of a global's address, or a placeholder until it is placed.
    fn symbol_ref(&mut self, id: SymbolId) -> Result<()> {
        self.op(Opcode::Lit)?;
        let (placed, value) = match self.globals.get(id) {
            Some(sym) => (sym.placed, sym.value),
            None => return Err(error!(InternalError; "NO SUCH SYMBOL")),
        };
        if placed {
            self.word(value)
        } else {
            let site = self.word(0).map(|_| self.addr() - WORD_SIZE)?;
            if let Some(sym) = self.globals.get_mut(id) {
                sym.fixups.push(site);
            }
            Ok(())
        }
    }

    fn literal(&mut self, n: i32) -> Result<()> {
        match i8::try_from(n) {
            Ok(b) => {
                self.op(Opcode::Slit)?;
                self.byte(b as u8)
            }
            Err(_) => {
                self.op(Opcode::Lit)?;
                self.word(n)
            }
        }
    }

    fn branch(&mut self, op: Opcode, label: &mut Label) -> Result<()> {
        self.op(op)?;
        self.word(0)?;
        label.add_site(self.addr() - WORD_SIZE);
        Ok(())
    }

    fn branch_back(&mut self, op: Opcode, target: Address) -> Result<()> {
        self.op(op)?;
        let site = self.addr();
        self.word(displacement(site, target))
    }

    fn fixup(&mut self, label: &mut Label) -> Result<()> {
        let here = self.addr();
        label.fixup(self.arena, here)
    }

    fn addr(&self) -> Address {
        self.arena.low()
    }

    fn op(&mut self, op: Opcode) -> Result<()> {
        self.byte(op as u8)
    }

    fn byte(&mut self, b: u8) -> Result<()> {
        self.arena.push_bytes(&[b]).map(|_| ())
    }

    fn word(&mut self, w: i32) -> Result<()> {
        self.arena.push_bytes(&w.to_be_bytes()).map(|_| ())
    }
}

fn frame_offset(offset: i32) -> Result<PVal> {
    match i8::try_from(offset) {
        Ok(offset) => Ok(PVal::Frame(offset)),
        Err(_) => Err(error!(Overflow; "FRAME OFFSET OUT OF RANGE")),
    }
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    use BinaryOp::*;
    match op {
        BitXor => Opcode::Bxor,
        BitOr => Opcode::Bor,
        BitAnd => Opcode::Band,
        Equal => Opcode::Eq,
        NotEqual => Opcode::Ne,
        Less => Opcode::Lt,
        LessEqual => Opcode::Le,
        GreaterEqual => Opcode::Ge,
        Greater => Opcode::Gt,
        ShiftLeft => Opcode::Shl,
        ShiftRight => Opcode::Shr,
        Add => Opcode::Add,
        Subtract => Opcode::Sub,
        Multiply => Opcode::Mul,
        Divide => Opcode::Div,
        Modulus => Opcode::Rem,
    }
}

/// Resolve a global to its final value and patch every site that
/// referenced it early. Placing a symbol twice is a duplicate
/// definition.
pub fn place_symbol(
    arena: &mut Arena,
    globals: &mut SymbolTable,
    id: SymbolId,
    value: i32,
) -> Result<()> {
    let sym = match globals.get_mut(id) {
        Some(sym) => sym,
        None => return Err(error!(InternalError; "NO SUCH SYMBOL")),
    };
    if sym.placed {
        return Err(error!(DuplicateDefinition));
    }
    for site in sym.fixups.drain(..) {
        arena.write_word(site, value)?;
    }
    sym.placed = true;
    sym.value = value;
    trace!(name = %sym.name, value, "placed symbol");
    Ok(())
}
