use super::Column;
use crate::mach::{StorageClass, SymbolId, SymbolTable};

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    Let(Column, Expression, Expression),
    If(Column, Expression, Vec<Statement>, Vec<Statement>),
    For(Column, For),
    DoWhile(Column, Expression, Vec<Statement>),
    DoUntil(Column, Expression, Vec<Statement>),
    Loop(Column, Vec<Statement>),
    LoopWhile(Column, Expression, Vec<Statement>),
    LoopUntil(Column, Expression, Vec<Statement>),
    Return(Column, Option<Expression>),
    End(Column),
    Call(Column, Expression),
    Asm(Column, Vec<u8>),
}

#[derive(Debug, PartialEq, Clone)]
pub struct For {
    pub var: Expression,
    pub from: Expression,
    pub to: Expression,
    pub step: Option<Expression>,
    pub body: Vec<Statement>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Integer(Column, i32),
    /// Image address of an interned string literal.
    String(Column, i32),
    Global(Column, SymbolId),
    Argument(Column, usize),
    Local(Column, usize),
    Unary(Column, UnaryOp, Box<Expression>),
    Binary(Column, BinaryOp, Box<Expression>, Box<Expression>),
    Index(Column, Box<Expression>, Box<Expression>),
    Call(Column, Box<Expression>, Vec<Expression>),
    Disjunction(Column, Vec<Expression>),
    Conjunction(Column, Vec<Expression>),
}

impl Expression {
    pub fn column(&self) -> Column {
        use Expression::*;
        match self {
            Integer(col, ..)
            | String(col, ..)
            | Global(col, ..)
            | Argument(col, ..)
            | Local(col, ..)
            | Unary(col, ..)
            | Binary(col, ..)
            | Index(col, ..)
            | Call(col, ..)
            | Disjunction(col, ..)
            | Conjunction(col, ..) => col.clone(),
        }
    }

    pub fn integer(&self) -> Option<i32> {
        match self {
            Expression::Integer(_, n) => Some(*n),
            _ => None,
        }
    }

    /// True when both refer to the same variable, wherever they appear.
    pub fn same_variable(&self, other: &Expression) -> bool {
        use Expression::*;
        match (self, other) {
            (Global(_, a), Global(_, b)) => a == b,
            (Argument(_, a), Argument(_, b)) => a == b,
            (Local(_, a), Local(_, b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn fold(self, n: i32) -> i32 {
        match self {
            UnaryOp::Neg => n.wrapping_neg(),
            UnaryOp::Not => (n == 0) as i32,
            UnaryOp::BitNot => !n,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum BinaryOp {
    BitXor,
    BitOr,
    BitAnd,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    GreaterEqual,
    Greater,
    ShiftLeft,
    ShiftRight,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
}

impl BinaryOp {
    /// Evaluate with literal operands. `None` means division by zero.
    pub fn fold(self, a: i32, b: i32) -> Option<i32> {
        use BinaryOp::*;
        Some(match self {
            BitXor => a ^ b,
            BitOr => a | b,
            BitAnd => a & b,
            Equal => (a == b) as i32,
            NotEqual => (a != b) as i32,
            Less => (a < b) as i32,
            LessEqual => (a <= b) as i32,
            GreaterEqual => (a >= b) as i32,
            Greater => (a > b) as i32,
            ShiftLeft => a.wrapping_shl(b as u32),
            ShiftRight => a.wrapping_shr(b as u32),
            Add => a.wrapping_add(b),
            Subtract => a.wrapping_sub(b),
            Multiply => a.wrapping_mul(b),
            Divide | Modulus if b == 0 => return None,
            Divide => a.wrapping_div(b),
            Modulus => a.wrapping_rem(b),
        })
    }
}

/// A function under construction, or finished and waiting for code.
/// The main program is a function without a symbol.
#[derive(Debug, Default, Clone)]
pub struct Function {
    pub symbol: Option<SymbolId>,
    pub arguments: SymbolTable,
    pub locals: SymbolTable,
    pub body: Vec<Statement>,
}

impl Function {
    pub fn new(symbol: Option<SymbolId>) -> Function {
        Function {
            symbol,
            ..Function::default()
        }
    }

    /// Frame cells needed for locals. Local constants take none.
    pub fn local_cells(&self) -> usize {
        self.locals
            .iter()
            .filter(|(_, sym)| sym.class == StorageClass::Variable)
            .count()
    }
}
