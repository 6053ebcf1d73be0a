use super::ast::{self, BinaryOp, Expression, Statement, UnaryOp};
use super::{token::*, Column, Error, LineSource, Scanner};
use crate::mach::{
    place_symbol, Assembler, Compiler, Mark, Stack, StorageClass, SymbolId, Type, WORD_SIZE,
};
use tracing::debug;

type Result<T> = std::result::Result<T, Error>;

/// High memory charged for each tree node.
const NODE_SIZE: usize = 4 * WORD_SIZE;
/// High memory charged for each symbol, plus its name.
const SYMBOL_SIZE: usize = 4 * WORD_SIZE;

/// Binary operators from loosest to tightest binding.
const LEVELS: &[&[(Operator, BinaryOp)]] = &[
    &[(Operator::Caret, BinaryOp::BitXor)],
    &[(Operator::Pipe, BinaryOp::BitOr)],
    &[(Operator::Ampersand, BinaryOp::BitAnd)],
    &[
        (Operator::Equal, BinaryOp::Equal),
        (Operator::NotEqual, BinaryOp::NotEqual),
    ],
    &[
        (Operator::Less, BinaryOp::Less),
        (Operator::LessEqual, BinaryOp::LessEqual),
        (Operator::GreaterEqual, BinaryOp::GreaterEqual),
        (Operator::Greater, BinaryOp::Greater),
    ],
    &[
        (Operator::ShiftLeft, BinaryOp::ShiftLeft),
        (Operator::ShiftRight, BinaryOp::ShiftRight),
    ],
    &[
        (Operator::Plus, BinaryOp::Add),
        (Operator::Minus, BinaryOp::Subtract),
    ],
    &[
        (Operator::Multiply, BinaryOp::Multiply),
        (Operator::Divide, BinaryOp::Divide),
        (Operator::Modulus, BinaryOp::Modulus),
    ],
];

#[derive(Debug)]
enum Block {
    Function,
    If {
        col: Column,
        arms: Vec<(Expression, Vec<Statement>)>,
        otherwise: Option<Vec<Statement>>,
    },
    For {
        col: Column,
        var: Expression,
        from: Expression,
        to: Expression,
        step: Option<Expression>,
        body: Vec<Statement>,
    },
    Do {
        col: Column,
        test: Option<(Word, Expression)>,
        body: Vec<Statement>,
    },
}

impl Block {
    fn unclosed(&self) -> Error {
        match self {
            Block::Function => error!(FunctionWithoutEnd),
            Block::If { .. } => error!(IfWithoutEndIf),
            Block::For { .. } => error!(ForWithoutNext),
            Block::Do { .. } => error!(DoWithoutLoop),
        }
    }
}

/// ## Single pass parser
///
/// Reads one source through a `Scanner`, resolving identifiers and
/// folding constants as it goes. Statements land in the innermost open
/// block. A function is handed to the code generator as soon as its
/// `END FUNCTION` is read; the main program waits in the compiler until
/// every source has been parsed.

pub struct Parser<'a> {
    c: &'a mut Compiler,
    scan: Scanner<'a>,
    blocks: Stack<Block>,
    function: Option<(ast::Function, Mark)>,
    asm: Option<(Column, Assembler)>,
}

impl<'a> Parser<'a> {
    pub fn new(compiler: &'a mut Compiler, source: &'a mut dyn LineSource) -> Parser<'a> {
        let max_nesting = compiler.config.max_nesting;
        Parser {
            c: compiler,
            scan: Scanner::new(source),
            blocks: Stack::new(max_nesting, error!(TooDeeplyNested)),
            function: None,
            asm: None,
        }
    }

    pub fn parse(mut self) -> Result<()> {
        while self.scan.get_line() {
            let line_number = self.scan.line_number();
            self.line().map_err(|e| e.in_line_number(line_number))?;
        }
        let line_number = self.scan.line_number();
        self.finish().map_err(|e| e.in_line_number(line_number))
    }

    fn line(&mut self) -> Result<()> {
        if self.asm.is_some() {
            return self.asm_line();
        }
        match self.scan.next() {
            None => Ok(()),
            Some(token) => self.statement(token),
        }
    }

    fn finish(&mut self) -> Result<()> {
        if self.asm.is_some() {
            return Err(error!(SyntaxError; "ASM WITHOUT END ASM"));
        }
        match self.blocks.last() {
            Some(block) => Err(block.unclosed()),
            None => Ok(()),
        }
    }

    fn asm_line(&mut self) -> Result<()> {
        if self.scan.peek() == Some(&Token::Word(Word::EndAsm)) {
            self.scan.next();
            self.scan.require_eol()?;
            if let Some((col, asm)) = self.asm.take() {
                let bytes = asm.finish();
                self.charge(bytes.len())?;
                self.add(Statement::Asm(col, bytes))?;
            }
            return Ok(());
        }
        let text = self.scan.line_text().to_string();
        match &mut self.asm {
            Some((_, asm)) => asm.assemble_line(&text),
            None => Ok(()),
        }
    }

    fn charge(&mut self, size: usize) -> Result<()> {
        self.c.arena.alloc_high(size).map(|_| ())
    }

    /// Append to the innermost open statement list.
    fn add(&mut self, statement: Statement) -> Result<()> {
        self.charge(NODE_SIZE)?;
        let list = match self.blocks.last_mut() {
            Some(Block::If {
                arms, otherwise, ..
            }) => match otherwise {
                Some(list) => list,
                None => match arms.last_mut() {
                    Some((_, list)) => list,
                    None => return Err(error!(InternalError; "IF WITHOUT ARMS")),
                },
            },
            Some(Block::For { body, .. }) | Some(Block::Do { body, .. }) => body,
            Some(Block::Function) | None => match &mut self.function {
                Some((function, _)) => &mut function.body,
                None => &mut self.c.main.body,
            },
        };
        list.push(statement);
        Ok(())
    }

    fn push_block(&mut self, block: Block, col: &Column) -> Result<()> {
        self.blocks.push(block).map_err(|e| e.in_column(col))
    }

    fn accept(&mut self, token: Token) -> bool {
        if self.scan.peek() == Some(&token) {
            self.scan.next();
            true
        } else {
            false
        }
    }

    fn peek_operator(&mut self) -> Option<Operator> {
        match self.scan.peek() {
            Some(Token::Operator(op)) => Some(*op),
            _ => None,
        }
    }

    fn statement(&mut self, token: Token) -> Result<()> {
        let col = self.scan.column();
        match token {
            Token::Word(word) => self.word(word, col),
            Token::Ident(_) => {
                self.scan.push_back(token);
                self.implied(col)
            }
            Token::Unknown(s) if s.starts_with('"') => {
                Err(error!(SyntaxError, ..&col; "UNTERMINATED STRING"))
            }
            _ => Err(error!(SyntaxError, ..&col; "EXPECTED STATEMENT")),
        }
    }

    fn word(&mut self, word: Word, col: Column) -> Result<()> {
        use Word::*;
        match word {
            Rem1 | Rem2 => Ok(()),
            Function => {
                let name = self.scan.require_ident()?;
                let name_col = self.scan.column();
                self.function(col, &name, name_col)
            }
            Def => self.def(col),
            EndFunction => self.end_function(col),
            Dim => self.dim(),
            Let => {
                let lhs = self.postfix()?;
                self.scan.require(Token::Operator(Operator::Equal))?;
                self.assignment(col, lhs)
            }
            If => self.r#if(col),
            ElseIf => self.else_if(col),
            Else => self.r#else(col),
            EndIf => self.end_if(col),
            For => self.r#for(col),
            Next => self.next(col),
            Do | DoWhile | DoUntil => self.r#do(word, col),
            Loop | LoopWhile | LoopUntil => self.r#loop(word, col),
            Return => self.r#return(col),
            Print => self.print(col),
            End => {
                self.scan.require_eol()?;
                self.add(Statement::End(col))
            }
            Asm => {
                self.scan.require_eol()?;
                self.asm = Some((col, Assembler::new()));
                Ok(())
            }
            EndAsm => Err(error!(SyntaxError, ..&col; "END ASM WITHOUT ASM")),
            Step | Then | To | Until | While => {
                Err(error!(SyntaxError, ..&col; "EXPECTED STATEMENT"))
            }
        }
    }

    /// A statement that starts with an identifier is an assignment or a
    /// call whose result is discarded.
    fn implied(&mut self, col: Column) -> Result<()> {
        let expr = self.postfix()?;
        match self.scan.next() {
            Some(Token::Operator(Operator::Equal)) => self.assignment(col, expr),
            None if matches!(expr, Expression::Call(..)) => self.add(Statement::Call(col, expr)),
            _ => Err(error!(SyntaxError, ..&self.scan.column(); "EXPECTED EQUALS SIGN")),
        }
    }

    fn assignment(&mut self, col: Column, lhs: Expression) -> Result<()> {
        if !self.is_variable(&lhs) && !matches!(lhs, Expression::Index(..)) {
            return Err(error!(InvalidAssignment, ..&lhs.column()));
        }
        let rhs = self.expression()?;
        self.scan.require_eol()?;
        self.add(Statement::Let(col, lhs, rhs))
    }

    fn is_variable(&self, expr: &Expression) -> bool {
        match expr {
            Expression::Argument(..) | Expression::Local(..) => true,
            Expression::Global(_, id) => match self.c.globals.get(*id) {
                Some(sym) => sym.class == StorageClass::Variable && !sym.is_array(),
                None => false,
            },
            _ => false,
        }
    }

    fn def(&mut self, col: Column) -> Result<()> {
        let name = self.scan.require_ident()?;
        let name_col = self.scan.column();
        if self.accept(Token::Operator(Operator::Equal)) {
            return self.constant(&name, name_col);
        }
        self.function(col, &name, name_col)
    }

    fn constant(&mut self, name: &str, col: Column) -> Result<()> {
        let expr = self.expression()?;
        let value = match expr.integer() {
            Some(n) => n,
            None => return Err(error!(SyntaxError, ..&expr.column(); "EXPECTED CONSTANT")),
        };
        self.scan.require_eol()?;
        match &mut self.function {
            Some((function, _)) => {
                if function.locals.find(name).is_some() || function.arguments.find(name).is_some()
                {
                    return Err(error!(DuplicateDefinition, ..&col));
                }
                function
                    .locals
                    .add(name, StorageClass::Constant, Some(Type::Integer), value);
            }
            None => {
                if self.c.globals.find(name).is_some() {
                    return Err(error!(DuplicateDefinition, ..&col));
                }
                self.c
                    .globals
                    .add(name, StorageClass::Constant, Some(Type::Integer), value);
            }
        }
        self.charge(SYMBOL_SIZE + name.len())
    }

    fn function(&mut self, col: Column, name: &str, name_col: Column) -> Result<()> {
        if self.function.is_some() {
            return Err(error!(SyntaxError, ..&col; "NESTED FUNCTION"));
        }
        if !self.blocks.is_empty() {
            return Err(error!(SyntaxError, ..&col; "FUNCTION INSIDE BLOCK"));
        }
        let symbol = self
            .function_symbol(name)
            .map_err(|e| e.in_column(&name_col))?;
        let mark = self.c.arena.mark();
        let mut function = ast::Function::new(Some(symbol));
        if self.accept(Token::LParen) && !self.accept(Token::RParen) {
            loop {
                let arg = self.scan.require_ident()?;
                if function.arguments.find(&arg).is_some() {
                    return Err(error!(DuplicateDefinition, ..&self.scan.column()));
                }
                self.charge(SYMBOL_SIZE + arg.len())?;
                let index = function.arguments.len() as i32;
                function
                    .arguments
                    .add(&arg, StorageClass::Variable, Some(Type::Integer), index);
                match self.scan.next() {
                    Some(Token::Comma) => continue,
                    Some(Token::RParen) => break,
                    _ => {
                        return Err(
                            error!(SyntaxError, ..&self.scan.column(); "EXPECTED RIGHT PARENTHESIS"),
                        )
                    }
                }
            }
        }
        self.scan.require_eol()?;
        self.push_block(Block::Function, &col)?;
        self.function = Some((function, mark));
        Ok(())
    }

    /// Symbol for a function about to be defined. A name that was
    /// called before its definition is reused.
    fn function_symbol(&mut self, name: &str) -> Result<SymbolId> {
        let id = match self.c.globals.find(name) {
            Some(id) => id,
            None => return self.add_global(name, StorageClass::Function, Some(Type::Function)),
        };
        let sym = match self.c.globals.get_mut(id) {
            Some(sym) => sym,
            None => return Err(error!(InternalError; "NO SUCH SYMBOL")),
        };
        match sym.class {
            StorageClass::Unknown => {
                sym.class = StorageClass::Function;
                sym.ty = Some(Type::Function);
                Ok(id)
            }
            StorageClass::Function if !sym.placed => Ok(id),
            StorageClass::Function => Err(error!(DuplicateDefinition)),
            _ => Err(error!(TypeMismatch; "NOT A FUNCTION")),
        }
    }

    fn add_global(&mut self, name: &str, class: StorageClass, ty: Option<Type>) -> Result<SymbolId> {
        self.charge(SYMBOL_SIZE + name.len())?;
        Ok(self.c.globals.add(name, class, ty, 0))
    }

    fn end_function(&mut self, col: Column) -> Result<()> {
        match self.blocks.last() {
            Some(Block::Function) => {}
            Some(block) if self.function.is_some() => return Err(block.unclosed().in_column(&col)),
            _ => return Err(error!(EndWithoutFunction, ..&col)),
        }
        self.scan.require_eol()?;
        self.blocks.pop()?;
        if let Some((function, mark)) = self.function.take() {
            let entry = self.c.generate(&function).map_err(|e| e.in_column(&col))?;
            self.c.arena.reset_high(mark);
            debug!(entry, "function complete");
        }
        Ok(())
    }

    fn dim(&mut self) -> Result<()> {
        loop {
            let name = self.scan.require_ident()?;
            let col = self.scan.column();
            if self.accept(Token::LBracket) {
                let size = self.expression()?;
                let size = match size.integer() {
                    Some(n) if n > 0 => n as usize,
                    _ => {
                        return Err(error!(SyntaxError, ..&size.column(); "INVALID ARRAY SIZE"))
                    }
                };
                self.scan.require(Token::RBracket)?;
                self.dim_array(&name, size).map_err(|e| e.in_column(&col))?;
            } else {
                self.dim_scalar(&name).map_err(|e| e.in_column(&col))?;
            }
            match self.scan.next() {
                Some(Token::Comma) => continue,
                None => return Ok(()),
                Some(_) => return Err(error!(SyntaxError, ..&self.scan.column(); "EXPECTED COMMA")),
            }
        }
    }

    /// Global arrays get zeroed storage right away.
    fn dim_array(&mut self, name: &str, size: usize) -> Result<()> {
        if self.function.is_some() {
            return Err(error!(SyntaxError; "LOCAL ARRAYS ARE NOT SUPPORTED"));
        }
        if self.c.globals.find(name).is_some() {
            return Err(error!(DuplicateDefinition));
        }
        let id = self.add_global(name, StorageClass::Variable, Some(Type::Array))?;
        let bytes = match size.checked_mul(WORD_SIZE) {
            Some(bytes) => bytes,
            None => return Err(error!(OutOfMemory; "ARRAY TOO LARGE")),
        };
        let addr = self.c.arena.alloc_low(bytes)?;
        place_symbol(&mut self.c.arena, &mut self.c.globals, id, addr as i32)
    }

    fn dim_scalar(&mut self, name: &str) -> Result<()> {
        if let Some((function, _)) = &mut self.function {
            if function.locals.find(name).is_some() || function.arguments.find(name).is_some() {
                return Err(error!(DuplicateDefinition));
            }
            let index = function.local_cells() as i32;
            function
                .locals
                .add(name, StorageClass::Variable, Some(Type::Integer), index);
            return self.charge(SYMBOL_SIZE + name.len());
        }
        match self.c.globals.find(name) {
            Some(id) => match self.c.globals.get(id) {
                Some(sym) if sym.class == StorageClass::Variable && !sym.is_array() => Ok(()),
                _ => Err(error!(DuplicateDefinition)),
            },
            None => self
                .add_global(name, StorageClass::Variable, Some(Type::Integer))
                .map(|_| ()),
        }
    }

    fn r#if(&mut self, col: Column) -> Result<()> {
        let test = self.expression()?;
        self.scan.require(Token::Word(Word::Then))?;
        let block = Block::If {
            col: col.clone(),
            arms: vec![(test, vec![])],
            otherwise: None,
        };
        self.push_block(block, &col)?;
        let token = match self.scan.next() {
            Some(token) => token,
            None => return Ok(()),
        };
        let depth = self.blocks.len();
        self.statement(token)?;
        if self.blocks.len() != depth || self.asm.is_some() {
            return Err(error!(SyntaxError, ..&col; "BLOCK STATEMENT IN SINGLE LINE IF"));
        }
        self.close_if()
    }

    fn else_if(&mut self, col: Column) -> Result<()> {
        match self.blocks.last() {
            Some(Block::If {
                otherwise: None, ..
            }) => {}
            _ => return Err(error!(ElseWithoutIf, ..&col)),
        }
        let test = self.expression()?;
        self.scan.require(Token::Word(Word::Then))?;
        self.scan.require_eol()?;
        if let Some(Block::If { arms, .. }) = self.blocks.last_mut() {
            arms.push((test, vec![]));
        }
        Ok(())
    }

    fn r#else(&mut self, col: Column) -> Result<()> {
        self.scan.require_eol()?;
        match self.blocks.last_mut() {
            Some(Block::If { otherwise, .. }) if otherwise.is_none() => {
                *otherwise = Some(vec![]);
                Ok(())
            }
            _ => Err(error!(ElseWithoutIf, ..&col)),
        }
    }

    fn end_if(&mut self, col: Column) -> Result<()> {
        self.scan.require_eol()?;
        match self.blocks.last() {
            Some(Block::If { .. }) => self.close_if(),
            _ => Err(error!(EndIfWithoutIf, ..&col)),
        }
    }

    /// `ELSE IF` arms become nested `If` statements in the else branch.
    fn close_if(&mut self) -> Result<()> {
        let (col, arms, otherwise) = match self.blocks.pop()? {
            Block::If {
                col,
                arms,
                otherwise,
            } => (col, arms, otherwise),
            _ => return Err(error!(InternalError; "EXPECTED IF BLOCK")),
        };
        let mut otherwise = otherwise.unwrap_or_default();
        for (test, then) in arms.into_iter().rev() {
            otherwise = vec![Statement::If(col.clone(), test, then, otherwise)];
        }
        match otherwise.pop() {
            Some(statement) => self.add(statement),
            None => Err(error!(InternalError; "IF WITHOUT ARMS")),
        }
    }

    fn r#for(&mut self, col: Column) -> Result<()> {
        let var = self.loop_variable()?;
        self.scan.require(Token::Operator(Operator::Equal))?;
        let from = self.expression()?;
        self.scan.require(Token::Word(Word::To))?;
        let to = self.expression()?;
        let step = if self.accept(Token::Word(Word::Step)) {
            Some(self.expression()?)
        } else {
            None
        };
        self.scan.require_eol()?;
        let block = Block::For {
            col: col.clone(),
            var,
            from,
            to,
            step,
            body: vec![],
        };
        self.push_block(block, &col)
    }

    fn loop_variable(&mut self) -> Result<Expression> {
        let name = self.scan.require_ident()?;
        let col = self.scan.column();
        let var = self.identifier(&name, col.clone(), false)?;
        if self.is_variable(&var) {
            Ok(var)
        } else {
            Err(error!(TypeMismatch, ..&col; "EXPECTED VARIABLE"))
        }
    }

    fn next(&mut self, col: Column) -> Result<()> {
        let var = self.loop_variable()?;
        self.scan.require_eol()?;
        match self.blocks.last() {
            Some(Block::For { var: open, .. }) if open.same_variable(&var) => {}
            _ => return Err(error!(NextWithoutFor, ..&col)),
        }
        match self.blocks.pop()? {
            Block::For {
                col,
                var,
                from,
                to,
                step,
                body,
            } => self.add(Statement::For(
                col,
                ast::For {
                    var,
                    from,
                    to,
                    step,
                    body,
                },
            )),
            _ => Err(error!(InternalError; "EXPECTED FOR BLOCK")),
        }
    }

    fn r#do(&mut self, word: Word, col: Column) -> Result<()> {
        let test = match word {
            Word::DoWhile => Some((Word::While, self.expression()?)),
            Word::DoUntil => Some((Word::Until, self.expression()?)),
            _ => None,
        };
        self.scan.require_eol()?;
        let block = Block::Do {
            col: col.clone(),
            test,
            body: vec![],
        };
        self.push_block(block, &col)
    }

    fn r#loop(&mut self, word: Word, col: Column) -> Result<()> {
        match self.blocks.last() {
            Some(Block::Do { test, .. }) => {
                if test.is_some() && word != Word::Loop {
                    return Err(error!(SyntaxError, ..&col; "LOOP CONDITION AFTER DO CONDITION"));
                }
            }
            _ => return Err(error!(LoopWithoutDo, ..&col)),
        }
        let cond = match word {
            Word::Loop => None,
            _ => Some(self.expression()?),
        };
        self.scan.require_eol()?;
        let (col, test, body) = match self.blocks.pop()? {
            Block::Do { col, test, body } => (col, test, body),
            _ => return Err(error!(InternalError; "EXPECTED DO BLOCK")),
        };
        let statement = match (test, cond) {
            (Some((Word::While, test)), _) => Statement::DoWhile(col, test, body),
            (Some((_, test)), _) => Statement::DoUntil(col, test, body),
            (None, Some(cond)) if word == Word::LoopWhile => Statement::LoopWhile(col, cond, body),
            (None, Some(cond)) => Statement::LoopUntil(col, cond, body),
            (None, None) => Statement::Loop(col, body),
        };
        self.add(statement)
    }

    fn r#return(&mut self, col: Column) -> Result<()> {
        let value = match self.scan.peek() {
            None => None,
            Some(_) => Some(self.expression()?),
        };
        self.scan.require_eol()?;
        self.add(Statement::Return(col, value))
    }

    /// PRINT becomes a sequence of calls to the console helpers.
    fn print(&mut self, col: Column) -> Result<()> {
        let mut newline = true;
        loop {
            match self.scan.peek() {
                None => break,
                Some(Token::Semicolon) => {
                    self.scan.next();
                    newline = false;
                }
                Some(Token::Comma) => {
                    self.scan.next();
                    self.print_call(&col, "printTab", None)?;
                    newline = false;
                }
                Some(_) => {
                    let expr = self.expression()?;
                    let helper = match expr {
                        Expression::String(..) => "printStr",
                        _ => "printInt",
                    };
                    self.print_call(&col, helper, Some(expr))?;
                    newline = true;
                }
            }
        }
        if newline {
            self.print_call(&col, "printNL", None)?;
        }
        Ok(())
    }

    fn print_call(&mut self, col: &Column, name: &str, arg: Option<Expression>) -> Result<()> {
        let helper = match self.c.globals.find(name) {
            Some(id) if self.c.globals.get(id).map_or(false, |s| s.is_function()) => id,
            _ => return Err(error!(UndefinedFunction, ..col; "PRINT HELPER NOT DEFINED")),
        };
        self.charge(2 * NODE_SIZE)?;
        let callee = Expression::Global(col.clone(), helper);
        let call = Expression::Call(col.clone(), Box::new(callee), arg.into_iter().collect());
        self.add(Statement::Call(col.clone(), call))
    }

    fn expression(&mut self) -> Result<Expression> {
        self.logical(Operator::Or, Parser::conjunction)
    }

    fn conjunction(&mut self) -> Result<Expression> {
        self.logical(Operator::And, |p| p.binary(0))
    }

    /// `OR` and `AND` chains are kept flat. A chain of literals folds to
    /// the operand the short circuit would stop at.
    fn logical(
        &mut self,
        op: Operator,
        operand: fn(&mut Parser<'a>) -> Result<Expression>,
    ) -> Result<Expression> {
        let first = operand(self)?;
        if !self.accept(Token::Operator(op)) {
            return Ok(first);
        }
        let col = self.scan.column();
        let mut list = vec![first];
        loop {
            list.push(operand(self)?);
            if !self.accept(Token::Operator(op)) {
                break;
            }
        }
        let values: Vec<i32> = list.iter().filter_map(Expression::integer).collect();
        if values.len() == list.len() {
            let stops = |n: &i32| (*n != 0) == (op == Operator::Or);
            let value = match values.iter().copied().find(stops) {
                Some(n) => n,
                None => values.last().copied().unwrap_or(0),
            };
            return Ok(Expression::Integer(col, value));
        }
        self.charge(NODE_SIZE)?;
        Ok(match op {
            Operator::Or => Expression::Disjunction(col, list),
            _ => Expression::Conjunction(col, list),
        })
    }

    fn binary(&mut self, level: usize) -> Result<Expression> {
        let ops = match LEVELS.get(level) {
            Some(ops) => *ops,
            None => return self.unary(),
        };
        let mut lhs = self.binary(level + 1)?;
        loop {
            let op = match self.peek_operator() {
                Some(op) => ops.iter().find(|(o, _)| *o == op).map(|(_, b)| *b),
                None => None,
            };
            let op = match op {
                Some(op) => op,
                None => return Ok(lhs),
            };
            self.scan.next();
            let col = self.scan.column();
            let rhs = self.binary(level + 1)?;
            lhs = self.fold_binary(col, op, lhs, rhs)?;
        }
    }

    fn fold_binary(
        &mut self,
        col: Column,
        op: BinaryOp,
        lhs: Expression,
        rhs: Expression,
    ) -> Result<Expression> {
        if let (Some(a), Some(b)) = (lhs.integer(), rhs.integer()) {
            return match op.fold(a, b) {
                Some(n) => Ok(Expression::Integer(col, n)),
                None => Err(error!(DivisionByZero, ..&col)),
            };
        }
        if matches!(op, BinaryOp::Divide | BinaryOp::Modulus) && rhs.integer() == Some(0) {
            return Err(error!(DivisionByZero, ..&col));
        }
        self.charge(NODE_SIZE)?;
        Ok(Expression::Binary(col, op, Box::new(lhs), Box::new(rhs)))
    }

    fn unary(&mut self) -> Result<Expression> {
        let op = match self.peek_operator() {
            Some(Operator::Plus) => {
                self.scan.next();
                return self.unary();
            }
            Some(Operator::Minus) => UnaryOp::Neg,
            Some(Operator::Not) => UnaryOp::Not,
            Some(Operator::Tilde) => UnaryOp::BitNot,
            _ => return self.postfix(),
        };
        self.scan.next();
        let col = self.scan.column();
        let operand = self.unary()?;
        if let Some(n) = operand.integer() {
            return Ok(Expression::Integer(col, op.fold(n)));
        }
        self.charge(NODE_SIZE)?;
        Ok(Expression::Unary(col, op, Box::new(operand)))
    }

    fn postfix(&mut self) -> Result<Expression> {
        let mut expr = self.primary()?;
        loop {
            if self.accept(Token::LParen) {
                let col = self.scan.column();
                self.check_callable(&expr)?;
                let args = self.arguments()?;
                self.charge(NODE_SIZE)?;
                expr = Expression::Call(col, Box::new(expr), args);
            } else if self.accept(Token::LBracket) {
                let col = self.scan.column();
                let index = self.expression()?;
                self.scan.require(Token::RBracket)?;
                self.charge(NODE_SIZE)?;
                expr = Expression::Index(col, Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn check_callable(&self, expr: &Expression) -> Result<()> {
        let callable = match expr {
            Expression::Global(_, id) => self.c.globals.get(*id).map_or(false, |s| s.is_function()),
            Expression::Integer(..)
            | Expression::String(..)
            | Expression::Argument(..)
            | Expression::Local(..) => false,
            _ => true,
        };
        if callable {
            Ok(())
        } else {
            Err(error!(TypeMismatch, ..&expr.column(); "NOT A FUNCTION"))
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expression>> {
        let mut args = vec![];
        if self.accept(Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.scan.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => {
                    return Err(
                        error!(SyntaxError, ..&self.scan.column(); "EXPECTED RIGHT PARENTHESIS"),
                    )
                }
            }
        }
    }

    fn primary(&mut self) -> Result<Expression> {
        self.charge(NODE_SIZE)?;
        let token = self.scan.next();
        let col = self.scan.column();
        match token {
            Some(Token::Literal(Literal::Number(s))) => {
                let n = parse_number(&s).map_err(|e| e.in_column(&col))?;
                Ok(Expression::Integer(col, n))
            }
            Some(Token::Literal(Literal::String(s))) => {
                let addr = self.c.intern(&s)?;
                Ok(Expression::String(col, addr))
            }
            Some(Token::LParen) => {
                let expr = self.expression()?;
                self.scan.require(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Ident(name)) => {
                let call = self.scan.peek() == Some(&Token::LParen);
                self.identifier(&name, col, call)
            }
            Some(Token::Unknown(s)) if s.starts_with('"') => {
                Err(error!(SyntaxError, ..&col; "UNTERMINATED STRING"))
            }
            _ => Err(error!(SyntaxError, ..&col; "EXPECTED EXPRESSION")),
        }
    }

    /// Resolve a name: local, then argument, then global. A global seen
    /// for the first time is a function when called and a variable
    /// otherwise.
    fn identifier(&mut self, name: &str, col: Column, call: bool) -> Result<Expression> {
        if let Some((function, _)) = &self.function {
            if let Some(sym) = function.locals.find(name).and_then(|id| function.locals.get(id)) {
                return Ok(match sym.class {
                    StorageClass::Constant => Expression::Integer(col, sym.value),
                    _ => Expression::Local(col, sym.value as usize),
                });
            }
            if let Some(sym) = function
                .arguments
                .find(name)
                .and_then(|id| function.arguments.get(id))
            {
                return Ok(Expression::Argument(col, sym.value as usize));
            }
        }
        let id = match self.c.globals.find(name) {
            Some(id) => id,
            None => self.add_global(name, StorageClass::Unknown, None)?,
        };
        let line_number = self.scan.line_number();
        let sym = match self.c.globals.get_mut(id) {
            Some(sym) => sym,
            None => return Err(error!(InternalError; "NO SUCH SYMBOL")),
        };
        if !sym.placed && sym.first_use.is_none() {
            sym.first_use = Some((line_number, col.clone()));
        }
        if sym.class == StorageClass::Unknown {
            if call {
                sym.class = StorageClass::Function;
                sym.ty = Some(Type::Function);
            } else {
                sym.class = StorageClass::Variable;
                sym.ty = Some(Type::Integer);
            }
        }
        if sym.class == StorageClass::Constant {
            return Ok(Expression::Integer(col, sym.value));
        }
        Ok(Expression::Global(col, id))
    }
}

fn parse_number(s: &str) -> Result<i32> {
    let (digits, radix, limit) = if let Some(hex) = s.strip_prefix("0X") {
        (hex, 16, u32::max_value() as i64)
    } else if let Some(bin) = s.strip_prefix("0B") {
        (bin, 2, u32::max_value() as i64)
    } else {
        (s, 10, i32::max_value() as i64)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(error!(SyntaxError; "INVALID NUMBER"));
    }
    match i64::from_str_radix(digits, radix) {
        Ok(n) if n <= limit => Ok(n as u32 as i32),
        _ => Err(error!(Overflow)),
    }
}
