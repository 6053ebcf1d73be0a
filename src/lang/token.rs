#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Unknown(String),
    Whitespace(usize),
    Literal(Literal),
    Word(Word),
    Operator(Operator),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
}

impl Token {
    pub fn from_string(s: &str) -> Option<Token> {
        if let Some(word) = Word::from_string(s) {
            return Some(Token::Word(word));
        }
        if let Some(op) = Operator::from_string(s) {
            return Some(Token::Operator(op));
        }
        match s {
            "(" => Some(Token::LParen),
            ")" => Some(Token::RParen),
            "[" => Some(Token::LBracket),
            "]" => Some(Token::RBracket),
            "," => Some(Token::Comma),
            ";" => Some(Token::Semicolon),
            _ => None,
        }
    }

    /// Number of source characters this token was scanned from.
    pub fn source_len(&self) -> usize {
        match self {
            Token::Whitespace(len) => *len,
            Token::Unknown(s) | Token::Ident(s) => s.chars().count(),
            other => other.to_string().chars().count(),
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Token::*;
        match self {
            Unknown(s) => write!(f, "{}", s),
            Whitespace(u) => write!(f, "{s:>w$}", s = "", w = u),
            Literal(s) => write!(f, "{}", s),
            Word(s) => write!(f, "{}", s),
            Operator(s) => write!(f, "{}", s),
            Ident(s) => write!(f, "{}", s),
            LParen => write!(f, "("),
            RParen => write!(f, ")"),
            LBracket => write!(f, "["),
            RBracket => write!(f, "]"),
            Comma => write!(f, ","),
            Semicolon => write!(f, ";"),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    Number(String),
    String(String),
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Literal::Number(s) => write!(f, "{}", s),
            Literal::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Word {
    Asm,
    Def,
    Dim,
    Do,
    DoUntil,
    DoWhile,
    Else,
    ElseIf,
    End,
    EndAsm,
    EndFunction,
    EndIf,
    For,
    Function,
    If,
    Let,
    Loop,
    LoopUntil,
    LoopWhile,
    Next,
    Print,
    Rem1,
    Rem2,
    Return,
    Step,
    Then,
    To,
    Until,
    While,
}

impl Word {
    fn from_string(s: &str) -> Option<Word> {
        use Word::*;
        Some(match s {
            "ASM" => Asm,
            "DEF" => Def,
            "DIM" => Dim,
            "DO" => Do,
            "ELSE" => Else,
            "ELSEIF" => ElseIf,
            "END" => End,
            "ENDIF" => EndIf,
            "FOR" => For,
            "FUNCTION" => Function,
            "IF" => If,
            "LET" => Let,
            "LOOP" => Loop,
            "NEXT" => Next,
            "PRINT" => Print,
            "REM" => Rem1,
            "'" => Rem2,
            "RETURN" => Return,
            "STEP" => Step,
            "THEN" => Then,
            "TO" => To,
            "UNTIL" => Until,
            "WHILE" => While,
            _ => return None,
        })
    }

    /// Compound keywords are spelled as two words.
    pub fn fuse(first: Word, second: Word) -> Option<Word> {
        use Word::*;
        match (first, second) {
            (Else, If) => Some(ElseIf),
            (End, If) => Some(EndIf),
            (End, Function) | (End, Def) => Some(EndFunction),
            (End, Asm) => Some(EndAsm),
            (Do, While) => Some(DoWhile),
            (Do, Until) => Some(DoUntil),
            (Loop, While) => Some(LoopWhile),
            (Loop, Until) => Some(LoopUntil),
            _ => None,
        }
    }
}

impl std::fmt::Display for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Word::*;
        match self {
            Asm => write!(f, "ASM"),
            Def => write!(f, "DEF"),
            Dim => write!(f, "DIM"),
            Do => write!(f, "DO"),
            DoUntil => write!(f, "DO UNTIL"),
            DoWhile => write!(f, "DO WHILE"),
            Else => write!(f, "ELSE"),
            ElseIf => write!(f, "ELSE IF"),
            End => write!(f, "END"),
            EndAsm => write!(f, "END ASM"),
            EndFunction => write!(f, "END FUNCTION"),
            EndIf => write!(f, "END IF"),
            For => write!(f, "FOR"),
            Function => write!(f, "FUNCTION"),
            If => write!(f, "IF"),
            Let => write!(f, "LET"),
            Loop => write!(f, "LOOP"),
            LoopUntil => write!(f, "LOOP UNTIL"),
            LoopWhile => write!(f, "LOOP WHILE"),
            Next => write!(f, "NEXT"),
            Print => write!(f, "PRINT"),
            Rem1 => write!(f, "REM"),
            Rem2 => write!(f, "'"),
            Return => write!(f, "RETURN"),
            Step => write!(f, "STEP"),
            Then => write!(f, "THEN"),
            To => write!(f, "TO"),
            Until => write!(f, "UNTIL"),
            While => write!(f, "WHILE"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Operator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulus,
    Caret,
    Pipe,
    Ampersand,
    Tilde,
    ShiftLeft,
    ShiftRight,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Not,
    And,
    Or,
}

impl Operator {
    fn from_string(s: &str) -> Option<Operator> {
        use Operator::*;
        Some(match s {
            "+" => Plus,
            "-" => Minus,
            "*" => Multiply,
            "/" => Divide,
            "MOD" => Modulus,
            "^" => Caret,
            "|" => Pipe,
            "&" => Ampersand,
            "~" => Tilde,
            "<<" => ShiftLeft,
            ">>" => ShiftRight,
            "=" => Equal,
            "<>" => NotEqual,
            "<" => Less,
            "<=" => LessEqual,
            ">" => Greater,
            ">=" => GreaterEqual,
            "NOT" => Not,
            "AND" => And,
            "OR" => Or,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Operator::*;
        match self {
            Plus => write!(f, "+"),
            Minus => write!(f, "-"),
            Multiply => write!(f, "*"),
            Divide => write!(f, "/"),
            Modulus => write!(f, "MOD"),
            Caret => write!(f, "^"),
            Pipe => write!(f, "|"),
            Ampersand => write!(f, "&"),
            Tilde => write!(f, "~"),
            ShiftLeft => write!(f, "<<"),
            ShiftRight => write!(f, ">>"),
            Equal => write!(f, "="),
            NotEqual => write!(f, "<>"),
            Less => write!(f, "<"),
            LessEqual => write!(f, "<="),
            Greater => write!(f, ">"),
            GreaterEqual => write!(f, ">="),
            Not => write!(f, "NOT"),
            And => write!(f, "AND"),
            Or => write!(f, "OR"),
        }
    }
}
