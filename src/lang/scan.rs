use super::{lex, line::LineSource, token::*, Column, Error, LineNumber};

type Result<T> = std::result::Result<T, Error>;

/// ## Token stream
///
/// Reads lines from a `LineSource`, lexes them, and hands tokens to the
/// parser one at a time with a single token of push back.
/// `None` from `next` is the end of the current line.

pub struct Scanner<'a> {
    source: &'a mut dyn LineSource,
    line_number: usize,
    line: String,
    tokens: std::vec::IntoIter<(Column, Token)>,
    pushed: Option<(Column, Token)>,
    col: Column,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a mut dyn LineSource) -> Scanner<'a> {
        Scanner {
            source,
            line_number: 0,
            line: String::new(),
            tokens: Vec::new().into_iter(),
            pushed: None,
            col: 0..0,
        }
    }

    /// Advance to the next line. Returns false at end of input.
    pub fn get_line(&mut self) -> bool {
        match self.source.get_line() {
            Some(line) => {
                self.line_number += 1;
                self.tokens = lex(&line).into_iter();
                self.line = line;
                self.pushed = None;
                self.col = 0..0;
                true
            }
            None => false,
        }
    }

    pub fn line_number(&self) -> LineNumber {
        Some(self.line_number)
    }

    pub fn line_text(&self) -> &str {
        &self.line
    }

    /// Columns of the most recent token.
    pub fn column(&self) -> Column {
        self.col.clone()
    }

    pub fn next(&mut self) -> Option<Token> {
        let next = match self.pushed.take() {
            Some(pushed) => Some(pushed),
            None => self.tokens.next(),
        };
        match next {
            Some((col, token)) => {
                self.col = col;
                Some(token)
            }
            None => {
                let end = self.line.chars().count();
                self.col = end..end;
                None
            }
        }
    }

    pub fn push_back(&mut self, token: Token) {
        debug_assert!(self.pushed.is_none());
        self.pushed = Some((self.col.clone(), token));
    }

    pub fn peek(&mut self) -> Option<&Token> {
        if self.pushed.is_none() {
            let col = self.col.clone();
            if let Some(token) = self.next() {
                self.push_back(token);
            }
            self.col = col;
        }
        self.pushed.as_ref().map(|(_, t)| t)
    }

    pub fn require(&mut self, token: Token) -> Result<()> {
        if let Some(t) = self.next() {
            if t == token {
                return Ok(());
            }
        }
        Err(error!(SyntaxError, ..&self.column();
            match token {
                Token::Unknown(_) | Token::Whitespace(_) => "UNEXPECTED TOKEN",
                Token::Literal(_) => "EXPECTED LITERAL",
                Token::Word(Word::Then) => "EXPECTED THEN",
                Token::Word(Word::To) => "EXPECTED TO",
                Token::Word(_) => "EXPECTED RESERVED WORD",
                Token::Operator(Operator::Equal) => "EXPECTED EQUALS SIGN",
                Token::Operator(_) => "EXPECTED OPERATOR",
                Token::Ident(_) => "EXPECTED IDENTIFIER",
                Token::LParen => "EXPECTED LEFT PARENTHESIS",
                Token::RParen => "EXPECTED RIGHT PARENTHESIS",
                Token::LBracket => "EXPECTED LEFT BRACKET",
                Token::RBracket => "EXPECTED RIGHT BRACKET",
                Token::Comma => "EXPECTED COMMA",
                Token::Semicolon => "EXPECTED SEMICOLON",
            }
        ))
    }

    pub fn require_eol(&mut self) -> Result<()> {
        match self.next() {
            None => Ok(()),
            Some(_) => Err(error!(SyntaxError, ..&self.column(); "EXPECTED END OF LINE")),
        }
    }

    pub fn require_ident(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            _ => Err(error!(SyntaxError, ..&self.column(); "EXPECTED IDENTIFIER")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_back_and_lines() {
        let mut src = "a = 1\n\nprint".lines();
        let mut scan = Scanner::new(&mut src);
        assert!(scan.get_line());
        assert_eq!(scan.line_number(), Some(1));
        let t = scan.next().unwrap();
        assert_eq!(t, Token::Ident("a".to_string()));
        assert_eq!(scan.column(), 0..1);
        scan.push_back(t.clone());
        assert_eq!(scan.peek(), Some(&t));
        assert_eq!(scan.next(), Some(t));
        assert!(scan.require(Token::Operator(Operator::Equal)).is_ok());
        assert!(scan.require(Token::Comma).is_err());
        assert!(scan.get_line());
        assert_eq!(scan.next(), None);
        assert!(scan.get_line());
        assert_eq!(scan.line_text(), "print");
        assert_eq!(scan.line_number(), Some(3));
        assert!(!scan.get_line());
    }

    #[test]
    fn test_require_eol() {
        let mut src = "x y".lines();
        let mut scan = Scanner::new(&mut src);
        scan.get_line();
        scan.next();
        let e = scan.require_eol().unwrap_err();
        assert_eq!(e.to_string(), "SYNTAX ERROR IN (2..3); EXPECTED END OF LINE");
    }
}
