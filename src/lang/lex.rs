use super::{token::*, Column};

/// Split one source line into tokens with the columns they came from.
/// Whitespace is dropped, compound keywords are fused and
/// everything after `REM` or `'` is discarded.
pub fn lex(s: &str) -> Vec<(Column, Token)> {
    BasicLexer::lex(s)
}

fn is_basic_whitespace(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\r' || c == '\n'
}

fn is_basic_digit(c: char) -> bool {
    c.is_ascii_digit()
}

fn is_basic_alphabetic(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

trait Tokenizers<'a> {
    fn chars(&mut self) -> &mut std::iter::Peekable<std::str::Chars<'a>>;

    fn whitespace(&mut self) -> Option<Token> {
        let mut len = 0;
        loop {
            self.chars().next();
            len += 1;
            if let Some(pk) = self.chars().peek() {
                if is_basic_whitespace(*pk) {
                    continue;
                }
            }
            return Some(Token::Whitespace(len));
        }
    }

    fn number(&mut self) -> Option<Token> {
        let mut s = String::new();
        let mut radix = false;
        loop {
            let ch = self.chars().next()?;
            s.push(ch.to_ascii_uppercase());
            if let Some(pk) = self.chars().peek() {
                if s == "0" && (*pk == 'x' || *pk == 'X' || *pk == 'b' || *pk == 'B') {
                    radix = true;
                    continue;
                }
                if is_basic_digit(*pk) || (radix && pk.is_ascii_hexdigit()) {
                    continue;
                }
            }
            break;
        }
        Some(Token::Literal(Literal::Number(s)))
    }

    fn string(&mut self) -> Option<Token> {
        let mut s = String::new();
        self.chars().next();
        loop {
            match self.chars().next() {
                Some('"') => return Some(Token::Literal(Literal::String(s))),
                Some(ch) => s.push(ch),
                None => return Some(Token::Unknown(format!("\"{}", s))),
            }
        }
    }

    fn alphabetic(&mut self) -> Option<Token> {
        let mut s = String::new();
        loop {
            let ch = self.chars().next()?;
            s.push(ch);
            if let Some(pk) = self.chars().peek() {
                if is_basic_alphabetic(*pk) || is_basic_digit(*pk) {
                    continue;
                }
            }
            break;
        }
        match Token::from_string(&s.to_ascii_uppercase()) {
            Some(token) => Some(token),
            None => Some(Token::Ident(s)),
        }
    }

    fn minutia(&mut self) -> Option<Token> {
        let mut s = String::new();
        s.push(self.chars().next()?);
        if let Some(pk) = self.chars().peek() {
            let mut pair = s.clone();
            pair.push(*pk);
            if let Some(t) = Token::from_string(&pair) {
                self.chars().next();
                return Some(t);
            }
        }
        match Token::from_string(&s) {
            Some(t) => Some(t),
            None => Some(Token::Unknown(s)),
        }
    }
}

struct BasicLexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    remark: bool,
}

impl<'a> Tokenizers<'a> for BasicLexer<'a> {
    fn chars(&mut self) -> &mut std::iter::Peekable<std::str::Chars<'a>> {
        &mut self.chars
    }
}

impl<'a> Iterator for BasicLexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remark {
            return None;
        }
        let pk = self.chars.peek()?;
        if is_basic_whitespace(*pk) {
            return self.whitespace();
        }
        if is_basic_digit(*pk) {
            return self.number();
        }
        let token = if is_basic_alphabetic(*pk) {
            self.alphabetic()
        } else if *pk == '"' {
            self.string()
        } else {
            self.minutia()
        };
        match token {
            Some(Token::Word(Word::Rem1)) | Some(Token::Word(Word::Rem2)) => {
                self.remark = true;
                None
            }
            token => token,
        }
    }
}

impl<'a> BasicLexer<'a> {
    fn lex(s: &str) -> Vec<(Column, Token)> {
        let lexer = BasicLexer {
            chars: s.chars().peekable(),
            remark: false,
        };
        let mut col = 0;
        let mut tokens: Vec<(Column, Token)> = lexer
            .map(|t| {
                let start = col;
                col += t.source_len();
                (start..col, t)
            })
            .filter(|(_, t)| !matches!(t, Token::Whitespace(_)))
            .collect();
        BasicLexer::fuse_words(&mut tokens);
        tokens
    }

    fn fuse_words(tokens: &mut Vec<(Column, Token)>) {
        let mut locs: Vec<(usize, Column, Token)> = vec![];
        let mut tokens_iter = tokens.windows(2).enumerate();
        while let Some((index, tt)) = tokens_iter.next() {
            if let (Token::Word(first), Token::Word(second)) = (&tt[0].1, &tt[1].1) {
                if let Some(word) = Word::fuse(*first, *second) {
                    let col = tt[0].0.start..tt[1].0.end;
                    locs.push((index, col, Token::Word(word)));
                    tokens_iter.next();
                }
            }
        }
        while let Some((index, col, token)) = locs.pop() {
            tokens.splice(index..index + 2, Some((col, token)));
        }
    }
}
