use super::{Column, LineNumber};

#[derive(Clone, PartialEq)]
pub struct Error {
    code: u16,
    line_number: LineNumber,
    column: Column,
    address: Option<usize>,
    message: &'static str,
}

#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ($err:ident) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
    };
    ($err:ident, ..$col:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).in_column($col)
    };
    ($err:ident, $line:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).in_line_number($line)
    };
    ($err:ident; $msg:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).message($msg)
    };
    ($err:ident, ..$col:expr;  $msg:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
            .in_column($col)
            .message($msg)
    };
    ($err:ident, $line:expr, ..$col:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
            .in_line_number($line)
            .in_column($col)
    };
    ($err:ident, $line:expr; $msg:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
            .in_line_number($line)
            .message($msg)
    };
    ($err:ident, $line:expr, ..$col:expr;  $msg:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
            .in_line_number($line)
            .in_column($col)
            .message($msg)
    };
}

impl Error {
    pub fn new(code: ErrorCode) -> Error {
        Error {
            code: code as u16,
            line_number: None,
            column: 0..0,
            address: None,
            message: "",
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code as u16
    }

    pub fn line_number(&self) -> LineNumber {
        self.line_number
    }

    pub fn column(&self) -> Column {
        self.column.clone()
    }

    /// Attach a line number unless one is already present.
    /// Errors bubble up through nested parse functions so the
    /// innermost location wins.
    pub fn in_line_number(&self, line: LineNumber) -> Error {
        Error {
            line_number: self.line_number.or(line),
            ..self.clone()
        }
    }

    pub fn in_column(&self, column: &Column) -> Error {
        if self.column != (0..0) {
            return self.clone();
        }
        Error {
            column: column.clone(),
            ..self.clone()
        }
    }

    pub fn message(&self, message: &'static str) -> Error {
        debug_assert_eq!(self.message.len(), 0);
        Error {
            message,
            ..self.clone()
        }
    }

    /// Image offset of the instruction a runtime fault happened at.
    pub fn at_address(&self, address: usize) -> Error {
        Error {
            address: Some(address),
            ..self.clone()
        }
    }

    pub fn address(&self) -> Option<usize> {
        self.address
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorCode {
    NextWithoutFor = 1,
    SyntaxError = 2,
    Overflow = 6,
    OutOfMemory = 7,
    DivisionByZero = 11,
    TypeMismatch = 13,
    UndefinedFunction = 18,
    ForWithoutNext = 26,
    DoWithoutLoop = 29,
    LoopWithoutDo = 30,
    IfWithoutEndIf = 31,
    EndIfWithoutIf = 32,
    ElseWithoutIf = 33,
    FunctionWithoutEnd = 34,
    EndWithoutFunction = 35,
    DuplicateDefinition = 36,
    TooDeeplyNested = 37,
    BytecodeOverflow = 40,
    InvalidAssignment = 41,
    RuntimeFault = 42,
    Break = 43,
    InternalError = 51,
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error {{ {} }}", self.to_string())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let code_str = match self.code {
            1 => "NEXT WITHOUT FOR",
            2 => "SYNTAX ERROR",
            6 => "OVERFLOW",
            7 => "OUT OF MEMORY",
            11 => "DIVISION BY ZERO",
            13 => "TYPE MISMATCH",
            18 => "UNDEFINED FUNCTION",
            26 => "FOR WITHOUT NEXT",
            29 => "DO WITHOUT LOOP",
            30 => "LOOP WITHOUT DO",
            31 => "IF WITHOUT END IF",
            32 => "END IF WITHOUT IF",
            33 => "ELSE WITHOUT IF",
            34 => "FUNCTION WITHOUT END FUNCTION",
            35 => "END FUNCTION WITHOUT FUNCTION",
            36 => "DUPLICATE DEFINITION",
            37 => "STATEMENTS TOO DEEPLY NESTED",
            40 => "BYTECODE OVERFLOW",
            41 => "INVALID ASSIGNMENT",
            42 => "RUNTIME FAULT",
            43 => "BREAK",
            51 => "INTERNAL ERROR",
            _ => "",
        };
        if code_str.is_empty() {
            write!(f, "PROGRAM ERROR {}", self.code)?;
        } else {
            write!(f, "{}", code_str)?;
        }
        let mut location = String::new();
        if let Some(line_number) = self.line_number {
            location.push_str(&format!(" {}", line_number));
        }
        if (0..0) != self.column {
            location.push_str(&format!(" ({}..{})", self.column.start, self.column.end));
        }
        if !location.is_empty() {
            write!(f, " IN{}", location)?;
        }
        if let Some(address) = self.address {
            write!(f, " AT {:04X}", address)?;
        }
        if !self.message.is_empty() {
            write!(f, "; {}", self.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = error!(SyntaxError, Some(12), ..&(4..7); "EXPECTED EXPRESSION");
        assert_eq!(e.to_string(), "SYNTAX ERROR IN 12 (4..7); EXPECTED EXPRESSION");
        assert_eq!(error!(OutOfMemory).to_string(), "OUT OF MEMORY");
        assert_eq!(error!(Break; "X").to_string(), "BREAK; X");
        let e = error!(RuntimeFault; "STACK OVERFLOW").at_address(0x1A4);
        assert_eq!(e.to_string(), "RUNTIME FAULT AT 01A4; STACK OVERFLOW");
        assert_eq!(error!(Overflow, Some(3)).to_string(), "OVERFLOW IN 3");
    }

    #[test]
    fn test_innermost_location_wins() {
        let e = error!(TypeMismatch, Some(3)).in_line_number(Some(9));
        assert_eq!(e.line_number(), Some(3));
        assert!(e.is(ErrorCode::TypeMismatch));
    }
}
