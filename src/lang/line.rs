/// ## Source of program lines
///
/// The compiler pulls its input one line at a time. Anything that
/// iterates over strings is a line source: `"A=1\nPRINT A".lines()`,
/// a `Vec<String>`, or a reader's `lines()` after error handling.

pub trait LineSource {
    fn get_line(&mut self) -> Option<String>;
}

impl<I, S> LineSource for I
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    fn get_line(&mut self) -> Option<String> {
        self.next().map(|s| s.as_ref().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_lines() {
        let mut src = "A=1\nPRINT A".lines();
        assert_eq!(src.get_line(), Some("A=1".to_string()));
        assert_eq!(src.get_line(), Some("PRINT A".to_string()));
        assert_eq!(src.get_line(), None);
    }

    #[test]
    fn test_owned_lines() {
        let mut src = vec!["END".to_string()].into_iter();
        assert_eq!(src.get_line(), Some("END".to_string()));
        assert_eq!(src.get_line(), None);
    }
}
