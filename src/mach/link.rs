use super::{Address, Arena, WORD_SIZE};
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

/// ## Forward branch target
///
/// Every branch emitted before its target is known records the address
/// of its operand word here. `fixup` writes the displacement into each
/// site once the target is known and leaves the label empty.

#[derive(Debug, Default)]
pub struct Label {
    sites: Vec<Address>,
}

impl Label {
    pub fn new() -> Label {
        Label::default()
    }

    pub fn add_site(&mut self, site: Address) {
        self.sites.push(site);
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn fixup(&mut self, arena: &mut Arena, target: Address) -> Result<()> {
        for site in self.sites.drain(..) {
            arena.write_word(site, displacement(site, target))?;
        }
        Ok(())
    }
}

/// Branch displacement stored at `site` that lands on `target`.
pub fn displacement(site: Address, target: Address) -> i32 {
    target as i32 - (site + WORD_SIZE) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixup_writes_every_site() {
        let mut arena = Arena::new(64);
        arena.push_bytes(&[0; 12]).unwrap();
        let mut label = Label::new();
        label.add_site(0);
        label.add_site(6);
        label.fixup(&mut arena, 12).unwrap();
        assert!(label.is_empty());
        assert_eq!(arena.read_word(0).unwrap(), 8);
        assert_eq!(arena.read_word(6).unwrap(), 2);
    }

    #[test]
    fn test_backward_displacement() {
        assert_eq!(displacement(20, 8), -16);
    }
}
