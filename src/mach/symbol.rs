use super::Address;
use crate::lang::{Column, LineNumber};

/// Index of a symbol within the table that owns it.
pub type SymbolId = usize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StorageClass {
    Unknown,
    Constant,
    Variable,
    Function,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Type {
    Integer,
    Byte,
    String,
    Array,
    Pointer,
    Function,
    Struct,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub class: StorageClass,
    pub ty: Option<Type>,
    pub placed: bool,
    pub value: i32,
    pub(crate) fixups: Vec<Address>,
    /// Where the symbol was first used while it had no value yet.
    pub first_use: Option<(LineNumber, Column)>,
}

impl Symbol {
    pub fn is_function(&self) -> bool {
        self.class == StorageClass::Function
    }

    pub fn is_array(&self) -> bool {
        self.ty == Some(Type::Array)
    }

    /// Code sites still waiting for this symbol to be placed.
    pub fn pending(&self) -> &[Address] {
        &self.fixups
    }
}

/// ## Scope table
///
/// Symbols in insertion order. Lookup ignores case and returns the
/// first match; adding a name twice is the caller's business.

#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn add(&mut self, name: &str, class: StorageClass, ty: Option<Type>, value: i32) -> SymbolId {
        self.symbols.push(Symbol {
            name: name.to_string(),
            class,
            ty,
            placed: false,
            value,
            fixups: vec![],
            first_use: None,
        });
        self.symbols.len() - 1
    }

    pub fn find(&self, name: &str) -> Option<SymbolId> {
        self.symbols
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    pub fn get_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        self.symbols.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols.iter().enumerate()
    }
}
