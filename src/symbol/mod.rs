use std::collections::HashMap;

/// An interned identifier. Equality and hashing are id equality; the
/// backing name lives in the [`SymbolTable`] that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    pub fn id(self) -> u32 {
        self.0
    }
}

/// True for characters allowed in a plain (unquoted) symbol name.
pub fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// True if `s` could have been written as a plain symbol.
pub fn is_symbol_str(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_symbol_char)
}

/// Interns names to stable small ids. Ids are never reused or removed;
/// the mapping is populated lazily on first use.
#[derive(Debug, Default)]
pub struct SymbolTable {
    names: Vec<String>,
    ids: HashMap<String, u32>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(&id) = self.ids.get(name) {
            return Symbol(id);
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        Symbol(id)
    }

    pub fn name(&self, sym: Symbol) -> &str {
        &self.names[sym.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut t = SymbolTable::new();
        let a = t.intern("foo");
        let b = t.intern("foo");
        assert_eq!(a, b);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn distinct_names_distinct_ids() {
        let mut t = SymbolTable::new();
        let a = t.intern("foo");
        let b = t.intern("bar");
        assert_ne!(a, b);
        assert_eq!(t.name(a), "foo");
        assert_eq!(t.name(b), "bar");
    }

    #[test]
    fn symbol_char_set() {
        assert!(is_symbol_char('a'));
        assert!(is_symbol_char('Z'));
        assert!(is_symbol_char('_'));
        assert!(!is_symbol_char('1'));
        assert!(!is_symbol_char('-'));
        assert!(!is_symbol_char(' '));
    }

    #[test]
    fn symbol_str_rejects_empty_and_punct() {
        assert!(is_symbol_str("abc_def"));
        assert!(!is_symbol_str(""));
        assert!(!is_symbol_str("a b"));
        assert!(!is_symbol_str("a+b"));
    }
}
