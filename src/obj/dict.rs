use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use crate::env::VarSet;
use crate::obj::Obj;
use crate::symbol::{Symbol, SymbolTable};

/// A shared dictionary handle. Symbol keys live in an ordered set;
/// arbitrary string keys go in a side map. An optional metatable is
/// consulted on lookup misses, following the chain with cycle
/// detection by pointer identity.
#[derive(Debug, Clone)]
pub struct Dict(Rc<RefCell<DictData>>);

#[derive(Debug, Default)]
pub struct DictData {
    vars: VarSet,
    strs: HashMap<String, Obj>,
    meta: Option<Dict>,
}

impl DictData {
    pub fn vars(&self) -> &VarSet {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut VarSet {
        &mut self.vars
    }

    pub fn strs(&self) -> &HashMap<String, Obj> {
        &self.strs
    }
}

impl Dict {
    pub fn new() -> Dict {
        Dict(Rc::new(RefCell::new(DictData::default())))
    }

    pub fn from_vars(vars: VarSet) -> Dict {
        Dict(Rc::new(RefCell::new(DictData {
            vars,
            strs: HashMap::new(),
            meta: None,
        })))
    }

    pub fn ptr_eq(&self, other: &Dict) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn ptr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }

    pub fn data(&self) -> Ref<'_, DictData> {
        self.0.borrow()
    }

    pub fn data_mut(&self) -> RefMut<'_, DictData> {
        self.0.borrow_mut()
    }

    /// Lookup through the metatable chain. Own bindings win; the chain
    /// stops at the first dict already visited.
    pub fn get(&self, sym: Symbol) -> Option<Obj> {
        let mut visited: Vec<*const ()> = Vec::new();
        let mut cur = self.clone();
        loop {
            if visited.contains(&cur.ptr()) {
                return None;
            }
            visited.push(cur.ptr());
            let next = {
                let data = cur.0.borrow();
                if let Some(v) = data.vars.get(sym) {
                    return Some(v.clone());
                }
                data.meta.clone()
            };
            cur = next?;
        }
    }

    /// Lookup starting at the metatable, skipping own bindings. This is
    /// the operator-overload probe.
    pub fn meta_get(&self, sym: Symbol) -> Option<Obj> {
        self.0.borrow().meta.as_ref()?.get(sym)
    }

    pub fn get_str(&self, key: &str) -> Option<Obj> {
        self.0.borrow().strs.get(key).cloned()
    }

    pub fn contains(&self, sym: Symbol) -> bool {
        self.get(sym).is_some()
    }

    pub fn contains_own(&self, sym: Symbol) -> bool {
        self.0.borrow().vars.contains(sym)
    }

    pub fn set(&self, sym: Symbol, val: Obj) {
        self.0.borrow_mut().vars.set(sym, val);
    }

    pub fn set_str(&self, key: String, val: Obj) {
        self.0.borrow_mut().strs.insert(key, val);
    }

    pub fn remove(&self, sym: Symbol) -> Option<Obj> {
        self.0.borrow_mut().vars.remove(sym)
    }

    pub fn remove_str(&self, key: &str) -> Option<Obj> {
        self.0.borrow_mut().strs.remove(key)
    }

    pub fn meta(&self) -> Option<Dict> {
        self.0.borrow().meta.clone()
    }

    pub fn set_meta(&self, meta: Option<Dict>) {
        self.0.borrow_mut().meta = meta;
    }

    pub fn has_meta(&self) -> bool {
        self.0.borrow().meta.is_some()
    }

    /// Own entry count, symbol and string keys together.
    pub fn len(&self) -> usize {
        let d = self.0.borrow();
        d.vars.len() + d.strs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sym_keys(&self) -> Vec<Symbol> {
        self.0.borrow().vars.iter().map(|(s, _)| s).collect()
    }

    pub fn str_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.0.borrow().strs.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Deep copy of own entries. The metatable is shared with the
    /// original, so the copy keeps its overloads.
    pub fn deep_copy(&self) -> Dict {
        let d = self.0.borrow();
        Dict(Rc::new(RefCell::new(DictData {
            vars: d.vars.deep_copy(),
            strs: d
                .strs
                .iter()
                .map(|(k, v)| (k.clone(), v.deep_copy()))
                .collect(),
            meta: d.meta.clone(),
        })))
    }

    /// Structural equality of own entries; metatables are ignored.
    pub fn dict_eq(&self, other: &Dict) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let (a, b) = (self.0.borrow(), other.0.borrow());
        if a.vars.len() != b.vars.len() || a.strs.len() != b.strs.len() {
            return false;
        }
        for (k, v) in a.vars.iter() {
            match b.vars.get(k) {
                Some(w) if v.obj_eq(w) => {}
                _ => return false,
            }
        }
        for (k, v) in &a.strs {
            match b.strs.get(k) {
                Some(w) if v.obj_eq(w) => {}
                _ => return false,
            }
        }
        true
    }

    pub(crate) fn repr(&self, syms: &SymbolTable, seen: &mut Vec<*const ()>) -> String {
        if seen.contains(&self.ptr()) {
            return "{,...}".to_string();
        }
        seen.push(self.ptr());
        let d = self.0.borrow();
        let mut parts = Vec::new();
        for (k, v) in d.vars.iter() {
            parts.push(format!("{}:{}", v.repr_inner(syms, seen), syms.name(k)));
        }
        let mut str_entries: Vec<_> = d.strs.iter().collect();
        str_entries.sort_by(|a, b| a.0.cmp(b.0));
        for (k, v) in str_entries {
            parts.push(format!("{}:.\"{}\"", v.repr_inner(syms, seen), k));
        }
        seen.pop();
        if parts.is_empty() {
            "{,}".to_string()
        } else {
            format!("{{, {}}}", parts.join(" "))
        }
    }
}

impl Default for Dict {
    fn default() -> Self {
        Dict::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obj::Number;
    use crate::symbol::SymbolTable;

    fn int(n: i64) -> Obj {
        Obj::Num(Number::Int(n))
    }

    #[test]
    fn own_binding_beats_meta() {
        let mut syms = SymbolTable::new();
        let x = syms.intern("x");
        let meta = Dict::new();
        meta.set(x, int(1));
        let d = Dict::new();
        d.set_meta(Some(meta));
        assert!(d.get(x).unwrap().obj_eq(&int(1)));
        d.set(x, int(2));
        assert!(d.get(x).unwrap().obj_eq(&int(2)));
    }

    #[test]
    fn meta_chain_lookup() {
        let mut syms = SymbolTable::new();
        let x = syms.intern("x");
        let grandparent = Dict::new();
        grandparent.set(x, int(7));
        let parent = Dict::new();
        parent.set_meta(Some(grandparent));
        let d = Dict::new();
        d.set_meta(Some(parent));
        assert!(d.get(x).unwrap().obj_eq(&int(7)));
    }

    #[test]
    fn cyclic_meta_chain_terminates() {
        let mut syms = SymbolTable::new();
        let missing = syms.intern("missing");
        let a = Dict::new();
        let b = Dict::new();
        a.set_meta(Some(b.clone()));
        b.set_meta(Some(a.clone()));
        assert!(a.get(missing).is_none());
    }

    #[test]
    fn self_meta_terminates() {
        let mut syms = SymbolTable::new();
        let missing = syms.intern("missing");
        let a = Dict::new();
        a.set_meta(Some(a.clone()));
        assert!(a.get(missing).is_none());
    }

    #[test]
    fn meta_get_skips_own() {
        let mut syms = SymbolTable::new();
        let f = syms.intern("f");
        let d = Dict::new();
        d.set(f, int(1));
        assert!(d.meta_get(f).is_none());
        let meta = Dict::new();
        meta.set(f, int(2));
        d.set_meta(Some(meta));
        assert!(d.meta_get(f).unwrap().obj_eq(&int(2)));
    }

    #[test]
    fn deep_copy_shares_meta() {
        let mut syms = SymbolTable::new();
        let x = syms.intern("x");
        let meta = Dict::new();
        let d = Dict::new();
        d.set_meta(Some(meta.clone()));
        d.set(x, int(1));
        let copy = d.deep_copy();
        assert!(copy.meta().unwrap().ptr_eq(&meta));
        copy.set(x, int(2));
        assert!(d.get(x).unwrap().obj_eq(&int(1)));
    }

    #[test]
    fn equality_ignores_meta() {
        let mut syms = SymbolTable::new();
        let x = syms.intern("x");
        let a = Dict::new();
        a.set(x, int(1));
        let b = Dict::new();
        b.set(x, int(1));
        b.set_meta(Some(Dict::new()));
        assert!(a.dict_eq(&b));
    }

    #[test]
    fn string_keys_are_separate() {
        let mut syms = SymbolTable::new();
        let k = syms.intern("k");
        let d = Dict::new();
        d.set(k, int(1));
        d.set_str("k!".to_string(), int(2));
        assert!(d.get(k).unwrap().obj_eq(&int(1)));
        assert!(d.get_str("k!").unwrap().obj_eq(&int(2)));
        assert_eq!(d.len(), 2);
    }
}
