use crate::obj::Obj;
use crate::symbol::Symbol;

/// An ordered set of variable bindings. Order is preserved so dicts
/// built from a scope list their keys in assignment order.
#[derive(Debug, Clone, Default)]
pub struct VarSet(Vec<(Symbol, Obj)>);

impl VarSet {
    pub fn new() -> VarSet {
        VarSet(Vec::new())
    }

    pub fn get(&self, sym: Symbol) -> Option<&Obj> {
        self.0.iter().find(|(s, _)| *s == sym).map(|(_, o)| o)
    }

    pub fn contains(&self, sym: Symbol) -> bool {
        self.0.iter().any(|(s, _)| *s == sym)
    }

    pub fn set(&mut self, sym: Symbol, val: Obj) {
        match self.0.iter_mut().find(|(s, _)| *s == sym) {
            Some((_, slot)) => *slot = val,
            None => self.0.push((sym, val)),
        }
    }

    pub fn remove(&mut self, sym: Symbol) -> Option<Obj> {
        let i = self.0.iter().position(|(s, _)| *s == sym)?;
        Some(self.0.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &Obj)> {
        self.0.iter().map(|(s, o)| (*s, o))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn deep_copy(&self) -> VarSet {
        VarSet(self.0.iter().map(|(s, o)| (*s, o.deep_copy())).collect())
    }
}

#[derive(Debug)]
struct Frame {
    vars: VarSet,
    /// A capture frame absorbs every assignment made while it is the
    /// innermost barrier, even for names defined further out. Dict
    /// literals evaluate under one.
    capture: bool,
}

/// The scope stack. Lookup walks inner to outer; plain assignment
/// updates the nearest scope that already defines the name, declaring
/// in the innermost scope otherwise.
#[derive(Debug)]
pub struct Variables {
    scopes: Vec<Frame>,
}

impl Variables {
    pub fn new() -> Variables {
        Variables {
            scopes: vec![Frame {
                vars: VarSet::new(),
                capture: false,
            }],
        }
    }

    pub fn push_scope(&mut self, vars: VarSet) {
        self.scopes.push(Frame {
            vars,
            capture: false,
        });
    }

    pub fn push_capture_scope(&mut self) {
        self.scopes.push(Frame {
            vars: VarSet::new(),
            capture: true,
        });
    }

    pub fn pop_scope(&mut self) -> VarSet {
        debug_assert!(self.scopes.len() > 1, "popping the global scope");
        self.scopes.pop().map(|f| f.vars).unwrap_or_default()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Unwind to a recorded depth; used when an error aborts nested
    /// block calls so the caller's scopes survive.
    pub fn truncate(&mut self, depth: usize) {
        while self.scopes.len() > depth.max(1) {
            self.scopes.pop();
        }
    }

    pub fn get(&self, sym: Symbol) -> Option<&Obj> {
        self.scopes.iter().rev().find_map(|f| f.vars.get(sym))
    }

    pub fn set(&mut self, sym: Symbol, val: Obj) {
        for frame in self.scopes.iter_mut().rev() {
            if frame.vars.contains(sym) || frame.capture {
                frame.vars.set(sym, val);
                return;
            }
        }
        if let Some(inner) = self.scopes.last_mut() {
            inner.vars.set(sym, val);
        }
    }

    /// Bind in the innermost scope regardless of outer definitions;
    /// this is how block arguments shadow.
    pub fn set_local(&mut self, sym: Symbol, val: Obj) {
        if let Some(inner) = self.scopes.last_mut() {
            inner.vars.set(sym, val);
        }
    }

}

impl Default for Variables {
    fn default() -> Self {
        Variables::new()
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
    fn set_updates_defining_scope() {
        let mut syms = SymbolTable::new();
        let x = syms.intern("x");
        let mut vars = Variables::new();
        vars.set(x, int(1));
        vars.push_scope(VarSet::new());
        vars.set(x, int(2));
        vars.pop_scope();
        assert!(vars.get(x).unwrap().obj_eq(&int(2)));
    }

    #[test]
    fn set_local_shadows() {
        let mut syms = SymbolTable::new();
        let x = syms.intern("x");
        let mut vars = Variables::new();
        vars.set(x, int(1));
        vars.push_scope(VarSet::new());
        vars.set_local(x, int(9));
        assert!(vars.get(x).unwrap().obj_eq(&int(9)));
        vars.pop_scope();
        assert!(vars.get(x).unwrap().obj_eq(&int(1)));
    }

    #[test]
    fn capture_scope_absorbs_outer_names() {
        let mut syms = SymbolTable::new();
        let x = syms.intern("x");
        let mut vars = Variables::new();
        vars.set(x, int(1));
        vars.push_capture_scope();
        vars.set(x, int(9));
        let inner = vars.pop_scope();
        assert!(inner.get(x).unwrap().obj_eq(&int(9)));
        assert!(vars.get(x).unwrap().obj_eq(&int(1)));
    }

    #[test]
    fn varset_preserves_order() {
        let mut syms = SymbolTable::new();
        let (a, b) = (syms.intern("a"), syms.intern("b"));
        let mut vs = VarSet::new();
        vs.set(b, int(2));
        vs.set(a, int(1));
        let keys: Vec<_> = vs.iter().map(|(s, _)| s).collect();
        assert_eq!(keys, vec![b, a]);
    }

    #[test]
    fn truncate_restores_depth() {
        let mut vars = Variables::new();
        let d = vars.depth();
        vars.push_scope(VarSet::new());
        vars.push_scope(VarSet::new());
        vars.truncate(d);
        assert_eq!(vars.depth(), d);
    }
}
