use std::io::Write;

use thiserror::Error;

use crate::env::{VarSet, Variables};
use crate::obj::block::StrPart;
use crate::obj::{ArgSpec, Block, Dict, Instruction, Number, Obj};
use crate::symbol::{Symbol, SymbolTable};
use crate::{ext, parser};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("type error at ( {op} ): received ( {operands} )")]
    Type { op: String, operands: String },
    #[error("key error: {key}")]
    Key { key: String },
    #[error("index error: {index}")]
    Index { index: String },
    #[error("{0}")]
    Value(String),
    #[error("{0}")]
    User(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("syntax error: {0}")]
    Syntax(String),
}

/// The operand stack of one evaluation frame.
#[derive(Debug, Default)]
pub struct Stack(Vec<Obj>);

impl Stack {
    pub fn new() -> Stack {
        Stack(Vec::new())
    }

    pub fn push(&mut self, o: Obj) {
        self.0.push(o);
    }

    pub fn pop(&mut self) -> Result<Obj, RuntimeError> {
        self.0
            .pop()
            .ok_or_else(|| RuntimeError::Value("unexpected empty stack".to_string()))
    }

    pub fn peek(&self) -> Result<&Obj, RuntimeError> {
        self.0
            .last()
            .ok_or_else(|| RuntimeError::Value("unexpected empty stack".to_string()))
    }

    /// The item `n` below the top; `0` is the top itself.
    pub fn peek_n(&self, n: usize) -> Result<&Obj, RuntimeError> {
        if n < self.0.len() {
            Ok(&self.0[self.0.len() - 1 - n])
        } else {
            Err(RuntimeError::Index {
                index: format!("{n} (stack depth {})", self.0.len()),
            })
        }
    }

    /// Move the item `n` below the top to the top.
    pub fn lift(&mut self, n: usize) -> Result<(), RuntimeError> {
        if n < self.0.len() {
            let item = self.0.remove(self.0.len() - 1 - n);
            self.0.push(item);
            Ok(())
        } else {
            Err(RuntimeError::Index {
                index: format!("{n} (stack depth {})", self.0.len()),
            })
        }
    }

    /// Pop the top `n` items, returned in stack order (deepest first).
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Obj>, RuntimeError> {
        if n > self.0.len() {
            return Err(RuntimeError::Value(format!(
                "cannot take {n} items from a stack of {}",
                self.0.len()
            )));
        }
        Ok(self.0.split_off(self.0.len() - n))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn items(&self) -> &[Obj] {
        &self.0
    }

    pub fn take_all(&mut self) -> Vec<Obj> {
        std::mem::take(&mut self.0)
    }

    pub fn extend(&mut self, items: Vec<Obj>) {
        self.0.extend(items);
    }
}

/// Everything one evaluation shares: interned symbols, the scope
/// stack, collected doc text and the print sink. There is exactly one
/// per session; operators receive it explicitly.
pub struct Runtime {
    symbols: SymbolTable,
    pub vars: Variables,
    help: Vec<String>,
    out: Box<dyn Write>,
}

impl Runtime {
    pub fn new() -> Runtime {
        Runtime {
            symbols: SymbolTable::new(),
            vars: Variables::new(),
            help: Vec::new(),
            out: Box::new(std::io::stdout()),
        }
    }

    pub fn with_sink(out: Box<dyn Write>) -> Runtime {
        Runtime {
            symbols: SymbolTable::new(),
            vars: Variables::new(),
            help: Vec::new(),
            out,
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn sym(&mut self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    pub fn add_help(&mut self, text: String) {
        self.help.push(text);
    }

    pub fn help_entries(&self) -> &[String] {
        &self.help
    }

    pub fn print(&mut self, s: &str) -> Result<(), RuntimeError> {
        self.out.write_all(s.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    /// Truthiness, consulting a dict's `__bool__` overload.
    pub fn truthy(&mut self, o: &Obj, stack: &mut Stack) -> Result<bool, RuntimeError> {
        if let Obj::Dict(d) = o {
            if let Some(Obj::Block(b)) = d.meta_get(self.sym("__bool__")) {
                stack.push(o.clone());
                self.call_block(&b, stack)?;
                return Ok(stack.pop()?.base_truthy());
            }
        }
        Ok(o.base_truthy())
    }

    /// Repr, consulting a dict's `__repr__` overload.
    pub fn repr_of(&mut self, o: &Obj, stack: &mut Stack) -> Result<String, RuntimeError> {
        if let Some(s) = self.overload_repr(o, stack)? {
            return Ok(s);
        }
        Ok(o.repr(&self.symbols))
    }

    /// Display form; strings and chars bare, `__repr__` honored.
    pub fn str_of(&mut self, o: &Obj, stack: &mut Stack) -> Result<String, RuntimeError> {
        if let Some(s) = self.overload_repr(o, stack)? {
            return Ok(s);
        }
        Ok(o.str_form(&self.symbols))
    }

    fn overload_repr(&mut self, o: &Obj, stack: &mut Stack) -> Result<Option<String>, RuntimeError> {
        if let Obj::Dict(d) = o {
            if let Some(f) = d.meta_get(self.sym("__repr__")) {
                let v = match f {
                    Obj::Block(b) => {
                        stack.push(o.clone());
                        self.call_block(&b, stack)?;
                        stack.pop()?
                    }
                    v => v,
                };
                return Ok(Some(v.str_form(&self.symbols)));
            }
        }
        Ok(None)
    }

    /// Invoke a block. Blocks with a header are duplicated first so the
    /// static block never sees mutated capture state; arguments are
    /// popped in declaration order and bound in a fresh scope.
    pub fn call_block(&mut self, blk: &Block, stack: &mut Stack) -> Result<(), RuntimeError> {
        if !blk.has_header() {
            return self.run_instrs(blk.instrs(), stack);
        }
        let blk = blk.duplicate();
        let mut scope = blk.locals().cloned().unwrap_or_else(VarSet::new);
        for arg in blk.args() {
            let v = stack.pop()?;
            self.check_arg_type(arg, &v)?;
            scope.set(arg.name, v);
        }
        self.vars.push_scope(scope);
        let r = self.run_instrs(blk.instrs(), stack);
        self.vars.pop_scope();
        r
    }

    /// Run a block against a stack the caller cannot see; the block's
    /// final stack is returned. Scope depth is restored even when the
    /// block fails partway.
    pub fn eval_isolated(&mut self, blk: &Block) -> Result<Stack, RuntimeError> {
        let depth = self.vars.depth();
        let mut stack = Stack::new();
        let r = self.call_block(blk, &mut stack);
        self.vars.truncate(depth);
        r.map(|_| stack)
    }

    fn check_arg_type(&mut self, arg: &ArgSpec, v: &Obj) -> Result<(), RuntimeError> {
        let Some(ty) = arg.ty else { return Ok(()) };
        if self.symbols.name(ty) == "any" {
            return Ok(());
        }
        if self.sym(v.type_name()) == ty {
            return Ok(());
        }
        if let Obj::Dict(d) = v {
            if let Some(Obj::Sym(t)) = d.get(self.sym("__type__")) {
                if t == ty {
                    return Ok(());
                }
            }
        }
        Err(RuntimeError::Type {
            op: format!("{}::{}", self.symbols.name(arg.name), self.symbols.name(ty)),
            operands: v.repr(&self.symbols),
        })
    }

    pub fn run_instrs(
        &mut self,
        instrs: &[Instruction],
        stack: &mut Stack,
    ) -> Result<(), RuntimeError> {
        for instr in instrs {
            self.run_instr(instr, stack)?;
        }
        Ok(())
    }

    fn run_instr(&mut self, instr: &Instruction, stack: &mut Stack) -> Result<(), RuntimeError> {
        match instr {
            Instruction::Push(o) => stack.push(o.clone()),
            Instruction::BlockLiteral(b) => stack.push(Obj::Block(b.clone())),
            Instruction::ListLiteral(body) => {
                let mut inner = Stack::new();
                self.run_instrs(body, &mut inner)?;
                stack.push(Obj::new_list(inner.take_all()));
            }
            Instruction::DictLiteral(body) => {
                self.vars.push_capture_scope();
                let mut inner = Stack::new();
                let r = self.run_instrs(body, &mut inner);
                let scope = self.vars.pop_scope();
                r?;
                stack.push(Obj::Dict(Dict::from_vars(scope)));
            }
            Instruction::GetVar(s) => {
                let v = self.lookup(*s)?;
                self.eval_value(v, stack)?;
            }
            Instruction::QuoteGetVar(s) => {
                let v = self.lookup(*s)?;
                stack.push(v);
            }
            Instruction::SetVar(s) => {
                let v = stack.peek()?.clone();
                self.vars.set(*s, v);
            }
            Instruction::GetKeyVar(s) => {
                let d = self.pop_dict(stack, *s)?;
                let v = d.get(*s).ok_or_else(|| RuntimeError::Key {
                    key: self.symbols.name(*s).to_string(),
                })?;
                if matches!(v, Obj::Block(_)) && d.meta_get(self.sym("__pushself__")).is_some() {
                    stack.push(Obj::Dict(d));
                }
                self.eval_value(v, stack)?;
            }
            Instruction::QuoteGetKeyVar(s) => {
                let d = self.pop_dict(stack, *s)?;
                let v = d.get(*s).ok_or_else(|| RuntimeError::Key {
                    key: self.symbols.name(*s).to_string(),
                })?;
                stack.push(v);
            }
            Instruction::SetKeyVar(s) => {
                let d = self.pop_dict(stack, *s)?;
                let v = stack.pop()?;
                d.set(*s, v);
                stack.push(Obj::Dict(d));
            }
            Instruction::GetIndexNum(i) => {
                let cont = stack.pop()?;
                let v = self.index_get(&cont, &Obj::Num(Number::Int(*i)), stack)?;
                stack.push(v);
            }
            Instruction::GetIndexObj(key) => {
                let cont = stack.pop()?;
                let v = self.index_get(&cont, &key.clone(), stack)?;
                stack.push(v);
            }
            Instruction::GetIndexVar(s) => {
                let key = self.lookup(*s)?;
                let cont = stack.pop()?;
                let v = self.index_get(&cont, &key, stack)?;
                stack.push(v);
            }
            Instruction::GetIndexExpr(b) => {
                let key = self.eval_single(b)?;
                let cont = stack.pop()?;
                let v = self.index_get(&cont, &key, stack)?;
                stack.push(v);
            }
            Instruction::SetIndexNum(i) => {
                let key = Obj::Num(Number::Int(*i));
                self.set_index_instr(&key, stack)?;
            }
            Instruction::SetIndexObj(key) => {
                let key = key.clone();
                self.set_index_instr(&key, stack)?;
            }
            Instruction::SetIndexVar(s) => {
                let key = self.lookup(*s)?;
                self.set_index_instr(&key, stack)?;
            }
            Instruction::SetIndexExpr(b) => {
                let key = self.eval_single(b)?;
                self.set_index_instr(&key, stack)?;
            }
            Instruction::Interpolate(parts) => {
                let s = self.interpolate(parts)?;
                stack.push(Obj::new_str(s));
            }
            Instruction::Op(op) => (op.exec)(self, stack)?,
            Instruction::Named(name) => match ext::find(name) {
                Some(f) => f(self, stack)?,
                None => {
                    return Err(RuntimeError::Value(format!(
                        "unknown instruction :{{{name}}}"
                    )))
                }
            },
        }
        Ok(())
    }

    fn lookup(&self, s: Symbol) -> Result<Obj, RuntimeError> {
        self.vars.get(s).cloned().ok_or_else(|| RuntimeError::Key {
            key: self.symbols.name(s).to_string(),
        })
    }

    /// Value semantics of a plain dereference: blocks run, anything
    /// else is pushed.
    pub fn eval_value(&mut self, v: Obj, stack: &mut Stack) -> Result<(), RuntimeError> {
        match v {
            Obj::Block(b) => self.call_block(&b, stack),
            other => {
                stack.push(other);
                Ok(())
            }
        }
    }

    fn pop_dict(&mut self, stack: &mut Stack, key: Symbol) -> Result<Dict, RuntimeError> {
        match stack.pop()? {
            Obj::Dict(d) => Ok(d),
            other => Err(RuntimeError::Type {
                op: format!(".{}", self.symbols.name(key)),
                operands: other.repr(&self.symbols),
            }),
        }
    }

    /// Run a bracketed expression on a fresh stack and take its result.
    fn eval_single(&mut self, b: &Block) -> Result<Obj, RuntimeError> {
        let mut s = self.eval_isolated(b)?;
        s.pop()
    }

    fn set_index_instr(&mut self, key: &Obj, stack: &mut Stack) -> Result<(), RuntimeError> {
        let cont = stack.pop()?;
        let value = stack.pop()?;
        let cont = self.index_set(cont, key, value, stack)?;
        stack.push(cont);
        Ok(())
    }

    fn interpolate(&mut self, parts: &[StrPart]) -> Result<String, RuntimeError> {
        let mut out = String::new();
        for part in parts {
            match part {
                StrPart::Lit(s) => out.push_str(s),
                StrPart::Var(v) => {
                    let val = self.lookup(*v)?;
                    let mut s = Stack::new();
                    self.eval_value(val, &mut s)?;
                    for item in s.take_all() {
                        let mut scratch = Stack::new();
                        out.push_str(&self.str_of(&item, &mut scratch)?);
                    }
                }
                StrPart::Expr(b) => {
                    let mut s = self.eval_isolated(b)?;
                    for item in s.take_all() {
                        let mut scratch = Stack::new();
                        out.push_str(&self.str_of(&item, &mut scratch)?);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Generic indexing. Dicts probe `__getindex__` first, then
    /// string/symbol keys; lists take numbers (negative counts from the
    /// end), key lists map, and blocks filter.
    pub fn index_get(
        &mut self,
        cont: &Obj,
        key: &Obj,
        stack: &mut Stack,
    ) -> Result<Obj, RuntimeError> {
        if let Obj::Dict(d) = cont {
            if let Some(Obj::Block(b)) = d.meta_get(self.sym("__getindex__")) {
                stack.push(key.clone());
                stack.push(cont.clone());
                self.call_block(&b, stack)?;
                return stack.pop();
            }
        }
        if let Obj::List(_) | Obj::Nums(_) = key {
            let items = key
                .iter_items()
                .iter()
                .map(|k| self.index_get(cont, k, stack))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Obj::new_list(items));
        }
        if let Obj::Block(b) = key {
            return self.filter_with(cont, b);
        }
        match cont {
            Obj::Dict(d) => self.dict_key_get(d, key),
            Obj::Nums(l) => {
                let len = l.borrow().len();
                let i = self.norm_index(key, len)?;
                Ok(Obj::Num(l.borrow().items()[i].clone()))
            }
            Obj::List(l) => {
                let len = l.borrow().len();
                let i = self.norm_index(key, len)?;
                Ok(l.borrow()[i].clone())
            }
            Obj::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let i = self.norm_index(key, chars.len())?;
                Ok(Obj::Char(chars[i]))
            }
            other => Err(crate::ops::type_error(self, ".[]", &[other, key])),
        }
    }

    fn dict_key_get(&mut self, d: &Dict, key: &Obj) -> Result<Obj, RuntimeError> {
        match key {
            Obj::Sym(s) => d.get(*s).ok_or_else(|| RuntimeError::Key {
                key: self.symbols.name(*s).to_string(),
            }),
            Obj::Str(s) => {
                if crate::symbol::is_symbol_str(s) {
                    let sym = self.sym(s);
                    d.get(sym)
                        .or_else(|| d.get_str(s))
                        .ok_or_else(|| RuntimeError::Key {
                            key: s.as_str().to_string(),
                        })
                } else {
                    d.get_str(s).ok_or_else(|| RuntimeError::Key {
                        key: s.as_str().to_string(),
                    })
                }
            }
            other => Err(crate::ops::type_error(
                self,
                ".[]",
                &[&Obj::Dict(d.clone()), other],
            )),
        }
    }

    /// Keep elements where the block leaves a truthy top.
    fn filter_with(&mut self, cont: &Obj, b: &Block) -> Result<Obj, RuntimeError> {
        let items = match cont {
            Obj::List(_) | Obj::Nums(_) => cont.iter_items(),
            Obj::Str(s) => s.chars().map(Obj::Char).collect(),
            other => {
                return Err(crate::ops::type_error(
                    self,
                    ".[]",
                    &[other, &Obj::Block(b.clone())],
                ))
            }
        };
        let mut kept = Vec::new();
        for item in items {
            let mut s = Stack::new();
            s.push(item.clone());
            self.call_block(b, &mut s)?;
            let verdict = s.pop()?;
            let mut scratch = Stack::new();
            if self.truthy(&verdict, &mut scratch)? {
                kept.push(item);
            }
        }
        if let Obj::Str(_) = cont {
            let s: String = kept
                .into_iter()
                .map(|o| match o {
                    Obj::Char(c) => c,
                    _ => unreachable!(),
                })
                .collect();
            return Ok(Obj::new_str(s));
        }
        Ok(Obj::new_list(kept))
    }

    fn norm_index(&mut self, key: &Obj, len: usize) -> Result<usize, RuntimeError> {
        let i = key.as_index().ok_or_else(|| RuntimeError::Index {
            index: key.repr(&self.symbols),
        })?;
        let idx = if i < 0 { i + len as i64 } else { i };
        if idx < 0 || idx as usize >= len {
            Err(RuntimeError::Index {
                index: format!("{i} (length {len})"),
            })
        } else {
            Ok(idx as usize)
        }
    }

    /// Store into a container, returning the container to push back.
    pub fn index_set(
        &mut self,
        cont: Obj,
        key: &Obj,
        value: Obj,
        stack: &mut Stack,
    ) -> Result<Obj, RuntimeError> {
        if let Obj::Dict(d) = &cont {
            if let Some(Obj::Block(b)) = d.meta_get(self.sym("__setindex__")) {
                stack.push(value);
                stack.push(key.clone());
                stack.push(cont.clone());
                self.call_block(&b, stack)?;
                return Ok(cont);
            }
        }
        match &cont {
            Obj::Dict(d) => {
                match key {
                    Obj::Sym(s) => d.set(*s, value),
                    Obj::Str(s) => {
                        if crate::symbol::is_symbol_str(s) {
                            let sym = self.sym(s);
                            d.set(sym, value);
                        } else {
                            d.set_str(s.as_str().to_string(), value);
                        }
                    }
                    other => {
                        return Err(RuntimeError::Key {
                            key: other.repr(&self.symbols),
                        })
                    }
                }
                Ok(cont)
            }
            Obj::Nums(l) => {
                let len = l.borrow().len();
                let i = self.norm_index(key, len)?;
                match value {
                    Obj::Num(n) => {
                        l.borrow_mut().items_mut()[i] = n;
                        Ok(cont)
                    }
                    other => {
                        // Mixed assignment widens the container to a
                        // general list.
                        let mut items = cont.iter_items();
                        items[i] = other;
                        Ok(Obj::new_list(items))
                    }
                }
            }
            Obj::List(l) => {
                let len = l.borrow().len();
                let i = self.norm_index(key, len)?;
                l.borrow_mut()[i] = value;
                Ok(cont)
            }
            Obj::Str(s) => {
                let i = self.norm_index(key, s.chars().count())?;
                let c = match value {
                    Obj::Char(c) => c,
                    other => {
                        return Err(crate::ops::type_error(self, ".:[]", &[&cont, &other]))
                    }
                };
                let mut out: Vec<char> = s.chars().collect();
                out[i] = c;
                Ok(Obj::new_str(out.into_iter().collect::<String>()))
            }
            other => Err(crate::ops::type_error(self, ".:[]", &[other, key])),
        }
    }

    /// Compile a source string against this runtime's symbol table.
    pub fn compile(&mut self, src: &str) -> Result<Block, parser::SyntaxError> {
        parser::compile(src, self)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obj::NumberList;

    fn int(n: i64) -> Obj {
        Obj::Num(Number::Int(n))
    }

    #[test]
    fn stack_discipline() {
        let mut s = Stack::new();
        s.push(int(1));
        s.push(int(2));
        s.push(int(3));
        s.lift(2).unwrap();
        assert!(s.pop().unwrap().obj_eq(&int(1)));
        assert_eq!(s.len(), 2);
        assert!(s.peek_n(1).unwrap().obj_eq(&int(2)));
        assert!(s.pop_n(3).is_err());
    }

    #[test]
    fn block_args_pop_in_declaration_order() {
        let mut rt = Runtime::new();
        let (a, b) = (rt.sym("a"), rt.sym("b"));
        let blk = Block::with_header(
            vec![Instruction::GetVar(a), Instruction::GetVar(b)],
            vec![ArgSpec { name: a, ty: None }, ArgSpec { name: b, ty: None }],
            None,
        );
        let mut s = Stack::new();
        s.push(int(3));
        s.push(int(4));
        rt.call_block(&blk, &mut s).unwrap();
        // First declared arg took the top of the stack.
        assert!(s.pop().unwrap().obj_eq(&int(3)));
        assert!(s.pop().unwrap().obj_eq(&int(4)));
    }

    #[test]
    fn arg_type_mismatch_is_type_error() {
        let mut rt = Runtime::new();
        let a = rt.sym("a");
        let num = rt.sym("num");
        let blk = Block::with_header(
            vec![],
            vec![ArgSpec { name: a, ty: Some(num) }],
            None,
        );
        let mut s = Stack::new();
        s.push(Obj::new_str("nope"));
        assert!(matches!(
            rt.call_block(&blk, &mut s),
            Err(RuntimeError::Type { .. })
        ));
    }

    #[test]
    fn get_var_evaluates_blocks() {
        let mut rt = Runtime::new();
        let f = rt.sym("f");
        rt.vars.set(f, Obj::Block(Block::new(vec![Instruction::Push(int(9))])));
        let mut s = Stack::new();
        rt.run_instrs(&[Instruction::GetVar(f)], &mut s).unwrap();
        assert!(s.pop().unwrap().obj_eq(&int(9)));
        rt.run_instrs(&[Instruction::QuoteGetVar(f)], &mut s).unwrap();
        assert!(matches!(s.pop().unwrap(), Obj::Block(_)));
    }

    #[test]
    fn set_var_peeks() {
        let mut rt = Runtime::new();
        let x = rt.sym("x");
        let mut s = Stack::new();
        s.push(int(5));
        rt.run_instrs(&[Instruction::SetVar(x)], &mut s).unwrap();
        assert_eq!(s.len(), 1);
        assert!(rt.vars.get(x).unwrap().obj_eq(&int(5)));
    }

    #[test]
    fn negative_index_counts_from_end() {
        let mut rt = Runtime::new();
        let l = Obj::new_nums(NumberList::new(vec![
            Number::Int(10),
            Number::Int(20),
            Number::Int(30),
        ]));
        let mut s = Stack::new();
        let v = rt.index_get(&l, &int(-1), &mut s).unwrap();
        assert!(v.obj_eq(&int(30)));
        assert!(rt.index_get(&l, &int(3), &mut s).is_err());
    }

    #[test]
    fn isolated_eval_restores_scope_depth() {
        let mut rt = Runtime::new();
        let depth = rt.vars.depth();
        let failing = Block::new(vec![Instruction::GetVar(rt.sym("missing"))]);
        assert!(rt.eval_isolated(&failing).is_err());
        assert_eq!(rt.vars.depth(), depth);
    }

    #[test]
    fn dict_string_and_symbol_keys_unify() {
        let mut rt = Runtime::new();
        let d = Dict::new();
        let k = rt.sym("k");
        d.set(k, int(1));
        let got = rt.dict_key_get(&d, &Obj::new_str("k")).unwrap();
        assert!(got.obj_eq(&int(1)));
        assert!(rt.dict_key_get(&d, &Obj::new_str("absent")).is_err());
    }
}
