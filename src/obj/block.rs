use std::rc::Rc;

use crate::env::VarSet;
use crate::obj::Obj;
use crate::ops::OpDef;
use crate::symbol::{Symbol, SymbolTable};

/// A declared block argument, optionally constrained to a type symbol.
#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub name: Symbol,
    pub ty: Option<Symbol>,
}

/// One piece of an interpolated string literal.
#[derive(Debug, Clone)]
pub enum StrPart {
    Lit(String),
    Var(Symbol),
    Expr(Block),
}

/// A linear program unit. The generator emits these from the token
/// tree; the engine walks them left to right.
#[derive(Debug, Clone)]
pub enum Instruction {
    Push(Obj),
    /// `[ ... ]`: run the body on a fresh stack, collect it into a list.
    ListLiteral(Vec<Instruction>),
    BlockLiteral(Block),
    /// `{, ...}`: run the body in a fresh scope, the scope becomes a dict.
    DictLiteral(Vec<Instruction>),
    GetVar(Symbol),
    /// Peeks; the assigned value stays on the stack.
    SetVar(Symbol),
    /// `.name`: pop a dict, look the key up through its metatable chain.
    GetKeyVar(Symbol),
    /// `.:name`: pop dict, peek value, store.
    SetKeyVar(Symbol),
    /// Push the bound value without evaluating blocks.
    QuoteGetVar(Symbol),
    QuoteGetKeyVar(Symbol),
    GetIndexNum(i64),
    GetIndexObj(Obj),
    GetIndexVar(Symbol),
    GetIndexExpr(Block),
    SetIndexNum(i64),
    SetIndexObj(Obj),
    SetIndexVar(Symbol),
    SetIndexExpr(Block),
    Interpolate(Vec<StrPart>),
    Op(&'static OpDef),
    /// Extension instruction addressed by registry name.
    Named(&'static str),
}

#[derive(Debug)]
pub struct BlockBody {
    pub instrs: Vec<Instruction>,
    pub args: Vec<ArgSpec>,
    pub locals: Option<VarSet>,
}

/// First-class code. Cheap to clone; `duplicate` detaches the mutable
/// captured-locals set before a call mutates it.
#[derive(Debug, Clone)]
pub struct Block(Rc<BlockBody>);

impl Block {
    pub fn new(instrs: Vec<Instruction>) -> Block {
        Block(Rc::new(BlockBody {
            instrs,
            args: Vec::new(),
            locals: None,
        }))
    }

    pub fn with_header(instrs: Vec<Instruction>, args: Vec<ArgSpec>, locals: Option<VarSet>) -> Block {
        Block(Rc::new(BlockBody { instrs, args, locals }))
    }

    pub fn instrs(&self) -> &[Instruction] {
        &self.0.instrs
    }

    pub fn args(&self) -> &[ArgSpec] {
        &self.0.args
    }

    pub fn locals(&self) -> Option<&VarSet> {
        self.0.locals.as_ref()
    }

    pub fn has_header(&self) -> bool {
        !self.0.args.is_empty() || self.0.locals.is_some()
    }

    pub fn ptr_eq(&self, other: &Block) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Fresh copy with its own captured-locals set, so concurrent or
    /// recursive calls do not share mutable capture state.
    pub fn duplicate(&self) -> Block {
        Block(Rc::new(BlockBody {
            instrs: self.0.instrs.clone(),
            args: self.0.args.clone(),
            locals: self.0.locals.as_ref().map(VarSet::deep_copy),
        }))
    }

    /// Replace every `GetVar(sym)` with a push of `val`, recursing into
    /// nested literals. Backs the capture operator.
    pub fn capture_var(&self, sym: Symbol, val: &Obj) -> Block {
        let instrs = self
            .0
            .instrs
            .iter()
            .map(|i| substitute(i, sym, val))
            .collect();
        Block(Rc::new(BlockBody {
            instrs,
            args: self.0.args.clone(),
            locals: self.0.locals.as_ref().map(VarSet::deep_copy),
        }))
    }

    pub fn repr(&self, syms: &SymbolTable) -> String {
        let mut out = String::from("{");
        if !self.0.args.is_empty() {
            let args: Vec<String> = self
                .0
                .args
                .iter()
                .map(|a| match a.ty {
                    Some(t) => format!("{}::{}", syms.name(a.name), syms.name(t)),
                    None => syms.name(a.name).to_string(),
                })
                .collect();
            out.push_str(&args.join(" "));
            out.push(',');
        }
        for (i, instr) in self.0.instrs.iter().enumerate() {
            if i > 0 || !self.0.args.is_empty() {
                out.push(' ');
            }
            out.push_str(&instr.repr(syms));
        }
        out.push('}');
        out
    }
}

fn substitute(instr: &Instruction, sym: Symbol, val: &Obj) -> Instruction {
    match instr {
        Instruction::GetVar(s) if *s == sym => Instruction::Push(val.clone()),
        Instruction::ListLiteral(body) => {
            Instruction::ListLiteral(body.iter().map(|i| substitute(i, sym, val)).collect())
        }
        Instruction::DictLiteral(body) => {
            Instruction::DictLiteral(body.iter().map(|i| substitute(i, sym, val)).collect())
        }
        Instruction::BlockLiteral(b) => Instruction::BlockLiteral(b.capture_var(sym, val)),
        other => other.clone(),
    }
}

impl Instruction {
    pub fn repr(&self, syms: &SymbolTable) -> String {
        match self {
            Instruction::Push(o) => o.repr(syms),
            Instruction::ListLiteral(body) => {
                let inner: Vec<String> = body.iter().map(|i| i.repr(syms)).collect();
                format!("[{}]", inner.join(" "))
            }
            Instruction::BlockLiteral(b) => b.repr(syms),
            Instruction::DictLiteral(body) => {
                let inner: Vec<String> = body.iter().map(|i| i.repr(syms)).collect();
                format!("{{, {}}}", inner.join(" "))
            }
            Instruction::GetVar(s) | Instruction::QuoteGetVar(s) => syms.name(*s).to_string(),
            Instruction::SetVar(s) => format!(":{}", syms.name(*s)),
            Instruction::GetKeyVar(s) | Instruction::QuoteGetKeyVar(s) => {
                format!(".{}", syms.name(*s))
            }
            Instruction::SetKeyVar(s) => format!(".:{}", syms.name(*s)),
            Instruction::GetIndexNum(i) => format!(".[{i}]"),
            Instruction::GetIndexObj(o) => format!(".[{}]", o.repr(syms)),
            Instruction::GetIndexVar(s) => format!(".[{}]", syms.name(*s)),
            Instruction::GetIndexExpr(b) => format!(".[{}]", inner_repr(b, syms)),
            Instruction::SetIndexNum(i) => format!(".:[{i}]"),
            Instruction::SetIndexObj(o) => format!(".:[{}]", o.repr(syms)),
            Instruction::SetIndexVar(s) => format!(".:[{}]", syms.name(*s)),
            Instruction::SetIndexExpr(b) => format!(".:[{}]", inner_repr(b, syms)),
            Instruction::Interpolate(parts) => {
                let mut out = String::from("\"");
                for p in parts {
                    match p {
                        StrPart::Lit(s) => out.push_str(s),
                        StrPart::Var(v) => {
                            out.push('$');
                            out.push_str(syms.name(*v));
                        }
                        StrPart::Expr(b) => {
                            out.push_str("$(");
                            out.push_str(&inner_repr(b, syms));
                            out.push(')');
                        }
                    }
                }
                out.push('"');
                out
            }
            Instruction::Op(op) => op.name.to_string(),
            Instruction::Named(name) => format!(":{{{name}}}"),
        }
    }
}

fn inner_repr(b: &Block, syms: &SymbolTable) -> String {
    let full = b.repr(syms);
    full[1..full.len() - 1].trim().to_string()
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
    fn duplicate_detaches_locals() {
        let mut syms = SymbolTable::new();
        let x = syms.intern("x");
        let mut locals = VarSet::new();
        locals.set(x, int(1));
        let b = Block::with_header(vec![], vec![], Some(locals));
        let d = b.duplicate();
        assert!(!b.ptr_eq(&d));
        assert!(d.locals().unwrap().get(x).unwrap().obj_eq(&int(1)));
    }

    #[test]
    fn capture_substitutes_recursively() {
        let mut syms = SymbolTable::new();
        let x = syms.intern("x");
        let inner = Block::new(vec![Instruction::GetVar(x)]);
        let b = Block::new(vec![
            Instruction::GetVar(x),
            Instruction::BlockLiteral(inner),
            Instruction::ListLiteral(vec![Instruction::GetVar(x)]),
        ]);
        let c = b.capture_var(x, &int(42));
        assert!(matches!(c.instrs()[0], Instruction::Push(_)));
        if let Instruction::BlockLiteral(ib) = &c.instrs()[1] {
            assert!(matches!(ib.instrs()[0], Instruction::Push(_)));
        } else {
            panic!("expected nested block");
        }
        if let Instruction::ListLiteral(body) = &c.instrs()[2] {
            assert!(matches!(body[0], Instruction::Push(_)));
        } else {
            panic!("expected list literal");
        }
    }

    #[test]
    fn block_repr_with_args() {
        let mut syms = SymbolTable::new();
        let a = syms.intern("a");
        let num = syms.intern("num");
        let b = Block::with_header(
            vec![Instruction::GetVar(a)],
            vec![ArgSpec { name: a, ty: Some(num) }],
            None,
        );
        assert_eq!(b.repr(&syms), "{a::num, a}");
    }
}
