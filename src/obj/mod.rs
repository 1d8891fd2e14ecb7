pub mod block;
pub mod dict;
pub mod number;
pub mod numlist;

use std::cell::RefCell;
use std::rc::Rc;

pub use block::{ArgSpec, Block, Instruction};
pub use dict::Dict;
pub use number::Number;
pub use numlist::NumberList;

use crate::symbol::{Symbol, SymbolTable};

/// A runtime value. Lists and dicts are shared by reference; strings
/// are immutable and replaced wholesale on write.
#[derive(Debug, Clone)]
pub enum Obj {
    Num(Number),
    Char(char),
    Str(Rc<String>),
    /// A list statically known to hold only numbers; numeric operators
    /// vectorize over it.
    Nums(Rc<RefCell<NumberList>>),
    List(Rc<RefCell<Vec<Obj>>>),
    Dict(Dict),
    Block(Block),
    Sym(Symbol),
}

impl Obj {
    pub fn new_str(s: impl Into<String>) -> Obj {
        Obj::Str(Rc::new(s.into()))
    }

    pub fn new_nums(l: NumberList) -> Obj {
        Obj::Nums(Rc::new(RefCell::new(l)))
    }

    /// Build a list, packing it as `Nums` when every element is a
    /// number so vectorized dispatch applies.
    pub fn new_list(items: Vec<Obj>) -> Obj {
        if !items.is_empty() && items.iter().all(|o| matches!(o, Obj::Num(_))) {
            let nums = items
                .into_iter()
                .map(|o| match o {
                    Obj::Num(n) => n,
                    _ => unreachable!(),
                })
                .collect();
            Obj::new_nums(NumberList::new(nums))
        } else {
            Obj::List(Rc::new(RefCell::new(items)))
        }
    }

    pub fn from_bool(b: bool) -> Obj {
        Obj::Num(Number::from_bool(b))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Obj::Num(_) => "num",
            Obj::Char(_) => "char",
            Obj::Str(_) => "str",
            Obj::Nums(_) | Obj::List(_) => "list",
            Obj::Dict(_) => "dict",
            Obj::Block(_) => "block",
            Obj::Sym(_) => "sym",
        }
    }

    /// Truthiness before any `__bool__` overload is consulted: zero,
    /// the empty string and the empty list are falsy.
    pub fn base_truthy(&self) -> bool {
        match self {
            Obj::Num(n) => !n.is_zero(),
            Obj::Str(s) => !s.is_empty(),
            Obj::Nums(l) => !l.borrow().is_empty(),
            Obj::List(l) => !l.borrow().is_empty(),
            _ => true,
        }
    }

    /// The numeric value of a num or char operand, if it has one.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Obj::Num(n) => Some(n.clone()),
            Obj::Char(c) => Some(Number::Int(*c as i64)),
            _ => None,
        }
    }

    pub fn as_index(&self) -> Option<i64> {
        self.as_number()?.to_i64()
    }

    /// Deep copy. Dict metatables are shared, not copied, so overload
    /// behavior carries over to the copy.
    pub fn deep_copy(&self) -> Obj {
        match self {
            Obj::Nums(l) => Obj::new_nums(l.borrow().clone()),
            Obj::List(l) => {
                let items = l.borrow().iter().map(Obj::deep_copy).collect();
                Obj::List(Rc::new(RefCell::new(items)))
            }
            Obj::Dict(d) => Obj::Dict(d.deep_copy()),
            other => other.clone(),
        }
    }

    pub fn list_len(&self) -> Option<usize> {
        match self {
            Obj::Nums(l) => Some(l.borrow().len()),
            Obj::List(l) => Some(l.borrow().len()),
            _ => None,
        }
    }

    /// Structural equality. Chars compare equal to their codepoint.
    /// Blocks compare by identity; dict metatables are ignored.
    pub fn obj_eq(&self, other: &Obj) -> bool {
        match (self, other) {
            (Obj::Num(a), Obj::Num(b)) => a.num_eq(b),
            (Obj::Char(a), Obj::Char(b)) => a == b,
            (Obj::Num(_), Obj::Char(_)) | (Obj::Char(_), Obj::Num(_)) => {
                match (self.as_number(), other.as_number()) {
                    (Some(a), Some(b)) => a.num_eq(&b),
                    _ => false,
                }
            }
            (Obj::Str(a), Obj::Str(b)) => a == b,
            (Obj::Sym(a), Obj::Sym(b)) => a == b,
            (Obj::Block(a), Obj::Block(b)) => a.ptr_eq(b),
            (Obj::Dict(a), Obj::Dict(b)) => a.dict_eq(b),
            (Obj::Nums(a), Obj::Nums(b)) => a.borrow().list_eq(&b.borrow()),
            (Obj::Nums(_), Obj::List(_)) | (Obj::List(_), Obj::Nums(_)) => {
                let (av, bv) = (self.iter_items(), other.iter_items());
                av.len() == bv.len() && av.iter().zip(&bv).all(|(a, b)| a.obj_eq(b))
            }
            (Obj::List(a), Obj::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (av, bv) = (a.borrow(), b.borrow());
                av.len() == bv.len() && av.iter().zip(bv.iter()).all(|(x, y)| x.obj_eq(y))
            }
            _ => false,
        }
    }

    /// Snapshot of list contents as boxed objects; empty for non-lists.
    pub fn iter_items(&self) -> Vec<Obj> {
        match self {
            Obj::Nums(l) => l.borrow().items().iter().cloned().map(Obj::Num).collect(),
            Obj::List(l) => l.borrow().clone(),
            _ => Vec::new(),
        }
    }

    /// Display form: strings and chars print bare, everything else as
    /// its repr.
    pub fn str_form(&self, syms: &SymbolTable) -> String {
        match self {
            Obj::Str(s) => s.as_str().to_string(),
            Obj::Char(c) => c.to_string(),
            other => other.repr(syms),
        }
    }

    /// Source-like form. Cyclic structures print `...` at the revisit.
    pub fn repr(&self, syms: &SymbolTable) -> String {
        let mut seen = Vec::new();
        self.repr_inner(syms, &mut seen)
    }

    fn repr_inner(&self, syms: &SymbolTable, seen: &mut Vec<*const ()>) -> String {
        match self {
            Obj::Num(n) => n.to_string(),
            Obj::Char(c) => format!("'{c}"),
            Obj::Str(s) => format!("\"{}\"", escape_str(s)),
            Obj::Sym(s) => format!("::{}", syms.name(*s)),
            Obj::Block(b) => b.repr(syms),
            Obj::Nums(l) => l.borrow().to_string(),
            Obj::List(l) => {
                let ptr = Rc::as_ptr(l) as *const ();
                if seen.contains(&ptr) {
                    return "[...]".to_string();
                }
                seen.push(ptr);
                let body = l
                    .borrow()
                    .iter()
                    .map(|o| o.repr_inner(syms, seen))
                    .collect::<Vec<_>>()
                    .join(" ");
                seen.pop();
                format!("[{body}]")
            }
            Obj::Dict(d) => d.repr(syms, seen),
        }
    }
}

fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}
