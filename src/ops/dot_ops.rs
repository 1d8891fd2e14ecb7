use std::cmp::Ordering;
use std::io::Write;

use super::{bin_dispatch, pop_pair, type_error, un_dispatch, BinSpec, OpDef, UnSpec};
use crate::interp::{Runtime, RuntimeError, Stack};
use crate::obj::{Block, Dict, Instruction, Number, Obj};

pub static TABLE: &[&OpDef] = &[
    &OP_SIGNUM, &OP_COPYN, &OP_IDIV, &OP_REPLACE, &OP_TOCHAR, &OP_SHL, &OP_SHR,
    &OP_GCD_CAPTURE, &OP_REMOVE, &OP_CEIL, &OP_CLEAR, &OP_HEAD, &OP_TAIL, &OP_EACHEQ,
    &OP_COND, &OP_MOVEN, &OP_BUNDLE, &OP_APPEND, &OP_SORT, &OP_RAISE, &OP_LEN,
    &OP_FLATTEN, &OP_WRITEFILE, &OP_IKEEP, &OP_TRYCATCH, &OP_META, &OP_FIND,
    &OP_PRINT, &OP_RAND, &OP_RANGE0, &OP_CASE, &OP_TRANSPOSE, &OP_PREPEND,
    &OP_EXPORT, &OP_DEREF, &OP_FLOOR, &OP_TOBLOCK, &OP_ABS, &OP_PARSEBLOCK,
];

pub fn op_for(c: char) -> Option<&'static OpDef> {
    Some(match c {
        '!' => &OP_SIGNUM,
        '$' => &OP_COPYN,
        '%' => &OP_IDIV,
        '&' => &OP_REPLACE,
        '\'' => &OP_TOCHAR,
        '(' => &OP_SHL,
        ')' => &OP_SHR,
        '+' => &OP_GCD_CAPTURE,
        '-' => &OP_REMOVE,
        '/' => &OP_CEIL,
        ';' => &OP_CLEAR,
        '<' => &OP_HEAD,
        '>' => &OP_TAIL,
        '=' => &OP_EACHEQ,
        '?' => &OP_COND,
        '@' => &OP_MOVEN,
        'A' => &OP_BUNDLE,
        'B' => &OP_APPEND,
        'C' => &OP_SORT,
        'D' => &OP_RAISE,
        'E' => &OP_LEN,
        'F' => &OP_FLATTEN,
        'G' => &OP_WRITEFILE,
        'I' => &OP_IKEEP,
        'K' => &OP_TRYCATCH,
        'M' => &OP_META,
        'N' => &OP_FIND,
        'P' => &OP_PRINT,
        'Q' => &OP_RAND,
        'R' => &OP_RANGE0,
        'S' => &OP_CASE,
        'T' => &OP_TRANSPOSE,
        'V' => &OP_PREPEND,
        'W' => &OP_EXPORT,
        'Z' => &OP_DEREF,
        '\\' => &OP_FLOOR,
        '^' => &OP_TOBLOCK,
        '|' => &OP_ABS,
        '~' => &OP_PARSEBLOCK,
        _ => return None,
    })
}

fn unary(rt: &mut Runtime, stack: &mut Stack, spec: &UnSpec) -> Result<(), RuntimeError> {
    let a = stack.pop()?;
    let r = un_dispatch(rt, stack, spec, &a)?;
    stack.push(r);
    Ok(())
}

static OP_SIGNUM: OpDef = OpDef {
    name: ".!",
    doc: "N| sign as -1, 0 or 1\nS| parsed number, or the string when not numeric",
    exec: |rt, stack| unary(rt, stack, &SIGNUM_SPEC),
};
static SIGNUM_SPEC: UnSpec = UnSpec {
    name: ".!",
    overload: Some("__signum__"),
    vect: true,
    num: Some(|n| Ok(n.signum())),
    extra: Some(|_, _, a| {
        if let Obj::Str(s) = a {
            let t = s.trim();
            if let Ok(i) = t.parse::<i64>() {
                return Ok(Some(Obj::Num(Number::Int(i))));
            }
            if let Ok(r) = t.parse::<f64>() {
                return Ok(Some(Obj::Num(Number::Real(r))));
            }
            // Non-numeric strings pass through unchanged.
            return Ok(Some(a.clone()));
        }
        Ok(None)
    }),
};

static OP_COPYN: OpDef = OpDef {
    name: ".$",
    doc: "N| copy the Nth item below the top to the top",
    exec: |rt, stack| {
        let n = pop_count(rt, stack, ".$")?;
        let v = stack.peek_n(n)?.clone();
        stack.push(v);
        Ok(())
    },
};

static OP_MOVEN: OpDef = OpDef {
    name: ".@",
    doc: "N| move the Nth item below the top to the top",
    exec: |rt, stack| {
        let n = pop_count(rt, stack, ".@")?;
        stack.lift(n)
    },
};

fn pop_count(rt: &mut Runtime, stack: &mut Stack, op: &str) -> Result<usize, RuntimeError> {
    let v = stack.pop()?;
    v.as_index()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| type_error(rt, op, &[&v]))
}

static OP_IDIV: OpDef = OpDef {
    name: ".%",
    doc: "NN| floor division",
    exec: |rt, stack| {
        let (a, b) = pop_pair(stack)?;
        let r = bin_dispatch(rt, stack, &IDIV_SPEC, &a, &b)?;
        stack.push(r);
        Ok(())
    },
};
static IDIV_SPEC: BinSpec = BinSpec {
    name: ".%",
    overload: Some(("__idiv__", "__ridiv__")),
    broadcast: true,
    zip: true,
    num: Some(Number::idiv),
    extra: None,
};

static OP_REPLACE: OpDef = OpDef {
    name: ".&",
    doc: "SSS| regex replace-all: subject pattern replacement\nLLB| zip two lists with a block",
    exec: |rt, stack| match stack.pop()? {
        Obj::Block(blk) => {
            let b = stack.pop()?;
            let a = stack.pop()?;
            let (xs, ys) = (a.iter_items(), b.iter_items());
            if !matches!(a, Obj::List(_) | Obj::Nums(_))
                || !matches!(b, Obj::List(_) | Obj::Nums(_))
            {
                return Err(type_error(rt, ".&", &[&a, &b, &Obj::Block(blk)]));
            }
            if xs.len() != ys.len() {
                return Err(RuntimeError::Value(format!(
                    "list length mismatch at ( .& ): {} vs {}",
                    xs.len(),
                    ys.len()
                )));
            }
            let mut out = Vec::with_capacity(xs.len());
            for (x, y) in xs.into_iter().zip(ys) {
                let mut s = Stack::new();
                s.push(x);
                s.push(y);
                rt.call_block(&blk, &mut s)?;
                out.push(s.pop()?);
            }
            stack.push(Obj::new_list(out));
            Ok(())
        }
        Obj::Str(replacement) => {
            let pattern = pop_str(rt, stack, ".&")?;
            let subject = pop_str(rt, stack, ".&")?;
            let re = regex::Regex::new(&pattern)
                .map_err(|e| RuntimeError::Value(format!("bad pattern at ( .& ): {e}")))?;
            let out = re.replace_all(&subject, replacement.as_str()).into_owned();
            stack.push(Obj::new_str(out));
            Ok(())
        }
        other => Err(type_error(rt, ".&", &[&other])),
    },
};

fn pop_str(rt: &mut Runtime, stack: &mut Stack, op: &str) -> Result<String, RuntimeError> {
    match stack.pop()? {
        Obj::Str(s) => Ok(s.as_str().to_string()),
        other => Err(type_error(rt, op, &[&other])),
    }
}

static OP_TOCHAR: OpDef = OpDef {
    name: ".'",
    doc: "N| char with that codepoint\nS| first char\nL| string from codepoints",
    exec: |rt, stack| {
        let v = stack.pop()?;
        let r = match &v {
            Obj::Char(_) => v.clone(),
            Obj::Num(n) => Obj::Char(codepoint_char(n)?),
            Obj::Str(s) => match s.chars().next() {
                Some(c) => Obj::Char(c),
                None => return Err(RuntimeError::Value("cannot cast \"\" to char".to_string())),
            },
            Obj::Nums(_) | Obj::List(_) => {
                let mut out = String::new();
                for item in v.iter_items() {
                    let n = item
                        .as_number()
                        .ok_or_else(|| type_error(rt, ".'", &[&item]))?;
                    out.push(codepoint_char(&n)?);
                }
                Obj::new_str(out)
            }
            _ => return Err(type_error(rt, ".'", &[&v])),
        };
        stack.push(r);
        Ok(())
    },
};

fn codepoint_char(n: &Number) -> Result<char, RuntimeError> {
    n.to_i64()
        .and_then(|i| u32::try_from(i).ok())
        .and_then(char::from_u32)
        .ok_or_else(|| RuntimeError::Value(format!("{n} is not a valid codepoint")))
}

static OP_SHL: OpDef = OpDef {
    name: ".(",
    doc: "NN| left shift",
    exec: |rt, stack| shift(rt, stack, ".(", |a, b| a.wrapping_shl(b as u32)),
};

static OP_SHR: OpDef = OpDef {
    name: ".)",
    doc: "NN| signed right shift",
    exec: |rt, stack| shift(rt, stack, ".)", |a, b| a.wrapping_shr(b as u32)),
};

fn shift(
    rt: &mut Runtime,
    stack: &mut Stack,
    op: &str,
    f: fn(i64, i64) -> i64,
) -> Result<(), RuntimeError> {
    let (a, b) = pop_pair(stack)?;
    match (a.as_number().and_then(|n| n.to_i64()), b.as_number().and_then(|n| n.to_i64())) {
        (Some(x), Some(y)) => {
            stack.push(Obj::Num(Number::Int(f(x, y))));
            Ok(())
        }
        _ => Err(type_error(rt, op, &[&a, &b])),
    }
}

static OP_GCD_CAPTURE: OpDef = OpDef {
    name: ".+",
    doc: "NN| gcd\nBJ| capture the named variable's value into a block copy\nBL| capture each named variable\nBD| capture dict values\nDD| update first dict with entries of second",
    exec: |rt, stack| {
        let (a, b) = pop_pair(stack)?;
        let r = match (&a, &b) {
            (Obj::Num(x), Obj::Num(y)) => Obj::Num(x.gcd(y)?),
            (Obj::Block(blk), Obj::Sym(s)) => {
                let v = rt.vars.get(*s).cloned().ok_or_else(|| RuntimeError::Key {
                    key: rt.symbols().name(*s).to_string(),
                })?;
                Obj::Block(blk.capture_var(*s, &v))
            }
            (Obj::Block(blk), Obj::List(_) | Obj::Nums(_)) => {
                let mut out = blk.clone();
                for item in b.iter_items() {
                    let s = match item {
                        Obj::Sym(s) => s,
                        other => return Err(type_error(rt, ".+", &[&a, &other])),
                    };
                    let v = rt.vars.get(s).cloned().ok_or_else(|| RuntimeError::Key {
                        key: rt.symbols().name(s).to_string(),
                    })?;
                    out = out.capture_var(s, &v);
                }
                Obj::Block(out)
            }
            (Obj::Block(blk), Obj::Dict(d)) => {
                let mut out = blk.clone();
                for k in d.sym_keys() {
                    if let Some(v) = d.get(k) {
                        out = out.capture_var(k, &v);
                    }
                }
                Obj::Block(out)
            }
            (Obj::Dict(x), Obj::Dict(y)) => {
                for k in y.sym_keys() {
                    if let Some(v) = y.get(k) {
                        x.set(k, v);
                    }
                }
                for k in y.str_keys() {
                    if let Some(v) = y.get_str(&k) {
                        x.set_str(k, v);
                    }
                }
                a.clone()
            }
            _ => return Err(type_error(rt, ".+", &[&a, &b])),
        };
        stack.push(r);
        Ok(())
    },
};

static OP_REMOVE: OpDef = OpDef {
    name: ".-",
    doc: "DJ|DS| remove dict key\nLN| remove list index",
    exec: |rt, stack| {
        let (a, b) = pop_pair(stack)?;
        match (&a, &b) {
            (Obj::Dict(d), Obj::Sym(s)) => {
                d.remove(*s);
            }
            (Obj::Dict(d), Obj::Str(s)) => {
                if crate::symbol::is_symbol_str(s) {
                    let sym = rt.sym(s);
                    d.remove(sym);
                } else {
                    d.remove_str(s);
                }
            }
            (Obj::List(l), Obj::Num(_)) => {
                let len = l.borrow().len();
                let i = norm_idx(rt, &b, len)?;
                l.borrow_mut().remove(i);
            }
            (Obj::Nums(l), Obj::Num(_)) => {
                let len = l.borrow().len();
                let i = norm_idx(rt, &b, len)?;
                l.borrow_mut().items_mut().remove(i);
            }
            _ => return Err(type_error(rt, ".-", &[&a, &b])),
        }
        stack.push(a);
        Ok(())
    },
};

fn norm_idx(rt: &mut Runtime, key: &Obj, len: usize) -> Result<usize, RuntimeError> {
    let i = key.as_index().ok_or_else(|| RuntimeError::Index {
        index: key.repr(rt.symbols()),
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

static OP_CEIL: OpDef = OpDef {
    name: "./",
    doc: "N| ceiling",
    exec: |rt, stack| unary(rt, stack, &CEIL_SPEC),
};
static CEIL_SPEC: UnSpec = UnSpec {
    name: "./",
    overload: Some("__ceil__"),
    vect: true,
    num: Some(|n| Ok(n.ceil())),
    extra: None,
};

static OP_FLOOR: OpDef = OpDef {
    name: ".\\",
    doc: "N| floor",
    exec: |rt, stack| unary(rt, stack, &FLOOR_SPEC),
};
static FLOOR_SPEC: UnSpec = UnSpec {
    name: ".\\",
    overload: Some("__floor__"),
    vect: true,
    num: Some(|n| Ok(n.floor())),
    extra: None,
};

static OP_ABS: OpDef = OpDef {
    name: ".|",
    doc: "N| absolute value",
    exec: |rt, stack| unary(rt, stack, &ABS_SPEC),
};
static ABS_SPEC: UnSpec = UnSpec {
    name: ".|",
    overload: Some("__abs__"),
    vect: true,
    num: Some(|n| Ok(n.abs())),
    extra: None,
};

static OP_CLEAR: OpDef = OpDef {
    name: ".;",
    doc: "| clear the whole stack",
    exec: |_rt, stack| {
        stack.clear();
        Ok(())
    },
};

static OP_HEAD: OpDef = OpDef {
    name: ".<",
    doc: "LN|SN| first N items\nNN| less than or equal",
    exec: |rt, stack| head_tail(rt, stack, true),
};

static OP_TAIL: OpDef = OpDef {
    name: ".>",
    doc: "LN|SN| last N items\nNN| greater than or equal",
    exec: |rt, stack| head_tail(rt, stack, false),
};

fn head_tail(rt: &mut Runtime, stack: &mut Stack, head: bool) -> Result<(), RuntimeError> {
    let (a, b) = pop_pair(stack)?;
    // The list form binds before numeric vectorization.
    if let (Obj::List(_) | Obj::Nums(_) | Obj::Str(_), Some(n)) = (&a, b.as_index()) {
        if n < 0 {
            return Err(RuntimeError::Value(format!(
                "cannot take {n} items at ( {} )",
                if head { ".<" } else { ".>" }
            )));
        }
        let n = n as usize;
        let r = match &a {
            Obj::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let k = n.min(chars.len());
                let slice = if head { &chars[..k] } else { &chars[chars.len() - k..] };
                Obj::new_str(slice.iter().collect::<String>())
            }
            _ => {
                let items = a.iter_items();
                let k = n.min(items.len());
                let slice = if head {
                    items[..k].to_vec()
                } else {
                    items[items.len() - k..].to_vec()
                };
                Obj::new_list(slice)
            }
        };
        stack.push(r);
        return Ok(());
    }
    let spec = if head { &LEQ_SPEC } else { &GEQ_SPEC };
    let r = bin_dispatch(rt, stack, spec, &a, &b)?;
    stack.push(r);
    Ok(())
}

static LEQ_SPEC: BinSpec = BinSpec {
    name: ".<",
    overload: Some(("__head__", "__head__")),
    broadcast: true,
    zip: true,
    num: Some(|a, b| ord_num(a, b, Ordering::Greater)),
    extra: None,
};
static GEQ_SPEC: BinSpec = BinSpec {
    name: ".>",
    overload: Some(("__tail__", "__tail__")),
    broadcast: true,
    zip: true,
    num: Some(|a, b| ord_num(a, b, Ordering::Less)),
    extra: None,
};

/// True when the ordering is anything but `exclude`.
fn ord_num(a: &Number, b: &Number, exclude: Ordering) -> Result<Number, RuntimeError> {
    match a.num_cmp(b) {
        Some(ord) => Ok(Number::from_bool(ord != exclude)),
        None => Err(RuntimeError::Value(
            "complex numbers are not ordered".to_string(),
        )),
    }
}

static OP_EACHEQ: OpDef = OpDef {
    name: ".=",
    doc: "LL| elementwise equality\nAA| equality",
    exec: |rt, stack| {
        let (a, b) = pop_pair(stack)?;
        let r = bin_dispatch(rt, stack, &EACHEQ_SPEC, &a, &b)?;
        stack.push(r);
        Ok(())
    },
};
static EACHEQ_SPEC: BinSpec = BinSpec {
    name: ".=",
    overload: Some(("__eq__", "__eq__")),
    broadcast: true,
    zip: true,
    num: Some(|a, b| Ok(Number::from_bool(a.num_eq(b)))),
    extra: Some(|_, _, a, b| Ok(Some(Obj::from_bool(a.obj_eq(b))))),
};

static OP_COND: OpDef = OpDef {
    name: ".?",
    doc: "AB| evaluate block when A is truthy",
    exec: |rt, stack| {
        let blk = stack.pop()?;
        let cond = stack.pop()?;
        if rt.truthy(&cond, stack)? {
            rt.eval_value(blk, stack)?;
        }
        Ok(())
    },
};

static OP_BUNDLE: OpDef = OpDef {
    name: ".A",
    doc: "| bundle the whole stack into a list",
    exec: |_rt, stack| {
        let items = stack.take_all();
        stack.push(Obj::new_list(items));
        Ok(())
    },
};

static OP_APPEND: OpDef = OpDef {
    name: ".B",
    doc: "LA| push item onto the back of a list",
    exec: |rt, stack| {
        let item = stack.pop()?;
        let list = stack.pop()?;
        attach(rt, stack, ".B", list, item, false)
    },
};

static OP_PREPEND: OpDef = OpDef {
    name: ".V",
    doc: "AL| push item onto the front of a list; the list is on top",
    exec: |rt, stack| {
        let list = stack.pop()?;
        let item = stack.pop()?;
        attach(rt, stack, ".V", list, item, true)
    },
};

fn attach(
    rt: &mut Runtime,
    stack: &mut Stack,
    op: &str,
    list: Obj,
    item: Obj,
    front: bool,
) -> Result<(), RuntimeError> {
    let out = match (&list, &item) {
        (Obj::List(l), _) => {
            if front {
                l.borrow_mut().insert(0, item);
            } else {
                l.borrow_mut().push(item);
            }
            list.clone()
        }
        (Obj::Nums(l), Obj::Num(n)) => {
            if front {
                l.borrow_mut().items_mut().insert(0, n.clone());
            } else {
                l.borrow_mut().push(n.clone());
            }
            list.clone()
        }
        (Obj::Nums(_), _) => {
            // A non-numeric element widens the container.
            let mut items = list.iter_items();
            if front {
                items.insert(0, item);
            } else {
                items.push(item);
            }
            Obj::new_list(items)
        }
        _ => return Err(type_error(rt, op, &[&list, &item])),
    };
    stack.push(out);
    Ok(())
}

static OP_SORT: OpDef = OpDef {
    name: ".C",
    doc: "L| sort ascending\nLB| sort by block-computed key",
    exec: |rt, stack| {
        let top = stack.pop()?;
        if let Obj::Block(blk) = top {
            let list = stack.pop()?;
            let items = list.iter_items();
            let mut keyed = Vec::with_capacity(items.len());
            for item in items {
                let mut s = Stack::new();
                s.push(item.clone());
                rt.call_block(&blk, &mut s)?;
                keyed.push((s.pop()?, item));
            }
            keyed.sort_by(|a, b| obj_cmp(&a.0, &b.0).unwrap_or(Ordering::Equal));
            stack.push(Obj::new_list(keyed.into_iter().map(|(_, v)| v).collect()));
            return Ok(());
        }
        let r = match &top {
            Obj::Nums(l) => {
                let mut l = l.borrow().clone();
                l.sort();
                Obj::new_nums(l)
            }
            Obj::List(_) => {
                let mut items = top.iter_items();
                items.sort_by(|a, b| obj_cmp(a, b).unwrap_or(Ordering::Equal));
                Obj::new_list(items)
            }
            Obj::Str(s) => {
                let mut chars: Vec<char> = s.chars().collect();
                chars.sort();
                Obj::new_str(chars.into_iter().collect::<String>())
            }
            _ => return Err(type_error(rt, ".C", &[&top])),
        };
        stack.push(r);
        Ok(())
    },
};

fn obj_cmp(a: &Obj, b: &Obj) -> Option<Ordering> {
    match (a, b) {
        (Obj::Str(x), Obj::Str(y)) => Some(x.cmp(y)),
        _ => a.as_number()?.num_cmp(&b.as_number()?),
    }
}

static OP_RAISE: OpDef = OpDef {
    name: ".D",
    doc: "A| raise an error with this description",
    exec: |rt, stack| {
        let v = stack.pop()?;
        let msg = rt.str_of(&v, stack)?;
        Err(RuntimeError::User(msg))
    },
};

static OP_LEN: OpDef = OpDef {
    name: ".E",
    doc: "L|S|D| number of elements",
    exec: |rt, stack| {
        let v = stack.pop()?;
        if let Obj::Dict(d) = &v {
            if let Some(f) = d.meta_get(rt.sym("__len__")) {
                let r = match f {
                    Obj::Block(b) => {
                        stack.push(v.clone());
                        rt.call_block(&b, stack)?;
                        stack.pop()?
                    }
                    other => other,
                };
                stack.push(r);
                return Ok(());
            }
        }
        let n = match &v {
            Obj::Str(s) => s.chars().count(),
            Obj::Nums(l) => l.borrow().len(),
            Obj::List(l) => l.borrow().len(),
            Obj::Dict(d) => d.len(),
            _ => return Err(type_error(rt, ".E", &[&v])),
        };
        stack.push(Obj::Num(Number::Int(n as i64)));
        Ok(())
    },
};

static OP_FLATTEN: OpDef = OpDef {
    name: ".F",
    doc: "L| flatten nested lists",
    exec: |rt, stack| {
        let v = stack.pop()?;
        if !matches!(v, Obj::List(_) | Obj::Nums(_)) {
            return Err(type_error(rt, ".F", &[&v]));
        }
        let mut out = Vec::new();
        flatten_into(&v, &mut out);
        stack.push(Obj::new_list(out));
        Ok(())
    },
};

fn flatten_into(v: &Obj, out: &mut Vec<Obj>) {
    match v {
        Obj::List(_) | Obj::Nums(_) => {
            for item in v.iter_items() {
                flatten_into(&item, out);
            }
        }
        other => out.push(other.clone()),
    }
}

static OP_WRITEFILE: OpDef = OpDef {
    name: ".G",
    doc: "ASN| write content to path; mode 0 overwrites, 1 appends",
    exec: |rt, stack| {
        let mode = stack.pop()?;
        let mode = mode
            .as_index()
            .filter(|m| *m == 0 || *m == 1)
            .ok_or_else(|| type_error(rt, ".G", &[&mode]))?;
        let path = pop_str(rt, stack, ".G")?;
        let content = {
            let v = stack.pop()?;
            rt.str_of(&v, stack)?
        };
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(mode == 1)
            .truncate(mode == 0)
            .open(&path)?;
        f.write_all(content.as_bytes())?;
        Ok(())
    },
};

static OP_IKEEP: OpDef = OpDef {
    name: ".I",
    doc: "LN|DK| index, keeping the container below the result",
    exec: |rt, stack| {
        let key = stack.pop()?;
        let cont = stack.pop()?;
        let v = rt.index_get(&cont, &key, stack)?;
        stack.push(cont);
        stack.push(v);
        Ok(())
    },
};

static OP_TRYCATCH: OpDef = OpDef {
    name: ".K",
    doc: "BB| run try block isolated; on error run catch block with the error text",
    exec: |rt, stack| {
        let catch = pop_block(rt, stack, ".K")?;
        let try_blk = pop_block(rt, stack, ".K")?;
        match rt.eval_isolated(&try_blk) {
            Ok(mut survived) => {
                stack.extend(survived.take_all());
                Ok(())
            }
            Err(err) => {
                let depth = rt.vars.depth();
                let mut s = Stack::new();
                s.push(Obj::new_str(err.to_string()));
                let r = rt.call_block(&catch, &mut s);
                rt.vars.truncate(depth);
                r?;
                stack.extend(s.take_all());
                Ok(())
            }
        }
    },
};

fn pop_block(rt: &mut Runtime, stack: &mut Stack, op: &str) -> Result<Block, RuntimeError> {
    match stack.pop()? {
        Obj::Block(b) => Ok(b),
        other => Err(type_error(rt, op, &[&other])),
    }
}

static OP_META: OpDef = OpDef {
    name: ".M",
    doc: "D| the dict's metatable, created when absent\nB| dict describing the block's args, types and locals",
    exec: |rt, stack| {
        let v = stack.pop()?;
        let r = match &v {
            Obj::Dict(d) => {
                let meta = match d.meta() {
                    Some(m) => m,
                    None => {
                        let m = Dict::new();
                        d.set_meta(Some(m.clone()));
                        m
                    }
                };
                Obj::Dict(meta)
            }
            Obj::Block(b) => {
                let info = Dict::new();
                let any = rt.sym("any");
                let args: Vec<Obj> = b.args().iter().map(|a| Obj::Sym(a.name)).collect();
                let types: Vec<Obj> = b
                    .args()
                    .iter()
                    .map(|a| Obj::Sym(a.ty.unwrap_or(any)))
                    .collect();
                let locals = Dict::new();
                if let Some(l) = b.locals() {
                    for (k, val) in l.iter() {
                        locals.set(k, val.clone());
                    }
                }
                info.set(rt.sym("args"), Obj::new_list(args));
                info.set(rt.sym("types"), Obj::new_list(types));
                info.set(rt.sym("locals"), Obj::Dict(locals));
                Obj::Dict(info)
            }
            _ => return Err(type_error(rt, ".M", &[&v])),
        };
        stack.push(r);
        Ok(())
    },
};

static OP_FIND: OpDef = OpDef {
    name: ".N",
    doc: "LB| index of first element satisfying the block, -1 when none",
    exec: |rt, stack| {
        let blk = pop_block(rt, stack, ".N")?;
        let list = stack.pop()?;
        if !matches!(list, Obj::List(_) | Obj::Nums(_)) {
            return Err(type_error(rt, ".N", &[&list, &Obj::Block(blk)]));
        }
        for (i, item) in list.iter_items().into_iter().enumerate() {
            let mut s = Stack::new();
            s.push(item);
            rt.call_block(&blk, &mut s)?;
            let verdict = s.pop()?;
            if rt.truthy(&verdict, stack)? {
                stack.push(Obj::Num(Number::Int(i as i64)));
                return Ok(());
            }
        }
        stack.push(Obj::Num(Number::Int(-1)));
        Ok(())
    },
};

static OP_PRINT: OpDef = OpDef {
    name: ".P",
    doc: "A| print display string to stdout",
    exec: |rt, stack| {
        let v = stack.pop()?;
        let s = rt.str_of(&v, stack)?;
        rt.print(&s)
    },
};

static OP_RAND: OpDef = OpDef {
    name: ".Q",
    doc: "| random double in [0,1)",
    exec: |_rt, stack| {
        stack.push(Obj::Num(Number::Real(fastrand::f64())));
        Ok(())
    },
};

static OP_RANGE0: OpDef = OpDef {
    name: ".R",
    doc: "N| the list 0 1 .. N-1; negative N counts up to 0; 0 is empty",
    exec: |rt, stack| {
        let v = stack.pop()?;
        let n = v.as_index().ok_or_else(|| type_error(rt, ".R", &[&v]))?;
        let items: Vec<Number> = if n > 0 {
            (0..n).map(Number::Int).collect()
        } else if n < 0 {
            (n + 1..=0).map(Number::Int).collect()
        } else {
            Vec::new()
        };
        stack.push(Obj::new_nums(crate::obj::NumberList::new(items)));
        Ok(())
    },
};

static OP_CASE: OpDef = OpDef {
    name: ".S",
    doc: "L| first element; evaluated in place when a block",
    exec: |rt, stack| {
        let list = stack.pop()?;
        let items = list.iter_items();
        if !matches!(list, Obj::List(_) | Obj::Nums(_)) {
            return Err(type_error(rt, ".S", &[&list]));
        }
        let first = items
            .into_iter()
            .next()
            .ok_or_else(|| RuntimeError::Value("empty list at ( .S )".to_string()))?;
        rt.eval_value(first, stack)
    },
};

static OP_TRANSPOSE: OpDef = OpDef {
    name: ".T",
    doc: "L| transpose a list of equal-length rows",
    exec: |rt, stack| {
        let v = stack.pop()?;
        if !matches!(v, Obj::List(_) | Obj::Nums(_)) {
            return Err(type_error(rt, ".T", &[&v]));
        }
        let rows: Vec<Vec<Obj>> = v
            .iter_items()
            .into_iter()
            .map(|r| {
                if matches!(r, Obj::List(_) | Obj::Nums(_)) {
                    Ok(r.iter_items())
                } else {
                    Err(type_error(rt, ".T", &[&r]))
                }
            })
            .collect::<Result<_, _>>()?;
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != width) {
            return Err(RuntimeError::Value(
                "ragged rows at ( .T )".to_string(),
            ));
        }
        let mut cols = Vec::with_capacity(width);
        for j in 0..width {
            cols.push(Obj::new_list(rows.iter().map(|r| r[j].clone()).collect()));
        }
        stack.push(Obj::new_list(cols));
        Ok(())
    },
};

static OP_EXPORT: OpDef = OpDef {
    name: ".W",
    doc: "D| assign each entry as a variable in the enclosing scopes",
    exec: |rt, stack| {
        let v = stack.pop()?;
        let Obj::Dict(d) = &v else {
            return Err(type_error(rt, ".W", &[&v]));
        };
        for k in d.sym_keys() {
            if let Some(val) = d.get(k) {
                rt.vars.set(k, val);
            }
        }
        Ok(())
    },
};

static OP_DEREF: OpDef = OpDef {
    name: ".Z",
    doc: "S|C|J| dereference the variable with this name",
    exec: |rt, stack| {
        let v = stack.pop()?;
        let sym = name_sym(rt, &v).ok_or_else(|| type_error(rt, ".Z", &[&v]))?;
        let val = rt.vars.get(sym).cloned().ok_or_else(|| RuntimeError::Key {
            key: rt.symbols().name(sym).to_string(),
        })?;
        rt.eval_value(val, stack)
    },
};

fn name_sym(rt: &mut Runtime, v: &Obj) -> Option<crate::symbol::Symbol> {
    match v {
        Obj::Sym(s) => Some(*s),
        Obj::Char(c) => {
            let s = c.to_string();
            crate::symbol::is_symbol_str(&s).then(|| rt.sym(&s))
        }
        Obj::Str(s) => crate::symbol::is_symbol_str(s).then(|| rt.sym(s)),
        _ => None,
    }
}

static OP_TOBLOCK: OpDef = OpDef {
    name: ".^",
    doc: "L| compile a list into a block; block elements are spliced",
    exec: |rt, stack| {
        let v = stack.pop()?;
        if !matches!(v, Obj::List(_) | Obj::Nums(_)) {
            return Err(type_error(rt, ".^", &[&v]));
        }
        let mut instrs = Vec::new();
        for item in v.iter_items() {
            match item {
                Obj::Block(b) => instrs.extend(b.instrs().iter().cloned()),
                other => instrs.push(Instruction::Push(other)),
            }
        }
        stack.push(Obj::Block(Block::new(instrs)));
        Ok(())
    },
};

static OP_PARSEBLOCK: OpDef = OpDef {
    name: ".~",
    doc: "S| compile string to a block without running it\nJ|C| raw value of the named variable, wrapped in a block when not one",
    exec: |rt, stack| {
        let v = stack.pop()?;
        let r = match &v {
            Obj::Str(s) => {
                let blk = rt
                    .compile(s)
                    .map_err(|e| RuntimeError::Syntax(e.to_string()))?;
                Obj::Block(blk)
            }
            Obj::Sym(_) | Obj::Char(_) => {
                let sym = name_sym(rt, &v).ok_or_else(|| type_error(rt, ".~", &[&v]))?;
                let val = rt.vars.get(sym).cloned().ok_or_else(|| RuntimeError::Key {
                    key: rt.symbols().name(sym).to_string(),
                })?;
                match val {
                    Obj::Block(_) => val,
                    other => Obj::Block(Block::new(vec![Instruction::Push(other)])),
                }
            }
            _ => return Err(type_error(rt, ".~", &[&v])),
        };
        stack.push(r);
        Ok(())
    },
};
