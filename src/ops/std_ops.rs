use super::{bin_dispatch, pop_pair, type_error, un_dispatch, BinSpec, OpDef, UnSpec};
use crate::interp::{Runtime, RuntimeError, Stack};
use crate::obj::{Number, NumberList, Obj};

pub static TABLE: &[&OpDef] = &[
    &OP_NOT, &OP_MAP, &OP_DUP, &OP_MOD, &OP_AND, &OP_MUL, &OP_ADD, &OP_SUB, &OP_DIV,
    &OP_POP, &OP_LT, &OP_EQ, &OP_GT, &OP_IF, &OP_ROT, &OP_WRAP, &OP_SCI, &OP_INDEX,
    &OP_CONCAT, &OP_HOLD, &OP_TOSTR, &OP_SWAP, &OP_RANGE, &OP_REVERSE, &OP_WHILE,
    &OP_POW, &OP_OR, &OP_EVAL,
];

pub fn op_for(c: char) -> Option<&'static OpDef> {
    Some(match c {
        '!' => &OP_NOT,
        '#' => &OP_MAP,
        '$' => &OP_DUP,
        '%' => &OP_MOD,
        '&' => &OP_AND,
        '*' => &OP_MUL,
        '+' => &OP_ADD,
        '-' => &OP_SUB,
        '/' => &OP_DIV,
        ';' => &OP_POP,
        '<' => &OP_LT,
        '=' => &OP_EQ,
        '>' => &OP_GT,
        '?' => &OP_IF,
        '@' => &OP_ROT,
        'A' => &OP_WRAP,
        'E' => &OP_SCI,
        'I' => &OP_INDEX,
        'K' => &OP_CONCAT,
        'L' => &OP_HOLD,
        'P' => &OP_TOSTR,
        'Q' | '\\' => &OP_SWAP,
        'R' => &OP_RANGE,
        'V' => &OP_REVERSE,
        'W' => &OP_WHILE,
        '^' => &OP_POW,
        '|' => &OP_OR,
        '~' => &OP_EVAL,
        _ => return None,
    })
}

fn binary(
    rt: &mut Runtime,
    stack: &mut Stack,
    spec: &BinSpec,
) -> Result<(), RuntimeError> {
    let (a, b) = pop_pair(stack)?;
    let r = bin_dispatch(rt, stack, spec, &a, &b)?;
    stack.push(r);
    Ok(())
}

fn unary(rt: &mut Runtime, stack: &mut Stack, spec: &UnSpec) -> Result<(), RuntimeError> {
    let a = stack.pop()?;
    let r = un_dispatch(rt, stack, spec, &a)?;
    stack.push(r);
    Ok(())
}

static OP_ADD: OpDef = OpDef {
    name: "+",
    doc: "NN| sum\nSA|AS| concatenated string\nCN|NC| shifted char\nLL| concatenated list",
    exec: |rt, stack| binary(rt, stack, &ADD_SPEC),
};
static ADD_SPEC: BinSpec = BinSpec {
    name: "+",
    overload: Some(("__add__", "__radd__")),
    broadcast: true,
    zip: false,
    num: Some(Number::add),
    extra: Some(add_extra),
};

fn add_extra(
    rt: &mut Runtime,
    stack: &mut Stack,
    a: &Obj,
    b: &Obj,
) -> Result<Option<Obj>, RuntimeError> {
    match (a, b) {
        (Obj::List(_) | Obj::Nums(_), Obj::List(_) | Obj::Nums(_)) => {
            let mut items = a.iter_items();
            items.extend(b.iter_items());
            Ok(Some(Obj::new_list(items)))
        }
        (Obj::Str(_), _) | (_, Obj::Str(_)) => {
            let sa = rt.str_of(a, stack)?;
            let sb = rt.str_of(b, stack)?;
            Ok(Some(Obj::new_str(sa + &sb)))
        }
        (Obj::Char(x), Obj::Char(y)) => Ok(Some(Obj::new_str(format!("{x}{y}")))),
        (Obj::Char(c), Obj::Num(n)) | (Obj::Num(n), Obj::Char(c)) => {
            Ok(shift_char(*c, n, 1))
        }
        _ => Ok(None),
    }
}

/// Char plus or minus an integer offset; out-of-range falls through to
/// the numeric kernel.
fn shift_char(c: char, n: &Number, sign: i64) -> Option<Obj> {
    let off = n.to_i64()?;
    let code = c as i64 + sign * off;
    u32::try_from(code).ok().and_then(char::from_u32).map(Obj::Char)
}

static OP_SUB: OpDef = OpDef {
    name: "-",
    doc: "NN| difference\nCN| back-shifted char",
    exec: |rt, stack| binary(rt, stack, &SUB_SPEC),
};
static SUB_SPEC: BinSpec = BinSpec {
    name: "-",
    overload: Some(("__sub__", "__rsub__")),
    broadcast: true,
    zip: true,
    num: Some(Number::sub),
    extra: Some(sub_extra),
};

fn sub_extra(
    _rt: &mut Runtime,
    _stack: &mut Stack,
    a: &Obj,
    b: &Obj,
) -> Result<Option<Obj>, RuntimeError> {
    match (a, b) {
        (Obj::Char(c), Obj::Num(n)) => Ok(shift_char(*c, n, -1)),
        _ => Ok(None),
    }
}

static OP_MUL: OpDef = OpDef {
    name: "*",
    doc: "NN| product",
    exec: |rt, stack| binary(rt, stack, &MUL_SPEC),
};
static MUL_SPEC: BinSpec = BinSpec {
    name: "*",
    overload: Some(("__mul__", "__rmul__")),
    broadcast: true,
    zip: true,
    num: Some(Number::mul),
    extra: None,
};

static OP_DIV: OpDef = OpDef {
    name: "/",
    doc: "NN| quotient; int when exact",
    exec: |rt, stack| binary(rt, stack, &DIV_SPEC),
};
static DIV_SPEC: BinSpec = BinSpec {
    name: "/",
    overload: Some(("__div__", "__rdiv__")),
    broadcast: true,
    zip: true,
    num: Some(Number::div),
    extra: None,
};

static OP_MOD: OpDef = OpDef {
    name: "%",
    doc: "NN| remainder, sign of dividend",
    exec: |rt, stack| binary(rt, stack, &MOD_SPEC),
};
static MOD_SPEC: BinSpec = BinSpec {
    name: "%",
    overload: Some(("__mod__", "__rmod__")),
    broadcast: true,
    zip: true,
    num: Some(Number::rem),
    extra: None,
};

static OP_POW: OpDef = OpDef {
    name: "^",
    doc: "NN| power",
    exec: |rt, stack| binary(rt, stack, &POW_SPEC),
};
static POW_SPEC: BinSpec = BinSpec {
    name: "^",
    overload: Some(("__pow__", "__rpow__")),
    broadcast: true,
    zip: true,
    num: Some(Number::pow),
    extra: None,
};

static OP_LT: OpDef = OpDef {
    name: "<",
    doc: "NN|SS|CC| a less than b",
    exec: |rt, stack| binary(rt, stack, &LT_SPEC),
};
static LT_SPEC: BinSpec = BinSpec {
    name: "<",
    overload: Some(("__lt__", "__rlt__")),
    broadcast: true,
    zip: true,
    num: Some(|a, b| cmp_num(a, b, std::cmp::Ordering::Less)),
    extra: Some(|_, _, a, b| cmp_extra(a, b, std::cmp::Ordering::Less)),
};

static OP_GT: OpDef = OpDef {
    name: ">",
    doc: "NN|SS|CC| a greater than b",
    exec: |rt, stack| binary(rt, stack, &GT_SPEC),
};
static GT_SPEC: BinSpec = BinSpec {
    name: ">",
    overload: Some(("__gt__", "__rgt__")),
    broadcast: true,
    zip: true,
    num: Some(|a, b| cmp_num(a, b, std::cmp::Ordering::Greater)),
    extra: Some(|_, _, a, b| cmp_extra(a, b, std::cmp::Ordering::Greater)),
};

fn cmp_num(
    a: &Number,
    b: &Number,
    want: std::cmp::Ordering,
) -> Result<Number, RuntimeError> {
    match a.num_cmp(b) {
        Some(ord) => Ok(Number::from_bool(ord == want)),
        None => Err(RuntimeError::Value(
            "complex numbers are not ordered".to_string(),
        )),
    }
}

fn cmp_extra(
    a: &Obj,
    b: &Obj,
    want: std::cmp::Ordering,
) -> Result<Option<Obj>, RuntimeError> {
    match (a, b) {
        (Obj::Str(x), Obj::Str(y)) => Ok(Some(Obj::from_bool(x.cmp(y) == want))),
        _ => Ok(None),
    }
}

static OP_EQ: OpDef = OpDef {
    name: "=",
    doc: "AA| deep structural equality",
    exec: |rt, stack| binary(rt, stack, &EQ_SPEC),
};
static EQ_SPEC: BinSpec = BinSpec {
    name: "=",
    overload: Some(("__eq__", "__eq__")),
    broadcast: false,
    zip: false,
    num: None,
    extra: Some(|_, _, a, b| Ok(Some(Obj::from_bool(a.obj_eq(b))))),
};

static OP_NOT: OpDef = OpDef {
    name: "!",
    doc: "A| logical not",
    exec: |rt, stack| unary(rt, stack, &NOT_SPEC),
};
static NOT_SPEC: UnSpec = UnSpec {
    name: "!",
    overload: None,
    vect: true,
    num: Some(|n| Ok(Number::from_bool(n.is_zero()))),
    extra: Some(|_, _, a| Ok(Some(Obj::from_bool(!a.base_truthy())))),
};

static OP_SCI: OpDef = OpDef {
    name: "E",
    doc: "N| ten to the Nth",
    exec: |rt, stack| unary(rt, stack, &SCI_SPEC),
};
static SCI_SPEC: UnSpec = UnSpec {
    name: "E",
    overload: None,
    vect: true,
    num: Some(|n| Number::Int(10).pow(n)),
    extra: None,
};

static OP_DUP: OpDef = OpDef {
    name: "$",
    doc: "A| duplicate top; lists are deep-copied",
    exec: |_rt, stack| {
        let v = stack.peek()?.clone();
        let v = match v {
            Obj::List(_) | Obj::Nums(_) => v.deep_copy(),
            other => other,
        };
        stack.push(v);
        Ok(())
    },
};

static OP_POP: OpDef = OpDef {
    name: ";",
    doc: "A| discard top",
    exec: |_rt, stack| stack.pop().map(|_| ()),
};

static OP_SWAP: OpDef = OpDef {
    name: "\\",
    doc: "AB| swap top two",
    exec: |_rt, stack| stack.lift(1),
};

static OP_ROT: OpDef = OpDef {
    name: "@",
    doc: "ABC| rotate third item to top",
    exec: |_rt, stack| stack.lift(2),
};

static OP_WRAP: OpDef = OpDef {
    name: "A",
    doc: "A| wrap top in a one-element list",
    exec: |_rt, stack| {
        let v = stack.pop()?;
        stack.push(Obj::new_list(vec![v]));
        Ok(())
    },
};

static OP_IF: OpDef = OpDef {
    name: "?",
    doc: "ABC| if A then B else C; chosen block evaluated, value pushed",
    exec: |rt, stack| {
        let otherwise = stack.pop()?;
        let then = stack.pop()?;
        let cond = stack.pop()?;
        let chosen = if rt.truthy(&cond, stack)? { then } else { otherwise };
        rt.eval_value(chosen, stack)
    },
};

static OP_WHILE: OpDef = OpDef {
    name: "W",
    doc: "B| evaluate block, pop condition, repeat while truthy",
    exec: |rt, stack| {
        let blk = match stack.pop()? {
            Obj::Block(b) => b,
            other => return Err(type_error(rt, "W", &[&other])),
        };
        loop {
            rt.call_block(&blk, stack)?;
            let cond = stack.pop()?;
            if !rt.truthy(&cond, stack)? {
                return Ok(());
            }
        }
    },
};

static OP_MAP: OpDef = OpDef {
    name: "#",
    doc: "LB| map block over list elements",
    exec: |rt, stack| {
        let blk = match stack.pop()? {
            Obj::Block(b) => b,
            other => return Err(type_error(rt, "#", &[&other])),
        };
        let list = stack.pop()?;
        let items = match &list {
            Obj::List(_) | Obj::Nums(_) => list.iter_items(),
            Obj::Str(s) => s.chars().map(Obj::Char).collect(),
            other => return Err(type_error(rt, "#", &[other, &Obj::Block(blk)])),
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let mut s = Stack::new();
            s.push(item);
            rt.call_block(&blk, &mut s)?;
            out.extend(s.take_all());
        }
        stack.push(Obj::new_list(out));
        Ok(())
    },
};

static OP_INDEX: OpDef = OpDef {
    name: "I",
    doc: "LN|DK| index into list or dict",
    exec: |rt, stack| {
        let key = stack.pop()?;
        let cont = stack.pop()?;
        let v = rt.index_get(&cont, &key, stack)?;
        stack.push(v);
        Ok(())
    },
};

static OP_CONCAT: OpDef = OpDef {
    name: "K",
    doc: "LL| concatenated list\nSS| concatenated string\nLA| append\nAL| prepend",
    exec: |rt, stack| {
        let (a, b) = pop_pair(stack)?;
        let r = match (&a, &b) {
            (Obj::List(_) | Obj::Nums(_), Obj::List(_) | Obj::Nums(_)) => {
                let mut items = a.iter_items();
                items.extend(b.iter_items());
                Obj::new_list(items)
            }
            (Obj::Str(x), Obj::Str(y)) => Obj::new_str(format!("{x}{y}")),
            (Obj::List(_) | Obj::Nums(_), _) => {
                let mut items = a.iter_items();
                items.push(b);
                Obj::new_list(items)
            }
            (_, Obj::List(_) | Obj::Nums(_)) => {
                let mut items = vec![a];
                items.extend(b.iter_items());
                Obj::new_list(items)
            }
            _ => return Err(type_error(rt, "K", &[&a, &b])),
        };
        stack.push(r);
        Ok(())
    },
};

static OP_HOLD: OpDef = OpDef {
    name: "L",
    doc: "N| collect top N stack items into a list",
    exec: |rt, stack| {
        let n = stack.pop()?;
        let n = n
            .as_index()
            .filter(|n| *n >= 0)
            .ok_or_else(|| type_error(rt, "L", &[&n]))?;
        let items = stack.pop_n(n as usize)?;
        stack.push(Obj::new_list(items));
        Ok(())
    },
};

static OP_TOSTR: OpDef = OpDef {
    name: "P",
    doc: "A| display string of top",
    exec: |rt, stack| {
        let v = stack.pop()?;
        let s = rt.str_of(&v, stack)?;
        stack.push(Obj::new_str(s));
        Ok(())
    },
};

static OP_RANGE: OpDef = OpDef {
    name: "R",
    doc: "N| the list 1 2 .. N",
    exec: |rt, stack| {
        let v = stack.pop()?;
        let n = v.as_index().ok_or_else(|| type_error(rt, "R", &[&v]))?;
        stack.push(Obj::new_nums(NumberList::range_to(n)));
        Ok(())
    },
};

static OP_REVERSE: OpDef = OpDef {
    name: "V",
    doc: "L|S| reversed list or string",
    exec: |rt, stack| {
        let v = stack.pop()?;
        let r = match &v {
            Obj::Nums(l) => {
                let mut l = l.borrow().clone();
                l.reverse();
                Obj::new_nums(l)
            }
            Obj::List(_) => {
                let mut items = v.iter_items();
                items.reverse();
                Obj::new_list(items)
            }
            Obj::Str(s) => Obj::new_str(s.chars().rev().collect::<String>()),
            _ => return Err(type_error(rt, "V", &[&v])),
        };
        stack.push(r);
        Ok(())
    },
};

static OP_AND: OpDef = OpDef {
    name: "&",
    doc: "NN| bitwise and on ints, logical otherwise",
    exec: |rt, stack| bitwise(rt, stack, |a, b| a & b, |a, b| a && b),
};

static OP_OR: OpDef = OpDef {
    name: "|",
    doc: "NN| bitwise or on ints, logical otherwise",
    exec: |rt, stack| bitwise(rt, stack, |a, b| a | b, |a, b| a || b),
};

fn bitwise(
    rt: &mut Runtime,
    stack: &mut Stack,
    bits: fn(i64, i64) -> i64,
    logic: fn(bool, bool) -> bool,
) -> Result<(), RuntimeError> {
    let (a, b) = pop_pair(stack)?;
    if let (Some(Number::Int(x)), Some(Number::Int(y))) = (a.as_number(), b.as_number()) {
        stack.push(Obj::Num(Number::Int(bits(x, y))));
        return Ok(());
    }
    let ta = rt.truthy(&a, stack)?;
    let tb = rt.truthy(&b, stack)?;
    stack.push(Obj::from_bool(logic(ta, tb)));
    Ok(())
}

static OP_EVAL: OpDef = OpDef {
    name: "~",
    doc: "B| evaluate block\nS| compile and run string\nJ| dereference symbol",
    exec: |rt, stack| {
        match stack.pop()? {
            Obj::Block(b) => rt.call_block(&b, stack),
            Obj::Str(s) => {
                let blk = rt
                    .compile(&s)
                    .map_err(|e| RuntimeError::Syntax(e.to_string()))?;
                rt.call_block(&blk, stack)
            }
            Obj::Sym(sym) => {
                let v = rt.vars.get(sym).cloned().ok_or_else(|| RuntimeError::Key {
                    key: rt.symbols().name(sym).to_string(),
                })?;
                rt.eval_value(v, stack)
            }
            other => Err(type_error(rt, "~", &[&other])),
        }
    },
};
