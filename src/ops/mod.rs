pub mod dot_ops;
pub mod math_ops;
pub mod std_ops;

use crate::interp::{Runtime, RuntimeError, Stack};
use crate::obj::{Number, Obj};

/// One table operator. The three namespace tables hold these as
/// statics; the generator embeds a reference per operator token.
#[derive(Debug)]
pub struct OpDef {
    pub name: &'static str,
    pub doc: &'static str,
    pub exec: fn(&mut Runtime, &mut Stack) -> Result<(), RuntimeError>,
}

pub fn std_op(c: char) -> Option<&'static OpDef> {
    std_ops::op_for(c)
}

pub fn dot_op(c: char) -> Option<&'static OpDef> {
    dot_ops::op_for(c)
}

pub fn math_op(c: char) -> Option<&'static OpDef> {
    math_ops::op_for(c)
}

/// Name lookup across all three tables; backs the `:{name}` literal.
pub fn by_name(name: &str) -> Option<&'static OpDef> {
    std_ops::TABLE
        .iter()
        .chain(dot_ops::TABLE)
        .chain(math_ops::TABLE)
        .copied()
        .find(|op| op.name == name)
}

pub fn type_error(rt: &Runtime, op: &str, operands: &[&Obj]) -> RuntimeError {
    RuntimeError::Type {
        op: op.to_string(),
        operands: operands
            .iter()
            .map(|o| o.repr(rt.symbols()))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

type NumBin = fn(&Number, &Number) -> Result<Number, RuntimeError>;
type NumUn = fn(&Number) -> Result<Number, RuntimeError>;
type ExtraBin =
    fn(&mut Runtime, &mut Stack, &Obj, &Obj) -> Result<Option<Obj>, RuntimeError>;
type ExtraUn = fn(&mut Runtime, &mut Stack, &Obj) -> Result<Option<Obj>, RuntimeError>;

/// Dispatch recipe for a binary operator. The tiers run in a fixed
/// order: list vectorization, metatable overload, concrete patterns
/// (`extra` first, then the numeric kernel), and finally a type error.
pub struct BinSpec {
    pub name: &'static str,
    /// (key, reverse key) probed when an operand is a dict.
    pub overload: Option<(&'static str, &'static str)>,
    /// Scalar-to-list broadcasting.
    pub broadcast: bool,
    /// Elementwise list-to-list with length check. Off for operators
    /// that give two lists a different meaning (such as concat).
    pub zip: bool,
    pub num: Option<NumBin>,
    pub extra: Option<ExtraBin>,
}

pub struct UnSpec {
    pub name: &'static str,
    pub overload: Option<&'static str>,
    pub vect: bool,
    pub num: Option<NumUn>,
    pub extra: Option<ExtraUn>,
}

fn is_list(o: &Obj) -> bool {
    matches!(o, Obj::Nums(_) | Obj::List(_))
}

pub fn bin_dispatch(
    rt: &mut Runtime,
    stack: &mut Stack,
    spec: &BinSpec,
    a: &Obj,
    b: &Obj,
) -> Result<Obj, RuntimeError> {
    // Tier 1: vectorize.
    if is_list(a) && is_list(b) && spec.zip {
        if let (Obj::Nums(x), Obj::Nums(y), Some(num)) = (a, b, spec.num) {
            let r = x.borrow().zip_with(&y.borrow(), num)?;
            return Ok(Obj::new_nums(r));
        }
        let (xs, ys) = (a.iter_items(), b.iter_items());
        if xs.len() != ys.len() {
            return Err(RuntimeError::Value(format!(
                "list length mismatch at ( {} ): {} vs {}",
                spec.name,
                xs.len(),
                ys.len()
            )));
        }
        let items = xs
            .iter()
            .zip(&ys)
            .map(|(x, y)| bin_dispatch(rt, stack, spec, x, y))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Obj::new_list(items));
    }
    if is_list(a) && !is_list(b) && spec.broadcast {
        if let (Obj::Nums(x), Some(n), Some(num)) = (a, b.as_number(), spec.num) {
            let r = x.borrow().with_scalar_rhs(&n, num)?;
            return Ok(Obj::new_nums(r));
        }
        let items = a
            .iter_items()
            .iter()
            .map(|x| bin_dispatch(rt, stack, spec, x, b))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Obj::new_list(items));
    }
    if is_list(b) && !is_list(a) && spec.broadcast {
        if let (Obj::Nums(y), Some(n), Some(num)) = (b, a.as_number(), spec.num) {
            let r = y.borrow().with_scalar_lhs(&n, num)?;
            return Ok(Obj::new_nums(r));
        }
        let items = b
            .iter_items()
            .iter()
            .map(|y| bin_dispatch(rt, stack, spec, a, y))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Obj::new_list(items));
    }

    // Tier 2: metatable overload.
    if let Some((key, rkey)) = spec.overload {
        if let Obj::Dict(d) = b {
            if let Some(f) = d.meta_get(rt.sym(key)) {
                return call_overload(rt, stack, &f, a, b);
            }
        }
        if let Obj::Dict(d) = a {
            if let Some(f) = d.meta_get(rt.sym(rkey)) {
                return call_overload(rt, stack, &f, b, a);
            }
        }
    }

    // Tier 3: concrete patterns.
    if let Some(extra) = spec.extra {
        if let Some(r) = extra(rt, stack, a, b)? {
            return Ok(r);
        }
    }
    if let Some(num) = spec.num {
        if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
            return num(&x, &y).map(Obj::Num);
        }
    }
    Err(type_error(rt, spec.name, &[a, b]))
}

pub fn un_dispatch(
    rt: &mut Runtime,
    stack: &mut Stack,
    spec: &UnSpec,
    a: &Obj,
) -> Result<Obj, RuntimeError> {
    if spec.vect && is_list(a) {
        if let (Obj::Nums(x), Some(num)) = (a, spec.num) {
            let items = x
                .borrow()
                .items()
                .iter()
                .map(num)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Obj::new_nums(crate::obj::NumberList::new(items)));
        }
        let items = a
            .iter_items()
            .iter()
            .map(|x| un_dispatch(rt, stack, spec, x))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Obj::new_list(items));
    }
    if let Some(key) = spec.overload {
        if let Obj::Dict(d) = a {
            if let Some(f) = d.meta_get(rt.sym(key)) {
                return match f {
                    Obj::Block(blk) => {
                        stack.push(a.clone());
                        rt.call_block(&blk, stack)?;
                        stack.pop()
                    }
                    other => Ok(other),
                };
            }
        }
    }
    if let Some(extra) = spec.extra {
        if let Some(r) = extra(rt, stack, a)? {
            return Ok(r);
        }
    }
    if let Some(num) = spec.num {
        if let Some(x) = a.as_number() {
            return num(&x).map(Obj::Num);
        }
    }
    Err(type_error(rt, spec.name, &[a]))
}

/// Invoke an overload binding. Blocks run with `other` under `self` on
/// the stack (so a `{self other,}` header reads naturally); a non-block
/// binding is the result itself.
fn call_overload(
    rt: &mut Runtime,
    stack: &mut Stack,
    f: &Obj,
    other: &Obj,
    this: &Obj,
) -> Result<Obj, RuntimeError> {
    match f {
        Obj::Block(blk) => {
            stack.push(other.clone());
            stack.push(this.clone());
            rt.call_block(blk, stack)?;
            stack.pop()
        }
        other_val => Ok(other_val.clone()),
    }
}

/// Pop `b` then `a` for a binary operator written `a b OP`.
pub fn pop_pair(stack: &mut Stack) -> Result<(Obj, Obj), RuntimeError> {
    let b = stack.pop()?;
    let a = stack.pop()?;
    Ok((a, b))
}
