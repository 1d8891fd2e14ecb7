//! `:{json.dumps}` and `:{json.loads}`.

use serde_json::{Map, Value};

use crate::interp::{Runtime, RuntimeError, Stack};
use crate::obj::{Dict, Number, Obj};
use crate::symbol::is_symbol_str;

/// Serialize the dict on top of the stack to a JSON string.
pub fn dumps(rt: &mut Runtime, stack: &mut Stack) -> Result<(), RuntimeError> {
    let o = stack.pop()?;
    let Obj::Dict(_) = &o else {
        return Err(RuntimeError::Type {
            op: "json.dumps".to_string(),
            operands: o.repr(rt.symbols()),
        });
    };
    let v = to_value(&o, rt)?;
    let text = serde_json::to_string(&v)
        .map_err(|e| RuntimeError::Value(format!("json encode failed: {e}")))?;
    stack.push(Obj::new_str(text));
    Ok(())
}

/// Parse the JSON string on top of the stack into dicts and lists.
pub fn loads(rt: &mut Runtime, stack: &mut Stack) -> Result<(), RuntimeError> {
    let o = stack.pop()?;
    let Obj::Str(s) = &o else {
        return Err(RuntimeError::Type {
            op: "json.loads".to_string(),
            operands: o.repr(rt.symbols()),
        });
    };
    let v: Value = serde_json::from_str(s)
        .map_err(|e| RuntimeError::Value(format!("json parse failed: {e}")))?;
    stack.push(from_value(&v, rt));
    Ok(())
}

fn to_value(o: &Obj, rt: &Runtime) -> Result<Value, RuntimeError> {
    match o {
        Obj::Num(n) => num_value(n),
        Obj::Char(c) => Ok(Value::String(c.to_string())),
        Obj::Str(s) => Ok(Value::String(s.to_string())),
        Obj::Nums(l) => l.borrow().items().iter().map(num_value).collect(),
        Obj::List(l) => l.borrow().iter().map(|x| to_value(x, rt)).collect(),
        Obj::Dict(d) => {
            let mut map = Map::new();
            for sym in d.sym_keys() {
                if let Some(v) = d.get(sym) {
                    map.insert(rt.symbols().name(sym).to_string(), to_value(&v, rt)?);
                }
            }
            for key in d.str_keys() {
                if let Some(v) = d.get_str(&key) {
                    map.insert(key, to_value(&v, rt)?);
                }
            }
            Ok(Value::Object(map))
        }
        Obj::Block(_) | Obj::Sym(_) => Err(RuntimeError::Value(format!(
            "cannot serialize {} to json",
            o.type_name()
        ))),
    }
}

fn num_value(n: &Number) -> Result<Value, RuntimeError> {
    if let Some(i) = n.to_i64() {
        return Ok(Value::from(i));
    }
    serde_json::Number::from_f64(n.to_f64())
        .map(Value::Number)
        .ok_or_else(|| RuntimeError::Value("cannot serialize non-finite number to json".to_string()))
}

fn from_value(v: &Value, rt: &mut Runtime) -> Obj {
    match v {
        // There is no null value; zero stands in.
        Value::Null => Obj::Num(Number::Int(0)),
        Value::Bool(b) => Obj::from_bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Obj::Num(Number::Int(i)),
            None => Obj::Num(Number::Real(n.as_f64().unwrap_or(f64::NAN))),
        },
        Value::String(s) => Obj::new_str(s.clone()),
        Value::Array(items) => {
            Obj::new_list(items.iter().map(|x| from_value(x, rt)).collect())
        }
        Value::Object(map) => {
            let d = Dict::new();
            for (k, val) in map {
                let o = from_value(val, rt);
                if is_symbol_str(k) {
                    d.set(rt.sym(k), o);
                } else {
                    d.set_str(k.clone(), o);
                }
            }
            Obj::Dict(d)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> (Runtime, Stack) {
        let mut rt = Runtime::new();
        let blk = rt.compile(src).unwrap();
        let mut stack = Stack::new();
        rt.run_instrs(blk.instrs(), &mut stack).unwrap();
        (rt, stack)
    }

    #[test]
    fn dumps_dict() {
        let (_, mut stack) = run("{, 1:a} :{json.dumps}");
        let Obj::Str(s) = stack.pop().unwrap() else {
            panic!("expected string");
        };
        assert_eq!(&*s, "{\"a\":1}");
    }

    #[test]
    fn dumps_requires_dict() {
        let mut rt = Runtime::new();
        let blk = rt.compile("5 :{json.dumps}").unwrap();
        let mut stack = Stack::new();
        let e = rt.run_instrs(blk.instrs(), &mut stack).unwrap_err();
        assert!(matches!(e, RuntimeError::Type { .. }));
    }

    #[test]
    fn loads_round_trip() {
        let (mut rt, mut stack) =
            run("\"{\\\"a\\\": [1, 2.5], \\\"b c\\\": null}\" :{json.loads}");
        let Obj::Dict(d) = stack.pop().unwrap() else {
            panic!("expected dict");
        };
        let a = rt.sym("a");
        let items = d.get(a).unwrap().iter_items();
        assert_eq!(items.len(), 2);
        // Non-symbol keys land in the string map; null reads as zero.
        assert!(d.get_str("b c").unwrap().obj_eq(&Obj::Num(Number::Int(0))));
    }

    #[test]
    fn nested_structures_serialize() {
        let (_, mut stack) = run("{, [1 2 3]:xs {, \"s\":name}:inner} :{json.dumps}");
        let Obj::Str(s) = stack.pop().unwrap() else {
            panic!("expected string");
        };
        let v: Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["xs"], serde_json::json!([1, 2, 3]));
        assert_eq!(v["inner"]["name"], "s");
    }
}
