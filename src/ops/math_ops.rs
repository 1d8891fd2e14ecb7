use super::{pop_pair, type_error, un_dispatch, OpDef, UnSpec};
use crate::interp::{Runtime, RuntimeError, Stack};
use crate::obj::{Number, NumberList, Obj};

pub static TABLE: &[&OpDef] = &[
    &OP_FACT, &OP_TIME, &OP_ACOS, &OP_COMPLEX, &OP_LOG10, &OP_ASIN, &OP_ATAN,
    &OP_COS, &OP_TODOUBLE, &OP_EXP, &OP_IMAG, &OP_LN, &OP_HASMETA, &OP_PRIMES,
    &OP_TORATIONAL, &OP_SIN, &OP_TAN, &OP_ATAN2,
];

pub fn op_for(c: char) -> Option<&'static OpDef> {
    Some(match c {
        '!' => &OP_FACT,
        '$' => &OP_TIME,
        'C' => &OP_ACOS,
        'I' => &OP_COMPLEX,
        'L' => &OP_LOG10,
        'S' => &OP_ASIN,
        'T' => &OP_ATAN,
        'c' => &OP_COS,
        'd' => &OP_TODOUBLE,
        'e' => &OP_EXP,
        'i' => &OP_IMAG,
        'l' => &OP_LN,
        'm' => &OP_HASMETA,
        'p' => &OP_PRIMES,
        'r' => &OP_TORATIONAL,
        's' => &OP_SIN,
        't' => &OP_TAN,
        'u' => &OP_ATAN2,
        _ => return None,
    })
}

fn unary(rt: &mut Runtime, stack: &mut Stack, spec: &UnSpec) -> Result<(), RuntimeError> {
    let a = stack.pop()?;
    let r = un_dispatch(rt, stack, spec, &a)?;
    stack.push(r);
    Ok(())
}

macro_rules! float_op {
    ($op:ident, $spec:ident, $name:literal, $ovl:literal, $kernel:ident, $doc:literal) => {
        static $op: OpDef = OpDef {
            name: $name,
            doc: $doc,
            exec: |rt, stack| unary(rt, stack, &$spec),
        };
        static $spec: UnSpec = UnSpec {
            name: $name,
            overload: Some($ovl),
            vect: true,
            num: Some(|n| Ok(n.$kernel())),
            extra: None,
        };
    };
}

float_op!(OP_SIN, SIN_SPEC, "Ms", "__sin__", sin, "N| sine");
float_op!(OP_COS, COS_SPEC, "Mc", "__cos__", cos, "N| cosine");
float_op!(OP_TAN, TAN_SPEC, "Mt", "__tan__", tan, "N| tangent");
float_op!(OP_ASIN, ASIN_SPEC, "MS", "__asin__", asin, "N| inverse sine");
float_op!(OP_ACOS, ACOS_SPEC, "MC", "__acos__", acos, "N| inverse cosine");
float_op!(OP_ATAN, ATAN_SPEC, "MT", "__atan__", atan, "N| inverse tangent");
float_op!(OP_EXP, EXP_SPEC, "Me", "__exp__", exp, "N| e to the N");
float_op!(OP_LN, LN_SPEC, "Ml", "__ln__", ln, "N| natural log");
float_op!(OP_LOG10, LOG10_SPEC, "ML", "__log__", log10, "N| base-10 log");
float_op!(OP_IMAG, IMAG_SPEC, "Mi", "__imag__", imag, "N| imaginary part");

static OP_FACT: OpDef = OpDef {
    name: "M!",
    doc: "N| factorial",
    exec: |rt, stack| unary(rt, stack, &FACT_SPEC),
};
static FACT_SPEC: UnSpec = UnSpec {
    name: "M!",
    overload: Some("__fact__"),
    vect: true,
    num: Some(Number::factorial),
    extra: None,
};

static OP_TORATIONAL: OpDef = OpDef {
    name: "Mr",
    doc: "N| nearest rational",
    exec: |rt, stack| unary(rt, stack, &TORATIONAL_SPEC),
};
static TORATIONAL_SPEC: UnSpec = UnSpec {
    name: "Mr",
    overload: None,
    vect: true,
    num: Some(Number::to_rational),
    extra: None,
};

static OP_TODOUBLE: OpDef = OpDef {
    name: "Md",
    doc: "N| value as a double\nS| parsed double",
    exec: |rt, stack| unary(rt, stack, &TODOUBLE_SPEC),
};
static TODOUBLE_SPEC: UnSpec = UnSpec {
    name: "Md",
    overload: Some("__float__"),
    vect: true,
    num: Some(|n| Ok(Number::Real(n.to_f64()))),
    extra: Some(|_, _, a| match a {
        Obj::Str(s) => match s.trim().parse::<f64>() {
            Ok(r) => Ok(Some(Obj::Num(Number::Real(r)))),
            Err(_) => Err(RuntimeError::Value(format!(
                "cannot parse {s:?} as a number"
            ))),
        },
        _ => Ok(None),
    }),
};

static OP_TIME: OpDef = OpDef {
    name: "M$",
    doc: "| current time in milliseconds since the epoch",
    exec: |_rt, stack| {
        let ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        stack.push(Obj::Num(Number::Int(ms)));
        Ok(())
    },
};

static OP_COMPLEX: OpDef = OpDef {
    name: "MI",
    doc: "NN| complex number from real and imaginary parts",
    exec: |rt, stack| {
        let (a, b) = pop_pair(stack)?;
        match (a.as_number(), b.as_number()) {
            (Some(re), Some(im)) => {
                stack.push(Obj::Num(Number::Complex(num_complex::Complex64::new(
                    re.to_f64(),
                    im.to_f64(),
                ))));
                Ok(())
            }
            _ => Err(type_error(rt, "MI", &[&a, &b])),
        }
    },
};

static OP_HASMETA: OpDef = OpDef {
    name: "Mm",
    doc: "A| whether the value is a dict with a metatable",
    exec: |_rt, stack| {
        let v = stack.pop()?;
        let has = matches!(&v, Obj::Dict(d) if d.has_meta());
        stack.push(Obj::from_bool(has));
        Ok(())
    },
};

static OP_PRIMES: OpDef = OpDef {
    name: "Mp",
    doc: "N| primes up to and including N",
    exec: |rt, stack| {
        let v = stack.pop()?;
        let n = v.as_index().ok_or_else(|| type_error(rt, "Mp", &[&v]))?;
        let primes = crate::obj::number::primes_up_to(n)
            .into_iter()
            .map(Number::Int)
            .collect();
        stack.push(Obj::new_nums(NumberList::new(primes)));
        Ok(())
    },
};

static OP_ATAN2: OpDef = OpDef {
    name: "Mu",
    doc: "NN| atan2 of y and x",
    exec: |rt, stack| {
        let (y, x) = pop_pair(stack)?;
        match (y.as_number(), x.as_number()) {
            (Some(a), Some(b)) => {
                stack.push(Obj::Num(Number::Real(a.to_f64().atan2(b.to_f64()))));
                Ok(())
            }
            _ => Err(type_error(rt, "Mu", &[&y, &x])),
        }
    },
};
