pub mod chars;
pub mod scanner;
pub mod token;

use thiserror::Error;

use crate::env::VarSet;
use crate::interp::{Runtime, Stack};
use crate::obj::block::StrPart;
use crate::obj::{number, ArgSpec, Block, Instruction, Number, Obj};
use crate::{ext, ops};
use scanner::Scanner;
use token::{GroupKind, Node, RawPart, StrTok, Token};

#[derive(Debug, Error)]
#[error("syntax error: {msg} in:\n\t{context}")]
pub struct SyntaxError {
    pub msg: String,
    pub context: String,
}

fn err(msg: impl Into<String>, context: &str) -> SyntaxError {
    let mut context = context.trim().to_string();
    if context.len() > 60 {
        context.truncate(60);
        context.push_str("...");
    }
    SyntaxError {
        msg: msg.into(),
        context,
    }
}

/// Full pipeline: tokenize, assemble delimiters, generate instructions.
pub fn compile(src: &str, rt: &mut Runtime) -> Result<Block, SyntaxError> {
    let tokens = tokenize(src, rt)?;
    let nodes = assemble(tokens, src)?;
    let instrs = generate(&nodes, rt, src)?;
    Ok(Block::new(instrs))
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_lowercase() || c == '_'
}

fn is_op_char(c: char) -> bool {
    ('!'..='~').contains(&c)
}

pub fn tokenize(src: &str, rt: &mut Runtime) -> Result<Vec<Token>, SyntaxError> {
    let mut s = Scanner::new(src);
    let mut out = Vec::new();
    while let Some(c) = s.next() {
        match c {
            c if c.is_whitespace() => {}
            '0'..='9' => {
                s.back();
                out.push(Token::Num(lex_number(&mut s, false)));
            }
            '-' if next_starts_number(&s) => {
                out.push(Token::Num(lex_number(&mut s, true)));
            }
            '"' => out.push(lex_string(&mut s, src)?),
            '\'' => out.push(lex_char(&mut s, src)?),
            c if is_ident_char(c) => {
                s.back();
                out.push(Token::Var(s.take_while(is_ident_char)));
            }
            'M' => match s.next() {
                Some(m) if is_op_char(m) => out.push(Token::MathOp(m)),
                _ => return Err(err("expected operator char after 'M'", src)),
            },
            '.' => lex_dot(&mut s, rt, &mut out, src)?,
            ':' => lex_colon(&mut s, &mut out, src)?,
            '`' => out.push(Token::Tick),
            '#' => out.push(Token::Pound),
            '{' => out.push(Token::OpenCurly),
            '}' => out.push(Token::CloseCurly),
            '[' => out.push(Token::OpenSquare),
            ']' => out.push(Token::CloseSquare),
            '(' => out.push(Token::OpenParen),
            ')' => out.push(Token::CloseParen),
            ',' => out.push(Token::Comma),
            c if is_op_char(c) => out.push(Token::Op(c)),
            c => return Err(err(format!("unexpected character {c:?}"), src)),
        }
    }
    Ok(out)
}

fn next_starts_number(s: &Scanner) -> bool {
    matches!(s.peek(), Some(d) if d.is_ascii_digit())
        || (s.peek() == Some('.') && matches!(s.peek2(), Some(d) if d.is_ascii_digit()))
}

fn lex_number(s: &mut Scanner, neg: bool) -> Number {
    let int_part = s.take_while(|c| c.is_ascii_digit());
    let mut frac = None;
    if s.peek() == Some('.') && matches!(s.peek2(), Some(d) if d.is_ascii_digit()) {
        s.next();
        frac = Some(s.take_while(|c| c.is_ascii_digit()));
    }
    let sign = if neg { "-" } else { "" };
    match frac {
        Some(f) => {
            let whole = if int_part.is_empty() { "0" } else { &int_part };
            let text = format!("{sign}{whole}.{f}");
            Number::Real(text.parse().unwrap_or(f64::NAN))
        }
        None => {
            let text = format!("{sign}{int_part}");
            match text.parse::<i64>() {
                Ok(i) => Number::Int(i),
                // Overlong literals go straight to big.
                Err(_) => Number::Big(text.parse().unwrap_or_default()),
            }
        }
    }
}

fn lex_string(s: &mut Scanner, src: &str) -> Result<Token, SyntaxError> {
    if s.peek() == Some('"') && s.peek2() == Some('"') {
        s.next();
        s.next();
        let mut content = String::new();
        loop {
            match s.next() {
                None => return Err(err("unterminated raw string", src)),
                Some('"') if s.peek() == Some('"') && s.peek2() == Some('"') => {
                    s.next();
                    s.next();
                    return Ok(Token::Str(StrTok::Plain(content)));
                }
                Some(c) => content.push(c),
            }
        }
    }
    let mut parts: Vec<RawPart> = Vec::new();
    let mut cur = String::new();
    loop {
        let c = s.next().ok_or_else(|| err("unterminated string", src))?;
        match c {
            '"' => break,
            '\\' => {
                let e = s.next().ok_or_else(|| err("unterminated string", src))?;
                match e {
                    'n' => cur.push('\n'),
                    't' => cur.push('\t'),
                    'r' => cur.push('\r'),
                    'b' => cur.push('\u{8}'),
                    'f' => cur.push('\u{c}'),
                    '"' => cur.push('"'),
                    '\\' => cur.push('\\'),
                    '$' => cur.push('$'),
                    '{' => {
                        let name = s.take_while(|c| c != '}' && c != '"');
                        if s.next() != Some('}') {
                            return Err(err("unterminated \\{..} escape", src));
                        }
                        match chars::named_char(&name) {
                            Some(nc) => cur.push(nc),
                            None => return Err(err(format!("unknown named char {name:?}"), src)),
                        }
                    }
                    // Unknown escapes pass through verbatim.
                    other => {
                        cur.push('\\');
                        cur.push(other);
                    }
                }
            }
            '$' => match s.peek() {
                Some('(') => {
                    s.next();
                    let expr = take_balanced(s, src)?;
                    if !cur.is_empty() {
                        parts.push(RawPart::Lit(std::mem::take(&mut cur)));
                    }
                    parts.push(RawPart::Expr(expr));
                }
                Some(p) if is_ident_char(p) => {
                    let name = s.take_while(is_ident_char);
                    if !cur.is_empty() {
                        parts.push(RawPart::Lit(std::mem::take(&mut cur)));
                    }
                    parts.push(RawPart::Var(name));
                }
                _ => cur.push('$'),
            },
            other => cur.push(other),
        }
    }
    if parts.is_empty() {
        Ok(Token::Str(StrTok::Plain(cur)))
    } else {
        if !cur.is_empty() {
            parts.push(RawPart::Lit(cur));
        }
        Ok(Token::Str(StrTok::Interp(parts)))
    }
}

/// Source between `$(` and its matching `)`.
fn take_balanced(s: &mut Scanner, src: &str) -> Result<String, SyntaxError> {
    let mut depth = 1usize;
    let mut out = String::new();
    loop {
        let c = s
            .next()
            .ok_or_else(|| err("unterminated $( in string", src))?;
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(out);
                }
            }
            _ => {}
        }
        out.push(c);
    }
}

fn lex_char(s: &mut Scanner, src: &str) -> Result<Token, SyntaxError> {
    match s.next() {
        None => Err(err("unterminated char literal", src)),
        Some('\\') => {
            let name = s.take_while(|c| c != '\'');
            if s.next() != Some('\'') {
                return Err(err("unterminated char literal", src));
            }
            match chars::named_char(&name) {
                Some(c) => Ok(Token::Char(c)),
                None => Err(err(format!("unknown named char {name:?}"), src)),
            }
        }
        Some(c) => Ok(Token::Char(c)),
    }
}

fn lex_dot(
    s: &mut Scanner,
    rt: &mut Runtime,
    out: &mut Vec<Token>,
    src: &str,
) -> Result<(), SyntaxError> {
    match s.peek() {
        Some(d) if d.is_ascii_digit() => {
            // Leading-dot decimal.
            let frac = s.take_while(|c| c.is_ascii_digit());
            let v: f64 = format!("0.{frac}").parse().unwrap_or(f64::NAN);
            out.push(Token::Num(Number::Real(v)));
        }
        Some('#') => {
            s.next();
            let doc = s.peek() == Some('?');
            if doc {
                s.next();
            }
            let text = s.take_while(|c| c != '\n');
            if doc {
                rt.add_help(text.trim().to_string());
            }
        }
        Some('{') => {
            s.next();
            let doc = s.peek() == Some('?');
            if doc {
                s.next();
            }
            let mut text = String::new();
            loop {
                match s.next() {
                    None => return Err(err("unterminated block comment", src)),
                    Some('.') if s.peek() == Some('}') => {
                        s.next();
                        break;
                    }
                    Some(c) => text.push(c),
                }
            }
            if doc {
                rt.add_help(text.trim().to_string());
            }
        }
        Some(':') => {
            s.next();
            out.push(Token::DotColon);
        }
        Some('`') => {
            s.next();
            out.push(Token::FnQuote);
        }
        Some('[') => {
            s.next();
            out.push(Token::IndexOpen);
        }
        Some('"') => {
            s.next();
            let name = s.take_while(|c| c != '"');
            if s.next() != Some('"') {
                return Err(err("unterminated quoted key variable", src));
            }
            out.push(Token::KeyVar(name));
        }
        Some(c) if is_ident_char(c) => {
            out.push(Token::KeyVar(s.take_while(is_ident_char)));
        }
        Some(c) if is_op_char(c) => {
            s.next();
            out.push(Token::DotOp(c));
        }
        _ => return Err(err("expected token after '.'", src)),
    }
    Ok(())
}

fn lex_colon(s: &mut Scanner, out: &mut Vec<Token>, src: &str) -> Result<(), SyntaxError> {
    match s.peek() {
        Some(d) if d.is_ascii_digit() || d == '-' => {
            let body = s.take_while(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
            let n = number::parse_encoded(&body).map_err(|m| err(m, src))?;
            out.push(Token::Num(n));
        }
        Some('{') => {
            s.next();
            let name = s.take_while(|c| c != '}');
            if s.next() != Some('}') {
                return Err(err("unterminated :{..} operator", src));
            }
            out.push(Token::NamedOp(name));
        }
        Some('#') => {
            s.next();
            out.push(Token::ColonPound);
        }
        Some('"') => {
            s.next();
            let name = s.take_while(|c| c != '"');
            if s.next() != Some('"') {
                return Err(err("unterminated quoted assignment", src));
            }
            out.push(Token::QuotedSet(name));
        }
        Some(':') => {
            s.next();
            if s.peek() == Some('"') {
                s.next();
                let name = s.take_while(|c| c != '"');
                if s.next() != Some('"') {
                    return Err(err("unterminated quoted symbol", src));
                }
                out.push(Token::SymLit(name));
                return Ok(());
            }
            let name = s.take_while(is_ident_char);
            if !name.is_empty() {
                out.push(Token::SymLit(name));
                return Ok(());
            }
            // Operator-char fallback, two chars when the first is a
            // namespace prefix.
            match s.next() {
                Some(c) if is_op_char(c) => {
                    let name = if (c == '.' || c == 'M')
                        && matches!(s.peek(), Some(n) if is_op_char(n))
                    {
                        let n = s.next().unwrap_or_default();
                        format!("{c}{n}")
                    } else {
                        c.to_string()
                    };
                    out.push(Token::SymLit(name));
                }
                _ => return Err(err("expected name after '::'", src)),
            }
        }
        _ => out.push(Token::Colon),
    }
    Ok(())
}

fn assemble(tokens: Vec<Token>, src: &str) -> Result<Vec<Node>, SyntaxError> {
    let mut it = tokens.into_iter();
    assemble_until(&mut it, None, src)
}

fn assemble_until(
    it: &mut std::vec::IntoIter<Token>,
    close: Option<&Token>,
    src: &str,
) -> Result<Vec<Node>, SyntaxError> {
    let mut out = Vec::new();
    while let Some(tok) = it.next() {
        let group = match tok {
            Token::OpenCurly => Some((GroupKind::Block, Token::CloseCurly)),
            Token::OpenSquare => Some((GroupKind::List, Token::CloseSquare)),
            Token::IndexOpen => Some((GroupKind::Index, Token::CloseSquare)),
            Token::OpenParen => Some((GroupKind::Lambda, Token::CloseParen)),
            Token::CloseCurly | Token::CloseSquare | Token::CloseParen => {
                if Some(&tok) == close {
                    return Ok(out);
                }
                return Err(err(format!("unexpected {}", delim_name(&tok)), src));
            }
            other => {
                out.push(Node::Tok(other));
                None
            }
        };
        if let Some((kind, closer)) = group {
            let body = assemble_until(it, Some(&closer), src)?;
            out.push(Node::Group(kind, body));
        }
    }
    match close {
        None => Ok(out),
        Some(c) => Err(err(format!("expected {}", delim_name(c)), src)),
    }
}

fn delim_name(t: &Token) -> &'static str {
    match t {
        Token::CloseCurly => "'}'",
        Token::CloseSquare => "']'",
        Token::CloseParen => "')'",
        _ => "delimiter",
    }
}

fn generate(nodes: &[Node], rt: &mut Runtime, src: &str) -> Result<Vec<Instruction>, SyntaxError> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < nodes.len() {
        i = gen_node(nodes, i, &mut out, rt, src)?;
    }
    Ok(out)
}

/// Generate the node at `i` (consuming lookahead where the syntax
/// demands it) into `out`; returns the next index.
fn gen_node(
    nodes: &[Node],
    i: usize,
    out: &mut Vec<Instruction>,
    rt: &mut Runtime,
    src: &str,
) -> Result<usize, SyntaxError> {
    match &nodes[i] {
        Node::Tok(tok) => match tok {
            Token::Num(n) => {
                out.push(Instruction::Push(Obj::Num(n.clone())));
                Ok(i + 1)
            }
            Token::Char(c) => {
                out.push(Instruction::Push(Obj::Char(*c)));
                Ok(i + 1)
            }
            Token::Str(StrTok::Plain(s)) => {
                out.push(Instruction::Push(Obj::new_str(s.clone())));
                Ok(i + 1)
            }
            Token::Str(StrTok::Interp(raw)) => {
                let mut parts = Vec::with_capacity(raw.len());
                for p in raw {
                    parts.push(match p {
                        RawPart::Lit(s) => StrPart::Lit(s.clone()),
                        RawPart::Var(name) => StrPart::Var(rt.sym(name)),
                        RawPart::Expr(expr) => StrPart::Expr(compile(expr, rt)?),
                    });
                }
                out.push(Instruction::Interpolate(parts));
                Ok(i + 1)
            }
            Token::Var(name) => {
                let s = rt.sym(name);
                out.push(Instruction::GetVar(s));
                Ok(i + 1)
            }
            Token::KeyVar(name) => {
                let s = rt.sym(name);
                out.push(Instruction::GetKeyVar(s));
                Ok(i + 1)
            }
            Token::SymLit(name) => {
                let s = rt.sym(name);
                out.push(Instruction::Push(Obj::Sym(s)));
                Ok(i + 1)
            }
            Token::QuotedSet(name) => {
                let s = rt.sym(name);
                out.push(Instruction::SetVar(s));
                Ok(i + 1)
            }
            Token::NamedOp(name) => {
                if let Some(op) = ops::by_name(name) {
                    out.push(Instruction::Op(op));
                } else if let Some(canon) = ext::canonical(name) {
                    out.push(Instruction::Named(canon));
                } else {
                    return Err(err(format!("unknown operator :{{{name}}}"), src));
                }
                Ok(i + 1)
            }
            Token::Op(c) => {
                let op = ops::std_op(*c)
                    .ok_or_else(|| err(format!("{c} is not a valid operator"), src))?;
                out.push(Instruction::Op(op));
                Ok(i + 1)
            }
            Token::DotOp(c) => {
                let op = ops::dot_op(*c)
                    .ok_or_else(|| err(format!(".{c} is not a valid operator"), src))?;
                out.push(Instruction::Op(op));
                Ok(i + 1)
            }
            Token::MathOp(c) => {
                let op = ops::math_op(*c)
                    .ok_or_else(|| err(format!("M{c} is not a valid operator"), src))?;
                out.push(Instruction::Op(op));
                Ok(i + 1)
            }
            Token::Colon => match nodes.get(i + 1) {
                Some(Node::Tok(Token::Var(name))) => {
                    let s = rt.sym(name);
                    out.push(Instruction::SetVar(s));
                    Ok(i + 2)
                }
                _ => Err(err("expected name after ':'", src)),
            },
            Token::DotColon => match nodes.get(i + 1) {
                Some(Node::Tok(Token::Var(name))) => {
                    let s = rt.sym(name);
                    out.push(Instruction::SetKeyVar(s));
                    Ok(i + 2)
                }
                Some(Node::Group(GroupKind::List, body)) => {
                    out.push(index_instr(body, rt, src, true)?);
                    Ok(i + 2)
                }
                _ => Err(err("expected name or index after '.:'", src)),
            },
            Token::Pound => {
                let (blk, next) = capture_block(nodes, i + 1, rt, src, "#")?;
                out.push(Instruction::BlockLiteral(blk));
                out.push(map_instr());
                Ok(next)
            }
            Token::Tick => {
                let (blk, next) = capture_block(nodes, i + 1, rt, src, "`")?;
                out.push(Instruction::BlockLiteral(blk));
                Ok(next)
            }
            Token::ColonPound => {
                if i + 1 >= nodes.len() {
                    return Err(err("expected token after ':#'", src));
                }
                let next = gen_node(nodes, i + 1, out, rt, src)?;
                out.push(map_instr());
                Ok(next)
            }
            Token::FnQuote => {
                match out.pop() {
                    Some(Instruction::GetVar(s)) => out.push(Instruction::QuoteGetVar(s)),
                    Some(Instruction::GetKeyVar(s)) => out.push(Instruction::QuoteGetKeyVar(s)),
                    _ => return Err(err("expected var or keyvar before quote (.`)", src)),
                }
                Ok(i + 1)
            }
            Token::Comma => Err(err("unexpected ','", src)),
            _ => Err(err("unexpected token", src)),
        },
        Node::Group(GroupKind::List, body) => {
            let instrs = generate(body, rt, src)?;
            out.push(Instruction::ListLiteral(instrs));
            Ok(i + 1)
        }
        Node::Group(GroupKind::Lambda, body) => {
            out.extend(generate(body, rt, src)?);
            Ok(i + 1)
        }
        Node::Group(GroupKind::Index, body) => {
            out.push(index_instr(body, rt, src, false)?);
            Ok(i + 1)
        }
        Node::Group(GroupKind::Block, body) => {
            out.push(block_or_dict(body, rt, src)?);
            Ok(i + 1)
        }
    }
}

fn map_instr() -> Instruction {
    // `#` and `:#` both resolve to the table's map operator.
    match ops::std_op('#') {
        Some(op) => Instruction::Op(op),
        None => unreachable!("map operator missing from the standard table"),
    }
}

/// `GetIndex*` / `SetIndex*` selection from a bracketed index body:
/// a constant is embedded, a lone variable reads at eval time, anything
/// else becomes an expression block.
fn index_instr(
    body: &[Node],
    rt: &mut Runtime,
    src: &str,
    set: bool,
) -> Result<Instruction, SyntaxError> {
    let instrs = generate(body, rt, src)?;
    if instrs.is_empty() {
        return Err(err("index must contain exactly one element", src));
    }
    if instrs.len() == 1 {
        match &instrs[0] {
            Instruction::Push(Obj::Num(n)) => {
                if let Some(i) = n.to_i64() {
                    return Ok(if set {
                        Instruction::SetIndexNum(i)
                    } else {
                        Instruction::GetIndexNum(i)
                    });
                }
            }
            Instruction::Push(o) => {
                return Ok(if set {
                    Instruction::SetIndexObj(o.clone())
                } else {
                    Instruction::GetIndexObj(o.clone())
                })
            }
            Instruction::GetVar(s) => {
                return Ok(if set {
                    Instruction::SetIndexVar(*s)
                } else {
                    Instruction::GetIndexVar(*s)
                })
            }
            _ => {}
        }
    }
    let blk = Block::new(instrs);
    Ok(if set {
        Instruction::SetIndexExpr(blk)
    } else {
        Instruction::GetIndexExpr(blk)
    })
}

/// Forward capture for `#` and `` ` ``: an immediately following block
/// literal is used as-is; otherwise nodes are consumed up to and
/// including the first that generates an operator or variable read.
fn capture_block(
    nodes: &[Node],
    start: usize,
    rt: &mut Runtime,
    src: &str,
    what: &str,
) -> Result<(Block, usize), SyntaxError> {
    if start >= nodes.len() {
        return Err(err(format!("expected token after '{what}'"), src));
    }
    if let Node::Group(GroupKind::Block, _) = &nodes[start] {
        let mut tmp = Vec::new();
        let next = gen_node(nodes, start, &mut tmp, rt, src)?;
        if let [Instruction::BlockLiteral(b)] = tmp.as_slice() {
            return Ok((b.clone(), next));
        }
        // A `{, ...}` dict literal is not a block.
        return Err(err(format!("expected block after '{what}'"), src));
    }
    let mut buf = Vec::new();
    let mut j = start;
    while j < nodes.len() {
        let before = buf.len();
        j = gen_node(nodes, j, &mut buf, rt, src)?;
        let stop = buf[before..].iter().any(|ins| {
            matches!(
                ins,
                Instruction::Op(_) | Instruction::GetVar(_) | Instruction::GetKeyVar(_)
            )
        });
        if stop {
            break;
        }
    }
    if buf.is_empty() {
        return Err(err(format!("expected token after '{what}'"), src));
    }
    Ok((Block::new(buf), j))
}

/// `{ ... }` groups: a leading top-level comma with an empty header is
/// a dict literal; a nonempty header declares args, type asserts and
/// local initializers; no comma is a plain block.
fn block_or_dict(body: &[Node], rt: &mut Runtime, src: &str) -> Result<Instruction, SyntaxError> {
    let comma = body
        .iter()
        .position(|n| matches!(n, Node::Tok(Token::Comma)));
    let Some(p) = comma else {
        let instrs = generate(body, rt, src)?;
        return Ok(Instruction::BlockLiteral(Block::new(instrs)));
    };
    let (header, rest) = (&body[..p], &body[p + 1..]);
    if header.is_empty() {
        let instrs = generate(rest, rt, src)?;
        return Ok(Instruction::DictLiteral(instrs));
    }
    let mut args = Vec::new();
    let mut locals: Option<VarSet> = None;
    let mut j = 0;
    while j < header.len() {
        let Node::Tok(Token::Var(name)) = &header[j] else {
            return Err(err("invalid block header entry", src));
        };
        let sym = rt.sym(name);
        match header.get(j + 1) {
            Some(Node::Tok(Token::SymLit(ty))) => {
                let ty = rt.sym(ty);
                args.push(ArgSpec {
                    name: sym,
                    ty: Some(ty),
                });
                j += 2;
            }
            Some(Node::Group(GroupKind::Lambda, init)) => {
                let value = eval_const(init, rt, src)?;
                locals.get_or_insert_with(VarSet::new).set(sym, value);
                j += 2;
            }
            _ => {
                args.push(ArgSpec {
                    name: sym,
                    ty: None,
                });
                j += 1;
            }
        }
    }
    let instrs = generate(rest, rt, src)?;
    Ok(Instruction::BlockLiteral(Block::with_header(
        instrs, args, locals,
    )))
}

/// Evaluate a local-initializer expression at compile time.
fn eval_const(body: &[Node], rt: &mut Runtime, src: &str) -> Result<Obj, SyntaxError> {
    let instrs = generate(body, rt, src)?;
    let mut stack = Stack::new();
    rt.run_instrs(&instrs, &mut stack)
        .map_err(|e| err(format!("bad local initializer: {e}"), src))?;
    stack
        .pop()
        .map_err(|_| err("local initializer produced no value", src))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Runtime;

    fn toks(src: &str) -> Vec<Token> {
        let mut rt = Runtime::new();
        tokenize(src, &mut rt).unwrap()
    }

    #[test]
    fn numbers() {
        assert_eq!(toks("3"), vec![Token::Num(Number::Int(3))]);
        assert_eq!(toks("-2"), vec![Token::Num(Number::Int(-2))]);
        assert_eq!(toks(".5"), vec![Token::Num(Number::Real(0.5))]);
        assert_eq!(toks("-.5"), vec![Token::Num(Number::Real(-0.5))]);
        assert_eq!(toks("1.25"), vec![Token::Num(Number::Real(1.25))]);
        // A dash not followed by a digit is the subtraction operator.
        assert_eq!(
            toks("3 2 -"),
            vec![
                Token::Num(Number::Int(3)),
                Token::Num(Number::Int(2)),
                Token::Op('-')
            ]
        );
    }

    #[test]
    fn encoded_numbers() {
        assert_eq!(toks(":0xff"), vec![Token::Num(Number::Int(255))]);
        assert!(matches!(toks(":3r4")[0], Token::Num(Number::Rational(_))));
        assert!(matches!(toks(":1i2")[0], Token::Num(Number::Complex(_))));
        assert!(matches!(toks(":123z")[0], Token::Num(Number::Big(_))));
    }

    #[test]
    fn strings_and_interpolation() {
        assert_eq!(
            toks(r#""ab\nc""#),
            vec![Token::Str(StrTok::Plain("ab\nc".to_string()))]
        );
        // Escaped dollar stays literal.
        assert_eq!(
            toks(r#""a\$b""#),
            vec![Token::Str(StrTok::Plain("a$b".to_string()))]
        );
        let t = toks(r#""x is $x and $(1 2 +)""#);
        match &t[0] {
            Token::Str(StrTok::Interp(parts)) => {
                assert_eq!(parts[0], RawPart::Lit("x is ".to_string()));
                assert_eq!(parts[1], RawPart::Var("x".to_string()));
                assert_eq!(parts[2], RawPart::Lit(" and ".to_string()));
                assert_eq!(parts[3], RawPart::Expr("1 2 +".to_string()));
            }
            other => panic!("unexpected token {other:?}"),
        }
        // Unknown escapes pass through verbatim.
        assert_eq!(
            toks(r#""a\qb""#),
            vec![Token::Str(StrTok::Plain("a\\qb".to_string()))]
        );
    }

    #[test]
    fn raw_strings_skip_interpolation() {
        let t = toks(r#""""a $x \n""""#);
        assert_eq!(t, vec![Token::Str(StrTok::Plain("a $x \\n".to_string()))]);
    }

    #[test]
    fn char_literals() {
        assert_eq!(toks("'a"), vec![Token::Char('a')]);
        assert_eq!(toks("'\\n'"), vec![Token::Char('\n')]);
        assert_eq!(toks("'\\pi'"), vec![Token::Char('π')]);
        let mut rt = Runtime::new();
        assert!(tokenize("'\\bogus'", &mut rt).is_err());
    }

    #[test]
    fn comments_and_doc_capture() {
        let mut rt = Runtime::new();
        let t = tokenize("1 .# ignored\n2", &mut rt).unwrap();
        assert_eq!(
            t,
            vec![Token::Num(Number::Int(1)), Token::Num(Number::Int(2))]
        );
        assert!(rt.help_entries().is_empty());
        let t = tokenize("1 .{ block .} 2 .#? doc line", &mut rt).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(rt.help_entries(), ["doc line"]);
        assert!(tokenize("1 .{ never closed", &mut rt).is_err());
    }

    #[test]
    fn symbol_literals_with_fallback() {
        assert_eq!(toks("::abc"), vec![Token::SymLit("abc".to_string())]);
        assert_eq!(toks("::+"), vec![Token::SymLit("+".to_string())]);
        // Namespace prefixes take two chars.
        assert_eq!(toks("::.E"), vec![Token::SymLit(".E".to_string())]);
        assert_eq!(toks("::Ms"), vec![Token::SymLit("Ms".to_string())]);
    }

    #[test]
    fn operator_namespaces() {
        assert_eq!(
            toks("+ .E Ms"),
            vec![Token::Op('+'), Token::DotOp('E'), Token::MathOp('s')]
        );
    }

    #[test]
    fn colon_forms() {
        assert_eq!(
            toks("5:x"),
            vec![
                Token::Num(Number::Int(5)),
                Token::Colon,
                Token::Var("x".to_string())
            ]
        );
        assert_eq!(
            toks(":{json.dumps}"),
            vec![Token::NamedOp("json.dumps".to_string())]
        );
        assert_eq!(toks(":\"a b\""), vec![Token::QuotedSet("a b".to_string())]);
        assert_eq!(toks(":#"), vec![Token::ColonPound]);
    }

    #[test]
    fn assemble_nesting() {
        let nodes = assemble(toks("{1 [2 {3}]}"), "").unwrap();
        assert_eq!(nodes.len(), 1);
        let Node::Group(GroupKind::Block, body) = &nodes[0] else {
            panic!("expected block group");
        };
        assert!(matches!(&body[1], Node::Group(GroupKind::List, _)));
    }

    #[test]
    fn assemble_mismatch_errors() {
        assert!(assemble(toks("[1 2"), "").is_err());
        assert!(assemble(toks("1 ]"), "").is_err());
    }

    #[test]
    fn generate_set_var() {
        let mut rt = Runtime::new();
        let blk = compile("5:x x", &mut rt).unwrap();
        assert!(matches!(blk.instrs()[1], Instruction::SetVar(_)));
        assert!(matches!(blk.instrs()[2], Instruction::GetVar(_)));
        assert!(compile("5:", &mut rt).is_err());
        assert!(compile("5:+", &mut rt).is_err());
    }

    #[test]
    fn generate_index_forms() {
        let mut rt = Runtime::new();
        let blk = compile("l.[0]", &mut rt).unwrap();
        assert!(matches!(blk.instrs()[1], Instruction::GetIndexNum(0)));
        let blk = compile("l.[i]", &mut rt).unwrap();
        assert!(matches!(blk.instrs()[1], Instruction::GetIndexVar(_)));
        let blk = compile("l.[1 2 +]", &mut rt).unwrap();
        assert!(matches!(blk.instrs()[1], Instruction::GetIndexExpr(_)));
        let blk = compile("5 l.:[0]", &mut rt).unwrap();
        assert!(matches!(blk.instrs()[2], Instruction::SetIndexNum(0)));
    }

    #[test]
    fn pound_captures_forward() {
        let mut rt = Runtime::new();
        // Explicit block literal is reused.
        let blk = compile("[1 2] # {1 +}", &mut rt).unwrap();
        assert!(matches!(blk.instrs()[1], Instruction::BlockLiteral(_)));
        assert!(matches!(blk.instrs()[2], Instruction::Op(op) if op.name == "#"));
        // Bare trailing code is wrapped up to and including the op.
        let blk = compile("[1 2] # 10 *", &mut rt).unwrap();
        if let Instruction::BlockLiteral(b) = &blk.instrs()[1] {
            assert_eq!(b.instrs().len(), 2);
        } else {
            panic!("expected captured block");
        }
        assert!(compile("#", &mut rt).is_err());
    }

    #[test]
    fn tick_captures_without_map() {
        let mut rt = Runtime::new();
        let blk = compile("` 1 +", &mut rt).unwrap();
        assert_eq!(blk.instrs().len(), 1);
        assert!(matches!(blk.instrs()[0], Instruction::BlockLiteral(_)));
    }

    #[test]
    fn fn_quote_rewrites_previous_get() {
        let mut rt = Runtime::new();
        let blk = compile("f.`", &mut rt).unwrap();
        assert!(matches!(blk.instrs()[0], Instruction::QuoteGetVar(_)));
        assert!(compile("5.`", &mut rt).is_err());
    }

    #[test]
    fn block_headers() {
        let mut rt = Runtime::new();
        let blk = compile("{a b::num, a}", &mut rt).unwrap();
        let Instruction::BlockLiteral(b) = &blk.instrs()[0] else {
            panic!("expected block literal");
        };
        assert_eq!(b.args().len(), 2);
        assert!(b.args()[0].ty.is_none());
        assert!(b.args()[1].ty.is_some());
        // Local initializer.
        let blk = compile("{x(5), x}", &mut rt).unwrap();
        let Instruction::BlockLiteral(b) = &blk.instrs()[0] else {
            panic!("expected block literal");
        };
        assert_eq!(b.locals().map(|l| l.len()), Some(1));
    }

    #[test]
    fn dict_literal_is_empty_header() {
        let mut rt = Runtime::new();
        let blk = compile("{, 1:a 2:b}", &mut rt).unwrap();
        assert!(matches!(blk.instrs()[0], Instruction::DictLiteral(_)));
        let blk = compile("{,}", &mut rt).unwrap();
        assert!(matches!(&blk.instrs()[0], Instruction::DictLiteral(v) if v.is_empty()));
    }

    #[test]
    fn unknown_operators_are_compile_errors() {
        let mut rt = Runtime::new();
        assert!(compile("Mq", &mut rt).is_err());
        assert!(compile(":{nonsense}", &mut rt).is_err());
    }

    #[test]
    fn lambda_splices() {
        let mut rt = Runtime::new();
        let blk = compile("(1 2 +)", &mut rt).unwrap();
        assert_eq!(blk.instrs().len(), 3);
    }
}
