use crate::obj::Number;

/// A piece of an interpolated string, before name resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPart {
    Lit(String),
    /// `$name`
    Var(String),
    /// `$(source)`, compiled during generation.
    Expr(String),
}

/// String token payload. Interpolation is decided at tokenize time.
#[derive(Debug, Clone, PartialEq)]
pub enum StrTok {
    Plain(String),
    Interp(Vec<RawPart>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Num(Number),
    Str(StrTok),
    Char(char),
    /// Identifier (lowercase letters and underscores).
    Var(String),
    /// `.name` or `."name"`.
    KeyVar(String),
    /// `::name`, `::"name"` or operator-char fallback.
    SymLit(String),
    /// `:{name}`.
    NamedOp(String),
    /// `:"name"`, a quoted assignment target.
    QuotedSet(String),
    Op(char),
    DotOp(char),
    MathOp(char),
    Colon,
    DotColon,
    ColonPound,
    Pound,
    Tick,
    FnQuote,
    /// `.[`, opening an index group closed by `]`.
    IndexOpen,
    OpenCurly,
    CloseCurly,
    OpenSquare,
    CloseSquare,
    OpenParen,
    CloseParen,
    Comma,
}

/// Token trees produced by the assembler: delimiters resolved into
/// groups, everything else left flat.
#[derive(Debug, Clone)]
pub enum Node {
    Tok(Token),
    Group(GroupKind, Vec<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// `{ ... }`
    Block,
    /// `[ ... ]`
    List,
    /// `( ... )`
    Lambda,
    /// `.[ ... ]`
    Index,
}
