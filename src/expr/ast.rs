//! AST for the metric expression grammar. The parser in `parser.rs` emits
//! this representation; `eval.rs` walks it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,

    /// A bare name; only `test_case` and `results` resolve.
    Ident(String),

    /// `base[index]` subscripting with a string key or integer index.
    Index(Box<Expr>, Box<Expr>),

    /// `base.field` sugar for string-key subscripting on mappings.
    Field(Box<Expr>, String),

    /// Call of a named (possibly dotted, e.g. `math.sqrt`) function.
    Call { path: Vec<String>, args: Vec<Expr> },

    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}
