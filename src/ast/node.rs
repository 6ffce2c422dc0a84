//! Typed constructors for synthesized Go code.
//!
//! Only the rewriter builds these nodes; parsed code stays as spans into
//! the original text. Rendering lives in [`super::printer`].

/// Sentinel comment tagging a trampoline dispatch site until the optimizer
/// has seen it.
pub const TRAMPOLINE_JUMP_IF: &str = "/* TRAMPOLINE_JUMP_IF */";

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Ident(String),
    /// Any literal, stored in source form (`"x"`, `42`, `nil`, `false`).
    BasicLit(String),
    /// `&expr`
    Addr(Box<Expr>),
    /// `*expr`
    Deref(Box<Expr>),
    /// `expr.field`
    Selector(Box<Expr>, String),
    /// `fun[T1, T2](args...)`; a single type argument renders as an index
    /// expression, several as an index list.
    Call { fun: Box<Expr>, type_args: Vec<String>, args: Vec<Expr>, spread: bool },
    /// `Ty{elems}`
    CompositeLit { ty: String, elems: Vec<Expr> },
    /// `key: value` inside a composite literal
    KeyValue(Box<Expr>, Box<Expr>),
    /// `expr.(Ty)`
    TypeAssert(Box<Expr>, String),
    Raw(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    If(IfStmt),
    /// `lhs = rhs`, or `lhs := rhs` when `define` is set.
    Assign { lhs: Vec<Expr>, rhs: Vec<Expr>, define: bool },
    ExprStmt(Expr),
    Defer(Expr),
    Return(Vec<Expr>),
    Switch { tag: Expr, cases: Vec<CaseClause> },
    Block(Vec<Stmt>),
    Empty,
    /// Verbatim statement text, spliced as-is (raw-rule snippets).
    Raw(String),
    /// `//line file:n` — rendered at column one so the compiler honors it.
    LineDirective(String, u32),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CaseClause {
    /// Empty means `default:`.
    pub exprs: Vec<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    pub init: Option<Box<Stmt>>,
    pub cond: Expr,
    pub then: Vec<Stmt>,
    pub els: Vec<Stmt>,
    /// Carries [`TRAMPOLINE_JUMP_IF`] until the optimizer strips it.
    pub deco: Option<&'static str>,
}

pub fn ident(name: impl Into<String>) -> Expr {
    Expr::Ident(name.into())
}

pub fn str_lit(value: &str) -> Expr {
    Expr::BasicLit(format!("{value:?}"))
}

pub fn int_lit(value: usize) -> Expr {
    Expr::BasicLit(value.to_string())
}

pub fn nil() -> Expr {
    Expr::BasicLit("nil".into())
}

pub fn false_lit() -> Expr {
    Expr::BasicLit("false".into())
}

pub fn addr(expr: Expr) -> Expr {
    Expr::Addr(Box::new(expr))
}

pub fn deref(expr: Expr) -> Expr {
    Expr::Deref(Box::new(expr))
}

pub fn selector(expr: Expr, field: impl Into<String>) -> Expr {
    Expr::Selector(Box::new(expr), field.into())
}

pub fn call(fun: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Call { fun: Box::new(ident(fun)), type_args: vec![], args, spread: false }
}

/// A call with explicit type arguments (index / index-list instantiation).
pub fn call_generic(fun: impl Into<String>, type_args: Vec<String>, args: Vec<Expr>) -> Expr {
    Expr::Call { fun: Box::new(ident(fun)), type_args, args, spread: false }
}

pub fn type_assert(expr: Expr, ty: impl Into<String>) -> Expr {
    Expr::TypeAssert(Box::new(expr), ty.into())
}

pub fn composite_lit(ty: impl Into<String>, elems: Vec<Expr>) -> Expr {
    Expr::CompositeLit { ty: ty.into(), elems }
}

pub fn key_value(key: Expr, value: Expr) -> Expr {
    Expr::KeyValue(Box::new(key), Box::new(value))
}

pub fn assign(lhs: Vec<Expr>, rhs: Vec<Expr>) -> Stmt {
    Stmt::Assign { lhs, rhs, define: false }
}

pub fn define(lhs: Vec<Expr>, rhs: Vec<Expr>) -> Stmt {
    Stmt::Assign { lhs, rhs, define: true }
}

pub fn defer_call(call: Expr) -> Stmt {
    Stmt::Defer(call)
}

pub fn ret(exprs: Vec<Expr>) -> Stmt {
    Stmt::Return(exprs)
}

pub fn empty() -> Stmt {
    Stmt::Empty
}

pub fn block(stmts: Vec<Stmt>) -> Stmt {
    Stmt::Block(stmts)
}

pub fn if_stmt(init: Option<Stmt>, cond: Expr, then: Vec<Stmt>, els: Vec<Stmt>) -> IfStmt {
    IfStmt { init: init.map(Box::new), cond, then, els, deco: None }
}

/// `if name != nil { body }`
pub fn if_not_nil(name: impl Into<String>, body: Vec<Stmt>) -> Stmt {
    Stmt::If(IfStmt {
        init: None,
        cond: Expr::Raw(format!("{} != nil", name.into())),
        then: body,
        els: vec![],
        deco: None,
    })
}

pub fn case_clause(exprs: Vec<Expr>, body: Vec<Stmt>) -> CaseClause {
    CaseClause { exprs, body }
}

pub fn line_directive(file: impl Into<String>, line: u32) -> Stmt {
    Stmt::LineDirective(file.into(), line)
}

/// Declaration-level helpers; these render directly to source text since
/// they only appear in generated files.
pub fn import_decl(specs: &[(Option<&str>, &str)]) -> String {
    let mut out = String::from("import (\n");
    for (alias, path) in specs {
        match alias {
            Some(alias) => out.push_str(&format!("\t{alias} {path:?}\n")),
            None => out.push_str(&format!("\t{path:?}\n")),
        }
    }
    out.push(')');
    out
}

pub fn var_decl(name: &str, ty: &str) -> String {
    format!("var {name} {ty}")
}

pub fn struct_field(name: &str, ty: &str) -> String {
    format!("{name} {ty}")
}
