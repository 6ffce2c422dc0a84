//! A thin, typed layer over Go source.
//!
//! Parsing is structural and span-preserving: top-level declarations and
//! signatures are fully parsed, function bodies are recorded as balanced
//! byte ranges into the original text. Rewrites are expressed as
//! `(start, end, replacement)` splices, so formatting and comments of
//! untouched code survive write-back byte for byte.

use crate::error::Result;
use std::{
    ops::Range,
    path::{Path, PathBuf},
};

pub mod lexer;
pub mod node;
pub mod parser;
pub mod printer;

pub use lexer::{Lexer, TokKind, Token};
pub use node::{Expr, Stmt};

pub type Span = Range<usize>;

/// A spanned item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    /// The byte range of `data` in the file.
    pub span: Span,
    /// The data of the item.
    pub data: T,
}

impl<T> Spanned<T> {
    pub fn new(data: T, span: Span) -> Self {
        Self { data, span }
    }
}

/// How much of a file the parser materializes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseMode {
    /// Just the package clause.
    PackageOnly,
    /// Top-level declarations with full signatures; bodies as balanced
    /// spans. Used when probing files for rule matches.
    Declarations,
    /// Additionally records the first body statement of every function, for
    /// line-directive emission during rewriting.
    Full,
}

/// A parsed Go source file.
#[derive(Clone, Debug)]
pub struct GoFile {
    pub path: PathBuf,
    pub src: String,
    pub package: Spanned<String>,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
    pub mode: ParseMode,
}

#[derive(Clone, Debug)]
pub struct ImportSpec {
    pub alias: Option<String>,
    pub path: String,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Decl {
    Func(FuncDecl),
    Type(TypeDecl),
    /// `var`, `const`, or anything else we do not need the structure of.
    Other(Span),
}

#[derive(Clone, Debug)]
pub struct FuncDecl {
    /// From the `func` keyword to the end of the declaration.
    pub span: Span,
    pub line: u32,
    pub name: Spanned<String>,
    pub recv: Option<Field>,
    pub type_params: Option<FieldList>,
    pub params: FieldList,
    pub results: FieldList,
    pub body: Option<Body>,
}

#[derive(Clone, Debug)]
pub struct Body {
    /// Byte range including both braces.
    pub span: Span,
    /// Offset and line of the first statement, when parsed in [`ParseMode::Full`].
    pub first_stmt: Option<(usize, u32)>,
}

#[derive(Clone, Debug)]
pub struct TypeDecl {
    pub span: Span,
    pub name: Spanned<String>,
    /// Type-parameter list of a generic type declaration.
    pub type_params: Option<FieldList>,
    /// Byte range of the `{ ... }` field list when this is a struct type.
    pub struct_body: Option<Span>,
}

impl TypeDecl {
    pub fn is_struct(&self) -> bool {
        self.struct_body.is_some()
    }
}

#[derive(Clone, Debug, Default)]
pub struct FieldList {
    /// Byte range including the delimiters, absent for empty result lists.
    pub span: Option<Span>,
    pub fields: Vec<Field>,
}

impl FieldList {
    /// Total number of declared names, counting an anonymous field as one.
    pub fn arity(&self) -> usize {
        self.fields.iter().map(|f| f.names.len().max(1)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Field {
    pub names: Vec<Spanned<String>>,
    pub ty: TypeExpr,
}

/// A type captured as normalized source text plus the structural facts the
/// rewriter needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeExpr {
    pub span: Span,
    /// Source text of the type, `...` prefix excluded.
    pub text: String,
    /// Whether the field was declared `...T`.
    pub variadic: bool,
}

impl TypeExpr {
    pub fn synthetic(text: impl Into<String>) -> Self {
        Self { span: 0..0, text: text.into(), variadic: false }
    }

    /// The type as it appears in a relay signature: variadics are desugared
    /// to slices at this level.
    pub fn desugared(&self) -> String {
        if self.variadic {
            format!("[]{}", self.text)
        } else {
            self.text.clone()
        }
    }

    /// Pointer-to-self, as the relays receive every forwarded value.
    pub fn pointered(&self) -> String {
        format!("*{}", self.desugared())
    }

    /// Whether this is the top "any" capability (`any` / `interface{}`).
    pub fn is_any(&self) -> bool {
        let t = compact(&self.text);
        t == "any" || t == "interface{}"
    }

    /// Strips pointer and generic-argument syntax down to the unqualified
    /// base name: `*T[K, V]` -> `T`, `pkg.T` -> `T`.
    pub fn base_name(&self) -> String {
        base_name_of(&self.text)
    }

    /// Whether the outermost type is a pointer.
    pub fn is_pointer(&self) -> bool {
        self.text.trim_start().starts_with('*')
    }

    /// Names of the type parameters of a generic receiver shape.
    ///
    /// The legal receiver shapes are `T`, `*T`, `T[K...]`, `*T[K...]`;
    /// anything else here is a bug in the caller.
    pub fn receiver_type_params(&self) -> Vec<String> {
        let t = self.text.trim().trim_start_matches('*').trim();
        let Some(open) = t.find('[') else { return Vec::new() };
        let inner = t[open + 1..].trim_end_matches(']');
        inner
            .split(',')
            .map(|p| {
                let p = p.trim();
                assert!(
                    !p.is_empty() && p.chars().all(|c| lexer::is_ident_continue(c)),
                    "malformed receiver type parameter {p:?} in {t:?}"
                );
                p.to_string()
            })
            .collect()
    }

    /// Rewrites every occurrence of the given type-parameter names to `any`.
    pub fn erase_type_params(&self, names: &[String]) -> String {
        replace_idents(&self.text, names, "any")
    }
}

/// `a, b int` -> `a int`, `b int`, cloning the type.
pub fn split_multi_name_fields(fields: &[Field]) -> Vec<Field> {
    let mut out = Vec::new();
    for field in fields {
        if field.names.len() <= 1 {
            out.push(field.clone());
            continue;
        }
        for name in &field.names {
            out.push(Field { names: vec![name.clone()], ty: field.ty.clone() });
        }
    }
    out
}

/// Deep copy of a generic parameter list. Spans of the clone still point at
/// the originating file; only the text is meant to be reused.
pub fn clone_type_params(params: &FieldList) -> FieldList {
    params.clone()
}

impl GoFile {
    /// Finds a top-level function declaration by name and receiver pattern.
    ///
    /// `recv` of `None` requires the declaration to have no receiver. The
    /// pattern matches on the unqualified base name, so `*T` unifies with
    /// `*T[K]` and `*T[K, V]` but not with `T` or `*U`.
    pub fn find_func_decl(&self, name: &str, recv: Option<&str>) -> Option<&FuncDecl> {
        self.func_decls().find(|f| {
            f.name.data == name
                && match (recv, &f.recv) {
                    (None, None) => true,
                    (Some(pattern), Some(field)) => receiver_matches(pattern, &field.ty),
                    _ => false,
                }
        })
    }

    pub fn find_func_decl_without_receiver(&self, name: &str) -> Option<&FuncDecl> {
        self.find_func_decl(name, None)
    }

    pub fn find_type_decl(&self, name: &str) -> Option<&TypeDecl> {
        self.decls.iter().find_map(|d| match d {
            Decl::Type(t) if t.name.data == name => Some(t),
            _ => None,
        })
    }

    pub fn find_struct_decl(&self, name: &str) -> Option<&TypeDecl> {
        self.decls.iter().find_map(|d| match d {
            Decl::Type(t) if t.name.data == name && t.is_struct() => Some(t),
            _ => None,
        })
    }

    pub fn func_decls(&self) -> impl Iterator<Item = &FuncDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Func(f) => Some(f),
            _ => None,
        })
    }

    /// Whether the file imports the given path (under any alias).
    pub fn has_import(&self, path: &str) -> bool {
        self.imports.iter().any(|i| i.path == path)
    }

    /// Line number at a byte offset. Offsets past the end land on the last
    /// line.
    pub fn line_at(&self, offset: usize) -> u32 {
        let upto = &self.src[..offset.min(self.src.len())];
        upto.bytes().filter(|b| *b == b'\n').count() as u32 + 1
    }
}

/// Receiver pattern match: pointer-ness must agree and the unqualified base
/// names must be equal; generic arguments on the declaration are ignored.
pub fn receiver_matches(pattern: &str, ty: &TypeExpr) -> bool {
    let pattern = compact(pattern);
    let pattern_ptr = pattern.starts_with('*');
    if pattern_ptr != ty.is_pointer() {
        return false;
    }
    base_name_of(&pattern) == ty.base_name()
}

fn base_name_of(text: &str) -> String {
    let mut t = text.trim();
    while let Some(stripped) = t.strip_prefix('*') {
        t = stripped.trim();
    }
    if let Some(open) = t.find('[') {
        t = t[..open].trim_end();
    }
    // the base name of a qualified type is its last segment
    t.rsplit('.').next().unwrap_or(t).trim().to_string()
}

fn compact(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Token-level identifier substitution inside a type's source text.
/// Selector fields (`x.K`) are left alone.
fn replace_idents(text: &str, names: &[String], replacement: &str) -> String {
    let Ok(tokens) = Lexer::tokenize(text, Path::new("<type>")) else {
        return text.to_string();
    };
    let mut out = String::new();
    let mut last_end = 0;
    let mut prev_dot = false;
    for tok in &tokens {
        if tok.kind == TokKind::Eof {
            break;
        }
        let t = tok.text(text);
        if tok.kind == TokKind::Ident && !prev_dot && names.iter().any(|n| n == t) {
            out.push_str(&text[last_end..tok.span.start]);
            out.push_str(replacement);
            last_end = tok.span.end;
        }
        prev_dot = tok.is_op(text, ".");
    }
    out.push_str(&text[last_end..]);
    out
}

/// Validates a snippet as a statement sequence by parsing it inside a
/// synthetic function body; the text itself is spliced verbatim.
pub fn check_stmt_snippet(snippet: &str) -> Result<()> {
    let wrapped = format!("package p\n\nfunc _() {{\n{snippet}\n}}\n");
    parser::parse_source(&wrapped, Path::new("<snippet>"), ParseMode::Full).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(text: &str) -> TypeExpr {
        TypeExpr::synthetic(text)
    }

    #[test]
    fn receiver_pattern_matching() {
        assert!(receiver_matches("*T", &ty("*T")));
        assert!(receiver_matches("*T", &ty("*T[K]")));
        assert!(receiver_matches("*T", &ty("*T[K, V]")));
        assert!(!receiver_matches("*T", &ty("T")));
        assert!(!receiver_matches("*T", &ty("*U")));
        assert!(receiver_matches("T", &ty("T[K]")));
        assert!(!receiver_matches("T", &ty("*T")));
    }

    #[test]
    fn type_expr_facts() {
        assert_eq!(ty("*demo.Conn").base_name(), "Conn");
        assert!(ty("interface{}").is_any());
        assert!(ty("any").is_any());
        assert!(!ty("interface{ Foo() }").is_any());
        assert_eq!(ty("*T[K, V]").receiver_type_params(), vec!["K", "V"]);
        assert!(ty("T").receiver_type_params().is_empty());

        let mut variadic = ty("string");
        variadic.variadic = true;
        assert_eq!(variadic.desugared(), "[]string");
        assert_eq!(variadic.pointered(), "*[]string");
    }

    #[test]
    fn erases_type_params() {
        let t = ty("map[K][]V");
        let erased = t.erase_type_params(&["K".into(), "V".into()]);
        assert_eq!(erased, "map[any][]any");

        // selector fields keep their name
        let t = ty("pkg.K");
        assert_eq!(t.erase_type_params(&["K".into()]), "pkg.K");
    }

    #[test]
    fn splits_multi_name_fields() {
        let field = Field {
            names: vec![Spanned::new("a".to_string(), 0..1), Spanned::new("b".to_string(), 3..4)],
            ty: ty("int"),
        };
        let split = split_multi_name_fields(&[field]);
        assert_eq!(split.len(), 2);
        assert_eq!(split[0].names[0].data, "a");
        assert_eq!(split[1].names[0].data, "b");
        assert_eq!(split[1].ty.text, "int");
    }

    #[test]
    fn snippet_validation() {
        assert!(check_stmt_snippet("x := 1\n_ = x").is_ok());
        assert!(check_stmt_snippet("x := \"unterminated").is_err());
        assert!(check_stmt_snippet("if x { panic(\"open\")").is_err());
    }
}
