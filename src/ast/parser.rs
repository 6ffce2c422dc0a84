//! Structural parser for Go source files.
//!
//! Signatures (receivers, type parameters, parameters, results) are parsed
//! completely since the rewriter transforms them; function bodies and
//! unknown declarations are captured as balanced spans into the original
//! text.

use super::{
    lexer::{Lexer, TokKind, Token},
    Body, Decl, Field, FieldList, FuncDecl, GoFile, ImportSpec, ParseMode, Span, Spanned,
    TypeDecl, TypeExpr,
};
use crate::error::{Result, WeaveError};
use std::path::Path;

/// Parses a file from disk.
pub fn parse_file(path: &Path, mode: ParseMode) -> Result<GoFile> {
    let src = crate::utils::read_to_string(path)?;
    parse_source(&src, path, mode)
}

/// Parses a string as a full compilation unit.
pub fn parse_source(src: &str, path: &Path, mode: ParseMode) -> Result<GoFile> {
    let tokens = Lexer::tokenize(src, path)?;
    let tokens: Vec<Token> =
        tokens.into_iter().filter(|t| t.kind != TokKind::Comment).collect();
    let limit = tokens.len();
    let mut parser = Parser { src, tokens: &tokens, pos: 0, limit, path, mode };
    parser.parse()
}

struct Parser<'a> {
    src: &'a str,
    tokens: &'a [Token],
    pos: usize,
    limit: usize,
    path: &'a Path,
    mode: ParseMode,
}

impl<'a> Parser<'a> {
    fn parse(&mut self) -> Result<GoFile> {
        self.skip_semis();
        self.expect_keyword("package")?;
        let name_tok = self.expect_ident()?;
        let package =
            Spanned::new(name_tok.text(self.src).to_string(), name_tok.span.clone());
        self.skip_semis();

        let mut file = GoFile {
            path: self.path.to_path_buf(),
            src: self.src.to_string(),
            package,
            imports: Vec::new(),
            decls: Vec::new(),
            mode: self.mode,
        };
        if self.mode == ParseMode::PackageOnly {
            return Ok(file);
        }

        while !self.at_eof() {
            let tok = self.peek().clone();
            match tok.kind {
                TokKind::Semi => {
                    self.pos += 1;
                }
                TokKind::Keyword => match tok.text(self.src) {
                    "import" => self.parse_import(&mut file)?,
                    "func" => {
                        let decl = self.parse_func_decl()?;
                        file.decls.push(Decl::Func(decl));
                    }
                    "type" => self.parse_type_decl(&mut file)?,
                    _ => {
                        let span = self.skip_decl();
                        file.decls.push(Decl::Other(span));
                    }
                },
                _ => {
                    // tolerate anything unexpected at top level
                    let span = self.skip_decl();
                    file.decls.push(Decl::Other(span));
                }
            }
        }
        Ok(file)
    }

    // === token plumbing ===

    fn peek(&self) -> &Token {
        if self.pos >= self.limit {
            self.tokens.last().expect("token stream always ends with Eof")
        } else {
            &self.tokens[self.pos]
        }
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.limit || self.peek().kind == TokKind::Eof
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.limit {
            self.pos += 1;
        }
        tok
    }

    fn skip_semis(&mut self) {
        while self.peek().kind == TokKind::Semi {
            self.pos += 1;
        }
    }

    fn err_here(&self, message: impl Into<String>) -> WeaveError {
        WeaveError::parse(self.path, self.peek().line, message)
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<Token> {
        let tok = self.advance();
        if tok.is_keyword(self.src, kw) {
            Ok(tok)
        } else {
            Err(WeaveError::parse(
                self.path,
                tok.line,
                format!("expected {kw:?}, found {:?}", tok.text(self.src)),
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<Token> {
        let tok = self.advance();
        if tok.kind == TokKind::Ident {
            Ok(tok)
        } else {
            Err(WeaveError::parse(
                self.path,
                tok.line,
                format!("expected identifier, found {:?}", tok.text(self.src)),
            ))
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<Token> {
        let tok = self.advance();
        if tok.is_op(self.src, op) {
            Ok(tok)
        } else {
            Err(WeaveError::parse(
                self.path,
                tok.line,
                format!("expected {op:?}, found {:?}", tok.text(self.src)),
            ))
        }
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.peek().is_op(self.src, op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consumes a balanced `open ... close` region starting at the current
    /// token (which must be `open`) and returns its byte span.
    fn balance(&mut self, open: &str, close: &str) -> Result<Span> {
        let start_tok = self.expect_op(open)?;
        let mut depth = 1usize;
        loop {
            if self.at_eof() {
                return Err(self.err_here(format!("unbalanced {open:?}")));
            }
            let tok = self.advance();
            if tok.is_op(self.src, open) {
                depth += 1;
            } else if tok.is_op(self.src, close) {
                depth -= 1;
                if depth == 0 {
                    return Ok(start_tok.span.start..tok.span.end);
                }
            }
        }
    }

    /// Skips a declaration we do not model: everything up to the next
    /// statement boundary at bracket depth zero.
    fn skip_decl(&mut self) -> Span {
        let start = self.peek().span.start;
        let mut end = start;
        let mut depth = 0isize;
        while !self.at_eof() {
            let tok = self.advance();
            match tok.text(self.src) {
                "(" | "[" | "{" if tok.kind == TokKind::Op => depth += 1,
                ")" | "]" | "}" if tok.kind == TokKind::Op => depth -= 1,
                _ => {}
            }
            end = tok.span.end;
            if tok.kind == TokKind::Semi && depth <= 0 {
                break;
            }
        }
        start..end
    }

    // === imports ===

    fn parse_import(&mut self, file: &mut GoFile) -> Result<()> {
        self.expect_keyword("import")?;
        if self.peek().is_op(self.src, "(") {
            self.advance();
            loop {
                self.skip_semis();
                if self.eat_op(")") {
                    break;
                }
                let spec = self.parse_import_spec()?;
                file.imports.push(spec);
            }
        } else {
            let spec = self.parse_import_spec()?;
            file.imports.push(spec);
        }
        Ok(())
    }

    fn parse_import_spec(&mut self) -> Result<ImportSpec> {
        let start = self.peek().span.start;
        let mut alias = None;
        let tok = self.peek().clone();
        if tok.kind == TokKind::Ident || tok.is_op(self.src, ".") {
            alias = Some(tok.text(self.src).to_string());
            self.advance();
        }
        let path_tok = self.advance();
        let path = match path_tok.kind {
            TokKind::Str => path_tok.text(self.src).trim_matches('"').to_string(),
            TokKind::RawStr => path_tok.text(self.src).trim_matches('`').to_string(),
            _ => return Err(self.err_here("expected import path string")),
        };
        Ok(ImportSpec { alias, path, span: start..path_tok.span.end })
    }

    // === type declarations ===

    fn parse_type_decl(&mut self, file: &mut GoFile) -> Result<()> {
        let start = self.expect_keyword("type")?.span.start;
        if self.peek().is_op(self.src, "(") {
            self.advance();
            loop {
                self.skip_semis();
                if self.eat_op(")") {
                    break;
                }
                let decl = self.parse_type_spec()?;
                file.decls.push(Decl::Type(decl));
            }
        } else {
            let mut decl = self.parse_type_spec()?;
            decl.span.start = start;
            file.decls.push(Decl::Type(decl));
        }
        Ok(())
    }

    fn parse_type_spec(&mut self) -> Result<TypeDecl> {
        let name_tok = self.expect_ident()?;
        let name = Spanned::new(name_tok.text(self.src).to_string(), name_tok.span.clone());
        // `type A[T any] ...` vs `type A [N]int`: only an all-named field
        // list is a type-parameter list
        let mut type_params = None;
        if self.peek().is_op(self.src, "[") {
            let saved = self.pos;
            match self.parse_field_list("[", "]") {
                Ok(list)
                    if !list.fields.is_empty()
                        && list.fields.iter().all(|f| !f.names.is_empty()) =>
                {
                    type_params = Some(list);
                }
                _ => self.pos = saved,
            }
        }
        self.eat_op("=");

        let mut struct_body = None;
        let end;
        if self.peek().is_keyword(self.src, "struct") {
            self.advance();
            let body = self.balance("{", "}")?;
            end = body.end;
            struct_body = Some(body);
        } else {
            let ty = self.parse_type()?;
            end = ty.span.end;
        }
        self.skip_semis();
        Ok(TypeDecl { span: name.span.start..end, name, type_params, struct_body })
    }

    // === function declarations ===

    fn parse_func_decl(&mut self) -> Result<FuncDecl> {
        let func_tok = self.expect_keyword("func")?;
        let line = func_tok.line;
        let start = func_tok.span.start;

        let mut recv = None;
        if self.peek().is_op(self.src, "(") {
            let list = self.parse_field_list("(", ")")?;
            let mut fields = list.fields;
            if fields.len() != 1 {
                return Err(self.err_here("expected exactly one receiver"));
            }
            recv = Some(fields.remove(0));
        }

        let name_tok = self.expect_ident()?;
        let name = Spanned::new(name_tok.text(self.src).to_string(), name_tok.span.clone());

        let mut type_params = None;
        if self.peek().is_op(self.src, "[") {
            type_params = Some(self.parse_field_list("[", "]")?);
        }

        let params = self.parse_field_list("(", ")")?;
        let results = self.parse_results()?;

        let mut body = None;
        let mut end = results
            .span
            .clone()
            .map(|s| s.end)
            .unwrap_or_else(|| params.span.clone().map(|s| s.end).unwrap_or(name.span.end));
        if self.peek().is_op(self.src, "{") {
            let parsed = self.parse_body()?;
            end = parsed.span.end;
            body = Some(parsed);
        }
        self.skip_semis();

        Ok(FuncDecl { span: start..end, line, name, recv, type_params, params, results, body })
    }

    fn parse_results(&mut self) -> Result<FieldList> {
        if self.peek().is_op(self.src, "(") {
            return self.parse_field_list("(", ")");
        }
        if self.starts_type() {
            let ty = self.parse_type()?;
            let span = ty.span.clone();
            return Ok(FieldList { span: Some(span), fields: vec![Field { names: vec![], ty }] });
        }
        Ok(FieldList::default())
    }

    fn parse_body(&mut self) -> Result<Body> {
        let open = self.peek().span.clone();
        let mut first_stmt = None;
        let span = {
            let start_pos = self.pos;
            let span = self.balance("{", "}")?;
            if self.mode == ParseMode::Full {
                // first significant token after the opening brace
                for tok in &self.tokens[start_pos + 1..] {
                    if tok.span.start >= span.end - 1 {
                        break;
                    }
                    if tok.kind == TokKind::Semi {
                        continue;
                    }
                    first_stmt = Some((tok.span.start, tok.line));
                    break;
                }
            }
            span
        };
        debug_assert_eq!(open.start, span.start);
        Ok(Body { span, first_stmt })
    }

    // === field lists ===

    /// Parses a parenthesized or bracketed field list, resolving the
    /// named-vs-unnamed ambiguity the way `go/parser` does: the list is
    /// named iff at least one element is unambiguously `name Type`.
    fn parse_field_list(&mut self, open: &str, close: &str) -> Result<FieldList> {
        let open_tok = self.expect_op(open)?;
        let start = open_tok.span.start;

        // collect comma-separated groups of token indices
        let mut groups: Vec<(usize, usize)> = Vec::new();
        let mut group_start = self.pos;
        let mut depth = 0isize;
        let end;
        loop {
            if self.at_eof() {
                return Err(self.err_here(format!("unbalanced {open:?}")));
            }
            let tok = self.peek().clone();
            let text = tok.text(self.src);
            if tok.kind == TokKind::Op {
                match text {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => {
                        if depth == 0 && text == close {
                            if self.pos > group_start {
                                groups.push((group_start, self.pos));
                            }
                            end = tok.span.end;
                            self.advance();
                            break;
                        }
                        depth -= 1;
                    }
                    "," if depth == 0 => {
                        groups.push((group_start, self.pos));
                        self.advance();
                        group_start = self.pos;
                        continue;
                    }
                    _ => {}
                }
            }
            self.advance();
        }

        let fields = self.classify_groups(&groups)?;
        Ok(FieldList { span: Some(start..end), fields })
    }

    fn classify_groups(&mut self, groups: &[(usize, usize)]) -> Result<Vec<Field>> {
        enum Group {
            MaybeName(Spanned<String>),
            Named(Spanned<String>, TypeExpr),
            Unnamed(TypeExpr),
        }

        let mut classified = Vec::with_capacity(groups.len());
        for &(start, end) in groups {
            // strip stray semicolons the lexer may have inserted inside
            // multi-line lists
            let (mut start, mut end) = (start, end);
            while start < end && self.tokens[start].kind == TokKind::Semi {
                start += 1;
            }
            while end > start && self.tokens[end - 1].kind == TokKind::Semi {
                end -= 1;
            }
            if start == end {
                continue;
            }

            let first_is_ident = self.tokens[start].kind == TokKind::Ident;
            let first_name = Spanned::new(
                self.tokens[start].text(self.src).to_string(),
                self.tokens[start].span.clone(),
            );
            if end - start == 1 && first_is_ident {
                classified.push(Group::MaybeName(first_name));
                continue;
            }

            let named = if first_is_ident {
                self.parse_type_range(start + 1, end).map(|ty| (first_name.clone(), ty))
            } else {
                None
            };
            let unnamed = self.parse_type_range(start, end);

            // `a ...T` is always a named variadic
            let forced_named =
                first_is_ident && named.as_ref().map_or(false, |(_, ty)| ty.variadic);

            match (named, unnamed) {
                (Some((name, ty)), None) => classified.push(Group::Named(name, ty)),
                (Some((name, ty)), Some(_)) if forced_named => {
                    classified.push(Group::Named(name, ty))
                }
                (_, Some(ty)) => classified.push(Group::Unnamed(ty)),
                (Some((name, ty)), _) => classified.push(Group::Named(name, ty)),
                (None, None) => {
                    return Err(WeaveError::parse(
                        self.path,
                        self.tokens[start].line,
                        format!(
                            "cannot parse field {:?}",
                            &self.src[self.tokens[start].span.start
                                ..self.tokens[end - 1].span.end]
                        ),
                    ))
                }
            }
        }

        let named_mode = classified.iter().any(|g| matches!(g, Group::Named(..)));
        let mut fields = Vec::new();
        if named_mode {
            let mut pending: Vec<Spanned<String>> = Vec::new();
            for group in classified {
                match group {
                    Group::MaybeName(name) => pending.push(name),
                    Group::Named(name, ty) => {
                        pending.push(name);
                        fields.push(Field { names: std::mem::take(&mut pending), ty });
                    }
                    Group::Unnamed(ty) => fields.push(Field { names: vec![], ty }),
                }
            }
            // names with no trailing type cannot occur in valid source;
            // degrade them to unnamed type fields
            for name in pending {
                let ty = TypeExpr { span: name.span.clone(), text: name.data, variadic: false };
                fields.push(Field { names: vec![], ty });
            }
        } else {
            for group in classified {
                let ty = match group {
                    Group::MaybeName(name) => {
                        TypeExpr { span: name.span.clone(), text: name.data, variadic: false }
                    }
                    Group::Unnamed(ty) => ty,
                    Group::Named(..) => unreachable!("no named groups in unnamed mode"),
                };
                fields.push(Field { names: vec![], ty });
            }
        }
        Ok(fields)
    }

    fn parse_type_range(&mut self, start: usize, end: usize) -> Option<TypeExpr> {
        let saved = (self.pos, self.limit);
        self.pos = start;
        self.limit = end;
        let mut variadic = false;
        if self.peek().is_op(self.src, "...") {
            variadic = true;
            self.advance();
        }
        let result = self.parse_type().ok().filter(|_| self.pos >= end);
        let (pos, limit) = saved;
        self.pos = pos;
        self.limit = limit;
        result.map(|mut ty| {
            ty.variadic = variadic;
            ty
        })
    }

    // === types ===

    fn starts_type(&self) -> bool {
        let tok = self.peek();
        match tok.kind {
            TokKind::Ident => true,
            TokKind::Op => matches!(tok.text(self.src), "*" | "(" | "[" | "<-" | "..."),
            TokKind::Keyword => {
                matches!(tok.text(self.src), "map" | "chan" | "func" | "interface" | "struct")
            }
            _ => false,
        }
    }

    fn parse_type(&mut self) -> Result<TypeExpr> {
        let start = self.peek().span.start;
        let end = self.parse_type_inner()?;
        let text = self.src[start..end].trim().to_string();
        Ok(TypeExpr { span: start..end, text, variadic: false })
    }

    /// Consumes one type, returning its end offset. Union constraint
    /// elements (`~int | ~string`) are accepted so type-parameter lists
    /// parse with the same machinery.
    fn parse_type_inner(&mut self) -> Result<usize> {
        let mut end = self.parse_type_element()?;
        while self.peek().is_op(self.src, "|") {
            self.advance();
            end = self.parse_type_element()?;
        }
        Ok(end)
    }

    fn parse_type_element(&mut self) -> Result<usize> {
        if self.peek().is_op(self.src, "~") {
            self.advance();
        }
        let tok = self.peek().clone();
        match tok.kind {
            TokKind::Op => match tok.text(self.src) {
                "*" => {
                    self.advance();
                    self.parse_type_inner()
                }
                "(" => {
                    self.advance();
                    self.parse_type_inner()?;
                    Ok(self.expect_op(")")?.span.end)
                }
                "[" => {
                    // slice or array; the array length expression is skipped
                    // by balancing
                    let span = self.balance("[", "]")?;
                    let _ = span;
                    self.parse_type_inner()
                }
                "<-" => {
                    self.advance();
                    self.expect_keyword("chan")?;
                    self.parse_type_inner()
                }
                other => Err(self.err_here(format!("unexpected {other:?} in type"))),
            },
            TokKind::Keyword => match tok.text(self.src) {
                "map" => {
                    self.advance();
                    self.balance("[", "]")?;
                    self.parse_type_inner()
                }
                "chan" => {
                    self.advance();
                    self.eat_op("<-");
                    self.parse_type_inner()
                }
                "func" => {
                    self.advance();
                    let params = self.balance("(", ")")?;
                    let mut end = params.end;
                    if self.peek().is_op(self.src, "(") {
                        end = self.balance("(", ")")?.end;
                    } else if self.starts_type() && !self.peek().is_op(self.src, "...") {
                        end = self.parse_type_inner()?;
                    }
                    Ok(end)
                }
                "interface" | "struct" => {
                    self.advance();
                    Ok(self.balance("{", "}")?.end)
                }
                other => Err(self.err_here(format!("unexpected keyword {other:?} in type"))),
            },
            TokKind::Ident => {
                let mut end = self.advance().span.end;
                while self.eat_op(".") {
                    end = self.expect_ident()?.span.end;
                }
                if self.peek().is_op(self.src, "[") {
                    end = self.balance("[", "]")?.end;
                }
                Ok(end)
            }
            _ => Err(self.err_here(format!("unexpected {:?} in type", tok.text(self.src)))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = r#"// Package demo does demo things.
package demo

import (
	"fmt"
	rt "runtime"
	_ "unsafe"
)

const answer = 42

var state = map[string]int{
	"a": 1,
}

type T struct {
	Name string
	a, b int
}

type small int

type Pair[K comparable, V any] struct {
	Key K
	Val V
}

func Example() {
	fmt.Println("hello")
}

func (t *T) M(s string, n int) (float32, error) {
	_ = rt.NumCPU()
	return 0, nil
}

func (p *Pair[K, V]) Get(k K) V {
	return p.Val
}

func Transform[V any](v V) V {
	return v
}

func Variadic(prefix string, rest ...int) (n int, err error) {
	return len(rest), nil
}

func multi(a, b int, c string) {}
"#;

    fn parse() -> GoFile {
        parse_source(SRC, Path::new("demo.go"), ParseMode::Full).unwrap()
    }

    #[test]
    fn parses_package_and_imports() {
        let file = parse();
        assert_eq!(file.package.data, "demo");
        assert_eq!(file.imports.len(), 3);
        assert_eq!(file.imports[0].path, "fmt");
        assert_eq!(file.imports[1].alias.as_deref(), Some("rt"));
        assert_eq!(file.imports[2].alias.as_deref(), Some("_"));
        assert!(file.has_import("unsafe"));
    }

    #[test]
    fn package_only_stops_early() {
        let file = parse_source(SRC, Path::new("demo.go"), ParseMode::PackageOnly).unwrap();
        assert_eq!(file.package.data, "demo");
        assert!(file.decls.is_empty());
    }

    #[test]
    fn finds_struct_decls() {
        let file = parse();
        let t = file.find_struct_decl("T").unwrap();
        assert!(t.is_struct());
        let body = t.struct_body.clone().unwrap();
        assert!(file.src[body.clone()].contains("Name string"));
        assert!(file.find_struct_decl("small").is_none());
        assert!(file.find_struct_decl("Pair").is_some());
    }

    #[test]
    fn parses_plain_function() {
        let file = parse();
        let f = file.find_func_decl_without_receiver("Example").unwrap();
        assert!(f.recv.is_none());
        assert!(f.params.is_empty());
        assert!(f.results.is_empty());
        let body = f.body.as_ref().unwrap();
        let (offset, line) = body.first_stmt.unwrap();
        assert!(file.src[offset..].starts_with("fmt.Println"));
        assert_eq!(file.line_at(offset), line);
    }

    #[test]
    fn parses_method_with_results() {
        let file = parse();
        let m = file.find_func_decl("M", Some("*T")).unwrap();
        let recv = m.recv.as_ref().unwrap();
        assert_eq!(recv.names[0].data, "t");
        assert_eq!(recv.ty.text, "*T");
        assert_eq!(m.params.arity(), 2);
        assert_eq!(m.results.arity(), 2);
        assert_eq!(m.results.fields[0].ty.text, "float32");
        assert!(m.results.fields.iter().all(|f| f.names.is_empty()));

        // receiver pattern must also respect pointer-ness
        assert!(file.find_func_decl("M", Some("T")).is_none());
        assert!(file.find_func_decl("M", None).is_none());
    }

    #[test]
    fn parses_generic_receiver() {
        let file = parse();
        let get = file.find_func_decl("Get", Some("*Pair")).unwrap();
        let recv = get.recv.as_ref().unwrap();
        assert_eq!(recv.ty.text, "*Pair[K, V]");
        assert_eq!(recv.ty.receiver_type_params(), vec!["K", "V"]);
    }

    #[test]
    fn parses_generic_function() {
        let file = parse();
        let f = file.find_func_decl_without_receiver("Transform").unwrap();
        let tp = f.type_params.as_ref().unwrap();
        assert_eq!(tp.fields.len(), 1);
        assert_eq!(tp.fields[0].names[0].data, "V");
        assert_eq!(tp.fields[0].ty.text, "any");
    }

    #[test]
    fn parses_variadic_and_named_results() {
        let file = parse();
        let f = file.find_func_decl_without_receiver("Variadic").unwrap();
        let rest = &f.params.fields[1];
        assert_eq!(rest.names[0].data, "rest");
        assert!(rest.ty.variadic);
        assert_eq!(rest.ty.text, "int");
        assert_eq!(rest.ty.desugared(), "[]int");
        assert_eq!(f.results.fields[0].names[0].data, "n");
        assert_eq!(f.results.fields[1].names[0].data, "err");
    }

    #[test]
    fn groups_multi_name_params() {
        let file = parse();
        let f = file.find_func_decl_without_receiver("multi").unwrap();
        assert_eq!(f.params.fields.len(), 2);
        assert_eq!(f.params.fields[0].names.len(), 2);
        assert_eq!(f.params.fields[0].ty.text, "int");
        assert_eq!(f.params.fields[1].names[0].data, "c");
        assert_eq!(f.params.arity(), 3);
    }

    #[test]
    fn unnamed_params_parse_as_types() {
        let src = "package p\n\nfunc f(int, ...string) error { return nil }\n";
        let file = parse_source(src, Path::new("p.go"), ParseMode::Declarations).unwrap();
        let f = file.find_func_decl_without_receiver("f").unwrap();
        assert_eq!(f.params.fields.len(), 2);
        assert!(f.params.fields.iter().all(|p| p.names.is_empty()));
        assert!(f.params.fields[1].ty.variadic);
        assert_eq!(f.results.fields[0].ty.text, "error");
    }

    #[test]
    fn complex_types_survive() {
        let src = "package p\n\nfunc f(m map[string][]int, fn func(int) error, ch chan<- struct{}) {}\n";
        let file = parse_source(src, Path::new("p.go"), ParseMode::Declarations).unwrap();
        let f = file.find_func_decl_without_receiver("f").unwrap();
        assert_eq!(f.params.fields[0].ty.text, "map[string][]int");
        assert_eq!(f.params.fields[1].ty.text, "func(int) error");
        assert_eq!(f.params.fields[2].ty.text, "chan<- struct{}");
    }

    #[test]
    fn body_span_is_balanced() {
        let file = parse();
        let f = file.find_func_decl("M", Some("*T")).unwrap();
        let body = &file.src[f.body.as_ref().unwrap().span.clone()];
        assert!(body.starts_with('{'));
        assert!(body.ends_with('}'));
        assert!(body.contains("return 0, nil"));
    }
}
