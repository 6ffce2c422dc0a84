//! Rendering of synthesized nodes to Go source text.
//!
//! Output follows gofmt conventions (tab indentation, one statement per
//! line) so rewritten files do not stand out from hand-written code.

use super::node::{CaseClause, Expr, IfStmt, Stmt};
use std::fmt::Write;

pub fn print_expr(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::BasicLit(text) | Expr::Raw(text) => text.clone(),
        Expr::Addr(inner) => format!("&{}", print_expr(inner)),
        Expr::Deref(inner) => format!("*{}", print_expr(inner)),
        Expr::Selector(base, field) => format!("{}.{field}", print_expr(base)),
        Expr::Call { fun, type_args, args, spread } => {
            let mut out = print_expr(fun);
            if !type_args.is_empty() {
                out.push('[');
                out.push_str(&type_args.join(", "));
                out.push(']');
            }
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&print_expr(arg));
                if *spread && i == args.len() - 1 {
                    out.push_str("...");
                }
            }
            out.push(')');
            out
        }
        Expr::CompositeLit { ty, elems } => {
            let elems = elems.iter().map(print_expr).collect::<Vec<_>>().join(", ");
            format!("{ty}{{{elems}}}")
        }
        Expr::KeyValue(key, value) => format!("{}: {}", print_expr(key), print_expr(value)),
        Expr::TypeAssert(inner, ty) => format!("{}.({ty})", print_expr(inner)),
    }
}

/// Renders statements at the given tab depth. Every line is terminated.
pub fn print_stmts(stmts: &[Stmt], indent: usize) -> String {
    let mut out = String::new();
    for stmt in stmts {
        print_stmt(&mut out, stmt, indent);
    }
    out
}

fn push_indent(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push('\t');
    }
}

fn print_stmt(out: &mut String, stmt: &Stmt, indent: usize) {
    match stmt {
        Stmt::Empty => {}
        Stmt::LineDirective(file, line) => {
            // line directives are only honored at the start of a line
            let _ = writeln!(out, "//line {file}:{line}");
        }
        Stmt::Raw(text) => {
            for line in text.trim_end().lines() {
                push_indent(out, indent);
                out.push_str(line);
                out.push('\n');
            }
        }
        Stmt::ExprStmt(expr) => {
            push_indent(out, indent);
            out.push_str(&print_expr(expr));
            out.push('\n');
        }
        Stmt::Defer(call) => {
            push_indent(out, indent);
            let _ = writeln!(out, "defer {}", print_expr(call));
        }
        Stmt::Return(exprs) => {
            push_indent(out, indent);
            if exprs.is_empty() {
                out.push_str("return\n");
            } else {
                let list = exprs.iter().map(print_expr).collect::<Vec<_>>().join(", ");
                let _ = writeln!(out, "return {list}");
            }
        }
        Stmt::Assign { lhs, rhs, define } => {
            push_indent(out, indent);
            let lhs = lhs.iter().map(print_expr).collect::<Vec<_>>().join(", ");
            let rhs = rhs.iter().map(print_expr).collect::<Vec<_>>().join(", ");
            let op = if *define { ":=" } else { "=" };
            let _ = writeln!(out, "{lhs} {op} {rhs}");
        }
        Stmt::Block(stmts) => {
            push_indent(out, indent);
            out.push_str("{\n");
            out.push_str(&print_stmts(stmts, indent + 1));
            push_indent(out, indent);
            out.push_str("}\n");
        }
        Stmt::Switch { tag, cases } => {
            push_indent(out, indent);
            let _ = writeln!(out, "switch {} {{", print_expr(tag));
            for case in cases {
                print_case(out, case, indent);
            }
            push_indent(out, indent);
            out.push_str("}\n");
        }
        Stmt::If(if_stmt) => print_if(out, if_stmt, indent),
    }
}

fn print_case(out: &mut String, case: &CaseClause, indent: usize) {
    push_indent(out, indent);
    if case.exprs.is_empty() {
        out.push_str("default:\n");
    } else {
        let list = case.exprs.iter().map(print_expr).collect::<Vec<_>>().join(", ");
        let _ = writeln!(out, "case {list}:");
    }
    out.push_str(&print_stmts(&case.body, indent + 1));
}

fn print_if(out: &mut String, if_stmt: &IfStmt, indent: usize) {
    if let Some(deco) = if_stmt.deco {
        push_indent(out, indent);
        out.push_str(deco);
        out.push('\n');
    }
    push_indent(out, indent);
    out.push_str("if ");
    if let Some(init) = &if_stmt.init {
        let mut rendered = String::new();
        print_stmt(&mut rendered, init, 0);
        out.push_str(rendered.trim_end());
        out.push_str("; ");
    }
    out.push_str(&print_expr(&if_stmt.cond));
    out.push_str(" {\n");
    out.push_str(&print_stmts(&if_stmt.then, indent + 1));
    push_indent(out, indent);
    out.push('}');
    if !if_stmt.els.is_empty() {
        out.push_str(" else {\n");
        out.push_str(&print_stmts(&if_stmt.els, indent + 1));
        push_indent(out, indent);
        out.push('}');
    }
    out.push('\n');
}
