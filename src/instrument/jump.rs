//! Trampoline jump-site construction and insertion.
//!
//! Each matching rule contributes one conditional dispatch site at the
//! target function's entry. Several rules on the same function chain by
//! nesting inside the previous jump-if's else block, which fixes the
//! before/after call order observed at runtime: the outer rule's before
//! hook runs first, its after hook runs last.

use super::trampoline::{TrampolineCode, TrampolineInfo};
use crate::ast::{
    node::{self, Expr, IfStmt, Stmt, TRAMPOLINE_JUMP_IF},
    printer,
};

/// File name emitted in line directives for generated statements.
pub const GENERATED_FILE: &str = "<generated>";

/// An outstanding jump-site: target function, jump-if node, originating
/// rule (inside [`TrampolineInfo`]), and the code synthesized for it.
#[derive(Clone, Debug)]
pub struct TrampolineJump {
    pub info: TrampolineInfo,
    pub jump: IfStmt,
    pub code: TrampolineCode,
    /// Cleared by the optimizer when the corresponding relay is
    /// unreferenced and must not be emitted.
    pub emit_before: bool,
    pub emit_after: bool,
}

impl TrampolineJump {
    pub fn new(info: TrampolineInfo, code: TrampolineCode) -> Self {
        let jump = build_jump(&info);
        Self { info, jump, code, emit_before: true, emit_after: true }
    }
}

/// Builds the canonical dispatch site:
///
/// ```text
/// if ctx, skip := before_trampoline_x(&a, ...); skip {
///     after_trampoline_x(ctx, &r, ...)
///     return r, ...
/// } else {
///     defer after_trampoline_x(ctx, &r, ...)
/// }
/// ```
///
/// Generic targets are instantiated explicitly with the type-parameter
/// names in scope at the insertion point.
fn build_jump(info: &TrampolineInfo) -> IfStmt {
    let type_args = info.type_arg_names();

    let before_args = info.params.iter().map(|slot| slot.forward_expr()).collect();
    let before_call = node::call_generic(&info.before_name, type_args.clone(), before_args);

    let after_call = node::call_generic(&info.after_name, type_args, after_args(info));

    let result_idents = info
        .results
        .iter()
        .map(|slot| node::ident(slot.forward.clone().expect("results are always named")))
        .collect();

    IfStmt {
        init: Some(Box::new(node::define(
            vec![node::ident("ctx"), node::ident("skip")],
            vec![before_call],
        ))),
        cond: node::ident("skip"),
        then: vec![Stmt::ExprStmt(after_call.clone()), node::ret(result_idents)],
        els: vec![node::defer_call(after_call)],
        deco: Some(TRAMPOLINE_JUMP_IF),
    }
}

/// Arguments of the after relay: the context followed by the address of
/// every (named) return value.
pub fn after_args(info: &TrampolineInfo) -> Vec<Expr> {
    let mut args = vec![node::ident("ctx")];
    args.extend(
        info.results
            .iter()
            .map(|slot| node::addr(node::ident(slot.forward.clone().expect("results are named")))),
    );
    args
}

/// Renders a function's jump chain as the text to splice right after the
/// opening brace of its body.
///
/// The chain carries `//line <generated>:1`; `orig` restores the mapping
/// to the first original statement so debuggers keep pointing at user
/// code.
pub fn render_chain(jumps: &[TrampolineJump], orig: Option<(&str, u32)>) -> String {
    assert!(!jumps.is_empty(), "rendering an empty jump chain");
    let mut nested: Option<Stmt> = None;
    for jump in jumps.iter().rev() {
        let mut stmt = jump.jump.clone();
        if let Some(inner) = nested.take() {
            stmt.els.push(inner);
        }
        nested = Some(Stmt::If(stmt));
    }

    let mut stmts = vec![node::line_directive(GENERATED_FILE, 1)];
    stmts.push(nested.expect("chain is non-empty"));
    if let Some((file, line)) = orig {
        stmts.push(node::line_directive(file, line));
    }
    // no trailing newline: the restoring line directive must sit directly
    // above the original first statement
    let rendered = printer::print_stmts(&stmts, 1);
    format!("\n{}", rendered.trim_end_matches('\n'))
}
