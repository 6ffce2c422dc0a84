//! Peephole rewrites on registered jump-sites.
//!
//! The dispatch shape is preserved so the downstream compiler's inliner,
//! constant propagation and dead-code passes reduce the un-hooked fast
//! path to nothing.

use super::{jump::TrampolineJump, trampoline::TrampolineInfo};
use crate::ast::node::{self, Expr, Stmt};

/// One pass over a jump-site, before file write-back.
pub fn optimize(jump: &mut TrampolineJump) {
    jump.jump.deco = None;

    if jump.info.rule.after.is_none() {
        jump.emit_after = false;
        let after_name = jump.info.after_name.clone();
        // the else block keeps its other contents; chained sibling
        // jump-ifs are appended there later
        for stmt in &mut jump.jump.els {
            if matches!(stmt, Stmt::Defer(_)) {
                *stmt = node::empty();
            }
        }
        for stmt in &mut jump.jump.then {
            if is_call_to(stmt, &after_name) {
                *stmt = node::empty();
            }
        }
    }

    if jump.info.rule.before.is_none() {
        jump.emit_before = false;
        let lit = context_literal(&jump.info);
        for stmt in &mut jump.jump.els {
            if let Stmt::Defer(Expr::Call { args, .. }) = stmt {
                if !args.is_empty() {
                    args[0] = lit.clone();
                }
            }
        }
        jump.jump.cond = node::false_lit();
        jump.jump.init = None;
        jump.jump.then = vec![node::empty()];
    }
}

fn is_call_to(stmt: &Stmt, name: &str) -> bool {
    if let Stmt::ExprStmt(Expr::Call { fun, .. }) = stmt {
        if let Expr::Ident(fun_name) = fun.as_ref() {
            return fun_name == name;
        }
    }
    false
}

/// `&HookContextImplX{params: []interface{}{&a, ...}, returnVals:
/// []interface{}{&r, ...}}` — the context the after relay would have
/// received from the removed before relay.
fn context_literal(info: &TrampolineInfo) -> Expr {
    let params = info.params.iter().map(|slot| slot.forward_expr()).collect();
    let returns = info
        .results
        .iter()
        .map(|slot| node::addr(node::ident(slot.forward.clone().expect("results are named"))))
        .collect();
    node::addr(node::composite_lit(
        &info.carrier_name,
        vec![
            node::key_value(node::ident("params"), node::composite_lit("[]interface{}", params)),
            node::key_value(
                node::ident("returnVals"),
                node::composite_lit("[]interface{}", returns),
            ),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{self, node::TRAMPOLINE_JUMP_IF, printer, ParseMode},
        instrument::{
            jump::{self, TrampolineJump},
            trampoline::{plan, resolved_result_names, synthesize},
        },
        rules::{FuncRule, RuleBase},
    };
    use std::path::Path;

    fn jump_with(before: Option<&str>, after: Option<&str>) -> TrampolineJump {
        let src = "package demo\n\nfunc Foo(a int) (err error) {\n\treturn nil\n}\n";
        let file = ast::parser::parse_source(src, Path::new("demo.go"), ParseMode::Full).unwrap();
        let target = file.find_func_decl_without_receiver("Foo").unwrap();
        let rule = FuncRule {
            base: RuleBase {
                name: "demo".into(),
                target: "github.com/demo/pkg".into(),
                version: String::new(),
            },
            func: "Foo".into(),
            recv: None,
            before: before.map(Into::into),
            after: after.map(Into::into),
            path: "otel/hooks/demo".into(),
        };
        let (names, _) = resolved_result_names(target);
        let info = plan(&file, target, &rule, &names).unwrap();
        let code = synthesize(&info, "demo", "Foo", None).unwrap();
        TrampolineJump::new(info, code)
    }

    #[test]
    fn strips_sentinel_decoration() {
        let mut jump = jump_with(Some("B"), Some("A"));
        assert_eq!(jump.jump.deco, Some(TRAMPOLINE_JUMP_IF));
        optimize(&mut jump);
        assert_eq!(jump.jump.deco, None);
        assert!(jump.emit_before && jump.emit_after);
    }

    #[test]
    fn missing_after_drops_defer_and_relay() {
        let mut jump = jump_with(Some("B"), None);
        optimize(&mut jump);
        assert!(!jump.emit_after);
        assert!(jump.jump.els.iter().all(|s| matches!(s, Stmt::Empty)));
        let rendered = jump::render_chain(&[jump.clone()], None);
        assert!(!rendered.contains("defer"));
        assert!(!rendered.contains(&jump.info.after_name));
        // the skip path still returns
        assert!(rendered.contains("return err"));
    }

    #[test]
    fn missing_before_pins_condition_and_substitutes_literal() {
        let mut jump = jump_with(None, Some("A"));
        optimize(&mut jump);
        assert!(!jump.emit_before);
        assert_eq!(jump.jump.cond, node::false_lit());
        assert!(jump.jump.init.is_none());
        assert_eq!(jump.jump.then, vec![Stmt::Empty]);

        let rendered = printer::print_stmts(&[Stmt::If(jump.jump.clone())], 1);
        let expected_lit = format!(
            "defer {}(&{}{{params: []interface{{}}{{&a}}, returnVals: []interface{{}}{{&err}}}}, &err)",
            jump.info.after_name, jump.info.carrier_name
        );
        assert!(rendered.contains(&expected_lit), "got: {rendered}");
        assert!(rendered.contains("if false {"));
        assert!(!rendered.contains(&jump.info.before_name));
    }

    #[test]
    fn optimizer_is_idempotent() {
        for (before, after) in
            [(Some("B"), Some("A")), (Some("B"), None), (None, Some("A"))]
        {
            let mut once = jump_with(before, after);
            optimize(&mut once);
            let mut twice = once.clone();
            optimize(&mut twice);
            assert_eq!(once.jump, twice.jump);
            assert_eq!(once.emit_before, twice.emit_before);
            assert_eq!(once.emit_after, twice.emit_after);
        }
    }
}
