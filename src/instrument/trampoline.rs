//! Trampoline and context-carrier synthesis.
//!
//! Starts from the embedded code template and specializes it per
//! (target function, rule) pair: the carrier type and both relays are
//! renamed with the rule's suffix, relay signatures are computed from the
//! target's own signature, the typed accessor switches are regenerated and
//! the hook entry points are declared with linker-level name aliases.

use crate::{
    ast::{
        self,
        lexer::{Lexer, TokKind, Token},
        node::{self, Expr, Stmt},
        printer, FuncDecl, GoFile, ParseMode, TypeExpr,
    },
    error::{Result, WeaveError},
    rules::FuncRule,
    utils,
};
use itertools::Itertools;
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const TEMPLATE_SRC: &str = include_str!("template.go");

/// Placeholders the template carries; see `template.go`.
const FUNC_NAME_PLACEHOLDER: &str = "OtelFuncNamePlaceholder";
const PACKAGE_NAME_PLACEHOLDER: &str = "OtelPackageNamePlaceholder";
const PARAMS_PLACEHOLDER: &str = "OtelParamsPlaceholder";
const PARAMS_SLICE_PLACEHOLDER: &str = "OtelParamsSlicePlaceholder";
const RESULTS_PLACEHOLDER: &str = "OtelResultsPlaceholder";
const RESULTS_SLICE_PLACEHOLDER: &str = "OtelResultsSlicePlaceholder";
const BEFORE_CALL_PLACEHOLDER: &str = "OtelBeforeHookCallPlaceholder";
const AFTER_CALL_PLACEHOLDER: &str = "OtelAfterHookCallPlaceholder";

const SIMPLE_METHODS: &[&str] = &[
    "SetSkipCall",
    "IsSkipCall",
    "SetData",
    "GetData",
    "GetFuncName",
    "GetPackageName",
    "GetParamCount",
    "GetReturnValCount",
];

static TEMPLATE: Lazy<Template> = Lazy::new(|| Template::load().expect("embedded template parses"));

struct Template {
    file: GoFile,
}

impl Template {
    fn load() -> Result<Self> {
        let file =
            ast::parser::parse_source(TEMPLATE_SRC, Path::new("template.go"), ParseMode::Full)?;
        Ok(Self { file })
    }

    /// Source text of a function (or method) declaration by name.
    fn func_text(&self, name: &str) -> &str {
        let decl = self
            .file
            .func_decls()
            .find(|f| f.name.data == name)
            .unwrap_or_else(|| panic!("template is missing func {name}"));
        &self.file.src[decl.span.clone()]
    }

    fn func_decl(&self, name: &str) -> &FuncDecl {
        self.file
            .func_decls()
            .find(|f| f.name.data == name)
            .unwrap_or_else(|| panic!("template is missing func {name}"))
    }

    /// Source text of a type declaration, `type` keyword included.
    fn type_text(&self, name: &str) -> &str {
        let decl = self
            .file
            .find_type_decl(name)
            .unwrap_or_else(|| panic!("template is missing type {name}"));
        &self.file.src[decl.span.start..decl.span.end]
    }
}

/// The shared capability declaration, emitted once per compile unit into
/// the globals file.
pub fn hook_context_interface() -> String {
    TEMPLATE.type_text("HookContext").to_string()
}

/// One value forwarded into the relays: a parameter or return value of the
/// target function.
#[derive(Clone, Debug)]
pub struct Slot {
    /// Name in the target's scope; `None` for `_` and unnamed slots, which
    /// are forwarded as a literal nil.
    pub forward: Option<String>,
    pub ty: TypeExpr,
}

/// Everything the jump-site inserter and the optimizer need to know about
/// one synthesized trampoline pair.
#[derive(Clone, Debug)]
pub struct TrampolineInfo {
    pub rule: FuncRule,
    pub suffix: String,
    pub before_name: String,
    pub after_name: String,
    pub carrier_name: String,
    pub before_hook_var: String,
    pub after_hook_var: String,
    pub params: Vec<Slot>,
    /// Result slots; `forward` is always set after anonymous results have
    /// been renamed.
    pub results: Vec<Slot>,
    /// Merged type parameters, receiver parameters first.
    pub type_params: Vec<(String, String)>,
}

impl TrampolineInfo {
    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    pub fn type_arg_names(&self) -> Vec<String> {
        self.type_params.iter().map(|(name, _)| name.clone()).collect()
    }

    /// `[K comparable, V any]`, or empty when the target is not generic.
    fn type_params_decl(&self) -> String {
        if self.type_params.is_empty() {
            return String::new();
        }
        let list = self
            .type_params
            .iter()
            .map(|(name, constraint)| format!("{name} {constraint}"))
            .join(", ");
        format!("[{list}]")
    }

    /// Names of the type parameters, for erasure in accessor case types.
    fn type_param_names(&self) -> Vec<String> {
        self.type_params.iter().map(|(n, _)| n.clone()).collect()
    }
}

/// Builds the synthesis plan for a (target, rule) pair.
///
/// `result_names` must already be resolved (anonymous results renamed); see
/// [`resolved_result_names`].
pub fn plan(
    file: &GoFile,
    target: &FuncDecl,
    rule: &FuncRule,
    result_names: &[String],
) -> Result<TrampolineInfo> {
    let suffix = rule.suffix();
    let target_tag = target_tag(target);

    let mut params = Vec::new();
    if let Some(recv) = &target.recv {
        params.push(Slot { forward: forwardable(&recv.names), ty: recv.ty.clone() });
    }
    for field in ast::split_multi_name_fields(&target.params.fields) {
        params.push(Slot { forward: forwardable(&field.names), ty: field.ty.clone() });
    }

    let result_fields = ast::split_multi_name_fields(&target.results.fields);
    debug_assert_eq!(result_fields.len(), result_names.len());
    let results = result_fields
        .iter()
        .zip(result_names)
        .map(|(field, name)| Slot { forward: Some(name.clone()), ty: field.ty.clone() })
        .collect();

    let mut type_params = Vec::new();
    if let Some(recv) = &target.recv {
        let names = recv.ty.receiver_type_params();
        if !names.is_empty() {
            // constraints live on the generic type declaration; default to
            // the top capability if it is declared in another file
            let decl_params = file
                .find_type_decl(&recv.ty.base_name())
                .and_then(|decl| decl.type_params.as_ref().map(ast::clone_type_params));
            let constraints: Vec<String> = match &decl_params {
                Some(list) => ast::split_multi_name_fields(&list.fields)
                    .iter()
                    .map(|f| f.ty.text.clone())
                    .collect(),
                None => Vec::new(),
            };
            for (i, name) in names.into_iter().enumerate() {
                let constraint =
                    constraints.get(i).cloned().unwrap_or_else(|| "any".to_string());
                type_params.push((name, constraint));
            }
        }
    }
    if let Some(own) = &target.type_params {
        let own = ast::clone_type_params(own);
        for field in ast::split_multi_name_fields(&own.fields) {
            for name in &field.names {
                type_params.push((name.data.clone(), field.ty.text.clone()));
            }
        }
    }

    Ok(TrampolineInfo {
        rule: rule.clone(),
        suffix: suffix.clone(),
        before_name: format!("before_trampoline_{target_tag}_{suffix}"),
        after_name: format!("after_trampoline_{target_tag}_{suffix}"),
        carrier_name: format!("HookContextImpl{suffix}"),
        before_hook_var: format!("before_hook_{target_tag}_{suffix}"),
        after_hook_var: format!("after_hook_{target_tag}_{suffix}"),
        params,
        results,
        type_params,
    })
}

fn forwardable(names: &[ast::Spanned<String>]) -> Option<String> {
    names.first().map(|n| n.data.clone()).filter(|n| n != "_")
}

fn target_tag(target: &FuncDecl) -> String {
    match &target.recv {
        Some(recv) => {
            utils::sanitize_ident(&format!("{}_{}", recv.ty.base_name(), target.name.data))
        }
        None => utils::sanitize_ident(&target.name.data),
    }
}

/// Resolves the target's result names, renaming anonymous (and `_`)
/// results to `_retvalN` in the declaration itself so the skip-path return
/// statement can reference them. Returns the names alongside the signature
/// edit, if one is needed.
pub fn resolved_result_names(
    target: &FuncDecl,
) -> (Vec<String>, Option<(usize, usize, String)>) {
    let fields = ast::split_multi_name_fields(&target.results.fields);
    if fields.is_empty() {
        return (Vec::new(), None);
    }
    let mut names = Vec::with_capacity(fields.len());
    let mut needs_rename = false;
    for (idx, field) in fields.iter().enumerate() {
        match field.names.first() {
            Some(name) if name.data != "_" => names.push(name.data.clone()),
            _ => {
                names.push(format!("_retval{idx}"));
                needs_rename = true;
            }
        }
    }
    if !needs_rename {
        return (names, None);
    }
    let rendered = names
        .iter()
        .zip(&fields)
        .map(|(name, field)| {
            let ty = if field.ty.variadic { field.ty.desugared() } else { field.ty.text.clone() };
            format!("{name} {ty}")
        })
        .collect::<Vec<_>>()
        .join(", ");
    let span = target
        .results
        .span
        .clone()
        .expect("non-empty result list always has a span");
    (names, Some((span.start, span.end, format!("({rendered})"))))
}

/// The generated code for one (target, rule) pair.
#[derive(Clone, Debug, Default)]
pub struct TrampolineCode {
    /// Before relay, appended to the target file. Dropped by the optimizer
    /// when the rule has no before hook.
    pub before_relay: String,
    /// After relay, appended to the target file. Dropped when the rule has
    /// no after hook.
    pub after_relay: String,
    /// Carrier type and its methods.
    pub carrier: String,
    /// Hook declarations (linkname aliases) for the globals file.
    pub hook_decls: Vec<String>,
}

/// Materializes the template for one trampoline pair.
pub fn synthesize(
    info: &TrampolineInfo,
    package_name: &str,
    target_func_name: &str,
    hooks: Option<&HookLibrary>,
) -> Result<TrampolineCode> {
    // when the staged hook sources are available, check the hook signatures
    // and learn which slots the hook accepts as `any`
    let before_sig = match &info.rule.before {
        Some(hook) => Some(check_hook(info, hooks, hook, &info.params)?),
        None => None,
    };
    let after_sig = match &info.rule.after {
        Some(hook) => Some(check_hook(info, hooks, hook, &info.results)?),
        None => None,
    };

    let mut code = TrampolineCode {
        carrier: synthesize_carrier(info),
        ..Default::default()
    };

    code.before_relay = specialize_relay(
        info,
        "before_trampoline",
        &info.before_name,
        package_name,
        target_func_name,
        &info.params,
        PARAMS_PLACEHOLDER,
        PARAMS_SLICE_PLACEHOLDER,
        BEFORE_CALL_PLACEHOLDER,
        &info.before_hook_var,
        before_sig.as_ref(),
        "param",
    )?;
    code.after_relay = specialize_relay(
        info,
        "after_trampoline",
        &info.after_name,
        package_name,
        target_func_name,
        &info.results,
        RESULTS_PLACEHOLDER,
        RESULTS_SLICE_PLACEHOLDER,
        AFTER_CALL_PLACEHOLDER,
        &info.after_hook_var,
        after_sig.as_ref(),
        "ret",
    )?;

    if let (Some(hook), Some(sig)) = (&info.rule.before, &before_sig) {
        code.hook_decls.push(hook_declaration(
            &info.before_hook_var,
            &info.rule.path,
            hook,
            &info.params,
            sig,
            info,
        ));
    }
    if let (Some(hook), Some(sig)) = (&info.rule.after, &after_sig) {
        code.hook_decls.push(hook_declaration(
            &info.after_hook_var,
            &info.rule.path,
            hook,
            &info.results,
            sig,
            info,
        ));
    }
    Ok(code)
}

/// Which slots of a hook signature accept anything.
#[derive(Clone, Debug, Default)]
pub struct HookSignature {
    pub any_slots: Vec<bool>,
    pub variadic_tail: bool,
}

fn check_hook(
    info: &TrampolineInfo,
    hooks: Option<&HookLibrary>,
    hook_name: &str,
    slots: &[Slot],
) -> Result<HookSignature> {
    let default = HookSignature {
        any_slots: vec![false; slots.len()],
        variadic_tail: slots.last().map_or(false, |s| s.ty.variadic),
    };
    let Some(hooks) = hooks else {
        // no staged sources to check against
        return Ok(default);
    };
    let Some(decl) = hooks.find_hook(hook_name) else {
        return Err(WeaveError::HookMismatch {
            hook: format!("{}.{}", info.rule.path, hook_name),
            target: info.rule.func.clone(),
            message: "hook not found in staged hook library".into(),
        });
    };
    let hook_params = ast::split_multi_name_fields(&decl.params.fields);
    if hook_params.len() != slots.len() + 1 {
        return Err(WeaveError::HookMismatch {
            hook: format!("{}.{}", info.rule.path, hook_name),
            target: info.rule.func.clone(),
            message: format!(
                "expected {} parameters after the context, found {}",
                slots.len(),
                hook_params.len().saturating_sub(1)
            ),
        });
    }
    if hook_params[0].ty.base_name() != "HookContext" {
        return Err(WeaveError::HookMismatch {
            hook: format!("{}.{}", info.rule.path, hook_name),
            target: info.rule.func.clone(),
            message: format!(
                "first parameter must be HookContext, found {}",
                hook_params[0].ty.text
            ),
        });
    }
    let mut sig = HookSignature::default();
    for (hook_param, slot) in hook_params[1..].iter().zip(slots) {
        if hook_param.ty.is_any() {
            sig.any_slots.push(true);
            continue;
        }
        sig.any_slots.push(false);
        // compare unqualified base names so hooks can refer to the target's
        // exported types through their own import path
        if hook_param.ty.base_name() != slot.ty.base_name() {
            return Err(WeaveError::HookMismatch {
                hook: format!("{}.{}", info.rule.path, hook_name),
                target: info.rule.func.clone(),
                message: format!(
                    "parameter type {} does not match target type {}",
                    hook_param.ty.text, slot.ty.text
                ),
            });
        }
    }
    sig.variadic_tail = hook_params.last().map_or(false, |p| p.ty.variadic);
    Ok(sig)
}

/// `//go:linkname` declaration for a hook entry point. Variadic slots stay
/// `...T` so the relay's call site can spread.
fn hook_declaration(
    var_name: &str,
    hook_path: &str,
    hook_name: &str,
    slots: &[Slot],
    sig: &HookSignature,
    info: &TrampolineInfo,
) -> String {
    let mut params = vec!["ctx HookContext".to_string()];
    for (idx, slot) in slots.iter().enumerate() {
        let ty = if sig.any_slots.get(idx).copied().unwrap_or(false) {
            "any".to_string()
        } else if info.is_generic() {
            slot.ty.erase_type_params(&info.type_param_names())
        } else {
            slot.ty.text.clone()
        };
        let ty = if slot.ty.variadic { format!("...{ty}") } else { ty };
        params.push(format!("p{idx} {ty}"));
    }
    format!(
        "//go:linkname {var_name} {hook_path}.{hook_name}\nvar {var_name} func({})",
        params.join(", ")
    )
}

/// Carrier type + methods, renamed per rule, with the accessor switches
/// regenerated for the target's parameter and return-value types.
fn synthesize_carrier(info: &TrampolineInfo) -> String {
    let mut out = String::new();

    out.push_str(&rename_idents(
        TEMPLATE.type_text("HookContextImpl"),
        &[("HookContextImpl", &info.carrier_name)],
    ));
    out.push_str("\n\n");

    for method in SIMPLE_METHODS {
        out.push_str(&rename_idents(
            TEMPLATE.func_text(method),
            &[("HookContextImpl", &info.carrier_name)],
        ));
        out.push_str("\n\n");
    }

    for (method, slots, is_set) in [
        ("SetParam", &info.params, true),
        ("GetParam", &info.params, false),
        ("SetReturnVal", &info.results, true),
        ("GetReturnVal", &info.results, false),
    ] {
        out.push_str(&accessor_method(info, method, slots, is_set));
        out.push_str("\n\n");
    }
    out.pop();
    out
}

/// One of the four switch accessors: the template's header with the body
/// regenerated case by case.
fn accessor_method(info: &TrampolineInfo, method: &str, slots: &[Slot], is_set: bool) -> String {
    let decl = TEMPLATE.func_decl(method);
    let body_span = decl.body.as_ref().expect("template methods have bodies").span.clone();
    let header = rename_idents(
        &TEMPLATE.file.src[decl.span.start..body_span.start],
        &[("HookContextImpl", &info.carrier_name)],
    );

    // mutating a generic target's values is unsupported; state that loudly
    if is_set && info.is_generic() {
        return format!(
            "{header}{{\n\tpanic(\"{method} is unsupported for generic functions\")\n}}"
        );
    }

    let slice = if method.ends_with("Param") { "params" } else { "returnVals" };
    let mut cases = Vec::new();
    for (idx, slot) in slots.iter().enumerate() {
        let ty = if info.is_generic() {
            let erased = TypeExpr::synthetic(slot.ty.erase_type_params(&info.type_param_names()));
            TypeExpr { variadic: slot.ty.variadic, ..erased }
        } else {
            slot.ty.clone()
        };
        let elem = Expr::Raw(format!("c.{slice}[{idx}]"));
        let body = if is_set {
            if ty.is_any() {
                vec![node::assign(vec![elem], vec![node::ident("val")])]
            } else {
                vec![node::assign(
                    vec![node::deref(node::type_assert(elem, ty.pointered()))],
                    vec![node::type_assert(node::ident("val"), ty.desugared())],
                )]
            }
        } else if ty.is_any() {
            vec![node::ret(vec![elem])]
        } else {
            vec![node::ret(vec![node::deref(node::type_assert(elem, ty.pointered()))])]
        };
        cases.push(node::case_clause(vec![node::int_lit(idx)], body));
    }
    // the template's default clause stays: out-of-range indexes are a bug
    // in the hook
    cases.push(node::case_clause(
        vec![],
        vec![Stmt::Raw(format!("panic(\"{method}: index out of range\")"))],
    ));
    let switch = Stmt::Switch { tag: node::ident("idx"), cases };
    format!("{header}{{\n{}}}", printer::print_stmts(&[switch], 1))
}

/// Specializes one relay function from the template.
#[allow(clippy::too_many_arguments)]
fn specialize_relay(
    info: &TrampolineInfo,
    template_name: &str,
    relay_name: &str,
    package_name: &str,
    target_func_name: &str,
    slots: &[Slot],
    sig_placeholder: &str,
    slice_placeholder: &str,
    call_placeholder: &str,
    hook_var: &str,
    hook_sig: Option<&HookSignature>,
    slot_prefix: &str,
) -> Result<String> {
    let text = TEMPLATE.func_text(template_name);
    let mut patcher = Patcher::new(text)?;

    let renamed = format!("{relay_name}{}", info.type_params_decl());
    patcher.rename_ident(template_name, &renamed);
    patcher.rename_ident("HookContextImpl", &info.carrier_name);

    // relay signature: every slot arrives as a pointer
    let sig_text = slots
        .iter()
        .enumerate()
        .map(|(idx, slot)| format!("{slot_prefix}{idx} {}", slot.ty.pointered()))
        .collect::<Vec<_>>()
        .join(", ");
    patcher.replace_ident(sig_placeholder, &sig_text);

    // context population: composite slice literal of the relay parameters
    let slice_text = if slots.is_empty() {
        "nil".to_string()
    } else {
        let elems = (0..slots.len())
            .map(|idx| format!("{slot_prefix}{idx}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("[]interface{{}}{{{elems}}}")
    };
    patcher.replace_ident(slice_placeholder, &slice_text);

    patcher.replace_string_lit(FUNC_NAME_PLACEHOLDER, target_func_name);
    patcher.replace_string_lit(PACKAGE_NAME_PLACEHOLDER, package_name);

    // dispatch to the user hook right before the relay returns
    let call_text = match hook_sig {
        Some(sig) => {
            let mut args = vec![node::ident("ctx")];
            let mut spread = false;
            for (idx, slot) in slots.iter().enumerate() {
                let name = format!("{slot_prefix}{idx}");
                let arg = match &slot.forward {
                    _ if slot.ty.variadic && sig.variadic_tail => {
                        spread = true;
                        Expr::Raw(format!("(*{name})"))
                    }
                    Some(_) => node::deref(node::ident(name)),
                    // nil was forwarded for this slot; hand the hook a zero
                    // value instead of dereferencing it
                    None => Expr::Raw(format!("*new({})", slot.ty.desugared())),
                };
                args.push(arg);
            }
            let mut call = node::call(hook_var, args);
            if let Expr::Call { spread: s, .. } = &mut call {
                *s = spread;
            }
            let guarded = node::if_not_nil(hook_var, vec![Stmt::ExprStmt(call)]);
            printer::print_stmts(&[guarded], 1)
        }
        None => String::new(),
    };
    patcher.replace_stmt_line(call_placeholder, &call_text);

    Ok(patcher.apply())
}

/// Token-level patching of template text: identifier renames, placeholder
/// substitution and line replacement, all as byte-range splices.
struct Patcher<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    updates: Vec<(usize, usize, String)>,
}

impl<'a> Patcher<'a> {
    fn new(src: &'a str) -> Result<Self> {
        let tokens = Lexer::tokenize(src, Path::new("template.go"))?;
        Ok(Self { src, tokens, updates: Vec::new() })
    }

    fn rename_ident(&mut self, from: &str, to: &str) {
        for tok in &self.tokens {
            if tok.kind == TokKind::Ident && tok.text(self.src) == from {
                self.updates.push((tok.span.start, tok.span.end, to.to_string()));
            }
        }
    }

    /// Replaces a placeholder identifier. An empty replacement also removes
    /// a directly preceding comma, so list placeholders vanish cleanly.
    fn replace_ident(&mut self, placeholder: &str, replacement: &str) {
        for (idx, tok) in self.tokens.iter().enumerate() {
            if tok.kind != TokKind::Ident || tok.text(self.src) != placeholder {
                continue;
            }
            let mut start = tok.span.start;
            if replacement.is_empty() {
                if let Some(prev) = self.tokens[..idx].iter().rev().find(|t| t.kind != TokKind::Comment)
                {
                    if prev.is_op(self.src, ",") {
                        start = prev.span.start;
                    }
                }
            }
            self.updates.push((start, tok.span.end, replacement.to_string()));
        }
    }

    /// Replaces the whole line carrying a placeholder statement.
    fn replace_stmt_line(&mut self, placeholder: &str, replacement: &str) {
        for tok in &self.tokens {
            if tok.kind != TokKind::Ident || tok.text(self.src) != placeholder {
                continue;
            }
            let line_start =
                self.src[..tok.span.start].rfind('\n').map(|i| i + 1).unwrap_or(0);
            let line_end = self.src[tok.span.end..]
                .find('\n')
                .map(|i| tok.span.end + i + 1)
                .unwrap_or(self.src.len());
            self.updates.push((line_start, line_end, replacement.to_string()));
        }
    }

    /// Replaces a placeholder string literal's contents.
    fn replace_string_lit(&mut self, placeholder: &str, replacement: &str) {
        let quoted = format!("{placeholder:?}");
        for tok in &self.tokens {
            if tok.kind == TokKind::Str && tok.text(self.src) == quoted {
                self.updates.push((tok.span.start, tok.span.end, format!("{replacement:?}")));
            }
        }
    }

    fn apply(self) -> String {
        utils::apply_updates(self.src, self.updates)
    }
}

fn rename_idents(src: &str, renames: &[(&str, &str)]) -> String {
    let mut patcher = Patcher::new(src).expect("template text lexes");
    for (from, to) in renames {
        patcher.rename_ident(from, to);
    }
    patcher.apply()
}

/// Parsed declarations of one staged hook library, used for signature
/// checking.
#[derive(Debug, Default)]
pub struct HookLibrary {
    files: Vec<GoFile>,
}

impl HookLibrary {
    /// Parses every Go file under the staged library directory.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(WeaveError::msg(format!(
                "hook library {} is not staged",
                dir.display()
            )));
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|err| {
                WeaveError::msg(format!("walking {}: {err}", dir.display()))
            })?;
            let path: PathBuf = entry.path().to_path_buf();
            if !utils::is_go_source(&path) {
                continue;
            }
            match ast::parser::parse_file(&path, ParseMode::Declarations) {
                Ok(file) => files.push(file),
                Err(err) => warn!("skipping hook source {}: {err}", path.display()),
            }
        }
        Ok(Self { files })
    }

    /// Finds a top-level hook function by name.
    pub fn find_hook(&self, name: &str) -> Option<&FuncDecl> {
        self.files.iter().find_map(|f| f.find_func_decl_without_receiver(name))
    }
}

/// Receiver accessor used by tests and the jump-site inserter.
impl Slot {
    pub fn forward_expr(&self) -> Expr {
        match &self.forward {
            Some(name) => node::addr(node::ident(name.clone())),
            None => node::nil(),
        }
    }
}
