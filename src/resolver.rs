//! Type resolution and overload selection over a [`TypeCatalog`].
//!
//! The resolver answers four kinds of question for the parser:
//! 1. Which type does a name like `List<int>[]?` denote?
//! 2. Which members, methods and constructors does a type expose (walking
//!    base classes and implemented interfaces)?
//! 3. How far is an argument type from a parameter type (the *distance*)?
//! 4. Which overload wins for a given argument list, with which generic
//!    bindings and which adjusted (converted / packed) arguments?
//!
//! Resolved type names are memoised in a [`DashMap`] so a single resolver can
//! serve concurrent parses; a race only costs a duplicate computation.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, info, trace};

use crate::catalog::{MemberDef, MethodDef, TypeCatalog, TypeDef};
use crate::error::{CompileError, Result};
use crate::expr::{Expr, ExprKind};
use crate::number::NumericKind;
use crate::tokenizer::Position;
use crate::types::Type;
use crate::value::Constant;

/// A method or constructor together with the instantiated type it was found on.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub method: Arc<MethodDef>,
    pub owner: Type,
}

/// A member found on a type, its type already instantiated.
#[derive(Debug, Clone)]
pub struct MemberMatch {
    pub member: Arc<MemberDef>,
    pub owner: Type,
    pub ty: Type,
}

/// Lambda argument whose parameter types come from the overload being tried.
/// The body is re-read from `source` at `body` for every candidate.
#[derive(Debug, Clone)]
pub struct PendingLambda<'a> {
    /// Declared parameter types (when written out) and names.
    pub params: Vec<(Option<Type>, String)>,
    pub source: &'a str,
    pub base: usize,
    pub body: Position,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub enum Argument<'a> {
    Typed(Expr),
    Lambda(PendingLambda<'a>),
}

impl<'a> Argument<'a> {
    fn describe(&self) -> String {
        match self {
            Argument::Typed(e) => e.ty.to_string(),
            Argument::Lambda(l) => format!("lambda/{}", l.params.len()),
        }
    }
}

/// Binds a pending lambda against concrete parameter types.
pub trait LambdaBinder<'a> {
    /// `Ok(None)` when the lambda cannot take these parameters.
    fn bind(&mut self, lambda: &PendingLambda<'a>, params: &[Type], ret: Option<&Type>) -> Result<Option<Expr>>;
}

/// Winning overload.
#[derive(Debug, Clone)]
pub struct Selection {
    pub method: Arc<MethodDef>,
    pub owner: Type,
    pub args: Vec<Expr>,
    pub type_args: Vec<Type>,
    pub ret: Type,
    pub distance: u32,
}

enum Outcome {
    Applicable(Selection),
    Inapplicable,
    Failed(CompileError),
}

pub struct Resolver {
    catalog: Arc<dyn TypeCatalog>,
    cache: DashMap<String, Option<Type>>,
    namespaces: Vec<String>,
    ignore_case: bool,
}

impl Resolver {
    pub fn new(catalog: Arc<dyn TypeCatalog>) -> Self {
        info!("Resolver created");

        Resolver {
            catalog,
            cache: DashMap::new(),
            namespaces: Vec::new(),
            ignore_case: false,
        }
    }

    /// Extra namespace prefixes stripped from qualified names.
    pub fn with_namespaces(mut self, namespaces: Vec<String>) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Fall back to case-insensitive member lookup.
    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn catalog(&self) -> &Arc<dyn TypeCatalog> {
        &self.catalog
    }

    pub fn named_constant(&self, name: &str) -> Option<Constant> {
        self.catalog.named_constant(name)
    }

    // ── type names ───────────────────────────────────────────────────────

    /// Resolve a textual type name: `T?`, `T[]`, `T[,]`, `G<A, B>` and plain
    /// (possibly namespace-qualified) names.
    pub fn resolve_type_name(&self, name: &str) -> Option<Type> {
        let key = name.trim();
        if let Some(hit) = self.cache.get(key) {
            return hit.value().clone();
        }

        let resolved = self.parse_type_name(key);
        trace!("Resolved type name '{}' to {:?}", key, resolved);

        self.cache.insert(key.to_string(), resolved.clone());
        resolved
    }

    fn parse_type_name(&self, name: &str) -> Option<Type> {
        if name.is_empty() {
            return None;
        }

        if let Some(inner) = name.strip_suffix('?') {
            return self.resolve_type_name(inner).map(Type::nullable);
        }

        if name.ends_with(']') {
            let open = matching_open(name, '[', ']')?;
            let dims = &name[open + 1..name.len() - 1];
            if !dims.chars().all(|c| c == ',' || c.is_whitespace()) {
                return None;
            }
            let element = self.resolve_type_name(&name[..open])?;
            return Some(Type::Array {
                element: Box::new(element),
                rank: dims.matches(',').count() + 1,
            });
        }

        if name.ends_with('>') {
            let open = matching_open(name, '<', '>')?;
            let args = split_top_level(&name[open + 1..name.len() - 1])
                .into_iter()
                .map(|a| self.resolve_type_name(a))
                .collect::<Option<Vec<_>>>()?;
            return self.instantiate(name[..open].trim(), args);
        }

        self.instantiate(name, Vec::new())
    }

    /// Type called `name` applied to `args`.
    pub fn instantiate(&self, name: &str, args: Vec<Type>) -> Option<Type> {
        let name = self
            .namespaces
            .iter()
            .find_map(|ns| name.strip_prefix(ns.as_str()).and_then(|r| r.strip_prefix('.')))
            .unwrap_or(name);
        let short = name.rsplit('.').next().unwrap_or(name);

        match (short, args.len()) {
            ("Func", n) if n >= 1 => {
                let mut params = args;
                let ret = params.pop()?;
                return Some(Type::function(params, ret));
            }
            ("Action", _) => return Some(Type::function(args, Type::Void)),
            ("Nullable", 1) => return args.into_iter().next().map(Type::nullable),
            _ => {}
        }

        let def = self.catalog.find_type(name, args.len())?;
        Some(def.ty.substitute(&def.bindings(&args)))
    }

    // ── definitions and hierarchy ────────────────────────────────────────

    /// Catalog definition of `ty` and the bindings of its generic parameters.
    pub fn definition(&self, ty: &Type) -> Option<(Arc<TypeDef>, HashMap<String, Type>)> {
        let name = ty.definition_name()?;
        let args = ty.definition_args();
        let def = self.catalog.find_type(name, args.len())?;
        let bindings = def.bindings(&args);
        Some((def, bindings))
    }

    fn parents(&self, ty: &Type) -> Vec<Type> {
        match ty {
            Type::Void | Type::Null | Type::Generic(_) | Type::Object => Vec::new(),
            Type::Array { element, rank } => {
                let mut parents = vec![Type::named("Array", Vec::new())];
                if *rank == 1 {
                    parents.push(Type::named("IEnumerable", vec![(**element).clone()]));
                }
                parents
            }
            Type::Function { .. } => vec![Type::Object],
            _ => match self.definition(ty) {
                Some((def, bindings)) => {
                    let mut parents: Vec<Type> =
                        def.base.iter().map(|b| b.substitute(&bindings)).collect();
                    parents.extend(def.interfaces.iter().map(|i| i.substitute(&bindings)));
                    if parents.is_empty() {
                        parents.push(Type::Object);
                    }
                    parents
                }
                None => vec![Type::Object],
            },
        }
    }

    /// `ty` and every type it inherits from or implements, breadth first,
    /// with the number of hops needed to reach it.
    pub fn supertypes(&self, ty: &Type) -> Vec<(Type, u32)> {
        let mut seen: Vec<(Type, u32)> = vec![(ty.clone(), 0)];
        let mut queue: VecDeque<(Type, u32)> = VecDeque::from([(ty.clone(), 0)]);

        while let Some((current, hops)) = queue.pop_front() {
            for parent in self.parents(&current) {
                if !seen.iter().any(|(t, _)| *t == parent) {
                    seen.push((parent.clone(), hops + 1));
                    queue.push_back((parent, hops + 1));
                }
            }
        }

        seen
    }

    /// Is `ty` (or something it derives from) the definition called `name`?
    pub fn derives_from(&self, ty: &Type, name: &str) -> bool {
        self.supertypes(ty)
            .iter()
            .any(|(t, _)| t.definition_name() == Some(name))
    }

    // ── distance ─────────────────────────────────────────────────────────

    /// Conversion cost from `from` to `to`: 0 identical, 1 for an implicit
    /// value conversion or `null`, otherwise the inheritance hop count.
    pub fn distance(&self, from: &Type, to: &Type) -> Option<u32> {
        if from == to {
            return Some(0);
        }
        if to.contains_generic() || matches!(from, Type::Void) || matches!(to, Type::Void) {
            return None;
        }
        if *from == Type::Null {
            return to.accepts_null().then_some(1);
        }
        if let Type::Nullable(inner) = to {
            let source = from.underlying();
            return (source == &**inner || implicit_value(source, inner)).then_some(1);
        }
        if implicit_value(from, to) {
            return Some(1);
        }

        self.supertypes(from)
            .into_iter()
            .find(|(t, _)| t == to)
            .map(|(_, hops)| hops)
    }

    // ── members ──────────────────────────────────────────────────────────

    fn name_matches(&self, candidate: &str, name: &str, exact: bool) -> bool {
        if exact {
            candidate == name
        } else {
            candidate.eq_ignore_ascii_case(name)
        }
    }

    /// Property, field or constant `name` on `ty` or its supertypes.
    pub fn find_member(&self, ty: &Type, name: &str, is_static: bool) -> Option<MemberMatch> {
        let passes: &[bool] = if self.ignore_case { &[true, false] } else { &[true] };

        for exact in passes {
            for (owner, _) in self.supertypes(ty) {
                let Some((def, bindings)) = self.definition(&owner) else {
                    continue;
                };
                let found = def.members.iter().find(|m| {
                    m.is_static == is_static && self.name_matches(&m.name, name, *exact)
                });
                if let Some(member) = found {
                    return Some(MemberMatch {
                        member: member.clone(),
                        ty: member.ty.substitute(&bindings),
                        owner,
                    });
                }
            }
        }

        None
    }

    fn collect_methods(&self, ty: &Type, name: &str, is_static: bool, exact: bool) -> Vec<Candidate> {
        let owners = if is_static {
            vec![(ty.clone(), 0)]
        } else {
            self.supertypes(ty)
        };

        let mut candidates = Vec::new();
        for (owner, _) in owners {
            let Some((def, _)) = self.definition(&owner) else {
                continue;
            };
            for method in &def.methods {
                if method.is_static == is_static && self.name_matches(&method.name, name, exact) {
                    candidates.push(Candidate {
                        method: method.clone(),
                        owner: owner.clone(),
                    });
                }
            }
        }
        candidates
    }

    fn methods(&self, ty: &Type, name: &str, is_static: bool) -> Vec<Candidate> {
        let candidates = self.collect_methods(ty, name, is_static, true);
        if candidates.is_empty() && self.ignore_case {
            return self.collect_methods(ty, name, is_static, false);
        }
        candidates
    }

    /// Instance methods called `name`, most derived first.
    pub fn instance_methods(&self, ty: &Type, name: &str) -> Vec<Candidate> {
        self.methods(ty, name, false)
    }

    /// Static methods (extension methods included) declared on `ty`.
    pub fn static_methods(&self, ty: &Type, name: &str) -> Vec<Candidate> {
        self.methods(ty, name, true)
    }

    pub fn extension_methods(&self, name: &str) -> Vec<Candidate> {
        self.catalog
            .find_extension_methods(name)
            .into_iter()
            .map(|method| Candidate {
                owner: method.declaring.clone(),
                method,
            })
            .collect()
    }

    pub fn constructors(&self, ty: &Type) -> Vec<Candidate> {
        match self.definition(ty) {
            Some((def, _)) => def
                .constructors
                .iter()
                .map(|ctor| Candidate {
                    method: ctor.clone(),
                    owner: ty.clone(),
                })
                .collect(),
            None => Vec::new(),
        }
    }

    // ── overload selection ───────────────────────────────────────────────

    /// Pick the applicable candidate with the smallest total distance; the
    /// first one wins a tie.
    pub fn select<'a>(
        &self,
        name: &str,
        candidates: &[Candidate],
        explicit: &[Type],
        args: &[Argument<'a>],
        binder: &mut dyn LambdaBinder<'a>,
        offset: usize,
    ) -> Result<Selection> {
        let mut best: Option<Selection> = None;
        let mut failure: Option<CompileError> = None;

        for candidate in candidates {
            match self.try_candidate(candidate, explicit, args, binder, offset) {
                Outcome::Applicable(selection) => {
                    trace!(
                        "Candidate {} applicable at distance {}",
                        selection.method.signature(),
                        selection.distance
                    );
                    if best.as_ref().map_or(true, |b| selection.distance < b.distance) {
                        best = Some(selection);
                    }
                }
                Outcome::Inapplicable => {}
                Outcome::Failed(e) => {
                    failure.get_or_insert(e);
                }
            }
        }

        match best {
            Some(selection) => {
                debug!(
                    "Selected {} for '{}' (distance {})",
                    selection.method.signature(),
                    name,
                    selection.distance
                );

                Ok(selection)
            }
            None => Err(failure.unwrap_or_else(|| CompileError::NoApplicableOverload {
                offset,
                name: name.to_string(),
                arguments: args.iter().map(Argument::describe).collect::<Vec<_>>().join(", "),
            })),
        }
    }

    fn try_candidate<'a>(
        &self,
        candidate: &Candidate,
        explicit: &[Type],
        args: &[Argument<'a>],
        binder: &mut dyn LambdaBinder<'a>,
        offset: usize,
    ) -> Outcome {
        let method = &candidate.method;
        let params = &method.params;
        let variadic = method.is_variadic();
        let fixed = if variadic { params.len() - 1 } else { params.len() };

        if (variadic && args.len() < fixed) || (!variadic && args.len() != params.len()) {
            return Outcome::Inapplicable;
        }

        // A single array argument in the rest position binds unexpanded.
        let expanded = variadic
            && !(args.len() == params.len()
                && matches!(args.last(), Some(Argument::Typed(e))
                    if matches!(e.ty, Type::Array { .. } | Type::Null)));

        let declared = |i: usize| -> Type {
            if i < fixed {
                return params[i].ty.clone();
            }
            match (&params[fixed].ty, expanded) {
                (Type::Array { element, .. }, true) => (**element).clone(),
                (ty, _) => ty.clone(),
            }
        };

        let mut bindings = self
            .definition(&candidate.owner)
            .map(|(_, b)| b)
            .unwrap_or_default();
        let open: Vec<String> = method
            .generic_params
            .iter()
            .filter(|g| !bindings.contains_key(*g))
            .cloned()
            .collect();

        if !explicit.is_empty() {
            if explicit.len() != open.len() {
                return Outcome::Inapplicable;
            }
            for (g, t) in open.iter().zip(explicit) {
                bindings.insert(g.clone(), t.clone());
            }
        } else if !open.is_empty() {
            let mut triples = Vec::new();
            for (i, arg) in args.iter().enumerate() {
                if let Argument::Typed(e) = arg {
                    self.infer(&declared(i).substitute(&bindings), &e.ty, 0, &open, &mut triples);
                }
            }
            apply_inferred(&mut bindings, triples);
        }

        // Lambdas bind once their parameter types are known; their result
        // types may in turn bind more type parameters.
        let mut bound: Vec<Option<Expr>> = vec![None; args.len()];
        loop {
            let mut progress = false;
            let mut waiting = false;

            for (i, arg) in args.iter().enumerate() {
                let Argument::Lambda(lambda) = arg else {
                    continue;
                };
                if bound[i].is_some() {
                    continue;
                }

                let target = declared(i).substitute(&bindings);
                let Type::Function { params: fparams, ret } = &target else {
                    return Outcome::Inapplicable;
                };
                if fparams.len() != lambda.params.len() {
                    return Outcome::Inapplicable;
                }
                if fparams.iter().any(Type::contains_generic) {
                    waiting = true;
                    continue;
                }
                let declared_match = lambda
                    .params
                    .iter()
                    .zip(fparams)
                    .all(|((ty, _), p)| ty.as_ref().map_or(true, |t| t == p));
                if !declared_match {
                    return Outcome::Inapplicable;
                }

                let expected = (!ret.contains_generic()).then_some(&**ret);
                let expr = match binder.bind(lambda, fparams, expected) {
                    Ok(Some(expr)) => expr,
                    Ok(None) => return Outcome::Inapplicable,
                    Err(e) => return Outcome::Failed(e),
                };

                let mut triples = Vec::new();
                self.infer(&target, &expr.ty, 0, &open, &mut triples);
                apply_inferred(&mut bindings, triples);

                bound[i] = Some(expr);
                progress = true;
            }

            if !waiting || !progress {
                break;
            }
        }

        if let Some(missing) = method.generic_params.iter().find(|g| !bindings.contains_key(*g)) {
            return Outcome::Failed(CompileError::GenericInferenceFailed {
                offset,
                method: method.signature(),
                parameter: missing.clone(),
            });
        }

        let mut total = 0u32;
        let mut rest_max = 0u32;
        for (i, arg) in args.iter().enumerate() {
            let target = declared(i).substitute(&bindings);
            let d = match arg {
                Argument::Typed(e) => self.distance(&e.ty, &target),
                Argument::Lambda(_) => bound[i].as_ref().map(|_| 0),
            };
            let Some(d) = d else {
                return Outcome::Inapplicable;
            };
            if expanded && i >= fixed {
                rest_max = rest_max.max(d);
            } else {
                total += d;
            }
        }
        total += rest_max;

        let mut adjusted = Vec::with_capacity(params.len());
        let mut rest = Vec::new();
        for (i, arg) in args.iter().enumerate() {
            let target = declared(i).substitute(&bindings);
            let expr = match arg {
                Argument::Typed(e) => e.clone().coerce(&target),
                Argument::Lambda(_) => match bound[i].take() {
                    Some(e) => e,
                    None => return Outcome::Inapplicable,
                },
            };
            if expanded && i >= fixed {
                rest.push(expr);
            } else {
                adjusted.push(expr);
            }
        }
        if expanded {
            let element = declared(fixed).substitute(&bindings);
            adjusted.push(Expr::new(
                ExprKind::NewArrayInit {
                    element: element.clone(),
                    items: rest,
                },
                Type::array(element),
            ));
        }

        let type_args = method
            .generic_params
            .iter()
            .filter_map(|g| bindings.get(g).cloned())
            .collect();

        Outcome::Applicable(Selection {
            method: method.clone(),
            owner: candidate.owner.clone(),
            args: adjusted,
            type_args,
            ret: method.ret.substitute(&bindings),
            distance: total,
        })
    }

    /// Walk `param` and `arg` in parallel, recording
    /// `(type parameter, candidate, depth)` for every open parameter reached.
    fn infer(&self, param: &Type, arg: &Type, depth: usize, open: &[String], out: &mut Vec<(String, Type, usize)>) {
        match param {
            Type::Generic(name) if open.contains(name) => {
                if *arg != Type::Null {
                    out.push((name.clone(), arg.clone(), depth));
                }
            }
            Type::Array { element, rank } => {
                if let Type::Array { element: a, rank: r } = arg {
                    if rank == r {
                        self.infer(element, a, depth + 1, open, out);
                    }
                }
            }
            Type::Nullable(inner) => match arg {
                Type::Nullable(a) => self.infer(inner, a, depth + 1, open, out),
                a if !a.is_reference() => self.infer(inner, a, depth + 1, open, out),
                _ => {}
            },
            Type::Function { params, ret } => {
                if let Type::Function { params: ap, ret: ar } = arg {
                    if ap.len() == params.len() {
                        for (p, a) in params.iter().zip(ap) {
                            self.infer(p, a, depth + 1, open, out);
                        }
                        self.infer(ret, ar, depth + 1, open, out);
                    }
                }
            }
            Type::Named { name, args } if param.contains_generic() => {
                for (sup, _) in self.supertypes(arg) {
                    if let Type::Named { name: n, args: sa } = &sup {
                        if n == name && sa.len() == args.len() {
                            for (p, a) in args.iter().zip(sa) {
                                self.infer(p, a, depth + 1, open, out);
                            }
                            break;
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// Keep, per type parameter, the deepest candidate (the first on a tie).
fn apply_inferred(bindings: &mut HashMap<String, Type>, triples: Vec<(String, Type, usize)>) {
    let mut best: HashMap<String, (Type, usize)> = HashMap::new();
    for (name, ty, depth) in triples {
        match best.get(&name) {
            Some((_, d)) if *d >= depth => {}
            _ => {
                best.insert(name, (ty, depth));
            }
        }
    }
    for (name, (ty, _)) in best {
        bindings.entry(name).or_insert(ty);
    }
}

/// Implicit numeric widening, with `char` converting like `ushort`.
fn implicit_value(from: &Type, to: &Type) -> bool {
    let source = match from {
        Type::Numeric(kind) => *kind,
        Type::Char => NumericKind::UShort,
        _ => return false,
    };
    match to {
        Type::Numeric(target) => source != *target && source.widens_to(*target),
        _ => false,
    }
}

/// Index of the bracket opening the one that closes `text`.
fn matching_open(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices().rev() {
        if c == close {
            depth += 1;
        } else if c == open {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Split at commas that are not nested inside brackets.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_nested_generic_arguments() {
        assert_eq!(
            split_top_level("int, Dictionary<string, int>, int[]"),
            vec!["int", "Dictionary<string, int>", "int[]"]
        );
    }

    #[test]
    fn finds_matching_bracket_from_the_end() {
        assert_eq!(matching_open("List<List<int>>", '<', '>'), Some(4));
        assert_eq!(matching_open("int[,]", '[', ']'), Some(3));
    }
}
