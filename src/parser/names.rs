//! Names, members, type names, declarations and lambdas.

use log::{debug, trace};

use super::precedence::LOWEST;
use super::{found, Parser, LAMBDA_CLOSERS};
use crate::catalog::MemberKind;
use crate::context::Frame;
use crate::error::{CompileError, Result};
use crate::expr::{unary, Expr, ExprKind, LabelTarget, Lambda, UnaryOp, Variable};
use crate::interpolation::{split_lexeme, Segment};
use crate::resolver::{Argument, LambdaBinder, PendingLambda};
use crate::token::{Token, TokenType};
use crate::types::Type;

/// Lambda parameters as written: optional declared type and name.
pub(super) type LambdaParams = Vec<(Option<Type>, String)>;

impl<'a> Parser<'a> {
    // ── names ────────────────────────────────────────────────────────────

    /// A name in operand position: local or parameter, named constant,
    /// member of the default receiver or static type, then a type name
    /// (declaration or static member access).
    pub(super) fn name(&mut self, token: Token<'a>) -> Result<Expr> {
        if let Some(variable) = self.context.lookup(token.lexeme) {
            return Ok(Expr::parameter(variable));
        }

        if let Some(constant) = self.resolver.named_constant(token.lexeme) {
            return Ok(Expr::constant(constant));
        }

        if let Some(receiver) = self.default_receiver.clone() {
            let ty = receiver.ty.clone();
            if self.has_member(&ty, token.lexeme, false) {
                return self.member(Some(receiver), &ty, token);
            }
        }

        if let Some(ty) = self.static_type.clone() {
            if self.has_member(&ty, token.lexeme, true) {
                return self.member(None, &ty, token);
            }
        }

        if let Some(ty) = self.type_after(token.clone())? {
            let next = self.tokenizer.peek_token()?;
            if next.token_type == TokenType::IDENTIFIER {
                return self.declaration(ty);
            }
            if self.accept(".")? {
                let member = self.word()?;
                return self.member(None, &ty, member);
            }
            return Err(CompileError::wrong_symbol(next.start, ".", found(&next)));
        }

        Err(CompileError::unknown_symbol(token.start, token.lexeme))
    }

    fn has_member(&self, ty: &Type, name: &str, is_static: bool) -> bool {
        if self.resolver.find_member(ty, name, is_static).is_some() {
            return true;
        }
        let methods = if is_static {
            self.resolver.static_methods(ty, name)
        } else {
            self.resolver.instance_methods(ty, name)
        };
        !methods.is_empty()
    }

    /// Member `name` of `ty`: a method call when `(` follows, otherwise a
    /// property, field or constant.  `target` is `None` for static access.
    pub(super) fn member(&mut self, target: Option<Expr>, ty: &Type, name: Token<'a>) -> Result<Expr> {
        let explicit = self.explicit_type_args()?;

        if self.accept("(")? {
            let args = self.arguments(")")?;
            return self.call_method(target, ty, &name, explicit, args);
        }

        if let (Some(array), Type::Array { rank: 1, .. }, "Length") = (&target, ty, name.lexeme) {
            return unary(UnaryOp::ArrayLength, array.clone(), name.start);
        }

        let is_static = target.is_none();
        let Some(found) = self.resolver.find_member(ty, name.lexeme, is_static) else {
            return Err(CompileError::MemberNotFound {
                offset: name.start,
                ty: ty.to_string(),
                member: name.lexeme.to_string(),
            });
        };

        trace!("Member {}.{} resolved on {}", ty, name.lexeme, found.owner);

        if let MemberKind::Constant(constant) = &found.member.kind {
            return Ok(Expr::constant(constant.clone()));
        }

        Ok(Expr::new(
            ExprKind::Member {
                target: target.map(Box::new),
                member: found.member,
                owner: found.owner,
            },
            found.ty,
        ))
    }

    /// `<T, ...>` directly in front of a method's `(`.
    fn explicit_type_args(&mut self) -> Result<Vec<Type>> {
        if !self.peek_is("<")? {
            return Ok(Vec::new());
        }

        self.tokenizer.push_position();
        match self.try_generic_args()? {
            Some(args) if self.peek_is("(")? => {
                self.tokenizer.discard_position();
                Ok(args)
            }
            _ => {
                self.tokenizer.pop_position();
                Ok(Vec::new())
            }
        }
    }

    fn call_method(
        &mut self,
        target: Option<Expr>,
        ty: &Type,
        name: &Token<'a>,
        explicit: Vec<Type>,
        mut args: Vec<Argument<'a>>,
    ) -> Result<Expr> {
        let resolver = self.resolver.clone();
        let not_found = || CompileError::MemberNotFound {
            offset: name.start,
            ty: ty.to_string(),
            member: name.lexeme.to_string(),
        };

        let Some(receiver) = target else {
            let candidates = resolver.static_methods(ty, name.lexeme);
            if candidates.is_empty() {
                return Err(not_found());
            }
            let s = resolver.select(name.lexeme, &candidates, &explicit, &args, self, name.start)?;
            return Ok(Expr::call(s.method, None, s.args, s.type_args, s.ret));
        };

        let candidates = resolver.instance_methods(ty, name.lexeme);
        let extensions = resolver.extension_methods(name.lexeme);

        if !candidates.is_empty() {
            match resolver.select(name.lexeme, &candidates, &explicit, &args, self, name.start) {
                Ok(s) => return Ok(Expr::call(s.method, Some(receiver), s.args, s.type_args, s.ret)),
                Err(e) if extensions.is_empty() => return Err(e),
                Err(e) => debug!("No instance overload of '{}' ({}); trying extensions", name.lexeme, e),
            }
        }

        if extensions.is_empty() {
            return Err(not_found());
        }

        args.insert(0, Argument::Typed(receiver));
        let s = resolver.select(name.lexeme, &extensions, &explicit, &args, self, name.start)?;
        Ok(Expr::call(s.method, None, s.args, s.type_args, s.ret))
    }

    // ── type names ───────────────────────────────────────────────────────

    /// A type name at the current position, unless the next word is a local
    /// or a named constant.  The position is untouched when there is none.
    pub(super) fn try_read_type(&mut self) -> Result<Option<Type>> {
        let next = self.tokenizer.peek_token()?;
        if !next.is_word()
            || self.context.lookup(next.lexeme).is_some()
            || self.resolver.named_constant(next.lexeme).is_some()
        {
            return Ok(None);
        }
        self.read_type_name()
    }

    pub(super) fn require_type(&mut self) -> Result<Type> {
        let next = self.tokenizer.peek_token()?;
        match self.read_type_name()? {
            Some(ty) => Ok(ty),
            None => Err(CompileError::TypeNotFound {
                offset: next.start,
                name: found(&next).to_string(),
            }),
        }
    }

    fn read_type_name(&mut self) -> Result<Option<Type>> {
        if !self.tokenizer.peek_token()?.is_word() {
            return Ok(None);
        }

        self.tokenizer.push_position();
        let first = self.tokenizer.read_token()?;
        match self.type_after(first)? {
            Some(ty) => {
                self.tokenizer.discard_position();
                Ok(Some(ty))
            }
            None => {
                self.tokenizer.pop_position();
                Ok(None)
            }
        }
    }

    /// The longest dotted name starting at `first` that denotes a type,
    /// with generic arguments and `?` / `[]` suffixes.  On failure the
    /// position is back where it was on entry.
    fn type_after(&mut self, first: Token<'a>) -> Result<Option<Type>> {
        let entry = self.tokenizer.current_position();
        let mut name = first.lexeme.to_string();
        let mut best = None;

        loop {
            if let Some(args) = self.try_generic_args()? {
                if let Some(ty) = self.resolver.instantiate(&name, args) {
                    best = Some((ty, self.tokenizer.current_position()));
                }
                break;
            }
            if let Some(ty) = self.resolver.instantiate(&name, Vec::new()) {
                best = Some((ty, self.tokenizer.current_position()));
            }

            self.tokenizer.push_position();
            if self.accept(".")? {
                let next = self.tokenizer.read_token()?;
                if next.token_type == TokenType::IDENTIFIER {
                    self.tokenizer.discard_position();
                    name.push('.');
                    name.push_str(next.lexeme);
                    continue;
                }
            }
            self.tokenizer.pop_position();
            break;
        }

        match best {
            Some((ty, position)) => {
                self.tokenizer.set_position(position);
                self.type_suffixes(ty).map(Some)
            }
            None => {
                self.tokenizer.set_position(entry);
                Ok(None)
            }
        }
    }

    /// `<T1, T2>`; restores the position and yields `None` when the
    /// brackets do not hold a type list.
    fn try_generic_args(&mut self) -> Result<Option<Vec<Type>>> {
        if !self.peek_is("<")? {
            return Ok(None);
        }

        self.tokenizer.push_position();
        self.tokenizer.read_token()?;

        let mut args = Vec::new();
        loop {
            let Some(ty) = self.try_read_type()? else {
                break;
            };
            args.push(ty);

            if self.accept(",")? {
                continue;
            }
            if self.tokenizer.read_symbol_prefix(">")? {
                self.tokenizer.discard_position();
                return Ok(Some(args));
            }
            break;
        }

        self.tokenizer.pop_position();
        Ok(None)
    }

    fn type_suffixes(&mut self, mut ty: Type) -> Result<Type> {
        loop {
            if self.nullable_suffix()? {
                ty = Type::nullable(ty);
                continue;
            }
            if let Some(rank) = self.array_suffix()? {
                ty = Type::Array {
                    element: Box::new(ty),
                    rank,
                };
                continue;
            }
            return Ok(ty);
        }
    }

    /// `[]` or `[,,]`; a bracket holding anything else is an index or bound.
    fn array_suffix(&mut self) -> Result<Option<usize>> {
        if !self.peek_is("[")? {
            return Ok(None);
        }

        self.tokenizer.push_position();
        self.tokenizer.read_token()?;

        let mut rank = 1;
        loop {
            let token = self.tokenizer.read_token()?;
            if token.is(",") {
                rank += 1;
                continue;
            }
            if token.is("]") {
                self.tokenizer.discard_position();
                return Ok(Some(rank));
            }
            self.tokenizer.pop_position();
            return Ok(None);
        }
    }

    /// `?` making the type nullable, told apart from the conditional
    /// operator by what follows it.
    fn nullable_suffix(&mut self) -> Result<bool> {
        if !self.peek_is("?")? {
            return Ok(false);
        }

        self.tokenizer.push_position();
        self.tokenizer.read_token()?;

        let next = self.tokenizer.peek_token()?;
        let closes = next.is_eof()
            || (next.token_type == TokenType::SYMBOL
                && (matches!(next.lexeme, ")" | "," | "]" | "[" | ";" | "}") || next.lexeme.starts_with('>')));

        let declares = next.token_type == TokenType::IDENTIFIER && {
            self.tokenizer.push_position();
            self.tokenizer.read_token()?;
            let after = self.tokenizer.peek_token()?;
            self.tokenizer.pop_position();
            after.is_eof() || ["=", ";", "in", ")", ","].iter().any(|s| after.is(s))
        };

        if closes || declares {
            self.tokenizer.discard_position();
            return Ok(true);
        }

        self.tokenizer.pop_position();
        Ok(false)
    }

    // ── declarations ─────────────────────────────────────────────────────

    /// `T a [= init], b [= init], ...` after the type.  Each initializer is
    /// read before its variable comes into scope.
    pub(super) fn declaration(&mut self, ty: Type) -> Result<Expr> {
        let mut assignments = Vec::new();

        loop {
            let name = self.identifier()?;

            let value = if self.accept("=")? {
                Some(self.initial_value(&ty, name.start)?)
            } else {
                None
            };

            let variable = self.context.declare(name.lexeme, ty.clone(), name.start)?;
            if let Some(value) = value {
                assignments.push(Expr::assign(Expr::parameter(&variable), value));
            }

            if !self.accept(",")? {
                break;
            }
        }

        Ok(match assignments.len() {
            0 => Expr::empty(),
            1 => assignments.remove(0),
            _ => Expr::block(Vec::new(), assignments),
        })
    }

    fn initial_value(&mut self, ty: &Type, offset: usize) -> Result<Expr> {
        if let Type::Function { params, ret } = ty {
            if let Some(lambda) = self.try_pending_lambda()? {
                if lambda.params.len() != params.len() {
                    return Err(CompileError::mismatch(
                        offset,
                        format!("Lambda has {} parameters but '{}' takes {}", lambda.params.len(), ty, params.len()),
                    ));
                }
                return match self.bind(&lambda, params, Some(&**ret))? {
                    Some(expr) => Ok(expr),
                    None => Err(CompileError::mismatch(offset, format!("Cannot convert lambda to '{}'", ty))),
                };
            }
        }

        let (value, _) = self.read_expression(LOWEST, &[])?;
        self.coerce_to(value, ty, offset)
    }

    // ── lambdas ──────────────────────────────────────────────────────────

    /// Parameter list after an already consumed `(`, through `=>`.  Yields
    /// `None` with the position restored when this is not a lambda head.
    pub(super) fn lambda_head(&mut self) -> Result<Option<LambdaParams>> {
        self.tokenizer.push_position();

        if let Some(params) = self.lambda_params()? {
            if self.accept("=>")? {
                self.tokenizer.discard_position();
                return Ok(Some(params));
            }
        }

        self.tokenizer.pop_position();
        Ok(None)
    }

    fn lambda_params(&mut self) -> Result<Option<LambdaParams>> {
        let mut params = Vec::new();
        if self.accept(")")? {
            return Ok(Some(params));
        }

        loop {
            let first = self.tokenizer.read_token()?;
            if !first.is_word() {
                return Ok(None);
            }

            let next = self.tokenizer.peek_token()?;
            if next.is(",") || next.is(")") {
                if first.token_type != TokenType::IDENTIFIER {
                    return Ok(None);
                }
                params.push((None, first.lexeme.to_string()));
            } else {
                let Some(ty) = self.type_after(first)? else {
                    return Ok(None);
                };
                let name = self.tokenizer.read_token()?;
                if name.token_type != TokenType::IDENTIFIER {
                    return Ok(None);
                }
                params.push((Some(ty), name.lexeme.to_string()));
            }

            if self.accept(",")? {
                continue;
            }
            if self.accept(")")? {
                return Ok(Some(params));
            }
            return Ok(None);
        }
    }

    /// `x =>` or `(params) =>` at the current position, consumed when found.
    fn lambda_prefix(&mut self) -> Result<Option<LambdaParams>> {
        let next = self.tokenizer.peek_token()?;

        if next.token_type == TokenType::IDENTIFIER {
            self.tokenizer.push_position();
            self.tokenizer.read_token()?;
            if self.accept("=>")? {
                self.tokenizer.discard_position();
                return Ok(Some(vec![(None, next.lexeme.to_string())]));
            }
            self.tokenizer.pop_position();
        }

        if next.is("(") {
            self.tokenizer.push_position();
            self.tokenizer.read_token()?;
            if let Some(params) = self.lambda_head()? {
                self.tokenizer.discard_position();
                return Ok(Some(params));
            }
            self.tokenizer.pop_position();
        }

        Ok(None)
    }

    /// A lambda argument whose parameter types are not known yet: its body
    /// is skipped now and parsed once per overload tried.
    pub(super) fn try_pending_lambda(&mut self) -> Result<Option<PendingLambda<'a>>> {
        let offset = self.tokenizer.peek_token()?.start;
        let Some(params) = self.lambda_prefix()? else {
            return Ok(None);
        };

        let pending = PendingLambda {
            params,
            source: self.tokenizer.source(),
            base: self.tokenizer.base(),
            body: self.tokenizer.current_position(),
            offset,
        };

        debug!("Deferred lambda at {} with {} parameters", offset, pending.params.len());

        self.skip_lambda_body()?;
        Ok(Some(pending))
    }

    /// Skip to the `,` `;` or closing bracket that ends the lambda body.
    fn skip_lambda_body(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            let next = self.tokenizer.peek_token()?;
            if next.is_eof() {
                return Ok(());
            }
            if next.token_type == TokenType::SYMBOL {
                match next.lexeme {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" | "," | ";" if depth == 0 => return Ok(()),
                    ")" | "]" | "}" => depth -= 1,
                    _ => {}
                }
            }
            self.tokenizer.read_token()?;
        }
    }

    /// Body of a lambda whose parameter types are now known.
    pub(super) fn lambda_body(
        &mut self,
        names: &[String],
        types: &[Type],
        ret: Option<Type>,
        offset: usize,
    ) -> Result<Expr> {
        if names.len() != types.len() {
            return Err(CompileError::mismatch(
                offset,
                format!("Lambda has {} parameters but {} were expected", names.len(), types.len()),
            ));
        }

        let params: Vec<Variable> = names
            .iter()
            .zip(types)
            .map(|(name, ty)| Variable::new(name, ty.clone()))
            .collect();

        let depth = self.context.depth();
        self.context.push_lambda(&params, LabelTarget::new("return"), ret.clone());

        let body = if self.peek_is("{")? {
            let brace = self.tokenizer.read_token()?;
            super::statements::block(self, brace)
        } else {
            self.read_expression(LOWEST, LAMBDA_CLOSERS).map(|(body, _)| body)
        };

        let body = match body {
            Ok(body) => body,
            Err(e) => {
                self.context.unwind(depth);
                return Err(e);
            }
        };

        let frame = self.context.pop();
        self.finish_lambda(params, body, frame, ret, offset).map(Expr::lambda)
    }

    /// Settle the return type and wrap the body with the return label and
    /// the frame's locals.
    fn finish_lambda(
        &self,
        params: Vec<Variable>,
        body: Expr,
        frame: Option<Frame>,
        declared: Option<Type>,
        offset: usize,
    ) -> Result<Lambda> {
        let (label, frame_ret, returns, locals) = match frame {
            Some(frame) => {
                let locals: Vec<Variable> = frame
                    .variables
                    .into_values()
                    .filter(|v| !params.iter().any(|p| p.id == v.id))
                    .collect();
                (frame.return_label, frame.return_type, frame.returns, locals)
            }
            None => (None, None, 0, Vec::new()),
        };

        let ret = frame_ret.or(declared).unwrap_or_else(|| body.ty.clone());

        let body = match label {
            Some(label) if returns > 0 => {
                let default = (ret != Type::Void).then(|| Expr::default_of(ret.clone()));
                Expr::block(Vec::new(), vec![body, Expr::label(&label, default)])
            }
            _ => self.coerce_to(body, &ret, offset)?,
        };

        let body = if locals.is_empty() {
            body
        } else {
            Expr::block(locals, vec![body])
        };

        Ok(Lambda { params, body, ret })
    }

    // ── top level ────────────────────────────────────────────────────────

    /// The whole input: an optional `params =>` head, then statements up to
    /// the end of input.
    pub(super) fn top_level(&mut self) -> Result<Lambda> {
        let params = match self.lambda_prefix()? {
            Some(head) => head
                .into_iter()
                .map(|(ty, name)| {
                    let ty = match ty {
                        Some(ty) => ty,
                        None => self.untyped_parameter(&name)?,
                    };
                    Ok(Variable::new(&name, ty))
                })
                .collect::<Result<Vec<_>>>()?,
            None => self
                .options
                .parameters
                .iter()
                .map(|spec| Ok(Variable::new(&spec.name, self.type_named(&spec.ty)?)))
                .collect::<Result<Vec<_>>>()?,
        };

        debug!("Top-level parameters: {:?}", params.iter().map(|p| &p.name).collect::<Vec<_>>());

        self.context.set_parameters(params.clone());

        if let Some(name) = self.options.default_receiver.clone() {
            let Some(receiver) = params.iter().find(|p| p.name == name) else {
                return Err(CompileError::invalid(0, format!("Default receiver '{}' is not a parameter", name)));
            };
            self.default_receiver = Some(Expr::parameter(receiver));
        }

        if let Some(name) = self.options.static_type.clone() {
            self.static_type = Some(self.type_named(&name)?);
        }

        let ret = match self.options.return_type.clone() {
            Some(name) => Some(self.type_named(&name)?),
            None => None,
        };

        let depth = self.context.depth();
        self.context.push_lambda(&params, LabelTarget::new("return"), ret.clone());

        let body = match self.statements_to_end() {
            Ok(body) => body,
            Err(e) => {
                self.context.unwind(depth);
                return Err(e);
            }
        };

        let frame = self.context.pop();
        self.finish_lambda(params, body, frame, ret, 0)
    }

    fn untyped_parameter(&self, name: &str) -> Result<Type> {
        match self.options.parameters.iter().find(|spec| spec.name == name) {
            Some(spec) => self.type_named(&spec.ty),
            None => self.type_named(&self.options.default_parameter_type),
        }
    }

    fn statements_to_end(&mut self) -> Result<Expr> {
        let mut body = Vec::new();
        while !self.tokenizer.at_end()? {
            body.push(self.statement()?);
        }

        match body.len() {
            0 => Err(CompileError::wrong_symbol(self.tokenizer.offset(), "expression", "end of input")),
            1 => Ok(body.remove(0)),
            _ => Ok(Expr::block(Vec::new(), body)),
        }
    }

    // ── interpolated strings ─────────────────────────────────────────────

    /// `$"..."` becomes `String.Concat` over its parts; holes with an
    /// alignment or format go through `String.Format` first.
    pub(super) fn interpolated(&mut self, token: Token<'a>) -> Result<Expr> {
        let segments = split_lexeme(token.lexeme, token.start)?;
        let mut parts: Vec<Argument<'a>> = Vec::new();

        for segment in segments {
            match segment {
                Segment::Literal(text) => {
                    if !text.is_empty() {
                        parts.push(Argument::Typed(Expr::string(&text)));
                    }
                }
                Segment::Expression {
                    text,
                    offset,
                    alignment,
                    format,
                } => {
                    let value = self.with_source(text, offset, |p| {
                        let expr = p.expression()?;
                        let next = p.tokenizer.peek_token()?;
                        if !next.is_eof() {
                            return Err(CompileError::unknown_symbol(next.start, next.lexeme));
                        }
                        Ok(expr)
                    })?;

                    let value = if alignment.is_some() || format.is_some() {
                        let spec = hole_format(alignment, format);
                        let args = vec![Argument::Typed(Expr::string(&spec)), Argument::Typed(value)];
                        self.static_call(&Type::String, "Format", args, offset)?
                    } else {
                        value
                    };
                    parts.push(Argument::Typed(value.coerce(&Type::Object)));
                }
            }
        }

        if let [Argument::Typed(only)] = parts.as_slice() {
            if only.ty == Type::String {
                return Ok(only.clone());
            }
        }
        if parts.is_empty() {
            return Ok(Expr::string(""));
        }
        self.static_call(&Type::String, "Concat", parts, token.start)
    }
}

fn hole_format(alignment: Option<i32>, format: Option<&str>) -> String {
    let mut spec = String::from("{0");
    if let Some(alignment) = alignment {
        spec.push(',');
        spec.push_str(itoa::Buffer::new().format(alignment));
    }
    if let Some(format) = format {
        spec.push(':');
        spec.push_str(format);
    }
    spec.push('}');
    spec
}

#[cfg(test)]
mod tests {
    use super::hole_format;

    #[test]
    fn hole_format_spells_alignment_and_format() {
        assert_eq!(hole_format(Some(-5), None), "{0,-5}");
        assert_eq!(hole_format(None, Some("F2")), "{0:F2}");
        assert_eq!(hole_format(Some(3), Some("X")), "{0,3:X}");
    }
}
