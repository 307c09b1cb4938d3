//! Statement forms.  Each is an expression node; the ones without a value
//! have type `void`.  Loops lower to [`ExprKind::Loop`] with explicit break
//! and continue labels.

use log::debug;

use super::precedence::LOWEST;
use super::{found, start, Parser};
use crate::context::ParserContext;
use crate::error::{CompileError, Result};
use crate::expr::{binary, BinaryOp, CatchBlock, Expr, ExprKind, GotoKind, LabelTarget, SwitchCase, Variable};
use crate::number::Number;
use crate::resolver::Argument;
use crate::token::{Token, TokenType};
use crate::types::Type;

fn scoped(body: Expr, variables: Vec<Variable>) -> Expr {
    if variables.is_empty() {
        body
    } else {
        Expr::block(variables, vec![body])
    }
}

fn loop_node(body: Expr, break_label: LabelTarget, continue_label: Option<LabelTarget>) -> Expr {
    Expr::new(
        ExprKind::Loop {
            body: Box::new(body),
            break_label,
            continue_label,
        },
        Type::Void,
    )
}

/// `if (!test) break;`
fn exit_unless(test: Expr, break_label: &LabelTarget) -> Expr {
    Expr::conditional_node(
        test,
        Expr::empty(),
        Expr::goto(GotoKind::Break, break_label, None),
        Type::Void,
    )
}

impl<'a> Parser<'a> {
    /// One statement, with its terminating `;` when it needs one.
    pub(super) fn statement(&mut self) -> Result<Expr> {
        let next = self.tokenizer.peek_token()?;

        if next.is(";") {
            self.tokenizer.read_token()?;
            return Ok(Expr::empty());
        }

        if next.token_type == TokenType::IDENTIFIER {
            self.tokenizer.push_position();
            self.tokenizer.read_token()?;
            if self.accept(":")? {
                self.tokenizer.discard_position();
                let label = self.context.label(next.lexeme);
                return Ok(Expr::label(&label, None));
            }
            self.tokenizer.pop_position();
        }

        if let Some(entry) = start::entry(&next).filter(|e| e.compound) {
            let token = self.tokenizer.read_token()?;
            return (entry.build)(self, token);
        }

        let expr = self.expression()?;
        if self.accept(";")? || self.at_statement_end()? {
            return Ok(expr);
        }

        let next = self.tokenizer.peek_token()?;
        Err(CompileError::wrong_symbol(next.start, ";", found(&next)))
    }

    /// Statements through the `}` matching an already consumed `{`.
    pub(super) fn block_after_brace(&mut self) -> Result<Expr> {
        let (body, variables) = self.in_block(|p| {
            let mut body = Vec::new();
            loop {
                if p.accept("}")? {
                    return Ok(body);
                }
                if p.tokenizer.at_end()? {
                    return Err(p.missing("}"));
                }
                body.push(p.statement()?);
            }
        })?;
        Ok(Expr::block(variables, body))
    }

    /// A statement in a scope of its own (branches, loop bodies).
    fn scoped_statement(&mut self) -> Result<Expr> {
        let (body, variables) = self.in_block(|p| p.statement())?;
        Ok(scoped(body, variables))
    }

    fn loop_statement(&mut self, break_label: &LabelTarget, continue_label: &LabelTarget) -> Result<Expr> {
        let (body, variables) = self.within(
            |c| c.push_loop(break_label.clone(), continue_label.clone()),
            |p| p.statement(),
        )?;
        Ok(scoped(body, variables))
    }

    /// Statements of one `case` section, up to the next label or `}`.
    fn case_body(&mut self) -> Result<Expr> {
        let mut body = Vec::new();
        loop {
            let next = self.tokenizer.peek_token()?;
            if next.is("case") || next.is("default") || next.is("}") || next.is_eof() {
                return Ok(Expr::block(Vec::new(), body));
            }
            body.push(self.statement()?);
        }
    }
}

// ── blocks and branches ────────────────────────────────────────────────────

pub(super) fn block<'a>(p: &mut Parser<'a>, _token: Token<'a>) -> Result<Expr> {
    p.block_after_brace()
}

pub(super) fn if_statement<'a>(p: &mut Parser<'a>, _token: Token<'a>) -> Result<Expr> {
    let test = p.condition()?;
    let then = p.scoped_statement()?;
    let otherwise = if p.accept("else")? {
        p.scoped_statement()?
    } else {
        Expr::empty()
    };
    Ok(Expr::conditional_node(test, then, otherwise, Type::Void))
}

// ── loops ──────────────────────────────────────────────────────────────────

pub(super) fn while_loop<'a>(p: &mut Parser<'a>, _token: Token<'a>) -> Result<Expr> {
    let break_label = LabelTarget::new("break");
    let continue_label = LabelTarget::new("continue");

    let test = p.condition()?;
    let body = p.loop_statement(&break_label, &continue_label)?;

    let body = Expr::block(Vec::new(), vec![exit_unless(test, &break_label), body]);
    Ok(loop_node(body, break_label, Some(continue_label)))
}

pub(super) fn do_loop<'a>(p: &mut Parser<'a>, _token: Token<'a>) -> Result<Expr> {
    let break_label = LabelTarget::new("break");
    let continue_label = LabelTarget::new("continue");

    let body = p.loop_statement(&break_label, &continue_label)?;
    p.expect("while")?;
    let test = p.condition()?;
    p.accept(";")?;

    let body = Expr::block(
        Vec::new(),
        vec![body, Expr::label(&continue_label, None), exit_unless(test, &break_label)],
    );
    Ok(loop_node(body, break_label, None))
}

pub(super) fn for_loop<'a>(p: &mut Parser<'a>, token: Token<'a>) -> Result<Expr> {
    let break_label = LabelTarget::new("break");
    let continue_label = LabelTarget::new("continue");
    p.expect("(")?;

    let ((init, test, steps, body), variables) = p.in_block(|p| {
        let mut init = Vec::new();
        if !p.accept(";")? {
            init.push(p.expression()?);
            while p.accept(",")? {
                init.push(p.expression()?);
            }
            p.expect(";")?;
        }

        let test = if p.peek_is(";")? {
            None
        } else {
            let test = p.expression()?;
            if test.ty != Type::Bool {
                return Err(CompileError::mismatch(
                    token.start,
                    format!("Cannot implicitly convert type '{}' to 'bool'", test.ty),
                ));
            }
            Some(test)
        };
        p.expect(";")?;

        let mut steps = Vec::new();
        if !p.accept(")")? {
            loop {
                steps.push(p.read_expression(LOWEST, &[",", ")"])?.0);
                if p.accept(",")? {
                    continue;
                }
                p.expect(")")?;
                break;
            }
        }

        let body = p.loop_statement(&break_label, &continue_label)?;
        Ok((init, test, steps, body))
    })?;

    let mut iteration = Vec::new();
    if let Some(test) = test {
        iteration.push(exit_unless(test, &break_label));
    }
    iteration.push(body);
    iteration.push(Expr::label(&continue_label, None));
    iteration.extend(steps);

    let mut outer = init;
    outer.push(loop_node(Expr::block(Vec::new(), iteration), break_label, None));
    Ok(Expr::block(variables, outer))
}

pub(super) fn foreach_loop<'a>(p: &mut Parser<'a>, token: Token<'a>) -> Result<Expr> {
    let offset = token.start;
    let break_label = LabelTarget::new("break");
    let continue_label = LabelTarget::new("continue");

    p.expect("(")?;
    let declared = if p.accept("var")? {
        None
    } else {
        Some(p.require_type()?)
    };
    let name = p.identifier()?;
    p.expect("in")?;
    let source = p.enclosed(")")?;

    if let Type::Array { element, rank: 1 } = &source.ty {
        let element = (**element).clone();
        let item_ty = declared.unwrap_or_else(|| element.clone());
        let array = Variable::new("array", source.ty.clone());
        let index = Variable::new("index", Type::INT);

        debug!("foreach over {} by index", source.ty);

        let ((item, body), mut variables) = p.within(
            |c| c.push_loop(break_label.clone(), continue_label.clone()),
            |p| {
                let item = p.context.declare(name.lexeme, item_ty.clone(), name.start)?;
                let body = p.statement()?;
                Ok((item, body))
            },
        )?;
        variables.retain(|v| v.id != item.id);
        variables.insert(0, item.clone());

        let length = crate::expr::unary(crate::expr::UnaryOp::ArrayLength, Expr::parameter(&array), offset)?;
        let test = binary(BinaryOp::LessThan, Expr::parameter(&index), length, offset)?;
        let element_at = Expr::new(
            ExprKind::ArrayIndex {
                array: Box::new(Expr::parameter(&array)),
                indices: vec![Expr::parameter(&index)],
            },
            element,
        );
        let step = Expr::assign(
            Expr::parameter(&index),
            binary(BinaryOp::Add, Expr::parameter(&index), Expr::number(Number::Int(1)), offset)?,
        );

        let iteration = Expr::block(
            variables,
            vec![
                exit_unless(test, &break_label),
                Expr::assign(Expr::parameter(&item), element_at.convert(&item_ty)),
                body,
                Expr::label(&continue_label, None),
                step,
            ],
        );

        return Ok(Expr::block(
            vec![array.clone(), index.clone()],
            vec![
                Expr::assign(Expr::parameter(&array), source),
                Expr::assign(Expr::parameter(&index), Expr::number(Number::Int(0))),
                loop_node(iteration, break_label, None),
            ],
        ));
    }

    let resolver = p.resolver.clone();
    let shape_error = |ty: &Type| CompileError::UnknownEnumerableShape {
        offset,
        ty: ty.to_string(),
    };

    let getters = resolver.instance_methods(&source.ty, "GetEnumerator");
    if getters.is_empty() {
        return Err(shape_error(&source.ty));
    }
    let no_args: [Argument<'a>; 0] = [];
    let get = resolver.select("GetEnumerator", &getters, &[], &no_args, p, offset)?;
    let enumerator_ty = get.ret.clone();

    let movers = resolver.instance_methods(&enumerator_ty, "MoveNext");
    let Some(current) = resolver.find_member(&enumerator_ty, "Current", false) else {
        return Err(shape_error(&source.ty));
    };
    if movers.is_empty() {
        return Err(shape_error(&source.ty));
    }
    let move_next = resolver.select("MoveNext", &movers, &[], &no_args, p, offset)?;

    debug!("foreach over {} through {}", source.ty, enumerator_ty);

    let enumerator = Variable::new("enumerator", enumerator_ty);
    let item_ty = declared.unwrap_or_else(|| current.ty.clone());

    let ((item, body), mut variables) = p.within(
        |c| c.push_loop(break_label.clone(), continue_label.clone()),
        |p| {
            let item = p.context.declare(name.lexeme, item_ty.clone(), name.start)?;
            let body = p.statement()?;
            Ok((item, body))
        },
    )?;
    variables.retain(|v| v.id != item.id);
    variables.insert(0, item.clone());

    let test = Expr::call(
        move_next.method,
        Some(Expr::parameter(&enumerator)),
        move_next.args,
        move_next.type_args,
        move_next.ret,
    );
    let current_ty = current.ty.clone();
    let current = Expr::new(
        ExprKind::Member {
            target: Some(Box::new(Expr::parameter(&enumerator))),
            member: current.member,
            owner: current.owner,
        },
        current_ty,
    );

    let iteration = Expr::block(
        variables,
        vec![
            exit_unless(test, &break_label),
            Expr::assign(Expr::parameter(&item), current.convert(&item_ty)),
            body,
            Expr::label(&continue_label, None),
        ],
    );

    let start = Expr::call(get.method, Some(source), get.args, get.type_args, get.ret);
    Ok(Expr::block(
        vec![enumerator.clone()],
        vec![
            Expr::assign(Expr::parameter(&enumerator), start),
            loop_node(iteration, break_label, None),
        ],
    ))
}

// ── switch and try ─────────────────────────────────────────────────────────

pub(super) fn switch_statement<'a>(p: &mut Parser<'a>, _token: Token<'a>) -> Result<Expr> {
    let break_label = LabelTarget::new("break");

    p.expect("(")?;
    let value = p.enclosed(")")?;
    p.expect("{")?;
    let value_ty = value.ty.clone();

    let ((cases, default), variables) = p.within(
        |c: &mut ParserContext| c.push_switch(break_label.clone()),
        |p| {
            let mut cases = Vec::new();
            let mut default = None;

            loop {
                if p.accept("}")? {
                    return Ok((cases, default));
                }

                let label = p.tokenizer.read_token()?;
                if label.is("case") {
                    let mut tests = Vec::new();
                    loop {
                        let (test, _) = p.read_expression(LOWEST, &[":"])?;
                        tests.push(p.coerce_to(test, &value_ty, label.start)?);
                        p.expect(":")?;
                        if !p.accept("case")? {
                            break;
                        }
                    }
                    let body = p.case_body()?;
                    cases.push(SwitchCase { tests, body });
                } else if label.is("default") {
                    p.expect(":")?;
                    default = Some(Box::new(p.case_body()?));
                } else if label.is_eof() {
                    return Err(p.missing("}"));
                } else {
                    return Err(CompileError::wrong_symbol(label.start, "case", found(&label)));
                }
            }
        },
    )?;

    let switch = Expr::new(
        ExprKind::Switch {
            value: Box::new(value),
            cases,
            default,
        },
        Type::Void,
    );
    Ok(Expr::block(variables, vec![switch, Expr::label(&break_label, None)]))
}

pub(super) fn try_statement<'a>(p: &mut Parser<'a>, token: Token<'a>) -> Result<Expr> {
    p.expect("{")?;
    let body = p.block_after_brace()?;

    let mut handlers = Vec::new();
    while p.accept("catch")? {
        if p.accept("(")? {
            let catch_offset = p.tokenizer.offset();
            let ty = p.require_type()?;
            if !p.resolver.derives_from(&ty, "Exception") {
                return Err(CompileError::mismatch(
                    catch_offset,
                    format!("The type caught must derive from Exception ('{}' does not)", ty),
                ));
            }
            let name = if p.tokenizer.peek_token()?.token_type == TokenType::IDENTIFIER {
                Some(p.identifier()?)
            } else {
                None
            };
            p.expect(")")?;
            p.expect("{")?;

            let ((variable, body), _) = p.in_block(|p| {
                let variable = match &name {
                    Some(name) => Some(p.context.declare(name.lexeme, ty.clone(), name.start)?),
                    None => None,
                };
                Ok((variable, p.block_after_brace()?))
            })?;
            handlers.push(CatchBlock { ty, variable, body });
        } else {
            p.expect("{")?;
            let body = p.block_after_brace()?;
            let ty = p.type_named("Exception")?;
            handlers.push(CatchBlock {
                ty,
                variable: None,
                body,
            });
        }
    }

    let finally = if p.accept("finally")? {
        p.expect("{")?;
        Some(Box::new(p.block_after_brace()?))
    } else {
        None
    };

    if handlers.is_empty() && finally.is_none() {
        return Err(CompileError::invalid(token.start, "Expected catch or finally"));
    }

    Ok(Expr::new(
        ExprKind::Try {
            body: Box::new(body),
            handlers,
            finally,
        },
        Type::Void,
    ))
}

// ── jumps ──────────────────────────────────────────────────────────────────

pub(super) fn throw_statement<'a>(p: &mut Parser<'a>, token: Token<'a>) -> Result<Expr> {
    if p.at_statement_end()? {
        return Ok(Expr::new(ExprKind::Throw(None), Type::Void));
    }

    let value = p.expression()?;
    if !p.resolver.derives_from(&value.ty, "Exception") {
        return Err(CompileError::mismatch(
            token.start,
            format!("The type thrown must derive from Exception ('{}' does not)", value.ty),
        ));
    }
    Ok(Expr::new(ExprKind::Throw(Some(Box::new(value))), Type::Void))
}

pub(super) fn return_statement<'a>(p: &mut Parser<'a>, token: Token<'a>) -> Result<Expr> {
    let value = if p.at_statement_end()? {
        None
    } else {
        Some(p.expression()?)
    };

    let (label, declared) = match p.context.lambda_frame() {
        Some(frame) => (frame.return_label.clone(), frame.return_type.clone()),
        None => (None, None),
    };
    let Some(label) = label else {
        return Err(CompileError::invalid(token.start, "return outside of a lambda body"));
    };

    let value = match (value, &declared) {
        (Some(value), Some(ty)) => Some(p.coerce_to(value, ty, token.start)?),
        (value, _) => value,
    };
    if value.is_none() && declared.as_ref().is_some_and(|ty| *ty != Type::Void) {
        return Err(CompileError::invalid(token.start, "A return value is required here"));
    }

    let returned = value.as_ref().map_or(Type::Void, |v| v.ty.clone());
    if let Some(frame) = p.context.lambda_frame() {
        frame.return_type.get_or_insert(returned);
        frame.returns += 1;
    }

    Ok(Expr::goto(GotoKind::Return, &label, value))
}

pub(super) fn break_statement<'a>(p: &mut Parser<'a>, token: Token<'a>) -> Result<Expr> {
    match p.context.break_target() {
        Some(target) => Ok(Expr::goto(GotoKind::Break, target, None)),
        None => Err(CompileError::invalid(
            token.start,
            "No enclosing loop or switch out of which to break",
        )),
    }
}

pub(super) fn continue_statement<'a>(p: &mut Parser<'a>, token: Token<'a>) -> Result<Expr> {
    match p.context.continue_target() {
        Some(target) => Ok(Expr::goto(GotoKind::Continue, target, None)),
        None => Err(CompileError::invalid(token.start, "No enclosing loop out of which to continue")),
    }
}

pub(super) fn goto_statement<'a>(p: &mut Parser<'a>, _token: Token<'a>) -> Result<Expr> {
    let name = p.identifier()?;
    let label = p.context.label(name.lexeme);
    Ok(Expr::goto(GotoKind::Goto, &label, None))
}

/// `var name = init`; the variable takes the initializer's type.
pub(super) fn var_declaration<'a>(p: &mut Parser<'a>, _token: Token<'a>) -> Result<Expr> {
    let name = p.identifier()?;
    p.expect("=")?;
    let (value, _) = p.read_expression(LOWEST, &[])?;

    if matches!(value.ty, Type::Null | Type::Void) {
        return Err(CompileError::invalid(
            name.start,
            format!("Cannot assign '{}' to an implicitly-typed variable", value.ty),
        ));
    }

    let variable = p.context.declare(name.lexeme, value.ty.clone(), name.start)?;
    Ok(Expr::assign(Expr::parameter(&variable), value))
}
