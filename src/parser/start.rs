//! Start builders: the operand a leading token introduces.

use log::debug;
use phf::phf_map;

use super::precedence::UNARY;
use super::Parser;
use crate::error::{CompileError, Result};
use crate::expr::{cast, unary, Expr, ExprKind, UnaryOp};
use crate::number::{Number, NumericKind};
use crate::resolver::Argument;
use crate::token::{Token, TokenType};
use crate::types::Type;

pub(super) type StartBuilder = for<'a> fn(&mut Parser<'a>, Token<'a>) -> Result<Expr>;

pub(super) struct StartEntry {
    /// Statement forms that end with a block and take no `;`.
    pub compound: bool,
    pub build: StartBuilder,
}

const fn simple(build: StartBuilder) -> StartEntry {
    StartEntry { compound: false, build }
}

const fn compound(build: StartBuilder) -> StartEntry {
    StartEntry { compound: true, build }
}

static START: phf::Map<&'static str, StartEntry> = phf_map! {
    "(" => simple(paren),
    "-" => simple(negate),
    "+" => simple(plus),
    "!" => simple(not),
    "~" => simple(complement),
    "++" => simple(pre_increment),
    "--" => simple(pre_decrement),
    "new" => simple(new_object),
    "default" => simple(default_value),
    "sizeof" => simple(size_of),
    "throw" => simple(super::statements::throw_statement),
    "return" => simple(super::statements::return_statement),
    "break" => simple(super::statements::break_statement),
    "continue" => simple(super::statements::continue_statement),
    "goto" => simple(super::statements::goto_statement),
    "var" => simple(super::statements::var_declaration),
    "{" => compound(super::statements::block),
    "if" => compound(super::statements::if_statement),
    "while" => compound(super::statements::while_loop),
    "do" => compound(super::statements::do_loop),
    "for" => compound(super::statements::for_loop),
    "foreach" => compound(super::statements::foreach_loop),
    "switch" => compound(super::statements::switch_statement),
    "try" => compound(super::statements::try_statement),
};

pub(super) fn entry(token: &Token<'_>) -> Option<&'static StartEntry> {
    if !matches!(token.token_type, TokenType::SYMBOL | TokenType::KEYWORD) {
        return None;
    }
    START.get(token.lexeme)
}

// ── parenthesis: lambda, cast or group ─────────────────────────────────────

fn paren<'a>(p: &mut Parser<'a>, token: Token<'a>) -> Result<Expr> {
    if let Some(params) = p.lambda_head()? {
        if params.iter().any(|(ty, _)| ty.is_none()) {
            return Err(CompileError::invalid(
                token.start,
                "Cannot infer the parameter types of a lambda without a target delegate type",
            ));
        }
        let names: Vec<String> = params.iter().map(|(_, n)| n.clone()).collect();
        let types: Vec<Type> = params.into_iter().filter_map(|(t, _)| t).collect();
        return p.lambda_body(&names, &types, None, token.start);
    }

    if let Some(expr) = try_cast(p, token.start)? {
        return Ok(expr);
    }

    p.enclosed(")")
}

/// `(T)operand` when the parenthesis holds a type and what follows can start
/// an operand; otherwise the position is left untouched.
fn try_cast<'a>(p: &mut Parser<'a>, offset: usize) -> Result<Option<Expr>> {
    p.tokenizer.push_position();

    if let Some(ty) = p.try_read_type()? {
        if p.accept(")")? && casts_operand(&p.tokenizer.peek_token()?) {
            p.tokenizer.discard_position();

            debug!("Cast to {} at {}", ty, offset);

            let (operand, _) = p.read_expression(UNARY, &[])?;
            return cast(operand, &ty, offset).map(Some);
        }
    }

    p.tokenizer.pop_position();
    Ok(None)
}

fn casts_operand(next: &Token<'_>) -> bool {
    match next.token_type {
        TokenType::NUMBER(_)
        | TokenType::STRING(_)
        | TokenType::CHAR(_)
        | TokenType::INTERPOLATED
        | TokenType::IDENTIFIER => true,
        TokenType::KEYWORD => !matches!(next.lexeme, "is" | "as" | "in"),
        TokenType::SYMBOL => matches!(next.lexeme, "(" | "!" | "~" | "-" | "+" | "++" | "--"),
        _ => false,
    }
}

// ── prefix operators ───────────────────────────────────────────────────────

fn prefix<'a>(p: &mut Parser<'a>, op: UnaryOp, token: &Token<'a>) -> Result<Expr> {
    let (operand, _) = p.read_expression(UNARY, &[])?;
    unary(op, operand, token.start)
}

fn negate<'a>(p: &mut Parser<'a>, token: Token<'a>) -> Result<Expr> {
    let (operand, _) = p.read_expression(UNARY, &[])?;
    if let Some(n) = operand.as_number() {
        return Ok(Expr::number(n.negate()));
    }
    unary(UnaryOp::Negate, operand, token.start)
}

fn plus<'a>(p: &mut Parser<'a>, token: Token<'a>) -> Result<Expr> {
    prefix(p, UnaryOp::UnaryPlus, &token)
}

fn not<'a>(p: &mut Parser<'a>, token: Token<'a>) -> Result<Expr> {
    prefix(p, UnaryOp::Not, &token)
}

fn complement<'a>(p: &mut Parser<'a>, token: Token<'a>) -> Result<Expr> {
    prefix(p, UnaryOp::OnesComplement, &token)
}

fn pre_increment<'a>(p: &mut Parser<'a>, token: Token<'a>) -> Result<Expr> {
    prefix(p, UnaryOp::PreIncrement, &token)
}

fn pre_decrement<'a>(p: &mut Parser<'a>, token: Token<'a>) -> Result<Expr> {
    prefix(p, UnaryOp::PreDecrement, &token)
}

// ── new ────────────────────────────────────────────────────────────────────

fn new_object<'a>(p: &mut Parser<'a>, token: Token<'a>) -> Result<Expr> {
    let offset = token.start;

    // new[] { ... }: element type from the items
    if p.accept("[")? {
        p.expect("]")?;
        p.expect("{")?;
        let items = p.typed_arguments("}")?;
        let element = p.common_type(&items, offset)?;
        return p.array_init(element, items, offset);
    }

    let ty = p.require_type()?;

    if p.accept("[")? {
        let bounds = p.typed_arguments("]")?;
        if bounds.is_empty() {
            return Err(CompileError::wrong_symbol(offset, "array size", "]"));
        }
        let bounds = bounds
            .into_iter()
            .map(|b| index_value(b, offset))
            .collect::<Result<Vec<_>>>()?;
        let rank = bounds.len();
        let element = ty.clone();
        return Ok(Expr::new(
            ExprKind::NewArrayBounds { element, bounds },
            Type::Array {
                element: Box::new(ty),
                rank,
            },
        ));
    }

    if let Type::Array { element, rank } = &ty {
        if !p.accept("{")? {
            return Err(CompileError::wrong_symbol(offset, "{", "end of array type"));
        }
        if *rank != 1 {
            return Err(CompileError::invalid(offset, "Only single-dimension array initializers are supported"));
        }
        let items = p.typed_arguments("}")?;
        return p.array_init((**element).clone(), items, offset);
    }

    let args = if p.accept("(")? {
        p.arguments(")")?
    } else {
        Vec::new()
    };

    let resolver = p.resolver.clone();
    let candidates = resolver.constructors(&ty);
    if candidates.is_empty() {
        return Err(CompileError::mismatch(offset, format!("Type '{}' has no constructors", ty)));
    }

    let selection = resolver.select(&ty.to_string(), &candidates, &[], &args, p, offset)?;
    let new = Expr::new(
        ExprKind::New {
            ctor: selection.method,
            args: selection.args,
        },
        ty,
    );

    if p.peek_is("{")? {
        return p.initializer(new);
    }
    Ok(new)
}

/// Array index or bound, converted to `int`.
pub(super) fn index_value(index: Expr, offset: usize) -> Result<Expr> {
    match index.ty.underlying() {
        Type::Numeric(kind) if kind.is_integral() => Ok(index.convert(&Type::INT)),
        Type::Char => Ok(index.convert(&Type::INT)),
        _ => Err(CompileError::mismatch(
            offset,
            format!("Cannot implicitly convert type '{}' to 'int'", index.ty),
        )),
    }
}

// ── default / sizeof ───────────────────────────────────────────────────────

fn default_value<'a>(p: &mut Parser<'a>, _token: Token<'a>) -> Result<Expr> {
    p.expect("(")?;
    let ty = p.require_type()?;
    p.expect(")")?;
    Ok(Expr::default_of(ty))
}

fn size_of<'a>(p: &mut Parser<'a>, token: Token<'a>) -> Result<Expr> {
    p.expect("(")?;
    let ty = p.require_type()?;
    p.expect(")")?;

    let size = match &ty {
        Type::Bool => 1,
        Type::Char => 2,
        Type::Numeric(kind) => match kind {
            NumericKind::Byte => 1,
            NumericKind::Short | NumericKind::UShort => 2,
            NumericKind::Int | NumericKind::UInt | NumericKind::Float => 4,
            NumericKind::Long | NumericKind::ULong | NumericKind::Double => 8,
            NumericKind::Decimal => 16,
        },
        other => {
            return Err(CompileError::mismatch(
                token.start,
                format!("'{}' does not have a predefined size", other),
            ))
        }
    };

    Ok(Expr::number(Number::Int(size)))
}

impl<'a> Parser<'a> {
    /// `{ Name = value, ... }` or `{ item, ... }` after a constructor call.
    fn initializer(&mut self, new: Expr) -> Result<Expr> {
        self.expect("{")?;
        let ty = new.ty.clone();

        self.tokenizer.push_position();
        let first = self.tokenizer.read_token()?;
        let second = self.tokenizer.read_token()?;
        self.tokenizer.pop_position();

        if first.token_type == TokenType::IDENTIFIER && second.is("=") {
            return self.member_initializer(new);
        }

        let resolver = self.resolver.clone();
        let adds = resolver.instance_methods(&ty, "Add");
        if adds.is_empty() {
            return Err(CompileError::MemberNotFound {
                offset: first.start,
                ty: ty.to_string(),
                member: "Add".to_string(),
            });
        }

        let mut add = None;
        let mut items = Vec::new();
        for item in self.typed_arguments("}")? {
            let selection = resolver.select("Add", &adds, &[], &[Argument::Typed(item)], self, first.start)?;
            items.extend(selection.args);
            add.get_or_insert(selection.method);
        }

        match add {
            Some(add) => Ok(Expr::new(
                ExprKind::ListInit {
                    new: Box::new(new),
                    add,
                    items,
                },
                ty,
            )),
            None => Ok(new),
        }
    }

    fn member_initializer(&mut self, new: Expr) -> Result<Expr> {
        let ty = new.ty.clone();
        let mut bindings = Vec::new();

        loop {
            if self.accept("}")? {
                break;
            }
            let name = self.identifier()?;
            self.expect("=")?;
            let (value, _) = self.read_expression(super::precedence::LOWEST, &[",", "}"])?;

            let found = self
                .resolver
                .find_member(&ty, name.lexeme, false)
                .filter(|m| m.member.is_writable());
            let Some(member) = found else {
                return Err(CompileError::MemberNotFound {
                    offset: name.start,
                    ty: ty.to_string(),
                    member: name.lexeme.to_string(),
                });
            };

            let value = self.coerce_to(value, &member.ty, name.start)?;
            bindings.push((member.member, value));

            if !self.accept(",")? {
                self.expect("}")?;
                break;
            }
        }

        Ok(Expr::new(
            ExprKind::MemberInit {
                new: Box::new(new),
                bindings,
            },
            ty,
        ))
    }

    /// Best common type of array initializer items.
    fn common_type(&self, items: &[Expr], offset: usize) -> Result<Type> {
        let mut best: Option<Type> = None;
        for item in items {
            best = Some(match best {
                None => item.ty.clone(),
                Some(current) if self.resolver.distance(&item.ty, &current).is_some() => current,
                Some(current) if self.resolver.distance(&current, &item.ty).is_some() => item.ty.clone(),
                Some(current) => {
                    return Err(CompileError::mismatch(
                        offset,
                        format!("No best type for array elements '{}' and '{}'", current, item.ty),
                    ))
                }
            });
        }
        best.ok_or_else(|| CompileError::invalid(offset, "No best type found for implicitly-typed array"))
    }

    fn array_init(&self, element: Type, items: Vec<Expr>, offset: usize) -> Result<Expr> {
        let items = items
            .into_iter()
            .map(|item| self.coerce_to(item, &element, offset))
            .collect::<Result<Vec<_>>>()?;
        Ok(Expr::new(
            ExprKind::NewArrayInit {
                element: element.clone(),
                items,
            },
            Type::array(element),
        ))
    }
}
