//! One-stop facade: parse text into a typed lambda, simplify it, compare it,
//! and hand it to the evaluator.

use std::sync::Arc;

use log::info;

use crate::catalog::{Registry, TypeCatalog};
use crate::equality;
use crate::error::Result;
use crate::expr::{Expr, Lambda};
use crate::interpreter::CompiledLambda;
use crate::options::ParserOptions;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::simplifier::Simplifier;
use crate::value::Value;

pub struct ExpressionCompiler {
    resolver: Arc<Resolver>,
    simplifier: Simplifier,
    options: ParserOptions,
}

impl Default for ExpressionCompiler {
    fn default() -> Self {
        ExpressionCompiler::new()
    }
}

impl ExpressionCompiler {
    /// Compiler over the built-in library with default options.
    pub fn new() -> Self {
        ExpressionCompiler::with_catalog(Arc::new(Registry::with_builtins()), ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        ExpressionCompiler::with_catalog(Arc::new(Registry::with_builtins()), options)
    }

    pub fn with_catalog(catalog: Arc<dyn TypeCatalog>, options: ParserOptions) -> Self {
        let resolver = Resolver::new(catalog.clone())
            .with_namespaces(options.namespaces.clone())
            .with_ignore_case(options.ignore_case);

        info!("Expression compiler ready");

        ExpressionCompiler {
            resolver: Arc::new(resolver),
            simplifier: Simplifier::new(catalog),
            options,
        }
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn simplifier(&self) -> &Simplifier {
        &self.simplifier
    }

    pub fn parse(&self, text: &str) -> Result<Lambda> {
        Parser::new(text, self.resolver.clone(), &self.options).parse()
    }

    pub fn simplify(&self, lambda: &Lambda) -> Result<Lambda> {
        self.simplifier.simplify_lambda(lambda)
    }

    /// Parse and simplify in one step.
    pub fn parse_simplified(&self, text: &str) -> Result<Lambda> {
        let lambda = self.parse(text)?;
        self.simplify(&lambda)
    }

    pub fn equals(&self, a: &Lambda, b: &Lambda) -> Result<bool> {
        equality::equals(&self.simplifier, &Expr::lambda(a.clone()), &Expr::lambda(b.clone()))
    }

    pub fn hash(&self, lambda: &Lambda) -> Result<u64> {
        equality::hash(&self.simplifier, &Expr::lambda(lambda.clone()))
    }

    pub fn compile(&self, lambda: Lambda) -> CompiledLambda {
        CompiledLambda::new(lambda, self.resolver.clone())
    }

    /// Parse, simplify, compile and invoke `text` with `args`.
    pub fn evaluate(&self, text: &str, args: &[Value]) -> Result<Value> {
        let lambda = self.parse_simplified(text)?;
        self.compile(lambda).invoke(args)
    }
}
