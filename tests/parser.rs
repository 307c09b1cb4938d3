#[cfg(test)]
mod parser_tests {
    use expr_compiler as ec;

    use ec::compiler::ExpressionCompiler;
    use ec::error::CompileError;
    use ec::expr::{BinaryOp, Expr, ExprKind, Lambda};
    use ec::options::ParserOptions;
    use ec::printer::to_source;
    use ec::types::Type;
    use ec::value::Value;

    fn parse(text: &str) -> Lambda {
        ExpressionCompiler::new().parse(text).unwrap()
    }

    fn parse_err(text: &str) -> CompileError {
        match ExpressionCompiler::new().parse(text) {
            Ok(lambda) => panic!("expected an error, parsed {}", to_source(&Expr::lambda(lambda))),
            Err(e) => e,
        }
    }

    fn binary_op(expr: &Expr) -> Option<BinaryOp> {
        match &expr.kind {
            ExprKind::Binary { op, .. } => Some(*op),
            _ => None,
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let lambda = parse("2 + 3 * 4");
        assert!(lambda.params.is_empty());
        assert_eq!(lambda.ret, Type::INT);

        let ExprKind::Binary { op, left, right } = &lambda.body.kind else {
            panic!("expected a binary node");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(left.is_number(2.0));
        assert_eq!(binary_op(right), Some(BinaryOp::Multiply));
    }

    #[test]
    fn subtraction_is_left_associative() {
        let lambda = parse("10 - 4 - 3");
        let ExprKind::Binary { left, right, .. } = &lambda.body.kind else {
            panic!("expected a binary node");
        };
        assert_eq!(binary_op(left), Some(BinaryOp::Subtract));
        assert!(right.is_number(3.0));
    }

    #[test]
    fn power_is_right_associative_and_typed_double() {
        let lambda = parse("2 ** 3 ** 2");
        assert_eq!(lambda.ret, Type::DOUBLE);
        let ExprKind::Binary { op, left, right } = &lambda.body.kind else {
            panic!("expected a binary node");
        };
        assert_eq!(*op, BinaryOp::Power);
        assert_eq!(binary_op(right), Some(BinaryOp::Power));
        assert_eq!(binary_op(left), None);
    }

    #[test]
    fn power_binds_tighter_than_unary_minus() {
        let compiler = ExpressionCompiler::new();
        let value = compiler.evaluate("-2 ** 2", &[]).unwrap();
        assert_eq!(value.as_f64().unwrap(), -4.0);
    }

    #[test]
    fn printed_source_parses_back_to_an_equal_tree() {
        let compiler = ExpressionCompiler::new();
        let sources = [
            "(int a, int b) => (a + b) * (a - b) / 2",
            "(int a, int b) => a - (b - a) * 3",
            "(int a, int b) => a / b / (a + 1)",
            "(int a) => ((a))",
        ];

        for text in sources {
            let first = compiler.parse(text).unwrap();
            let printed = to_source(&Expr::lambda(first.clone()));
            let second = compiler.parse(&printed).unwrap();
            assert!(compiler.equals(&first, &second).unwrap(), "{} reprinted as {}", text, printed);
        }
    }

    #[test]
    fn single_untyped_parameter_uses_the_default_type() {
        let lambda = parse("x => x * 2");
        assert_eq!(lambda.params.len(), 1);
        assert_eq!(lambda.params[0].ty, Type::DOUBLE);
        assert_eq!(lambda.ret, Type::DOUBLE);
    }

    #[test]
    fn parameters_come_from_the_options() {
        let options = ParserOptions::default().with_parameter("n", "int").with_parameter("s", "string");
        let compiler = ExpressionCompiler::with_options(options);
        let lambda = compiler.parse("s.Length + n").unwrap();

        assert_eq!(lambda.params.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), ["n", "s"]);
        assert_eq!(lambda.ret, Type::INT);

        let value = compiler.compile(lambda).invoke(&[Value::from(2), Value::from("abc")]).unwrap();
        assert_eq!(value, Value::from(5));
    }

    #[test]
    fn static_type_members_are_in_scope() {
        let options = ParserOptions::default().with_static_type("Math");
        let compiler = ExpressionCompiler::with_options(options);
        let value = compiler.evaluate("Sqrt(16.0) + Abs(-2)", &[]).unwrap();
        assert_eq!(value.as_f64().unwrap(), 6.0);
    }

    #[test]
    fn return_type_option_converts_the_body() {
        let options = ParserOptions::default().with_return_type("double");
        let compiler = ExpressionCompiler::with_options(options);
        let lambda = compiler.parse("1 + 2").unwrap();
        assert_eq!(lambda.ret, Type::DOUBLE);
        assert_eq!(lambda.body.ty, Type::DOUBLE);
    }

    #[test]
    fn inner_block_may_shadow_an_outer_variable() {
        let compiler = ExpressionCompiler::new();
        let lambda = compiler.parse("{ int x = 1; { int x = 2; return x; } }").unwrap();
        assert_eq!(lambda.ret, Type::INT);

        let value = compiler.compile(lambda).invoke(&[]).unwrap();
        assert_eq!(value, Value::from(2));
    }

    #[test]
    fn redeclaration_in_one_block_is_rejected() {
        assert!(matches!(
            parse_err("{ int x = 1; int x = 2; return x; }"),
            CompileError::DuplicateVariableDeclaration { ref name, .. } if name == "x"
        ));
    }

    #[test]
    fn missing_parenthesis_is_reported() {
        let error = parse_err("(1 + 2");
        assert!(
            matches!(
                error,
                CompileError::MissingClosingMarker { .. } | CompileError::WrongSymbol { .. }
            ),
            "unexpected {:?}",
            error
        );
    }

    #[test]
    fn unknown_names_are_reported() {
        assert!(matches!(parse_err("new Nowhere()"), CompileError::TypeNotFound { .. }));
        assert!(matches!(parse_err("Math.Nope(1)"), CompileError::MemberNotFound { .. }));
        assert!(matches!(
            parse_err("Math.Sqrt(\"a\")"),
            CompileError::NoApplicableOverload { .. }
        ));
    }

    #[test]
    fn errors_carry_the_source_offset() {
        let error = parse_err("1 + Math.Nope(2)");
        assert_eq!(error.offset(), Some(9));
    }

    #[test]
    fn unknown_option_type_is_reported_past_the_head() {
        let text = "(a, b) => a + b";
        let options = ParserOptions::default().with_parameter("a", "Nowhere");
        let error = ExpressionCompiler::with_options(options).parse(text).unwrap_err();
        match error {
            CompileError::TypeNotFound { offset, ref name } => {
                assert_eq!(name, "Nowhere");
                assert!(offset > 0 && offset <= text.len(), "offset {}", offset);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn foreach_needs_an_array_or_an_enumerator() {
        let error = parse_err("int s = 0; foreach (var c in 5) { s += 1; } return s;");
        match error {
            CompileError::UnknownEnumerableShape { offset, ty } => {
                assert_eq!(ty, "int");
                assert_eq!(offset, 11);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn uninferable_type_argument_is_reported() {
        let error = parse_err("String.Join(\",\", null)");
        assert!(
            matches!(error, CompileError::GenericInferenceFailed { ref parameter, .. } if parameter == "T"),
            "unexpected {:?}",
            error
        );
    }

    #[test]
    fn parenthesised_parameter_is_a_group() {
        let compiler = ExpressionCompiler::with_options(ParserOptions::default().with_parameter("x", "double"));
        let lambda = compiler.parse("(x) - 1").unwrap();
        assert_eq!(binary_op(&lambda.body), Some(BinaryOp::Subtract));
        assert_eq!(compiler.evaluate("(x) - 1", &[Value::from(3.0)]).unwrap(), Value::from(2.0));
    }

    #[test]
    fn parenthesised_type_is_a_cast() {
        let compiler = ExpressionCompiler::with_options(ParserOptions::default().with_parameter("x", "double"));
        let lambda = compiler.parse("(int)-x").unwrap();
        assert!(matches!(lambda.body.kind, ExprKind::Convert(_)));
        assert_eq!(lambda.body.ty, Type::INT);
        assert_eq!(compiler.evaluate("(int)-x", &[Value::from(2.5)]).unwrap(), Value::from(-2));
    }

    #[test]
    fn break_outside_a_loop_is_invalid() {
        assert!(matches!(parse_err("break;"), CompileError::InvalidStatement { .. }));
    }

    #[test]
    fn deeply_nested_parentheses() {
        let handle = std::thread::Builder::new()
            .stack_size(32 * 1024 * 1024)
            .spawn(|| {
                let text = format!("{}1{}", "(".repeat(200), ")".repeat(200));
                let compiler = ExpressionCompiler::new();
                let lambda = compiler.parse(&text).unwrap();
                assert!(lambda.body.is_number(1.0));
            })
            .unwrap();
        handle.join().unwrap();
    }
}
