#[cfg(test)]
mod simplifier_tests {
    use expr_compiler as ec;

    use ec::compiler::ExpressionCompiler;
    use ec::equality::structurally_equal;
    use ec::error::CompileError;
    use ec::expr::{BinaryOp, Expr, ExprKind, Lambda};
    use ec::options::ParserOptions;
    use ec::printer::to_source;
    use ec::types::Type;

    fn math() -> ExpressionCompiler {
        ExpressionCompiler::with_options(ParserOptions::default().with_static_type("Math"))
    }

    fn simplified(compiler: &ExpressionCompiler, text: &str) -> Lambda {
        compiler.parse_simplified(text).unwrap()
    }

    fn assert_same(compiler: &ExpressionCompiler, a: &str, b: &str) {
        let (x, y) = (compiler.parse(a).unwrap(), compiler.parse(b).unwrap());
        assert!(
            compiler.equals(&x, &y).unwrap(),
            "{} simplifies to {}, {} to {}",
            a,
            to_source(&Expr::lambda(compiler.simplify(&x).unwrap())),
            b,
            to_source(&Expr::lambda(compiler.simplify(&y).unwrap()))
        );
    }

    #[test]
    fn arithmetic_on_literals_folds() {
        let compiler = ExpressionCompiler::new();

        let lambda = simplified(&compiler, "2+3*4");
        assert!(lambda.body.is_number(14.0));
        assert_eq!(lambda.body.ty, Type::BYTE);
        assert_eq!(lambda.ret, Type::INT);

        let lambda = simplified(&compiler, "2**3");
        assert!(lambda.body.is_number(8.0));
        assert_eq!(lambda.body.ty, Type::DOUBLE);
    }

    #[test]
    fn integer_sums_fold_to_the_narrowest_width() {
        let compiler = ExpressionCompiler::new();
        let cases = [
            ("2 + 3", Type::BYTE, 5.0),
            ("2 - 5", Type::SHORT, -3.0),
            ("30000 + 30000", Type::INT, 60000.0),
            ("2147483647 + 1", Type::LONG, 2147483648.0),
            ("1 + 2.5", Type::DOUBLE, 3.5),
        ];
        for (text, ty, value) in cases {
            let body = simplified(&compiler, text).body;
            assert!(body.is_number(value), "{} folded to {}", text, to_source(&body));
            assert_eq!(body.ty, ty, "{}", text);
        }

        // The narrowed constant still evaluates at the declared width.
        assert_eq!(compiler.evaluate("2 + 3", &[]).unwrap(), ec::value::Value::from(5));
        assert_eq!(
            compiler.evaluate("\"hello\".Substring(1 + 1)", &[]).unwrap(),
            ec::value::Value::from("llo")
        );
    }

    #[test]
    fn folding_keeps_integer_division() {
        let compiler = ExpressionCompiler::new();
        assert!(simplified(&compiler, "7 / 2").body.is_number(3.0));
        assert!(simplified(&compiler, "7.0 / 2").body.is_number(3.5));
    }

    #[test]
    fn comparisons_and_logic_fold() {
        let compiler = ExpressionCompiler::new();
        let lambda = simplified(&compiler, "1 < 2 && !(3 == 4)");
        assert!(matches!(
            lambda.body.kind,
            ExprKind::Constant(ec::value::Constant::Bool(true))
        ));
    }

    #[test]
    fn division_by_literal_zero_is_an_error() {
        let compiler = ExpressionCompiler::new();
        let lambda = compiler.parse("5/0").unwrap();
        assert!(matches!(compiler.simplify(&lambda), Err(CompileError::DivideByZero)));

        let lambda = compiler.parse("x => x % 0").unwrap();
        assert!(matches!(compiler.simplify(&lambda), Err(CompileError::DivideByZero)));
    }

    #[test]
    fn pythagorean_identity_collapses_to_one() {
        let compiler = math();
        let lambda = simplified(&compiler, "x => Sin(x) ** 2 + Cos(x) ** 2");
        assert!(lambda.body.is_number(1.0));

        let lambda = simplified(&compiler, "x => Math.Cos(x) ** 2 + Math.Sin(x) ** 2");
        assert!(lambda.body.is_number(1.0));
    }

    #[test]
    fn pythagorean_identity_needs_the_same_argument() {
        let compiler = math();
        let lambda = simplified(&compiler, "(double x, double y) => Sin(x) ** 2 + Cos(y) ** 2");
        assert!(lambda.body.as_constant().is_none());
    }

    #[test]
    fn trigonometric_quotients() {
        let compiler = math();
        assert_same(&compiler, "x => Sin(x) / Cos(x)", "x => Tan(x)");
        assert_same(&compiler, "x => Cos(x) * Tan(x)", "x => Sin(x)");
        assert_same(&compiler, "x => Cos(x) / Sin(x)", "x => 1.0 / Tan(x)");
    }

    #[test]
    fn logarithm_sums_combine() {
        let compiler = math();
        assert_same(&compiler, "(double a, double b) => Log(a) + Log(b)", "(double a, double b) => Log(a * b)");
        assert_same(
            &compiler,
            "(double a, double b) => Log10(a) - Log10(b)",
            "(double a, double b) => Log10(a / b)",
        );
    }

    #[test]
    fn pow_calls_become_the_power_operator() {
        let compiler = math();
        assert_same(&compiler, "x => Pow(x, 3)", "x => x ** 3");
        assert!(simplified(&compiler, "Pow(2, 10)").body.is_number(1024.0));
    }

    #[test]
    fn canonical_calls_on_constants_fold() {
        let compiler = math();
        assert!(simplified(&compiler, "Sin(0.0) + Sqrt(9.0)").body.is_number(3.0));
    }

    #[test]
    fn signs_move_out_of_operands() {
        let compiler = ExpressionCompiler::new();
        let pair = |body: &str| format!("(double a, double b) => {}", body);
        assert_same(&compiler, &pair("a + (-b)"), &pair("a - b"));
        assert_same(&compiler, &pair("(-a) + b"), &pair("b - a"));
        assert_same(&compiler, &pair("a - (-b)"), &pair("a + b"));
        assert_same(&compiler, &pair("a * (-b)"), &pair("-(a * b)"));
        assert_same(&compiler, &pair("(-a) * b"), &pair("-(a * b)"));
        assert_same(&compiler, &pair("-(a - b)"), &pair("b - a"));
    }

    #[test]
    fn powers_of_one_base_merge() {
        let compiler = ExpressionCompiler::new();
        assert_same(&compiler, "x => x ** 2 * x ** 3", "x => x ** 5.0");
        assert_same(&compiler, "x => x * x ** 2", "x => x ** 3.0");

        let lambda = simplified(&compiler, "(double x, double y) => x ** 2 * y ** 3");
        assert!(matches!(lambda.body.kind, ExprKind::Binary { op: BinaryOp::Multiply, .. }));
    }

    #[test]
    fn nested_quotients_flatten() {
        let compiler = ExpressionCompiler::new();
        let three = |body: &str| format!("(double a, double b, double c) => {}", body);
        assert_same(&compiler, &three("(a / b) / c"), &three("a / (b * c)"));
        assert_same(&compiler, &three("a / (b / c)"), &three("(a * c) / b"));
        assert_same(
            &compiler,
            "(double a, double b, double c, double d) => (a / b) / (c / d)",
            "(double a, double b, double c, double d) => (a * d) / (b * c)",
        );

        // Integer division does not associate.
        let lambda = simplified(&compiler, "(int a, int b, int c) => a / b / c");
        let ExprKind::Binary { op: BinaryOp::Divide, left, .. } = &lambda.body.kind else {
            panic!("{}", to_source(&lambda.body));
        };
        assert!(matches!(left.kind, ExprKind::Binary { op: BinaryOp::Divide, .. }));
    }

    #[test]
    fn zero_base_keeps_a_variable_operand() {
        let compiler = ExpressionCompiler::new();
        let power = simplified(&compiler, "x => 0 ** x");
        let quotient = simplified(&compiler, "x => 0 / x");
        assert!(power.body.as_constant().is_none(), "{}", to_source(&power.body));
        assert!(quotient.body.as_constant().is_none(), "{}", to_source(&quotient.body));

        let zero = [ec::value::Value::from(0.0)];
        let power = compiler.compile(power).invoke(&zero).unwrap().as_f64().unwrap();
        let quotient = compiler.compile(quotient).invoke(&zero).unwrap().as_f64().unwrap();
        assert_eq!(power, 1.0);
        assert!(quotient.is_nan());

        // A positive exponent or a non-zero divisor still collapses.
        assert!(simplified(&compiler, "x => 0 ** 2.0").body.is_number(0.0));
        assert!(simplified(&compiler, "x => 0 / 4.0").body.is_number(0.0));
    }

    #[test]
    fn identity_laws() {
        let compiler = ExpressionCompiler::new();
        assert_same(&compiler, "x => x + 0", "x => x");
        assert_same(&compiler, "x => 0 + x", "x => x");
        assert_same(&compiler, "x => x * 1", "x => x");
        assert_same(&compiler, "x => x - 0", "x => x");
        assert_same(&compiler, "x => x / 1", "x => x");
        assert_same(&compiler, "x => x ** 1", "x => x");

        let zero = simplified(&compiler, "x => x * 0");
        assert!(zero.body.is_number(0.0));

        let one = simplified(&compiler, "x => 1 ** x");
        assert!(one.body.is_number(1.0));
    }

    #[test]
    fn identities_hold_for_integers_too() {
        let compiler = ExpressionCompiler::new();
        assert_same(&compiler, "(int n) => n + 0", "(int n) => n");
        assert_same(&compiler, "(int n) => 1 * n", "(int n) => n");
        assert!(simplified(&compiler, "(int n) => 0 * n").body.is_number(0.0));
    }

    #[test]
    fn double_negation_cancels() {
        let compiler = ExpressionCompiler::new();
        assert_same(&compiler, "x => -(-x)", "x => x");
        assert_same(&compiler, "(bool b) => !!b", "(bool b) => b");
    }

    #[test]
    fn like_terms_collect() {
        let compiler = ExpressionCompiler::new();
        assert_same(&compiler, "x => 2 * x + 3 * x", "x => 5.0 * x");
        assert_same(&compiler, "x => x + x", "x => 2.0 * x");
    }

    #[test]
    fn simplification_is_idempotent() {
        let compiler = math();
        let sources = [
            "x => (x + 0) * 1 + 2 * 3",
            "x => Sin(x) ** 2 + Cos(x) ** 2 + x * x",
            "(double a, double b) => a / (b / 2) - -a",
            "x => Log(x) + Log(2.0) - Pow(x, 2)",
            "(int n) => n * 0 + (n + 1) * 2",
        ];

        for text in sources {
            let once = simplified(&compiler, text);
            let twice = compiler.simplify(&once).unwrap();
            assert!(
                structurally_equal(&Expr::lambda(once.clone()), &Expr::lambda(twice)),
                "{} is not stable",
                text
            );
        }
    }

    #[test]
    fn simplified_expressions_still_evaluate() {
        let compiler = math();
        let text = "x => Sin(x) ** 2 + Cos(x) ** 2 + 2 * x + 3 * x";
        let plain = compiler.compile(compiler.parse(text).unwrap());
        let reduced = compiler.compile(simplified(&compiler, text));

        for x in [0.0, 0.5, 2.0] {
            let arg = [ec::value::Value::from(x)];
            let a = plain.invoke(&arg).unwrap().as_f64().unwrap();
            let b = reduced.invoke(&arg).unwrap().as_f64().unwrap();
            assert!((a - b).abs() < 1e-9, "{} vs {} at {}", a, b, x);
        }
    }
}
