#[cfg(test)]
mod resolver_tests {
    use std::sync::Arc;

    use expr_compiler as ec;

    use ec::catalog::{MethodDef, ParamDef, Registry, TypeDef};
    use ec::compiler::ExpressionCompiler;
    use ec::error::{CompileError, Result};
    use ec::expr::ExprKind;
    use ec::number::Number;
    use ec::options::ParserOptions;
    use ec::resolver::Resolver;
    use ec::types::Type;
    use ec::value::Value;

    fn builtins() -> Resolver {
        Resolver::new(Arc::new(Registry::with_builtins()))
    }

    fn tag_int(_: &[Value]) -> Result<Value> {
        Ok(Value::from("int"))
    }

    fn tag_double(_: &[Value]) -> Result<Value> {
        Ok(Value::from("double"))
    }

    fn tag_first(_: &[Value]) -> Result<Value> {
        Ok(Value::from("first"))
    }

    fn tag_second(_: &[Value]) -> Result<Value> {
        Ok(Value::from("second"))
    }

    /// `Probe.F(double)`, `Probe.F(int)`, and two `Probe.G(long)` overloads.
    fn probe_compiler() -> ExpressionCompiler {
        let param = |ty: Type| vec![ParamDef::new("value", ty)];
        let mut registry = Registry::with_builtins();
        registry.register(
            TypeDef::static_class("Probe")
                .method(MethodDef::new("F", param(Type::DOUBLE), Type::String, tag_double).static_())
                .method(MethodDef::new("F", param(Type::INT), Type::String, tag_int).static_())
                .method(MethodDef::new("G", param(Type::LONG), Type::String, tag_first).static_())
                .method(MethodDef::new("G", param(Type::LONG), Type::String, tag_second).static_()),
        );
        ExpressionCompiler::with_catalog(Arc::new(registry), ParserOptions::default())
    }

    #[test]
    fn primitive_and_composite_type_names() {
        let resolver = builtins();
        assert_eq!(resolver.resolve_type_name("int"), Some(Type::INT));
        assert_eq!(resolver.resolve_type_name("System.Int32"), Some(Type::INT));
        assert_eq!(resolver.resolve_type_name("double?"), Some(Type::nullable(Type::DOUBLE)));
        assert_eq!(resolver.resolve_type_name("string[]"), Some(Type::array(Type::String)));
        assert_eq!(
            resolver.resolve_type_name("int[,]"),
            Some(Type::Array {
                element: Box::new(Type::INT),
                rank: 2
            })
        );
        assert_eq!(
            resolver.resolve_type_name("List<int>"),
            Some(Type::named("List", vec![Type::INT]))
        );
        assert_eq!(
            resolver.resolve_type_name("Func<int, bool>"),
            Some(Type::function(vec![Type::INT], Type::Bool))
        );
        assert_eq!(resolver.resolve_type_name("Nowhere"), None);
    }

    #[test]
    fn extra_namespaces_are_stripped() {
        let resolver = builtins().with_namespaces(vec!["Acme.Numerics".to_string()]);
        assert_eq!(resolver.resolve_type_name("Acme.Numerics.Math"), Some(Type::named("Math", vec![])));
    }

    #[test]
    fn resolution_is_cached_and_stable() {
        let resolver = builtins();
        let first = resolver.resolve_type_name("List<List<int>>");
        let second = resolver.resolve_type_name("List<List<int>>");
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn distance_scores_conversions() {
        let resolver = builtins();
        assert_eq!(resolver.distance(&Type::INT, &Type::INT), Some(0));
        assert_eq!(resolver.distance(&Type::INT, &Type::LONG), Some(1));
        assert_eq!(resolver.distance(&Type::Null, &Type::String), Some(1));
        assert_eq!(resolver.distance(&Type::INT, &Type::nullable(Type::INT)), Some(1));
        assert!(resolver.distance(&Type::INT, &Type::Object).is_some());
        assert_eq!(resolver.distance(&Type::String, &Type::INT), None);
        assert_eq!(resolver.distance(&Type::LONG, &Type::INT), None);
    }

    #[test]
    fn exception_hierarchy() {
        let resolver = builtins();
        let divide = Type::named("DivideByZeroException", vec![]);
        assert!(resolver.derives_from(&divide, "Exception"));
        assert!(!resolver.derives_from(&Type::String, "Exception"));
        assert!(resolver.distance(&divide, &Type::named("Exception", vec![])).is_some());
    }

    #[test]
    fn exact_overload_beats_a_widening_one() {
        let compiler = probe_compiler();
        let lambda = compiler.parse("Probe.F(1)").unwrap();

        let ExprKind::Call { method, .. } = &lambda.body.kind else {
            panic!("expected a call");
        };
        assert_eq!(method.params[0].ty, Type::INT);
        assert_eq!(compiler.compile(lambda).invoke(&[]).unwrap(), Value::from("int"));

        assert_eq!(compiler.evaluate("Probe.F(1.5)", &[]).unwrap(), Value::from("double"));
    }

    #[test]
    fn equal_distance_goes_to_the_first_registered() {
        let compiler = probe_compiler();
        assert_eq!(compiler.evaluate("Probe.G(1)", &[]).unwrap(), Value::from("first"));
        assert_eq!(compiler.evaluate("Probe.G(1L)", &[]).unwrap(), Value::from("first"));
    }

    #[test]
    fn inapplicable_arguments_are_reported() {
        let compiler = probe_compiler();
        assert!(matches!(
            compiler.parse("Probe.G(\"x\")"),
            Err(CompileError::NoApplicableOverload { .. })
        ));
    }

    #[test]
    fn generic_arguments_are_inferred_from_lambdas() {
        let options = ParserOptions::default().with_parameter("xs", "List<int>");
        let compiler = ExpressionCompiler::with_options(options);
        let lambda = compiler.parse("xs.Select(x => x * 1.5).Sum()").unwrap();
        assert_eq!(lambda.ret, Type::DOUBLE);

        let xs = Value::list(vec![Value::from(2), Value::from(4)]);
        let value = compiler.compile(lambda).invoke(&[xs]).unwrap();
        assert!(matches!(value, Value::Number(Number::Double(x)) if x == 9.0));
    }

    #[test]
    fn member_lookup_can_ignore_case() {
        let strict = ExpressionCompiler::with_options(ParserOptions::default().with_parameter("s", "string"));
        assert!(matches!(strict.parse("s.length"), Err(CompileError::MemberNotFound { .. })));

        let mut options = ParserOptions::default().with_parameter("s", "string");
        options.ignore_case = true;
        let relaxed = ExpressionCompiler::with_options(options);
        assert_eq!(relaxed.evaluate("s.length", &[Value::from("four")]).unwrap(), Value::from(4));
    }
}
