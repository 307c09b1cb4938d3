#[cfg(test)]
mod equality_tests {
    use expr_compiler as ec;

    use ec::compiler::ExpressionCompiler;
    use ec::options::ParserOptions;

    fn same(compiler: &ExpressionCompiler, a: &str, b: &str) -> bool {
        let x = compiler.parse(a).unwrap();
        let y = compiler.parse(b).unwrap();
        compiler.equals(&x, &y).unwrap()
    }

    fn hash(compiler: &ExpressionCompiler, text: &str) -> u64 {
        compiler.hash(&compiler.parse(text).unwrap()).unwrap()
    }

    #[test]
    fn lambdas_are_equal_up_to_parameter_names() {
        let compiler = ExpressionCompiler::new();
        assert!(same(&compiler, "(a,b)=>a+b", "(x,y)=>x+y"));
        assert!(!same(&compiler, "(a,b)=>a+b", "(x,y)=>y+x"));
    }

    #[test]
    fn parameter_types_matter() {
        let compiler = ExpressionCompiler::new();
        assert!(!same(&compiler, "(int a) => a", "(long a) => a"));
    }

    #[test]
    fn nested_lambdas_compare_by_binder_position() {
        let compiler = ExpressionCompiler::with_options(ParserOptions::default().with_parameter("xs", "List<int>"));
        assert!(same(&compiler, "xs.Select(a => a * 2).Sum()", "xs.Select(b => b * 2).Sum()"));
        assert!(!same(&compiler, "xs.Select(a => a * 2).Sum()", "xs.Select(b => b * 3).Sum()"));
    }

    #[test]
    fn equality_sees_through_simplification() {
        let compiler = ExpressionCompiler::new();
        assert!(same(&compiler, "2 + 3 * 4", "14"));
        assert!(same(&compiler, "2 ** 3", "8.0"));
        assert!(same(&compiler, "x => (x + 0) * 1", "y => y"));
    }

    #[test]
    fn folded_bodies_compare_across_widths() {
        let compiler = ExpressionCompiler::new();
        let power = compiler.parse("2 ** 3").unwrap();
        let eight = compiler.parse("8").unwrap();

        // The lambdas differ in return type; their bodies denote the same number.
        assert!(!compiler.equals(&power, &eight).unwrap());
        assert!(ec::equality::equals(compiler.simplifier(), &power.body, &eight.body).unwrap());
    }

    #[test]
    fn different_constants_differ() {
        let compiler = ExpressionCompiler::new();
        assert!(!same(&compiler, "1 + 1", "3"));
        assert!(!same(&compiler, "\"a\"", "\"b\""));
    }

    #[test]
    fn different_methods_differ() {
        let compiler = ExpressionCompiler::with_options(ParserOptions::default().with_static_type("Math"));
        assert!(!same(&compiler, "x => Sin(x)", "x => Cos(x)"));
        assert!(same(&compiler, "x => Math.Sin(x)", "y => Sin(y)"));
    }

    #[test]
    fn equal_expressions_hash_alike() {
        let compiler = ExpressionCompiler::new();
        assert_eq!(hash(&compiler, "(a,b)=>a+b"), hash(&compiler, "(x,y)=>x+y"));
        assert_eq!(hash(&compiler, "2+3*4"), hash(&compiler, "14"));
        assert_eq!(hash(&compiler, "x => x * 1"), hash(&compiler, "x => x"));
    }

    #[test]
    fn signed_zeros_hash_alike() {
        let compiler = ExpressionCompiler::new();
        assert!(same(&compiler, "(double x) => -0.0", "(double x) => 0.0"));
        assert_eq!(hash(&compiler, "(double x) => -0.0"), hash(&compiler, "(double x) => 0.0"));
    }

    #[test]
    fn hash_separates_obvious_differences() {
        let compiler = ExpressionCompiler::new();
        assert_ne!(hash(&compiler, "(a,b)=>a+b"), hash(&compiler, "(a,b)=>a-b"));
    }
}
