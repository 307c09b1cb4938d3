#[cfg(test)]
mod interpreter_tests {
    use expr_compiler as ec;

    use ec::compiler::ExpressionCompiler;
    use ec::error::CompileError;
    use ec::options::ParserOptions;
    use ec::value::Value;

    fn run(text: &str) -> Value {
        match ExpressionCompiler::new().evaluate(text, &[]) {
            Ok(value) => value,
            Err(e) => panic!("{} failed: {}", text, e),
        }
    }

    fn run_with(options: ParserOptions, text: &str, args: &[Value]) -> Value {
        ExpressionCompiler::with_options(options).evaluate(text, args).unwrap()
    }

    // ── loops ────────────────────────────────────────────────────────────

    #[test]
    fn for_loop_with_break() {
        let value = run("int s = 0; for (int i = 0; ; i++) { if (i > 4) break; s += i; } return s;");
        assert_eq!(value, Value::from(10));
    }

    #[test]
    fn while_loop_with_continue() {
        let value = run(
            "int i = 0; int s = 0; \
             while (i < 10) { i++; if (i % 2 == 0) continue; s += i; } \
             return s;",
        );
        assert_eq!(value, Value::from(25));
    }

    #[test]
    fn do_loop_runs_at_least_once() {
        assert_eq!(run("int i = 0; do { i += 3; } while (i < 10); return i;"), Value::from(12));
        assert_eq!(run("int i = 50; do { i++; } while (i < 10); return i;"), Value::from(51));
    }

    #[test]
    fn break_leaves_only_the_inner_loop() {
        let value = run(
            "int n = 0; \
             for (int i = 0; i < 3; i++) { for (int j = 0; j < 10; j++) { if (j == 2) break; n++; } } \
             return n;",
        );
        assert_eq!(value, Value::from(6));
    }

    #[test]
    fn foreach_over_arrays_and_lists() {
        assert_eq!(
            run("int s = 0; foreach (var x in new[] { 1, 2, 3 }) s += x; return s;"),
            Value::from(6)
        );

        let options = ParserOptions::default().with_parameter("xs", "List<int>");
        let xs = Value::list(vec![Value::from(4), Value::from(5)]);
        let value = run_with(options, "int s = 0; foreach (int x in xs) { s += x * 10; } return s;", &[xs]);
        assert_eq!(value, Value::from(90));
    }

    #[test]
    fn goto_jumps_back_to_a_label() {
        assert_eq!(run("int i = 0; again: i++; if (i < 5) goto again; return i;"), Value::from(5));
    }

    // ── switch ───────────────────────────────────────────────────────────

    #[test]
    fn switch_selects_a_case() {
        let options = ParserOptions::default().with_parameter("s", "string");
        let text = "int r = 0; \
                    switch (s) { case \"a\": r = 1; break; case \"b\": case \"c\": r = 2; break; default: r = 3; break; } \
                    return r;";

        for (input, expected) in [("a", 1), ("c", 2), ("z", 3)] {
            assert_eq!(run_with(options.clone(), text, &[Value::from(input)]), Value::from(expected));
        }
    }

    // ── exceptions ───────────────────────────────────────────────────────

    #[test]
    fn integer_division_by_zero_is_catchable() {
        let value = run(
            "int z = 0; string m = \"none\"; \
             try { int q = 1 / z; } catch (DivideByZeroException e) { m = e.Message; } \
             return m;",
        );
        assert_eq!(value, Value::from("Attempted to divide by zero."));
    }

    #[test]
    fn finally_runs_after_the_handler() {
        let value = run(
            "string log = \"\"; \
             try { log += \"a\"; throw new Exception(\"x\"); } catch (Exception e) { log += \"b\"; } finally { log += \"c\"; } \
             return log;",
        );
        assert_eq!(value, Value::from("abc"));
    }

    #[test]
    fn handlers_are_matched_by_type() {
        let value = run(
            "try { throw new ArgumentException(\"bad\"); } \
             catch (DivideByZeroException) { return \"divide\"; } \
             catch (Exception e) { return e.Message; } \
             return \"none\";",
        );
        assert_eq!(value, Value::from("bad"));
    }

    #[test]
    fn rethrow_reaches_the_outer_handler() {
        let value = run(
            "try { try { throw new InvalidOperationException(\"inner\"); } catch (Exception) { throw; } } \
             catch (InvalidOperationException e) { return e.Message; } \
             return \"none\";",
        );
        assert_eq!(value, Value::from("inner"));
    }

    #[test]
    fn uncaught_throw_surfaces_as_an_error() {
        let error = ExpressionCompiler::new()
            .evaluate("throw new ArgumentException(\"bad\");", &[])
            .unwrap_err();
        match error {
            CompileError::Thrown(message) => assert_eq!(message, "ArgumentException: bad"),
            other => panic!("unexpected {:?}", other),
        }
    }

    // ── values ───────────────────────────────────────────────────────────

    #[test]
    fn arrays_are_indexed_and_assigned() {
        let value = run("int[] a = new int[3]; a[0] = 5; a[2] = a[0] * 2; return a[2] + a.Length;");
        assert_eq!(value, Value::from(13));
    }

    #[test]
    fn list_initializer_and_indexer() {
        let value = run("var xs = new List<int> { 1, 2 }; xs.Add(3); xs[0] = 10; return xs.Count + xs[0];");
        assert_eq!(value, Value::from(13));
    }

    #[test]
    fn member_initializer_sets_fields() {
        let value = run("var e = new Exception { Message = \"hi\" }; return e.Message;");
        assert_eq!(value, Value::from("hi"));
    }

    #[test]
    fn increments_yield_old_and_new_values() {
        let value = run("int i = 5; int a = i++; int b = ++i; return a * 100 + b * 10 + i;");
        assert_eq!(value, Value::from(577));
    }

    #[test]
    fn strings_concatenate_with_numbers() {
        assert_eq!(run("\"n=\" + 42"), Value::from("n=42"));
    }

    #[test]
    fn coalesce_and_conditional() {
        let options = ParserOptions::default().with_parameter("s", "string");
        assert_eq!(
            run_with(options.clone(), "s ?? \"fallback\"", &[Value::Null]),
            Value::from("fallback")
        );
        assert_eq!(run_with(options, "s ?? \"fallback\"", &[Value::from("x")]), Value::from("x"));

        let options = ParserOptions::default().with_parameter("n", "int");
        assert_eq!(
            run_with(options, "n > 0 ? \"pos\" : \"neg\"", &[Value::from(-3)]),
            Value::from("neg")
        );
    }

    #[test]
    fn type_tests_and_safe_casts() {
        let options = ParserOptions::default().with_parameter("o", "object");
        assert_eq!(run_with(options.clone(), "o is string", &[Value::from("a")]), Value::Bool(true));
        assert_eq!(run_with(options.clone(), "o is string", &[Value::from(1)]), Value::Bool(false));
        assert_eq!(
            run_with(options, "(o as string) ?? \"not a string\"", &[Value::from(1)]),
            Value::from("not a string")
        );
    }

    // ── closures ─────────────────────────────────────────────────────────

    #[test]
    fn lambdas_capture_parameters() {
        let options = ParserOptions::default().with_parameter("n", "int");
        let value = run_with(options, "Func<int, int> add = y => y + n; return add(3);", &[Value::from(4)]);
        assert_eq!(value, Value::from(7));
    }

    #[test]
    fn lambdas_share_captured_locals() {
        assert_eq!(run("int c = 0; Func<int> next = () => ++c; next(); next(); return c;"), Value::from(2));
    }

    #[test]
    fn compiled_lambdas_are_reusable() {
        let compiler = ExpressionCompiler::new();
        let square = compiler.compile(compiler.parse("(int n) => n * n").unwrap());
        assert_eq!(square.arity(), 1);
        assert_eq!(square.invoke(&[Value::from(3)]).unwrap(), Value::from(9));
        assert_eq!(square.invoke(&[Value::from(-4)]).unwrap(), Value::from(16));
    }
}
