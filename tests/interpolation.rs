#[cfg(test)]
mod interpolation_tests {
    use expr_compiler as ec;

    use ec::compiler::ExpressionCompiler;
    use ec::error::CompileError;
    use ec::interpolation::{split_lexeme, Segment};
    use ec::options::ParserOptions;
    use ec::value::Value;

    fn literal(text: &str) -> Segment<'static> {
        Segment::Literal(text.to_string())
    }

    #[test]
    fn holes_and_literals_alternate() {
        let source = r#"$"Hello {name}, you are {age:D2} years old""#;
        let segments = split_lexeme(source, 0).unwrap();

        assert_eq!(
            segments,
            vec![
                literal("Hello "),
                Segment::Expression {
                    text: "name",
                    offset: 9,
                    alignment: None,
                    format: None,
                },
                literal(", you are "),
                Segment::Expression {
                    text: "age",
                    offset: 25,
                    alignment: None,
                    format: Some("D2"),
                },
                literal(" years old"),
            ]
        );
    }

    #[test]
    fn alignment_and_format_are_split_off() {
        let segments = split_lexeme(r#"$"[{ x ,-6:F1}]""#, 100).unwrap();
        assert_eq!(
            segments[1],
            Segment::Expression {
                text: "x",
                offset: 105,
                alignment: Some(-6),
                format: Some("F1"),
            }
        );
    }

    #[test]
    fn doubled_braces_are_literal() {
        let segments = split_lexeme(r#"$"{{a}} {b}""#, 0).unwrap();
        assert_eq!(segments[0], literal("{a} "));
        assert!(matches!(segments[1], Segment::Expression { text: "b", .. }));
    }

    #[test]
    fn nested_brackets_and_strings_stay_in_the_hole() {
        let segments = split_lexeme(r#"$"{f("}", xs[0])}!""#, 0).unwrap();
        assert!(matches!(segments[0], Segment::Expression { text: r#"f("}", xs[0])"#, .. }));
        assert_eq!(segments[1], literal("!"));
    }

    #[test]
    fn escapes_decode_in_literal_runs() {
        let segments = split_lexeme(r#"$"a\tb{c}""#, 0).unwrap();
        assert_eq!(segments[0], literal("a\tb"));
    }

    #[test]
    fn malformed_bodies_are_rejected() {
        for source in [r#"$"{a""#, r#"$"a}b""#, r#"$"{}""#] {
            assert!(
                matches!(split_lexeme(source, 0), Err(CompileError::MalformedInterpolation { .. })),
                "{} was accepted",
                source
            );
        }
    }

    #[test]
    fn interpolated_strings_evaluate() {
        let options = ParserOptions::default()
            .with_parameter("name", "string")
            .with_parameter("age", "int");
        let compiler = ExpressionCompiler::with_options(options);

        let value = compiler
            .evaluate(
                r#"$"Hello {name}, you are {age:D2} years old""#,
                &[Value::from("Ada"), Value::from(7)],
            )
            .unwrap();
        assert_eq!(value.to_string(), "Hello Ada, you are 07 years old");
    }

    #[test]
    fn holes_report_absolute_offsets_in_errors() {
        let options = ParserOptions::default().with_parameter("n", "int");
        let compiler = ExpressionCompiler::with_options(options);
        let error = compiler.parse(r#"n + $"x{Math.Nope(n)}""#).unwrap_err();
        assert_eq!(error.offset(), Some(13));
    }
}
