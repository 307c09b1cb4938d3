#[cfg(test)]
mod tokenizer_tests {
    use expr_compiler as ec;

    use ec::error::CompileError;
    use ec::number::Number;
    use ec::token::*;
    use ec::tokenizer::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let tokenizer = Tokenizer::new(source);
        let tokens: Vec<_> = tokenizer.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), expected.len());

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    fn number(source: &str) -> Number {
        let mut tokenizer = Tokenizer::new(source);
        match tokenizer.read_token().unwrap().token_type {
            TokenType::NUMBER(n) => n,
            other => panic!("expected a number, got {:?}", other),
        }
    }

    #[test]
    fn test_tokenizer_01_symbols() {
        assert_token_sequence(
            "x => x ** 2 >= 3",
            &[
                (TokenType::IDENTIFIER, "x"),
                (TokenType::SYMBOL, "=>"),
                (TokenType::IDENTIFIER, "x"),
                (TokenType::SYMBOL, "**"),
                (TokenType::NUMBER(Number::Int(0)), "2"),
                (TokenType::SYMBOL, ">="),
                (TokenType::NUMBER(Number::Int(0)), "3"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_tokenizer_02_longest_symbol_wins() {
        assert_token_sequence(
            "a>>=b??c",
            &[
                (TokenType::IDENTIFIER, "a"),
                (TokenType::SYMBOL, ">>="),
                (TokenType::IDENTIFIER, "b"),
                (TokenType::SYMBOL, "??"),
                (TokenType::IDENTIFIER, "c"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_tokenizer_03_keywords_and_comments() {
        assert_token_sequence(
            "if (true) // trailing\n return /* inner */ null;",
            &[
                (TokenType::KEYWORD, "if"),
                (TokenType::SYMBOL, "("),
                (TokenType::KEYWORD, "true"),
                (TokenType::SYMBOL, ")"),
                (TokenType::KEYWORD, "return"),
                (TokenType::KEYWORD, "null"),
                (TokenType::SYMBOL, ";"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_tokenizer_04_string_literals_decode() {
        let mut tokenizer = Tokenizer::new(r#""a\tb" @"c\d""#);

        let first = tokenizer.read_token().unwrap();
        assert!(matches!(first.token_type, TokenType::STRING(ref s) if s == "a\tb"));

        let second = tokenizer.read_token().unwrap();
        assert!(matches!(second.token_type, TokenType::STRING(ref s) if s == "c\\d"));
    }

    #[test]
    fn test_tokenizer_05_numeric_literal_widths() {
        assert!(matches!(number("42"), Number::Int(42)));
        assert!(matches!(number("42L"), Number::Long(42)));
        assert!(matches!(number("1.5"), Number::Double(x) if x == 1.5));
        assert!(matches!(number("1.5f"), Number::Float(x) if x == 1.5));
        assert!(matches!(number("2m"), Number::Decimal(x) if x == 2.0));
    }

    #[test]
    fn test_tokenizer_06_backtrack_reproduces_token() {
        let mut tokenizer = Tokenizer::new("alpha + beta");
        tokenizer.read_token().unwrap();

        tokenizer.push_position();
        let first = tokenizer.read_token().unwrap();
        tokenizer.pop_position();
        let again = tokenizer.read_token().unwrap();

        assert_eq!(first, again);
        assert_eq!(again.lexeme, "+");
        assert_eq!(tokenizer.read_token().unwrap().lexeme, "beta");
    }

    #[test]
    fn test_tokenizer_07_peek_does_not_consume() {
        let mut tokenizer = Tokenizer::new("a b");
        assert_eq!(tokenizer.peek_token().unwrap().lexeme, "a");
        assert_eq!(tokenizer.read_token().unwrap().lexeme, "a");
        assert_eq!(tokenizer.read_token().unwrap().lexeme, "b");
        assert!(tokenizer.at_end().unwrap());
    }

    #[test]
    fn test_tokenizer_08_read_symbol() {
        let mut tokenizer = Tokenizer::new("( x");
        assert!(!tokenizer.read_symbol("[", false).unwrap());
        assert!(tokenizer.read_symbol("(", false).unwrap());
        assert!(matches!(
            tokenizer.read_symbol(")", true),
            Err(CompileError::WrongSymbol { .. })
        ));
        assert_eq!(tokenizer.read_token().unwrap().lexeme, "x");
    }

    #[test]
    fn test_tokenizer_09_unknown_symbol_reports_offset() {
        let mut tokenizer = Tokenizer::new("1 # 2");
        tokenizer.read_token().unwrap();
        match tokenizer.read_token() {
            Err(CompileError::UnknownSymbol { offset, .. }) => assert_eq!(offset, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_tokenizer_10_unterminated_string() {
        let mut tokenizer = Tokenizer::new("\"abc");
        assert!(matches!(
            tokenizer.read_token(),
            Err(CompileError::UnterminatedLiteral { .. })
        ));
    }

    #[test]
    fn test_tokenizer_11_saved_position_survives_iteration() {
        let mut tokenizer = Tokenizer::new("x * (y + 1)");
        tokenizer.read_token().unwrap();
        let saved = tokenizer.current_position();

        tokenizer.push_position();
        let rest: Vec<_> = tokenizer.by_ref().filter_map(Result::ok).map(|t| t.lexeme).collect();
        assert_eq!(rest, ["*", "(", "y", "+", "1", ")", ""]);
        tokenizer.pop_position();

        assert_eq!(tokenizer.current_position(), saved);
        assert_eq!(tokenizer.read_token().unwrap().lexeme, "*");
    }
}
