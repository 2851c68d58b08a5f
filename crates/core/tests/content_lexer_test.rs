use quire_core::PdfError;
use quire_core::parser::{ContentLexer, ContentToken, ContentTokenizer, Token};

fn collect_tokens(data: &[u8]) -> Vec<Token> {
    let mut lexer = ContentLexer::new(data.to_vec());
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next_token() {
        let (_, token) = result.expect("tokenize");
        tokens.push(token);
    }
    tokens
}

#[test]
fn test_content_lexer_basic_tokens() {
    let tokens = collect_tokens(b"BT /F1 12 Tf (Hello) Tj ET");

    assert_eq!(
        tokens,
        vec![
            Token::Keyword("BT".into()),
            Token::Literal("F1".to_string()),
            Token::Int(12),
            Token::Keyword("Tf".into()),
            Token::String(b"Hello".to_vec()),
            Token::Keyword("Tj".into()),
            Token::Keyword("ET".into()),
        ]
    );
}

#[test]
fn test_content_lexer_quote_operators() {
    let tokens = collect_tokens(b"(a) ' 1 2 (b) \"");
    assert_eq!(tokens[1], Token::Keyword("'".into()));
    assert_eq!(tokens[5], Token::Keyword("\"".into()));
}

#[test]
fn test_content_lexer_hex_string_whitespace() {
    let tokens = collect_tokens(b"<48 65 6C 6C 6F> Tj");
    assert_eq!(
        tokens,
        vec![Token::String(b"Hello".to_vec()), Token::Keyword("Tj".into())]
    );
}

#[test]
fn test_content_lexer_hex_string_odd_digits() {
    let tokens = collect_tokens(b"<4F3> Tj");
    assert_eq!(tokens[0], Token::String(vec![0x4f, 0x30]));
}

#[test]
fn test_content_lexer_literal_hex_escape() {
    let tokens = collect_tokens(b"/foo#5fbar");
    assert_eq!(tokens, vec![Token::Literal("foo_bar".to_string())]);
}

#[test]
fn test_content_lexer_invalid_utf8_name_is_replaced() {
    let tokens = collect_tokens(b"/a#ffb");
    assert_eq!(tokens, vec![Token::Literal("a\u{fffd}b".to_string())]);
}

#[test]
fn test_content_lexer_numbers() {
    let tokens = collect_tokens(b"-3 .5 +2. 0.25");
    assert_eq!(
        tokens,
        vec![
            Token::Int(-3),
            Token::Real(0.5),
            Token::Real(2.0),
            Token::Real(0.25)
        ]
    );
}

#[test]
fn test_content_lexer_skips_comments() {
    let tokens = collect_tokens(b"% comment\nBT");
    assert_eq!(tokens, vec![Token::Keyword("BT".into())]);
}

#[test]
fn test_content_lexer_string_escapes() {
    let tokens = collect_tokens(b"(a\\(b\\)c\\101\\\nd)");
    assert_eq!(tokens, vec![Token::String(b"a(b)cAd".to_vec())]);
}

#[test]
fn test_tokenizer_dict_operand() {
    let tokens: Vec<ContentToken> = ContentTokenizer::new(b"/Span <</MCID 3>> BDC".to_vec())
        .collect::<Result<_, _>>()
        .expect("tokenize");
    assert_eq!(tokens.len(), 3);
    match &tokens[1] {
        ContentToken::Operand(op) => assert_eq!(op.kind().name(), "dict"),
        other => panic!("expected dict operand, got {other:?}"),
    }
}

#[test]
fn test_tokenizer_ascii85_inline_image() {
    let data = b"BI /W 1 /H 1 /F /A85 ID 87cURD]i,\"Ebo80~> EI Q".to_vec();
    let tokens: Vec<ContentToken> = ContentTokenizer::new(data)
        .collect::<Result<_, _>>()
        .expect("tokenize");
    assert_eq!(tokens.len(), 2);
    match &tokens[0] {
        ContentToken::InlineImage { data, .. } => assert!(data.ends_with(b"~>")),
        other => panic!("expected inline image, got {other:?}"),
    }
}

#[test]
fn test_tokenizer_error_is_token_error() {
    let result: Result<Vec<_>, PdfError> = ContentTokenizer::new(b"1 2 ] m".to_vec()).collect();
    assert!(matches!(result, Err(PdfError::TokenError { .. })));
}
