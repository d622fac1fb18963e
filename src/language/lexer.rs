use crate::language::{
    span::Span,
    token::{Token, TokenKind},
};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace1},
    combinator::{map, map_res, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair},
    IResult,
};

#[derive(Debug)]
pub struct LexError {
    pub message: String,
    pub label: &'static str,
    pub span: Span,
}

pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut rest = source;

    loop {
        if let Ok((remaining, ())) = skip_trivia(rest) {
            rest = remaining;
        }
        if rest.is_empty() {
            break;
        }

        let start = source.len() - rest.len();
        match lex_token(rest) {
            Ok((remaining, kind)) => {
                let end = source.len() - remaining.len();
                tokens.push(Token {
                    kind,
                    span: Span::new(start, end),
                });
                rest = remaining;
            }
            Err(_) if rest.starts_with('"') => {
                errors.push(LexError {
                    message: "Unterminated string".to_string(),
                    label: "string is never closed",
                    span: Span::new(start, source.len()),
                });
                rest = "";
            }
            Err(_) => {
                let Some(ch) = rest.chars().next() else {
                    break;
                };
                let width = ch.len_utf8();
                errors.push(LexError {
                    message: format!("Unexpected character `{ch}`"),
                    label: "not part of any token",
                    span: Span::new(start, start + width),
                });
                rest = &rest[width..];
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::new(source.len(), source.len()),
    });
    tracing::trace!(tokens = tokens.len(), errors = errors.len(), "lexed source");

    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}

fn skip_trivia(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            multispace1,
            recognize(pair(tag("//"), take_while(|c: char| c != '\n'))),
        ))),
    )(input)
}

fn lex_token(input: &str) -> IResult<&str, TokenKind> {
    alt((
        lex_number,
        lex_string,
        lex_word,
        lex_operator,
        lex_punctuation,
    ))(input)
}

fn lex_number(input: &str) -> IResult<&str, TokenKind> {
    map_res(
        recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        |text: &str| text.parse::<f64>().map(TokenKind::Number),
    )(input)
}

fn lex_string(input: &str) -> IResult<&str, TokenKind> {
    map(
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        |text: &str| TokenKind::String(text.to_string()),
    )(input)
}

fn lex_word(input: &str) -> IResult<&str, TokenKind> {
    map(
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        )),
        |word: &str| {
            TokenKind::keyword(word).unwrap_or_else(|| TokenKind::Identifier(word.to_string()))
        },
    )(input)
}

fn lex_operator(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::BangEq, tag("!=")),
        value(TokenKind::EqEq, tag("==")),
        value(TokenKind::LtEq, tag("<=")),
        value(TokenKind::GtEq, tag(">=")),
        value(TokenKind::Bang, char('!')),
        value(TokenKind::Eq, char('=')),
        value(TokenKind::Lt, char('<')),
        value(TokenKind::Gt, char('>')),
    ))(input)
}

fn lex_punctuation(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
        value(TokenKind::LBrace, char('{')),
        value(TokenKind::RBrace, char('}')),
        value(TokenKind::Comma, char(',')),
        value(TokenKind::Dot, char('.')),
        value(TokenKind::Minus, char('-')),
        value(TokenKind::Plus, char('+')),
        value(TokenKind::Semi, char(';')),
        value(TokenKind::Slash, char('/')),
        value(TokenKind::Star, char('*')),
    ))(input)
}
