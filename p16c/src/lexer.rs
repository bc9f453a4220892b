use logos::Logos;

use crate::ast::{Span, Spanned};
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text: String,
}

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"#[^\n]*")]
#[logos(skip r"\\\r?\n")]
pub enum TokenKind {
    #[token("\n")]
    Newline,

    #[token("import")]
    Import,
    #[token("from")]
    From,
    #[token("as")]
    As,
    #[token("def")]
    Def,
    #[token("class")]
    Class,
    #[token("return")]
    Return,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("pass")]
    Pass,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("is")]
    Is,

    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("//=")]
    SlashSlashEq,
    #[token("%=")]
    PercentEq,
    #[token("**=")]
    StarStarEq,
    #[token("<<=")]
    ShlEq,
    #[token(">>=")]
    ShrEq,
    #[token("|=")]
    PipeEq,
    #[token("&=")]
    AmpEq,
    #[token("^=")]
    CaretEq,

    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    Lte,
    #[token(">=")]
    Gte,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("**")]
    StarStar,
    #[token("//")]
    SlashSlash,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("|")]
    Pipe,
    #[token("&")]
    Amp,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token(".")]
    Dot,
    #[token("@")]
    At,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", priority = 1)]
    Ident,
    #[regex(r"[0-9][0-9_]*")]
    #[regex(r"0[xX][0-9a-fA-F_]+")]
    #[regex(r"0[oO][0-7_]+")]
    #[regex(r"0[bB][01_]+")]
    Int,
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    #[regex(r#"'([^'\\\n]|\\.)*'"#)]
    #[regex(r#""""([^"\\]|\\(.|\n)|"[^"\\]|""[^"\\])*""""#)]
    #[regex(r#"'''([^'\\]|\\(.|\n)|'[^'\\]|''[^'\\])*'''"#)]
    Str,

    /// Produced by the layout pass, never by the scanner.
    Indent,
    Dedent,
    Error,
}

impl TokenKind {
    fn opens_bracket(&self) -> bool {
        matches!(self, TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace)
    }

    fn closes_bracket(&self) -> bool {
        matches!(self, TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace)
    }
}

/// Byte offsets of line starts, used to turn offsets into line/column pairs.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        for (offset, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                starts.push(offset + 1);
            }
        }
        Self { starts }
    }

    /// 1-based line, 0-based column.
    pub fn line_col(&self, offset: usize) -> (u32, u32) {
        let line = match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let column = offset - self.starts[line];
        (line as u32 + 1, column as u32)
    }

    pub fn span(&self, start: usize, end: usize) -> Span {
        let (line, column) = self.line_col(start);
        Span::new(start, end, line, column)
    }
}

/// Raw scanner output; newlines are still plain tokens.
pub fn scan(source: &str) -> Vec<Token> {
    let index = LineIndex::new(source);
    let mut lexer = TokenKind::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let kind = result.unwrap_or(TokenKind::Error);
        let range = lexer.span();
        let text = source[range.clone()].to_string();
        tokens.push(Token {
            kind,
            span: index.span(range.start, range.end),
            text,
        });
    }
    tokens
}

/// Scan and run the layout pass: blank lines collapse, newlines inside
/// brackets vanish, and indentation changes become `Indent`/`Dedent`.
pub fn lex(source: &str) -> Result<Vec<Token>, ParseError> {
    let raw = scan(source);
    let eof = LineIndex::new(source).span(source.len(), source.len());
    let mut tokens = Vec::with_capacity(raw.len());
    let mut indents = vec![0u32];
    let mut depth = 0usize;
    let mut at_line_start = true;

    for token in raw {
        if token.kind == TokenKind::Newline {
            if depth == 0 && !at_line_start {
                tokens.push(token);
                at_line_start = true;
            }
            continue;
        }
        if at_line_start {
            let column = token.span.column;
            let current = indents.last().copied().unwrap_or(0);
            if column > current {
                indents.push(column);
                tokens.push(layout_token(TokenKind::Indent, token.span));
            } else {
                while column < indents.last().copied().unwrap_or(0) {
                    indents.pop();
                    tokens.push(layout_token(TokenKind::Dedent, token.span));
                }
                if column != indents.last().copied().unwrap_or(0) {
                    return Err(ParseError::new(
                        "unindent does not match any outer indentation level".to_string(),
                        token.span,
                    ));
                }
            }
            at_line_start = false;
        }
        if token.kind.opens_bracket() {
            depth += 1;
        } else if token.kind.closes_bracket() {
            depth = depth.saturating_sub(1);
        }
        tokens.push(token);
    }

    if !at_line_start {
        tokens.push(layout_token(TokenKind::Newline, eof));
    }
    while indents.len() > 1 {
        indents.pop();
        tokens.push(layout_token(TokenKind::Dedent, eof));
    }
    Ok(tokens)
}

fn layout_token(kind: TokenKind, span: Span) -> Token {
    Token {
        kind,
        span: Span::new(span.start, span.start, span.line, span.column),
        text: String::new(),
    }
}

pub fn to_ident(token: &Token) -> Spanned<String> {
    Spanned::new(token.text.clone(), token.span)
}
