use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{lex, to_ident, Token, TokenKind};

pub fn parse_module(source: &str) -> Result<Module, ParseError> {
    let tokens = lex(source)?;
    let eof_span = tokens
        .last()
        .map(|t| Span::new(source.len(), source.len(), t.span.line, t.span.column))
        .unwrap_or_default();
    let mut parser = Parser::new(tokens, eof_span);
    parser.parse_module()
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    eof_span: Span,
}

impl Parser {
    fn new(tokens: Vec<Token>, eof_span: Span) -> Self {
        Self {
            tokens,
            index: 0,
            eof_span,
        }
    }

    fn parse_module(&mut self) -> Result<Module, ParseError> {
        let start = self.peek_span();
        let mut body = Vec::new();
        while self.peek_kind().is_some() {
            if self.maybe_consume(TokenKind::Newline).is_some() {
                continue;
            }
            body.extend(self.parse_stmt()?);
        }
        Ok(Module {
            body,
            span: start.to(self.eof_span),
        })
    }

    /// One logical line or one compound statement. Simple statements joined
    /// by `;` come back as several entries.
    fn parse_stmt(&mut self) -> Result<Vec<Stmt>, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::At) | Some(TokenKind::Def) => {
                Ok(vec![Stmt::FunctionDef(self.parse_function()?)])
            }
            Some(TokenKind::While) => Ok(vec![Stmt::While(self.parse_while()?)]),
            Some(TokenKind::If) => Ok(vec![self.parse_if()?]),
            Some(TokenKind::For) => Ok(vec![self.parse_for()?]),
            Some(TokenKind::Class) => Ok(vec![self.parse_class()?]),
            Some(TokenKind::Indent) => Err(self.error_current("unexpected indent".to_string())),
            Some(_) => self.parse_simple_stmts(),
            None => Err(self.error_current("unexpected end of input".to_string())),
        }
    }

    fn parse_simple_stmts(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = vec![self.parse_simple_stmt()?];
        while self.maybe_consume(TokenKind::Semi).is_some() {
            if matches!(self.peek_kind(), Some(TokenKind::Newline) | None) {
                break;
            }
            stmts.push(self.parse_simple_stmt()?);
        }
        self.expect_line_end()?;
        Ok(stmts)
    }

    fn parse_simple_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Pass) => Ok(Stmt::Pass(self.bump_span())),
            Some(TokenKind::Break) => Ok(Stmt::Break(self.bump_span())),
            Some(TokenKind::Continue) => Ok(Stmt::Continue(self.bump_span())),
            Some(TokenKind::Return) => self.parse_return(),
            Some(TokenKind::Import) => self.parse_import(),
            Some(TokenKind::From) => self.parse_from_import(),
            _ => self.parse_expr_stmt(),
        }
    }

    fn parse_return(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(TokenKind::Return)?.span;
        if self.at_simple_stmt_end() {
            return Ok(Stmt::Return(ReturnStmt {
                value: None,
                span: start,
            }));
        }
        let value = self.parse_expr_list()?;
        let span = start.to(value.span());
        Ok(Stmt::Return(ReturnStmt {
            value: Some(value),
            span,
        }))
    }

    fn parse_import(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(TokenKind::Import)?.span;
        let mut names = Vec::new();
        loop {
            let path = self.parse_path()?;
            let alias = if self.maybe_consume(TokenKind::As).is_some() {
                Some(self.expect_ident()?)
            } else {
                None
            };
            let span = match &alias {
                Some(alias) => path.span.to(alias.span),
                None => path.span,
            };
            names.push(ImportName { path, alias, span });
            if self.maybe_consume(TokenKind::Comma).is_none() {
                break;
            }
        }
        let end = names.last().map(|n| n.span).unwrap_or(start);
        Ok(Stmt::Import(ImportStmt {
            names,
            span: start.to(end),
        }))
    }

    fn parse_from_import(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(TokenKind::From)?.span;
        self.parse_path()?;
        self.expect(TokenKind::Import)?;
        let mut end = start;
        while !self.at_simple_stmt_end() {
            end = self.bump_span();
        }
        Ok(Stmt::Unsupported(UnsupportedStmt {
            kind: "ImportFrom",
            span: start.to(end),
        }))
    }

    fn parse_expr_stmt(&mut self) -> Result<Stmt, ParseError> {
        let first = self.parse_expr_list()?;
        let start = first.span();

        if let Some(op) = self.peek_kind().and_then(|k| augmented_op(&k)) {
            self.bump();
            let value = self.parse_expr()?;
            let span = start.to(value.span());
            return Ok(Stmt::AugAssign(AugAssignStmt {
                target: first,
                op,
                value,
                span,
            }));
        }

        if self.peek_kind() == Some(TokenKind::Eq) {
            let mut targets = vec![first];
            let mut value = None;
            while self.maybe_consume(TokenKind::Eq).is_some() {
                let next = self.parse_expr_list()?;
                if let Some(prev) = value.replace(next) {
                    targets.push(prev);
                }
            }
            let value = value.ok_or_else(|| self.error_current("expected value".to_string()))?;
            let span = start.to(value.span());
            return Ok(Stmt::Assign(AssignStmt {
                targets,
                value,
                span,
            }));
        }

        Ok(Stmt::Expr(ExprStmt {
            span: first.span(),
            expr: first,
        }))
    }

    fn parse_function(&mut self) -> Result<FunctionDef, ParseError> {
        let start = self.peek_span();
        let mut decorators = Vec::new();
        while self.maybe_consume(TokenKind::At).is_some() {
            decorators.push(self.parse_expr()?);
            self.expect(TokenKind::Newline)?;
        }
        self.expect(TokenKind::Def)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        while self.peek_kind() != Some(TokenKind::RParen) {
            params.push(self.expect_ident()?);
            if self.maybe_consume(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        let (body, end) = self.parse_suite()?;
        Ok(FunctionDef {
            name,
            params,
            decorators,
            body,
            span: start.to(end),
        })
    }

    fn parse_while(&mut self) -> Result<WhileStmt, ParseError> {
        let start = self.expect(TokenKind::While)?.span;
        let test = self.parse_expr()?;
        let (body, end) = self.parse_suite()?;
        if self.peek_kind() == Some(TokenKind::Else) {
            return Err(self.error_current("`while ... else` is not supported".to_string()));
        }
        Ok(WhileStmt {
            test,
            body,
            span: start.to(end),
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(TokenKind::If)?.span;
        self.parse_expr()?;
        let (_, mut end) = self.parse_suite()?;
        while self.maybe_consume(TokenKind::Elif).is_some() {
            self.parse_expr()?;
            end = self.parse_suite()?.1;
        }
        if self.maybe_consume(TokenKind::Else).is_some() {
            end = self.parse_suite()?.1;
        }
        Ok(Stmt::Unsupported(UnsupportedStmt {
            kind: "If",
            span: start.to(end),
        }))
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(TokenKind::For)?.span;
        // targets stop short of comparisons so `in` is left for the header
        loop {
            self.parse_expr_bp(COMPARISON_BP.1 + 1)?;
            if self.maybe_consume(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::In)?;
        self.parse_expr_list()?;
        let (_, end) = self.parse_suite()?;
        Ok(Stmt::Unsupported(UnsupportedStmt {
            kind: "For",
            span: start.to(end),
        }))
    }

    fn parse_class(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(TokenKind::Class)?.span;
        self.expect_ident()?;
        if self.maybe_consume(TokenKind::LParen).is_some() {
            while self.peek_kind() != Some(TokenKind::RParen) {
                self.parse_expr()?;
                if self.maybe_consume(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        }
        let (_, end) = self.parse_suite()?;
        Ok(Stmt::Unsupported(UnsupportedStmt {
            kind: "ClassDef",
            span: start.to(end),
        }))
    }

    /// `: simple_stmts` on one line, or `: NEWLINE INDENT stmt+ DEDENT`.
    fn parse_suite(&mut self) -> Result<(Vec<Stmt>, Span), ParseError> {
        let colon = self.expect(TokenKind::Colon)?.span;
        if self.maybe_consume(TokenKind::Newline).is_none() {
            let body = self.parse_simple_stmts()?;
            let end = body.last().map(Stmt::span).unwrap_or(colon);
            return Ok((body, end));
        }
        self.expect(TokenKind::Indent)?;
        let mut body = Vec::new();
        while !matches!(self.peek_kind(), Some(TokenKind::Dedent) | None) {
            body.extend(self.parse_stmt()?);
        }
        self.maybe_consume(TokenKind::Dedent);
        let end = body.last().map(Stmt::span).unwrap_or(colon);
        Ok((body, end))
    }

    /// `expr (, expr)* [,]`; more than one element (or a trailing comma) is a tuple.
    fn parse_expr_list(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_expr()?;
        if self.peek_kind() != Some(TokenKind::Comma) {
            return Ok(first);
        }
        let start = first.span();
        let mut elts = vec![first];
        while self.maybe_consume(TokenKind::Comma).is_some() {
            if self.at_expr_list_end() {
                break;
            }
            elts.push(self.parse_expr()?);
        }
        let end = elts.last().map(Expr::span).unwrap_or(start);
        Ok(Expr::Tuple(SeqExpr {
            elts,
            span: start.to(end),
        }))
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let Some(kind) = self.peek_kind() else {
                break;
            };

            if let Some(bp) = postfix_binding_power(&kind) {
                if bp < min_bp {
                    break;
                }
                lhs = self.parse_postfix(lhs)?;
                continue;
            }

            if is_comparison_start(&kind) {
                let (l_bp, r_bp) = COMPARISON_BP;
                if l_bp < min_bp {
                    break;
                }
                lhs = self.parse_comparison(lhs, r_bp)?;
                continue;
            }

            let Some(op) = binary_op(&kind) else {
                break;
            };
            let (l_bp, r_bp) = infix_binding_power(&op);
            if l_bp < min_bp {
                break;
            }
            self.bump();
            let rhs = self.parse_expr_bp(r_bp)?;
            let span = lhs.span().to(rhs.span());
            lhs = Expr::Binary(BinaryExpr {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
                span,
            });
        }

        Ok(lhs)
    }

    fn parse_comparison(&mut self, left: Expr, r_bp: u8) -> Result<Expr, ParseError> {
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(kind) = self.peek_kind() {
            if !is_comparison_start(&kind) {
                break;
            }
            ops.push(self.parse_cmp_op()?);
            comparators.push(self.parse_expr_bp(r_bp)?);
        }
        let end = comparators.last().map(Expr::span).unwrap_or(left.span());
        let span = left.span().to(end);
        Ok(Expr::Compare(CompareExpr {
            left: Box::new(left),
            ops,
            comparators,
            span,
        }))
    }

    fn parse_cmp_op(&mut self) -> Result<CmpOp, ParseError> {
        let op = match self.bump_kind()? {
            TokenKind::EqEq => CmpOp::Eq,
            TokenKind::NotEq => CmpOp::NotEq,
            TokenKind::Lt => CmpOp::Lt,
            TokenKind::Lte => CmpOp::LtE,
            TokenKind::Gt => CmpOp::Gt,
            TokenKind::Gte => CmpOp::GtE,
            TokenKind::In => CmpOp::In,
            TokenKind::Not => {
                self.expect(TokenKind::In)?;
                CmpOp::NotIn
            }
            TokenKind::Is => {
                if self.maybe_consume(TokenKind::Not).is_some() {
                    CmpOp::IsNot
                } else {
                    CmpOp::Is
                }
            }
            other => {
                return Err(self.error_current(format!("expected comparison, found {other:?}")))
            }
        };
        Ok(op)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let (op, bp) = match self.peek_kind() {
            Some(TokenKind::Minus) => (UnaryOp::Neg, UNARY_BP),
            Some(TokenKind::Plus) => (UnaryOp::Pos, UNARY_BP),
            Some(TokenKind::Tilde) => (UnaryOp::Invert, UNARY_BP),
            Some(TokenKind::Not) => (UnaryOp::Not, NOT_BP),
            _ => return self.parse_primary(),
        };
        let start = self.bump_span();
        let operand = self.parse_expr_bp(bp)?;
        let span = start.to(operand.span());
        Ok(Expr::Unary(UnaryExpr {
            op,
            operand: Box::new(operand),
            span,
        }))
    }

    fn parse_postfix(&mut self, lhs: Expr) -> Result<Expr, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Dot) => {
                self.bump();
                let attr = self.expect_ident()?;
                let span = lhs.span().to(attr.span);
                Ok(Expr::Attribute(AttributeExpr {
                    value: Box::new(lhs),
                    attr,
                    span,
                }))
            }
            Some(TokenKind::LParen) => self.finish_call(lhs),
            Some(TokenKind::LBracket) => {
                self.bump();
                let index = self.parse_expr_list()?;
                let end = self.expect(TokenKind::RBracket)?.span;
                let span = lhs.span().to(end);
                Ok(Expr::Subscript(SubscriptExpr {
                    value: Box::new(lhs),
                    index: Box::new(index),
                    span,
                }))
            }
            _ => Err(self.error_current("expected postfix operator".to_string())),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self
            .bump()
            .ok_or_else(|| self.error_current("unexpected end of input".to_string()))?;
        match token.kind {
            TokenKind::Ident => Ok(Expr::Name(to_ident(&token))),
            TokenKind::Int => {
                let value = parse_int(&token.text)
                    .ok_or_else(|| self.error_at(token.span, "invalid integer literal".to_string()))?;
                Ok(Expr::Number(NumberExpr {
                    value,
                    span: token.span,
                }))
            }
            TokenKind::Str => {
                let mut value = unescape_string(&token.text).map_err(|message| {
                    self.error_at(token.span, format!("invalid string literal: {message}"))
                })?;
                let mut span = token.span;
                while let Some(next) = self.maybe_consume(TokenKind::Str) {
                    let more = unescape_string(&next.text).map_err(|message| {
                        self.error_at(next.span, format!("invalid string literal: {message}"))
                    })?;
                    value.push_str(&more);
                    span = span.to(next.span);
                }
                Ok(Expr::Str(StrExpr { value, span }))
            }
            TokenKind::LParen => {
                if let Some(end) = self.maybe_consume(TokenKind::RParen) {
                    return Ok(Expr::Tuple(SeqExpr {
                        elts: Vec::new(),
                        span: token.span.to(end.span),
                    }));
                }
                let inner = self.parse_expr_list()?;
                let end = self.expect(TokenKind::RParen)?.span;
                Ok(match inner {
                    Expr::Tuple(seq) => Expr::Tuple(SeqExpr {
                        elts: seq.elts,
                        span: token.span.to(end),
                    }),
                    other => other,
                })
            }
            TokenKind::LBracket => {
                let elts = self.parse_comma_separated(TokenKind::RBracket)?;
                let end = self.expect(TokenKind::RBracket)?.span;
                Ok(Expr::List(SeqExpr {
                    elts,
                    span: token.span.to(end),
                }))
            }
            TokenKind::LBrace => {
                let mut entries = Vec::new();
                while self.peek_kind() != Some(TokenKind::RBrace) {
                    let key = self.parse_expr()?;
                    self.expect(TokenKind::Colon)?;
                    let value = self.parse_expr()?;
                    entries.push((key, value));
                    if self.maybe_consume(TokenKind::Comma).is_none() {
                        break;
                    }
                }
                let end = self.expect(TokenKind::RBrace)?.span;
                Ok(Expr::Dict(DictExpr {
                    entries,
                    span: token.span.to(end),
                }))
            }
            other => Err(self.error_at(token.span, format!("expected expression, found {other:?}"))),
        }
    }

    fn parse_comma_separated(&mut self, close: TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut elts = Vec::new();
        while self.peek_kind() != Some(close.clone()) {
            elts.push(self.parse_expr()?);
            if self.maybe_consume(TokenKind::Comma).is_none() {
                break;
            }
        }
        Ok(elts)
    }

    fn finish_call(&mut self, func: Expr) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        let mut keywords: Vec<Keyword> = Vec::new();
        while self.peek_kind() != Some(TokenKind::RParen) {
            let is_keyword = self.peek_kind() == Some(TokenKind::Ident)
                && self.peek_token(1).map(|t| &t.kind) == Some(&TokenKind::Eq);
            if is_keyword {
                let name = self.expect_ident()?;
                self.expect(TokenKind::Eq)?;
                let value = self.parse_expr()?;
                let span = name.span.to(value.span());
                keywords.push(Keyword { name, value, span });
            } else {
                if let Some(keyword) = keywords.last() {
                    return Err(self.error_at(
                        keyword.span,
                        "positional argument follows keyword argument".to_string(),
                    ));
                }
                args.push(self.parse_expr()?);
            }
            if self.maybe_consume(TokenKind::Comma).is_none() {
                break;
            }
        }
        let end = self.expect(TokenKind::RParen)?.span;
        let span = func.span().to(end);
        Ok(Expr::Call(CallExpr {
            func: Box::new(func),
            args,
            keywords,
            span,
        }))
    }

    fn parse_path(&mut self) -> Result<Path, ParseError> {
        let first = self.expect_ident()?;
        let mut span = first.span;
        let mut segments = vec![first];
        while self.maybe_consume(TokenKind::Dot).is_some() {
            let seg = self.expect_ident()?;
            span = span.to(seg.span);
            segments.push(seg);
        }
        Ok(Path { segments, span })
    }

    fn at_simple_stmt_end(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(TokenKind::Newline) | Some(TokenKind::Semi) | None
        )
    }

    fn at_expr_list_end(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(TokenKind::Newline)
                | Some(TokenKind::Semi)
                | Some(TokenKind::Eq)
                | Some(TokenKind::RParen)
                | None
        ) || self.peek_kind().and_then(|k| augmented_op(&k)).is_some()
    }

    fn expect_line_end(&mut self) -> Result<(), ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Newline) => {
                self.bump();
                Ok(())
            }
            None | Some(TokenKind::Dedent) => Ok(()),
            Some(other) => Err(self.error_current(format!("expected end of line, found {other:?}"))),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if let Some(token) = self.maybe_consume(kind.clone()) {
            return Ok(token);
        }
        match self.peek_kind() {
            Some(other) => Err(self.error_current(format!("expected {kind:?}, found {other:?}"))),
            None => Err(self.error_current("unexpected end of input".to_string())),
        }
    }

    fn expect_ident(&mut self) -> Result<Ident, ParseError> {
        if let Some(token) = self.maybe_consume(TokenKind::Ident) {
            return Ok(to_ident(&token));
        }
        match self.peek_kind() {
            Some(other) => Err(self.error_current(format!("expected identifier, found {other:?}"))),
            None => Err(self.error_current("unexpected end of input".to_string())),
        }
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn bump_span(&mut self) -> Span {
        self.bump().map(|t| t.span).unwrap_or(self.eof_span)
    }

    fn bump_kind(&mut self) -> Result<TokenKind, ParseError> {
        self.bump()
            .map(|t| t.kind)
            .ok_or_else(|| self.error_current("unexpected end of input".to_string()))
    }

    fn maybe_consume(&mut self, kind: TokenKind) -> Option<Token> {
        if self.peek_kind() == Some(kind) {
            self.bump()
        } else {
            None
        }
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.tokens.get(self.index).map(|t| t.kind.clone())
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.index)
            .map(|t| t.span)
            .unwrap_or(self.eof_span)
    }

    fn peek_token(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.index + offset)
    }

    fn error_current(&self, message: String) -> ParseError {
        ParseError::new(message, self.peek_span())
    }

    fn error_at(&self, span: Span, message: String) -> ParseError {
        ParseError::new(message, span)
    }
}

const NOT_BP: u8 = 5;
const COMPARISON_BP: (u8, u8) = (7, 8);
const UNARY_BP: u8 = 21;

fn infix_binding_power(op: &BinaryOp) -> (u8, u8) {
    match op {
        BinaryOp::Or => (1, 2),
        BinaryOp::And => (3, 4),
        BinaryOp::BitOr => (9, 10),
        BinaryOp::BitXor => (11, 12),
        BinaryOp::BitAnd => (13, 14),
        BinaryOp::Shl | BinaryOp::Shr => (15, 16),
        BinaryOp::Add | BinaryOp::Sub => (17, 18),
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod => (19, 20),
        // right associative, and binds tighter than a unary operator on its left
        BinaryOp::Pow => (24, 23),
    }
}

fn postfix_binding_power(kind: &TokenKind) -> Option<u8> {
    match kind {
        TokenKind::Dot | TokenKind::LParen | TokenKind::LBracket => Some(25),
        _ => None,
    }
}

fn is_comparison_start(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::EqEq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::Lte
            | TokenKind::Gt
            | TokenKind::Gte
            | TokenKind::In
            | TokenKind::Not
            | TokenKind::Is
    )
}

fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::SlashSlash => BinaryOp::FloorDiv,
        TokenKind::Percent => BinaryOp::Mod,
        TokenKind::StarStar => BinaryOp::Pow,
        TokenKind::Shl => BinaryOp::Shl,
        TokenKind::Shr => BinaryOp::Shr,
        TokenKind::Pipe => BinaryOp::BitOr,
        TokenKind::Amp => BinaryOp::BitAnd,
        TokenKind::Caret => BinaryOp::BitXor,
        TokenKind::And => BinaryOp::And,
        TokenKind::Or => BinaryOp::Or,
        _ => return None,
    };
    Some(op)
}

fn augmented_op(kind: &TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::PlusEq => BinaryOp::Add,
        TokenKind::MinusEq => BinaryOp::Sub,
        TokenKind::StarEq => BinaryOp::Mul,
        TokenKind::SlashEq => BinaryOp::Div,
        TokenKind::SlashSlashEq => BinaryOp::FloorDiv,
        TokenKind::PercentEq => BinaryOp::Mod,
        TokenKind::StarStarEq => BinaryOp::Pow,
        TokenKind::ShlEq => BinaryOp::Shl,
        TokenKind::ShrEq => BinaryOp::Shr,
        TokenKind::PipeEq => BinaryOp::BitOr,
        TokenKind::AmpEq => BinaryOp::BitAnd,
        TokenKind::CaretEq => BinaryOp::BitXor,
        _ => return None,
    };
    Some(op)
}

fn parse_int(text: &str) -> Option<i64> {
    let digits: String = text.chars().filter(|c| *c != '_').collect();
    let lower = digits.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()
    } else {
        lower.parse().ok()
    }
}

fn unescape_string(text: &str) -> Result<String, String> {
    let body = strip_quotes(text).ok_or_else(|| "missing quotes".to_string())?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let escaped = match chars.next() {
            Some('n') => '\n',
            Some('r') => '\r',
            Some('t') => '\t',
            Some('0') => '\0',
            Some('\\') => '\\',
            Some('"') => '"',
            Some('\'') => '\'',
            // line continuation inside a triple-quoted string
            Some('\n') => continue,
            Some(other) => return Err(format!("unsupported escape \\{other}")),
            None => return Err("unterminated escape".to_string()),
        };
        out.push(escaped);
    }
    Ok(out)
}

fn strip_quotes(text: &str) -> Option<&str> {
    ["\"\"\"", "'''", "\"", "'"]
        .into_iter()
        .find(|delim| text.len() >= 2 * delim.len() && text.starts_with(*delim) && text.ends_with(*delim))
        .map(|delim| &text[delim.len()..text.len() - delim.len()])
}
