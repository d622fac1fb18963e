use crate::language::{
    ast::*,
    errors::{SyntaxError, SyntaxErrors},
    lexer::lex,
    span::Span,
    token::{Token, TokenKind},
};
use std::rc::Rc;

const MAX_ARGUMENTS: usize = 255;
/// Equality (1) and comparison (2) do not associate.
const NON_ASSOCIATIVE_PREC: u8 = 2;

pub fn parse_program(source: &str) -> Result<Vec<Stmt>, SyntaxErrors> {
    let tokens = match lex(source) {
        Ok(tokens) => tokens,
        Err(errors) => {
            let errs = errors
                .into_iter()
                .map(|err| SyntaxError::new(err.message, err.span).with_label(err.label))
                .collect();
            return Err(SyntaxErrors::new(errs));
        }
    };
    Parser::new(tokens).parse()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
    function_depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            function_depth: 0,
        }
    }

    pub fn parse(mut self) -> Result<Vec<Stmt>, SyntaxErrors> {
        let mut statements = Vec::new();

        while !self.is_eof() {
            match self.parse_declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.report(err);
                    self.synchronize();
                }
            }
        }

        tracing::debug!(
            statements = statements.len(),
            errors = self.errors.len(),
            "parsed program"
        );
        if self.errors.is_empty() {
            Ok(statements)
        } else {
            Err(SyntaxErrors::new(self.errors))
        }
    }

    fn parse_declaration(&mut self) -> Result<Stmt, SyntaxError> {
        if self.matches(TokenKind::Fun) {
            return self.parse_function().map(Stmt::Function);
        }
        if self.matches(TokenKind::Var) {
            return self.parse_var();
        }
        if self.check(TokenKind::Class) {
            return Err(self
                .error_here("Class declarations are not supported")
                .with_label("class declaration")
                .with_help("declare the behavior as plain functions instead"));
        }
        self.parse_statement()
    }

    fn parse_function(&mut self) -> Result<Rc<FunctionDecl>, SyntaxError> {
        let start = self.previous_span().start;
        let name = self.expect_identifier("Expected function name after 'fun'")?;
        self.expect(TokenKind::LParen)?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                if params.len() >= MAX_ARGUMENTS {
                    let err = self
                        .error_here("Can't have more than 255 parameters")
                        .with_label("parameter 256");
                    self.report(err);
                }
                params.push(self.expect_identifier("Expected parameter name")?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        self.function_depth += 1;
        let body = self.parse_block_body();
        self.function_depth -= 1;
        let body = body?;

        let end = self.previous_span().end;
        Ok(Rc::new(FunctionDecl {
            name,
            params,
            body,
            span: Span::new(start, end),
        }))
    }

    fn parse_var(&mut self) -> Result<Stmt, SyntaxError> {
        let name = self.expect_identifier("Expected variable name after 'var'")?;
        let initializer = if self.matches(TokenKind::Eq) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Semi)?;
        Ok(Stmt::Var { name, initializer })
    }

    fn parse_statement(&mut self) -> Result<Stmt, SyntaxError> {
        if self.matches(TokenKind::Print) {
            let expr = self.parse_expression()?;
            self.expect(TokenKind::Semi)?;
            return Ok(Stmt::Print(expr));
        }
        if self.matches(TokenKind::Return) {
            return self.parse_return();
        }
        if self.matches(TokenKind::If) {
            return self.parse_if();
        }
        if self.matches(TokenKind::While) {
            return self.parse_while();
        }
        if self.matches(TokenKind::For) {
            return self.parse_for();
        }
        if self.check(TokenKind::LBrace) {
            return self.parse_block_body().map(Stmt::Block);
        }
        self.parse_expression_statement()
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let expr = self.parse_expression()?;
        self.expect(TokenKind::Semi)?;
        Ok(Stmt::Expression(expr))
    }

    fn parse_block_body(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        self.expect(TokenKind::LBrace)?;
        let mut statements = Vec::new();

        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            match self.parse_declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.report(err);
                    self.synchronize();
                }
            }
        }

        self.expect(TokenKind::RBrace)?;
        Ok(statements)
    }

    fn parse_return(&mut self) -> Result<Stmt, SyntaxError> {
        let keyword = self.previous_span();
        if self.function_depth == 0 {
            self.report(
                SyntaxError::new("Can't return from top-level code", keyword)
                    .with_label("outside of any function"),
            );
        }
        let value = if self.check(TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let end = self.expect(TokenKind::Semi)?.span.end;
        Ok(Stmt::Return {
            value,
            span: Span::new(keyword.start, end),
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, SyntaxError> {
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;

        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.matches(TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, SyntaxError> {
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::While { condition, body })
    }

    /// `for` has no node of its own: it becomes
    /// `{ init; while (cond) { body; increment; } }`.
    fn parse_for(&mut self) -> Result<Stmt, SyntaxError> {
        let keyword = self.previous_span();
        self.expect(TokenKind::LParen)?;

        let initializer = if self.matches(TokenKind::Semi) {
            None
        } else if self.matches(TokenKind::Var) {
            Some(self.parse_var()?)
        } else {
            Some(self.parse_expression_statement()?)
        };

        let condition = if self.check(TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::Semi)?;

        let increment = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::RParen)?;

        let mut body = self.parse_statement()?;
        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }
        let condition =
            condition.unwrap_or_else(|| Expr::Literal(Literal::Bool(true), keyword));
        body = Stmt::While {
            condition,
            body: Box::new(body),
        };
        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }
        Ok(body)
    }

    fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, SyntaxError> {
        let expr = self.parse_logical(LogicalOp::Or)?;

        if self.matches(TokenKind::Eq) {
            let value = self.parse_assignment()?;
            return match expr {
                Expr::Variable(name) => {
                    let span = name.span.union(value.span());
                    Ok(Expr::Assign {
                        name,
                        value: Box::new(value),
                        span,
                    })
                }
                other => {
                    self.report(
                        SyntaxError::new("Invalid assignment target", other.span())
                            .with_label("only a variable can be assigned"),
                    );
                    Ok(other)
                }
            };
        }

        Ok(expr)
    }

    fn parse_logical(&mut self, op: LogicalOp) -> Result<Expr, SyntaxError> {
        let (token, mut left) = match op {
            LogicalOp::Or => (TokenKind::Or, self.parse_logical(LogicalOp::And)?),
            LogicalOp::And => (TokenKind::And, self.parse_binary(0)?),
        };

        while self.matches(token.clone()) {
            let right = match op {
                LogicalOp::Or => self.parse_logical(LogicalOp::And)?,
                LogicalOp::And => self.parse_binary(0)?,
            };
            let span = left.span().union(right.span());
            left = Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    /// Precedence climbing. Equality and comparison levels take at most one
    /// operator each, so `a < b < c` is rejected rather than comparing a
    /// bool with `c`.
    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_unary()?;
        let mut non_associative: Option<u8> = None;

        loop {
            let (op, prec) = match self.current_binary_op() {
                Some(info) => info,
                None => break,
            };
            if prec < min_prec {
                break;
            }
            if prec <= NON_ASSOCIATIVE_PREC {
                if non_associative == Some(prec) {
                    return Err(self
                        .error_here(&format!("`{}` cannot be chained", op.symbol()))
                        .with_label("second operator at this level")
                        .with_help("group one side in parentheses"));
                }
                non_associative = Some(prec);
            }
            self.advance();
            let right = self.parse_binary(prec + 1)?;
            let span = left.span().union(right.span());
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = if self.check(TokenKind::Minus) {
            UnaryOp::Neg
        } else if self.check(TokenKind::Bang) {
            UnaryOp::Not
        } else {
            return self.parse_call();
        };
        let start = self.advance().span.start;
        let expr = self.parse_unary()?;
        let span = Span::new(start, expr.span().end);
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
            span,
        })
    }

    fn parse_call(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(TokenKind::LParen) {
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        if args.len() >= MAX_ARGUMENTS {
                            let err = self
                                .error_here("Can't have more than 255 arguments")
                                .with_label("argument 256");
                            self.report(err);
                        }
                        args.push(self.parse_expression()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let end = self.expect(TokenKind::RParen)?.span.end;
                let span = Span::new(expr.span().start, end);
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    span,
                };
                continue;
            }
            if self.check(TokenKind::Dot) {
                return Err(self
                    .error_here("Property access is not supported")
                    .with_label("property access")
                    .with_help("only plain functions and variables are available"));
            }
            break;
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        match self.peek_kind() {
            Some(TokenKind::True) => {
                let span = self.advance().span;
                Ok(Expr::Literal(Literal::Bool(true), span))
            }
            Some(TokenKind::False) => {
                let span = self.advance().span;
                Ok(Expr::Literal(Literal::Bool(false), span))
            }
            Some(TokenKind::Nil) => {
                let span = self.advance().span;
                Ok(Expr::Literal(Literal::Nil, span))
            }
            Some(TokenKind::Number(value)) => {
                let span = self.advance().span;
                Ok(Expr::Literal(Literal::Number(value), span))
            }
            Some(TokenKind::String(value)) => {
                let span = self.advance().span;
                Ok(Expr::Literal(Literal::String(value), span))
            }
            Some(TokenKind::Identifier(name)) => {
                let span = self.advance().span;
                Ok(Expr::Variable(Identifier { name, span }))
            }
            Some(TokenKind::LParen) => {
                let start = self.advance().span.start;
                let inner = self.parse_expression()?;
                let end = self.expect(TokenKind::RParen)?.span.end;
                Ok(Expr::Grouping(Box::new(inner), Span::new(start, end)))
            }
            Some(TokenKind::This | TokenKind::Super) => Err(self
                .error_here("`this` and `super` are only meaningful inside classes")
                .with_label("class keyword")
                .with_help("class declarations are not supported")),
            _ => Err(self
                .error_here("Expected expression")
                .with_label("expected an expression")),
        }
    }

    fn current_binary_op(&self) -> Option<(BinaryOp, u8)> {
        match self.peek_kind() {
            Some(TokenKind::EqEq) => Some((BinaryOp::Eq, 1)),
            Some(TokenKind::BangEq) => Some((BinaryOp::NotEq, 1)),
            Some(TokenKind::Gt) => Some((BinaryOp::Gt, 2)),
            Some(TokenKind::GtEq) => Some((BinaryOp::GtEq, 2)),
            Some(TokenKind::Lt) => Some((BinaryOp::Lt, 2)),
            Some(TokenKind::LtEq) => Some((BinaryOp::LtEq, 2)),
            Some(TokenKind::Plus) => Some((BinaryOp::Add, 3)),
            Some(TokenKind::Minus) => Some((BinaryOp::Sub, 3)),
            Some(TokenKind::Star) => Some((BinaryOp::Mul, 4)),
            Some(TokenKind::Slash) => Some((BinaryOp::Div, 4)),
            _ => None,
        }
    }

    fn expect_identifier(&mut self, msg: &str) -> Result<Identifier, SyntaxError> {
        match self.peek_kind() {
            Some(TokenKind::Identifier(name)) => {
                let span = self.advance().span;
                Ok(Identifier { name, span })
            }
            _ => Err(self.error_here(msg).with_label("expected a name")),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token, SyntaxError> {
        if self.check(kind.clone()) {
            Ok(self.advance())
        } else {
            Err(SyntaxError::expected(
                &kind,
                self.peek_kind().as_ref(),
                self.current_span(),
            ))
        }
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        matches!(self.peek_kind(), Some(tk) if tk == kind)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind.clone())
    }

    fn advance(&mut self) -> &Token {
        let index = self.pos.min(self.tokens.len().saturating_sub(1));
        self.pos = (self.pos + 1).min(self.tokens.len());
        &self.tokens[index]
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Eof) | None)
    }

    fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|index| self.tokens.get(index))
            .map(|t| t.span)
            .unwrap_or_default()
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_default()
    }

    fn error_here(&self, message: &str) -> SyntaxError {
        SyntaxError::new(message.to_string(), self.current_span())
    }

    fn report(&mut self, err: SyntaxError) {
        self.errors.push(err);
    }

    fn synchronize(&mut self) {
        self.advance();
        while !self.is_eof() {
            if self.pos > 0 && self.tokens[self.pos - 1].kind == TokenKind::Semi {
                return;
            }
            match self.peek_kind() {
                Some(
                    TokenKind::Class
                    | TokenKind::Fun
                    | TokenKind::Var
                    | TokenKind::For
                    | TokenKind::If
                    | TokenKind::While
                    | TokenKind::Print
                    | TokenKind::Return
                    | TokenKind::RBrace,
                ) => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_ok(source: &str) -> Vec<Stmt> {
        match parse_program(source) {
            Ok(statements) => statements,
            Err(errors) => panic!("unexpected syntax errors: {:?}", errors.errors),
        }
    }

    fn parse_err(source: &str) -> Vec<String> {
        match parse_program(source) {
            Ok(statements) => panic!("expected syntax errors, parsed {statements:?}"),
            Err(errors) => errors.errors.into_iter().map(|err| err.message).collect(),
        }
    }

    #[test]
    fn factor_binds_tighter_than_term() {
        let statements = parse_ok("print 1 + 2 * 3;");
        let Stmt::Print(Expr::Binary { op, right, .. }) = &statements[0] else {
            panic!("expected print of binary expression, got {statements:?}");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            right.as_ref(),
            Expr::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn subtraction_is_left_associative() {
        let statements = parse_ok("1 - 2 - 3;");
        let Stmt::Expression(Expr::Binary { left, right, .. }) = &statements[0] else {
            panic!("expected binary expression statement");
        };
        assert!(matches!(left.as_ref(), Expr::Binary { op: BinaryOp::Sub, .. }));
        assert!(matches!(
            right.as_ref(),
            Expr::Literal(Literal::Number(n), _) if *n == 3.0
        ));
    }

    #[test]
    fn comparison_does_not_chain() {
        assert_eq!(parse_err("1 < 2 < 3;"), vec!["`<` cannot be chained"]);
        assert_eq!(parse_err("1 >= 2 > 3;"), vec!["`>` cannot be chained"]);
    }

    #[test]
    fn equality_does_not_chain() {
        assert_eq!(parse_err("print 1 == 1 == true;"), vec!["`==` cannot be chained"]);
        assert_eq!(parse_err("1 < 2 == 3 != 4;"), vec!["`!=` cannot be chained"]);
    }

    #[test]
    fn equality_of_two_comparisons_is_allowed() {
        let statements = parse_ok("1 < 2 == 3 >= 4;");
        let Stmt::Expression(Expr::Binary { op, left, right, .. }) = &statements[0] else {
            panic!("expected binary expression statement");
        };
        assert_eq!(*op, BinaryOp::Eq);
        assert!(matches!(left.as_ref(), Expr::Binary { op: BinaryOp::Lt, .. }));
        assert!(matches!(right.as_ref(), Expr::Binary { op: BinaryOp::GtEq, .. }));
    }

    #[test]
    fn grouped_comparison_can_be_compared_again() {
        parse_ok("(1 < 2) == true;");
        parse_ok("(1 == 1) == true;");
    }

    #[test]
    fn errors_carry_labels() {
        let errors = parse_program("print 1 print 2;").expect_err("missing semicolon");
        assert_eq!(errors.errors[0].label.as_deref(), Some("expected `;`"));
        let errors = parse_program("1 = 2;").expect_err("bad target");
        assert_eq!(
            errors.errors[0].label.as_deref(),
            Some("only a variable can be assigned")
        );
    }

    #[test]
    fn or_binds_looser_than_and() {
        let statements = parse_ok("a or b and c;");
        let Stmt::Expression(Expr::Logical { op, right, .. }) = &statements[0] else {
            panic!("expected logical expression statement");
        };
        assert_eq!(*op, LogicalOp::Or);
        assert!(matches!(
            right.as_ref(),
            Expr::Logical {
                op: LogicalOp::And,
                ..
            }
        ));
    }

    #[test]
    fn assignment_is_right_associative() {
        let statements = parse_ok("a = b = 1;");
        let Stmt::Expression(Expr::Assign { name, value, .. }) = &statements[0] else {
            panic!("expected assignment");
        };
        assert_eq!(name.name, "a");
        assert!(matches!(value.as_ref(), Expr::Assign { .. }));
    }

    #[test]
    fn for_loop_desugars_into_while() {
        let statements = parse_ok("for (var i = 0; i < 3; i = i + 1) print i;");
        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected desugared block, got {statements:?}");
        };
        assert!(matches!(&outer[0], Stmt::Var { name, .. } if name.name == "i"));
        let Stmt::While { body, .. } = &outer[1] else {
            panic!("expected while loop");
        };
        let Stmt::Block(inner) = body.as_ref() else {
            panic!("expected body block with increment");
        };
        assert!(matches!(inner[0], Stmt::Print(_)));
        assert!(matches!(inner[1], Stmt::Expression(Expr::Assign { .. })));
    }

    #[test]
    fn empty_for_clauses_loop_on_true() {
        let statements = parse_ok("fun f() { for (;;) return 1; }");
        let Stmt::Function(decl) = &statements[0] else {
            panic!("expected function");
        };
        assert!(matches!(
            &decl.body[0],
            Stmt::While {
                condition: Expr::Literal(Literal::Bool(true), _),
                ..
            }
        ));
    }

    #[test]
    fn function_declaration_keeps_params_and_body() {
        let statements = parse_ok("fun add(a, b) { return a + b; }");
        let Stmt::Function(decl) = &statements[0] else {
            panic!("expected function declaration");
        };
        assert_eq!(decl.name.name, "add");
        let params: Vec<_> = decl.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(params, vec!["a", "b"]);
        assert!(matches!(decl.body[0], Stmt::Return { value: Some(_), .. }));
    }

    #[test]
    fn call_chains_are_postfix() {
        let statements = parse_ok("make()(1, 2);");
        let Stmt::Expression(Expr::Call { callee, args, .. }) = &statements[0] else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(callee.as_ref(), Expr::Call { args, .. } if args.is_empty()));
    }

    #[test]
    fn rejects_invalid_assignment_target() {
        assert_eq!(parse_err("1 + 2 = 3;"), vec!["Invalid assignment target"]);
    }

    #[test]
    fn rejects_top_level_return() {
        assert_eq!(
            parse_err("return 1;"),
            vec!["Can't return from top-level code"]
        );
    }

    #[test]
    fn rejects_class_declarations() {
        let errors = parse_err("class Foo {}");
        assert_eq!(errors[0], "Class declarations are not supported");
    }

    #[test]
    fn rejects_property_access() {
        let errors = parse_err("print a.b;");
        assert_eq!(errors[0], "Property access is not supported");
    }

    #[test]
    fn collects_errors_from_several_statements() {
        let errors = parse_err("var = 1;\nprint ;\nprint 1;");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], "Expected variable name after 'var'");
        assert_eq!(errors[1], "Expected expression");
    }

    #[test]
    fn missing_semicolon_names_found_token() {
        assert_eq!(
            parse_err("print 1 print 2;"),
            vec!["Expected `;` but found `print`"]
        );
    }

    #[test]
    fn lex_errors_surface_as_syntax_errors() {
        assert_eq!(parse_err("print \"oops;"), vec!["Unterminated string"]);
    }
}
