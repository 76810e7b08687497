use crate::ast::*;
use crate::lexer::tokenize;
use crate::token::{Token, TokenKind};
use scout_common::models::{FilterOp, OrderBy, SortDirection};
use scout_error::{ErrorContext, Result, ScoutError};
use serde_json::Value;

/// Parse one statement from query text.
///
/// Statements are terminated by end-of-input; callers split multi-statement
/// input on `;` boundaries before parsing.
pub fn parse(input: &str) -> Result<Statement> {
    let tokens = tokenize(input)?;
    let mut parser = Parser::new(tokens);
    let statement = parser.parse_statement()?;
    let trailing = parser.peek().clone();
    if trailing.kind != TokenKind::Eof {
        return Err(parser.error_at(&trailing, "Unexpected token after end of statement"));
    }
    Ok(statement)
}

/// Recursive-descent parser with one-token lookahead.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        let first = self.peek().clone();
        match first.kind {
            TokenKind::Select => self.parse_select(),
            TokenKind::Trace => self.parse_trace(),
            TokenKind::Describe => self.parse_describe(),
            TokenKind::Show => self.parse_show(),
            TokenKind::Cache => self.parse_cache(),
            _ => Err(self.error_at(
                &first,
                "Expected SELECT, TRACE, DESCRIBE, SHOW, or CACHE",
            )),
        }
    }

    // --- SELECT ---

    fn parse_select(&mut self) -> Result<Statement> {
        self.consume(TokenKind::Select, "Expected SELECT")?;

        let mut columns = vec![self.parse_projection()?];
        while self.match_token(TokenKind::Comma) {
            columns.push(self.parse_projection()?);
        }

        self.consume(TokenKind::From, "Expected FROM after projection list")?;
        let from = self.identifier("Expected table name after FROM")?;

        let mut joins = Vec::new();
        while let Some(join) = self.parse_join()? {
            joins.push(join);
        }

        let where_clause = if self.match_token(TokenKind::Where) {
            Some(self.parse_predicate()?)
        } else {
            None
        };

        let group_by = if self.match_token(TokenKind::Group) {
            self.consume(TokenKind::By, "Expected BY after GROUP")?;
            let mut fields = vec![self.qualified_name()?];
            while self.match_token(TokenKind::Comma) {
                fields.push(self.qualified_name()?);
            }
            Some(fields)
        } else {
            None
        };

        let having = if self.match_token(TokenKind::Having) {
            Some(self.parse_predicate()?)
        } else {
            None
        };

        let order_by = if self.match_token(TokenKind::Order) {
            self.consume(TokenKind::By, "Expected BY after ORDER")?;
            let mut keys = vec![self.parse_order_key()?];
            while self.match_token(TokenKind::Comma) {
                keys.push(self.parse_order_key()?);
            }
            Some(keys)
        } else {
            None
        };

        let limit = if self.match_token(TokenKind::Limit) {
            Some(self.non_negative_integer("LIMIT")?)
        } else {
            None
        };

        let offset = if self.match_token(TokenKind::Offset) {
            Some(self.non_negative_integer("OFFSET")?)
        } else {
            None
        };

        Ok(Statement::Select(SelectStatement {
            columns,
            from,
            joins,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
        }))
    }

    fn parse_projection(&mut self) -> Result<Projection> {
        if self.match_token(TokenKind::Star) {
            return Ok(Projection {
                name: "*".to_string(),
                alias: None,
                aggregate: None,
            });
        }

        // Aggregate call only when the keyword is followed by '('
        if self.peek().kind.is_aggregate() && self.peek_next().kind == TokenKind::LParen {
            let aggregate = match self.advance().kind {
                TokenKind::Count => Aggregate::Count,
                TokenKind::Sum => Aggregate::Sum,
                TokenKind::Avg => Aggregate::Avg,
                TokenKind::Min => Aggregate::Min,
                TokenKind::Max => Aggregate::Max,
                _ => unreachable!("checked is_aggregate above"),
            };
            self.consume(TokenKind::LParen, "Expected '(' after aggregate function")?;
            let name = if self.match_token(TokenKind::Star) {
                "*".to_string()
            } else {
                self.identifier_like("Expected column name inside aggregate")?
            };
            self.consume(TokenKind::RParen, "Expected ')' after aggregate argument")?;
            let alias = self.parse_alias()?;
            return Ok(Projection {
                name,
                alias,
                aggregate: Some(aggregate),
            });
        }

        let name = self.qualified_name()?;
        let alias = self.parse_alias()?;
        Ok(Projection {
            name,
            alias,
            aggregate: None,
        })
    }

    fn parse_alias(&mut self) -> Result<Option<String>> {
        if self.match_token(TokenKind::As) {
            Ok(Some(self.identifier_like("Expected alias name after AS")?))
        } else {
            Ok(None)
        }
    }

    fn parse_join(&mut self) -> Result<Option<Join>> {
        let kind = if self.match_token(TokenKind::Inner) {
            self.consume(TokenKind::Join, "Expected JOIN after INNER")?;
            JoinKind::Inner
        } else if self.match_token(TokenKind::Left) {
            self.match_token(TokenKind::Outer);
            self.consume(TokenKind::Join, "Expected JOIN after LEFT")?;
            JoinKind::Left
        } else if self.match_token(TokenKind::Right) {
            self.match_token(TokenKind::Outer);
            self.consume(TokenKind::Join, "Expected JOIN after RIGHT")?;
            JoinKind::Right
        } else if self.match_token(TokenKind::Join) {
            JoinKind::Inner
        } else {
            return Ok(None);
        };

        let table = self.identifier("Expected table name after JOIN")?;
        self.consume(TokenKind::On, "Expected ON after join table")?;
        let left_field = self.qualified_name()?;
        let op = self.comparison_op()?;
        let right_field = self.qualified_name()?;

        Ok(Some(Join {
            kind,
            table,
            on: JoinCondition {
                left_field,
                op,
                right_field,
            },
        }))
    }

    /// Conditions joined by one combinator; when AND and OR both appear,
    /// the last one seen wins.
    fn parse_predicate(&mut self) -> Result<Predicate> {
        let mut conditions = vec![self.parse_condition()?];
        let mut combinator = Combinator::And;
        loop {
            if self.match_token(TokenKind::And) {
                combinator = Combinator::And;
            } else if self.match_token(TokenKind::Or) {
                combinator = Combinator::Or;
            } else {
                break;
            }
            conditions.push(self.parse_condition()?);
        }
        Ok(Predicate {
            conditions,
            combinator,
        })
    }

    fn parse_condition(&mut self) -> Result<Condition> {
        let field = self.qualified_name()?;
        let next = self.peek().clone();

        if next.kind.is_comparison() {
            let op = self.comparison_op()?;
            let value = self.parse_literal()?;
            return Ok(Condition {
                field,
                op,
                value,
                second_value: None,
            });
        }

        match next.kind {
            TokenKind::Like => {
                self.advance();
                let value = self.parse_literal()?;
                Ok(Condition {
                    field,
                    op: FilterOp::Like,
                    value,
                    second_value: None,
                })
            }
            TokenKind::Between => {
                self.advance();
                let low = self.parse_literal()?;
                self.consume(TokenKind::And, "Expected AND between BETWEEN bounds")?;
                let high = self.parse_literal()?;
                Ok(Condition {
                    field,
                    op: FilterOp::Between,
                    value: low,
                    second_value: Some(high),
                })
            }
            TokenKind::In => {
                self.advance();
                self.consume(TokenKind::LParen, "Expected '(' after IN")?;
                let mut values = vec![self.parse_literal()?];
                while self.match_token(TokenKind::Comma) {
                    values.push(self.parse_literal()?);
                }
                self.consume(TokenKind::RParen, "Expected ')' after IN list")?;
                Ok(Condition {
                    field,
                    op: FilterOp::In,
                    value: Value::Array(values),
                    second_value: None,
                })
            }
            _ => Err(self.error_at(&next, "Expected a comparison operator")),
        }
    }

    fn parse_order_key(&mut self) -> Result<OrderBy> {
        let field = self.qualified_name()?;
        let direction = if self.match_token(TokenKind::Desc) {
            SortDirection::Desc
        } else {
            self.match_token(TokenKind::Asc);
            SortDirection::Asc
        };
        Ok(OrderBy { field, direction })
    }

    // --- TRACE ---

    fn parse_trace(&mut self) -> Result<Statement> {
        self.consume(TokenKind::Trace, "Expected TRACE")?;
        let identifier = self.identifier_like("Expected identifier after TRACE")?;
        self.consume(TokenKind::Eq, "Expected '=' after TRACE identifier")?;
        let value = self.parse_literal()?;

        let mut through = Vec::new();
        if self.match_token(TokenKind::Through) {
            through.push(self.identifier("Expected source name after THROUGH")?);
            while self.match_token(TokenKind::Comma) {
                through.push(self.identifier("Expected source name after ','")?);
            }
        }

        Ok(Statement::Trace(TraceStatement {
            identifier,
            value,
            through,
        }))
    }

    // --- DESCRIBE ---

    fn parse_describe(&mut self) -> Result<Statement> {
        self.consume(TokenKind::Describe, "Expected DESCRIBE")?;
        let target = self.identifier("Expected table name after DESCRIBE")?;
        Ok(Statement::Describe(DescribeStatement { target }))
    }

    // --- SHOW ---

    fn parse_show(&mut self) -> Result<Statement> {
        self.consume(TokenKind::Show, "Expected SHOW")?;
        let next = self.advance();
        let what = match next.kind {
            TokenKind::Tables => ShowTarget::Tables,
            TokenKind::Plugins => ShowTarget::Plugins,
            TokenKind::Sources => ShowTarget::Sources,
            // SHOW CACHE is a cache-control command, not a catalogue listing
            TokenKind::Cache => {
                return Ok(Statement::Cache(CacheStatement {
                    action: CacheAction::Show,
                    table: None,
                    ttl_ms: None,
                }))
            }
            TokenKind::Identifier => {
                return Err(ScoutError::execution(format!(
                    "Unsupported SHOW target '{}'",
                    next.text
                ))
                .with_hint("Supported: SHOW TABLES, SHOW PLUGINS, SHOW SOURCES, SHOW CACHE"))
            }
            _ => return Err(self.error_at(&next, "Expected a SHOW target")),
        };
        Ok(Statement::Show(ShowStatement { what }))
    }

    // --- CACHE ---

    fn parse_cache(&mut self) -> Result<Statement> {
        self.consume(TokenKind::Cache, "Expected CACHE")?;
        let next = self.advance();
        match next.kind {
            TokenKind::Show => Ok(Statement::Cache(CacheStatement {
                action: CacheAction::Show,
                table: None,
                ttl_ms: None,
            })),
            TokenKind::Clear => {
                let table = if self.peek().kind == TokenKind::Identifier {
                    Some(self.identifier("Expected table name")?)
                } else {
                    None
                };
                Ok(Statement::Cache(CacheStatement {
                    action: CacheAction::Clear,
                    table,
                    ttl_ms: None,
                }))
            }
            TokenKind::Set => {
                self.consume(TokenKind::Ttl, "Expected TTL after CACHE SET")?;
                let table = if self.peek().kind == TokenKind::Identifier {
                    Some(self.identifier("Expected table name")?)
                } else {
                    None
                };
                let ttl_ms = self.non_negative_integer("TTL")? as u64;
                Ok(Statement::Cache(CacheStatement {
                    action: CacheAction::SetTtl,
                    table,
                    ttl_ms: Some(ttl_ms),
                }))
            }
            _ => Err(self.error_at(&next, "Expected SHOW, CLEAR, or SET after CACHE")),
        }
    }

    // --- literals and names ---

    fn parse_literal(&mut self) -> Result<Value> {
        let token = self.advance();
        match token.kind {
            TokenKind::StringLiteral => Ok(Value::String(token.text)),
            TokenKind::NumberLiteral => {
                if token.text.contains('.') {
                    let n: f64 = token
                        .text
                        .parse()
                        .map_err(|_| self.error_at(&token, "Invalid numeric literal"))?;
                    Ok(Value::from(n))
                } else {
                    let n: i64 = token
                        .text
                        .parse()
                        .map_err(|_| self.error_at(&token, "Invalid numeric literal"))?;
                    Ok(Value::from(n))
                }
            }
            TokenKind::True => Ok(Value::Bool(true)),
            TokenKind::False => Ok(Value::Bool(false)),
            _ => Err(self.error_at(&token, "Expected a literal value")),
        }
    }

    /// A bare or dotted name (`column` or `table.column`). Aggregate
    /// keywords are accepted as name parts so HAVING can reference
    /// aggregate aliases.
    fn qualified_name(&mut self) -> Result<String> {
        let first = self.identifier_like("Expected a field name")?;
        if self.match_token(TokenKind::Dot) {
            let second = self.identifier_like("Expected a name after '.'")?;
            Ok(format!("{}.{}", first, second))
        } else {
            Ok(first)
        }
    }

    /// A plain identifier token.
    fn identifier(&mut self, msg: &str) -> Result<String> {
        let token = self.advance();
        if token.kind == TokenKind::Identifier {
            Ok(token.text)
        } else {
            Err(self.error_at(&token, msg))
        }
    }

    /// An identifier, or an aggregate keyword used as a name. Keyword text
    /// is normalised to lower case so `AS count` and `HAVING count > 1`
    /// agree on the emitted key.
    fn identifier_like(&mut self, msg: &str) -> Result<String> {
        let token = self.advance();
        if token.kind == TokenKind::Identifier {
            Ok(token.text)
        } else if token.kind.is_aggregate() {
            Ok(token.text.to_ascii_lowercase())
        } else {
            Err(self.error_at(&token, msg))
        }
    }

    fn comparison_op(&mut self) -> Result<FilterOp> {
        let token = self.advance();
        let op = match token.kind {
            TokenKind::Eq => FilterOp::Eq,
            TokenKind::NotEq => FilterOp::NotEq,
            TokenKind::Gt => FilterOp::Gt,
            TokenKind::Lt => FilterOp::Lt,
            TokenKind::GtEq => FilterOp::Gte,
            TokenKind::LtEq => FilterOp::Lte,
            _ => return Err(self.error_at(&token, "Expected a comparison operator")),
        };
        Ok(op)
    }

    fn non_negative_integer(&mut self, clause: &str) -> Result<usize> {
        let token = self.advance();
        if token.kind != TokenKind::NumberLiteral || token.text.contains('.') {
            return Err(self.error_at(
                &token,
                &format!("{} requires a non-negative integer", clause),
            ));
        }
        token
            .text
            .parse()
            .map_err(|_| self.error_at(&token, &format!("{} value out of range", clause)))
    }

    // --- token stream helpers ---

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_next(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    /// Consume the next token if it matches; report whether it did.
    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Require the next token to be of `kind` or fail with `msg`.
    fn consume(&mut self, kind: TokenKind, msg: &str) -> Result<Token> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            let token = self.peek().clone();
            Err(self.error_at(&token, msg))
        }
    }

    fn error_at(&self, token: &Token, msg: &str) -> ScoutError {
        let shown = if token.kind == TokenKind::Eof {
            "end of input".to_string()
        } else {
            format!("'{}'", token.text)
        };
        ScoutError::parse(format!(
            "{} (found {} at line {}, column {})",
            msg, shown, token.line, token.column
        ))
        .with_context(ErrorContext::Syntax {
            line: token.line,
            column: token.column,
            token: Some(token.text.clone()),
        })
    }
}
