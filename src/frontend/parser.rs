use crate::{
    error::{CompileError, CompileResult},
    frontend::{
        ast::{Node, NodeKind},
        lexer::{Keyword, Token, TokenKind},
        scope::ScopeStack,
    },
};

/// Recursive descent parser. Variable references are resolved to stack slots
/// while the tree is built, so the tree it returns needs no further analysis
/// before code generation.
#[derive(Debug)]
pub struct Parser<'tokens> {
    tokens: &'tokens [Token],
    position: usize,
    scopes: ScopeStack,
}

impl<'tokens> Parser<'tokens> {
    /// Parses a whole token stream into a declaration list. Returns `None` for
    /// a stream holding nothing but the end marker.
    pub fn parse_program(tokens: &'tokens [Token]) -> CompileResult<Option<Box<Node>>> {
        let mut parser = Self {
            tokens,
            position: 0,
            scopes: ScopeStack::new(),
        };

        let root = parser.parse_declaration_list()?;

        if !parser.is_at_end() {
            return Err(CompileError::syntax(
                "Unexpected tokens after program end",
                parser.current_line(),
            ));
        }

        Ok(root)
    }

    fn is_at_end(&self) -> bool {
        self.tokens
            .get(self.position)
            .is_none_or(|token| token.kind == TokenKind::Eof)
    }

    fn peek(&self) -> Option<&Token> {
        (!self.is_at_end()).then(|| &self.tokens[self.position])
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|token| token.kind)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    /// Line of the next token, or of the end marker once input is exhausted
    fn current_line(&self) -> usize {
        self.tokens
            .get(self.position)
            .or(self.tokens.last())
            .map_or(0, |token| token.line)
    }

    fn next_token(&mut self) -> CompileResult<Token> {
        let Some(token) = self.peek().cloned() else {
            return Err(CompileError::syntax(
                "Unexpected end of input",
                self.current_line(),
            ));
        };

        self.position += 1;

        Ok(token)
    }

    fn expect(&mut self, kind: TokenKind, expecting: &str) -> CompileResult<Token> {
        self.expect_matching(|found| found == kind, expecting)
    }

    fn expect_type_keyword(&mut self, expecting: &str) -> CompileResult<Token> {
        self.expect_matching(|found| found.is_type_keyword(), expecting)
    }

    fn expect_matching(
        &mut self,
        is_expected: impl Fn(TokenKind) -> bool,
        expecting: &str,
    ) -> CompileResult<Token> {
        let Some(token) = self.peek() else {
            return Err(CompileError::syntax(
                format!("Expected {expecting} but reached end of input"),
                self.current_line(),
            ));
        };

        if !is_expected(token.kind) {
            return Err(CompileError::syntax(
                format!("Expected {expecting} but found '{}'", token.lexeme),
                token.line,
            ));
        }

        self.next_token()
    }

    /// Links `items` into a chain of list cells, first item outermost
    fn chain(
        kind: NodeKind,
        text: &str,
        items: Vec<(usize, Option<Box<Node>>)>,
    ) -> Option<Box<Node>> {
        items.into_iter().rev().fold(None, |rest, (line, item)| {
            Some(
                Node::new(kind.clone(), text, line)
                    .with_children(item, rest)
                    .boxed(),
            )
        })
    }

    // declaration ( declaration )*
    fn parse_declaration_list(&mut self) -> CompileResult<Option<Box<Node>>> {
        let mut declarations = Vec::new();

        while !self.is_at_end() {
            let line = self.current_line();
            declarations.push((line, Some(self.parse_declaration()?)));
        }

        Ok(Self::chain(NodeKind::DeclarationList, "dec", declarations))
    }

    /// TYPE IDENTIFIER ( "(" params ")" BLOCK | ";" | "=" expression ";" )
    fn parse_declaration(&mut self) -> CompileResult<Box<Node>> {
        let keyword = self.expect_type_keyword("a type keyword")?;
        let identifier = self.expect(TokenKind::Identifier, "identifier after type keyword")?;

        let name = Node::new(
            NodeKind::Identifier { slot: None },
            &identifier.lexeme,
            identifier.line,
        )
        .boxed();

        match self.peek_kind() {
            Some(TokenKind::OpenParen) => self.parse_function_definition(keyword, name),
            Some(TokenKind::Semicolon) => {
                self.next_token()?;

                Ok(Node::from_token(&keyword)
                    .with_children(Some(name), None)
                    .boxed())
            }
            Some(TokenKind::Equals) => {
                self.next_token()?;

                let value = self.parse_expression()?;
                self.expect(TokenKind::Semicolon, "';' after variable declaration")?;

                Ok(Node::from_token(&keyword)
                    .with_children(Some(name), Some(value))
                    .boxed())
            }
            _ => Err(CompileError::syntax(
                format!(
                    "Expected '(', ';' or '=' after identifier '{}'",
                    identifier.lexeme
                ),
                identifier.line,
            )),
        }
    }

    fn parse_function_definition(
        &mut self,
        return_type: Token,
        name: Box<Node>,
    ) -> CompileResult<Box<Node>> {
        self.scopes.begin_function();

        self.expect(TokenKind::OpenParen, "'('")?;
        let parameters = self.parse_function_parameter_list()?;
        self.expect(TokenKind::CloseParen, "')' after parameters")?;

        let body = self.parse_block()?;
        let frame_slot_count = self.scopes.end_function();

        let label = format!("_{}", name.text);
        let signature = Node::from_token(&return_type)
            .with_children(Some(name), parameters)
            .boxed();

        Ok(Node::new(
            NodeKind::Function { frame_slot_count },
            label,
            return_type.line,
        )
        .with_children(Some(signature), body)
        .boxed())
    }

    // ( param ( "," param )* )?
    fn parse_function_parameter_list(&mut self) -> CompileResult<Option<Box<Node>>> {
        let mut parameters = Vec::new();

        // If the next token is not a closing paren, there MUST be at least
        // one parameter
        if !self.check(TokenKind::CloseParen) {
            // The first parameter sits just above the saved frame base and
            // the return address
            let mut position = 2;

            loop {
                let line = self.current_line();
                parameters.push((line, Some(self.parse_function_parameter(position)?)));

                if !self.check(TokenKind::Comma) {
                    break;
                }

                self.next_token()?;
                position += 1;
            }
        }

        Ok(Self::chain(NodeKind::ParameterList, ",", parameters))
    }

    // int argc
    fn parse_function_parameter(&mut self, position: usize) -> CompileResult<Box<Node>> {
        let ty = self.expect_type_keyword("type keyword in parameter")?;
        let name = self.expect(TokenKind::Identifier, "parameter name")?;

        let Some(slot) = self.scopes.declare_parameter(&name.lexeme, position) else {
            return Err(CompileError::DuplicateDeclaration {
                name: name.lexeme,
                line: name.line,
            });
        };

        let identifier = Node::new(NodeKind::Identifier { slot: Some(slot) }, &name.lexeme, name.line);

        Ok(Node::from_token(&ty)
            .with_children(Some(identifier.boxed()), None)
            .boxed())
    }

    // "{" ( statement )* "}"
    fn parse_block(&mut self) -> CompileResult<Option<Box<Node>>> {
        let open_brace = self.expect(TokenKind::OpenBrace, "'{'")?;

        self.scopes.push_scope();
        let statements = self.parse_statement_list()?;
        self.scopes.pop_scope();

        if !self.check(TokenKind::CloseBrace) {
            return Err(CompileError::syntax(
                format!("Missing '}}' for '{{' at line {}", open_brace.line),
                self.current_line(),
            ));
        }

        self.next_token()?;

        Ok(statements)
    }

    fn parse_statement_list(&mut self) -> CompileResult<Option<Box<Node>>> {
        let mut statements = Vec::new();

        while !self.is_at_end() && !self.check(TokenKind::CloseBrace) {
            let line = self.current_line();
            statements.push((line, self.parse_statement()?));
        }

        Ok(Self::chain(NodeKind::StatementList, "stmt", statements))
    }

    /// Returns `None` for an empty block statement
    fn parse_statement(&mut self) -> CompileResult<Option<Box<Node>>> {
        match self.peek_kind() {
            Some(TokenKind::Keyword(Keyword::Return)) => self.parse_return_statement().map(Some),
            Some(TokenKind::Keyword(Keyword::If)) => self.parse_if_statement().map(Some),
            Some(TokenKind::Keyword(Keyword::While)) => self.parse_while_statement().map(Some),
            Some(kind) if kind.is_type_keyword() => self.parse_local().map(Some),
            Some(TokenKind::OpenBrace) => self.parse_block(),
            _ => {
                let expression = self.parse_expression()?;
                self.expect(TokenKind::Semicolon, "';' after expression")?;

                Ok(Some(expression))
            }
        }
    }

    /// "return" expression ";"
    fn parse_return_statement(&mut self) -> CompileResult<Box<Node>> {
        let return_keyword = self.next_token()?;
        let expression = self.parse_expression()?;
        self.expect(TokenKind::Semicolon, "';' after return statement")?;

        Ok(Node::from_token(&return_keyword)
            .with_children(None, Some(expression))
            .boxed())
    }

    /// "if" "(" expression ")" BLOCK ( "else" BLOCK )?
    fn parse_if_statement(&mut self) -> CompileResult<Box<Node>> {
        let if_keyword = self.next_token()?;

        self.expect(TokenKind::OpenParen, "'(' after if")?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::CloseParen, "')' after if condition")?;

        let positive = self.parse_block()?;

        let negative = if self.check(TokenKind::Keyword(Keyword::Else)) {
            self.next_token()?;
            self.parse_block()?
        } else {
            None
        };

        Ok(Node::new(
            NodeKind::If { condition },
            &if_keyword.lexeme,
            if_keyword.line,
        )
        .with_children(positive, negative)
        .boxed())
    }

    /// "while" "(" expression ")" BLOCK
    fn parse_while_statement(&mut self) -> CompileResult<Box<Node>> {
        let while_keyword = self.next_token()?;

        self.expect(TokenKind::OpenParen, "'(' after while")?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::CloseParen, "')' after while condition")?;

        let body = self.parse_block()?;

        Ok(Node::from_token(&while_keyword)
            .with_children(Some(condition), body)
            .boxed())
    }

    /// TYPE IDENTIFIER ( "=" expression )? ";"
    fn parse_local(&mut self) -> CompileResult<Box<Node>> {
        let ty = self.next_token()?;
        let name = self.expect(TokenKind::Identifier, "identifier after type keyword")?;

        // Parse the initializer before binding so the local's own name is not
        // visible inside it
        let initializer = if self.check(TokenKind::Equals) {
            self.next_token()?;
            Some(self.parse_expression()?)
        } else {
            None
        };

        self.expect(TokenKind::Semicolon, "';' after variable declaration")?;

        let Some(slot) = self.scopes.declare_local(&name.lexeme) else {
            return Err(CompileError::DuplicateDeclaration {
                name: name.lexeme,
                line: name.line,
            });
        };

        let identifier = Node::new(NodeKind::Identifier { slot: Some(slot) }, &name.lexeme, name.line);

        Ok(Node::from_token(&ty)
            .with_children(Some(identifier.boxed()), initializer)
            .boxed())
    }

    /// expression     -> assignment
    /// assignment     -> logical_or ( "=" assignment )?
    /// logical_or     -> logical_and ( "||" logical_and )*
    /// logical_and    -> comparison ( "&&" comparison )*
    /// comparison     -> term ( ( "==" | "<" | "<=" | ">" | ">=" ) term )*
    /// term           -> factor ( ( "-" | "+" ) factor )*
    /// factor         -> unary ( ( "/" | "*" | "%" ) unary )*
    /// unary          -> ( "!" | "-" ) unary
    ///                   | primary
    /// primary        -> IDENTIFIER ( "(" ( expression ( "," expression )* )? ")" )?
    ///                   | NUMBER
    ///                   | "(" expression ")"
    fn parse_expression(&mut self) -> CompileResult<Box<Node>> {
        self.parse_assignment_expression()
    }

    fn parse_assignment_expression(&mut self) -> CompileResult<Box<Node>> {
        let target = self.parse_logical_or_expression()?;

        if !self.check(TokenKind::Equals) {
            return Ok(target);
        }

        let operator = self.next_token()?;
        let value = self.parse_assignment_expression()?;

        Ok(Node::from_token(&operator)
            .with_children(Some(target), Some(value))
            .boxed())
    }

    /// Parses a left associative chain of binary operators sharing one
    /// precedence level
    fn parse_binary_chain(
        &mut self,
        is_operator: impl Fn(TokenKind) -> bool,
        parse_operand: fn(&mut Self) -> CompileResult<Box<Node>>,
    ) -> CompileResult<Box<Node>> {
        let mut expression = parse_operand(self)?;

        while self.peek_kind().is_some_and(&is_operator) {
            let operator = self.next_token()?;
            let rhs = parse_operand(self)?;

            expression = Node::from_token(&operator)
                .with_children(Some(expression), Some(rhs))
                .boxed();
        }

        Ok(expression)
    }

    fn parse_logical_or_expression(&mut self) -> CompileResult<Box<Node>> {
        self.parse_binary_chain(
            |kind| kind == TokenKind::LogicalOr,
            Self::parse_logical_and_expression,
        )
    }

    fn parse_logical_and_expression(&mut self) -> CompileResult<Box<Node>> {
        self.parse_binary_chain(
            |kind| kind == TokenKind::LogicalAnd,
            Self::parse_comparison_expression,
        )
    }

    fn parse_comparison_expression(&mut self) -> CompileResult<Box<Node>> {
        self.parse_binary_chain(
            |kind| kind.is_comparison_operator(),
            Self::parse_term_expression,
        )
    }

    fn parse_term_expression(&mut self) -> CompileResult<Box<Node>> {
        self.parse_binary_chain(
            |kind| kind.is_term_operator(),
            Self::parse_factor_expression,
        )
    }

    fn parse_factor_expression(&mut self) -> CompileResult<Box<Node>> {
        self.parse_binary_chain(
            |kind| kind.is_factor_operator(),
            Self::parse_unary_expression,
        )
    }

    fn parse_unary_expression(&mut self) -> CompileResult<Box<Node>> {
        if !self.peek_kind().is_some_and(|kind| kind.is_unary_operator()) {
            return self.parse_primary_expression();
        }

        let operator = self.next_token()?;
        let operand = self.parse_unary_expression()?;

        Ok(Node::from_token(&operator)
            .with_children(None, Some(operand))
            .boxed())
    }

    fn parse_primary_expression(&mut self) -> CompileResult<Box<Node>> {
        let token = self.next_token()?;

        match token.kind {
            TokenKind::Identifier if self.check(TokenKind::OpenParen) => {
                self.parse_function_call(token)
            }
            TokenKind::Identifier => {
                let Some(slot) = self.scopes.get_binding(&token.lexeme) else {
                    return Err(CompileError::UndeclaredVariable {
                        name: token.lexeme,
                        line: token.line,
                    });
                };

                Ok(Node::new(NodeKind::Identifier { slot: Some(slot) }, token.lexeme, token.line).boxed())
            }
            TokenKind::IntegerLiteral => {
                Ok(Node::new(NodeKind::Literal, token.lexeme, token.line).boxed())
            }
            TokenKind::OpenParen => {
                let expression = self.parse_expression()?;
                self.expect(TokenKind::CloseParen, "')'")?;

                Ok(expression)
            }
            _ => Err(CompileError::syntax(
                format!("Unexpected token in expression: '{}'", token.lexeme),
                token.line,
            )),
        }
    }

    // name(arg, arg)
    fn parse_function_call(&mut self, name: Token) -> CompileResult<Box<Node>> {
        let mut arguments = Vec::new();

        self.expect(TokenKind::OpenParen, "'('")?;

        // If the next token is not a closing paren, there MUST be at least
        // one argument
        if !self.check(TokenKind::CloseParen) {
            loop {
                let line = self.current_line();
                arguments.push((line, Some(self.parse_expression()?)));

                if !self.check(TokenKind::Comma) {
                    break;
                }

                self.next_token()?;
            }
        }

        if !self.check(TokenKind::CloseParen) {
            return Err(CompileError::syntax(
                format!("Missing ')' for call to '{}'", name.lexeme),
                name.line,
            ));
        }

        self.next_token()?;

        Ok(Node::new(NodeKind::Call, name.lexeme, name.line)
            .with_children(Self::chain(NodeKind::ArgumentList, "arg", arguments), None)
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{SourceFile, ast::Slot, lexer::Lexer};

    fn parse_expression(source: &str, bindings: &[&str]) -> CompileResult<Box<Node>> {
        let tokens = Lexer::new(&SourceFile::from_memory(source)).tokenize()?;
        let mut parser = Parser {
            tokens: &tokens,
            position: 0,
            scopes: ScopeStack::new(),
        };

        parser.scopes.begin_function();
        parser.scopes.push_scope();
        for name in bindings {
            parser.scopes.declare_local(name);
        }

        parser.parse_expression()
    }

    #[test]
    fn precedence_shapes_the_tree() {
        let tree = parse_expression("1 + 2 * 3 < 4 && 5 || 6", &[]).unwrap();

        assert_eq!(tree.kind, NodeKind::Generic(TokenKind::LogicalOr));
        assert_eq!(tree.to_string(), "1 + 2 * 3 < 4 && 5 || 6");

        let and = tree.left.as_deref().unwrap();
        assert_eq!(and.kind, NodeKind::Generic(TokenKind::LogicalAnd));

        let less = and.left.as_deref().unwrap();
        assert_eq!(less.kind, NodeKind::Generic(TokenKind::LessThan));

        let plus = less.left.as_deref().unwrap();
        assert_eq!(plus.kind, NodeKind::Generic(TokenKind::Plus));
        assert_eq!(
            plus.right.as_deref().unwrap().kind,
            NodeKind::Generic(TokenKind::Asterisk)
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        let tree = parse_expression("7 - 2 - 1", &[]).unwrap();

        assert_eq!(tree.right.as_deref().unwrap().text, "1");
        assert_eq!(
            tree.left.as_deref().unwrap().kind,
            NodeKind::Generic(TokenKind::Minus)
        );
    }

    #[test]
    fn assignment_is_right_associative() {
        let tree = parse_expression("a = b = 3", &["a", "b"]).unwrap();

        assert_eq!(tree.kind, NodeKind::Generic(TokenKind::Equals));
        assert_eq!(tree.left.as_deref().unwrap().slot(), Some(Slot(1)));

        let inner = tree.right.as_deref().unwrap();
        assert_eq!(inner.kind, NodeKind::Generic(TokenKind::Equals));
        assert_eq!(inner.left.as_deref().unwrap().slot(), Some(Slot(2)));
    }

    #[test]
    fn unary_operators_nest_without_a_left_operand() {
        let tree = parse_expression("-!x", &["x"]).unwrap();

        assert_eq!(tree.kind, NodeKind::Generic(TokenKind::Minus));
        assert!(tree.left.is_none());

        let not = tree.right.as_deref().unwrap();
        assert_eq!(not.kind, NodeKind::Generic(TokenKind::Bang));
        assert_eq!(not.right.as_deref().unwrap().text, "x");
    }

    #[test]
    fn call_arguments_keep_source_order() {
        let tree = parse_expression("f(1, x, 3)", &["x"]).unwrap();

        assert_eq!(tree.kind, NodeKind::Call);
        assert_eq!(tree.text, "f");

        let arguments: Vec<_> = tree
            .left
            .as_deref()
            .unwrap()
            .list_items()
            .map(|item| item.unwrap().text.clone())
            .collect();

        assert_eq!(arguments, vec!["1", "x", "3"]);
    }

    #[test]
    fn unexpected_token_in_expression() {
        assert_eq!(
            parse_expression("1 + ;", &[]),
            Err(CompileError::syntax("Unexpected token in expression: ';'", 1))
        );
    }
}
