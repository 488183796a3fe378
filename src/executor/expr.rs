//! Postfix predicate expressions.
//!
//! An [`Expression`] is a token sequence in Reverse-Polish order, as an
//! infix parser would emit it:
//!
//! ```text
//! R.id = S.id AND S.name = 'x'   =>   R.id S.id = S.name 'x' = AND
//! ```

use std::fmt;

use super::error::ExecutorError;

/// Operators allowed in a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

impl Operator {
    /// Parses an operator symbol. Keywords are case-insensitive.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => Operator::Add,
            "-" => Operator::Sub,
            "*" => Operator::Mul,
            "/" => Operator::Div,
            "=" => Operator::Eq,
            ">" => Operator::Gt,
            "<" => Operator::Lt,
            _ if symbol.eq_ignore_ascii_case("AND") => Operator::And,
            _ if symbol.eq_ignore_ascii_case("OR") => Operator::Or,
            _ if symbol.eq_ignore_ascii_case("NOT") => Operator::Not,
            _ => return None,
        };
        Some(op)
    }

    /// Returns the operator's symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
        }
    }

    /// Returns the number of operands popped.
    pub fn arity(self) -> usize {
        match self {
            Operator::Not => 1,
            _ => 2,
        }
    }

    pub(crate) fn is_comparison(self) -> bool {
        matches!(self, Operator::Eq | Operator::Gt | Operator::Lt)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One postfix token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// Column reference, optionally qualified as `relation.column`.
    Column(String),
    /// Literal value, kept as text until compiled against a schema.
    Literal(String),
    Operator(Operator),
}

impl Token {
    pub fn column(name: impl Into<String>) -> Self {
        Token::Column(name.into())
    }

    pub fn literal(value: impl fmt::Display) -> Self {
        Token::Literal(value.to_string())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Column(name) => f.write_str(name),
            Token::Literal(text) if text.parse::<i64>().is_ok() => f.write_str(text),
            Token::Literal(text) => write!(f, "'{}'", text.replace('\'', "''")),
            Token::Operator(op) => write!(f, "{}", op),
        }
    }
}

/// A predicate in postfix order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Expression {
    tokens: Vec<Token>,
}

impl Expression {
    /// Creates an expression from postfix tokens.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    /// Classifies raw postfix words into tokens.
    ///
    /// Operator symbols become operators, quoted words (`'x'` or `"x"`) and
    /// integer words become literals, and everything else is a column name.
    pub fn from_postfix<I, W>(words: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: AsRef<str>,
    {
        let tokens = words
            .into_iter()
            .map(|word| classify(word.as_ref()))
            .collect();
        Self { tokens }
    }

    /// Splits `text` on whitespace and classifies the words.
    ///
    /// Single-quoted literals may contain spaces; `''` inside them is an
    /// escaped quote.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::MalformedExpression` on an unterminated quote.
    pub fn parse(text: &str) -> Result<Self, ExecutorError> {
        let mut tokens = Vec::new();
        let mut chars = text.chars().peekable();

        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                chars.next();
                continue;
            }
            if c == '\'' {
                chars.next();
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some('\'') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            literal.push('\'');
                        }
                        Some('\'') => break,
                        Some(ch) => literal.push(ch),
                        None => {
                            return Err(ExecutorError::MalformedExpression(format!(
                                "unterminated literal in \"{}\"",
                                text
                            )));
                        }
                    }
                }
                tokens.push(Token::Literal(literal));
                continue;
            }

            let mut word = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                word.push(ch);
                chars.next();
            }
            tokens.push(classify(&word));
        }

        Ok(Self { tokens })
    }

    /// Returns the tokens in postfix order.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Returns true if there are no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterates over referenced column names, in token order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Column(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Combines two predicates with `AND`.
    pub fn and(mut self, other: Expression) -> Expression {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        self.tokens.extend(other.tokens);
        self.tokens.push(Token::Operator(Operator::And));
        self
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

fn classify(word: &str) -> Token {
    if let Some(op) = Operator::from_symbol(word) {
        return Token::Operator(op);
    }
    for quote in ['\'', '"'] {
        if let Some(inner) = word
            .strip_prefix(quote)
            .and_then(|w| w.strip_suffix(quote))
        {
            return Token::Literal(inner.to_string());
        }
    }
    if word.parse::<i64>().is_ok() {
        return Token::Literal(word.to_string());
    }
    Token::Column(word.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_postfix_classifies_words() {
        let expr = Expression::from_postfix(["R.id", "5", "'x'", "=", "and", "NOT"]);
        assert_eq!(
            expr.tokens(),
            &[
                Token::column("R.id"),
                Token::literal(5),
                Token::literal("x"),
                Token::Operator(Operator::Eq),
                Token::Operator(Operator::And),
                Token::Operator(Operator::Not),
            ]
        );
    }

    #[test]
    fn test_parse_quoted_literal_with_spaces() {
        let expr = Expression::parse("name 'a b''c' =").unwrap();
        assert_eq!(expr.tokens()[1], Token::literal("a b'c"));
        assert_eq!(expr.to_string(), "name 'a b''c' =");
    }

    #[test]
    fn test_parse_unterminated_literal() {
        assert!(matches!(
            Expression::parse("name 'abc ="),
            Err(ExecutorError::MalformedExpression(_))
        ));
    }

    #[test]
    fn test_negative_numbers_are_literals() {
        let expr = Expression::parse("id -3 >").unwrap();
        assert_eq!(expr.tokens()[1], Token::literal(-3));
        assert_eq!(expr.tokens()[2], Token::Operator(Operator::Gt));
    }

    #[test]
    fn test_columns_and_conjunction() {
        let a = Expression::parse("R.id S.id =").unwrap();
        let b = Expression::parse("S.name 'x' =").unwrap();
        let both = a.and(b);
        assert_eq!(both.columns().collect::<Vec<_>>(), vec!["R.id", "S.id", "S.name"]);
        assert_eq!(both.to_string(), "R.id S.id = S.name 'x' = AND");
        assert_eq!(Expression::default().and(both.clone()), both);
    }

    #[test]
    fn test_operator_arity() {
        assert_eq!(Operator::Not.arity(), 1);
        assert_eq!(Operator::Sub.arity(), 2);
    }
}
