//! Compiled predicates.
//!
//! [`ConditionEvaluator::compile`] resolves a postfix [`Expression`] against
//! a schema once; [`ConditionEvaluator::evaluate`] then runs the program per
//! tuple on a small operand stack.

use std::borrow::Cow;
use std::cmp::Ordering;

use super::error::ExecutorError;
use super::expr::{Expression, Operator, Token};
use crate::catalog::Schema;
use crate::datum::{Field, FieldType};
use crate::tuple::{Tuple, TupleError};

/// One compiled program element.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Factor {
    /// Field of the evaluated tuple.
    Variable { offset: usize, ty: FieldType },
    /// Literal; starts as text and may be rebound to an integer at compile
    /// time.
    Constant(Field),
    Operator(Operator),
}

/// Operand kind tracked by the compile-time dry pass.
#[derive(Debug, Clone, Copy)]
struct Operand {
    /// Index of the constant factor that produced it, if any.
    constant: Option<usize>,
    ty: FieldType,
}

/// A predicate compiled against one schema.
///
/// Evaluation is deterministic and side-effect free; one evaluator may be
/// shared by every tuple of a scan.
#[derive(Debug, Clone)]
pub struct ConditionEvaluator {
    factors: Vec<Factor>,
    arity: usize,
}

impl ConditionEvaluator {
    /// Compiles `expression` against `schema`.
    ///
    /// Columns resolve to tuple offsets. A textual constant combined with an
    /// integer operand is parsed to an integer here, so evaluation never
    /// parses strings. Arithmetic and logical operators coerce all their
    /// constant operands; a comparison of two constants coerces both only if
    /// both parse as integers.
    ///
    /// # Errors
    ///
    /// - `ExecutorError::Schema` for unknown or ambiguous columns
    /// - `ExecutorError::TypeMismatch` for operands that can never combine,
    ///   such as an INTEGER column compared with a STR20 column
    /// - `ExecutorError::MalformedExpression` if operators lack operands or
    ///   more than one value is left over
    pub fn compile(expression: &Expression, schema: &Schema) -> Result<Self, ExecutorError> {
        let mut factors = Vec::with_capacity(expression.tokens().len());
        for token in expression.tokens() {
            let factor = match token {
                Token::Column(name) => {
                    let offset = schema.offset_of(name)?;
                    let ty = schema.columns()[offset].ty;
                    Factor::Variable { offset, ty }
                }
                Token::Literal(text) => Factor::Constant(Field::Text(text.clone())),
                Token::Operator(op) => Factor::Operator(*op),
            };
            factors.push(factor);
        }

        coerce(&mut factors, expression)?;

        Ok(Self {
            factors,
            arity: schema.len(),
        })
    }

    /// Evaluates the predicate against `tuple`.
    ///
    /// The final value is an integer; nonzero means true.
    ///
    /// # Errors
    ///
    /// - `ExecutorError::Tuple` if the tuple's arity differs from the
    ///   compiled schema
    /// - `ExecutorError::TypeMismatch` when an INTEGER meets a STR20
    /// - `ExecutorError::DivisionByZero` / `ExecutorError::IntegerOverflow`
    pub fn evaluate(&self, tuple: &Tuple) -> Result<bool, ExecutorError> {
        if tuple.len() != self.arity {
            return Err(TupleError::ArityMismatch {
                expected: self.arity,
                found: tuple.len(),
            }
            .into());
        }

        let mut stack: Vec<Cow<'_, Field>> = Vec::with_capacity(self.factors.len());
        for factor in &self.factors {
            match factor {
                Factor::Variable { offset, .. } => {
                    stack.push(Cow::Borrowed(&tuple.fields()[*offset]));
                }
                Factor::Constant(field) => stack.push(Cow::Borrowed(field)),
                Factor::Operator(Operator::Not) => {
                    let value = as_int(pop(&mut stack)?.as_ref())?;
                    stack.push(Cow::Owned(Field::Int(i64::from(value == 0))));
                }
                Factor::Operator(op) => {
                    // The second-popped operand is the left-hand side.
                    let right = pop(&mut stack)?;
                    let left = pop(&mut stack)?;
                    let result = apply(*op, &left, &right)?;
                    stack.push(Cow::Owned(Field::Int(result)));
                }
            }
        }

        let result = pop(&mut stack)?;
        Ok(as_int(&result)? != 0)
    }
}

/// Evaluates an optional predicate; a missing predicate accepts every tuple.
pub(crate) fn accepts(
    predicate: Option<&ConditionEvaluator>,
    tuple: &Tuple,
) -> Result<bool, ExecutorError> {
    match predicate {
        Some(predicate) => predicate.evaluate(tuple),
        None => Ok(true),
    }
}

/// Compiles an optional predicate against `schema`.
pub(crate) fn compile_predicate(
    predicate: Option<&Expression>,
    schema: &Schema,
) -> Result<Option<ConditionEvaluator>, ExecutorError> {
    predicate
        .map(|expr| ConditionEvaluator::compile(expr, schema))
        .transpose()
}

/// Compile-time dry pass: checks operand counts and rebinds textual constants
/// that meet integers.
fn coerce(factors: &mut [Factor], expression: &Expression) -> Result<(), ExecutorError> {
    let malformed = |reason: &str| {
        ExecutorError::MalformedExpression(format!("{} in \"{}\"", reason, expression))
    };

    let mut stack: Vec<Operand> = Vec::new();
    for index in 0..factors.len() {
        let op = match &factors[index] {
            Factor::Variable { ty, .. } => {
                stack.push(Operand {
                    constant: None,
                    ty: *ty,
                });
                continue;
            }
            Factor::Constant(field) => {
                stack.push(Operand {
                    constant: Some(index),
                    ty: field.field_type(),
                });
                continue;
            }
            Factor::Operator(op) => *op,
        };

        if stack.len() < op.arity() {
            return Err(malformed(format!("missing operand for {}", op).as_str()));
        }

        if op == Operator::Not {
            let operand = stack.pop().ok_or_else(|| malformed("missing operand"))?;
            require_int(factors, operand)?;
        } else {
            let right = stack.pop().ok_or_else(|| malformed("missing operand"))?;
            let left = stack.pop().ok_or_else(|| malformed("missing operand"))?;

            if op.is_comparison() {
                match (left.ty, right.ty) {
                    (FieldType::Integer, FieldType::Str20) => require_int(factors, right)?,
                    (FieldType::Str20, FieldType::Integer) => require_int(factors, left)?,
                    (FieldType::Str20, FieldType::Str20) => {
                        if let (Some(l), Some(r)) = (left.constant, right.constant)
                            && parses_as_int(&factors[l])
                            && parses_as_int(&factors[r])
                        {
                            require_int(factors, left)?;
                            require_int(factors, right)?;
                        }
                    }
                    (FieldType::Integer, FieldType::Integer) => {}
                }
            } else {
                // Arithmetic and logical operators only take integers.
                require_int(factors, left)?;
                require_int(factors, right)?;
            }
        }

        stack.push(Operand {
            constant: None,
            ty: FieldType::Integer,
        });
    }

    match stack.as_slice() {
        [] => Err(malformed("empty expression")),
        [result] => require_int(factors, *result),
        _ => Err(malformed(format!("{} values left over", stack.len()).as_str())),
    }
}

/// Ensures an operand is an integer, parsing a textual constant in place.
fn require_int(factors: &mut [Factor], operand: Operand) -> Result<(), ExecutorError> {
    if operand.ty == FieldType::Integer {
        return Ok(());
    }
    let mismatch = ExecutorError::TypeMismatch {
        expected: FieldType::Integer,
        found: FieldType::Str20,
    };
    let Some(index) = operand.constant else {
        return Err(mismatch);
    };
    let parsed = match &factors[index] {
        Factor::Constant(Field::Text(text)) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) => {
            factors[index] = Factor::Constant(Field::Int(n));
            Ok(())
        }
        None => Err(mismatch),
    }
}

fn parses_as_int(factor: &Factor) -> bool {
    matches!(factor, Factor::Constant(Field::Text(text)) if text.trim().parse::<i64>().is_ok())
}

fn pop<'a>(stack: &mut Vec<Cow<'a, Field>>) -> Result<Cow<'a, Field>, ExecutorError> {
    stack
        .pop()
        .ok_or_else(|| ExecutorError::MalformedExpression("operand stack underflow".to_string()))
}

fn as_int(field: &Field) -> Result<i64, ExecutorError> {
    field.as_int().ok_or(ExecutorError::TypeMismatch {
        expected: FieldType::Integer,
        found: field.field_type(),
    })
}

fn apply(op: Operator, left: &Field, right: &Field) -> Result<i64, ExecutorError> {
    if op.is_comparison() {
        let ordering = left
            .compare(right)
            .ok_or(ExecutorError::TypeMismatch {
                expected: left.field_type(),
                found: right.field_type(),
            })?;
        let holds = match op {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Gt => ordering == Ordering::Greater,
            _ => ordering == Ordering::Less,
        };
        return Ok(i64::from(holds));
    }

    let (a, b) = (as_int(left)?, as_int(right)?);
    let value = match op {
        Operator::Add => a.checked_add(b).ok_or(ExecutorError::IntegerOverflow)?,
        Operator::Sub => a.checked_sub(b).ok_or(ExecutorError::IntegerOverflow)?,
        Operator::Mul => a.checked_mul(b).ok_or(ExecutorError::IntegerOverflow)?,
        Operator::Div => {
            if b == 0 {
                return Err(ExecutorError::DivisionByZero);
            }
            a.checked_div(b).ok_or(ExecutorError::IntegerOverflow)?
        }
        Operator::And => i64::from(a != 0 && b != 0),
        Operator::Or => i64::from(a != 0 || b != 0),
        Operator::Eq | Operator::Gt | Operator::Lt | Operator::Not => {
            return Err(ExecutorError::Unsupported(format!(
                "operator {} on integer pair",
                op
            )));
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::from_pairs([
            ("R.id", FieldType::Integer),
            ("R.name", FieldType::Str20),
            ("S.id", FieldType::Integer),
        ])
        .unwrap()
    }

    fn row(rid: i64, name: &str, sid: i64) -> Tuple {
        Tuple::from_fields(vec![Field::Int(rid), Field::from(name), Field::Int(sid)])
    }

    fn eval(text: &str, tuple: &Tuple) -> Result<bool, ExecutorError> {
        let expr = Expression::parse(text).unwrap();
        ConditionEvaluator::compile(&expr, &schema())?.evaluate(tuple)
    }

    #[test]
    fn test_join_equality() {
        assert!(eval("R.id S.id =", &row(2, "a", 2)).unwrap());
        assert!(!eval("R.id S.id =", &row(1, "a", 2)).unwrap());
    }

    #[test]
    fn test_unqualified_column_resolves() {
        assert!(eval("name 'a' =", &row(1, "a", 0)).unwrap());
    }

    #[test]
    fn test_constant_coerced_to_integer() {
        let expr = Expression::parse("R.id 10 <").unwrap();
        let evaluator = ConditionEvaluator::compile(&expr, &schema()).unwrap();
        assert_eq!(evaluator.factors[1], Factor::Constant(Field::Int(10)));
        assert!(evaluator.evaluate(&row(9, "", 0)).unwrap());
        assert!(!evaluator.evaluate(&row(10, "", 0)).unwrap());
    }

    #[test]
    fn test_string_constant_stays_text() {
        let expr = Expression::parse("R.name '10' =").unwrap();
        let evaluator = ConditionEvaluator::compile(&expr, &schema()).unwrap();
        assert_eq!(evaluator.factors[1], Factor::Constant(Field::from("10")));
        assert!(evaluator.evaluate(&row(0, "10", 0)).unwrap());
    }

    #[test]
    fn test_non_commutative_operand_order() {
        // 10 - 3 = 7, 12 / 4 = 3
        assert!(eval("R.id S.id - 7 =", &row(10, "", 3)).unwrap());
        assert!(eval("R.id S.id / 3 =", &row(12, "", 4)).unwrap());
        assert!(!eval("R.id S.id - 7 =", &row(3, "", 10)).unwrap());
    }

    #[test]
    fn test_string_ordering() {
        assert!(eval("R.name 'b' <", &row(0, "abc", 0)).unwrap());
        assert!(eval("R.name 'ab' >", &row(0, "abc", 0)).unwrap());
        assert!(!eval("R.name 'abc' >", &row(0, "abc", 0)).unwrap());
    }

    #[test]
    fn test_logical_operators() {
        assert!(eval("R.id 1 = S.id 2 = AND", &row(1, "", 2)).unwrap());
        assert!(!eval("R.id 1 = S.id 3 = AND", &row(1, "", 2)).unwrap());
        assert!(eval("R.id 5 = S.id 2 = OR", &row(1, "", 2)).unwrap());
        assert!(eval("R.id 5 = NOT", &row(1, "", 2)).unwrap());
    }

    #[test]
    fn test_integer_vs_string_column_is_type_mismatch() {
        let err = eval("R.id R.name =", &row(1, "a", 0)).unwrap_err();
        assert!(matches!(err, ExecutorError::TypeMismatch { .. }));
    }

    #[test]
    fn test_non_numeric_constant_with_integer_column() {
        let err = eval("R.id 'abc' =", &row(1, "a", 0)).unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::TypeMismatch {
                expected: FieldType::Integer,
                found: FieldType::Str20
            }
        ));
    }

    #[test]
    fn test_unknown_column_fails_compile() {
        let err = eval("T.x 1 =", &row(1, "a", 0)).unwrap_err();
        assert!(matches!(err, ExecutorError::Schema(_)));
    }

    #[test]
    fn test_ambiguous_column_fails_compile() {
        let err = eval("id 1 =", &row(1, "a", 0)).unwrap_err();
        assert!(matches!(err, ExecutorError::Schema(_)));
    }

    #[test]
    fn test_malformed_programs() {
        for text in ["R.id =", "R.id S.id", "", "NOT"] {
            let err = eval(text, &row(1, "a", 0)).unwrap_err();
            assert!(
                matches!(err, ExecutorError::MalformedExpression(_)),
                "{text}: {err}"
            );
        }
    }

    #[test]
    fn test_arithmetic_errors() {
        assert!(matches!(
            eval("R.id S.id / 1 =", &row(1, "", 0)),
            Err(ExecutorError::DivisionByZero)
        ));
        let big = row(i64::MAX, "", 1);
        assert!(matches!(
            eval("R.id S.id + 0 =", &big),
            Err(ExecutorError::IntegerOverflow)
        ));
    }

    #[test]
    fn test_constant_only_comparisons() {
        assert!(eval("10 9 >", &row(0, "", 0)).unwrap());
        // Compared as text: "10" < "9"
        assert!(eval("'10' 'x' <", &row(0, "", 0)).unwrap());
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let expr = Expression::parse("R.id S.id = R.name 'a' = AND").unwrap();
        let evaluator = ConditionEvaluator::compile(&expr, &schema()).unwrap();
        let tuple = row(3, "a", 3);
        for _ in 0..5 {
            assert!(evaluator.evaluate(&tuple).unwrap());
        }
        assert_eq!(tuple, row(3, "a", 3));
    }

    #[test]
    fn test_arity_mismatch() {
        let expr = Expression::parse("R.id 1 =").unwrap();
        let evaluator = ConditionEvaluator::compile(&expr, &schema()).unwrap();
        let short = Tuple::from_fields(vec![Field::Int(1)]);
        assert!(matches!(
            evaluator.evaluate(&short),
            Err(ExecutorError::Tuple(TupleError::ArityMismatch { .. }))
        ));
    }
}
