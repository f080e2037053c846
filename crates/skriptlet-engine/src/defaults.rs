//! Built-in types, converters and syntax kinds.

use anyhow::{Result, bail};

use crate::class::ClassId;
use crate::converters::ChainFlags;
use crate::engine::EngineBuilder;
use crate::syntax::{Effect, Expression};
use crate::types::TypeDef;
use crate::value::Value;

fn parse_integer(text: &str) -> Option<Value> {
    text.parse().ok().map(Value::Integer)
}

fn parse_decimal(text: &str) -> Option<Value> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let well_formed = digits.contains('.')
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().any(|c| c.is_ascii_digit());
    if !well_formed {
        return None;
    }
    text.parse().ok().map(Value::Decimal)
}

fn parse_boolean(text: &str) -> Option<Value> {
    if text.eq_ignore_ascii_case("true") {
        Some(Value::Boolean(true))
    } else if text.eq_ignore_ascii_case("false") {
        Some(Value::Boolean(false))
    } else {
        None
    }
}

/// Installs everything an [`Engine::with_defaults`](crate::Engine::with_defaults)
/// engine knows.
pub fn register(builder: &mut EngineBuilder) -> Result<()> {
    builder.register_type(TypeDef::new("object¦s", ClassId::OBJECT))?;
    builder.register_type(
        TypeDef::new("number¦s", ClassId::NUMBER)
            .literal_parser(|s| parse_integer(s).or_else(|| parse_decimal(s))),
    )?;
    builder.register_type(
        TypeDef::new("integer¦s", ClassId::INTEGER).literal_parser(parse_integer),
    )?;
    builder.register_type(
        TypeDef::new("decimal¦s", ClassId::DECIMAL).literal_parser(parse_decimal),
    )?;
    // Quoted text is accepted for `string` without a parser.
    builder.register_type(TypeDef::new("string¦s", ClassId::STRING))?;
    builder.register_type(
        TypeDef::new("boolean¦s", ClassId::BOOLEAN).literal_parser(parse_boolean),
    )?;

    // Must not chain: number -> boolean -> integer would truncate every decimal.
    builder.register_converter(
        ClassId::NUMBER,
        ClassId::BOOLEAN,
        |v| v.as_number().ok().map(|n| Value::Boolean(n != 0.0)),
        ChainFlags::NO_CHAINING,
    );
    builder.register_converter(
        ClassId::BOOLEAN,
        ClassId::INTEGER,
        |v| v.as_bool().ok().map(|b| Value::Integer(b as i64)),
        ChainFlags::NONE,
    );

    builder.register_expression(
        "arithmetic",
        "number",
        &["%number% (1¦+|2¦-|3¦*|4¦/) %number%"],
        |mut r| {
            let op = match r.parse_mark {
                1 => Operator::Add,
                2 => Operator::Subtract,
                3 => Operator::Multiply,
                4 => Operator::Divide,
                mark => bail!("unexpected operator mark {mark}"),
            };
            Ok(Box::new(Arithmetic {
                left: r.take_expression()?,
                op,
                right: r.take_expression()?,
            }))
        },
    )?;

    builder.register_expression("squared", "number", &["the number %number% squared"], |mut r| {
        Ok(Box::new(Squared(r.take_expression()?)))
    })?;

    builder.register_expression("whether", "boolean", &["whether %boolean%"], |mut r| {
        Ok(Box::new(Whether(r.take_expression()?)))
    })?;

    builder.register_expression(
        "comparison",
        "boolean",
        &["%number% is (1¦greater|2¦less) than %number%"],
        |mut r| {
            let greater = match r.parse_mark {
                1 => true,
                2 => false,
                mark => bail!("unexpected comparison mark {mark}"),
            };
            Ok(Box::new(Comparison {
                left: r.take_expression()?,
                greater,
                right: r.take_expression()?,
            }))
        },
    )?;

    builder.register_expression("length", "integer", &["[the] length of %string%"], |mut r| {
        Ok(Box::new(Length(r.take_expression()?)))
    })?;

    builder.register_expression(
        "substring",
        "string",
        &["substring %string% from %number% to %number%"],
        |mut r| {
            Ok(Box::new(Substring {
                text: r.take_expression()?,
                from: r.take_expression()?,
                to: r.take_expression()?,
            }))
        },
    )?;

    builder.register_effect("print", &["print %strings%"], |mut r| {
        Ok(Box::new(Print(r.take_expression()?)))
    })?;

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
        }
    }
}

#[derive(Debug)]
struct Arithmetic {
    left: Box<dyn Expression>,
    op: Operator,
    right: Box<dyn Expression>,
}

impl Arithmetic {
    fn integer_op(&self, a: i64, b: i64) -> Option<i64> {
        match self.op {
            Operator::Add => a.checked_add(b),
            Operator::Subtract => a.checked_sub(b),
            Operator::Multiply => a.checked_mul(b),
            Operator::Divide => None,
        }
    }
}

impl Expression for Arithmetic {
    fn return_class(&self) -> ClassId {
        ClassId::NUMBER
    }

    fn values(&self) -> Vec<Value> {
        let (Some(left), Some(right)) = (self.left.single_value(), self.right.single_value()) else {
            return Vec::new();
        };
        if let (Value::Integer(a), Value::Integer(b)) = (&left, &right) {
            if let Some(n) = self.integer_op(*a, *b) {
                return vec![Value::Integer(n)];
            }
        }
        let (Ok(a), Ok(b)) = (left.as_number(), right.as_number()) else {
            return Vec::new();
        };
        let n = match self.op {
            Operator::Add => a + b,
            Operator::Subtract => a - b,
            Operator::Multiply => a * b,
            Operator::Divide => a / b,
        };
        vec![Value::number(n)]
    }

    fn describe(&self) -> String {
        format!("{} {} {}", self.left.describe(), self.op.symbol(), self.right.describe())
    }
}

#[derive(Debug)]
struct Squared(Box<dyn Expression>);

impl Expression for Squared {
    fn return_class(&self) -> ClassId {
        ClassId::NUMBER
    }

    fn values(&self) -> Vec<Value> {
        match self.0.single_value() {
            Some(Value::Integer(n)) => match n.checked_mul(n) {
                Some(sq) => vec![Value::Integer(sq)],
                None => vec![Value::number((n as f64).powi(2))],
            },
            Some(v) => v.as_number().map(|n| vec![Value::number(n * n)]).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    fn describe(&self) -> String {
        format!("the number {} squared", self.0.describe())
    }
}

#[derive(Debug)]
struct Whether(Box<dyn Expression>);

impl Expression for Whether {
    fn return_class(&self) -> ClassId {
        ClassId::BOOLEAN
    }

    fn values(&self) -> Vec<Value> {
        self.0.single_value().into_iter().collect()
    }

    fn describe(&self) -> String {
        format!("whether {}", self.0.describe())
    }
}

#[derive(Debug)]
struct Comparison {
    left: Box<dyn Expression>,
    greater: bool,
    right: Box<dyn Expression>,
}

impl Expression for Comparison {
    fn return_class(&self) -> ClassId {
        ClassId::BOOLEAN
    }

    fn values(&self) -> Vec<Value> {
        let (Some(left), Some(right)) = (self.left.single_value(), self.right.single_value()) else {
            return Vec::new();
        };
        let result = if self.greater {
            left.greater_than(&right)
        } else {
            left.less_than(&right)
        };
        result.map(|b| vec![Value::Boolean(b)]).unwrap_or_default()
    }

    fn describe(&self) -> String {
        let word = if self.greater { "greater" } else { "less" };
        format!("{} is {} than {}", self.left.describe(), word, self.right.describe())
    }
}

#[derive(Debug)]
struct Length(Box<dyn Expression>);

impl Expression for Length {
    fn return_class(&self) -> ClassId {
        ClassId::INTEGER
    }

    fn values(&self) -> Vec<Value> {
        self.0
            .single_value()
            .and_then(|v| v.as_str().map(|s| Value::Integer(s.chars().count() as i64)).ok())
            .into_iter()
            .collect()
    }

    fn describe(&self) -> String {
        format!("length of {}", self.0.describe())
    }
}

/// 1-based, both ends inclusive, clamped to the text.
#[derive(Debug)]
struct Substring {
    text: Box<dyn Expression>,
    from: Box<dyn Expression>,
    to: Box<dyn Expression>,
}

impl Expression for Substring {
    fn return_class(&self) -> ClassId {
        ClassId::STRING
    }

    fn values(&self) -> Vec<Value> {
        let text = self.text.single_value();
        let from = self.from.single_value().and_then(|v| v.as_integer().ok());
        let to = self.to.single_value().and_then(|v| v.as_integer().ok());
        let (Some(Value::String(text)), Some(from), Some(to)) = (text, from, to) else {
            return Vec::new();
        };
        let start = from.max(1) as usize - 1;
        let end = to.max(0) as usize;
        let out: String = text
            .chars()
            .skip(start)
            .take(end.saturating_sub(start))
            .collect();
        vec![Value::String(out)]
    }

    fn describe(&self) -> String {
        format!(
            "substring {} from {} to {}",
            self.text.describe(),
            self.from.describe(),
            self.to.describe()
        )
    }
}

#[derive(Debug)]
struct Print(Box<dyn Expression>);

impl Effect for Print {
    fn describe(&self) -> String {
        format!("print {}", self.0.describe())
    }

    fn expressions(&self) -> Vec<&dyn Expression> {
        vec![self.0.as_ref()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_integer("-12"), Some(Value::Integer(-12)));
        assert_eq!(parse_integer("1.5"), None);
        assert_eq!(parse_decimal("1.5"), Some(Value::Decimal(1.5)));
        assert_eq!(parse_decimal("-.5"), Some(Value::Decimal(-0.5)));
        assert_eq!(parse_decimal("12"), None);
        assert_eq!(parse_decimal("inf."), None);
        assert_eq!(parse_decimal("."), None);
    }

    #[test]
    fn test_parse_boolean() {
        assert_eq!(parse_boolean("TRUE"), Some(Value::Boolean(true)));
        assert_eq!(parse_boolean("false"), Some(Value::Boolean(false)));
        assert_eq!(parse_boolean("yes"), None);
    }

    #[test]
    fn test_register_defaults() -> Result<()> {
        let mut builder = EngineBuilder::new();
        register(&mut builder)?;
        let engine = builder.build();
        assert_eq!(engine.types().len(), 6);
        // number -> boolean may not chain into boolean -> integer
        assert!(engine.convert(&Value::Decimal(0.5), ClassId::INTEGER).is_none());
        assert_eq!(engine.convert(&Value::Boolean(true), ClassId::NUMBER), Some(Value::Integer(1)));
        Ok(())
    }
}
