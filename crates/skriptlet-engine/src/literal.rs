//! Expression objects built by the engine itself rather than by a registered factory.

use std::sync::Arc;

use crate::class::ClassId;
use crate::converters::ConverterGraph;
use crate::syntax::Expression;
use crate::value::Value;

/// Values parsed directly from the script text.
#[derive(Debug, Clone)]
pub struct SimpleLiteral {
    class: ClassId,
    values: Vec<Value>,
    source: String,
}

impl SimpleLiteral {
    pub fn new(class: ClassId, values: Vec<Value>, source: impl Into<String>) -> Self {
        Self {
            class,
            values,
            source: source.into(),
        }
    }
}

impl Expression for SimpleLiteral {
    fn return_class(&self) -> ClassId {
        self.class
    }

    fn is_single(&self) -> bool {
        self.values.len() <= 1
    }

    fn is_literal(&self) -> bool {
        true
    }

    fn values(&self) -> Vec<Value> {
        self.values.clone()
    }

    fn describe(&self) -> String {
        self.source.clone()
    }
}

/// `a, b and c` / `a, b or c`.
#[derive(Debug)]
pub struct ExpressionList {
    items: Vec<Box<dyn Expression>>,
    and: bool,
    class: ClassId,
}

impl ExpressionList {
    pub fn new(items: Vec<Box<dyn Expression>>, and: bool, class: ClassId) -> Self {
        Self { items, and, class }
    }

    pub fn items(&self) -> &[Box<dyn Expression>] {
        &self.items
    }

    pub fn is_and_list(&self) -> bool {
        self.and
    }
}

impl Expression for ExpressionList {
    fn return_class(&self) -> ClassId {
        self.class
    }

    fn is_single(&self) -> bool {
        !self.and && self.items.iter().all(|e| e.is_single())
    }

    fn is_literal(&self) -> bool {
        self.items.iter().all(|e| e.is_literal())
    }

    /// An and-list yields every item's values; an or-list yields those of its first
    /// non-empty item.
    fn values(&self) -> Vec<Value> {
        if self.and {
            self.items.iter().flat_map(|e| e.values()).collect()
        } else {
            self.items
                .iter()
                .map(|e| e.values())
                .find(|v| !v.is_empty())
                .unwrap_or_default()
        }
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.items.iter().map(|e| e.describe()).collect();
        match parts.split_last() {
            Some((last, rest)) if !rest.is_empty() => {
                let joiner = if self.and { "and" } else { "or" };
                format!("{} {} {}", rest.join(", "), joiner, last)
            }
            _ => parts.join(""),
        }
    }
}

/// Wraps an expression whose declared class is only convertible to the one the
/// caller asked for. Values that fail to convert are dropped.
#[derive(Debug)]
pub struct ConvertedExpression {
    inner: Box<dyn Expression>,
    to: ClassId,
    converters: Arc<ConverterGraph>,
}

impl ConvertedExpression {
    pub fn new(inner: Box<dyn Expression>, to: ClassId, converters: Arc<ConverterGraph>) -> Self {
        Self {
            inner,
            to,
            converters,
        }
    }

    pub fn inner(&self) -> &dyn Expression {
        self.inner.as_ref()
    }
}

impl Expression for ConvertedExpression {
    fn return_class(&self) -> ClassId {
        self.to
    }

    fn is_single(&self) -> bool {
        self.inner.is_single()
    }

    fn is_literal(&self) -> bool {
        self.inner.is_literal()
    }

    fn values(&self) -> Vec<Value> {
        self.inner
            .values()
            .iter()
            .filter_map(|v| self.converters.convert(v, self.to))
            .collect()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassHierarchy;
    use crate::converters::{ChainFlags, ConverterEdge};

    fn lit(n: i64) -> Box<dyn Expression> {
        Box::new(SimpleLiteral::new(ClassId::NUMBER, vec![Value::Integer(n)], n.to_string()))
    }

    #[test]
    fn test_and_list() {
        let list = ExpressionList::new(vec![lit(1), lit(2), lit(3)], true, ClassId::NUMBER);
        assert!(!list.is_single());
        assert!(list.is_literal());
        assert_eq!(list.values().len(), 3);
        assert_eq!(list.describe(), "1, 2 and 3");
    }

    #[test]
    fn test_or_list() {
        let list = ExpressionList::new(vec![lit(1), lit(2)], false, ClassId::NUMBER);
        assert!(list.is_single());
        assert_eq!(list.values(), vec![Value::Integer(1)]);
        assert_eq!(list.describe(), "1 or 2");
    }

    #[test]
    fn test_converted_expression() {
        let mut graph = ConverterGraph::new(Arc::new(ClassHierarchy::new()));
        graph.register(ConverterEdge::new(
            ClassId::NUMBER,
            ClassId::BOOLEAN,
            |v| v.as_number().ok().map(|n| Value::Boolean(n != 0.0)),
            ChainFlags::NONE,
        ));
        let converted = ConvertedExpression::new(lit(0), ClassId::BOOLEAN, Arc::new(graph));
        assert_eq!(converted.return_class(), ClassId::BOOLEAN);
        assert_eq!(converted.values(), vec![Value::Boolean(false)]);
        assert!(converted.is_literal());
    }
}
