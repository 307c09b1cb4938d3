//! Variable storage for the evaluator.
//!
//! One environment per lambda invocation, block and catch clause, chained to
//! its enclosing scope.  Slots are keyed by variable id, so shadowed names
//! never collide.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{CompileError, Result};
use crate::expr::Variable;
use crate::value::Value;

#[derive(Debug, Default)]
pub struct Environment {
    values: FxHashMap<usize, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: FxHashMap::default(),
            enclosing: Some(enclosing),
        }
    }

    pub fn define(&mut self, variable: &Variable, value: Value) {
        self.values.insert(variable.id, value);
    }

    pub fn get(&self, variable: &Variable) -> Result<Value> {
        if let Some(value) = self.values.get(&variable.id) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(variable)
        } else {
            Err(CompileError::runtime(format!("Undefined variable '{}'", variable.name)))
        }
    }

    pub fn assign(&mut self, variable: &Variable, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(&variable.id) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(variable, value)
        } else {
            Err(CompileError::runtime(format!("Undefined variable '{}'", variable.name)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn assignment_reaches_the_defining_scope() {
        let x = Variable::new("x", Type::INT);
        let outer = Rc::new(RefCell::new(Environment::new()));
        outer.borrow_mut().define(&x, Value::from(1));

        let mut inner = Environment::with_enclosing(outer.clone());
        inner.assign(&x, Value::from(2)).unwrap();
        assert_eq!(outer.borrow().get(&x).unwrap(), Value::from(2));
    }

    #[test]
    fn same_name_different_variable() {
        let a = Variable::new("x", Type::INT);
        let b = Variable::new("x", Type::INT);
        let mut env = Environment::new();
        env.define(&a, Value::from(1));
        assert!(env.get(&b).is_err());
    }
}
