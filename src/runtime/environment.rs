use crate::runtime::{
    error::{RuntimeError, RuntimeResult},
    value::Value,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

struct Scope {
    values: HashMap<String, Value>,
    enclosing: Option<Environment>,
}

/// Handle to one scope in the chain.
///
/// Cloning shares the scope rather than copying its bindings: the call stack
/// and every closure created while the scope was active hold the same
/// `Rc`, and the scope is freed once the last of them lets go.
#[derive(Clone)]
pub struct Environment {
    scope: Rc<RefCell<Scope>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self::from_scope(None)
    }

    pub fn with_enclosing(enclosing: &Environment) -> Self {
        Self::from_scope(Some(enclosing.clone()))
    }

    fn from_scope(enclosing: Option<Environment>) -> Self {
        Self {
            scope: Rc::new(RefCell::new(Scope {
                values: HashMap::new(),
                enclosing,
            })),
        }
    }

    /// Binds `name` in this scope, replacing any binding already here.
    pub fn define(&self, name: &str, value: Value) {
        self.scope
            .borrow_mut()
            .values
            .insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> RuntimeResult<Value> {
        let mut current = self.clone();
        loop {
            let next = {
                let scope = current.scope.borrow();
                if let Some(value) = scope.values.get(name) {
                    return Ok(value.clone());
                }
                scope.enclosing.clone()
            };
            match next {
                Some(enclosing) => current = enclosing,
                None => {
                    return Err(RuntimeError::UndefinedVariable {
                        name: name.to_string(),
                    })
                }
            }
        }
    }

    /// Overwrites the nearest existing binding of `name`. Never creates one.
    pub fn assign(&self, name: &str, value: Value) -> RuntimeResult<()> {
        let mut current = self.clone();
        loop {
            let next = {
                let mut scope = current.scope.borrow_mut();
                if let Some(slot) = scope.values.get_mut(name) {
                    *slot = value;
                    return Ok(());
                }
                scope.enclosing.clone()
            };
            match next {
                Some(enclosing) => current = enclosing,
                None => {
                    return Err(RuntimeError::UndefinedVariable {
                        name: name.to_string(),
                    })
                }
            }
        }
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.scope.borrow().values.contains_key(name)
    }

    #[cfg(test)]
    pub fn enclosing(&self) -> Option<Environment> {
        self.scope.borrow().enclosing.clone()
    }

    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.scope, &other.scope)
    }

    /// Number of live handles to this scope.
    #[cfg(test)]
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.scope)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = self.scope.borrow();
        let mut names: Vec<&String> = scope.values.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("names", &names)
            .field("has_enclosing", &scope.enclosing.is_some())
            .finish()
    }
}
