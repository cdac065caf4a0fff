//! The variable environment: a case-insensitive binding of name to value,
//! set via `SetData`, wiped via `ClearData`. Grounded on the teacher's
//! scope map (`Env<T>` in the original bytecode module) but flattened —
//! this engine has no lexical nesting, only the loop stack shadows names.

use std::collections::HashMap;

use crate::value::Value;

/// Classifies how a binding should be treated by iteration and lookup,
/// mirroring the source engine's object/row-source/list metadata flags.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BindingKind {
    Simple,
    Object,
    RowSource,
    Iterable,
}

impl BindingKind {
    pub fn of(value: &Value) -> BindingKind {
        match value {
            Value::Object(_) => BindingKind::Object,
            Value::RowSource(_) => BindingKind::RowSource,
            Value::WrappedList(_) => BindingKind::Iterable,
            _ => BindingKind::Simple,
        }
    }
}

struct Binding {
    value: Value,
    kind: BindingKind,
}

/// Case-insensitive variable store. Keys are normalized to lowercase on
/// insert and lookup.
#[derive(Default)]
pub struct Environment {
    bindings: HashMap<String, Binding>,
}

impl Environment {
    pub fn new() -> Environment {
        Environment { bindings: HashMap::new() }
    }

    pub fn set(&mut self, name: &str, value: Value) {
        let kind = BindingKind::of(&value);
        self.bindings.insert(name.to_ascii_lowercase(), Binding { value, kind });
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(&name.to_ascii_lowercase()).map(|b| &b.value)
    }

    pub fn kind_of(&self, name: &str) -> Option<BindingKind> {
        self.bindings.get(&name.to_ascii_lowercase()).map(|b| b.kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(&name.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut env = Environment::new();
        env.set("Name", Value::string("World"));
        assert!(matches!(env.get("name"), Some(Value::String(s)) if &**s == "World"));
        assert!(matches!(env.get("NAME"), Some(Value::String(s)) if &**s == "World"));
    }

    #[test]
    fn set_replaces_prior_binding() {
        let mut env = Environment::new();
        env.set("x", Value::Integer(1));
        env.set("x", Value::Integer(2));
        assert!(matches!(env.get("x"), Some(Value::Integer(2))));
    }

    #[test]
    fn clear_drops_all_bindings() {
        let mut env = Environment::new();
        env.set("x", Value::Integer(1));
        env.clear();
        assert!(env.get("x").is_none());
    }
}
