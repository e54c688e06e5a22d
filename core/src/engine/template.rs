//! Global-binding templates.

use super::Value;

/// An ordered set of named bindings used to populate execution contexts.
///
/// Templates are plain values: building a context from a template copies the
/// bindings into the context, so one template may seed any number of
/// contexts. Binding names are unique; binding a name twice replaces the
/// earlier value in place.
#[derive(Clone, Default)]
pub struct Template {
    bindings: Vec<(String, Value)>,
}

impl Template {
    /// Create an empty template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`. Returns `true` if an earlier binding was replaced.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) -> bool {
        let name = name.into();
        match self.bindings.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => {
                *slot = value;
                true
            }
            None => {
                self.bindings.push((name, value));
                false
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Binding names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(name, _)| name.as_str())
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
