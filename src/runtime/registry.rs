/// Registry of component kinds
///
/// Maps a kind name used on the command line to a factory building the
/// component from the configuration. Kinds keep their registration order.
use crate::config::Config;
use crate::error::ComponentError;

use super::component::Component;

pub type Factory =
    Box<dyn Fn(&str, &Config) -> Result<Box<dyn Component>, ComponentError> + Send + Sync>;

struct RegistryEntry {
    kind: &'static str,
    description: &'static str,
    factory: Factory,
}

#[derive(Default)]
pub struct ComponentRegistry {
    entries: Vec<RegistryEntry>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind; a later registration replaces an earlier one
    pub fn register<F>(&mut self, kind: &'static str, description: &'static str, factory: F)
    where
        F: Fn(&str, &Config) -> Result<Box<dyn Component>, ComponentError> + Send + Sync + 'static,
    {
        let entry = RegistryEntry {
            kind,
            description,
            factory: Box::new(factory),
        };
        match self.entries.iter_mut().find(|e| e.kind == kind) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Build a component of `kind` named `name`
    pub fn create(
        &self,
        kind: &str,
        name: &str,
        config: &Config,
    ) -> Result<Box<dyn Component>, ComponentError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.kind == kind)
            .ok_or_else(|| ComponentError::UnknownKind(kind.to_string()))?;
        (entry.factory)(name, config)
    }

    /// `(kind, description)` pairs in registration order
    pub fn kinds(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.entries.iter().map(|e| (e.kind, e.description))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.entries.iter().any(|e| e.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::Message;
    use crate::runtime::Context;

    struct Dummy(String);

    impl Component for Dummy {
        fn name(&self) -> &str {
            &self.0
        }

        fn receive(&mut self, _message: &Message, _ctx: &mut Context<'_>) -> Result<(), ComponentError> {
            Ok(())
        }
    }

    #[test]
    fn test_create_registered_kind() {
        let mut registry = ComponentRegistry::new();
        registry.register("dummy", "Does nothing", |name, _config| {
            Ok(Box::new(Dummy(name.to_string())))
        });

        let component = registry.create("dummy", "d1", &Config::default()).unwrap();
        assert_eq!(component.name(), "d1");
        assert!(registry.contains("dummy"));
    }

    #[test]
    fn test_unknown_kind() {
        let registry = ComponentRegistry::new();
        let result = registry.create("missing", "x", &Config::default());
        assert!(matches!(result, Err(ComponentError::UnknownKind(kind)) if kind == "missing"));
    }

    #[test]
    fn test_kinds_keep_registration_order() {
        let mut registry = ComponentRegistry::new();
        registry.register("b", "second", |name, _| Ok(Box::new(Dummy(name.to_string()))));
        registry.register("a", "first", |name, _| Ok(Box::new(Dummy(name.to_string()))));
        registry.register("b", "replaced", |name, _| Ok(Box::new(Dummy(name.to_string()))));

        let kinds: Vec<_> = registry.kinds().collect();
        assert_eq!(kinds, vec![("b", "replaced"), ("a", "first")]);
    }
}
