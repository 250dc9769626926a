//! Ordered registry of resource handlers.

use anyhow::Result;
use std::sync::Arc;

use crate::core::DocweaveError;
use crate::resource::ResourceHandler;

/// Handlers in registration order; the first one accepting a URI wins.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    handlers: Vec<Arc<dyn ResourceHandler>>,
}

impl Registry {
    #[must_use]
    pub fn new(handlers: impl IntoIterator<Item = Arc<dyn ResourceHandler>>) -> Self {
        Self {
            handlers: handlers.into_iter().collect(),
        }
    }

    /// Appends handlers after the ones already registered.
    pub fn load(&mut self, handlers: impl IntoIterator<Item = Arc<dyn ResourceHandler>>) {
        self.handlers.extend(handlers);
    }

    /// The first handler accepting `uri`.
    #[must_use]
    pub fn get(&self, uri: &str) -> Option<Arc<dyn ResourceHandler>> {
        self.handlers.iter().find(|handler| handler.accept(uri)).cloned()
    }

    /// Like [`get`](Self::get) but fails with
    /// [`DocweaveError::NoResourceHandler`] when nothing accepts `uri`.
    pub fn require(&self, uri: &str) -> Result<Arc<dyn ResourceHandler>> {
        self.get(uri).ok_or_else(|| {
            DocweaveError::NoResourceHandler {
                uri: uri.to_string(),
            }
            .into()
        })
    }

    /// Removes the given handlers by identity, or every handler when
    /// `handlers` is empty.
    pub fn remove(&mut self, handlers: &[Arc<dyn ResourceHandler>]) {
        if handlers.is_empty() {
            self.handlers.clear();
            return;
        }
        self.handlers.retain(|registered| {
            !handlers
                .iter()
                .any(|removed| std::ptr::addr_eq(Arc::as_ptr(registered), Arc::as_ptr(removed)))
        });
    }

    #[must_use]
    pub fn list(&self) -> &[Arc<dyn ResourceHandler>] {
        &self.handlers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedHandler;

    fn handler(name: &str, prefix: &str) -> Arc<dyn ResourceHandler> {
        Arc::new(ScriptedHandler::new(name).accepting(prefix))
    }

    #[test]
    fn test_first_accepting_handler_wins() {
        let registry = Registry::new([
            handler("first", "https://"),
            handler("second", "https://github.com/"),
        ]);

        let picked = registry.get("https://github.com/acme/app").unwrap();
        assert_eq!(picked.name(), "first");
        assert!(registry.get("docs/a.md").is_none());
    }

    #[test]
    fn test_require_reports_missing_handler() {
        let registry = Registry::default();
        let err = registry.require("docs/a.md").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DocweaveError>(),
            Some(DocweaveError::NoResourceHandler { .. })
        ));
    }

    #[test]
    fn test_load_appends_and_remove_by_identity() {
        let first = handler("first", "a");
        let second = handler("second", "a");
        let mut registry = Registry::new([first.clone()]);
        registry.load([second.clone()]);
        assert_eq!(registry.list().len(), 2);

        registry.remove(std::slice::from_ref(&first));
        assert_eq!(registry.list().len(), 1);
        assert_eq!(registry.get("a").unwrap().name(), "second");

        registry.remove(&[]);
        assert!(registry.list().is_empty());
    }
}
