//! Deciding which database a view is applied to

use indexmap::IndexMap;
use pgviews_core::Connection;
use pgviews_objects::ViewDefinition;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Alias used when nothing else is configured
pub const DEFAULT_DATABASE: &str = "default";

/// Maps database aliases and views to connections.
pub trait ConnectionRouter: Send + Sync {
    /// Connection behind `using`, if the alias is known
    fn connection(&self, using: &str) -> Option<Arc<dyn Connection>>;

    /// Whether views of `namespace` may be created or dropped on `using`
    fn allow_migrate(&self, _using: &str, _namespace: &str) -> bool {
        true
    }

    /// Alias writes to this view should go to
    fn db_for_write(&self, _view: &ViewDefinition) -> String {
        DEFAULT_DATABASE.to_string()
    }

    /// Connection for `using`.
    ///
    /// With `restricted` set, returns `None` when the view must not be
    /// migrated on that database. Without it, only an unknown alias yields
    /// `None`.
    fn connection_for(
        &self,
        using: &str,
        view: &ViewDefinition,
        restricted: bool,
    ) -> Option<Arc<dyn Connection>> {
        if restricted && !self.allow_migrate(using, view.namespace()) {
            return None;
        }
        self.connection(using)
    }
}

struct RoutedDatabase {
    connection: Arc<dyn Connection>,
    namespaces: Option<BTreeSet<String>>,
}

impl RoutedDatabase {
    fn allows(&self, namespace: &str) -> bool {
        self.namespaces
            .as_ref()
            .is_none_or(|namespaces| namespaces.contains(namespace))
    }
}

/// Router over a fixed set of connections, keyed by alias.
///
/// A database may be limited to some view namespaces; views from other
/// namespaces are not migrated there.
pub struct StaticRouter {
    default_alias: String,
    databases: IndexMap<String, RoutedDatabase>,
}

impl std::fmt::Debug for StaticRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticRouter")
            .field("default_alias", &self.default_alias)
            .field("databases", &self.databases.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StaticRouter {
    pub fn new() -> Self {
        Self::with_default_alias(DEFAULT_DATABASE)
    }

    pub fn with_default_alias(alias: impl Into<String>) -> Self {
        Self {
            default_alias: alias.into(),
            databases: IndexMap::new(),
        }
    }

    /// Route every namespace to `alias`
    pub fn with_database(mut self, alias: impl Into<String>, connection: Arc<dyn Connection>) -> Self {
        self.databases.insert(
            alias.into(),
            RoutedDatabase {
                connection,
                namespaces: None,
            },
        );
        self
    }

    /// Route only `namespaces` to `alias`
    pub fn with_restricted_database<I, S>(
        mut self,
        alias: impl Into<String>,
        connection: Arc<dyn Connection>,
        namespaces: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.databases.insert(
            alias.into(),
            RoutedDatabase {
                connection,
                namespaces: Some(namespaces.into_iter().map(Into::into).collect()),
            },
        );
        self
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.databases.keys().map(String::as_str)
    }

    pub fn default_alias(&self) -> &str {
        &self.default_alias
    }
}

impl Default for StaticRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRouter for StaticRouter {
    fn connection(&self, using: &str) -> Option<Arc<dyn Connection>> {
        self.databases
            .get(using)
            .map(|database| database.connection.clone())
    }

    fn allow_migrate(&self, using: &str, namespace: &str) -> bool {
        self.databases
            .get(using)
            .is_some_and(|database| database.allows(namespace))
    }

    /// The default alias when it takes the view's namespace, otherwise the
    /// first database restricted to that namespace.
    fn db_for_write(&self, view: &ViewDefinition) -> String {
        if self.allow_migrate(&self.default_alias, view.namespace()) {
            return self.default_alias.clone();
        }
        self.databases
            .iter()
            .find(|(_, database)| database.allows(view.namespace()))
            .map(|(alias, _)| alias.clone())
            .unwrap_or_else(|| self.default_alias.clone())
    }
}
