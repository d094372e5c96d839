//! Extensions compiled into the `folio` binary.

pub mod admin;
pub mod content_negotiation;

use crate::plugins::ExtensionCatalog;

/// Catalog of every built-in extension factory.
pub fn builtin() -> ExtensionCatalog {
    ExtensionCatalog::new()
        .register(admin::NAME, admin::factory)
        .register(content_negotiation::NAME, content_negotiation::factory)
}
