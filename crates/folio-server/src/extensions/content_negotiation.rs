//! Answers JSON and plain-text requests with the page data instead of HTML.

use folio_render::negotiation::{json_response, plain_response};

use crate::pipeline::PassThrough;
use crate::plugins::{ExtensionContext, ExtensionError, ExtensionUnit};

pub const NAME: &str = "content-negotiation";

pub fn factory(ctx: &ExtensionContext<'_>) -> Result<ExtensionUnit, ExtensionError> {
    tracing::info!(description = %ctx.description(), "Initialising content negotiation");
    ctx.on_negotiate("json", json_response);
    ctx.on_negotiate("plain", plain_response);
    Ok(ExtensionUnit::new(PassThrough))
}
