//! The request pipeline.
//!
//! Stages run in a fixed order and each one either answers or hands over to the next:
//!
//! ```text
//! Routing -> ExtensionChain -> Negotiating -> Rendering -> StaticFallback -> NotFound
//! ```
//!
//! A failure in any stage ends in the error page, except a missing article which
//! ends in the 404 page.

mod exchange;
mod handler;
mod mount;
mod pages;
mod routes;
mod static_files;
mod terminal;

pub use exchange::Exchange;
pub use handler::{run_stack, Flow, Handler, PassThrough, SharedHandler};
pub use mount::{relative_path, Mount, MountTable};
pub use pages::{CoreRoute, CoreRoutes};
pub use routes::{RouteMatch, RouteTable};
pub use static_files::StaticFiles;
pub use terminal::{error_page, not_found, NOT_FOUND_KEY};

use std::any::Any;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::error::PipelineError;

/// The HTTP router: every request goes through [`dispatch`].
pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .fallback(handle_request)
        .with_state(ctx)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

async fn handle_request(State(ctx): State<Arc<AppContext>>, request: Request) -> Response {
    let limit = ctx.settings.server.body_limit_bytes;
    let mut exchange = match Exchange::from_request(request, limit).await {
        Ok(exchange) => exchange,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting request body");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };
    dispatch(&ctx, &mut exchange).await
}

/// Run one request through every stage.
pub async fn dispatch(ctx: &AppContext, exchange: &mut Exchange) -> Response {
    match run(ctx, exchange).await {
        Ok(Some(response)) => response,
        Ok(None) => not_found(&ctx.renderer, ctx.site().clone()).await,
        Err(e) if e.is_not_found() => {
            tracing::debug!(path = %exchange.original_path(), error = %e, "Content not found");
            not_found(&ctx.renderer, ctx.site().clone()).await
        }
        Err(e) => error_page(&e, ctx.settings.server.show_error_details),
    }
}

async fn run(ctx: &AppContext, exchange: &mut Exchange) -> Result<Option<Response>, PipelineError> {
    // Routing
    if let Flow::Respond(response) = ctx.core_routes.handle(exchange).await? {
        return Ok(Some(response));
    }

    // ExtensionChain
    if let Some(response) = ctx.mounts.dispatch(exchange).await? {
        return Ok(Some(response));
    }

    if let Some(mut render) = exchange.take_render() {
        render.insert("config", ctx.site().clone());

        // Negotiating
        if let Some(response) = ctx.negotiation.emit(exchange.accept(), &render.data) {
            return Ok(Some(response));
        }

        // Rendering
        let page = ctx.renderer.render(&render).await?;
        return Ok(Some(page.into_response()));
    }

    // StaticFallback
    if let Flow::Respond(response) = ctx.theme_files.handle(exchange).await? {
        return Ok(Some(response));
    }

    Ok(None)
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    tracing::error!(panic = %message, "Request handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html("<h1>Internal Server Error</h1>"),
    )
        .into_response()
}
