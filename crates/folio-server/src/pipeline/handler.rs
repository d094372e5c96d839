use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;

use super::exchange::Exchange;
use crate::error::PipelineError;

/// What a handler decided about the request.
#[derive(Debug)]
pub enum Flow {
    /// Continue with the next handler or stage.
    Next,
    /// Answer the request now; nothing after this runs.
    Respond(Response),
}

/// One unit of request handling. Handlers either answer, call through, or fail.
#[async_trait]
pub trait Handler: Send + Sync + fmt::Debug {
    async fn handle(&self, exchange: &mut Exchange) -> Result<Flow, PipelineError>;
}

pub type SharedHandler = Arc<dyn Handler>;

/// Calls straight through. Used by extensions whose work happens at load time.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

#[async_trait]
impl Handler for PassThrough {
    async fn handle(&self, _exchange: &mut Exchange) -> Result<Flow, PipelineError> {
        Ok(Flow::Next)
    }
}

/// Run handlers in order until one answers.
pub async fn run_stack(
    stack: &[SharedHandler],
    exchange: &mut Exchange,
) -> Result<Flow, PipelineError> {
    for handler in stack {
        if let Flow::Respond(response) = handler.handle(exchange).await? {
            return Ok(Flow::Respond(response));
        }
    }
    Ok(Flow::Next)
}
