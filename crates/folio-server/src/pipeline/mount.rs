//! Extension stacks keyed by mount path.

use axum::response::Response;

use super::exchange::Exchange;
use super::handler::{run_stack, Flow, SharedHandler};
use crate::error::PipelineError;
use crate::plugins::ExtensionDescriptor;

/// A built stack and the path prefix it answers under.
#[derive(Debug, Clone)]
pub struct Mount {
    pub name: String,
    pub path: String,
    pub stack: Vec<SharedHandler>,
}

/// Mounted stacks in dispatch order.
#[derive(Debug, Default)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount an extension's stack. A path already taken by an earlier extension is
    /// shared: the newer stack goes in front of it.
    pub fn mount(&mut self, descriptor: &ExtensionDescriptor) {
        let mount = Mount {
            name: descriptor.name.clone(),
            path: descriptor.mount_path.clone(),
            stack: descriptor.build_stack(),
        };

        match self.mounts.iter().position(|m| m.path == mount.path) {
            Some(index) => {
                tracing::warn!(
                    path = %mount.path,
                    previous = %self.mounts[index].name,
                    current = %mount.name,
                    "Duplicate mount path, later extension takes precedence"
                );
                self.mounts.insert(index, mount);
            }
            None => self.mounts.push(mount),
        }
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// Offer the request to every mount whose path prefixes it. Returns the first
    /// response; the exchange keeps any render context set along the way.
    pub async fn dispatch(&self, exchange: &mut Exchange) -> Result<Option<Response>, PipelineError> {
        for mount in &self.mounts {
            let Some(relative) = relative_path(&mount.path, exchange.original_path()) else {
                continue;
            };

            let previous = exchange.replace_path(relative);
            let outcome = run_stack(&mount.stack, exchange).await;
            exchange.replace_path(previous);

            if let Flow::Respond(response) = outcome? {
                tracing::debug!(extension = %mount.name, "Extension answered request");
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}

/// The part of `path` below `mount`, always starting with `/`. `None` when `mount`
/// is not a whole-segment prefix of `path`.
pub fn relative_path(mount: &str, path: &str) -> Option<String> {
    if mount == "/" {
        return Some(path.to_string());
    }
    let rest = path.strip_prefix(mount)?;
    if rest.is_empty() {
        Some("/".to_string())
    } else if rest.starts_with('/') {
        Some(rest.to_string())
    } else {
        None
    }
}
