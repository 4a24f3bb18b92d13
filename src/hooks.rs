//! Action hooks: caller-supplied steps that run after an action and before its response is written.
//!
//! A hook sees the action, the resource type, the resolved records and the
//! document about to be sent. It may edit the document, or answer the request
//! itself with [`Interrupt::Respond`]. Hooks run in registration order; the
//! first `Respond` wins and later hooks are skipped.

use crate::config::{Operation, ResourceType};
use crate::document::Document;
use crate::error::ApiError;
use crate::service::ResolvedRecord;
use async_trait::async_trait;
use axum::response::Response;
use std::sync::Arc;

pub enum Interrupt {
    Continue,
    Respond(Response),
}

pub struct ActionContext<'a> {
    pub action: Operation,
    pub resource: &'a ResourceType,
    pub records: &'a [ResolvedRecord],
    /// `None` for destroy.
    pub document: Option<&'a mut Document>,
}

#[async_trait]
pub trait ActionHook: Send + Sync {
    async fn after(&self, ctx: &mut ActionContext<'_>) -> Result<Interrupt, ApiError>;
}

#[derive(Clone)]
struct Registration {
    action: Operation,
    /// Resource identity; `None` applies to every resource.
    resource: Option<String>,
    hook: Arc<dyn ActionHook>,
}

#[derive(Clone, Default)]
pub struct Hooks {
    registrations: Arc<Vec<Registration>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `hook` after every `action`.
    pub fn on(self, action: Operation, hook: impl ActionHook + 'static) -> Self {
        self.register(action, None, Arc::new(hook))
    }

    /// Runs `hook` after `action` on the resource with this identity only.
    pub fn on_resource(self, action: Operation, resource: impl Into<String>, hook: impl ActionHook + 'static) -> Self {
        self.register(action, Some(resource.into()), Arc::new(hook))
    }

    fn register(self, action: Operation, resource: Option<String>, hook: Arc<dyn ActionHook>) -> Self {
        let mut registrations = Arc::unwrap_or_clone(self.registrations);
        registrations.push(Registration { action, resource, hook });
        Hooks {
            registrations: Arc::new(registrations),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub async fn run(&self, ctx: &mut ActionContext<'_>) -> Result<Interrupt, ApiError> {
        for r in self.registrations.iter() {
            if r.action != ctx.action {
                continue;
            }
            if r.resource.as_deref().is_some_and(|id| id != ctx.resource.identity) {
                continue;
            }
            if let Interrupt::Respond(response) = r.hook.after(ctx).await? {
                tracing::debug!(action = ctx.action.as_str(), resource = %ctx.resource.identity, "hook responded");
                return Ok(Interrupt::Respond(response));
            }
        }
        Ok(Interrupt::Continue)
    }
}
