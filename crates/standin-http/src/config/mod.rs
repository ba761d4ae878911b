//! Configuration types for the standin server.

mod loader;
mod route;
mod schema;
mod settings;

pub use loader::load_declarations;
pub use route::{
    ExtraConfig, MethodConfig, RedirectConfig, RedirectParameter, RepeatConfig, RepeatItem,
    RouteDeclaration, WebhookConfig, WebhookTarget,
};
pub use schema::{ConditionalRule, ConstMatch, IfClause, Schema, ThenClause};
pub use settings::{RateLimitSettings, Settings};
