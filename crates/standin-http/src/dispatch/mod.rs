//! Side-effect dispatch: outbound webhooks and redirect URL building.
//!
//! At most one of the two applies per route-method. A webhook fires before
//! the response is synthesized; a redirect replaces the response entirely.

mod redirect;
mod webhook;

pub use redirect::build_redirect_url;
pub use webhook::{WebhookDispatcher, DEFAULT_DISCRIMINATOR};
