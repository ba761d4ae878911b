//! Standin: a configuration-driven HTTP response synthesizer.
//!
//! Operators declare routes, request validation rules, and response templates
//! in YAML; the engine matches incoming requests to a route, validates input,
//! expands the declared template against request data, and optionally fires a
//! webhook or builds a redirect before answering. It stands in for a real
//! backend during integration testing or client development.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod generators;
pub mod handler;
pub mod matcher;
pub mod rate_limit;
pub mod registry;
pub mod repeat;
pub mod server;
pub mod template;
pub mod validator;
