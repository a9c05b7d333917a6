//! Sed for forum threads.
//!
//! Watches new comments for inline code spans holding sed substitutions such
//! as `` `s/teh/the/` ``, runs them against the parent comment and replies
//! with the result.

pub mod bot;
pub use bot::{Bot, Delivery, Outcome, RunMode, Settings, Skip};

mod config;
pub use config::{Config, Credentials, LoadError};

pub mod domain;

pub mod engine;
pub use engine::{Engine, Sed};

/// Event sources: the comment feed, parent lookups and replies.
pub mod source;
pub use source::EventSource;
