//! Domain models for the bot.
//!
//! This module contains the parsed comment document, the sed commands found
//! in it, and the comments and accounts the bot reasons about.

/// Sed commands and their recognition in code spans.
pub mod command;
pub use command::{SedCommand, extract_commands};

mod comment;
pub use comment::{Comment, CommentId, InvalidFullname, Parent, ParentId, Username};

/// Markdown document trees and code span collection.
pub mod document;
pub use document::{Document, Node};
