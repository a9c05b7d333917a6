//! Where comments come from and where replies go.

use crate::domain::{Comment, Parent, Username};

/// The Reddit API client and the comment stream built on it.
pub mod reddit;
pub use reddit::RedditSource;

mod stream;
pub use stream::{Backoff, CommentStream, SeenSet};

/// A live feed of new comments, plus the lookups and actions the bot needs
/// on them.
///
/// Every call may block on the network.
pub trait EventSource {
    /// The error type for failed lookups and actions.
    type Error: std::error::Error + Send + Sync + 'static;

    /// The account the bot is logged in as.
    ///
    /// # Errors
    ///
    /// Returns an error if the account cannot be looked up.
    fn identity(&mut self) -> Result<Username, Self::Error>;

    /// Blocks until the next new comment arrives.
    ///
    /// Returns `Ok(None)` once the feed is exhausted. A live feed never is.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed has failed for good.
    fn next_comment(&mut self) -> Result<Option<Comment>, Self::Error>;

    /// Looks up what `comment` replies to.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent cannot be fetched.
    fn parent(&mut self, comment: &Comment) -> Result<Parent, Self::Error>;

    /// Fetches the current direct replies to `comment`.
    ///
    /// This always goes back to the source, so replies that arrived after the
    /// comment was first seen are included.
    ///
    /// # Errors
    ///
    /// Returns an error if the replies cannot be fetched.
    fn replies(&mut self, comment: &Comment) -> Result<Vec<Comment>, Self::Error>;

    /// Posts `text` as a reply to `comment`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply is rejected.
    fn reply(&mut self, comment: &Comment, text: &str) -> Result<(), Self::Error>;
}
