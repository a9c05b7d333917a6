//! JSON shapes returned by the Reddit API.

use serde::{Deserialize, de::IgnoredAny};

use super::Error;
use crate::domain::{Comment, CommentId, ParentId, Username};

/// The author name Reddit reports for deleted accounts.
const DELETED: &str = "[deleted]";

const COMMENT_KIND: &str = "t1";

/// A page of things, e.g. the newest comments in a subreddit.
#[derive(Debug, Deserialize)]
pub(super) struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

/// A single entry of a listing. Only comments (`t1`) are decoded; anything
/// else, such as `more` placeholders, is skipped.
#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    data: serde_json::Value,
}

impl Listing {
    /// The comments in the listing, in listing order, with their replies.
    pub(super) fn comment_data(self) -> Result<Vec<CommentData>, serde_json::Error> {
        self.data
            .children
            .into_iter()
            .filter(|thing| thing.kind == COMMENT_KIND)
            .map(|thing| serde_json::from_value(thing.data))
            .collect()
    }

    /// The comments in the listing, in listing order.
    pub(super) fn comments(self) -> Result<Vec<Comment>, Error> {
        self.comment_data()?
            .into_iter()
            .map(|data| data.into_parts().map(|(comment, _)| comment))
            .collect()
    }
}

/// The fields of a comment the bot cares about.
#[derive(Debug, Deserialize)]
pub(super) struct CommentData {
    id: String,
    author: String,
    #[serde(default)]
    body: String,
    parent_id: String,
    link_id: String,
    #[serde(default)]
    replies: Replies,
}

/// Reddit sends an empty string instead of a listing when there are no
/// replies.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Replies {
    Listing(Box<Listing>),
    Empty(IgnoredAny),
}

impl Default for Replies {
    fn default() -> Self {
        Self::Empty(IgnoredAny)
    }
}

impl CommentData {
    pub(super) fn id(&self) -> &str {
        &self.id
    }

    /// Splits into the comment and the listing of its replies, if any were
    /// included.
    pub(super) fn into_parts(self) -> Result<(Comment, Option<Listing>), Error> {
        let Self {
            id,
            author,
            body,
            parent_id,
            link_id,
            replies,
        } = self;

        let comment = Comment {
            id: CommentId::new(id),
            author: (author != DELETED).then(|| Username::new(author)),
            body,
            parent: parent_id.parse::<ParentId>()?,
            submission: link_id.strip_prefix("t3_").unwrap_or(&link_id).to_string(),
        };
        let replies = match replies {
            Replies::Listing(listing) => Some(*listing),
            Replies::Empty(_) => None,
        };

        Ok((comment, replies))
    }
}

/// Response body of `/api/v1/access_token`.
#[derive(Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: Option<String>,
    pub expires_in: Option<u64>,
    pub error: Option<String>,
}

/// Response body of `/api/v1/me`.
#[derive(Debug, Deserialize)]
pub(super) struct Me {
    pub name: String,
}

/// Response body of form posts made with `api_type=json`.
#[derive(Debug, Deserialize)]
pub(super) struct PostResponse {
    json: PostJson,
}

#[derive(Debug, Deserialize)]
struct PostJson {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

impl PostResponse {
    /// The errors Reddit reported, joined into one message.
    pub(super) fn errors(&self) -> Option<String> {
        if self.json.errors.is_empty() {
            return None;
        }
        let messages: Vec<String> = self
            .json
            .errors
            .iter()
            .map(serde_json::Value::to_string)
            .collect();
        Some(messages.join(", "))
    }
}
