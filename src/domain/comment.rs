use std::{fmt, str::FromStr};

/// A forum account name.
///
/// Account names compare case-insensitively, the way the forum treats them.
#[derive(Debug, Clone, Eq)]
pub struct Username(String);

impl Username {
    /// Creates a username.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl PartialEq for Username {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "u/{}", self.0)
    }
}

/// The base36 identifier of a comment, without its `t1_` kind prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommentId(String);

impl CommentId {
    /// Creates a comment id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The fullname of the comment, e.g. `t1_abc123`.
    #[must_use]
    pub fn fullname(&self) -> String {
        format!("{COMMENT_PREFIX}{}", self.0)
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const COMMENT_PREFIX: &str = "t1_";
const SUBMISSION_PREFIX: &str = "t3_";

/// What a comment replies to, as carried in its `parent_id` fullname.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParentId {
    /// Reply to another comment.
    Comment(CommentId),
    /// Top-level comment on a submission, identified by its base36 id.
    Submission(String),
}

impl FromStr for ParentId {
    type Err = InvalidFullname;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix(COMMENT_PREFIX) {
            Ok(Self::Comment(CommentId::new(id)))
        } else if let Some(id) = s.strip_prefix(SUBMISSION_PREFIX) {
            Ok(Self::Submission(id.to_string()))
        } else {
            Err(InvalidFullname(s.to_string()))
        }
    }
}

impl fmt::Display for ParentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Comment(id) => write!(f, "{COMMENT_PREFIX}{id}"),
            Self::Submission(id) => write!(f, "{SUBMISSION_PREFIX}{id}"),
        }
    }
}

/// Error returned when a fullname is neither a comment nor a submission.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("'{0}' is not a comment or submission fullname")]
pub struct InvalidFullname(String);

/// A comment as delivered by the event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// The comment's id.
    pub id: CommentId,

    /// The author, or `None` when the account has been deleted.
    pub author: Option<Username>,

    /// The raw markdown body.
    pub body: String,

    /// What this comment replies to.
    pub parent: ParentId,

    /// The base36 id of the submission the comment belongs to.
    pub submission: String,
}

impl Comment {
    /// Whether the comment was written by `user`.
    ///
    /// Comments by deleted accounts are never written by anyone.
    #[must_use]
    pub fn is_by(&self, user: &Username) -> bool {
        self.author.as_ref() == Some(user)
    }
}

/// The resolved parent of a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parent {
    /// The parent is itself a comment.
    Comment(Comment),

    /// The parent is a submission, i.e. the root of the thread.
    Submission,
}
