use std::{
    fmt, thread,
    time::{Duration, Instant},
};

use reqwest::{
    StatusCode,
    blocking::{Client, RequestBuilder},
};
use serde::de::DeserializeOwned;

use super::{CommentStream, EventSource};
use crate::{
    config::Credentials,
    domain::{Comment, CommentId, InvalidFullname, Parent, ParentId, Username},
};

mod listing;
use listing::{Listing, Me, PostResponse, TokenResponse};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";

/// How many comments to ask for per poll. This is the most Reddit will send.
const PAGE_SIZE: &str = "100";

/// Tokens are renewed this long before Reddit says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while talking to Reddit.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request could not be sent or returned an error status.
    #[error("request to reddit failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The credentials were rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Reddit accepted the request but reported a problem.
    #[error("reddit rejected the request: {0}")]
    Api(String),

    /// The response did not have the expected shape.
    #[error("unexpected response from reddit")]
    Decode(#[from] serde_json::Error),

    /// A comment referred to its parent with an unknown kind of fullname.
    #[error(transparent)]
    Fullname(#[from] InvalidFullname),
}

struct Token {
    access_token: String,
    renew_at: Instant,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"***")
            .field("renew_at", &self.renew_at)
            .finish()
    }
}

/// A blocking client for the parts of the Reddit API the bot uses.
///
/// Authenticates as a script application with the account's password and
/// renews the access token when it is about to expire.
#[derive(Debug)]
pub struct Reddit {
    http: Client,
    credentials: Credentials,
    token: Option<Token>,
}

impl Reddit {
    /// Creates a client. No request is made until the first call.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(credentials: Credentials) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(credentials.user_agent.clone())
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            credentials,
            token: None,
        })
    }

    fn access_token(&mut self) -> Result<String, Error> {
        match &self.token {
            Some(token) if Instant::now() < token.renew_at => Ok(token.access_token.clone()),
            _ => {
                let token = self.authenticate()?;
                let access_token = token.access_token.clone();
                self.token = Some(token);
                Ok(access_token)
            }
        }
    }

    fn authenticate(&self) -> Result<Token, Error> {
        tracing::debug!(username = %self.credentials.username, "requesting access token");

        let response = self
            .http
            .post(TOKEN_URL)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()?;

        let status = response.status();
        if rejects_credentials(status) {
            return Err(Error::Auth(format!("token endpoint returned {status}")));
        }
        let response: TokenResponse = response.error_for_status()?.json()?;

        if let Some(error) = response.error {
            return Err(Error::Auth(error));
        }
        let access_token = response
            .access_token
            .ok_or_else(|| Error::Auth("no access token in response".to_string()))?;
        let lifetime = Duration::from_secs(response.expires_in.unwrap_or(3600));

        Ok(Token {
            access_token,
            renew_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        })
    }

    fn send<T: DeserializeOwned>(&mut self, request: RequestBuilder) -> Result<T, Error> {
        let token = self.access_token()?;
        let response = request
            .bearer_auth(token)
            .query(&[("raw_json", "1")])
            .send()?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.token = None;
        }
        Ok(response.error_for_status()?.json()?)
    }

    fn get<T: DeserializeOwned>(
        &mut self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, Error> {
        let request = self.http.get(format!("{API_BASE}{path}")).query(query);
        self.send(request)
    }

    /// The account the client is logged in as.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub fn me(&mut self) -> Result<Username, Error> {
        let me: Me = self.get("/api/v1/me", &[])?;
        Ok(Username::new(me.name))
    }

    /// The newest comments in `subreddit`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub fn new_comments(&mut self, subreddit: &str) -> Result<Vec<Comment>, Error> {
        let path = format!("/r/{subreddit}/comments");
        let listing: Listing = self.get(&path, &[("limit", PAGE_SIZE)])?;
        listing.comments()
    }

    /// Looks up a single comment by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub fn comment(&mut self, id: &CommentId) -> Result<Option<Comment>, Error> {
        let fullname = id.fullname();
        let listing: Listing = self.get("/api/info", &[("id", fullname.as_str())])?;
        Ok(listing.comments()?.into_iter().next())
    }

    /// Fetches the current direct replies to `comment`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub fn replies(&mut self, comment: &Comment) -> Result<Vec<Comment>, Error> {
        let path = format!("/comments/{}/_/{}", comment.submission, comment.id);
        let (_submission, thread): (Listing, Listing) = self.get(&path, &[("depth", "2")])?;

        let Some(data) = thread
            .comment_data()?
            .into_iter()
            .find(|data| data.id() == comment.id.as_str())
        else {
            return Err(Error::Api(format!(
                "comment {} not found in its thread",
                comment.id
            )));
        };

        match data.into_parts()? {
            (_, Some(replies)) => replies.comments(),
            (_, None) => Ok(Vec::new()),
        }
    }

    /// Posts `text` as a reply to `comment`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or Reddit rejects the reply.
    pub fn reply(&mut self, comment: &Comment, text: &str) -> Result<(), Error> {
        let thing_id = comment.id.fullname();
        let request = self.http.post(format!("{API_BASE}/api/comment")).form(&[
            ("api_type", "json"),
            ("thing_id", thing_id.as_str()),
            ("text", text),
        ]);
        let response: PostResponse = self.send(request)?;

        match response.errors() {
            Some(errors) => Err(Error::Api(errors)),
            None => Ok(()),
        }
    }
}

/// Whether a token endpoint status means the credentials themselves were
/// refused. Anything else, such as rate limiting or an outage, is transient.
const fn rejects_credentials(status: StatusCode) -> bool {
    matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED)
}

/// An [`EventSource`] that polls a subreddit for new comments.
#[derive(Debug)]
pub struct RedditSource {
    client: Reddit,
    subreddit: String,
    stream: CommentStream,
}

impl RedditSource {
    /// Watches `subreddit` (use `all` for the whole site) through `client`.
    #[must_use]
    pub fn new(client: Reddit, subreddit: impl Into<String>, stream: CommentStream) -> Self {
        Self {
            client,
            subreddit: subreddit.into(),
            stream,
        }
    }
}

impl EventSource for RedditSource {
    type Error = Error;

    fn identity(&mut self) -> Result<Username, Self::Error> {
        self.client.me()
    }

    fn next_comment(&mut self) -> Result<Option<Comment>, Self::Error> {
        loop {
            if let Some(comment) = self.stream.pop() {
                return Ok(Some(comment));
            }

            match self.client.new_comments(&self.subreddit) {
                Ok(batch) => {
                    let fresh = self.stream.ingest(batch);
                    tracing::trace!(fresh, subreddit = %self.subreddit, "polled for comments");
                }
                Err(e @ Error::Auth(_)) => return Err(e),
                Err(e) => tracing::warn!(error = %e, "failed to poll for new comments"),
            }

            if let Some(comment) = self.stream.pop() {
                return Ok(Some(comment));
            }
            thread::sleep(self.stream.poll_delay());
        }
    }

    fn parent(&mut self, comment: &Comment) -> Result<Parent, Self::Error> {
        match &comment.parent {
            ParentId::Submission(_) => Ok(Parent::Submission),
            ParentId::Comment(id) => self
                .client
                .comment(id)?
                .map(Parent::Comment)
                .ok_or_else(|| Error::Api(format!("parent comment {id} not found"))),
        }
    }

    fn replies(&mut self, comment: &Comment) -> Result<Vec<Comment>, Self::Error> {
        self.client.replies(comment)
    }

    fn reply(&mut self, comment: &Comment, text: &str) -> Result<(), Self::Error> {
        self.client.reply(comment, text)
    }
}
