//! The event loop and the checks that decide whether to reply.

use std::fmt;

use tracing::instrument;

use crate::{
    domain::{Comment, Parent, ParentId, Username, extract_commands},
    engine::{Engine, apply_all},
    source::EventSource,
};

/// The sentence appended to every reply.
pub const ATTRIBUTION: &str = "I am a bot, and this action was performed automatically. Please \
                               contact [my creator](https://www.reddit.com/message/compose/?to=/u/thirdegree) \
                               if you have any questions.";

/// Appends the attribution footer to a transformed text.
#[must_use]
pub fn with_footer(result: &str) -> String {
    format!("{result}\n\n---\n{ATTRIBUTION}\n")
}

/// Whether replies are actually posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RunMode {
    /// Evaluate everything, but only log the reply.
    #[default]
    #[value(alias = "dryrun")]
    DryRun,

    /// Post replies.
    Live,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::DryRun => write!(f, "dry-run"),
            Self::Live => write!(f, "live"),
        }
    }
}

/// Behaviour switches, fixed for the life of the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Settings {
    /// Whether replies are actually posted.
    pub mode: RunMode,

    /// Whether comments written by the bot's own account are acted on.
    pub allow_self_reply: bool,
}

/// Why a comment was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// The comment was written by the bot itself.
    OwnComment,
    /// The comment replies to a submission rather than to a comment.
    TopLevel,
    /// The comment contains no sed commands.
    NoCommands,
    /// Sed failed on one of the commands.
    EngineFailed,
    /// The commands did not change the parent's text.
    Unchanged,
    /// The bot has already replied to the comment.
    AlreadyReplied,
    /// A lookup against the event source failed.
    SourceUnavailable,
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let reason = match self {
            Self::OwnComment => "ignoring own comment",
            Self::TopLevel => "comment replies to a submission",
            Self::NoCommands => "no sed commands found",
            Self::EngineFailed => "sed failed",
            Self::Unchanged => "result is the same as the original comment",
            Self::AlreadyReplied => "already replied to this comment",
            Self::SourceUnavailable => "event source lookup failed",
        };
        f.write_str(reason)
    }
}

/// What happened to a reply the bot decided to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Running in dry-run mode, so nothing was posted.
    DryRun,
    /// The reply was posted.
    Submitted,
    /// Posting failed with the given message.
    Failed(String),
}

/// The result of processing one comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The comment was left alone.
    Skipped(Skip),

    /// The bot replied, or would have in live mode.
    Replied {
        /// The full reply, footer included.
        text: String,
        /// Whether the reply was posted.
        delivery: Delivery,
    },
}

/// Watches comments for sed commands and replies with the edited parent.
#[derive(Debug)]
pub struct Bot<E> {
    engine: E,
    identity: Username,
    settings: Settings,
}

impl<E: Engine> Bot<E> {
    /// Creates a bot that runs commands with `engine` and acts as `identity`.
    #[must_use]
    pub const fn new(engine: E, identity: Username, settings: Settings) -> Self {
        Self {
            engine,
            identity,
            settings,
        }
    }

    /// Processes comments from `source` until it runs dry.
    ///
    /// Problems with a single comment never stop the loop.
    ///
    /// # Errors
    ///
    /// Returns an error only if the feed of new comments itself fails.
    pub fn run<S: EventSource>(&self, source: &mut S) -> Result<(), S::Error> {
        tracing::info!(
            mode = %self.settings.mode,
            identity = %self.identity,
            "watching for sed commands"
        );
        while let Some(comment) = source.next_comment()? {
            self.process(source, &comment);
        }
        Ok(())
    }

    /// Decides whether to reply to `comment` and, if so, replies.
    #[instrument(skip_all, fields(comment = %comment.id))]
    pub fn process<S: EventSource>(&self, source: &mut S, comment: &Comment) -> Outcome {
        match self.evaluate(source, comment) {
            Ok(result) => self.emit(source, comment, &result),
            Err(skip) => {
                tracing::info!(reason = %skip, "skipping comment");
                Outcome::Skipped(skip)
            }
        }
    }

    /// Runs every check and returns the transformed parent text.
    fn evaluate<S: EventSource>(
        &self,
        source: &mut S,
        comment: &Comment,
    ) -> Result<String, Skip> {
        tracing::debug!(author = ?comment.author, "processing comment");

        if comment.is_by(&self.identity) && !self.settings.allow_self_reply {
            return Err(Skip::OwnComment);
        }

        if matches!(comment.parent, ParentId::Submission(_)) {
            return Err(Skip::TopLevel);
        }

        let commands = extract_commands(&comment.body).ok_or(Skip::NoCommands)?;

        // Only comments carrying commands cost a parent lookup.
        let parent = match source.parent(comment) {
            Ok(Parent::Comment(parent)) => parent,
            Ok(Parent::Submission) => return Err(Skip::TopLevel),
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch parent");
                return Err(Skip::SourceUnavailable);
            }
        };

        let result = apply_all(&self.engine, &commands, &parent.body).map_err(|e| {
            tracing::warn!(command = %e.command, error = %e.source, "sed command failed");
            Skip::EngineFailed
        })?;

        if result.trim() == parent.body {
            return Err(Skip::Unchanged);
        }

        // Another notification for the same comment may have been handled
        // since this one arrived.
        let replies = source.replies(comment).map_err(|e| {
            tracing::warn!(error = %e, "failed to refresh replies");
            Skip::SourceUnavailable
        })?;
        if replies.iter().any(|reply| reply.is_by(&self.identity)) {
            return Err(Skip::AlreadyReplied);
        }

        Ok(result)
    }

    fn emit<S: EventSource>(&self, source: &mut S, comment: &Comment, result: &str) -> Outcome {
        let text = with_footer(result);
        tracing::info!(reply = %text, "replying");

        let delivery = match self.settings.mode {
            RunMode::DryRun => Delivery::DryRun,
            RunMode::Live => match source.reply(comment, &text) {
                Ok(()) => Delivery::Submitted,
                Err(e) => {
                    tracing::error!(error = %e, "failed to post reply");
                    Delivery::Failed(e.to_string())
                }
            },
        };

        Outcome::Replied { text, delivery }
    }
}

#[cfg(test)]
mod tests {
    use clap::ValueEnum;
    use test_case::test_case;

    use super::*;

    #[test]
    fn footer_follows_a_separator() {
        let reply = with_footer("bar baz\n");
        assert!(reply.starts_with("bar baz\n\n\n---\nI am a bot, and this action"));
        assert!(reply.ends_with("if you have any questions.\n"));
    }

    #[test]
    fn attribution_names_the_contact() {
        assert_eq!(
            ATTRIBUTION,
            "I am a bot, and this action was performed automatically. Please contact [my \
             creator](https://www.reddit.com/message/compose/?to=/u/thirdegree) if you have any \
             questions."
        );
    }

    #[test_case("dry-run", RunMode::DryRun; "kebab case")]
    #[test_case("DryRun", RunMode::DryRun; "pascal case")]
    #[test_case("live", RunMode::Live; "lowercase")]
    #[test_case("Live", RunMode::Live; "capitalised")]
    fn run_mode_parses_ignoring_case(input: &str, expected: RunMode) {
        assert_eq!(RunMode::from_str(input, true).unwrap(), expected);
    }

    #[test]
    fn run_mode_defaults_to_dry_run() {
        assert_eq!(Settings::default().mode, RunMode::DryRun);
        assert!(!Settings::default().allow_self_reply);
    }
}
