use std::{fmt, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;
use nonempty::NonEmpty;

use super::document::Document;

/// The prefix that marks a code span as a sed substitution.
pub const PREFIX: &str = "s/";

/// A sed substitution command taken from a code span, e.g. `s/foo/bar/g`.
///
/// Only the `s/` prefix is checked here. The pattern, replacement and flags
/// are validated by sed itself when the command runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SedCommand(NonEmptyString);

impl SedCommand {
    /// Creates a command from a code span payload.
    ///
    /// # Errors
    ///
    /// Returns [`NotACommand`] if the string does not start with `s/`.
    pub fn new(s: String) -> Result<Self, NotACommand> {
        if !s.starts_with(PREFIX) {
            return Err(NotACommand(s));
        }
        NonEmptyString::new(s).map(Self).map_err(NotACommand)
    }

    /// Returns the command as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<&str> for SedCommand {
    type Error = NotACommand;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl FromStr for SedCommand {
    type Err = NotACommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl AsRef<str> for SedCommand {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for SedCommand {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl fmt::Display for SedCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a string is not shaped like a sed substitution.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("'{0}' is not a sed substitution: it must start with 's/'")]
pub struct NotACommand(String);

/// Keeps the spans that are sed commands, in their original order.
pub fn recognize<'a, I>(spans: I) -> impl Iterator<Item = SedCommand> + 'a
where
    I: IntoIterator<Item = &'a str>,
    I::IntoIter: 'a,
{
    spans
        .into_iter()
        .filter_map(|span| SedCommand::try_from(span).ok())
}

/// Parses a comment body and returns the sed commands in its code spans.
///
/// Returns `None` when the body holds no commands, so callers can never hand
/// an empty sequence to the executor.
#[must_use]
pub fn extract_commands(body: &str) -> Option<NonEmpty<SedCommand>> {
    let document = Document::parse(body);

    let spans: Vec<&str> = document.code_spans().collect();
    if !spans.is_empty() {
        tracing::info!(?spans, "found code spans");
    }

    NonEmpty::from_vec(recognize(spans).collect())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;

    #[test_case("s/foo/bar/", true; "simple substitution")]
    #[test_case("s/foo/bar/g", true; "with flags")]
    #[test_case("s/", true; "bare prefix")]
    #[test_case("s|foo|bar|", false; "other delimiter")]
    #[test_case(" s/foo/bar/", false; "leading space")]
    #[test_case("S/foo/bar/", false; "uppercase")]
    #[test_case("y/abc/xyz/", false; "transliteration")]
    #[test_case("", false; "empty")]
    fn recognition(span: &str, expected: bool) {
        assert_eq!(SedCommand::try_from(span).is_ok(), expected);
    }

    #[test]
    fn recognize_preserves_order() {
        let spans = ["s/a/b/", "ls -la", "s/b/c/", "s/c/d/g"];
        let commands: Vec<String> = recognize(spans).map(|c| c.to_string()).collect();
        assert_eq!(commands, vec!["s/a/b/", "s/b/c/", "s/c/d/g"]);
    }

    #[test]
    fn extract_from_body() {
        let body = "you meant `s/teh/the/` and also `s/recieve/receive/g`, not `grep`";
        let commands = extract_commands(body).unwrap();
        assert_eq!(commands.head.as_str(), "s/teh/the/");
        assert_eq!(commands.tail.len(), 1);
        assert_eq!(commands.tail[0].as_str(), "s/recieve/receive/g");
    }

    #[test_case("no code here"; "no spans")]
    #[test_case("`echo hi` and `grep foo`"; "spans without commands")]
    #[test_case("```\ns/foo/bar/\n```"; "command in fenced block")]
    fn extract_nothing(body: &str) {
        assert!(extract_commands(body).is_none());
    }

    #[test]
    fn error_message_names_the_span() {
        let error = SedCommand::try_from("grep foo").unwrap_err();
        assert_eq!(
            error.to_string(),
            "'grep foo' is not a sed substitution: it must start with 's/'"
        );
    }

    proptest! {
        #[test]
        fn recognize_is_the_prefixed_subsequence(
            spans in prop::collection::vec(
                prop_oneof![
                    "s/[a-z]{0,4}/[a-z]{0,4}/g?",
                    "[a-z/ ]{0,8}",
                ],
                0..12,
            )
        ) {
            let expected: Vec<&String> = spans.iter().filter(|s| s.starts_with("s/")).collect();
            let actual: Vec<SedCommand> = recognize(spans.iter().map(String::as_str)).collect();

            prop_assert_eq!(actual.len(), expected.len());
            for (command, span) in actual.iter().zip(expected) {
                prop_assert_eq!(command.as_str(), span.as_str());
            }
        }
    }
}
