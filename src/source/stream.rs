use std::{
    collections::{HashSet, VecDeque},
    time::Duration,
};

use crate::domain::{Comment, CommentId};

/// A set of recently seen comment ids that forgets the oldest entries once it
/// is full.
#[derive(Debug, Clone)]
pub struct SeenSet {
    capacity: usize,
    order: VecDeque<CommentId>,
    members: HashSet<CommentId>,
}

impl SeenSet {
    /// Enough to cover three full listings.
    pub const DEFAULT_CAPACITY: usize = 301;

    /// Creates an empty set holding at most `capacity` ids.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Whether `id` has been seen and not yet forgotten.
    #[must_use]
    pub fn contains(&self, id: &CommentId) -> bool {
        self.members.contains(id)
    }

    /// Records `id`, returning `false` if it was already present.
    pub fn insert(&mut self, id: CommentId) -> bool {
        if self.members.contains(&id) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        self.members.insert(id.clone());
        self.order.push_back(id);
        true
    }
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// Doubling delay between polls that turn up nothing new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// Creates a backoff starting at `initial` and capped at `max`.
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.min(max);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Returns the delay to wait now and doubles the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Goes back to the initial delay.
    pub const fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(16))
    }
}

/// Turns repeated "newest comments" listings into a stream of comments that
/// each appear once, oldest first.
///
/// When created with `skip_existing`, the first listing only primes the seen
/// set so that the backlog from before start-up is never delivered.
#[derive(Debug, Clone)]
pub struct CommentStream {
    seen: SeenSet,
    pending: VecDeque<Comment>,
    skip_next: bool,
    backoff: Backoff,
}

impl CommentStream {
    /// Creates an empty stream.
    #[must_use]
    pub fn new(skip_existing: bool) -> Self {
        Self {
            seen: SeenSet::default(),
            pending: VecDeque::new(),
            skip_next: skip_existing,
            backoff: Backoff::default(),
        }
    }

    /// Replaces the delay policy used between polls.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Feeds one listing, newest comment first, and returns how many comments
    /// it contained that had not been seen before.
    pub fn ingest(&mut self, newest_first: Vec<Comment>) -> usize {
        let skip = std::mem::take(&mut self.skip_next);
        let mut fresh = 0;

        for comment in newest_first.into_iter().rev() {
            if !self.seen.insert(comment.id.clone()) {
                continue;
            }
            fresh += 1;
            if !skip {
                self.pending.push_back(comment);
            }
        }

        if skip {
            tracing::debug!(skipped = fresh, "skipped existing comments");
        }
        if fresh > 0 {
            self.backoff.reset();
        }
        fresh
    }

    /// Takes the oldest comment waiting to be delivered.
    pub fn pop(&mut self) -> Option<Comment> {
        self.pending.pop_front()
    }

    /// How long to wait before polling again.
    pub fn poll_delay(&mut self) -> Duration {
        self.backoff.next_delay()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ParentId;

    fn comment(id: &str) -> Comment {
        Comment {
            id: CommentId::new(id),
            author: None,
            body: String::new(),
            parent: ParentId::Submission("s".to_string()),
            submission: "s".to_string(),
        }
    }

    fn drain(stream: &mut CommentStream) -> Vec<String> {
        std::iter::from_fn(|| stream.pop())
            .map(|c| c.id.to_string())
            .collect()
    }

    #[test]
    fn first_listing_is_skipped_when_asked() {
        let mut stream = CommentStream::new(true);
        assert_eq!(stream.ingest(vec![comment("b"), comment("a")]), 2);
        assert!(stream.pop().is_none());

        stream.ingest(vec![comment("d"), comment("c"), comment("b"), comment("a")]);
        assert_eq!(drain(&mut stream), vec!["c", "d"]);
    }

    #[test]
    fn first_listing_is_delivered_oldest_first_otherwise() {
        let mut stream = CommentStream::new(false);
        stream.ingest(vec![comment("c"), comment("b"), comment("a")]);
        assert_eq!(drain(&mut stream), vec!["a", "b", "c"]);
    }

    #[test]
    fn repeated_comments_are_delivered_once() {
        let mut stream = CommentStream::new(false);
        stream.ingest(vec![comment("a")]);
        stream.ingest(vec![comment("b"), comment("a")]);
        assert_eq!(stream.ingest(vec![comment("b"), comment("a")]), 0);
        assert_eq!(drain(&mut stream), vec!["a", "b"]);
    }

    #[test]
    fn seen_set_forgets_the_oldest() {
        let mut seen = SeenSet::new(2);
        assert!(seen.insert(CommentId::new("a")));
        assert!(seen.insert(CommentId::new("b")));
        assert!(!seen.insert(CommentId::new("b")));
        assert!(seen.insert(CommentId::new("c")));

        assert!(!seen.contains(&CommentId::new("a")));
        assert!(seen.contains(&CommentId::new("b")));
        assert!(seen.contains(&CommentId::new("c")));
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5));
        let delays: Vec<u64> = (0..5).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn new_comments_reset_the_backoff() {
        let mut stream = CommentStream::new(false)
            .with_backoff(Backoff::new(Duration::from_secs(1), Duration::from_secs(16)));
        stream.ingest(vec![]);
        stream.poll_delay();
        stream.poll_delay();
        assert_eq!(stream.poll_delay(), Duration::from_secs(4));

        stream.ingest(vec![comment("a")]);
        assert_eq!(stream.poll_delay(), Duration::from_secs(1));
    }
}
