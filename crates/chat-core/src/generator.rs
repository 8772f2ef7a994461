use crate::templates::{pick_template, render};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// A single chat message as posted to the message store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub from: String,
    pub to: String,
    pub content: String,
}

pub fn user_id(index: u64) -> String {
    format!("User{}", index)
}

/// Lazy ring-topology conversation.
///
/// Sender `i` always addresses `User((i + 1) % num_users)`, `messages_per_user`
/// times in a row. Addressing is deterministic; content is drawn from the
/// template bank with the generator's RNG.
pub struct ConversationGenerator {
    num_users: u64,
    messages_per_user: u64,
    sender: u64,
    sent_by_sender: u64,
    rng: StdRng,
}

impl ConversationGenerator {
    pub fn new(num_users: u64, messages_per_user: u64) -> Self {
        Self::with_rng(num_users, messages_per_user, StdRng::from_entropy())
    }

    /// Reproducible content as well as addressing.
    pub fn seeded(num_users: u64, messages_per_user: u64, seed: u64) -> Self {
        Self::with_rng(num_users, messages_per_user, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(num_users: u64, messages_per_user: u64, rng: StdRng) -> Self {
        Self {
            num_users,
            messages_per_user,
            sender: 0,
            sent_by_sender: 0,
            rng,
        }
    }

    pub fn total(&self) -> u64 {
        self.num_users.saturating_mul(self.messages_per_user)
    }

    fn remaining(&self) -> u64 {
        if self.sender >= self.num_users || self.messages_per_user == 0 {
            return 0;
        }
        let done = self.sender * self.messages_per_user + self.sent_by_sender;
        self.total() - done
    }
}

impl Iterator for ConversationGenerator {
    type Item = MessageRecord;

    fn next(&mut self) -> Option<MessageRecord> {
        if self.remaining() == 0 {
            return None;
        }

        let from = user_id(self.sender);
        let to = user_id((self.sender + 1) % self.num_users);
        let content = render(pick_template(&mut self.rng), &to);

        self.sent_by_sender += 1;
        if self.sent_by_sender == self.messages_per_user {
            self.sent_by_sender = 0;
            self.sender += 1;
        }

        Some(MessageRecord { from, to, content })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ConversationGenerator {}
