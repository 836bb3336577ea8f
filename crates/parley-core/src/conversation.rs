//! Conversation history shared across every provider that answers it

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Counts used by the presentation layer for `/history`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversationStats {
    pub user_turns: usize,
    pub assistant_turns: usize,
}

/// Append-only turn sequence.
///
/// The only ways the sequence changes are [`Conversation::commit_exchange`],
/// which appends a user turn and its reply under a single write lock, and
/// [`Conversation::clear`], which is an explicit reset requested by the
/// caller. Share it between tasks with `Arc<Conversation>`.
#[derive(Debug, Default)]
pub struct Conversation {
    turns: RwLock<Vec<Turn>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing history
    pub fn with_turns(turns: Vec<Turn>) -> Self {
        Self {
            turns: RwLock::new(turns),
        }
    }

    /// Copy of the current history
    pub async fn snapshot(&self) -> Vec<Turn> {
        self.turns.read().await.clone()
    }

    /// Append a completed exchange. Both turns land together so concurrent
    /// callers never interleave a user turn with someone else's reply.
    pub async fn commit_exchange(&self, user: Turn, reply: Turn) {
        let mut turns = self.turns.write().await;
        turns.push(user);
        turns.push(reply);
    }

    /// Drop every turn
    pub async fn clear(&self) {
        self.turns.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.turns.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.turns.read().await.is_empty()
    }

    pub async fn stats(&self) -> ConversationStats {
        let turns = self.turns.read().await;
        turns
            .iter()
            .fold(ConversationStats::default(), |mut stats, turn| {
                match turn.role {
                    Role::User => stats.user_turns += 1,
                    Role::Assistant => stats.assistant_turns += 1,
                }
                stats
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_turn_serializes_lowercase_role() {
        let json = serde_json::to_string(&Turn::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[tokio::test]
    async fn test_commit_appends_pair_in_order() {
        let conv = Conversation::new();
        conv.commit_exchange(Turn::user("q1"), Turn::assistant("a1"))
            .await;
        conv.commit_exchange(Turn::user("q2"), Turn::assistant("a2"))
            .await;

        let turns = conv.snapshot().await;
        let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2"]);
        assert_eq!(
            conv.stats().await,
            ConversationStats {
                user_turns: 2,
                assistant_turns: 2
            }
        );
    }

    #[tokio::test]
    async fn test_snapshot_is_detached() {
        let conv = Conversation::with_turns(vec![Turn::user("hello")]);
        let mut copy = conv.snapshot().await;
        copy.push(Turn::assistant("not committed"));
        assert_eq!(conv.len().await, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let conv = Conversation::with_turns(vec![Turn::user("a"), Turn::assistant("b")]);
        assert!(!conv.is_empty().await);
        conv.clear().await;
        assert!(conv.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_commits_keep_pairs_adjacent() {
        let conv = Arc::new(Conversation::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let conv = Arc::clone(&conv);
            handles.push(tokio::spawn(async move {
                conv.commit_exchange(
                    Turn::user(format!("q{}", i)),
                    Turn::assistant(format!("a{}", i)),
                )
                .await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let turns = conv.snapshot().await;
        assert_eq!(turns.len(), 32);
        for pair in turns.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[0].content[1..], pair[1].content[1..]);
        }
    }
}
