//! Dispatcher with automatic failover across providers
//!
//! One [`Dispatcher::ask`] call tries providers one at a time in registry
//! order. A quota or transient failure moves on to the next untried
//! provider; anything else ends the call. The conversation is written only
//! once, after a provider has answered.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::classifier::{ErrorClass, classify};
use crate::conversation::{Conversation, Turn};
use crate::registry::{ProviderRegistry, RegisteredProvider};

/// Provider switches allowed per call when none is configured
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// What happened on one provider invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failed { class: ErrorClass, detail: String },
}

/// One provider invocation inside a single `ask`
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub provider_id: String,
    pub outcome: AttemptOutcome,
    pub timestamp: DateTime<Utc>,
}

/// Successful answer to one `ask`
#[derive(Debug, Clone)]
pub struct Completion {
    /// The assistant turn, already appended to the conversation
    pub reply: Turn,
    /// Provider that produced `reply`
    pub provider_id: String,
    /// True when at least one provider failed before `provider_id` answered
    pub switched: bool,
    /// Every invocation made for this call, in order
    pub attempts: Vec<AttemptRecord>,
}

impl Completion {
    /// Ids of the providers that failed before the answer arrived
    pub fn failed_providers(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter(|a| matches!(a.outcome, AttemptOutcome::Failed { .. }))
            .map(|a| a.provider_id.as_str())
            .collect()
    }
}

/// Terminal failure of one `ask`. Raw provider errors never leave the
/// dispatcher; they are folded into one of these.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("no provider is available")]
    NoProviderAvailable,

    #[error("all configured providers are unavailable (tried: {})", .tried.join(", "))]
    AllProvidersExhausted {
        tried: Vec<String>,
        last: ErrorClass,
    },

    #[error("gave up after trying {} ({last} failure on the last one)", .tried.join(", "))]
    RetriesExhausted {
        tried: Vec<String>,
        last: ErrorClass,
    },

    #[error("provider '{provider_id}' failed ({class}): {detail}")]
    Fatal {
        provider_id: String,
        /// `Fatal` or `Unknown`
        class: ErrorClass,
        detail: String,
    },

    #[error("no answer within {}s", .after.as_secs())]
    TimedOut { after: Duration },
}

impl DispatchError {
    /// Providers invoked before giving up
    pub fn tried(&self) -> &[String] {
        match self {
            Self::AllProvidersExhausted { tried, .. } | Self::RetriesExhausted { tried, .. } => {
                tried
            }
            Self::Fatal { provider_id, .. } => std::slice::from_ref(provider_id),
            Self::NoProviderAvailable | Self::TimedOut { .. } => &[],
        }
    }
}

/// Per-call failover state: who has been tried and how many switches remain
struct FailoverSession {
    excluded: HashSet<String>,
    attempts: Vec<AttemptRecord>,
    switches: u32,
    max_retries: u32,
}

impl FailoverSession {
    fn new(max_retries: u32) -> Self {
        Self {
            excluded: HashSet::new(),
            attempts: Vec::new(),
            switches: 0,
            max_retries,
        }
    }

    fn record(&mut self, provider_id: &str, outcome: AttemptOutcome) {
        self.attempts.push(AttemptRecord {
            provider_id: provider_id.to_string(),
            outcome,
            timestamp: Utc::now(),
        });
    }

    fn budget_left(&self) -> bool {
        self.switches < self.max_retries
    }

    fn tried(&self) -> Vec<String> {
        self.attempts.iter().map(|a| a.provider_id.clone()).collect()
    }
}

/// Routes one conversational request to the first provider able to answer it
pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    /// Maximum provider switches per call
    max_retries: u32,
    /// Overall bound on one `ask`, across all attempts
    deadline: Option<Duration>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            max_retries: DEFAULT_MAX_RETRIES,
            deadline: None,
        }
    }

    /// Set the maximum number of provider switches per call
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Bound every `ask` by an overall deadline
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Answer `user_turn` in the context of `conversation`, using the
    /// configured retry budget and deadline
    pub async fn ask(
        &self,
        conversation: &Conversation,
        user_turn: Turn,
    ) -> Result<Completion, DispatchError> {
        match self.deadline {
            Some(after) => {
                match tokio::time::timeout(
                    after,
                    self.ask_with_retries(conversation, user_turn, self.max_retries),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("Request abandoned after {:?}", after);
                        Err(DispatchError::TimedOut { after })
                    }
                }
            }
            None => {
                self.ask_with_retries(conversation, user_turn, self.max_retries)
                    .await
            }
        }
    }

    /// Answer `user_turn`, switching provider at most `max_retries` times
    pub async fn ask_with_retries(
        &self,
        conversation: &Conversation,
        user_turn: Turn,
        max_retries: u32,
    ) -> Result<Completion, DispatchError> {
        // Providers see history plus the pending turn; the conversation
        // itself is untouched until one of them answers
        let mut pending = conversation.snapshot().await;
        pending.push(user_turn.clone());

        let mut session = FailoverSession::new(max_retries);
        let mut current: &RegisteredProvider = self
            .registry
            .all_candidates()
            .next()
            .ok_or(DispatchError::NoProviderAvailable)?;

        loop {
            let id = current.descriptor.id.as_str();
            debug!(
                "Trying provider {} ({}/{}) switch {}/{}",
                id,
                current.client.provider_name(),
                current.client.model(),
                session.switches,
                max_retries,
            );

            let error = match current.client.complete(&pending).await {
                Ok(turn) => {
                    let reply = Turn::assistant(turn.content);
                    session.record(id, AttemptOutcome::Success);
                    conversation
                        .commit_exchange(user_turn, reply.clone())
                        .await;

                    if session.switches > 0 {
                        info!("Request succeeded on failover provider {}", id);
                    }
                    return Ok(Completion {
                        reply,
                        provider_id: id.to_string(),
                        switched: session.switches > 0,
                        attempts: session.attempts,
                    });
                }
                Err(e) => e,
            };

            let class = classify(&error);
            warn!(
                "Provider {} failed (class={}): {}",
                id, class, error.message
            );
            session.record(
                id,
                AttemptOutcome::Failed {
                    class,
                    detail: error.message.clone(),
                },
            );

            if !class.should_failover() {
                return Err(DispatchError::Fatal {
                    provider_id: id.to_string(),
                    class,
                    detail: error.message,
                });
            }

            if !session.budget_left() {
                return Err(DispatchError::RetriesExhausted {
                    tried: session.tried(),
                    last: class,
                });
            }

            session.excluded.insert(id.to_string());
            session.switches += 1;

            match self.registry.next_candidate(&session.excluded) {
                Some(next) => {
                    info!("Failing over from {} to {}", id, next.descriptor.id);
                    current = next;
                }
                None => {
                    return Err(DispatchError::AllProvidersExhausted {
                        tried: session.tried(),
                        last: class,
                    });
                }
            }
        }
    }
}
