//! User-facing text for dispatch outcomes

use parley_core::{Completion, ConversationStats, DispatchError, ProviderDescriptor};

/// Line shown above a reply that came from a fallback provider
pub fn switch_notice(completion: &Completion) -> Option<String> {
    if !completion.switched {
        return None;
    }
    let failed = completion.failed_providers();
    Some(format!(
        "[{} unavailable, answered by {}]",
        failed.join(", "),
        completion.provider_id
    ))
}

/// Explanation for a request that produced no answer
pub fn failure_notice(err: &DispatchError) -> String {
    match err {
        DispatchError::NoProviderAvailable => {
            "No provider is configured and available. Add an API key or enable a provider in the config file, then try again.".to_string()
        }
        DispatchError::AllProvidersExhausted { last, .. }
        | DispatchError::RetriesExhausted { last, .. } => format!(
            "All configured providers are currently unavailable (tried: {}; last failure: {}). Please try again later or adjust your provider configuration.",
            err.tried().join(", "),
            last
        ),
        DispatchError::Fatal {
            provider_id,
            class,
            detail,
        } => format!(
            "Provider '{}' rejected the request ({}): {}. Check its API key and settings.",
            provider_id, class, detail
        ),
        DispatchError::TimedOut { after } => format!(
            "No provider answered within {}s. Please try again later or raise dispatch.request_timeout_secs.",
            after.as_secs()
        ),
    }
}

/// Table of configured providers in failover order
pub fn provider_listing(descriptors: &[&ProviderDescriptor]) -> String {
    if descriptors.is_empty() {
        return "No providers configured.".to_string();
    }
    let mut out = String::new();
    for (i, d) in descriptors.iter().enumerate() {
        let status = if d.available { "ready" } else { "unavailable" };
        out.push_str(&format!(
            "{:>2}. {:<16} {:<10} {:<28} priority {:<4} {}\n",
            i + 1,
            d.id,
            d.kind.to_string(),
            d.model,
            d.priority,
            status
        ));
    }
    out
}

/// Model each provider would use, in failover order
pub fn model_listing(descriptors: &[&ProviderDescriptor]) -> String {
    let mut out = String::new();
    for d in descriptors {
        out.push_str(&format!("{}: {}/{}\n", d.id, d.kind, d.model));
    }
    out
}

pub fn history_summary(stats: ConversationStats) -> String {
    format!(
        "{} turns ({} from you, {} replies)",
        stats.user_turns + stats.assistant_turns,
        stats.user_turns,
        stats.assistant_turns
    )
}
