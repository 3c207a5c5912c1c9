//! Reputation checks for the command layer.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use rosterwatch_protocol::PersonaId;
use rosterwatch_retry::{RetryError, RetryPolicy};

use crate::collab::{ReputationLookup, ReputationProfile, StatusCheck};
use crate::CollabError;

/// Reply shown when a lookup could not be completed.
pub const NETWORK_ISSUE: &str = "network issue, needs manual handling";

/// Everything known about one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReputationReport {
    pub profile: ReputationProfile,
    /// `None` when the status check failed.
    pub community: Option<StatusCheck>,
    pub ban_case: Option<StatusCheck>,
}

/// Outcome of [`ReputationService::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReputationReply {
    Found(ReputationReport),
    NotFound { name: String },
    /// Retries ran out or the lookup was refused.
    Unavailable { name: String },
}

impl fmt::Display for ReputationReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(report) => {
                let p = &report.profile;
                write!(f, "{} ({})", p.name, p.persona_id)?;
                if let Some(registered) = p.register_date {
                    write!(f, ", registered {}", registered.format("%Y-%m-%d"))?;
                }
                if let Some(login) = p.last_login {
                    write!(f, ", last login {}", login.format("%Y-%m-%d"))?;
                }
                write!(f, "; community: ")?;
                match &report.community {
                    Some(status) => write!(f, "{status}")?,
                    None => write!(f, "unknown")?,
                }
                write!(f, "; ban case: ")?;
                match &report.ban_case {
                    Some(status) => write!(f, "{status}"),
                    None => write!(f, "unknown"),
                }
            }
            Self::NotFound { name } => write!(f, "player {name} not found"),
            Self::Unavailable { name } => write!(f, "{name}: {NETWORK_ISSUE}"),
        }
    }
}

/// Reputation lookups under a bounded retry policy.
#[derive(Clone)]
pub struct ReputationService {
    lookup: Arc<dyn ReputationLookup>,
    policy: RetryPolicy,
}

impl ReputationService {
    pub fn new(lookup: Arc<dyn ReputationLookup>, policy: RetryPolicy) -> Self {
        Self { lookup, policy }
    }

    /// Looks a player up by name, then fetches both status checks.
    ///
    /// An unknown name is [`ReputationReply::NotFound`]. A name lookup that
    /// keeps failing is [`ReputationReply::Unavailable`]. Status checks that
    /// fail only blank out their own field.
    pub async fn check(&self, name: &str) -> ReputationReply {
        let lookup = &self.lookup;
        let profile = match self
            .policy
            .run(|_| lookup.lookup_by_name(name), CollabError::is_transient)
            .await
        {
            Ok(profile) => profile,
            Err(RetryError::Permanent(CollabError::NotFound(_))) => {
                tracing::debug!(name, "reputation lookup: not found");
                return ReputationReply::NotFound {
                    name: name.to_string(),
                };
            }
            Err(error) => {
                tracing::warn!(name, %error, "reputation lookup failed");
                return ReputationReply::Unavailable {
                    name: name.to_string(),
                };
            }
        };

        let persona_id = profile.persona_id;
        let (community, ban_case) = tokio::join!(
            self.status("community", persona_id, |id| lookup.community_status(id)),
            self.status("ban case", persona_id, |id| lookup.ban_case_status(id)),
        );

        ReputationReply::Found(ReputationReport {
            profile,
            community,
            ban_case,
        })
    }

    async fn status<F, Fut>(
        &self,
        what: &str,
        persona_id: PersonaId,
        check: F,
    ) -> Option<StatusCheck>
    where
        F: Fn(PersonaId) -> Fut,
        Fut: Future<Output = Result<StatusCheck, CollabError>>,
    {
        match self
            .policy
            .run(|_| check(persona_id), CollabError::is_transient)
            .await
        {
            Ok(status) => Some(status),
            Err(error) => {
                tracing::warn!(%persona_id, %error, check = what, "status check failed");
                None
            }
        }
    }
}
