use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

use grocha_core::{CustomEmoji, EmojiRef, Member, MessageId, MessageRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    GrantRole,
    Kick,
}

impl std::fmt::Display for ApprovalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalKind::GrantRole => write!(f, "grant-role"),
            ApprovalKind::Kick => write!(f, "kick"),
        }
    }
}

/// An open social decision anchored on a bot message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingApproval {
    pub anchor: MessageRef,
    pub kind: ApprovalKind,
    pub subjects: Vec<Member>,
    /// Distinct approvers needed.
    pub threshold: usize,
    pub created_at: DateTime<Utc>,
}

/// A request whose quorum is met, ready to be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    pub anchor: MessageRef,
    pub kind: ApprovalKind,
    pub subjects: Vec<Member>,
    /// Sorted, distinct approver names.
    pub approvers: Vec<String>,
}

/// Open approval requests of one guild, keyed by anchor message.
///
/// Quorum is recomputed from the full reactor list on every evaluation, so
/// replaying an event never double-counts.
#[derive(Debug)]
pub struct ApprovalBook {
    grant_quorum: usize,
    kick_quorum: usize,
    pending: HashMap<MessageId, PendingApproval>,
}

impl Default for ApprovalBook {
    fn default() -> Self {
        Self::new(1, 3)
    }
}

impl ApprovalBook {
    pub fn new(grant_quorum: usize, kick_quorum: usize) -> Self {
        Self {
            grant_quorum,
            kick_quorum,
            pending: HashMap::new(),
        }
    }

    pub fn kick_quorum(&self) -> usize {
        self.kick_quorum
    }

    /// Members a kick may target: bots are never kicked.
    pub fn kick_subjects(members: &[Member]) -> Vec<Member> {
        members.iter().filter(|m| !m.bot).cloned().collect()
    }

    pub fn open_grant(
        &mut self,
        anchor: MessageRef,
        member: Member,
        now: DateTime<Utc>,
    ) -> Option<&PendingApproval> {
        self.open(anchor, ApprovalKind::GrantRole, vec![member], self.grant_quorum, now)
    }

    /// Opens a kick request unless every targeted member is a bot.
    pub fn open_kick(
        &mut self,
        anchor: MessageRef,
        members: &[Member],
        now: DateTime<Utc>,
    ) -> Option<&PendingApproval> {
        let subjects = Self::kick_subjects(members);
        if subjects.is_empty() {
            debug!(anchor = anchor.id, "kick without eligible subject ignored");
            return None;
        }
        self.open(anchor, ApprovalKind::Kick, subjects, self.kick_quorum, now)
    }

    fn open(
        &mut self,
        anchor: MessageRef,
        kind: ApprovalKind,
        subjects: Vec<Member>,
        threshold: usize,
        now: DateTime<Utc>,
    ) -> Option<&PendingApproval> {
        if self.pending.contains_key(&anchor.id) {
            warn!(anchor = anchor.id, %kind, "anchor already holds a request");
            return None;
        }
        info!(
            anchor = anchor.id,
            %kind,
            subjects = subjects.len(),
            threshold,
            "approval request opened"
        );
        let request = PendingApproval {
            anchor,
            kind,
            subjects,
            threshold,
            created_at: now,
        };
        Some(self.pending.entry(anchor.id).or_insert(request))
    }

    pub fn get(&self, anchor: MessageId) -> Option<&PendingApproval> {
        self.pending.get(&anchor)
    }

    /// Whether a reaction with `emoji` on `anchor` can affect a request.
    pub fn concerns(&self, anchor: MessageId, emoji: &EmojiRef, grant: &CustomEmoji) -> bool {
        self.pending.contains_key(&anchor) && emoji.is(grant)
    }

    /// Check the quorum of `anchor` against everyone who reacted with the
    /// grant emoji. Returns the approval to execute when it is met.
    pub fn evaluate(&self, anchor: MessageId, reactors: &[Member]) -> Option<Approval> {
        let request = self.pending.get(&anchor)?;
        let mut seen = HashSet::new();
        let approvers: BTreeSet<String> = reactors
            .iter()
            .filter(|r| seen.insert(r.id))
            .map(|r| r.name.clone())
            .collect();
        let distinct = seen.len();
        debug!(anchor, distinct, threshold = request.threshold, "quorum evaluated");
        if distinct < request.threshold {
            return None;
        }
        Some(Approval {
            anchor: request.anchor,
            kind: request.kind,
            subjects: request.subjects.clone(),
            approvers: approvers.into_iter().collect(),
        })
    }

    /// Close the request of `anchor`.
    pub fn resolve(&mut self, anchor: MessageId) -> Option<PendingApproval> {
        let resolved = self.pending.remove(&anchor);
        if let Some(request) = &resolved {
            info!(anchor, kind = %request.kind, "approval request resolved");
        }
        resolved
    }

    /// Keep only `remaining` as subjects of `anchor`, after a partially
    /// executed action. Empty means resolved.
    pub fn retain_subjects(&mut self, anchor: MessageId, remaining: Vec<Member>) {
        if remaining.is_empty() {
            self.resolve(anchor);
        } else if let Some(request) = self.pending.get_mut(&anchor) {
            warn!(anchor, remaining = remaining.len(), "approval request kept open");
            request.subjects = remaining;
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Audit-log text attached to the executed action. The stamp is one day
/// after `now`.
pub fn audit_reason(
    kind: ApprovalKind,
    approvers: &[String],
    bot_name: &str,
    now: NaiveDateTime,
) -> String {
    let stamp = (now + Duration::days(1)).format("%Y-%m-%d %H:%M:%S");
    let names = approvers.join(", ");
    match kind {
        ApprovalKind::GrantRole => {
            format!("Permission accordée par {names} & {bot_name} le {stamp}")
        }
        ApprovalKind::Kick => format!("Utilisateur kické par {names} & {bot_name} le {stamp}"),
    }
}
