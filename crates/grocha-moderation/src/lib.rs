//! # grocha-moderation
//!
//! Social moderation by reaction quorum. A bot message anchors each
//! request; members approve by reacting with the guild's grant emoji.

pub mod approval;

pub use approval::{Approval, ApprovalBook, ApprovalKind, PendingApproval, audit_reason};
