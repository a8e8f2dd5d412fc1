//! Shared domain types for the Juleha gateway.
//!
//! Everything that crosses a crate boundary lives here: the catalog
//! entities, the closed vocabularies they are canonicalized against, the
//! chat wire types, and the normalized shape of an enrichment item.

mod entities;
mod item;
mod message;
mod vocab;

pub use entities::{
    CandidateDraft, CandidateLink, CandidateStatus, JobStatus, LinkBackup, MainLink, QueueJob,
    ToolCheck,
};
pub use item::NormalizedItem;
pub use message::{
    ChatMessage, ChatReply, ChatRequest, ContentPart, IncomingMessage, MessageContent, Role,
    VerifiedLink,
};
pub use vocab::{Ability, PricingTier, Tag, infer_abilities, pricing_flags_from_text};
