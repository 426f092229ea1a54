//! # Ports Module
//!
//! Hexagonal boundaries: the API the coordinator exposes and the participant
//! capabilities it consumes.

pub mod inbound;
pub mod outbound;

pub use inbound::TransactionApi;
pub use outbound::{ParticipantHandle, TccParticipant, TwoPhaseParticipant};
