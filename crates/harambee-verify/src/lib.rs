// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payment verification for the Harambee donation bot.
//!
//! - [`TierTable`] maps donation amounts to reward tiers.
//! - [`VerificationEngine`] runs one polling task per pending payment and
//!   settles it as completed, failed, timed out or cancelled.
//! - [`DonationService`] validates a donation, pushes the payment prompt
//!   through the gateway and hands the new payment to the engine.

pub mod donation;
pub mod engine;
pub mod messages;
pub mod registry;
mod retry;
pub mod tier;

pub use donation::{DonationReceipt, DonationRequest, DonationService, DonationSettings};
pub use engine::{EngineSettings, ResumeReport, VerificationEngine, cancel_pending};
pub use registry::{ActiveSummary, StopReason, VerificationContext};
pub use tier::{NextTier, TierMatch, TierTable};
