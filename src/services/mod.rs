//! Services module - the capabilities the scan engine composes.
//!
//! Each service is a synchronous, framework-agnostic building block. The engine owns the
//! loop and all timing; services only do their one job and report the result.
//!
//! # Components
//!
//! - [`FrameSource`] / [`SnapshotSource`]: current image of a scan target, or "unavailable"
//! - [`PayloadDecoder`] / [`QrDecoder`]: QR payload strings visible in a frame
//! - [`TicketExtractor`]: pulls the `ticket=<hex>` token out of a payload
//! - [`DedupGate`]: drops repeats of the ticket just raced within a cooldown
//! - [`LoginClient`] / [`MihoyoLoginClient`]: the three step claim sequence, flattened to an [`Outcome`]
//!
//! # Data flow per iteration
//!
//! ```text
//! FrameSource -> PayloadDecoder -> TicketExtractor -> DedupGate -> LoginClient
//! ```

pub mod capture;
pub mod decoder;
pub mod dedup;
pub mod login;
pub mod ticket;

pub use capture::{Capture, CaptureError, Frame, FrameSource, SnapshotSource};
pub use decoder::{PayloadDecoder, QrDecoder};
pub use dedup::{Admission, DedupGate};
pub use login::{ClaimStep, LoginClient, LoginError, MihoyoLoginClient, Outcome};
pub use ticket::TicketExtractor;
