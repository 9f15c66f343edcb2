//! High-level operations behind the `resloc` commands.
//! Everything here is synchronous and single-threaded; user interaction and
//! file disposal come in through the [`confirm`] and [`dispose`] ports.

pub mod batch;
pub mod confirm;
pub mod dispose;
pub mod extract;
pub mod reinject;
pub mod report;
pub mod rotate;
pub mod util;

pub use batch::{
    discover, plan, run_batch, BatchOutcome, BatchReport, Candidate, SkipReason, SwapOptions,
};
pub use confirm::{AlwaysProceed, ConfirmationPort, Scripted};
pub use dispose::{Disposal, TrashDir};
pub use extract::{extract, DocumentScan, Extraction};
pub use reinject::{reinject, Reinjection};
pub use report::{prepare, translate, ReportOptions};
pub use resloc_core::{Decision, ResLocError, Result, RotationTriple, TranslatableValue};
pub use rotate::{exchange, rotate, Exchange};
