//! The three nested benchmark runners.
//!
//! - [`ConcreteDgpRunner`] (Tier 1): samples → runs, against one DGP.
//! - [`SampledDgpRunner`] (Tier 2): runs → sampled DGPs, with sampling
//!   failure recovery.
//! - [`GridSweepRunner`] (Tier 3): DGPs → sweep rows over a parameter grid.

pub mod concrete;
pub mod sampled;
pub mod sweep;

pub use concrete::{evaluate_sample, ConcreteDgpResults, ConcreteDgpRunner};
pub use sampled::{SampledDgpResults, SampledDgpRunner};
pub use sweep::{GridSweepRunner, SweepResults, SweepRow};
