//! Deterministic engines that compute metrics over a [`ConflictNetwork`].
//!
//! None of these touch the oracle. Given the same network they produce the
//! same result, which is what lets stations 4 to 7 be tested without a model.
//!
//! [`ConflictNetwork`]: crate::network::ConflictNetwork

pub mod diagnostics;
pub mod efficiency;
pub mod episodic;
pub mod evolution;
pub mod stats;

pub use diagnostics::{CriticalityLevel, DiagnosticReport, NetworkDiagnostics, Severity};
pub use efficiency::{EfficiencyAnalyzer, EfficiencyMetrics, EfficiencyRating};
pub use episodic::{EpisodicIntegration, EpisodicIntegrator, DEFAULT_EPISODES_PER_SEASON};
pub use evolution::{DynamicAnalysis, EvolutionAnalyzer};
