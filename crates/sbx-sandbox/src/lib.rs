//! Container lifecycle management and sandbox invocation (spec component
//! C8, plus the analysis-result derivation detailed in §4.7.5).

pub mod container;
pub mod invocation;
pub mod report_builder;

pub use container::{ContainerError, ContainerInfo, ContainerManager, ContainerSummary};
pub use invocation::{invoke, InvocationOutcome, InvocationSpec};
pub use report_builder::{build_analysis_result, AnalysisResult, PhaseReport};
