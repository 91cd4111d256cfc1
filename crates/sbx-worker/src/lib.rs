//! The admission controller, exclusive worker loop, and timeout supervisor
//! (spec components C5, C7, C9) sitting on top of `sbx-store` and
//! `sbx-sandbox`.

pub mod admission;
pub mod report_envelope;
pub mod sandbox_runner;
pub mod shutdown;
pub mod timeout_supervisor;
pub mod worker;

pub use admission::{AdmissionController, AdmissionOutcome, ReportMetadata};
pub use sandbox_runner::{ContainerSupervisor, DockerContainerSupervisor, DockerSandboxInvoker, SandboxInvoker};
pub use shutdown::ShutdownSignal;
pub use timeout_supervisor::{RunningTaskStatus, TimeoutStatus, TimeoutSupervisor};
pub use worker::{Worker, WorkerSettings};
