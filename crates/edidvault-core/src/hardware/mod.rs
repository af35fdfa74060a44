//! Hardware side: transport seams and the write-verify workflow.

pub mod transport;
pub mod workflow;

pub use transport::{EdidTransport, KernelEdidView, SysfsDrmView};
pub use workflow::{WriteOutcome, WriteReport, WriteRequest, WriteVerifyWorkflow};
