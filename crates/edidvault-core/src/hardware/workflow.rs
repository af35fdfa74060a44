//! The write-then-verify workflow.
//!
//! Per write request the machine runs
//! `Idle -> Writing -> VerifyingPrimary -> VerifyingSecondary -> terminal`.
//! A transport failure during the write halts before any verification;
//! verification mismatches never abort early, so the operator always gets
//! both booleans. EEPROM writes are never retried automatically — re-invoke
//! explicitly after inspecting the report.

use crate::cancel::CancellationToken;
use crate::codec::{self, ByteDiff, EdidBlock};
use crate::error::{EdidError, Result};
use crate::hardware::transport::{EdidTransport, KernelEdidView};
use crate::library::DumpLibrary;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Workflow stages, logged as the machine advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Writing,
    VerifyingPrimary,
    VerifyingSecondary,
}

impl Stage {
    fn as_str(&self) -> &'static str {
        match self {
            Stage::Writing => "writing",
            Stage::VerifyingPrimary => "verifying_primary",
            Stage::VerifyingSecondary => "verifying_secondary",
        }
    }
}

/// Terminal state of one write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Both verification paths read back the written bytes.
    Success,
    /// Exactly one path matched. Not full success: the mismatched path may
    /// be a stale kernel cache rather than a bad write, and the caller must
    /// not conflate the two.
    PartialSuccess,
    /// The write failed, was cancelled, or neither path matched.
    Failed,
}

/// One write request. `confirmed` is the operator's explicit
/// destructive-action acknowledgement naming this connector and file.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub connector: String,
    pub filename: String,
    pub confirmed: bool,
    pub cancel: CancellationToken,
}

/// Full report of a write attempt. The two verification booleans are always
/// reported individually, never collapsed into one pass/fail bit.
#[derive(Debug, Clone, Serialize)]
pub struct WriteReport {
    pub connector: String,
    pub bus: String,
    pub verified_primary: bool,
    pub verified_secondary: bool,
    pub outcome: WriteOutcome,
    /// Present when the write itself failed or was cancelled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Byte divergences seen by the primary (I2C) re-read.
    pub primary_diff: Vec<ByteDiff>,
    /// Byte divergences seen by the secondary (DRM) re-read.
    pub secondary_diff: Vec<ByteDiff>,
}

impl WriteReport {
    fn failed(connector: &str, bus: &str, reason: impl Into<String>) -> Self {
        Self {
            connector: connector.to_string(),
            bus: bus.to_string(),
            verified_primary: false,
            verified_secondary: false,
            outcome: WriteOutcome::Failed,
            failure: Some(reason.into()),
            primary_diff: Vec::new(),
            secondary_diff: Vec::new(),
        }
    }
}

/// Orchestrates load -> write -> primary verify -> secondary verify.
///
/// Holds no per-request state; callers serialize requests per connector (see
/// `EdidVault`), this type only runs one sequence.
pub struct WriteVerifyWorkflow {
    transport: Arc<dyn EdidTransport>,
    kernel: Arc<dyn KernelEdidView>,
}

impl WriteVerifyWorkflow {
    pub fn new(transport: Arc<dyn EdidTransport>, kernel: Arc<dyn KernelEdidView>) -> Self {
        Self { transport, kernel }
    }

    /// Run one write-verify sequence.
    ///
    /// Precondition failures (missing confirmation, missing or undecodable
    /// dump) return `Err(PreconditionUnmet)` before anything touches the
    /// device. Once the machine leaves `Idle`, problems are reported inside
    /// the `WriteReport` instead, so the caller always learns which bus was
    /// involved and what each verification path saw.
    pub async fn run(&self, library: &DumpLibrary, request: &WriteRequest) -> Result<WriteReport> {
        let source = self.check_preconditions(library, request)?;
        let bytes = source.as_bytes();

        let bus = self.transport.resolve_bus(&request.connector).await?;
        info!(
            connector = %request.connector,
            bus = %bus,
            filename = %request.filename,
            len = bytes.len(),
            "starting EDID write-verify sequence"
        );

        // Writing
        debug!(stage = Stage::Writing.as_str(), bus = %bus, "stage transition");
        if request.cancel.is_cancelled() {
            return Ok(WriteReport::failed(
                &request.connector,
                &bus,
                "cancelled before write",
            ));
        }
        if let Err(e) = self.transport.write_edid(&bus, bytes).await {
            warn!(bus = %bus, error = %e, "EDID write failed; verification skipped");
            return Ok(WriteReport::failed(&request.connector, &bus, e.to_string()));
        }

        if request.cancel.is_cancelled() {
            // The bytes may already be on the device, but a cancelled
            // sequence must never report Success
            return Ok(WriteReport::failed(
                &request.connector,
                &bus,
                "cancelled after write, before verification",
            ));
        }

        // VerifyingPrimary: re-read through the same transport
        debug!(stage = Stage::VerifyingPrimary.as_str(), bus = %bus, "stage transition");
        let (verified_primary, primary_diff) = match self.transport.read_edid(&bus, bytes.len()).await
        {
            Ok(readback) => {
                let ok = codec::bytes_equal(bytes, &readback);
                (ok, if ok { Vec::new() } else { codec::diff(bytes, &readback) })
            }
            Err(e) => {
                warn!(bus = %bus, error = %e, "primary verification read failed");
                (false, Vec::new())
            }
        };

        if request.cancel.is_cancelled() {
            return Ok(WriteReport::failed(
                &request.connector,
                &bus,
                "cancelled during verification",
            ));
        }

        // VerifyingSecondary: independent DRM path, always attempted so the
        // operator gets full diagnostics even after a primary mismatch
        debug!(stage = Stage::VerifyingSecondary.as_str(), connector = %request.connector, "stage transition");
        let (verified_secondary, secondary_diff) =
            match self.kernel.read_edid(&request.connector).await {
                Ok(readback) => {
                    let ok = codec::bytes_equal(bytes, &readback);
                    (ok, if ok { Vec::new() } else { codec::diff(bytes, &readback) })
                }
                Err(e) => {
                    warn!(connector = %request.connector, error = %e, "secondary verification read failed");
                    (false, Vec::new())
                }
            };

        // A cancellation that lands while a verification read is in flight
        // must still terminate in Failed, whatever the reads saw
        if request.cancel.is_cancelled() {
            return Ok(WriteReport::failed(
                &request.connector,
                &bus,
                "cancelled during verification",
            ));
        }

        let outcome = match (verified_primary, verified_secondary) {
            (true, true) => WriteOutcome::Success,
            (true, false) | (false, true) => WriteOutcome::PartialSuccess,
            // The write call succeeded but neither path saw the bytes:
            // treat as a failed attempt, not a partial one
            (false, false) => WriteOutcome::Failed,
        };

        info!(
            connector = %request.connector,
            bus = %bus,
            verified_primary,
            verified_secondary,
            outcome = ?outcome,
            "EDID write-verify sequence finished"
        );

        Ok(WriteReport {
            connector: request.connector.clone(),
            bus,
            verified_primary,
            verified_secondary,
            outcome,
            failure: None,
            primary_diff,
            secondary_diff,
        })
    }

    /// Idle -> Writing gate: confirmation, dump presence, decodability.
    fn check_preconditions(
        &self,
        library: &DumpLibrary,
        request: &WriteRequest,
    ) -> Result<EdidBlock> {
        if request.connector.is_empty() {
            return Err(EdidError::PreconditionUnmet {
                message: "no target connector selected".to_string(),
            });
        }
        if !request.confirmed {
            return Err(EdidError::PreconditionUnmet {
                message: format!(
                    "write of {} to {} requires explicit confirmation",
                    request.filename, request.connector
                ),
            });
        }
        library
            .get(&request.filename)
            .map_err(|e| EdidError::PreconditionUnmet {
                message: format!("source dump {}: {}", request.filename, e),
            })
    }
}
