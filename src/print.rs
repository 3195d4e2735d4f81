//! Print Delivery
//!
//! One fixed print policy and one capability interface (`list`, `submit`,
//! `status`). Callers never branch on the host; `NativePrinter` picks the
//! host toolchain once, at construction.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::assembly::AssembledDocument;
use crate::platform::{CommandRunner, HostPlatform, NativeCommand, SystemRunner};

pub const UNSUPPORTED_STATUS: &str = "queue status is not supported on this platform";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrintError {
    #[error("file not found: {0}")]
    DocumentNotFound(PathBuf),

    #[error("Copies must be at least 1")]
    InvalidCopies,

    #[error("Printer name must not be empty")]
    EmptyPrinterName,

    #[error("Printer '{0}' not found")]
    PrinterNotFound(String),

    #[error("Required printing tool not found: {0}")]
    ToolUnavailable(String),

    #[error("{tool} failed: {reason}")]
    ToolFailed { tool: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sides {
    OneSided,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scaling {
    FitToPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
}

/// Physical output settings. There is exactly one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintPolicy {
    pub paper: PaperSize,
    pub sides: Sides,
    pub scaling: Scaling,
    pub orientation: Orientation,
}

impl Default for PrintPolicy {
    fn default() -> Self {
        Self {
            paper: PaperSize::A4,
            sides: Sides::OneSided,
            scaling: Scaling::FitToPage,
            orientation: Orientation::Portrait,
        }
    }
}

/// Device name as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrinterDescriptor {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterListing {
    pub printers: Vec<PrinterDescriptor>,
    /// Set when the native listing tool could not be run.
    pub tool_unavailable: Option<String>,
}

impl PrinterListing {
    pub fn contains(&self, name: &str) -> bool {
        self.printers.iter().any(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PrintOutcome {
    Succeeded { output: String },
    Failed { reason: String },
}

impl PrintOutcome {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum QueueStatus {
    Report(String),
    Unsupported(String),
    /// The host's queue tool is not installed; carries the tool name.
    ToolUnavailable(String),
}

/// A document on disk, a target device and a copy count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    document_path: PathBuf,
    printer_name: String,
    copies: u32,
    policy: PrintPolicy,
}

impl PrintJob {
    pub fn new(document_path: impl Into<PathBuf>, printer_name: impl Into<String>, copies: u32) -> Result<Self, PrintError> {
        let document_path = document_path.into();
        let printer_name = printer_name.into();

        if !document_path.is_file() {
            return Err(PrintError::DocumentNotFound(document_path));
        }
        if printer_name.trim().is_empty() {
            return Err(PrintError::EmptyPrinterName);
        }
        if copies == 0 {
            return Err(PrintError::InvalidCopies);
        }

        Ok(Self {
            document_path,
            printer_name,
            copies,
            policy: PrintPolicy::default(),
        })
    }

    pub fn from_document(document: &AssembledDocument, printer_name: impl Into<String>, copies: u32) -> Result<Self, PrintError> {
        Self::new(document.path.clone(), printer_name, copies)
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    pub fn printer_name(&self) -> &str {
        &self.printer_name
    }

    pub fn copies(&self) -> u32 {
        self.copies
    }

    pub fn policy(&self) -> &PrintPolicy {
        &self.policy
    }
}

/// Capability interface over a host's printing toolchain.
pub trait PrinterBackend {
    fn list_printers(&self) -> PrinterListing;
    fn submit(&self, job: &PrintJob) -> PrintOutcome;
    fn queue_status(&self, printer: Option<&str>) -> Result<QueueStatus, PrintError>;
}

pub struct NativePrinter<R = SystemRunner> {
    host: HostPlatform,
    runner: R,
}

impl NativePrinter<SystemRunner> {
    pub fn detect() -> Self {
        Self::with_runner(HostPlatform::detect(), SystemRunner)
    }
}

impl<R: CommandRunner> NativePrinter<R> {
    pub fn with_runner(host: HostPlatform, runner: R) -> Self {
        Self { host, runner }
    }

    /// Resolve `name` against the host's listing.
    pub fn find_printer(&self, name: &str) -> Result<PrinterDescriptor, PrintError> {
        let listing = self.list_printers();
        if let Some(tool) = listing.tool_unavailable {
            return Err(PrintError::ToolUnavailable(tool));
        }
        listing
            .printers
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| PrintError::PrinterNotFound(name.to_string()))
    }

    fn run(&self, command: &NativeCommand) -> Result<String, PrintError> {
        let output = self.runner.run(command).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => PrintError::ToolUnavailable(command.program.clone()),
            _ => PrintError::ToolFailed {
                tool: command.program.clone(),
                reason: e.to_string(),
            },
        })?;

        if output.success {
            return Ok(output.stdout);
        }

        let diagnostic = output.stderr.trim();
        let reason = if diagnostic.is_empty() {
            match output.code {
                Some(code) => format!("exited with code {code}"),
                None => "terminated by signal".to_string(),
            }
        } else {
            diagnostic.to_string()
        };
        Err(PrintError::ToolFailed {
            tool: command.program.clone(),
            reason,
        })
    }
}

impl<R: CommandRunner> PrinterBackend for NativePrinter<R> {
    fn list_printers(&self) -> PrinterListing {
        let command = self.host.list_command();
        match self.run(&command) {
            Ok(stdout) => {
                let mut printers: Vec<PrinterDescriptor> = Vec::new();
                for name in self.host.parse_listing(&stdout) {
                    if !printers.iter().any(|p| p.name == name) {
                        printers.push(PrinterDescriptor { name });
                    }
                }
                PrinterListing { printers, tool_unavailable: None }
            }
            Err(PrintError::ToolUnavailable(tool)) => {
                warn!(%tool, "printer listing tool not found");
                PrinterListing { printers: vec![], tool_unavailable: Some(tool) }
            }
            Err(e) => {
                warn!(error = %e, "printer listing failed");
                PrinterListing::default()
            }
        }
    }

    fn submit(&self, job: &PrintJob) -> PrintOutcome {
        if !job.document_path().is_file() {
            return PrintOutcome::Failed {
                reason: PrintError::DocumentNotFound(job.document_path().to_path_buf()).to_string(),
            };
        }

        info!(
            printer = job.printer_name(),
            copies = job.copies(),
            path = %job.document_path().display(),
            "submitting print job (A4, one-sided, fit-to-page, portrait)"
        );

        match self.run(&self.host.submit_command(job)) {
            Ok(stdout) => PrintOutcome::Succeeded { output: stdout.trim().to_string() },
            Err(e) => PrintOutcome::Failed { reason: e.to_string() },
        }
    }

    fn queue_status(&self, printer: Option<&str>) -> Result<QueueStatus, PrintError> {
        match self.host.status_command(printer) {
            Some(command) => match self.run(&command) {
                Ok(stdout) => Ok(QueueStatus::Report(stdout)),
                Err(PrintError::ToolUnavailable(tool)) => {
                    warn!(%tool, "queue status tool not found");
                    Ok(QueueStatus::ToolUnavailable(tool))
                }
                Err(e) => Err(e),
            },
            None => Ok(QueueStatus::Unsupported(UNSUPPORTED_STATUS.to_string())),
        }
    }
}
