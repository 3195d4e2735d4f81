//! Coloring Book Press - Core Engine
//!
//! # Pipeline Contract
//! 1. One theme, one variation request
//! 2. One image attempt per variation, failures isolated
//! 3. Only succeeded images become pages, in original order
//! 4. Printing is last and optional, with one fixed policy
//! 5. Every run leaves a manifest next to its files

pub mod request;
pub mod config;
pub mod service;
pub mod variations;
pub mod synthesis;
pub mod assembly;
pub mod layout;
pub mod hashing;
pub mod platform;
pub mod print;
pub mod pipeline;

pub use request::{GenerationRequest, RequestError};
pub use config::{ConfigError, PipelineConfig};
pub use service::{CompletionRequest, ImageGenerator, OpenAiClient, ServiceError, TextGenerator};
pub use variations::{parse_variations, PromptVariation, VariationGenerator, VariationSource};
pub use synthesis::{ArtifactStatus, ImageArtifact, ImageSynthesizer};
pub use assembly::{assemble, AssembledDocument, AssemblyError};
pub use layout::{LayoutError, OutputLayout};
pub use platform::{CommandOutput, CommandRunner, HostPlatform, NativeCommand};
pub use print::{
    NativePrinter, PrintError, PrintJob, PrintOutcome, PrintPolicy, PrinterBackend,
    PrinterDescriptor, PrinterListing, QueueStatus,
};
pub use pipeline::{ColoringPipeline, Delivery, ItemReport, PipelineError, RunReport};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
