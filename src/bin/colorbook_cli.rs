//! Coloring Book CLI
//!
//! Commands: generate, printers, status, print
//! Outputs JSON to stdout, progress logs to stderr
//! Returns non-zero when no document was produced or a printer is unknown

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use colorbook_core::{
    ColoringPipeline, Delivery, GenerationRequest, NativePrinter, OpenAiClient, PipelineConfig,
    PrintError, PrintJob, PrintOutcome, PrinterBackend, QueueStatus,
};

#[derive(Parser)]
#[command(name = "colorbook-cli")]
#[command(about = "Coloring Book CLI - themed colouring pages to paper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a coloring book for a theme
    Generate {
        /// Main coloring topic
        #[arg(short, long)]
        theme: String,

        /// Number of pages to generate
        #[arg(short = 'n', long, default_value_t = 3)]
        count: u32,

        /// Print the finished document on this printer
        #[arg(short, long)]
        printer: Option<String>,

        /// Number of copies to print
        #[arg(short, long, default_value_t = 1)]
        copies: u32,

        /// Output root directory (overrides COLORBOOK_OUTPUT_DIR)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available printers
    Printers,

    /// Check printer queue status
    Status {
        /// Printer name (all queues when omitted)
        #[arg(short, long)]
        printer: Option<String>,
    },

    /// Print an existing PDF (A4, single-sided, fit-to-page)
    Print {
        /// Path to PDF file
        pdf: PathBuf,

        /// Printer name (use `printers` to see available printers)
        #[arg(short, long)]
        printer: String,

        /// Number of copies to print
        #[arg(short, long, default_value_t = 1)]
        copies: u32,
    },
}

fn error_json(message: impl std::fmt::Display) -> String {
    serde_json::json!({ "success": false, "error": message.to_string() }).to_string()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { theme, count, printer, copies, output } => {
            generate(theme, count, printer, copies, output)
        }

        Commands::Printers => {
            let listing = NativePrinter::detect().list_printers();
            match serde_json::to_string_pretty(&listing) {
                Ok(json) => println!("{json}"),
                Err(e) => println!("{}", error_json(e)),
            }
            ExitCode::SUCCESS
        }

        Commands::Status { printer } => {
            let output = match NativePrinter::detect().queue_status(printer.as_deref()) {
                Ok(QueueStatus::Report(text)) => serde_json::json!({ "status": text }),
                Ok(QueueStatus::Unsupported(text)) => serde_json::json!({ "unsupported": text }),
                Ok(QueueStatus::ToolUnavailable(tool)) => {
                    serde_json::json!({ "error": format!("{tool} command not found") })
                }
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            };
            println!("{output}");
            ExitCode::SUCCESS
        }

        Commands::Print { pdf, printer, copies } => {
            let backend = NativePrinter::detect();
            if let Err(e) = backend.find_printer(&printer) {
                println!("{}", error_json(e));
                return ExitCode::FAILURE;
            }

            let job = match PrintJob::new(pdf, printer, copies) {
                Ok(job) => job,
                Err(e) => {
                    println!("{}", error_json(e));
                    return ExitCode::FAILURE;
                }
            };

            let outcome = backend.submit(&job);
            println!("{}", serde_json::json!(outcome));
            match outcome {
                PrintOutcome::Succeeded { .. } => ExitCode::SUCCESS,
                PrintOutcome::Failed { .. } => ExitCode::FAILURE,
            }
        }
    }
}

fn generate(
    theme: String,
    count: u32,
    printer: Option<String>,
    copies: u32,
    output: Option<PathBuf>,
) -> ExitCode {
    let request = match GenerationRequest::new(theme, count) {
        Ok(r) => r,
        Err(e) => {
            println!("{}", error_json(e));
            return ExitCode::FAILURE;
        }
    };

    let mut config = match PipelineConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            println!("{}", error_json(e));
            return ExitCode::FAILURE;
        }
    };
    if let Some(dir) = output {
        config.output_dir = dir;
    }

    // Resolve the printer before spending any generation calls
    let native = NativePrinter::detect();
    if let Some(name) = &printer {
        if copies == 0 {
            println!("{}", error_json(PrintError::InvalidCopies));
            return ExitCode::FAILURE;
        }
        if let Err(e) = native.find_printer(name) {
            println!("{}", error_json(e));
            return ExitCode::FAILURE;
        }
    }

    let client = match OpenAiClient::new(&config) {
        Ok(c) => c,
        Err(e) => {
            println!("{}", error_json(e));
            return ExitCode::FAILURE;
        }
    };

    let pipeline = ColoringPipeline::from_config(&client, &config);
    let delivery = printer.map(|printer_name| Delivery {
        printer: &native,
        printer_name,
        copies,
    });

    match pipeline.run(&request, delivery.as_ref()) {
        Ok(report) => {
            let has_document = report.has_document();
            let output = serde_json::json!({
                "success": has_document,
                "report": report,
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap_or_else(|e| error_json(e)));
            if has_document {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
        Err(e) => {
            println!("{}", error_json(e));
            ExitCode::from(2)
        }
    }
}
