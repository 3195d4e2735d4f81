//! Host Printing Toolchains
//!
//! The closed set of native command surfaces. Each variant knows how to
//! spell list/submit/status for its host and how to read the listing back.

use std::io;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::print::{Orientation, PaperSize, PrintJob, PrintPolicy, Scaling, Sides};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostPlatform {
    MacOs,
    Linux,
    Windows,
}

/// A native program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl NativeCommand {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Executes native commands. `io::ErrorKind::NotFound` means the tool is absent.
pub trait CommandRunner {
    fn run(&self, command: &NativeCommand) -> io::Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, command: &NativeCommand) -> io::Result<CommandOutput> {
        (**self).run(command)
    }
}

/// Spawns the real process with no stdin and captured output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &NativeCommand) -> io::Result<CommandOutput> {
        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn cups_media(paper: PaperSize) -> &'static str {
    match paper {
        PaperSize::A4 => "media=A4",
    }
}

fn cups_sides(sides: Sides) -> &'static str {
    match sides {
        Sides::OneSided => "sides=one-sided",
    }
}

fn cups_scaling(scaling: Scaling) -> &'static str {
    match scaling {
        Scaling::FitToPage => "fit-to-page",
    }
}

fn cups_orientation(orientation: Orientation) -> &'static str {
    // IPP orientation-requested enum: 3 = portrait
    match orientation {
        Orientation::Portrait => "orientation-requested=3",
    }
}

/// Quote for a single-quoted PowerShell string literal.
fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl HostPlatform {
    pub fn detect() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    pub fn list_command(self) -> NativeCommand {
        match self {
            Self::MacOs | Self::Linux => NativeCommand::new("lpstat", ["-p"]),
            Self::Windows => NativeCommand::new("wmic", ["printer", "get", "name"]),
        }
    }

    pub fn parse_listing(self, stdout: &str) -> Vec<String> {
        match self {
            Self::MacOs | Self::Linux => stdout
                .lines()
                .filter(|line| line.starts_with("printer "))
                .filter_map(|line| line.split_whitespace().nth(1))
                .map(str::to_string)
                .collect(),
            Self::Windows => stdout
                .lines()
                .skip(1)
                .map(str::trim)
                .filter(|line| !line.is_empty() && *line != "Name")
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn submit_command(self, job: &PrintJob) -> NativeCommand {
        let path = job.document_path().to_string_lossy().into_owned();
        let policy: &PrintPolicy = job.policy();

        match self {
            Self::MacOs | Self::Linux => NativeCommand::new(
                "lpr",
                [
                    "-P".to_string(),
                    job.printer_name().to_string(),
                    "-o".to_string(),
                    cups_media(policy.paper).to_string(),
                    "-o".to_string(),
                    cups_sides(policy.sides).to_string(),
                    "-o".to_string(),
                    cups_scaling(policy.scaling).to_string(),
                    "-o".to_string(),
                    cups_orientation(policy.orientation).to_string(),
                    "-#".to_string(),
                    job.copies().to_string(),
                    path,
                ],
            ),
            Self::Windows => {
                // paper, sides and scaling come from the printer's driver defaults here
                let script = format!(
                    "for ($i = 0; $i -lt {copies}; $i++) {{ \
                     Start-Process -FilePath {file} -Verb PrintTo -ArgumentList {printer} \
                     -WindowStyle Hidden }}",
                    copies = job.copies(),
                    file = ps_quote(&path),
                    printer = ps_quote(&format!("\"{}\"", job.printer_name())),
                );
                NativeCommand::new("powershell.exe", ["-NoProfile".to_string(), "-Command".to_string(), script])
            }
        }
    }

    /// `None` where the host has no queue-status tool.
    pub fn status_command(self, printer: Option<&str>) -> Option<NativeCommand> {
        match self {
            Self::MacOs | Self::Linux => Some(match printer {
                Some(name) => NativeCommand::new("lpq", ["-P", name]),
                None => NativeCommand::new("lpq", Vec::<String>::new()),
            }),
            Self::Windows => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LPSTAT: &str = "printer Office_HP is idle.  enabled since Mon 01 Jan 2024\n\
                          \tForm mounted:\n\
                          printer Brother-HL disabled since Tue 02 Jan 2024 -\n\
                          \treason unknown\n";

    #[test]
    fn test_parse_lpstat() {
        assert_eq!(
            HostPlatform::Linux.parse_listing(LPSTAT),
            vec!["Office_HP".to_string(), "Brother-HL".to_string()]
        );
        assert_eq!(HostPlatform::MacOs.parse_listing(LPSTAT).len(), 2);
        assert!(HostPlatform::Linux.parse_listing("no destinations added.\n").is_empty());
    }

    #[test]
    fn test_parse_wmic() {
        let out = "Name  \r\nMicrosoft Print to PDF  \r\n\r\nOffice Printer\r\n";
        assert_eq!(
            HostPlatform::Windows.parse_listing(out),
            vec!["Microsoft Print to PDF".to_string(), "Office Printer".to_string()]
        );
    }

    #[test]
    fn test_status_command_per_host() {
        let cmd = HostPlatform::Linux.status_command(Some("Office")).unwrap();
        assert_eq!(cmd, NativeCommand::new("lpq", ["-P", "Office"]));
        assert!(HostPlatform::MacOs.status_command(None).unwrap().args.is_empty());
        assert!(HostPlatform::Windows.status_command(Some("Office")).is_none());
    }

    #[test]
    fn test_ps_quote_escapes() {
        assert_eq!(ps_quote("C:\\it's.pdf"), "'C:\\it''s.pdf'");
    }

    #[test]
    fn test_system_runner_reports_missing_tool() {
        let cmd = NativeCommand::new("colorbook-no-such-tool-xyz", Vec::<String>::new());
        let err = SystemRunner.run(&cmd).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
