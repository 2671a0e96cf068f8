//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::Settings;
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Saum Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("External Tools").bold());
    checks.push(check_tool("ffmpeg", install_hint_ffmpeg()));
    checks.push(check_tool("ffprobe", install_hint_ffmpeg()));
    for check in &checks[checks.len() - 2..] {
        check.print();
    }
    println!();

    println!("{}", style("API Keys").bold());
    checks.push(check_api_key(
        "OPENAI_API_KEY",
        "required for the whisper/gpt4o providers, keyterms, and correction",
    ));
    checks.push(check_api_key(
        "DEEPGRAM_API_KEY",
        "required for the deepgram provider",
    ));
    for check in &checks[checks.len() - 2..] {
        check.print();
    }
    println!();

    println!("{}", style("Configuration").bold());
    checks.push(check_config(settings));
    checks.last().unwrap().print();
    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!("{} check(s) failed.", errors));
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed.");
    }

    Ok(())
}

fn check_tool(name: &str, hint: String) -> CheckResult {
    let result = Command::new(name)
        .arg("-version")
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .output();

    match result {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("unknown version")
                .to_string();
            CheckResult::ok(name, &version)
        }
        Ok(_) => CheckResult::error(name, "installed but returned an error", &hint),
        Err(_) => CheckResult::error(name, "not found in PATH", &hint),
    }
}

fn check_api_key(name: &str, purpose: &str) -> CheckResult {
    match std::env::var(name) {
        Ok(key) if !key.is_empty() => CheckResult::ok(name, "configured"),
        _ => CheckResult::warning(
            name,
            "not set",
            &format!("{} - export {}='...'", purpose, name),
        ),
    }
}

fn check_config(settings: &Settings) -> CheckResult {
    let path = Settings::default_config_path();
    if !path.exists() {
        return CheckResult::warning(
            "config file",
            "not found, using defaults",
            &format!("run 'saum config init' to create {}", path.display()),
        );
    }

    if settings.chunking.overlap_seconds * 2 >= settings.chunking.threshold_seconds {
        return CheckResult::warning(
            "config file",
            "overlap is large relative to the chunking threshold",
            "seam dedup works best when overlap_seconds is a small fraction of chunk size",
        );
    }

    CheckResult::ok("config file", &path.display().to_string())
}

fn install_hint_ffmpeg() -> String {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg".to_string()
    } else {
        "Install with your package manager, e.g.: apt install ffmpeg".to_string()
    }
}
