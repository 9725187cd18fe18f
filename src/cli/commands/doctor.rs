//! Doctor command - verify credentials, configuration and the catalog.

use crate::cli::Output;
use crate::config::Settings;
use crate::vector_store::Catalog;
use console::style;
use std::path::Path;

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

fn print_section(title: &str, checks: &[CheckResult]) {
    println!("{}", style(title).bold());
    for check in checks {
        check.print();
    }
    println!();
}

/// Run all diagnostic checks. Fails if any check is an error.
pub fn run_doctor(settings: &Settings, config_path: Option<&Path>) -> anyhow::Result<()> {
    Output::header("Syllabus Doctor");
    println!();
    println!("Checking credentials, configuration and the course catalog...\n");

    let mut checks = Vec::new();

    let provider_checks = vec![
        check_provider_key(settings),
        check_base_url(settings),
        check_embedding_key(),
    ];
    print_section("Model Providers", &provider_checks);
    checks.extend(provider_checks);

    let catalog_checks = vec![check_catalog(&settings.catalog_path())];
    print_section("Course Catalog", &catalog_checks);
    checks.extend(catalog_checks);

    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Settings::default_config_path);
    let mut config_checks = vec![check_config_file(&config_path)];
    if let Some(dir) = &settings.prompts.custom_dir {
        config_checks.push(check_prompts_dir(dir));
    }
    print_section("Configuration", &config_checks);
    checks.extend(config_checks);

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Syllabus.",
            errors
        ));
        anyhow::bail!("doctor found {} error(s)", errors);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Syllabus is ready to use.");
    }

    Ok(())
}

/// Show the first and last few characters of a key.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..7].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Check the key for the configured generation provider.
fn check_provider_key(settings: &Settings) -> CheckResult {
    let provider = settings.generation.provider;
    let name = format!("{} ({})", provider.api_key_env(), provider);
    let hint = format!(
        "Set with: export {}='...' or add generation.api_key to the config",
        provider.api_key_env()
    );

    match settings.generation.resolve_api_key() {
        Ok(key) => CheckResult::ok(
            &name,
            &format!("configured ({}), model {}", mask_key(&key), settings.generation.model),
        ),
        Err(e) => CheckResult::error(&name, &e.to_string(), &hint),
    }
}

fn check_base_url(settings: &Settings) -> CheckResult {
    match settings.generation.base_url() {
        Ok(Some(url)) => CheckResult::ok("Base URL", url.as_str()),
        Ok(None) => CheckResult::ok("Base URL", "provider default"),
        Err(e) => CheckResult::error(
            "Base URL",
            &e.to_string(),
            "Use a full URL, e.g. https://api.deepseek.com/v1",
        ),
    }
}

/// Check the OpenAI key used for query embeddings.
fn check_embedding_key() -> CheckResult {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if key.starts_with("sk-") && key.len() > 20 => CheckResult::ok(
            "OPENAI_API_KEY (embeddings)",
            &format!("configured ({})", mask_key(&key)),
        ),
        Ok(key) if key.is_empty() => CheckResult::error(
            "OPENAI_API_KEY (embeddings)",
            "empty",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
        Ok(_) => CheckResult::warning(
            "OPENAI_API_KEY (embeddings)",
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        Err(_) => CheckResult::error(
            "OPENAI_API_KEY (embeddings)",
            "not set",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
    }
}

/// Check that the catalog exists and parses.
fn check_catalog(path: &Path) -> CheckResult {
    let hint = "Set vector_store.catalog_path to an indexed catalog snapshot";
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return CheckResult::error("Catalog", &format!("{} not found", path.display()), hint)
        }
        Err(e) => return CheckResult::error("Catalog", &format!("error: {}", e), hint),
    };

    match serde_json::from_str::<Catalog>(&raw) {
        Ok(catalog) if catalog.courses.is_empty() => CheckResult::warning(
            "Catalog",
            &format!("{} has no courses", path.display()),
            "Every query will come back without course content",
        ),
        Ok(catalog) => CheckResult::ok(
            "Catalog",
            &format!(
                "{} ({}, {} courses, {} chunks)",
                path.display(),
                format_size(raw.len() as u64),
                catalog.courses.len(),
                catalog.chunks.len()
            ),
        ),
        Err(e) => CheckResult::error("Catalog", &format!("invalid: {}", e), hint),
    }
}

fn check_config_file(path: &Path) -> CheckResult {
    if path.exists() {
        CheckResult::ok("Config file", &format!("{}", path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: syllabus config edit",
        )
    }
}

fn check_prompts_dir(dir: &str) -> CheckResult {
    let path = Settings::expand_path(dir);
    if path.is_dir() {
        CheckResult::ok("Custom prompts", &format!("{}", path.display()))
    } else {
        CheckResult::warning(
            "Custom prompts",
            &format!("{} not found", path.display()),
            "Built-in prompts will be used",
        )
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
