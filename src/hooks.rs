//! Auxiliary commands run when an instance becomes ready or stops.

use std::collections::BTreeMap;

use tokio::process::Command;

use crate::error::{AppError, Result};

/// Values substituted for `{KEY}` tokens in hook templates.
pub type Placeholders = BTreeMap<String, String>;

pub const PORT_PLACEHOLDER: &str = "PORT";
pub const HOST_PLACEHOLDER: &str = "HOST";
pub const NAME_PLACEHOLDER: &str = "NAME";

/// Max bytes of hook stderr carried in an error.
const STDERR_EXCERPT_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookMode {
    /// Abort on the first failure and return it.
    Strict,
    /// Log failures and keep going.
    BestEffort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookCommand {
    pub program: String,
    pub args: Vec<String>,
}

pub fn placeholders(name: &str, host: &str, port: u16) -> Placeholders {
    Placeholders::from([
        (PORT_PLACEHOLDER.to_string(), port.to_string()),
        (HOST_PLACEHOLDER.to_string(), host.to_string()),
        (NAME_PLACEHOLDER.to_string(), name.to_string()),
    ])
}

pub fn substitute(template: &str, values: &Placeholders) -> String {
    values
        .iter()
        .fold(template.to_string(), |acc, (key, value)| {
            acc.replace(&format!("{{{}}}", key), value)
        })
}

/// Substitute placeholders, then split on whitespace. No quoting is honoured.
pub fn prepare_hook(template: &str, values: &Placeholders) -> Result<HookCommand> {
    let expanded = substitute(template, values);
    let mut tokens = expanded.split_whitespace().map(str::to_string);
    let program = tokens
        .next()
        .ok_or_else(|| AppError::hook(template, "empty command"))?;
    Ok(HookCommand {
        program,
        args: tokens.collect(),
    })
}

async fn run_hook(template: &str, values: &Placeholders) -> Result<()> {
    let hook = prepare_hook(template, values)?;
    log::info!("Running hook: {} {}", hook.program, hook.args.join(" "));

    let output = Command::new(&hook.program)
        .args(&hook.args)
        .stdin(std::process::Stdio::null())
        .output()
        .await
        .map_err(|e| AppError::hook(template, format!("failed to spawn: {}", e)))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    let excerpt: String = stderr.chars().take(STDERR_EXCERPT_LEN).collect();
    let code = output
        .status
        .code()
        .map_or_else(|| "signal".to_string(), |c| c.to_string());
    Err(AppError::hook(
        template,
        format!("exited with {}: {}", code, excerpt),
    ))
}

/// Run `hooks` in order.
pub async fn run_hooks(hooks: &[String], values: &Placeholders, mode: HookMode) -> Result<()> {
    for template in hooks {
        match run_hook(template, values).await {
            Ok(()) => {}
            Err(e) if mode == HookMode::Strict => return Err(e),
            Err(e) => log::warn!("Ignoring failed hook: {}", e),
        }
    }
    Ok(())
}
