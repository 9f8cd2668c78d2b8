use crate::config::LauncherConfig;
use crate::error::{AppError, Result};

pub fn validate_config(config: &LauncherConfig) -> Result<()> {
    validate_binary(&config.binary)?;
    for hook in config
        .on_ready_commands
        .iter()
        .chain(config.on_stop_commands.iter())
    {
        validate_hook_template(hook)?;
    }
    if config.message_buffer == 0 {
        return Err(AppError::config("message_buffer must be at least 1"));
    }
    if config.dev.port == Some(0) {
        return Err(AppError::config("dev.port must not be 0"));
    }
    Ok(())
}

pub fn validate_binary(binary: &str) -> Result<()> {
    if binary.split_whitespace().next().is_none() {
        return Err(AppError::config("binary must not be empty"));
    }
    Ok(())
}

pub fn validate_hook_template(template: &str) -> Result<()> {
    if template.split_whitespace().next().is_none() {
        return Err(AppError::config("hook command must not be empty"));
    }
    if has_unbalanced_placeholder(template) {
        return Err(AppError::config(format!(
            "Unterminated placeholder in hook command: {}",
            template
        )));
    }
    Ok(())
}

fn has_unbalanced_placeholder(template: &str) -> bool {
    let mut open = false;
    for c in template.chars() {
        match c {
            '{' if open => return true,
            '{' => open = true,
            '}' => open = false,
            _ => {}
        }
    }
    open
}
