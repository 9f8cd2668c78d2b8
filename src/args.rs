//! Command line construction for the dev server.

use std::fmt;

use serde_json::Value;

use crate::config::DevOptions;
use crate::error::{AppError, Result};

/// A program plus its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Turn dev server options into `--flag value` tokens.
///
/// Each present option becomes `--<kebab-key>`. `true` booleans emit the flag
/// alone and `false` ones emit nothing. Lists repeat the flag once per element.
pub fn to_args(options: &DevOptions) -> Result<Vec<String>> {
    let Value::Object(map) = serde_json::to_value(options)? else {
        return Err(AppError::config("dev options must serialize to a table"));
    };

    let mut args = Vec::new();
    for (key, value) in map {
        let flag = format!("--{}", key);
        match value {
            Value::Null | Value::Bool(false) => {}
            Value::Bool(true) => args.push(flag),
            Value::Array(items) => {
                for item in items {
                    args.push(flag.clone());
                    args.push(scalar_to_string(item)?);
                }
            }
            scalar => {
                args.push(flag);
                args.push(scalar_to_string(scalar)?);
            }
        }
    }
    Ok(args)
}

fn scalar_to_string(value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(AppError::config(format!(
            "Unsupported option value: {}",
            other
        ))),
    }
}

/// Split `binary` on whitespace and append the option flags.
pub fn build_command(binary: &str, options: &DevOptions) -> Result<CommandLine> {
    let mut parts = binary.split_whitespace().map(str::to_string);
    let program = parts
        .next()
        .ok_or_else(|| AppError::config("binary must not be empty"))?;

    let mut args: Vec<String> = parts.collect();
    args.extend(to_args(options)?);

    Ok(CommandLine { program, args })
}
