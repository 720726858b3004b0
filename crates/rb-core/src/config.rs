use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Round limit used when `ROBOOT_MAX_LOAD_ROUNDS` is unset or unparsable.
pub const DEFAULT_MAX_LOAD_ROUNDS: usize = 20;

fn env_true(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|val| {
        let trimmed = val.trim();
        !trimmed.is_empty() && !matches!(trimmed, "0" | "false" | "FALSE" | "False")
    })
}

fn bool_from_env(key: &str) -> bool {
    env_true(key).unwrap_or(false)
}

pub fn max_load_rounds() -> usize {
    static ROUNDS: OnceLock<usize> = OnceLock::new();
    *ROUNDS.get_or_init(|| {
        std::env::var("ROBOOT_MAX_LOAD_ROUNDS")
            .ok()
            .and_then(|val| val.trim().parse().ok())
            .filter(|rounds: &usize| *rounds > 0)
            .unwrap_or(DEFAULT_MAX_LOAD_ROUNDS)
    })
}

pub fn trace_ir() -> bool {
    static TRACE: OnceLock<bool> = OnceLock::new();
    *TRACE.get_or_init(|| bool_from_env("ROBOOT_TRACE_IR"))
}

/// Per-environment knobs for module loading and compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Fixpoint rounds allowed before a load fails with `MacroRecursionExceeded`.
    pub max_rounds: usize,
    /// Pretty-print every compiled unit at debug level.
    pub trace_ir: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            max_rounds: max_load_rounds(),
            trace_ir: trace_ir(),
        }
    }
}

impl LoaderOptions {
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_fill_missing_fields_from_defaults() -> crate::Result<()> {
        let options = LoaderOptions::from_json(r#"{ "max_rounds": 3 }"#)?;
        assert_eq!(options.max_rounds, 3);
        assert_eq!(options.trace_ir, LoaderOptions::default().trace_ir);
        Ok(())
    }
}
