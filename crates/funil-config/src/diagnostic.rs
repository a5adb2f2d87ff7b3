// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge.
//!
//! Converts Figment deserialization errors into miette diagnostics so that
//! startup config mistakes render with codes and help text instead of a
//! bare serde message.

use miette::Diagnostic;
use thiserror::Error;

/// A configuration error with diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key failed to deserialize (unknown key, wrong type, bad enum value).
    #[error("configuration error: {message}")]
    #[diagnostic(
        code(funil::config::deserialize),
        help("check the spelling and type of the key in funil.toml (or the FUNIL_* override)")
    )]
    Deserialization {
        /// The underlying figment/serde message, including the key path.
        message: String,
    },

    /// A semantic constraint on an otherwise well-formed value.
    #[error("validation error: {message}")]
    #[diagnostic(code(funil::config::validation))]
    Validation {
        /// Description of the violated constraint.
        message: String,
    },
}

/// Split a figment error into one [`ConfigError`] per underlying failure.
///
/// Figment collects every deserialization problem in a single `Error`;
/// surfacing them individually lets the operator fix all of them in one pass.
pub fn figment_to_config_errors(err: figment::Error) -> Vec<ConfigError> {
    err.into_iter()
        .map(|e| ConfigError::Deserialization {
            message: e.to_string(),
        })
        .collect()
}

/// Render every error to stderr as a miette report.
pub fn render_errors(errors: Vec<ConfigError>) {
    for err in errors {
        let report = miette::Report::new(err);
        eprintln!("{report:?}");
    }
}
