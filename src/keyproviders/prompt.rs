// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Prompting for missing credentials.

use std::io::{BufRead, Write};

use zeroize::Zeroizing;

use super::error::KeyProviderError;

/// Source of values a provider could not find elsewhere.
///
/// An empty answer means "no value". Cloud providers keep it as an empty
/// credential, so a non-interactive run still reaches `decrypt_key`.
pub trait CredentialPrompt: Send + Sync {
    fn prompt(&self, message: &str) -> Result<String, KeyProviderError>;

    fn prompt_secret(&self, message: &str) -> Result<Zeroizing<String>, KeyProviderError> {
        self.prompt(message).map(Zeroizing::new)
    }
}

/// Asks on stderr and reads one line from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct InteractivePrompt;

impl CredentialPrompt for InteractivePrompt {
    fn prompt(&self, message: &str) -> Result<String, KeyProviderError> {
        let mut stderr = std::io::stderr().lock();
        write!(stderr, "{}: ", message).map_err(KeyProviderError::Prompt)?;
        stderr.flush().map_err(KeyProviderError::Prompt)?;

        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(KeyProviderError::Prompt)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Never asks; every prompt yields an empty answer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractivePrompt;

impl CredentialPrompt for NonInteractivePrompt {
    fn prompt(&self, _message: &str) -> Result<String, KeyProviderError> {
        Ok(String::new())
    }
}
