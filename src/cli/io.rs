//! Input/output plumbing shared by the commands.

use std::fs;
use std::io::{IsTerminal, Read, Write};
use std::path::PathBuf;

use tracing::debug;

use crate::error::{ConfigError, Result};

/// Sentinel accepted by every file-valued option to mean stdin or stdout.
pub const DASH: &str = "-";

/// Hands out stdin at most once per invocation, so two options can't both
/// claim the same stream.
pub struct StdinGuard {
    used: bool,
}

impl StdinGuard {
    pub fn new() -> Self {
        Self { used: false }
    }

    fn read(&mut self) -> Result<Vec<u8>> {
        if self.used {
            return Err(ConfigError::StdinReused.into());
        }
        self.used = true;

        debug!("reading stdin");
        let mut data = Vec::new();
        std::io::stdin().read_to_end(&mut data)?;
        Ok(data)
    }
}

impl Default for StdinGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a named input, where `-` means stdin.
pub fn read_named(name: &str, stdin: &mut StdinGuard) -> Result<Vec<u8>> {
    if name == DASH {
        return stdin.read();
    }
    Ok(fs::read(name)?)
}

/// Read the main input: an explicit path, `-`, or stdin when omitted.
pub fn read_input(input: Option<&str>, stdin: &mut StdinGuard) -> Result<Vec<u8>> {
    match input {
        Some(name) => read_named(name, stdin),
        None => stdin.read(),
    }
}

/// Where a command writes its result.
pub enum OutputTarget {
    /// Standard output; `forced` when the user asked for it with `-o -`,
    /// which disables the binary-to-terminal guard.
    Stdout { forced: bool },
    File { path: PathBuf, overwrite: bool },
}

impl OutputTarget {
    /// Resolve the destination before any input is consumed, so an
    /// already-existing output file aborts the run early.
    ///
    /// With `in_place` (re-encryption), a missing `-o` rewrites the input
    /// file instead of printing to stdout.
    pub fn resolve(output: Option<&str>, input: Option<&str>, in_place: bool) -> Result<Self> {
        match output {
            Some(name) if name == DASH => Ok(Self::Stdout { forced: true }),
            Some(name) => {
                let path = PathBuf::from(name);
                if path.exists() {
                    return Err(ConfigError::OutputExists(path).into());
                }
                Ok(Self::File {
                    path,
                    overwrite: false,
                })
            }
            None => {
                if in_place {
                    if let Some(input) = input.filter(|name| *name != DASH) {
                        return Ok(Self::File {
                            path: PathBuf::from(input),
                            overwrite: true,
                        });
                    }
                }
                Ok(Self::Stdout { forced: false })
            }
        }
    }

    /// Write the result. `binary` marks non-armored ciphertext, which is
    /// refused on an interactive terminal unless forced.
    pub fn write(&self, data: &[u8], binary: bool) -> Result<()> {
        match self {
            Self::Stdout { forced } => {
                if binary && !forced && std::io::stdout().is_terminal() {
                    return Err(ConfigError::BinaryToTerminal.into());
                }
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(data)?;
                stdout.flush()?;
                Ok(())
            }
            Self::File { path, overwrite } => {
                debug!(path = %path.display(), "writing output");
                let mut file = fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .create_new(!overwrite)
                    .truncate(true)
                    .open(path)?;
                file.write_all(data)?;
                Ok(())
            }
        }
    }
}
