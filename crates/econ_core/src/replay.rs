//! Dispatch logs for determinism checks.
//!
//! A [`DispatchLog`] records every command a scheduler issued during an
//! episode. Two runs fed the same inputs must produce identical logs; the
//! hash gives a cheap comparison and [`DispatchLog::first_divergence`] pins
//! down where two logs part ways.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};
use crate::scheduler::IssuedCommand;

/// Dispatch log file format version for compatibility.
pub const DISPATCH_LOG_VERSION: u32 = 1;

/// Every command issued during one episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchLog {
    /// File format version.
    pub version: u32,
    /// Scenario or catalog the run used.
    pub scenario: String,
    /// Seed of the environment.
    pub seed: u64,
    /// Commands in issue order.
    pub commands: Vec<IssuedCommand>,
    /// Final tick of the episode.
    pub final_tick: u64,
}

impl DispatchLog {
    /// Start an empty log.
    #[must_use]
    pub fn new(scenario: impl Into<String>, seed: u64) -> Self {
        Self {
            version: DISPATCH_LOG_VERSION,
            scenario: scenario.into(),
            seed,
            commands: Vec::new(),
            final_tick: 0,
        }
    }

    /// Append the commands of one tick.
    pub fn record(&mut self, commands: &[IssuedCommand]) {
        self.commands.extend_from_slice(commands);
    }

    /// Mark the end of the episode.
    pub fn finalize(&mut self, final_tick: u64) {
        self.final_tick = final_tick;
    }

    /// Commands issued on `tick`.
    #[must_use]
    pub fn commands_at_tick(&self, tick: u64) -> Vec<&IssuedCommand> {
        self.commands.iter().filter(|cmd| cmd.tick == tick).collect()
    }

    /// Number of commands recorded.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Hash of the command stream and final tick.
    #[must_use]
    pub fn hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.final_tick.hash(&mut hasher);
        self.commands.len().hash(&mut hasher);
        for command in &self.commands {
            command.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Index of the first command where the two logs differ, if any.
    ///
    /// A log that is a strict prefix of the other diverges at its length.
    #[must_use]
    pub fn first_divergence(&self, other: &Self) -> Option<usize> {
        let common = self
            .commands
            .iter()
            .zip(&other.commands)
            .position(|(a, b)| a != b);
        match common {
            Some(index) => Some(index),
            None if self.commands.len() != other.commands.len() => {
                Some(self.commands.len().min(other.commands.len()))
            }
            None => None,
        }
    }

    /// Save the log to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self).map_err(|e| {
            SchedulerError::InvalidState(format!("Failed to serialize dispatch log: {e}"))
        })?;
        std::fs::write(path.as_ref(), bytes).map_err(|e| SchedulerError::LoadError {
            path: path.as_ref().display().to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Load a log from a file.
    ///
    /// # Errors
    /// Returns an error if file reading, deserialization or the version
    /// check fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| SchedulerError::LoadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let log: Self = bincode::deserialize(&bytes).map_err(|e| SchedulerError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        if log.version != DISPATCH_LOG_VERSION {
            return Err(SchedulerError::InvalidState(format!(
                "Dispatch log version mismatch: expected {}, got {}",
                DISPATCH_LOG_VERSION, log.version
            )));
        }
        Ok(log)
    }
}
