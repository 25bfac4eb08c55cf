//! Event system for UI decoupling.
//!
//! Lets a CLI or any other surface observe session progress without the
//! protocol core knowing how it is displayed.

use std::fmt;

use crate::state::BurnState;

/// Log level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Events emitted by a burn session.
#[derive(Debug, Clone)]
pub enum BurnEvent {
    /// Filters resolved to exactly one unit.
    DeviceResolved { name: String, addr: String },
    /// State transition.
    StateChanged { from: BurnState, to: BurnState },
    /// Per-block progress during transfer and verification.
    Progress {
        state: BurnState,
        blocks_done: u16,
        num_blocks: u16,
    },
    /// Log message.
    Log { level: LogLevel, message: String },
    /// The burn reached its finalized state.
    Complete,
}

/// Observer trait for receiving burn events.
///
/// Implement this in the presentation layer to receive updates.
pub trait BurnObserver: Send + Sync {
    fn on_event(&self, event: &BurnEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl BurnObserver for NullObserver {
    fn on_event(&self, _event: &BurnEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl BurnObserver for TracingObserver {
    fn on_event(&self, event: &BurnEvent) {
        match event {
            BurnEvent::DeviceResolved { name, addr } => {
                tracing::info!(unit = %name, addr = %addr, "device resolved");
            }
            BurnEvent::StateChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "state changed");
            }
            BurnEvent::Progress {
                state,
                blocks_done,
                num_blocks,
            } => {
                let pct = if *num_blocks > 0 {
                    u32::from(*blocks_done) * 100 / u32::from(*num_blocks)
                } else {
                    100
                };
                tracing::debug!(
                    state = %state,
                    progress = %format!("{pct}% ({blocks_done}/{num_blocks} blocks)"),
                    "progress"
                );
            }
            BurnEvent::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{message}"),
                LogLevel::Info => tracing::info!("{message}"),
                LogLevel::Warn => tracing::warn!("{message}"),
                LogLevel::Error => tracing::error!("{message}"),
            },
            BurnEvent::Complete => {
                tracing::info!("firmware burn complete");
            }
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}
