//! The seam between the engine and the host application.
//!
//! The host owns persistence (settings and a sound's "playing" flag), the
//! authority role and user-facing notices. The engine calls into it but
//! never depends on how any of that is stored or shown.

use log::{debug, info, warn};
use thiserror::Error;

use crate::container::settings::SettingChange;

/// Failure reported by a host update.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("document {0} no longer exists")]
    Missing(String),
    #[error("host update failed: {0}")]
    Update(String),
}

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Collaborator interface implemented by the host application.
pub trait HostBridge: Send + Sync {
    /// Whether this client may write world-shared settings.
    fn is_authoritative(&self) -> bool;

    /// Persist a setting change. Shared changes only arrive here on the
    /// authoritative client.
    fn persist(&self, change: SettingChange) -> Result<(), HostError>;

    /// Mark a sound as not playing in the host's records. Must be
    /// idempotent.
    fn mark_sound_stopped(&self, sound_id: &str) -> Result<(), HostError>;

    /// Show a transient notice to the user.
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!("{}", notice.message),
            NoticeLevel::Warning | NoticeLevel::Error => warn!("{}", notice.message),
        }
    }
}

/// Standalone host: authoritative, keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalHost;

impl HostBridge for LocalHost {
    fn is_authoritative(&self) -> bool {
        true
    }

    fn persist(&self, change: SettingChange) -> Result<(), HostError> {
        debug!("local host ignoring persisted {:?}", change);
        Ok(())
    }

    fn mark_sound_stopped(&self, sound_id: &str) -> Result<(), HostError> {
        debug!("local host marking {} stopped", sound_id);
        Ok(())
    }
}
