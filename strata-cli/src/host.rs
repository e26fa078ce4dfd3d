//! Host bridge that writes setting changes back to the session file.

use std::path::PathBuf;

use log::debug;
use parking_lot::Mutex;
use strata_lib::container::{Session, SettingChange};
use strata_lib::host::{HostBridge, HostError, Notice, NoticeLevel};

pub struct SessionHost {
    path: PathBuf,
    session: Mutex<Session>,
    notices: Mutex<Vec<Notice>>,
}

impl SessionHost {
    pub fn new(path: impl Into<PathBuf>, session: Session) -> Self {
        Self {
            path: path.into(),
            session: Mutex::new(session),
            notices: Mutex::new(Vec::new()),
        }
    }

    /// Most recent notice, for the status panel.
    pub fn last_notice(&self) -> Option<Notice> {
        self.notices.lock().last().cloned()
    }

    fn save(&self, session: &Session) -> Result<(), HostError> {
        session
            .to_path(&self.path)
            .map_err(|err| HostError::Update(err.to_string()))
    }
}

impl HostBridge for SessionHost {
    fn is_authoritative(&self) -> bool {
        true
    }

    fn persist(&self, change: SettingChange) -> Result<(), HostError> {
        let mut session = self.session.lock();
        session.settings.apply(&change);
        debug!("saving {:?} to {}", change, self.path.display());
        self.save(&session)
    }

    fn mark_sound_stopped(&self, sound_id: &str) -> Result<(), HostError> {
        let mut session = self.session.lock();
        let sound = session
            .playlists
            .iter_mut()
            .flat_map(|playlist| playlist.sounds.iter_mut())
            .find(|sound| sound.id == sound_id)
            .ok_or_else(|| HostError::Missing(sound_id.to_string()))?;
        if !sound.playing {
            return Ok(());
        }
        sound.playing = false;
        self.save(&session)
    }

    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => log::info!("{}", notice.message),
            NoticeLevel::Warning => log::warn!("{}", notice.message),
            NoticeLevel::Error => log::error!("{}", notice.message),
        }
        self.notices.lock().push(notice);
    }
}
