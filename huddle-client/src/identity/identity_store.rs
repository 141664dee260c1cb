use huddle_core::ClientId;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{error, info};

use crate::error::IdentityError;

const IDENTITY_FILE: &str = "client_id";

/// Where the installation's client id lives.
///
/// The id is created lazily on first use and never changes afterwards.
pub enum IdentityStore {
    Memory(OnceLock<ClientId>),
    File(PathBuf),
}

impl IdentityStore {
    pub fn memory() -> Self {
        Self::Memory(OnceLock::new())
    }

    /// Persist the id as `<data_dir>/client_id`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::File(data_dir.as_ref().join(IDENTITY_FILE))
    }

    pub fn load_or_create(&self) -> Result<ClientId, IdentityError> {
        match self {
            Self::Memory(cell) => Ok(cell.get_or_init(ClientId::generate).clone()),
            Self::File(path) => match std::fs::read_to_string(path) {
                Ok(text) => {
                    let id = text.trim();
                    if id.is_empty() {
                        return Err(IdentityError::Empty(path.clone()));
                    }
                    Ok(ClientId::from(id))
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    let id = ClientId::generate();
                    write_atomically(path, id.as_str())?;
                    info!("Created client identity {} at {}", id, path.display());
                    Ok(id)
                }
                Err(source) => Err(IdentityError::Io {
                    path: path.clone(),
                    source,
                }),
            },
        }
    }
}

fn write_atomically(path: &Path, content: &str) -> Result<(), IdentityError> {
    let io_err = |source| IdentityError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, content).map_err(io_err)?;

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        error!("Failed to move identity into place: {}", e);
        let _ = std::fs::remove_file(&tmp_path);
        return Err(io_err(e));
    }
    Ok(())
}
