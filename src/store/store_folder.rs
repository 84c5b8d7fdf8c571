// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::format::ImportError;
use crate::model::{DiagramId, DiagramVersion, IdError, IndexEntry, StoredDiagram, TabSession};

const INDEX_FILENAME: &str = "index.json";
const SETTINGS_FILENAME: &str = "config.json";
const TAB_SESSION_FILENAME: &str = "tabs.json";
const DIAGRAMS_DIR: &str = "diagrams";
const VERSIONS_DIR: &str = "versions";
const LEGACY_DIR: &str = "legacy";
const LEGACY_ELEMENTS_FILENAME: &str = "elements.json";
const LEGACY_APP_STATE_FILENAME: &str = "app-state.json";

#[derive(Debug)]
pub enum StoreError {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    NotFound {
        diagram_id: DiagramId,
    },
    InvalidImport {
        file_name: String,
        source: Box<ImportError>,
    },
    InvalidId {
        field: &'static str,
        value: String,
        source: Box<IdError>,
    },
    InvalidRelativePath {
        field: &'static str,
        value: PathBuf,
    },
    PathOutsideStore {
        store_dir: PathBuf,
        path: PathBuf,
    },
    SymlinkRefused {
        path: PathBuf,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "io error at {path:?}: {source}"),
            Self::Json { path, source } => write!(f, "json error at {path:?}: {source}"),
            Self::NotFound { diagram_id } => write!(f, "diagram {diagram_id} not found"),
            Self::InvalidImport { file_name, source } => {
                write!(f, "cannot import {file_name:?}: {source}")
            }
            Self::InvalidId {
                field,
                value,
                source,
            } => write!(f, "invalid id for {field}: {value:?}: {source}"),
            Self::InvalidRelativePath { field, value } => {
                write!(f, "invalid relative path for {field}: {value:?}")
            }
            Self::PathOutsideStore { store_dir, path } => write!(
                f,
                "path is outside store dir: store_dir={store_dir:?} path={path:?}"
            ),
            Self::SymlinkRefused { path } => {
                write!(f, "refusing to write through symlink at {path:?}")
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::InvalidImport { source, .. } => Some(source),
            Self::InvalidId { source, .. } => Some(source),
            Self::NotFound { .. } => None,
            Self::InvalidRelativePath { .. } => None,
            Self::PathOutsideStore { .. } => None,
            Self::SymlinkRefused { .. } => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WriteDurability {
    /// Fast, best-effort persistence.
    ///
    /// - Writes a temp file and renames atomically into place.
    /// - Does not perform per-file fsync/sync.
    #[default]
    BestEffort,

    /// Slower, best-effort durability.
    ///
    /// Attempts to flush written file contents and rename operations to stable storage where
    /// possible. Exact guarantees are platform/filesystem-dependent.
    Durable,
}

/// Small settings record kept next to the documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// The folder granted for mirroring, if any.
    #[serde(
        rename = "filesystem-directory-handle",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mirror_directory: Option<PathBuf>,
    #[serde(rename = "legacy-migrated", default)]
    pub legacy_migrated: bool,
    /// The file each document was last mirrored to, so a renamed or disambiguated file is
    /// found again after a restart.
    #[serde(
        rename = "mirror-file-names",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub mirror_files: BTreeMap<DiagramId, String>,
}

/// Durable key-value layout for documents, index, versions and settings.
///
/// All methods are synchronous; callers that share a folder across tasks serialize access.
/// Clones share one settings lock so [`StoreFolder::update_settings`] never loses a field.
#[derive(Debug, Clone)]
pub struct StoreFolder {
    root: PathBuf,
    durability: WriteDurability,
    settings_lock: Arc<Mutex<()>>,
}

impl StoreFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            durability: WriteDurability::default(),
            settings_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_durability(mut self, durability: WriteDurability) -> Self {
        self.durability = durability;
        self
    }

    pub fn durability(&self) -> WriteDurability {
        self.durability
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILENAME)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILENAME)
    }

    pub fn tab_session_path(&self) -> PathBuf {
        self.root.join(TAB_SESSION_FILENAME)
    }

    pub fn diagram_path(&self, diagram_id: &DiagramId) -> PathBuf {
        let file_stem = encode_persisted_id_segment(diagram_id.as_str());
        self.root.join(DIAGRAMS_DIR).join(format!("{file_stem}.json"))
    }

    pub fn versions_path(&self, diagram_id: &DiagramId) -> PathBuf {
        let file_stem = encode_persisted_id_segment(diagram_id.as_str());
        self.root.join(VERSIONS_DIR).join(format!("{file_stem}.json"))
    }

    pub fn legacy_elements_path(&self) -> PathBuf {
        self.root.join(LEGACY_DIR).join(LEGACY_ELEMENTS_FILENAME)
    }

    pub fn legacy_app_state_path(&self) -> PathBuf {
        self.root.join(LEGACY_DIR).join(LEGACY_APP_STATE_FILENAME)
    }

    pub fn load_diagram(&self, diagram_id: &DiagramId) -> Result<Option<StoredDiagram>, StoreError> {
        self.read_json(&self.diagram_path(diagram_id))
    }

    pub fn save_diagram(&self, diagram: &StoredDiagram) -> Result<(), StoreError> {
        self.write_json(&self.diagram_path(&diagram.id), diagram)
    }

    pub fn remove_diagram(&self, diagram_id: &DiagramId) -> Result<(), StoreError> {
        remove_file_if_exists(&self.diagram_path(diagram_id))
    }

    pub fn load_index(&self) -> Result<Vec<IndexEntry>, StoreError> {
        Ok(self.read_json(&self.index_path())?.unwrap_or_default())
    }

    pub fn save_index(&self, index: &[IndexEntry]) -> Result<(), StoreError> {
        self.write_json(&self.index_path(), &index)
    }

    pub fn load_versions(&self, diagram_id: &DiagramId) -> Result<Vec<DiagramVersion>, StoreError> {
        Ok(self
            .read_json(&self.versions_path(diagram_id))?
            .unwrap_or_default())
    }

    /// Writes the version collection; an empty collection removes the file.
    pub fn save_versions(
        &self,
        diagram_id: &DiagramId,
        versions: &[DiagramVersion],
    ) -> Result<(), StoreError> {
        if versions.is_empty() {
            return self.remove_versions(diagram_id);
        }
        self.write_json(&self.versions_path(diagram_id), &versions)
    }

    pub fn remove_versions(&self, diagram_id: &DiagramId) -> Result<(), StoreError> {
        remove_file_if_exists(&self.versions_path(diagram_id))
    }

    pub fn load_settings(&self) -> Result<StoreSettings, StoreError> {
        Ok(self.read_json(&self.settings_path())?.unwrap_or_default())
    }

    pub fn save_settings(&self, settings: &StoreSettings) -> Result<(), StoreError> {
        let _guard = self
            .settings_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.write_json(&self.settings_path(), settings)
    }

    /// Read-modify-write of the settings record; returns the updated record.
    pub fn update_settings(
        &self,
        update: impl FnOnce(&mut StoreSettings),
    ) -> Result<StoreSettings, StoreError> {
        let _guard = self
            .settings_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut settings = self.load_settings()?;
        update(&mut settings);
        self.write_json(&self.settings_path(), &settings)?;
        Ok(settings)
    }

    pub fn load_tab_session(&self) -> Result<TabSession, StoreError> {
        Ok(self.read_json(&self.tab_session_path())?.unwrap_or_default())
    }

    pub fn save_tab_session(&self, session: &TabSession) -> Result<(), StoreError> {
        self.write_json(&self.tab_session_path(), session)
    }

    /// Reads a file's text, returning `None` when it does not exist.
    pub fn read_text_if_exists(&self, path: &Path) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn remove_legacy_scene(&self) -> Result<(), StoreError> {
        remove_file_if_exists(&self.legacy_elements_path())?;
        remove_file_if_exists(&self.legacy_app_state_path())
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, StoreError> {
        let Some(text) = self.read_text_if_exists(path)? else {
            return Ok(None);
        };

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| StoreError::Json {
                path: path.to_path_buf(),
                source,
            })
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        write_atomic_in_dir(
            self.root(),
            path,
            format!("{text}\n").as_bytes(),
            self.durability,
        )
    }
}

// Path validation and atomic write helpers shared with the folder mirror.
include!("store_folder/helpers.rs");
