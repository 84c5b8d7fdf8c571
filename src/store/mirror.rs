// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Best-effort copy of every document as a `.excalidraw` file in a user-chosen folder.
//!
//! Nothing in here returns an error. Failures are logged and the mirror degrades to a no-op.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::debounce::Debouncer;
use super::store_folder::{remove_file_if_exists, write_atomic_in_dir_if_dir_exists};
use super::{StoreConfig, StoreFolder, WriteDurability};
use crate::format::{is_scene_file_name, scene_file_name, serialize_envelope};
use crate::model::{DiagramData, DiagramId};

/// Stands in for the folder dialog and the permission prompt.
#[async_trait]
pub trait FolderPicker: Send + Sync {
    /// Whether folders can be picked at all in this environment.
    fn is_supported(&self) -> bool {
        true
    }

    /// Asks the user for a folder. `None` when cancelled.
    async fn pick_directory(&self) -> Option<PathBuf>;

    /// Asks the user to grant read-write access to `directory`.
    async fn request_permission(&self, directory: &Path) -> bool {
        let _ = directory;
        false
    }
}

/// Non-interactive picker that always answers with the same folder.
#[derive(Debug, Clone, Default)]
pub struct FixedFolder {
    directory: Option<PathBuf>,
}

impl FixedFolder {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: Some(directory.into()),
        }
    }

    /// A picker for environments without folder access.
    pub fn unsupported() -> Self {
        Self { directory: None }
    }
}

#[async_trait]
impl FolderPicker for FixedFolder {
    fn is_supported(&self) -> bool {
        self.directory.is_some()
    }

    async fn pick_directory(&self) -> Option<PathBuf> {
        let directory = self.directory.clone()?;
        // Picking a folder in a dialog implies it exists.
        match fs::create_dir_all(&directory) {
            Ok(()) => Some(directory),
            Err(err) => {
                tracing::warn!(directory = %directory.display(), error = %err, "mirror: cannot create folder");
                None
            }
        }
    }
}

struct MirrorInner {
    settings: StoreFolder,
    picker: Arc<dyn FolderPicker>,
    writes: Debouncer,
    file_names: Mutex<HashMap<DiagramId, String>>,
    source_origin: String,
    durability: WriteDurability,
}

#[derive(Clone)]
pub struct FilesystemMirror {
    inner: Arc<MirrorInner>,
}

impl FilesystemMirror {
    pub fn new(settings: StoreFolder, picker: Arc<dyn FolderPicker>, config: &StoreConfig) -> Self {
        let file_names = match settings.load_settings() {
            Ok(stored) => stored.mirror_files.into_iter().collect(),
            Err(err) => {
                tracing::warn!(error = %err, "mirror: cannot read tracked file names");
                HashMap::new()
            }
        };
        Self {
            inner: Arc::new(MirrorInner {
                settings,
                picker,
                writes: Debouncer::new(config.mirror_debounce),
                file_names: Mutex::new(file_names),
                source_origin: config.source_origin.clone(),
                durability: config.durability,
            }),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.inner.picker.is_supported()
    }

    /// Asks for a folder and remembers it for later sessions.
    pub async fn pick_directory(&self) -> Option<PathBuf> {
        if !self.is_supported() {
            return None;
        }

        let directory = self.inner.picker.pick_directory().await?;
        let stored = directory.clone();
        match self
            .inner
            .settings
            .update_settings(move |settings| settings.mirror_directory = Some(stored))
        {
            Ok(_) => {
                tracing::info!(directory = %directory.display(), "mirror: enabled");
                Some(directory)
            }
            Err(err) => {
                tracing::warn!(error = %err, "mirror: cannot persist folder");
                None
            }
        }
    }

    /// The remembered folder, if any.
    pub fn directory(&self) -> Option<PathBuf> {
        self.inner.directory()
    }

    pub fn directory_name(&self) -> Option<String> {
        let directory = self.directory()?;
        directory
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }

    pub fn is_enabled(&self) -> bool {
        self.directory().is_some()
    }

    /// Forgets the folder and every pending write and tracked file name.
    pub fn disable(&self) {
        if let Err(err) = self
            .inner
            .settings
            .update_settings(|settings| {
                settings.mirror_directory = None;
                settings.mirror_files.clear();
            })
        {
            tracing::warn!(error = %err, "mirror: cannot forget folder");
        }
        self.inner.writes.clear();
        self.inner.lock_file_names().clear();
    }

    pub async fn verify_permission(&self) -> bool {
        match self.directory() {
            Some(directory) => self.inner.verify_access(&directory).await,
            None => false,
        }
    }

    /// Schedules a debounced write of `data` under `name`.
    pub fn save(&self, id: &DiagramId, name: &str, data: &DiagramData) {
        let inner = self.inner.clone();
        let job_id = id.clone();
        let name = name.to_owned();
        let data = data.clone();
        self.inner.writes.schedule(id.clone(), async move {
            inner.write_file(&job_id, &name, &data).await;
        });
    }

    pub async fn flush(&self, id: &DiagramId) {
        self.inner.writes.flush(id).await;
    }

    pub async fn delete_diagram_file(&self, id: &DiagramId, name: &str) {
        self.inner.writes.cancel(id).await;
        let tracked = self.inner.track(id, None);

        let Some(directory) = self.directory() else {
            return;
        };
        if !self.inner.verify_access(&directory).await {
            return;
        }

        let file_name = tracked.unwrap_or_else(|| self.inner.untracked_file_name(&directory, id, name));
        if let Err(err) = remove_file_if_exists(&directory.join(&file_name)) {
            tracing::warn!(file = %file_name, error = %err, "mirror: failed to delete file");
        }
    }

    /// Moves the file for `id` to the name derived from `new_name`.
    ///
    /// A missing old file is fine: the document may never have been written yet.
    pub async fn rename_diagram_file(&self, id: &DiagramId, old_name: &str, new_name: &str) {
        // A pending write still carries the old name.
        self.inner.writes.flush(id).await;

        let Some(directory) = self.directory() else {
            return;
        };
        if !self.inner.verify_access(&directory).await {
            return;
        }

        let old_file = self
            .inner
            .lock_file_names()
            .get(id)
            .cloned()
            .unwrap_or_else(|| self.inner.untracked_file_name(&directory, id, old_name));
        let new_file = self.inner.file_name_for(id, new_name);
        if old_file == new_file {
            return;
        }

        let old_path = directory.join(&old_file);
        match fs::read(&old_path) {
            Ok(contents) => {
                let written = write_atomic_in_dir_if_dir_exists(
                    &directory,
                    &directory.join(&new_file),
                    &contents,
                    self.inner.durability,
                );
                match written {
                    Ok(_) => {
                        if let Err(err) = remove_file_if_exists(&old_path) {
                            tracing::warn!(file = %old_file, error = %err, "mirror: failed to remove renamed file");
                        }
                    }
                    Err(err) => {
                        tracing::warn!(file = %new_file, error = %err, "mirror: failed to rename file");
                        return;
                    }
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(file = %old_file, error = %err, "mirror: failed to read file for rename");
                return;
            }
        }

        self.inner.track(id, Some(new_file));
    }

    /// Every `.excalidraw` file in the folder, sorted by path.
    pub async fn scan_directory(&self) -> Vec<PathBuf> {
        let Some(directory) = self.directory() else {
            return Vec::new();
        };
        if !self.inner.verify_access(&directory).await {
            return Vec::new();
        }

        let entries = match fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(directory = %directory.display(), error = %err, "mirror: cannot scan folder");
                return Vec::new();
            }
        };

        let mut files = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
            .filter(|entry| is_scene_file_name(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.path())
            .collect::<Vec<_>>();
        files.sort();
        files
    }

    /// The file name last written for `id`.
    pub fn tracked_file_name(&self, id: &DiagramId) -> Option<String> {
        self.inner.lock_file_names().get(id).cloned()
    }
}

impl MirrorInner {
    fn directory(&self) -> Option<PathBuf> {
        match self.settings.load_settings() {
            Ok(settings) => settings.mirror_directory,
            Err(err) => {
                tracing::warn!(error = %err, "mirror: cannot read settings");
                None
            }
        }
    }

    async fn verify_access(&self, directory: &Path) -> bool {
        if is_writable_dir(directory) {
            return true;
        }
        self.picker.request_permission(directory).await && is_writable_dir(directory)
    }

    fn lock_file_names(&self) -> MutexGuard<'_, HashMap<DiagramId, String>> {
        self.file_names.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records (or forgets) the file of `id` and persists the change. Returns the previous file.
    fn track(&self, id: &DiagramId, file_name: Option<String>) -> Option<String> {
        let previous = {
            let mut file_names = self.lock_file_names();
            match &file_name {
                Some(file_name) => file_names.insert(id.clone(), file_name.clone()),
                None => file_names.remove(id),
            }
        };
        if previous == file_name {
            return previous;
        }

        let persisted = self.settings.update_settings(|settings| match file_name {
            Some(file_name) => {
                settings.mirror_files.insert(id.clone(), file_name);
            }
            None => {
                settings.mirror_files.remove(id);
            }
        });
        if let Err(err) = persisted {
            tracing::warn!(diagram_id = %id, error = %err, "mirror: cannot persist tracked file name");
        }
        previous
    }

    /// File of a document missing from the table: its disambiguated file if one exists, else the
    /// plain name.
    fn untracked_file_name(&self, directory: &Path, id: &DiagramId, name: &str) -> String {
        let disambiguated = disambiguated_file_name(id, name);
        if directory.join(&disambiguated).is_file() {
            disambiguated
        } else {
            scene_file_name(name)
        }
    }

    /// `<name>.excalidraw`, or `<name> (<id>).excalidraw` when another tracked document already
    /// owns that file.
    fn file_name_for(&self, id: &DiagramId, name: &str) -> String {
        let file_name = scene_file_name(name);
        let taken = self
            .lock_file_names()
            .iter()
            .any(|(other, claimed)| other != id && claimed == &file_name);
        if taken {
            disambiguated_file_name(id, name)
        } else {
            file_name
        }
    }

    async fn write_file(&self, id: &DiagramId, name: &str, data: &DiagramData) {
        let Some(directory) = self.directory() else {
            return;
        };
        if !self.verify_access(&directory).await {
            tracing::debug!(diagram_id = %id, "mirror: no permission, skipping write");
            return;
        }

        let file_name = self.file_name_for(id, name);
        let previous = self.track(id, Some(file_name.clone()));
        if let Some(previous) = previous.filter(|previous| previous != &file_name) {
            if let Err(err) = remove_file_if_exists(&directory.join(&previous)) {
                tracing::warn!(file = %previous, error = %err, "mirror: failed to remove old file");
            }
        }

        let text = match serialize_envelope(data, &self.source_origin) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(diagram_id = %id, error = %err, "mirror: failed to serialize");
                return;
            }
        };

        match write_atomic_in_dir_if_dir_exists(
            &directory,
            &directory.join(&file_name),
            text.as_bytes(),
            self.durability,
        ) {
            Ok(true) => tracing::debug!(file = %file_name, "mirror: wrote file"),
            Ok(false) => {
                tracing::warn!(directory = %directory.display(), "mirror: folder is gone, skipping write")
            }
            Err(err) => tracing::warn!(file = %file_name, error = %err, "mirror: failed to write file"),
        }
    }
}

/// `<name> (<id>).excalidraw`, used when another document already owns `<name>.excalidraw`.
pub(crate) fn disambiguated_file_name(id: &DiagramId, name: &str) -> String {
    scene_file_name(&format!("{name} ({id})"))
}

fn is_writable_dir(directory: &Path) -> bool {
    fs::metadata(directory).is_ok_and(|md| md.is_dir() && !md.permissions().readonly())
}
