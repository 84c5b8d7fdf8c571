// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::debounce::Debouncer;
use super::mirror::{disambiguated_file_name, FilesystemMirror, FixedFolder, FolderPicker};
use super::store_folder::write_atomic_in_dir;
use super::thumbnail::{SvgThumbnailer, ThumbnailRenderer};
use super::{StoreConfig, StoreError, StoreFolder};
use crate::format::{diagram_name_from_file_name, parse_scene, scene_file_name, serialize_envelope};
use crate::model::{
    generate_word_id, now_millis, AppState, DiagramData, DiagramId, DiagramVersion, Element,
    IndexEntry, StoredDiagram, TabSession, VersionId,
};

const UNTITLED: &str = "Untitled";
const COPY_SUFFIX: &str = " (copy)";

/// Outcome of rebuilding documents from the mirror folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub found: usize,
    pub imported: usize,
    /// Files whose derived name matches an existing document.
    pub skipped: usize,
    pub failed: usize,
}

struct Shared {
    folder: StoreFolder,
    io: Mutex<()>,
    mirror: FilesystemMirror,
    thumbnailer: Arc<dyn ThumbnailRenderer>,
    config: StoreConfig,
}

/// Durable documents, their index and their versions.
///
/// `save` coalesces bursts per document; everything else writes before returning. Debounced work
/// is spawned on the current Tokio runtime.
#[derive(Clone)]
pub struct DiagramStore {
    shared: Arc<Shared>,
    saves: Debouncer,
    thumbnails: Debouncer,
}

impl DiagramStore {
    /// A store without folder access that renders SVG thumbnails.
    pub fn open(root: impl Into<PathBuf>, config: StoreConfig) -> Self {
        Self::open_with(
            root,
            config,
            Arc::new(FixedFolder::unsupported()),
            Arc::new(SvgThumbnailer),
        )
    }

    pub fn open_with(
        root: impl Into<PathBuf>,
        config: StoreConfig,
        picker: Arc<dyn FolderPicker>,
        thumbnailer: Arc<dyn ThumbnailRenderer>,
    ) -> Self {
        let folder = StoreFolder::new(root).with_durability(config.durability);
        let mirror = FilesystemMirror::new(folder.clone(), picker, &config);
        Self {
            saves: Debouncer::new(config.save_debounce),
            thumbnails: Debouncer::new(config.thumbnail_debounce),
            shared: Arc::new(Shared {
                folder,
                io: Mutex::new(()),
                mirror,
                thumbnailer,
                config,
            }),
        }
    }

    pub fn folder(&self) -> &StoreFolder {
        &self.shared.folder
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    pub fn mirror(&self) -> &FilesystemMirror {
        &self.shared.mirror
    }

    pub async fn create(&self, name: Option<&str>) -> Result<StoredDiagram, StoreError> {
        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNTITLED);
        let _io = self.shared.lock_io();
        self.shared.insert_new(name, DiagramData::default(), None)
    }

    pub async fn get(&self, id: &DiagramId) -> Result<Option<StoredDiagram>, StoreError> {
        let _io = self.shared.lock_io();
        self.shared.folder.load_diagram(id)
    }

    pub async fn index(&self) -> Result<Vec<IndexEntry>, StoreError> {
        let _io = self.shared.lock_io();
        self.shared.folder.load_index()
    }

    /// Schedules a coalesced write of `data` plus a thumbnail refresh. Returns immediately.
    ///
    /// The mirror write follows the durable write; its failures stay inside the mirror.
    pub fn save(&self, id: &DiagramId, mut data: DiagramData) {
        data.strip_transient();

        let shared = self.shared.clone();
        let job_id = id.clone();
        let thumbnail_data = data.clone();
        self.saves.schedule(id.clone(), async move {
            match shared.write_data(&job_id, data) {
                Ok(Some(diagram)) => shared.mirror.save(&job_id, &diagram.name, &diagram.data),
                Ok(None) => {
                    tracing::debug!(diagram_id = %job_id, "store: skipped save of deleted diagram")
                }
                Err(err) => {
                    tracing::warn!(diagram_id = %job_id, error = %err, "store: debounced save failed")
                }
            }
        });

        let shared = self.shared.clone();
        let job_id = id.clone();
        self.thumbnails.schedule(id.clone(), async move {
            if let Err(err) = shared.refresh_thumbnail(&job_id, &thumbnail_data) {
                tracing::warn!(diagram_id = %job_id, error = %err, "store: thumbnail update failed");
            }
        });
    }

    /// Writes `data` now. Does not touch a pending debounced save; cancel it first if its payload
    /// is stale. A missing document is left alone.
    pub async fn save_immediate(
        &self,
        id: &DiagramId,
        mut data: DiagramData,
    ) -> Result<(), StoreError> {
        data.strip_transient();
        if let Some(diagram) = self.shared.write_data(id, data)? {
            self.shared.mirror.save(id, &diagram.name, &diagram.data);
        }
        Ok(())
    }

    /// Runs the pending save and thumbnail refresh for `id` now.
    pub async fn flush_save(&self, id: &DiagramId) {
        self.saves.flush(id).await;
        self.thumbnails.flush(id).await;
    }

    /// Drops the pending save and thumbnail refresh for `id`.
    pub async fn cancel_pending_save(&self, id: &DiagramId) {
        self.saves.cancel(id).await;
        self.thumbnails.cancel(id).await;
    }

    pub fn has_pending_save(&self, id: &DiagramId) -> bool {
        self.saves.is_pending(id)
    }

    /// Removes the document, its index entry and its versions. Deleting twice is fine.
    pub async fn delete(&self, id: &DiagramId) -> Result<(), StoreError> {
        self.cancel_pending_save(id).await;

        let name = {
            let _io = self.shared.lock_io();
            let name = self
                .shared
                .folder
                .load_diagram(id)?
                .map(|diagram| diagram.name)
                .unwrap_or_else(|| UNTITLED.to_owned());

            self.shared.folder.remove_diagram(id)?;
            let mut index = self.shared.folder.load_index()?;
            let before = index.len();
            index.retain(|entry| &entry.id != id);
            if index.len() != before {
                self.shared.folder.save_index(&index)?;
            }
            self.shared.folder.remove_versions(id)?;
            name
        };

        tracing::debug!(diagram_id = %id, "store: deleted diagram");
        self.shared.mirror.delete_diagram_file(id, &name).await;
        Ok(())
    }

    /// Renames the document. A missing document is a no-op.
    pub async fn rename(&self, id: &DiagramId, name: &str) -> Result<(), StoreError> {
        let old_name = {
            let _io = self.shared.lock_io();
            let Some(mut diagram) = self.shared.folder.load_diagram(id)? else {
                return Ok(());
            };

            let old_name = std::mem::replace(&mut diagram.name, name.to_owned());
            diagram.updated_at = diagram.updated_at.max(now_millis());
            self.shared.folder.save_diagram(&diagram)?;

            let mut index = self.shared.folder.load_index()?;
            if let Some(entry) = index.iter_mut().find(|entry| &entry.id == id) {
                entry.name = diagram.name.clone();
                entry.updated_at = diagram.updated_at;
                self.shared.folder.save_index(&index)?;
            }
            old_name
        };

        self.shared.mirror.rename_diagram_file(id, &old_name, name).await;
        Ok(())
    }

    /// Copies the document under a fresh id as `"<name> (copy)"`.
    pub async fn duplicate(&self, id: &DiagramId) -> Result<StoredDiagram, StoreError> {
        let _io = self.shared.lock_io();
        let original = self
            .shared
            .folder
            .load_diagram(id)?
            .ok_or_else(|| StoreError::NotFound {
                diagram_id: id.clone(),
            })?;
        let thumbnail = self
            .shared
            .folder
            .load_index()?
            .into_iter()
            .find(|entry| &entry.id == id)
            .and_then(|entry| entry.thumbnail);

        self.shared.insert_new(
            &format!("{}{COPY_SUFFIX}", original.name),
            original.data,
            thumbnail,
        )
    }

    /// Imports a scene file. The id embedded in the file, if any, is ignored.
    pub async fn import_from_file(&self, path: &Path) -> Result<StoredDiagram, StoreError> {
        let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.import_from_text(&file_name, &text).await
    }

    /// Imports scene JSON named after `file_name`. Nothing is written when parsing fails.
    pub async fn import_from_text(
        &self,
        file_name: &str,
        text: &str,
    ) -> Result<StoredDiagram, StoreError> {
        let data = parse_scene(text).map_err(|source| StoreError::InvalidImport {
            file_name: file_name.to_owned(),
            source: Box::new(source),
        })?;
        let name = diagram_name_from_file_name(file_name);

        let diagram = {
            let _io = self.shared.lock_io();
            self.shared.insert_new(&name, data, None)?
        };

        let shared = self.shared.clone();
        let id = diagram.id.clone();
        let data = diagram.data.clone();
        tokio::spawn(async move {
            if let Err(err) = shared.refresh_thumbnail(&id, &data) {
                tracing::warn!(diagram_id = %id, error = %err, "store: import thumbnail failed");
            }
        });

        tracing::info!(diagram_id = %diagram.id, name = %diagram.name, "store: imported diagram");
        Ok(diagram)
    }

    /// The formatted `.excalidraw` envelope for a document.
    pub async fn export_envelope(&self, id: &DiagramId) -> Result<String, StoreError> {
        let diagram = self.get(id).await?.ok_or_else(|| StoreError::NotFound {
            diagram_id: id.clone(),
        })?;
        self.shared.envelope(&diagram)
    }

    /// Writes `<name>.excalidraw` into `directory` and returns its path.
    pub async fn export_to_file(
        &self,
        id: &DiagramId,
        directory: &Path,
    ) -> Result<PathBuf, StoreError> {
        let diagram = self.get(id).await?.ok_or_else(|| StoreError::NotFound {
            diagram_id: id.clone(),
        })?;
        let text = self.shared.envelope(&diagram)?;
        let path = directory.join(scene_file_name(&diagram.name));
        write_atomic_in_dir(directory, &path, text.as_bytes(), self.shared.config.durability)?;
        Ok(path)
    }

    pub async fn update_thumbnail(
        &self,
        id: &DiagramId,
        thumbnail: Option<String>,
    ) -> Result<(), StoreError> {
        self.shared.set_thumbnail(id, thumbnail)
    }

    /// Renders and stores a thumbnail for `data` right away.
    pub async fn regenerate_thumbnail(
        &self,
        id: &DiagramId,
        data: &DiagramData,
    ) -> Result<(), StoreError> {
        self.shared.refresh_thumbnail(id, data)
    }

    pub async fn save_version(
        &self,
        id: &DiagramId,
        label: &str,
        data: &DiagramData,
    ) -> Result<DiagramVersion, StoreError> {
        let _io = self.shared.lock_io();
        let mut versions = self.shared.folder.load_versions(id)?;

        let timestamp = now_millis();
        let mut version_id = format!("{id}-v-{timestamp}");
        let mut bump = 1u32;
        while versions.iter().any(|v| v.id.as_str() == version_id) {
            version_id = format!("{id}-v-{timestamp}-{bump}");
            bump += 1;
        }
        let version_id =
            VersionId::new(version_id.clone()).map_err(|source| StoreError::InvalidId {
                field: "version_id",
                value: version_id,
                source: Box::new(source),
            })?;

        let mut data = data.clone();
        data.strip_transient();
        let version = DiagramVersion {
            id: version_id,
            label: label.to_owned(),
            timestamp,
            data,
        };
        versions.push(version.clone());
        self.shared.folder.save_versions(id, &versions)?;
        Ok(version)
    }

    /// Versions in creation order; empty when there are none.
    pub async fn versions(&self, id: &DiagramId) -> Result<Vec<DiagramVersion>, StoreError> {
        let _io = self.shared.lock_io();
        self.shared.folder.load_versions(id)
    }

    /// Makes a version's data the document's current data. `None` when the version is unknown.
    pub async fn restore_version(
        &self,
        id: &DiagramId,
        version_id: &VersionId,
    ) -> Result<Option<DiagramData>, StoreError> {
        let version = {
            let _io = self.shared.lock_io();
            self.shared
                .folder
                .load_versions(id)?
                .into_iter()
                .find(|version| &version.id == version_id)
        };
        let Some(version) = version else {
            return Ok(None);
        };

        self.save_immediate(id, version.data.clone()).await?;
        tracing::info!(diagram_id = %id, version_id = %version_id, "store: restored version");
        Ok(Some(version.data))
    }

    pub async fn delete_version(
        &self,
        id: &DiagramId,
        version_id: &VersionId,
    ) -> Result<(), StoreError> {
        let _io = self.shared.lock_io();
        let mut versions = self.shared.folder.load_versions(id)?;
        versions.retain(|version| &version.id != version_id);
        self.shared.folder.save_versions(id, &versions)
    }

    /// Only the label of a version can change. Unknown versions are ignored.
    pub async fn update_version_label(
        &self,
        id: &DiagramId,
        version_id: &VersionId,
        label: &str,
    ) -> Result<(), StoreError> {
        let _io = self.shared.lock_io();
        let mut versions = self.shared.folder.load_versions(id)?;
        let Some(version) = versions.iter_mut().find(|version| &version.id == version_id) else {
            return Ok(());
        };
        version.label = label.to_owned();
        self.shared.folder.save_versions(id, &versions)
    }

    pub async fn delete_all_versions(&self, id: &DiagramId) -> Result<(), StoreError> {
        let _io = self.shared.lock_io();
        self.shared.folder.remove_versions(id)
    }

    /// Imports every mirrored file whose name does not match an existing document.
    pub async fn restore_from_mirror(&self) -> Result<RestoreReport, StoreError> {
        let files = self.shared.mirror.scan_directory().await;
        // A disambiguated file `<name> (<id>)` belongs to the existing document `id`.
        let mut names = HashSet::new();
        for entry in self.index().await? {
            names.insert(diagram_name_from_file_name(&disambiguated_file_name(
                &entry.id,
                &entry.name,
            )));
            names.insert(entry.name);
        }

        let mut report = RestoreReport {
            found: files.len(),
            ..RestoreReport::default()
        };
        for path in files {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            if names.contains(&diagram_name_from_file_name(&file_name)) {
                report.skipped += 1;
                continue;
            }

            match self.import_from_file(&path).await {
                Ok(diagram) => {
                    names.insert(diagram.name);
                    report.imported += 1;
                }
                Err(err) => {
                    tracing::warn!(file = %path.display(), error = %err, "store: skipped unreadable mirror file");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            found = report.found,
            imported = report.imported,
            skipped = report.skipped,
            failed = report.failed,
            "store: restored from mirror"
        );
        Ok(report)
    }

    /// Moves the single-scene layout of older versions into a new `"Untitled"` document.
    ///
    /// Runs once; returns the new document id when something was migrated.
    pub async fn migrate_legacy_scene(&self) -> Result<Option<DiagramId>, StoreError> {
        let folder = &self.shared.folder;
        if folder.load_settings()?.legacy_migrated {
            return Ok(None);
        }

        let elements_text = folder.read_text_if_exists(&folder.legacy_elements_path())?;
        let app_state_text = folder.read_text_if_exists(&folder.legacy_app_state_path())?;

        let parsed = parse_legacy_scene(elements_text.as_deref(), app_state_text.as_deref());
        let (elements, app_state) = match parsed {
            Ok(Some(scene)) => scene,
            Ok(None) => {
                self.mark_legacy_migrated()?;
                return Ok(None);
            }
            Err(err) => {
                tracing::warn!(error = %err, "store: unreadable legacy scene, skipping migration");
                self.mark_legacy_migrated()?;
                return Ok(None);
            }
        };

        let diagram = self.create(Some(UNTITLED)).await?;
        self.save_immediate(
            &diagram.id,
            DiagramData::new(elements, app_state, Default::default()),
        )
        .await?;
        folder.remove_legacy_scene()?;
        self.mark_legacy_migrated()?;

        tracing::info!(diagram_id = %diagram.id, "store: migrated legacy scene");
        Ok(Some(diagram.id))
    }

    pub async fn load_tab_session(&self) -> Result<TabSession, StoreError> {
        let _io = self.shared.lock_io();
        self.shared.folder.load_tab_session()
    }

    pub async fn store_tab_session(&self, session: &TabSession) -> Result<(), StoreError> {
        let _io = self.shared.lock_io();
        self.shared.folder.save_tab_session(session)
    }

    fn mark_legacy_migrated(&self) -> Result<(), StoreError> {
        self.shared
            .folder
            .update_settings(|settings| settings.legacy_migrated = true)
            .map(|_| ())
    }
}

/// `Ok(None)` when there is nothing worth migrating.
fn parse_legacy_scene(
    elements: Option<&str>,
    app_state: Option<&str>,
) -> Result<Option<(Vec<Element>, AppState)>, serde_json::Error> {
    if elements.is_none() && app_state.is_none() {
        return Ok(None);
    }

    let elements = match elements {
        Some(text) => serde_json::from_str::<Vec<Element>>(text)?,
        None => Vec::new(),
    };
    let app_state = match app_state {
        Some(text) => serde_json::from_str::<AppState>(text)?,
        None => AppState::new(),
    };

    if elements.is_empty() {
        return Ok(None);
    }
    Ok(Some((elements, app_state)))
}

impl Shared {
    fn lock_io(&self) -> MutexGuard<'_, ()> {
        self.io.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes a brand-new document and appends its index entry. Caller holds the io lock.
    fn insert_new(
        &self,
        name: &str,
        data: DiagramData,
        thumbnail: Option<String>,
    ) -> Result<StoredDiagram, StoreError> {
        let mut index = self.folder.load_index()?;
        let existing = index
            .iter()
            .map(|entry| entry.id.clone())
            .collect::<HashSet<_>>();
        let id = generate_word_id(&existing);

        let now = now_millis();
        let diagram = StoredDiagram {
            id,
            name: name.to_owned(),
            data,
            created_at: now,
            updated_at: now,
        };

        self.folder.save_diagram(&diagram)?;
        index.push(IndexEntry::for_diagram(&diagram, thumbnail));
        self.folder.save_index(&index)?;

        tracing::debug!(diagram_id = %diagram.id, "store: created diagram");
        Ok(diagram)
    }

    /// Replaces a document's data and refreshes its index entry. `None` if it no longer exists.
    fn write_data(
        &self,
        id: &DiagramId,
        data: DiagramData,
    ) -> Result<Option<StoredDiagram>, StoreError> {
        let _io = self.lock_io();
        let Some(mut diagram) = self.folder.load_diagram(id)? else {
            return Ok(None);
        };

        diagram.touch_with(data, now_millis());
        self.folder.save_diagram(&diagram)?;

        let mut index = self.folder.load_index()?;
        if let Some(entry) = index.iter_mut().find(|entry| &entry.id == id) {
            entry.updated_at = diagram.updated_at;
            entry.element_count = diagram.data.element_count();
            self.folder.save_index(&index)?;
        }
        Ok(Some(diagram))
    }

    fn set_thumbnail(&self, id: &DiagramId, thumbnail: Option<String>) -> Result<(), StoreError> {
        let _io = self.lock_io();
        let mut index = self.folder.load_index()?;
        let Some(entry) = index.iter_mut().find(|entry| &entry.id == id) else {
            return Ok(());
        };
        entry.thumbnail = thumbnail;
        self.folder.save_index(&index)
    }

    fn refresh_thumbnail(&self, id: &DiagramId, data: &DiagramData) -> Result<(), StoreError> {
        match self.thumbnailer.render(&data.elements, &data.files) {
            Ok(thumbnail) => self.set_thumbnail(id, thumbnail),
            Err(err) => {
                tracing::warn!(diagram_id = %id, error = %err, "store: thumbnail rendering failed");
                Ok(())
            }
        }
    }

    fn envelope(&self, diagram: &StoredDiagram) -> Result<String, StoreError> {
        serialize_envelope(&diagram.data, &self.config.source_origin).map_err(|source| {
            StoreError::Json {
                path: self.folder.diagram_path(&diagram.id),
                source,
            }
        })
    }
}
