// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use async_trait::async_trait;

use crate::model::{DiagramData, DiagramId, StoredDiagram, TabSession, VersionId};
use crate::store::{DiagramStore, StoreError};

/// The store operations the tab coordinator depends on.
#[async_trait]
pub trait DiagramRepository: Send + Sync {
    async fn get(&self, id: &DiagramId) -> Result<Option<StoredDiagram>, StoreError>;

    async fn create(&self, name: Option<&str>) -> Result<StoredDiagram, StoreError>;

    /// Debounced; returns immediately.
    fn save(&self, id: &DiagramId, data: DiagramData);

    async fn save_immediate(&self, id: &DiagramId, data: DiagramData) -> Result<(), StoreError>;

    async fn cancel_pending_save(&self, id: &DiagramId);

    /// Pushes every pending write for `id` out, including the mirror copy.
    async fn flush_save(&self, id: &DiagramId);

    async fn rename(&self, id: &DiagramId, name: &str) -> Result<(), StoreError>;

    async fn restore_version(
        &self,
        id: &DiagramId,
        version_id: &VersionId,
    ) -> Result<Option<DiagramData>, StoreError>;

    async fn regenerate_thumbnail(
        &self,
        id: &DiagramId,
        data: &DiagramData,
    ) -> Result<(), StoreError>;

    async fn load_tab_session(&self) -> Result<TabSession, StoreError>;

    async fn store_tab_session(&self, session: &TabSession) -> Result<(), StoreError>;
}

#[async_trait]
impl DiagramRepository for DiagramStore {
    async fn get(&self, id: &DiagramId) -> Result<Option<StoredDiagram>, StoreError> {
        DiagramStore::get(self, id).await
    }

    async fn create(&self, name: Option<&str>) -> Result<StoredDiagram, StoreError> {
        DiagramStore::create(self, name).await
    }

    fn save(&self, id: &DiagramId, data: DiagramData) {
        DiagramStore::save(self, id, data);
    }

    async fn save_immediate(&self, id: &DiagramId, data: DiagramData) -> Result<(), StoreError> {
        DiagramStore::save_immediate(self, id, data).await
    }

    async fn cancel_pending_save(&self, id: &DiagramId) {
        DiagramStore::cancel_pending_save(self, id).await;
    }

    async fn flush_save(&self, id: &DiagramId) {
        DiagramStore::flush_save(self, id).await;
        self.mirror().flush(id).await;
    }

    async fn rename(&self, id: &DiagramId, name: &str) -> Result<(), StoreError> {
        DiagramStore::rename(self, id, name).await
    }

    async fn restore_version(
        &self,
        id: &DiagramId,
        version_id: &VersionId,
    ) -> Result<Option<DiagramData>, StoreError> {
        DiagramStore::restore_version(self, id, version_id).await
    }

    async fn regenerate_thumbnail(
        &self,
        id: &DiagramId,
        data: &DiagramData,
    ) -> Result<(), StoreError> {
        DiagramStore::regenerate_thumbnail(self, id, data).await
    }

    async fn load_tab_session(&self) -> Result<TabSession, StoreError> {
        DiagramStore::load_tab_session(self).await
    }

    async fn store_tab_session(&self, session: &TabSession) -> Result<(), StoreError> {
        DiagramStore::store_tab_session(self, session).await
    }
}
