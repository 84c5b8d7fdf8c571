// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Binds open tabs to the editing surface.
//!
//! Change events are attributed to the document that is *loaded* on the surface, never to the
//! merely selected one: between selecting a tab and its data arriving, changes are dropped.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::repository::DiagramRepository;
use super::surface::EditingSurface;
use crate::model::{
    AppState, BinaryFiles, DiagramData, DiagramId, Element, Tab, TabSession, VersionId,
};
use crate::store::StoreError;

/// Where a document is in its open/edit/save life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabStatus {
    Unloaded,
    Loading,
    Loaded,
    Dirty,
    Saving,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum SurfacePhase {
    #[default]
    Unbound,
    Loading(DiagramId),
    Loaded(DiagramId),
}

#[derive(Debug, Default)]
struct CoordinatorState {
    tabs: TabSession,
    phase: SurfacePhase,
    load_generation: u64,
    saving: HashSet<DiagramId>,
    cache: HashMap<DiagramId, DiagramData>,
    dirty: HashSet<DiagramId>,
    session_warning: Option<String>,
}

impl CoordinatorState {
    fn loaded_tab(&self) -> Option<&DiagramId> {
        match &self.phase {
            SurfacePhase::Loaded(id) => Some(id),
            _ => None,
        }
    }

    fn set_dirty(&mut self, id: &DiagramId, dirty: bool) {
        if dirty {
            self.dirty.insert(id.clone());
        } else {
            self.dirty.remove(id);
        }
        if let Some(tab) = self.tabs.get_mut(id) {
            tab.is_dirty = dirty;
        }
    }
}

pub struct TabCoordinator<R, S> {
    repository: R,
    state: Mutex<CoordinatorState>,
    surface: Mutex<S>,
}

impl<R, S> TabCoordinator<R, S>
where
    R: DiagramRepository,
    S: EditingSurface,
{
    pub fn new(repository: R, surface: S) -> Self {
        Self {
            repository,
            state: Mutex::new(CoordinatorState::default()),
            surface: Mutex::new(surface),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn with_surface<T>(&self, f: impl FnOnce(&mut S) -> T) -> T {
        f(&mut self.lock_surface())
    }

    pub fn tabs(&self) -> Vec<Tab> {
        self.lock_state().tabs.open_tabs.clone()
    }

    pub fn active_tab_id(&self) -> Option<DiagramId> {
        self.lock_state().tabs.active_tab_id.clone()
    }

    /// The document bound to the surface, once its load has completed.
    pub fn loaded_tab_id(&self) -> Option<DiagramId> {
        self.lock_state().loaded_tab().cloned()
    }

    pub fn cached(&self, id: &DiagramId) -> Option<DiagramData> {
        self.lock_state().cache.get(id).cloned()
    }

    pub fn is_dirty(&self, id: &DiagramId) -> bool {
        self.lock_state().dirty.contains(id)
    }

    /// Set while the tab list cannot be persisted. Editing continues regardless.
    pub fn session_warning(&self) -> Option<String> {
        self.lock_state().session_warning.clone()
    }

    pub fn tab_status(&self, id: &DiagramId) -> TabStatus {
        let state = self.lock_state();
        if state.saving.contains(id) {
            return TabStatus::Saving;
        }
        match &state.phase {
            SurfacePhase::Loading(loading) if loading == id => TabStatus::Loading,
            SurfacePhase::Loaded(loaded) if loaded == id => {
                if state.dirty.contains(id) {
                    TabStatus::Dirty
                } else {
                    TabStatus::Loaded
                }
            }
            _ => TabStatus::Unloaded,
        }
    }

    /// Loads `id` onto the surface: cache first, then the store, else an empty scene.
    pub async fn load_tab(&self, id: &DiagramId) -> Result<(), StoreError> {
        let generation = self.begin_load(id);
        self.finish_load(id, generation).await
    }

    /// Saves the bound document, then binds `id`. Opens `id` as a tab if needed.
    pub async fn switch_tab(&self, id: &DiagramId) -> Result<(), StoreError> {
        {
            let state = self.lock_state();
            if state.phase == SurfacePhase::Loaded(id.clone()) {
                return Ok(());
            }
        }

        if self.lock_state().tabs.get(id).is_none() {
            let diagram = self
                .repository
                .get(id)
                .await?
                .ok_or_else(|| StoreError::NotFound {
                    diagram_id: id.clone(),
                })?;
            let mut state = self.lock_state();
            if state.tabs.get(id).is_none() {
                state.tabs.open_tabs.push(Tab::new(diagram.id, diagram.name));
            }
        }

        self.persist_loaded().await?;

        let generation = {
            let mut state = self.lock_state();
            state.tabs.active_tab_id = Some(id.clone());
            Self::begin_load_locked(&mut state, id)
        };
        self.store_session().await;
        self.finish_load(id, generation).await
    }

    /// Closes a tab after saving it. The neighbour that takes its slot becomes active.
    pub async fn close_tab(&self, id: &DiagramId) -> Result<(), StoreError> {
        let (is_open, is_loaded) = {
            let state = self.lock_state();
            (
                state.tabs.get(id).is_some(),
                state.loaded_tab() == Some(id),
            )
        };
        if !is_open {
            return Ok(());
        }

        if is_loaded {
            self.persist_loaded().await?;
        } else {
            self.repository.flush_save(id).await;
        }

        let (was_active, next) = {
            let mut state = self.lock_state();
            let was_active = state.tabs.active_tab_id.as_ref() == Some(id);
            let next = state.tabs.remove(id);
            state.cache.remove(id);
            state.set_dirty(id, false);
            if matches!(&state.phase, SurfacePhase::Loading(bound) | SurfacePhase::Loaded(bound) if bound == id)
            {
                state.phase = SurfacePhase::Unbound;
                state.load_generation += 1;
            }
            (was_active, next)
        };
        self.store_session().await;

        if !was_active {
            return Ok(());
        }
        match next {
            Some(next) => self.load_tab(&next).await,
            None => {
                self.lock_surface().reset_scene();
                Ok(())
            }
        }
    }

    /// Explicit save: writes the bound document now and clears its dirty flag.
    pub async fn save_current_tab(&self) -> Result<(), StoreError> {
        let Some((id, _)) = self.persist_loaded().await? else {
            return Ok(());
        };

        self.lock_state().set_dirty(&id, false);
        self.store_session().await;
        Ok(())
    }

    /// Records a change from the surface. Returns `false` when no document is loaded, in which
    /// case nothing is written.
    pub fn on_change(&self, elements: Vec<Element>, app_state: AppState, files: BinaryFiles) -> bool {
        let mut state = self.lock_state();
        let Some(id) = state.loaded_tab().cloned() else {
            tracing::debug!("tabs: dropped change while no document is loaded");
            return false;
        };

        let data = DiagramData::new(elements, app_state, files);
        state.cache.insert(id.clone(), data.clone());
        self.repository.save(&id, data);
        if !state.dirty.contains(&id) {
            state.set_dirty(&id, true);
        }
        true
    }

    /// Creates a document, opens it in a new tab and switches to it.
    pub async fn open_new_tab(&self, name: Option<&str>) -> Result<DiagramId, StoreError> {
        let diagram = self.repository.create(name).await?;
        {
            let mut state = self.lock_state();
            state.cache.insert(diagram.id.clone(), diagram.data.clone());
            state
                .tabs
                .open_tabs
                .push(Tab::new(diagram.id.clone(), diagram.name.clone()));
        }
        self.switch_tab(&diagram.id).await?;
        Ok(diagram.id)
    }

    pub async fn rename_tab(&self, id: &DiagramId, name: &str) -> Result<(), StoreError> {
        self.repository.rename(id, name).await?;
        {
            let mut state = self.lock_state();
            if let Some(tab) = state.tabs.get_mut(id) {
                tab.name = name.to_owned();
            }
        }
        self.store_session().await;
        Ok(())
    }

    /// Restores a version of the bound document onto the surface. `None` if nothing is bound or
    /// the version is unknown.
    pub async fn restore_version(
        &self,
        version_id: &VersionId,
    ) -> Result<Option<DiagramData>, StoreError> {
        let Some(id) = self.loaded_tab_id() else {
            return Ok(None);
        };

        self.repository.cancel_pending_save(&id).await;
        let Some(data) = self.repository.restore_version(&id, version_id).await? else {
            return Ok(None);
        };

        {
            let mut state = self.lock_state();
            if state.loaded_tab() != Some(&id) {
                return Ok(Some(data));
            }
            state.cache.insert(id.clone(), data.clone());
            state.set_dirty(&id, false);
            self.lock_surface().load_scene(&data);
        }
        self.store_session().await;
        Ok(Some(data))
    }

    /// Pushes out every pending debounced write for the open tabs.
    pub async fn flush_pending(&self) {
        let ids = self
            .tabs()
            .into_iter()
            .map(|tab| tab.id)
            .collect::<Vec<_>>();
        for id in ids {
            self.repository.flush_save(&id).await;
        }
    }

    /// Reopens the persisted tabs, dropping those whose document no longer exists, and loads the
    /// active one.
    pub async fn restore_session(&self) -> Result<Option<DiagramId>, StoreError> {
        let persisted = self.repository.load_tab_session().await?;

        let mut open_tabs = Vec::with_capacity(persisted.open_tabs.len());
        for tab in persisted.open_tabs {
            match self.repository.get(&tab.id).await? {
                Some(diagram) => open_tabs.push(Tab {
                    name: diagram.name,
                    ..tab
                }),
                None => tracing::debug!(diagram_id = %tab.id, "tabs: dropped tab of deleted diagram"),
            }
        }

        let active = persisted
            .active_tab_id
            .filter(|id| open_tabs.iter().any(|tab| &tab.id == id))
            .or_else(|| open_tabs.first().map(|tab| tab.id.clone()));

        let generation = {
            let mut state = self.lock_state();
            state.dirty = open_tabs
                .iter()
                .filter(|tab| tab.is_dirty)
                .map(|tab| tab.id.clone())
                .collect();
            state.tabs = TabSession {
                open_tabs,
                active_tab_id: active.clone(),
            };
            active
                .as_ref()
                .map(|id| Self::begin_load_locked(&mut state, id))
        };

        match (&active, generation) {
            (Some(id), Some(generation)) => self.finish_load(id, generation).await?,
            _ => {
                let mut state = self.lock_state();
                state.phase = SurfacePhase::Unbound;
            }
        }
        Ok(active)
    }

    fn begin_load(&self, id: &DiagramId) -> u64 {
        Self::begin_load_locked(&mut self.lock_state(), id)
    }

    fn begin_load_locked(state: &mut CoordinatorState, id: &DiagramId) -> u64 {
        state.phase = SurfacePhase::Loading(id.clone());
        state.load_generation += 1;
        state.load_generation
    }

    async fn finish_load(&self, id: &DiagramId, generation: u64) -> Result<(), StoreError> {
        let cached = self.lock_state().cache.get(id).cloned();
        let data = match cached {
            Some(data) => Some(data),
            None => match self.repository.get(id).await {
                Ok(diagram) => diagram.map(|diagram| diagram.data),
                Err(err) => {
                    let mut state = self.lock_state();
                    if state.load_generation == generation {
                        state.phase = SurfacePhase::Unbound;
                    }
                    return Err(err);
                }
            },
        };

        let mut state = self.lock_state();
        if state.load_generation != generation {
            tracing::debug!(diagram_id = %id, "tabs: superseded load abandoned");
            return Ok(());
        }

        let mut surface = self.lock_surface();
        match &data {
            Some(data) => {
                state.cache.insert(id.clone(), data.clone());
                surface.load_scene(data);
            }
            None => surface.reset_scene(),
        }
        state.phase = SurfacePhase::Loaded(id.clone());
        Ok(())
    }

    /// Snapshots the bound document into the cache and writes it now, dropping any pending
    /// debounced save whose payload is older than the surface. The dropped thumbnail refresh is
    /// rendered right away instead.
    async fn persist_loaded(&self) -> Result<Option<(DiagramId, DiagramData)>, StoreError> {
        let (id, data) = {
            let mut state = self.lock_state();
            let Some(id) = state.loaded_tab().cloned() else {
                return Ok(None);
            };
            let mut data = self.lock_surface().scene();
            data.strip_transient();
            state.cache.insert(id.clone(), data.clone());
            state.saving.insert(id.clone());
            (id, data)
        };

        self.repository.cancel_pending_save(&id).await;
        let result = self.repository.save_immediate(&id, data.clone()).await;
        self.lock_state().saving.remove(&id);

        result?;
        if let Err(err) = self.repository.regenerate_thumbnail(&id, &data).await {
            tracing::warn!(diagram_id = %id, error = %err, "tabs: thumbnail refresh failed");
        }
        Ok(Some((id, data)))
    }

    async fn store_session(&self) {
        let session = self.lock_state().tabs.clone();
        let result = self.repository.store_tab_session(&session).await;

        let mut state = self.lock_state();
        match result {
            Ok(()) => state.session_warning = None,
            Err(err) => {
                tracing::warn!(error = %err, "tabs: cannot persist open tabs");
                state.session_warning = Some(format!("open tabs could not be saved: {err}"));
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_surface(&self) -> MutexGuard<'_, S> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests;
