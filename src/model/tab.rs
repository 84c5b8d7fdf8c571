// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use serde::{Deserialize, Serialize};

use super::ids::DiagramId;

/// A UI-level handle to an open document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: DiagramId,
    pub name: String,
    #[serde(default)]
    pub is_dirty: bool,
}

impl Tab {
    pub fn new(id: DiagramId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_dirty: false,
        }
    }
}

/// The ordered open tabs plus the active one, persisted for session restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSession {
    #[serde(default)]
    pub open_tabs: Vec<Tab>,
    #[serde(default)]
    pub active_tab_id: Option<DiagramId>,
}

impl TabSession {
    pub fn position(&self, id: &DiagramId) -> Option<usize> {
        self.open_tabs.iter().position(|tab| &tab.id == id)
    }

    pub fn get(&self, id: &DiagramId) -> Option<&Tab> {
        self.open_tabs.iter().find(|tab| &tab.id == id)
    }

    pub fn get_mut(&mut self, id: &DiagramId) -> Option<&mut Tab> {
        self.open_tabs.iter_mut().find(|tab| &tab.id == id)
    }

    /// Removes `id` and returns the tab that should become active if `id` was active.
    ///
    /// The neighbour keeps the closed tab's position, clamped to the new end of the list.
    pub fn remove(&mut self, id: &DiagramId) -> Option<DiagramId> {
        let index = self.position(id)?;
        self.open_tabs.remove(index);

        if self.active_tab_id.as_ref() != Some(id) {
            return self.active_tab_id.clone();
        }

        let next = if self.open_tabs.is_empty() {
            None
        } else {
            let next_index = index.min(self.open_tabs.len() - 1);
            Some(self.open_tabs[next_index].id.clone())
        };
        self.active_tab_id = next.clone();
        next
    }
}
