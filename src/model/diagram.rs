// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::{DiagramId, VersionId};

/// App-state key holding live multi-user presence. Never persisted.
pub const COLLABORATORS_KEY: &str = "collaborators";

/// Opaque drawing element as produced by the editor.
pub type Element = Value;

/// Binary file records keyed by file id.
pub type BinaryFiles = BTreeMap<String, Value>;

/// Partial view state of the editor.
pub type AppState = Map<String, Value>;

/// The document payload: elements, partial view state, binary files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramData {
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub app_state: AppState,
    #[serde(default)]
    pub files: BinaryFiles,
}

impl DiagramData {
    pub fn new(elements: Vec<Element>, app_state: AppState, files: BinaryFiles) -> Self {
        let mut data = Self {
            elements,
            app_state,
            files,
        };
        data.strip_transient();
        data
    }

    /// Removes presence information that must never reach durable storage.
    pub fn strip_transient(&mut self) {
        self.app_state.remove(COLLABORATORS_KEY);
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.app_state.is_empty() && self.files.is_empty()
    }
}

/// A persisted document record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDiagram {
    pub id: DiagramId,
    pub name: String,
    pub data: DiagramData,
    pub created_at: u64,
    pub updated_at: u64,
}

impl StoredDiagram {
    /// Replaces the payload and advances `updated_at` without ever moving it backwards.
    pub fn touch_with(&mut self, data: DiagramData, now: u64) {
        self.data = data;
        self.updated_at = self.updated_at.max(now);
    }
}

/// Denormalized dashboard summary of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub id: DiagramId,
    pub name: String,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub element_count: usize,
}

impl IndexEntry {
    pub fn for_diagram(diagram: &StoredDiagram, thumbnail: Option<String>) -> Self {
        Self {
            id: diagram.id.clone(),
            name: diagram.name.clone(),
            created_at: diagram.created_at,
            updated_at: diagram.updated_at,
            thumbnail,
            element_count: diagram.data.element_count(),
        }
    }
}

/// An immutable snapshot of a document. Only `label` may change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramVersion {
    pub id: VersionId,
    pub label: String,
    pub timestamp: u64,
    pub data: DiagramData,
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
