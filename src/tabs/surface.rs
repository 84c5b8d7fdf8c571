// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use crate::model::DiagramData;

/// The live editor the coordinator binds documents to.
pub trait EditingSurface: Send {
    /// Everything currently on the surface. May include transient presence data.
    fn scene(&self) -> DiagramData;

    fn load_scene(&mut self, data: &DiagramData);

    /// Clears the surface for a document that has no stored data yet.
    fn reset_scene(&mut self);
}

/// Surface that just holds a scene in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    scene: DiagramData,
    loads: usize,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the scene as if the user had drawn it.
    pub fn edit(&mut self, data: DiagramData) {
        self.scene = data;
    }

    /// How many times a scene was loaded or reset.
    pub fn loads(&self) -> usize {
        self.loads
    }
}

impl EditingSurface for MemorySurface {
    fn scene(&self) -> DiagramData {
        self.scene.clone()
    }

    fn load_scene(&mut self, data: &DiagramData) {
        self.scene = data.clone();
        self.loads += 1;
    }

    fn reset_scene(&mut self) {
        self.scene = DiagramData::default();
        self.loads += 1;
    }
}
