// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::time::Duration;

use super::WriteDurability;

pub const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_millis(300);
pub const DEFAULT_THUMBNAIL_DEBOUNCE: Duration = Duration::from_millis(3000);
pub const DEFAULT_MIRROR_DEBOUNCE: Duration = Duration::from_millis(1000);
pub const DEFAULT_SOURCE_ORIGIN: &str = "excalidraw-tabs";

/// Timing and output knobs shared by the store and the folder mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub save_debounce: Duration,
    pub thumbnail_debounce: Duration,
    pub mirror_debounce: Duration,
    /// Written as `source` into every envelope.
    pub source_origin: String,
    pub durability: WriteDurability,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            save_debounce: DEFAULT_SAVE_DEBOUNCE,
            thumbnail_debounce: DEFAULT_THUMBNAIL_DEBOUNCE,
            mirror_debounce: DEFAULT_MIRROR_DEBOUNCE,
            source_origin: DEFAULT_SOURCE_ORIGIN.to_owned(),
            durability: WriteDurability::default(),
        }
    }
}

impl StoreConfig {
    pub fn with_save_debounce(mut self, delay: Duration) -> Self {
        self.save_debounce = delay;
        self
    }

    pub fn with_thumbnail_debounce(mut self, delay: Duration) -> Self {
        self.thumbnail_debounce = delay;
        self
    }

    pub fn with_mirror_debounce(mut self, delay: Duration) -> Self {
        self.mirror_debounce = delay;
        self
    }

    pub fn with_source_origin(mut self, origin: impl Into<String>) -> Self {
        self.source_origin = origin.into();
        self
    }

    pub fn with_durability(mut self, durability: WriteDurability) -> Self {
        self.durability = durability;
        self
    }
}
