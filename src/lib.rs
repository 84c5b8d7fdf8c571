// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! excalidraw-tabs: multi-document persistence for a drawing editor.
//!
//! Documents live in a local store folder with a debounced write path, an optional plain-file
//! mirror and per-document versions. The tab coordinator keeps the open documents consistent
//! with the editing surface while the user switches between them.

pub mod format;
pub mod model;
pub mod store;
pub mod tabs;
