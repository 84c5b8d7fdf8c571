// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Core data model.
//!
//! Documents carry an opaque drawing payload; the index, versions and tabs are views over them.

pub mod diagram;
pub mod ids;
pub mod tab;
pub mod word_id;

pub use diagram::{
    now_millis, AppState, BinaryFiles, DiagramData, DiagramVersion, Element, IndexEntry,
    StoredDiagram, COLLABORATORS_KEY,
};
pub use ids::{DiagramId, Id, IdError, VersionId};
pub use tab::{Tab, TabSession};
pub use word_id::{generate_word_id, generate_word_id_with};
