// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Persistence for documents on disk.
//!
//! The store folder holds documents, the index, versions and settings. The diagram store owns the
//! debounced write path on top of it, and the mirror keeps a best-effort copy of every document
//! in a user-chosen folder.

pub mod config;
mod debounce;
pub mod diagram_store;
pub mod mirror;
pub mod store_folder;
pub mod thumbnail;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::StoreConfig;
pub use diagram_store::{DiagramStore, RestoreReport};
pub use mirror::{FilesystemMirror, FixedFolder, FolderPicker};
pub use store_folder::{StoreError, StoreFolder, StoreSettings, WriteDurability};
pub use thumbnail::{NoThumbnails, SvgThumbnailer, ThumbnailError, ThumbnailRenderer};
