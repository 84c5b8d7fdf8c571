// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Open tabs, the in-memory document cache, and the binding of one document to the editing
//! surface.

pub mod coordinator;
pub mod repository;
pub mod surface;

pub use coordinator::{TabCoordinator, TabStatus};
pub use repository::DiagramRepository;
pub use surface::{EditingSurface, MemorySurface};
