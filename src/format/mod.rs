// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Scene file format: the `.excalidraw` JSON envelope, import parsing and file naming.

pub mod excalidraw;

pub use excalidraw::{
    diagram_name_from_file_name, is_scene_file_name, parse_scene, sanitize_file_name,
    scene_file_name, serialize_envelope, ImportError, ENVELOPE_TYPE, ENVELOPE_VERSION,
    FILE_EXTENSION,
};
