// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! The `.excalidraw` envelope shared by exported files and mirrored files.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{AppState, BinaryFiles, DiagramData, Element};

pub const ENVELOPE_TYPE: &str = "excalidraw";
pub const ENVELOPE_VERSION: u32 = 2;
pub const FILE_EXTENSION: &str = "excalidraw";

const SCENE_SUFFIX: &str = ".excalidraw";
const JSON_SUFFIX: &str = ".json";
const IMPORTED_FALLBACK_NAME: &str = "Imported";
const UNTITLED_FILE_STEM: &str = "Untitled";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeRef<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    version: u32,
    source: &'a str,
    elements: &'a [Element],
    app_state: &'a AppState,
    files: &'a BinaryFiles,
}

/// Serializes `data` as a formatted envelope. Presence data is never written.
pub fn serialize_envelope(data: &DiagramData, source: &str) -> Result<String, serde_json::Error> {
    let mut app_state = data.app_state.clone();
    app_state.remove(crate::model::COLLABORATORS_KEY);

    serde_json::to_string_pretty(&EnvelopeRef {
        kind: ENVELOPE_TYPE,
        version: ENVELOPE_VERSION,
        source,
        elements: &data.elements,
        app_state: &app_state,
        files: &data.files,
    })
}

#[derive(Debug)]
pub enum ImportError {
    Json(serde_json::Error),
    NotAnObject,
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(source) => write!(f, "invalid scene json: {source}"),
            Self::NotAnObject => f.write_str("scene must be a JSON object"),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(source) => Some(source),
            Self::NotAnObject => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneJson {
    #[serde(default)]
    elements: Option<Vec<Element>>,
    #[serde(default)]
    app_state: Option<AppState>,
    #[serde(default)]
    files: Option<BinaryFiles>,
}

/// Parses any JSON object carrying optional `elements`/`appState`/`files`.
///
/// Absent or `null` fields become empty containers; present fields of the wrong shape are
/// rejected.
pub fn parse_scene(text: &str) -> Result<DiagramData, ImportError> {
    let value: Value = serde_json::from_str(text).map_err(ImportError::Json)?;
    if !value.is_object() {
        return Err(ImportError::NotAnObject);
    }

    let scene: SceneJson = serde_json::from_value(value).map_err(ImportError::Json)?;
    Ok(DiagramData::new(
        scene.elements.unwrap_or_default(),
        scene.app_state.unwrap_or_default(),
        scene.files.unwrap_or_default(),
    ))
}

/// Derives a document name from an imported file's base name.
pub fn diagram_name_from_file_name(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(file_name);
    let stem = base.strip_suffix(SCENE_SUFFIX).unwrap_or(base);
    let stem = stem.strip_suffix(JSON_SUFFIX).unwrap_or(stem);

    if stem.is_empty() {
        IMPORTED_FALLBACK_NAME.to_owned()
    } else {
        stem.to_owned()
    }
}

/// Replaces characters that are illegal on common filesystems with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced = name
        .chars()
        .map(|ch| match ch {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            ch if ch <= '\u{1f}' => '_',
            ch => ch,
        })
        .collect::<String>();

    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        UNTITLED_FILE_STEM.to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// `<sanitized-name>.excalidraw`
pub fn scene_file_name(name: &str) -> String {
    format!("{}{SCENE_SUFFIX}", sanitize_file_name(name))
}

pub fn is_scene_file_name(file_name: &str) -> bool {
    file_name.ends_with(SCENE_SUFFIX)
}
