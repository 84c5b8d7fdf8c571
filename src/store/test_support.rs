// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};

use crate::model::{DiagramData, DiagramId};

static TEMP_DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub(crate) struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub(crate) fn new(prefix: &str) -> Self {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
        let counter = TEMP_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut path = env::temp_dir();
        path.push(format!("excalidraw-tabs-{prefix}-{}-{nanos}-{counter}", std::process::id()));
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

pub(crate) fn did(value: &str) -> DiagramId {
    DiagramId::new(value).unwrap()
}

pub(crate) fn rect(id: &str, x: f64, y: f64) -> Value {
    json!({ "id": id, "type": "rectangle", "x": x, "y": y, "width": 40.0, "height": 20.0 })
}

/// A scene with `count` rectangles laid out in a row.
pub(crate) fn scene(count: usize) -> DiagramData {
    let elements = (0..count)
        .map(|i| rect(&format!("r{i}"), i as f64 * 50.0, 0.0))
        .collect();
    DiagramData::new(elements, Default::default(), Default::default())
}
