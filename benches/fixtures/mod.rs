// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

#![allow(dead_code)]

// Deterministic scenes for benchmarks (no RNG).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use excalidraw_tabs::model::{AppState, BinaryFiles, DiagramData};
use serde_json::{json, Value};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(prefix: &str) -> Self {
        let pid = std::process::id();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);

        let mut path = std::env::temp_dir();
        path.push(format!("excalidraw_tabs_bench_{prefix}_{pid}_{nanos}_{counter}"));
        std::fs::create_dir_all(&path).expect("create temp dir");

        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Case {
    Small,
    Medium,
    Large,
}

impl Case {
    pub fn element_count(self) -> usize {
        match self {
            Self::Small => 25,
            Self::Medium => 400,
            Self::Large => 4_000,
        }
    }
}

const KINDS: [&str; 5] = ["rectangle", "ellipse", "diamond", "arrow", "text"];

fn element(i: usize) -> Value {
    let kind = KINDS[i % KINDS.len()];
    let col = (i % 40) as f64;
    let row = (i / 40) as f64;
    let mut value = json!({
        "id": format!("el-{i:05}"),
        "type": kind,
        "x": col * 120.0,
        "y": row * 90.0,
        "width": 80.0 + (i % 7) as f64 * 10.0,
        "height": 40.0 + (i % 5) as f64 * 8.0,
        "angle": 0,
        "strokeColor": "#1e1e1e",
        "backgroundColor": "transparent",
        "seed": i as u64 * 7919,
        "version": 1 + i % 3,
        "isDeleted": i % 97 == 0,
    });
    if kind == "text" {
        value["text"] = json!(format!("label {i}"));
    }
    value
}

pub fn scene(case: Case) -> DiagramData {
    let elements = (0..case.element_count()).map(element).collect();
    let mut app_state = AppState::new();
    app_state.insert("viewBackgroundColor".to_owned(), json!("#ffffff"));
    app_state.insert("zoom".to_owned(), json!({ "value": 1 }));
    DiagramData::new(elements, app_state, BinaryFiles::new())
}
