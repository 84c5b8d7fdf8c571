// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Short, human-memorable diagram ids (`adjective-noun-noun`).

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::seq::SliceRandom;
use rand::Rng;

use super::ids::DiagramId;

const ADJECTIVES: &[&str] = &[
    "amber", "bold", "brave", "bright", "calm", "clever", "cosy", "crisp", "daring", "eager",
    "fancy", "gentle", "glad", "golden", "happy", "humble", "jolly", "keen", "kind", "lively",
    "lucky", "merry", "mellow", "nimble", "proud", "quick", "quiet", "rapid", "shiny", "snowy",
    "sunny", "swift", "tidy", "vivid", "warm", "wise", "witty", "young", "zesty", "zen",
];

const NOUNS: &[&str] = &[
    "anchor", "apple", "arrow", "badger", "beacon", "birch", "bridge", "canyon", "cedar", "cloud",
    "comet", "coral", "delta", "dune", "ember", "falcon", "fern", "fjord", "forest", "garden",
    "harbor", "heron", "island", "lagoon", "lantern", "maple", "meadow", "mesa", "orbit", "otter",
    "panda", "pebble", "pine", "planet", "prairie", "quartz", "raven", "reef", "river", "robin",
    "saddle", "salmon", "spruce", "summit", "tiger", "tulip", "valley", "walrus",
];

/// Tries before the generator falls back to a time-stamped suffix.
const MAX_WORD_ATTEMPTS: usize = 64;

/// Generates a new id that is not contained in `existing`.
pub fn generate_word_id(existing: &HashSet<DiagramId>) -> DiagramId {
    generate_word_id_with(&mut rand::thread_rng(), existing)
}

pub fn generate_word_id_with<R: Rng + ?Sized>(
    rng: &mut R,
    existing: &HashSet<DiagramId>,
) -> DiagramId {
    let mut last = String::new();
    for _ in 0..MAX_WORD_ATTEMPTS {
        last = random_words(rng);
        if !existing.contains(last.as_str()) {
            return word_id(last);
        }
    }

    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let salt: u16 = rng.gen();
    let mut counter = 0u64;
    loop {
        let candidate = if counter == 0 {
            format!("{last}-{stamp:x}{salt:04x}")
        } else {
            format!("{last}-{stamp:x}{salt:04x}-{counter}")
        };
        if !existing.contains(candidate.as_str()) {
            return word_id(candidate);
        }
        counter += 1;
    }
}

fn random_words<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("calm");
    let first = NOUNS.choose(rng).copied().unwrap_or("otter");
    let second = NOUNS.choose(rng).copied().unwrap_or("river");
    format!("{adjective}-{first}-{second}")
}

fn word_id(value: String) -> DiagramId {
    DiagramId::from_trusted(value)
}
