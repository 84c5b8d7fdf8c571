// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Preview rendering for index entries.
//!
//! Rendering a drawing is someone else's job; the store only needs a small image it can put in
//! the index. [`SvgThumbnailer`] draws element outlines, which is enough to tell drawings apart.

use std::fmt;
use std::fmt::Write as _;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;

use crate::model::{BinaryFiles, Element};

pub const THUMBNAIL_WIDTH: f64 = 300.0;
pub const THUMBNAIL_HEIGHT: f64 = 200.0;

const DEFAULT_STROKE: &str = "#1e1e1e";
const BACKGROUND: &str = "#ffffff";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailError {
    message: String,
}

impl ThumbnailError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ThumbnailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thumbnail rendering failed: {}", self.message)
    }
}

impl std::error::Error for ThumbnailError {}

/// Produces a preview image URL for a scene, or `None` when there is nothing to show.
pub trait ThumbnailRenderer: Send + Sync {
    fn render(
        &self,
        elements: &[Element],
        files: &BinaryFiles,
    ) -> Result<Option<String>, ThumbnailError>;
}

/// Never renders anything. Useful where previews are not wanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoThumbnails;

impl ThumbnailRenderer for NoThumbnails {
    fn render(&self, _: &[Element], _: &BinaryFiles) -> Result<Option<String>, ThumbnailError> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounds {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Bounds {
    fn union(self, other: Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    fn width(&self) -> f64 {
        (self.max_x - self.min_x).max(1.0)
    }

    fn height(&self) -> f64 {
        (self.max_y - self.min_y).max(1.0)
    }
}

#[derive(Debug)]
struct Shape<'a> {
    kind: &'a str,
    bounds: Bounds,
    stroke: &'a str,
}

/// Outline renderer: a white 300x200 (at most) SVG, base64 encoded as a data URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct SvgThumbnailer;

impl ThumbnailRenderer for SvgThumbnailer {
    fn render(
        &self,
        elements: &[Element],
        _files: &BinaryFiles,
    ) -> Result<Option<String>, ThumbnailError> {
        let shapes = elements.iter().filter_map(shape_of).collect::<Vec<_>>();
        let Some(bounds) = shapes
            .iter()
            .map(|shape| shape.bounds)
            .reduce(Bounds::union)
        else {
            return Ok(None);
        };

        let scale = (THUMBNAIL_WIDTH / bounds.width())
            .min(THUMBNAIL_HEIGHT / bounds.height())
            .min(1.0);
        let width = bounds.width() * scale;
        let height = bounds.height() * scale;

        let mut svg = String::new();
        write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.0}" height="{height:.0}" viewBox="0 0 {width:.2} {height:.2}">"#
        )
        .map_err(|err| ThumbnailError::new(err.to_string()))?;
        write!(svg, r#"<rect width="100%" height="100%" fill="{BACKGROUND}"/>"#)
            .map_err(|err| ThumbnailError::new(err.to_string()))?;

        for shape in &shapes {
            let x = (shape.bounds.min_x - bounds.min_x) * scale;
            let y = (shape.bounds.min_y - bounds.min_y) * scale;
            let w = (shape.bounds.max_x - shape.bounds.min_x) * scale;
            let h = (shape.bounds.max_y - shape.bounds.min_y) * scale;
            write_shape(&mut svg, shape, x, y, w, h)
                .map_err(|err| ThumbnailError::new(err.to_string()))?;
        }
        svg.push_str("</svg>");

        Ok(Some(format!(
            "data:image/svg+xml;base64,{}",
            STANDARD.encode(svg.as_bytes())
        )))
    }
}

fn shape_of(element: &Element) -> Option<Shape<'_>> {
    if element.get("isDeleted").and_then(Value::as_bool) == Some(true) {
        return None;
    }

    let number = |key: &str| element.get(key).and_then(Value::as_f64);
    let x = number("x")?;
    let y = number("y")?;
    let width = number("width").unwrap_or(0.0);
    let height = number("height").unwrap_or(0.0);

    let stroke = element
        .get("strokeColor")
        .and_then(Value::as_str)
        .filter(|color| is_plain_color(color))
        .unwrap_or(DEFAULT_STROKE);

    Some(Shape {
        kind: element.get("type").and_then(Value::as_str).unwrap_or(""),
        bounds: Bounds {
            min_x: x.min(x + width),
            min_y: y.min(y + height),
            max_x: x.max(x + width),
            max_y: y.max(y + height),
        },
        stroke,
    })
}

// Colors end up inside an attribute; anything that could break out of it is replaced.
fn is_plain_color(color: &str) -> bool {
    !color.is_empty()
        && color
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '#' | '(' | ')' | ',' | '.' | ' ' | '%'))
}

fn write_shape(svg: &mut String, shape: &Shape<'_>, x: f64, y: f64, w: f64, h: f64) -> fmt::Result {
    let stroke = shape.stroke;
    match shape.kind {
        "ellipse" => write!(
            svg,
            r#"<ellipse cx="{:.2}" cy="{:.2}" rx="{:.2}" ry="{:.2}" fill="none" stroke="{stroke}"/>"#,
            x + w / 2.0,
            y + h / 2.0,
            w / 2.0,
            h / 2.0
        ),
        "diamond" => write!(
            svg,
            r#"<polygon points="{:.2},{:.2} {:.2},{:.2} {:.2},{:.2} {:.2},{:.2}" fill="none" stroke="{stroke}"/>"#,
            x + w / 2.0,
            y,
            x + w,
            y + h / 2.0,
            x + w / 2.0,
            y + h,
            x,
            y + h / 2.0
        ),
        "line" | "arrow" | "freedraw" => write!(
            svg,
            r#"<line x1="{x:.2}" y1="{y:.2}" x2="{:.2}" y2="{:.2}" stroke="{stroke}"/>"#,
            x + w,
            y + h
        ),
        _ => write!(
            svg,
            r#"<rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" fill="none" stroke="{stroke}"/>"#
        ),
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde_json::json;

    use super::{NoThumbnails, SvgThumbnailer, ThumbnailRenderer};
    use crate::model::BinaryFiles;

    fn decode(url: &str) -> String {
        let payload = url
            .strip_prefix("data:image/svg+xml;base64,")
            .expect("svg data url");
        String::from_utf8(STANDARD.decode(payload).unwrap()).unwrap()
    }

    #[test]
    fn empty_or_fully_deleted_scene_has_no_thumbnail() {
        let files = BinaryFiles::new();
        assert_eq!(SvgThumbnailer.render(&[], &files).unwrap(), None);

        let deleted = json!({ "type": "rectangle", "x": 0, "y": 0, "width": 10, "height": 10, "isDeleted": true });
        assert_eq!(SvgThumbnailer.render(&[deleted], &files).unwrap(), None);
    }

    #[test]
    fn large_scene_is_scaled_into_the_thumbnail_box() {
        let elements = vec![
            json!({ "type": "rectangle", "x": 0, "y": 0, "width": 600, "height": 100 }),
            json!({ "type": "ellipse", "x": 0, "y": 300, "width": 100, "height": 100 }),
        ];
        let svg = decode(&SvgThumbnailer.render(&elements, &BinaryFiles::new()).unwrap().unwrap());

        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"width="300" height="200""#), "{svg}");
        assert!(svg.contains("<ellipse"));
    }

    #[test]
    fn small_scene_is_not_upscaled() {
        let elements = vec![json!({ "type": "diamond", "x": 5, "y": 5, "width": 40, "height": 20 })];
        let svg = decode(&SvgThumbnailer.render(&elements, &BinaryFiles::new()).unwrap().unwrap());
        assert!(svg.contains(r#"width="40" height="20""#), "{svg}");
        assert!(svg.contains("<polygon"));
    }

    #[test]
    fn unsafe_stroke_colors_fall_back_to_default() {
        let elements = vec![json!({
            "type": "rectangle", "x": 0, "y": 0, "width": 10, "height": 10,
            "strokeColor": "\"/><script>"
        })];
        let svg = decode(&SvgThumbnailer.render(&elements, &BinaryFiles::new()).unwrap().unwrap());
        assert!(!svg.contains("script"));
        assert!(svg.contains("#1e1e1e"));
    }

    #[test]
    fn no_thumbnails_renders_nothing() {
        let elements = vec![json!({ "type": "rectangle", "x": 0, "y": 0 })];
        assert_eq!(NoThumbnails.render(&elements, &BinaryFiles::new()).unwrap(), None);
    }
}
