use crate::flags::RenderFlags;
use crate::scene::{GlyphRunPrimitive, PathPrimitive};
use crate::types::Color;

/// Forced paint colors by semantic role. Absence of a scheme (the usual
/// case) leaves primitives on their native colors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScheme {
    pub path_fill: Color,
    pub path_stroke: Color,
    pub text_fill: Color,
    pub text_stroke: Color,
}

impl ColorScheme {
    pub fn new(path_fill: Color, path_stroke: Color, text_fill: Color, text_stroke: Color) -> Self {
        Self {
            path_fill,
            path_stroke,
            text_fill,
            text_stroke,
        }
    }
}

/// One resolved paint pass over a primitive's geometry, in paint order.
/// The mapper decides policy; the compositor only executes steps. The
/// primitive's blend mode is never part of the mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaintStep {
    Fill(Color),
    Stroke(Color),
}

pub(crate) fn path_paint_steps(
    path: &PathPrimitive,
    scheme: Option<&ColorScheme>,
    flags: RenderFlags,
) -> Vec<PaintStep> {
    let mut steps = Vec::with_capacity(2);
    match scheme {
        None => {
            if let Some(color) = path.fill_color {
                steps.push(PaintStep::Fill(color));
            }
            if let Some(color) = path.stroke_color {
                steps.push(PaintStep::Stroke(color));
            }
        }
        Some(scheme) => {
            let convert = flags.contains(RenderFlags::CONVERT_FILL_TO_STROKE);
            if path.fill_color.is_some() {
                if convert {
                    steps.push(PaintStep::Stroke(scheme.path_stroke));
                } else {
                    steps.push(PaintStep::Fill(scheme.path_fill));
                }
            }
            if path.stroke_color.is_some() {
                steps.push(PaintStep::Stroke(scheme.path_stroke));
            }
        }
    }
    // A converted fill next to a native stroke maps to the same stroke
    // pass twice; emit it once.
    steps.dedup();
    steps
}

/// Glyph runs ignore `CONVERT_FILL_TO_STROKE`: text fills stay fills.
pub(crate) fn glyph_paint_steps(
    run: &GlyphRunPrimitive,
    scheme: Option<&ColorScheme>,
    _flags: RenderFlags,
) -> Vec<PaintStep> {
    let mut steps = Vec::with_capacity(2);
    if let Some(color) = run.fill_color {
        steps.push(PaintStep::Fill(match scheme {
            Some(scheme) => scheme.text_fill,
            None => color,
        }));
    }
    if let Some(color) = run.stroke_color {
        steps.push(PaintStep::Stroke(match scheme {
            Some(scheme) => scheme.text_stroke,
            None => color,
        }));
    }
    steps
}
