use base64::Engine;
use tiny_skia::{
    FillRule, FilterQuality, LineCap, LineJoin, Mask, Paint, Path, PathBuilder, Pixmap,
    PixmapPaint, Stroke, StrokeDash, Transform,
};

use crate::flags::RenderFlags;
use crate::scene::{
    BlendMode, GlyphRunPrimitive, ImagePrimitive, ImageSource, PathOp, PathPrimitive, Primitive,
    StrokeStyle,
};
use crate::scheme::{self, ColorScheme, PaintStep};
use crate::types::Color;

/// Rasterizes exactly one primitive. Degenerate content (unbuildable paths,
/// empty glyph runs, undecodable images) is skipped in place; the walk is
/// never aborted for it.
pub(crate) fn draw_primitive(
    pixmap: &mut Pixmap,
    clip: Option<&Mask>,
    transform: Transform,
    primitive: &Primitive,
    scheme: Option<&ColorScheme>,
    flags: RenderFlags,
) {
    match primitive {
        Primitive::Path(path) => draw_path(pixmap, clip, transform, path, scheme, flags),
        Primitive::GlyphRun(run) => draw_glyph_run(pixmap, clip, transform, run, scheme, flags),
        Primitive::Image(image) => draw_image(pixmap, clip, transform, image),
        // Widget appearances belong to the forms overlay at close.
        Primitive::FormField(_) => {}
    }
}

fn draw_path(
    pixmap: &mut Pixmap,
    clip: Option<&Mask>,
    transform: Transform,
    path: &PathPrimitive,
    scheme: Option<&ColorScheme>,
    flags: RenderFlags,
) {
    let Some(sk_path) = build_path(&path.ops) else {
        return;
    };
    let rule = fill_rule(path.even_odd);
    for step in scheme::path_paint_steps(path, scheme, flags) {
        match step {
            PaintStep::Fill(color) => {
                pixmap.fill_path(&sk_path, &paint(color, path.blend), rule, transform, clip);
            }
            PaintStep::Stroke(color) => {
                pixmap.stroke_path(
                    &sk_path,
                    &paint(color, path.blend),
                    &build_stroke(&path.stroke),
                    transform,
                    clip,
                );
            }
        }
    }
}

fn draw_glyph_run(
    pixmap: &mut Pixmap,
    clip: Option<&Mask>,
    transform: Transform,
    run: &GlyphRunPrimitive,
    scheme: Option<&ColorScheme>,
    flags: RenderFlags,
) {
    if run.glyphs.is_empty() {
        return;
    }
    let steps = scheme::glyph_paint_steps(run, scheme, flags);
    for step in steps {
        for glyph in &run.glyphs {
            let Some(outline) = build_path(&glyph.ops) else {
                continue;
            };
            match step {
                PaintStep::Fill(color) => {
                    pixmap.fill_path(
                        &outline,
                        &paint(color, run.blend),
                        FillRule::Winding,
                        transform,
                        clip,
                    );
                }
                PaintStep::Stroke(color) => {
                    pixmap.stroke_path(
                        &outline,
                        &paint(color, run.blend),
                        &build_stroke(&run.stroke),
                        transform,
                        clip,
                    );
                }
            }
        }
    }
}

fn draw_image(
    pixmap: &mut Pixmap,
    clip: Option<&Mask>,
    transform: Transform,
    image: &ImagePrimitive,
) {
    let Some(source) = decode_image_source(&image.source) else {
        return;
    };
    let src_w = source.width() as f32;
    let src_h = source.height() as f32;
    let [a, b, c, d, e, f] = image.transform;
    if ![a, b, c, d, e, f].iter().all(|v| v.is_finite()) {
        return;
    }
    // Pixel space -> unit square with a local y-flip so source row 0 lands
    // at the visual top, then the primitive CTM, then page -> device.
    let unit_ts = Transform::from_row(1.0 / src_w, 0.0, 0.0, -1.0 / src_h, 0.0, 1.0);
    let ctm = Transform::from_row(a, b, c, d, e, f);
    let device_ts = transform.pre_concat(ctm).pre_concat(unit_ts);
    let mut paint = PixmapPaint::default();
    paint.quality = FilterQuality::Bilinear;
    paint.opacity = image.opacity.clamp(0.0, 1.0);
    paint.blend_mode = blend_mode(image.blend);
    pixmap.draw_pixmap(0, 0, source.as_ref(), &paint, device_ts, clip);
}

/// Intersects the active clip with a page-space path. A degenerate clip
/// path keeps the current clip rather than clipping everything away.
pub(crate) fn intersect_clip(
    current: Option<&Mask>,
    ops: &[PathOp],
    even_odd: bool,
    transform: Transform,
    width: u32,
    height: u32,
) -> Option<Mask> {
    let Some(path) = build_path(ops) else {
        return current.cloned();
    };
    let rule = fill_rule(even_odd);
    if let Some(mask) = current {
        let mut mask = mask.clone();
        mask.intersect_path(&path, rule, true, transform);
        return Some(mask);
    }
    let mut mask = Mask::new(width, height)?;
    mask.fill_path(&path, rule, true, transform);
    Some(mask)
}

fn build_path(ops: &[PathOp]) -> Option<Path> {
    if ops.is_empty() {
        return None;
    }
    let mut builder = PathBuilder::new();
    for op in ops {
        match op {
            PathOp::MoveTo { x, y } => builder.move_to(x.to_f32(), y.to_f32()),
            PathOp::LineTo { x, y } => builder.line_to(x.to_f32(), y.to_f32()),
            PathOp::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => builder.cubic_to(
                x1.to_f32(),
                y1.to_f32(),
                x2.to_f32(),
                y2.to_f32(),
                x.to_f32(),
                y.to_f32(),
            ),
            PathOp::Close => builder.close(),
        }
    }
    builder.finish()
}

fn fill_rule(even_odd: bool) -> FillRule {
    if even_odd {
        FillRule::EvenOdd
    } else {
        FillRule::Winding
    }
}

fn paint(color: Color, blend: BlendMode) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_sk_color(color));
    paint.anti_alias = true;
    paint.blend_mode = blend_mode(blend);
    paint
}

fn blend_mode(blend: BlendMode) -> tiny_skia::BlendMode {
    match blend {
        BlendMode::Normal => tiny_skia::BlendMode::SourceOver,
        BlendMode::Multiply => tiny_skia::BlendMode::Multiply,
    }
}

fn to_sk_color(color: Color) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba(
        color.r.clamp(0.0, 1.0),
        color.g.clamp(0.0, 1.0),
        color.b.clamp(0.0, 1.0),
        color.a.clamp(0.0, 1.0),
    )
    .unwrap_or_else(|| tiny_skia::Color::from_rgba8(0, 0, 0, 255))
}

fn build_stroke(style: &StrokeStyle) -> Stroke {
    let mut stroke = Stroke::default();
    stroke.width = style.width.to_f32().max(0.0);
    stroke.miter_limit = style.miter_limit.to_f32().max(0.0);
    stroke.line_cap = match style.cap {
        1 => LineCap::Round,
        2 => LineCap::Square,
        _ => LineCap::Butt,
    };
    stroke.line_join = match style.join {
        1 => LineJoin::Round,
        2 => LineJoin::Bevel,
        _ => LineJoin::Miter,
    };

    if !style.dash_pattern.is_empty() {
        let mut pattern: Vec<f32> = style
            .dash_pattern
            .iter()
            .map(|p| p.abs().to_f32().max(0.0))
            .collect();
        if pattern.len() % 2 == 1 {
            let copy = pattern.clone();
            pattern.extend(copy);
        }
        if pattern.len() >= 2 {
            if let Some(dash) = StrokeDash::new(pattern, style.dash_phase.to_f32()) {
                stroke.dash = Some(dash);
            }
        }
    }

    stroke
}

fn decode_image_source(source: &ImageSource) -> Option<Pixmap> {
    match source {
        ImageSource::Rgba {
            width,
            height,
            pixels,
        } => {
            let expected = (*width as usize).checked_mul(*height as usize)?.checked_mul(4)?;
            if pixels.len() != expected {
                return None;
            }
            let mut pixmap = Pixmap::new(*width, *height)?;
            premultiply_into(pixels, pixmap.data_mut());
            Some(pixmap)
        }
        ImageSource::Encoded(bytes) => decode_image_bytes(bytes, None),
        ImageSource::DataUri(uri) => {
            let (mime, data) = parse_data_uri(uri)?;
            decode_image_bytes(&data, Some(&mime))
        }
    }
}

fn decode_image_bytes(data: &[u8], mime: Option<&str>) -> Option<Pixmap> {
    let guessed_format = if let Some(mime) = mime {
        if mime.contains("png") {
            Some(image::ImageFormat::Png)
        } else if mime.contains("jpeg") || mime.contains("jpg") {
            Some(image::ImageFormat::Jpeg)
        } else {
            None
        }
    } else {
        image::guess_format(data).ok()
    };

    let decoded = if let Some(fmt) = guessed_format {
        image::load_from_memory_with_format(data, fmt).ok()?
    } else {
        image::load_from_memory(data).ok()?
    };
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixmap = Pixmap::new(width, height)?;
    premultiply_into(rgba.as_raw(), pixmap.data_mut());
    Some(pixmap)
}

fn premultiply_into(src: &[u8], dst: &mut [u8]) {
    for (src_px, dst_px) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        let a = src_px[3];
        dst_px[0] = premul_u8(src_px[0], a);
        dst_px[1] = premul_u8(src_px[1], a);
        dst_px[2] = premul_u8(src_px[2], a);
        dst_px[3] = a;
    }
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|v| !v.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains(";base64") || header.ends_with("base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some((mime, data))
}
