use crate::types::{Color, Pt, Rect, Size};

/// Compositing mode a primitive carries. The set is closed on purpose:
/// the compositor must match it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Normal,
    Multiply,
}

/// Page-space path segment. Glyph outlines and clip boundaries reuse the
/// same vocabulary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathOp {
    MoveTo { x: Pt, y: Pt },
    LineTo { x: Pt, y: Pt },
    CurveTo { x1: Pt, y1: Pt, x2: Pt, y2: Pt, x: Pt, y: Pt },
    Close,
}

/// Closed subpath tracing a rectangle, counter-clockwise in page space.
pub fn rect_path(rect: Rect) -> Vec<PathOp> {
    let x1 = rect.x + rect.width;
    let y1 = rect.y + rect.height;
    vec![
        PathOp::MoveTo { x: rect.x, y: rect.y },
        PathOp::LineTo { x: x1, y: rect.y },
        PathOp::LineTo { x: x1, y: y1 },
        PathOp::LineTo { x: rect.x, y: y1 },
        PathOp::Close,
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    pub width: Pt,
    /// 0 = butt, 1 = round, 2 = square.
    pub cap: u8,
    /// 0 = miter, 1 = round, 2 = bevel.
    pub join: u8,
    pub miter_limit: Pt,
    pub dash_pattern: Vec<Pt>,
    pub dash_phase: Pt,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            width: Pt::from_f32(1.0),
            cap: 0,
            join: 0,
            miter_limit: Pt::from_f32(4.0),
            dash_pattern: Vec::new(),
            dash_phase: Pt::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathPrimitive {
    pub ops: Vec<PathOp>,
    pub fill_color: Option<Color>,
    pub stroke_color: Option<Color>,
    pub even_odd: bool,
    pub stroke: StrokeStyle,
    pub blend: BlendMode,
}

impl PathPrimitive {
    pub fn filled(ops: Vec<PathOp>, color: Color) -> Self {
        Self {
            ops,
            fill_color: Some(color),
            stroke_color: None,
            even_odd: false,
            stroke: StrokeStyle::default(),
            blend: BlendMode::Normal,
        }
    }

    pub fn stroked(ops: Vec<PathOp>, color: Color, width: Pt) -> Self {
        Self {
            ops,
            fill_color: None,
            stroke_color: Some(color),
            even_odd: false,
            stroke: StrokeStyle {
                width,
                ..StrokeStyle::default()
            },
            blend: BlendMode::Normal,
        }
    }

    pub fn with_blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }
}

/// One glyph outline, already shaped and positioned in page space by the
/// text layer. The renderer never consults a font.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub ops: Vec<PathOp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRunPrimitive {
    pub glyphs: Vec<Glyph>,
    pub fill_color: Option<Color>,
    pub stroke_color: Option<Color>,
    pub stroke: StrokeStyle,
    pub blend: BlendMode,
}

impl GlyphRunPrimitive {
    pub fn filled(glyphs: Vec<Glyph>, color: Color) -> Self {
        Self {
            glyphs,
            fill_color: Some(color),
            stroke_color: None,
            stroke: StrokeStyle::default(),
            blend: BlendMode::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// Straight (non-premultiplied) RGBA8, row-major from the top-left.
    Rgba {
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    },
    /// PNG or JPEG bytes.
    Encoded(Vec<u8>),
    /// `data:` URI, optionally base64.
    DataUri(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImagePrimitive {
    pub source: ImageSource,
    /// Row-form matrix [a b c d e f] mapping the unit square onto the page,
    /// as in a page description CTM. Source row 0 lands at the top edge.
    pub transform: [f32; 6],
    pub opacity: f32,
    pub blend: BlendMode,
}

impl ImagePrimitive {
    /// Places the image into `rect`, axis-aligned.
    pub fn in_rect(source: ImageSource, rect: Rect) -> Self {
        Self {
            source,
            transform: [
                rect.width.to_f32(),
                0.0,
                0.0,
                rect.height.to_f32(),
                rect.x.to_f32(),
                rect.y.to_f32(),
            ],
            opacity: 1.0,
            blend: BlendMode::Normal,
        }
    }
}

/// Marks where an interactive widget lives. Never painted by the content
/// pass; the forms overlay reads these at close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormFieldPrimitive {
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Path(PathPrimitive),
    GlyphRun(GlyphRunPrimitive),
    Image(ImagePrimitive),
    FormField(FormFieldPrimitive),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneItem {
    /// Intersects the active clip with a page-space path. Not a pause point.
    PushClip { ops: Vec<PathOp>, even_odd: bool },
    PopClip,
    Draw {
        primitive: Primitive,
        annotation: bool,
    },
}

/// Ordered page content. Item order is paint order and the renderer
/// preserves it exactly; the scene is read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub page_size: Size,
    pub items: Vec<SceneItem>,
    pub has_transparency: bool,
}

impl Scene {
    /// Number of drawable primitives, annotation-tagged ones included.
    pub fn primitive_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, SceneItem::Draw { .. }))
            .count()
    }

    pub fn form_fields(&self) -> impl Iterator<Item = &FormFieldPrimitive> {
        self.items.iter().filter_map(|item| match item {
            SceneItem::Draw {
                primitive: Primitive::FormField(field),
                ..
            } => Some(field),
            _ => None,
        })
    }
}

/// Push-then-finish scene assembly, mirroring how a content stream is
/// interpreted front to back.
pub struct SceneBuilder {
    page_size: Size,
    items: Vec<SceneItem>,
    has_transparency: bool,
    annotation: bool,
}

impl SceneBuilder {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            items: Vec::new(),
            has_transparency: false,
            annotation: false,
        }
    }

    pub fn set_transparency(&mut self, has_transparency: bool) {
        self.has_transparency = has_transparency;
    }

    /// Draws recorded until `end_annotation` are annotation content, included
    /// only when rendering with `RenderFlags::ANNOTATIONS`.
    pub fn begin_annotation(&mut self) {
        self.annotation = true;
    }

    pub fn end_annotation(&mut self) {
        self.annotation = false;
    }

    pub fn push_clip(&mut self, ops: Vec<PathOp>, even_odd: bool) {
        self.items.push(SceneItem::PushClip { ops, even_odd });
    }

    pub fn pop_clip(&mut self) {
        self.items.push(SceneItem::PopClip);
    }

    pub fn draw_path(&mut self, path: PathPrimitive) {
        self.draw(Primitive::Path(path));
    }

    pub fn draw_glyph_run(&mut self, run: GlyphRunPrimitive) {
        self.draw(Primitive::GlyphRun(run));
    }

    pub fn draw_image(&mut self, image: ImagePrimitive) {
        self.draw(Primitive::Image(image));
    }

    pub fn form_field(&mut self, rect: Rect) {
        self.draw(Primitive::FormField(FormFieldPrimitive { rect }));
    }

    fn draw(&mut self, primitive: Primitive) {
        self.items.push(SceneItem::Draw {
            primitive,
            annotation: self.annotation,
        });
    }

    pub fn finish(self) -> Scene {
        Scene {
            page_size: self.page_size,
            items: self.items,
            has_transparency: self.has_transparency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f32) -> Rect {
        Rect::new(
            Pt::ZERO,
            Pt::ZERO,
            Pt::from_f32(side),
            Pt::from_f32(side),
        )
    }

    #[test]
    fn builder_preserves_item_order() {
        let mut builder = SceneBuilder::new(Size::letter());
        builder.push_clip(rect_path(square(10.0)), false);
        builder.draw_path(PathPrimitive::filled(rect_path(square(5.0)), Color::BLACK));
        builder.pop_clip();
        builder.form_field(square(8.0));
        let scene = builder.finish();

        assert_eq!(scene.items.len(), 4);
        assert!(matches!(scene.items[0], SceneItem::PushClip { .. }));
        assert!(matches!(
            scene.items[1],
            SceneItem::Draw {
                primitive: Primitive::Path(_),
                annotation: false,
            }
        ));
        assert!(matches!(scene.items[2], SceneItem::PopClip));
        assert_eq!(scene.primitive_count(), 2);
        assert_eq!(scene.form_fields().count(), 1);
    }

    #[test]
    fn annotation_span_tags_contained_draws_only() {
        let mut builder = SceneBuilder::new(Size::letter());
        builder.draw_path(PathPrimitive::filled(rect_path(square(5.0)), Color::BLACK));
        builder.begin_annotation();
        builder.draw_path(PathPrimitive::filled(rect_path(square(6.0)), Color::BLACK));
        builder.end_annotation();
        builder.draw_path(PathPrimitive::filled(rect_path(square(7.0)), Color::BLACK));
        let scene = builder.finish();

        let tags: Vec<bool> = scene
            .items
            .iter()
            .map(|item| match item {
                SceneItem::Draw { annotation, .. } => *annotation,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(tags, vec![false, true, false]);
    }

    #[test]
    fn rect_path_closes_the_outline() {
        let ops = rect_path(square(3.0));
        assert_eq!(ops.len(), 5);
        assert!(matches!(ops[0], PathOp::MoveTo { .. }));
        assert!(matches!(ops[4], PathOp::Close));
    }
}
