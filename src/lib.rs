mod compositor;
mod error;
mod flags;
mod scene;
mod scheme;
mod session;
mod surface;
mod trace;
mod types;

pub use error::PlatenError;
pub use flags::{RenderFlags, RenderStatus, SessionState};
pub use scene::{
    rect_path, BlendMode, FormFieldPrimitive, Glyph, GlyphRunPrimitive, ImagePrimitive,
    ImageSource, PathOp, PathPrimitive, Primitive, Scene, SceneBuilder, SceneItem, StrokeStyle,
};
pub use scheme::ColorScheme;
pub use session::{FormsOverlay, Pause, PauseAfterEach, PauseWhen, RenderSession};
pub use surface::Surface;
pub use types::{Color, Pt, Rect, Size};

/// Options shared by every drive of one render session: option bits, the
/// optional forced color scheme, and the optional background.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub flags: RenderFlags,
    pub color_scheme: Option<ColorScheme>,
    pub background: Option<Color>,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(mut self, flags: RenderFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn color_scheme(mut self, scheme: ColorScheme) -> Self {
        self.color_scheme = Some(scheme);
        self
    }

    pub fn background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }
}

/// One-shot render: allocates a surface for the page (alpha channel when
/// the scene signals transparency), runs start-to-complete without pausing,
/// and closes without a forms overlay.
pub fn render_scene(scene: &Scene, options: &RenderOptions) -> Result<Surface, PlatenError> {
    let surface = Surface::for_page(scene.page_size, scene.has_transparency)?;
    let mut session = RenderSession::start(surface, scene, options, None)?;
    session.close(None)
}

/// One-shot render that composites the forms overlay before returning.
pub fn render_scene_with_forms(
    scene: &Scene,
    options: &RenderOptions,
    forms: &mut dyn FormsOverlay,
) -> Result<Surface, PlatenError> {
    let surface = Surface::for_page(scene.page_size, scene.has_transparency)?;
    let mut session = RenderSession::start(surface, scene, options, None)?;
    session.close(Some(forms))
}
