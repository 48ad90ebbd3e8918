use sha2::{Digest, Sha256};
use tiny_skia::Pixmap;

use crate::error::PlatenError;
use crate::types::{Color, Size};

/// Owned RGBA8 pixel buffer a session renders into. Exclusively owned: the
/// caller holds it before `RenderSession::start` and after `close`, the
/// session in between.
#[derive(Debug)]
pub struct Surface {
    pixmap: Pixmap,
    has_alpha: bool,
}

impl Surface {
    pub fn new(width: u32, height: u32, has_alpha: bool) -> Result<Surface, PlatenError> {
        if width == 0 || height == 0 {
            return Err(PlatenError::InvalidConfiguration(format!(
                "surface dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        let pixmap = Pixmap::new(width, height).ok_or_else(|| {
            PlatenError::Allocation(format!("pixel buffer {}x{} not allocatable", width, height))
        })?;
        Ok(Surface { pixmap, has_alpha })
    }

    /// Surface sized 1:1 to a page (one pixel per point, half-away-from-zero
    /// rounding), with the alpha channel the scene asks for.
    pub fn for_page(page_size: Size, has_alpha: bool) -> Result<Surface, PlatenError> {
        let width = page_px(page_size.width.to_milli_i64())?;
        let height = page_px(page_size.height.to_milli_i64())?;
        Surface::new(width, height, has_alpha)
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// Clears the whole buffer. Surfaces without an alpha channel stay
    /// opaque: the color's alpha is forced to 1.
    pub fn fill(&mut self, color: Color) {
        let color = if self.has_alpha { color } else { color.opaque() };
        let sk = tiny_skia::Color::from_rgba(
            color.r.clamp(0.0, 1.0),
            color.g.clamp(0.0, 1.0),
            color.b.clamp(0.0, 1.0),
            color.a.clamp(0.0, 1.0),
        )
        .unwrap_or_else(|| tiny_skia::Color::from_rgba8(0, 0, 0, 255));
        self.pixmap.fill(sk);
    }

    /// Lowercase-hex SHA-256 of the premultiplied RGBA bytes. Stable across
    /// runs of this crate; not comparable across rasterizer backends.
    pub fn content_digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.pixmap.data());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            use std::fmt::Write;
            let _ = write!(&mut out, "{:02x}", byte);
        }
        out
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, PlatenError> {
        self.pixmap
            .encode_png()
            .map_err(|e| PlatenError::Encode(format!("png encode failed: {e}")))
    }

    /// Raw premultiplied RGBA bytes, row-major.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    /// Demultiplied RGBA of one pixel; `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let px = self.pixmap.pixel(x, y)?.demultiply();
        Some([px.red(), px.green(), px.blue(), px.alpha()])
    }

    pub(crate) fn pixmap_mut(&mut self) -> &mut tiny_skia::Pixmap {
        &mut self.pixmap
    }
}

fn page_px(pt_milli: i64) -> Result<u32, PlatenError> {
    let px = (pt_milli + 500) / 1000;
    if px <= 0 {
        return Err(PlatenError::InvalidConfiguration(format!(
            "invalid non-positive pixel dimension for pt_milli={pt_milli}"
        )));
    }
    u32::try_from(px).map_err(|_| {
        PlatenError::InvalidConfiguration(format!(
            "pixel dimension out of range for pt_milli={pt_milli}"
        ))
    })
}
