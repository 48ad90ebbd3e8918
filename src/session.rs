use tiny_skia::{Mask, Transform};

use crate::compositor;
use crate::error::PlatenError;
use crate::flags::{RenderFlags, RenderStatus, SessionState};
use crate::scene::{Scene, SceneItem};
use crate::scheme::ColorScheme;
use crate::surface::Surface;
use crate::trace::RenderTrace;
use crate::types::Color;
use crate::RenderOptions;

/// Cooperative pause predicate, consulted after each fully painted
/// primitive. Returning `true` suspends the session.
pub trait Pause {
    fn need_to_pause_now(&mut self) -> bool;
}

/// Adapts a closure into a pause predicate.
pub struct PauseWhen<F: FnMut() -> bool>(pub F);

impl<F: FnMut() -> bool> Pause for PauseWhen<F> {
    fn need_to_pause_now(&mut self) -> bool {
        (self.0)()
    }
}

/// Pauses after every primitive; the finest-grained schedule a caller can
/// ask for.
pub struct PauseAfterEach;

impl Pause for PauseAfterEach {
    fn need_to_pause_now(&mut self) -> bool {
        true
    }
}

/// Boundary to the interactive-forms widget model. Called exactly once per
/// session, from `close`, after all page content is painted.
pub trait FormsOverlay {
    fn draw_forms(&mut self, surface: &mut Surface, scene: &Scene, flags: RenderFlags);
}

/// Resumable render over one scene. Holds the surface exclusively from
/// `start` until `close` returns it. Continuation state is plain data
/// (cursor + clip stack), so a suspended session can be inspected freely.
pub struct RenderSession<'s> {
    surface: Option<Surface>,
    scene: &'s Scene,
    cursor: usize,
    clip_stack: Vec<Option<Mask>>,
    flags: RenderFlags,
    scheme: Option<ColorScheme>,
    state: SessionState,
    base_transform: Transform,
    device_width: u32,
    device_height: u32,
    trace: Option<RenderTrace>,
}

impl<'s> RenderSession<'s> {
    /// Takes ownership of the surface, fills the background, and walks the
    /// scene from the first item. Configuration problems (non-positive page
    /// box) fail synchronously before any pixel is touched.
    pub fn start(
        surface: Surface,
        scene: &'s Scene,
        options: &RenderOptions,
        pause: Option<&mut dyn Pause>,
    ) -> Result<RenderSession<'s>, PlatenError> {
        let page_width = scene.page_size.width.to_f32();
        let page_height = scene.page_size.height.to_f32();
        if page_width <= 0.0 || page_height <= 0.0 {
            return Err(PlatenError::InvalidConfiguration(format!(
                "page box must be positive, got {}x{}",
                page_width, page_height
            )));
        }

        let device_width = surface.width();
        let device_height = surface.height();
        // Page space is y-up; the device is y-down with the page box scaled
        // onto the full surface.
        let base_transform = Transform::from_row(
            device_width as f32 / page_width,
            0.0,
            0.0,
            -(device_height as f32) / page_height,
            0.0,
            device_height as f32,
        );

        let mut session = RenderSession {
            surface: Some(surface),
            scene,
            cursor: 0,
            clip_stack: vec![None],
            flags: options.flags,
            scheme: options.color_scheme,
            state: SessionState::NotStarted,
            base_transform,
            device_width,
            device_height,
            trace: RenderTrace::from_env(),
        };
        session.fill_background(options.background);
        if let Some(trace) = &session.trace {
            trace.log_event("trace.start", 0);
        }
        session.advance(pause);
        Ok(session)
    }

    /// Resumes at the exact next unpainted item with the saved clip stack.
    /// Valid only while `Suspended`; any other state is rejected without
    /// changing the session.
    pub fn resume(
        &mut self,
        pause: Option<&mut dyn Pause>,
    ) -> Result<RenderStatus, PlatenError> {
        if self.state != SessionState::Suspended {
            return Err(PlatenError::SessionState {
                operation: "resume",
                state: self.state,
            });
        }
        Ok(self.advance(pause))
    }

    /// Draws the forms overlay (if any) over the finished content and
    /// returns the surface. Valid only once the walk is `Complete`; any
    /// other state is rejected without changing the session.
    pub fn close(
        &mut self,
        forms: Option<&mut dyn FormsOverlay>,
    ) -> Result<Surface, PlatenError> {
        if self.state != SessionState::Complete {
            return Err(PlatenError::SessionState {
                operation: "close",
                state: self.state,
            });
        }
        let Some(mut surface) = self.surface.take() else {
            return Err(PlatenError::SessionState {
                operation: "close",
                state: SessionState::Closed,
            });
        };
        if let Some(overlay) = forms {
            overlay.draw_forms(&mut surface, self.scene, self.flags);
        }
        self.state = SessionState::Closed;
        if let Some(trace) = &self.trace {
            trace.log_event("trace.close", self.cursor);
            trace.emit_summary("render-session");
        }
        Ok(surface)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Index of the next unprocessed scene item.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn flags(&self) -> RenderFlags {
        self.flags
    }

    /// Read access to the partially painted surface while the session owns
    /// it; `None` once closed. Lets callers present progressive results.
    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    fn fill_background(&mut self, background: Option<Color>) {
        let transparent_page = self.scene.has_transparency;
        if let Some(surface) = self.surface.as_mut() {
            let color = match background {
                Some(color) => color,
                None if surface.has_alpha() && transparent_page => Color::TRANSPARENT,
                None => Color::WHITE,
            };
            surface.fill(color);
        }
    }

    /// One forward pass from the cursor. A primitive is atomic: the pause
    /// predicate runs only after it is fully painted, so pausing changes
    /// when control returns, never what gets painted or in what order.
    fn advance(&mut self, mut pause: Option<&mut dyn Pause>) -> RenderStatus {
        let scene = self.scene;
        while self.cursor < scene.items.len() {
            match &scene.items[self.cursor] {
                SceneItem::PushClip { ops, even_odd } => {
                    let next = compositor::intersect_clip(
                        self.clip_stack.last().and_then(|m| m.as_ref()),
                        ops,
                        *even_odd,
                        self.base_transform,
                        self.device_width,
                        self.device_height,
                    );
                    self.clip_stack.push(next);
                    self.cursor += 1;
                    if let Some(trace) = &self.trace {
                        trace.increment("clip_pushes", 1);
                    }
                }
                SceneItem::PopClip => {
                    // An unbalanced pop is content damage; keep the base clip.
                    if self.clip_stack.len() > 1 {
                        self.clip_stack.pop();
                    }
                    self.cursor += 1;
                }
                SceneItem::Draw {
                    primitive,
                    annotation,
                } => {
                    if *annotation && !self.flags.contains(RenderFlags::ANNOTATIONS) {
                        self.cursor += 1;
                        if let Some(trace) = &self.trace {
                            trace.increment("primitives_skipped", 1);
                        }
                        continue;
                    }
                    let Some(surface) = self.surface.as_mut() else {
                        // Closed sessions never re-enter the walk.
                        break;
                    };
                    compositor::draw_primitive(
                        surface.pixmap_mut(),
                        self.clip_stack.last().and_then(|m| m.as_ref()),
                        self.base_transform,
                        primitive,
                        self.scheme.as_ref(),
                        self.flags,
                    );
                    self.cursor += 1;
                    if let Some(trace) = &self.trace {
                        trace.increment("primitives_painted", 1);
                    }
                    if self.cursor < scene.items.len() {
                        let pause_now = pause
                            .as_deref_mut()
                            .map_or(false, |p| p.need_to_pause_now());
                        if pause_now {
                            self.state = SessionState::Suspended;
                            if let Some(trace) = &self.trace {
                                trace.increment("pauses", 1);
                                trace.log_event("trace.suspend", self.cursor);
                            }
                            return RenderStatus::Suspended;
                        }
                    }
                }
            }
        }
        self.state = SessionState::Complete;
        RenderStatus::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{rect_path, BlendMode, PathPrimitive, SceneBuilder};
    use crate::types::{Pt, Rect, Size};

    fn pt_rect(x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect::new(
            Pt::from_f32(x),
            Pt::from_f32(y),
            Pt::from_f32(w),
            Pt::from_f32(h),
        )
    }

    fn small_page() -> Size {
        Size::new(Pt::from_f32(20.0), Pt::from_f32(20.0))
    }

    fn three_rect_scene() -> Scene {
        let mut builder = SceneBuilder::new(small_page());
        builder.draw_path(PathPrimitive::filled(
            rect_path(pt_rect(0.0, 0.0, 5.0, 5.0)),
            Color::BLACK,
        ));
        builder.draw_path(PathPrimitive::filled(
            rect_path(pt_rect(5.0, 5.0, 5.0, 5.0)),
            Color::rgb(1.0, 0.0, 0.0),
        ));
        builder.draw_path(PathPrimitive::filled(
            rect_path(pt_rect(10.0, 10.0, 5.0, 5.0)),
            Color::rgb(0.0, 0.0, 1.0),
        ));
        builder.finish()
    }

    fn surface_for(scene: &Scene) -> Surface {
        Surface::for_page(scene.page_size, scene.has_transparency).unwrap()
    }

    #[test]
    fn unpaused_start_runs_to_completion() {
        let scene = three_rect_scene();
        let session = RenderSession::start(
            surface_for(&scene),
            &scene,
            &RenderOptions::new(),
            None,
        )
        .unwrap();
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(session.cursor(), scene.items.len());
    }

    #[test]
    fn pause_after_each_paints_one_primitive_per_drive() {
        let scene = three_rect_scene();
        let mut pause = PauseAfterEach;
        let mut session = RenderSession::start(
            surface_for(&scene),
            &scene,
            &RenderOptions::new(),
            Some(&mut pause),
        )
        .unwrap();
        assert_eq!(session.state(), SessionState::Suspended);
        assert_eq!(session.cursor(), 1);

        let mut resumes = 0;
        while session.state() == SessionState::Suspended {
            let before = session.cursor();
            session.resume(Some(&mut pause)).unwrap();
            resumes += 1;
            assert_eq!(session.cursor(), before + 1);
        }
        assert_eq!(resumes, 2);
        assert_eq!(session.state(), SessionState::Complete);
    }

    #[test]
    fn resume_in_wrong_state_is_rejected_without_side_effects() {
        let scene = three_rect_scene();
        let mut session = RenderSession::start(
            surface_for(&scene),
            &scene,
            &RenderOptions::new(),
            None,
        )
        .unwrap();
        assert_eq!(session.state(), SessionState::Complete);

        let err = session.resume(None).unwrap_err();
        assert!(matches!(
            err,
            PlatenError::SessionState {
                operation: "resume",
                state: SessionState::Complete,
            }
        ));
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(session.cursor(), scene.items.len());
    }

    #[test]
    fn close_while_suspended_is_rejected_and_session_stays_usable() {
        let scene = three_rect_scene();
        let mut pause = PauseAfterEach;
        let mut session = RenderSession::start(
            surface_for(&scene),
            &scene,
            &RenderOptions::new(),
            Some(&mut pause),
        )
        .unwrap();
        assert_eq!(session.state(), SessionState::Suspended);

        let err = session.close(None).unwrap_err();
        assert!(matches!(
            err,
            PlatenError::SessionState {
                operation: "close",
                state: SessionState::Suspended,
            }
        ));
        assert_eq!(session.state(), SessionState::Suspended);

        while session.state() == SessionState::Suspended {
            session.resume(None).unwrap();
        }
        let surface = session.close(None).unwrap();
        assert_eq!(surface.width(), 20);
        assert_eq!(session.state(), SessionState::Closed);

        let err = session.close(None).unwrap_err();
        assert!(matches!(
            err,
            PlatenError::SessionState {
                operation: "close",
                state: SessionState::Closed,
            }
        ));
    }

    #[test]
    fn clip_stack_survives_suspension() {
        let mut builder = SceneBuilder::new(small_page());
        builder.push_clip(rect_path(pt_rect(0.0, 10.0, 20.0, 10.0)), false);
        builder.draw_path(PathPrimitive::filled(
            rect_path(pt_rect(0.0, 12.0, 2.0, 2.0)),
            Color::BLACK,
        ));
        builder.draw_path(PathPrimitive::filled(
            rect_path(pt_rect(0.0, 0.0, 20.0, 20.0)),
            Color::rgb(1.0, 0.0, 0.0),
        ));
        builder.pop_clip();
        let scene = builder.finish();

        // Pause lands inside the clip span, between the two draws, so the
        // second one must be painted from the saved clip stack.
        let mut pause = PauseAfterEach;
        let mut session = RenderSession::start(
            surface_for(&scene),
            &scene,
            &RenderOptions::new(),
            Some(&mut pause),
        )
        .unwrap();
        while session.state() == SessionState::Suspended {
            session.resume(Some(&mut pause)).unwrap();
        }
        let surface = session.close(None).unwrap();

        // Clip kept page-space y=10..20, the device-space top half.
        assert_eq!(surface.pixel(15, 5), Some([255, 0, 0, 255]));
        assert_eq!(surface.pixel(15, 15), Some([255, 255, 255, 255]));
    }

    #[test]
    fn annotations_excluded_unless_flagged_and_skips_are_not_pause_points() {
        let mut builder = SceneBuilder::new(small_page());
        builder.begin_annotation();
        builder.draw_path(PathPrimitive::filled(
            rect_path(pt_rect(0.0, 0.0, 20.0, 20.0)),
            Color::BLACK,
        ));
        builder.draw_path(
            PathPrimitive::filled(rect_path(pt_rect(0.0, 0.0, 20.0, 20.0)), Color::BLACK)
                .with_blend(BlendMode::Multiply),
        );
        builder.end_annotation();
        builder.draw_path(PathPrimitive::filled(
            rect_path(pt_rect(2.0, 2.0, 4.0, 4.0)),
            Color::rgb(1.0, 0.0, 0.0),
        ));
        let scene = builder.finish();

        // Two skipped annotations then one painted primitive: an always-on
        // pause predicate must still complete within start.
        let mut pause = PauseAfterEach;
        let mut session = RenderSession::start(
            surface_for(&scene),
            &scene,
            &RenderOptions::new(),
            Some(&mut pause),
        )
        .unwrap();
        assert_eq!(session.state(), SessionState::Complete);
        let surface = session.close(None).unwrap();
        assert_eq!(surface.pixel(10, 10), Some([255, 255, 255, 255]));

        let options = RenderOptions::new().flags(RenderFlags::ANNOTATIONS);
        let mut session =
            RenderSession::start(surface_for(&scene), &scene, &options, None).unwrap();
        let surface = session.close(None).unwrap();
        assert_eq!(surface.pixel(10, 10), Some([0, 0, 0, 255]));
    }

    #[test]
    fn closure_predicates_can_pause_selectively() {
        let scene = three_rect_scene();
        let mut painted = 0;
        let mut pause = PauseWhen(|| {
            painted += 1;
            painted == 2
        });
        let mut session = RenderSession::start(
            surface_for(&scene),
            &scene,
            &RenderOptions::new(),
            Some(&mut pause),
        )
        .unwrap();
        // The predicate fires on the second primitive only.
        assert_eq!(session.state(), SessionState::Suspended);
        assert_eq!(session.cursor(), 2);
        session.resume(Some(&mut pause)).unwrap();
        assert_eq!(session.state(), SessionState::Complete);
    }

    #[test]
    fn suspended_surface_is_inspectable_and_shows_progress() {
        let scene = three_rect_scene();
        let mut pause = PauseAfterEach;
        let session = RenderSession::start(
            surface_for(&scene),
            &scene,
            &RenderOptions::new(),
            Some(&mut pause),
        )
        .unwrap();
        let partial = session.surface().unwrap();
        // First rect (page-space bottom-left) is painted, third is not yet.
        assert_eq!(partial.pixel(2, 17), Some([0, 0, 0, 255]));
        assert_eq!(partial.pixel(12, 7), Some([255, 255, 255, 255]));
    }

    struct StampOverlay {
        calls: usize,
        saw_flags: RenderFlags,
        saw_fields: usize,
    }

    impl FormsOverlay for StampOverlay {
        fn draw_forms(&mut self, surface: &mut Surface, scene: &Scene, flags: RenderFlags) {
            self.calls += 1;
            self.saw_flags = flags;
            self.saw_fields = scene.form_fields().count();
            surface.fill(Color::rgb(0.0, 1.0, 0.0));
        }
    }

    #[test]
    fn forms_overlay_runs_once_at_close_with_session_flags() {
        let mut builder = SceneBuilder::new(small_page());
        builder.draw_path(PathPrimitive::filled(
            rect_path(pt_rect(0.0, 0.0, 20.0, 20.0)),
            Color::BLACK,
        ));
        builder.form_field(pt_rect(2.0, 2.0, 6.0, 4.0));
        let scene = builder.finish();

        let options = RenderOptions::new().flags(RenderFlags::ANNOTATIONS);
        let mut session =
            RenderSession::start(surface_for(&scene), &scene, &options, None).unwrap();
        let mut overlay = StampOverlay {
            calls: 0,
            saw_flags: RenderFlags::empty(),
            saw_fields: 0,
        };
        let surface = session.close(Some(&mut overlay)).unwrap();

        assert_eq!(overlay.calls, 1);
        assert_eq!(overlay.saw_flags, RenderFlags::ANNOTATIONS);
        assert_eq!(overlay.saw_fields, 1);
        assert_eq!(surface.pixel(10, 10), Some([0, 255, 0, 255]));
    }

    #[test]
    fn explicit_background_wins_over_transparency_rule() {
        let mut builder = SceneBuilder::new(small_page());
        builder.set_transparency(true);
        let scene = builder.finish();

        let surface = Surface::for_page(scene.page_size, true).unwrap();
        let mut session = RenderSession::start(
            surface,
            &scene,
            &RenderOptions::new(),
            None,
        )
        .unwrap();
        let cleared = session.close(None).unwrap();
        assert_eq!(cleared.pixel(0, 0), Some([0, 0, 0, 0]));

        let surface = Surface::for_page(scene.page_size, true).unwrap();
        let options = RenderOptions::new().background(Color::rgb(1.0, 0.0, 0.0));
        let mut session = RenderSession::start(surface, &scene, &options, None).unwrap();
        let painted = session.close(None).unwrap();
        assert_eq!(painted.pixel(0, 0), Some([255, 0, 0, 255]));
    }
}
