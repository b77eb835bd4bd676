use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracegraph_core::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub min_scale: f32,
    pub max_scale: f32,
    /// Margin factor applied to the fitted scale.
    pub fit_safety: f32,
    /// Extra shrink applied when a fitted graph still overflows.
    pub overflow_shrink: f32,
    pub zoom_step: f32,
    pub wheel_step: f32,
    pub resize_debounce_ms: u64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.2,
            max_scale: 3.0,
            fit_safety: 0.95,
            overflow_shrink: 0.98,
            zoom_step: 1.2,
            wheel_step: 1.1,
            resize_debounce_ms: 150,
        }
    }
}

/// Graph-to-screen transform: `screen = graph * scale + translate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub scale: f32,
    pub translate_x: f32,
    pub translate_y: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
        }
    }
}

impl Viewport {
    pub fn translate(&self) -> Vec2 {
        Vec2::new(self.translate_x, self.translate_y)
    }

    pub fn graph_to_screen(&self, graph_pos: Vec2) -> Vec2 {
        graph_pos * self.scale + self.translate()
    }

    pub fn screen_to_graph(&self, screen_pos: Vec2) -> Vec2 {
        let offset = screen_pos - self.translate();
        Vec2::new(offset.x / self.scale, offset.y / self.scale)
    }

    /// Scale by `factor` (clamped) keeping the graph point under `anchor` fixed.
    pub fn zoomed(&self, factor: f32, anchor: Vec2, min_scale: f32, max_scale: f32) -> Viewport {
        if !factor.is_finite() || factor <= 0.0 {
            return *self;
        }
        let scale = (self.scale * factor).clamp(min_scale, max_scale);
        let graph_pos = self.screen_to_graph(anchor);
        let translate = anchor - graph_pos * scale;
        Viewport {
            scale,
            translate_x: translate.x,
            translate_y: translate.y,
        }
    }
}

/// Centered fit of a `bounds` box into a `container`, or `None` when either
/// size is degenerate.
pub fn fit_viewport(bounds: Vec2, container: Vec2, config: &ViewportConfig) -> Option<Viewport> {
    if bounds.x <= 0.0 || bounds.y <= 0.0 || container.x <= 0.0 || container.y <= 0.0 {
        return None;
    }

    let mut scale = (container.x / bounds.x).min(container.y / bounds.y) * config.fit_safety;
    if bounds.x * scale > container.x || bounds.y * scale > container.y {
        scale *= config.overflow_shrink;
    }
    let scale = scale.clamp(config.min_scale, config.max_scale);

    Some(Viewport {
        scale,
        translate_x: (container.x - bounds.x * scale) / 2.0,
        translate_y: (container.y - bounds.y * scale) / 2.0,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DragState {
    last_pos: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Panning,
}

/// Owns the viewport of one graph view and applies user input to it.
///
/// Time is passed in explicitly: a resize arms a deadline and [`poll`]
/// fires the fit once it has elapsed.
///
/// [`poll`]: ViewportController::poll
#[derive(Debug, Clone)]
pub struct ViewportController {
    config: ViewportConfig,
    viewport: Viewport,
    drag: Option<DragState>,
    container: Vec2,
    bounds: Option<Vec2>,
    pending_fit: Option<Instant>,
    detached: bool,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}

impl ViewportController {
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config,
            viewport: Viewport::default(),
            drag: None,
            container: Vec2::ZERO,
            bounds: None,
            pending_fit: None,
            detached: false,
        }
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn state(&self) -> InteractionState {
        if self.drag.is_some() {
            InteractionState::Panning
        } else {
            InteractionState::Idle
        }
    }

    pub fn container(&self) -> Vec2 {
        self.container
    }

    pub fn pending_fit_deadline(&self) -> Option<Instant> {
        self.pending_fit
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Set the container size without scheduling a fit.
    pub fn set_container(&mut self, width: f32, height: f32) {
        self.container = Vec2::new(width, height);
    }

    /// Record a new bounding box and fit to it.
    pub fn set_bounds(&mut self, width: f32, height: f32) -> bool {
        if self.detached {
            return false;
        }
        self.bounds = Some(Vec2::new(width, height));
        self.reset()
    }

    /// Begin panning when the press landed on the background.
    pub fn pointer_down(&mut self, x: f32, y: f32, on_background: bool) {
        if self.detached || !on_background {
            return;
        }
        self.drag = Some(DragState {
            last_pos: Vec2::new(x, y),
        });
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if self.detached {
            return;
        }
        // Deltas apply to the current translate so a zoom mid-drag is kept.
        if let Some(drag) = self.drag.as_mut() {
            let pos = Vec2::new(x, y);
            let delta = pos - drag.last_pos;
            drag.last_pos = pos;
            self.viewport.translate_x += delta.x;
            self.viewport.translate_y += delta.y;
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    pub fn pointer_leave(&mut self) {
        self.drag = None;
    }

    pub fn zoom(&mut self, factor: f32, anchor_x: f32, anchor_y: f32) {
        if self.detached {
            return;
        }
        self.viewport = self.viewport.zoomed(
            factor,
            Vec2::new(anchor_x, anchor_y),
            self.config.min_scale,
            self.config.max_scale,
        );
    }

    /// Wheel zoom anchored at the cursor; negative delta zooms in.
    pub fn wheel(&mut self, delta_y: f32, x: f32, y: f32) {
        if delta_y == 0.0 {
            return;
        }
        let factor = if delta_y < 0.0 {
            self.config.wheel_step
        } else {
            1.0 / self.config.wheel_step
        };
        self.zoom(factor, x, y);
    }

    pub fn zoom_in(&mut self) {
        let center = self.container * 0.5;
        self.zoom(self.config.zoom_step, center.x, center.y);
    }

    pub fn zoom_out(&mut self) {
        let center = self.container * 0.5;
        self.zoom(1.0 / self.config.zoom_step, center.x, center.y);
    }

    /// Fit the given box into the given container. Returns false, leaving the
    /// viewport untouched, when either size is zero.
    pub fn fit_to_container(&mut self, bw: f32, bh: f32, cw: f32, ch: f32) -> bool {
        if self.detached {
            return false;
        }
        match fit_viewport(Vec2::new(bw, bh), Vec2::new(cw, ch), &self.config) {
            Some(viewport) => {
                tracing::debug!(
                    "fit {}x{} into {}x{} at scale {:.4}",
                    bw,
                    bh,
                    cw,
                    ch,
                    viewport.scale
                );
                self.viewport = viewport;
                true
            }
            None => {
                tracing::debug!("skipping fit into {}x{} container", cw, ch);
                false
            }
        }
    }

    /// Fit using the last bounding box and container size.
    pub fn reset(&mut self) -> bool {
        let Some(bounds) = self.bounds else {
            return false;
        };
        let container = self.container;
        self.fit_to_container(bounds.x, bounds.y, container.x, container.y)
    }

    /// Record a new container size and (re)arm the debounced fit.
    pub fn on_resize(&mut self, width: f32, height: f32, now: Instant) {
        if self.detached {
            return;
        }
        self.container = Vec2::new(width, height);
        self.pending_fit = Some(now + Duration::from_millis(self.config.resize_debounce_ms));
    }

    /// Fire the debounced fit if its deadline has passed. Returns true when
    /// the viewport was refitted.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.pending_fit {
            Some(deadline) if now >= deadline => {
                self.pending_fit = None;
                self.reset()
            }
            _ => false,
        }
    }

    /// Stop reacting to input and drop any pending fit.
    pub fn detach(&mut self) {
        self.pending_fit = None;
        self.drag = None;
        self.detached = true;
    }
}
