//! Pointer, touch and keyboard input for the particle field.
//!
//! The [`InteractionController`] turns raw window events into a bounded
//! [`InteractionState`]. Input arrives between frames and only mutates the
//! controller; the engine calls [`InteractionController::update`] once per
//! tick and hands the resulting snapshot to the particle system, so a tick
//! never sees a half-applied event.
//!
//! ```ignore
//! let mut input = InteractionController::new(config.interaction);
//! input.set_viewport(800.0, 600.0);
//!
//! // from the event loop
//! input.handle_window_event(&event);
//!
//! // once per tick
//! let state = input.update();
//! system.update(dt, time, &noise, state);
//! ```

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, TouchPhase, WindowEvent};
use winit::keyboard::PhysicalKey;

use crate::config::InteractionConfig;

pub use winit::keyboard::KeyCode;

/// Smallest interaction radius in pixels.
pub const MIN_RADIUS: f32 = 50.0;
/// Largest interaction radius in pixels.
pub const MAX_RADIUS: f32 = 300.0;

/// Position samples kept for velocity estimation.
pub const HISTORY_LEN: usize = 10;
/// Oldest position sample kept.
pub const HISTORY_SPAN: Duration = Duration::from_secs(1);

/// Strength contributed by each held key.
pub const KEY_STRENGTH: f32 = 0.1;
/// Radius change per scroll line.
pub const SCROLL_RADIUS_STEP: f32 = 10.0;

/// One active touch contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub id: u64,
    /// Position in window pixels.
    pub position: Vec2,
    /// Position in NDC, `(-1, -1)` bottom-left to `(1, 1)` top-right.
    pub normalized: Vec2,
    /// Pressure in `[0, 1]`. Devices without pressure report `1.0`.
    pub force: f32,
}

/// Read-only interaction snapshot consumed by the particle system.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionState {
    pub mouse_position: Vec2,
    /// Mouse position in NDC, Y up.
    pub normalized_mouse_position: Vec2,
    pub is_mouse_down: bool,
    /// False until the cursor first moves over the window, and after it leaves.
    pub has_pointer: bool,
    pub touch_points: Vec<TouchPoint>,
    pub interaction_strength: f32,
    pub interaction_radius: f32,
    /// Pointer velocity in pixels per second.
    pub velocity: Vec2,
    pub pressed_keys: usize,
}

impl InteractionState {
    /// Every position that exerts force this tick: the cursor, then touches.
    pub fn pointers(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.has_pointer
            .then_some(self.mouse_position)
            .into_iter()
            .chain(self.touch_points.iter().map(|t| t.position))
    }

    pub fn is_idle(&self) -> bool {
        !self.has_pointer && self.touch_points.is_empty()
    }
}

impl Default for InteractionState {
    fn default() -> Self {
        Self {
            mouse_position: Vec2::ZERO,
            normalized_mouse_position: Vec2::ZERO,
            is_mouse_down: false,
            has_pointer: false,
            touch_points: Vec::new(),
            interaction_strength: 0.0,
            interaction_radius: InteractionConfig::default().interaction_radius,
            velocity: Vec2::ZERO,
            pressed_keys: 0,
        }
    }
}

/// Normalizes input into an [`InteractionState`].
#[derive(Debug)]
pub struct InteractionController {
    config: InteractionConfig,
    state: InteractionState,
    viewport: Vec2,
    keys_held: HashSet<KeyCode>,
    history: VecDeque<(Instant, Vec2)>,
}

impl InteractionController {
    pub fn new(config: InteractionConfig) -> Self {
        let state = InteractionState {
            interaction_radius: config.interaction_radius.clamp(MIN_RADIUS, MAX_RADIUS),
            ..Default::default()
        };
        Self {
            config,
            state,
            viewport: Vec2::new(800.0, 600.0),
            keys_held: HashSet::new(),
            history: VecDeque::with_capacity(HISTORY_LEN + 1),
        }
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    /// Replace the settings. The radius resets only when the configured
    /// radius itself changed, so a scrolled radius survives unrelated
    /// updates. Disabling clears all transient state.
    pub fn set_config(&mut self, config: InteractionConfig) {
        let was_enabled = self.config.enabled;
        let radius_changed = self.config.interaction_radius != config.interaction_radius;
        self.config = config;
        if radius_changed {
            self.state.interaction_radius = config.interaction_radius.clamp(MIN_RADIUS, MAX_RADIUS);
        }
        if !config.keyboard_enabled {
            self.keys_held.clear();
            self.state.pressed_keys = 0;
        }
        let max = config.max_touches as usize;
        self.state.touch_points.truncate(max);
        if was_enabled && !config.enabled {
            self.clear();
            log::debug!("Interaction disabled");
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.set_config(InteractionConfig {
            enabled,
            ..self.config
        });
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Viewport size used for NDC conversion.
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = Vec2::new(width.max(1.0), height.max(1.0));
    }

    /// Current snapshot without advancing.
    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    // ========== Pointer ==========

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.pointer_move_at(x, y, Instant::now());
    }

    pub fn pointer_move_at(&mut self, x: f32, y: f32, now: Instant) {
        if !self.config.enabled {
            return;
        }
        let position = Vec2::new(x, y);
        self.state.mouse_position = position;
        self.state.normalized_mouse_position = self.to_ndc(position);
        self.state.has_pointer = true;
        self.record_sample(position, now);
    }

    pub fn pointer_down(&mut self) {
        if self.config.enabled {
            self.state.is_mouse_down = true;
        }
    }

    pub fn pointer_up(&mut self) {
        self.state.is_mouse_down = false;
    }

    /// The cursor left the window.
    pub fn pointer_leave(&mut self) {
        self.state.has_pointer = false;
        self.state.is_mouse_down = false;
        self.history.clear();
        self.state.velocity = Vec2::ZERO;
    }

    // ========== Touch ==========

    /// Start or move a touch. Contacts beyond `max_touches` are ignored.
    pub fn touch_move(&mut self, id: u64, x: f32, y: f32, force: f32) {
        self.touch_move_at(id, x, y, force, Instant::now());
    }

    pub fn touch_move_at(&mut self, id: u64, x: f32, y: f32, force: f32, now: Instant) {
        if !self.config.enabled {
            return;
        }
        let position = Vec2::new(x, y);
        let point = TouchPoint {
            id,
            position,
            normalized: self.to_ndc(position),
            force: if force.is_finite() { force.clamp(0.0, 1.0) } else { 1.0 },
        };

        let touches = &mut self.state.touch_points;
        let primary = touches.first().map_or(true, |t| t.id == id);
        if let Some(existing) = touches.iter_mut().find(|t| t.id == id) {
            *existing = point;
        } else if touches.len() < self.config.max_touches as usize {
            touches.push(point);
        } else {
            return;
        }

        if primary {
            self.record_sample(position, now);
        }
    }

    pub fn touch_end(&mut self, id: u64) {
        self.state.touch_points.retain(|t| t.id != id);
        if self.state.touch_points.is_empty() && !self.state.has_pointer {
            self.history.clear();
        }
    }

    // ========== Keyboard ==========

    pub fn key_down(&mut self, key: KeyCode) {
        if self.config.enabled && self.config.keyboard_enabled {
            self.keys_held.insert(key);
            self.state.pressed_keys = self.keys_held.len();
        }
    }

    pub fn key_up(&mut self, key: KeyCode) {
        self.keys_held.remove(&key);
        self.state.pressed_keys = self.keys_held.len();
    }

    pub fn key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    // ========== Radius ==========

    /// Set the radius, clamped to `[MIN_RADIUS, MAX_RADIUS]`.
    pub fn set_radius(&mut self, radius: f32) {
        if radius.is_finite() {
            self.state.interaction_radius = radius.clamp(MIN_RADIUS, MAX_RADIUS);
        }
    }

    pub fn adjust_radius(&mut self, delta: f32) {
        self.set_radius(self.state.interaction_radius + delta);
    }

    // ========== Tick ==========

    /// Recompute the interaction strength and return the tick's snapshot.
    ///
    /// `strength = max(target, previous × damping_factor)` where the target
    /// sums the held button, touch pressure and held keys.
    pub fn update(&mut self) -> &InteractionState {
        self.update_at(Instant::now())
    }

    pub fn update_at(&mut self, now: Instant) -> &InteractionState {
        if !self.config.enabled {
            self.state.interaction_strength = 0.0;
            return &self.state;
        }

        self.prune_history(now);

        let mouse = if self.state.is_mouse_down {
            self.config.mouse_influence
        } else {
            0.0
        };
        let touch: f32 = self.state.touch_points.iter().map(|t| t.force).sum();
        let keys = self.state.pressed_keys as f32 * KEY_STRENGTH;
        let target = mouse + touch * self.config.touch_influence + keys;

        let decayed = self.state.interaction_strength * self.config.damping_factor;
        let strength = target.max(decayed);
        self.state.interaction_strength = if strength < 1e-4 { 0.0 } else { strength };
        &self.state
    }

    /// Process a winit window event. Returns `true` if it was consumed.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.pointer_move(position.x as f32, position.y as f32);
                true
            }
            WindowEvent::CursorLeft { .. } => {
                self.pointer_leave();
                true
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                match state {
                    ElementState::Pressed => self.pointer_down(),
                    ElementState::Released => self.pointer_up(),
                }
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if !self.config.enabled {
                    return false;
                }
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                };
                self.adjust_radius(lines * SCROLL_RADIUS_STEP);
                true
            }
            WindowEvent::Touch(touch) => {
                let id = touch.id;
                match touch.phase {
                    TouchPhase::Started | TouchPhase::Moved => {
                        let force = touch.force.map_or(1.0, |f| f.normalized() as f32);
                        self.touch_move(
                            id,
                            touch.location.x as f32,
                            touch.location.y as f32,
                            force,
                        );
                    }
                    TouchPhase::Ended | TouchPhase::Cancelled => self.touch_end(id),
                }
                true
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => self.key_down(code),
                        ElementState::Released => self.key_up(code),
                    }
                    return true;
                }
                false
            }
            WindowEvent::Focused(false) => {
                self.keys_held.clear();
                self.state.pressed_keys = 0;
                self.state.is_mouse_down = false;
                true
            }
            _ => false,
        }
    }

    fn to_ndc(&self, position: Vec2) -> Vec2 {
        Vec2::new(
            (position.x / self.viewport.x) * 2.0 - 1.0,
            1.0 - (position.y / self.viewport.y) * 2.0,
        )
    }

    fn record_sample(&mut self, position: Vec2, now: Instant) {
        self.history.push_back((now, position));
        self.prune_history(now);

        let mut recent = self.history.iter().rev();
        self.state.velocity = match (recent.next(), recent.next()) {
            (Some(&(t1, p1)), Some(&(t0, p0))) => {
                let dt = t1.saturating_duration_since(t0).as_secs_f32();
                if dt > 0.0 {
                    (p1 - p0) / dt
                } else {
                    self.state.velocity
                }
            }
            _ => Vec2::ZERO,
        };
    }

    fn prune_history(&mut self, now: Instant) {
        while self.history.len() > HISTORY_LEN {
            self.history.pop_front();
        }
        while let Some(&(t, _)) = self.history.front() {
            if now.saturating_duration_since(t) > HISTORY_SPAN {
                self.history.pop_front();
            } else {
                break;
            }
        }
        if self.history.is_empty() {
            self.state.velocity = Vec2::ZERO;
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Drop all transient input (touches, buttons, keys, strength, velocity
    /// and history) while keeping the settings.
    pub fn clear(&mut self) {
        self.state.touch_points.clear();
        self.state.is_mouse_down = false;
        self.state.has_pointer = false;
        self.state.interaction_strength = 0.0;
        self.state.velocity = Vec2::ZERO;
        self.state.pressed_keys = 0;
        self.keys_held.clear();
        self.history.clear();
    }
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new(InteractionConfig::default())
    }
}
