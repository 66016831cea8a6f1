//! Windowed runner.
//!
//! Opens a winit window, mounts a [`ParticleFieldEngine`] on it and drives
//! one tick per redraw. Window events go to the engine first; a few keys
//! are handled here:
//!
//! | Key | Action |
//! |-----|--------|
//! | Space | Pause / resume |
//! | R | Respawn all particles |
//! | P | Cycle built-in presets |
//! | Escape | Quit |

use std::path::PathBuf;
use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::config::{ConfigManager, FileStore};
use crate::engine::{ParticleFieldEngine, DEFAULT_SEED};
use crate::error::EngineError;

/// How [`run`] sets up the window and configuration.
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Preset applied at start-up.
    pub preset: Option<String>,
    /// Directory for persisted configuration. In-memory when `None`.
    pub config_dir: Option<PathBuf>,
    pub seed: u64,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            title: "Particle Field".to_string(),
            width: 1280,
            height: 720,
            preset: None,
            config_dir: None,
            seed: DEFAULT_SEED,
        }
    }
}

/// Open a window and run the engine until it is closed.
pub fn run(options: AppOptions) -> Result<(), EngineError> {
    let mut config = match &options.config_dir {
        Some(dir) => ConfigManager::new(Box::new(FileStore::new(dir)?)),
        None => ConfigManager::in_memory(),
    };
    if let Some(id) = &options.preset {
        config.apply_preset(id)?;
    }

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        options,
        config: Some(config),
        window: None,
        engine: None,
        preset_cursor: 0,
        error: None,
    };
    event_loop.run_app(&mut app)?;

    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct App {
    options: AppOptions,
    config: Option<ConfigManager>,
    window: Option<Arc<Window>>,
    engine: Option<ParticleFieldEngine>,
    preset_cursor: usize,
    error: Option<EngineError>,
}

impl App {
    fn handle_key(&mut self, code: KeyCode, event_loop: &ActiveEventLoop) {
        let Some(engine) = &mut self.engine else { return };
        match code {
            KeyCode::Escape => event_loop.exit(),
            KeyCode::Space => {
                let paused = !engine.is_paused();
                engine.set_paused(paused);
                log::info!("{}", if paused { "Paused" } else { "Resumed" });
            }
            KeyCode::KeyR => engine.reset_particles(),
            KeyCode::KeyP => {
                let ids: Vec<String> = engine
                    .config()
                    .built_in_presets()
                    .iter()
                    .map(|p| p.id.clone())
                    .collect();
                if ids.is_empty() {
                    return;
                }
                self.preset_cursor = (self.preset_cursor + 1) % ids.len();
                if let Err(e) = engine.apply_preset(&ids[self.preset_cursor]) {
                    log::warn!("{}", e);
                }
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let Some(config) = self.config.take() else { return };

        let window_attrs = Window::default_attributes()
            .with_title(self.options.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(self.options.width, self.options.height));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                self.error = Some(EngineError::Window(e));
                event_loop.exit();
                return;
            }
        };

        match ParticleFieldEngine::new(window.clone(), config, self.options.seed) {
            Ok(engine) => {
                self.engine = Some(engine);
                window.request_redraw();
                self.window = Some(window);
            }
            Err(e) => {
                log::error!("{}", e);
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match &event {
            WindowEvent::CloseRequested => {
                if let Some(engine) = &mut self.engine {
                    engine.dispose();
                }
                event_loop.exit();
                return;
            }
            WindowEvent::RedrawRequested => {
                if let Some(engine) = &mut self.engine {
                    engine.tick();
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
                return;
            }
            WindowEvent::KeyboardInput { event: key, .. } if key.state == ElementState::Pressed && !key.repeat => {
                if let PhysicalKey::Code(code) = key.physical_key {
                    self.handle_key(code, event_loop);
                }
            }
            _ => {}
        }

        if let Some(engine) = &mut self.engine {
            engine.handle_window_event(&event);
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(engine) = &mut self.engine {
            let stats = engine.stats();
            log::info!(
                "Exiting after {} frames ({} particles, quality {:?})",
                stats.frame,
                stats.particles.alive,
                stats.quality
            );
            engine.dispose();
        }
    }
}
