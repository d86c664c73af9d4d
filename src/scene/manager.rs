use glam::{Mat4, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use slotmap::SlotMap;

use crate::assets::texture_cache::{TextureCache, TextureRecord};
use crate::assets::{AssetIo, AssetReaderVariant};
use crate::backend::{GpuContext, PuppetBackend};
use crate::config::{SceneConfig, StageConfig};
use crate::errors::{PuppetError, Result};
use crate::input::PointerInput;
use crate::model::{Fetched, LoadToken, Model, ModelHandle, ModelOptions, Resource, TextureWaiter};
use crate::scene::events::{EventSink, StageEvent, log_sink};
use crate::utils::interner;
use crate::utils::time::Timer;

/// Owns the live models of the current scene and everything they share.
///
/// The manager is the only place that performs I/O on behalf of models: it
/// dispatches their queued requests, pumps the local executor and routes each
/// completion back to the model that asked for it, provided that model is
/// still alive and still on the same load.
pub struct SceneManager {
    config: StageConfig,
    backend: Box<dyn PuppetBackend>,
    gpu: Box<dyn GpuContext>,

    io: AssetIo,
    textures: TextureCache<TextureWaiter>,
    fetch_tx: flume::Sender<Fetched>,
    fetch_rx: flume::Receiver<Fetched>,

    models: SlotMap<ModelHandle, Model>,
    active: Option<ModelHandle>,
    scene_index: Option<usize>,
    next_generation: u64,

    input: PointerInput,
    canvas: (u32, u32),
    timer: Timer,
    rng: StdRng,
    sink: EventSink,
}

impl SceneManager {
    pub fn new(
        config: StageConfig,
        reader: AssetReaderVariant,
        backend: Box<dyn PuppetBackend>,
        gpu: Box<dyn GpuContext>,
    ) -> Result<Self> {
        config.validate()?;
        interner::preload_standard_ids();

        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(rand::random::<u64>()),
        };
        let input = PointerInput::new(1, 1, &config.viewport);
        let (fetch_tx, fetch_rx) = flume::unbounded();

        Ok(Self {
            config,
            backend,
            gpu,
            io: AssetIo::new(reader),
            textures: TextureCache::new(),
            fetch_tx,
            fetch_rx,
            models: SlotMap::with_key(),
            active: None,
            scene_index: None,
            next_generation: 0,
            input,
            canvas: (1, 1),
            timer: Timer::new(),
            rng,
            sink: log_sink(),
        })
    }

    pub fn set_event_sink(&mut self, sink: impl FnMut(&StageEvent) + 'static) {
        self.sink = Box::new(sink);
    }

    // ========================================================================
    // Scenes
    // ========================================================================

    /// Replaces every live model with a fresh load of scene `index`.
    pub fn change_scene(&mut self, index: usize) -> Result<()> {
        let count = self.config.scenes.len();
        let Some(scene) = self.config.scenes.get(index).cloned() else {
            return Err(PuppetError::SceneIndexOutOfBounds { index, count });
        };

        log::info!("Scene {index}: {}/{}", scene.dir_path, scene.file_name);
        self.release_all_models();

        self.next_generation += 1;
        let options = ModelOptions {
            idle_group: scene.idle.clone(),
            premultiplied_alpha: self.config.loader.premultiplied_alpha,
            lip_sync: self.config.lip_sync,
            seed: self.rng.random::<u64>(),
        };
        let mut model = Model::new(self.next_generation, options);
        model.load_assets(&scene.dir_path, &scene.file_name);

        let handle = self.models.insert(model);
        self.active = Some(handle);
        self.scene_index = Some(index);

        self.emit(&StageEvent::SceneChanged { index });
        self.dispatch(handle);
        Ok(())
    }

    /// Cycles to the scene after the current one.
    pub fn next_scene(&mut self) -> Result<()> {
        let count = self.config.scenes.len();
        let next = self.scene_index.map_or(0, |i| (i + 1) % count.max(1));
        self.change_scene(next)
    }

    fn current_scene(&self) -> Option<&SceneConfig> {
        self.scene_index.and_then(|i| self.config.scenes.get(i))
    }

    // ========================================================================
    // Frame loop
    // ========================================================================

    /// Advances the stage by the delta measured since the previous call.
    pub fn frame(&mut self) {
        self.timer.tick();
        let dt = self.timer.dt_seconds();
        self.on_update(dt);
    }

    pub fn on_update(&mut self, dt: f32) {
        self.pump();

        let timeout = self.config.loader.stall_timeout_secs;
        for model in self.models.values_mut() {
            model.tick_loader(dt, timeout);
        }

        let (w, h) = (self.canvas.0 as f32, self.canvas.1 as f32);
        let view = self.input.view().to_mat4();

        for model in self.models.values_mut() {
            let portrait_fit = model.canvas_width().is_some_and(|cw| cw > 1.0) && w < h;
            let scale = if portrait_fit {
                if let Some(matrix) = model.model_matrix_mut() {
                    matrix.set_width(2.0);
                }
                Mat4::from_scale(Vec3::new(1.0, w / h, 1.0))
            } else {
                Mat4::from_scale(Vec3::new(h / w, 1.0, 1.0))
            };
            let projection = scale * view;

            model.update(dt);
            model.draw(&projection);
        }

        // Voice requests started by this frame's idle motions.
        self.flush_outboxes();
        self.flush_events();
    }

    /// Runs fetches and routes their completions until nothing moves.
    fn pump(&mut self) {
        loop {
            self.io.run_until_stalled();
            let mut progressed = false;

            while let Ok(fetched) = self.fetch_rx.try_recv() {
                progressed = true;
                self.route_fetched(fetched);
            }

            for (waiter, result) in self.textures.poll(self.gpu.as_mut()) {
                progressed = true;
                self.route_texture(waiter, result);
            }

            progressed |= self.flush_outboxes();
            if !progressed {
                break;
            }
        }
    }

    fn route_fetched(&mut self, fetched: Fetched) {
        let Fetched {
            token,
            resource,
            path,
            result,
        } = fetched;

        match self.models.get_mut(token.model) {
            Some(model) if model.generation() == token.generation => {
                model.on_fetched(resource, &path, result, self.backend.as_mut());
            }
            _ => log::debug!("Dropping stale {resource} completion ({path})"),
        }
    }

    fn route_texture(&mut self, waiter: TextureWaiter, result: Result<TextureRecord>) {
        let TextureWaiter { token, slot } = waiter;
        match self.models.get_mut(token.model) {
            Some(model) if model.generation() == token.generation => model.on_texture(slot, result),
            _ => log::debug!("Dropping stale texture slot {slot} completion"),
        }
    }

    /// Sends every queued model request out. Returns whether any was queued.
    fn flush_outboxes(&mut self) -> bool {
        let handles: Vec<ModelHandle> = self.models.keys().collect();
        let mut dispatched = false;
        for handle in handles {
            dispatched |= self.dispatch(handle);
        }
        dispatched
    }

    fn dispatch(&mut self, handle: ModelHandle) -> bool {
        let Some(model) = self.models.get_mut(handle) else {
            return false;
        };
        let token = LoadToken {
            model: handle,
            generation: model.generation(),
        };
        let requests = model.take_requests();
        let dispatched = !requests.is_empty();

        for request in requests {
            match request.resource {
                Resource::Texture { slot, premultiply } => {
                    self.textures
                        .resolve(&request.path, premultiply, TextureWaiter { token, slot }, &self.io);
                }
                resource => {
                    let reader = self.io.reader().clone();
                    let tx = self.fetch_tx.clone();
                    let path = request.path;
                    self.io.spawn(async move {
                        let result = reader.read_bytes(&path).await;
                        // The receiver lives as long as the manager.
                        let _ = tx.send(Fetched {
                            token,
                            resource,
                            path,
                            result,
                        });
                    });
                }
            }
        }
        dispatched
    }

    fn flush_events(&mut self) {
        let mut pending = Vec::new();
        for (handle, model) in &mut self.models {
            pending.extend(
                model
                    .take_events()
                    .into_iter()
                    .map(|event| StageEvent::Model { model: handle, event }),
            );
        }
        for event in &pending {
            self.emit(event);
        }
    }

    fn emit(&mut self, event: &StageEvent) {
        (self.sink)(event);
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Handles a tap at `(x, y)` in screen space.
    pub fn on_tap(&mut self, x: f32, y: f32) {
        self.emit(&StageEvent::Interacted { x, y });

        let Some(scene) = self.current_scene().cloned() else {
            return;
        };
        let priority = self.config.priority;

        for model in self.models.values_mut() {
            let Some(area) = model.hit_area_at(x, y) else {
                continue;
            };
            log::info!("Hit area: [{area}]");

            if !scene.expression.is_empty() && area == scene.expression {
                model.set_random_expression();
            }
            if let Some(group) = scene.interaction.get(&area) {
                model.start_random_motion(group, priority, None);
            }
        }

        self.flush_outboxes();
        self.flush_events();
    }

    /// Points every model at `(x, y)` in view space.
    pub fn on_drag(&mut self, x: f32, y: f32) {
        for model in self.models.values_mut() {
            model.set_dragging(x, y);
        }
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.input.press(x, y);
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if !self.input.is_pressed() {
            return;
        }
        self.input.move_to(x, y);
        let view = self.input.device_to_view(Vec2::new(x, y));
        self.on_drag(view.x, view.y);
    }

    pub fn pointer_up(&mut self, x: f32, y: f32) {
        if !self.input.is_pressed() {
            return;
        }
        self.input.release(x, y);
        self.on_drag(0.0, 0.0);
        let screen = self.input.device_to_screen(Vec2::new(x, y));
        self.on_tap(screen.x, screen.y);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.canvas = (width.max(1), height.max(1));
        self.input.initialize(self.canvas.0, self.canvas.1, &self.config.viewport);
    }

    // ========================================================================
    // Release
    // ========================================================================

    /// Drops every model and every cached texture.
    pub fn release(&mut self) {
        self.release_all_models();
        self.textures.release_all(self.gpu.as_mut());
    }

    pub fn release_all_models(&mut self) {
        for (_, mut model) in self.models.drain() {
            model.release_motions();
            model.release_expressions();
        }
        self.active = None;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn scene_index(&self) -> Option<usize> {
        self.scene_index
    }

    #[must_use]
    pub fn scene_count(&self) -> usize {
        self.config.scenes.len()
    }

    pub fn models(&self) -> impl Iterator<Item = (ModelHandle, &Model)> {
        self.models.iter()
    }

    #[must_use]
    pub fn model(&self, handle: ModelHandle) -> Option<&Model> {
        self.models.get(handle)
    }

    pub fn model_mut(&mut self, handle: ModelHandle) -> Option<&mut Model> {
        self.models.get_mut(handle)
    }

    #[must_use]
    pub fn active_handle(&self) -> Option<ModelHandle> {
        self.active
    }

    #[must_use]
    pub fn active_model(&self) -> Option<&Model> {
        self.active.and_then(|h| self.models.get(h))
    }

    pub fn active_model_mut(&mut self) -> Option<&mut Model> {
        self.active.and_then(|h| self.models.get_mut(h))
    }

    #[must_use]
    pub fn textures(&self) -> &TextureCache<TextureWaiter> {
        &self.textures
    }

    #[must_use]
    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    #[must_use]
    pub fn input(&self) -> &PointerInput {
        &self.input
    }

    #[must_use]
    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas
    }
}
