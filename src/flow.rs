//! Flow control and application event loop.
//!
//! This module provides the main event loop and flow abstraction of the engine.
//! A "flow" represents a scene or application state that handles user input,
//! updates its simulation and provides renderable objects each frame. The
//! engine manages multiple active flows and coordinates rendering and event
//! distribution.
//!
//! # User-facing types
//!
//! - [`GraphicsFlow<S>`] is the trait for scenes/states that handle events and rendering
//! - [`Out`] lets a hook reconfigure the [`Context`] after it returns
//!
//! # Lifecycle Flow
//!
//! The event loop follows this pattern each frame:
//! 1. Collect window/device events
//! 2. Call `on_<device/window>_events` on all flows for event distribution
//! 3. Update flow state (via `on_update` / `on_tick`)
//! 4. Call the flows' `on_render()` to collect their render bins
//! 5. Clear colour, depth and stencil, then draw every bin in ascending order
//! 6. Present frame

use std::{fmt::Debug, iter, pin::Pin, sync::Arc};

use instant::{Duration, Instant};

use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use crate::{
    context::{Context, InitContext, MouseButtonState},
    render::Render,
};

///
/// This is the Output Type for every lifecycle hook.
///
/// `Out::Configure` can be used to modify the Context during runtime for instance to move the
/// camera, change the tick speed or the clear colour. Hooks only see `&Context`, the closure
/// runs right after the hook returns with mutable access.
///
/// `Empty` is the default output used when nothing needs to change.
///
pub enum Out {
    Configure(Box<dyn FnOnce(&mut Context)>),
    Empty,
}

impl Default for Out {
    fn default() -> Self {
        Self::Empty
    }
}

impl Out {
    pub(crate) fn apply(self, ctx: &mut Context) {
        match self {
            Out::Configure(f) => f(ctx),
            Out::Empty => (),
        }
    }
}

/// Trait for implementing a renderable scene or application state.
///
/// A `GraphicsFlow` manages a self-contained portion of the application:
/// rendering, input handling, animations and state updates. The engine
/// coordinates multiple flows, passes events to them and merges their render
/// bins into one ordered frame. `S` is state shared by all flows.
///
/// # Lifecycle
///
/// 1. `on_init()` is called once when the flow is created; configure context (camera, clear color, etc.)
/// 2. `on_window_events()` and `on_device_events()` are called for each winit input event
/// 3. `on_update()` is called every frame
/// 4. `on_tick()` is called every `tick_duration_millis`
/// 5. `on_render()` is called each frame and specifies how to render `self`
///
pub trait GraphicsFlow<S> {
    /// Initialize the flow and configure the context.
    ///
    /// This is the place to configure things such as the background colour
    /// or the camera start position.
    fn on_init(&mut self, ctx: &mut Context, state: &mut S) -> Out;

    /// Update state every frame.
    ///
    /// Called every frame with the elapsed time `dt`. Use for animations
    /// and other per-frame logic.
    fn on_update(&mut self, ctx: &Context, state: &mut S, dt: Duration) -> Out;

    /// Update state periodically.
    ///
    /// Called every `tick_duration_millis` milliseconds (configurable via context).
    fn on_tick(&mut self, ctx: &Context, state: &mut S) -> Out;

    /// Handle raw device events (mouse motion, raw keys).
    fn on_device_events(&mut self, ctx: &Context, state: &mut S, event: &DeviceEvent) -> Out;

    /// Handle window events (keyboard, mouse, window resizing, etc.).
    fn on_window_events(&mut self, ctx: &Context, state: &mut S, event: &WindowEvent) -> Out;

    /// Return renderable objects for this flow.
    ///
    /// Called each frame. The engine merges the bins of all flows and draws
    /// them in ascending bin order.
    fn on_render<'pass>(&self) -> Render<'_, 'pass>;
}

// Dummy impl to make wasm work
impl<State> Debug for dyn GraphicsFlow<State> + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GraphicsFlow")
    }
}

/// Type alias for a flow constructor (factory function).
///
/// A flow constructor takes an `InitContext` and asynchronously returns a
/// boxed `GraphicsFlow`. This allows resources to load before the first frame.
/// A constructor that fails stops the application.
pub type FlowConstructor<S> = Box<
    dyn FnOnce(InitContext) -> Pin<Box<dyn Future<Output = anyhow::Result<Box<dyn GraphicsFlow<S>>>>>>,
>;

/// Application state bundle: GPU context, app state, and surface status.
#[derive(Debug)]
pub struct AppState<State: 'static> {
    pub(crate) ctx: Context,
    state: State,
    is_surface_configured: bool,
}

impl<State: Default> AppState<State> {
    async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let ctx = Context::new(window).await?;
        Ok(Self {
            ctx,
            state: State::default(),
            is_surface_configured: false,
        })
    }
}

impl<State: 'static> AppState<State> {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.config.width = width;
            self.ctx.config.height = height;
            self.is_surface_configured = true;
            self.ctx.projection.resize(width, height);
            self.ctx
                .surface
                .configure(&self.ctx.device, &self.ctx.config);
            self.ctx.recreate_depth_texture();
            self.ctx.write_camera();
        }
    }

    fn render(&mut self, graphics_flows: &[Box<dyn GraphicsFlow<State>>]) -> Result<(), wgpu::SurfaceError> {
        // invoke main render loop
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder: wgpu::CommandEncoder =
            self.ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Render Encoder"),
                });
        {
            let mut render_pass: wgpu::RenderPass<'_> =
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &self.ctx.depth_texture.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(0),
                            store: wgpu::StoreOp::Store,
                        }),
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                    multiview_mask: None,
                });

            // Actual rendering: all flows' bins in one ascending order
            let renders = graphics_flows
                .iter()
                .map(|flow| flow.on_render())
                .collect::<Vec<_>>();
            Render::Composed(renders).draw(&self.ctx, &mut render_pass);
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

/// Whether enough time has passed since the last tick to run `on_tick`.
fn tick_due(since_tick: Duration, tick_duration_millis: u64) -> bool {
    since_tick >= Duration::from_millis(tick_duration_millis)
}

pub struct App<State: 'static> {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    proxy: winit::event_loop::EventLoopProxy<FlowEvent<State>>,
    state: Option<AppState<State>>,
    // This will hold the fully initialized flows once they are ready.
    graphics_flows: Vec<Box<dyn GraphicsFlow<State>>>,
    // This holds the constructors at the start.
    // We use Option to `take()` it after use.
    constructors: Option<Vec<FlowConstructor<State>>>,
    last_time: Instant,
    time_since_tick: Duration,
}

impl<State: 'static> App<State> {
    fn new(
        event_loop: &EventLoop<FlowEvent<State>>,
        constructors: Vec<FlowConstructor<State>>,
    ) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            state: None,
            graphics_flows: Vec::new(),
            constructors: Some(constructors),
            last_time: Instant::now(),
            time_since_tick: Duration::from_millis(0),
        })
    }

    /// Runs `hook` on every flow and applies its output to the context.
    fn for_each_flow(
        &mut self,
        mut hook: impl FnMut(&mut dyn GraphicsFlow<State>, &Context, &mut State) -> Out,
    ) {
        let Some(app_state) = &mut self.state else {
            return;
        };
        for flow in self.graphics_flows.iter_mut() {
            hook(flow.as_mut(), &app_state.ctx, &mut app_state.state).apply(&mut app_state.ctx);
        }
    }

    fn init_flows(&mut self) {
        let Some(app_state) = &mut self.state else {
            return;
        };
        for flow in self.graphics_flows.iter_mut() {
            flow.on_init(&mut app_state.ctx, &mut app_state.state)
                .apply(&mut app_state.ctx);
        }
        app_state.ctx.write_camera();
    }

    fn redraw(&mut self) {
        let Some(state) = &mut self.state else {
            return;
        };
        let dt = self.last_time.elapsed();
        self.last_time = Instant::now();
        self.time_since_tick += dt;

        match state.render(&self.graphics_flows) {
            Ok(_) => {}
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = state.ctx.window.inner_size();
                state.resize(size.width, size.height);
                return;
            }
            Err(e) => {
                log::error!("Unable to render {}", e);
                return;
            }
        }

        if tick_due(self.time_since_tick, state.ctx.tick_duration_millis) {
            self.time_since_tick = Duration::from_millis(0);
            self.for_each_flow(|flow, ctx, state| flow.on_tick(ctx, state));
        }

        // Update the camera and the light riding on it
        if let Some(state) = &mut self.state {
            state
                .ctx
                .camera
                .controller
                .update(&mut state.ctx.camera.camera, dt);
            state.ctx.write_camera();
        }

        // Update custom stuff
        self.for_each_flow(|flow, ctx, state| flow.on_update(ctx, state, dt));
    }
}

/// Messages from asynchronous setup back into the event loop.
pub(crate) enum FlowEvent<State: 'static> {
    #[allow(dead_code)]
    Initialized {
        state: AppState<State>,
        flows: Vec<Box<dyn GraphicsFlow<State>>>,
    },
    #[allow(dead_code)]
    Exit,
}

impl<State> Debug for FlowEvent<State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized { state: _, flows } => {
                f.debug_struct("Initialized").field("flows", flows).finish()
            }
            Self::Exit => f.write_str("Exit"),
        }
    }
}

fn is_escape(event: &WindowEvent) -> bool {
    matches!(
        event,
        WindowEvent::KeyboardInput {
            event: KeyEvent {
                physical_key: PhysicalKey::Code(KeyCode::Escape),
                state: ElementState::Pressed,
                ..
            },
            ..
        }
    )
}

/// Mouse button held after a press or release of `button`.
fn pressed_after(current: MouseButtonState, button: MouseButton, pressed: bool) -> MouseButtonState {
    match (button, pressed) {
        (MouseButton::Left, true) => MouseButtonState::Left,
        (MouseButton::Right, true) => MouseButtonState::Right,
        (_, false) => MouseButtonState::None,
        _ => current,
    }
}

impl<State: 'static + Default> ApplicationHandler<FlowEvent<State>> for App<State> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(constructors) = self.constructors.take() else {
            // Resumed again after a suspend, everything is set up already
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes();

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID));
            match canvas {
                Some(canvas) => {
                    window_attributes = window_attributes.with_canvas(Some(canvas.unchecked_into()))
                }
                None => log::warn!("No #{CANVAS_ID} element found, creating a new canvas"),
            }
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Could not create a window: {e}");
                event_loop.exit();
                return;
            }
        };

        let init_future = async move {
            let app_state = AppState::new(window).await?;

            let flow_futures: Vec<_> = constructors
                .into_iter()
                // The clone in into() leverages the internal Arcs of Device and Queue and thus only clones the ref
                .map(|constructor| constructor((&app_state.ctx).into()))
                .collect();
            let flows = futures::future::join_all(flow_futures)
                .await
                .into_iter()
                .collect::<anyhow::Result<Vec<_>>>()?;
            anyhow::Ok((app_state, flows))
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init_future) {
                Ok((mut app_state, flows)) => {
                    let size = app_state.ctx.window.inner_size();
                    app_state.resize(size.width, size.height);
                    self.graphics_flows = flows;
                    self.state = Some(app_state);
                    self.init_flows();
                }
                Err(e) => {
                    log::error!("App initialization failed: {e:#}");
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match init_future.await {
                    Ok((app_state, flows)) => {
                        if proxy
                            .send_event(FlowEvent::Initialized {
                                state: app_state,
                                flows,
                            })
                            .is_err()
                        {
                            log::error!("Event loop closed before initialization finished");
                        }
                    }
                    Err(e) => {
                        log::error!("App initialization failed: {e:#}");
                        let _ = proxy.send_event(FlowEvent::Exit);
                    }
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent<State>) {
        match event {
            FlowEvent::Initialized { state, flows } => {
                // This is the message from our wasm `spawn_local`
                let size = state.ctx.window.inner_size();
                self.state = Some(state);
                self.graphics_flows = flows;

                // Important: Trigger a resize and redraw now that we are initialized
                if let Some(app_state) = &mut self.state {
                    app_state.resize(size.width, size.height);
                }
                self.init_flows();
                if let Some(app_state) = &self.state {
                    app_state.ctx.window.request_redraw();
                }
            }
            FlowEvent::Exit => {
                event_loop.exit();
            }
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            let speed_factor = 5.0;
            if state.ctx.mouse.pressed != MouseButtonState::None {
                state
                    .ctx
                    .camera
                    .controller
                    .handle_mouse(dx * speed_factor, dy * speed_factor);
            }
        }
        self.for_each_flow(|flow, ctx, state| flow.on_device_events(ctx, state, &event));
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        // general stuff
        state.ctx.camera.controller.handle_window_events(&event);

        match &event {
            WindowEvent::CursorMoved { position, .. } => state.ctx.mouse.coords = *position,
            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } => {
                state.ctx.mouse.pressed =
                    pressed_after(state.ctx.mouse.pressed, *button, button_state.is_pressed());
            }
            _ => (),
        }

        self.for_each_flow(|flow, ctx, state| flow.on_window_events(ctx, state, &event));

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            event if is_escape(&event) => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    state.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }
}

fn init_logger() -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .try_init()
        {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info)
            .map_err(|e| anyhow::anyhow!("could not initialize the console logger: {e}"))?;
    }
    Ok(())
}

/// Opens a window and runs `constructors`' flows until the window closes
/// or Escape is pressed.
pub fn run<State: 'static + Default>(constructors: Vec<FlowConstructor<State>>) -> anyhow::Result<()> {
    init_logger()?;

    let event_loop: EventLoop<FlowEvent<State>> = EventLoop::with_user_event().build()?;

    let mut app: App<State> = App::new(&event_loop, constructors)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NotDefault;

    #[test]
    fn frame_methods_work_for_any_state() {
        // the frame loop runs for State types without Default
        let _resize: fn(&mut AppState<NotDefault>, u32, u32) = AppState::<NotDefault>::resize;
        let _render: fn(
            &mut AppState<NotDefault>,
            &[Box<dyn GraphicsFlow<NotDefault>>],
        ) -> Result<(), wgpu::SurfaceError> = AppState::<NotDefault>::render;
    }

    #[test]
    fn outputs_only_configure_the_context() {
        assert!(matches!(Out::default(), Out::Empty));
        let configure = Out::Configure(Box::new(|ctx: &mut Context| ctx.tick_duration_millis = 0));
        assert!(matches!(configure, Out::Configure(_)));
    }

    #[test]
    fn ticks_are_due_after_the_tick_duration() {
        assert!(!tick_due(Duration::from_millis(499), 500));
        assert!(tick_due(Duration::from_millis(500), 500));
        assert!(tick_due(Duration::from_millis(20), 0));
    }

    #[test]
    fn releasing_any_button_stops_the_drag() {
        let state = pressed_after(MouseButtonState::None, MouseButton::Left, true);
        assert_eq!(state, MouseButtonState::Left);
        let state = pressed_after(state, MouseButton::Middle, true);
        assert_eq!(state, MouseButtonState::Left);
        let state = pressed_after(state, MouseButton::Right, false);
        assert_eq!(state, MouseButtonState::None);
        assert_eq!(
            pressed_after(MouseButtonState::None, MouseButton::Right, true),
            MouseButtonState::Right
        );
    }
}
