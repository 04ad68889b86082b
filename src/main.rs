use stencil_mirror::{
    DeviceEvent, WindowEvent,
    camera::Camera,
    config::Settings,
    context::Context,
    flow::{self, FlowConstructor, GraphicsFlow, Out},
    render::Render,
    resources::{load_image, load_model_data},
    scene::MirrorScene,
};
use winit::{
    event::{ElementState, KeyEvent},
    keyboard::{KeyCode, PhysicalKey},
};

struct MirrorFlow {
    scene: MirrorScene,
    settings: Settings,
}

impl MirrorFlow {
    fn home(&self) -> Out {
        let bound = self.scene.layout().world_bound();
        Out::Configure(Box::new(move |ctx: &mut Context| {
            ctx.camera.camera = Camera::home(&bound);
            ctx.write_camera();
        }))
    }
}

impl GraphicsFlow<()> for MirrorFlow {
    fn on_init(&mut self, ctx: &mut Context, _: &mut ()) -> Out {
        let bound = self.scene.layout().world_bound();
        ctx.camera.camera = Camera::home(&bound);
        ctx.projection.fit(bound.radius);
        ctx.clear_colour = self.settings.clear_colour;
        ctx.tick_duration_millis = self.settings.tick_duration_millis;
        ctx.window().set_title(&self.settings.window_title);
        log::info!(
            "Camera home at {:?}, looking at {:?}",
            ctx.camera.camera.eye(),
            bound.center
        );
        Out::Empty
    }

    fn on_update(
        &mut self,
        ctx: &Context,
        _: &mut (),
        dt: instant::Duration,
    ) -> Out {
        self.scene.update(&ctx.queue, dt);
        Out::Empty
    }

    fn on_tick(&mut self, _: &Context, _: &mut ()) -> Out {
        log::debug!(
            "Animation time {:.2}s",
            self.scene.animator().animation_time()
        );
        Out::Empty
    }

    fn on_device_events(&mut self, _: &Context, _: &mut (), _: &DeviceEvent) -> Out {
        Out::Empty
    }

    fn on_window_events(
        &mut self,
        _: &Context,
        _: &mut (),
        event: &WindowEvent,
    ) -> Out {
        let WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: PhysicalKey::Code(key),
                    state: ElementState::Pressed,
                    repeat: false,
                    ..
                },
            ..
        } = event
        else {
            return Out::Empty;
        };
        match key {
            KeyCode::Space => {
                let paused = self.scene.animator_mut().toggle_pause();
                log::info!("Spin {}", if paused { "paused" } else { "resumed" });
            }
            KeyCode::KeyR => {
                self.scene.animator_mut().reset();
                log::info!("Spin reset");
            }
            KeyCode::KeyH => return self.home(),
            _ => (),
        }
        Out::Empty
    }

    fn on_render<'pass>(&self) -> Render<'_, 'pass> {
        self.scene.render()
    }
}

fn mirror_flow(settings: Settings) -> FlowConstructor<()> {
    Box::new(move |ctx| {
        Box::pin(async move {
            let model = load_model_data(&settings.model_file).await?;
            let texture = match load_image(&settings.mirror_texture).await {
                Ok(image) => Some(image),
                Err(e) => {
                    log::warn!("Mirror texture unavailable, drawing it white: {e:#}");
                    None
                }
            };
            let scene = MirrorScene::new(&ctx, model, texture, &settings)?;
            Ok(Box::new(MirrorFlow { scene, settings }) as Box<dyn GraphicsFlow<_>>)
        })
    })
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().from_args(std::env::args().skip(1))?;
    flow::run(vec![mirror_flow(settings)])
}
