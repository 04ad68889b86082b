//! Orbit camera, projection and their GPU uniform.
//!
//! The world is z-up. The camera circles a target point; its home position
//! looks at a bounding sphere from -y at 3.5 radii, the way a scene viewer
//! frames a freshly loaded scene.

use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3, perspective};
use wgpu::util::DeviceExt;
use winit::{
    event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use crate::data_structures::bounds::BoundingSphere;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const SAFE_FRAC_PI_2: f32 = FRAC_PI_2 - 0.0001;

/// Distance of the home eye from the bound centre, in radii.
pub const HOME_DISTANCE: f32 = 3.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub target: Point3<f32>,
    pub distance: f32,
    /// Rotation about +z; zero looks along +y.
    pub yaw: Rad<f32>,
    /// Elevation above the xy plane.
    pub pitch: Rad<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, Y: Into<Rad<f32>>, Pi: Into<Rad<f32>>>(
        target: P,
        distance: f32,
        yaw: Y,
        pitch: Pi,
    ) -> Self {
        Self {
            target: target.into(),
            distance,
            yaw: yaw.into(),
            pitch: pitch.into(),
        }
    }

    /// Frames `bound` from -y, looking horizontally at its centre.
    pub fn home(bound: &BoundingSphere) -> Self {
        let radius = if bound.is_valid() && bound.radius > 0.0 {
            bound.radius
        } else {
            1.0
        };
        Self::new(bound.center, radius * HOME_DISTANCE, Rad(0.0), Rad(0.0))
    }

    /// Unit vector from the target towards the eye.
    pub fn offset_direction(&self) -> Vector3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        Vector3::new(cos_pitch * sin_yaw, -cos_pitch * cos_yaw, sin_pitch)
    }

    pub fn eye(&self) -> Point3<f32> {
        self.target + self.offset_direction() * self.distance
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye(), self.target, Vector3::unit_z())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    /// Chooses clipping distances that keep a scene of `radius` visible
    /// while zooming.
    pub fn fit(&mut self, radius: f32) {
        let radius = radius.max(f32::EPSILON);
        self.znear = radius * 0.01;
        self.zfar = radius * 100.0;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn near_far(&self) -> (f32, f32) {
        (self.znear, self.zfar)
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.eye().to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        self.view_proj.into()
    }
}

/// Orbits with the arrow keys or a mouse drag, zooms with the wheel or
/// PageUp/PageDown.
#[derive(Debug)]
pub struct CameraController {
    amount_left: f32,
    amount_right: f32,
    amount_up: f32,
    amount_down: f32,
    amount_in: f32,
    amount_out: f32,
    rotate_horizontal: f32,
    rotate_vertical: f32,
    scroll: f32,
    speed: f32,
    sensitivity: f32,
}

impl CameraController {
    /// `speed` in radians per second for key orbiting, `sensitivity` scales
    /// mouse input.
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self {
            amount_left: 0.0,
            amount_right: 0.0,
            amount_up: 0.0,
            amount_down: 0.0,
            amount_in: 0.0,
            amount_out: 0.0,
            rotate_horizontal: 0.0,
            rotate_vertical: 0.0,
            scroll: 0.0,
            speed,
            sensitivity,
        }
    }

    pub fn handle_keyboard(&mut self, key: KeyCode, state: ElementState) -> bool {
        let amount = if state == ElementState::Pressed { 1.0 } else { 0.0 };
        match key {
            KeyCode::ArrowLeft | KeyCode::KeyA => self.amount_left = amount,
            KeyCode::ArrowRight | KeyCode::KeyD => self.amount_right = amount,
            KeyCode::ArrowUp | KeyCode::KeyW => self.amount_up = amount,
            KeyCode::ArrowDown | KeyCode::KeyS => self.amount_down = amount,
            KeyCode::PageUp => self.amount_in = amount,
            KeyCode::PageDown => self.amount_out = amount,
            _ => return false,
        }
        true
    }

    pub fn handle_mouse(&mut self, mouse_dx: f64, mouse_dy: f64) {
        self.rotate_horizontal += mouse_dx as f32;
        self.rotate_vertical += mouse_dy as f32;
    }

    pub fn handle_scroll(&mut self, delta: &MouseScrollDelta) {
        self.scroll += match delta {
            MouseScrollDelta::LineDelta(_, scroll) => *scroll,
            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
        };
    }

    /// Feeds keyboard and wheel events; returns whether the camera consumed it.
    pub fn handle_window_events(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state,
                        ..
                    },
                ..
            } => self.handle_keyboard(*key, *state),
            WindowEvent::MouseWheel { delta, .. } => {
                self.handle_scroll(delta);
                true
            }
            _ => false,
        }
    }

    pub fn update(&mut self, camera: &mut Camera, dt: Duration) {
        let dt = dt.as_secs_f32();

        camera.yaw += Rad((self.amount_right - self.amount_left) * self.speed * dt);
        camera.pitch += Rad((self.amount_up - self.amount_down) * self.speed * dt);
        camera.yaw += Rad(-self.rotate_horizontal * self.sensitivity * dt);
        camera.pitch += Rad(self.rotate_vertical * self.sensitivity * dt);
        self.rotate_horizontal = 0.0;
        self.rotate_vertical = 0.0;

        // zoom is multiplicative so it feels the same at every scale
        let zoom = self.scroll * 0.1 + (self.amount_in - self.amount_out) * dt;
        camera.distance = (camera.distance * (1.0 - zoom).clamp(0.5, 1.5)).max(f32::EPSILON);
        self.scroll = 0.0;

        camera.pitch.0 = camera.pitch.0.clamp(-SAFE_FRAC_PI_2, SAFE_FRAC_PI_2);
    }
}

pub struct CameraResources {
    pub camera: Camera,
    pub controller: CameraController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(device: &wgpu::Device, camera: Camera, projection: &Projection) -> Self {
        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, projection);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        Self {
            camera,
            controller: CameraController::new(1.5, 0.4),
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    /// Recomputes the uniform and uploads it.
    pub fn write(&mut self, queue: &wgpu::Queue, projection: &Projection) {
        self.uniform.update_view_proj(&self.camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}
