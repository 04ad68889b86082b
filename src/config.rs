//! Demo settings.
//!
//! [`Settings`] gathers every constant the mirror scene is built from. The
//! defaults reproduce the classic stencil-reflection demo: a model spinning at
//! 45°/s above a mirror one and a half bounding radii wide, the whole scene
//! tilted by 45° around the x axis.
//!
//! Overrides are applied in this order: defaults, environment
//! (`MIRROR_MODEL`, `MIRROR_TEXTURE`), command line.

use anyhow::bail;
use cgmath::{Deg, Vector3};

pub const MODEL_ENV: &str = "MIRROR_MODEL";
pub const TEXTURE_ENV: &str = "MIRROR_TEXTURE";

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Model file below `assets/` (`.obj`, `.gltf` or `.glb`).
    pub model_file: String,
    /// Image file below `assets/` that is blended onto the mirror.
    pub mirror_texture: String,
    /// Mirror half-extent in bounding-sphere radii.
    pub width_factor: f32,
    /// How far below the bounding-sphere centre the mirror sits, in radii.
    pub height_factor: f32,
    /// Rotation of the whole scene around the x axis.
    pub tilt: Deg<f32>,
    pub spin_axis: Vector3<f32>,
    /// Angular velocity of the model's spin per second.
    pub spin_speed: Deg<f32>,
    pub start_paused: bool,
    pub clear_colour: wgpu::Color,
    pub window_title: String,
    pub tick_duration_millis: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_file: "cessna.obj".to_string(),
            mirror_texture: "tank.png".to_string(),
            width_factor: 1.5,
            height_factor: 0.3,
            tilt: Deg(45.0),
            spin_axis: Vector3::unit_z(),
            spin_speed: Deg(45.0),
            start_paused: false,
            clear_colour: wgpu::Color {
                r: 0.2,
                g: 0.2,
                b: 0.4,
                a: 1.0,
            },
            window_title: "stencil-mirror".to_string(),
            tick_duration_millis: 500,
        }
    }
}

impl Settings {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_env(|key| std::env::var(key).ok());
        settings
    }

    pub(crate) fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup(MODEL_ENV).filter(|v| !v.is_empty()) {
            self.model_file = model;
        }
        if let Some(texture) = lookup(TEXTURE_ENV).filter(|v| !v.is_empty()) {
            self.mirror_texture = texture;
        }
    }

    /// Applies command line arguments (without the program name).
    ///
    /// The first positional argument replaces the model, the second the mirror
    /// texture. `--paused` starts with the spin stopped.
    pub fn from_args<I, A>(mut self, args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let mut positional = 0;
        for arg in args.into_iter().map(Into::into) {
            if let Some(flag) = arg.strip_prefix("--") {
                match flag {
                    "paused" => self.start_paused = true,
                    _ => bail!("unknown flag --{flag}"),
                }
                continue;
            }
            match positional {
                0 => self.model_file = arg,
                1 => self.mirror_texture = arg,
                _ => bail!("unexpected argument {arg:?}; expected [MODEL] [TEXTURE] [--paused]"),
            }
            positional += 1;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_demo() {
        let settings = Settings::default();
        assert_eq!(settings.width_factor, 1.5);
        assert_eq!(settings.height_factor, 0.3);
        assert_eq!(settings.tilt, Deg(45.0));
        assert_eq!(settings.spin_speed, Deg(45.0));
        assert_eq!(settings.spin_axis, Vector3::unit_z());
        assert!(!settings.start_paused);
    }

    #[test]
    fn positional_arguments_replace_assets() {
        let settings = Settings::default()
            .from_args(["plane.gltf", "floor.jpg"])
            .unwrap();
        assert_eq!(settings.model_file, "plane.gltf");
        assert_eq!(settings.mirror_texture, "floor.jpg");
    }

    #[test]
    fn paused_flag_can_appear_anywhere() {
        let settings = Settings::default()
            .from_args(["--paused", "plane.obj"])
            .unwrap();
        assert!(settings.start_paused);
        assert_eq!(settings.model_file, "plane.obj");
        assert_eq!(settings.mirror_texture, Settings::default().mirror_texture);
    }

    #[test]
    fn unknown_flags_and_extra_arguments_are_rejected() {
        assert!(Settings::default().from_args(["--fast"]).is_err());
        assert!(Settings::default().from_args(["a", "b", "c"]).is_err());
    }

    #[test]
    fn environment_overrides_ignore_empty_values() {
        let mut settings = Settings::default();
        settings.apply_env(|key| match key {
            MODEL_ENV => Some("boat.obj".to_string()),
            TEXTURE_ENV => Some(String::new()),
            _ => None,
        });
        assert_eq!(settings.model_file, "boat.obj");
        assert_eq!(settings.mirror_texture, "tank.png");
    }
}
