//! Keyframed transform animation.
//!
//! An [`AnimationPath`] is a time-ordered list of [`ControlPoint`]s that is
//! sampled with linear interpolation for position and scale and spherical
//! interpolation for rotation. A [`PathAnimator`] plays a path back over time
//! around a pivot point; this is what spins the model above the mirror.

use std::f32::consts::PI;

use cgmath::{
    InnerSpace, Matrix4, One, Point3, Quaternion, Rad, Rotation3, Vector3, VectorSpace,
};

/// A single keyframe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlPoint {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Default for ControlPoint {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl ControlPoint {
    pub fn from_rotation(rotation: Quaternion<f32>) -> Self {
        Self {
            rotation,
            ..Default::default()
        }
    }

    /// Blends towards `other`; `ratio` 0 is `self`, 1 is `other`.
    pub fn interpolate(&self, ratio: f32, other: &ControlPoint) -> ControlPoint {
        ControlPoint {
            position: self.position.lerp(other.position, ratio),
            rotation: self.rotation.slerp(other.rotation, ratio),
            scale: self.scale.lerp(other.scale, ratio),
        }
    }

    /// Scale, then rotate, then translate.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

/// What happens once playback runs past the last keyframe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopMode {
    /// Play forwards, then backwards, then forwards again.
    Swing,
    /// Jump back to the first keyframe.
    #[default]
    Loop,
    /// Hold the last keyframe.
    NoLooping,
}

#[derive(Clone, Debug, Default)]
pub struct AnimationPath {
    points: Vec<(f32, ControlPoint)>,
    pub loop_mode: LoopMode,
}

impl AnimationPath {
    pub fn new(loop_mode: LoopMode) -> Self {
        Self {
            points: Vec::new(),
            loop_mode,
        }
    }

    /// A looping path that turns once around `axis` every `2π / angular_velocity` seconds.
    ///
    /// Returns an empty path for a zero velocity or a degenerate axis; an
    /// empty path samples as the identity.
    pub fn rotation(axis: Vector3<f32>, angular_velocity: Rad<f32>) -> Self {
        let mut path = Self::new(LoopMode::Loop);
        if angular_velocity.0 == 0.0 || axis.magnitude2() == 0.0 {
            return path;
        }
        let axis = axis.normalize();
        let period = 2.0 * PI / angular_velocity.0.abs();
        let direction = angular_velocity.0.signum();
        for quarter in 0..=4 {
            let fraction = quarter as f32 * 0.25;
            let angle = Rad(direction * fraction * 2.0 * PI);
            path.insert(
                fraction * period,
                ControlPoint::from_rotation(Quaternion::from_axis_angle(axis, angle)),
            );
        }
        path
    }

    /// Adds a keyframe, replacing any keyframe at exactly the same time.
    pub fn insert(&mut self, time: f32, point: ControlPoint) {
        match self
            .points
            .binary_search_by(|(t, _)| t.total_cmp(&time))
        {
            Ok(idx) => self.points[idx].1 = point,
            Err(idx) => self.points.insert(idx, (time, point)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn first_time(&self) -> Option<f32> {
        self.points.first().map(|(t, _)| *t)
    }

    pub fn last_time(&self) -> Option<f32> {
        self.points.last().map(|(t, _)| *t)
    }

    pub fn period(&self) -> f32 {
        match (self.first_time(), self.last_time()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Time after which playback repeats exactly, `None` if it never does.
    pub fn cycle(&self) -> Option<f32> {
        let period = self.period();
        if period <= 0.0 {
            return None;
        }
        match self.loop_mode {
            LoopMode::Loop => Some(period),
            LoopMode::Swing => Some(2.0 * period),
            LoopMode::NoLooping => None,
        }
    }

    /// Samples the path at `time`, honouring the loop mode.
    pub fn control_point_at(&self, time: f32) -> ControlPoint {
        let (Some((first_time, first)), Some((_, last))) = (self.points.first(), self.points.last())
        else {
            return ControlPoint::default();
        };
        let period = self.period();
        if period <= 0.0 {
            return *first;
        }

        let local = time - first_time;
        let time = match self.loop_mode {
            LoopMode::Swing => {
                let phase = local.rem_euclid(2.0 * period);
                if phase > period {
                    first_time + 2.0 * period - phase
                } else {
                    first_time + phase
                }
            }
            LoopMode::Loop => first_time + local.rem_euclid(period),
            LoopMode::NoLooping => {
                if local <= 0.0 {
                    return *first;
                }
                if local >= period {
                    return *last;
                }
                time
            }
        };

        let upper = self.points.partition_point(|(t, _)| *t <= time);
        if upper == 0 {
            return *first;
        }
        if upper >= self.points.len() {
            return *last;
        }
        let (t0, p0) = &self.points[upper - 1];
        let (t1, p1) = &self.points[upper];
        let span = t1 - t0;
        let ratio = if span > 0.0 { (time - t0) / span } else { 0.0 };
        p0.interpolate(ratio, p1)
    }
}

/// Plays an [`AnimationPath`] around a pivot point.
#[derive(Clone, Debug)]
pub struct PathAnimator {
    pub path: AnimationPath,
    pub pivot: Point3<f32>,
    pub time_offset: f32,
    pub time_multiplier: f32,
    // seconds since start; f64 so that small frame steps still count after hours
    elapsed: f64,
    paused: bool,
}

impl PathAnimator {
    pub fn new(path: AnimationPath, pivot: Point3<f32>) -> Self {
        Self {
            path,
            pivot,
            time_offset: 0.0,
            time_multiplier: 1.0,
            elapsed: 0.0,
            paused: false,
        }
    }

    /// Spins around `axis` through `pivot` at `angular_velocity` per second.
    pub fn spin(pivot: Point3<f32>, axis: Vector3<f32>, angular_velocity: impl Into<Rad<f32>>) -> Self {
        Self::new(AnimationPath::rotation(axis, angular_velocity.into()), pivot)
    }

    pub fn advance(&mut self, dt: f32) {
        if !self.paused {
            self.elapsed += f64::from(dt);
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Rewinds to the start without changing the pause state.
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }

    /// Path time to sample, folded into the first cycle of a repeating path.
    pub fn animation_time(&self) -> f32 {
        let time = (self.elapsed - f64::from(self.time_offset)) * f64::from(self.time_multiplier);
        match (self.path.cycle(), self.path.first_time()) {
            (Some(cycle), Some(first)) => {
                let first = f64::from(first);
                (first + (time - first).rem_euclid(f64::from(cycle))) as f32
            }
            _ => time as f32,
        }
    }

    /// `T(pivot) * M(t) * T(-pivot)`
    pub fn matrix(&self) -> Matrix4<f32> {
        let pivot = Vector3::new(self.pivot.x, self.pivot.y, self.pivot.z);
        let point = self.path.control_point_at(self.animation_time());
        Matrix4::from_translation(pivot) * point.to_matrix() * Matrix4::from_translation(-pivot)
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, EuclideanSpace, Transform};

    use super::*;

    fn assert_point(actual: Point3<f32>, expected: Point3<f32>) {
        assert!(
            (actual - expected).magnitude() < 1e-4,
            "expected {expected:?}, got {actual:?}"
        );
    }

    fn translation_path(mode: LoopMode) -> AnimationPath {
        let mut path = AnimationPath::new(mode);
        path.insert(
            0.0,
            ControlPoint {
                position: Vector3::new(0.0, 0.0, 0.0),
                ..Default::default()
            },
        );
        path.insert(
            2.0,
            ControlPoint {
                position: Vector3::new(10.0, 0.0, 0.0),
                ..Default::default()
            },
        );
        path
    }

    #[test]
    fn rotation_path_has_five_quarter_turns() {
        let path = AnimationPath::rotation(Vector3::unit_z(), Deg(45.0).into());
        assert_eq!(path.len(), 5);
        assert!((path.period() - 8.0).abs() < 1e-4);
        assert_eq!(path.loop_mode, LoopMode::Loop);
    }

    #[test]
    fn insert_keeps_keyframes_sorted_and_unique() {
        let mut path = translation_path(LoopMode::Loop);
        path.insert(1.0, ControlPoint::default());
        path.insert(2.0, ControlPoint::default());
        assert_eq!(path.len(), 3);
        assert_eq!(path.first_time(), Some(0.0));
        assert_eq!(path.last_time(), Some(2.0));
    }

    #[test]
    fn loop_wraps_around() {
        let path = translation_path(LoopMode::Loop);
        assert!((path.control_point_at(0.5).position.x - 2.5).abs() < 1e-4);
        assert!((path.control_point_at(2.5).position.x - 2.5).abs() < 1e-4);
        assert!((path.control_point_at(-1.5).position.x - 2.5).abs() < 1e-4);
    }

    #[test]
    fn swing_plays_backwards_on_odd_periods() {
        let path = translation_path(LoopMode::Swing);
        assert!((path.control_point_at(0.5).position.x - 2.5).abs() < 1e-4);
        assert!((path.control_point_at(3.5).position.x - 2.5).abs() < 1e-4);
        assert!((path.control_point_at(3.0).position.x - 5.0).abs() < 1e-4);
    }

    #[test]
    fn no_looping_clamps_to_the_ends() {
        let path = translation_path(LoopMode::NoLooping);
        assert_eq!(path.control_point_at(-3.0).position.x, 0.0);
        assert_eq!(path.control_point_at(7.0).position.x, 10.0);
        assert!((path.control_point_at(1.0).position.x - 5.0).abs() < 1e-4);
    }

    #[test]
    fn empty_and_single_point_paths_are_static() {
        let empty = AnimationPath::default();
        assert_eq!(empty.control_point_at(3.0), ControlPoint::default());
        let mut single = AnimationPath::new(LoopMode::Loop);
        let point = ControlPoint {
            position: Vector3::new(1.0, 2.0, 3.0),
            ..Default::default()
        };
        single.insert(4.0, point);
        assert_eq!(single.control_point_at(0.0), point);
        assert_eq!(single.control_point_at(100.0), point);
    }

    #[test]
    fn spin_rotates_around_the_pivot() {
        let pivot = Point3::new(1.0, 1.0, 0.0);
        let mut animator = PathAnimator::spin(pivot, Vector3::unit_z(), Deg(45.0));
        // the pivot itself never moves
        animator.advance(1.3);
        assert_point(animator.matrix().transform_point(pivot), pivot);

        animator.reset();
        animator.advance(2.0); // 90 degrees
        let moved = animator.matrix().transform_point(Point3::new(2.0, 1.0, 0.0));
        assert_point(moved, Point3::new(1.0, 2.0, 0.0));

        animator.advance(2.0); // 180 degrees
        let moved = animator.matrix().transform_point(Point3::new(2.0, 1.0, 0.0));
        assert_point(moved, Point3::new(0.0, 1.0, 0.0));

        animator.advance(5.0); // 405 degrees
        let moved = animator.matrix().transform_point(Point3::new(2.0, 1.0, 0.0));
        let expected = 1.0 / 2.0_f32.sqrt();
        assert_point(moved, Point3::new(1.0 + expected, 1.0 + expected, 0.0));
    }

    #[test]
    fn paused_animator_holds_still() {
        let mut animator = PathAnimator::spin(Point3::origin(), Vector3::unit_z(), Deg(45.0));
        animator.advance(1.0);
        let before = animator.matrix();
        assert!(animator.toggle_pause());
        animator.advance(3.0);
        assert_eq!(animator.matrix(), before);
        animator.resume();
        animator.advance(1.0);
        assert_ne!(animator.matrix(), before);
    }

    #[test]
    fn spin_keeps_its_speed_after_a_long_run() {
        let mut animator = PathAnimator::spin(Point3::origin(), Vector3::unit_z(), Deg(45.0));
        // a day and a half at 144 fps, then one more second of frames
        animator.advance(131072.0);
        let before = animator.matrix();
        for _ in 0..144 {
            animator.advance(1.0 / 144.0);
        }
        assert_ne!(animator.matrix(), before);
        assert!(animator.animation_time() < animator.path.period());

        // 131072 s is a whole number of 8 s turns, so one second later is 45 degrees
        let moved = animator.matrix().transform_point(Point3::new(1.0, 0.0, 0.0));
        let expected = 1.0 / 2.0_f32.sqrt();
        assert_point(moved, Point3::new(expected, expected, 0.0));
    }

    #[test]
    fn swing_cycles_are_twice_the_period() {
        assert_eq!(translation_path(LoopMode::Loop).cycle(), Some(2.0));
        assert_eq!(translation_path(LoopMode::Swing).cycle(), Some(4.0));
        assert_eq!(translation_path(LoopMode::NoLooping).cycle(), None);
        assert_eq!(AnimationPath::default().cycle(), None);
    }

    #[test]
    fn zero_velocity_is_identity() {
        let mut animator = PathAnimator::spin(Point3::new(3.0, 0.0, 0.0), Vector3::unit_z(), Rad(0.0));
        animator.advance(10.0);
        let p = Point3::new(5.0, -2.0, 1.0);
        assert_point(animator.matrix().transform_point(p), p);
    }

    #[test]
    fn time_multiplier_speeds_up_playback() {
        let mut animator = PathAnimator::spin(Point3::origin(), Vector3::unit_z(), Deg(45.0));
        animator.time_multiplier = 2.0;
        animator.advance(1.0); // plays as 2s -> 90 degrees
        let moved = animator.matrix().transform_point(Point3::new(1.0, 0.0, 0.0));
        assert_point(moved, Point3::new(0.0, 1.0, 0.0));
    }
}
