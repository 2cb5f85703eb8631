//! Local simulation of the bouncing square and the state reports sent for it

use rand::Rng;
use shared::{ClientMessage, Color, StatePatch, StateRecord, SQUARE_SIZE, WORLD_HEIGHT, WORLD_WIDTH};
use std::time::{Duration, Instant};

pub const START_VELOCITY: f32 = 3.0 * std::f32::consts::SQRT_2;
pub const START_DIRECTION: f32 = 5.0;
pub const START_COLOR: Color = Color { r: 255, g: 0, b: 0 };
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(2);

/// A square moving at constant speed that bounces off the world edges.
/// `direction` is in degrees, normalized to `[0, 360)` after every step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BouncingSquare {
    pub x: f32,
    pub y: f32,
    pub velocity: f32,
    pub direction: f32,
    pub color: Color,
}

impl BouncingSquare {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            velocity: START_VELOCITY,
            direction: START_DIRECTION,
            color: START_COLOR,
        }
    }

    /// Places the square at a random position fully inside the world
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let x = rng.gen_range(0.0..=WORLD_WIDTH - SQUARE_SIZE);
        let y = rng.gen_range(0.0..=WORLD_HEIGHT - SQUARE_SIZE);
        Self::new(x.floor(), y.floor())
    }

    /// Advances one frame
    pub fn step(&mut self) {
        let rad = self.direction.to_radians();
        self.x += self.velocity * rad.cos();
        self.y += self.velocity * rad.sin();

        if self.x <= 0.0 || self.x + SQUARE_SIZE >= WORLD_WIDTH {
            self.direction = 180.0 - self.direction;
        }
        if self.y <= 0.0 || self.y + SQUARE_SIZE >= WORLD_HEIGHT {
            self.direction = -self.direction;
        }
        self.direction = self.direction.rem_euclid(360.0);
    }

    /// Overrides local fields with the ones the operator pushed
    pub fn apply_authoritative(&mut self, patch: &StatePatch) {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(velocity) = patch.velocity {
            self.velocity = velocity;
        }
        if let Some(direction) = patch.direction {
            self.direction = direction;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
    }

    /// The state as reported to the server, rounded to two decimals
    pub fn to_record(&self) -> StateRecord {
        StateRecord {
            x: round2(self.x),
            y: round2(self.y),
            velocity: round2(self.velocity),
            direction: round2(self.direction),
            color: self.color,
        }
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Decides what to tell the server each frame: a `delta` with only the
/// fields that changed since they were last sent, plus a full `snapshot`
/// every [`SNAPSHOT_INTERVAL`].
#[derive(Debug)]
pub struct StateReporter {
    last_sent: StatePatch,
    last_snapshot: Instant,
}

impl StateReporter {
    pub fn new(now: Instant) -> Self {
        Self {
            last_sent: StatePatch::default(),
            last_snapshot: now,
        }
    }

    pub fn report(&mut self, record: &StateRecord, now: Instant) -> Vec<ClientMessage> {
        let mut messages = Vec::new();

        let current = StatePatch::full(record);
        let delta = StatePatch {
            x: changed(self.last_sent.x, current.x),
            y: changed(self.last_sent.y, current.y),
            velocity: changed(self.last_sent.velocity, current.velocity),
            direction: changed(self.last_sent.direction, current.direction),
            color: changed(self.last_sent.color, current.color),
        };

        if !delta.is_empty() {
            self.last_sent = current;
            messages.push(ClientMessage::Delta(delta));
        }

        if now.duration_since(self.last_snapshot) >= SNAPSHOT_INTERVAL {
            self.last_snapshot = now;
            messages.push(ClientMessage::Snapshot(current));
        }

        messages
    }
}

fn changed<T: PartialEq>(previous: Option<T>, current: Option<T>) -> Option<T> {
    if previous == current {
        None
    } else {
        current
    }
}
