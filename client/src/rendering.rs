use crate::game::BouncingSquare;
use macroquad::prelude::*;
use shared::SQUARE_SIZE;

pub struct Renderer {
    server: String,
}

impl Renderer {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
        }
    }

    pub fn render(&self, square: &BouncingSquare, connected: bool) {
        clear_background(BLACK);

        self.draw_square(square);
        self.draw_status(square, connected);
    }

    fn draw_square(&self, square: &BouncingSquare) {
        let color = Color::from_rgba(
            channel(square.color.r),
            channel(square.color.g),
            channel(square.color.b),
            255,
        );
        draw_rectangle(square.x, square.y, SQUARE_SIZE, SQUARE_SIZE, color);
    }

    fn draw_status(&self, square: &BouncingSquare, connected: bool) {
        let (indicator, label) = if connected {
            (GREEN, format!("connected to {}", self.server))
        } else {
            (RED, "disconnected".to_string())
        };

        draw_rectangle(10.0, 10.0, 8.0, 8.0, indicator);
        draw_text(&label, 24.0, 18.0, 16.0, WHITE);

        let motion = format!(
            "x {:.1}  y {:.1}  v {:.2}  dir {:.1}",
            square.x, square.y, square.velocity, square.direction
        );
        draw_text(&motion, 10.0, 36.0, 16.0, GRAY);
    }
}

fn channel(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}
