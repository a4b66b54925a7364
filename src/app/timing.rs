use std::time::{Duration, Instant};

const FPS_WINDOW: Duration = Duration::from_millis(500);

/// Frame cadence and a rolling fps figure for the window title.
pub struct FrameTiming {
    last_frame_time: Option<Instant>,
    last_fps_time: Instant,
    frame_count: u32,
    pub frame_dt: f32,
    render_ms: f32,
    base_title: String,
}

impl FrameTiming {
    pub fn new(base_title: String, now: Instant) -> Self {
        Self {
            last_frame_time: None,
            last_fps_time: now,
            frame_count: 0,
            frame_dt: 1.0 / 60.0,
            render_ms: 0.0,
            base_title,
        }
    }

    pub fn set_render_ms(&mut self, render_ms: f32) {
        self.render_ms = render_ms;
    }

    /// Records a frame. Returns a new title whenever the fps window closes.
    pub fn update(&mut self, now: Instant) -> Option<String> {
        let dt = match self.last_frame_time {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::from_millis(16),
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt.as_secs_f32();

        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.last_fps_time);
        if elapsed < FPS_WINDOW {
            return None;
        }
        let fps = self.frame_count as f32 / elapsed.as_secs_f32();
        self.frame_count = 0;
        self.last_fps_time = now;
        Some(format!(
            "{} - {:.1} fps (render {:.2} ms)",
            self.base_title, fps, self.render_ms
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_updates_once_per_window() {
        let start = Instant::now();
        let mut timing = FrameTiming::new("hangar".to_string(), start);
        assert_eq!(timing.update(start + Duration::from_millis(100)), None);
        assert!((timing.frame_dt - 0.016).abs() < 1e-6);

        let title = timing.update(start + Duration::from_millis(500)).unwrap();
        assert!(title.starts_with("hangar - 4.0 fps"));
        assert!((timing.frame_dt - 0.4).abs() < 1e-4);
        assert_eq!(timing.update(start + Duration::from_millis(600)), None);
    }
}
