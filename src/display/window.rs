use minifb::{Key, KeyRepeat, Window, WindowOptions};

use super::{DisplayError, DisplaySurface};
use crate::overlay::Composition;

/// Desktop window backed by minifb.
///
/// The window is created on the first frame so it can take the frame's size.
/// `q`, Escape, or closing the window requests exit.
pub struct WindowDisplay {
    title: String,
    window: Option<Window>,
    size: (usize, usize),
    buffer: Vec<u32>,
    closed_by_user: bool,
}

impl WindowDisplay {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            window: None,
            size: (0, 0),
            buffer: Vec::new(),
            closed_by_user: false,
        }
    }

    fn window_for(&mut self, width: usize, height: usize) -> Result<&mut Window, DisplayError> {
        if self.size != (width, height) {
            if self.window.take().is_some() {
                log::warn!(
                    "Frame size changed from {}x{} to {}x{}; reopening window.",
                    self.size.0,
                    self.size.1,
                    width,
                    height
                );
            }
            let window = Window::new(&self.title, width, height, WindowOptions::default())
                .map_err(|e| DisplayError::Open(e.to_string()))?;
            log::info!("Opened window '{}' ({}x{}).", self.title, width, height);
            self.window = Some(window);
            self.size = (width, height);
        }
        self.window
            .as_mut()
            .ok_or_else(|| DisplayError::Open("window is not available".to_string()))
    }
}

/// Pack RGB bytes into minifb's `0RGB` pixels.
fn rgb_to_argb(rgb: &[u8], out: &mut Vec<u32>) {
    out.clear();
    out.extend(
        rgb.chunks_exact(3)
            .map(|p| (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2])),
    );
}

impl DisplaySurface for WindowDisplay {
    fn present(&mut self, composition: &Composition) -> Result<(), DisplayError> {
        let width = composition.image.width() as usize;
        let height = composition.image.height() as usize;
        let mut buffer = std::mem::take(&mut self.buffer);
        rgb_to_argb(composition.image.as_raw(), &mut buffer);
        let result = self.window_for(width, height).and_then(|window| {
            window
                .update_with_buffer(&buffer, width, height)
                .map_err(|e| DisplayError::Update(e.to_string()))
        });
        self.buffer = buffer;
        result
    }

    fn exit_requested(&mut self) -> bool {
        let Some(window) = self.window.as_ref() else {
            return self.closed_by_user;
        };
        if !window.is_open() {
            self.closed_by_user = true;
        }
        self.closed_by_user
            || window.is_key_pressed(Key::Q, KeyRepeat::No)
            || window.is_key_down(Key::Escape)
    }

    fn close(&mut self) {
        if self.window.take().is_some() {
            log::info!("Destroying windows...");
        }
    }
}
