//! Label overlay.
//!
//! `compose` turns a frame and its labels into an annotated image. It is a
//! pure function of its inputs: the same frame and labels always produce the
//! same pixels. The [`Renderer`] pairs composition with a display surface and
//! the exit check.

mod glyphs;

use image::{Rgb, RgbImage};

use crate::display::{DisplayError, DisplaySurface, ExitSignal};
use crate::frame::Frame;
use crate::labels::{Label, LabelResult};

use glyphs::{glyph, text_width, GLYPH_ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};

pub const TEXT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const BACKGROUND_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

const TEXT_SCALE: u32 = 2;
const MARGIN: i32 = 5;
const FIRST_LINE_Y: i32 = 10;
const LINE_GAP: i32 = 6;
const BOX_THICKNESS: i32 = 2;

/// Pixel rectangle, inclusive of `left`/`top`, exclusive of `right`/`bottom`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// One drawn label: its caption in the stacked list plus any instance boxes.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub name: String,
    pub caption: String,
    /// Top-left corner of the caption text.
    pub anchor: (i32, i32),
    pub boxes: Vec<PixelRect>,
}

pub struct Composition {
    pub image: RgbImage,
    pub annotations: Vec<Annotation>,
}

/// Place each label: captions stacked from the top-left corner, boxes scaled
/// from normalized coordinates to the frame size.
pub fn layout(labels: &LabelResult, width: u32, height: u32) -> Vec<Annotation> {
    let line_height = (GLYPH_HEIGHT * TEXT_SCALE) as i32;
    let mut y = FIRST_LINE_Y;
    labels
        .iter()
        .map(|label| {
            let annotation = Annotation {
                name: label.name.clone(),
                caption: label.caption(),
                anchor: (MARGIN * 2, y),
                boxes: instance_boxes(label, width, height),
            };
            y += line_height + 2 * MARGIN + LINE_GAP;
            annotation
        })
        .collect()
}

fn instance_boxes(label: &Label, width: u32, height: u32) -> Vec<PixelRect> {
    let w = width as f32;
    let h = height as f32;
    label
        .instances
        .iter()
        .map(|b| PixelRect {
            left: (b.left * w).round() as i32,
            top: (b.top * h).round() as i32,
            right: ((b.left + b.width) * w).round() as i32,
            bottom: ((b.top + b.height) * h).round() as i32,
        })
        .filter(|r| r.right > r.left && r.bottom > r.top)
        .collect()
}

/// Draw `labels` onto a copy of `frame`.
pub fn compose(frame: &Frame, labels: &LabelResult) -> Composition {
    let mut image = frame.to_image();
    let annotations = layout(labels, frame.width(), frame.height());

    // Boxes first so captions stay readable on top of them.
    for annotation in &annotations {
        for rect in &annotation.boxes {
            draw_outline(&mut image, *rect, BOX_COLOR);
            draw_caption(
                &mut image,
                &annotation.name,
                rect.left + MARGIN,
                rect.top + MARGIN,
            );
        }
    }
    for annotation in &annotations {
        let (x, y) = annotation.anchor;
        draw_caption(&mut image, &annotation.caption, x, y);
    }

    Composition { image, annotations }
}

fn draw_caption(image: &mut RgbImage, text: &str, x: i32, y: i32) {
    let w = text_width(text, TEXT_SCALE) as i32;
    let h = (GLYPH_HEIGHT * TEXT_SCALE) as i32;
    fill_rect(
        image,
        PixelRect {
            left: x - MARGIN,
            top: y - MARGIN,
            right: x + w + MARGIN,
            bottom: y + h + MARGIN,
        },
        BACKGROUND_COLOR,
    );
    draw_text(image, text, x, y, TEXT_COLOR);
}

fn put_pixel(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

fn fill_rect(image: &mut RgbImage, rect: PixelRect, color: Rgb<u8>) {
    let left = rect.left.max(0);
    let top = rect.top.max(0);
    let right = rect.right.min(image.width() as i32);
    let bottom = rect.bottom.min(image.height() as i32);
    for y in top..bottom {
        for x in left..right {
            image.put_pixel(x as u32, y as u32, color);
        }
    }
}

fn draw_outline(image: &mut RgbImage, rect: PixelRect, color: Rgb<u8>) {
    let t = BOX_THICKNESS;
    let PixelRect {
        left,
        top,
        right,
        bottom,
    } = rect;
    for (l, tp, r, b) in [
        (left, top, right, top + t),
        (left, bottom - t, right, bottom),
        (left, top, left + t, bottom),
        (right - t, top, right, bottom),
    ] {
        fill_rect(
            image,
            PixelRect {
                left: l,
                top: tp,
                right: r,
                bottom: b,
            },
            color,
        );
    }
}

fn draw_text(image: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>) {
    let scale = TEXT_SCALE as i32;
    let mut cursor = x;
    for ch in text.chars() {
        for (row, bits) in glyph(ch).into_iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                    continue;
                }
                let px = cursor + col as i32 * scale;
                let py = y + row as i32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        put_pixel(image, px + dx, py + dy, color);
                    }
                }
            }
        }
        cursor += (GLYPH_ADVANCE * TEXT_SCALE) as i32;
    }
}

/// Draws label overlays and presents them on a display surface.
pub struct Renderer<D> {
    surface: D,
    exit: ExitSignal,
    presented: u64,
}

impl<D: DisplaySurface> Renderer<D> {
    pub fn new(surface: D, exit: ExitSignal) -> Self {
        Self {
            surface,
            exit,
            presented: 0,
        }
    }

    /// Compose and present one frame. Returns the number of labels drawn.
    pub fn render(&mut self, frame: &Frame, labels: &LabelResult) -> Result<usize, DisplayError> {
        let composition = compose(frame, labels);
        self.surface.present(&composition)?;
        self.presented += 1;
        log::debug!(
            "Frame {} displayed with {} labels.",
            frame.sequence(),
            composition.annotations.len()
        );
        Ok(composition.annotations.len())
    }

    /// True once the user asked to stop (exit key, window closed, Ctrl-C).
    pub fn poll_exit(&mut self) -> bool {
        self.exit.is_triggered() || self.surface.exit_requested()
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented
    }

    pub fn surface(&self) -> &D {
        &self.surface
    }

    /// Close the display surface.
    pub fn release(&mut self) {
        self.surface.close();
    }
}
