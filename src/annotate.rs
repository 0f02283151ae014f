use ab_glyph::{FontArc, InvalidFont, PxScale};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageResult, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::model::{BoundingBox, LabeledDetection};

const BOX_THICKNESS: u32 = 2;
const LABEL_SCALE: PxScale = PxScale { x: 16.0, y: 16.0 };
const LABEL_PADDING: u32 = 3;
const JPEG_QUALITY: u8 = 90;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

static LABEL_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

const PALETTE: [Rgb<u8>; 6] = [
    Rgb([230, 57, 70]),
    Rgb([29, 53, 87]),
    Rgb([42, 157, 143]),
    Rgb([244, 162, 97]),
    Rgb([131, 56, 236]),
    Rgb([255, 190, 11]),
];

pub fn class_color(class_id: u32) -> Rgb<u8> {
    PALETTE[class_id as usize % PALETTE.len()]
}

/// Renders detection boxes and their labels.
#[derive(Clone)]
pub struct Annotator {
    font: FontArc,
}

impl Annotator {
    /// Loads the label font compiled into the binary.
    pub fn bundled() -> Result<Self, InvalidFont> {
        Ok(Annotator {
            font: FontArc::try_from_slice(LABEL_FONT)?,
        })
    }

    /// Draws one box and one label per detection onto a copy of `image`.
    pub fn annotate(&self, image: &DynamicImage, detections: &[LabeledDetection]) -> RgbImage {
        let mut canvas = image.to_rgb8();

        for labeled in detections {
            let color = class_color(labeled.detection.class_id);
            let Some(rect) = clamp_box(&labeled.detection.bbox, canvas.width(), canvas.height())
            else {
                continue;
            };
            draw_box(&mut canvas, rect, color);
            self.draw_label(&mut canvas, rect, &labeled.label, color);
        }

        canvas
    }

    fn band_size(&self, text: &str) -> (u32, u32) {
        let (width, height) = text_size(LABEL_SCALE, &self.font, text);
        (width + 2 * LABEL_PADDING, height + 2 * LABEL_PADDING)
    }

    fn draw_label(&self, canvas: &mut RgbImage, rect: Rect, text: &str, color: Rgb<u8>) {
        let (band_width, band_height) = self.band_size(text);

        // Above the box when it fits, otherwise tucked inside its top edge.
        let top = if rect.top() >= band_height as i32 {
            rect.top() - band_height as i32
        } else {
            rect.top()
        };

        draw_filled_rect_mut(
            canvas,
            Rect::at(rect.left(), top).of_size(band_width, band_height),
            color,
        );
        draw_text_mut(
            canvas,
            TEXT_COLOR,
            rect.left() + LABEL_PADDING as i32,
            top + LABEL_PADDING as i32,
            LABEL_SCALE,
            &self.font,
            text,
        );
    }
}

pub fn encode_jpeg(image: &RgbImage) -> ImageResult<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY))?;
    Ok(buffer)
}

/// Rounds the box to pixels, orders its corners and keeps it on the canvas.
fn clamp_box(bbox: &BoundingBox, width: u32, height: u32) -> Option<Rect> {
    if width == 0 || height == 0 {
        return None;
    }
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    let clamp_x = |v: f32| v.round().clamp(0.0, max_x) as i32;
    let clamp_y = |v: f32| v.round().clamp(0.0, max_y) as i32;

    let (x1, x2) = (clamp_x(bbox.x1), clamp_x(bbox.x2));
    let (y1, y2) = (clamp_y(bbox.y1), clamp_y(bbox.y2));
    let (left, right) = (x1.min(x2), x1.max(x2));
    let (top, bottom) = (y1.min(y2), y1.max(y2));

    Some(Rect::at(left, top).of_size((right - left) as u32 + 1, (bottom - top) as u32 + 1))
}

fn draw_box(canvas: &mut RgbImage, rect: Rect, color: Rgb<u8>) {
    for inset in 0..BOX_THICKNESS {
        if rect.width() <= 2 * inset || rect.height() <= 2 * inset {
            break;
        }
        let ring = Rect::at(rect.left() + inset as i32, rect.top() + inset as i32)
            .of_size(rect.width() - 2 * inset, rect.height() - 2 * inset);
        draw_hollow_rect_mut(canvas, ring, color);
    }
}
