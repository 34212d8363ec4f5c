// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! QR decoding of captured frames.

use super::camera::FrameBuffer;

/// Decodes a visual code from a frame. One call per frame; calls never
/// overlap.
pub trait QrDecoder {
    /// Return the payload of the first code found, if any.
    fn decode(&mut self, frame: &FrameBuffer) -> Option<String>;
}

/// [`QrDecoder`] backed by `rqrr`.
///
/// Frames are converted to greyscale without inversion; light-on-dark codes
/// are not attempted.
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrDecoder;

impl QrDecoder for RqrrDecoder {
    fn decode(&mut self, frame: &FrameBuffer) -> Option<String> {
        let width = frame.width as usize;
        let height = frame.height as usize;
        if frame.is_empty() || frame.rgba.len() < width * height * 4 {
            return None;
        }

        let rgba = &frame.rgba;
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            let i = (y * width + x) * 4;
            luma(rgba[i], rgba[i + 1], rgba[i + 2])
        });

        prepared
            .detect_grids()
            .into_iter()
            .find_map(|grid| match grid.decode() {
                Ok((_meta, content)) => Some(content),
                Err(e) => {
                    tracing::trace!(error = ?e, "QR grid found but not decodable");
                    None
                }
            })
    }
}

/// ITU-R BT.601 luma, integer approximation.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114) / 1000) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::matches_token;
    use qrcode::{Color, QrCode};

    /// Render `payload` as a dark-on-light code, `scale` pixels per module,
    /// with a four-module quiet zone, tinted so the greyscale path matters.
    fn render(payload: &str, scale: usize) -> FrameBuffer {
        let code = QrCode::new(payload.as_bytes()).unwrap();
        let modules = code.width();
        let colors = code.to_colors();
        let side = (modules + 8) * scale;

        let mut frame = FrameBuffer::default();
        frame.resize(side as u32, side as u32);
        for y in 0..side {
            for x in 0..side {
                let (mx, my) = ((x / scale) as isize - 4, (y / scale) as isize - 4);
                let dark = (0..modules as isize).contains(&mx)
                    && (0..modules as isize).contains(&my)
                    && colors[my as usize * modules + mx as usize] == Color::Dark;
                let px: [u8; 4] = if dark {
                    [20, 30, 60, 255]
                } else {
                    [240, 235, 210, 255]
                };
                let i = (y * side + x) * 4;
                frame.rgba[i..i + 4].copy_from_slice(&px);
            }
        }
        frame
    }

    #[test]
    fn decodes_rendered_charger_code() {
        let frame = render("InfiSpark", 6);

        let payload = RqrrDecoder.decode(&frame).unwrap();

        assert_eq!(payload, "InfiSpark");
        assert!(matches_token(&payload, "infispark"));
    }

    #[test]
    fn decodes_other_codes_verbatim() {
        let frame = render("https://example.com/some-other-code", 4);

        let payload = RqrrDecoder.decode(&frame).unwrap();

        assert_eq!(payload, "https://example.com/some-other-code");
        assert!(!matches_token(&payload, "infispark"));
    }

    #[test]
    fn luma_extremes() {
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 255, 255), 255);
    }

    #[test]
    fn empty_or_truncated_frames_decode_to_nothing() {
        let mut decoder = RqrrDecoder;
        assert_eq!(decoder.decode(&FrameBuffer::default()), None);

        let truncated = FrameBuffer {
            width: 10,
            height: 10,
            rgba: vec![0; 12],
        };
        assert_eq!(decoder.decode(&truncated), None);
    }

    #[test]
    fn blank_frame_has_no_code() {
        let mut frame = FrameBuffer::default();
        frame.resize(64, 48);
        frame.rgba.fill(255);
        assert_eq!(RqrrDecoder.decode(&frame), None);
    }
}
