//! Payload decoder: QR payload strings visible in a frame.

use super::capture::Frame;

/// Capability: decode every readable code payload in a frame.
///
/// Pure function of the frame; returns an empty vector when nothing decodes.
#[cfg_attr(test, mockall::automock)]
pub trait PayloadDecoder: Send + Sync {
    fn decode(&self, frame: &Frame) -> Vec<String>;
}

/// QR decoder backed by `rqrr`.
///
/// Payloads come back in reading order: the code whose top edge is highest first,
/// ties broken left to right.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoder;

impl QrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl PayloadDecoder for QrDecoder {
    fn decode(&self, frame: &Frame) -> Vec<String> {
        let gray = frame.as_gray();
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            gray.width() as usize,
            gray.height() as usize,
            |x, y| gray.get_pixel(x as u32, y as u32).0[0],
        );

        let mut grids = prepared.detect_grids();
        grids.sort_by_key(|grid| top_left(&grid.bounds));

        grids
            .into_iter()
            .filter_map(|grid| match grid.decode() {
                Ok((_meta, content)) => Some(content),
                Err(e) => {
                    tracing::trace!("QR grid failed to decode: {:?}", e);
                    None
                }
            })
            .collect()
    }
}

fn top_left(bounds: &[rqrr::Point; 4]) -> (i32, i32) {
    let top = bounds.iter().map(|p| p.y).min().unwrap_or_default();
    let left = bounds.iter().map(|p| p.x).min().unwrap_or_default();
    (top, left)
}
