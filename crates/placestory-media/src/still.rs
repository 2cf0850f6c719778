use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use placestory_shared::constants::PHOTO_JPEG_QUALITY;
use placestory_shared::MediaBlob;
use tracing::debug;

use crate::capture::LiveStream;
use crate::recorder::RecorderError;

/// Raw video frame, packed RGB8.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub timestamp_ms: u64,
}

impl VideoFrame {
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Encode a frame as JPEG at the given quality (1-100).
pub fn encode_jpeg(frame: &VideoFrame, quality: u8) -> Result<Bytes, RecorderError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(RecorderError::CaptureEmpty);
    }
    if frame.data.len() != frame.expected_len() {
        return Err(RecorderError::Still(format!(
            "frame is {} bytes, expected {} for {}x{}",
            frame.data.len(),
            frame.expected_len(),
            frame.width,
            frame.height
        )));
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode(&frame.data, frame.width, frame.height, ExtendedColorType::Rgb8)
        .map_err(|e| RecorderError::Still(e.to_string()))?;

    Ok(Bytes::from(out))
}

/// Single-shot photo: grab the current frame of `stream` and encode it.
pub fn capture_still(stream: &dyn LiveStream) -> Result<MediaBlob, RecorderError> {
    let frame = stream.grab_frame()?;
    let jpeg = encode_jpeg(&frame, PHOTO_JPEG_QUALITY)?;
    if jpeg.is_empty() {
        return Err(RecorderError::CaptureEmpty);
    }

    debug!(
        width = frame.width,
        height = frame.height,
        bytes = jpeg.len(),
        "Still frame captured"
    );
    Ok(MediaBlob::captured_photo(jpeg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tests::FakeStream;
    use placestory_shared::MediaKind;

    fn grey_frame(width: u32, height: u32) -> VideoFrame {
        VideoFrame {
            width,
            height,
            data: vec![100; (width * height * 3) as usize],
            timestamp_ms: 0,
        }
    }

    #[test]
    fn test_encode_jpeg_magic() {
        let jpeg = encode_jpeg(&grey_frame(8, 8), 90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_encode_rejects_bad_dimensions() {
        assert!(matches!(
            encode_jpeg(&grey_frame(0, 4), 90),
            Err(RecorderError::CaptureEmpty)
        ));

        let mut frame = grey_frame(4, 4);
        frame.data.truncate(10);
        assert!(matches!(encode_jpeg(&frame, 90), Err(RecorderError::Still(_))));
    }

    #[test]
    fn test_capture_still_produces_photo_blob() {
        let stream = FakeStream::standalone(false);
        let blob = capture_still(stream.as_ref()).unwrap();
        assert_eq!(blob.kind, MediaKind::Image);
        assert_eq!(blob.content_type, "image/jpeg");
        assert_eq!(blob.file_name, "story.jpg");
        assert!(!blob.is_empty());
    }
}
