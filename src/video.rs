// video.rs - Camera frames to a multipart/x-mixed-replace stream
//
// The feed never touches the console lock; drive commands and video share nothing.
use futures_util::Stream;
use futures_util::stream;
use std::path::PathBuf;
use std::time::Duration;

pub const BOUNDARY: &str = "frame";
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Yields encoded JPEG frames. `None` ends the feed.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Vec<u8>>;
}

/// Re-reads a JPEG that an external capture process keeps overwriting.
pub struct JpegFileSource {
    path: PathBuf,
    last_good: Option<Vec<u8>>,
}

impl JpegFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_good: None,
        }
    }
}

fn is_complete_jpeg(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0xFF, 0xD8]) && bytes.ends_with(&[0xFF, 0xD9])
}

impl FrameSource for JpegFileSource {
    fn next_frame(&mut self) -> Option<Vec<u8>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Camera frame {} unreadable: {}", self.path.display(), e);
                return None;
            }
        };
        if is_complete_jpeg(&bytes) {
            self.last_good = Some(bytes.clone());
            return Some(bytes);
        }
        // caught the writer mid-frame, repeat the previous one
        self.last_good.clone()
    }
}

/// One part of the multipart body.
pub fn mjpeg_part(frame: &[u8]) -> Vec<u8> {
    let header = format!("--{BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n");
    let mut part = Vec::with_capacity(header.len() + frame.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(frame);
    part.extend_from_slice(b"\r\n");
    part
}

pub type BoxedSource = Box<dyn FrameSource + Send>;

/// Multipart parts, one per `interval`, until the source runs dry.
pub fn mjpeg_stream(
    source: BoxedSource,
    interval: Duration,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send {
    stream::unfold((source, true), move |(mut source, first)| async move {
        if !first {
            tokio::time::sleep(interval).await;
        }
        // file reads block
        let (source, frame) = tokio::task::spawn_blocking(move || {
            let frame = source.next_frame();
            (source, frame)
        })
        .await
        .ok()?;
        let frame = frame?;
        Some((Ok(mjpeg_part(&frame)), (source, false)))
    })
}
