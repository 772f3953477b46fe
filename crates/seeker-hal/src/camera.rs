//! `BlockCamera` trait for blob-detecting cameras.
//!
//! The camera does its own pixel work and reports colour-signature blocks.
//! This crate only consumes that list.

use seeker_types::{Block, SensorError};

/// A camera that reports the blocks it currently sees.
pub trait BlockCamera: Send {
    /// Stable identifier for this camera, e.g. `"pixy"`.
    fn id(&self) -> &str;

    /// Connectivity check.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::DeviceUnreachable`] if the camera does not
    /// answer.
    fn ping(&mut self) -> Result<(), SensorError>;

    /// Replace the contents of `out` with the currently visible blocks.
    ///
    /// An empty `out` is a valid answer (nothing in view).  The buffer is
    /// reused across polls so steady-state polling does not allocate.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::BusFault`] when the frame cannot be read.
    fn read_blocks(&mut self, out: &mut Vec<Block>) -> Result<(), SensorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockCamera {
        id: String,
        frame: Vec<Block>,
    }

    impl BlockCamera for MockCamera {
        fn id(&self) -> &str {
            &self.id
        }

        fn ping(&mut self) -> Result<(), SensorError> {
            Ok(())
        }

        fn read_blocks(&mut self, out: &mut Vec<Block>) -> Result<(), SensorError> {
            out.clear();
            out.extend_from_slice(&self.frame);
            Ok(())
        }
    }

    #[test]
    fn mock_camera_replaces_buffer_contents() {
        let mut cam = MockCamera {
            id: "pixy".to_string(),
            frame: vec![Block::new(1, 10, 20, 5, 5), Block::new(2, 30, 40, 6, 6)],
        };
        assert_eq!(cam.id(), "pixy");
        cam.ping().unwrap();

        let mut buf = vec![Block::BAD; 7];
        cam.read_blocks(&mut buf).unwrap();
        assert_eq!(buf.len(), 2);
        assert_eq!(buf[1].signature, 2);
    }
}
