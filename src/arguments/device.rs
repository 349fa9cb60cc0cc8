//! Capture device inputs.

use super::Argument;

/// An input device such as `/dev/video0` or `video="Integrated Camera"`.
///
/// Device selection options (`-f v4l2`, `-f dshow`) go in a preceding
/// [`CustomArgument`](super::CustomArgument).
#[derive(Debug, Clone)]
pub struct InputDevice {
    device: String,
}

impl InputDevice {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

impl Argument for InputDevice {
    fn text(&self) -> String {
        format!("-i {}", self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProcessContext;
    use ffpipe_core::FfOptions;

    #[tokio::test]
    async fn renders_and_has_no_side_effects() {
        let mut device = InputDevice::new("/dev/video0");
        assert_eq!(device.text(), "-i /dev/video0");
        device.pre(&FfOptions::default()).unwrap();
        device.during(&ProcessContext::new()).await.unwrap();
        device.post();
    }
}
