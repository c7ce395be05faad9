use serde::Serialize;

/// Which content detectors loaded at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub face_detection: bool,
    pub pose_detection: bool,
}

impl Capabilities {
    pub fn any(&self) -> bool {
        self.face_detection || self.pose_detection
    }
}
