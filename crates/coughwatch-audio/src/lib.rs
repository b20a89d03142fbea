pub mod capture;
pub mod frame_reader;
pub mod handoff;
pub mod session_ring;

pub use capture::{AudioCaptureThread, DeviceConfig};
pub use frame_reader::{AudioFrame, FrameReader};
pub use handoff::HandoffRing;
pub use session_ring::{LinearizedClip, SessionRing};
