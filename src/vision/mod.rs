//! Vision Layer
//!
//! Locates plate-shaped regions in output frames and prepares the chosen
//! region for recognition:
//! - `edges`: Canny on the raw Sobel gradient
//! - `detection`: edges and contours to candidate rectangles
//! - `selection`: shape filter and best-candidate choice
//! - `encode`: crop, trim and JPEG serialization

pub mod detection;
pub mod edges;
pub mod encode;
pub mod geometry;
pub mod selection;

pub use detection::{CandidateSet, RegionDetector};
pub use encode::{CaptureEncoder, CapturePayload};
pub use geometry::{Rect, SearchWindow};
pub use selection::CandidateSelector;
