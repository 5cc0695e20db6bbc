/// Square input the detector is exported with.
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (640, 640);

/// Longest side, in pixels, an uploaded image is allowed to keep before inference.
pub const DEFAULT_MAX_DIMENSION: u32 = 1920;
