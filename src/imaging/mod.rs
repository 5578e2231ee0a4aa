//! Image processing: crop selection and JPEG rendering.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Attention crop** | ImageMagick `convert` via the command runner |
//! | **Entropy crop** | grid search over a decoded `RgbImage` |
//! | **Render → JPEG** | `crop_imm` + CatmullRom `resize_exact` + `JpegEncoder` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for crop and fit geometry (unit testable)
//! - **Parameters**: Data structures describing crops and quality
//! - **Entropy**: The scoring grid search
//! - **Crop**: [`CropStrategy`] implementations and the [`CropChain`]
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
pub mod crop;
pub mod entropy;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, RenderParams};
pub use calculations::{center_crop, crop_dimensions, fit_within};
pub use crop::{CropChain, CropError, CropJob, CropPlan, CropStrategy};
pub use params::{CropRect, CropResult, Quality};
pub use rust_backend::RustBackend;
