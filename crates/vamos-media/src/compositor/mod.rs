//! Frame compositor.
//!
//! Turns a detection into a soft-edged mask and alpha-blends a blurred
//! version of the frame through it:
//!
//! ```text
//! detection -> region box -> mask -> feathered alpha
//!                                         |
//! frame -> region of interest -> blur ---> out = a*blurred + (1-a)*orig
//! ```

mod alpha;
mod blur;
mod mask;
mod policy;

pub use alpha::{build_alpha_from_mask, AlphaMask};
pub use blur::{adaptive_kernel_size, apply_blur, blur_region};
pub use mask::{expand_box, mask_from_region, RegionShape};
pub use policy::RedactionPolicy;

/// Fraction of the shorter region side used as blur kernel.
pub const KERNEL_FRACTION: f64 = 0.15;
/// Smallest blur kernel.
pub const MIN_KERNEL: u32 = 9;
/// Largest blur kernel.
pub const MAX_KERNEL: u32 = 91;
