// SPDX-License-Identifier: MIT
//! # lens-scale: Frame Scaling for Document Detection
//!
//! Camera frames are sampled at full sensor resolution, but detection only
//! needs a small copy. This crate computes the downscale plan (longest side
//! clamped to a cap, aspect ratio preserved) and performs the RGBA resize with
//! `fast_image_resize`.
//!
//! ## Key Components
//!
//! - [`presets`]: scale plan computation and the scale factor used to map
//!   detected coordinates back to display space
//! - [`cpu`]: SIMD-accelerated RGBA resize into a caller-provided buffer
//!
//! ## Usage Example
//!
//! ```rust
//! use lens_scale::presets::{build_plan, AspectMode, ScaleTarget, Size};
//!
//! let plan = build_plan(
//!     Size { w: 2000, h: 1000 },
//!     ScaleTarget::MaxLongSide(512),
//!     AspectMode::Preserve,
//! );
//! assert_eq!((plan.out.w, plan.out.h), (512, 256));
//! assert!((plan.factor - 0.256).abs() < 1e-9);
//! ```

pub mod cpu;
pub mod presets;
