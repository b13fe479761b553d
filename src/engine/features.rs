//! Engine build selection.
//!
//! The vision module ships in several builds; which one can run depends on
//! what the host supports. Without thread support nothing can run at all.

use std::fmt;

/// Host capabilities relevant to the vision module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineFeatures {
    pub simd: bool,
    pub threads: bool,
}

/// Build of the vision module to load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleVariant {
    NonSimd,
    /// SIMD build with the WebKit-compatible inference backend.
    TfSimd,
    Simd,
}

impl ModuleVariant {
    /// Directory the build is served from.
    pub fn dir(&self) -> &'static str {
        match self {
            ModuleVariant::NonSimd => "nonsimd",
            ModuleVariant::TfSimd => "tfsimd",
            ModuleVariant::Simd => "simd",
        }
    }
}

impl fmt::Display for ModuleVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir())
    }
}

impl EngineFeatures {
    /// Pick the build for these features and user agent, or `None` when the
    /// host cannot run the engine.
    pub fn select_variant(&self, user_agent: &str) -> Option<ModuleVariant> {
        if !self.threads {
            return None;
        }
        Some(if !self.simd {
            ModuleVariant::NonSimd
        } else if user_agent.contains("AppleWebKit") {
            ModuleVariant::TfSimd
        } else {
            ModuleVariant::Simd
        })
    }
}
