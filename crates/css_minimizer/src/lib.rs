//! CSS minimizer plugin.
//!
//! Given the assets of a compilation, [`CssMinimizerPlugin::optimize`] selects
//! the CSS assets, looks them up in a two-tier cache, minifies what is missing
//! either inline or on a bounded pool of workers, translates diagnostics back
//! to original sources and commits the results to the asset store.
pub use css_minimizer_core as core;

pub use cache::*;
pub use diagnostics::*;
pub use minify::*;
pub use options::*;
pub use plugin::*;
pub use rules::*;
pub use throttle::*;

pub mod cache;
pub mod diagnostics;
pub mod minify;
pub mod options;
pub mod plugin;
pub mod rules;
pub mod task;
pub mod throttle;
pub mod worker;

#[cfg(test)]
mod test_utils;
