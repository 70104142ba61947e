mod lightningcss_minifier;
mod lightningcss_minifier_config;

pub use lightningcss_minifier::*;
pub use lightningcss_minifier_config::*;
