mod asset;
mod compilation;
mod json;
mod minifier;

pub use self::asset::*;
pub use self::compilation::*;
pub use self::json::*;
pub use self::minifier::*;
