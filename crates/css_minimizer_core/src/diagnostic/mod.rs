mod diagnostic;
mod diagnostics;

pub use self::diagnostic::*;
pub use self::diagnostics::*;
