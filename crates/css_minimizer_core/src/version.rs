/// Version of the minimizer crates, part of every persistent cache identity so
/// that upgrading the tool invalidates previously cached output.
pub fn css_minimizer_version() -> &'static str {
  env!("CARGO_PKG_VERSION")
}
