use xxhash_rust::xxh3::xxh3_64;

/// Hashes used for cache identities.
///
/// They don't need to be cryptographically strong, but they should be stable
/// across runs, machines, platforms and versions since they are written to
/// disk as persistent cache keys.
pub fn hash_string(s: &str) -> String {
  hash_bytes(s.as_bytes())
}

pub fn hash_bytes(s: &[u8]) -> String {
  let res = xxh3_64(s);
  format!("{:016x}", res)
}
