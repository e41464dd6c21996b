//! Fixed MD5 digest used for chunk integrity.
//!
//! MD5 is used for integrity only, not security (see design notes). A future
//! revision replacing it would change the on-disk format, so the algorithm
//! is not made pluggable here.

/// Number of hex characters in a rendered digest (32 for 128-bit MD5).
pub const DIGEST_HEX_LEN: usize = 32;

/// Compute the lowercase hex MD5 digest of `data`.
pub fn hex_digest(data: &[u8]) -> String {
    hex::encode(md5::compute(data).0)
}
