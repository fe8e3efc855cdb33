//!
//! Size conversions. Collected values arrive in whatever unit the source
//! speaks (bytes from ZFS, KiB from `/proc/meminfo`, MiB from the SAN MIB);
//! records always carry GiB.
//!

/// KiB to GiB, truncated to whole GiB.
#[must_use]
pub fn kib_to_gib(value: f64) -> i64 {
    (value / 1024.0 / 1024.0) as i64
}

/// Bytes to GiB, truncated to whole GiB.
#[must_use]
pub fn bytes_to_gib(value: f64) -> i64 {
    (value / 1024.0 / 1024.0 / 1024.0) as i64
}

/// MiB to GiB. SAN volume columns keep their fraction.
#[must_use]
pub fn mib_to_gib(value: f64) -> f64 {
    value / 1024.0
}
