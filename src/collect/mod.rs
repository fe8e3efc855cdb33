//!
//! Collectors, one per resource kind. Each turns a set of raw readings into
//! flat records; the pure record builders are separated from the async
//! gathering so the arithmetic is testable without the host.
//!

pub mod backup;
pub mod hypervisor;
pub mod san;
