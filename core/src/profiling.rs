//! Profiling support via Tracy.
//!
//! Instrumentation is enabled with the `profiling` Cargo feature:
//!
//! ```toml
//! [dependencies]
//! cmod-core = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! Decoding, encoding and every conditioning step open a span, so a Tracy
//! capture of `cmodfix` shows where time goes on large models.
//!
//! ```ignore
//! use cmod_core::{profile_function, profile_scope};
//!
//! fn condition(model: &mut Model) {
//!     profile_function!();
//!     {
//!         profile_scope!("dedup");
//!         // ...
//!     }
//! }
//! ```
//!
//! When profiling is disabled (the default), the macros expand to nothing.

#[cfg(feature = "profiling")]
pub use tracy_client::{self, span};

/// Create a named profiling span covering the rest of the enclosing scope.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Create a profiling span for the entire function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Create a profiling span for function (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_compile() {
        profile_function!();
        profile_scope!("test_scope");
    }
}
