pub mod error;
pub mod entities;
pub mod storage;
pub mod security;
pub mod identity;
pub mod catalog;
pub mod config;
pub mod server;

// Test-only printing helper: expands to eprintln! in test and debug builds.
// Usage: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// Release builds keep the format checks but print nothing.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        if false { let _ = format!($($arg)*); }
    });
}
