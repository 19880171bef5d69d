//! Re-exports the [`jzst`] library for convenient access to the streaming protocol types.
pub use jzst;
