//! Cryptographic encodings.

pub mod signature;

pub use signature::{Signature, SignatureError, SignatureParts};
