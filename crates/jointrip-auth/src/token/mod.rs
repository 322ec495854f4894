//! Token issuance and verification.
//!
//! This module provides:
//!
//! - Signed, typed, expiring access and refresh tokens
//! - Verification against the expected token kind
//!
//! Tokens are opaque strings to every other module; only the
//! [`TokenCodec`] looks inside them.

pub mod codec;

pub use codec::{IssuedTokens, SigningAlgorithm, TokenClaims, TokenCodec, TokenError, TokenKind};
