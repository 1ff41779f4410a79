//! Implementations of the secret-handling ports.

pub mod aes;
pub mod code;
pub mod password;
pub mod totp;

pub use aes::ValueCipher;
pub use code::{CodeConfig, EncryptedCodeGenerator};
pub use password::BcryptHasher;
pub use totp::TotpProvider;
