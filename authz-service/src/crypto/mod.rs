pub mod cipher;
pub mod codes;
pub mod totp;

pub use cipher::SecretCipher;
