pub mod address;
pub mod base58;
