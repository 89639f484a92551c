pub mod address_validator;
pub mod chain_normalizer;
pub mod units;

pub use address_validator::AddressValidator;
pub use chain_normalizer::normalize_chain_id;
