// Authentication module
// Credential storage and the wire types for the token-issuing endpoints

pub mod store;
pub mod types;
