pub mod claims;
pub mod context;
pub mod cookie;
pub mod jwt;
pub mod ledger;
pub mod password;
pub mod service;
pub mod session_limit;
pub mod validation;
