pub mod backup;
pub mod core;
pub mod entitlements;
pub mod session;
pub mod users;
