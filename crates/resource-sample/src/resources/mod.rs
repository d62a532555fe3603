//! # Resources
//!
//! The concrete resources served by the sample API:
//!
//! - [`user`] - top-level users, addressed by username
//! - [`address`] - a user's ordered addresses, one of them primary
//! - [`photo`] - a user's ordered photos, one of them primary
//!
//! ```text
//! users/:username/addresses/:address_id
//! users/:username/addresses/primary
//! users/:username/photos/:photo_id
//! users/me
//! ```

pub mod address;
pub mod photo;
pub mod user;

pub use address::AddressResource;
pub use photo::PhotoResource;
pub use user::UserResource;

pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";
pub const ADDRESS_NOT_FOUND: &str = "ADDRESS_NOT_FOUND";
pub const AUTHORIZATION_REQUIRED: &str = "AUTHORIZATION_REQUIRED";

/// Role allowed to change any user.
pub const ADMIN_ROLE: &str = "admin";
