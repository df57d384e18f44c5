//! Storage credential management
//!
//! Publishing needs an access token for the object-storage service. This
//! module prompts for it, keeps it in a `.env` file with owner-only
//! permissions and reports whether one is configured.
//!
//! # Examples
//!
//! ```rust,no_run
//! use astrovision_sync::auth::{check_token, setup_token};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! if !check_token() {
//!     setup_token(false)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod credentials;

// Re-export main public API
pub use credentials::{
    check_token, clear_stored_token, clear_token, get_auth_status, prompt_token, read_token,
    save_token, setup_token, show_auth_status, validate_token, AuthStatus,
};
