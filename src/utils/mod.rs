// Utility modules for the auth core service

pub mod auth_errors;
pub mod device_fingerprint;
pub mod password;
pub mod validation;

pub use auth_errors::{
    create_auth_audit_entry, log_auth_failure, AuthAuditEntry, AuthError, AuthErrorResponse,
    AuthEventType,
};
pub use device_fingerprint::generate_device_fingerprint;
pub use password::{
    generate_random, hash_password, needs_rehash, validate_strength, verify_password,
    PasswordConfig, PasswordError,
};
pub use validation::{trim_and_validate_field, trim_optional_field};
