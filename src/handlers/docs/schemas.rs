// OpenAPI schema definitions for the authentication surface.

use serde_json::json;

pub fn all_schemas() -> serde_json::Value {
    json!({
        "RegisterRequest": register_request_schema(),
        "RegisterResponse": register_response_schema(),
        "LoginRequest": login_request_schema(),
        "LoginResponse": login_response_schema(),
        "UserSummary": user_summary_schema(),
        "RefreshTokenRequest": refresh_token_request_schema(),
        "TokenResponse": token_response_schema(),
        "AuthError": auth_error_schema(),
        "VerifyEmailRequest": verify_email_request_schema(),
        "ChangePasswordRequest": change_password_request_schema(),
        "ForgotPasswordRequest": forgot_password_request_schema(),
        "ResetPasswordRequest": reset_password_request_schema(),
        "ResetTokenStatusResponse": reset_token_status_response_schema(),
    })
}

fn register_request_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["email", "password", "full_name"],
        "properties": {
            "email": {
                "type": "string",
                "format": "email",
                "maxLength": 320,
                "description": "User's email address (stored in lowercase)"
            },
            "password": {
                "type": "string",
                "format": "password",
                "minLength": 8,
                "description": "Password with uppercase, lowercase, number, and special character"
            },
            "full_name": {
                "type": "string",
                "minLength": 1,
                "maxLength": 255,
                "description": "User's full name"
            },
            "company_name": {
                "type": "string",
                "maxLength": 255,
                "nullable": true,
                "description": "User's company name (optional)"
            }
        }
    })
}

fn register_response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "user_id": { "type": "string", "format": "uuid" },
            "email": { "type": "string", "format": "email" },
            "full_name": { "type": "string" },
            "email_verification_required": { "type": "boolean" }
        }
    })
}

fn login_request_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["email", "password"],
        "properties": {
            "email": { "type": "string", "format": "email" },
            "password": { "type": "string", "format": "password" },
            "remember_me": { "type": "boolean", "default": false }
        }
    })
}

fn login_response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "access_token": { "type": "string", "description": "Short-lived signed access token" },
            "refresh_token": { "type": "string", "description": "Opaque long-lived refresh token" },
            "expires_in": { "type": "integer", "description": "Access token expiry in seconds" },
            "token_type": { "type": "string", "default": "Bearer" },
            "session_id": { "type": "string", "format": "uuid" },
            "user": { "$ref": "#/components/schemas/UserSummary" }
        }
    })
}

fn user_summary_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string", "format": "uuid" },
            "email": { "type": "string", "format": "email" },
            "full_name": { "type": "string" },
            "email_verified": { "type": "boolean" }
        }
    })
}

fn refresh_token_request_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "refresh_token": {
                "type": "string",
                "nullable": true,
                "description": "Omit when the refresh token is carried in the HttpOnly cookie"
            }
        }
    })
}

fn token_response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "access_token": { "type": "string" },
            "expires_in": { "type": "integer" },
            "token_type": { "type": "string", "default": "Bearer" }
        }
    })
}

fn auth_error_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "success": { "type": "boolean", "description": "Always false for errors" },
            "error": {
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "enum": [
                            "INVALID_CREDENTIALS", "ACCOUNT_LOCKED", "EMAIL_NOT_VERIFIED",
                            "ACCOUNT_INACTIVE", "RATE_LIMITED", "DATABASE_ERROR", "TOKEN_ERROR",
                            "INVALID_TOKEN", "USER_NOT_FOUND", "VALIDATION_ERROR", "INTERNAL_ERROR",
                            "CONFLICT", "FORBIDDEN", "NOT_FOUND", "BAD_REQUEST"
                        ]
                    },
                    "description": { "type": "string" },
                    "retry_after": { "type": "integer", "nullable": true }
                }
            },
            "message": { "type": "string" }
        }
    })
}

fn verify_email_request_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["token"],
        "properties": {
            "token": { "type": "string", "description": "Opaque email-verification token from the link" }
        }
    })
}

fn change_password_request_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["current_password", "new_password"],
        "properties": {
            "current_password": { "type": "string", "format": "password" },
            "new_password": { "type": "string", "format": "password", "minLength": 8 }
        }
    })
}

fn forgot_password_request_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["email"],
        "properties": {
            "email": { "type": "string", "format": "email", "maxLength": 320 }
        }
    })
}

fn reset_password_request_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["token", "new_password"],
        "properties": {
            "token": { "type": "string", "description": "Opaque password-reset token from the email" },
            "new_password": { "type": "string", "format": "password", "minLength": 8 }
        }
    })
}

fn reset_token_status_response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "valid": { "type": "boolean" },
            "email": { "type": "string", "format": "email", "nullable": true }
        }
    })
}
