//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;
use snippet_run_core::error::AppError;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const CONFLICT: i32 = 4002;
    pub const UNAUTHORIZED: i32 = 4010;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SYSTEM_ERROR: i32 = 5002;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::Domain(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        AppError::Conflict(msg) => ErrorObjectOwned::owned(code::CONFLICT, msg, None::<()>),
        AppError::Unauthorized(msg) => {
            ErrorObjectOwned::owned(code::UNAUTHORIZED, msg, None::<()>)
        }
        AppError::Materialization(msg) | AppError::Generator(msg) => {
            ErrorObjectOwned::owned(code::SYSTEM_ERROR, msg, None::<()>)
        }
        AppError::Io(e) => ErrorObjectOwned::owned(code::SYSTEM_ERROR, e.to_string(), None::<()>),
        AppError::Internal(msg) => ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>),
    }
}
