//! Process exit codes
//!
//! Scripts rely on these values, so they must not change between releases.

use bsync_core::Error;

/// Exit status of a bsync invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    /// Any other failure, including partially failed uploads
    GeneralError = 1,
    /// Invalid arguments or paths
    UsageError = 2,
    NetworkError = 3,
    AuthError = 4,
    NotFound = 5,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(code: i32) -> Self {
        match code {
            0 => ExitCode::Success,
            2 => ExitCode::UsageError,
            3 => ExitCode::NetworkError,
            4 => ExitCode::AuthError,
            5 => ExitCode::NotFound,
            _ => ExitCode::GeneralError,
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(error: &Error) -> Self {
        Self::from_i32(error.exit_code())
    }
}
