//! Process exit codes
//!
//! Scripts can branch on these, so the numeric values are stable.

use s3p_core::Error;

/// Exit status of an `s3p` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// Bad arguments or malformed locations
    UsageError = 2,
    /// Store or network failure after retries
    NetworkError = 3,
    NotFound = 5,
    /// A sync finished but some files failed
    PartialFailure = 6,
}

impl ExitCode {
    /// Map a library error to the exit code reported for it
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::MalformedLocation(_) | Error::InvalidConfig(_) => Self::UsageError,
            Error::Transfer(_) | Error::Unavailable(_) => Self::NetworkError,
            Error::NotFound(_) => Self::NotFound,
            Error::LocalResource(_) | Error::Config(_) | Error::Io(_) | Error::General(_) => {
                Self::GeneralError
            }
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
