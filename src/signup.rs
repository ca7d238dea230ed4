// 📝 Signup Form - Gate before an account request is submitted

use crate::password;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupForm {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupError {
    MissingName,
    PasswordRequirements(Vec<String>),
    PasswordMismatch,
}

impl std::fmt::Display for SignupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignupError::MissingName => write!(f, "Please enter your first and last name"),
            SignupError::PasswordRequirements(_) => write!(f, "Please fix password requirements"),
            SignupError::PasswordMismatch => write!(f, "Passwords do not match"),
        }
    }
}

impl std::error::Error for SignupError {}

impl SignupForm {
    /// Check the form in the order the signup screen reports problems.
    /// Only the first failure is returned.
    pub fn validate(&self) -> Result<(), SignupError> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(SignupError::MissingName);
        }

        let result = password::validate(&self.password);
        if !result.is_valid {
            return Err(SignupError::PasswordRequirements(result.errors));
        }

        if self.password != self.confirm_password {
            return Err(SignupError::PasswordMismatch);
        }

        Ok(())
    }

    /// First and last name with surrounding whitespace removed
    pub fn normalized_names(&self) -> (String, String) {
        (
            self.first_name.trim().to_string(),
            self.last_name.trim().to_string(),
        )
    }
}
