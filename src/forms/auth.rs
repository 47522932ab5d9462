use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateEmail};

use super::{check, FormErrors, NON_FIELD, REQUIRED};

pub const MIN_PASSWORD_LEN: usize = 8;

fn valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

/// Length and content rules shared by signup and password change.
fn check_new_password(field: &str, password: &str, errors: &mut FormErrors) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            field,
            format!("This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters."),
        );
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.add(field, "This password is entirely numeric.");
    }
}

#[derive(Deserialize, Serialize, Validate, Debug, Default, Clone)]
pub struct SignupForm {
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
    #[serde(default)]
    #[validate(length(
        min = 1,
        max = 150,
        message = "Required. 150 characters or fewer."
    ))]
    pub username: String,
    /// Optional, checked in [`SignupForm::clean`] only when given.
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password1: String,
    #[serde(default, skip_serializing)]
    pub password2: String,
}

impl SignupForm {
    pub fn clean(&mut self) -> Result<(), FormErrors> {
        self.first_name = self.first_name.trim().to_owned();
        self.last_name = self.last_name.trim().to_owned();
        self.username = self.username.trim().to_owned();
        self.email = self.email.trim().to_owned();

        let mut errors = check(&*self);
        if !self.email.is_empty() && !self.email.validate_email() {
            errors.add("email", "Enter a valid email address.");
        }
        if !self.username.is_empty() && !valid_username(&self.username) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }
        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        } else {
            check_new_password("password2", &self.password1, &mut errors);
        }
        if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }
        errors.into_result()
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

impl LoginForm {
    pub fn clean(&mut self) -> Result<(), FormErrors> {
        self.username = self.username.trim().to_owned();
        let mut errors = FormErrors::default();
        if self.username.is_empty() {
            errors.add("username", REQUIRED);
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors.into_result()
    }

    pub fn invalid_credentials() -> FormErrors {
        let mut errors = FormErrors::default();
        errors.add(
            NON_FIELD,
            "Please enter a correct username and password. Note that both fields may be case-sensitive.",
        );
        errors
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct PasswordChangeForm {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

impl PasswordChangeForm {
    /// `old_matches` tells whether `old_password` verified against the stored hash.
    pub fn clean(&self, old_matches: bool) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        if !old_matches {
            errors.add(
                "old_password",
                "Your old password was entered incorrectly. Please enter it again.",
            );
        }
        if self.new_password1 != self.new_password2 {
            errors.add("new_password2", "The two password fields didn't match.");
        }
        check_new_password("new_password2", &self.new_password1, &mut errors);
        errors.into_result()
    }
}
