pub mod auth;
pub mod group;
pub mod post;

use std::collections::BTreeMap;

use serde::Serialize;
use validator::ValidationErrors;

pub const REQUIRED: &str = "This field is required.";
/// Key for errors that belong to the whole form.
pub const NON_FIELD: &str = "__all__";

/// Messages per field, rendered next to the inputs.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FormErrors::default();
        for (field, errs) in errors.field_errors() {
            for e in errs.iter() {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                out.add(&field.to_string(), message);
            }
        }
        out
    }
}

/// Validator output as [`FormErrors`], empty when everything passed.
pub fn check(form: &impl validator::Validate) -> FormErrors {
    form.validate().err().map(FormErrors::from).unwrap_or_default()
}
