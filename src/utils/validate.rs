use regex::Regex;

use crate::core::error::{Error, FieldError};

/// Collects at most one error per field, then fails the request with all of them.
#[derive(Debug, Default)]
pub(crate) struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, field: &str, error: String) {
        self.errors.push(FieldError {
            field: field.to_owned(),
            error,
        });
    }

    pub(crate) fn required(&mut self, field: &str, value: &str) -> bool {
        if value.is_empty() {
            self.fail(field, "This field is required".to_owned());
            return false;
        }
        true
    }

    fn bounds(&mut self, field: &str, value: &str, min: usize, max: Option<usize>) -> bool {
        let length = value.chars().count();

        if length < min {
            self.fail(field, format!("Must be at least {} characters long", min));
            return false;
        }

        if let Some(max) = max.filter(|max| length > *max) {
            self.fail(field, format!("Must not be longer than {} characters", max));
            return false;
        }

        true
    }

    pub(crate) fn text(&mut self, field: &str, value: &str, min: usize, max: Option<usize>) {
        if self.required(field, value) {
            self.bounds(field, value, min, max);
        }
    }

    pub(crate) fn email(&mut self, field: &str, value: &str, max: usize, pattern: &Regex) {
        if !self.required(field, value) {
            return;
        }

        if !pattern.is_match(value) {
            self.fail(field, "Must be a valid email address".to_owned());
            return;
        }

        self.bounds(field, value, 0, Some(max));
    }

    pub(crate) fn finish(self) -> Result<(), Error> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self.errors))
        }
    }
}
