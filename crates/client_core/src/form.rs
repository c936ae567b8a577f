//! The single editable draft behind the customer form.

use shared::domain::{CustomerFields, Record, RecordId};

use crate::{
    error::PhoneValidationError,
    validation::{is_phone_input_accepted, validate_phone},
};

pub const CREATE_LABEL: &str = "Create";
pub const UPDATE_LABEL: &str = "Update";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub name: String,
    pub phone: String,
    pub email: String,
    /// `None` creates a new record on submit, `Some` replaces that record.
    pub editing_id: Option<RecordId>,
    pub phone_invalid: bool,
}

impl FormState {
    pub fn mode(&self) -> FormMode {
        if self.editing_id.is_some() {
            FormMode::Edit
        } else {
            FormMode::Create
        }
    }

    pub fn submit_label(&self) -> &'static str {
        match self.mode() {
            FormMode::Create => CREATE_LABEL,
            FormMode::Edit => UPDATE_LABEL,
        }
    }

    pub fn start_edit(&mut self, record: &Record) {
        self.name = record.name.clone();
        self.phone = record.phone.clone();
        self.email = record.email.clone();
        self.editing_id = Some(record.id.clone());
        self.phone_invalid = validate_phone(&self.phone).is_err();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn change_name(&mut self, value: impl Into<String>) {
        self.name = value.into();
    }

    pub fn change_email(&mut self, value: impl Into<String>) {
        self.email = value.into();
    }

    /// Returns `false` and leaves the field untouched when `value` holds a non-digit.
    pub fn change_phone(&mut self, value: &str) -> bool {
        if !is_phone_input_accepted(value) {
            return false;
        }
        self.phone = value.to_string();
        self.phone_invalid = validate_phone(value).is_err();
        true
    }

    pub fn revalidate_phone(&mut self) -> Result<(), PhoneValidationError> {
        let result = validate_phone(&self.phone);
        self.phone_invalid = result.is_err();
        result
    }

    pub fn fields(&self) -> CustomerFields {
        CustomerFields::new(self.name.clone(), self.phone.clone(), self.email.clone())
    }
}
