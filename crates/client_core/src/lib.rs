//! Client core for the customer records screen: the record store gateway, the form
//! draft with its phone rule, and the controller that sequences writes against the store.

pub mod controller;
pub mod error;
pub mod form;
pub mod gateway;
pub mod intents;
pub mod settings;
pub mod validation;

pub use controller::{
    ControllerConfig, ControllerEvent, ControllerSnapshot, CustomerController, SubmitOutcome,
    LEGACY_SAVING_DISPLAY_WINDOW,
};
pub use error::{PhoneValidationError, StoreError, StoreOperation};
pub use form::{FormMode, FormState};
pub use gateway::{HttpRecordStoreGateway, MissingRecordStoreGateway, RecordStoreGateway};
pub use intents::{Intent, IntentOutcome};
pub use settings::{load_client_settings, ClientSettings};
