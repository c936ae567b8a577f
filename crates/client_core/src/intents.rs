//! User intents forwarded by the presentation layer.

use std::sync::Arc;

use shared::domain::RecordId;
use tracing::{debug, warn};

use crate::{
    controller::{CustomerController, SubmitOutcome},
    error::StoreError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    EditName(String),
    EditPhone(String),
    EditEmail(String),
    Submit,
    Clear,
    StartEdit(RecordId),
    Delete(RecordId),
    Refresh,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::EditName(_) => "edit_name",
            Intent::EditPhone(_) => "edit_phone",
            Intent::EditEmail(_) => "edit_email",
            Intent::Submit => "submit",
            Intent::Clear => "clear",
            Intent::StartEdit(_) => "start_edit",
            Intent::Delete(_) => "delete",
            Intent::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    Applied,
    /// The intent had no effect: a non-digit phone keystroke or an unknown record id.
    Ignored,
    Submitted(SubmitOutcome),
}

impl CustomerController {
    pub async fn dispatch(self: &Arc<Self>, intent: Intent) -> Result<IntentOutcome, StoreError> {
        debug!(intent = intent.name(), "dispatching ui intent");
        match intent {
            Intent::EditName(value) => {
                self.change_name(value).await;
                Ok(IntentOutcome::Applied)
            }
            Intent::EditPhone(value) => {
                if self.change_phone(&value).await {
                    Ok(IntentOutcome::Applied)
                } else {
                    Ok(IntentOutcome::Ignored)
                }
            }
            Intent::EditEmail(value) => {
                self.change_email(value).await;
                Ok(IntentOutcome::Applied)
            }
            Intent::Submit => self.submit().await.map(IntentOutcome::Submitted),
            Intent::Clear => {
                self.clear().await;
                Ok(IntentOutcome::Applied)
            }
            Intent::StartEdit(id) => {
                if self.start_edit_by_id(&id).await {
                    Ok(IntentOutcome::Applied)
                } else {
                    warn!(record_id = %id, "start_edit for a record not in the list");
                    Ok(IntentOutcome::Ignored)
                }
            }
            Intent::Delete(id) => {
                self.delete_record(&id).await?;
                Ok(IntentOutcome::Applied)
            }
            Intent::Refresh => {
                self.refresh().await?;
                Ok(IntentOutcome::Applied)
            }
        }
    }
}
