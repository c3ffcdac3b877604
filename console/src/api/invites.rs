// Merchant OTP invites.
//
// An invite emails the merchant a six-digit one-time passcode valid for 48
// hours. Codes are drawn from freshly generated v4 UUID bytes; leading
// zeros are avoided so the code always renders as six digits.

use chrono::{DateTime, Duration, Utc};
use log::{error, info};
use uuid::Uuid;

use crate::models::application::ApplicationRow;
use crate::models::requests::InviteRequest;
use crate::models::responses::{ApiResponse, InviteResponse};
use crate::remote::functions::{FunctionsPort, MerchantEmailPayload};
use crate::remote::records::ApplicationRecords;
use crate::utils::validation::validate_application_id;

pub const OTP_VALIDITY_HOURS: i64 = 48;

/// Six-digit code in 100000..=999999.
pub fn generate_otp() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    let n = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    format!("{}", 100_000 + (n % 900_000))
}

pub fn otp_expiry(from: DateTime<Utc>) -> DateTime<Utc> {
    from + Duration::hours(OTP_VALIDITY_HOURS)
}

pub async fn send_invite(
    records: &dyn ApplicationRecords,
    functions: &dyn FunctionsPort,
    req: &InviteRequest,
) -> ApiResponse<InviteResponse> {
    let correlation_id = Uuid::new_v4().simple().to_string();
    if validate_application_id(&req.application_id).is_err() {
        return ApiResponse::fail("Application id is required");
    }

    let row: ApplicationRow = match records.fetch_application(&req.application_id).await {
        Ok(Some(row)) => row,
        Ok(None) => return ApiResponse::fail("Application not found"),
        Err(e) => {
            error!(
                "[PHASE: invites] [STEP: fetch] Lookup failed for {} (correlation_id={}): {}",
                req.application_id, correlation_id, e
            );
            return ApiResponse::fail(format!("Failed to load application: {}", e));
        }
    };

    let otp = generate_otp();
    let expires_at = otp_expiry(Utc::now());
    info!(
        "[PHASE: invites] [STEP: send] Sending {} to {} for {} (correlation_id={})",
        if req.resend { "resend" } else { "invite" },
        row.merchant_email,
        req.application_id,
        correlation_id
    );

    let payload = MerchantEmailPayload {
        merchant_name: row.merchant_name.clone(),
        merchant_email: row.merchant_email.clone(),
        application_data: row.application_data.clone(),
        otp: otp.clone(),
        application_id: req.application_id.clone(),
        expires_at,
        resend: req.resend.then_some(true),
    };

    match functions.send_merchant_email(&payload).await {
        Ok(()) => ApiResponse::ok_with_message(
            InviteResponse {
                otp,
                expires_at,
                resent: req.resend,
            },
            format!("Invite sent to {}", row.merchant_email),
        ),
        Err(e) => {
            error!(
                "[PHASE: invites] [STEP: send] Email function failed for {} (correlation_id={}): {}",
                req.application_id, correlation_id, e
            );
            ApiResponse::fail(format!("Failed to send invite: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::application::ApplicationStatus;
    use crate::models::document::DocumentRecord;
    use crate::models::requests::CreateApplicationRequest;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    #[test]
    fn otp_is_always_six_digits_with_no_leading_zero() {
        for _ in 0..200 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6, "bad otp {}", otp);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(otp.as_bytes()[0], b'0');
        }
    }

    #[test]
    fn expiry_is_forty_eight_hours_out() {
        let now = Utc::now();
        assert_eq!(otp_expiry(now) - now, Duration::hours(48));
    }

    struct OneRowRecords;

    #[async_trait]
    impl ApplicationRecords for OneRowRecords {
        async fn insert_application(
            &self,
            _req: &CreateApplicationRequest,
        ) -> anyhow::Result<ApplicationRow> {
            Err(anyhow::anyhow!("unused"))
        }

        async fn fetch_application(&self, id: &str) -> anyhow::Result<Option<ApplicationRow>> {
            if id != "app-1" {
                return Ok(None);
            }
            Ok(Some(ApplicationRow {
                id: "app-1".to_string(),
                merchant_name: "Acme".to_string(),
                merchant_email: "owner@acme.test".to_string(),
                application_data: json!({ "businessName": "Acme" }),
                completed: false,
                status: ApplicationStatus::InProgress.as_str().to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }))
        }

        async fn update_application_data(&self, _id: &str, _data: &Value) -> anyhow::Result<()> {
            Ok(())
        }

        async fn list_applications(&self) -> anyhow::Result<Vec<ApplicationRow>> {
            Ok(Vec::new())
        }

        async fn set_status(&self, _id: &str, _status: ApplicationStatus) -> anyhow::Result<()> {
            Ok(())
        }

        async fn mark_completed(&self, _id: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn list_documents(&self, _merchant_id: &str) -> anyhow::Result<Vec<DocumentRecord>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingFunctions {
        sent: Mutex<Vec<MerchantEmailPayload>>,
    }

    #[async_trait]
    impl FunctionsPort for RecordingFunctions {
        async fn send_merchant_email(&self, payload: &MerchantEmailPayload) -> anyhow::Result<()> {
            self.sent
                .lock()
                .map_err(|_| anyhow::anyhow!("poisoned"))?
                .push(payload.clone());
            Ok(())
        }

        async fn insert_document_metadata(
            &self,
            _payload: &crate::remote::functions::DocumentMetadataPayload,
        ) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("unused"))
        }
    }

    #[tokio::test]
    async fn invite_carries_the_merchant_row_and_a_valid_code() {
        let functions = RecordingFunctions::default();
        let resp = send_invite(
            &OneRowRecords,
            &functions,
            &InviteRequest {
                application_id: "app-1".to_string(),
                resend: false,
            },
        )
        .await;
        assert!(resp.success);
        let invite = resp.data.expect("invite");
        assert_eq!(invite.otp.len(), 6);
        assert!(!invite.resent);

        let sent = functions.sent.lock().expect("lock");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].merchant_email, "owner@acme.test");
        assert_eq!(sent[0].otp, invite.otp);
        assert_eq!(sent[0].resend, None, "first invite omits the resend flag");
    }

    #[tokio::test]
    async fn resend_sets_the_flag_on_the_wire() {
        let functions = RecordingFunctions::default();
        let resp = send_invite(
            &OneRowRecords,
            &functions,
            &InviteRequest {
                application_id: "app-1".to_string(),
                resend: true,
            },
        )
        .await;
        assert!(resp.success);
        assert!(resp.data.expect("invite").resent);

        let sent = functions.sent.lock().expect("lock");
        assert_eq!(sent[0].resend, Some(true));
    }

    #[tokio::test]
    async fn unknown_application_fails_without_sending() {
        let functions = RecordingFunctions::default();
        let resp = send_invite(
            &OneRowRecords,
            &functions,
            &InviteRequest {
                application_id: "missing".to_string(),
                resend: false,
            },
        )
        .await;
        assert!(!resp.success);
        assert!(functions.sent.lock().expect("lock").is_empty());
    }
}
