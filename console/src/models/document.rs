// Document metadata models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed review vocabulary for uploaded documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    BankStatement,
    BusinessLicense,
    ProcessingStatement,
    IdentityDocument,
    VoidedCheck,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::BankStatement => "bank_statement",
            DocumentType::BusinessLicense => "business_license",
            DocumentType::ProcessingStatement => "processing_statement",
            DocumentType::IdentityDocument => "identity_document",
            DocumentType::VoidedCheck => "voided_check",
            DocumentType::Other => "other",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim() {
            "bank_statement" => Some(DocumentType::BankStatement),
            "business_license" => Some(DocumentType::BusinessLicense),
            "processing_statement" => Some(DocumentType::ProcessingStatement),
            "identity_document" => Some(DocumentType::IdentityDocument),
            "voided_check" => Some(DocumentType::VoidedCheck),
            "other" => Some(DocumentType::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row shape of the `merchant_documents` collection. Created once on a
/// successful upload and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub merchant_id: String,
    pub file_name: String,
    pub file_path: String,
    pub file_type: String,
    pub file_size: i64,
    pub document_type: String,
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn document_type_parsed(&self) -> Option<DocumentType> {
        DocumentType::from_str(&self.document_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_type_round_trips() {
        for ty in [
            DocumentType::BankStatement,
            DocumentType::BusinessLicense,
            DocumentType::ProcessingStatement,
            DocumentType::IdentityDocument,
            DocumentType::VoidedCheck,
            DocumentType::Other,
        ] {
            assert_eq!(DocumentType::from_str(ty.as_str()), Some(ty));
        }
        assert_eq!(DocumentType::from_str("tax_return"), None);
    }
}
