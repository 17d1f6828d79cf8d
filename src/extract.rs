//! Structured receipt extraction through an Ollama chat model

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::email::EmailMessage;
use crate::ollama::OllamaClient;
use crate::traits::ReceiptExtractor;
use crate::types::*;
use crate::utils::validation::{decimal_from_f64, validate_receipt};

const SYSTEM_PROMPT: &str = "\
You are responsible for extracting the items purchased from a receipt, the total cost, and the final billed amount.
Your output MUST be in a JSON format that adheres to the schema.
- \"merchant\" is the name of the store or service the purchase was made from.
- \"total_cost\" is the sum of all item costs before any promotions or gift cards.
- \"total_billed\" is the final amount after all adjustments; it is what appears on the card statement, never the subtotal.
- \"item_description\" can be an empty string if not present on the receipt.";

/// One purchased item as returned by the model
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedItem {
    /// The name of the item purchased
    pub item_name: String,
    /// The cost of the item
    pub item_cost: f64,
    /// The description of the item, if it exists
    #[serde(default)]
    pub item_description: Option<String>,
    /// The quantity of the item purchased
    #[serde(default = "default_quantity")]
    pub item_quantity: u32,
    /// The payment method used, if shown (e.g. "Visa 5320")
    #[serde(default)]
    pub payment_method: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

/// Receipt fields as returned by the model, before validation
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedReceipt {
    /// The merchant name of the receipt
    pub merchant: String,
    /// The total cost of the receipt before any adjustments
    pub total_cost: f64,
    /// The total amount billed after all adjustments
    pub total_billed: f64,
    /// The items purchased
    pub items: Vec<ExtractedItem>,
}

impl TryFrom<ExtractedReceipt> for Receipt {
    type Error = ValidationError;

    fn try_from(extracted: ExtractedReceipt) -> Result<Self, Self::Error> {
        let items = extracted
            .items
            .into_iter()
            .map(|item| {
                Ok(LineItem {
                    cost: decimal_from_f64(item.item_cost, "item_cost")?,
                    name: item.item_name,
                    description: item.item_description.filter(|d| !d.trim().is_empty()),
                    quantity: item.item_quantity,
                    payment_method: item.payment_method.filter(|p| !p.trim().is_empty()),
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        let receipt = Receipt {
            merchant: extracted.merchant.trim().to_string(),
            total_cost: decimal_from_f64(extracted.total_cost, "total_cost")?,
            total_billed: decimal_from_f64(extracted.total_billed, "total_billed")?,
            items,
        };
        validate_receipt(&receipt)?;
        Ok(receipt)
    }
}

/// Extracts receipts by asking an Ollama model for schema-constrained JSON
#[derive(Debug, Clone)]
pub struct OllamaReceiptExtractor {
    client: OllamaClient,
}

impl OllamaReceiptExtractor {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: OllamaClient::new(base_url, model),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = self.client.with_timeout(timeout);
        self
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }
}

#[async_trait]
impl ReceiptExtractor for OllamaReceiptExtractor {
    async fn extract(&self, email: &EmailMessage) -> Result<Receipt, ExtractError> {
        let user_content = format!(
            "Please extract the information from this receipt:\n\n{}",
            email.to_prompt_text()
        );
        let format = serde_json::to_value(schemars::schema_for!(ExtractedReceipt))?;
        let content = self
            .client
            .chat(SYSTEM_PROMPT, &user_content, Some(format))
            .await?;

        let extracted: ExtractedReceipt = serde_json::from_str(&content)?;
        Ok(Receipt::try_from(extracted)?)
    }
}
