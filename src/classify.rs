//! Receipt detection: keyword weights or an Ollama model verdict

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::email::EmailMessage;
use crate::ollama::OllamaClient;
use crate::traits::ReceiptClassifier;
use crate::types::ClassifyError;

/// Score an email must reach to count as a receipt
pub const DEFAULT_RECEIPT_THRESHOLD: i32 = 55;

const SUBJECT_RULES: &[(&str, i32)] = &[
    ("receipt", 50),
    ("invoice", 50),
    ("your order", 25),
    ("order confirmation", 50),
    ("shipped", -50),
    ("offer", -30),
    ("return", -35),
    ("warranty", -35),
    ("rejoin", -10),
    ("coming soon", -30),
    ("delivered", -20),
    ("on the way", -15),
];

const BODY_RULES: &[(&str, i32)] = &[
    ("receipt", 30),
    ("order", 10),
    ("order #", 30),
    ("order number", 30),
    ("$", 10),
    ("total amount", 15),
    ("total billed", 15),
    ("unsubscribe", -5),
    ("offer", -15),
    ("shipment", -10),
    ("on the way", -10),
    ("tracking number", -10),
    ("limited time", -10),
    ("quantity:", 15),
    ("subtotal", 20),
    ("billing information", 15),
];

/// Classifies emails by summing hand-tuned keyword weights.
///
/// Each keyword counts once, however often it appears.
#[derive(Debug, Clone)]
pub struct RuleBasedClassifier {
    threshold: i32,
}

impl Default for RuleBasedClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_RECEIPT_THRESHOLD)
    }
}

impl RuleBasedClassifier {
    pub fn new(threshold: i32) -> Self {
        Self { threshold }
    }

    pub fn score(&self, email: &EmailMessage) -> i32 {
        let subject = email.subject.to_lowercase();
        let body = email.body.to_lowercase();

        let weigh = |text: &str, rules: &[(&str, i32)]| -> i32 {
            rules
                .iter()
                .filter(|(keyword, _)| text.contains(*keyword))
                .map(|(_, weight)| weight)
                .sum()
        };

        weigh(&subject, SUBJECT_RULES) + weigh(&body, BODY_RULES)
    }

    pub fn accepts(&self, email: &EmailMessage) -> bool {
        self.score(email) >= self.threshold
    }
}

#[async_trait]
impl ReceiptClassifier for RuleBasedClassifier {
    async fn is_receipt(&self, email: &EmailMessage) -> Result<bool, ClassifyError> {
        Ok(self.accepts(email))
    }
}

const CLASSIFIER_PROMPT: &str = "\
You are an email classifier. You will receive an email and you should state if it is RECEIPT or NOT RECEIPT.
A receipt contains the items that were purchased and their individual prices, as well as the total price.
Give NO other response.

Examples of receipts:
Your order has been received.
Thanks for your order
Order #532523
Receipt from ...

Examples of emails that are not receipts:
Your order has been shipped!
Place your order today!";

/// Asks an Ollama model for a `RECEIPT` / `NOT RECEIPT` verdict.
///
/// Only a reply that is exactly `RECEIPT`, ignoring surrounding whitespace,
/// counts as a receipt.
#[derive(Debug, Clone)]
pub struct OllamaReceiptClassifier {
    client: OllamaClient,
}

impl OllamaReceiptClassifier {
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
impl ReceiptClassifier for OllamaReceiptClassifier {
    async fn is_receipt(&self, email: &EmailMessage) -> Result<bool, ClassifyError> {
        let user_content = format!("The user's email is:\n\n{}", email.to_prompt_text());
        let reply = self
            .client
            .chat(CLASSIFIER_PROMPT, &user_content, None)
            .await?;
        let verdict = reply.trim() == "RECEIPT";
        debug!(subject = %email.subject, verdict, "model classification");
        Ok(verdict)
    }
}
