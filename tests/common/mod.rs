#![allow(dead_code)]

use kbsearch::{Document, Settings};
use tempfile::TempDir;

pub fn document(id: &str, title: &str, content: &str, category: &str) -> Document {
    Document {
        id: id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        category: category.to_string(),
        section: None,
    }
}

/// A small help-center corpus with three categories.
pub fn help_center() -> Vec<Document> {
    vec![
        document(
            "billing-invoices",
            "Downloading invoices",
            "Invoices are listed on the billing page. Each invoice can be downloaded as PDF. \
             Billing administrators receive invoice emails every month.",
            "billing",
        ),
        document(
            "billing-refunds",
            "Requesting a refund",
            "Refunds are issued to the original payment method. Open the billing page and \
             choose the invoice to refund. Refund requests take five business days.",
            "billing",
        ),
        document(
            "billing-payment",
            "Updating your payment method",
            "Change the card used for billing from the payment section of the billing page. \
             The next invoice is charged to the new payment method.",
            "billing",
        ),
        document(
            "account-password",
            "Resetting your password",
            "Use the forgot password link on the login page. A password reset email arrives \
             within minutes. Account administrators can force a password reset.",
            "account",
        ),
        document(
            "account-settings",
            "Account settings overview",
            "Account settings hold your profile, password, notification and billing contact \
             details. Changes to account settings apply immediately.",
            "account",
        ),
        document(
            "account-delete",
            "Deleting your account",
            "Account deletion removes every project and invoice. Download invoices first. \
             Deleted account data cannot be restored after thirty days.",
            "account",
        ),
        document(
            "search-basics",
            "IntelliSearch vs Advanced Search",
            "IntelliSearch is the default search mode and understands plain questions. \
             Advanced search lets you search by field. Switch search modes from the search \
             bar. Search history is kept per account.",
            "search",
        ),
        document(
            "search-filters",
            "Filtering search results",
            "Narrow search results with filters for date, author and project. Saved filters \
             appear under the search bar for your account.",
            "search",
        ),
    ]
}

/// Settings rooted in `dir` with autosave off and no score floor.
pub fn test_settings(dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.index_path = dir.path().join("index");
    settings.store.auto_save = false;
    settings.search.min_similarity = 0.0;
    settings
}
