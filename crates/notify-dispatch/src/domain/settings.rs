//! # Notification Settings
//!
//! Per-installation toggles and message templates. Read by the notifier to
//! decide whether a business event produces a message at all, and what it
//! says.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::message::NotificationKind;

/// Placeholder values for template rendering, keyed by placeholder name.
pub type TemplateVars = BTreeMap<String, String>;

/// Notification preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Master switch.
    pub enabled: bool,
    /// Per-kind switches; kinds not listed are enabled.
    pub kinds: BTreeMap<NotificationKind, bool>,
    /// Per-kind templates; kinds not listed use the built-in text.
    pub templates: BTreeMap<NotificationKind, String>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            kinds: BTreeMap::new(),
            templates: BTreeMap::new(),
        }
    }
}

impl NotificationSettings {
    /// Whether messages of `kind` should be sent.
    pub fn is_enabled(&self, kind: NotificationKind) -> bool {
        self.enabled && self.kinds.get(&kind).copied().unwrap_or(true)
    }

    /// Template for `kind`, falling back to the built-in text.
    pub fn template(&self, kind: NotificationKind) -> &str {
        self.templates
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| default_template(kind))
    }

    /// Toggle one kind.
    pub fn set_kind_enabled(&mut self, kind: NotificationKind, enabled: bool) {
        self.kinds.insert(kind, enabled);
    }

    /// Replace the template of one kind.
    pub fn set_template(&mut self, kind: NotificationKind, template: impl Into<String>) {
        self.templates.insert(kind, template.into());
    }
}

/// Built-in template for `kind`.
pub fn default_template(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::OrderCreated => {
            "Hello {clinic}, order {order_id} for patient {patient} has been received."
        }
        NotificationKind::OrderReady => "Hello {clinic}, order {order_id} is ready for pickup.",
        NotificationKind::OrderDelivered => "Hello {clinic}, order {order_id} has been delivered.",
        NotificationKind::PaymentReminder => {
            "Hello {clinic}, invoice {invoice_id} of {amount} is due on {due_date}."
        }
        NotificationKind::PaymentReceived => {
            "Hello {clinic}, we received your payment of {amount}. Thank you."
        }
        NotificationKind::Custom => "{message}",
    }
}

/// Substitute `{name}` placeholders with values from `vars`.
///
/// Names are ASCII letters, digits and underscores. Unknown placeholders and
/// unbalanced braces are kept verbatim.
pub fn render_template(template: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..name_len];
        let closed = after[name_len..].starts_with('}');

        match vars.get(name).filter(|_| closed && !name.is_empty()) {
            Some(value) => {
                out.push_str(value);
                rest = &after[name_len + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
