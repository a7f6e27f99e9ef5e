//! Authoring-surface platform catalog.
//!
//! Descriptors for the trigger and action vocabularies of the platform skins
//! the engine ships metadata for. Purely informational: authoring UIs use
//! these to present palettes, but the runtime treats trigger and action
//! kinds as an open set and dispatches whatever handlers are registered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Describes one platform skin: its identity and the trigger/action kinds it
/// presents, each mapped to a short human-readable description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    /// Registry key, e.g. "zapier".
    pub skin: String,
    pub name: String,
    pub description: String,
    /// Brand color as a hex string.
    pub color: String,
    pub icon: String,
    pub triggers: BTreeMap<String, String>,
    pub actions: BTreeMap<String, String>,
}

/// The set of known platform skins, keyed by skin id.
#[derive(Debug, Clone, Default)]
pub struct PlatformCatalog {
    platforms: BTreeMap<String, PlatformDescriptor>,
}

impl PlatformCatalog {
    /// Catalog with the built-in platform skins.
    pub fn built_in() -> Self {
        let mut catalog = Self::default();
        for descriptor in [zapier(), hubspot(), jasper(), gohighlevel()] {
            catalog.insert(descriptor);
        }
        catalog
    }

    /// Add or replace a descriptor.
    pub fn insert(&mut self, descriptor: PlatformDescriptor) {
        self.platforms.insert(descriptor.skin.clone(), descriptor);
    }

    pub fn get(&self, skin: &str) -> Option<&PlatformDescriptor> {
        self.platforms.get(skin)
    }

    pub fn all(&self) -> impl Iterator<Item = &PlatformDescriptor> {
        self.platforms.values()
    }
}

fn entries(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn zapier() -> PlatformDescriptor {
    PlatformDescriptor {
        skin: "zapier".to_string(),
        name: "Zapier".to_string(),
        description: "Connect apps and automate workflows".to_string(),
        color: "#FF6600".to_string(),
        icon: "⚡".to_string(),
        triggers: entries(&[
            ("webhook", "Trigger on incoming webhook"),
            ("schedule", "Trigger on schedule (cron)"),
            ("email_received", "Trigger when email received"),
            ("form_submission", "Trigger on form submission"),
        ]),
        actions: entries(&[
            ("send_email", "Send email to recipient"),
            ("send_slack", "Send Slack message"),
            ("create_spreadsheet_row", "Add row to spreadsheet"),
            ("http_request", "Make HTTP request to any URL"),
        ]),
    }
}

fn hubspot() -> PlatformDescriptor {
    PlatformDescriptor {
        skin: "hubspot".to_string(),
        name: "HubSpot".to_string(),
        description: "Customer relationship and marketing automation".to_string(),
        color: "#FF5C35".to_string(),
        icon: "🎯".to_string(),
        triggers: entries(&[
            ("contact_created", "New contact created"),
            ("contact_updated", "Contact property changed"),
            ("deal_stage_changed", "Deal moved to new stage"),
        ]),
        actions: entries(&[
            ("create_contact", "Create new contact"),
            ("update_contact", "Update contact properties"),
            ("create_deal", "Create new deal"),
            ("send_enrollment_email", "Send enrollment email"),
        ]),
    }
}

fn jasper() -> PlatformDescriptor {
    PlatformDescriptor {
        skin: "jasper".to_string(),
        name: "Jasper".to_string(),
        description: "AI-powered content generation".to_string(),
        color: "#6D28D9".to_string(),
        icon: "✍️".to_string(),
        triggers: entries(&[
            ("content_needed", "Content request received"),
            ("content_approved", "Content approved by user"),
        ]),
        actions: entries(&[
            ("generate_content", "Generate AI content"),
            ("generate_social_post", "Create social media post"),
            ("generate_blog_post", "Write full blog post"),
        ]),
    }
}

fn gohighlevel() -> PlatformDescriptor {
    PlatformDescriptor {
        skin: "gohighlevel".to_string(),
        name: "GoHighLevel".to_string(),
        description: "All-in-one sales & marketing platform".to_string(),
        color: "#4F46E5".to_string(),
        icon: "🚀".to_string(),
        triggers: entries(&[
            ("lead_received", "New lead captured"),
            ("appointment_booked", "Appointment scheduled"),
            ("task_completed", "Task marked complete"),
        ]),
        actions: entries(&[
            ("create_lead", "Create new lead"),
            ("send_sms", "Send SMS to contact"),
            ("create_task", "Create task for team"),
            ("assign_agent", "Assign to sales agent"),
        ]),
    }
}
