// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::integration::helpers::config_path;
use sitescout::domain::models::entry::{Enrichment, Entry};
use sitescout::domain::services::template_selector::{MessageTemplates, TemplateKind};

fn entry(website: &str, availability: &str, maintenance: Option<bool>) -> Entry {
    Entry {
        title: "Trattoria Da Gino".into(),
        website: website.into(),
        email: "gino@trattoria.it".into(),
        enrichment: Enrichment {
            protocol: "http".into(),
            technology: "Joomla".into(),
            availability: availability.into(),
            maintenance,
            mobile_performance: Some(42),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_bundled_templates_fill_every_placeholder() {
    let templates = MessageTemplates::load(config_path("message_templates.json")).unwrap();
    let cases = [
        (entry("", "", None), TemplateKind::NoWebsite),
        (entry("https://dagino.it", "not found", None), TemplateKind::Unavailable),
        (entry("https://dagino.it", "available", Some(true)), TemplateKind::Maintenance),
        (entry("https://dagino.it", "available", Some(false)), TemplateKind::Review),
    ];

    for (entry, kind) in cases {
        let message = templates.render(&entry, 75);
        assert_eq!(message.kind, kind);
        assert!(message.subject.contains("Trattoria Da Gino"));
        assert!(!message.subject.contains('{'), "{kind}: {}", message.subject);
        assert!(!message.body.contains('{'), "{kind}: {}", message.body);
    }
}

#[test]
fn test_unavailable_body_names_domain_and_label() {
    let templates = MessageTemplates::load(config_path("message_templates.json")).unwrap();
    let message = templates.render(&entry("https://www.dagino.it/menu", "not found", None), 75);

    assert!(message.body.contains("dagino.it"));
    assert!(message.body.contains("not found"));
}

#[test]
fn test_missing_template_file_is_an_error() {
    assert!(MessageTemplates::load(config_path("no_such_templates.json")).is_err());
}
