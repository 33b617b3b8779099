// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::integration::helpers::{bundled_tables, config_path};
use sitescout::config::settings::TableSettings;
use sitescout::config::tables::{LookupTables, TableError};
use tempfile::TempDir;

fn bundled_settings() -> TableSettings {
    TableSettings {
        platform_signatures: config_path("platform_signatures.json"),
        excluded_domains: config_path("excluded_domains.txt"),
        hosting_providers: config_path("hosting_providers.json"),
        message_templates: config_path("message_templates.json"),
    }
}

#[test]
fn test_bundled_tables_load() {
    let tables = bundled_tables();

    assert!(tables.platforms.iter().any(|p| p.name == "WordPress"));
    assert!(tables.excluded_domains.contains("justeat.it"));
    assert!(!tables.excluded_domains.iter().any(|d| d.starts_with('#')));
    assert!(tables.hosting_providers.len() > 100);
}

#[test]
fn test_bundled_provider_wildcards() {
    let tables = bundled_tables();

    assert_eq!(
        tables.match_provider("technorail.com"),
        Some("Aruba-Hosting-(Technorail)")
    );
    assert_eq!(
        tables.match_provider("awsdns-07.co.uk"),
        Some("Amazon-Web-Services-(AWS)")
    );
    assert_eq!(tables.match_provider("ui-dns.example"), Some("1&1-IONOS"));
    // patterns are anchored
    assert_eq!(tables.match_provider("notawsdns-07.com"), None);
}

#[test]
fn test_missing_table_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let settings = TableSettings {
        hosting_providers: dir.path().join("missing.json").display().to_string(),
        ..bundled_settings()
    };

    let err = LookupTables::load(&settings).unwrap_err();
    assert!(matches!(err, TableError::Io { .. }));
    assert!(err.to_string().contains("missing.json"));
}

#[test]
fn test_bad_platform_pattern_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("platforms.json");
    std::fs::write(
        &path,
        r#"{"platforms":[{"name":"Broken","patterns":["wp-(content"]}]}"#,
    )
    .unwrap();
    let settings = TableSettings {
        platform_signatures: path.display().to_string(),
        ..bundled_settings()
    };

    match LookupTables::load(&settings).unwrap_err() {
        TableError::InvalidPattern { table, pattern, .. } => {
            assert_eq!(table, "platform_signatures");
            assert_eq!(pattern, "wp-(content");
        }
        other => panic!("unexpected error: {other}"),
    }
}
