// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::integration::helpers::bundled_tables;
use sitescout::domain::services::technology_resolver::{TechnologyOptions, TechnologyResolver};
use sitescout::engines::reqwest_engine::ReqwestEngine;
use std::sync::Arc;

fn resolver() -> TechnologyResolver {
    TechnologyResolver::new(
        Arc::new(ReqwestEngine::new("sitescout-test").unwrap()),
        None,
        bundled_tables(),
        TechnologyOptions::default(),
    )
}

#[test]
fn test_woocommerce_store_is_identified_over_wordpress() {
    let page = r#"<link rel="stylesheet" href="/wp-content/plugins/woocommerce/assets/css/woocommerce.css">"#;
    assert_eq!(resolver().identify(page, &[], None).as_deref(), Some("WooCommerce"));
}

#[test]
fn test_plain_wordpress_is_not_refined() {
    let page = r#"<link rel="stylesheet" href="/wp-content/themes/twentytwenty/style.css">"#;
    assert_eq!(resolver().identify(page, &[], None).as_deref(), Some("WordPress"));
}

#[test]
fn test_bundled_builder_refinement() {
    let page = r#"<div data-builder-version="3">Realizzato con Sitonline</div>"#;
    assert_eq!(resolver().identify(page, &[], None).as_deref(), Some("Sitonline"));
}
