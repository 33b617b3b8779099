// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::integration::helpers::bundled_tables;
use sitescout::domain::services::exclusion_filter::ExclusionFilter;

fn filter() -> ExclusionFilter {
    ExclusionFilter::new(bundled_tables())
}

#[test]
fn test_listed_domains_in_any_form() {
    let filter = filter();
    for url in [
        "justeat.it",
        "https://www.justeat.it/menu/pizzeria",
        "HTTP://JUSTEAT.IT",
        "https://lecce.justeat.it",
    ] {
        assert!(filter.should_exclude(url), "{url} should be excluded");
    }
}

#[test]
fn test_platforms_and_institutions() {
    let filter = filter();
    assert!(filter.should_exclude("https://m.facebook.com/pizzeriaroma"));
    assert!(filter.should_exclude("https://www.tripadvisor.it/Restaurant_Review"));
    assert!(filter.should_exclude("https://www.comune.lecce.it"));
    assert!(filter.should_exclude("https://liceo.edu.it"));
    assert!(filter.should_exclude("/url?q=https://www.instagram.com/bar&sa=U"));
}

#[test]
fn test_independent_sites_are_kept() {
    let filter = filter();
    for url in [
        "https://pizzeria-roma.it",
        "www.bar-centrale.com/contatti",
        "http://127.0.0.1:8080",
    ] {
        assert!(!filter.should_exclude(url), "{url} should be kept");
    }
}

#[test]
fn test_blank_website_is_excluded() {
    let filter = filter();
    assert!(filter.should_exclude(""));
    assert!(filter.should_exclude("   "));
}
