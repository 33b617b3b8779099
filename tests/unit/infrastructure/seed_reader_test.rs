// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sitescout::domain::models::query::ListingQuery;
use sitescout::infrastructure::seed_reader::{read_keywords, read_localities};
use tempfile::TempDir;

#[test]
fn test_seed_files_expand_to_every_combination() {
    let dir = TempDir::new().unwrap();
    let keywords = dir.path().join("keywords.csv");
    let localities = dir.path().join("localities.csv");
    // exported spreadsheets often carry a byte order mark
    std::fs::write(&keywords, "\u{feff}Keyword;note\npizzeria;food\n idraulico ;trade\n").unwrap();
    std::fs::write(&localities, "locality\nLecce\nGallipoli\n\n").unwrap();

    let keywords = read_keywords(&keywords).unwrap();
    let localities = read_localities(&localities).unwrap();
    assert_eq!(keywords, vec!["pizzeria", "idraulico"]);

    let queries = ListingQuery::combinations(&keywords, &localities, "it", 5, false);
    let texts: Vec<String> = queries.iter().map(ListingQuery::search_text).collect();
    assert_eq!(
        texts,
        vec![
            "pizzeria Lecce",
            "pizzeria Gallipoli",
            "idraulico Lecce",
            "idraulico Gallipoli"
        ]
    );
}

#[test]
fn test_missing_seed_file_names_the_path() {
    let dir = TempDir::new().unwrap();
    let err = read_keywords(dir.path().join("absent.csv")).unwrap_err();
    assert!(format!("{err:#}").contains("absent.csv"));
}
