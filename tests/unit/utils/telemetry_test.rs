// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sitescout::utils::telemetry;

#[test]
fn test_telemetry_initialization() {
    telemetry::init_telemetry(false);

    tracing::debug!("This is a debug message");
    tracing::info!(stage = "hosting", outcome = "found", "Structured message");
    tracing::warn!(error = "timeout", "Resolver failed");
}
