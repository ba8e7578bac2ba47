use crate::error::{LicenseError, Result};
use crate::{LicenseCandidate, LicenseMatcher};
use async_trait::async_trait;
use std::path::Path;
use walkdir::WalkDir;

const MAX_LICENSE_FILE_BYTES: u64 = 512 * 1024;

/// Phrase-based matcher over license-looking file names.
///
/// Not a substitute for a full text-similarity corpus; covers the SPDX ids
/// that dominate the registry well enough for detection policy to act on.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordMatcher;

#[async_trait]
impl LicenseMatcher for KeywordMatcher {
    async fn candidates(&self, dir: &Path) -> Result<Vec<LicenseCandidate>> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || scan(&dir))
            .await
            .map_err(|e| LicenseError::MatcherFailed(e.to_string()))?
    }
}

fn scan(dir: &Path) -> Result<Vec<LicenseCandidate>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_ascii_uppercase();
        let looks_like_license = name.starts_with("LICENSE")
            || name.starts_with("LICENCE")
            || name.starts_with("COPYING")
            || name.starts_with("THIRD_PARTY_LICENSES")
            || name == "PATENTS"
            || name == "NOTICE";
        if !looks_like_license {
            continue;
        }
        if entry.metadata().map(|m| m.len()).unwrap_or(0) > MAX_LICENSE_FILE_BYTES {
            continue;
        }

        let contents = match std::fs::read_to_string(entry.path()) {
            Ok(contents) => contents,
            Err(_) => continue,
        };
        let relative = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        if let Some((spdx, confidence)) = classify(&contents) {
            found.push(LicenseCandidate {
                spdx_id: spdx.to_string(),
                file: relative,
                confidence,
            });
        }
    }
    Ok(found)
}

fn classify(text: &str) -> Option<(&'static str, f64)> {
    let folded: String = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if folded.contains("Mozilla Public License Version 2.0")
        || folded.contains("Mozilla Public License, v. 2.0")
    {
        return Some(("MPL-2.0", 0.99));
    }
    if folded.contains("Apache License") && folded.contains("Version 2.0") {
        return Some(("Apache-2.0", 0.99));
    }
    if folded.contains("GNU AFFERO GENERAL PUBLIC LICENSE") {
        return Some(("AGPL-3.0", 0.98));
    }
    if folded.contains("GNU GENERAL PUBLIC LICENSE") {
        if folded.contains("Version 3") {
            return Some(("GPL-3.0", 0.98));
        }
        if folded.contains("Version 2") {
            return Some(("GPL-2.0", 0.98));
        }
        return Some(("GPL-2.0", 0.86));
    }
    if folded.contains("GNU LESSER GENERAL PUBLIC LICENSE") {
        return Some(("LGPL-3.0", 0.95));
    }
    if folded.contains("Permission is hereby granted, free of charge") {
        // MIT and ISC share the grant sentence; the warranty clause differs.
        if folded.contains("The above copyright notice and this permission notice") {
            return Some(("MIT", 0.98));
        }
        return Some(("ISC", 0.90));
    }
    if folded.contains("Redistribution and use in source and binary forms") {
        if folded.contains("neither the name") || folded.contains("Neither the name") {
            return Some(("BSD-3-Clause", 0.97));
        }
        return Some(("BSD-2-Clause", 0.95));
    }
    if folded.contains("This is free and unencumbered software released into the public domain") {
        return Some(("Unlicense", 0.99));
    }
    None
}
