//! CLI output formatting for every command.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Albums
//! 001 Holidays (2 files)
//!     001 beach.jpg
//!     002 waves.mp4 (video)
//!         missing: thumbnail, web-optimized
//!
//! 2 files in 1 album, 1 incomplete
//! ```
//!
//! ## Sync
//!
//! ```text
//! Generated 20 derivatives (2 already fresh, 1 failed)
//! 5 files still missing derivatives
//! Cleanup: deleted 3 orphans
//! Catalog: rebuilt
//! ```
//!
//! ## Check
//!
//! ```text
//! [ok]      Media directory: media (writable)
//! [warning] FFmpeg: not installed (video thumbnails will not work)
//!
//! Recommendations
//!     - Install FFmpeg to enable video thumbnail generation
//!
//! Overall: good (7/8 checks passed)
//! ```

use crate::catalog::Catalog;
use crate::health::{HealthReport, Status};
use crate::maintenance::MaintenanceReport;
use crate::sync::SyncReport;
use crate::types::{DerivativeKind, MediaKind};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 file`, `2 files`.
fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

// ============================================================================
// Scan
// ============================================================================

/// Catalog contents grouped by album, with missing derivatives called out.
pub fn format_scan_output(catalog: &Catalog) -> Vec<String> {
    let mut lines = vec!["Albums".to_string()];

    for (i, album) in catalog.albums.iter().enumerate() {
        let files: Vec<_> = catalog
            .all_files
            .iter()
            .filter(|a| &a.album == album)
            .collect();
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            album,
            plural(files.len(), "file")
        ));

        for (j, asset) in files.iter().enumerate() {
            let marker = match asset.kind {
                MediaKind::Video => " (video)",
                MediaKind::Image => "",
            };
            lines.push(format!(
                "{}{} {}{}",
                indent(1),
                format_index(j + 1),
                asset.filename,
                marker
            ));
            let missing: Vec<String> = DerivativeKind::ALL
                .iter()
                .filter(|k| !asset.has(**k))
                .map(|k| k.to_string())
                .collect();
            if !missing.is_empty() {
                lines.push(format!("{}missing: {}", indent(2), missing.join(", ")));
            }
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "{} in {}, {} incomplete",
        plural(catalog.all_files.len(), "file"),
        plural(catalog.albums.len(), "album"),
        catalog.incomplete_count()
    ));
    lines
}

pub fn print_scan_output(catalog: &Catalog) {
    for line in format_scan_output(catalog) {
        println!("{}", line);
    }
}

// ============================================================================
// Sync
// ============================================================================

pub fn format_sync_report(report: &SyncReport) -> Vec<String> {
    if let Some(banner) = &report.banner {
        return vec![format!("ERROR: {banner}")];
    }

    let mut lines = Vec::new();
    let mut extras = Vec::new();
    if report.already_fresh > 0 {
        extras.push(format!("{} already fresh", report.already_fresh));
    }
    if report.failed > 0 {
        extras.push(format!("{} failed", report.failed));
    }
    let summary = format!("Generated {}", plural(report.generated, "derivative"));
    if extras.is_empty() {
        lines.push(summary);
    } else {
        lines.push(format!("{summary} ({})", extras.join(", ")));
    }

    if report.over_ceiling {
        lines.push(format!(
            "Auto-sync skipped: {} missing derivatives, run `keepsake maintain`",
            plural(report.remaining, "file")
        ));
    } else if report.remaining > 0 {
        lines.push(format!(
            "{} still missing derivatives",
            plural(report.remaining, "file")
        ));
    }

    if report.cleanup_ran {
        lines.push(format!("Cleanup: deleted {}", plural(report.deleted, "orphan")));
    } else {
        lines.push("Cleanup: not due".to_string());
    }
    lines.push(format!(
        "Catalog: {}",
        if report.rebuilt { "rebuilt" } else { "cached" }
    ));
    lines
}

pub fn print_sync_report(report: &SyncReport) {
    for line in format_sync_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Maintenance
// ============================================================================

pub fn format_maintenance_report(report: &MaintenanceReport) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Media files: {} in {}",
            report.media_files,
            plural(report.albums, "album")
        ),
        format!("Thumbnails: {}", report.existing_thumbnails),
        format!("Web-optimized: {}", report.existing_web_optimized),
        format!("Orphaned cleaned: {}", report.orphans_deleted),
        format!("Empty folders removed: {}", report.empty_dirs_removed),
        format!("Generated thumbnails: {}", report.generated_thumbnails),
        format!("Generated web-optimized: {}", report.generated_web_optimized),
    ];
    if report.failed > 0 {
        lines.push(format!("Failed: {}", report.failed));
    }
    lines.push(
        if report.cache_cleared {
            "Cache cleared"
        } else {
            "No cache file found"
        }
        .to_string(),
    );
    lines
}

pub fn print_maintenance_report(report: &MaintenanceReport) {
    for line in format_maintenance_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

fn status_tag(status: Status) -> String {
    format!("{:<9}", format!("[{status}]"))
}

pub fn format_health_report(report: &HealthReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .items
        .iter()
        .map(|i| format!("{} {}: {}", status_tag(i.status), i.label, i.detail))
        .collect();

    if let Some(counts) = &report.counts {
        lines.push(String::new());
        lines.push("Media".to_string());
        lines.push(format!("{}Albums: {}", indent(1), counts.albums));
        lines.push(format!("{}Images: {}", indent(1), counts.images));
        lines.push(format!("{}Videos: {}", indent(1), counts.videos));
        lines.push(format!("{}Thumbnails: {}", indent(1), counts.thumbnails));
        lines.push(format!("{}Web-optimized: {}", indent(1), counts.web_optimized));
    }

    if !report.recommendations.is_empty() {
        lines.push(String::new());
        lines.push("Recommendations".to_string());
        for rec in &report.recommendations {
            lines.push(format!("{}- {}", indent(1), rec));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Overall: {} ({}/{} checks passed)",
        report.overall(),
        report.passed(),
        report.items.len()
    ));
    lines
}

pub fn print_health_report(report: &HealthReport) {
    for line in format_health_report(report) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{CheckItem, MediaCounts};
    use crate::types::MediaAsset;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(0, "file"), "0 files");
        assert_eq!(plural(1, "file"), "1 file");
        assert_eq!(plural(2, "album"), "2 albums");
    }

    #[test]
    fn status_tag_aligns() {
        assert_eq!(status_tag(Status::Ok), "[ok]     ");
        assert_eq!(status_tag(Status::Warning), "[warning]");
    }

    // =========================================================================
    // Scan
    // =========================================================================

    #[test]
    fn scan_output_groups_by_album() {
        let mut beach = MediaAsset::new("media", "Holidays", "beach.jpg", MediaKind::Image, 0, 0);
        beach.thumb_exists = true;
        beach.web_optimized_exists = true;
        let waves = MediaAsset::new("media", "Holidays", "waves.mp4", MediaKind::Video, 0, 0);
        let catalog = Catalog {
            all_files: vec![beach, waves],
            albums: vec!["Holidays".into(), "Empty".into()],
            generated: 0,
        };

        assert_eq!(
            format_scan_output(&catalog),
            vec![
                "Albums",
                "001 Holidays (2 files)",
                "    001 beach.jpg",
                "    002 waves.mp4 (video)",
                "        missing: thumbnail, web-optimized",
                "002 Empty (0 files)",
                "",
                "2 files in 2 albums, 1 incomplete",
            ]
        );
    }

    // =========================================================================
    // Sync
    // =========================================================================

    #[test]
    fn sync_banner_replaces_everything() {
        let report = SyncReport {
            banner: Some("Media directory not found: media".into()),
            ..SyncReport::default()
        };
        assert_eq!(
            format_sync_report(&report),
            vec!["ERROR: Media directory not found: media"]
        );
    }

    #[test]
    fn sync_summary_lines() {
        let report = SyncReport {
            generated: 20,
            already_fresh: 2,
            failed: 1,
            remaining: 5,
            deleted: 3,
            cleanup_ran: true,
            rebuilt: true,
            ..SyncReport::default()
        };
        assert_eq!(
            format_sync_report(&report),
            vec![
                "Generated 20 derivatives (2 already fresh, 1 failed)",
                "5 files still missing derivatives",
                "Cleanup: deleted 3 orphans",
                "Catalog: rebuilt",
            ]
        );
    }

    #[test]
    fn sync_quiet_run() {
        let report = SyncReport::default();
        assert_eq!(
            format_sync_report(&report),
            vec!["Generated 0 derivatives", "Cleanup: not due", "Catalog: cached"]
        );
    }

    #[test]
    fn sync_over_ceiling_points_to_maintain() {
        let report = SyncReport {
            over_ceiling: true,
            remaining: 150,
            ..SyncReport::default()
        };
        let lines = format_sync_report(&report);
        assert!(lines[1].contains("keepsake maintain"));
        assert!(lines[1].contains("150 files"));
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    #[test]
    fn maintenance_lines() {
        let report = MaintenanceReport {
            media_files: 31,
            albums: 1,
            generated_thumbnails: 31,
            generated_web_optimized: 30,
            failed: 1,
            cache_cleared: true,
            ..MaintenanceReport::default()
        };
        let lines = format_maintenance_report(&report);
        assert_eq!(lines[0], "Media files: 31 in 1 album");
        assert!(lines.contains(&"Generated web-optimized: 30".to_string()));
        assert!(lines.contains(&"Failed: 1".to_string()));
        assert_eq!(lines.last().unwrap(), "Cache cleared");
    }

    // =========================================================================
    // Check
    // =========================================================================

    #[test]
    fn health_report_layout() {
        let report = HealthReport {
            items: vec![
                CheckItem {
                    label: "Media directory".into(),
                    status: Status::Ok,
                    detail: "media (writable)".into(),
                },
                CheckItem {
                    label: "FFmpeg".into(),
                    status: Status::Warning,
                    detail: "not installed".into(),
                },
            ],
            counts: Some(MediaCounts {
                albums: 1,
                images: 2,
                videos: 1,
                thumbnails: 3,
                web_optimized: 3,
            }),
            recommendations: vec!["Install FFmpeg".into()],
        };
        let lines = format_health_report(&report);
        assert_eq!(lines[0], "[ok]      Media directory: media (writable)");
        assert_eq!(lines[1], "[warning] FFmpeg: not installed");
        assert!(lines.contains(&"    Videos: 1".to_string()));
        assert!(lines.contains(&"    - Install FFmpeg".to_string()));
        assert_eq!(lines.last().unwrap(), "Overall: needs attention (1/2 checks passed)");
    }
}
