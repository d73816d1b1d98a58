/// Bitrate threshold and re-encode target for a quality tier, in Mb/s
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityProfile {
    /// Files above this average bitrate get re-encoded
    pub target_bitrate_mbps: f64,
    /// Bitrate the re-encode aims for
    pub conversion_bitrate_mbps: f64,
}

/// Substring rules, checked in order; the first match wins
const PROFILES: &[(&str, QualityProfile)] = &[
    (
        "720",
        QualityProfile {
            target_bitrate_mbps: 2.5,
            conversion_bitrate_mbps: 1.0,
        },
    ),
    (
        "1080",
        QualityProfile {
            target_bitrate_mbps: 3.5,
            conversion_bitrate_mbps: 2.0,
        },
    ),
];

/// Map a free-text quality label (e.g. "WEBDL-1080p") to its profile.
///
/// Returns `None` for labels that match no rule; callers treat that as
/// nothing to do rather than an error.
pub fn classify(quality_label: &str) -> Option<QualityProfile> {
    PROFILES
        .iter()
        .find(|(needle, _)| quality_label.contains(needle))
        .map(|(_, profile)| *profile)
}
