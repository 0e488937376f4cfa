//! Format catalog: filter raw engine formats down to downloadable video
//! variants, rank them, and decide whether the user has to pick one.

use std::cmp::Reverse;

use crate::core::config::selection::{GOOD_FORMAT_MIN_HEIGHT, MAX_PRESENTED_FORMATS, MIN_FORMAT_HEIGHT};

use super::models::{FormatSelector, MediaFormat};

/// Whether a format survives filtering.
///
/// A height of 0 is treated like a missing height (unknown), not as sub-minimum.
pub fn is_downloadable(format: &MediaFormat) -> bool {
    if format.is_audio_only() {
        return false;
    }
    if !matches!(format.url.as_deref(), Some(url) if !url.is_empty()) {
        return false;
    }
    if format.note.to_lowercase().contains("unavailable") {
        return false;
    }
    if matches!(format.height, Some(h) if h > 0 && h < MIN_FORMAT_HEIGHT) {
        return false;
    }
    format.filesize != Some(0)
}

/// Drop non-downloadable formats and sort the rest by height, tallest first.
///
/// Missing heights rank as 0. The sort is stable, so equal heights keep the
/// engine's original order.
pub fn filter_and_rank(raw_formats: Vec<MediaFormat>) -> Vec<MediaFormat> {
    let mut formats: Vec<MediaFormat> = raw_formats.into_iter().filter(is_downloadable).collect();
    formats.sort_by_key(|f| Reverse(f.height.unwrap_or(0)));
    formats
}

/// Ranked formats that meet the minimum quality bar for user-facing selection
pub fn good_formats(ranked: &[MediaFormat]) -> impl Iterator<Item = &MediaFormat> {
    ranked
        .iter()
        .filter(|f| f.height.unwrap_or(0) >= GOOD_FORMAT_MIN_HEIGHT)
}

/// One entry of the user-facing quality choice
#[derive(Debug, Clone, PartialEq)]
pub enum FormatChoice {
    Format(MediaFormat),
    /// Synthetic "best available" option
    BestAvailable,
}

impl FormatChoice {
    pub fn selector(&self) -> FormatSelector {
        match self {
            Self::Format(format) => FormatSelector::Id(format.format_id.clone()),
            Self::BestAvailable => FormatSelector::Best,
        }
    }
}

/// What the caller must do before a download can start
#[derive(Debug, Clone, PartialEq)]
pub enum FormatSelection {
    /// More than one good format: ask the user
    Required { choices: Vec<FormatChoice> },
    /// Proceed with this selector without asking
    Automatic(FormatSelector),
}

impl FormatSelection {
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Required { .. })
    }
}

/// Selection policy over an already ranked list
pub fn select(ranked: &[MediaFormat]) -> FormatSelection {
    let good: Vec<&MediaFormat> = good_formats(ranked).collect();
    if good.len() <= 1 {
        return FormatSelection::Automatic(FormatSelector::Best);
    }

    let mut choices: Vec<FormatChoice> = good
        .into_iter()
        .take(MAX_PRESENTED_FORMATS)
        .cloned()
        .map(FormatChoice::Format)
        .collect();
    choices.push(FormatChoice::BestAvailable);
    FormatSelection::Required { choices }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fmt(id: &str, height: Option<u32>) -> MediaFormat {
        MediaFormat {
            format_id: id.to_string(),
            height,
            ext: "mp4".to_string(),
            codec_video: Some("avc1".to_string()),
            codec_audio: Some("mp4a".to_string()),
            url: Some(format!("https://cdn.example.com/{}", id)),
            ..Default::default()
        }
    }

    fn ids(formats: &[MediaFormat]) -> Vec<&str> {
        formats.iter().map(|f| f.format_id.as_str()).collect()
    }

    #[test]
    fn test_filter_drops_each_bad_kind() {
        let audio_only = MediaFormat {
            codec_video: Some("none".to_string()),
            ..fmt("audio", Some(720))
        };
        let no_url = MediaFormat { url: None, ..fmt("nourl", Some(720)) };
        let empty_url = MediaFormat {
            url: Some(String::new()),
            ..fmt("emptyurl", Some(720))
        };
        let unavailable = MediaFormat {
            note: "Premium - UNAVAILABLE".to_string(),
            ..fmt("unavail", Some(1080))
        };
        let tiny = fmt("tiny", Some(96));
        let corrupt = MediaFormat {
            filesize: Some(0),
            ..fmt("corrupt", Some(480))
        };
        let ok = fmt("ok", Some(360));

        let ranked = filter_and_rank(vec![audio_only, no_url, empty_url, unavailable, tiny, corrupt, ok]);
        assert_eq!(ids(&ranked), vec!["ok"]);
    }

    #[test]
    fn test_filter_keeps_boundary_and_unknown_heights() {
        let ranked = filter_and_rank(vec![fmt("h144", Some(144)), fmt("h0", Some(0)), fmt("none", None)]);
        assert_eq!(ids(&ranked), vec!["h144", "h0", "none"]);
    }

    #[test]
    fn test_rank_descending_and_stable() {
        let ranked = filter_and_rank(vec![
            fmt("a360", Some(360)),
            fmt("unknown", None),
            fmt("b720", Some(720)),
            fmt("c360", Some(360)),
            fmt("d720", Some(720)),
            fmt("e1080", Some(1080)),
        ]);
        assert_eq!(ids(&ranked), vec!["e1080", "b720", "d720", "a360", "c360", "unknown"]);

        let heights: Vec<u32> = ranked.iter().map(|f| f.height.unwrap_or(0)).collect();
        assert!(heights.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_filter_is_idempotent() {
        let raw = vec![
            fmt("a", Some(480)),
            MediaFormat { url: None, ..fmt("b", Some(720)) },
            fmt("c", Some(1080)),
            fmt("d", Some(100)),
        ];
        let once = filter_and_rank(raw);
        let twice = filter_and_rank(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_two_good_formats_require_selection() {
        let ranked = filter_and_rank(vec![fmt("480", Some(480)), fmt("720", Some(720)), fmt("240", Some(240))]);
        let selection = select(&ranked);
        assert_eq!(
            selection,
            FormatSelection::Required {
                choices: vec![
                    FormatChoice::Format(fmt("720", Some(720))),
                    FormatChoice::Format(fmt("480", Some(480))),
                    FormatChoice::BestAvailable,
                ]
            }
        );
    }

    #[test]
    fn test_single_good_format_is_automatic() {
        let ranked = filter_and_rank(vec![fmt("720", Some(720)), fmt("240", Some(240)), fmt("x", None)]);
        assert_eq!(select(&ranked), FormatSelection::Automatic(FormatSelector::Best));
        assert_eq!(select(&[]), FormatSelection::Automatic(FormatSelector::Best));
    }

    #[test]
    fn test_selection_caps_presented_formats() {
        let raw = (1..=8).map(|i| fmt(&i.to_string(), Some(300 + i * 100))).collect();
        let ranked = filter_and_rank(raw);
        let FormatSelection::Required { choices } = select(&ranked) else {
            panic!("selection should be required");
        };
        assert_eq!(choices.len(), MAX_PRESENTED_FORMATS + 1);
        assert_eq!(choices[0].selector(), FormatSelector::Id("8".to_string()));
        assert_eq!(choices.last(), Some(&FormatChoice::BestAvailable));
        assert_eq!(choices.last().map(FormatChoice::selector), Some(FormatSelector::Best));
    }
}
