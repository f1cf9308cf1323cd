/*!
Format conversion engine.

Conversions follow a closed graph: each native kind has a fixed row of
allowed targets, and every allowed pair resolves to exactly one conversion
routine. A request outside the row fails with
[`FragmentError::UnsupportedConversion`] before any bytes are inspected; a
request inside the row that cannot be carried out (malformed source, encoder
error) fails with [`FragmentError::ConversionFailed`].
*/

mod raster;
mod text;

use crate::media::MediaKind;
use crate::observability;
use crate::{FragmentError, Result};
use bytes::Bytes;
use tracing::debug;

use crate::media::MediaKind::*;

/// Native kind -> allowed targets, including the native kind itself
const CONVERSIONS: &[(MediaKind, &[MediaKind])] = &[
    (Markdown, &[Markdown, Html, Plain]),
    (Html, &[Html, Plain]),
    (Csv, &[Csv, Plain, Json]),
    (Json, &[Json, Yaml, Plain]),
    (Yaml, &[Yaml, Plain]),
    (Plain, &[Plain]),
    (Png, &MediaKind::IMAGES),
    (Jpeg, &MediaKind::IMAGES),
    (Webp, &MediaKind::IMAGES),
    (Gif, &MediaKind::IMAGES),
    (Avif, AVIF_TARGETS),
];

/// AVIF sources can only be re-encoded when a decoder is compiled in
#[cfg(feature = "avif-decode")]
const AVIF_TARGETS: &[MediaKind] = &MediaKind::IMAGES;
#[cfg(not(feature = "avif-decode"))]
const AVIF_TARGETS: &[MediaKind] = &[Avif];

type TextConverter = fn(&[u8]) -> Result<Vec<u8>>;

/// How an allowed pair is carried out
#[derive(Clone, Copy)]
enum Route {
    Identity,
    Text(TextConverter),
    Image,
}

fn route(from: MediaKind, to: MediaKind) -> Option<Route> {
    if !allowed_targets(from).contains(&to) {
        return None;
    }
    if from == to {
        return Some(Route::Identity);
    }

    let route = match (from, to) {
        (Markdown, Html) => Route::Text(text::markdown_to_html),
        (Markdown, Plain) => Route::Text(text::markdown_to_plain),
        (Html, Plain) => Route::Text(text::html_to_plain),
        (Csv, Json) => Route::Text(text::csv_to_json),
        (Json, Yaml) => Route::Text(text::json_to_yaml),
        (Csv | Json | Yaml, Plain) => Route::Text(text::utf8_text),
        (from, to) if from.is_image() && to.is_image() => Route::Image,
        _ => return None,
    };
    Some(route)
}

/// Allowed conversion targets for a native kind
pub fn allowed_targets(native: MediaKind) -> &'static [MediaKind] {
    CONVERSIONS
        .iter()
        .find(|(kind, _)| *kind == native)
        .map(|(_, targets)| *targets)
        .unwrap_or(&[])
}

pub fn can_convert(from: MediaKind, to: MediaKind) -> bool {
    route(from, to).is_some()
}

/// Fail with `UnsupportedConversion` unless `to` is in `from`'s row
pub fn ensure_convertible(from: MediaKind, to: MediaKind) -> Result<()> {
    if can_convert(from, to) {
        Ok(())
    } else {
        Err(FragmentError::unsupported_conversion(from, to))
    }
}

/// Convert `data` stored as `from` into the `to` representation
pub fn convert(from: MediaKind, data: Bytes, to: MediaKind) -> Result<Bytes> {
    let route = route(from, to).ok_or_else(|| FragmentError::unsupported_conversion(from, to))?;
    debug!(from = %from, to = %to, size = data.len(), "Converting fragment data");

    let result = match route {
        Route::Identity => Ok(data),
        Route::Text(converter) => converter(&data).map(Bytes::from),
        Route::Image => raster::transcode(from, to, &data).map(Bytes::from),
    };

    observability::record_conversion(from, to, result.is_ok());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_a_row_containing_itself() {
        for kind in MediaKind::ALL {
            assert!(
                allowed_targets(kind).contains(&kind),
                "{kind} must convert to itself"
            );
        }
    }

    #[test]
    fn test_table_and_routes_agree() {
        for from in MediaKind::ALL {
            for to in MediaKind::ALL {
                assert_eq!(
                    allowed_targets(from).contains(&to),
                    can_convert(from, to),
                    "table and routes disagree for {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_text_rows() {
        assert_eq!(allowed_targets(Markdown), &[Markdown, Html, Plain]);
        assert_eq!(allowed_targets(Html), &[Html, Plain]);
        assert_eq!(allowed_targets(Csv), &[Csv, Plain, Json]);
        assert_eq!(allowed_targets(Json), &[Json, Yaml, Plain]);
        assert_eq!(allowed_targets(Yaml), &[Yaml, Plain]);
        assert_eq!(allowed_targets(Plain), &[Plain]);
    }

    #[test]
    fn test_text_and_images_never_mix() {
        for from in MediaKind::ALL {
            for to in MediaKind::ALL {
                if from.is_text() != to.is_text() {
                    assert!(!can_convert(from, to), "{from} -> {to} must be rejected");
                }
            }
        }
    }

    #[test]
    fn test_unsupported_pair_fails_before_touching_bytes() {
        // Garbage input: the pair check must fire first.
        let err = convert(Plain, Bytes::from_static(&[0xff, 0xfe]), Html).unwrap_err();
        assert!(matches!(err, FragmentError::UnsupportedConversion { .. }));

        let err = convert(Yaml, Bytes::new(), Json).unwrap_err();
        assert!(matches!(err, FragmentError::UnsupportedConversion { .. }));
        assert!(ensure_convertible(Html, Markdown).is_err());
    }

    #[test]
    fn test_identity_returns_bytes_unchanged() {
        let data = Bytes::from_static(b"\x00not really a png");
        assert_eq!(convert(Png, data.clone(), Png).unwrap(), data);

        let text = Bytes::from_static(b"hello");
        assert_eq!(convert(Plain, text.clone(), Plain).unwrap(), text);
    }

    #[test]
    fn test_csv_to_json_example() {
        let csv = Bytes::from_static(b"name,age\nJohn,30\nJane,25");
        let json = convert(Csv, csv, Json).unwrap();
        assert_eq!(
            std::str::from_utf8(&json).unwrap(),
            r#"[{"name":"John","age":"30"},{"name":"Jane","age":"25"}]"#
        );
    }

    #[test]
    fn test_markdown_to_html_example() {
        let html = convert(Markdown, Bytes::from_static(b"# Test"), Html).unwrap();
        assert!(std::str::from_utf8(&html).unwrap().contains("<h1>Test</h1>"));
    }

    #[cfg(not(feature = "avif-decode"))]
    #[test]
    fn test_avif_source_without_decoder_is_unsupported() {
        assert_eq!(allowed_targets(Avif), &[Avif]);
        let err = convert(Avif, Bytes::from_static(b"avif"), Png).unwrap_err();
        assert!(matches!(err, FragmentError::UnsupportedConversion { .. }));
        assert!(can_convert(Png, Avif));
    }

    #[cfg(feature = "avif-decode")]
    #[test]
    fn test_avif_row_covers_all_images() {
        assert_eq!(allowed_targets(Avif), &MediaKind::IMAGES);
    }

    #[test]
    fn test_malformed_source_is_conversion_failure() {
        let err = convert(Json, Bytes::from_static(b"{not json"), Yaml).unwrap_err();
        assert!(matches!(err, FragmentError::ConversionFailed(_)));

        let err = convert(Png, Bytes::from_static(b"not an image"), Jpeg).unwrap_err();
        assert!(matches!(err, FragmentError::ConversionFailed(_)));
    }
}
