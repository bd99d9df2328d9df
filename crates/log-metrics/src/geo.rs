//! 좌표 추출 및 geohash 버킷
//!
//! 로그의 `geo.latlon` 문자열(`"<lat>,<lon>"`)에서 좌표를 뽑아 고정 길이
//! geohash 레이블로 바꿉니다. 추출 과정의 모든 실패는 [`Coordinates`]의
//! 필드로 표현되며 패닉하거나 에러를 반환하지 않습니다.

use std::fmt;

use pipemetrics_core::metrics::LABEL_GEO_HASH;
use tracing::warn;

use crate::LabelSet;
use crate::error::GeoError;
use crate::record::LogRecord;

/// 좌표를 얻지 못했을 때의 geohash 레이블 값
pub const GEO_HASH_MISSING: &str = "missing";

/// 기본 geohash 길이
pub const DEFAULT_PRECISION: usize = 2;

/// 허용되는 최대 geohash 길이
pub const MAX_PRECISION: usize = 12;

/// geohash 길이 (1..=12)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoPrecision(usize);

impl GeoPrecision {
    /// 설정값으로 길이를 만듭니다. 범위를 벗어나면 기본값으로 대체합니다.
    pub fn new(requested: usize) -> Self {
        if (1..=MAX_PRECISION).contains(&requested) {
            Self(requested)
        } else {
            warn!(
                requested,
                fallback = DEFAULT_PRECISION,
                "geo hash precision out of range, using default"
            );
            Self(DEFAULT_PRECISION)
        }
    }

    /// 길이를 반환합니다.
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for GeoPrecision {
    fn default() -> Self {
        Self(DEFAULT_PRECISION)
    }
}

/// 좌표 추출 결과
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coordinates {
    /// 원본 위도 문자열
    pub raw_lat: String,
    /// 원본 경도 문자열
    pub raw_lon: String,
    /// 위도
    pub lat: f64,
    /// 경도
    pub lon: f64,
    /// `geo` 객체가 없거나 객체가 아님
    pub missing_geo: bool,
    /// `geo.latlon`이 없거나 문자열이 아님
    pub missing_lat_lon: bool,
    /// 두 부분으로 나눌 수 없음
    pub extract_error: Option<GeoError>,
    /// 숫자로 변환할 수 없거나 인코딩 범위를 벗어남
    pub convert_error: Option<GeoError>,
}

impl Coordinates {
    /// 모든 플래그가 정상이면 유효합니다.
    pub fn is_valid(&self) -> bool {
        !self.missing_geo
            && !self.missing_lat_lon
            && self.extract_error.is_none()
            && self.convert_error.is_none()
    }

    /// 원본/파싱 값이 모두 비어 있고 에러가 없는 "논리적 0" 상태인지 확인합니다.
    ///
    /// 누락 플래그는 보지 않으므로 빈 레코드의 추출 결과도 0으로 취급됩니다.
    pub fn is_zero(&self) -> bool {
        self.raw_lat.is_empty()
            && self.raw_lon.is_empty()
            && self.lat == 0.0
            && self.lon == 0.0
            && self.extract_error.is_none()
            && self.convert_error.is_none()
    }

    /// 무효 사유를 에러 싱크용 한 줄 메시지로 만듭니다. 유효하면 `None`입니다.
    pub fn diagnostic(&self) -> Option<String> {
        if self.is_valid() {
            None
        } else {
            Some(self.to_string())
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.missing_geo {
            write!(f, "geo hash: 'geo' object missing from log line")
        } else if self.missing_lat_lon {
            write!(f, "geo hash: 'geo.latlon' string missing from log line")
        } else if let Some(err) = &self.extract_error {
            write!(f, "geo hash: extract failed: {err}")
        } else if let Some(err) = &self.convert_error {
            write!(f, "geo hash: convert failed: {err}")
        } else {
            write!(f, "geo hash: lat {} lon {}", self.lat, self.lon)
        }
    }
}

/// 레코드에서 좌표를 추출합니다.
pub fn extract(record: &LogRecord) -> Coordinates {
    let mut coords = Coordinates::default();

    let Some(geo) = record.get("geo").as_object() else {
        coords.missing_geo = true;
        coords.missing_lat_lon = true;
        return coords;
    };

    let Some(latlon) = geo.get("latlon").as_str() else {
        coords.missing_lat_lon = true;
        return coords;
    };

    let parts: Vec<&str> = latlon.split(',').collect();
    let [lat, lon] = parts.as_slice() else {
        coords.extract_error = Some(GeoError::Extract {
            raw: latlon.to_owned(),
        });
        return coords;
    };
    let (lat, lon) = (lat.trim(), lon.trim());
    if lat.is_empty() || lon.is_empty() {
        coords.extract_error = Some(GeoError::Extract {
            raw: latlon.to_owned(),
        });
        return coords;
    }

    coords.raw_lat = lat.to_owned();
    coords.raw_lon = lon.to_owned();

    match (lat.parse::<f64>(), lon.parse::<f64>()) {
        (Ok(lat), Ok(lon)) => {
            coords.lat = lat;
            coords.lon = lon;
        }
        _ => {
            coords.convert_error = Some(GeoError::Convert {
                lat: lat.to_owned(),
                lon: lon.to_owned(),
            });
        }
    }

    coords
}

/// 레이블 집합에 `geo_hash` 레이블을 추가한 사본과 추출 결과를 반환합니다.
///
/// - 입력 레이블이 비어 있으면 `{geo_hash: "missing"}`과 0 상태 결과
/// - 좌표가 무효이면 `"missing"`과 무효 결과
/// - 유효하면 지정 길이의 geohash
pub fn to_hash(
    labels: &LabelSet,
    record: &LogRecord,
    precision: GeoPrecision,
) -> (LabelSet, Coordinates) {
    let mut out = labels.clone();

    if labels.is_empty() {
        out.insert(LABEL_GEO_HASH.to_owned(), GEO_HASH_MISSING.to_owned());
        return (out, Coordinates::default());
    }

    let mut coords = extract(record);
    let hash = if coords.is_valid() {
        match encode(coords.lat, coords.lon, precision) {
            Some(hash) => hash,
            None => {
                coords.convert_error = Some(GeoError::OutOfRange {
                    lat: coords.lat,
                    lon: coords.lon,
                });
                GEO_HASH_MISSING.to_owned()
            }
        }
    } else {
        GEO_HASH_MISSING.to_owned()
    };

    out.insert(LABEL_GEO_HASH.to_owned(), hash);
    (out, coords)
}

/// `geo_hash` 레이블을 뺀 사본을 반환합니다.
pub fn scrub(labels: &LabelSet) -> LabelSet {
    labels
        .iter()
        .filter(|(k, _)| k.as_str() != LABEL_GEO_HASH)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// 상한 경계 안쪽 오프셋. 12자리 셀(약 1.7e-7도)보다 충분히 작음
const EDGE_NUDGE: f64 = 1e-9;

fn encode(lat: f64, lon: f64, precision: GeoPrecision) -> Option<String> {
    if !lat.is_finite() || !lon.is_finite() {
        return None;
    }
    // 정확히 90/180이면 반대편 셀로 감기므로 마지막 셀 안으로 당김
    let lat = if lat == 90.0 { lat - EDGE_NUDGE } else { lat };
    let lon = if lon == 180.0 { lon - EDGE_NUDGE } else { lon };
    geohash::encode(geohash::Coord { x: lon, y: lat }, precision.get()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(raw: &str) -> LogRecord {
        LogRecord::from_slice(raw.as_bytes()).unwrap()
    }

    fn with_latlon(latlon: &str) -> LogRecord {
        record(&format!(r#"{{"geo":{{"latlon":"{latlon}"}}}}"#))
    }

    fn labels() -> LabelSet {
        LabelSet::from([("status".to_owned(), "200".to_owned())])
    }

    #[test]
    fn valid_pair() {
        let coords = extract(&with_latlon("1.1,2.2"));
        assert!(coords.is_valid());
        assert_eq!(coords.lat, 1.1);
        assert_eq!(coords.lon, 2.2);
        assert_eq!(coords.raw_lat, "1.1");
        assert!(coords.diagnostic().is_none());
    }

    #[test]
    fn whitespace_around_parts_is_ignored() {
        let coords = extract(&with_latlon(" -33.86 , 151.2 "));
        assert!(coords.is_valid());
        assert_eq!(coords.lat, -33.86);
    }

    #[test]
    fn extract_errors() {
        for latlon in ["1.1,", "-33.86010", ",-33.86010", " , ", "1,2,3"] {
            let coords = extract(&with_latlon(latlon));
            assert!(
                matches!(coords.extract_error, Some(GeoError::Extract { .. })),
                "input {latlon:?}"
            );
            assert!(!coords.is_valid());
            assert!(coords.convert_error.is_none());
        }
    }

    #[test]
    fn convert_errors() {
        for latlon in ["-,-", "-k,+a", "north,east"] {
            let coords = extract(&with_latlon(latlon));
            assert!(
                matches!(coords.convert_error, Some(GeoError::Convert { .. })),
                "input {latlon:?}"
            );
            assert!(coords.extract_error.is_none());
            assert!(!coords.is_valid());
        }
    }

    #[test]
    fn missing_geo_sets_both_flags() {
        let coords = extract(&record(r#"{"status":"200"}"#));
        assert!(coords.missing_geo);
        assert!(coords.missing_lat_lon);
        assert!(!coords.is_valid());
        // 누락만 있는 결과는 여전히 0 상태
        assert!(coords.is_zero());
    }

    #[test]
    fn geo_not_an_object_is_missing_geo() {
        let coords = extract(&record(r#"{"geo":"1.1,2.2"}"#));
        assert!(coords.missing_geo);
    }

    #[test]
    fn latlon_not_a_string_is_missing_lat_lon() {
        let coords = extract(&record(r#"{"geo":{"latlon":[1.1,2.2]}}"#));
        assert!(!coords.missing_geo);
        assert!(coords.missing_lat_lon);
        let coords = extract(&record(r#"{"geo":{}}"#));
        assert!(coords.missing_lat_lon);
    }

    #[test]
    fn error_result_is_not_zero() {
        assert!(!extract(&with_latlon("-k,+a")).is_zero());
        assert!(!extract(&with_latlon("1.1,")).is_zero());
        assert!(!extract(&with_latlon("1.1,2.2")).is_zero());
    }

    #[test]
    fn hash_length_matches_precision() {
        for precision in 1..=MAX_PRECISION {
            let (out, coords) = to_hash(
                &labels(),
                &with_latlon("-33.8601,151.2101"),
                GeoPrecision::new(precision),
            );
            assert!(coords.is_valid());
            assert_eq!(out[LABEL_GEO_HASH].len(), precision);
            assert_eq!(out["status"], "200");
        }
    }

    #[test]
    fn known_hash_value() {
        let (out, _) = to_hash(&labels(), &with_latlon("57.64911,10.40744"), GeoPrecision::new(5));
        assert_eq!(out[LABEL_GEO_HASH], "u4pru");
    }

    #[test]
    fn upper_bounds_stay_in_edge_cell() {
        let hash = |latlon: &str| {
            to_hash(&labels(), &with_latlon(latlon), GeoPrecision::new(5)).0[LABEL_GEO_HASH].clone()
        };
        assert_eq!(hash("90,0"), "upbpb");
        assert_eq!(hash("0,180"), "xbpbp");
        assert_eq!(hash("90,180"), "zzzzz");
        assert_eq!(hash("-90,-180"), "00000");
    }

    #[test]
    fn invalid_coordinates_hash_to_missing() {
        let (out, coords) = to_hash(&labels(), &with_latlon("1.1,"), GeoPrecision::default());
        assert_eq!(out[LABEL_GEO_HASH], GEO_HASH_MISSING);
        assert!(coords.extract_error.is_some());
        assert!(coords.diagnostic().unwrap().contains("extract failed"));
    }

    #[test]
    fn out_of_range_coordinates_are_convert_errors() {
        let (out, coords) = to_hash(&labels(), &with_latlon("95.0,10.0"), GeoPrecision::default());
        assert_eq!(out[LABEL_GEO_HASH], GEO_HASH_MISSING);
        assert!(matches!(
            coords.convert_error,
            Some(GeoError::OutOfRange { .. })
        ));
    }

    #[test]
    fn empty_labels_yield_missing_and_zero_result() {
        let (out, coords) = to_hash(
            &LabelSet::new(),
            &with_latlon("1.1,2.2"),
            GeoPrecision::default(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[LABEL_GEO_HASH], GEO_HASH_MISSING);
        assert!(coords.is_zero());
    }

    #[test]
    fn scrub_removes_only_geo_hash() {
        let (hashed, _) = to_hash(&labels(), &with_latlon("1.1,2.2"), GeoPrecision::default());
        let scrubbed = scrub(&hashed);
        assert_eq!(scrubbed, labels());
        // 원본은 그대로
        assert!(hashed.contains_key(LABEL_GEO_HASH));
    }

    #[test]
    fn precision_falls_back_when_out_of_range() {
        assert_eq!(GeoPrecision::new(0).get(), DEFAULT_PRECISION);
        assert_eq!(GeoPrecision::new(13).get(), DEFAULT_PRECISION);
        assert_eq!(GeoPrecision::new(12).get(), 12);
        assert_eq!(GeoPrecision::new(1).get(), 1);
    }

    #[test]
    fn diagnostics_name_the_failure() {
        let missing = extract(&record("{}")).diagnostic().unwrap();
        assert!(missing.contains("'geo' object missing"));
        let convert = extract(&with_latlon("-k,+a")).diagnostic().unwrap();
        assert!(convert.contains("convert failed"));
        assert!(convert.contains("-k"));
    }
}
