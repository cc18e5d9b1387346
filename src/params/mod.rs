use crate::error::{ViewerError, ViewerResult};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Radial slice counts offered by the control panel.
pub const RADIAL_SLICE_OPTIONS: [u32; 3] = [1, 2, 4];

/// Query keys in wire order: sagittal slices, radial slices, thickness,
/// height, length.
pub const QUERY_KEYS: [&str; 5] = ["ns", "nr", "d", "h", "w"];

/// Requested mesh geometry. Fields are validated on construction, so any
/// value of this type is safe to put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterSet {
    sagittal_slices: u32,
    radial_slices: u32,
    thickness: f64,
    height: f64,
    length: f64,
}

impl ParameterSet {
    pub fn new(
        sagittal_slices: u32,
        radial_slices: u32,
        thickness: f64,
        height: f64,
        length: f64,
    ) -> ViewerResult<Self> {
        check_count("ns", sagittal_slices)?;
        check_count("nr", radial_slices)?;
        check_distance("d", thickness)?;
        check_distance("h", height)?;
        check_distance("w", length)?;
        Ok(Self {
            sagittal_slices,
            radial_slices,
            thickness,
            height,
            length,
        })
    }

    /// Parses the raw control-panel text into canonical numeric form, so
    /// `"20"` and `"20.0"` describe the same submission.
    pub fn parse(raw: &RawParameters) -> ViewerResult<Self> {
        Self::new(
            parse_count("ns", &raw.ns)?,
            parse_count("nr", &raw.nr)?,
            parse_distance("d", &raw.d)?,
            parse_distance("h", &raw.h)?,
            parse_distance("w", &raw.w)?,
        )
    }

    pub fn sagittal_slices(&self) -> u32 {
        self.sagittal_slices
    }

    pub fn radial_slices(&self) -> u32 {
        self.radial_slices
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn query_pairs(&self) -> [(&'static str, String); 5] {
        let [ns, nr, d, h, w] = QUERY_KEYS;
        [
            (ns, self.sagittal_slices.to_string()),
            (nr, self.radial_slices.to_string()),
            (d, self.thickness.to_string()),
            (h, self.height.to_string()),
            (w, self.length.to_string()),
        ]
    }

    pub fn request_url(&self, endpoint: &Url) -> Url {
        let mut url = endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            for (key, value) in self.query_pairs() {
                query.append_pair(key, &value);
            }
        }
        url
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            sagittal_slices: 2,
            radial_slices: 4,
            thickness: 20.0,
            height: 30.0,
            length: 40.0,
        }
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs = self.query_pairs();
        for (index, (key, value)) in pairs.iter().enumerate() {
            if index > 0 {
                f.write_str("&")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

/// Control-panel field values exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawParameters {
    pub ns: String,
    pub nr: String,
    pub d: String,
    pub h: String,
    pub w: String,
}

impl RawParameters {
    pub fn new(
        ns: impl Into<String>,
        nr: impl Into<String>,
        d: impl Into<String>,
        h: impl Into<String>,
        w: impl Into<String>,
    ) -> Self {
        Self {
            ns: ns.into(),
            nr: nr.into(),
            d: d.into(),
            h: h.into(),
            w: w.into(),
        }
    }
}

fn check_count(field: &'static str, value: u32) -> ViewerResult<()> {
    if value == 0 {
        return Err(ViewerError::InvalidParameter {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn check_distance(field: &'static str, value: f64) -> ViewerResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ViewerError::InvalidParameter {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn parse_count(field: &'static str, text: &str) -> ViewerResult<u32> {
    text.trim()
        .parse::<u32>()
        .map_err(|_| ViewerError::InvalidParameter {
            field,
            value: text.to_string(),
        })
}

fn parse_distance(field: &'static str, text: &str) -> ViewerResult<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| ViewerError::InvalidParameter {
            field,
            value: text.to_string(),
        })
}

/// True unless `new` matches the last submitted tuple field for field. With
/// no previous submission every tuple passes.
pub fn should_submit(new: &ParameterSet, last: Option<&ParameterSet>) -> bool {
    last != Some(new)
}

/// Remembers the last *submitted* tuple, which is updated as soon as a
/// request is issued rather than when its response arrives.
#[derive(Debug, Default, Clone)]
pub struct ParameterGate {
    last_submitted: Option<ParameterSet>,
}

impl ParameterGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, params: &ParameterSet) -> bool {
        if !should_submit(params, self.last_submitted.as_ref()) {
            debug!("[gate] suppressed duplicate submission {params}");
            return false;
        }
        self.last_submitted = Some(*params);
        true
    }

    /// Forgets `params` if it is still the last submission, so the same
    /// tuple can be submitted again after a failed load.
    pub fn release(&mut self, params: &ParameterSet) {
        if self.last_submitted.as_ref() == Some(params) {
            debug!("[gate] released {params} for resubmission");
            self.last_submitted = None;
        }
    }

    pub fn last_submitted(&self) -> Option<&ParameterSet> {
        self.last_submitted.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_fields_to_canonical_numbers() {
        let a = ParameterSet::parse(&RawParameters::new("2", "4", "20", "30", "40"))
            .expect("valid parameters");
        let b = ParameterSet::parse(&RawParameters::new(" 2", "4", "20.0", "30", "4e1"))
            .expect("valid parameters");
        assert_eq!(a, b);
        assert_eq!(a, ParameterSet::default());
    }

    #[test]
    fn rejects_missing_or_non_positive_fields() {
        let err = ParameterSet::parse(&RawParameters::new("2", "4", "", "30", "40"))
            .expect_err("empty thickness");
        assert!(matches!(err, ViewerError::InvalidParameter { field: "d", .. }));

        let err = ParameterSet::parse(&RawParameters::new("0", "4", "20", "30", "40"))
            .expect_err("zero slices");
        assert!(matches!(err, ViewerError::InvalidParameter { field: "ns", .. }));

        assert!(ParameterSet::new(2, 4, 20.0, -1.0, 40.0).is_err());
        assert!(ParameterSet::new(2, 4, 20.0, 30.0, f64::NAN).is_err());
    }

    #[test]
    fn query_uses_wire_keys_in_order() {
        let endpoint = Url::parse("http://localhost:3000/index.js").expect("url");
        let url = ParameterSet::default().request_url(&endpoint);
        assert_eq!(url.query(), Some("ns=2&nr=4&d=20&h=30&w=40"));
        assert_eq!(ParameterSet::default().to_string(), "ns=2&nr=4&d=20&h=30&w=40");

        let fractional = ParameterSet::new(3, 1, 12.5, 30.0, 40.25).expect("valid");
        assert_eq!(
            fractional.request_url(&endpoint).query(),
            Some("ns=3&nr=1&d=12.5&h=30&w=40.25")
        );
    }

    #[test]
    fn first_submission_always_passes() {
        let mut gate = ParameterGate::new();
        assert!(gate.last_submitted().is_none());
        assert!(gate.admit(&ParameterSet::default()));
        assert!(!gate.admit(&ParameterSet::default()));
    }

    #[test]
    fn any_changed_field_passes() {
        let base = ParameterSet::default();
        let variants = [
            ParameterSet::new(3, 4, 20.0, 30.0, 40.0),
            ParameterSet::new(2, 2, 20.0, 30.0, 40.0),
            ParameterSet::new(2, 4, 21.0, 30.0, 40.0),
            ParameterSet::new(2, 4, 20.0, 31.0, 40.0),
            ParameterSet::new(2, 4, 20.0, 30.0, 41.0),
        ];
        for variant in variants {
            let variant = variant.expect("valid variant");
            assert!(should_submit(&variant, Some(&base)));
        }
    }

    #[test]
    fn release_only_forgets_matching_submission() {
        let mut gate = ParameterGate::new();
        let first = ParameterSet::default();
        let second = ParameterSet::new(3, 4, 20.0, 30.0, 40.0).expect("valid");
        gate.admit(&first);
        gate.admit(&second);

        gate.release(&first);
        assert_eq!(gate.last_submitted(), Some(&second));

        gate.release(&second);
        assert!(gate.admit(&second));
    }
}
