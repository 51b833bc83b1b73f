use crate::filter::{Filter, FilterError, FilterParam};
use crate::model::Feature;
use crate::region::{Region, RegionWarning};

/// Pass records that lie fully inside at least one of the configured regions.
#[derive(Debug, Clone, Default)]
pub struct RegionFilter {
    regions: Vec<Region>,
    warnings: Vec<RegionWarning>,
}

impl RegionFilter {
    /// Parse every region up front; the first invalid one aborts construction.
    pub fn new(param: &FilterParam) -> Result<Self, FilterError> {
        let mut filter = Self::default();
        for spec in param.values() {
            let (region, warnings) = Region::parse(spec)?;
            for w in &warnings {
                log::warn!("{w}");
            }
            filter.regions.push(region);
            filter.warnings.extend(warnings);
        }
        Ok(filter)
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Bounds that were dropped while parsing.
    pub fn warnings(&self) -> &[RegionWarning] {
        &self.warnings
    }
}

impl Filter for RegionFilter {
    fn name(&self) -> &'static str {
        "region"
    }

    fn matches(&self, feature: &Feature) -> bool {
        self.regions.is_empty() || self.regions.iter().any(|r| r.contains(&feature.interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::io::parse_record_line;
    use crate::region::RegionError;

    // [8522, 9711) once parsed
    const INTER: &str = "140\tTwinscan\tinter\t8523\t9711\t.\t-\t.\tgene_id \"\"; transcript_id \"\"";

    fn feature() -> Feature {
        parse_record_line(INTER, 1, true).unwrap()
    }

    #[test]
    fn exact_region_contains_record() {
        let f = feature();
        let filter = RegionFilter::new(&"140:8523-9711".into()).unwrap();
        assert!(filter.matches(&f));
        assert!(filter.warnings().is_empty());
    }

    #[test]
    fn shifted_bounds_exclude_record() {
        let f = feature();
        for spec in ["140:8524-9711", "140:8523-9710", "141:8523-9711"] {
            let filter = RegionFilter::new(&spec.into()).unwrap();
            assert!(!filter.matches(&f), "{spec}");
        }
    }

    #[test]
    fn multiple_regions_are_a_union() {
        let f = feature();
        let filter = RegionFilter::new(&vec!["381:1-10", "140:8000-"].into()).unwrap();
        assert_eq!(filter.regions().len(), 2);
        assert!(filter.matches(&f));
    }

    #[test]
    fn dropped_bound_is_recorded() {
        let f = feature();
        let filter = RegionFilter::new(&"140:a-9711".into()).unwrap();
        assert_eq!(filter.warnings().len(), 1);
        assert!(filter.matches(&f));
    }

    #[test]
    fn invalid_region_aborts() {
        let err = RegionFilter::new(&vec!["140:1-5", "140:0-490"].into()).unwrap_err();
        assert!(matches!(err, FilterError::Region(RegionError::InvalidRegion { .. })));
    }

    #[test]
    fn no_regions_passes_everything() {
        assert!(RegionFilter::new(&FilterParam::Empty).unwrap().matches(&feature()));
    }
}
