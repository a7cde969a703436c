// respira-core/src/analytics.rs

//! Read-only queries over the loaded hospitalization records.
//!
//! Every function here is deterministic and side-effect free. Argument
//! coercion from model-supplied JSON happens in [`crate::tools`]; these
//! functions take typed inputs and only fail with [`ToolError`] when the
//! request itself is out of range or the data has nothing to say.

use crate::dataset::{Dataset, normalize_city};
use crate::errors::ToolError;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::Arc;

/// Ages outside this range are treated as data-entry errors by the age-group queries.
pub const MIN_PLAUSIBLE_AGE: i64 = 0;
pub const MAX_PLAUSIBLE_AGE: i64 = 120;

/// `0-9, 10-19, ..., 80-89, 90+`
pub const AGE_GROUP_COUNT: usize = 10;
const AGE_GROUP_WIDTH: i64 = 10;

/// Which end of the sorted unique ages to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeRange {
    Smallest,
    Largest,
    Both,
}

impl AgeRange {
    pub const NAMES: [&'static str; 3] = ["smallest", "largest", "both"];
}

impl FromStr for AgeRange {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "smallest" => Ok(AgeRange::Smallest),
            "largest" => Ok(AgeRange::Largest),
            "both" => Ok(AgeRange::Both),
            _ => Err(ToolError::invalid(format!(
                "Invalid value '{}' for 'mode'. Use 'smallest', 'largest' or 'both'.",
                s
            ))),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum TopAges {
    Smallest(Vec<i64>),
    Largest(Vec<i64>),
    Both { smallest: Vec<i64>, largest: Vec<i64> },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AgeGroupCount {
    pub age_group: String,
    pub count: usize,
    pub percent: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CityCount {
    pub city: String,
    pub admissions: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DiagnosisCount {
    pub diagnosis: String,
    pub count: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub name: String,
    pub rows: usize,
    pub columns: Vec<String>,
}

/// Label of the age group with the given index (`0..AGE_GROUP_COUNT`).
pub fn age_group_label(index: usize) -> String {
    let lower = index as i64 * AGE_GROUP_WIDTH;
    if index + 1 == AGE_GROUP_COUNT {
        format!("{}+", lower)
    } else {
        format!("{}-{}", lower, lower + AGE_GROUP_WIDTH - 1)
    }
}

fn age_group_index(age: i64) -> usize {
    ((age / AGE_GROUP_WIDTH) as usize).min(AGE_GROUP_COUNT - 1)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Query engine bound to one immutable dataset.
#[derive(Debug, Clone)]
pub struct Analytics {
    dataset: Arc<Dataset>,
}

impl Analytics {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self { dataset }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    fn ages(&self) -> impl Iterator<Item = i64> + '_ {
        self.dataset.admissions().iter().filter_map(|r| r.age)
    }

    fn plausible_ages(&self) -> impl Iterator<Item = i64> + '_ {
        self.ages()
            .filter(|age| (MIN_PLAUSIBLE_AGE..=MAX_PLAUSIBLE_AGE).contains(age))
    }

    /// Highest recorded age.
    pub fn max_age(&self) -> Result<i64, ToolError> {
        self.ages()
            .max()
            .ok_or_else(|| ToolError::no_data("No age data available."))
    }

    /// The `n` smallest and/or largest unique ages. Largest ages are listed
    /// from the oldest down.
    pub fn top_ages(&self, n: usize, range: AgeRange) -> Result<TopAges, ToolError> {
        if n == 0 {
            return Err(ToolError::invalid("Parameter 'n' must be >= 1."));
        }
        let unique: BTreeSet<i64> = self.ages().collect();
        if unique.is_empty() {
            return Err(ToolError::no_data("No age data available."));
        }
        let smallest = || unique.iter().take(n).copied().collect::<Vec<_>>();
        let largest = || unique.iter().rev().take(n).copied().collect::<Vec<_>>();
        Ok(match range {
            AgeRange::Smallest => TopAges::Smallest(smallest()),
            AgeRange::Largest => TopAges::Largest(largest()),
            AgeRange::Both => TopAges::Both {
                smallest: smallest(),
                largest: largest(),
            },
        })
    }

    /// Admissions per ten-year age group, ordered by the group's lower bound.
    ///
    /// All groups are present even when empty. Percentages are of the
    /// in-range total and are all zero when that total is zero.
    pub fn admission_age_groups(&self) -> Vec<AgeGroupCount> {
        let mut counts = [0usize; AGE_GROUP_COUNT];
        for age in self.plausible_ages() {
            counts[age_group_index(age)] += 1;
        }
        let total: usize = counts.iter().sum();
        counts
            .iter()
            .enumerate()
            .map(|(index, &count)| AgeGroupCount {
                age_group: age_group_label(index),
                count,
                percent: if total > 0 {
                    round_to(count as f64 / total as f64 * 100.0, 2)
                } else {
                    0.0
                },
            })
            .collect()
    }

    /// The age group with the most admissions; ties go to the youngest group.
    pub fn top_admission_age_group(&self) -> Result<AgeGroupCount, ToolError> {
        let groups = self.admission_age_groups();
        if groups.iter().all(|g| g.count == 0) {
            return Err(ToolError::no_data("No age data available."));
        }
        let mut best: Option<AgeGroupCount> = None;
        for group in groups {
            if best.as_ref().is_none_or(|b| group.count > b.count) {
                best = Some(group);
            }
        }
        best.ok_or_else(|| ToolError::no_data("No age data available."))
    }

    /// Cities with the most respiratory-disease admissions.
    pub fn top_cities(&self, n: usize) -> Result<Vec<CityCount>, ToolError> {
        if n == 0 {
            return Err(ToolError::invalid("Parameter 'n' must be >= 1."));
        }
        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in self.dataset.admissions().iter().filter(|r| r.is_respiratory()) {
            if let Some(city) = record.normalized_city() {
                *counts.entry(city).or_default() += 1;
            }
        }
        let mut ranked: Vec<CityCount> = counts
            .into_iter()
            .map(|(city, admissions)| CityCount { city, admissions })
            .collect();
        ranked.sort_by(|a, b| b.admissions.cmp(&a.admissions).then_with(|| a.city.cmp(&b.city)));
        ranked.truncate(n);
        Ok(ranked)
    }

    fn respiratory_in<'a>(
        &'a self,
        city: &str,
        year: i32,
    ) -> impl Iterator<Item = &'a crate::dataset::AdmissionRecord> + 'a {
        let city = normalize_city(city);
        self.dataset.admissions().iter().filter(move |r| {
            r.is_respiratory()
                && r.year == Some(year)
                && r.normalized_city().as_deref() == Some(city.as_str())
        })
    }

    /// Respiratory-disease admissions of residents of `city` in `year`.
    pub fn total_hospitalizations(&self, city: &str, year: i32) -> usize {
        self.respiratory_in(city, year).count()
    }

    /// Mean total cost of those admissions (records without a cost are skipped).
    pub fn average_cost(&self, city: &str, year: i32) -> f64 {
        let (sum, n) = self
            .respiratory_in(city, year)
            .filter_map(|r| r.total_cost)
            .fold((0.0, 0usize), |(sum, n), cost| (sum + cost, n + 1));
        if n == 0 { 0.0 } else { round_to(sum / n as f64, 2) }
    }

    /// Share of those admissions that ended in death, between 0 and 1.
    pub fn mortality_rate(&self, city: &str, year: i32) -> f64 {
        let (deaths, total) = self
            .respiratory_in(city, year)
            .fold((0usize, 0usize), |(d, t), r| (d + usize::from(r.died), t + 1));
        if total == 0 {
            0.0
        } else {
            round_to(deaths as f64 / total as f64, 4)
        }
    }

    /// Most frequent respiratory diagnosis codes for `city` in `year`.
    pub fn top_diagnoses(&self, city: &str, year: i32, n: usize) -> Result<Vec<DiagnosisCount>, ToolError> {
        if n == 0 {
            return Err(ToolError::invalid("Parameter 'n' must be >= 1."));
        }
        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in self.respiratory_in(city, year) {
            if let Some(code) = record.diagnosis.as_deref() {
                *counts.entry(code.trim().to_uppercase()).or_default() += 1;
            }
        }
        let mut ranked: Vec<DiagnosisCount> = counts
            .into_iter()
            .map(|(diagnosis, count)| DiagnosisCount { diagnosis, count })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.diagnosis.cmp(&b.diagnosis)));
        ranked.truncate(n);
        Ok(ranked)
    }

    /// Every loaded table with its size and columns.
    pub fn list_datasets(&self) -> Vec<TableSummary> {
        let mut summaries = vec![TableSummary {
            name: "admissions".to_string(),
            rows: self.dataset.admissions().len(),
            columns: [
                "DIAG_PRINC",
                "IDADE",
                "CIDADE_RESIDENCIA_PACIENTE",
                "DT_INTER",
                "DT_SAIDA",
                "VAL_TOT",
                "MORTE",
                "ano",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        }];
        summaries.extend(self.dataset.tables().iter().map(|t| TableSummary {
            name: t.name.clone(),
            rows: t.rows.len(),
            columns: t.headers.clone(),
        }));
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{AdmissionRecord, Table};
    use serde_json::json;

    fn with_ages(ages: &[i64]) -> Analytics {
        let records = ages
            .iter()
            .map(|&age| AdmissionRecord {
                age: Some(age),
                ..Default::default()
            })
            .collect();
        Analytics::new(Arc::new(Dataset::from_admissions(records)))
    }

    fn admission(diagnosis: &str, city: Option<&str>, year: i32) -> AdmissionRecord {
        AdmissionRecord {
            diagnosis: Some(diagnosis.to_string()),
            city: city.map(str::to_string),
            year: Some(year),
            ..Default::default()
        }
    }

    #[test]
    fn top_ages_scenario() {
        let analytics = with_ages(&[5, 5, 12, 47, 90, 91]);
        assert_eq!(
            analytics.top_ages(2, AgeRange::Smallest).unwrap(),
            TopAges::Smallest(vec![5, 12])
        );
        assert_eq!(
            analytics.top_ages(2, AgeRange::Largest).unwrap(),
            TopAges::Largest(vec![91, 90])
        );
        let both = analytics.top_ages(1, AgeRange::Both).unwrap();
        assert_eq!(
            serde_json::to_value(&both).unwrap(),
            json!({ "smallest": [5], "largest": [91] })
        );
    }

    #[test]
    fn top_ages_returns_at_most_unique_count() {
        let analytics = with_ages(&[30, 30, 10, 20]);
        for n in 1..=6 {
            match analytics.top_ages(n, AgeRange::Smallest).unwrap() {
                TopAges::Smallest(ages) => {
                    assert_eq!(ages.len(), n.min(3));
                    assert!(ages.windows(2).all(|w| w[0] < w[1]));
                    assert!(ages.iter().all(|a| [10, 20, 30].contains(a)));
                }
                other => panic!("unexpected shape {:?}", other),
            }
        }
    }

    #[test]
    fn top_ages_without_data_or_with_zero_n() {
        let empty = Analytics::new(Arc::new(Dataset::default()));
        assert!(matches!(empty.top_ages(3, AgeRange::Both), Err(ToolError::NoData(_))));
        let analytics = with_ages(&[1]);
        assert!(matches!(
            analytics.top_ages(0, AgeRange::Both),
            Err(ToolError::InvalidArgument(_))
        ));
    }

    #[test]
    fn age_range_parsing() {
        assert_eq!(" Largest ".parse::<AgeRange>().unwrap(), AgeRange::Largest);
        assert!(matches!("oldest".parse::<AgeRange>(), Err(ToolError::InvalidArgument(_))));
    }

    #[test]
    fn age_group_labels() {
        assert_eq!(age_group_label(0), "0-9");
        assert_eq!(age_group_label(8), "80-89");
        assert_eq!(age_group_label(9), "90+");
        assert_eq!(age_group_index(9), 0);
        assert_eq!(age_group_index(10), 1);
        assert_eq!(age_group_index(120), 9);
    }

    #[test]
    fn age_groups_exclude_implausible_ages_and_sum_to_total() {
        let analytics = with_ages(&[-1, 0, 9, 10, 55, 89, 90, 120, 121, 300]);
        let groups = analytics.admission_age_groups();
        assert_eq!(groups.len(), AGE_GROUP_COUNT);
        let total: usize = groups.iter().map(|g| g.count).sum();
        assert_eq!(total, 7);
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[9].count, 2);
        assert_eq!(groups[3].count, 0);
        let percent: f64 = groups.iter().map(|g| g.percent).sum();
        assert!((percent - 100.0).abs() < 0.05, "percent sum was {}", percent);
        let labels: Vec<&str> = groups.iter().map(|g| g.age_group.as_str()).collect();
        assert_eq!(labels[0], "0-9");
        assert_eq!(labels[9], "90+");
    }

    #[test]
    fn age_groups_with_no_ages_are_all_zero() {
        let analytics = with_ages(&[150, -3]);
        let groups = analytics.admission_age_groups();
        assert_eq!(groups.len(), AGE_GROUP_COUNT);
        assert!(groups.iter().all(|g| g.count == 0 && g.percent == 0.0));
        assert!(matches!(analytics.top_admission_age_group(), Err(ToolError::NoData(_))));
    }

    #[test]
    fn top_admission_age_group_scenario() {
        let analytics = with_ages(&[1, 4, 9]);
        let top = analytics.top_admission_age_group().unwrap();
        assert_eq!(top.age_group, "0-9");
        assert_eq!(top.count, 3);
        assert_eq!(top.percent, 100.0);
    }

    #[test]
    fn top_admission_age_group_ties_go_to_the_youngest_group() {
        let analytics = with_ages(&[25, 26, 70, 71]);
        let top = analytics.top_admission_age_group().unwrap();
        assert_eq!(top.age_group, "20-29");
    }

    #[test]
    fn top_cities_counts_only_respiratory_admissions() {
        let records = vec![
            admission("J18", Some("Porto Alegre"), 2019),
            admission("J45", Some(" porto alegre "), 2019),
            admission("I10", Some("Santa Maria"), 2019),
            admission("I11", Some("Santa Maria"), 2019),
            admission("I12", Some("Santa Maria"), 2019),
            admission("J12", Some("Pelotas"), 2020),
            admission("j20", Some("Canoas"), 2020),
            admission("J10", None, 2020),
            admission("J11", Some("   "), 2020),
        ];
        let analytics = Analytics::new(Arc::new(Dataset::from_admissions(records)));
        let top = analytics.top_cities(2).unwrap();
        assert_eq!(
            top,
            vec![
                CityCount { city: "PORTO ALEGRE".to_string(), admissions: 2 },
                CityCount { city: "CANOAS".to_string(), admissions: 1 },
            ]
        );
        let all = analytics.top_cities(10).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].admissions >= w[1].admissions));
        assert!(all.iter().all(|c| c.city != "SANTA MARIA"));
    }

    #[test]
    fn city_year_statistics() {
        let mut records = vec![
            admission("J18", Some("Santa Maria"), 2020),
            admission("J18", Some("SANTA MARIA"), 2020),
            admission("J45", Some("Santa Maria"), 2020),
            admission("J45", Some("Santa Maria"), 2019),
            admission("I10", Some("Santa Maria"), 2020),
        ];
        records[0].total_cost = Some(100.0);
        records[1].total_cost = Some(250.5);
        records[1].died = true;
        let analytics = Analytics::new(Arc::new(Dataset::from_admissions(records)));

        assert_eq!(analytics.total_hospitalizations("santa maria", 2020), 3);
        assert_eq!(analytics.average_cost("Santa Maria", 2020), 175.25);
        assert_eq!(analytics.mortality_rate("Santa Maria", 2020), 0.3333);
        assert_eq!(
            analytics.top_diagnoses("Santa Maria", 2020, 5).unwrap(),
            vec![
                DiagnosisCount { diagnosis: "J18".to_string(), count: 2 },
                DiagnosisCount { diagnosis: "J45".to_string(), count: 1 },
            ]
        );

        assert_eq!(analytics.total_hospitalizations("Pelotas", 2020), 0);
        assert_eq!(analytics.average_cost("Pelotas", 2020), 0.0);
        assert_eq!(analytics.mortality_rate("Pelotas", 2020), 0.0);
    }

    #[test]
    fn list_datasets_includes_auxiliary_tables() {
        let dataset = Dataset::new(
            vec![AdmissionRecord::default()],
            vec![Table {
                name: "idh".to_string(),
                headers: vec!["Município".to_string(), "IDHM".to_string()],
                rows: vec![vec!["São Borja".to_string(), "0,736".to_string()]],
            }],
        );
        let summaries = Analytics::new(Arc::new(dataset)).list_datasets();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "admissions");
        assert_eq!(summaries[0].rows, 1);
        assert_eq!(summaries[1].name, "idh");
        assert_eq!(summaries[1].columns, vec!["Município", "IDHM"]);
    }

    #[test]
    fn max_age() {
        assert_eq!(with_ages(&[3, 77, 12]).max_age().unwrap(), 77);
        assert!(with_ages(&[]).max_age().is_err());
    }
}
