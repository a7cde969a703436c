// respira-core/src/tools/handlers.rs

//! Typed handlers and advertised schemas for every [`ToolId`].

use super::ToolId;
use super::args;
use crate::analytics::{AgeRange, Analytics};
use crate::errors::ToolError;
use crate::models::tools::{
    ToolDefinition, ToolInput, ToolParameter, ToolParameterType, ToolParametersDefinition,
};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Signature shared by every tool handler.
pub type Handler = fn(&Analytics, &ToolInput) -> Result<Value, ToolError>;

const DEFAULT_TOP_N: usize = 5;

pub(super) fn handler_for(id: ToolId) -> Handler {
    match id {
        ToolId::GetTopAges => get_top_ages,
        ToolId::GetMaxAge => get_max_age,
        ToolId::GetAdmissionAgeGroups => get_admission_age_groups,
        ToolId::GetTopAdmissionAgeGroup => get_top_admission_age_group,
        ToolId::GetTopCities => get_top_cities,
        ToolId::TotalHospitalizations => total_hospitalizations,
        ToolId::AvgCost => avg_cost,
        ToolId::MortalityRate => mortality_rate,
        ToolId::TopDiagnoses => top_diagnoses,
        ToolId::ListDatasets => list_datasets,
    }
}

fn get_top_ages(analytics: &Analytics, input: &ToolInput) -> Result<Value, ToolError> {
    let n = args::positive_count(input, "n", None)?;
    let mode: AgeRange = args::text(input, "mode")?.parse()?;
    Ok(json!(analytics.top_ages(n, mode)?))
}

fn get_max_age(analytics: &Analytics, _input: &ToolInput) -> Result<Value, ToolError> {
    Ok(json!(analytics.max_age()?))
}

fn get_admission_age_groups(analytics: &Analytics, _input: &ToolInput) -> Result<Value, ToolError> {
    Ok(json!(analytics.admission_age_groups()))
}

fn get_top_admission_age_group(analytics: &Analytics, _input: &ToolInput) -> Result<Value, ToolError> {
    Ok(json!(analytics.top_admission_age_group()?))
}

fn get_top_cities(analytics: &Analytics, input: &ToolInput) -> Result<Value, ToolError> {
    let n = args::positive_count(input, "n", Some(DEFAULT_TOP_N))?;
    Ok(json!(analytics.top_cities(n)?))
}

fn total_hospitalizations(analytics: &Analytics, input: &ToolInput) -> Result<Value, ToolError> {
    let city = args::text(input, "city")?;
    let year = args::year(input, "year")?;
    Ok(json!(analytics.total_hospitalizations(city, year)))
}

fn avg_cost(analytics: &Analytics, input: &ToolInput) -> Result<Value, ToolError> {
    let city = args::text(input, "city")?;
    let year = args::year(input, "year")?;
    Ok(json!(analytics.average_cost(city, year)))
}

fn mortality_rate(analytics: &Analytics, input: &ToolInput) -> Result<Value, ToolError> {
    let city = args::text(input, "city")?;
    let year = args::year(input, "year")?;
    Ok(json!(analytics.mortality_rate(city, year)))
}

fn top_diagnoses(analytics: &Analytics, input: &ToolInput) -> Result<Value, ToolError> {
    let city = args::text(input, "city")?;
    let year = args::year(input, "year")?;
    let n = args::positive_count(input, "n", Some(DEFAULT_TOP_N))?;
    Ok(json!(analytics.top_diagnoses(city, year, n)?))
}

fn list_datasets(analytics: &Analytics, _input: &ToolInput) -> Result<Value, ToolError> {
    Ok(json!(analytics.list_datasets()))
}

fn object_schema(params: Vec<(&str, ToolParameter, bool)>) -> ToolParametersDefinition {
    let mut properties = BTreeMap::new();
    let mut required = Vec::new();
    for (name, param, is_required) in params {
        if is_required {
            required.push(name.to_string());
        }
        properties.insert(name.to_string(), param);
    }
    ToolParametersDefinition {
        param_type: "object".to_string(),
        properties,
        required,
    }
}

fn city_year_params() -> Vec<(&'static str, ToolParameter, bool)> {
    vec![
        (
            "city",
            ToolParameter::new(
                ToolParameterType::String,
                "Municipality of residence, e.g. \"Santa Maria\". Case-insensitive.",
            ),
            true,
        ),
        (
            "year",
            ToolParameter::new(ToolParameterType::Integer, "Year of admission, e.g. 2020."),
            true,
        ),
    ]
}

pub(super) fn definition_for(id: ToolId) -> ToolDefinition {
    let (description, parameters) = match id {
        ToolId::GetTopAges => (
            "Returns the n smallest and/or largest unique patient ages in the admissions data. \
             mode 'smallest' gives an ascending list, 'largest' a descending list and 'both' \
             an object with both lists.",
            object_schema(vec![
                (
                    "n",
                    ToolParameter::new(ToolParameterType::Integer, "How many ages to return (>= 1)."),
                    true,
                ),
                (
                    "mode",
                    ToolParameter::new(ToolParameterType::String, "Which end of the age range to report.")
                        .with_enum(&AgeRange::NAMES),
                    true,
                ),
            ]),
        ),
        ToolId::GetMaxAge => (
            "Returns the highest patient age in the admissions data.",
            ToolParametersDefinition::empty(),
        ),
        ToolId::GetAdmissionAgeGroups => (
            "Returns the number and percentage of admissions in each ten-year age group \
             (0-9 up to 90+), ordered from youngest to oldest.",
            ToolParametersDefinition::empty(),
        ),
        ToolId::GetTopAdmissionAgeGroup => (
            "Returns the age group with the most admissions, with its count and percentage.",
            ToolParametersDefinition::empty(),
        ),
        ToolId::GetTopCities => (
            "Returns the cities with the most admissions for respiratory disease (ICD-10 chapter J).",
            object_schema(vec![(
                "n",
                ToolParameter::new(ToolParameterType::Integer, "How many cities to return (>= 1, default 5)."),
                false,
            )]),
        ),
        ToolId::TotalHospitalizations => (
            "Returns the total number of respiratory-disease admissions for a city in a year.",
            object_schema(city_year_params()),
        ),
        ToolId::AvgCost => (
            "Returns the average total cost (VAL_TOT) of respiratory-disease admissions for a city in a year.",
            object_schema(city_year_params()),
        ),
        ToolId::MortalityRate => (
            "Returns the share of respiratory-disease admissions that ended in death (0 to 1) \
             for a city in a year.",
            object_schema(city_year_params()),
        ),
        ToolId::TopDiagnoses => (
            "Returns the most frequent respiratory diagnosis codes for a city in a year.",
            {
                let mut params = city_year_params();
                params.push((
                    "n",
                    ToolParameter::new(ToolParameterType::Integer, "How many diagnoses to return (default 5)."),
                    false,
                ));
                object_schema(params)
            },
        ),
        ToolId::ListDatasets => (
            "Lists the loaded tables with their row counts and column names.",
            ToolParametersDefinition::empty(),
        ),
    };
    ToolDefinition {
        name: id.as_str().to_string(),
        description: description.to_string(),
        parameters,
    }
}
