//! Extracted registry entries and their tabular layout.

use std::collections::BTreeMap;

/// Output column order. The sink writes exactly these columns.
pub const RECORD_COLUMNS: &[&str] = &[
    "bar",
    "name",
    "professional_title",
    "office",
    "street",
    "zip",
    "city",
    "zip_city_raw",
    "email",
    "mobile_phone",
    "telephone",
    "telefax",
    "date_of_admission",
    "date_of_first_admission",
    "bar_membership",
    "bea_safe_id",
    "form_of_address",
    "first_name_last_name",
    "detail_professional_title",
    "detail_office",
    "detail_street",
    "internet_address",
    "court_appointment_interest",
];

/// Normalized detail labels whose column name differs from the label.
const DETAIL_COLUMN_RENAMES: &[(&str, &str)] = &[
    ("professional_title", "detail_professional_title"),
    ("law_office", "detail_office"),
    ("office_address", "detail_street"),
    ("bea_safeid", "bea_safe_id"),
    (
        "interest_for_getting_appointed_by_court_as_defence_counsel",
        "court_appointment_interest",
    ),
];

/// Normalize a human-readable detail label: lowercase, hyphens removed,
/// spaces replaced with underscores.
pub fn normalize_label(label: &str) -> String {
    label.to_lowercase().replace('-', "").replace(' ', "_")
}

/// Map a detail label to its output column name.
pub fn detail_column(label: &str) -> String {
    let normalized = normalize_label(label);
    DETAIL_COLUMN_RENAMES
        .iter()
        .find(|(from, _)| *from == normalized)
        .map(|(_, to)| to.to_string())
        .unwrap_or(normalized)
}

/// One registry entry from a result card, optionally enriched with details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRecord {
    /// Jurisdiction (bar) label the record was found under.
    pub jurisdiction: String,
    pub name: String,
    pub professional_title: String,
    pub office: String,
    pub street: String,
    pub zip: String,
    pub city: String,
    /// The postal-code line as shown, before splitting.
    pub zip_city_raw: String,
    /// Component id of the card's detail link, if the card has one.
    pub detail_link_id: Option<String>,
    /// Detail fields keyed by output column name.
    pub details: BTreeMap<String, String>,
}

impl ResultRecord {
    /// Value for an output column; unknown columns come from the details map.
    pub fn column(&self, column: &str) -> &str {
        match column {
            "bar" => &self.jurisdiction,
            "name" => &self.name,
            "professional_title" => &self.professional_title,
            "office" => &self.office,
            "street" => &self.street,
            "zip" => &self.zip,
            "city" => &self.city,
            "zip_city_raw" => &self.zip_city_raw,
            other => self.details.get(other).map(|s| s.as_str()).unwrap_or(""),
        }
    }

    /// Merge detail fields; existing keys are kept.
    pub fn merge_details(&mut self, details: BTreeMap<String, String>) {
        for (key, value) in details {
            self.details.entry(key).or_insert(value);
        }
    }

    /// Row in [`RECORD_COLUMNS`] order.
    pub fn to_row(&self) -> Vec<&str> {
        RECORD_COLUMNS.iter().map(|c| self.column(c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_column_mapping() {
        assert_eq!(detail_column("E-Mail"), "email");
        assert_eq!(detail_column("Law office"), "detail_office");
        assert_eq!(detail_column("beA SAFE-ID"), "bea_safe_id");
        assert_eq!(detail_column("Date of admission"), "date_of_admission");
        assert_eq!(
            detail_column("Interest for getting appointed by court as defence counsel"),
            "court_appointment_interest"
        );
    }

    #[test]
    fn test_row_follows_column_order() {
        let mut record = ResultRecord {
            jurisdiction: "Berlin".into(),
            name: "Dr. Max Mustermann".into(),
            zip: "10115".into(),
            ..Default::default()
        };
        record.merge_details(BTreeMap::from([("email".to_string(), "max@example.org".to_string())]));

        let row = record.to_row();
        assert_eq!(row.len(), RECORD_COLUMNS.len());
        assert_eq!(row[0], "Berlin");
        assert_eq!(row[1], "Dr. Max Mustermann");
        assert_eq!(row[5], "10115");
        assert_eq!(row[8], "max@example.org");
        assert_eq!(record.column("telefax"), "");
    }

    #[test]
    fn test_merge_details_keeps_existing() {
        let mut record = ResultRecord::default();
        record.merge_details(BTreeMap::from([("email".to_string(), "a@x".to_string())]));
        record.merge_details(BTreeMap::from([("email".to_string(), "b@x".to_string())]));
        assert_eq!(record.column("email"), "a@x");
    }
}
