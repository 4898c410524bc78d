use std::collections::HashMap;

use chrono::NaiveDate;
use csv::StringRecord;

use super::dates::parse_date;
use super::labels::split_labels;

/// Logical columns the importer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Email,
    Phone,
    Name,
    FirstName,
    LastName,
    Birthday,
    Street,
    City,
    State,
    Zip,
    Country,
    Labels,
}

/// Accepted header names per field, in priority order. Headers are compared
/// after [`normalize_header`].
pub const FIELD_SYNONYMS: &[(Field, &[&str])] = &[
    (
        Field::Email,
        &["email", "e-mail", "email address", "e-mail address", "mail"],
    ),
    (
        Field::Phone,
        &["phone", "phone number", "mobile", "mobile number", "contact", "contact number"],
    ),
    (Field::Name, &["name", "full name"]),
    (Field::FirstName, &["first name", "firstname", "given name"]),
    (Field::LastName, &["last name", "lastname", "surname", "family name"]),
    (
        Field::Birthday,
        &["birthday", "date of birth", "dob", "birth date"],
    ),
    (
        Field::Street,
        &["street", "street address", "address", "address line 1"],
    ),
    (Field::City, &["city", "town"]),
    (Field::State, &["state", "province", "region"]),
    (
        Field::Zip,
        &["zip", "zip code", "zipcode", "postal code", "postcode", "pincode"],
    ),
    (Field::Country, &["country"]),
    (Field::Labels, &["labels", "tags", "label", "tag"]),
];

/// Lowercase, `_` as space, runs of whitespace collapsed.
pub fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Where each known field lives in the file.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    columns: HashMap<Field, usize>,
}

impl ColumnMap {
    pub fn from_headers(headers: &StringRecord) -> Self {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
        let mut columns = HashMap::new();
        for (field, synonyms) in FIELD_SYNONYMS {
            let hit = synonyms
                .iter()
                .find_map(|s| normalized.iter().position(|h| h == s));
            if let Some(idx) = hit {
                columns.insert(*field, idx);
            }
        }
        ColumnMap { columns }
    }

    pub fn has(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    /// Trimmed, non-empty value of `field` in `record`.
    pub fn get<'r>(&self, record: &'r StringRecord, field: Field) -> Option<&'r str> {
        self.columns
            .get(&field)
            .and_then(|&idx| record.get(idx))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn row(&self, record: &StringRecord) -> ImportRow {
        let owned = |f| self.get(record, f).map(str::to_string);

        let name = owned(Field::Name).or_else(|| {
            let joined = [self.get(record, Field::FirstName), self.get(record, Field::LastName)]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            (!joined.is_empty()).then_some(joined)
        });

        ImportRow {
            email: owned(Field::Email).map(|e| e.to_lowercase()),
            phone: owned(Field::Phone),
            name,
            birthday: self.get(record, Field::Birthday).and_then(parse_date),
            street: owned(Field::Street),
            city: owned(Field::City),
            state: owned(Field::State),
            zip_code: owned(Field::Zip),
            country: owned(Field::Country),
            labels: self
                .get(record, Field::Labels)
                .map(split_labels)
                .unwrap_or_default(),
        }
    }
}

/// One normalized input row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportRow {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
    /// Unparseable dates are dropped, not reported.
    pub birthday: Option<NaiveDate>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub labels: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn headers_are_matched_loosely() {
        let map = ColumnMap::from_headers(&rec(&[" E-Mail ", "Mobile", "Date_of   Birth", "TAGS"]));
        assert!(map.has(Field::Email));
        assert!(map.has(Field::Phone));
        assert!(map.has(Field::Birthday));
        assert!(map.has(Field::Labels));
        assert!(!map.has(Field::Name));
    }

    #[test]
    fn earlier_synonym_wins() {
        let map = ColumnMap::from_headers(&rec(&["Contact", "Phone"]));
        let row = map.row(&rec(&["+1 555", "+44 777"]));
        assert_eq!(row.phone.as_deref(), Some("+44 777"));
    }

    #[test]
    fn first_and_last_name_combine() {
        let map = ColumnMap::from_headers(&rec(&["Email", "First Name", "Last Name", "DOB", "Labels"]));
        let row = map.row(&rec(&["A@X.com", "Ada", "Lovelace", "12/10/1815", "Basics of Trading; VIP"]));
        assert_eq!(row.email.as_deref(), Some("a@x.com"));
        assert_eq!(row.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(row.birthday, NaiveDate::from_ymd_opt(1815, 12, 10));
        assert_eq!(row.labels, vec!["Basics of Trading", "VIP"]);
    }

    #[test]
    fn blank_cells_and_bad_dates_are_absent() {
        let map = ColumnMap::from_headers(&rec(&["email", "name", "birthday"]));
        let row = map.row(&rec(&["  ", "", "someday"]));
        assert_eq!(row, ImportRow::default());
    }
}
