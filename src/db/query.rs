//! Read-side filter/sort model for `GET /countries`.

use crate::error::MeridianError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Gdp,
    #[default]
    Name,
    Population,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SortOrder {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortOrder {
    /// Parses `<field>_<direction>` (e.g. `gdp_desc`); the direction defaults to ascending.
    pub fn parse(raw: &str) -> Result<Self, MeridianError> {
        let mut parts = raw.trim().splitn(2, '_');
        let field = match parts.next().unwrap_or("").to_ascii_lowercase().as_str() {
            "gdp" => SortField::Gdp,
            "name" => SortField::Name,
            "population" => SortField::Population,
            _ => {
                return Err(MeridianError::validation(
                    "Invalid sort field. Only `gdp`, `name`, `population` are supported.",
                ));
            }
        };
        let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(_) => {
                return Err(MeridianError::validation(
                    "Invalid sort direction. Use `asc` or `desc`.",
                ));
            }
        };
        Ok(Self { field, direction })
    }

    /// `ORDER BY` body. Missing GDP values always sort last; `name ASC` breaks ties.
    pub(crate) fn order_by_sql(self) -> String {
        let dir = self.direction.as_sql();
        match self.field {
            SortField::Name => format!("name {dir}"),
            SortField::Population => format!("population {dir}, name ASC"),
            SortField::Gdp => format!("estimated_gdp IS NULL, estimated_gdp {dir}, name ASC"),
        }
    }
}

/// Already-validated listing options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CountryQuery {
    /// Case-insensitive substring of `region`.
    pub region: Option<String>,
    /// Case-insensitive exact `currency_code`.
    pub currency: Option<String>,
    pub sort: SortOrder,
}
