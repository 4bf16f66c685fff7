//! Descriptors of the normalized search tables.
//!
//! Composite tables reuse the column names of their component tables with a
//! 1-based component suffix (`code1`, `single_value2`).

/// A search table and the alias prefix used for it in generated SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub alias: &'static str,
}

impl Table {
    const fn new(name: &'static str, alias: &'static str) -> Self {
        Self { name, alias }
    }
}

/// Columns shared by every parameter table.
pub const RESOURCE_SURROGATE_ID: &str = "resource_surrogate_id";
pub const SEARCH_PARAM_URI: &str = "search_param_uri";

pub const RESOURCE: Table = Table::new("resource", "r");
pub const TOKEN: Table = Table::new("token_search_param", "tk");
pub const STRING: Table = Table::new("string_search_param", "st");
pub const DATE_TIME: Table = Table::new("date_time_search_param", "dt");
pub const NUMBER: Table = Table::new("number_search_param", "nm");
pub const QUANTITY: Table = Table::new("quantity_search_param", "qt");
pub const URI: Table = Table::new("uri_search_param", "ur");
pub const REFERENCE: Table = Table::new("reference_search_param", "rf");
pub const COMPARTMENT: Table = Table::new("compartment_assignment", "ca");
pub const TOKEN_TOKEN: Table = Table::new("token_token_composite_search_param", "ctt");
pub const TOKEN_DATE_TIME: Table = Table::new("token_date_time_composite_search_param", "ctd");
pub const TOKEN_QUANTITY: Table = Table::new("token_quantity_composite_search_param", "ctq");
pub const TOKEN_STRING: Table = Table::new("token_string_composite_search_param", "cts");
pub const TOKEN_NUMBER_NUMBER: Table =
    Table::new("token_number_number_composite_search_param", "ctnn");
pub const REFERENCE_TOKEN: Table = Table::new("reference_token_composite_search_param", "crt");

/// Every table holding index rows keyed by `resource_surrogate_id`.
pub const INDEX_TABLES: [Table; 14] = [
    TOKEN,
    STRING,
    DATE_TIME,
    NUMBER,
    QUANTITY,
    URI,
    REFERENCE,
    COMPARTMENT,
    TOKEN_TOKEN,
    TOKEN_DATE_TIME,
    TOKEN_QUANTITY,
    TOKEN_STRING,
    TOKEN_NUMBER_NUMBER,
    REFERENCE_TOKEN,
];

pub mod resource {
    pub const RESOURCE_TYPE: &str = "resource_type";
    pub const RESOURCE_ID: &str = "resource_id";
    pub const LAST_UPDATED: &str = "last_updated";
}

pub mod token {
    pub const SYSTEM_ID: &str = "system_id";
    pub const CODE: &str = "code";
}

pub mod string {
    pub const TEXT: &str = "text";
    pub const TEXT_NORMALIZED: &str = "text_normalized";
}

pub mod date_time {
    pub const START_DATE_TIME: &str = "start_date_time";
    pub const END_DATE_TIME: &str = "end_date_time";
    pub const IS_LONGER_THAN_A_DAY: &str = "is_longer_than_a_day";
}

pub mod number {
    pub const SINGLE_VALUE: &str = "single_value";
    pub const LOW_VALUE: &str = "low_value";
    pub const HIGH_VALUE: &str = "high_value";
}

pub mod quantity {
    pub const SYSTEM_ID: &str = "system_id";
    pub const QUANTITY_CODE: &str = "quantity_code";
    pub const SINGLE_VALUE: &str = "single_value";
    pub const LOW_VALUE: &str = "low_value";
    pub const HIGH_VALUE: &str = "high_value";
}

pub mod uri {
    pub const URI: &str = "uri";
}

pub mod reference {
    pub const BASE_URI: &str = "base_uri";
    pub const REFERENCE_RESOURCE_TYPE: &str = "reference_resource_type";
    pub const REFERENCE_RESOURCE_ID: &str = "reference_resource_id";
}

pub mod compartment {
    pub const COMPARTMENT_TYPE: &str = "compartment_type";
    pub const REFERENCE_RESOURCE_ID: &str = "reference_resource_id";
}

pub mod system {
    pub const TABLE: &str = "system";
    pub const SYSTEM_ID: &str = "system_id";
    pub const VALUE: &str = "value";
}
