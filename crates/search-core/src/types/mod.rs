//! Core types shared across the search core.
//!
//! - [`SearchParameterInfo`], [`SearchParamType`] - Catalog records for search parameters
//! - [`ContinuationToken`], [`Page`], [`PageRequest`] - Pagination types
//! - [`ResourceRecord`] - Rows returned by search queries
//!
//! # Examples
//!
//! ## Defining a Search Parameter
//!
//! ```
//! use helios_search_core::types::{SearchParameterInfo, SearchParamType};
//!
//! let param = SearchParameterInfo::new(
//!     "http://hl7.org/fhir/SearchParameter/Patient-name",
//!     "name",
//!     SearchParamType::String,
//! )
//! .with_base(["Patient"]);
//!
//! assert!(param.is_searchable);
//! assert!(param.applies_to("Patient"));
//! ```
//!
//! ## Continuation Tokens
//!
//! ```
//! use helios_search_core::types::ContinuationToken;
//!
//! let token = ContinuationToken::new(100, "query-hash");
//! let encoded = token.encode();
//!
//! let decoded = ContinuationToken::decode_for(&encoded, "query-hash").unwrap();
//! assert_eq!(decoded.last_surrogate_id(), 100);
//! assert!(ContinuationToken::decode_for(&encoded, "other-query").is_err());
//! ```

mod pagination;
mod resource;
mod search_params;

pub use pagination::{ContinuationToken, Page, PageInfo, PageRequest};
pub use resource::ResourceRecord;
pub use search_params::{SearchParamType, SearchParameterComponent, SearchParameterInfo};
