//! Result of a combined lookup.

use serde::Serialize;

use super::IsoCode;

/// Everything the engine knows about the country containing a point.
///
/// Borrowed from the boundary store, so producing one never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LookupResult<'a> {
    /// `0` when no country matched
    pub numeric_id: u16,

    /// Empty when no country matched or the country has no ISO code
    pub iso_code: IsoCode,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
}

impl LookupResult<'_> {
    pub const NONE: LookupResult<'static> = LookupResult {
        numeric_id: crate::NO_COUNTRY,
        iso_code: IsoCode::EMPTY,
        name: None,
    };

    pub fn is_match(&self) -> bool {
        self.numeric_id != crate::NO_COUNTRY
    }
}
