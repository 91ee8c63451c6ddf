// Extractor module: turns free-text benefit/brand/day descriptions into
// canonical token sets and unions them losslessly.

pub mod attributes;
pub mod benefits;

pub use attributes::{detect_card_brands, expand_offer_days};
pub use benefits::{extract_benefits, merge_sets};
